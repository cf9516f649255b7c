//! Plot-context tracking and image-capture injection.
//!
//! A small state machine watches the statement stream and decides where
//! a `set output` capture directive has to be inserted so that plots
//! materialize as retrievable image files without the user asking. Any
//! statement already sitting inside a user-managed output context is
//! left alone.

pub mod blocks;

use std::path::Path;

use crate::statement::Statement;

/// gnuplot-side counter variable advanced by the injected directive
/// itself, so that looped plot constructs write distinct files.
pub const IMAGE_INDEX_VAR: &str = "GPK_IMAGE_INDEX";

/// Filename stem shared by every capture artifact of a session.
pub const IMAGE_STEM: &str = "inline";

/// Conceptual state of the session with respect to plotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotContext {
    #[default]
    None,
    /// The last statement was an uncaptured plot.
    Plot,
    /// Inside a user-managed `set output` redirection.
    Output,
    /// Inside a multiplot block that the engine captures as a whole.
    Multiplot,
    /// Inside a multiplot block with user-managed output.
    OutputMultiplot,
}

/// Two-field (previous, current) history; each transition is a pure
/// function of the current state and the statement's facts.
#[derive(Debug, Default)]
pub struct ContextTracker {
    previous: PlotContext,
    current: PlotContext,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance on one statement, returning the (previous, current)
    /// pair just produced.
    pub fn advance(&mut self, stmt: &Statement<'_>) -> (PlotContext, PlotContext) {
        let next = transition(self.previous, self.current, stmt);
        self.previous = self.current;
        self.current = next;
        (self.previous, self.current)
    }
}

fn transition(previous: PlotContext, current: PlotContext, stmt: &Statement<'_>) -> PlotContext {
    use PlotContext::*;
    match current {
        None => {
            if stmt.is_plot() {
                Plot
            } else if stmt.is_set_output() {
                Output
            } else if stmt.is_set_multiplot() {
                Multiplot
            } else {
                None
            }
        }
        // A plot that consumed an explicit output target collapses back
        // to the ground state before any fact is considered.
        Plot if previous == Output => None,
        Plot => {
            if stmt.is_set_output() {
                Output
            } else if stmt.is_plot() {
                Plot
            } else {
                None
            }
        }
        Output => {
            if stmt.is_plot() {
                Plot
            } else if stmt.is_set_multiplot() {
                OutputMultiplot
            } else if stmt.is_unset_output() {
                None
            } else {
                Output
            }
        }
        Multiplot => {
            if stmt.is_unset_multiplot() {
                None
            } else {
                Multiplot
            }
        }
        OutputMultiplot => {
            if stmt.is_unset_multiplot() {
                Output
            } else {
                OutputMultiplot
            }
        }
    }
}

/// Transitions that require a capture directive in front of the
/// statement that produced them.
fn needs_capture(previous: PlotContext, current: PlotContext) -> bool {
    use PlotContext::*;
    matches!(
        (previous, current),
        (None, Plot) | (None, Multiplot) | (Plot, Plot)
    )
}

/// Rewrites submissions so that recognisable plot statements write
/// their output to capture files.
#[derive(Debug)]
pub struct InlineAnnotator {
    tracker: ContextTracker,
    directive: String,
}

impl InlineAnnotator {
    /// `image_dir` and `extension` determine where the subordinate
    /// process writes the capture files.
    pub fn new(image_dir: &Path, extension: &str) -> Self {
        let pattern = image_dir.join(format!("{IMAGE_STEM}-%03d.{extension}"));
        let directive = format!(
            "{var} = {var} + 1; set output sprintf('{pattern}', {var})",
            var = IMAGE_INDEX_VAR,
            pattern = pattern.display(),
        );
        Self {
            tracker: ContextTracker::new(),
            directive,
        }
    }

    /// Statement that resets the capture counter; sent once per session.
    pub fn counter_init() -> String {
        format!("{IMAGE_INDEX_VAR} = 0")
    }

    /// Insert a capture directive before every statement that starts an
    /// otherwise-uncaptured plot or multiplot block, and append a flush
    /// so redirected output is finalized.
    pub fn annotate(&mut self, code: &str) -> String {
        let mut lines: Vec<&str> = Vec::new();
        let mut continued = false;
        for raw in code.lines() {
            let stmt = Statement::new(raw);
            let (previous, current) = self.tracker.advance(&stmt);
            // A continuation line belongs to the statement above it and
            // never receives its own directive.
            if !continued && needs_capture(previous, current) {
                lines.push(&self.directive);
            }
            continued = stmt.is_continuation();
            lines.push(raw);
        }

        // Make gnuplot flush the output.
        match lines.last() {
            Some(last) if !last.ends_with('\\') => lines.push("unset output"),
            _ => {}
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::PlotContext::*;
    use super::*;

    fn advance_all(tracker: &mut ContextTracker, code: &str) -> Vec<(PlotContext, PlotContext)> {
        code.lines()
            .map(|line| tracker.advance(&Statement::new(line)))
            .collect()
    }

    fn annotator() -> InlineAnnotator {
        InlineAnnotator::new(Path::new("/tmp/t"), "png")
    }

    fn directive_count(annotated: &str) -> usize {
        annotated
            .lines()
            .filter(|l| l.contains("set output sprintf"))
            .count()
    }

    #[test]
    fn consecutive_plots_each_enter_plot_state() {
        let mut t = ContextTracker::new();
        let pairs = advance_all(&mut t, "plot sin(x)\nplot cos(x)");
        assert_eq!(pairs, vec![(None, Plot), (Plot, Plot)]);
    }

    #[test]
    fn multiplot_block_is_one_context() {
        let mut t = ContextTracker::new();
        let pairs = advance_all(
            &mut t,
            "set multiplot layout 2,1\nplot sin(x)\nplot cos(x)\nunset multiplot",
        );
        assert_eq!(
            pairs,
            vec![
                (None, Multiplot),
                (Multiplot, Multiplot),
                (Multiplot, Multiplot),
                (Multiplot, None),
            ]
        );
    }

    #[test]
    fn explicit_output_suppresses_plot_capture() {
        let mut t = ContextTracker::new();
        let pairs = advance_all(&mut t, "set output 'a.png'\nplot sin(x)\nplot cos(x)");
        assert_eq!(pairs[0], (None, Output));
        assert_eq!(pairs[1], (Output, Plot));
        // The plot that consumed the explicit target collapses to the
        // ground state instead of producing a capturable (plot, plot).
        assert_eq!(pairs[2], (Plot, None));
    }

    #[test]
    fn unset_multiplot_restores_output_state() {
        // Entering multiplot from an explicit output context and leaving
        // it again restores `output`, treating the nested block as
        // transparent.
        let mut t = ContextTracker::new();
        let pairs = advance_all(
            &mut t,
            "set output 'a.png'\nset multiplot\nplot sin(x)\nunset multiplot\nunset output",
        );
        assert_eq!(
            pairs,
            vec![
                (None, Output),
                (Output, OutputMultiplot),
                (OutputMultiplot, OutputMultiplot),
                (OutputMultiplot, Output),
                (Output, None),
            ]
        );
    }

    #[test]
    fn injects_before_first_plot_and_successive_plots() {
        let annotated = annotator().annotate("plot sin(x)\nplot cos(x)");
        assert_eq!(directive_count(&annotated), 2);
        let lines: Vec<&str> = annotated.lines().collect();
        assert!(lines[0].contains("set output sprintf"));
        assert_eq!(lines[1], "plot sin(x)");
        assert!(lines[2].contains("set output sprintf"));
        assert_eq!(lines[3], "plot cos(x)");
        assert_eq!(*lines.last().expect("nonempty"), "unset output");
    }

    #[test]
    fn multiplot_block_gets_exactly_one_directive() {
        let annotated = annotator()
            .annotate("set multiplot layout 2,1\nplot sin(x)\nplot cos(x)\nunset multiplot");
        assert_eq!(directive_count(&annotated), 1);
        assert!(annotated.starts_with(&format!("{IMAGE_INDEX_VAR} = {IMAGE_INDEX_VAR} + 1")));
    }

    #[test]
    fn plot_after_explicit_output_not_captured() {
        let annotated = annotator().annotate("set output 'a.png'\nplot sin(x)\nplot cos(x)");
        // The second plot follows an (output, plot) pair and must not be
        // treated as a successive uncaptured plot.
        assert_eq!(directive_count(&annotated), 0);
    }

    #[test]
    fn explicit_output_multiplot_left_alone() {
        let annotated = annotator().annotate(
            "set output 'a.png'\nset multiplot\nplot sin(x)\nplot cos(x)\nunset multiplot",
        );
        assert_eq!(directive_count(&annotated), 0);
    }

    #[test]
    fn no_directive_before_continuation_line() {
        let annotated = annotator().annotate("plot sin(x),\\\n     cos(x)");
        assert_eq!(directive_count(&annotated), 1);
        assert!(annotated.lines().nth(2).expect("line").starts_with("     cos(x)"));
    }

    #[test]
    fn flush_appended_only_when_last_line_is_not_continued() {
        let annotated = annotator().annotate("f(x) = sin(x)");
        assert!(annotated.ends_with("unset output"));

        let annotated = annotator().annotate("plot sin(x),\\");
        assert!(!annotated.ends_with("unset output"));
    }

    #[test]
    fn context_survives_across_submissions() {
        let mut a = annotator();
        let first = a.annotate("set multiplot");
        assert_eq!(directive_count(&first), 1);
        // Still inside the multiplot block in the next submission.
        let second = a.annotate("plot sin(x)");
        assert_eq!(directive_count(&second), 0);
    }
}
