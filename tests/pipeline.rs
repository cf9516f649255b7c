//! Pipeline tests: annotation and block reassembly working together,
//! the way a submission travels before it reaches the transport.

use std::path::Path;

use gnuplot_kernel::error::SessionError;
use gnuplot_kernel::session::blocks::BlockSplitter;
use gnuplot_kernel::session::InlineAnnotator;

fn units_for(code: &str) -> Vec<String> {
    let mut annotator = InlineAnnotator::new(Path::new("/tmp/img"), "png");
    let mut splitter = BlockSplitter::new();
    splitter
        .split(&annotator.annotate(code))
        .expect("split")
        .into_iter()
        .map(|u| u.text)
        .collect()
}

#[test]
fn plot_submission_becomes_directive_statement_flush() {
    let units = units_for("plot sin(x)");
    assert_eq!(units.len(), 3);
    assert!(units[0].contains("set output sprintf"));
    assert_eq!(units[1], "plot sin(x)");
    assert_eq!(units[2], "unset output");
}

#[test]
fn data_block_feeding_a_plot() {
    let units = units_for("$DATA << EOD\n1 1\n2 2\nEOD\nplot $DATA");
    assert_eq!(units.len(), 4);
    // The block travels as one unit ending in its terminator line.
    assert!(units[0].starts_with("$DATA << EOD"));
    assert!(units[0].ends_with("EOD\n"));
    assert!(units[1].contains("set output sprintf"));
    assert_eq!(units[2], "plot $DATA");
    assert_eq!(units[3], "unset output");
}

#[test]
fn multiplot_block_is_captured_once() {
    let units = units_for("set multiplot layout 2,1\nplot sin(x)\nplot cos(x)\nunset multiplot");
    let directives = units
        .iter()
        .filter(|u| u.contains("set output sprintf"))
        .count();
    assert_eq!(directives, 1);
    assert!(units[0].contains("set output sprintf"));
}

#[test]
fn unterminated_block_fails_the_whole_submission() {
    let mut annotator = InlineAnnotator::new(Path::new("/tmp/img"), "png");
    let mut splitter = BlockSplitter::new();
    let err = splitter
        .split(&annotator.annotate("$DATA << EOD\n1 1\nEODX"))
        .expect_err("unterminated");
    assert!(matches!(err, SessionError::UnterminatedBlock { .. }));
}
