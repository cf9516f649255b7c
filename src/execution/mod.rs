//! Output orchestration: drives one full submission through the
//! annotator, the block reassembler and the transport, and collects
//! the image artifacts plots leave behind.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::config::{Config, ImageFormat, PlotSettings};
use crate::error::SessionError;
use crate::repl::GnuplotRepl;
use crate::session::blocks::{BlockSplitter, SendUnit};
use crate::session::{InlineAnnotator, IMAGE_STEM};

/// Image artifact produced by a plot statement.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

/// Result of one successful submission: captured text plus the images
/// produced along the way.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub output: String,
    pub images: Vec<ImageData>,
}

/// One interactive gnuplot session. Submissions run strictly one after
/// another; each runs to completion or failure before the next.
pub struct GnuplotSession {
    repl: GnuplotRepl,
    settings: PlotSettings,
    annotator: InlineAnnotator,
    splitter: BlockSplitter,
    image_dir: TempDir,
    first: bool,
}

impl GnuplotSession {
    pub async fn start(cfg: &Config, settings: PlotSettings) -> anyhow::Result<Self> {
        let repl = GnuplotRepl::spawn(&cfg.gnuplot_command(), cfg.prompt_timeout()).await?;
        let image_dir = tempfile::Builder::new()
            .prefix("gnuplot-kernel-")
            .tempdir()?;
        let annotator = InlineAnnotator::new(image_dir.path(), settings.format.extension());
        Ok(Self {
            repl,
            settings,
            annotator,
            splitter: BlockSplitter::new(),
            image_dir,
            first: true,
        })
    }

    /// Raw text of the most recent gnuplot prompt.
    pub fn prompt(&self) -> &str {
        self.repl.prompt()
    }

    /// Execute one submission. On failure the remaining units are not
    /// executed, but artifact cleanup still runs.
    pub async fn execute(&mut self, code: &str) -> Result<ExecutionResult, SessionError> {
        if self.first {
            self.first = false;
            self.apply_settings().await?;
        }

        // Ensure there are no stale images from an earlier submission.
        self.delete_image_files();

        let code = if self.settings.is_inline() {
            self.annotator.annotate(code)
        } else {
            code.to_string()
        };
        let result = self.run(&code).await;

        let images = match (&result, self.settings.is_inline()) {
            (Ok(_), true) => self.collect_images(),
            _ => Vec::new(),
        };
        self.delete_image_files();

        if !self.repl.has_default_prompt() && !self.repl.prompt().is_empty() {
            warn!(prompt = self.repl.prompt(), "prompt is not the gnuplot default");
        }

        Ok(ExecutionResult {
            output: result?,
            images,
        })
    }

    /// Send the terminal configuration and reset the capture counter.
    /// Called on first use and whenever settings change mid-session.
    pub async fn apply_settings(&mut self) -> Result<(), SessionError> {
        let unit = SendUnit {
            text: format!("set terminal {}", self.settings.termspec),
        };
        self.repl.exchange(&unit).await?;
        if self.settings.is_inline() {
            let unit = SendUnit {
                text: InlineAnnotator::counter_init(),
            };
            self.repl.exchange(&unit).await?;
        }
        Ok(())
    }

    /// Exit the gnuplot process, killing it if it is unresponsive.
    pub async fn shutdown(&mut self) {
        self.repl.shutdown().await;
    }

    async fn run(&mut self, code: &str) -> Result<String, SessionError> {
        let code = validate_input(code)?;
        let units = self.splitter.split(&code)?;
        let mut output = String::new();
        for unit in &units {
            output.push_str(&self.repl.exchange(unit).await?);
        }
        Ok(output)
    }

    /// Read back whatever the injected directives made gnuplot write,
    /// in counter order. Empty or missing files are nothing to show.
    fn collect_images(&self) -> Vec<ImageData> {
        let entries = match fs::read_dir(self.image_dir.path()) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut found: Vec<(u32, std::path::PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                artifact_index(&path, self.settings.format).map(|index| (index, path))
            })
            .collect();
        found.sort_by_key(|(index, _)| *index);

        let mut images = Vec::new();
        for (_, path) in found {
            match fs::read(&path) {
                Ok(bytes) if !bytes.is_empty() => images.push(ImageData {
                    bytes,
                    format: self.settings.format,
                }),
                Ok(_) => warn!(path = %path.display(), "gnuplot wrote an empty image file"),
                Err(err) => debug!(path = %path.display(), %err, "image file vanished"),
            }
        }
        images
    }

    fn delete_image_files(&self) {
        if let Ok(entries) = fs::read_dir(self.image_dir.path()) {
            for entry in entries.flatten() {
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

/// Refuse submissions that would wedge the process waiting for a
/// continuation line, then join continued lines into single statements.
fn validate_input(code: &str) -> Result<String, SessionError> {
    if code.ends_with('\\') {
        return Err(SessionError::MalformedInput);
    }
    Ok(code.replace("\\\n", " "))
}

/// Capture-counter index encoded in an artifact filename, if the path
/// is one of ours.
fn artifact_index(path: &Path, format: ImageFormat) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_prefix(IMAGE_STEM)?.strip_prefix('-')?;
    rest.strip_suffix(format.extension())?
        .strip_suffix('.')?
        .parse()
        .ok()
}
