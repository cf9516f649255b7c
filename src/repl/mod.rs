//! REPL transport: owns the gnuplot child process and synchronizes
//! request/response exchanges on its textual prompt.
//!
//! gnuplot gives no structured acknowledgement of command completion,
//! only a repeated prompt, free-form text and occasional multi-line
//! data blocks, so every exchange here waits for the prompt pattern
//! with an adaptive retry policy before the next unit may be sent.

use std::process::Stdio;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::error::SessionError;
use crate::session::blocks::SendUnit;

/// The prompt gnuplot is expected to print when ready; anything else
/// is reported as a warning upstream, never as a failure.
pub const PROMPT_PREFIX: &str = "gnuplot>";

// Most likely "gnuplot> ", but `set multiplot` and friends change it.
static PROMPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w*>\s*\z").expect("valid regex"));

// Block statements sometimes make the prompt leak into the output.
static PROMPT_REMOVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w*>\s*").expect("valid regex"));

// A caret line pointing at a syntax error, always followed by the
// diagnostic text. A lone caret is ordinary output (`print "^"`).
static ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\^[ \t]*\n[ \t]*\S").expect("valid regex"));

const QUICK_TIMEOUT: Duration = Duration::from_millis(50);
const QUICK_ATTEMPTS: usize = 4;
const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Connection to one gnuplot process. The process and its prompt state
/// are exclusively owned here; exchanges are strictly sequential.
pub struct GnuplotRepl {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    /// Bytes read but not yet decodable, an incomplete UTF-8 tail.
    raw: Vec<u8>,
    /// Output received but not yet attributed to an exchange.
    buffer: String,
    /// Captured output of the most recent completed exchange.
    before: String,
    /// Raw text of the most recent prompt.
    prompt: String,
    saw_eof: bool,
    patient_timeout: Duration,
}

impl GnuplotRepl {
    /// Start the gnuplot process behind a shell so stderr is merged
    /// into the line stream and `PAGER=cat` keeps help output flowing.
    pub async fn spawn(command: &str, patient_timeout: Duration) -> Result<Self, SessionError> {
        debug!(command, "starting gnuplot child");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(format!("exec {command} 2>&1"))
            .env("PAGER", "cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("gnuplot child has no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("gnuplot child has no stdout"))?;

        let mut repl = Self {
            child,
            stdin,
            stdout,
            raw: Vec::new(),
            buffer: String::new(),
            before: String::new(),
            prompt: String::new(),
            saw_eof: false,
            patient_timeout,
        };
        // Drain the startup banner; not every configuration prints one.
        let _ = repl.try_prompt(STARTUP_TIMEOUT).await;
        Ok(repl)
    }

    /// Raw text of the most recent prompt, so callers can detect one
    /// the user changed out of band.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn has_default_prompt(&self) -> bool {
        self.prompt.starts_with(PROMPT_PREFIX)
    }

    /// Execute one send unit: transmit it, force a prompt, and return
    /// the captured output with line endings normalized.
    pub async fn exchange(&mut self, unit: &SendUnit) -> Result<String, SessionError> {
        debug_assert!(
            !unit.text.ends_with('\\'),
            "continuation statements must be joined before sending"
        );
        // Anything still buffered belongs to an earlier exchange.
        if !self.buffer.is_empty() {
            debug!(stale = self.buffer.len(), "discarding stale output");
            self.buffer.clear();
        }
        self.send_line(&unit.text).await?;
        self.force_prompt(self.patient_timeout).await?;

        let text = self.before.replace("\r\n", "\n");
        if is_error_output(&text) {
            return Err(SessionError::ErrorOutput {
                statement: unit.text.clone(),
                output: text,
            });
        }
        let text = scrub_prompts(&text);
        // Some configurations echo the input; that is not output.
        if text.trim() == unit.text.trim() {
            return Ok(String::new());
        }
        Ok(text)
    }

    /// Try to observe the prompt, first eagerly with short timeouts,
    /// nudging the process with an empty line when output arrives
    /// without a prompt (it is probably stuck in help text), and
    /// finally with one patient attempt for long computations.
    pub async fn force_prompt(&mut self, timeout: Duration) -> Result<(), SessionError> {
        let quick = QUICK_TIMEOUT.min(timeout);
        for attempt in 0..QUICK_ATTEMPTS {
            if self.try_prompt(quick).await? {
                return Ok(());
            }
            if self.saw_eof {
                break;
            }
            if !self.buffer.is_empty() {
                debug!(attempt, "output without prompt, sending empty line");
                self.send_line("").await?;
            }
        }
        if !self.saw_eof && self.try_prompt(timeout).await? {
            return Ok(());
        }
        Err(SessionError::PromptLost { timeout })
    }

    /// Leave the process: confirm it is responsive, then ask it to
    /// exit; fall back to killing it outright. Never fails — a wedged
    /// process is terminated, not reported.
    pub async fn shutdown(&mut self) {
        if self.force_prompt(Duration::from_millis(10)).await.is_err() {
            debug!("no prompt during teardown, killing gnuplot");
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
            return;
        }
        if self.send_line("exit").await.is_err()
            || tokio::time::timeout(EXIT_GRACE, self.child.wait())
                .await
                .is_err()
        {
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
    }

    async fn send_line(&mut self, text: &str) -> Result<(), SessionError> {
        self.stdin.write_all(text.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// One prompt-acquisition attempt. On success the output before
    /// the prompt moves into `before` and the prompt text is stored;
    /// on timeout or child exit the partial output stays buffered.
    async fn try_prompt(&mut self, timeout: Duration) -> Result<bool, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(at) = prompt_position(&self.buffer) {
                let prompt = self.buffer.split_off(at);
                self.before = std::mem::take(&mut self.buffer);
                self.prompt = prompt;
                return Ok(true);
            }
            if self.saw_eof {
                return Ok(false);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            let mut chunk = [0u8; 4096];
            match tokio::time::timeout(remaining, self.stdout.read(&mut chunk)).await {
                Err(_) => return Ok(false),
                Ok(Ok(0)) => {
                    self.saw_eof = true;
                    let tail = std::mem::take(&mut self.raw);
                    self.buffer.push_str(&String::from_utf8_lossy(&tail));
                }
                Ok(Ok(n)) => {
                    self.raw.extend_from_slice(&chunk[..n]);
                    decode_into(&mut self.raw, &mut self.buffer);
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }
}

/// Append the decodable prefix of `raw` to `text`. An incomplete
/// trailing UTF-8 sequence stays in `raw` for the next read; invalid
/// bytes become replacement characters.
fn decode_into(raw: &mut Vec<u8>, text: &mut String) {
    loop {
        let (valid, bad) = match std::str::from_utf8(raw) {
            Ok(chunk) => {
                text.push_str(chunk);
                raw.clear();
                return;
            }
            Err(err) => (err.valid_up_to(), err.error_len()),
        };
        text.push_str(&String::from_utf8_lossy(&raw[..valid]));
        match bad {
            Some(len) => {
                text.push(char::REPLACEMENT_CHARACTER);
                raw.drain(..valid + len);
            }
            None => {
                raw.drain(..valid);
                return;
            }
        }
    }
}

/// Byte position where a prompt begins, if the buffer currently ends
/// with one.
fn prompt_position(buffer: &str) -> Option<usize> {
    PROMPT_RE.find(buffer).map(|m| m.start())
}

fn scrub_prompts(text: &str) -> String {
    PROMPT_REMOVE_RE
        .replace_all(text, "")
        .trim_matches(' ')
        .to_string()
}

fn is_error_output(text: &str) -> bool {
    ERROR_RE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_detected_only_at_end_of_buffer() {
        assert_eq!(prompt_position("gnuplot> "), Some(0));
        assert_eq!(prompt_position("some output\ngnuplot> "), Some(12));
        assert_eq!(prompt_position("gnuplot> trailing text"), None);
        assert_eq!(prompt_position(""), None);
        assert_eq!(prompt_position("no prompt here"), None);
    }

    #[test]
    fn changed_prompt_still_synchronizes() {
        let buffer = "multiplot> ";
        let at = prompt_position(buffer).expect("prompt");
        assert!(!buffer[at..].starts_with(PROMPT_PREFIX));
    }

    #[test]
    fn leaked_prompts_are_scrubbed() {
        assert_eq!(scrub_prompts("gnuplot> gnuplot> 1.0\n"), "1.0\n");
        assert_eq!(scrub_prompts("  plain output"), "plain output");
    }

    #[test]
    fn caret_line_with_diagnostic_is_error_output() {
        assert!(is_error_output("         ^\n         line 0: invalid command\n"));
        assert!(is_error_output(
            "plot [1,2][] sin(x)\n                ^\n line 0: Bad range\n"
        ));
        assert!(!is_error_output("x^2 is not an error marker\n"));
        assert!(!is_error_output("1.0\n"));
    }

    #[test]
    fn lone_caret_is_ordinary_output() {
        // `print "^"` produces a caret line without a diagnostic.
        assert!(!is_error_output("^\n"));
        assert!(!is_error_output("   ^   \n"));
    }

    #[test]
    fn multibyte_output_split_across_reads_decodes_intact() {
        let bytes = "π = 3.14\n".as_bytes();
        let mut raw = Vec::new();
        let mut text = String::new();

        raw.extend_from_slice(&bytes[..1]);
        decode_into(&mut raw, &mut text);
        assert_eq!(text, "");
        assert_eq!(raw, &bytes[..1]);

        raw.extend_from_slice(&bytes[1..]);
        decode_into(&mut raw, &mut text);
        assert_eq!(text, "π = 3.14\n");
        assert!(raw.is_empty());
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut raw = vec![b'a', 0xff, b'b'];
        let mut text = String::new();
        decode_into(&mut raw, &mut text);
        assert_eq!(text, "a\u{FFFD}b");
        assert!(raw.is_empty());
    }
}
