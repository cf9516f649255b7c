//! Typed failures for one submission to the gnuplot session.

use std::time::Duration;

use thiserror::Error;

/// Classification of a failed exchange with the gnuplot process.
///
/// Every variant ends the current submission early and is reported as
/// display-worthy text; the session stays usable for the next one.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Input the engine refuses to send, e.g. a submission ending in
    /// the line-continuation backslash.
    #[error("do not execute code that ends with a continuation backslash")]
    MalformedInput,

    /// A data block was opened but its terminator never appeared
    /// before the end of the submission.
    #[error("Error: {kind} block not terminated correctly.")]
    UnterminatedBlock { kind: String },

    /// The gnuplot prompt could not be recovered within the timeout
    /// budget.
    #[error("gnuplot prompt failed to return in {timeout:?}")]
    PromptLost { timeout: Duration },

    /// gnuplot itself reported an error for a statement; `output` is
    /// its diagnostic text, verbatim.
    #[error("{statement}\n{output}")]
    ErrorOutput { statement: String, output: String },

    /// The connection to the gnuplot process collapsed.
    #[error("gnuplot process I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
