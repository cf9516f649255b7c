//! Reassembling multi-line data blocks into single send units.
//!
//! Statements inside a block are not followed by a prompt, which
//! confuses prompt-driven exchanges. A detected block is concatenated
//! into one unit so that executing it yields exactly one prompt.

use crate::error::SessionError;
use crate::statement::{BlockKind, Statement};

/// One logical chunk of text exchanged for one prompt-terminated
/// response: a single statement or a fully reassembled block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendUnit {
    pub text: String,
}

impl SendUnit {
    fn statement(line: &str) -> Self {
        Self {
            text: line.to_string(),
        }
    }
}

#[derive(Debug)]
struct PendingBlock {
    kind: BlockKind,
    terminator: String,
    lines: Vec<String>,
}

/// Splits a submission into ordered send units, carrying at most one
/// in-flight block at a time.
#[derive(Debug, Default)]
pub struct BlockSplitter {
    pending: Option<PendingBlock>,
}

impl BlockSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform the submission's lines into send units. Reaching the
    /// end of input with an open block is fatal for the submission; the
    /// pending state is cleared so the next submission starts clean.
    pub fn split(&mut self, code: &str) -> Result<Vec<SendUnit>, SessionError> {
        let mut units = Vec::new();
        for line in code.lines() {
            match self.pending.take() {
                Some(mut block) => {
                    block.lines.push(line.to_string());
                    if Statement::new(line).is_block_terminator_for(&block.terminator) {
                        // The trailing blank line nudges a prompt out of
                        // the process after the block is consumed.
                        block.lines.push(String::new());
                        units.push(SendUnit {
                            text: block.lines.join("\n"),
                        });
                    } else {
                        self.pending = Some(block);
                    }
                }
                None => match Statement::new(line).block_opener() {
                    Some((kind, terminator)) => {
                        self.pending = Some(PendingBlock {
                            kind,
                            terminator,
                            lines: vec![line.to_string()],
                        });
                    }
                    None => units.push(SendUnit::statement(line)),
                },
            }
        }

        if let Some(block) = self.pending.take() {
            return Err(SessionError::UnterminatedBlock {
                kind: block.kind.to_string(),
            });
        }
        Ok(units)
    }
}
