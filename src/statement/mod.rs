//! Recognising gnuplot statements.
//!
//! Every predicate is stateless and tolerant of the command
//! abbreviations gnuplot itself accepts, e.g. `plot` may be typed as
//! `p`, `pl`, `plo` or `plot`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Plot commands by first token: plot, splot and replot families, each
/// down to its shortest unambiguous spelling.
const PLOT_CMDS: &[&str] = &[
    "plot", "plo", "pl", "p", //
    "splot", "splo", "spl", "sp", //
    "replot", "replo", "repl", "rep",
];

// Data block e.g.
// $DATA << EOD
// # x y
// 1 1
// 2 2
// EOD
static START_DATABLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\w+\s+<<\s*(?P<end>\w+)$").expect("valid regex"));
static END_DATABLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<end>\w+)$").expect("valid regex"));

/// Kinds of multi-line literal blocks the reassembler understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Data,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Data => write!(f, "data"),
        }
    }
}

/// A single gnuplot statement line with facts derived on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement<'a> {
    line: &'a str,
}

impl<'a> Statement<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { line }
    }

    fn tokens(&self) -> impl Iterator<Item = &'a str> {
        self.line.split_whitespace()
    }

    /// True for `plot`/`splot`/`replot` statements, abbreviations included.
    pub fn is_plot(&self) -> bool {
        match self.tokens().next() {
            Some(cmd) => PLOT_CMDS.contains(&cmd),
            None => false,
        }
    }

    /// True for `set multiplot` statements, abbreviations included.
    pub fn is_set_multiplot(&self) -> bool {
        self.is_set_unset(false, |t| is_abbrev(t, "multiplot", 6))
    }

    /// True for `unset multiplot` statements, abbreviations included.
    pub fn is_unset_multiplot(&self) -> bool {
        self.is_set_unset(true, |t| is_abbrev(t, "multiplot", 6))
    }

    /// True for `set output` statements, abbreviations included.
    pub fn is_set_output(&self) -> bool {
        self.is_set_unset(false, |t| is_abbrev(t, "output", 1))
    }

    /// True for `unset output` statements, abbreviations included.
    pub fn is_unset_output(&self) -> bool {
        self.is_set_unset(true, |t| is_abbrev(t, "output", 1))
    }

    /// True when the line ends in the continuation marker, meaning the
    /// following line belongs to the same logical statement.
    pub fn is_continuation(&self) -> bool {
        self.line.ends_with('\\')
    }

    /// Block opener detection: `$NAME << TOKEN` starts a data block
    /// terminated by a line that is exactly `TOKEN`.
    pub fn block_opener(&self) -> Option<(BlockKind, String)> {
        let caps = START_DATABLOCK_RE.captures(self.line)?;
        Some((BlockKind::Data, caps["end"].to_string()))
    }

    /// True when the line closes a pending block with the given terminator.
    pub fn is_block_terminator_for(&self, terminator: &str) -> bool {
        match END_DATABLOCK_RE.captures(self.line) {
            Some(caps) => &caps["end"] == terminator,
            None => false,
        }
    }

    fn is_set_unset(&self, unset: bool, subcommand: impl Fn(&str) -> bool) -> bool {
        let mut tokens = self.tokens();
        let keyword_ok = match tokens.next() {
            // `set` must be spelled out, `unset` may be abbreviated to `uns`.
            Some(first) if unset => is_abbrev(first, "unset", 3),
            Some(first) => first == "set",
            None => false,
        };
        keyword_ok && tokens.next().is_some_and(subcommand)
    }
}

/// True when `token` is `full` or a truncation of it no shorter than
/// `shortest` characters.
fn is_abbrev(token: &str, full: &str, shortest: usize) -> bool {
    token.len() >= shortest && full.starts_with(token)
}
