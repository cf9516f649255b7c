//! Session protocol engine for driving gnuplot as a subordinate
//! process with notebook-style inline plotting.
//!
//! Raw submitted text flows through the [`statement`] classifier and
//! the [`session`] state machine, which rewrite it into an enriched
//! line sequence; [`session::blocks`] groups lines into atomic send
//! units; the [`repl`] transport executes each unit against the
//! gnuplot prompt; and [`execution`] assembles the final result of
//! captured text plus image artifacts.

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod handlers;
pub mod printer;
pub mod repl;
pub mod session;
pub mod statement;
