//! Handlers for the two ways statements reach a session.

pub mod exec;
pub mod interactive;
