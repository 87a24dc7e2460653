//! Turn engine for a narrated tabletop adventure.
//!
//! The narrator replies with prose carrying inline `[[KEYWORD:args]]`
//! directives. Each reply is parsed, applied to the session, and stored with
//! the directives stripped. See [`engine::engine::Engine`] for the turn loop.

pub mod config;
pub mod engine;
pub mod model;
