//! astdump - dump the raw syntax tree of a SQLite SELECT as JSON
//!
//! The parser follows SQLite's grammar and keeps the tree exactly as the
//! grammar actions build it, before any name resolution. When the first
//! statement of the input is a SELECT, it is rendered as an indented JSON
//! document.

pub mod capture;
pub mod config;
pub mod error;
pub mod json;
pub mod parser;

pub use capture::{dump, CaptureGate};
pub use config::DumpConfig;
pub use error::{DumpError, Error, Result};
