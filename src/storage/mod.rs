//! Persistence of the session log and of settings records.
//!  - The session log is a single collection, read and replaced as a whole.
//!  - Settings records are stored under their own keys and fall back to defaults when missing.

pub mod entities;
pub mod preferences;
pub mod session_log;
