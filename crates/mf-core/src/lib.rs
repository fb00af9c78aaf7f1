//! `mf-core` — foundational types for the mapforge crates.
//!
//! This crate is a dependency of every other `mf-*` crate. It intentionally
//! has no `mf-*` dependencies and minimal external ones (`chrono`, `rand`,
//! `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                              |
//! |-----------|-------------------------------------------------------|
//! | [`log`]   | `Severity`, `LogEntry`, `BuildLog` (shared job log)   |
//! | [`color`] | `ColorWheel` (display colors for submaps and routes)  |
//! | [`ids`]   | `IdAllocator` (surrogate gids for layer rows)         |

pub mod color;
pub mod ids;
pub mod log;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use color::ColorWheel;
pub use ids::IdAllocator;
pub use log::{BuildLog, LogEntry, Severity};
