//! Long-running services used by the CLI commands.
//!
//! Services accept trait-based dependencies so their scheduling logic can be
//! tested without touching the file system or git.

pub mod auto_sync;

pub use auto_sync::{AutoSync, DEBOUNCE_WINDOW, Schedule, SyncRunner, Trigger};
