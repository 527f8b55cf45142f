//! File system watching for undu
//!
//! Turns bursts of file system events into auto-save checkpoints:
//! - Events on ignored paths and editor temp files are dropped
//! - A quiet period (the configured auto-save interval) must pass before
//!   saving
//! - A save only happens when the tree actually differs from the current
//!   checkpoint, and is followed by a retention pass

pub mod auto_save;
pub mod debounce;

pub use auto_save::AutoSaver;
pub use debounce::Debouncer;
