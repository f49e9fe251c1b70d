//! Command handlers
//!
//! `session` is the command surface an external UI calls into; `console`
//! maps stdin lines onto it.

pub mod console;
pub mod session;

pub use console::{execute, run_console, ConsoleCommand};
pub use session::ClassifierSession;
