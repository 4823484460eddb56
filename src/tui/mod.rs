//! TUI debugger for the SM213 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Disassembly view that follows the PC
//! - Register and cycle-state visualization
//! - Scrollable memory hex dump
//! - Step/run/breakpoint controls

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
