//! Terminal output for the covault CLI.
//!
//! [`UiContext`] captures what the terminal can do, [`OutputMode`]
//! decides between json, plain and pretty output, and the render
//! functions produce the actual text. Commands never print escape
//! codes directly.

mod context;
mod mode;
pub mod render;
pub mod theme;

pub use context::UiContext;
pub use mode::OutputMode;
pub use theme::Badge;

pub use render::{
    badge, blank_line, divider, header, hint, kv, print, print_error, receipt, simple_table,
    table, Column,
};
