//! Output formatting for CLI.

mod json;
mod text;

pub use json::{JsonFormatter, TokenOutput};
pub use text::TextFormatter;
