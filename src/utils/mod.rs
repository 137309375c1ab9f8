//! Utility modules.

pub mod text;

pub use text::{excerpt, normalize_line};
