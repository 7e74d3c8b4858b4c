//! Terminal output helpers.

mod tables;

pub use tables::{format_bytes, format_optional, print_separator, truncate_string};
