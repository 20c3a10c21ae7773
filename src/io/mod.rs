//! Document input.

mod reader;

pub use reader::DocumentReader;
