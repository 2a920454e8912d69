//! Terminal output helpers

pub mod terminal;

pub use terminal::{Painter, Style};
