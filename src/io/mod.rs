mod format;
mod input;
mod output;

pub use format::DocumentFormat;
pub use input::{load_registry_str, parse_document_str, parse_entity_str, parse_values_str};
pub use output::{OutputDestination, OutputOptions, emit, render};
