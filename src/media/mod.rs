pub mod extract;

pub use extract::{DocumentFormat, MAX_OUTPUT_BYTES, extract_text};
