//! Per-comment extraction: attachment text and structured attributes.

pub mod classify;
pub mod prompts;
pub mod text;

pub use classify::{Classifier, ExtractedAttributes, Support, WhoType};
pub use text::{ExtractedText, PdfExtractor};
