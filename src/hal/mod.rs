//! Hypermedia document handling: normalization and URI templates.

mod normalizer;
mod template;

pub use normalizer::{HalNormalizer, ITEMS_KEY, Normalized, NormalizedDocument, Normalizer};
pub use template::{Rfc6570Expander, TemplateExpander, TemplateParams};
