//! Translation quality assessment.
//!
//! A pure, side-effect-free validator scores `(source, translated)` pairs
//! across weighted dimensions, with pluggable per-language and per-domain
//! rules.

mod domain;
mod language;
mod validator;

pub use domain::Domain;
pub use language::{LanguageInfo, LanguagePair, language_info, language_name, validate_language};
pub use validator::{QualityValidator, ValidationReport};
