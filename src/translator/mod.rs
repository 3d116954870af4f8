//! Natural-language command translation backed by an LLM.

pub mod llm;
pub mod prompt;
pub mod translate;
pub mod types;

pub use translate::{parse_command, CommandTranslator, Translate};
pub use types::*;
pub(crate) use translate::truncate;
