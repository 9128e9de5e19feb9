//! Conversation Recorder (C6, spec §4.6): assembling, analyzing, and
//! exporting `ConversationRecord`s from a session's trace stream.

pub mod attribution;
pub mod builder;
pub mod export;
pub mod fingerprint;
pub mod parser;
pub mod quality;
pub mod tool_normalize;

pub use attribution::{attribute, Attribution};
pub use builder::build_record;
pub use export::{export_conversation, ExportError, FormatResult, EXPORT_FORMATS};
pub use fingerprint::fingerprint as fingerprint_prompt;
pub use quality::{patterns, DataAccessPattern, Patterns, RoutingPattern};
