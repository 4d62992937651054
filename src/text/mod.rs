//! Text transformation primitives: token estimation, budget-aware chunking and
//! section-tagged document parsing.

pub mod chunker;
pub mod sections;

pub use chunker::{chunk, estimate_tokens};
pub use sections::{split_sections, Section};
