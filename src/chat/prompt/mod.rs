//! Prompt construction modules.

pub mod context_window;
pub mod prompt_builder;

pub use context_window::{build_context_window, window_from_entries};
pub use prompt_builder::assemble_prompt;
