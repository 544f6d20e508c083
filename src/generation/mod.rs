//! Audio generation module.
//!
//! Prompt construction, output naming, and the [`Composer`] orchestrator
//! that ties the model backend to the encoder.

pub mod orchestrator;
pub mod prompt;
pub mod storage;

// Re-export commonly used items
pub use orchestrator::Composer;
pub use prompt::build_prompt;
pub use storage::{output_base_name, sanitize_label, MediaStore, COMPOSITIONS_DIR};
