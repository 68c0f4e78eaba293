// Skirmish Schema - Shared type definitions
// This crate contains the static vocabulary shared between the combat engine
// and the RON data files it loads (enemy templates, weapons, encounters).

// Re-export the main types
pub use combat_types::*;
pub use template_data::*;

pub mod combat_types;
pub mod template_data;
