//! # Bestekar Common Library
//!
//! Shared code for the Bestekar generation service including:
//! - Error types
//! - Event types (GenEvent enum)
//! - Generation request / job snapshot types
//! - Configuration resolution
//! - Fallback chain utility
//! - Human-readable time formatting

pub mod config;
pub mod error;
pub mod events;
pub mod fallback;
pub mod human_time;
pub mod types;

pub use error::{Error, Result};
pub use events::GenEvent;
pub use types::{
    GenerationMode, GenerationRequest, JobResult, JobSnapshot, JobState,
};
