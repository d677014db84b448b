//! Real-time classroom session core: mesh peer coordination, media-state
//! synchronization, and the engagement-classification pipeline. Rendering,
//! quiz presentation, and device capture stay behind narrow seams.

pub mod api;
pub mod config;
pub mod engagement;
pub mod error;
pub mod session;
pub mod signaling;

pub use error::{Result, SessionError};
