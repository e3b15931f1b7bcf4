//! AI Stylist: one clothing photo in, styled outfit suggestions out.
//!
//! The pipeline analyzes the photo, asks a text model for outfit concepts
//! with shopping links, then renders a styled photo for each concept in
//! parallel. A failed render only costs that concept its image.

pub mod analyzer;
pub mod backend;
pub mod config;
pub mod error;
pub mod gemini;
pub mod media;
pub mod models;
pub mod pipeline;
pub mod recommender;
pub mod renderer;
pub mod routes;

pub use backend::{DemoBackend, GenerativeBackend};
pub use config::Config;
pub use error::StylistError;
pub use media::ImagePayload;
pub use pipeline::{ModelSettings, Stylist};
