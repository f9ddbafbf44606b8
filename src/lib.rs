pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod sandbox;
pub mod scheduler;
pub mod shutdown;
pub mod templates;
pub mod worker;

pub use engine::Engine;
pub use error::{Result, ScriptboxError};
