//! Core services shared by the AI module
//!
//! Configuration, the simulation clock and the outgoing event queue.

mod config;
mod events;
mod time;

pub use config::{BrainConfig, ConfigError, TransitionPolicy};
pub use events::{AiEvent, EventQueue};
pub use time::Time;
