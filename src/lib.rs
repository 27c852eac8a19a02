//! A data-driven behavior engine for enemy AI
//!
//! This crate provides:
//! - Finite state machines authored as RON/JSON behavior graphs
//! - Cooldown-gated, composite and instant actions
//! - Rate-limited grid pathfinding with path following
//! - Context steering over eight compass directions
//!
//! Agents are [`hecs`] entities carrying an [`ai::AgentContext`]; the host
//! game supplies physics and effects through [`ai::WorldServices`].

pub mod ai;
pub mod core;

// Re-exports for convenience
pub use glam;
pub use hecs;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::ai::{
        AgentContext, AiSystem, BehaviorGraph, Grid, LayerMask, StateId, WorldServices,
    };
    pub use crate::core::{AiEvent, BrainConfig, TransitionPolicy};
    pub use glam::Vec2;
}
