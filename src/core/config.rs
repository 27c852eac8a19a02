//! Runtime configuration for the AI system
//!
//! Replaces ambient global multipliers with one explicit value that is passed
//! into every tick.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// How a state's transition list is walked within one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransitionPolicy {
    /// Evaluate the transitions of the state that was current at tick start,
    /// stopping at the first one that switches.
    #[default]
    Snapshot,
    /// Walk the whole tick-start list; every transition that fires switches
    /// away from whatever state is current at that moment.
    Sequential,
}

/// AI system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Distance at which a waypoint counts as reached
    pub waypoint_buffer: f32,
    /// Minimum seconds between two path requests of one agent
    pub path_request_lockout: f32,
    /// Path requests resolved per poll (0 for unlimited)
    pub max_path_requests_per_poll: usize,
    /// Simulated grid-service latency in seconds
    pub path_latency: f32,
    /// Scales every gated action's cooldown
    pub cooldown_multiplier: f32,
    /// Scales every gated action's charge-up
    pub charge_up_multiplier: f32,
    /// Transition iteration policy
    pub transition_policy: TransitionPolicy,
    /// Zero the movement intention when a path request fails
    pub clear_intention_on_path_failure: bool,
    /// Collider radius given to agents spawned without one
    pub default_collider_radius: f32,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            waypoint_buffer: 0.25,
            path_request_lockout: 0.5,
            max_path_requests_per_poll: 8,
            path_latency: 0.0,
            cooldown_multiplier: 1.0,
            charge_up_multiplier: 1.0,
            transition_policy: TransitionPolicy::Snapshot,
            clear_intention_on_path_failure: false,
            default_collider_radius: 0.5,
        }
    }
}

impl BrainConfig {
    /// Set the waypoint arrival buffer
    pub fn with_waypoint_buffer(mut self, buffer: f32) -> Self {
        self.waypoint_buffer = buffer;
        self
    }

    /// Set the per-agent path request lockout
    pub fn with_path_lockout(mut self, seconds: f32) -> Self {
        self.path_request_lockout = seconds;
        self
    }

    /// Set how many path requests one poll may resolve
    pub fn with_path_budget(mut self, per_poll: usize) -> Self {
        self.max_path_requests_per_poll = per_poll;
        self
    }

    /// Set the simulated path latency
    pub fn with_path_latency(mut self, seconds: f32) -> Self {
        self.path_latency = seconds;
        self
    }

    /// Set cooldown and charge-up multipliers
    pub fn with_multipliers(mut self, cooldown: f32, charge_up: f32) -> Self {
        self.cooldown_multiplier = cooldown;
        self.charge_up_multiplier = charge_up;
        self
    }

    /// Set the transition policy
    pub fn with_transition_policy(mut self, policy: TransitionPolicy) -> Self {
        self.transition_policy = policy;
        self
    }

    /// Zero the movement intention when a path cannot be found
    pub fn with_clear_on_path_failure(mut self, clear: bool) -> Self {
        self.clear_intention_on_path_failure = clear;
        self
    }

    /// Scaled cooldown for a gated action
    #[must_use]
    pub fn cooldown(&self, seconds: f32) -> f64 {
        f64::from((seconds * self.cooldown_multiplier).max(0.0))
    }

    /// Scaled charge-up for a gated action
    #[must_use]
    pub fn charge_up(&self, seconds: f32) -> f64 {
        f64::from((seconds * self.charge_up_multiplier).max(0.0))
    }

    /// Load a configuration from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_ron(&content)
    }

    /// Parse a configuration from a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid configuration
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        ron::from_str(source).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Errors that can occur while loading configuration
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// IO error
    IoError(String),
    /// Parse error
    ParseError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::ParseError(e) => write!(f, "Config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
