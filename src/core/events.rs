//! Event Queue for AI Notifications
//!
//! Presentation hooks (animation, mirroring, sound) and lifecycle notifications
//! are fire-and-forget: the AI core pushes them here and never reads a result.
//! The queue is double-buffered so consumers see a frame-consistent batch.
//!
//! # Example
//!
//! ```ignore
//! system.update(&mut world, &mut services, dt);
//!
//! for event in system.events().iter() {
//!     if let AiEvent::Presentation { agent, hook } = event {
//!         animator.trigger(*agent, hook);
//!     }
//! }
//! ```

use std::collections::VecDeque;

use hecs::Entity;

use crate::ai::StateId;

// ============================================================================
// Event Types
// ============================================================================

/// Notifications emitted by the AI core.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AiEvent {
    /// An agent left one state and entered another.
    StateChanged {
        /// The agent
        agent: Entity,
        /// State that was exited
        from: StateId,
        /// State that was entered
        to: StateId,
    },

    /// A presentation hook was fired by an action.
    Presentation {
        /// The agent
        agent: Entity,
        /// Hook name, interpreted by the presentation layer
        hook: String,
    },

    /// A gameplay effect was played.
    EffectPlayed {
        /// The agent that played the effect
        agent: Entity,
        /// Effect name
        effect: String,
        /// Number of targets the effect was played on
        targets: usize,
    },

    /// A path was delivered and a new follow task started.
    PathInstalled {
        /// The agent
        agent: Entity,
        /// Number of waypoints in the path
        waypoints: usize,
    },

    /// A path request could not be satisfied.
    PathFailed {
        /// The agent
        agent: Entity,
    },
}

// ============================================================================
// Event Queue
// ============================================================================

/// Double-buffered event queue.
///
/// Events pushed during an update become readable through [`EventQueue::iter`]
/// once that update swaps the buffers, and stay readable until the next swap.
#[derive(Debug)]
pub struct EventQueue {
    /// Events being written this frame
    pending: VecDeque<AiEvent>,
    /// Events from previous frame, ready for processing
    processing: VecDeque<AiEvent>,
}

impl EventQueue {
    /// Default initial capacity for event queues.
    const DEFAULT_CAPACITY: usize = 64;

    /// Create a new event queue with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a new event queue with specified initial capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(capacity),
            processing: VecDeque::with_capacity(capacity),
        }
    }

    /// Push an event to be processed next frame.
    #[inline]
    pub fn push(&mut self, event: AiEvent) {
        self.pending.push_back(event);
    }

    /// Swap the pending and processing queues.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.pending, &mut self.processing);
        self.pending.clear();
    }

    /// Iterate over events from the previous frame.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &AiEvent> {
        self.processing.iter()
    }

    /// Iterate over events pushed since the last swap.
    #[inline]
    pub fn iter_pending(&self) -> impl Iterator<Item = &AiEvent> {
        self.pending.iter()
    }

    /// Drain all events from the previous frame.
    #[inline]
    pub fn drain(&mut self) -> impl Iterator<Item = AiEvent> + '_ {
        self.processing.drain(..)
    }

    /// Check if there are any events to process.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.processing.is_empty()
    }

    /// Get the number of events ready for processing.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.processing.len()
    }

    /// Get the number of events pending for next frame.
    #[must_use]
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Clear all events (both pending and processing).
    pub fn clear(&mut self) {
        self.pending.clear();
        self.processing.clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
