//! World services consumed by the AI core
//!
//! Physics, population and gameplay effects are owned by the host game. The
//! AI only sees their query results through [`WorldServices`], passed into
//! every tick instead of being looked up from globals.

use glam::Vec2;
use hecs::Entity;
use serde::{Deserialize, Serialize};

/// Bit mask selecting collision layers for casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Every layer
    pub const ALL: Self = Self(u32::MAX);
    /// No layer
    pub const NONE: Self = Self(0);

    /// Mask for a single layer index
    #[must_use]
    pub const fn layer(index: u32) -> Self {
        Self(1 << index)
    }

    /// Whether this mask shares a layer with `other`
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Capabilities the host game provides to the AI.
pub trait WorldServices {
    /// The entity agents hunt (usually the player)
    fn target(&self) -> Option<Entity>;

    /// World position of an entity, if it still exists
    fn position_of(&self, entity: Entity) -> Option<Vec2>;

    /// Position of [`WorldServices::target`]
    fn target_position(&self) -> Option<Vec2> {
        self.target().and_then(|e| self.position_of(e))
    }

    /// Whether a ray hits anything on `layers` within `range`
    fn raycast(&self, origin: Vec2, direction: Vec2, range: f32, layers: LayerMask) -> bool;

    /// Whether a circle of `radius` swept along `direction` hits anything
    fn circlecast(
        &self,
        origin: Vec2,
        radius: f32,
        direction: Vec2,
        range: f32,
        layers: LayerMask,
    ) -> bool;

    /// Obstacle points within `radius` of `position`
    fn obstacles_near(&self, position: Vec2, radius: f32) -> Vec<Vec2>;

    /// Allied agents currently alive in the room
    fn living_allies(&self) -> Vec<Entity>;

    /// Play an opaque gameplay effect on a list of targets
    fn play(&mut self, effect: &str, targets: &[Entity]);
}
