//! Context steering
//!
//! Each behavior scores the eight compass directions with a *danger* and an
//! *interest* value. Behaviors fold their scores in with a per-direction
//! maximum, so overlapping threats are not counted twice. The solver then
//! subtracts danger from interest and returns the normalized weighted sum of
//! directions, or zero if nothing is left.
//!
//! # Example
//!
//! ```ignore
//! let behaviors: [&dyn SteeringBehavior; 2] = [
//!     &Seek,
//!     &ObstacleAvoidance { radius: 2.0 },
//! ];
//! let direction = steering::solve(&behaviors, &data);
//! ```

use std::f32::consts::FRAC_1_SQRT_2;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Number of sampled directions
pub const DIRECTION_COUNT: usize = 8;

/// Unit compass directions: N, NE, E, SE, S, SW, W, NW
pub const DIRECTIONS: [Vec2; DIRECTION_COUNT] = [
    Vec2::new(0.0, 1.0),
    Vec2::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    Vec2::new(1.0, 0.0),
    Vec2::new(FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
    Vec2::new(0.0, -1.0),
    Vec2::new(-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
    Vec2::new(-1.0, 0.0),
    Vec2::new(-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
];

/// Per-direction scores
pub type Scores = [f32; DIRECTION_COUNT];

/// Sensor snapshot a steering behavior reads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiData {
    /// Agent position
    pub position: Vec2,
    /// Agent collision radius
    pub collider_radius: f32,
    /// Point the agent wants to reach
    pub target: Option<Vec2>,
    /// Nearby obstacle points
    pub obstacles: Vec<Vec2>,
    /// Nearby ally positions, excluding the agent itself
    pub allies: Vec<Vec2>,
}

/// A contributor to the danger and interest maps
pub trait SteeringBehavior {
    /// Return the maps with this behavior's contribution folded in
    fn get_steering(&self, danger: Scores, interest: Scores, data: &AiData) -> (Scores, Scores);
}

/// Danger around obstacle points within `radius`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleAvoidance {
    /// Distance at which obstacles start to matter
    pub radius: f32,
}

/// Interest toward the target
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Seek;

/// Danger around living allies within `radius`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllySeparation {
    /// Distance at which allies start to matter
    pub radius: f32,
}

/// Fold danger from a set of points: full weight inside the collider, fading
/// linearly to zero at `radius`.
fn avoid_points(danger: &mut Scores, points: &[Vec2], radius: f32, data: &AiData) {
    for &point in points {
        let offset = point - data.position;
        let distance = offset.length();
        let weight = if distance <= data.collider_radius {
            1.0
        } else if radius > 0.0 {
            ((radius - distance) / radius).clamp(0.0, 1.0)
        } else {
            0.0
        };
        if weight == 0.0 {
            continue;
        }

        let toward = offset.normalize_or_zero();
        for (score, direction) in danger.iter_mut().zip(DIRECTIONS) {
            *score = score.max(toward.dot(direction) * weight);
        }
    }
}

impl SteeringBehavior for ObstacleAvoidance {
    fn get_steering(
        &self,
        mut danger: Scores,
        interest: Scores,
        data: &AiData,
    ) -> (Scores, Scores) {
        avoid_points(&mut danger, &data.obstacles, self.radius, data);
        (danger, interest)
    }
}

impl SteeringBehavior for AllySeparation {
    fn get_steering(
        &self,
        mut danger: Scores,
        interest: Scores,
        data: &AiData,
    ) -> (Scores, Scores) {
        avoid_points(&mut danger, &data.allies, self.radius, data);
        (danger, interest)
    }
}

impl SteeringBehavior for Seek {
    fn get_steering(
        &self,
        danger: Scores,
        mut interest: Scores,
        data: &AiData,
    ) -> (Scores, Scores) {
        let Some(target) = data.target else {
            return (danger, interest);
        };
        let toward = (target - data.position).normalize_or_zero();
        for (score, direction) in interest.iter_mut().zip(DIRECTIONS) {
            *score = score.max(toward.dot(direction));
        }
        (danger, interest)
    }
}

/// Data-authored steering behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SteeringKind {
    ObstacleAvoidance { radius: f32 },
    Seek,
    AllySeparation { radius: f32 },
}

impl SteeringKind {
    /// Sensing distance this behavior needs
    #[must_use]
    pub fn reach(&self) -> f32 {
        match self {
            Self::ObstacleAvoidance { radius } | Self::AllySeparation { radius } => *radius,
            Self::Seek => 0.0,
        }
    }
}

impl SteeringBehavior for SteeringKind {
    fn get_steering(&self, danger: Scores, interest: Scores, data: &AiData) -> (Scores, Scores) {
        match *self {
            Self::ObstacleAvoidance { radius } => {
                ObstacleAvoidance { radius }.get_steering(danger, interest, data)
            }
            Self::Seek => Seek.get_steering(danger, interest, data),
            Self::AllySeparation { radius } => {
                AllySeparation { radius }.get_steering(danger, interest, data)
            }
        }
    }
}

/// Merged danger and interest for one solver call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContextMap {
    pub danger: Scores,
    pub interest: Scores,
}

impl ContextMap {
    /// Interest left after subtracting danger, clamped to `[0, 1]`
    #[must_use]
    pub fn masked(&self) -> Scores {
        let mut out = [0.0; DIRECTION_COUNT];
        for (i, value) in out.iter_mut().enumerate() {
            *value = (self.interest[i] - self.danger[i]).clamp(0.0, 1.0);
        }
        out
    }

    /// Normalized direction, or zero if every masked interest is zero
    #[must_use]
    pub fn direction(&self) -> Vec2 {
        let sum = self
            .masked()
            .iter()
            .zip(DIRECTIONS)
            .fold(Vec2::ZERO, |acc, (&weight, direction)| acc + direction * weight);
        sum.normalize_or_zero()
    }
}

/// Run every behavior in order and return the merged maps
#[must_use]
pub fn solve_map(behaviors: &[&dyn SteeringBehavior], data: &AiData) -> ContextMap {
    let mut map = ContextMap::default();
    for behavior in behaviors {
        (map.danger, map.interest) = behavior.get_steering(map.danger, map.interest, data);
    }
    map
}

/// Solve for a movement direction
#[must_use]
pub fn solve(behaviors: &[&dyn SteeringBehavior], data: &AiData) -> Vec2 {
    solve_map(behaviors, data).direction()
}
