//! Per-agent runtime record
//!
//! Everything an FSM instance mutates lives here; graph templates stay shared
//! and read-only.

use std::sync::Arc;

use glam::Vec2;
use hecs::Entity;

use super::blackboard::Blackboard;
use super::cooldown::{CooldownTable, TaskSet};
use super::follow::{FollowStep, PathData};
use super::graph::{ActionId, BehaviorGraph};
use super::state::StateId;

/// Dodge request flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DodgeFlags {
    /// The agent is allowed to dodge
    pub can_dodge: bool,
    /// Something asked the agent to dodge
    pub need_to_dodge: bool,
}

/// Runtime state of one agent's behavior FSM.
///
/// Stored as a component on the agent's entity, so it is created with the
/// agent and dropped with it.
#[derive(Debug, Clone)]
pub struct AgentContext {
    graph: Arc<BehaviorGraph>,
    pub(crate) current_state: StateId,
    pub(crate) entered: bool,
    pub(crate) state_entered_at: f64,
    pub(crate) cooldowns: CooldownTable,
    pub(crate) tasks: TaskSet,
    movement_intention: Vec2,
    /// Inter-action storage
    pub blackboard: Blackboard,
    /// Current path and follow task
    pub path_data: PathData,
    /// Dodge flags
    pub dodge: DodgeFlags,
    /// Entity the agent navigates toward
    pub pathfinding_target: Option<Entity>,
    /// Entity the agent attacks
    pub attack_target: Option<Entity>,
    /// World position, written by the host each frame
    pub position: Vec2,
    /// Collision radius used by steering
    pub collider_radius: f32,
}

impl AgentContext {
    /// Create a context sitting in the graph's initial state.
    ///
    /// The state is entered on the first update.
    #[must_use]
    pub fn new(graph: Arc<BehaviorGraph>, position: Vec2, collider_radius: f32) -> Self {
        let initial = graph.initial();
        Self::with_initial_state(graph, initial, position, collider_radius)
    }

    /// Create a context with an externally chosen initial state
    #[must_use]
    pub fn with_initial_state(
        graph: Arc<BehaviorGraph>,
        initial: StateId,
        position: Vec2,
        collider_radius: f32,
    ) -> Self {
        Self {
            graph,
            current_state: initial,
            entered: false,
            state_entered_at: 0.0,
            cooldowns: CooldownTable::new(),
            tasks: TaskSet::new(),
            movement_intention: Vec2::ZERO,
            blackboard: Blackboard::new(),
            path_data: PathData::new(),
            dodge: DodgeFlags::default(),
            pathfinding_target: None,
            attack_target: None,
            position,
            collider_radius,
        }
    }

    /// The behavior graph this agent runs
    #[must_use]
    pub fn graph(&self) -> &Arc<BehaviorGraph> {
        &self.graph
    }

    /// Current state
    #[must_use]
    pub fn current_state(&self) -> StateId {
        self.current_state
    }

    /// Name of the current state
    #[must_use]
    pub fn current_state_name(&self) -> &str {
        self.graph.state(self.current_state).name()
    }

    /// Check if the agent is in the state with the given name
    #[must_use]
    pub fn is_in_state(&self, name: &str) -> bool {
        self.current_state_name() == name
    }

    /// Whether the current state has been entered
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.entered
    }

    /// Simulation time at which the current state was entered
    #[must_use]
    pub fn state_entered_at(&self) -> f64 {
        self.state_entered_at
    }

    /// Direction the agent wants to move in
    #[must_use]
    pub fn movement_intention(&self) -> Vec2 {
        self.movement_intention
    }

    /// Movement sink
    pub fn set_movement_intention(&mut self, intention: Vec2) {
        self.movement_intention = intention;
    }

    /// Whether the gated action may start
    #[must_use]
    pub fn is_action_ready(&self, action: ActionId) -> bool {
        self.cooldowns.is_ready(action)
    }

    /// Cooldown table, read-only
    #[must_use]
    pub fn cooldowns(&self) -> &CooldownTable {
        &self.cooldowns
    }

    /// Pending gated-action tasks
    #[must_use]
    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    /// Install a new path, superseding the running follow task
    pub fn install_path(&mut self, waypoints: Vec<Vec2>) {
        self.path_data.install(waypoints);
    }

    /// Cancel path following and stop moving
    pub fn stop(&mut self) {
        self.path_data.cancel();
        self.movement_intention = Vec2::ZERO;
    }

    /// Step the follow task, writing the movement intention
    pub fn step_follow(&mut self, buffer: f32) {
        match self.path_data.step(self.position, buffer) {
            FollowStep::Idle => {}
            FollowStep::Moving(direction) => self.movement_intention = direction,
            FollowStep::Finished => self.movement_intention = Vec2::ZERO,
        }
    }
}
