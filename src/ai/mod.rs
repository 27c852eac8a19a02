//! Behavior engine for autonomous agents
//!
//! Data-driven finite state machines built from decisions and actions, with
//! cooldown-gated effects, rate-limited pathfinding and context steering.

mod action;
mod blackboard;
mod context;
mod cooldown;
mod decision;
mod follow;
mod fsm;
mod graph;
mod pathfinding;
mod services;
mod state;
mod steering;
mod system;

pub use action::{
    Action, Composite, GatedAction, GatedEffect, InstantAction, Outcome, PathTarget, RearmPolicy,
    TargetSlot, execute,
};
pub use blackboard::{Blackboard, BlackboardError, BlackboardValue, ObserverList, ValueKind};
pub use context::{AgentContext, DodgeFlags};
pub use cooldown::{CooldownTable, GatedTask, TaskPhase, TaskSet};
pub use decision::{Comparison, Decision, Operator, Term, combine};
pub use follow::{FollowHandle, FollowStep, Path, PathData};
pub use fsm::TickContext;
pub use graph::{
    ActionDef, ActionId, BehaviorGraph, DecisionId, GraphDef, GraphError, StateDef, StateRef,
    TermDef, TransitionDef,
};
pub use pathfinding::{Cell, Grid, PathGrid, PathService};
pub use services::{LayerMask, WorldServices};
pub use state::{State, StateId, Target, Transition};
pub use steering::{
    AiData, AllySeparation, ContextMap, DIRECTIONS, ObstacleAvoidance, Scores, Seek,
    SteeringBehavior, SteeringKind, solve, solve_map,
};
pub use system::AiSystem;
