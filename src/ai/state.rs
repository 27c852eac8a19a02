//! States and transitions
//!
//! States are shared templates: the action and transition lists never change
//! after loading, and no per-agent data is stored here.

use super::context::AgentContext;
use super::decision::{self, Term};
use super::fsm::TickContext;
use super::graph::{ActionId, BehaviorGraph};

/// Index of a state within its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub(crate) u32);

impl StateId {
    /// Position in the graph's state list
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a transition branch leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Stay in the current state
    Remain,
    /// Switch to a state
    State(StateId),
}

/// Combinator bound to a pair of targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Signed decision terms
    pub conditions: Vec<Term>,
    /// Target when the conditions hold
    pub on_true: Target,
    /// Target when they do not
    pub on_false: Target,
}

impl Transition {
    /// Target state for a combinator result, if the branch switches
    #[must_use]
    pub fn decide(&self, result: bool) -> Option<StateId> {
        let branch = if result { self.on_true } else { self.on_false };
        match branch {
            Target::Remain => None,
            Target::State(id) => Some(id),
        }
    }

    /// Evaluate the combinator and return the state to switch to
    pub fn execute(
        &self,
        graph: &BehaviorGraph,
        ctx: &AgentContext,
        tc: &TickContext<'_>,
    ) -> Option<StateId> {
        let result = decision::combine(&self.conditions, |id| {
            graph.decision(id).evaluate(ctx, tc)
        });
        self.decide(result)
    }
}

/// A state template
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub(crate) name: String,
    pub(crate) enter: Vec<ActionId>,
    pub(crate) update: Vec<ActionId>,
    pub(crate) exit: Vec<ActionId>,
    pub(crate) transitions: Vec<Transition>,
}

impl State {
    /// State name for debugging and logging
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Actions run once on entry
    #[must_use]
    pub fn enter_actions(&self) -> &[ActionId] {
        &self.enter
    }

    /// Actions run every tick
    #[must_use]
    pub fn update_actions(&self) -> &[ActionId] {
        &self.update
    }

    /// Actions run once on exit
    #[must_use]
    pub fn exit_actions(&self) -> &[ActionId] {
        &self.exit
    }

    /// Transitions in evaluation order
    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Every action referenced by the three lists
    pub fn actions(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.enter
            .iter()
            .chain(&self.update)
            .chain(&self.exit)
            .copied()
    }
}
