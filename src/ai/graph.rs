//! Behavior graph definitions and loading
//!
//! Graphs are authored as data (RON or JSON) that refer to decisions, actions
//! and states by name. Loading resolves every name to an index and rejects
//! authoring errors, so nothing is looked up by name during a tick.
//!
//! # Example
//!
//! ```ignore
//! let graph = Arc::new(BehaviorGraph::load_ron("assets/graphs/chaser.ron")?);
//! let ctx = AgentContext::new(graph.clone(), spawn_point, 0.4);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::action::{Action, Composite, GatedAction, InstantAction};
use super::decision::{Decision, Operator, Term};
use super::state::{State, StateId, Target, Transition};

// ============================================================================
// Identifiers
// ============================================================================

/// Index of an action within its graph; also its cooldown-table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub(crate) u32);

impl ActionId {
    /// Position in the graph's action list
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a decision within its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecisionId(pub(crate) u32);

impl DecisionId {
    /// Position in the graph's decision list
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

// ============================================================================
// Definitions
// ============================================================================

/// Authored action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionDef {
    Gated(GatedAction),
    Instant(InstantAction),
    ConditionalAnd {
        decisions: Vec<String>,
        #[serde(default)]
        on_true: Option<String>,
        #[serde(default)]
        on_false: Option<String>,
    },
    ConditionalOr {
        decisions: Vec<String>,
        #[serde(default)]
        on_true: Option<String>,
        #[serde(default)]
        on_false: Option<String>,
    },
    Multi(Vec<String>),
}

/// Authored transition branch target
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StateRef {
    #[default]
    Remain,
    To(String),
}

/// Authored combinator term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermDef {
    pub decision: String,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub next: Option<Operator>,
}

impl TermDef {
    /// Plain term
    pub fn new(decision: impl Into<String>) -> Self {
        Self {
            decision: decision.into(),
            invert: false,
            next: None,
        }
    }

    /// Negate the term
    #[must_use]
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Join to the next term with AND
    #[must_use]
    pub fn and(mut self) -> Self {
        self.next = Some(Operator::And);
        self
    }

    /// Join to the next term with OR
    #[must_use]
    pub fn or(mut self) -> Self {
        self.next = Some(Operator::Or);
        self
    }
}

/// Authored transition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransitionDef {
    #[serde(default)]
    pub when: Vec<TermDef>,
    #[serde(default)]
    pub on_true: StateRef,
    #[serde(default)]
    pub on_false: StateRef,
}

impl TransitionDef {
    /// Transition over the given terms that remains in both branches
    pub fn new(when: Vec<TermDef>) -> Self {
        Self {
            when,
            ..Default::default()
        }
    }

    /// Switch to `state` when the terms hold
    #[must_use]
    pub fn then(mut self, state: impl Into<String>) -> Self {
        self.on_true = StateRef::To(state.into());
        self
    }

    /// Switch to `state` when they do not
    #[must_use]
    pub fn otherwise(mut self, state: impl Into<String>) -> Self {
        self.on_false = StateRef::To(state.into());
        self
    }
}

/// Authored state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateDef {
    pub name: String,
    #[serde(default)]
    pub enter: Vec<String>,
    #[serde(default)]
    pub update: Vec<String>,
    #[serde(default)]
    pub exit: Vec<String>,
    #[serde(default)]
    pub transitions: Vec<TransitionDef>,
}

impl StateDef {
    /// Empty state
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append to the enter list
    #[must_use]
    pub fn on_enter(mut self, action: impl Into<String>) -> Self {
        self.enter.push(action.into());
        self
    }

    /// Append to the update list
    #[must_use]
    pub fn on_update(mut self, action: impl Into<String>) -> Self {
        self.update.push(action.into());
        self
    }

    /// Append to the exit list
    #[must_use]
    pub fn on_exit(mut self, action: impl Into<String>) -> Self {
        self.exit.push(action.into());
        self
    }

    /// Append a transition
    #[must_use]
    pub fn transition(mut self, transition: TransitionDef) -> Self {
        self.transitions.push(transition);
        self
    }
}

/// A complete authored graph
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDef {
    pub name: String,
    pub initial: String,
    #[serde(default)]
    pub decisions: BTreeMap<String, Decision>,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDef>,
    #[serde(default)]
    pub states: Vec<StateDef>,
}

impl GraphDef {
    /// Empty graph starting in `initial`
    pub fn new(name: impl Into<String>, initial: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial: initial.into(),
            ..Default::default()
        }
    }

    /// Add a named decision
    #[must_use]
    pub fn decision(mut self, name: impl Into<String>, decision: Decision) -> Self {
        self.decisions.insert(name.into(), decision);
        self
    }

    /// Add a named action
    #[must_use]
    pub fn action(mut self, name: impl Into<String>, action: ActionDef) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    /// Add a state
    #[must_use]
    pub fn state(mut self, state: StateDef) -> Self {
        self.states.push(state);
        self
    }

    /// Serialize to pretty RON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_ron(&self) -> Result<String, GraphError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GraphError::SerializeError(e.to_string()))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Authoring and loading errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// IO error
    IoError(String),
    /// Serialization error
    SerializeError(String),
    /// Deserialization error
    DeserializeError(String),
    /// The graph has no states
    Empty,
    /// Two states share a name
    DuplicateState(String),
    /// The initial state does not exist
    MissingInitialState(String),
    /// A reference to an action that does not exist
    UnknownAction { name: String, referenced_by: String },
    /// A reference to a decision that does not exist
    UnknownDecision { name: String, referenced_by: String },
    /// A reference to a state that does not exist
    UnknownState { name: String, referenced_by: String },
    /// A composite action reaches itself
    CompositeCycle(String),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::SerializeError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
            Self::Empty => write!(f, "graph has no states"),
            Self::DuplicateState(name) => write!(f, "state '{name}' is defined twice"),
            Self::MissingInitialState(name) => write!(f, "initial state '{name}' does not exist"),
            Self::UnknownAction {
                name,
                referenced_by,
            } => write!(f, "unknown action '{name}' referenced by {referenced_by}"),
            Self::UnknownDecision {
                name,
                referenced_by,
            } => write!(f, "unknown decision '{name}' referenced by {referenced_by}"),
            Self::UnknownState {
                name,
                referenced_by,
            } => write!(f, "unknown state '{name}' referenced by {referenced_by}"),
            Self::CompositeCycle(name) => write!(f, "composite action '{name}' reaches itself"),
        }
    }
}

impl std::error::Error for GraphError {}

// ============================================================================
// Resolved graph
// ============================================================================

/// A validated, index-addressed behavior graph shared by many agents.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorGraph {
    name: String,
    initial: StateId,
    decisions: Vec<Decision>,
    decision_names: Vec<String>,
    actions: Vec<Action>,
    action_names: Vec<String>,
    states: Vec<State>,
    state_index: FxHashMap<String, StateId>,
}

struct Resolver<'a> {
    decisions: FxHashMap<&'a str, DecisionId>,
    actions: FxHashMap<&'a str, ActionId>,
    states: FxHashMap<&'a str, StateId>,
}

impl Resolver<'_> {
    fn decision(&self, name: &str, by: &str) -> Result<DecisionId, GraphError> {
        self.decisions
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownDecision {
                name: name.to_string(),
                referenced_by: by.to_string(),
            })
    }

    fn action(&self, name: &str, by: &str) -> Result<ActionId, GraphError> {
        self.actions
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownAction {
                name: name.to_string(),
                referenced_by: by.to_string(),
            })
    }

    fn actions(&self, names: &[String], by: &str) -> Result<Vec<ActionId>, GraphError> {
        names.iter().map(|n| self.action(n, by)).collect()
    }

    fn target(&self, target: &StateRef, by: &str) -> Result<Target, GraphError> {
        match target {
            StateRef::Remain => Ok(Target::Remain),
            StateRef::To(name) => self
                .states
                .get(name.as_str())
                .map(|&id| Target::State(id))
                .ok_or_else(|| GraphError::UnknownState {
                    name: name.clone(),
                    referenced_by: by.to_string(),
                }),
        }
    }
}

impl BehaviorGraph {
    /// Resolve and validate a definition
    ///
    /// # Errors
    ///
    /// Returns the first authoring error found
    pub fn from_def(def: GraphDef) -> Result<Self, GraphError> {
        if def.states.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut resolver = Resolver {
            decisions: FxHashMap::default(),
            actions: FxHashMap::default(),
            states: FxHashMap::default(),
        };
        for (i, name) in def.decisions.keys().enumerate() {
            resolver.decisions.insert(name.as_str(), DecisionId(i as u32));
        }
        for (i, name) in def.actions.keys().enumerate() {
            resolver.actions.insert(name.as_str(), ActionId(i as u32));
        }
        for (i, state) in def.states.iter().enumerate() {
            if resolver
                .states
                .insert(state.name.as_str(), StateId(i as u32))
                .is_some()
            {
                return Err(GraphError::DuplicateState(state.name.clone()));
            }
        }
        let initial = *resolver
            .states
            .get(def.initial.as_str())
            .ok_or_else(|| GraphError::MissingInitialState(def.initial.clone()))?;

        let mut actions = Vec::with_capacity(def.actions.len());
        for (name, action) in &def.actions {
            let by = format!("action '{name}'");
            let resolved = match action {
                ActionDef::Gated(gated) => Action::Gated(gated.clone()),
                ActionDef::Instant(instant) => Action::Instant(instant.clone()),
                ActionDef::ConditionalAnd {
                    decisions,
                    on_true,
                    on_false,
                } => Action::Composite(Composite::ConditionalAnd {
                    decisions: decisions
                        .iter()
                        .map(|d| resolver.decision(d, &by))
                        .collect::<Result<_, _>>()?,
                    on_true: on_true.as_deref().map(|a| resolver.action(a, &by)).transpose()?,
                    on_false: on_false.as_deref().map(|a| resolver.action(a, &by)).transpose()?,
                }),
                ActionDef::ConditionalOr {
                    decisions,
                    on_true,
                    on_false,
                } => Action::Composite(Composite::ConditionalOr {
                    decisions: decisions
                        .iter()
                        .map(|d| resolver.decision(d, &by))
                        .collect::<Result<_, _>>()?,
                    on_true: on_true.as_deref().map(|a| resolver.action(a, &by)).transpose()?,
                    on_false: on_false.as_deref().map(|a| resolver.action(a, &by)).transpose()?,
                }),
                ActionDef::Multi(children) => {
                    Action::Composite(Composite::Multi(resolver.actions(children, &by)?))
                }
            };
            actions.push(resolved);
        }

        let mut states = Vec::with_capacity(def.states.len());
        for state in &def.states {
            let by = format!("state '{}'", state.name);
            let transitions = state
                .transitions
                .iter()
                .map(|t| {
                    let conditions = t
                        .when
                        .iter()
                        .map(|term| {
                            Ok(Term {
                                decision: resolver.decision(&term.decision, &by)?,
                                invert: term.invert,
                                next: term.next,
                            })
                        })
                        .collect::<Result<Vec<_>, GraphError>>()?;
                    Ok(Transition {
                        conditions,
                        on_true: resolver.target(&t.on_true, &by)?,
                        on_false: resolver.target(&t.on_false, &by)?,
                    })
                })
                .collect::<Result<Vec<_>, GraphError>>()?;

            states.push(State {
                name: state.name.clone(),
                enter: resolver.actions(&state.enter, &by)?,
                update: resolver.actions(&state.update, &by)?,
                exit: resolver.actions(&state.exit, &by)?,
                transitions,
            });
        }

        let state_index = resolver
            .states
            .iter()
            .map(|(name, id)| ((*name).to_string(), *id))
            .collect();

        let graph = Self {
            name: def.name.clone(),
            initial,
            decisions: def.decisions.values().cloned().collect(),
            decision_names: def.decisions.keys().cloned().collect(),
            actions,
            action_names: def.actions.keys().cloned().collect(),
            states,
            state_index,
        };
        graph.check_cycles()?;

        log::debug!(
            "loaded graph '{}': {} states, {} actions, {} decisions",
            graph.name,
            graph.states.len(),
            graph.actions.len(),
            graph.decisions.len()
        );
        Ok(graph)
    }

    /// Reject composites that can execute themselves
    fn check_cycles(&self) -> Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(
            graph: &BehaviorGraph,
            id: ActionId,
            marks: &mut [Mark],
        ) -> Result<(), GraphError> {
            match marks[id.index()] {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    return Err(GraphError::CompositeCycle(
                        graph.action_names[id.index()].clone(),
                    ));
                }
                Mark::New => {}
            }
            marks[id.index()] = Mark::Active;
            if let Action::Composite(composite) = &graph.actions[id.index()] {
                for child in composite.children() {
                    visit(graph, child, marks)?;
                }
            }
            marks[id.index()] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::New; self.actions.len()];
        for i in 0..self.actions.len() {
            visit(self, ActionId(i as u32), &mut marks)?;
        }
        Ok(())
    }

    /// Parse and validate a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails
    pub fn from_ron_str(source: &str) -> Result<Self, GraphError> {
        let def: GraphDef =
            ron::from_str(source).map_err(|e| GraphError::DeserializeError(e.to_string()))?;
        Self::from_def(def)
    }

    /// Parse and validate a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails
    pub fn from_json_str(source: &str) -> Result<Self, GraphError> {
        let def: GraphDef = serde_json::from_str(source)
            .map_err(|e| GraphError::DeserializeError(e.to_string()))?;
        Self::from_def(def)
    }

    /// Load a graph from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let content = fs::read_to_string(path).map_err(|e| GraphError::IoError(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Load a graph from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let content = fs::read_to_string(path).map_err(|e| GraphError::IoError(e.to_string()))?;
        Self::from_json_str(&content)
    }

    /// Graph name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initial state
    #[must_use]
    pub fn initial(&self) -> StateId {
        self.initial
    }

    /// State template by id
    #[must_use]
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }

    /// State id by name
    #[must_use]
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.state_index.get(name).copied()
    }

    /// Number of states
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Action template by id
    #[must_use]
    pub fn action(&self, id: ActionId) -> &Action {
        &self.actions[id.index()]
    }

    /// Action id by name
    #[must_use]
    pub fn action_id(&self, name: &str) -> Option<ActionId> {
        self.action_names
            .iter()
            .position(|n| n == name)
            .map(|i| ActionId(i as u32))
    }

    /// Action name by id
    #[must_use]
    pub fn action_name(&self, id: ActionId) -> &str {
        &self.action_names[id.index()]
    }

    /// Decision template by id
    #[must_use]
    pub fn decision(&self, id: DecisionId) -> &Decision {
        &self.decisions[id.index()]
    }

    /// Decision id by name
    #[must_use]
    pub fn decision_id(&self, name: &str) -> Option<DecisionId> {
        self.decision_names
            .iter()
            .position(|n| n == name)
            .map(|i| DecisionId(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::action::{GatedEffect, RearmPolicy};
    use crate::ai::steering::SteeringKind;

    const CHASER: &str = include_str!("../../assets/graphs/chaser.ron");

    fn two_states() -> GraphDef {
        GraphDef::new("test", "Idle")
            .decision("near", Decision::TargetWithinRange { range: 2.0 })
            .action("stop", ActionDef::Instant(InstantAction::Stop))
            .state(
                StateDef::new("Idle")
                    .on_enter("stop")
                    .transition(TransitionDef::new(vec![TermDef::new("near")]).then("Hunt")),
            )
            .state(StateDef::new("Hunt"))
    }

    #[test]
    fn test_resolves_names() {
        let graph = BehaviorGraph::from_def(two_states()).unwrap();

        let idle = graph.state_id("Idle").unwrap();
        let hunt = graph.state_id("Hunt").unwrap();
        assert_eq!(graph.initial(), idle);
        assert_eq!(graph.state(idle).enter_actions(), &[graph.action_id("stop").unwrap()]);

        let transition = &graph.state(idle).transitions()[0];
        assert_eq!(transition.on_true, Target::State(hunt));
        assert_eq!(transition.on_false, Target::Remain);
        assert_eq!(
            transition.conditions[0].decision,
            graph.decision_id("near").unwrap()
        );
    }

    #[test]
    fn test_unknown_action_rejected() {
        let def = two_states().state(StateDef::new("Broken").on_update("fly"));
        let err = BehaviorGraph::from_def(def).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownAction {
                name: "fly".into(),
                referenced_by: "state 'Broken'".into(),
            }
        );
    }

    #[test]
    fn test_unknown_decision_and_state_rejected() {
        let def = two_states().state(
            StateDef::new("Broken")
                .transition(TransitionDef::new(vec![TermDef::new("far")]).then("Hunt")),
        );
        assert!(matches!(
            BehaviorGraph::from_def(def),
            Err(GraphError::UnknownDecision { .. })
        ));

        let def = two_states().state(
            StateDef::new("Broken")
                .transition(TransitionDef::new(vec![TermDef::new("near")]).then("Sleep")),
        );
        assert!(matches!(
            BehaviorGraph::from_def(def),
            Err(GraphError::UnknownState { .. })
        ));
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(
            BehaviorGraph::from_def(GraphDef::new("empty", "Idle")),
            Err(GraphError::Empty)
        );
        assert_eq!(
            BehaviorGraph::from_def(two_states().state(StateDef::new("Idle"))),
            Err(GraphError::DuplicateState("Idle".into()))
        );
        let mut def = two_states();
        def.initial = "Nowhere".into();
        assert_eq!(
            BehaviorGraph::from_def(def),
            Err(GraphError::MissingInitialState("Nowhere".into()))
        );
    }

    #[test]
    fn test_composite_cycle_rejected() {
        let def = two_states()
            .action("a", ActionDef::Multi(vec!["b".into()]))
            .action("b", ActionDef::Multi(vec!["stop".into(), "a".into()]));
        assert!(matches!(
            BehaviorGraph::from_def(def),
            Err(GraphError::CompositeCycle(_))
        ));

        // sharing a child is not a cycle
        let def = two_states()
            .action("a", ActionDef::Multi(vec!["stop".into(), "stop".into()]))
            .action("b", ActionDef::Multi(vec!["a".into(), "stop".into()]));
        assert!(BehaviorGraph::from_def(def).is_ok());
    }

    #[test]
    fn test_chaser_asset_loads() {
        let graph = BehaviorGraph::from_ron_str(CHASER).unwrap();
        assert_eq!(graph.name(), "chaser");
        assert!(graph.state_id("Wander").is_some());
        assert!(graph.state_id("Chase").is_some());
        assert!(graph.state_id("Attack").is_some());

        let bite = graph.action_id("bite").unwrap();
        let Action::Gated(gated) = graph.action(bite) else {
            panic!("bite should be gated");
        };
        assert_eq!(gated.rearm, RearmPolicy::AfterCooldown);
        assert!(matches!(gated.effect, GatedEffect::Attack { .. }));

        let steer = graph.action_id("steer").unwrap();
        let Action::Instant(InstantAction::Steer { behaviors }) = graph.action(steer) else {
            panic!("steer should be instant");
        };
        assert!(behaviors.contains(&SteeringKind::Seek));
    }

    #[test]
    fn test_ron_round_trip_of_definition() {
        let def = two_states();
        let text = def.to_ron().unwrap();
        let graph = BehaviorGraph::from_ron_str(&text).unwrap();
        assert_eq!(graph, BehaviorGraph::from_def(def).unwrap());
    }

    #[test]
    fn test_json_definition() {
        let json = r#"{
            "name": "json",
            "initial": "Idle",
            "decisions": { "always": { "Constant": true } },
            "actions": { "halt": { "Instant": "Stop" } },
            "states": [
                {
                    "name": "Idle",
                    "update": ["halt"],
                    "transitions": [
                        {
                            "when": [{ "decision": "always", "invert": true }],
                            "on_false": { "To": "Idle" }
                        }
                    ]
                }
            ]
        }"#;
        let graph = BehaviorGraph::from_json_str(json).unwrap();
        let idle = graph.state_id("Idle").unwrap();
        assert_eq!(graph.state(idle).transitions()[0].on_false, Target::State(idle));
        assert!(graph.state(idle).transitions()[0].conditions[0].invert);
    }
}
