//! Finite state machine driver
//!
//! Runs the lifecycle of a data-driven state machine: enter the initial
//! state, then every tick resume due gated bodies, step path following, run
//! the update actions and evaluate transitions. A switch cancels pending
//! charge-ups started from the old state, runs its exit actions and enters
//! the new one. Exit actions therefore keep their own charge-ups.
//!
//! # Example
//!
//! ```ignore
//! let mut tc = TickContext {
//!     agent,
//!     now: time.elapsed(),
//!     dt: time.delta_seconds(),
//!     config: &config,
//!     services: &mut world_services,
//!     paths: &mut paths,
//!     events: &mut events,
//! };
//! ctx.update(&mut tc); // may switch states
//! ```

use std::sync::Arc;

use hecs::Entity;

use super::action::{self, Action};
use super::context::AgentContext;
use super::graph::BehaviorGraph;
use super::pathfinding::PathService;
use super::services::WorldServices;
use super::state::StateId;
use crate::core::{AiEvent, BrainConfig, EventQueue, TransitionPolicy};

// ============================================================================
// Tick Context
// ============================================================================

/// Everything a decision or action may touch besides its own agent.
pub struct TickContext<'a> {
    /// The agent being ticked
    pub agent: Entity,
    /// Simulation time in seconds
    pub now: f64,
    /// Frame delta in seconds
    pub dt: f32,
    /// Tuning
    pub config: &'a BrainConfig,
    /// Host world queries and effects
    pub services: &'a mut dyn WorldServices,
    /// Shared pathfinding queue
    pub paths: &'a mut PathService,
    /// Outgoing notifications
    pub events: &'a mut EventQueue,
}

// ============================================================================
// Lifecycle
// ============================================================================

impl AgentContext {
    /// Enter the current state if it has not been entered yet.
    ///
    /// Called implicitly by the first [`AgentContext::update`].
    pub fn start(&mut self, tc: &mut TickContext<'_>) {
        if self.entered {
            return;
        }
        let graph = Arc::clone(self.graph());
        self.enter(&graph, self.current_state, tc);
    }

    /// Advance the state machine by one tick.
    pub fn update(&mut self, tc: &mut TickContext<'_>) {
        let graph = Arc::clone(self.graph());
        if !self.entered {
            self.enter(&graph, self.current_state, tc);
        }

        action::resume_due(&graph, self, tc);
        self.step_follow(tc.config.waypoint_buffer);

        let state = graph.state(self.current_state);
        for &id in state.update_actions() {
            action::execute(&graph, id, self, tc);
        }

        match tc.config.transition_policy {
            TransitionPolicy::Snapshot => {
                for transition in state.transitions() {
                    if let Some(next) = transition.execute(&graph, self, tc) {
                        self.switch(&graph, next, tc);
                        break;
                    }
                }
            }
            TransitionPolicy::Sequential => {
                // later transitions see, and switch away from, the state an
                // earlier one entered
                for transition in state.transitions() {
                    if let Some(next) = transition.execute(&graph, self, tc) {
                        self.switch(&graph, next, tc);
                    }
                }
            }
        }
    }

    /// Switch to `to` immediately, running exit and enter actions
    pub fn force_transition(&mut self, to: StateId, tc: &mut TickContext<'_>) {
        let graph = Arc::clone(self.graph());
        if self.entered {
            self.switch(&graph, to, tc);
        } else {
            self.current_state = to;
            self.enter(&graph, to, tc);
        }
    }

    fn enter(&mut self, graph: &BehaviorGraph, state: StateId, tc: &mut TickContext<'_>) {
        self.entered = true;
        self.state_entered_at = tc.now;

        let template = graph.state(state);
        for id in template.actions() {
            if matches!(graph.action(id), Action::Gated(_)) {
                self.cooldowns.ensure(id);
            }
        }
        for &id in template.enter_actions() {
            action::execute(graph, id, self, tc);
        }
    }

    fn switch(&mut self, graph: &BehaviorGraph, to: StateId, tc: &mut TickContext<'_>) {
        let from = self.current_state;
        action::cancel_for_exit(graph, from, self);
        for &id in graph.state(from).exit_actions() {
            action::execute(graph, id, self, tc);
        }

        log::debug!(
            "{:?}: {} -> {}",
            tc.agent,
            graph.state(from).name(),
            graph.state(to).name()
        );
        self.current_state = to;
        tc.events.push(AiEvent::StateChanged {
            agent: tc.agent,
            from,
            to,
        });
        self.enter(graph, to, tc);
    }
}

// ============================================================================
// Test Harness
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! Single-agent harness wiring a context to a scripted world.

    use std::sync::Arc;

    use glam::Vec2;
    use hecs::Entity;

    use super::TickContext;
    use crate::ai::context::AgentContext;
    use crate::ai::graph::BehaviorGraph;
    use crate::ai::pathfinding::{Grid, PathService};
    use crate::ai::services::testing::FakeWorld;
    use crate::core::{BrainConfig, EventQueue, Time};

    pub struct Harness {
        pub ctx: AgentContext,
        pub world: FakeWorld,
        pub paths: PathService,
        pub events: EventQueue,
        pub config: BrainConfig,
        pub time: Time,
        pub agent: Entity,
        pub player: Entity,
        entities: hecs::World,
    }

    impl Harness {
        /// Agent at the origin, player ten units along +X
        pub fn new(graph: Arc<BehaviorGraph>) -> Self {
            let mut entities = hecs::World::new();
            let agent = entities.spawn(());
            let player = entities.spawn(());
            Self {
                ctx: AgentContext::new(graph, Vec2::ZERO, 0.5),
                world: FakeWorld::with_target(player, Vec2::new(10.0, 0.0)),
                paths: PathService::new(Grid::new(20, 20, 1.0)),
                events: EventQueue::new(),
                config: BrainConfig::default(),
                time: Time::new(),
                agent,
                player,
                entities,
            }
        }

        pub fn with_config(mut self, config: BrainConfig) -> Self {
            self.config = config;
            self
        }

        pub fn spawn_entity(&mut self) -> Entity {
            self.entities.spawn(())
        }

        pub fn advance(&mut self, dt: f32) {
            self.time.advance(dt);
        }

        pub fn run<R>(
            &mut self,
            f: impl FnOnce(&mut AgentContext, &mut TickContext<'_>) -> R,
        ) -> R {
            let mut tc = TickContext {
                agent: self.agent,
                now: self.time.elapsed(),
                dt: self.time.delta_seconds(),
                config: &self.config,
                services: &mut self.world,
                paths: &mut self.paths,
                events: &mut self.events,
            };
            f(&mut self.ctx, &mut tc)
        }

        pub fn tick(&mut self) {
            self.run(|ctx, tc| ctx.update(tc));
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec2;

    use super::testing::Harness;
    use crate::ai::action::{GatedAction, GatedEffect, InstantAction};
    use crate::ai::blackboard::BlackboardValue;
    use crate::ai::decision::Decision;
    use crate::ai::graph::{ActionDef, BehaviorGraph, GraphDef, StateDef, TermDef, TransitionDef};
    use crate::core::{AiEvent, BrainConfig, TransitionPolicy};

    fn count(key: &str) -> ActionDef {
        ActionDef::Instant(InstantAction::AddInt {
            key: key.into(),
            delta: 1,
        })
    }

    fn build(def: GraphDef) -> Arc<BehaviorGraph> {
        Arc::new(BehaviorGraph::from_def(def).unwrap())
    }

    fn range_graph() -> Arc<BehaviorGraph> {
        build(
            GraphDef::new("range", "Idle")
                .decision("near", Decision::TargetWithinRange { range: 2.0 })
                .action("count_exit", count("exits"))
                .action("count_enter", count("enters"))
                .state(
                    StateDef::new("Idle")
                        .on_exit("count_exit")
                        .transition(TransitionDef::new(vec![TermDef::new("near")]).then("Hunt")),
                )
                .state(
                    StateDef::new("Hunt")
                        .on_enter("count_enter")
                        .transition(
                            TransitionDef::new(vec![TermDef::new("near").inverted()]).then("Idle"),
                        ),
                ),
        )
    }

    #[test]
    fn test_enter_on_first_update() {
        let graph = build(
            GraphDef::new("enter", "Idle")
                .action("count_enter", count("enters"))
                .state(StateDef::new("Idle").on_enter("count_enter")),
        );
        let mut h = Harness::new(graph);
        assert!(!h.ctx.has_started());

        h.tick();
        h.tick();

        assert!(h.ctx.has_started());
        assert_eq!(h.ctx.blackboard.get_int("enters"), Ok(Some(1)));
    }

    #[test]
    fn test_switch_when_target_in_range() {
        let graph = range_graph();
        let mut h = Harness::new(graph.clone());

        h.tick();
        assert!(h.ctx.is_in_state("Idle"));

        h.world.move_entity(h.player, Vec2::new(1.5, 0.0));
        h.tick();

        assert!(h.ctx.is_in_state("Hunt"));
        assert_eq!(h.ctx.blackboard.get_int("exits"), Ok(Some(1)));
        assert_eq!(h.ctx.blackboard.get_int("enters"), Ok(Some(1)));

        let idle = graph.state_id("Idle").unwrap();
        let hunt = graph.state_id("Hunt").unwrap();
        let changes: Vec<_> = h
            .events
            .iter_pending()
            .filter(|e| matches!(e, AiEvent::StateChanged { .. }))
            .collect();
        assert_eq!(
            changes,
            vec![&AiEvent::StateChanged {
                agent: h.agent,
                from: idle,
                to: hunt,
            }]
        );

        // holding position keeps the state
        h.tick();
        assert!(h.ctx.is_in_state("Hunt"));
        assert_eq!(h.ctx.blackboard.get_int("enters"), Ok(Some(1)));
    }

    #[test]
    fn test_inverted_transition_returns() {
        let mut h = Harness::new(range_graph());
        h.world.move_entity(h.player, Vec2::new(1.0, 0.0));
        h.tick();
        assert!(h.ctx.is_in_state("Hunt"));

        h.world.move_entity(h.player, Vec2::new(8.0, 0.0));
        h.tick();
        assert!(h.ctx.is_in_state("Idle"));
    }

    fn chained_graph() -> Arc<BehaviorGraph> {
        build(
            GraphDef::new("chain", "A")
                .decision("yes", Decision::Constant(true))
                .action("count_b_exit", count("b_exits"))
                .state(
                    StateDef::new("A")
                        .transition(TransitionDef::new(vec![TermDef::new("yes")]).then("B"))
                        .transition(TransitionDef::new(vec![TermDef::new("yes")]).then("C")),
                )
                .state(StateDef::new("B").on_exit("count_b_exit"))
                .state(StateDef::new("C")),
        )
    }

    #[test]
    fn test_snapshot_policy_one_switch_per_tick() {
        let mut h = Harness::new(chained_graph());
        h.tick();
        assert!(h.ctx.is_in_state("B"));

        // B has no transitions of its own
        h.tick();
        assert!(h.ctx.is_in_state("B"));
        assert_eq!(h.ctx.blackboard.get_int("b_exits"), Ok(None));
    }

    #[test]
    fn test_sequential_policy_walks_whole_list() {
        let config = BrainConfig::default().with_transition_policy(TransitionPolicy::Sequential);
        let mut h = Harness::new(chained_graph()).with_config(config);

        // A's second transition fires after the first entered B, so it leaves B
        h.tick();
        assert!(h.ctx.is_in_state("C"));
        assert_eq!(h.ctx.blackboard.get_int("b_exits"), Ok(Some(1)));
        let switches = h
            .events
            .iter_pending()
            .filter(|e| matches!(e, AiEvent::StateChanged { .. }))
            .count();
        assert_eq!(switches, 2);
    }

    fn charging_graph() -> Arc<BehaviorGraph> {
        build(
            GraphDef::new("charge", "Idle")
                .decision(
                    "leave",
                    Decision::BlackboardFlag {
                        key: "leave".into(),
                    },
                )
                .action(
                    "roar",
                    ActionDef::Gated(
                        GatedAction::new(GatedEffect::Play {
                            effect: "roar".into(),
                        })
                        .with_charge_up(1.0),
                    ),
                )
                .action(
                    "swipe",
                    ActionDef::Gated(
                        GatedAction::new(GatedEffect::Play {
                            effect: "swipe".into(),
                        })
                        .with_cooldown(2.0),
                    ),
                )
                .state(
                    StateDef::new("Idle")
                        .on_update("roar")
                        .on_update("swipe")
                        .transition(TransitionDef::new(vec![TermDef::new("leave")]).then("Other")),
                )
                .state(StateDef::new("Other")),
        )
    }

    #[test]
    fn test_exit_cancels_charge_up_but_not_cooldown() {
        let graph = charging_graph();
        let roar = graph.action_id("roar").unwrap();
        let swipe = graph.action_id("swipe").unwrap();
        let mut h = Harness::new(graph);

        h.tick();
        assert_eq!(h.world.played_count("swipe"), 1);
        assert!(!h.ctx.is_action_ready(roar));
        assert!(!h.ctx.is_action_ready(swipe));

        h.ctx.blackboard.set("leave", BlackboardValue::Bool(true));
        h.advance(0.5);
        h.tick();
        assert!(h.ctx.is_in_state("Other"));
        assert!(h.ctx.is_action_ready(roar));
        assert!(!h.ctx.is_action_ready(swipe));

        h.advance(2.0);
        h.tick();
        assert_eq!(h.world.played_count("roar"), 0);
        assert!(h.ctx.is_action_ready(swipe));
        assert!(h.ctx.tasks().is_empty());
    }

    #[test]
    fn test_exit_action_charge_up_survives_switch() {
        let graph = build(
            GraphDef::new("farewell", "Idle")
                .decision(
                    "leave",
                    Decision::BlackboardFlag {
                        key: "leave".into(),
                    },
                )
                .action(
                    "howl",
                    ActionDef::Gated(
                        GatedAction::new(GatedEffect::Play {
                            effect: "howl".into(),
                        })
                        .with_charge_up(0.5),
                    ),
                )
                .state(
                    StateDef::new("Idle")
                        .on_exit("howl")
                        .transition(TransitionDef::new(vec![TermDef::new("leave")]).then("Gone")),
                )
                .state(StateDef::new("Gone")),
        );
        let howl = graph.action_id("howl").unwrap();
        let mut h = Harness::new(graph);

        h.tick();
        h.ctx.blackboard.set("leave", BlackboardValue::Bool(true));
        h.tick();
        assert!(h.ctx.is_in_state("Gone"));
        assert!(!h.ctx.is_action_ready(howl));
        assert_eq!(h.world.played_count("howl"), 0);

        h.advance(0.5);
        h.tick();
        assert_eq!(h.world.played_count("howl"), 1);
        assert!(h.ctx.is_action_ready(howl));
    }

    #[test]
    fn test_force_transition_runs_lifecycle() {
        let graph = range_graph();
        let hunt = graph.state_id("Hunt").unwrap();
        let mut h = Harness::new(graph);

        h.tick();
        h.run(|ctx, tc| ctx.force_transition(hunt, tc));

        assert!(h.ctx.is_in_state("Hunt"));
        assert_eq!(h.ctx.blackboard.get_int("exits"), Ok(Some(1)));
        assert_eq!(h.ctx.blackboard.get_int("enters"), Ok(Some(1)));
    }

    #[test]
    fn test_time_in_state() {
        let graph = build(
            GraphDef::new("timer", "Wait")
                .decision("waited", Decision::TimeInState { seconds: 1.0 })
                .state(
                    StateDef::new("Wait")
                        .transition(TransitionDef::new(vec![TermDef::new("waited")]).then("Done")),
                )
                .state(StateDef::new("Done")),
        );
        let mut h = Harness::new(graph);

        h.tick();
        h.advance(0.6);
        h.tick();
        assert!(h.ctx.is_in_state("Wait"));

        h.advance(0.6);
        h.tick();
        assert!(h.ctx.is_in_state("Done"));
        assert!((h.ctx.state_entered_at() - 1.2).abs() < 1e-6);
    }
}
