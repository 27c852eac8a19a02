//! Actions
//!
//! Three kinds of behavior node:
//!
//! - **Gated**: cooldown-controlled. Starting one claims its ready flag and
//!   spawns a timed body (charge-up, effect, cooldown) that re-arms the flag
//!   on every exit path.
//! - **Instant**: synchronous leaf that mutates the agent or emits a
//!   notification.
//! - **Composite**: synchronous combination of decisions and other actions.
//!
//! Neither instant nor composite actions touch the cooldown table.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::blackboard::BlackboardValue;
use super::context::AgentContext;
use super::cooldown::{GatedTask, TaskPhase};
use super::fsm::TickContext;
use super::graph::{ActionId, BehaviorGraph, DecisionId};
use super::services::LayerMask;
use super::state::StateId;
use super::steering::{self, AiData, SteeringBehavior, SteeringKind};
use crate::core::AiEvent;

// ============================================================================
// Gated actions
// ============================================================================

/// What a gated body does when its precondition fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RearmPolicy {
    /// Re-arm at once; "couldn't act" counts as done
    #[default]
    Immediate,
    /// Wait the full cooldown either way
    AfterCooldown,
}

/// Which target slot of the agent an action reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetSlot {
    Pathfinding,
    Attack,
}

/// Destination of a path request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathTarget {
    /// The world's hunted target
    #[default]
    Player,
    /// The agent's pathfinding target
    PathfindingTarget,
    /// The agent's attack target
    AttackTarget,
}

/// Effect performed by a gated body once its charge-up has elapsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GatedEffect {
    /// Ask the pathfinding service for a path
    RequestPath {
        #[serde(default)]
        target: PathTarget,
    },
    /// Play an attack effect on the attack target
    Attack {
        effect: String,
        range: f32,
        #[serde(default)]
        line_of_sight: bool,
        #[serde(default)]
        layers: LayerMask,
    },
    /// Side-step perpendicular to the hunted target
    Dodge,
    /// Play every effect subscribed to an observer list
    InvokeObservers { key: String },
    /// Play an effect on the agent itself
    Play { effect: String },
    /// Set a blackboard flag
    SetFlag { key: String, value: bool },
}

/// Result of a gated effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The effect ran
    Done,
    /// A runtime precondition failed
    Skipped,
}

fn default_true() -> bool {
    true
}

/// A cooldown-controlled action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatedAction {
    /// Seconds between start and effect
    #[serde(default)]
    pub charge_up: f32,
    /// Seconds between effect and re-arm
    #[serde(default)]
    pub cooldown: f32,
    /// Re-arm policy on precondition failure
    #[serde(default)]
    pub rearm: RearmPolicy,
    /// Exiting the starting state cancels a pending effect
    #[serde(default = "default_true")]
    pub cancel_on_exit: bool,
    /// Effect to perform
    pub effect: GatedEffect,
}

impl GatedAction {
    /// Gated action with no delays
    #[must_use]
    pub fn new(effect: GatedEffect) -> Self {
        Self {
            charge_up: 0.0,
            cooldown: 0.0,
            rearm: RearmPolicy::Immediate,
            cancel_on_exit: true,
            effect,
        }
    }

    /// Set the charge-up delay
    #[must_use]
    pub fn with_charge_up(mut self, seconds: f32) -> Self {
        self.charge_up = seconds;
        self
    }

    /// Set the cooldown delay
    #[must_use]
    pub fn with_cooldown(mut self, seconds: f32) -> Self {
        self.cooldown = seconds;
        self
    }

    /// Set the re-arm policy
    #[must_use]
    pub fn with_rearm(mut self, rearm: RearmPolicy) -> Self {
        self.rearm = rearm;
        self
    }

    /// Start the body if the action is ready; otherwise drop the call
    fn start(&self, id: ActionId, ctx: &mut AgentContext, tc: &mut TickContext<'_>) {
        if !ctx.cooldowns.try_begin(id) {
            log::trace!("gated action {id:?} not ready, call dropped");
            return;
        }

        let owner = ctx.current_state;
        let charge_up = tc.config.charge_up(self.charge_up);
        if charge_up > 0.0 {
            ctx.tasks.push(GatedTask {
                action: id,
                owner,
                phase: TaskPhase::ChargeUp,
                deadline: tc.now + charge_up,
                cancel_on_exit: self.cancel_on_exit,
            });
        } else {
            self.run_body(id, owner, ctx, tc);
        }
    }

    /// Perform the effect and schedule the re-arm
    fn run_body(
        &self,
        id: ActionId,
        owner: StateId,
        ctx: &mut AgentContext,
        tc: &mut TickContext<'_>,
    ) {
        let outcome = self.perform(ctx, tc);

        let mut wait = match (outcome, self.rearm) {
            (Outcome::Skipped, RearmPolicy::Immediate) => 0.0,
            _ => tc.config.cooldown(self.cooldown),
        };
        if outcome == Outcome::Done && matches!(self.effect, GatedEffect::RequestPath { .. }) {
            wait = wait.max(f64::from(tc.config.path_request_lockout));
        }

        if wait > 0.0 {
            ctx.tasks.push(GatedTask {
                action: id,
                owner,
                phase: TaskPhase::Cooldown,
                deadline: tc.now + wait,
                cancel_on_exit: self.cancel_on_exit,
            });
        } else {
            self.rearm(id, ctx);
        }
    }

    /// Mark the action ready again, draining observers it invoked
    fn rearm(&self, id: ActionId, ctx: &mut AgentContext) {
        ctx.cooldowns.rearm(id);
        if let GatedEffect::InvokeObservers { key } = &self.effect {
            match ctx.blackboard.observers_mut(key) {
                Ok(list) => {
                    list.drain();
                }
                Err(e) => log::warn!("re-arm of {id:?}: {e}"),
            }
        }
    }

    fn perform(&self, ctx: &mut AgentContext, tc: &mut TickContext<'_>) -> Outcome {
        match &self.effect {
            GatedEffect::RequestPath { target } => request_path(*target, ctx, tc),
            GatedEffect::Attack {
                effect,
                range,
                line_of_sight,
                layers,
            } => attack(effect, *range, *line_of_sight, *layers, ctx, tc),
            GatedEffect::Dodge => dodge(ctx, tc),
            GatedEffect::InvokeObservers { key } => {
                let effects: Vec<String> = match ctx.blackboard.observers_mut(key) {
                    Ok(list) => list.iter().map(str::to_string).collect(),
                    Err(e) => {
                        log::warn!("InvokeObservers: {e}");
                        return Outcome::Skipped;
                    }
                };
                if effects.is_empty() {
                    return Outcome::Skipped;
                }
                for effect in effects {
                    play(&effect, &[tc.agent], tc);
                }
                Outcome::Done
            }
            GatedEffect::Play { effect } => {
                play(effect, &[tc.agent], tc);
                Outcome::Done
            }
            GatedEffect::SetFlag { key, value } => {
                ctx.blackboard.set(key.clone(), BlackboardValue::Bool(*value));
                Outcome::Done
            }
        }
    }
}

fn play(effect: &str, targets: &[hecs::Entity], tc: &mut TickContext<'_>) {
    tc.services.play(effect, targets);
    tc.events.push(AiEvent::EffectPlayed {
        agent: tc.agent,
        effect: effect.to_string(),
        targets: targets.len(),
    });
}

fn request_path(target: PathTarget, ctx: &mut AgentContext, tc: &mut TickContext<'_>) -> Outcome {
    if ctx.path_data.ignore_requests || tc.now < ctx.path_data.lockout_until {
        return Outcome::Skipped;
    }
    let destination = match target {
        PathTarget::Player => tc.services.target_position(),
        PathTarget::PathfindingTarget => ctx
            .pathfinding_target
            .and_then(|e| tc.services.position_of(e)),
        PathTarget::AttackTarget => ctx.attack_target.and_then(|e| tc.services.position_of(e)),
    };
    let Some(destination) = destination else {
        return Outcome::Skipped;
    };

    let ready_at = tc.now + f64::from(tc.config.path_latency.max(0.0));
    tc.paths.request(tc.agent, ctx.position, destination, ready_at);
    ctx.path_data.lockout_until = tc.now + f64::from(tc.config.path_request_lockout);
    Outcome::Done
}

fn attack(
    effect: &str,
    range: f32,
    line_of_sight: bool,
    layers: LayerMask,
    ctx: &mut AgentContext,
    tc: &mut TickContext<'_>,
) -> Outcome {
    let Some(target) = ctx.attack_target else {
        return Outcome::Skipped;
    };
    if target == tc.agent || tc.services.living_allies().contains(&target) {
        log::debug!("attack on ally {target:?} refused");
        return Outcome::Skipped;
    }
    let Some(position) = tc.services.position_of(target) else {
        return Outcome::Skipped;
    };

    let offset = position - ctx.position;
    let distance = offset.length();
    if distance > range {
        return Outcome::Skipped;
    }
    if line_of_sight
        && tc
            .services
            .raycast(ctx.position, offset.normalize_or_zero(), distance, layers)
    {
        return Outcome::Skipped;
    }

    play(effect, &[target], tc);
    Outcome::Done
}

fn dodge(ctx: &mut AgentContext, tc: &mut TickContext<'_>) -> Outcome {
    if !(ctx.dodge.can_dodge && ctx.dodge.need_to_dodge) {
        return Outcome::Skipped;
    }
    let Some(threat) = tc.services.target_position() else {
        return Outcome::Skipped;
    };
    let away = (ctx.position - threat).normalize_or_zero();
    if away == Vec2::ZERO {
        return Outcome::Skipped;
    }
    ctx.dodge.need_to_dodge = false;
    ctx.set_movement_intention(away.perp());
    tc.events.push(AiEvent::Presentation {
        agent: tc.agent,
        hook: "dodge".to_string(),
    });
    Outcome::Done
}

// ============================================================================
// Instant actions
// ============================================================================

/// Synchronous leaf action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstantAction {
    /// Copy the world's hunted target into a slot
    SelectTarget { slot: TargetSlot },
    /// Clear a target slot
    ClearTarget { slot: TargetSlot },
    /// Cancel path following and any queued request, and stop moving
    Stop,
    /// Run the context steering solver and move in its direction
    Steer { behaviors: Vec<SteeringKind> },
    /// Set a blackboard flag
    SetFlag { key: String, value: bool },
    /// Set a blackboard integer
    SetInt { key: String, value: i64 },
    /// Add to a blackboard integer
    AddInt { key: String, delta: i64 },
    /// Store a target slot as a blackboard entity reference
    RememberTarget { slot: TargetSlot, key: String },
    /// Subscribe an effect to an observer list
    Subscribe { key: String, effect: String },
    /// Fire a presentation hook
    Notify { hook: String },
    /// Drop or accept delivered paths
    IgnorePathRequests(bool),
    /// Update dodge flags
    SetDodge {
        #[serde(default)]
        can_dodge: Option<bool>,
        #[serde(default)]
        need_to_dodge: Option<bool>,
    },
}

impl InstantAction {
    fn run(&self, ctx: &mut AgentContext, tc: &mut TickContext<'_>) {
        match self {
            Self::SelectTarget { slot } => {
                let target = tc.services.target();
                *slot_mut(ctx, *slot) = target;
            }
            Self::ClearTarget { slot } => *slot_mut(ctx, *slot) = None,
            Self::Stop => {
                ctx.stop();
                tc.paths.cancel(tc.agent);
            }
            Self::Steer { behaviors } => steer(behaviors, ctx, tc),
            Self::SetFlag { key, value } => {
                ctx.blackboard.set(key.clone(), BlackboardValue::Bool(*value));
            }
            Self::SetInt { key, value } => {
                ctx.blackboard.set(key.clone(), BlackboardValue::Int(*value));
            }
            Self::AddInt { key, delta } => {
                if let Err(e) = ctx.blackboard.add_int(key, *delta) {
                    log::warn!("AddInt: {e}");
                }
            }
            Self::RememberTarget { slot, key } => {
                if let Some(entity) = *slot_mut(ctx, *slot) {
                    ctx.blackboard.set(key.clone(), BlackboardValue::Entity(entity));
                }
            }
            Self::Subscribe { key, effect } => match ctx.blackboard.observers_mut(key) {
                Ok(list) => list.subscribe(effect.clone()),
                Err(e) => log::warn!("Subscribe: {e}"),
            },
            Self::Notify { hook } => tc.events.push(AiEvent::Presentation {
                agent: tc.agent,
                hook: hook.clone(),
            }),
            Self::IgnorePathRequests(ignore) => ctx.path_data.ignore_requests = *ignore,
            Self::SetDodge {
                can_dodge,
                need_to_dodge,
            } => {
                if let Some(can) = can_dodge {
                    ctx.dodge.can_dodge = *can;
                }
                if let Some(need) = need_to_dodge {
                    ctx.dodge.need_to_dodge = *need;
                }
            }
        }
    }
}

fn slot_mut(ctx: &mut AgentContext, slot: TargetSlot) -> &mut Option<hecs::Entity> {
    match slot {
        TargetSlot::Pathfinding => &mut ctx.pathfinding_target,
        TargetSlot::Attack => &mut ctx.attack_target,
    }
}

fn steer(behaviors: &[SteeringKind], ctx: &mut AgentContext, tc: &mut TickContext<'_>) {
    let reach = behaviors
        .iter()
        .map(SteeringKind::reach)
        .fold(ctx.collider_radius, f32::max);

    let target = ctx.path_data.current_waypoint().or_else(|| {
        ctx.pathfinding_target
            .and_then(|e| tc.services.position_of(e))
            .or_else(|| tc.services.target_position())
    });
    let allies = tc
        .services
        .living_allies()
        .into_iter()
        .filter(|&e| e != tc.agent)
        .filter_map(|e| tc.services.position_of(e))
        .filter(|p| p.distance(ctx.position) <= reach)
        .collect();

    let data = AiData {
        position: ctx.position,
        collider_radius: ctx.collider_radius,
        target,
        obstacles: tc.services.obstacles_near(ctx.position, reach),
        allies,
    };
    let refs: SmallVec<[&dyn SteeringBehavior; 4]> = behaviors
        .iter()
        .map(|b| b as &dyn SteeringBehavior)
        .collect();
    ctx.set_movement_intention(steering::solve(&refs, &data));
}

// ============================================================================
// Composite actions
// ============================================================================

/// Synchronous combination of decisions and actions
#[derive(Debug, Clone, PartialEq)]
pub enum Composite {
    /// Run `on_true` if every decision holds, otherwise `on_false`
    ConditionalAnd {
        decisions: Vec<DecisionId>,
        on_true: Option<ActionId>,
        on_false: Option<ActionId>,
    },
    /// Run `on_true` if any decision holds, otherwise `on_false`
    ConditionalOr {
        decisions: Vec<DecisionId>,
        on_true: Option<ActionId>,
        on_false: Option<ActionId>,
    },
    /// Run every action in order
    Multi(Vec<ActionId>),
}

impl Composite {
    /// Actions this composite may execute
    #[must_use]
    pub fn children(&self) -> Vec<ActionId> {
        match self {
            Self::ConditionalAnd {
                on_true, on_false, ..
            }
            | Self::ConditionalOr {
                on_true, on_false, ..
            } => on_true.iter().chain(on_false).copied().collect(),
            Self::Multi(actions) => actions.clone(),
        }
    }

    fn run(&self, graph: &BehaviorGraph, ctx: &mut AgentContext, tc: &mut TickContext<'_>) {
        match self {
            Self::ConditionalAnd {
                decisions,
                on_true,
                on_false,
            } => {
                let holds = decisions
                    .iter()
                    .all(|&d| graph.decision(d).evaluate(ctx, tc));
                let branch = if holds { on_true } else { on_false };
                if let Some(action) = branch {
                    execute(graph, *action, ctx, tc);
                }
            }
            Self::ConditionalOr {
                decisions,
                on_true,
                on_false,
            } => {
                let holds = decisions
                    .iter()
                    .any(|&d| graph.decision(d).evaluate(ctx, tc));
                let branch = if holds { on_true } else { on_false };
                if let Some(action) = branch {
                    execute(graph, *action, ctx, tc);
                }
            }
            Self::Multi(actions) => {
                for &action in actions {
                    execute(graph, action, ctx, tc);
                }
            }
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// A behavior node
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Gated(GatedAction),
    Instant(InstantAction),
    Composite(Composite),
}

/// Execute an action of `graph` for one agent
pub fn execute(
    graph: &BehaviorGraph,
    id: ActionId,
    ctx: &mut AgentContext,
    tc: &mut TickContext<'_>,
) {
    match graph.action(id) {
        Action::Gated(gated) => gated.start(id, ctx, tc),
        Action::Instant(instant) => instant.run(ctx, tc),
        Action::Composite(composite) => composite.run(graph, ctx, tc),
    }
}

/// Resume every gated task whose deadline has passed
pub(crate) fn resume_due(graph: &BehaviorGraph, ctx: &mut AgentContext, tc: &mut TickContext<'_>) {
    for task in ctx.tasks.take_due(tc.now) {
        let Action::Gated(gated) = graph.action(task.action) else {
            continue;
        };
        match task.phase {
            TaskPhase::ChargeUp => gated.run_body(task.action, task.owner, ctx, tc),
            TaskPhase::Cooldown => gated.rearm(task.action, ctx),
        }
    }
}

/// Cancel pending bodies started from `state` and re-arm their actions
pub(crate) fn cancel_for_exit(graph: &BehaviorGraph, state: StateId, ctx: &mut AgentContext) {
    for id in ctx.tasks.cancel_owned_by(state) {
        if let Action::Gated(gated) = graph.action(id) {
            log::trace!("gated action {id:?} cancelled on exit");
            gated.rearm(id, ctx);
        }
    }
}
