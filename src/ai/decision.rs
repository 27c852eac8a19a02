//! Decisions and the decision combinator
//!
//! A [`Decision`] is a stateless predicate over an agent and the world. Lists
//! of signed [`Term`]s are combined as a sum of AND-groups: `And` binds
//! tighter than `Or`, and a group ends at an `Or` or at the end of the list.

use serde::{Deserialize, Serialize};

use super::context::AgentContext;
use super::fsm::TickContext;
use super::graph::DecisionId;
use super::services::LayerMask;

/// Integer comparison used by blackboard decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparison {
    /// Apply the comparison as `lhs <op> rhs`
    #[must_use]
    pub fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Equal => lhs == rhs,
            Self::NotEqual => lhs != rhs,
            Self::Less => lhs < rhs,
            Self::LessOrEqual => lhs <= rhs,
            Self::Greater => lhs > rhs,
            Self::GreaterOrEqual => lhs >= rhs,
        }
    }
}

/// A boolean predicate over an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    /// Fixed result
    Constant(bool),
    /// The hunted target is within `range` of the agent
    TargetWithinRange { range: f32 },
    /// The hunted target is within `range` and no ray toward it is blocked
    TargetVisible {
        range: f32,
        #[serde(default)]
        layers: LayerMask,
    },
    /// A circle of the agent's collider radius can travel `range` toward the target
    ClearPathToTarget {
        range: f32,
        #[serde(default)]
        layers: LayerMask,
    },
    /// An attack target is set
    HasAttackTarget,
    /// A pathfinding target is set
    HasPathfindingTarget,
    /// A follow task is running
    FollowingPath,
    /// The agent may dodge
    CanDodge,
    /// The agent was asked to dodge
    NeedToDodge,
    /// The current state has been active for at least `seconds`
    TimeInState { seconds: f32 },
    /// Compare a blackboard integer (missing counts as zero)
    BlackboardInt {
        key: String,
        comparison: Comparison,
        value: i64,
    },
    /// A blackboard flag is set (missing counts as false)
    BlackboardFlag { key: String },
    /// A blackboard entity reference exists and is still alive
    BlackboardEntityAlive { key: String },
    /// At least `count` allies are alive
    AlliesAtLeast { count: usize },
}

impl Decision {
    /// Evaluate the decision.
    ///
    /// Configuration errors are logged and read as `false`.
    pub fn evaluate(&self, ctx: &AgentContext, tc: &TickContext<'_>) -> bool {
        match self {
            Self::Constant(value) => *value,
            Self::TargetWithinRange { range } => tc
                .services
                .target_position()
                .is_some_and(|target| target.distance(ctx.position) <= *range),
            Self::TargetVisible { range, layers } => {
                let Some(target) = tc.services.target_position() else {
                    return false;
                };
                let offset = target - ctx.position;
                let distance = offset.length();
                distance <= *range
                    && !tc.services.raycast(
                        ctx.position,
                        offset.normalize_or_zero(),
                        distance,
                        *layers,
                    )
            }
            Self::ClearPathToTarget { range, layers } => {
                let Some(target) = tc.services.target_position() else {
                    return false;
                };
                let direction = (target - ctx.position).normalize_or_zero();
                !tc.services.circlecast(
                    ctx.position,
                    ctx.collider_radius,
                    direction,
                    *range,
                    *layers,
                )
            }
            Self::HasAttackTarget => ctx.attack_target.is_some(),
            Self::HasPathfindingTarget => ctx.pathfinding_target.is_some(),
            Self::FollowingPath => ctx.path_data.is_following(),
            Self::CanDodge => ctx.dodge.can_dodge,
            Self::NeedToDodge => ctx.dodge.need_to_dodge,
            Self::TimeInState { seconds } => {
                tc.now - ctx.state_entered_at >= f64::from(*seconds)
            }
            Self::BlackboardInt {
                key,
                comparison,
                value,
            } => match ctx.blackboard.get_int(key) {
                Ok(current) => comparison.apply(current.unwrap_or(0), *value),
                Err(e) => {
                    log::warn!("decision BlackboardInt: {e}");
                    false
                }
            },
            Self::BlackboardFlag { key } => match ctx.blackboard.get_bool(key) {
                Ok(flag) => flag.unwrap_or(false),
                Err(e) => {
                    log::warn!("decision BlackboardFlag: {e}");
                    false
                }
            },
            Self::BlackboardEntityAlive { key } => match ctx.blackboard.get_entity(key) {
                Ok(entity) => entity.is_some_and(|e| tc.services.position_of(e).is_some()),
                Err(e) => {
                    log::warn!("decision BlackboardEntityAlive: {e}");
                    false
                }
            },
            Self::AlliesAtLeast { count } => tc.services.living_allies().len() >= *count,
        }
    }
}

/// Operator joining a term to the one after it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    And,
    Or,
}

/// One signed decision in a combinator list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Term {
    /// Decision to evaluate
    pub decision: DecisionId,
    /// Negate the decision's result
    pub invert: bool,
    /// Operator to the next term; `None` ends the list
    pub next: Option<Operator>,
}

/// Combine signed terms: OR across AND-groups.
///
/// An empty list is vacuously true.
pub fn combine(terms: &[Term], mut evaluate: impl FnMut(DecisionId) -> bool) -> bool {
    if terms.is_empty() {
        return true;
    }

    let mut result = false;
    let mut i = 0;
    while i < terms.len() {
        let mut group = terms[i].invert ^ evaluate(terms[i].decision);
        while terms[i].next == Some(Operator::And) && i + 1 < terms.len() {
            i += 1;
            let signed = terms[i].invert ^ evaluate(terms[i].decision);
            group = group && signed;
        }
        result = result || group;
        i += 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec2;

    use super::*;
    use crate::ai::blackboard::BlackboardValue;
    use crate::ai::fsm::testing::Harness;
    use crate::ai::graph::{BehaviorGraph, GraphDef, StateDef};

    fn term(id: u32, invert: bool, next: Option<Operator>) -> Term {
        Term {
            decision: DecisionId(id),
            invert,
            next,
        }
    }

    fn eval_with(values: &[bool]) -> impl FnMut(DecisionId) -> bool + '_ {
        move |id| values[id.index()]
    }

    #[test]
    fn test_empty_is_true() {
        assert!(combine(&[], |_| false));
    }

    #[test]
    fn test_single_term() {
        let terms = [term(0, false, None)];
        assert!(combine(&terms, eval_with(&[true])));
        assert!(!combine(&terms, eval_with(&[false])));

        let inverted = [term(0, true, None)];
        assert!(combine(&inverted, eval_with(&[false])));
    }

    #[test]
    fn test_and_with_inverted_second() {
        // A && !B with A=true, B=false
        let terms = [term(0, false, Some(Operator::And)), term(1, true, None)];
        assert!(combine(&terms, eval_with(&[true, false])));
    }

    #[test]
    fn test_two_term_truth_table() {
        let values = [true, false];
        for invert_a in [false, true] {
            for invert_b in [false, true] {
                for op in [Operator::And, Operator::Or] {
                    let terms = [term(0, invert_a, Some(op)), term(1, invert_b, None)];
                    let a = invert_a ^ values[0];
                    let b = invert_b ^ values[1];
                    let expected = match op {
                        Operator::And => a && b,
                        Operator::Or => a || b,
                    };
                    assert_eq!(
                        combine(&terms, eval_with(&values)),
                        expected,
                        "invert_a={invert_a} invert_b={invert_b} op={op:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        // A || B && C with A=true, B=false, C=false => true
        let terms = [
            term(0, false, Some(Operator::Or)),
            term(1, false, Some(Operator::And)),
            term(2, false, None),
        ];
        assert!(combine(&terms, eval_with(&[true, false, false])));

        // A && B || C with A=true, B=false, C=false => false
        let terms = [
            term(0, false, Some(Operator::And)),
            term(1, false, Some(Operator::Or)),
            term(2, false, None),
        ];
        assert!(!combine(&terms, eval_with(&[true, false, false])));
        assert!(combine(&terms, eval_with(&[true, false, true])));
    }

    #[test]
    fn test_trailing_and_closes_group() {
        let terms = [term(0, false, Some(Operator::And))];
        assert!(combine(&terms, eval_with(&[true])));
    }

    fn harness() -> Harness {
        let def = GraphDef::new("decisions", "Idle").state(StateDef::new("Idle"));
        Harness::new(Arc::new(BehaviorGraph::from_def(def).unwrap()))
    }

    fn check(h: &mut Harness, decision: &Decision) -> bool {
        h.run(|ctx, tc| decision.evaluate(ctx, tc))
    }

    #[test]
    fn test_wrong_kind_reads_false() {
        let mut h = harness();
        h.ctx.blackboard.set("hp", BlackboardValue::Bool(true));
        h.ctx.blackboard.set("alert", BlackboardValue::Int(1));
        h.ctx.blackboard.set("leader", BlackboardValue::Int(7));

        // a missing int would count as zero and pass
        let at_least_zero = |key: &str| Decision::BlackboardInt {
            key: key.into(),
            comparison: Comparison::GreaterOrEqual,
            value: 0,
        };
        let flag = Decision::BlackboardFlag {
            key: "alert".into(),
        };
        let alive = Decision::BlackboardEntityAlive {
            key: "leader".into(),
        };
        assert!(check(&mut h, &at_least_zero("missing")));
        assert!(!check(&mut h, &at_least_zero("hp")));
        assert!(!check(&mut h, &flag));
        assert!(!check(&mut h, &alive));
    }

    #[test]
    fn test_blackboard_int_compares_stored_value() {
        let mut h = harness();
        h.ctx.blackboard.set("hits", BlackboardValue::Int(3));
        let decision = Decision::BlackboardInt {
            key: "hits".into(),
            comparison: Comparison::Less,
            value: 3,
        };
        assert!(!check(&mut h, &decision));

        h.ctx.blackboard.set("hits", BlackboardValue::Int(2));
        assert!(check(&mut h, &decision));
    }

    #[test]
    fn test_target_visible_needs_range_and_clear_ray() {
        let mut h = harness();
        let visible = Decision::TargetVisible {
            range: 12.0,
            layers: LayerMask::ALL,
        };
        assert!(check(&mut h, &visible));

        h.world.blocked = true;
        assert!(!check(&mut h, &visible));

        h.world.blocked = false;
        let short = Decision::TargetVisible {
            range: 5.0,
            layers: LayerMask::ALL,
        };
        assert!(!check(&mut h, &short));
    }

    #[test]
    fn test_clear_path_uses_circlecast() {
        let mut h = harness();
        let clear = Decision::ClearPathToTarget {
            range: 3.0,
            layers: LayerMask::ALL,
        };
        assert!(check(&mut h, &clear));

        h.world.blocked = true;
        assert!(!check(&mut h, &clear));

        h.world.blocked = false;
        h.world.target = None;
        assert!(!check(&mut h, &clear));
    }

    #[test]
    fn test_entity_alive_tracks_world() {
        let mut h = harness();
        let leader = h.spawn_entity();
        let alive = Decision::BlackboardEntityAlive {
            key: "leader".into(),
        };
        assert!(!check(&mut h, &alive));

        h.ctx.blackboard.set("leader", BlackboardValue::Entity(leader));
        h.world.move_entity(leader, Vec2::new(2.0, 2.0));
        assert!(check(&mut h, &alive));

        h.world.positions.remove(&leader);
        assert!(!check(&mut h, &alive));
    }

    #[test]
    fn test_allies_at_least() {
        let mut h = harness();
        let pack = Decision::AlliesAtLeast { count: 2 };
        assert!(!check(&mut h, &pack));

        let ally = h.spawn_entity();
        h.world.allies = vec![h.agent, ally];
        assert!(check(&mut h, &pack));
        assert!(check(&mut h, &Decision::AlliesAtLeast { count: 0 }));
    }

    #[test]
    fn test_agent_flags() {
        let mut h = harness();
        assert!(!check(&mut h, &Decision::HasAttackTarget));
        assert!(!check(&mut h, &Decision::FollowingPath));
        assert!(!check(&mut h, &Decision::NeedToDodge));

        h.ctx.attack_target = Some(h.player);
        h.ctx.install_path(vec![Vec2::X]);
        h.ctx.dodge.need_to_dodge = true;
        assert!(check(&mut h, &Decision::HasAttackTarget));
        assert!(!check(&mut h, &Decision::HasPathfindingTarget));
        assert!(check(&mut h, &Decision::FollowingPath));
        assert!(check(&mut h, &Decision::NeedToDodge));
        assert!(!check(&mut h, &Decision::CanDodge));
    }

    #[test]
    fn test_comparison() {
        assert!(Comparison::GreaterOrEqual.apply(3, 3));
        assert!(!Comparison::Greater.apply(3, 3));
        assert!(Comparison::NotEqual.apply(1, 2));
        assert!(Comparison::Less.apply(-1, 0));
    }
}
