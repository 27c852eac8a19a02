//! Cooldown table and pending gated-action tasks
//!
//! A gated action flips its cooldown entry to "not ready" when it starts and
//! only the task it spawned flips it back. Tasks are plain deadlines polled by
//! the driver each tick.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::graph::ActionId;
use super::state::StateId;

/// Ready flags keyed by action identity.
///
/// A missing entry means the action was never executed and counts as ready.
#[derive(Debug, Clone, Default)]
pub struct CooldownTable {
    ready: FxHashMap<ActionId, bool>,
}

impl CooldownTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the entry for `action` as ready if it does not exist yet
    pub fn ensure(&mut self, action: ActionId) {
        self.ready.entry(action).or_insert(true);
    }

    /// Claim the action if it is ready; returns whether the claim succeeded
    pub fn try_begin(&mut self, action: ActionId) -> bool {
        let ready = self.ready.entry(action).or_insert(true);
        if *ready {
            *ready = false;
            true
        } else {
            false
        }
    }

    /// Mark the action ready again
    pub fn rearm(&mut self, action: ActionId) {
        self.ready.insert(action, true);
    }

    /// Whether the action may start
    #[must_use]
    pub fn is_ready(&self, action: ActionId) -> bool {
        self.ready.get(&action).copied().unwrap_or(true)
    }

    /// Whether the action has an entry at all
    #[must_use]
    pub fn is_tracked(&self, action: ActionId) -> bool {
        self.ready.contains_key(&action)
    }
}

/// What a pending task is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// Waiting to perform the effect
    ChargeUp,
    /// Effect done, waiting to re-arm
    Cooldown,
}

/// A suspended gated-action body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatedTask {
    /// Action that owns the cooldown flag
    pub action: ActionId,
    /// State the action was started from
    pub owner: StateId,
    /// Current phase
    pub phase: TaskPhase,
    /// Simulation time at which the phase ends
    pub deadline: f64,
    /// Whether exiting `owner` cancels the pending effect
    pub cancel_on_exit: bool,
}

/// Pending tasks of one agent
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    tasks: SmallVec<[GatedTask; 4]>,
}

impl TaskSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task
    pub fn push(&mut self, task: GatedTask) {
        self.tasks.push(task);
    }

    /// Remove and return every task whose deadline has passed, oldest first
    pub fn take_due(&mut self, now: f64) -> SmallVec<[GatedTask; 4]> {
        let mut due: SmallVec<[GatedTask; 4]> = SmallVec::new();
        self.tasks.retain(|task| {
            if task.deadline <= now {
                due.push(*task);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| a.deadline.total_cmp(&b.deadline));
        due
    }

    /// Remove charge-up tasks started from `state` that may be cancelled.
    ///
    /// Tasks already cooling down are left alone: they only re-arm.
    pub fn cancel_owned_by(&mut self, state: StateId) -> SmallVec<[ActionId; 4]> {
        let mut cancelled = SmallVec::new();
        self.tasks.retain(|task| {
            let cancel =
                task.owner == state && task.cancel_on_exit && task.phase == TaskPhase::ChargeUp;
            if cancel {
                cancelled.push(task.action);
            }
            !cancel
        });
        cancelled
    }

    /// Whether a task for `action` is pending
    #[must_use]
    pub fn contains(&self, action: ActionId) -> bool {
        self.tasks.iter().any(|t| t.action == action)
    }

    /// Iterate over pending tasks
    pub fn iter(&self) -> impl Iterator<Item = &GatedTask> {
        self.tasks.iter()
    }

    /// Number of pending tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(action: u32, owner: u32, phase: TaskPhase, deadline: f64) -> GatedTask {
        GatedTask {
            action: ActionId(action),
            owner: StateId(owner),
            phase,
            deadline,
            cancel_on_exit: true,
        }
    }

    #[test]
    fn test_first_reference_is_ready() {
        let mut table = CooldownTable::new();
        let id = ActionId(3);

        assert!(table.is_ready(id));
        assert!(!table.is_tracked(id));

        table.ensure(id);
        assert!(table.is_tracked(id));
        assert!(table.is_ready(id));
    }

    #[test]
    fn test_try_begin_claims_once() {
        let mut table = CooldownTable::new();
        let id = ActionId(0);

        assert!(table.try_begin(id));
        assert!(!table.try_begin(id));
        assert!(!table.is_ready(id));

        // ensure must not reset an entry that is cooling down
        table.ensure(id);
        assert!(!table.is_ready(id));

        table.rearm(id);
        assert!(table.try_begin(id));
    }

    #[test]
    fn test_take_due_orders_by_deadline() {
        let mut tasks = TaskSet::new();
        tasks.push(task(1, 0, TaskPhase::Cooldown, 2.0));
        tasks.push(task(2, 0, TaskPhase::ChargeUp, 1.0));
        tasks.push(task(3, 0, TaskPhase::ChargeUp, 5.0));

        let due = tasks.take_due(2.0);
        let ids: Vec<_> = due.iter().map(|t| t.action).collect();
        assert_eq!(ids, vec![ActionId(2), ActionId(1)]);
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn test_cancel_only_charging_tasks_of_state() {
        let mut tasks = TaskSet::new();
        tasks.push(task(1, 0, TaskPhase::ChargeUp, 9.0));
        tasks.push(task(2, 0, TaskPhase::Cooldown, 9.0));
        tasks.push(task(3, 1, TaskPhase::ChargeUp, 9.0));
        let mut pinned = task(4, 0, TaskPhase::ChargeUp, 9.0);
        pinned.cancel_on_exit = false;
        tasks.push(pinned);

        let cancelled = tasks.cancel_owned_by(StateId(0));
        assert_eq!(cancelled.as_slice(), &[ActionId(1)]);
        assert_eq!(tasks.len(), 3);
    }
}
