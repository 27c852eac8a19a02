//! Path following
//!
//! An agent holds at most one path and one follow task. Installing a path
//! always cancels the previous follow task before starting the new one.

use glam::Vec2;

/// Identifies one follow task of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FollowHandle(u64);

/// Waypoints plus progress
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    waypoints: Vec<Vec2>,
    index: usize,
}

impl Path {
    /// Create a path starting at its first waypoint
    #[must_use]
    pub fn new(waypoints: Vec<Vec2>) -> Self {
        Self {
            waypoints,
            index: 0,
        }
    }

    /// All waypoints
    #[must_use]
    pub fn waypoints(&self) -> &[Vec2] {
        &self.waypoints
    }

    /// Index of the waypoint being approached
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Waypoint being approached
    #[must_use]
    pub fn current(&self) -> Option<Vec2> {
        self.waypoints.get(self.index).copied()
    }

    /// Whether every waypoint has been reached
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.index >= self.waypoints.len()
    }
}

/// Result of one follow step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FollowStep {
    /// No follow task is running
    Idle,
    /// Move in this unit direction
    Moving(Vec2),
    /// The last waypoint was reached this step
    Finished,
}

/// Per-agent path state
#[derive(Debug, Clone, Default)]
pub struct PathData {
    path: Option<Path>,
    follow: Option<FollowHandle>,
    next_handle: u64,
    /// No path requests before this simulation time
    pub lockout_until: f64,
    /// Drop delivered paths instead of installing them
    pub ignore_requests: bool,
}

impl PathData {
    /// Create empty path data
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the path and start a fresh follow task.
    ///
    /// The previous follow task, if any, is cancelled.
    pub fn install(&mut self, waypoints: Vec<Vec2>) -> FollowHandle {
        if let Some(old) = self.follow.take() {
            log::trace!("follow task {old:?} superseded");
        }
        self.next_handle += 1;
        let handle = FollowHandle(self.next_handle);
        self.path = Some(Path::new(waypoints));
        self.follow = Some(handle);
        handle
    }

    /// Cancel the follow task and drop the path
    pub fn cancel(&mut self) -> Option<FollowHandle> {
        self.path = None;
        self.follow.take()
    }

    /// Advance the follow task by one step.
    pub fn step(&mut self, position: Vec2, buffer: f32) -> FollowStep {
        if self.follow.is_none() {
            return FollowStep::Idle;
        }
        let Some(path) = self.path.as_mut() else {
            self.follow = None;
            return FollowStep::Idle;
        };

        if let Some(target) = path.current()
            && position.distance(target) <= buffer
        {
            path.index += 1;
        }

        match path.current() {
            Some(target) => FollowStep::Moving((target - position).normalize_or_zero()),
            None => {
                self.follow = None;
                FollowStep::Finished
            }
        }
    }

    /// The installed path
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    /// Handle of the running follow task
    #[must_use]
    pub fn follow_handle(&self) -> Option<FollowHandle> {
        self.follow
    }

    /// Whether a follow task is running
    #[must_use]
    pub fn is_following(&self) -> bool {
        self.follow.is_some()
    }

    /// Waypoint the running follow task is heading to
    #[must_use]
    pub fn current_waypoint(&self) -> Option<Vec2> {
        self.follow?;
        self.path.as_ref().and_then(Path::current)
    }
}
