//! Pathfinding
//!
//! A* over a walkable grid, behind the [`PathGrid`] trait so hosts can plug in
//! their own navigation, and a [`PathService`] that queues requests, serves a
//! bounded number per poll and hands finished paths to the requesting agent.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use glam::Vec2;
use hecs::Entity;
use rustc_hash::FxHashMap;

use super::context::AgentContext;
use crate::core::{AiEvent, BrainConfig, EventQueue};

/// Navigation backend used by [`PathService`]
pub trait PathGrid {
    /// Waypoints from `start` to `end`, or `None` if unreachable
    fn find_path(&self, start: Vec2, end: Vec2) -> Option<Vec<Vec2>>;
}

/// Grid cell coordinates `(x, y)`
pub type Cell = (usize, usize);

/// A 2D navigation grid
#[derive(Debug, Clone)]
pub struct Grid {
    /// Width in cells
    pub width: usize,
    /// Height in cells
    pub height: usize,
    /// Cell size in world units
    pub cell_size: f32,
    /// World position of the grid's lower-left corner
    pub origin: Vec2,
    walkable: Vec<bool>,
}

impl Grid {
    /// Create a grid with every cell walkable
    #[must_use]
    pub fn new(width: usize, height: usize, cell_size: f32) -> Self {
        Self {
            width,
            height,
            cell_size,
            origin: Vec2::ZERO,
            walkable: vec![true; width * height],
        }
    }

    /// Move the grid's lower-left corner
    #[must_use]
    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    /// Set a cell's walkability; out-of-range cells are ignored
    pub fn set_walkable(&mut self, x: usize, y: usize, walkable: bool) {
        if let Some(i) = self.index((x, y)) {
            self.walkable[i] = walkable;
        }
    }

    /// Whether a cell exists and can be walked on
    #[must_use]
    pub fn is_walkable(&self, x: usize, y: usize) -> bool {
        self.index((x, y)).is_some_and(|i| self.walkable[i])
    }

    /// Cell containing a world position, if it lies on the grid
    #[must_use]
    pub fn cell_at(&self, position: Vec2) -> Option<Cell> {
        let local = (position - self.origin) / self.cell_size;
        if local.x < 0.0 || local.y < 0.0 {
            return None;
        }
        let cell = (local.x as usize, local.y as usize);
        self.index(cell).map(|_| cell)
    }

    /// World position of a cell's center
    #[must_use]
    pub fn cell_center(&self, (x, y): Cell) -> Vec2 {
        self.origin + (Vec2::new(x as f32, y as f32) + 0.5) * self.cell_size
    }

    fn index(&self, (x, y): Cell) -> Option<usize> {
        (x < self.width && y < self.height).then_some(y * self.width + x)
    }

    /// Walkable 4-neighbors of a cell
    fn neighbors(&self, (x, y): Cell) -> impl Iterator<Item = Cell> + '_ {
        const STEPS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        STEPS.into_iter().filter_map(move |(dx, dy)| {
            let next = (x.checked_add_signed(dx)?, y.checked_add_signed(dy)?);
            self.is_walkable(next.0, next.1).then_some(next)
        })
    }
}

fn manhattan(a: Cell, b: Cell) -> u32 {
    (a.0.abs_diff(b.0) + a.1.abs_diff(b.1)) as u32
}

/// A* with unit step costs. The path includes the start and goal cell centers.
impl PathGrid for Grid {
    fn find_path(&self, start: Vec2, end: Vec2) -> Option<Vec<Vec2>> {
        let from = self.cell_at(start)?;
        let goal = self.cell_at(end)?;
        if !self.is_walkable(from.0, from.1) || !self.is_walkable(goal.0, goal.1) {
            return None;
        }

        let mut open = BinaryHeap::new();
        let mut parent: FxHashMap<Cell, Cell> = FxHashMap::default();
        let mut cost: FxHashMap<Cell, u32> = FxHashMap::default();
        cost.insert(from, 0);
        open.push(Reverse((manhattan(from, goal), from)));

        while let Some(Reverse((_, cell))) = open.pop() {
            if cell == goal {
                let mut cells = vec![goal];
                while let Some(&prev) = parent.get(cells.last()?) {
                    cells.push(prev);
                }
                return Some(cells.into_iter().rev().map(|c| self.cell_center(c)).collect());
            }

            let step = cost.get(&cell).copied().unwrap_or(u32::MAX).saturating_add(1);
            for next in self.neighbors(cell) {
                if cost.get(&next).is_some_and(|&known| known <= step) {
                    continue;
                }
                cost.insert(next, step);
                parent.insert(next, cell);
                open.push(Reverse((step + manhattan(next, goal), next)));
            }
        }
        None
    }
}

// ============================================================================
// Path Service
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct PathRequest {
    agent: Entity,
    start: Vec2,
    end: Vec2,
    ready_at: f64,
}

/// Rate-limited path request queue.
///
/// Each agent has at most one outstanding request; a new one replaces it.
pub struct PathService {
    grid: Box<dyn PathGrid + Send + Sync>,
    queue: VecDeque<PathRequest>,
    delivered: u64,
    failed: u64,
}

impl PathService {
    /// Create a service over a navigation backend
    pub fn new(grid: impl PathGrid + Send + Sync + 'static) -> Self {
        Self {
            grid: Box::new(grid),
            queue: VecDeque::new(),
            delivered: 0,
            failed: 0,
        }
    }

    /// Queue a request that may be served from `ready_at` on
    pub fn request(&mut self, agent: Entity, start: Vec2, end: Vec2, ready_at: f64) {
        self.cancel(agent);
        self.queue.push_back(PathRequest {
            agent,
            start,
            end,
            ready_at,
        });
    }

    /// Drop the agent's outstanding request, if any
    pub fn cancel(&mut self, agent: Entity) -> bool {
        let before = self.queue.len();
        self.queue.retain(|r| r.agent != agent);
        self.queue.len() != before
    }

    /// Requests not yet served
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Whether the agent has a request queued
    #[must_use]
    pub fn is_pending(&self, agent: Entity) -> bool {
        self.queue.iter().any(|r| r.agent == agent)
    }

    /// Paths installed since creation
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Requests that found no path since creation
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Serve due requests in arrival order, up to the configured budget.
    ///
    /// Returns the number of requests served. Requests for despawned agents
    /// or agents ignoring paths are consumed without effect.
    pub fn poll(
        &mut self,
        now: f64,
        config: &BrainConfig,
        world: &mut hecs::World,
        events: &mut EventQueue,
    ) -> usize {
        let budget = match config.max_path_requests_per_poll {
            0 => usize::MAX,
            n => n,
        };

        let mut served = 0;
        let mut i = 0;
        while served < budget && i < self.queue.len() {
            if self.queue[i].ready_at > now {
                i += 1;
                continue;
            }
            let Some(request) = self.queue.remove(i) else {
                break;
            };
            served += 1;
            self.serve(request, config, world, events);
        }
        served
    }

    fn serve(
        &mut self,
        request: PathRequest,
        config: &BrainConfig,
        world: &mut hecs::World,
        events: &mut EventQueue,
    ) {
        let Ok(mut ctx) = world.get::<&mut AgentContext>(request.agent) else {
            log::trace!("path for despawned agent {:?} dropped", request.agent);
            return;
        };
        if ctx.path_data.ignore_requests {
            log::trace!("{:?} ignores paths, request dropped", request.agent);
            return;
        }

        match self.grid.find_path(request.start, request.end) {
            Some(waypoints) => {
                self.delivered += 1;
                events.push(AiEvent::PathInstalled {
                    agent: request.agent,
                    waypoints: waypoints.len(),
                });
                ctx.install_path(waypoints);
            }
            None => {
                self.failed += 1;
                log::debug!(
                    "no path for {:?} from {} to {}",
                    request.agent,
                    request.start,
                    request.end
                );
                if config.clear_intention_on_path_failure {
                    ctx.stop();
                }
                events.push(AiEvent::PathFailed {
                    agent: request.agent,
                });
            }
        }
    }
}

impl std::fmt::Debug for PathService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathService")
            .field("pending", &self.queue.len())
            .field("delivered", &self.delivered)
            .field("failed", &self.failed)
            .finish()
    }
}
