//! Frame driver for every agent in a world
//!
//! Agents are entities carrying an [`AgentContext`]. One [`AiSystem::update`]
//! advances the clock, serves due path requests, ticks every agent and
//! publishes the frame's events.

use std::sync::Arc;

use glam::Vec2;
use hecs::Entity;

use super::context::AgentContext;
use super::fsm::TickContext;
use super::graph::BehaviorGraph;
use super::pathfinding::{PathGrid, PathService};
use super::services::WorldServices;
use crate::core::{BrainConfig, EventQueue, Time};

/// Owns the shared AI resources and drives agents each frame.
#[derive(Debug)]
pub struct AiSystem {
    config: BrainConfig,
    paths: PathService,
    events: EventQueue,
    time: Time,
}

impl AiSystem {
    /// Create a system over a navigation backend
    pub fn new(config: BrainConfig, grid: impl PathGrid + Send + Sync + 'static) -> Self {
        Self {
            config,
            paths: PathService::new(grid),
            events: EventQueue::new(),
            time: Time::new(),
        }
    }

    /// Spawn an agent running `graph`.
    ///
    /// The initial state is entered on the agent's first update.
    pub fn spawn_agent(
        &self,
        world: &mut hecs::World,
        graph: Arc<BehaviorGraph>,
        position: Vec2,
    ) -> Entity {
        let ctx = AgentContext::new(graph, position, self.config.default_collider_radius);
        let entity = world.spawn((ctx,));
        log::debug!("spawned agent {entity:?} at {position}");
        entity
    }

    /// Despawn an agent and drop its outstanding path request
    pub fn despawn_agent(&mut self, world: &mut hecs::World, agent: Entity) -> bool {
        self.paths.cancel(agent);
        world.despawn(agent).is_ok()
    }

    /// Advance every agent by `dt` seconds
    pub fn update(&mut self, world: &mut hecs::World, services: &mut dyn WorldServices, dt: f32) {
        self.time.advance(dt);
        let now = self.time.elapsed();
        let dt = self.time.delta_seconds();

        let served = self.paths.poll(now, &self.config, world, &mut self.events);
        if served > 0 {
            log::trace!("served {served} path requests");
        }

        for (agent, ctx) in world.query_mut::<&mut AgentContext>() {
            let mut tc = TickContext {
                agent,
                now,
                dt,
                config: &self.config,
                services: &mut *services,
                paths: &mut self.paths,
                events: &mut self.events,
            };
            ctx.update(&mut tc);
        }

        self.events.swap();
    }

    /// Movement intention of an agent, if it exists
    #[must_use]
    pub fn intention_of(&self, world: &hecs::World, agent: Entity) -> Option<Vec2> {
        world
            .get::<&AgentContext>(agent)
            .ok()
            .map(|ctx| ctx.movement_intention())
    }

    /// Tuning
    #[must_use]
    pub fn config(&self) -> &BrainConfig {
        &self.config
    }

    /// Mutable tuning
    pub fn config_mut(&mut self) -> &mut BrainConfig {
        &mut self.config
    }

    /// Events published by the last update
    #[must_use]
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Path request queue
    #[must_use]
    pub fn paths(&self) -> &PathService {
        &self.paths
    }

    /// Simulation clock
    #[must_use]
    pub fn time(&self) -> &Time {
        &self.time
    }
}
