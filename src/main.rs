//! Headless demo: a pack of chasers hunting a target that circles the room
//!
//! Run with `RUST_LOG=debug` to see state switches. An optional first
//! argument names a RON file with [`BrainConfig`] overrides.

use std::sync::Arc;

use ai_engine::hecs::{self, Entity};
use ai_engine::prelude::*;
use rustc_hash::FxHashMap;

const GRAPH: &str = include_str!("../assets/graphs/chaser.ron");
const ROOM: usize = 24;
const SPEED: f32 = 3.0;
const DT: f32 = 1.0 / 30.0;
const FRAMES: u32 = 600;

/// Room with a wall segment, a circling target and a few agents
struct DemoWorld {
    player: Entity,
    positions: FxHashMap<Entity, Vec2>,
    walls: Vec<Vec2>,
    agents: Vec<Entity>,
    hits: usize,
}

impl DemoWorld {
    fn blocked_at(&self, point: Vec2, radius: f32) -> bool {
        self.walls.iter().any(|w| w.distance(point) <= 0.5 + radius)
    }

    fn sweep(&self, origin: Vec2, radius: f32, direction: Vec2, range: f32) -> bool {
        let steps = (range / 0.25).ceil() as usize;
        (1..=steps).any(|i| {
            let t = (i as f32 * 0.25).min(range);
            self.blocked_at(origin + direction * t, radius)
        })
    }
}

impl WorldServices for DemoWorld {
    fn target(&self) -> Option<Entity> {
        Some(self.player)
    }

    fn position_of(&self, entity: Entity) -> Option<Vec2> {
        self.positions.get(&entity).copied()
    }

    fn raycast(&self, origin: Vec2, direction: Vec2, range: f32, _layers: LayerMask) -> bool {
        self.sweep(origin, 0.0, direction, range)
    }

    fn circlecast(
        &self,
        origin: Vec2,
        radius: f32,
        direction: Vec2,
        range: f32,
        _layers: LayerMask,
    ) -> bool {
        self.sweep(origin, radius, direction, range)
    }

    fn obstacles_near(&self, position: Vec2, radius: f32) -> Vec<Vec2> {
        self.walls
            .iter()
            .copied()
            .filter(|w| w.distance(position) <= radius)
            .collect()
    }

    fn living_allies(&self) -> Vec<Entity> {
        self.agents.clone()
    }

    fn play(&mut self, effect: &str, targets: &[Entity]) {
        if effect == "bite" {
            self.hits += targets.len();
        }
        log::info!("effect '{effect}' on {} target(s)", targets.len());
    }
}

fn load_config() -> BrainConfig {
    let Some(path) = std::env::args().nth(1) else {
        return BrainConfig::default();
    };
    match BrainConfig::load_ron(&path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{path}: {e}; using defaults");
            BrainConfig::default()
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let graph = match BehaviorGraph::from_ron_str(GRAPH) {
        Ok(graph) => Arc::new(graph),
        Err(e) => {
            eprintln!("Graph error: {e}");
            return;
        }
    };

    let mut grid = Grid::new(ROOM, ROOM, 1.0);
    let mut walls = Vec::new();
    for y in 4..16 {
        grid.set_walkable(12, y, false);
        walls.push(grid.cell_center((12, y)));
    }

    let mut world = hecs::World::new();
    let player = world.spawn(());
    let mut system = AiSystem::new(load_config(), grid);

    let mut services = DemoWorld {
        player,
        positions: FxHashMap::default(),
        walls,
        agents: Vec::new(),
        hits: 0,
    };
    for spawn in [Vec2::new(3.5, 3.5), Vec2::new(3.5, 20.5), Vec2::new(20.5, 10.5)] {
        let agent = system.spawn_agent(&mut world, graph.clone(), spawn);
        services.positions.insert(agent, spawn);
        services.agents.push(agent);
    }

    let center = Vec2::splat(ROOM as f32 / 2.0);
    for frame in 0..FRAMES {
        let angle = frame as f32 * DT * 0.4;
        let target = center + Vec2::new(angle.cos(), angle.sin()) * 8.0;
        services.positions.insert(player, target);

        system.update(&mut world, &mut services, DT);

        for (agent, ctx) in world.query_mut::<&mut AgentContext>() {
            let moved = ctx.position + ctx.movement_intention() * SPEED * DT;
            ctx.position = moved.clamp(Vec2::ZERO, Vec2::splat(ROOM as f32));
            services.positions.insert(agent, ctx.position);
        }

        for event in system.events().iter() {
            if let AiEvent::StateChanged { agent, to, .. } = event {
                log::info!("frame {frame}: {agent:?} -> {}", graph.state(*to).name());
            }
        }
    }

    log::info!(
        "{} bites landed, {} paths delivered, {} failed",
        services.hits,
        system.paths().delivered(),
        system.paths().failed()
    );
}
