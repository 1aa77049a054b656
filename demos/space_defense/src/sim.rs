//! The headless simulation loop and its run configuration.

use anyhow::Result;
use mosaic_ecs::World;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::content::{self, Content};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every enemy destroyed.
    Victory { score: u32 },
    /// The player took too many hits.
    Defeat { score: u32 },
    /// The tick budget elapsed with no decision.
    TimedOut,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Victory { score } => write!(f, "victory with {score} points"),
            Self::Defeat { score } => write!(f, "defeat with {score} points"),
            Self::TimedOut => write!(f, "undecided"),
        }
    }
}

/// Mutable battle state handed to every system as the step context.
pub struct GameCtx {
    pub rng: StdRng,
    pub content: Content,
    pub score: u32,
    pub hits_taken: u32,
    pub cooldown: u32,
    pub outcome: Option<Outcome>,
}

impl GameCtx {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            content: Content::new(),
            score: 0,
            hits_taken: 0,
            cooldown: 0,
            outcome: None,
        }
    }
}

/// Configuration for a headless run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Stop after this many steps when the battle stays undecided.
    pub max_ticks: u64,
    /// Seed for the enemy fire rolls, so runs are reproducible.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_ticks: 3600,
            seed: 7,
        }
    }
}

/// One battle: the world, its step context, and the stop conditions.
pub struct Simulation {
    config: SimConfig,
    world: World<GameCtx>,
    ctx: GameCtx,
}

impl Simulation {
    /// Builds the opening battlefield.
    pub fn new(config: SimConfig) -> Result<Self> {
        let world = content::world_template().build()?;
        let ctx = GameCtx::new(config.seed);
        info!(
            entities = world.len(),
            systems = world.system_names().count(),
            seed = config.seed,
            "battlefield ready"
        );
        Ok(Self { config, world, ctx })
    }

    /// Steps until an outcome is reached or the tick budget elapses.
    pub fn run(&mut self) -> Result<Outcome> {
        while self.ctx.outcome.is_none() && self.world.ticks() < self.config.max_ticks {
            self.world.step(&mut self.ctx)?;
            if self.world.ticks() % 300 == 0 {
                debug!(
                    tick = self.world.ticks(),
                    entities = self.world.len(),
                    score = self.ctx.score,
                    hits = self.ctx.hits_taken,
                    "battle in progress"
                );
            }
        }
        let outcome = self.ctx.outcome.unwrap_or(Outcome::TimedOut);
        info!(tick = self.world.ticks(), %outcome, "battle over");
        Ok(outcome)
    }

    #[must_use]
    pub fn world(&self) -> &World<GameCtx> {
        &self.world
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.ctx.score
    }
}
