//! # space_defense — headless battle simulation
//!
//! Drives the ECS runtime through a complete battle: a 3×10 enemy grid
//! patrols the top of the field while the player's cannon slides underneath
//! it, both sides trading laser fire until the grid is cleared, the cannon
//! is overrun, or the tick budget runs out.
//!
//! Run with `RUST_LOG=space_defense=debug` for per-step detail.

mod content;
mod sim;
mod systems;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sim::{SimConfig, Simulation};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("space_defense=info".parse()?),
        )
        .init();

    info!("space defense starting");

    let config = SimConfig::default();
    let mut simulation = Simulation::new(config)?;
    let outcome = simulation.run()?;

    info!(%outcome, "space defense finished");
    Ok(())
}
