//! The battle behaviors: movement, combat, cleanup, and the referee that
//! calls the outcome.

use mosaic_ecs::{EntityId, Filter, Step, System, SystemResult, World, tag};
use rand::Rng;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::content::{
    ATTACKING, COUNTDOWN, DESTROYED, ENEMY_AI, ENEMY_MAX_X, ENEMY_MIN_X, FIELD_HEIGHT, LASER,
    PLAYER_OWNED, POSITION, SPEED,
};
use crate::sim::{GameCtx, Outcome};

/// Hit box half-extent for laser collisions.
const HIT_RADIUS: f64 = 40.0;
/// Chance a single enemy fires on a single step.
const FIRE_CHANCE: f64 = 0.004;
/// Steps between player shots.
const GUN_COOLDOWN: u32 = 12;
/// Enemy-laser hits the player survives.
pub const MAX_HITS: u32 = 3;

fn position_of(world: &World<GameCtx>, id: EntityId) -> Option<(f64, f64)> {
    let component = world.get_component(id, POSITION)?;
    Some((
        component.get("x").and_then(Value::as_f64)?,
        component.get("y").and_then(Value::as_f64)?,
    ))
}

/// Patrols enemies along x, reversing their speed at the field edges.
#[derive(Default)]
pub struct EnemyMovement;

impl System<GameCtx> for EnemyMovement {
    fn name() -> &'static str {
        "enemy_movement"
    }

    fn filter() -> Filter {
        Filter::new()
            .component(POSITION)
            .component(SPEED)
            .component(ENEMY_AI)
    }

    fn tick(&mut self, _ctx: &mut GameCtx, step: &mut Step<'_, GameCtx>) -> SystemResult {
        for &id in step.entities {
            let speed = step
                .world
                .component(id, SPEED)?
                .get("speed")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let position = step.world.component_mut(id, POSITION)?;
            let x = position.get("x").and_then(Value::as_f64).unwrap_or(0.0) + speed;
            position.set("x", json!(x))?;
            if !(ENEMY_MIN_X..=ENEMY_MAX_X).contains(&x) {
                step.world
                    .component_mut(id, SPEED)?
                    .set("speed", json!(-speed))?;
            }
        }
        Ok(())
    }
}

/// Rolls each enemy's fire chance; firing enemies flash the attacking tag
/// and drop a laser from their position.
#[derive(Default)]
pub struct EnemyCombat;

impl System<GameCtx> for EnemyCombat {
    fn name() -> &'static str {
        "enemy_combat"
    }

    fn filter() -> Filter {
        Filter::new().component(POSITION).component(ENEMY_AI)
    }

    fn tick(&mut self, ctx: &mut GameCtx, step: &mut Step<'_, GameCtx>) -> SystemResult {
        for &id in step.entities {
            if !ctx.rng.gen_bool(FIRE_CHANCE) {
                if step.world.has_component(id, ATTACKING) {
                    step.world.remove_component(id, ATTACKING)?;
                }
                continue;
            }
            let Some((x, y)) = position_of(step.world, id) else {
                continue;
            };
            step.world
                .add_component(id, tag("attacking").construct(Value::Null)?)?;
            step.world.spawn(
                &ctx.content.enemy_laser,
                json!({ "position": { "x": x, "y": y + 20.0 } }),
            )?;
            debug!(enemy = %id, "enemy fired");
        }
        Ok(())
    }
}

/// Slides the player's cannon toward the nearest enemy column and fires
/// once lined up and off cooldown.
#[derive(Default)]
pub struct PlayerGunnery;

impl System<GameCtx> for PlayerGunnery {
    fn name() -> &'static str {
        "player_gunnery"
    }

    fn filter() -> Filter {
        Filter::new().component(POSITION).component(ENEMY_AI)
    }

    fn tick(&mut self, ctx: &mut GameCtx, step: &mut Step<'_, GameCtx>) -> SystemResult {
        ctx.cooldown = ctx.cooldown.saturating_sub(1);
        let Some(player) = step.world.named("player") else {
            return Ok(());
        };
        let Some((px, py)) = position_of(step.world, player) else {
            return Ok(());
        };

        let mut target: Option<f64> = None;
        for &id in step.entities {
            if let Some((ex, _)) = position_of(step.world, id) {
                if target.map_or(true, |best| (ex - px).abs() < (best - px).abs()) {
                    target = Some(ex);
                }
            }
        }
        let Some(tx) = target else {
            return Ok(());
        };

        let speed = step
            .world
            .component(player, SPEED)?
            .get("speed")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let dx = (tx - px).clamp(-speed.abs(), speed.abs());
        let x = px + dx;
        step.world.component_mut(player, POSITION)?.set("x", json!(x))?;

        if (tx - x).abs() <= HIT_RADIUS && ctx.cooldown == 0 {
            ctx.cooldown = GUN_COOLDOWN;
            step.world.spawn(
                &ctx.content.player_laser,
                json!({ "position": { "x": x, "y": py - 20.0 } }),
            )?;
            debug!(x, "player fired");
        }
        Ok(())
    }
}

/// Flies lasers along y and marks the ones leaving the field.
#[derive(Default)]
pub struct MoveLasers;

impl System<GameCtx> for MoveLasers {
    fn name() -> &'static str {
        "move_lasers"
    }

    fn filter() -> Filter {
        Filter::new()
            .component(POSITION)
            .component(SPEED)
            .component(LASER)
    }

    fn tick(&mut self, _ctx: &mut GameCtx, step: &mut Step<'_, GameCtx>) -> SystemResult {
        for &id in step.entities {
            let speed = step
                .world
                .component(id, SPEED)?
                .get("speed")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let position = step.world.component_mut(id, POSITION)?;
            let y = position.get("y").and_then(Value::as_f64).unwrap_or(0.0) + speed;
            position.set("y", json!(y))?;
            if !(0.0..=FIELD_HEIGHT).contains(&y) && !step.world.has_component(id, DESTROYED) {
                step.world
                    .add_component(id, tag("destroyed").construct(Value::Null)?)?;
            }
        }
        Ok(())
    }
}

/// Tests laser hit boxes: player lasers against the enemy grid, enemy
/// lasers against the player.
#[derive(Default)]
pub struct Collisions;

impl System<GameCtx> for Collisions {
    fn name() -> &'static str {
        "collisions"
    }

    fn filter() -> Filter {
        Filter::new().component(POSITION).component(LASER)
    }

    fn tick(&mut self, ctx: &mut GameCtx, step: &mut Step<'_, GameCtx>) -> SystemResult {
        let enemies = step
            .world
            .query(&Filter::new().component(POSITION).component(ENEMY_AI));
        let player_pos = step
            .world
            .named("player")
            .and_then(|id| position_of(step.world, id));

        for &laser in step.entities {
            if step.world.has_component(laser, DESTROYED) {
                continue;
            }
            let Some((lx, ly)) = position_of(step.world, laser) else {
                continue;
            };

            if step.world.has_component(laser, PLAYER_OWNED) {
                for &enemy in &enemies {
                    if step.world.has_component(enemy, DESTROYED) {
                        continue;
                    }
                    let Some((ex, ey)) = position_of(step.world, enemy) else {
                        continue;
                    };
                    if (lx - ex).abs() <= HIT_RADIUS && (ly - ey).abs() <= HIT_RADIUS {
                        step.world
                            .add_component(enemy, tag("destroyed").construct(Value::Null)?)?;
                        step.world
                            .add_component(laser, tag("destroyed").construct(Value::Null)?)?;
                        debug!(enemy = %enemy, "enemy hit");
                        break;
                    }
                }
            } else if let Some((px, py)) = player_pos {
                if (lx - px).abs() <= HIT_RADIUS && (ly - py).abs() <= HIT_RADIUS {
                    ctx.hits_taken += 1;
                    step.world
                        .add_component(laser, tag("destroyed").construct(Value::Null)?)?;
                    info!(hits = ctx.hits_taken, "player hit");
                }
            }
        }
        Ok(())
    }
}

/// Counts explosion timers down and marks finished ones for cleanup.
#[derive(Default)]
pub struct UpdateCountdown;

impl System<GameCtx> for UpdateCountdown {
    fn name() -> &'static str {
        "update_countdown"
    }

    fn filter() -> Filter {
        Filter::new().component(COUNTDOWN)
    }

    fn tick(&mut self, _ctx: &mut GameCtx, step: &mut Step<'_, GameCtx>) -> SystemResult {
        for &id in step.entities {
            let countdown = step.world.component_mut(id, COUNTDOWN)?;
            let remaining = countdown
                .get("remaining")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            if remaining == 0 {
                continue;
            }
            countdown.set("remaining", json!(remaining - 1))?;
            if remaining == 1 {
                step.world
                    .add_component(id, tag("destroyed").construct(Value::Null)?)?;
            }
        }
        Ok(())
    }
}

/// Removes entities marked destroyed, scoring enemies and leaving a brief
/// explosion where they were.
#[derive(Default)]
pub struct HandleDestroyed;

impl System<GameCtx> for HandleDestroyed {
    fn name() -> &'static str {
        "handle_destroyed"
    }

    fn filter() -> Filter {
        Filter::new().component(DESTROYED)
    }

    fn tick(&mut self, ctx: &mut GameCtx, step: &mut Step<'_, GameCtx>) -> SystemResult {
        for &id in step.entities {
            if !step.world.contains(id) {
                continue;
            }
            let entity = step.world.remove_entity(id)?;
            if entity.kind() != "enemy" {
                continue;
            }
            ctx.score += 100;
            let x = entity
                .get(POSITION)
                .and_then(|component| component.get("x"))
                .and_then(Value::as_f64);
            let y = entity
                .get(POSITION)
                .and_then(|component| component.get("y"))
                .and_then(Value::as_f64);
            if let (Some(x), Some(y)) = (x, y) {
                step.world.spawn(
                    &ctx.content.explosion,
                    json!({ "position": { "x": x, "y": y } }),
                )?;
            }
            debug!(entity = %id, score = ctx.score, "enemy destroyed");
        }
        Ok(())
    }
}

/// Calls the battle: victory once the grid is cleared, defeat once the
/// player has taken too many hits.
#[derive(Default)]
pub struct Referee;

impl System<GameCtx> for Referee {
    fn name() -> &'static str {
        "referee"
    }

    fn filter() -> Filter {
        Filter::new().component(ENEMY_AI)
    }

    fn tick(&mut self, ctx: &mut GameCtx, step: &mut Step<'_, GameCtx>) -> SystemResult {
        if ctx.outcome.is_some() {
            return Ok(());
        }
        if ctx.hits_taken >= MAX_HITS {
            ctx.outcome = Some(Outcome::Defeat { score: ctx.score });
            info!(score = ctx.score, "cannon overrun");
        } else if step.world.query(&Self::filter()).is_empty() {
            ctx.outcome = Some(Outcome::Victory { score: ctx.score });
            info!(score = ctx.score, "grid cleared");
        }
        Ok(())
    }
}
