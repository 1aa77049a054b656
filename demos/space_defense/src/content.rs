//! Game content: component types, tags, entity templates, and the opening
//! battlefield layout.

use mosaic_ecs::{ComponentKey, ComponentType, EntityTemplate, WorldTemplate, tag};
use serde_json::{Value, json};

use crate::sim::GameCtx;
use crate::systems::{
    Collisions, EnemyCombat, EnemyMovement, HandleDestroyed, MoveLasers, PlayerGunnery, Referee,
    UpdateCountdown,
};

pub const FIELD_HEIGHT: f64 = 720.0;
/// Enemies patrol between these x bounds.
pub const ENEMY_MIN_X: f64 = 20.0;
pub const ENEMY_MAX_X: f64 = 1260.0;

pub const POSITION: ComponentKey = ComponentKey::from_name("position");
pub const SPEED: ComponentKey = ComponentKey::from_name("speed");
pub const COUNTDOWN: ComponentKey = ComponentKey::from_name("countdown");
pub const ENEMY_AI: ComponentKey = ComponentKey::from_name("enemy_ai");
pub const LASER: ComponentKey = ComponentKey::from_name("laser");
pub const PLAYER_OWNED: ComponentKey = ComponentKey::from_name("player_owned");
pub const ENEMY_OWNED: ComponentKey = ComponentKey::from_name("enemy_owned");
pub const DESTROYED: ComponentKey = ComponentKey::from_name("destroyed");
pub const ATTACKING: ComponentKey = ComponentKey::from_name("attacking");

fn position_type() -> ComponentType {
    ComponentType::declare("position")
        .attribute("x", json!(0.0))
        .attribute("y", json!(0.0))
}

fn speed_type() -> ComponentType {
    ComponentType::declare("speed").attribute("speed", json!(0.0))
}

/// Spawn templates the systems need at runtime, carried in the step
/// context.
pub struct Content {
    pub explosion: EntityTemplate,
    pub player_laser: EntityTemplate,
    pub enemy_laser: EntityTemplate,
}

impl Content {
    #[must_use]
    pub fn new() -> Self {
        let position = position_type();
        let speed = speed_type();
        let countdown = ComponentType::declare("countdown").attribute("remaining", json!(30));

        Self {
            explosion: EntityTemplate::new("explosion")
                .component(&position, Value::Null)
                .component(&countdown, Value::Null),
            player_laser: EntityTemplate::new("player_laser")
                .component(&position, Value::Null)
                .component(&speed, json!({ "speed": -16.0 }))
                .component(&tag("laser"), Value::Null)
                .component(&tag("player_owned"), Value::Null),
            enemy_laser: EntityTemplate::new("enemy_laser")
                .component(&position, Value::Null)
                .component(&speed, json!({ "speed": 9.0 }))
                .component(&tag("laser"), Value::Null)
                .component(&tag("enemy_owned"), Value::Null),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::new()
    }
}

/// Lays out the opening battlefield: the player's cannon at the bottom of
/// the field and a 3×10 enemy grid patrolling the top, with the full
/// system roster in execution order.
#[must_use]
pub fn world_template() -> WorldTemplate<GameCtx> {
    let position = position_type();
    let speed = speed_type();

    let player = EntityTemplate::new("player")
        .component(&position, json!({ "x": 620.0, "y": 640.0 }))
        .component(&speed, json!({ "speed": 10.0 }))
        .component(&tag("player_owned"), Value::Null);

    let enemy = EntityTemplate::new("enemy")
        .component(&position, Value::Null)
        .component(&speed, json!({ "speed": 3.0 }))
        .component(&tag("enemy_ai"), Value::Null);

    let mut template = WorldTemplate::new().entity_named(&player, Value::Null, "player");
    for row in 0..3 {
        for col in 0..10 {
            let x = 80.0 + f64::from(col) * 120.0;
            let y = 60.0 + f64::from(row) * 70.0;
            template = template.entity(&enemy, json!({ "position": { "x": x, "y": y } }));
        }
    }

    template
        .system::<EnemyMovement>()
        .system::<EnemyCombat>()
        .system::<PlayerGunnery>()
        .system::<MoveLasers>()
        .system::<Collisions>()
        .system::<UpdateCountdown>()
        .system::<HandleDestroyed>()
        .system::<Referee>()
}
