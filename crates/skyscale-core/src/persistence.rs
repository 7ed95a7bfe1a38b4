//! Save/Load for scenes
//!
//! Bodies are serialized component by component with bincode and respawned
//! on load. The floating origin's accumulated shift is saved with them so
//! absolute positions survive a round trip.

use hecs::World;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use skyscale_logic::vector::Vec3;

use crate::components::*;

/// Version number for the scene format (increment when it changes)
const SCENE_VERSION: u32 = 1;

/// Serializable snapshot of a scene
#[derive(Serialize, Deserialize)]
pub struct SceneData {
    pub version: u32,
    /// Simulation time in seconds
    pub sim_time: f64,
    pub time_scale: f64,
    /// Accumulated origin shift in engine units
    pub origin_shift: Vec3,
    /// Index into `bodies` of the active observer
    pub active_observer: Option<usize>,
    pub bodies: Vec<SerializableBody>,
}

/// Every component a body can carry, as optionals
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct SerializableBody {
    pub name: Option<Name>,
    pub transform: Option<Transform>,
    pub velocity: Option<Velocity>,
    pub mass: Option<Mass>,
    pub gravity_well: Option<GravityWell>,
    pub observer: Option<Observer>,
    pub net_id: Option<NetId>,
    pub frame: Option<FrameMode>,
    pub local_scale: Option<LocalScale>,
}

fn serialize_body(world: &World, entity: hecs::Entity) -> SerializableBody {
    let Ok(e) = world.entity(entity) else {
        return SerializableBody::default();
    };
    SerializableBody {
        name: e.get::<&Name>().as_deref().cloned(),
        transform: e.get::<&Transform>().as_deref().copied(),
        velocity: e.get::<&Velocity>().as_deref().copied(),
        mass: e.get::<&Mass>().as_deref().copied(),
        gravity_well: e.get::<&GravityWell>().as_deref().copied(),
        observer: e.get::<&Observer>().as_deref().copied(),
        net_id: e.get::<&NetId>().as_deref().copied(),
        frame: e.get::<&FrameMode>().as_deref().copied(),
        local_scale: e.get::<&LocalScale>().as_deref().copied(),
    }
}

fn spawn_body(world: &mut World, body: SerializableBody) -> hecs::Entity {
    let mut builder = hecs::EntityBuilder::new();
    if let Some(c) = body.name {
        builder.add(c);
    }
    if let Some(c) = body.transform {
        builder.add(c);
    }
    if let Some(c) = body.velocity {
        builder.add(c);
    }
    if let Some(c) = body.mass {
        builder.add(c);
    }
    if let Some(c) = body.gravity_well {
        builder.add(c);
    }
    if let Some(c) = body.observer {
        builder.add(c);
    }
    if let Some(c) = body.net_id {
        builder.add(c);
    }
    if let Some(c) = body.frame {
        builder.add(c);
    }
    if let Some(c) = body.local_scale {
        builder.add(c);
    }
    world.spawn(builder.build())
}

/// Save a scene to a writer
pub fn save_scene<W: Write>(
    writer: W,
    world: &World,
    sim_time: f64,
    time_scale: f64,
    origin_shift: Vec3,
    active_observer: Option<hecs::Entity>,
) -> Result<(), SaveError> {
    let entities: Vec<hecs::Entity> = world.iter().map(|e| e.entity()).collect();
    let active_observer = active_observer.and_then(|o| entities.iter().position(|e| *e == o));
    let bodies = entities.iter().map(|e| serialize_body(world, *e)).collect();

    let data = SceneData {
        version: SCENE_VERSION,
        sim_time,
        time_scale,
        origin_shift,
        active_observer,
        bodies,
    };
    bincode::serialize_into(writer, &data)?;
    Ok(())
}

/// Load a scene from a reader
pub fn load_scene<R: Read>(reader: R) -> Result<LoadedScene, SaveError> {
    let data: SceneData = bincode::deserialize_from(reader)?;
    if data.version != SCENE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SCENE_VERSION,
            found: data.version,
        });
    }

    let mut world = World::new();
    let spawned: Vec<hecs::Entity> = data
        .bodies
        .into_iter()
        .map(|b| spawn_body(&mut world, b))
        .collect();
    let active_observer = data.active_observer.and_then(|i| spawned.get(i).copied());

    Ok(LoadedScene {
        world,
        sim_time: data.sim_time,
        time_scale: data.time_scale,
        origin_shift: data.origin_shift,
        active_observer,
    })
}

/// Result of loading a scene
pub struct LoadedScene {
    pub world: World,
    pub sim_time: f64,
    pub time_scale: f64,
    pub origin_shift: Vec3,
    pub active_observer: Option<hecs::Entity>,
}

/// Errors that can occur during save/load
#[derive(Debug)]
pub enum SaveError {
    Io(std::io::Error),
    Bincode(Box<bincode::ErrorKind>),
    VersionMismatch { expected: u32, found: u32 },
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SaveError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SaveError::Bincode(e)
    }
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "IO error: {}", e),
            SaveError::Bincode(e) => write!(f, "Serialization error: {}", e),
            SaveError::VersionMismatch { expected, found } => {
                write!(f, "Scene version mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for SaveError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_round_trip() {
        let mut world = World::new();
        let observer = world.spawn((
            Name::new("ship"),
            Transform::at(Vec3::new(1.0, 2.0, 3.0)),
            Observer { id: 4 },
        ));
        world.spawn((
            Name::new("moon"),
            Transform::at(Vec3::new(-5.0, 0.0, 9.0)),
            GravityWell { mass: 7.3e22 },
            FrameMode {
                origin_relative: false,
            },
        ));

        let mut buffer = Vec::new();
        save_scene(&mut buffer, &world, 12.5, 2.0, Vec3::new(100.0, 0.0, 0.0), Some(observer))
            .expect("save");
        let loaded = load_scene(&buffer[..]).expect("load");

        assert_eq!(loaded.sim_time, 12.5);
        assert_eq!(loaded.time_scale, 2.0);
        assert_eq!(loaded.origin_shift, Vec3::new(100.0, 0.0, 0.0));
        assert_eq!(loaded.world.len(), 2);
        let active = loaded.active_observer.expect("observer restored");
        assert_eq!(loaded.world.get::<&Observer>(active).expect("observer").id, 4);
        let wells = loaded.world.query::<(&GravityWell, &FrameMode)>().iter().count();
        assert_eq!(wells, 1);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let data = SceneData {
            version: SCENE_VERSION + 1,
            sim_time: 0.0,
            time_scale: 1.0,
            origin_shift: Vec3::ZERO,
            active_observer: None,
            bodies: Vec::new(),
        };
        let bytes = bincode::serialize(&data).expect("serialize");
        assert!(matches!(
            load_scene(&bytes[..]),
            Err(SaveError::VersionMismatch { .. })
        ));
    }
}
