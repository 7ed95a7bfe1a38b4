//! Systems - per-tick logic over the ECS world

mod gravity;
mod integration;
mod integrity;
mod observation;
mod reconcile;

pub use gravity::*;
pub use integration::*;
pub use integrity::*;
pub use observation::*;
pub use reconcile::*;
