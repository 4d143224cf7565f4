//! Game simulation modules

pub mod collision;
pub mod combat;
pub mod entities;
pub mod map;
pub mod r#match;
pub mod pathfinding;
pub mod physics;
pub mod scheduler;
pub mod snapshot;
pub mod wave;

pub use map::{ConnectivityPolicy, MapGenError, MapGenerator, TileMap};
pub use r#match::{GameMatch, LaunchError, MatchPhase, MatchSettings};
pub use scheduler::MatchLoop;
