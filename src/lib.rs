//! Zombie Arena - authoritative survival arena simulation
//!
//! Players and bots hold out against waves of zombies on a procedurally
//! generated tile map. The crate owns the simulation; transports plug in
//! through [`net::ArenaHandle`].

pub mod config;
pub mod game;
pub mod net;
pub mod util;
