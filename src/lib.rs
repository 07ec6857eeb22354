pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod ecs;
pub mod scripts;
pub mod stage;
pub mod state;
pub mod time;

pub use app::{run, Simulation};
