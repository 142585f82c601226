pub mod clock;
pub mod config;
pub mod effects;
pub mod harness;
pub mod host;
pub mod manager;
pub mod observer;
pub mod registry;

pub use manager::LoadingManager;
