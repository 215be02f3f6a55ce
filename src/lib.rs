pub mod commands;
pub mod config;
pub mod device;
pub mod logging;
pub mod serial;

pub use config::AppConfig;
pub use device::{ControllerContext, PollScheduler, ProjectorController};
