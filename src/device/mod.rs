pub mod clock;
pub mod controller;
pub mod models;
pub mod profiles;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{ControllerContext, ProjectorController, DEFAULT_LAMP_HOURS_EVERY};
pub use models::*;
pub use profiles::{Command, DeviceProfile, Handshake, ProfileCommands, SUPPORTED_PROFILES};
pub use scheduler::{PollScheduler, SchedulerHandle, DEFAULT_POLL_INTERVAL};
