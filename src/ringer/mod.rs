pub mod audio;
pub mod controller;
pub mod feedback;
pub mod state;
pub mod surface;
#[cfg(feature = "audio")]
pub mod tone;

pub use controller::{Ringer, RingerConfig, RingerSnapshot};
pub use state::{RingRequest, RingerCommand, RingerState, RingerStatus, Transition};
