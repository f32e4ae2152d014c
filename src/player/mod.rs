pub mod client;
pub mod launcher;
pub mod status;

pub use client::{PollError, StatusClient, StatusSource};
pub use launcher::{LaunchedPlayer, PlayerLauncher};
pub use status::{PlayerState, Sample};
