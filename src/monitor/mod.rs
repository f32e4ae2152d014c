pub mod controller;
pub mod events;
pub mod reconciler;
pub mod state;
pub mod store;

pub use controller::MonitorController;
pub use events::{EndReason, MonitorEvent};
pub use reconciler::{Reconciler, Reconciliation, SessionProgress};
pub use state::{MonitorState, MonitorStatus};
pub use store::WatchStore;
