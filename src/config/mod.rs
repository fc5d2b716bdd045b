//! Configuration: scheduler tuning and the persistent client parameter store.

pub mod parameters;
pub mod scheduler;
pub mod store;

pub use parameters::{Parameter, ParameterDef, ValueKind};
pub use scheduler::{SchedulerConfig, MAX_SLOTS};
pub use store::{Configuration, SharedConfiguration};
