pub mod clock;
pub mod fs;
pub mod telemetry;

pub use clock::{now_secs, Clock, ManualClock, SystemClock};
pub use telemetry::init_tracing;
