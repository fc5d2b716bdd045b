//! Unit tests for individual components

mod builders_test;
mod config_test;
mod queue_test;
mod retry_test;
mod runtime_test;
mod status_test;
mod util_test;
