//! Infrastructure adapters: the event queue, on-disk status markers and the HTTP proxy.

pub mod http;
pub mod queue;
pub mod status_file;

pub use http::HttpProxy;
pub use queue::EventQueue;
pub use status_file::StatusFile;
