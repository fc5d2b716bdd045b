//! # Grid Client
//!
//! A lightweight client runtime for volunteer-computing grid projects.
//!
//! The client repeatedly fetches a work assignment from a project server, downloads
//! its input files, hands it to an application-supplied computation, uploads the
//! results and reports completion. Enough state is kept on disk to resume safely
//! after a crash or restart.
//!
//! ## Core Pieces
//!
//! - **Scheduler**: an event-driven state machine advancing one or two work-unit slots
//!   through their lifecycle, one event per [`core::Scheduler::handle_events`] call
//! - **Event Queue**: time-ordered, FIFO among equal times
//! - **Status Markers**: one atomically replaced `workunit.status` file per slot
//! - **Retry Policy**: fixed or linear backoff with an optional try limit
//! - **Proxy**: the server side behind a trait; [`infra::HttpProxy`] speaks HTTP
//! - **Compute Executors**: the application side; [`runtime::ThreadCompute`] runs
//!   blocking jobs on a dedicated thread, [`runtime::TokioCompute`] spawns async jobs
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use grid_client::builders::SchedulerBuilder;
//! use grid_client::config::Configuration;
//! use grid_client::infra::HttpProxy;
//! use grid_client::runtime::{install_ctrl_c, run, ShutdownFlag, ThreadCompute};
//!
//! let config = Configuration::load("/var/lib/grid")?.shared();
//! let scheduler = SchedulerBuilder::new()
//!     .with_configuration(config.clone())
//!     .with_proxy(HttpProxy::new(config)?)
//!     .with_compute(ThreadCompute::spawn(|wu| my_science(wu))?)
//!     .build()?;
//!
//! let shutdown = ShutdownFlag::new();
//! install_ctrl_c(shutdown.clone());
//! run(&scheduler, &shutdown, Duration::from_secs(1)).await?;
//! scheduler.shutdown();
//! ```
//!
//! For complete flows, see `tests/scheduler_test.rs` and `tests/recovery_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: work units, events, retry and the scheduler.
pub mod core;
/// Configuration models: scheduler tuning and the client parameter store.
pub mod config;
/// Builders to construct the scheduler from configuration.
pub mod builders;
/// Infrastructure adapters for the event queue, status markers and the HTTP proxy.
pub mod infra;
/// Runtime glue: driving loop, signal handling and compute executors.
pub mod runtime;
/// Shared utilities.
pub mod util;
