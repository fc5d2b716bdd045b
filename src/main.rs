//! Demo client binary.
//!
//! Attaches to one project and runs a placeholder computation for every work unit.
//! Settings come from the environment (a `.env` file is honoured):
//!
//! - `GRID_PROJECT_DIR`: state directory (default `./grid-project`)
//! - `GRID_PROJECT_URL`: project master URL, required on first run
//! - `GRID_EMAIL`, `GRID_PASSWORD`: account credentials, required on first run
//! - `GRID_SCHEDULER_CONFIG`: optional JSON with scheduler tuning

use std::fs;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tracing::info;

use grid_client::builders::SchedulerBuilder;
use grid_client::config::{Configuration, Parameter, SchedulerConfig};
use grid_client::core::{AppResult, ClientResult, WorkUnit};
use grid_client::infra::HttpProxy;
use grid_client::runtime::{install_ctrl_c, run, ShutdownFlag, ThreadCompute};
use grid_client::util::fs::password_hash;
use grid_client::util::init_tracing;

/// Stand-in for real science: wait a little, then produce every expected output.
fn placeholder_compute(workunit: &WorkUnit) -> ClientResult<()> {
    thread::sleep(Duration::from_secs(2));
    let manifest = &workunit.manifest;
    for id in manifest.output_files() {
        if let Some(file) = manifest.file(id) {
            let contents = format!(
                "{} computed by {}\n",
                workunit.name().unwrap_or("unnamed"),
                env!("CARGO_PKG_NAME")
            );
            fs::write(workunit.file_path(file), contents)?;
        }
    }
    Ok(())
}

fn load_configuration() -> AppResult<Configuration> {
    let dir = std::env::var("GRID_PROJECT_DIR").unwrap_or_else(|_| "grid-project".into());
    let mut config = Configuration::load(&dir).with_context(|| format!("loading configuration from {dir}"))?;

    if let Ok(url) = std::env::var("GRID_PROJECT_URL") {
        config.set_text(Parameter::ProjectUrl, url)?;
    }
    if let (Ok(email), Ok(password)) = (std::env::var("GRID_EMAIL"), std::env::var("GRID_PASSWORD")) {
        config.set_text(Parameter::PasswordHash, password_hash(&email, &password))?;
        config.set_text(Parameter::UserEmail, email)?;
    }
    config.validate().map_err(|e| anyhow!("invalid configuration: {e}"))?;
    config.store()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = match std::env::var("GRID_SCHEDULER_CONFIG") {
        Ok(json) => SchedulerConfig::from_json_str(&json).map_err(|e| anyhow!(e))?,
        Err(_) => SchedulerConfig::default(),
    };
    let idle = Duration::from_millis(settings.idle_poll_ms);

    let config = load_configuration()?.shared();
    info!(
        "attaching to {}",
        config.read().text_or_empty(Parameter::ProjectUrl)
    );

    let compute = ThreadCompute::spawn(placeholder_compute)?;
    let scheduler = SchedulerBuilder::new()
        .with_settings(settings)
        .with_configuration(config.clone())
        .with_proxy(HttpProxy::new(config)?)
        .with_compute(compute)
        .with_listener(|slot: usize| tracing::debug!(slot, "slot status changed"))
        .build()?;

    let shutdown = ShutdownFlag::new();
    install_ctrl_c(shutdown.clone());
    let outcome = run(&scheduler, &shutdown, idle).await;

    let discarded = scheduler.shutdown();
    info!("stopped with {} pending event(s)", discarded);
    outcome?;
    Ok(())
}
