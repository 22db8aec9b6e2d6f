#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use core::time::Duration;
use std::process::ExitCode;

use clap::Parser;
use config::{CliArgs, Command, RunConfig};
use skid::IdRuntime;
use telemetry::init_telemetry;
use tokio::{signal, sync::broadcast::error::RecvError};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry()?;
    if cfg!(debug_assertions) {
        tracing::debug!("Starting with full config: {:#?}", config);
    }

    let runtime = IdRuntime::start(config.ids)?;
    let code = match config.command {
        Command::Generate {
            entity_type,
            count,
            entity,
        } => generate(&runtime, entity_type, count, entity).await?,
        Command::Parse { id } => parse(&runtime, id)?,
        Command::Verify { entity_id } => verify(&runtime, &entity_id)?,
        Command::Watch { poll_ms } => watch(&runtime, Duration::from_millis(poll_ms)).await?,
    };
    runtime.stop();
    Ok(code)
}

async fn generate(
    runtime: &IdRuntime,
    entity_type: u16,
    count: usize,
    entity: bool,
) -> anyhow::Result<ExitCode> {
    for _ in 0..count {
        if entity {
            let id = runtime.next_id_async(entity_type).await?;
            println!("{}", runtime.entities().generate(id, entity_type));
        } else {
            println!("{}", runtime.next_id_async(entity_type).await?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn parse(runtime: &IdRuntime, id: i64) -> anyhow::Result<ExitCode> {
    let id = runtime.parse(id)?;
    println!(
        "id={} app_id={} app_instance_id={} sequence={} created_at={}",
        id.id(),
        id.app_id(),
        id.app_instance_id(),
        id.sequence(),
        id.created_at().as_secs()
    );
    Ok(ExitCode::SUCCESS)
}

fn verify(runtime: &IdRuntime, text: &str) -> anyhow::Result<ExitCode> {
    let Some(entity) = runtime.parse_entity_str(text) else {
        anyhow::bail!("{text:?} is not a UUID");
    };
    match (entity.source_id(), entity.entity_type_id()) {
        (Some(id), Some(entity_type)) => {
            println!(
                "valid entity_id={} entity_type={} id={} app_id={} app_instance_id={} created_at={}",
                entity,
                entity_type,
                id.id(),
                id.app_id(),
                id.app_instance_id(),
                id.created_at().as_secs()
            );
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            println!("invalid entity_id={entity}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Runs until a termination signal or a catastrophic drift, whichever comes
/// first. Only the latter is a failure.
async fn watch(runtime: &IdRuntime, poll: Duration) -> anyhow::Result<ExitCode> {
    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut drift = runtime.subscribe_drift();
    let mut ticker = tokio::time::interval(poll);

    tracing::info!(poll_ms = poll.as_millis() as u64, "watching clock drift");
    loop {
        #[cfg(unix)]
        let sigterm = terminate.recv();
        #[cfg(not(unix))]
        let sigterm = std::future::pending::<Option<()>>();

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                tracing::info!("Received Ctrl+C signal");
                return Ok(ExitCode::SUCCESS);
            }
            _ = sigterm => {
                tracing::info!("Received SIGTERM signal");
                return Ok(ExitCode::SUCCESS);
            }
            event = drift.recv() => match event {
                Ok(info) => tracing::info!(
                    drift_nanos = info.drift_nanos,
                    system_time = ?info.system_time,
                    "clock re-anchored"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "missed drift events");
                }
                Err(RecvError::Closed) => {}
            },
            _ = ticker.tick() => {
                if runtime.shutdown_requested() {
                    tracing::error!("catastrophic clock drift, restart required");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
}
