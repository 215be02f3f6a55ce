use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use projector_control_lib::commands::{self, PowerRequest};
use projector_control_lib::device::{Connectivity, StateEvent};
use projector_control_lib::{logging, AppConfig, ControllerContext, PollScheduler, ProjectorController};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init(log::LevelFilter::Info, None);
            log::error!("Unable to load configuration: {}", e);
            return Err(e).context("Invalid configuration");
        }
    };
    let log_file = match &config.log_path {
        Some(dir) => Some(
            logging::DailyLogFile::open(dir, config.log_retention_days)
                .with_context(|| format!("Unable to open log file in {}", dir.display()))?,
        ),
        None => None,
    };
    logging::init(config.log_level, log_file);
    log::info!("Configuration loaded: {}", serde_json::to_string(&config)?);

    let profile = config
        .profile()
        .context("Configured projector has no device profile")?;
    let context = ControllerContext::new(config.projector_name.clone(), profile, config.projector_port.clone())
        .with_lamp_hours_every(config.lamp_hours_every);

    log::info!("Starting up projector controller...");
    let controller = Arc::new(ProjectorController::connect(context).await);
    if controller.snapshot().connectivity == Connectivity::Disconnected {
        log::warn!("Projector not reachable on {}, will keep retrying", config.projector_port);
    }

    let scheduler = PollScheduler::start(controller.clone(), config.poll_interval());
    let publisher = tokio::spawn(publish_events(controller.clone()));

    // Stand-in for the message bus: one request per line on stdin
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => handle_request(&controller, &line).await,
                    Ok(None) => {
                        // stdin closed; keep polling until interrupted
                        tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
                        log::info!("Shutting down");
                        break;
                    }
                    Err(e) => log::warn!("Failed to read request: {}", e),
                }
            }
        }
    }

    scheduler.stop().await;
    controller.shutdown().await;
    publisher.abort();
    Ok(())
}

async fn handle_request(controller: &ProjectorController, line: &str) {
    let request = match line.parse::<PowerRequest>() {
        Ok(request) => request,
        Err(e) => {
            log::warn!("{}", e);
            return;
        }
    };

    match commands::dispatch(controller, request).await {
        Ok(reply) => match serde_json::to_string(&reply) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("Failed to encode reply: {}", e),
        },
        Err(e) => log::error!("{}", e),
    }
}

async fn publish_events(controller: Arc<ProjectorController>) {
    let mut events = controller.subscribe();
    loop {
        match events.recv().await {
            Ok(event) => {
                let topic = match &event {
                    StateEvent::PowerChanged { .. } => "power",
                    StateEvent::ConnectivityChanged { .. } => "availability",
                };
                match serde_json::to_string(event.snapshot()) {
                    Ok(json) => log::info!("State change [{}/{}]: {}", controller.name(), topic, json),
                    Err(e) => log::error!("Failed to encode snapshot: {}", e),
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Event publisher lagged, skipped {} events", skipped);
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
