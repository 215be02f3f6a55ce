use std::str::FromStr;

use serde::Serialize;

use crate::device::{CommandOutcome, ProjectorController, ProjectorSnapshot};

/// Requests the messaging side can make of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerRequest {
    On,
    Off,
    Toggle,
    Status,
}

impl FromStr for PowerRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "on" => Ok(PowerRequest::On),
            "off" => Ok(PowerRequest::Off),
            "toggle" => Ok(PowerRequest::Toggle),
            "status" => Ok(PowerRequest::Status),
            other => Err(format!("Unknown request: {}", other)),
        }
    }
}

/// Reply sent back for a request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PowerReply {
    Outcome(CommandOutcome),
    Snapshot(ProjectorSnapshot),
}

/// Run a request against the controller.
pub async fn dispatch(controller: &ProjectorController, request: PowerRequest) -> Result<PowerReply, String> {
    let outcome = match request {
        PowerRequest::On => controller.power_on().await,
        PowerRequest::Off => controller.power_off().await,
        PowerRequest::Toggle => controller.toggle().await,
        PowerRequest::Status => return Ok(PowerReply::Snapshot(controller.snapshot())),
    };

    outcome
        .map(PowerReply::Outcome)
        .map_err(|e| format!("Failed to run {:?}: {}", request, e))
}
