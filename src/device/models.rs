use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the serial link to the projector is usable
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Disconnected,
    Online,
}

/// Last known power state reported by the projector
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Unknown,
    On,
    Off,
}

impl PowerState {
    /// Map a status reply onto a power state. Anything but `ON`/`OFF` is `None`.
    pub fn from_reply(value: &str) -> Option<Self> {
        match value {
            "ON" => Some(PowerState::On),
            "OFF" => Some(PowerState::Off),
            _ => None,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Unknown => write!(f, "unknown"),
            PowerState::On => write!(f, "on"),
            PowerState::Off => write!(f, "off"),
        }
    }
}

/// Mutable projector state, owned by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectorState {
    pub connectivity: Connectivity,
    pub power: PowerState,
    pub model: Option<String>,
    /// Raw lamp counter as reported; the device does not state the unit.
    pub lamp_hours: Option<u64>,
    pub last_off_at: Option<DateTime<Utc>>,
    pub cooldown_remaining_secs: Option<u64>,
}

impl ProjectorState {
    pub fn new() -> Self {
        Self {
            connectivity: Connectivity::Disconnected,
            power: PowerState::Unknown,
            model: None,
            lamp_hours: None,
            last_off_at: None,
            cooldown_remaining_secs: None,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self.connectivity, Connectivity::Online)
    }

    /// Forget everything read from the device. `last_off_at` survives so the
    /// cooldown still applies after a reconnect.
    pub fn demote(&mut self) {
        self.connectivity = Connectivity::Disconnected;
        self.power = PowerState::Unknown;
        self.lamp_hours = None;
        self.cooldown_remaining_secs = None;
    }

    pub fn snapshot(&self, name: &str) -> ProjectorSnapshot {
        ProjectorSnapshot {
            name: name.to_string(),
            model: self.model.clone(),
            power: self.power,
            lamp_hours: self.lamp_hours,
            last_off_at: self.last_off_at,
            cooldown_remaining_secs: self.cooldown_remaining_secs,
            connectivity: self.connectivity,
        }
    }
}

impl Default for ProjectorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view handed to the messaging side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectorSnapshot {
    pub name: String,
    pub model: Option<String>,
    pub power: PowerState,
    pub lamp_hours: Option<u64>,
    pub last_off_at: Option<DateTime<Utc>>,
    pub cooldown_remaining_secs: Option<u64>,
    pub connectivity: Connectivity,
}

/// Result of a power command that reached a decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandOutcome {
    Accepted,
    Rejected(Rejection),
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandOutcome::Accepted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// The lamp is still cooling down from the last power-off.
    NeedsCooldown { seconds_remaining: u64 },
    /// The device answered with something other than the expected state.
    BadResponse { raw: String },
}

/// Emitted on power or connectivity transitions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StateEvent {
    PowerChanged {
        previous: PowerState,
        current: PowerState,
        snapshot: ProjectorSnapshot,
    },
    ConnectivityChanged {
        previous: Connectivity,
        current: Connectivity,
        snapshot: ProjectorSnapshot,
    },
}

impl StateEvent {
    pub fn snapshot(&self) -> &ProjectorSnapshot {
        match self {
            StateEvent::PowerChanged { snapshot, .. } => snapshot,
            StateEvent::ConnectivityChanged { snapshot, .. } => snapshot,
        }
    }
}
