use std::time::Duration;

use serialport::{DataBits, Parity, StopBits};

use crate::serial::link::{SerialSettings, SERIAL_TIMEOUT};

/// Named commands every profile maps to a wire string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Model,
    LampHours,
    Status,
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileCommands {
    pub model: &'static str,
    pub lamp_hours: &'static str,
    pub status: &'static str,
    pub on: &'static str,
    pub off: &'static str,
}

impl ProfileCommands {
    pub fn wire(&self, command: Command) -> &'static str {
        match command {
            Command::Model => self.model,
            Command::LampHours => self.lamp_hours,
            Command::Status => self.status,
            Command::On => self.on,
            Command::Off => self.off,
        }
    }
}

/// Console wake-up: write `send`, wait `wait`, expect exactly `expect` back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub send: &'static str,
    pub wait: Duration,
    pub expect: &'static str,
}

/// Everything needed to talk to one projector model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    pub brand: &'static str,
    pub model: &'static str,
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub data_bits: DataBits,
    pub commands: ProfileCommands,
    pub handshake: Handshake,
    pub failed_response: &'static str,
    pub cooldown: Duration,
    pub retry_backoff: Duration,
}

// https://esupportdownload.benq.com/esupport/PROJECTOR/Control%20Protocols/TK700STi/TK700STi_RS232%20Control%20Guide_0_Windows10_Windows7_Windows8.pdf
const BENQ_TK700: DeviceProfile = DeviceProfile {
    brand: "benq",
    model: "tk700",
    baud_rate: 115200,
    parity: Parity::None,
    stop_bits: StopBits::One,
    data_bits: DataBits::Eight,
    commands: ProfileCommands {
        model: "*modelname=?#",
        lamp_hours: "*ltim=?#",
        status: "*pow=?#",
        on: "*pow=on#",
        off: "*pow=off#",
    },
    handshake: Handshake {
        send: "\r",
        wait: Duration::from_secs(1),
        expect: ">",
    },
    failed_response: "*Block item#",
    cooldown: Duration::from_secs(10 * 60),
    retry_backoff: Duration::from_secs(5),
};

pub const SUPPORTED_PROFILES: &[DeviceProfile] = &[BENQ_TK700];

impl DeviceProfile {
    /// Find the profile for `(brand, model)`, ignoring case.
    pub fn lookup(brand: &str, model: &str) -> Option<DeviceProfile> {
        SUPPORTED_PROFILES
            .iter()
            .find(|p| p.brand.eq_ignore_ascii_case(brand) && p.model.eq_ignore_ascii_case(model))
            .copied()
    }

    pub fn supports_brand(brand: &str) -> bool {
        SUPPORTED_PROFILES.iter().any(|p| p.brand.eq_ignore_ascii_case(brand))
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            timeout: SERIAL_TIMEOUT,
        }
    }
}
