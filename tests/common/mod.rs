#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use projector_control_lib::device::{ControllerContext, DeviceProfile, ManualClock};
use projector_control_lib::serial::{LinkOpener, SerialError, SerialLink, SerialSettings};

pub const PORT: &str = "/dev/ttyMOCK0";

/// The TK700 profile with test-friendly timings.
pub fn test_profile(settle: Duration) -> DeviceProfile {
    let mut profile = DeviceProfile::lookup("benq", "tk700").expect("tk700 profile");
    profile.handshake.wait = settle;
    profile.retry_backoff = Duration::ZERO;
    profile.cooldown = Duration::from_secs(10 * 60);
    profile
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap()
}

pub fn test_context(device: &MockDevice, clock: Arc<ManualClock>, settle: Duration) -> ControllerContext {
    ControllerContext::new("living-room", test_profile(settle), PORT)
        .with_opener(device.opener())
        .with_clock(clock)
}

struct MockState {
    writes: Vec<String>,
    rx: VecDeque<u8>,
    prompt: String,
    power: &'static str,
    lamp_hours: String,
    always: HashMap<String, String>,
    once: HashMap<String, VecDeque<String>>,
    io_failure: bool,
    open_failure: bool,
    opens: usize,
    closes: usize,
}

impl MockState {
    fn respond(&mut self, payload: &str) -> String {
        if let Some(reply) = self.once.get_mut(payload).and_then(|q| q.pop_front()) {
            return reply;
        }
        if let Some(reply) = self.always.get(payload) {
            return reply.clone();
        }
        match payload {
            "\r" => self.prompt.clone(),
            "*modelname=?#\r" => "*MODELNAME=TK700#".to_string(),
            "*ltim=?#\r" => format!("*LTIM={}#", self.lamp_hours),
            "*pow=?#\r" => format!("*POW={}#", self.power),
            "*pow=on#\r" => {
                self.power = "ON";
                "*POW=ON#".to_string()
            }
            "*pow=off#\r" => {
                self.power = "OFF";
                "*POW=OFF#".to_string()
            }
            _ => "*Illegal format#".to_string(),
        }
    }
}

/// Scripted stand-in for a BenQ projector on the other end of the cable.
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                writes: Vec::new(),
                rx: VecDeque::new(),
                prompt: ">".to_string(),
                power: "OFF",
                lamp_hours: "1234".to_string(),
                always: HashMap::new(),
                once: HashMap::new(),
                io_failure: false,
                open_failure: false,
                opens: 0,
                closes: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn link(&self) -> Box<dyn SerialLink> {
        Box::new(MockLink { device: self.clone() })
    }

    pub fn opener(&self) -> Arc<dyn LinkOpener> {
        Arc::new(MockOpener { device: self.clone() })
    }

    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    pub fn count_writes(&self, payload: &str) -> usize {
        self.lock().writes.iter().filter(|w| w.as_str() == payload).count()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    pub fn set_prompt(&self, prompt: &str) {
        self.lock().prompt = prompt.to_string();
    }

    pub fn set_power(&self, power: &'static str) {
        self.lock().power = power;
    }

    pub fn set_lamp_hours(&self, hours: &str) {
        self.lock().lamp_hours = hours.to_string();
    }

    /// Answer `payload` with `reply` from now on.
    pub fn reply_always(&self, payload: &str, reply: &str) {
        self.lock().always.insert(payload.to_string(), reply.to_string());
    }

    /// Answer the next `payload` with `reply`.
    pub fn reply_once(&self, payload: &str, reply: &str) {
        self.lock()
            .once
            .entry(payload.to_string())
            .or_default()
            .push_back(reply.to_string());
    }

    pub fn set_io_failure(&self, fail: bool) {
        self.lock().io_failure = fail;
    }

    pub fn set_open_failure(&self, fail: bool) {
        self.lock().open_failure = fail;
    }

    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }
}

struct MockLink {
    device: MockDevice,
}

fn broken_pipe() -> SerialError {
    SerialError::IoError(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "cable unplugged"))
}

impl SerialLink for MockLink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let mut state = self.device.lock();
        if state.io_failure {
            return Err(broken_pipe());
        }
        let payload = String::from_utf8_lossy(bytes).into_owned();
        state.writes.push(payload.clone());
        let reply = state.respond(&payload);
        state.rx.extend(reply.into_bytes());
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, SerialError> {
        let state = self.device.lock();
        if state.io_failure {
            return Err(broken_pipe());
        }
        Ok(state.rx.len())
    }

    fn read_byte(&mut self) -> Result<u8, SerialError> {
        let mut state = self.device.lock();
        if state.io_failure {
            return Err(broken_pipe());
        }
        state.rx.pop_front().ok_or(SerialError::NotConnected)
    }

    fn close(&mut self) {
        self.device.lock().closes += 1;
    }
}

struct MockOpener {
    device: MockDevice,
}

#[async_trait]
impl LinkOpener for MockOpener {
    async fn open(&self, port_name: &str, _settings: SerialSettings) -> Result<Box<dyn SerialLink>, SerialError> {
        {
            let mut state = self.device.lock();
            state.opens += 1;
            if state.open_failure {
                return Err(SerialError::ConnectionFailed(format!("{}: no such device", port_name)));
            }
            state.rx.clear();
        }
        Ok(self.device.link())
    }
}
