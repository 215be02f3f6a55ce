use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex};

use crate::serial::{LinkOpener, NativeLinkOpener, ProjectorProtocol, Result, SerialError, SerialInterface};
use super::{
    Clock, Command, CommandOutcome, Connectivity, DeviceProfile, PowerState, ProjectorSnapshot,
    ProjectorState, Rejection, StateEvent, SystemClock,
};

/// Lamp hours are read on every Nth poll.
pub const DEFAULT_LAMP_HOURS_EVERY: u32 = 3;

const EVENT_CAPACITY: usize = 64;

/// Dependencies handed to the controller at construction.
#[derive(Clone)]
pub struct ControllerContext {
    pub name: String,
    pub profile: DeviceProfile,
    pub port_name: String,
    pub opener: Arc<dyn LinkOpener>,
    pub clock: Arc<dyn Clock>,
    pub lamp_hours_every: u32,
}

impl ControllerContext {
    pub fn new(name: impl Into<String>, profile: DeviceProfile, port_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile,
            port_name: port_name.into(),
            opener: Arc::new(NativeLinkOpener),
            clock: Arc::new(SystemClock),
            lamp_hours_every: DEFAULT_LAMP_HOURS_EVERY,
        }
    }

    pub fn with_opener(mut self, opener: Arc<dyn LinkOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_lamp_hours_every(mut self, every: u32) -> Self {
        self.lamp_hours_every = every.max(1);
        self
    }
}

/// Everything the exclusive section guards: the link and the state read from it.
struct Session {
    protocol: Option<ProjectorProtocol>,
    state: ProjectorState,
    ticks: u64,
}

/// Power control and status tracking for a single projector.
///
/// All device traffic and state changes happen under one async mutex, so a
/// poll and a power command never interleave on the wire. Readers get
/// snapshots published at the end of each operation and never see a
/// half-applied update.
pub struct ProjectorController {
    context: ControllerContext,
    session: Mutex<Session>,
    events_tx: broadcast::Sender<StateEvent>,
    snapshot_tx: watch::Sender<ProjectorSnapshot>,
}

impl ProjectorController {
    /// Open the port and read the initial state.
    ///
    /// An unreachable device is not an error here: the controller starts
    /// `Disconnected` and every [`poll`](Self::poll) retries the connection.
    pub async fn connect(context: ControllerContext) -> Self {
        let state = ProjectorState::new();
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot_tx, _) = watch::channel(state.snapshot(&context.name));

        let controller = Self {
            context,
            session: Mutex::new(Session {
                protocol: None,
                state,
                ticks: 0,
            }),
            events_tx,
            snapshot_tx,
        };

        {
            let mut session = controller.session.lock().await;
            if controller.establish(&mut session).await {
                controller.poll_locked(&mut session).await;
            }
            controller.publish(&session);
        }

        controller
    }

    pub fn name(&self) -> &str {
        &self.context.name
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.context.profile
    }

    /// Latest published state. Does not wait for an operation in progress.
    pub fn snapshot(&self) -> ProjectorSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<ProjectorSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events_tx.subscribe()
    }

    /// Turn the projector on unless it is still cooling down.
    pub async fn power_on(&self) -> Result<CommandOutcome> {
        let mut session = self.session.lock().await;
        let outcome = self.power_on_locked(&mut session).await;
        self.publish(&session);
        outcome
    }

    pub async fn power_off(&self) -> Result<CommandOutcome> {
        let mut session = self.session.lock().await;
        let outcome = self.power_off_locked(&mut session).await;
        self.publish(&session);
        outcome
    }

    /// Power off when on, otherwise power on.
    pub async fn toggle(&self) -> Result<CommandOutcome> {
        let mut session = self.session.lock().await;
        let outcome = if session.state.power == PowerState::On {
            self.power_off_locked(&mut session).await
        } else {
            self.power_on_locked(&mut session).await
        };
        self.publish(&session);
        outcome
    }

    /// One status cycle. Reconnects first when offline; never fails.
    pub async fn poll(&self) {
        let mut session = self.session.lock().await;
        if session.protocol.is_none() {
            log::info!("Projector offline, reconnecting on {}", self.context.port_name);
            if !self.establish(&mut session).await {
                self.publish(&session);
                return;
            }
        }
        self.poll_locked(&mut session).await;
        self.publish(&session);
    }

    /// Close the link and mark the projector disconnected.
    pub async fn shutdown(&self) {
        let mut session = self.session.lock().await;
        if let Some(mut protocol) = session.protocol.take() {
            protocol.interface_mut().close();
        }
        let previous = session.state.connectivity;
        session.state.demote();
        self.emit_connectivity(&session, previous);
        self.publish(&session);
    }

    async fn power_on_locked(&self, session: &mut Session) -> Result<CommandOutcome> {
        if !session.state.is_online() {
            return Err(SerialError::NotConnected);
        }

        let remaining = self.cooldown_remaining(&session.state);
        session.state.cooldown_remaining_secs = Some(remaining);
        if remaining > 0 {
            log::info!("Power on refused, {}s of cooldown left", remaining);
            return Ok(CommandOutcome::Rejected(Rejection::NeedsCooldown {
                seconds_remaining: remaining,
            }));
        }

        let value = self.run_command(session, Command::On).await?;
        if PowerState::from_reply(&value) == Some(PowerState::On) {
            self.set_power(session, PowerState::On, true);
            Ok(CommandOutcome::Accepted)
        } else {
            log::warn!("Unexpected reply to power on: {:?}", value);
            Ok(CommandOutcome::Rejected(Rejection::BadResponse { raw: value }))
        }
    }

    async fn power_off_locked(&self, session: &mut Session) -> Result<CommandOutcome> {
        let value = self.run_command(session, Command::Off).await?;
        if PowerState::from_reply(&value) == Some(PowerState::Off) {
            session.state.last_off_at = Some(self.context.clock.now());
            session.state.cooldown_remaining_secs = Some(self.cooldown_remaining(&session.state));
            self.set_power(session, PowerState::Off, true);
            Ok(CommandOutcome::Accepted)
        } else {
            log::warn!("Unexpected reply to power off: {:?}", value);
            Ok(CommandOutcome::Rejected(Rejection::BadResponse { raw: value }))
        }
    }

    async fn poll_locked(&self, session: &mut Session) {
        session.state.cooldown_remaining_secs = Some(self.cooldown_remaining(&session.state));

        let every = u64::from(self.context.lamp_hours_every.max(1));
        let read_lamp = session.ticks % every == 0;
        session.ticks = session.ticks.wrapping_add(1);

        if let Err(e) = self.refresh(session, read_lamp).await {
            self.demote(session, &e);
        }
    }

    async fn refresh(&self, session: &mut Session, read_lamp: bool) -> Result<()> {
        let protocol = session.protocol.as_mut().ok_or(SerialError::NotConnected)?;

        if read_lamp {
            let value = protocol.run(Command::LampHours).await?;
            match value.trim().parse::<u64>() {
                Ok(hours) => session.state.lamp_hours = Some(hours),
                Err(_) => log::warn!("Ignoring non-numeric lamp hours reply: {:?}", value),
            }
        }

        let status = protocol.run(Command::Status).await?;
        match PowerState::from_reply(&status) {
            Some(power) => self.set_power(session, power, false),
            None => log::error!("Unable to check power status of the projector! Output received: {}", status),
        }
        Ok(())
    }

    /// Open the port and confirm the device answers. Returns whether it is online.
    ///
    /// The model name is informational: a refused model query is logged and the
    /// following status query decides whether the link stays up.
    async fn establish(&self, session: &mut Session) -> bool {
        let previous = session.state.connectivity;
        let profile = &self.context.profile;

        let interface = match SerialInterface::open(self.context.opener.as_ref(), profile, &self.context.port_name).await {
            Ok(interface) => interface,
            Err(e) => {
                log::warn!("Unable to open {}: {}", self.context.port_name, e);
                return false;
            }
        };

        let mut protocol = ProjectorProtocol::new(interface, *profile);
        match protocol.run(Command::Model).await {
            Ok(model) => session.state.model = Some(model),
            Err(e) if e.demotes_link() => {
                log::warn!("Projector on {} did not answer: {}", self.context.port_name, e);
                protocol.interface_mut().close();
                return false;
            }
            Err(e) => log::warn!("Projector on {} did not report its model: {}", self.context.port_name, e),
        }

        log::info!(
            "Connected to {} {} ({}) on {}",
            profile.brand,
            profile.model,
            session.state.model.as_deref().unwrap_or("unknown model"),
            self.context.port_name
        );
        session.state.connectivity = Connectivity::Online;
        session.protocol = Some(protocol);
        self.emit_connectivity(session, previous);
        true
    }

    async fn run_command(&self, session: &mut Session, command: Command) -> Result<String> {
        let protocol = session.protocol.as_mut().ok_or(SerialError::NotConnected)?;
        match protocol.run(command).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.demotes_link() {
                    self.demote(session, &e);
                }
                Err(e)
            }
        }
    }

    fn demote(&self, session: &mut Session, error: &SerialError) {
        log::error!("Lost projector on {}: {}", self.context.port_name, error);
        if let Some(mut protocol) = session.protocol.take() {
            protocol.interface_mut().close();
        }
        let previous = session.state.connectivity;
        session.state.demote();
        self.emit_connectivity(session, previous);
    }

    fn set_power(&self, session: &mut Session, power: PowerState, always_emit: bool) {
        let previous = session.state.power;
        session.state.power = power;
        if previous != power {
            log::info!("Projector power {} -> {}", previous, power);
        }
        if always_emit || previous != power {
            self.emit(StateEvent::PowerChanged {
                previous,
                current: power,
                snapshot: session.state.snapshot(&self.context.name),
            });
        }
    }

    fn emit_connectivity(&self, session: &Session, previous: Connectivity) {
        let current = session.state.connectivity;
        if previous != current {
            self.emit(StateEvent::ConnectivityChanged {
                previous,
                current,
                snapshot: session.state.snapshot(&self.context.name),
            });
        }
    }

    fn emit(&self, event: StateEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }

    fn publish(&self, session: &Session) {
        self.snapshot_tx.send_replace(session.state.snapshot(&self.context.name));
    }

    /// Whole seconds left before the lamp may be powered on again, rounded up.
    fn cooldown_remaining(&self, state: &ProjectorState) -> u64 {
        let Some(last_off) = state.last_off_at else {
            return 0;
        };
        let elapsed = (self.context.clock.now() - last_off).to_std().unwrap_or(Duration::ZERO);
        let left = self.context.profile.cooldown.saturating_sub(elapsed);
        left.as_secs() + u64::from(left.subsec_nanos() > 0)
    }
}
