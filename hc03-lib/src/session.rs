//! One HC03 device session: connection lifecycle, inbound frame pipeline and
//! host control surface.
//!
//! A session is owned by exactly one task. Transport completions and host
//! commands reach it through a single ordered channel ([`SessionInput`]), so
//! notifications are unpacked strictly in arrival order.

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::detection::DetectionSet;
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::ecg::{EcgAnalyzer, EcgProfile};
use crate::error::{FrameError, HcError, TransportError};
use crate::event::{Event, EventPayload, EventSink};
use crate::sensor::SensorKind;
use crate::state::ConnectionState;
use crate::transport::{GattService, LinkId, Transport, TransportEvent};
use crate::unpack::{UnpackStats, Unpacked, Unpacker};

/// Host requests, as delivered through the session inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Initialize,
    StartScan,
    StopScan,
    Connect(String),
    Disconnect,
    Arm(SensorKind),
    Disarm(SensorKind),
    SubmitBytes(Bytes),
    /// Raw ECG samples delivered outside the frame pipeline.
    SubmitEcg(Bytes),
    StartEcgMeasurement(EcgProfile),
    StopEcgMeasurement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Transport(TransportEvent),
    Command(Command),
}

impl From<TransportEvent> for SessionInput {
    fn from(event: TransportEvent) -> Self {
        SessionInput::Transport(event)
    }
}

impl From<Command> for SessionInput {
    fn from(command: Command) -> Self {
        SessionInput::Command(command)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub frames: UnpackStats,
    pub dispatch: DispatchStats,
    /// Transport events ignored because their link had already been torn down.
    pub stale_events: u64,
}

pub struct Session<T: Transport, S: EventSink> {
    config: SessionConfig,
    transport: T,
    sink: S,
    state: ConnectionState,
    initialized: bool,
    detections: DetectionSet,
    unpacker: Unpacker,
    dispatcher: Dispatcher,
    link: Option<LinkId>,
    next_link: u64,
    scan_deadline: Option<Instant>,
    stale_events: u64,
}

impl<T: Transport, S: EventSink> Session<T, S> {
    pub fn new(config: SessionConfig, transport: T, sink: S) -> Self {
        let dispatcher = Dispatcher::new(config.firmware);
        Self {
            config,
            transport,
            sink,
            state: ConnectionState::Idle,
            initialized: false,
            detections: DetectionSet::new(),
            unpacker: Unpacker::new(),
            dispatcher,
            link: None,
            next_link: 0,
            scan_deadline: None,
            stale_events: 0,
        }
    }

    /// Replaces the ECG analyzer. Takes effect for the next ECG payload.
    pub fn with_ecg_analyzer(mut self, analyzer: Box<dyn EcgAnalyzer>) -> Self {
        self.dispatcher.set_analyzer(analyzer);
        if self.initialized {
            self.dispatcher.configure_ecg(&self.config.ecg_profile);
        }
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn link(&self) -> Option<LinkId> {
        self.link
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn detections(&self) -> &DetectionSet {
        &self.detections
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn scan_deadline(&self) -> Option<Instant> {
        self.scan_deadline
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames: self.unpacker.stats(),
            dispatch: self.dispatcher.stats(),
            stale_events: self.stale_events,
        }
    }

    /// Seeds the ECG analyzer with the configured profile. Idempotent.
    pub fn initialize(&mut self) {
        self.dispatcher.configure_ecg(&self.config.ecg_profile);
        if !self.initialized {
            info!("Session initialized");
        }
        self.initialized = true;
    }

    pub fn start_scan(&mut self) -> Result<(), HcError> {
        match self.state {
            ConnectionState::Scanning => {
                debug!("Already scanning");
                return Ok(());
            }
            state if state.has_link() => return Err(HcError::InvalidState(state)),
            _ => {}
        }

        if let Err(e) = self.transport.check_ready().and_then(|_| self.transport.start_scan()) {
            warn!("Cannot start scan: {}", e);
            self.emit(EventPayload::ScanError { message: e.to_string() });
            return Err(e.into());
        }

        self.scan_deadline = Some(Instant::now() + self.config.scan_timeout());
        info!("Scanning for up to {}s", self.config.scan_timeout_secs);
        self.transition(ConnectionState::Scanning);
        Ok(())
    }

    /// Always succeeds locally; a transport failure is only logged.
    pub fn stop_scan(&mut self) {
        if self.state != ConnectionState::Scanning {
            return;
        }
        if let Err(e) = self.transport.stop_scan() {
            warn!("Stopping scan failed: {}", e);
        }
        self.scan_deadline = None;
        self.transition(ConnectionState::Idle);
    }

    /// Stops the scan if its deadline has passed. Returns `true` if it did.
    pub fn check_scan_timeout(&mut self, now: Instant) -> bool {
        match self.scan_deadline {
            Some(deadline) if now >= deadline => {
                info!("Scan timed out");
                self.stop_scan();
                true
            }
            _ => false,
        }
    }

    /// Tears down any existing link, then starts a fresh connect attempt.
    pub fn connect(&mut self, address: &str) -> Result<LinkId, HcError> {
        self.stop_scan();
        if self.link.is_some() {
            self.disconnect();
        }

        let link = LinkId(self.next_link);
        self.next_link += 1;
        self.link = Some(link);
        info!(%link, address, "Connecting");
        self.transition(ConnectionState::Connecting);

        if let Err(e) = self.transport.connect(address, link) {
            self.fail(e.clone());
            return Err(e.into());
        }
        Ok(link)
    }

    /// Idempotent. Always ends in `Disconnected` when there was a link.
    pub fn disconnect(&mut self) {
        self.stop_scan();
        let Some(link) = self.link else {
            return;
        };
        if let Err(e) = self.transport.disconnect(link) {
            warn!(%link, "Disconnect request failed: {}", e);
        }
        self.drop_link();
        self.transition(ConnectionState::Disconnected);
    }

    /// Returns `true` if `kind` was not armed before.
    pub fn arm(&mut self, kind: SensorKind) -> Result<bool, HcError> {
        if !self.initialized {
            return Err(HcError::NotInitialized);
        }
        let changed = self.detections.arm(kind);
        if changed {
            info!(%kind, "Detection started");
            self.emit(EventPayload::DetectionStarted { kind });
        }
        Ok(changed)
    }

    /// Returns `true` if `kind` was armed before.
    pub fn disarm(&mut self, kind: SensorKind) -> Result<bool, HcError> {
        if !self.initialized {
            return Err(HcError::NotInitialized);
        }
        let changed = self.detections.disarm(kind);
        if changed {
            if kind == SensorKind::Ecg {
                self.dispatcher.reset_ecg();
            }
            info!(%kind, "Detection stopped");
            self.emit(EventPayload::DetectionStopped { kind });
        }
        Ok(changed)
    }

    /// Feeds a buffer straight into the frame pipeline, whatever the connection state.
    pub fn submit_bytes(&mut self, raw: &[u8]) -> Result<Unpacked, FrameError> {
        let result = self.unpacker.unpack(raw);
        if let Ok(Unpacked::Accepted(origin)) = &result {
            for payload in self.dispatcher.dispatch(origin, &self.detections) {
                self.emit(payload);
            }
        }
        result
    }

    /// Forwards raw ECG samples to the analyzer. Returns how many events they
    /// produced; nothing is forwarded while ECG detection is disarmed.
    pub fn submit_ecg(&mut self, raw: &[u8]) -> Result<usize, HcError> {
        if !self.initialized {
            return Err(HcError::NotInitialized);
        }
        let events = self.dispatcher.submit_ecg(raw, &self.detections);
        let count = events.len();
        for payload in events {
            self.emit(payload);
        }
        Ok(count)
    }

    /// Reseeds the analyzer with a new user profile for the next measurement.
    pub fn start_ecg_measurement(&mut self, profile: EcgProfile) -> Result<(), HcError> {
        if !self.initialized {
            return Err(HcError::NotInitialized);
        }
        info!(age = profile.age, female = profile.female, "ECG measurement started");
        self.dispatcher.reset_ecg();
        self.dispatcher.configure_ecg(&profile);
        self.config.ecg_profile = profile;
        Ok(())
    }

    pub fn stop_ecg_measurement(&mut self) -> Result<(), HcError> {
        if !self.initialized {
            return Err(HcError::NotInitialized);
        }
        info!("ECG measurement stopped");
        self.dispatcher.reset_ecg();
        Ok(())
    }

    pub fn handle_command(&mut self, command: Command) -> Result<(), HcError> {
        match command {
            Command::Initialize => self.initialize(),
            Command::StartScan => self.start_scan()?,
            Command::StopScan => self.stop_scan(),
            Command::Connect(address) => {
                self.connect(&address)?;
            }
            Command::Disconnect => self.disconnect(),
            Command::Arm(kind) => {
                self.arm(kind)?;
            }
            Command::Disarm(kind) => {
                self.disarm(kind)?;
            }
            Command::SubmitBytes(raw) => {
                // Rejections are already logged and counted by the unpacker.
                let _ = self.submit_bytes(&raw);
            }
            Command::SubmitEcg(raw) => {
                self.submit_ecg(&raw)?;
            }
            Command::StartEcgMeasurement(profile) => self.start_ecg_measurement(profile)?,
            Command::StopEcgMeasurement => self.stop_ecg_measurement()?,
        }
        Ok(())
    }

    pub fn handle_event(&mut self, event: TransportEvent) {
        if let Some(link) = event.link() {
            if self.link != Some(link) {
                self.stale_events += 1;
                debug!(%link, current = ?self.link, "Ignoring stale transport event");
                return;
            }
        }

        match event {
            TransportEvent::DeviceFound { address, name, rssi } => self.on_device_found(address, name, rssi),
            TransportEvent::ScanFailed { code } => {
                if self.state == ConnectionState::Scanning {
                    warn!(code, "Scan failed");
                    self.scan_deadline = None;
                    self.transition(ConnectionState::Idle);
                    self.emit(EventPayload::ScanError {
                        message: format!("Scan failed with code {code}"),
                    });
                }
            }
            TransportEvent::Connected { link } => {
                if self.state != ConnectionState::Connecting {
                    debug!(state = %self.state, "Unexpected connect completion");
                    return;
                }
                info!(%link, "Link up, discovering services");
                self.transition(ConnectionState::ServicesDiscovering);
                if let Err(e) = self.transport.discover_services(link) {
                    self.fail(e);
                }
            }
            TransportEvent::ConnectFailed { code, .. } => self.fail(TransportError::ConnectFailed(code)),
            TransportEvent::ServicesDiscovered { link, services } => {
                if self.state != ConnectionState::ServicesDiscovering {
                    debug!(state = %self.state, "Unexpected discovery completion");
                    return;
                }
                self.on_services_discovered(link, &services);
            }
            TransportEvent::DiscoveryFailed { code, .. } => self.fail(TransportError::DiscoveryFailed(code)),
            TransportEvent::DescriptorWritten { status, .. } => {
                if self.state != ConnectionState::NotificationsEnabling {
                    debug!(state = %self.state, "Unexpected descriptor write completion");
                } else if status == 0 {
                    info!("Notifications enabled");
                    self.transition(ConnectionState::Ready);
                } else {
                    self.fail(TransportError::DescriptorWrite(status));
                }
            }
            TransportEvent::Notification {
                characteristic, value, ..
            } => {
                if self.state != ConnectionState::Ready {
                    debug!(state = %self.state, "Notification before ready, dropped");
                } else if characteristic != self.config.notify_characteristic_uuid {
                    debug!(%characteristic, "Notification on unexpected characteristic");
                } else {
                    let _ = self.submit_bytes(&value);
                }
            }
            TransportEvent::Disconnected { link } => {
                if self.state == ConnectionState::Ready {
                    info!(%link, "Link lost");
                    self.drop_link();
                    self.transition(ConnectionState::Disconnected);
                } else {
                    self.fail(TransportError::LinkLost);
                }
            }
            TransportEvent::Failure { link: None, error } if self.state.is_quiescent() => {
                debug!(state = %self.state, "Transport failure with nothing in flight: {}", error);
            }
            TransportEvent::Failure { error, .. } => self.fail(error),
        }
    }

    pub fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Transport(event) => self.handle_event(event),
            SessionInput::Command(command) => {
                if let Err(e) = self.handle_command(command) {
                    warn!("Command failed: {}", e);
                }
            }
        }
    }

    /// Drives the session until every sender of `inbox` is gone, then tears
    /// down whatever is left and hands the session back.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<SessionInput>) -> Self {
        loop {
            let deadline = self.scan_deadline;
            tokio::select! {
                input = inbox.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.check_scan_timeout(Instant::now());
                }
            }
        }
        debug!("Session inbox closed");
        self.disconnect();
        self
    }

    fn on_device_found(&mut self, address: String, name: Option<String>, rssi: Option<i16>) {
        if self.state != ConnectionState::Scanning {
            return;
        }
        let name = name.unwrap_or_default();
        if !self.config.accepts_device_name(&name) {
            debug!(%address, %name, "Ignoring device");
            return;
        }
        info!(%address, %name, ?rssi, "Device found");
        self.emit(EventPayload::DeviceFound { address, name, rssi });
    }

    fn on_services_discovered(&mut self, link: LinkId, services: &[GattService]) {
        let service_uuid = self.config.service_uuid;
        let Some(service) = services.iter().find(|s| s.uuid == service_uuid) else {
            self.fail(TransportError::ServiceNotFound(service_uuid));
            return;
        };
        for characteristic in [
            self.config.write_characteristic_uuid,
            self.config.notify_characteristic_uuid,
        ] {
            if !service.has_characteristic(characteristic) {
                self.fail(TransportError::CharacteristicNotFound(characteristic));
                return;
            }
        }

        self.transition(ConnectionState::NotificationsEnabling);
        if let Err(e) =
            self.transport
                .enable_notifications(link, service_uuid, self.config.notify_characteristic_uuid)
        {
            self.fail(e);
        }
    }

    /// Reports `error`, passes through `Error` and settles in `Disconnected`.
    fn fail(&mut self, error: TransportError) {
        warn!(state = %self.state, "Transport failure: {}", error);
        self.emit(EventPayload::from_transport_error(&error));
        if self.state == ConnectionState::Scanning {
            if let Err(e) = self.transport.stop_scan() {
                debug!("Cleanup stop_scan failed: {}", e);
            }
        }
        self.transition(ConnectionState::Error);
        if let Some(link) = self.link {
            if let Err(e) = self.transport.disconnect(link) {
                debug!(%link, "Cleanup disconnect failed: {}", e);
            }
        }
        self.drop_link();
        self.scan_deadline = None;
        self.transition(ConnectionState::Disconnected);
    }

    fn drop_link(&mut self) {
        self.link = None;
        self.unpacker.reset();
        self.dispatcher.reset_ecg();
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        info!(from = %self.state, to = %next, "Connection state changed");
        self.state = next;
        self.emit(EventPayload::ConnectionState { state: next });
    }

    fn emit(&mut self, payload: EventPayload) {
        self.sink.emit(Event::now(payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_response;
    use crate::transport::{OfflineTransport, TransportCall};

    type TestSession = Session<OfflineTransport, Vec<Event>>;

    fn session() -> TestSession {
        let mut session = Session::new(SessionConfig::default(), OfflineTransport::new(), Vec::new());
        session.initialize();
        session
    }

    fn states(session: &TestSession) -> Vec<ConnectionState> {
        session
            .sink()
            .iter()
            .filter_map(|e| match e.payload {
                EventPayload::ConnectionState { state } => Some(state),
                _ => None,
            })
            .collect()
    }

    fn hc03_services(config: &SessionConfig) -> Vec<GattService> {
        vec![GattService {
            uuid: config.service_uuid,
            characteristics: vec![config.write_characteristic_uuid, config.notify_characteristic_uuid],
        }]
    }

    fn ready_session() -> (TestSession, LinkId) {
        let mut session = session();
        let link = session.connect("AA:BB:CC:DD:EE:FF").unwrap();
        session.handle_event(TransportEvent::Connected { link });
        let services = hc03_services(session.config());
        session.handle_event(TransportEvent::ServicesDiscovered { link, services });
        session.handle_event(TransportEvent::DescriptorWritten { link, status: 0 });
        assert_eq!(session.state(), ConnectionState::Ready);
        (session, link)
    }

    #[test]
    fn arm_requires_initialize() {
        let mut session: TestSession = Session::new(SessionConfig::default(), OfflineTransport::new(), Vec::new());
        assert!(matches!(session.arm(SensorKind::Battery), Err(HcError::NotInitialized)));
        session.initialize();
        assert!(session.arm(SensorKind::Battery).unwrap());
        assert!(!session.arm(SensorKind::Battery).unwrap());
        assert_eq!(session.sink().len(), 1);
        assert_eq!(session.sink()[0].name(), "detection-started");
    }

    #[test]
    fn full_connect_sequence() {
        let (session, link) = ready_session();
        assert_eq!(
            states(&session),
            vec![
                ConnectionState::Connecting,
                ConnectionState::ServicesDiscovering,
                ConnectionState::NotificationsEnabling,
                ConnectionState::Ready,
            ]
        );
        let config = session.config().clone();
        assert_eq!(
            session.transport().calls,
            vec![
                TransportCall::Connect {
                    address: "AA:BB:CC:DD:EE:FF".into(),
                    link
                },
                TransportCall::DiscoverServices(link),
                TransportCall::EnableNotifications {
                    link,
                    service: config.service_uuid,
                    characteristic: config.notify_characteristic_uuid
                },
            ]
        );
    }

    #[test]
    fn connect_failure_reports_and_disconnects() {
        let mut session = session();
        let link = session.connect("AA").unwrap();
        session.handle_event(TransportEvent::ConnectFailed { link, code: 133 });

        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(session.link(), None);
        assert!(session.sink().iter().any(|e| matches!(
            &e.payload,
            EventPayload::TransportError { code: Some(133), .. }
        )));
        assert_eq!(
            states(&session),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Error,
                ConnectionState::Disconnected
            ]
        );
    }

    #[test]
    fn missing_characteristic_fails_discovery() {
        let mut session = session();
        let link = session.connect("AA").unwrap();
        session.handle_event(TransportEvent::Connected { link });
        let service = GattService {
            uuid: session.config().service_uuid,
            characteristics: vec![session.config().write_characteristic_uuid],
        };
        session.handle_event(TransportEvent::ServicesDiscovered {
            link,
            services: vec![service],
        });
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.sink().iter().any(|e| e.name() == "transport-error"));
    }

    #[test]
    fn stale_connect_failure_leaves_ready_alone() {
        let (mut session, link) = ready_session();
        session.handle_event(TransportEvent::ConnectFailed {
            link: LinkId(link.0 + 41),
            code: 8,
        });
        assert_eq!(session.state(), ConnectionState::Ready);
        assert_eq!(session.stats().stale_events, 1);
    }

    #[test]
    fn notifications_flow_when_ready() {
        let (mut session, link) = ready_session();
        session.arm(SensorKind::Battery).unwrap();
        let notify = session.config().notify_characteristic_uuid;
        session.handle_event(TransportEvent::Notification {
            link,
            characteristic: notify,
            value: encode_response(0x8F, &[0x02, 0x00, 0x00]),
        });
        let last = session.sink().last().unwrap();
        assert_eq!(last.name(), "battery-level");
        assert_eq!(session.stats().frames.accepted, 1);
    }

    #[test]
    fn disconnect_is_idempotent_and_best_effort() {
        let (mut session, link) = ready_session();
        session.transport_mut().teardown_error = Some(TransportError::Backend("gatt closed".into()));
        session.disconnect();
        session.disconnect();

        assert_eq!(session.state(), ConnectionState::Disconnected);
        let disconnects = session
            .transport()
            .calls
            .iter()
            .filter(|c| **c == TransportCall::Disconnect(link))
            .count();
        assert_eq!(disconnects, 1);

        // Late completion for the old link is ignored.
        session.handle_event(TransportEvent::Connected { link });
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn reconnect_uses_fresh_link() {
        let (mut session, first) = ready_session();
        let second = session.connect("11:22").unwrap();
        assert_ne!(first, second);
        assert_eq!(session.state(), ConnectionState::Connecting);
        assert!(session.transport().calls.contains(&TransportCall::Disconnect(first)));
    }

    #[test]
    fn scan_start_fails_without_adapter() {
        let mut session = session();
        session.transport_mut().unavailable = Some(TransportError::AdapterUnavailable);
        assert!(matches!(session.start_scan(), Err(HcError::Transport(_))));
        assert_eq!(session.state(), ConnectionState::Idle);
        assert_eq!(session.sink()[0].name(), "scan-error");
    }

    #[test]
    fn device_filter_applies_while_scanning() {
        let mut session = session();
        session.start_scan().unwrap();
        session.handle_event(TransportEvent::DeviceFound {
            address: "01".into(),
            name: Some("HC03-0001".into()),
            rssi: Some(-60),
        });
        session.handle_event(TransportEvent::DeviceFound {
            address: "02".into(),
            name: Some("Speaker".into()),
            rssi: None,
        });
        let found: Vec<_> = session.sink().iter().filter(|e| e.name() == "device-found").collect();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn scan_timeout_returns_to_idle() {
        let mut session = session();
        session.start_scan().unwrap();
        let deadline = session.scan_deadline().unwrap();
        assert!(!session.check_scan_timeout(deadline - std::time::Duration::from_millis(1)));
        assert!(session.check_scan_timeout(deadline));
        assert_eq!(session.state(), ConnectionState::Idle);
        assert!(session.transport().calls.contains(&TransportCall::StopScan));
    }
}
