//! Bridge controller.
//!
//! One [`Supervisor`] per inbound link drives its transport through
//! connect / drain / retry and feeds normalized events into a single mpsc
//! channel. The [`Controller`] task owns the session state, so every
//! counter update happens in one place and in arrival order.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use fallsight_bridge_framework::Shutdown;
use fallsight_common::{Event, Frame, FrameContext, LinkState, Origin};

use crate::config::FallBridgeConfig;
use crate::normalizer::normalize;
use crate::outbound::OutboundHandle;
use crate::session::{Link, SessionState};
use crate::transport::{Transport, TransportError};
use crate::webhook::{FallNotification, WebhookNotifier};

/// Messages from the supervisors to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// A normalized inbound event.
    Event(Event),
    /// A record from this origin was dropped as malformed.
    ParseFailed(Origin),
    /// A supervised link changed state.
    LinkChanged(Link, LinkState),
}

/// Counters reported at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub events_normalized: u64,
    pub parse_errors: u64,
    pub falls: u64,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub alerts_dropped: u64,
    pub heartbeats: u64,
    pub webhooks_sent: u64,
    pub webhooks_failed: u64,
}

enum Drained {
    /// Stop signal, or the controller is gone.
    Stopped,
    Lost(TransportError),
}

/// Reconnection loop for one inbound transport.
pub struct Supervisor {
    link: Link,
    transport: Box<dyn Transport>,
    retry_delay: Duration,
    control: mpsc::Sender<ControlMessage>,
}

impl Supervisor {
    pub fn new(
        link: Link,
        transport: Box<dyn Transport>,
        retry_delay: Duration,
        control: mpsc::Sender<ControlMessage>,
    ) -> Self {
        Self {
            link,
            transport,
            retry_delay,
            control,
        }
    }

    /// Connect, drain while alive, wait the retry delay, repeat until stopped.
    ///
    /// The transport is always disconnected on the way out.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        let origin = self.transport.origin();
        tracing::info!(link = %self.link, origin = %origin, "Supervisor started");

        'supervise: loop {
            if shutdown.is_triggered() || !self.report(LinkState::Connecting).await {
                break;
            }

            let connected = tokio::select! {
                result = self.transport.connect() => result,
                _ = shutdown.triggered() => break 'supervise,
            };

            match connected {
                Ok(()) => {
                    tracing::info!(link = %self.link, origin = %origin, "Link connected");
                    if !self.report(LinkState::Connected).await {
                        break;
                    }
                    match self.drain(&mut shutdown).await {
                        Drained::Stopped => break 'supervise,
                        Drained::Lost(e) => tracing::warn!(
                            link = %self.link,
                            error = %e,
                            retry_in = ?self.retry_delay,
                            "Link lost"
                        ),
                    }
                }
                Err(e) => tracing::warn!(
                    link = %self.link,
                    error = %e,
                    retry_in = ?self.retry_delay,
                    "Link connect failed"
                ),
            }

            self.transport.disconnect().await;
            if !self.report(LinkState::Disconnected).await {
                break;
            }

            if !shutdown.sleep(self.retry_delay).await {
                break;
            }
        }

        self.transport.disconnect().await;
        self.report(LinkState::Disconnected).await;
        tracing::info!(link = %self.link, "Supervisor stopped");
    }

    async fn drain(&mut self, shutdown: &mut Shutdown) -> Drained {
        let origin = self.transport.origin();

        loop {
            if !self.transport.is_alive().await {
                return Drained::Lost(TransportError::lost("liveness probe failed"));
            }

            let record = tokio::select! {
                record = self.transport.next_record() => record,
                _ = shutdown.triggered() => return Drained::Stopped,
            };
            let raw = match record {
                Ok(raw) => raw,
                Err(e) => return Drained::Lost(e),
            };

            let message = match normalize(origin, &raw) {
                Ok(Some(event)) => ControlMessage::Event(event),
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(origin = %origin, error = %e, "Dropping malformed record");
                    ControlMessage::ParseFailed(origin)
                }
            };

            if self.control.send(message).await.is_err() {
                return Drained::Stopped;
            }
        }
    }

    /// Returns `false` once the controller has gone away.
    async fn report(&mut self, state: LinkState) -> bool {
        self.control
            .send(ControlMessage::LinkChanged(self.link, state))
            .await
            .is_ok()
    }
}

/// Owner of the session state and the only caller of the outbound channel.
pub struct Controller {
    session: SessionState,
    outbound: OutboundHandle,
    webhook: Option<WebhookNotifier>,
    user_id: String,
    location: String,
    device_name: String,
    heartbeat_interval: Option<Duration>,
    drain_timeout: Duration,
    stats: BridgeStats,
}

impl Controller {
    pub fn new(
        config: &FallBridgeConfig,
        outbound: OutboundHandle,
        webhook: Option<WebhookNotifier>,
    ) -> Self {
        Self {
            session: SessionState::new(),
            outbound,
            webhook,
            user_id: config.session.user_id.clone(),
            location: config.session.location.clone(),
            device_name: config.wireless.device_name.clone(),
            heartbeat_interval: config.session.heartbeat_interval(),
            // Leave room for the final heartbeat inside the runner's deadline.
            drain_timeout: Duration::from_secs(config.shutdown_timeout_secs) / 2,
            stats: BridgeStats::default(),
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Process control messages until shutdown or until every supervisor
    /// has gone, then tear down and return the final counters.
    pub async fn run(
        mut self,
        mut control: mpsc::Receiver<ControlMessage>,
        mut shutdown: Shutdown,
    ) -> BridgeStats {
        let mut dashboard = self.outbound.subscribe();
        let mut dashboard_open = true;
        let initial = *dashboard.borrow_and_update();
        self.session.set_link(Link::Dashboard, initial);

        let mut heartbeat = self.heartbeat_interval.map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                message = control.recv() => match message {
                    Some(message) => {
                        let announce = !shutdown.is_triggered();
                        self.handle(message, announce).await;
                    }
                    None => break,
                },
                changed = dashboard.changed(), if dashboard_open => {
                    let state = match changed {
                        Ok(()) => *dashboard.borrow_and_update(),
                        Err(_) => {
                            dashboard_open = false;
                            LinkState::Disconnected
                        }
                    };
                    self.on_link(Link::Dashboard, state, true).await;
                }
                _ = tick(&mut heartbeat) => self.send_heartbeat().await,
                _ = shutdown.triggered() => break,
            }
        }

        self.teardown(control).await
    }

    async fn teardown(mut self, mut control: mpsc::Receiver<ControlMessage>) -> BridgeStats {
        // Supervisors drop their senders once their transports are released.
        let drain_timeout = self.drain_timeout;
        let drain = async {
            while let Some(message) = control.recv().await {
                self.handle(message, false).await;
            }
        };
        if tokio::time::timeout(drain_timeout, drain).await.is_err() {
            tracing::warn!(
                timeout = ?drain_timeout,
                "Supervisors did not confirm teardown in time"
            );
        }

        self.session.set_link(Link::Wireless, LinkState::Disconnected);
        self.session.set_link(Link::Serial, LinkState::Disconnected);
        self.send_heartbeat().await;

        if let Some(webhook) = &self.webhook {
            self.stats.webhooks_sent = webhook.sent();
            self.stats.webhooks_failed = webhook.failed();
        }

        let stats = &self.stats;
        tracing::info!(
            events = stats.events_normalized,
            parse_errors = stats.parse_errors,
            falls = stats.falls,
            delivered = stats.frames_delivered,
            dropped = stats.frames_dropped,
            heartbeats = stats.heartbeats,
            webhooks_sent = stats.webhooks_sent,
            webhooks_failed = stats.webhooks_failed,
            fall_counter = self.session.fall_counter(),
            "Controller stopped"
        );

        self.stats
    }

    async fn handle(&mut self, message: ControlMessage, announce: bool) {
        match message {
            ControlMessage::Event(event) => self.on_event(event).await,
            ControlMessage::ParseFailed(_) => self.stats.parse_errors += 1,
            ControlMessage::LinkChanged(link, state) => self.on_link(link, state, announce).await,
        }
    }

    async fn on_event(&mut self, event: Event) {
        let event = self.session.apply(event);
        self.stats.events_normalized += 1;

        let Some(frame) = Frame::from_event(&event, &self.frame_context()) else {
            tracing::debug!(origin = %event.origin(), kind = %event.kind(), "Event not forwarded");
            return;
        };

        if let Frame::FallAlert(alert) = &frame {
            self.stats.falls += 1;
            tracing::warn!(
                origin = %event.origin(),
                fall_count = alert.fall_count,
                severity = %alert.severity,
                alert_id = %alert.alert_id,
                "Fall detected"
            );

            if let Some(webhook) = &self.webhook {
                if webhook.accepts(alert.severity) {
                    webhook.spawn_notify(FallNotification::from_frame(alert));
                }
            }
        }

        self.deliver(&frame).await;
    }

    async fn on_link(&mut self, link: Link, state: LinkState, announce: bool) {
        let previous = self.session.link(link);
        if !self.session.set_link(link, state) {
            return;
        }
        tracing::info!(link = %link, from = %previous, to = %state, "Link state changed");
        if previous == LinkState::Connected && link != Link::Dashboard {
            match self.session.last_record(link) {
                Some(at) => tracing::info!(link = %link, last_record = %at, "Inbound link lost"),
                None => tracing::info!(link = %link, "Inbound link lost before any record"),
            }
        }
        if announce {
            self.send_heartbeat().await;
        }
    }

    async fn send_heartbeat(&mut self) {
        let event = self.session.heartbeat();
        let frame = Frame::from_event(&event, &self.frame_context());
        if let Some(frame) = frame {
            self.stats.heartbeats += 1;
            self.deliver(&frame).await;
        }
    }

    async fn deliver(&mut self, frame: &Frame) {
        match self.outbound.send(frame).await {
            Ok(()) => {
                self.stats.frames_delivered += 1;
                tracing::trace!(frame = frame.type_name(), "Frame delivered");
            }
            Err(e) => {
                self.stats.frames_dropped += 1;
                if let Frame::FallAlert(alert) = frame {
                    self.stats.alerts_dropped += 1;
                    tracing::warn!(
                        alert_id = %alert.alert_id,
                        error = %e,
                        "Fall alert not delivered"
                    );
                } else {
                    tracing::debug!(frame = frame.type_name(), error = %e, "Frame dropped");
                }
            }
        }
    }

    fn frame_context(&self) -> FrameContext<'_> {
        FrameContext {
            user_id: &self.user_id,
            location: Some(&self.location),
            device_name: Some(&self.device_name),
            connections: Some(self.session.connections()),
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
