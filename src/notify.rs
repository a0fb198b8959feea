/// Notification dispatch for critical status transitions.
///
/// The daemon never talks to notification channels directly. It hands an
/// immutable `TransitionEvent` to `NotifierDispatch`, which queues it on
/// a channel consumed by a dedicated worker thread owning the senders.
/// Delivery is best-effort, at-most-once: failures are logged against
/// the station and never retried, and nothing on this path can block or
/// roll back status persistence in the cycle.
///
/// The concrete senders post JSON to an external email/SMS gateway; the
/// vendor-side wire formats beyond that gateway are out of scope.

use serde::Serialize;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::alert::transitions::NotificationKind;
use crate::logging::EventLog;
use crate::model::Status;

// ---------------------------------------------------------------------------
// Transition payload
// ---------------------------------------------------------------------------

/// Immutable payload describing one notifiable transition. This is the
/// only data shared between the cycle thread and the notifier worker.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionEvent {
    pub station_id: String,
    pub station_name: String,
    pub old_status: Status,
    pub new_status: Status,
    #[serde(skip)]
    pub kind: NotificationKind,
}

impl TransitionEvent {
    /// Human-readable message included in every outgoing notification.
    pub fn message(&self) -> String {
        match self.kind {
            NotificationKind::Critical => format!(
                "{} ({}) entrou em {} (anterior: {})",
                self.station_id, self.station_name, self.new_status, self.old_status
            ),
            NotificationKind::Normalized => format!(
                "{} ({}) retornou de {} para {}",
                self.station_id, self.station_name, self.old_status, self.new_status
            ),
            NotificationKind::None => format!(
                "{} ({}) mudou de {} para {}",
                self.station_id, self.station_name, self.old_status, self.new_status
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Senders
// ---------------------------------------------------------------------------

/// Errors raised by a notification channel. Logged, never escalated.
#[derive(Debug)]
pub enum NotifyError {
    /// Transport-level failure reaching the gateway.
    Gateway(String),
    /// The gateway answered with a non-2xx status.
    Rejected(u16),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Gateway(msg) => write!(f, "Gateway error: {}", msg),
            NotifyError::Rejected(code) => write!(f, "Gateway rejected notification: HTTP {}", code),
        }
    }
}

impl std::error::Error for NotifyError {}

/// One outbound notification channel (email, SMS, ...).
pub trait NotificationSender: Send {
    /// Channel name used in log lines, e.g. "email" or "sms".
    fn channel(&self) -> &str;

    fn send(&self, event: &TransitionEvent) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct GatewayPayload<'a> {
    station_id: &'a str,
    station_name: &'a str,
    old_status: String,
    new_status: String,
    message: String,
}

/// Sender that posts the transition as JSON to a gateway URL.
pub struct GatewaySender {
    channel: String,
    url: String,
    client: reqwest::blocking::Client,
}

impl GatewaySender {
    pub fn new(channel: &str, url: &str) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Gateway(e.to_string()))?;

        Ok(Self {
            channel: channel.to_string(),
            url: url.to_string(),
            client,
        })
    }

    /// Builds the configured senders from the environment. Unset gateway
    /// variables simply disable that channel.
    ///
    ///   GEOMON_EMAIL_GATEWAY — email gateway endpoint
    ///   GEOMON_SMS_GATEWAY   — SMS gateway endpoint
    pub fn from_env() -> Result<Vec<Box<dyn NotificationSender>>, NotifyError> {
        dotenv::dotenv().ok();
        let mut senders: Vec<Box<dyn NotificationSender>> = Vec::new();

        if let Ok(url) = std::env::var("GEOMON_EMAIL_GATEWAY") {
            senders.push(Box::new(GatewaySender::new("email", &url)?));
        }
        if let Ok(url) = std::env::var("GEOMON_SMS_GATEWAY") {
            senders.push(Box::new(GatewaySender::new("sms", &url)?));
        }

        Ok(senders)
    }
}

impl NotificationSender for GatewaySender {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn send(&self, event: &TransitionEvent) -> Result<(), NotifyError> {
        let payload = GatewayPayload {
            station_id: &event.station_id,
            station_name: &event.station_name,
            old_status: event.old_status.to_string(),
            new_status: event.new_status.to_string(),
            message: event.message(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .map_err(|e| NotifyError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dispatch worker
// ---------------------------------------------------------------------------

/// Queue handle for the notification worker. Cloneable; dropping the
/// last handle closes the queue and lets the worker drain and exit.
#[derive(Clone)]
pub struct NotifierDispatch {
    tx: mpsc::Sender<TransitionEvent>,
    log: EventLog,
}

impl NotifierDispatch {
    /// Spawns the worker thread owning the senders and returns the queue
    /// handle used by the cycle.
    pub fn start(senders: Vec<Box<dyn NotificationSender>>, log: EventLog) -> Self {
        let (tx, rx) = mpsc::channel::<TransitionEvent>();
        let worker_log = log.clone();

        thread::spawn(move || {
            for event in rx {
                for sender in &senders {
                    match sender.send(&event) {
                        Ok(()) => worker_log.info(
                            &event.station_id,
                            &format!("Notificação enviada via {}: {}", sender.channel(), event.message()),
                        ),
                        Err(e) => worker_log.error(
                            &event.station_id,
                            &format!("Falha de notificação via {}: {}", sender.channel(), e),
                        ),
                    }
                }
            }
        });

        Self { tx, log }
    }

    /// Queues an event for delivery. Never blocks; if the worker has
    /// already exited the failure is logged and the cycle proceeds.
    pub fn dispatch(&self, event: TransitionEvent) {
        let station_id = event.station_id.clone();
        if self.tx.send(event).is_err() {
            self.log
                .error(&station_id, "Fila de notificação indisponível; evento descartado");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
