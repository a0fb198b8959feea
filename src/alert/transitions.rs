/// Status transition evaluation.
///
/// Every cycle recomputes each station's status from fresh data and diffs
/// it against the persisted status. Only two transitions reach external
/// notification channels; every other change is recorded as a silent
/// transition, which keeps noisy band-edge fluctuation from turning into
/// an alert storm.

use crate::model::Status;

/// What kind of notification, if any, a transition warrants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Entered PARALIZAÇÃO from ALERTA: work stoppage required.
    Critical,
    /// Returned from ATENÇÃO to LIVRE: situation normalized.
    Normalized,
    /// Status changed (or not) without external notification.
    None,
}

/// Outcome of evaluating one station's transition for the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationDecision {
    pub should_notify: bool,
    pub kind: NotificationKind,
}

/// Decides whether the change from `old` to `new` warrants notification.
///
/// Rules, in priority order:
/// 1. ALERTA -> PARALIZAÇÃO: critical notification.
/// 2. ATENÇÃO -> LIVRE: normalized notification.
/// 3. Any other label change: silent transition, no notification.
/// 4. No change: no-op.
pub fn evaluate(new: Status, old: Status) -> NotificationDecision {
    match (old, new) {
        (Status::Alerta, Status::Paralizacao) => NotificationDecision {
            should_notify: true,
            kind: NotificationKind::Critical,
        },
        (Status::Atencao, Status::Livre) => NotificationDecision {
            should_notify: true,
            kind: NotificationKind::Normalized,
        },
        _ => NotificationDecision {
            should_notify: false,
            kind: NotificationKind::None,
        },
    }
}
