/// Status derivation and transition alerting.
///
/// Submodules:
/// - `rainfall`    — accumulated-rainfall threshold bands.
/// - `moisture`    — hierarchical soil-moisture trigger table.
/// - `transitions` — which status changes warrant external notification.
///
/// Both rule families are pure functions over the current window of
/// readings; the production status shown per station is driven by the
/// rainfall rules, with the moisture engine evaluated in parallel.

pub mod moisture;
pub mod rainfall;
pub mod transitions;
