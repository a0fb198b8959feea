/// Numeric analysis for the slope monitoring service.
///
/// Submodules:
/// - `rolling` — time-windowed rolling sums over irregular series.
///
/// Status classification itself lives under `alert`; this module is
/// purely numeric preparation for it.

pub mod rolling;
