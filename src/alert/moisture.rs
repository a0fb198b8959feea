/// Hierarchical soil-moisture status rules.
///
/// Each sensor depth produces a boolean trigger when its moisture exceeds
/// the station baseline by at least the configured delta. Classification
/// then follows a fixed decision table over the exact combination of the
/// three triggers, not a trigger count:
///
/// | 1m | 2m | 3m | status       |
/// |----|----|----|--------------|
/// |  T |  T |  T | PARALIZAÇÃO  |
/// |  T |  T |  F | ALERTA       |
/// |  F |  T |  T | ALERTA       |
/// |  T |  F |  F | ATENÇÃO      |
/// |  F |  F |  T | ATENÇÃO      |
/// |  T |  F |  T | LIVRE        |
/// |  F |  T |  F | LIVRE        |
/// |  F |  F |  F | LIVRE        |
///
/// The asymmetry (1m-only and 3m-only classify at level 1 while 2m-only
/// stays LIVRE) is carried over verbatim from the operational rule table;
/// it reflects the physical reading of surface versus deep sensors and is
/// a literal contract here.

use crate::model::Status;

/// Classifies a station by its three moisture readings against the
/// per-depth baselines. Any missing reading makes the combination
/// unusable and classifies as SEM DADOS.
pub fn moisture_status(
    moisture_1m: Option<f64>,
    moisture_2m: Option<f64>,
    moisture_3m: Option<f64>,
    baseline_1m: f64,
    baseline_2m: f64,
    baseline_3m: f64,
    delta: f64,
) -> Status {
    let (m1, m2, m3) = match (moisture_1m, moisture_2m, moisture_3m) {
        (Some(m1), Some(m2), Some(m3)) => (m1, m2, m3),
        _ => return Status::SemDados,
    };

    let t1 = (m1 - baseline_1m) >= delta;
    let t2 = (m2 - baseline_2m) >= delta;
    let t3 = (m3 - baseline_3m) >= delta;

    match (t1, t2, t3) {
        (true, true, true) => Status::Paralizacao,
        (true, true, false) | (false, true, true) => Status::Alerta,
        (true, false, false) | (false, false, true) => Status::Atencao,
        _ => Status::Livre,
    }
}
