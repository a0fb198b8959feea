/// Rainfall accumulation threshold rules.
///
/// Classifies the rolling rainfall accumulation into the status bands
/// used operationally (default 50/69/89 mm over 72 hours). Bands are
/// strict lower-exclusive / upper-inclusive: a value sitting exactly on
/// a threshold belongs to the band below it.

use crate::model::{RainfallThresholds, Status};

/// Maps an accumulated rainfall value to a station status.
///
/// `None` means no usable readings were available in the window and
/// classifies as SEM DADOS, which is distinct from an accumulation of
/// zero (LIVRE).
pub fn rainfall_status(accumulated_mm: Option<f64>, thresholds: &RainfallThresholds) -> Status {
    let accumulated = match accumulated_mm {
        Some(v) => v,
        None => return Status::SemDados,
    };

    if accumulated > thresholds.laranja_mm {
        Status::Paralizacao
    } else if accumulated > thresholds.amarelo_mm {
        Status::Alerta
    } else if accumulated > thresholds.verde_mm {
        Status::Atencao
    } else {
        Status::Livre
    }
}
