use crate::types::{Deltas, MarketChange, MergedRow};

/// Signed move between two probability-like values.
///
/// Non-zero only when both values lie strictly inside (0, 1). Missing values,
/// boundary values (a resolved market at 0 or 1) and anything non-finite all
/// yield exactly 0.
pub fn diff_change(new: Option<f64>, old: Option<f64>) -> f64 {
    match (new, old) {
        (Some(new), Some(old)) if in_open_unit(new) && in_open_unit(old) => finite_or_zero(new - old),
        _ => 0.0,
    }
}

#[inline]
fn in_open_unit(x: f64) -> bool {
    x > 0.0 && x < 1.0
}

#[inline]
fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

pub fn compute_deltas(row: &MergedRow) -> Deltas {
    Deltas {
        outcome_1_change: diff_change(row.outcome_1(), row.outcome_1_t0()),
        outcome_2_change: diff_change(row.outcome_2(), row.outcome_2_t0()),
        best_bid_change: diff_change(row.current.market_best_bid, row.best_bid_t0()),
        best_ask_change: diff_change(row.current.market_best_ask, row.best_ask_t0()),
    }
}

/// Attach deltas to every merged row, preserving order.
pub fn apply(rows: Vec<MergedRow>) -> Vec<MarketChange> {
    rows.into_iter()
        .map(|row| MarketChange {
            deltas: compute_deltas(&row),
            row,
        })
        .collect()
}
