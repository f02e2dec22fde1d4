use serde::Serialize;
use tracing::{error, info};

use super::formatter::AlertFormatter;
use super::notifier::Notifier;
use crate::types::MarketChange;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Sends one alert per row, strictly in order. A failed send is logged with
/// the market id and never stops the remaining rows.
pub async fn dispatch_all(
    changes: &[MarketChange],
    formatter: &AlertFormatter,
    notifier: &dyn Notifier,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    for change in changes {
        let message = formatter.format(change);
        match notifier.send(&message).await {
            Ok(()) => {
                report.sent += 1;
                info!(
                    market_id = %change.market_id(),
                    outcome_1_change = change.deltas.outcome_1_change,
                    "[ALERT] sent via {}",
                    notifier.name(),
                );
            }
            Err(e) => {
                report.failed += 1;
                error!(
                    market_id = %change.market_id(),
                    event_slug = %change.row.current.event_slug,
                    "[ALERT] dispatch via {} failed: {e}",
                    notifier.name(),
                );
            }
        }
    }

    report
}
