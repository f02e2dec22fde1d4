use crate::types::MarketChange;

/// Renders one Telegram HTML message per alertable market. Pure; no I/O.
#[derive(Debug, Clone)]
pub struct AlertFormatter {
    event_url_base: String,
}

impl AlertFormatter {
    pub fn new(event_url_base: impl Into<String>) -> Self {
        Self {
            event_url_base: event_url_base.into(),
        }
    }

    pub fn event_link(&self, event_slug: &str) -> String {
        format!("{}/{}", self.event_url_base, event_slug)
    }

    pub fn format(&self, change: &MarketChange) -> String {
        let row = &change.row;
        let cur = &row.current;
        let ends = row
            .event_end
            .map(|d| d.format("%m/%d/%Y").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let volume = cur
            .market_volume
            .filter(|v| v.is_finite())
            .map(|v| group_thousands(v.round() as i64))
            .unwrap_or_else(|| "N/A".to_string());

        format!(
            "<b>🔥 Market Update</b>\n\n\
             {move_line}\n\n\
             <b>Question:</b> {question}\n\n\
             💹 <b>T1 Best Bid / Ask:</b> {bid} / {ask}\n\
             💹 <b>T0 Best Bid / Ask:</b> {bid_t0} / {ask_t0}\n\
             📊 <b>Market Volume:</b> {volume}\n\
             ⏰ <b>Ends:</b> {ends}\n\n\
             T0 Price: {price_t0} | T1 Price: {price}\n\n\
             🔗 <b>Event:</b> {link}\n\n",
            move_line = price_move_line(change.deltas.outcome_1_change),
            question = escape_html(&cur.market_question),
            bid = show(cur.market_best_bid),
            ask = show(cur.market_best_ask),
            bid_t0 = show(row.best_bid_t0()),
            ask_t0 = show(row.best_ask_t0()),
            price_t0 = show(row.outcome_1_t0()),
            price = show(row.outcome_1()),
            link = self.event_link(&cur.event_slug),
        )
    }
}

/// A zero move reads as "down".
pub fn price_move_line(change: f64) -> String {
    let (arrow, direction) = if change > 0.0 { ("🟩", "up") } else { ("🔻", "down") };
    format!(
        "{arrow} Price went {direction} by {:.2} percentage points",
        (change * 100.0).abs()
    )
}

fn show(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => "N/A".to_string(),
    }
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
