use core_types::TradeRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key used in trigger breakdowns for records that carry no trigger type.
pub const UNKNOWN_TRIGGER: &str = "unknown";

/// Realized performance of a set of trades.
///
/// Averages and the profit factor are `None` when they are undefined (no wins, no losses)
/// rather than a sentinel value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub total_pnl: Decimal,
    pub total_fee: Decimal,
    pub net_pnl: Decimal,
    pub trade_count: usize,
    pub win_count: usize,
    pub loss_count: usize,
    pub win_rate: Decimal,
    pub avg_win: Option<Decimal>,
    pub avg_loss: Option<Decimal>,
    pub profit_factor: Option<Decimal>,
}

impl SummaryMetrics {
    /// Creates a zeroed-out metrics value, the result for an empty trade set.
    pub fn new() -> Self {
        Self {
            total_pnl: Decimal::ZERO,
            total_fee: Decimal::ZERO,
            net_pnl: Decimal::ZERO,
            trade_count: 0,
            win_count: 0,
            loss_count: 0,
            win_rate: Decimal::ZERO,
            avg_win: None,
            avg_loss: None,
            profit_factor: None,
        }
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a TradeRecord>,
    {
        let mut acc = MetricAccumulator::default();
        for record in records {
            acc.record(record.pnl, record.fee);
        }
        acc.finish()
    }
}

impl Default for SummaryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-pass accumulator behind [`SummaryMetrics`].
///
/// The dimension grouper keeps one per group so that every partition is aggregated in
/// the same pass over the records.
#[derive(Debug, Clone, Default)]
pub struct MetricAccumulator {
    total_pnl: Decimal,
    total_fee: Decimal,
    trade_count: usize,
    win_count: usize,
    loss_count: usize,
    gross_profit: Decimal,
    // Sum of losing PnL, kept negative.
    gross_loss: Decimal,
}

impl MetricAccumulator {
    pub fn record(&mut self, pnl: Decimal, fee: Decimal) {
        self.total_pnl += pnl;
        self.total_fee += fee;
        self.trade_count += 1;

        if pnl > Decimal::ZERO {
            self.win_count += 1;
            self.gross_profit += pnl;
        } else if pnl < Decimal::ZERO {
            self.loss_count += 1;
            self.gross_loss += pnl;
        }
    }

    pub fn trade_count(&self) -> usize {
        self.trade_count
    }

    pub fn finish(&self) -> SummaryMetrics {
        if self.trade_count == 0 {
            return SummaryMetrics::new();
        }

        let win_rate = Decimal::from(self.win_count) / Decimal::from(self.trade_count);
        let avg_win = (self.win_count > 0).then(|| self.gross_profit / Decimal::from(self.win_count));
        let avg_loss = (self.loss_count > 0).then(|| self.gross_loss / Decimal::from(self.loss_count));

        // gross_profit == avg_win * win_count and gross_loss == avg_loss * loss_count,
        // without the rounding of going through the averages. A missing avg_win counts as
        // zero, so losses without wins give Some(0) rather than None.
        let profit_factor = match avg_loss {
            Some(avg) if !avg.is_zero() => Some(self.gross_profit / self.gross_loss.abs()),
            _ => None,
        };

        SummaryMetrics {
            total_pnl: self.total_pnl,
            total_fee: self.total_fee,
            net_pnl: self.total_pnl - self.total_fee,
            trade_count: self.trade_count,
            win_count: self.win_count,
            loss_count: self.loss_count,
            win_rate,
            avg_win,
            avg_loss,
            profit_factor,
        }
    }
}

/// Trade count and net PnL contributed by one trigger type.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TriggerBreakdown {
    pub count: usize,
    pub net_pnl: Decimal,
}

pub type TriggerBreakdowns = BTreeMap<String, TriggerBreakdown>;

pub(crate) fn record_trigger(breakdowns: &mut TriggerBreakdowns, record: &TradeRecord) {
    let key = record.trigger_type.as_deref().unwrap_or(UNKNOWN_TRIGGER);
    let entry = breakdowns.entry(key.to_string()).or_default();
    entry.count += 1;
    entry.net_pnl += record.pnl - record.fee;
}

pub fn trigger_breakdowns<'a, I>(records: I) -> TriggerBreakdowns
where
    I: IntoIterator<Item = &'a TradeRecord>,
{
    let mut breakdowns = TriggerBreakdowns::new();
    for record in records {
        record_trigger(&mut breakdowns, record);
    }
    breakdowns
}
