use analytics::{DimensionResult, SummaryMetrics};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use core_types::{Dimension, Environment, SyncStatus};
use engine::AttributionReport;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::time::Duration;

fn money(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn optional(value: Option<Decimal>) -> String {
    value.map(money).unwrap_or_else(|| "-".to_string())
}

fn percent(ratio: Decimal) -> String {
    format!("{:.1}%", ratio * Decimal::ONE_HUNDRED)
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn metric_cells(label: String, metrics: &SummaryMetrics) -> Vec<Cell> {
    vec![
        Cell::new(label),
        Cell::new(metrics.trade_count),
        Cell::new(money(metrics.net_pnl)),
        Cell::new(money(metrics.total_fee)),
        Cell::new(percent(metrics.win_rate)),
        Cell::new(optional(metrics.avg_win)),
        Cell::new(optional(metrics.avg_loss)),
        Cell::new(optional(metrics.profit_factor)),
    ]
}

/// Renders one dimension, best net PnL first, with the unattributed bucket last.
pub fn dimension_table(dimension: Dimension, result: &DimensionResult) -> Table {
    let mut sorted = result.clone();
    sorted.sort_by_net_pnl();

    let mut table = new_table(vec![
        dimension.as_str(),
        "Trades",
        "Net PnL",
        "Fees",
        "Win Rate",
        "Avg Win",
        "Avg Loss",
        "Profit Factor",
    ]);
    for item in &sorted.items {
        table.add_row(metric_cells(item.key.label().to_string(), &item.metrics));
    }
    if let Some(bucket) = sorted.unattributed.as_ref().filter(|b| b.count > 0) {
        table.add_row(metric_cells("(unattributed)".to_string(), &bucket.metrics));
    }
    table
}

pub fn print_report(report: &AttributionReport) {
    let filter = &report.filter;
    let window = match (filter.start_date(), filter.end_date()) {
        (Some(start), Some(end)) => format!("{start} .. {end}"),
        _ => "all time".to_string(),
    };
    let account = filter
        .account_id()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "all".to_string());
    println!(
        "Attribution for {} / account {} / {}",
        filter.environment(),
        account,
        window
    );

    let overview = &report.summary.overview;
    let mut table = new_table(vec!["Metric", "Value"]);
    table.add_row(vec!["Total PnL".to_string(), money(overview.total_pnl)]);
    table.add_row(vec!["Total Fees".to_string(), money(overview.total_fee)]);
    table.add_row(vec!["Net PnL".to_string(), money(overview.net_pnl)]);
    table.add_row(vec![
        "Trades (W / L)".to_string(),
        format!("{} ({} / {})", overview.trade_count, overview.win_count, overview.loss_count),
    ]);
    table.add_row(vec!["Win Rate".to_string(), percent(overview.win_rate)]);
    table.add_row(vec!["Profit Factor".to_string(), optional(overview.profit_factor)]);
    println!("{table}");

    let completeness = &report.summary.data_completeness;
    println!(
        "Decisions: {} total, {} with strategy, {} with signal, {} with PnL",
        completeness.total_decisions,
        completeness.with_strategy,
        completeness.with_signal,
        completeness.with_pnl
    );

    for dimension in Dimension::ALL {
        println!("\nBy {}", dimension);
        println!("{}", dimension_table(dimension, report.dimension(dimension)));
    }

    for mismatch in &report.mismatches {
        println!("warning: {mismatch}");
    }
}

/// A spinner shown while a resync runs.
pub fn sync_spinner(environment: Environment) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Checking and repairing PnL linkage on {environment}..."));
    spinner
}

pub fn print_sync_status(environment: Environment, status: &SyncStatus) {
    if status.needs_sync {
        println!(
            "{environment}: {} decision(s) still out of sync with the trade ledger",
            status.unsynced_count
        );
    } else {
        println!("{environment}: PnL linkage is in sync");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics::group_by;
    use core_types::TradeRecord;
    use rust_decimal_macros::dec;

    fn record(symbol: Option<&str>, pnl: Decimal) -> TradeRecord {
        TradeRecord {
            pnl,
            fee: dec!(0),
            symbol: symbol.map(str::to_string),
            strategy: None,
            trigger_type: None,
            operation: None,
        }
    }

    #[test]
    fn test_dimension_table_orders_by_net_pnl() {
        let records = vec![
            record(Some("ETH"), dec!(-5)),
            record(Some("BTC"), dec!(20)),
            record(None, dec!(1)),
        ];
        let result = group_by(&records, Dimension::Symbol, false);
        let rendered = dimension_table(Dimension::Symbol, &result).to_string();

        let btc = rendered.find("BTC").unwrap();
        let eth = rendered.find("ETH").unwrap();
        let bucket = rendered.find("(unattributed)").unwrap();
        assert!(btc < eth && eth < bucket);
        // The input itself keeps first-seen order.
        assert_eq!(result.items[0].key.label(), "ETH");
    }

    #[test]
    fn test_formatting_helpers() {
        assert_eq!(money(dec!(58)), "58.00");
        assert_eq!(optional(None), "-");
        assert_eq!(percent(dec!(0.5)), "50.0%");
    }
}
