use crate::metrics::{record_trigger, MetricAccumulator, SummaryMetrics, TriggerBreakdowns};
use core_types::{Dimension, TradeRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The value a trade was attributed to along one dimension.
///
/// Serialized flat into its [`DimensionItem`], so a symbol item reads
/// `{ "symbol": "BTC", "metrics": { .. } }` and a strategy item carries
/// `strategy_id` and `strategy_name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimensionKey {
    Strategy { strategy_id: i64, strategy_name: String },
    Symbol { symbol: String },
    TriggerType { trigger_type: String },
    Operation { operation: String },
}

impl DimensionKey {
    /// Extracts the key of `record` along `dimension`, or `None` when the record is
    /// unattributed on that axis.
    pub fn extract(dimension: Dimension, record: &TradeRecord) -> Option<Self> {
        match dimension {
            Dimension::Symbol => record.symbol.clone().map(|symbol| Self::Symbol { symbol }),
            Dimension::Strategy => record.strategy.as_ref().map(|s| Self::Strategy {
                strategy_id: s.id,
                strategy_name: s.name.clone(),
            }),
            Dimension::TriggerType => record
                .trigger_type
                .clone()
                .map(|trigger_type| Self::TriggerType { trigger_type }),
            Dimension::Operation => record
                .operation
                .clone()
                .map(|operation| Self::Operation { operation }),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Strategy { strategy_name, .. } => strategy_name,
            Self::Symbol { symbol } => symbol,
            Self::TriggerType { trigger_type } => trigger_type,
            Self::Operation { operation } => operation,
        }
    }

    // Strategies are grouped by id alone; a renamed strategy keeps its first-seen name.
    fn identity(&self) -> String {
        match self {
            Self::Strategy { strategy_id, .. } => strategy_id.to_string(),
            other => other.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionItem {
    #[serde(flatten)]
    pub key: DimensionKey,
    pub metrics: SummaryMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_trigger_type: Option<TriggerBreakdowns>,
}

/// Trades with no key on the grouped dimension, kept so totals still reconcile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnattributedBucket {
    pub count: usize,
    pub metrics: SummaryMetrics,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DimensionResult {
    pub items: Vec<DimensionItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unattributed: Option<UnattributedBucket>,
}

impl DimensionResult {
    /// Trade count and net PnL summed over every item plus the unattributed bucket.
    pub fn totals(&self) -> (usize, Decimal) {
        let (mut count, mut net) = self
            .items
            .iter()
            .fold((0usize, Decimal::ZERO), |(c, n), item| {
                (c + item.metrics.trade_count, n + item.metrics.net_pnl)
            });
        if let Some(bucket) = &self.unattributed {
            count += bucket.count;
            net += bucket.metrics.net_pnl;
        }
        (count, net)
    }

    /// Orders items by descending net PnL. Stable, so ties keep first-seen order.
    pub fn sort_by_net_pnl(&mut self) {
        self.items
            .sort_by(|a, b| b.metrics.net_pnl.cmp(&a.metrics.net_pnl));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.unattributed.as_ref().is_none_or(|b| b.count == 0)
    }
}

struct Group {
    key: DimensionKey,
    metrics: MetricAccumulator,
    triggers: TriggerBreakdowns,
}

/// Partitions `records` by their key along `dimension`, one item per distinct key in
/// first-seen order. Records without a key land in the unattributed bucket, which is
/// always present (with a zero count on empty input).
///
/// `with_triggers` additionally nests each item's trigger-type composition.
pub fn group_by(records: &[TradeRecord], dimension: Dimension, with_triggers: bool) -> DimensionResult {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();
    let mut unattributed = MetricAccumulator::default();

    for record in records {
        let Some(key) = DimensionKey::extract(dimension, record) else {
            unattributed.record(record.pnl, record.fee);
            continue;
        };

        let slot = *index.entry(key.identity()).or_insert_with(|| {
            groups.push(Group {
                key,
                metrics: MetricAccumulator::default(),
                triggers: TriggerBreakdowns::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group.metrics.record(record.pnl, record.fee);
        if with_triggers {
            record_trigger(&mut group.triggers, record);
        }
    }

    let items = groups
        .into_iter()
        .map(|group| DimensionItem {
            key: group.key,
            metrics: group.metrics.finish(),
            by_trigger_type: with_triggers.then_some(group.triggers),
        })
        .collect();

    DimensionResult {
        items,
        unattributed: Some(UnattributedBucket {
            count: unattributed.trade_count(),
            metrics: unattributed.finish(),
        }),
    }
}
