use core_types::Decision;
use serde::{Deserialize, Serialize};

/// How many of the filtered decisions carry each optional attribution field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataCompleteness {
    pub total_decisions: usize,
    pub with_strategy: usize,
    pub with_signal: usize,
    pub with_pnl: usize,
}

impl DataCompleteness {
    pub fn from_decisions<'a, I>(decisions: I) -> Self
    where
        I: IntoIterator<Item = &'a Decision>,
    {
        decisions.into_iter().fold(Self::default(), |mut acc, d| {
            acc.total_decisions += 1;
            acc.with_strategy += usize::from(d.strategy.is_some());
            acc.with_signal += usize::from(d.trigger_type.is_some());
            acc.with_pnl += usize::from(d.realized_pnl.is_some());
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{Environment, StrategyRef};
    use rust_decimal_macros::dec;

    fn decision(id: i64) -> Decision {
        Decision {
            id,
            timestamp: Utc::now(),
            environment: Environment::Testnet,
            account_id: 1,
            strategy: None,
            trigger_type: None,
            realized_pnl: None,
            fee: None,
            operation: None,
            symbol: None,
        }
    }

    #[test]
    fn test_counts_each_optional_attribute() {
        let mut with_everything = decision(1);
        with_everything.strategy = Some(StrategyRef { id: 1, name: "grid".to_string() });
        with_everything.trigger_type = Some("signal".to_string());
        with_everything.realized_pnl = Some(dec!(3));

        let mut pnl_only = decision(2);
        pnl_only.realized_pnl = Some(dec!(-1));

        let decisions = vec![with_everything, pnl_only, decision(3)];
        let c = DataCompleteness::from_decisions(&decisions);

        assert_eq!(
            c,
            DataCompleteness { total_decisions: 3, with_strategy: 1, with_signal: 1, with_pnl: 2 }
        );
        assert!(c.with_strategy <= c.total_decisions);
    }

    #[test]
    fn test_empty_set_is_all_zero() {
        let decisions: Vec<Decision> = Vec::new();
        assert_eq!(DataCompleteness::from_decisions(&decisions), DataCompleteness::default());
    }
}
