use crate::enums::Environment;
use crate::error::CoreError;
use crate::structs::Decision;
use crate::window::{Period, PeriodBounds, TimeWindow};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The immutable query scope shared by every ledger query of one aggregation call.
///
/// Fields are private so a `Filter` can only be built through the validating constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Filter {
    environment: Environment,
    account_id: Option<i64>,
    window: Option<TimeWindow>,
}

impl Filter {
    pub fn new(
        environment: Environment,
        account_id: Option<i64>,
        window: Option<TimeWindow>,
    ) -> Result<Self, CoreError> {
        if let Some(id) = account_id {
            if id <= 0 {
                return Err(CoreError::InvalidInput("account_id".to_string(), id.to_string()));
            }
        }
        Ok(Self {
            environment,
            account_id,
            window,
        })
    }

    /// All accounts, all time.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            account_id: None,
            window: None,
        }
    }

    /// Builds a filter from boundary-encoded date bounds. Both bounds must be present
    /// together; a lone start or end date is rejected rather than guessed at.
    pub fn from_bounds(
        environment: Environment,
        account_id: Option<i64>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Self, CoreError> {
        let window = match (start_date, end_date) {
            (Some(start), Some(end)) => Some(TimeWindow::new(start, end)?),
            (None, None) => None,
            (start, end) => {
                return Err(CoreError::InvalidInput(
                    "time window".to_string(),
                    format!("start_date={start:?}, end_date={end:?}"),
                ));
            }
        };
        Self::new(environment, account_id, window)
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn account_id(&self) -> Option<i64> {
        self.account_id
    }

    pub fn window(&self) -> Option<TimeWindow> {
        self.window
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.window.map(|w| w.start())
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.window.map(|w| w.end())
    }

    pub fn period(&self) -> PeriodBounds {
        self.window.into()
    }

    /// The window as half-open `[from, until)` instants. Window dates are local calendar
    /// dates, the same clock [`Period::resolve`](crate::Period::resolve) reads.
    pub fn instant_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        self.instant_bounds_in(&Local)
    }

    pub fn instant_bounds_in<Tz: TimeZone>(
        &self,
        tz: &Tz,
    ) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self.window {
            Some(w) => {
                let (from, until) = w.instant_bounds_in(tz);
                (Some(from), Some(until))
            }
            None => (None, None),
        }
    }

    /// Whether a decision falls inside this filter, reading its timestamp on the local
    /// calendar.
    pub fn matches(&self, decision: &Decision) -> bool {
        self.matches_in(decision, &Local)
    }

    pub fn matches_in<Tz: TimeZone>(&self, decision: &Decision, tz: &Tz) -> bool {
        decision.environment == self.environment
            && self.account_id.is_none_or(|id| id == decision.account_id)
            && self
                .window
                .is_none_or(|w| w.contains(decision.timestamp.with_timezone(tz).date_naive()))
    }
}

/// What the user picked: environment, account and a coarse period.
///
/// Resolved exactly once into a [`Filter`] per aggregation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub environment: Environment,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub period: Period,
}

impl FilterSelection {
    pub fn resolve(&self) -> Result<Filter, CoreError> {
        self.resolve_at(Local::now().naive_local())
    }

    pub fn resolve_at(&self, now: NaiveDateTime) -> Result<Filter, CoreError> {
        Filter::new(self.environment, self.account_id, self.period.resolve_at(now))
    }
}
