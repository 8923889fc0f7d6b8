//! Period keys and the period lookup behind `/api/diversity`.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ApiError;
use crate::models::{AggregateDocument, Frequency};
use crate::store::AggregateStore;

pub const DEFAULT_PERIOD_TYPE: &str = "quarterly";
pub const DEFAULT_PERIOD_VALUE: &str = "2014-Q4";

/// Calendar month, rendered as `YYYY-MM`. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    first_day: NaiveDate,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(0..=9999).contains(&year) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, 1).map(|first_day| Self { first_day })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            first_day: date - Duration::days(i64::from(date.day0())),
        }
    }

    pub fn year(self) -> i32 {
        self.first_day.year()
    }

    pub fn month(self) -> u32 {
        self.first_day.month()
    }

    pub fn months_back(self, count: u32) -> Option<Self> {
        self.first_day
            .checked_sub_months(Months::new(count))
            .map(|first_day| Self { first_day })
    }

    pub fn start(self) -> NaiveDate {
        self.first_day
    }

    /// Last day of the month `span - 1` months after this one.
    fn end_after(self, span: u32) -> NaiveDate {
        self.first_day
            .checked_add_months(Months::new(span))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid period key '{0}'")]
pub struct InvalidPeriodKey(String);

fn digits(value: &str, len: usize) -> Option<u32> {
    if value.len() == len && value.bytes().all(|b| b.is_ascii_digit()) {
        value.parse().ok()
    } else {
        None
    }
}

impl FromStr for MonthKey {
    type Err = InvalidPeriodKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .split_once('-')
            .and_then(|(year, month)| {
                let year = i32::try_from(digits(year, 4)?).ok()?;
                MonthKey::new(year, digits(month, 2)?)
            })
            .ok_or_else(|| InvalidPeriodKey(value.to_string()))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A concrete period of a given frequency: `YYYY-MM`, `YYYY-Qn` or `YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    frequency: Frequency,
    first_month: MonthKey,
}

impl PeriodKey {
    pub fn parse(frequency: Frequency, value: &str) -> Result<Self, InvalidPeriodKey> {
        let invalid = || InvalidPeriodKey(value.to_string());
        let first_month = match frequency {
            Frequency::Month => value.parse::<MonthKey>()?,
            Frequency::Quarter => {
                let (year, quarter) = value.split_once("-Q").ok_or_else(invalid)?;
                let year = digits(year, 4).and_then(|y| i32::try_from(y).ok());
                let quarter = digits(quarter, 1).filter(|q| (1..=4).contains(q));
                match (year, quarter) {
                    (Some(year), Some(quarter)) => {
                        MonthKey::new(year, (quarter - 1) * 3 + 1).ok_or_else(invalid)?
                    }
                    _ => return Err(invalid()),
                }
            }
            Frequency::Year => digits(value, 4)
                .and_then(|year| i32::try_from(year).ok())
                .and_then(|year| MonthKey::new(year, 1))
                .ok_or_else(invalid)?,
        };
        Ok(Self {
            frequency,
            first_month,
        })
    }

    /// The period of `frequency` that contains `date`.
    pub fn containing(frequency: Frequency, date: NaiveDate) -> Option<Self> {
        let month = MonthKey::from_date(date);
        let first_month = match frequency {
            Frequency::Month => month,
            Frequency::Quarter => month.months_back((month.month() - 1) % 3)?,
            Frequency::Year => MonthKey::new(month.year(), 1)?,
        };
        Some(Self {
            frequency,
            first_month,
        })
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn start(&self) -> NaiveDate {
        self.first_month.start()
    }

    pub fn end(&self) -> NaiveDate {
        let span = match self.frequency {
            Frequency::Month => 1,
            Frequency::Quarter => 3,
            Frequency::Year => 12,
        };
        self.first_month.end_after(span)
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frequency {
            Frequency::Month => write!(f, "{}", self.first_month),
            Frequency::Quarter => write!(
                f,
                "{:04}-Q{}",
                self.first_month.year(),
                (self.first_month.month() - 1) / 3 + 1
            ),
            Frequency::Year => write!(f, "{:04}", self.first_month.year()),
        }
    }
}

/// User-facing period selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    Monthly,
    Quarterly,
    Yearly,
}

impl PeriodType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "monthly" => Some(PeriodType::Monthly),
            "quarterly" => Some(PeriodType::Quarterly),
            "yearly" => Some(PeriodType::Yearly),
            _ => None,
        }
    }

    pub fn frequency(self) -> Frequency {
        match self {
            PeriodType::Monthly => Frequency::Month,
            PeriodType::Quarterly => Frequency::Quarter,
            PeriodType::Yearly => Frequency::Year,
        }
    }
}

/// Maps a period selector to a stored frequency; anything unrecognized reads as quarterly.
pub fn frequency_for(period_type: &str) -> Frequency {
    PeriodType::parse(period_type)
        .unwrap_or(PeriodType::Quarterly)
        .frequency()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
    pub date: Option<String>,
}

/// Exact-match key for a single aggregate document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodLookup {
    pub frequency: Frequency,
    pub period: String,
    /// The selector that was replaced by the quarterly default, if any.
    pub fallback_from: Option<String>,
}

impl PeriodLookup {
    pub fn from_query(query: &PeriodQuery) -> Self {
        let period_type = query
            .period
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_PERIOD_TYPE);
        let period = query
            .date
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_PERIOD_VALUE);

        let fallback_from = match PeriodType::parse(period_type) {
            Some(_) => None,
            None => Some(period_type.to_string()),
        };

        Self {
            frequency: frequency_for(period_type),
            period: period.to_string(),
            fallback_from,
        }
    }
}

pub async fn resolve_period(
    store: &dyn AggregateStore,
    lookup: &PeriodLookup,
) -> Result<AggregateDocument, ApiError> {
    if let Some(raw) = &lookup.fallback_from {
        tracing::warn!(period_type = %raw, "unrecognized period type, using quarterly");
    }
    if let Err(err) = PeriodKey::parse(lookup.frequency, &lookup.period) {
        tracing::debug!(error = %err, "period value does not match its frequency");
    }
    tracing::info!(frequency = %lookup.frequency, period = %lookup.period, "resolving aggregate");

    let document = store
        .find_aggregate(lookup.frequency, &lookup.period)
        .await
        .map_err(ApiError::StoreUnavailable)?;
    tracing::debug!(found = document.is_some(), "aggregate lookup finished");

    document.ok_or(ApiError::NotFound)
}
