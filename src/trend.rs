use chrono::NaiveDate;

use crate::models::{AggregateDocument, Frequency, Gender, TrendPoint};
use crate::period::MonthKey;
use crate::store::AggregateStore;

pub const TREND_WINDOW_MONTHS: u32 = 5;

/// The month containing `today` followed by the `count - 1` months before it.
pub fn trailing_months(today: NaiveDate, count: u32) -> Vec<MonthKey> {
    let current = MonthKey::from_date(today);
    (0..count)
        .filter_map(|back| current.months_back(back))
        .collect()
}

/// Overlays stored monthly documents on a zero row per month, ascending by month.
pub fn merge_window(months: &[MonthKey], documents: &[AggregateDocument]) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = months
        .iter()
        .map(|&month| {
            let key = month.to_string();
            match documents
                .iter()
                .find(|doc| doc.frequency == Frequency::Month && doc.period == key)
            {
                Some(doc) => TrendPoint {
                    period: month,
                    male: doc.count(Gender::Male),
                    female: doc.count(Gender::Female),
                    other: doc.count(Gender::Other),
                },
                None => TrendPoint::zero(month),
            }
        })
        .collect();

    points.sort_by(|a, b| a.period.cmp(&b.period));
    points
}

pub async fn trend_window(
    store: &dyn AggregateStore,
    today: NaiveDate,
) -> anyhow::Result<Vec<TrendPoint>> {
    let months = trailing_months(today, TREND_WINDOW_MONTHS);
    let keys: Vec<String> = months.iter().map(ToString::to_string).collect();

    let documents = store.find_aggregates_in(Frequency::Month, &keys).await?;
    tracing::debug!(
        months = keys.len(),
        stored = documents.len(),
        "merging trend window"
    );

    Ok(merge_window(&months, &documents))
}
