//! Offline rebuild of the diversity documents from employee rows.
//!
//! Every month, quarter and year in which someone joined gets a document.
//! An employee counts toward a period when they joined on or before its last
//! day and had not left before its first day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::json;

use crate::models::{AggregateDocument, Employee, Frequency, Gender, GenderDistribution};
use crate::period::PeriodKey;

const FREQUENCIES: [Frequency; 3] = [Frequency::Month, Frequency::Quarter, Frequency::Year];

pub fn age_group(age: i32) -> &'static str {
    match age {
        18..=25 => "18-25",
        26..=35 => "26-35",
        36..=45 => "36-45",
        46..=55 => "46-55",
        56.. => "56+",
        _ => "Unknown",
    }
}

pub fn tenure_group(years: f64) -> &'static str {
    if years < 1.0 {
        "<1"
    } else if years < 3.0 {
        "1-3"
    } else if years < 5.0 {
        "3-5"
    } else if years < 10.0 {
        "5-10"
    } else {
        "10+"
    }
}

#[derive(Default)]
struct Tally {
    gender: GenderDistribution,
    age: BTreeMap<&'static str, i64>,
    tenure: BTreeMap<&'static str, i64>,
    by_department: BTreeMap<String, BTreeMap<Gender, i64>>,
}

impl Tally {
    fn add(&mut self, employee: &Employee, key: &PeriodKey, today: NaiveDate) {
        let until = key.end().min(employee.exit_date.unwrap_or(today));
        let years = (until - employee.join_date).num_days() as f64 / 365.25;

        *self.gender.entry(employee.gender).or_insert(0) += 1;
        *self.age.entry(age_group(employee.age)).or_insert(0) += 1;
        *self.tenure.entry(tenure_group(years)).or_insert(0) += 1;
        *self
            .by_department
            .entry(employee.department.clone())
            .or_default()
            .entry(employee.gender)
            .or_insert(0) += 1;
    }

    fn into_document(self, key: &PeriodKey) -> AggregateDocument {
        let mut document =
            AggregateDocument::with_genders(key.frequency(), key.to_string(), &self.gender);
        document
            .fields
            .insert("age_distribution".to_string(), json!(self.age));
        document
            .fields
            .insert("tenure_distribution".to_string(), json!(self.tenure));
        document.fields.insert(
            "diversity_by_department".to_string(),
            json!(self.by_department),
        );
        document
    }
}

fn active_during(employee: &Employee, key: &PeriodKey) -> bool {
    employee.join_date <= key.end()
        && employee.exit_date.map_or(true, |exit| exit >= key.start())
}

/// Builds one document per joining period, ordered by frequency then period.
pub fn build_documents(employees: &[Employee], today: NaiveDate) -> Vec<AggregateDocument> {
    let periods: Vec<PeriodKey> = employees
        .iter()
        .flat_map(|employee| {
            FREQUENCIES
                .iter()
                .filter_map(|&frequency| PeriodKey::containing(frequency, employee.join_date))
        })
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    periods
        .iter()
        .map(|key| {
            let mut tally = Tally::default();
            for employee in employees.iter().filter(|e| active_during(e, key)) {
                tally.add(employee, key, today);
            }
            tally.into_document(key)
        })
        .collect()
}
