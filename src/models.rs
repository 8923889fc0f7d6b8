use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::period::MonthKey;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Granularity an aggregate document summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Month,
    Quarter,
    Year,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Month => "month",
            Frequency::Quarter => "quarter",
            Frequency::Year => "year",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl FromStr for Gender {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Other" => Ok(Gender::Other),
            other => Err(UnknownVariant::new("gender", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmploymentStatus {
    Active,
    Terminated,
}

impl EmploymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EmploymentStatus::Active => "Active",
            EmploymentStatus::Terminated => "Terminated",
        }
    }
}

impl FromStr for EmploymentStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Active" => Ok(EmploymentStatus::Active),
            "Terminated" => Ok(EmploymentStatus::Terminated),
            other => Err(UnknownVariant::new("status", other)),
        }
    }
}

pub type GenderDistribution = BTreeMap<Gender, i64>;

/// Pre-computed summary for one `(frequency, period)` pair.
///
/// Everything besides the key is kept as stored and served back unchanged.
/// Only the gender counts are read, and only by the trend window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDocument {
    pub frequency: Frequency,
    pub period: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl AggregateDocument {
    pub fn with_genders(
        frequency: Frequency,
        period: impl Into<String>,
        genders: &GenderDistribution,
    ) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("gender_distribution".to_string(), serde_json::json!(genders));
        Self {
            frequency,
            period: period.into(),
            fields,
        }
    }

    /// Count for one category; a missing map, label or non-integer count reads as 0.
    pub fn count(&self, gender: Gender) -> i64 {
        self.fields
            .get("gender_distribution")
            .and_then(|distribution| distribution.get(gender.as_str()))
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0)
    }
}

/// One month of the diversity trend chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub period: MonthKey,
    pub male: i64,
    pub female: i64,
    pub other: i64,
}

impl TrendPoint {
    pub fn zero(period: MonthKey) -> Self {
        Self {
            period,
            male: 0,
            female: 0,
            other: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Employee {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "EmployeeID")]
    pub employee_number: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub position: String,
    pub status: EmploymentStatus,
    pub join_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_date: Option<NaiveDate>,
    pub gender: Gender,
    pub age: i32,
}

/// A validated employee row ready to be stored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub position: String,
    pub status: EmploymentStatus,
    pub join_date: NaiveDate,
    #[serde(default)]
    pub exit_date: Option<NaiveDate>,
    pub gender: Gender,
    pub age: i32,
}
