//! Validation of employee rows submitted through the dashboard form.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::{EmploymentStatus, Gender, NewEmployee};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub status: Option<String>,
    pub join_date: Option<String>,
    pub exit_date: Option<String>,
    pub gender: Option<String>,
    pub age: Option<u32>,
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::InvalidEmployee(format!("{field} is required")))
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::InvalidEmployee(format!("{field} must be YYYY-MM-DD")))
}

impl EmployeeForm {
    pub fn validate(self) -> Result<NewEmployee, ApiError> {
        let first_name = required("firstName", self.first_name)?;
        let last_name = required("lastName", self.last_name)?;
        let email = required("email", self.email)?;
        let department = required("department", self.department)?;
        let position = required("position", self.position)?;

        let status = required("status", self.status)?
            .parse::<EmploymentStatus>()
            .map_err(|err| ApiError::InvalidEmployee(err.to_string()))?;
        let gender = required("gender", self.gender)?
            .parse::<Gender>()
            .map_err(|err| ApiError::InvalidEmployee(err.to_string()))?;

        let join_date = parse_date("joinDate", &required("joinDate", self.join_date)?)?;
        let exit_date = match self.exit_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse_date("exitDate", raw)?),
            _ => None,
        };
        if exit_date.is_some_and(|exit| exit < join_date) {
            return Err(ApiError::InvalidEmployee(
                "exitDate is before joinDate".to_string(),
            ));
        }

        let age = self
            .age
            .and_then(|age| i32::try_from(age).ok())
            .ok_or_else(|| ApiError::InvalidEmployee("age must be a number".to_string()))?;

        Ok(NewEmployee {
            first_name,
            last_name,
            email,
            department,
            position,
            status,
            join_date,
            exit_date,
            gender,
            age,
        })
    }
}
