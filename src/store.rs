use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{AggregateDocument, Employee, Frequency, NewEmployee};

/// Read side of the pre-computed diversity documents.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Exact match on `(frequency, period)`; at most one document exists per pair.
    async fn find_aggregate(
        &self,
        frequency: Frequency,
        period: &str,
    ) -> anyhow::Result<Option<AggregateDocument>>;

    /// Every document of `frequency` whose period is one of `periods`, in one lookup.
    async fn find_aggregates_in(
        &self,
        frequency: Frequency,
        periods: &[String],
    ) -> anyhow::Result<Vec<AggregateDocument>>;

    /// Drops all stored documents and writes `documents` in their place.
    async fn replace_aggregates(&self, documents: &[AggregateDocument]) -> anyhow::Result<usize>;
}

#[async_trait]
pub trait EmployeeStore: Send + Sync {
    /// Returns `None` when an employee with the same email already exists.
    async fn insert_employee(&self, employee: &NewEmployee) -> anyhow::Result<Option<Uuid>>;

    async fn list_employees(&self) -> anyhow::Result<Vec<Employee>>;
}
