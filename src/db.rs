use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{AggregateDocument, Employee, EmploymentStatus, Frequency, Gender, NewEmployee};
use crate::store::{AggregateStore, EmployeeStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed store. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn document_from_row(row: &PgRow) -> anyhow::Result<AggregateDocument> {
    let Json(document) = row
        .try_get::<Json<AggregateDocument>, _>("document")
        .context("stored aggregate document is malformed")?;
    Ok(document)
}

fn employee_from_row(row: &PgRow) -> anyhow::Result<Employee> {
    let status: String = row.try_get("status")?;
    let gender: String = row.try_get("gender")?;
    Ok(Employee {
        id: row.try_get("id")?,
        employee_number: row.try_get("employee_number")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        department: row.try_get("department")?,
        position: row.try_get("position")?,
        status: status.parse::<EmploymentStatus>()?,
        join_date: row.try_get("join_date")?,
        exit_date: row.try_get("exit_date")?,
        gender: gender.parse::<Gender>()?,
        age: row.try_get("age")?,
    })
}

#[async_trait]
impl AggregateStore for PgStore {
    async fn find_aggregate(
        &self,
        frequency: Frequency,
        period: &str,
    ) -> anyhow::Result<Option<AggregateDocument>> {
        let row = sqlx::query(
            "SELECT document FROM hr_analytics.diversity WHERE frequency = $1 AND period = $2",
        )
        .bind(frequency.as_str())
        .bind(period)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn find_aggregates_in(
        &self,
        frequency: Frequency,
        periods: &[String],
    ) -> anyhow::Result<Vec<AggregateDocument>> {
        let rows = sqlx::query(
            "SELECT document FROM hr_analytics.diversity WHERE frequency = $1 AND period = ANY($2)",
        )
        .bind(frequency.as_str())
        .bind(periods)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn replace_aggregates(&self, documents: &[AggregateDocument]) -> anyhow::Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM hr_analytics.diversity")
            .execute(&mut *tx)
            .await?;

        for document in documents {
            sqlx::query(
                r#"
                INSERT INTO hr_analytics.diversity (frequency, period, document)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(document.frequency.as_str())
            .bind(&document.period)
            .bind(Json(document))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(documents.len())
    }
}

#[async_trait]
impl EmployeeStore for PgStore {
    async fn insert_employee(&self, employee: &NewEmployee) -> anyhow::Result<Option<Uuid>> {
        let row = sqlx::query(
            r#"
            INSERT INTO hr_analytics.employees
            (id, first_name, last_name, email, department, position, status, join_date, exit_date, gender, age)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (email) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.email)
        .bind(&employee.department)
        .bind(&employee.position)
        .bind(employee.status.as_str())
        .bind(employee.join_date)
        .bind(employee.exit_date)
        .bind(employee.gender.as_str())
        .bind(employee.age)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get("id")))
    }

    async fn list_employees(&self) -> anyhow::Result<Vec<Employee>> {
        let rows = sqlx::query(
            "SELECT id, employee_number, first_name, last_name, email, department, position, \
             status, join_date, exit_date, gender, age \
             FROM hr_analytics.employees ORDER BY employee_number",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(employee_from_row).collect()
    }
}

pub fn seed_employees() -> anyhow::Result<Vec<NewEmployee>> {
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).context("invalid date");
    let rows = vec![
        ("Avery", "Lee", "IT", "Senior Developer", Gender::Female, 34, date(2019, 3, 4)?, None),
        ("Jules", "Moreno", "Sales", "Manager", Gender::Male, 45, date(2017, 9, 18)?, None),
        ("Kiara", "Patel", "Finance", "Analyst", Gender::Female, 27, date(2022, 1, 10)?, None),
        ("Noor", "Haddad", "HR", "Consultant", Gender::Other, 31, date(2021, 6, 7)?, None),
        (
            "Tomas",
            "Novak",
            "Operations",
            "Director",
            Gender::Male,
            52,
            date(2012, 2, 1)?,
            Some(date(2023, 11, 30)?),
        ),
        ("Mei", "Tanaka", "Marketing", "Junior Developer", Gender::Female, 23, date(2024, 2, 12)?, None),
    ];

    Ok(rows
        .into_iter()
        .map(
            |(first, last, department, position, gender, age, join_date, exit_date)| NewEmployee {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase()),
                department: department.to_string(),
                position: position.to_string(),
                status: if exit_date.is_some() {
                    EmploymentStatus::Terminated
                } else {
                    EmploymentStatus::Active
                },
                join_date,
                exit_date,
                gender,
                age,
            },
        )
        .collect())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    for employee in seed_employees()? {
        sqlx::query(
            r#"
            INSERT INTO hr_analytics.employees
            (id, first_name, last_name, email, department, position, status, join_date, exit_date, gender, age)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (email) DO UPDATE
            SET department = EXCLUDED.department, position = EXCLUDED.position,
                status = EXCLUDED.status, exit_date = EXCLUDED.exit_date, age = EXCLUDED.age
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.email)
        .bind(&employee.department)
        .bind(&employee.position)
        .bind(employee.status.as_str())
        .bind(employee.join_date)
        .bind(employee.exit_date)
        .bind(employee.gender.as_str())
        .bind(employee.age)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub fn read_employee_csv(csv_path: &std::path::Path) -> anyhow::Result<Vec<NewEmployee>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut employees = Vec::new();

    for (index, result) in reader.deserialize::<NewEmployee>().enumerate() {
        let employee = result.with_context(|| format!("invalid employee on row {}", index + 1))?;
        employees.push(employee);
    }

    Ok(employees)
}

pub async fn import_csv(store: &dyn EmployeeStore, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for employee in read_employee_csv(csv_path)? {
        if store.insert_employee(&employee).await?.is_some() {
            inserted += 1;
        }
    }

    Ok(inserted)
}
