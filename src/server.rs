use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Query, State};
use axum::http::header::WARNING;
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use tokio::net::TcpListener;

use crate::employee::EmployeeForm;
use crate::error::ApiError;
use crate::models::{Employee, TrendPoint};
use crate::period::{self, PeriodLookup, PeriodQuery};
use crate::store::{AggregateStore, EmployeeStore};
use crate::trend;

pub const ROLE_HEADER: &str = "x-hr-role";

/// Shared by every request task; the stores wrap a pooled connection handle.
#[derive(Clone)]
pub struct AppState {
    pub aggregates: Arc<dyn AggregateStore>,
    pub employees: Arc<dyn EmployeeStore>,
    pub enforce_roles: bool,
}

/// Role asserted by the upstream auth proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Viewer,
}

impl Role {
    fn from_header(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Viewer
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Role {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get(ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(Role::from_header)
            .unwrap_or(Role::Viewer))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/diversity", get(diversity))
        .route("/api/diversity/trends", get(diversity_trends))
        .route("/api/employees", get(list_employees).post(create_employee))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(bind = %listener.local_addr()?, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn diversity(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> Result<Response, ApiError> {
    let lookup = PeriodLookup::from_query(&query);
    let document = period::resolve_period(state.aggregates.as_ref(), &lookup).await?;

    let mut response = Json(document).into_response();
    if let Some(raw) = &lookup.fallback_from {
        let warning = format!("199 - \"unrecognized period type '{raw}', using quarterly\"");
        if let Ok(value) = HeaderValue::from_str(&warning) {
            response.headers_mut().insert(WARNING, value);
        }
    }
    Ok(response)
}

async fn diversity_trends(State(state): State<AppState>) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let today = Utc::now().date_naive();
    let points = trend::trend_window(state.aggregates.as_ref(), today)
        .await
        .map_err(ApiError::StoreUnavailable)?;
    Ok(Json(points))
}

async fn list_employees(State(state): State<AppState>) -> Result<Json<Vec<Employee>>, ApiError> {
    let employees = state
        .employees
        .list_employees()
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(employees))
}

async fn create_employee(
    State(state): State<AppState>,
    role: Role,
    payload: Result<Json<EmployeeForm>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if state.enforce_roles && role != Role::Admin {
        return Err(ApiError::Forbidden);
    }

    let Json(form) = payload.map_err(|err| ApiError::InvalidEmployee(err.body_text()))?;
    let employee = form.validate()?;

    let id = state
        .employees
        .insert_employee(&employee)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::DuplicateEmployee(employee.email.clone()))?;

    tracing::info!(%id, department = %employee.department, "employee added");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Employee added", "id": id })),
    ))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::models::{AggregateDocument, Frequency, Gender, GenderDistribution};
    use crate::store::memory::MemoryStore;

    fn app(store: MemoryStore, enforce_roles: bool) -> Router {
        let store = Arc::new(store);
        router(AppState {
            aggregates: store.clone(),
            employees: store,
            enforce_roles,
        })
    }

    fn quarter_doc() -> AggregateDocument {
        serde_json::from_value(json!({
            "frequency": "quarter",
            "period": "2014-Q4",
            "gender_distribution": {"Male": 40, "Female": 38, "Other": 2},
            "tenure_distribution": {"1-3": 30, "10+": 4}
        }))
        .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<HeaderValue>, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let warning = response.headers().get(WARNING).cloned();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, warning, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_employee(body: serde_json::Value, role: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/employees")
            .header("content-type", "application/json");
        if let Some(role) = role {
            builder = builder.header(ROLE_HEADER, role);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn employee_body() -> serde_json::Value {
        json!({
            "firstName": "Noor",
            "lastName": "Haddad",
            "email": "noor.haddad@example.com",
            "department": "HR",
            "position": "Consultant",
            "status": "Active",
            "joinDate": "2021-06-07",
            "gender": "Other",
            "age": 31
        })
    }

    #[tokio::test]
    async fn default_period_lookup_returns_document_verbatim() {
        let app = app(MemoryStore::with_documents(vec![quarter_doc()]), true);
        let (status, warning, body) = send(app, get_request("/api/diversity")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(warning.is_none());
        assert_eq!(body, serde_json::to_value(quarter_doc()).unwrap());
        assert_eq!(body["tenure_distribution"]["10+"], 4);
    }

    #[tokio::test]
    async fn unknown_period_type_falls_back_with_warning() {
        let app = app(MemoryStore::with_documents(vec![quarter_doc()]), true);
        let (status, warning, body) =
            send(app, get_request("/api/diversity?period=weekly&date=2014-Q4")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["period"], "2014-Q4");
        let warning = warning.unwrap();
        assert!(warning.to_str().unwrap().contains("weekly"));
    }

    #[tokio::test]
    async fn missing_period_is_not_found() {
        let app = app(MemoryStore::with_documents(vec![quarter_doc()]), true);
        let (status, _, body) =
            send(app, get_request("/api/diversity?period=monthly&date=2014-10")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Data not found"}));
    }

    #[tokio::test]
    async fn trends_return_five_months() {
        // The handler reads the clock on its own, so the current month may have
        // rolled over by the time it runs.
        let genders: GenderDistribution =
            [(Gender::Male, 10), (Gender::Female, 12), (Gender::Other, 1)]
                .into_iter()
                .collect();
        let today = Utc::now().date_naive();
        let candidates: Vec<String> = [today, today + chrono::Days::new(1)]
            .iter()
            .map(|&day| trend::trailing_months(day, 1)[0].to_string())
            .collect();
        let documents = candidates
            .iter()
            .map(|month| AggregateDocument::with_genders(Frequency::Month, month.as_str(), &genders))
            .collect();
        let app = app(MemoryStore::with_documents(documents), true);
        let (status, _, body) = send(app, get_request("/api/diversity/trends")).await;

        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 5);
        let latest = &rows[4];
        assert!(candidates.iter().any(|month| latest["period"] == month.as_str()));
        assert_eq!(latest["male"], 10);
        assert_eq!(latest["female"], 12);
        assert_eq!(latest["other"], 1);
        assert_eq!(rows[0]["male"], 0);
    }

    #[tokio::test]
    async fn period_lookup_serves_stored_documents_as_is() {
        let odd_labels = json!({
            "frequency": "year",
            "period": "2014",
            "gender_distribution": {"Male": 3, "Nonbinary": 2},
            "age_distribution": {"26-35": 5}
        });
        let no_genders = json!({
            "frequency": "month",
            "period": "2014-10",
            "tenure_distribution": {"<1": 1}
        });
        let documents = vec![
            serde_json::from_value(odd_labels.clone()).unwrap(),
            serde_json::from_value(no_genders.clone()).unwrap(),
        ];
        let app = app(MemoryStore::with_documents(documents), true);

        let (status, _, body) =
            send(app.clone(), get_request("/api/diversity?period=yearly&date=2014")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, odd_labels);

        let (status, _, body) =
            send(app, get_request("/api/diversity?period=monthly&date=2014-10")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, no_genders);
    }

    #[tokio::test]
    async fn store_failure_is_a_server_error() {
        let (status, _, body) = send(
            app(MemoryStore::failing(), true),
            get_request("/api/diversity/trends"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to fetch data"}));

        let (status, _, _) = send(
            app(MemoryStore::failing(), true),
            get_request("/api/diversity"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _, body) = send(
            app(MemoryStore::failing(), true),
            get_request("/api/employees"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"message": "Internal Server Error"}));
    }

    #[tokio::test]
    async fn adding_employees_requires_admin_role() {
        let store = Arc::new(MemoryStore::default());
        let app = router(AppState {
            aggregates: store.clone(),
            employees: store.clone(),
            enforce_roles: true,
        });

        let (status, _, _) = send(app.clone(), post_employee(employee_body(), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _, _) =
            send(app.clone(), post_employee(employee_body(), Some("viewer"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, body) =
            send(app.clone(), post_employee(employee_body(), Some("Admin"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Employee added");

        let (status, _, body) = send(app, get_request("/api/employees")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["Email"], "noor.haddad@example.com");
        assert!(body[0]["_id"].is_string());
    }

    #[tokio::test]
    async fn role_check_can_be_disabled() {
        let (status, _, _) = send(
            app(MemoryStore::default(), false),
            post_employee(employee_body(), None),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn invalid_employee_payloads_are_rejected() {
        let mut body = employee_body();
        body["age"] = json!("31");
        let (status, _, response) =
            send(app(MemoryStore::default(), false), post_employee(body, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({"error": "Missing or invalid fields"}));

        let mut body = employee_body();
        body["firstName"] = json!("");
        let (status, _, _) =
            send(app(MemoryStore::default(), false), post_employee(body, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .method("POST")
            .uri("/api/employees")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, _) = send(app(MemoryStore::default(), false), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let app = app(MemoryStore::default(), false);
        let (status, _, _) = send(app.clone(), post_employee(employee_body(), None)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _, body) = send(app, post_employee(employee_body(), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("noor.haddad@example.com"));
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, _, body) = send(app(MemoryStore::default(), true), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
