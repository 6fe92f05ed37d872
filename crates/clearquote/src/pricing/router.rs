use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::abtest::{AbTestRegistry, Arm, AssignmentStore, AssignmentStoreError};
use super::domain::{PriceBreakdown, PricingRule, QuoteInput};
use super::service::{QuoteError, QuoteOptions, QuoteService};
use super::store::RuleStore;

/// Router builder exposing the pricing engine over HTTP.
pub fn pricing_router<R, S, T>(service: Arc<QuoteService<R, S, T>>) -> Router
where
    R: RuleStore + 'static,
    S: AssignmentStore + 'static,
    T: AbTestRegistry + 'static,
{
    Router::new()
        .route("/api/v1/pricing/quotes", post(calculate_handler::<R, S, T>))
        .route(
            "/api/v1/pricing/rules/validate",
            post(validate_rule_handler::<R, S, T>),
        )
        .route(
            "/api/v1/pricing/quotes/conflicts",
            post(conflicts_handler::<R, S, T>),
        )
        .route(
            "/api/v1/pricing/ab-tests/:test_id/assignments",
            post(assign_handler::<R, S, T>),
        )
        .route(
            "/api/v1/pricing/ab-tests/:test_id/conversions",
            post(conversion_handler::<R, S, T>),
        )
        .route(
            "/api/v1/pricing/ab-tests/:test_id/significance",
            get(significance_handler::<R, S, T>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuoteRequest {
    pub(crate) input: QuoteInput,
    #[serde(default)]
    pub(crate) options: QuoteOptions,
}

#[derive(Debug, Serialize)]
pub(crate) struct RuleValidationResponse {
    pub(crate) valid: bool,
    pub(crate) errors: Vec<super::validate::RuleConfigError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CustomerKeyRequest {
    pub(crate) customer_key: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignmentResponse {
    pub(crate) test_id: String,
    pub(crate) customer_key: String,
    pub(crate) arm: Arm,
}

pub(crate) async fn calculate_handler<R, S, T>(
    State(service): State<Arc<QuoteService<R, S, T>>>,
    Json(request): Json<QuoteRequest>,
) -> Response
where
    R: RuleStore + 'static,
    S: AssignmentStore + 'static,
    T: AbTestRegistry + 'static,
{
    match service.calculate(&request.input, &request.options) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => quote_error_response(err),
    }
}

pub(crate) async fn validate_rule_handler<R, S, T>(
    State(service): State<Arc<QuoteService<R, S, T>>>,
    Json(rule): Json<PricingRule>,
) -> Response
where
    R: RuleStore + 'static,
    S: AssignmentStore + 'static,
    T: AbTestRegistry + 'static,
{
    let errors = service.validate_rule(&rule);
    let body = RuleValidationResponse {
        valid: errors.is_empty(),
        errors,
    };
    (StatusCode::OK, Json(body)).into_response()
}

pub(crate) async fn conflicts_handler<R, S, T>(
    State(service): State<Arc<QuoteService<R, S, T>>>,
    Json(breakdown): Json<PriceBreakdown>,
) -> Response
where
    R: RuleStore + 'static,
    S: AssignmentStore + 'static,
    T: AbTestRegistry + 'static,
{
    let conflicts = service.detect_conflicts(&breakdown.applied_rules);
    (StatusCode::OK, Json(conflicts)).into_response()
}

pub(crate) async fn assign_handler<R, S, T>(
    State(service): State<Arc<QuoteService<R, S, T>>>,
    Path(test_id): Path<String>,
    Json(request): Json<CustomerKeyRequest>,
) -> Response
where
    R: RuleStore + 'static,
    S: AssignmentStore + 'static,
    T: AbTestRegistry + 'static,
{
    match service.assign_variant(&test_id, &request.customer_key) {
        Ok(arm) => (
            StatusCode::OK,
            Json(AssignmentResponse {
                test_id,
                customer_key: request.customer_key,
                arm,
            }),
        )
            .into_response(),
        Err(err) => quote_error_response(err),
    }
}

pub(crate) async fn conversion_handler<R, S, T>(
    State(service): State<Arc<QuoteService<R, S, T>>>,
    Path(test_id): Path<String>,
    Json(request): Json<CustomerKeyRequest>,
) -> Response
where
    R: RuleStore + 'static,
    S: AssignmentStore + 'static,
    T: AbTestRegistry + 'static,
{
    match service.record_conversion(&test_id, &request.customer_key) {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "recorded" }))).into_response(),
        Err(err) => quote_error_response(err),
    }
}

pub(crate) async fn significance_handler<R, S, T>(
    State(service): State<Arc<QuoteService<R, S, T>>>,
    Path(test_id): Path<String>,
) -> Response
where
    R: RuleStore + 'static,
    S: AssignmentStore + 'static,
    T: AbTestRegistry + 'static,
{
    match service.significance(&test_id) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => quote_error_response(err),
    }
}

fn quote_error_response(err: QuoteError) -> Response {
    let status = match &err {
        QuoteError::InvalidInput(_) | QuoteError::TestConfig(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        QuoteError::UnknownTest(_) => StatusCode::NOT_FOUND,
        QuoteError::Assignments(AssignmentStoreError::AssignmentNotFound { .. }) => {
            StatusCode::NOT_FOUND
        }
        QuoteError::RuleStore(_) | QuoteError::Assignments(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
