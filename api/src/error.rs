use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    code: u16,
    timestamp: String,
    correlation_id: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, message)
    }

    pub fn not_found(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError", message)
    }

    pub fn conflict(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, error, message)
    }

    pub fn unprocessable(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, error, message)
    }
}

/// Maps the domain error kinds of §7 onto HTTP status codes. Cross-tenant
/// access (`Forbidden` in the abstract spec) is represented here as
/// `AlertNotFound`/`BudgetNotFound` directly — the domain layer never
/// constructs a distinct "Forbidden" variant, so there is nothing to
/// downgrade at this boundary.
impl From<shared::BillingError> for ApiError {
    fn from(err: shared::BillingError) -> Self {
        use shared::BillingError::*;
        match err {
            ContractNotFound(id) => ApiError::not_found("ContractNotFound", id),
            PlanNotFound(id) => ApiError::not_found("PlanNotFound", id),
            BillingNotFound(id) => ApiError::not_found("BillingNotFound", id),
            BudgetNotFound(id) => ApiError::not_found("BudgetNotFound", id),
            AlertNotFound(id) => ApiError::not_found("AlertNotFound", id),
            TierNotFound(id) => ApiError::not_found("TierNotFound", id),
            OrgNotFound(id) => ApiError::not_found("OrgNotFound", id),
            ProjectNotFound(id) => ApiError::not_found("ProjectNotFound", id),
            ContractAlreadyActive(org_id) => ApiError::conflict(
                "ContractAlreadyActive",
                format!("organization {org_id} already has an active contract"),
            ),
            BillingAlreadyExists(org_id) => ApiError::conflict("BillingAlreadyExists", org_id),
            InvalidContractDates(msg) => ApiError::unprocessable("InvalidContractDates", msg),
            InvalidTierConfig(msg) => ApiError::unprocessable("InvalidTierConfig", msg),
            InvalidBudgetConfig(msg) => ApiError::unprocessable("InvalidBudgetConfig", msg),
            Internal(msg) => {
                tracing::error!(error = %msg, "internal billing error");
                ApiError::internal("An unexpected error occurred")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4().to_string();
        let payload = ErrorResponse {
            error: self.error,
            message: self.message,
            code: self.status.as_u16(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            correlation_id: correlation_id.clone(),
        };

        let mut response = (self.status, Json(payload)).into_response();
        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            response.headers_mut().insert(header::HeaderName::from_static("x-correlation-id"), value);
        }
        response
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
