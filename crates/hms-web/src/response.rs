//! 统一响应封装与错误映射

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hms_core::HmsError;
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

/// 成功响应 `{statusCode, data, message}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CREATED, data, message)
    }

    fn with_status(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// HTTP 边界上的错误，响应体为 `{statusCode, message}`
#[derive(Debug)]
pub struct ApiError(pub HmsError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            HmsError::NotFound(_) => StatusCode::NOT_FOUND,
            HmsError::AlreadyPaid(_) => StatusCode::CONFLICT,
            HmsError::Validation(_)
            | HmsError::InvalidStateTransition { .. }
            | HmsError::Serialization(_) => StatusCode::BAD_REQUEST,
            HmsError::System(_)
            | HmsError::Database(_)
            | HmsError::Config(_)
            | HmsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<HmsError> for ApiError {
    fn from(err: HmsError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let body = Json(json!({
            "statusCode": status.as_u16(),
            "message": self.0.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (HmsError::not_found("Visit", "v-1"), StatusCode::NOT_FOUND),
            (HmsError::already_paid("ServiceOrder", "o-1"), StatusCode::CONFLICT),
            (HmsError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (
                HmsError::InvalidStateTransition {
                    from: "Occupied".into(),
                    event: "Occupy".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (HmsError::System("no service".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (HmsError::Database("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[test]
    fn test_envelope_serialization() {
        let response = ApiResponse::created(json!({"id": 1}), "created");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["statusCode"], 201);
        assert_eq!(value["data"]["id"], 1);
        assert_eq!(value["message"], "created");
    }
}
