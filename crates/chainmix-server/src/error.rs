//! HTTP mapping of the core error taxonomy.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use chainmix_core::BeaconError;

/// Wrapper turning a [`BeaconError`] into a JSON error response.
pub struct ApiError(pub BeaconError);

impl From<BeaconError> for ApiError {
    fn from(e: BeaconError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BeaconError::InvalidInput(_)
            | BeaconError::InvalidRange(_)
            | BeaconError::InsufficientEntropy { .. } => StatusCode::BAD_REQUEST,
            BeaconError::ExhaustedScan | BeaconError::UpstreamUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            BeaconError::Io(_) | BeaconError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError(BeaconError::InvalidInput("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError(BeaconError::InvalidRange("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError(BeaconError::ExhaustedScan), StatusCode::BAD_GATEWAY),
            (
                ApiError(BeaconError::UpstreamUnavailable("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError(BeaconError::Storage("disk".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, want) in cases {
            assert_eq!(err.into_response().status(), want);
        }
    }
}
