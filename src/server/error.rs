use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::{ErrorKind, PdfCraftError};

impl IntoResponse for PdfCraftError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match self.kind() {
            ErrorKind::IoFailure => {
                tracing::error!(error = %self, "Request failed");
                "An internal error occurred".to_string()
            }
            _ => {
                tracing::debug!(error = %self, "Request rejected");
                self.to_string()
            }
        };

        let body = Json(json!({
            "error": self.kind().as_str(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
