use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tokio::sync::oneshot;

use super::{channel_error_response, service_error_response, AppState};
use crate::models::documents::NewDocument;
use crate::services::documents::DocumentRequest;

pub async fn register_document(
    State(state): State<AppState>,
    Json(req): Json<NewDocument>,
) -> impl IntoResponse {
    let (document_tx, document_rx) = oneshot::channel();

    let send_result = state
        .document_channel
        .send(DocumentRequest::Register {
            new: req,
            response: document_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match document_rx.await {
        Ok(Ok(document)) => (StatusCode::CREATED, Json(json!(document))),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(certificate_code): Path<String>,
) -> impl IntoResponse {
    let (document_tx, document_rx) = oneshot::channel();

    let send_result = state
        .document_channel
        .send(DocumentRequest::GetByCode {
            certificate_code,
            response: document_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match document_rx.await {
        Ok(Ok(Some(document))) => (StatusCode::OK, Json(json!(document))),
        Ok(Ok(None)) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Not found",
                "details": "No document with this certificate code."
            })),
        ),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}
