use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tokio::sync::oneshot;

use super::{channel_error_response, service_error_response, AppState};
use crate::models::referrals::NewReferral;
use crate::services::referrals::ReferralRequest;

pub async fn create_referral(
    State(state): State<AppState>,
    Json(req): Json<NewReferral>,
) -> impl IntoResponse {
    let (referral_tx, referral_rx) = oneshot::channel();

    let send_result = state
        .referral_channel
        .send(ReferralRequest::CreateCode {
            new: req,
            response: referral_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match referral_rx.await {
        Ok(Ok(referral)) => (StatusCode::CREATED, Json(json!(referral))),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}

pub async fn get_referral(
    State(state): State<AppState>,
    Path(referral_code): Path<String>,
) -> impl IntoResponse {
    let (referral_tx, referral_rx) = oneshot::channel();

    let send_result = state
        .referral_channel
        .send(ReferralRequest::GetByCode {
            referral_code,
            response: referral_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match referral_rx.await {
        Ok(Ok(Some(referral))) => (StatusCode::OK, Json(json!(referral))),
        Ok(Ok(None)) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "Not found",
                "details": "No referral with this code."
            })),
        ),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}
