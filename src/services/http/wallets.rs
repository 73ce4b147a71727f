use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tokio::sync::oneshot;

use super::{channel_error_response, service_error_response, AppState};
use crate::models::wallets::{NewWithdrawal, WithdrawalReview};
use crate::services::wallets::WalletRequest;

pub async fn get_wallets(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let (wallet_tx, wallet_rx) = oneshot::channel();

    let send_result = state
        .wallet_channel
        .send(WalletRequest::GetWallets {
            user_id,
            response: wallet_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match wallet_rx.await {
        Ok(Ok(wallets)) => (StatusCode::OK, Json(json!(wallets))),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(req): Json<NewWithdrawal>,
) -> impl IntoResponse {
    let (wallet_tx, wallet_rx) = oneshot::channel();

    let send_result = state
        .wallet_channel
        .send(WalletRequest::RequestWithdrawal {
            new: req,
            response: wallet_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match wallet_rx.await {
        Ok(Ok(withdrawal)) => (StatusCode::CREATED, Json(json!(withdrawal))),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}

pub async fn review_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(review): Json<WithdrawalReview>,
) -> impl IntoResponse {
    let (wallet_tx, wallet_rx) = oneshot::channel();

    let send_result = state
        .wallet_channel
        .send(WalletRequest::ReviewWithdrawal {
            id,
            approve: review.approve,
            response: wallet_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match wallet_rx.await {
        Ok(Ok(withdrawal)) => (StatusCode::OK, Json(json!(withdrawal))),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}

pub async fn mark_withdrawal_paid(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (wallet_tx, wallet_rx) = oneshot::channel();

    let send_result = state
        .wallet_channel
        .send(WalletRequest::MarkWithdrawalPaid {
            id,
            response: wallet_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match wallet_rx.await {
        Ok(Ok(withdrawal)) => (StatusCode::OK, Json(json!(withdrawal))),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let (wallet_tx, wallet_rx) = oneshot::channel();

    let send_result = state
        .wallet_channel
        .send(WalletRequest::ListWithdrawals {
            user_id,
            response: wallet_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match wallet_rx.await {
        Ok(Ok(withdrawals)) => (StatusCode::OK, Json(json!(withdrawals))),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}
