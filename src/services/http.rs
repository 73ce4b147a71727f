use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use super::documents::DocumentRequest;
use super::payments::PaymentRequest;
use super::referrals::ReferralRequest;
use super::wallets::WalletRequest;
use super::ServiceError;
use crate::settings;

mod auth;
mod documents;
mod payments;
mod referrals;
mod wallets;
mod webhooks;

#[derive(Clone)]
pub struct AppState {
    document_channel: mpsc::Sender<DocumentRequest>,
    payment_channel: mpsc::Sender<PaymentRequest>,
    referral_channel: mpsc::Sender<ReferralRequest>,
    wallet_channel: mpsc::Sender<WalletRequest>,
    ipn_secret: Arc<String>,
    admin_tokens: Arc<Vec<String>>,
}

fn service_error_response(e: ServiceError) -> (StatusCode, Json<serde_json::Value>) {
    let (status, label) = match &e {
        ServiceError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
        ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
        ServiceError::ExternalService(..) => (StatusCode::BAD_GATEWAY, "Upstream error"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    };

    (
        status,
        Json(json!({
            "error": label,
            "details": e.to_string()
        })),
    )
}

fn channel_error_response(e: impl std::fmt::Display) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Internal server error",
            "details": format!("Failed to process request: {}", e)
        })),
    )
}

pub async fn start_http_server(
    server: settings::Server,
    ipn_secret: String,
    document_channel: mpsc::Sender<DocumentRequest>,
    payment_channel: mpsc::Sender<PaymentRequest>,
    referral_channel: mpsc::Sender<ReferralRequest>,
    wallet_channel: mpsc::Sender<WalletRequest>,
) -> Result<(), anyhow::Error> {
    let app_state = AppState {
        document_channel,
        payment_channel,
        referral_channel,
        wallet_channel,
        ipn_secret: Arc::new(ipn_secret),
        admin_tokens: Arc::new(server.admin_tokens),
    };

    let admin_routes = Router::new()
        .route(
            "/withdrawals/{id}/review",
            post(wallets::review_withdrawal),
        )
        .route("/withdrawals/{id}/paid", post(wallets::mark_withdrawal_paid))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::admin_auth,
        ));

    let app = Router::new()
        .route("/documents", post(documents::register_document))
        .route("/documents/{code}", get(documents::get_document))
        .route("/payments/pix", post(payments::create_pix_charge))
        .route("/payments/crypto", post(payments::create_crypto_payment))
        .route(
            "/payments/crypto/invoice",
            post(payments::create_gateway_invoice),
        )
        .route("/webhooks/pix", post(webhooks::pix_webhook))
        .route("/webhooks/crypto-ipn", post(webhooks::crypto_ipn_webhook))
        .route("/referrals", post(referrals::create_referral))
        .route("/referrals/{code}", get(referrals::get_referral))
        .route("/wallets/{user_id}", get(wallets::get_wallets))
        .route("/withdrawals", post(wallets::request_withdrawal))
        .route(
            "/users/{user_id}/withdrawals",
            get(wallets::list_withdrawals),
        )
        .merge(admin_routes)
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&server.bind_addr).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
