use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;
use tokio::sync::oneshot;

use super::{channel_error_response, service_error_response, AppState};
use crate::models::payments::{NewCryptoPayment, NewGatewayInvoice, NewPixPayment};
use crate::services::payments::PaymentRequest;

#[derive(Serialize)]
struct PixChargeResponse {
    payment_id: String,
    qr_copy_paste: String,
    qr_image_url: String,
}

pub async fn create_pix_charge(
    State(state): State<AppState>,
    Json(req): Json<NewPixPayment>,
) -> impl IntoResponse {
    let (payment_tx, payment_rx) = oneshot::channel();

    let send_result = state
        .payment_channel
        .send(PaymentRequest::CreatePixCharge {
            new: req,
            response: payment_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match payment_rx.await {
        Ok(Ok((payment, charge))) => {
            let response = PixChargeResponse {
                payment_id: payment.id,
                qr_copy_paste: charge.qr_copy_paste,
                qr_image_url: charge.qr_image_url,
            };
            (StatusCode::CREATED, Json(json!(response)))
        }
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}

pub async fn create_crypto_payment(
    State(state): State<AppState>,
    Json(req): Json<NewCryptoPayment>,
) -> impl IntoResponse {
    let (payment_tx, payment_rx) = oneshot::channel();

    let send_result = state
        .payment_channel
        .send(PaymentRequest::CreateCryptoPayment {
            new: req,
            response: payment_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match payment_rx.await {
        Ok(Ok((payment, deposit_address))) => (
            StatusCode::CREATED,
            Json(json!({
                "payment_id": payment.id,
                "deposit_address": deposit_address,
                "token_symbol": payment.token_symbol,
                "expected_amount": payment.expected_amount,
            })),
        ),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}

pub async fn create_gateway_invoice(
    State(state): State<AppState>,
    Json(req): Json<NewGatewayInvoice>,
) -> impl IntoResponse {
    let (payment_tx, payment_rx) = oneshot::channel();

    let send_result = state
        .payment_channel
        .send(PaymentRequest::CreateGatewayInvoice {
            new: req,
            response: payment_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match payment_rx.await {
        Ok(Ok((payment, invoice))) => (
            StatusCode::CREATED,
            Json(json!({
                "payment_id": payment.id,
                "invoice_id": invoice.id,
                "invoice_url": invoice.invoice_url,
            })),
        ),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}
