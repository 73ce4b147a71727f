use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tokio::sync::oneshot;

use super::{channel_error_response, service_error_response, AppState};
use crate::models::payments::{IpnPayload, PixChargeStatus};
use crate::services::payments::PaymentRequest;

type HmacSha256 = Hmac<Sha256>;

pub async fn pix_webhook(
    State(state): State<AppState>,
    Json(status): Json<PixChargeStatus>,
) -> impl IntoResponse {
    let (payment_tx, payment_rx) = oneshot::channel();

    let send_result = state
        .payment_channel
        .send(PaymentRequest::PixStatusUpdate {
            status,
            response: payment_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match payment_rx.await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({"status": "ok"}))),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}

/// IPN bodies are authenticated over the raw bytes before any parsing.
pub async fn crypto_ipn_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = match headers.get("x-ipn-signature").and_then(|v| v.to_str().ok()) {
        Some(signature) => signature,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Missing IPN signature"})),
            )
        }
    };

    if !verify_ipn_signature(&state.ipn_secret, &body, signature) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid IPN signature"})),
        );
    }

    let payload: IpnPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid request",
                    "details": format!("Bad IPN payload: {}", e)
                })),
            )
        }
    };

    let (payment_tx, payment_rx) = oneshot::channel();
    let send_result = state
        .payment_channel
        .send(PaymentRequest::GatewayIpn {
            payload,
            response: payment_tx,
        })
        .await;

    if let Err(e) = send_result {
        return channel_error_response(e);
    }

    match payment_rx.await {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({"status": "ok"}))),
        Ok(Err(service_error)) => service_error_response(service_error),
        Err(e) => channel_error_response(e),
    }
}

/// HMAC-SHA256 over the raw body, hex-encoded, compared in constant time.
pub fn verify_ipn_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };

    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    expected.as_bytes().ct_eq(signature.as_bytes()).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_a_valid_signature() {
        let body = br#"{"invoice_id":"inv-1","payment_status":"finished"}"#;
        let signature = sign("topsecret", body);

        assert!(verify_ipn_signature("topsecret", body, &signature));
    }

    #[test]
    fn rejects_a_tampered_body() {
        let body = br#"{"invoice_id":"inv-1","payment_status":"finished"}"#;
        let signature = sign("topsecret", body);

        let tampered = br#"{"invoice_id":"inv-2","payment_status":"finished"}"#;
        assert!(!verify_ipn_signature("topsecret", tampered, &signature));
    }

    #[test]
    fn rejects_a_wrong_secret() {
        let body = br#"{"invoice_id":"inv-1","payment_status":"finished"}"#;
        let signature = sign("topsecret", body);

        assert!(!verify_ipn_signature("othersecret", body, &signature));
    }

    #[test]
    fn rejects_garbage_signatures() {
        assert!(!verify_ipn_signature("topsecret", b"{}", "not-hex"));
        assert!(!verify_ipn_signature("topsecret", b"{}", ""));
    }
}
