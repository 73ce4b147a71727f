use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: String,
    pub document_id: String,
    pub method: String,
    pub amount_in_cents: i64,
    pub currency: String,
    pub token_symbol: Option<String>,
    pub expected_amount: Option<f64>,
    pub tx_hash: Option<String>,
    pub provider_ref: Option<String>,
    pub status: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewPixPayment {
    pub document_id: String,
    pub amount_in_cents: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewCryptoPayment {
    pub document_id: String,
    pub amount_in_cents: i64,
    pub token_symbol: String,
    pub expected_amount: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewGatewayInvoice {
    pub document_id: String,
    pub amount_in_cents: i64,
    pub pay_currency: String,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixCharge {
    pub id: String,
    pub qr_copy_paste: String,
    pub qr_image_url: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixChargeStatus {
    pub charge_id: String,
    pub status: String,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct GatewayInvoice {
    pub id: String,
    pub invoice_url: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IpnPayload {
    pub invoice_id: String,
    pub payment_status: String,
}

/// One row of the explorer's `tokentx` listing. Values come back as raw
/// integer strings scaled by the token's decimal count.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub hash: String,
    pub to: String,
    pub contract_address: String,
    pub value: String,
    pub token_decimal: String,
}
