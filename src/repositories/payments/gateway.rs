use crate::models::payments;
use anyhow::bail;
use reqwest;
use serde_json::json;

#[derive(Clone)]
pub struct GatewayApi {
    api_key: String,
    url: String,
    client: reqwest::Client,
}

impl GatewayApi {
    pub fn new(api_key: String, url: String) -> Self {
        Self {
            api_key,
            url,
            client: reqwest::Client::new(),
        }
    }

    pub async fn create_invoice(
        &self,
        order_id: &str,
        amount_in_cents: i64,
        pay_currency: &str,
    ) -> Result<payments::GatewayInvoice, anyhow::Error> {
        let payload = json!({
            "order_id": order_id,
            "price_amount": amount_in_cents as f64 / 100.0,
            "price_currency": "brl",
            "pay_currency": pay_currency,
        });

        let response = self
            .client
            .post(format!("{}/v1/invoice", self.url))
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Gateway: invoice creation failed with {}", response.status())
        }

        let invoice: payments::GatewayInvoice = response.json().await?;
        Ok(invoice)
    }
}
