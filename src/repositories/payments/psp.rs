use crate::models::payments;
use anyhow::bail;
use reqwest;
use serde_json::json;
use uuid::Uuid;

#[derive(Clone)]
pub struct PspApi {
    auth_token: String,
    url: String,
    client: reqwest::Client,
}

impl PspApi {
    pub fn new(auth_token: String, url: String) -> Self {
        Self {
            auth_token,
            url,
            client: reqwest::Client::new(),
        }
    }

    pub async fn create_charge(
        &self,
        amount_in_cents: i64,
    ) -> Result<payments::PixCharge, anyhow::Error> {
        let nonce = Uuid::new_v4().hyphenated().to_string();
        let payload = json!({
            "amountInCents": amount_in_cents,
        });

        let response = self
            .client
            .post(format!("{}/api/charge", self.url))
            .bearer_auth(&self.auth_token)
            .header("X-Nonce", nonce)
            .json(&payload)
            .send()
            .await?
            .text()
            .await?;

        let response_json: serde_json::Value = serde_json::from_str(&response)?;
        match response_json.get("response") {
            Some(r) => {
                let charge: payments::PixCharge = serde_json::from_value(r.clone())?;
                Ok(charge)
            }
            None => bail!("Psp: Bad response format."),
        }
    }
}
