use crate::models::payments;
use anyhow::bail;
use reqwest;
use serde::Deserialize;

#[derive(Deserialize)]
struct ExplorerEnvelope {
    status: String,
    result: serde_json::Value,
}

#[derive(Clone)]
pub struct ExplorerApi {
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ExplorerApi {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Lists recent inbound token transfers for an address, newest first.
    /// The explorer answers status "0" with a message string when there are
    /// no results; that is an empty list, not an error.
    pub async fn token_transfers(
        &self,
        address: &str,
        contract: &str,
    ) -> Result<Vec<payments::TokenTransfer>, anyhow::Error> {
        let envelope: ExplorerEnvelope = self
            .client
            .get(format!("{}/api", self.url))
            .query(&[
                ("module", "account"),
                ("action", "tokentx"),
                ("address", address),
                ("contractaddress", contract),
                ("sort", "desc"),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?
            .json()
            .await?;

        if envelope.status != "1" {
            if envelope.result.is_array() {
                return Ok(vec![]);
            }
            if let Some(message) = envelope.result.as_str() {
                if message.contains("No transactions found") {
                    return Ok(vec![]);
                }
                bail!("Explorer: {}", message)
            }
            bail!("Explorer: bad response format.")
        }

        let transfers: Vec<payments::TokenTransfer> = serde_json::from_value(envelope.result)?;
        Ok(transfers)
    }
}
