use anyhow::bail;
use reqwest;
use serde_json::json;

#[derive(Clone)]
pub struct IpfsApi {
    jwt: String,
    url: String,
    client: reqwest::Client,
}

impl IpfsApi {
    pub fn new(jwt: String, url: String) -> Self {
        Self {
            jwt,
            url,
            client: reqwest::Client::new(),
        }
    }

    /// Pins a JSON document and returns its CID.
    pub async fn pin_json(
        &self,
        name: &str,
        content: &serde_json::Value,
    ) -> Result<String, anyhow::Error> {
        let payload = json!({
            "pinataMetadata": { "name": name },
            "pinataContent": content,
        });

        let response: serde_json::Value = self
            .client
            .post(format!("{}/pinning/pinJSONToIPFS", self.url))
            .bearer_auth(&self.jwt)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        match response.get("IpfsHash").and_then(|v| v.as_str()) {
            Some(cid) => Ok(cid.to_string()),
            None => bail!("Ipfs: Bad response format."),
        }
    }
}
