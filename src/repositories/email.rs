use anyhow::bail;
use reqwest;
use serde_json::json;

#[derive(Clone)]
pub struct EmailApi {
    api_key: String,
    url: String,
    from: String,
    client: reqwest::Client,
}

impl EmailApi {
    pub fn new(api_key: String, url: String, from: String) -> Self {
        Self {
            api_key,
            url,
            from,
            client: reqwest::Client::new(),
        }
    }

    pub async fn send_template(
        &self,
        to: &str,
        template: &str,
        substitutions: serde_json::Value,
    ) -> Result<(), anyhow::Error> {
        let payload = json!({
            "from": self.from,
            "to": to,
            "template": template,
            "substitutions": substitutions,
        });

        let response = self
            .client
            .post(format!("{}/v3/send", self.url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("Email: send failed with {}", response.status())
        }

        Ok(())
    }
}
