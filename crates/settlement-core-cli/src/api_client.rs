use anyhow::{bail, Context};

/// Thin REST client talking to a running `settlement-core-node` as a
/// system actor. Raw `reqwest` calls rather than a generated client, to
/// keep the admin CLI lean and dependency-minimal.
pub struct ApiClient {
    base_url: String,
    system_secret: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, system_secret: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            system_secret: system_secret.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-actor-type", "system")
            .header("x-system-secret", &self.system_secret)
    }

    pub async fn get_order(&self, order_id: &str) -> anyhow::Result<serde_json::Value> {
        self.send(self.request(reqwest::Method::GET, &format!("/orders/{order_id}"))).await
    }

    pub async fn expire_order(&self, order_id: &str) -> anyhow::Result<serde_json::Value> {
        self.send(
            self.request(reqwest::Method::POST, &format!("/orders/{order_id}/expire"))
                .json(&serde_json::json!({})),
        )
        .await
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> anyhow::Result<serde_json::Value> {
        let resp = builder.send().await.context("calling settlement-core-node")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing response body")?;

        if !status.is_success() {
            bail!("request failed ({status}): {body}");
        }
        Ok(body)
    }
}
