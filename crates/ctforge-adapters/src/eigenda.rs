//! EigenDA Disperser Adapter
//!
//! Submits the post-deployment metadata blob (ABI, source, deployment info)
//! to an EigenDA disperser HTTP endpoint, per SPEC_FULL.md §4.4.5 step 5.
//! Called fire-and-forget from a background task after confirmation; its
//! failures never fail the deployment, so this adapter only ever returns a
//! commitment string or a display-able error, never panics.

use async_trait::async_trait;
use ctforge_stages::DataAvailabilityClient;

pub struct HttpEigenDaClient {
    http: reqwest::Client,
    disperser_url: String,
}

impl HttpEigenDaClient {
    pub fn new(disperser_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            disperser_url: disperser_url.into(),
        }
    }
}

#[derive(serde::Deserialize)]
struct DisperseResponse {
    commitment: String,
}

#[async_trait]
impl DataAvailabilityClient for HttpEigenDaClient {
    async fn submit_blob(&self, commitment_input: serde_json::Value) -> Result<String, String> {
        let response = self
            .http
            .post(format!("{}/disperse", self.disperser_url))
            .json(&commitment_input)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("disperser returned {status}: {body}"));
        }

        let parsed: DisperseResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(parsed.commitment)
    }
}
