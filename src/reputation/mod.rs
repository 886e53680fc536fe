//! IP reputation lookups.
//!
//! External collaborator behind the [`ReputationLookup`] trait. The default
//! implementation queries a getipintel-style HTTP endpoint that answers a
//! bare probability in `0.0..=1.0`; negative values are provider error codes.

use crate::config::ReputationConfig;
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ReputationLookup: Send + Sync {
    /// Probability in `0.0..=1.0` that the address is abusive.
    async fn score(&self, ip: &str) -> anyhow::Result<f64>;
}

pub struct HttpReputation {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReputation {
    pub fn new(config: &ReputationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("modbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }
}

#[async_trait]
impl ReputationLookup for HttpReputation {
    async fn score(&self, ip: &str) -> anyhow::Result<f64> {
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[("ip", ip)])
            .send()
            .await
            .context("reputation lookup request failed")?
            .error_for_status()
            .context("reputation provider rejected the request")?
            .text()
            .await
            .context("reputation provider sent an unreadable response")?;
        let score: f64 = body
            .trim()
            .parse()
            .with_context(|| format!("reputation provider sent a non-numeric reply: {body:?}"))?;
        if !(0.0..=1.0).contains(&score) {
            anyhow::bail!("reputation provider error code {score}");
        }
        Ok(score)
    }
}
