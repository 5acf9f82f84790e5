//! Release check against a published version marker.
//!
//! Only reports; replacing the binary is left to the deployment.

use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::time::Duration;

pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compare dotted numeric versions. `None` if either side isn't one.
pub fn compare_versions(local: &str, remote: &str) -> Option<Ordering> {
    fn parts(v: &str) -> Option<Vec<u64>> {
        v.trim()
            .trim_start_matches('v')
            .split('.')
            .map(|p| p.parse::<u64>().ok())
            .collect()
    }
    let mut local = parts(local)?;
    let mut remote = parts(remote)?;
    let len = local.len().max(remote.len());
    local.resize(len, 0);
    remote.resize(len, 0);
    Some(local.cmp(&remote))
}

/// Fetches the version marker.
pub struct UpdateChecker {
    url: String,
    client: reqwest::Client,
}

impl UpdateChecker {
    pub fn new(url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            url: url.to_string(),
            client,
        }
    }

    /// The remote version if it is newer than `current`.
    pub async fn newer_than(&self, current: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("fetching version marker")?;
        if !resp.status().is_success() {
            anyhow::bail!("version marker request failed: {}", resp.status());
        }
        let remote = resp.text().await?.trim().to_string();
        tracing::info!("local version {current}, remote version {remote}");

        match compare_versions(current, &remote) {
            Some(Ordering::Less) => Ok(Some(remote)),
            Some(_) => Ok(None),
            None => anyhow::bail!("unparsable version marker '{remote}'"),
        }
    }
}
