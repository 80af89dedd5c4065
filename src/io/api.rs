//! Nuki Web API client
//!
//! Bearer-token HTTP client for the cloud API. The log fetch is tolerant by
//! design: transport and permission failures surface as errors the caller
//! turns into an empty cycle, never a crash.

use crate::domain::types::{LogRecord, Smartlock};
use anyhow::{bail, Context};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Extract smartlocks from a listing response.
///
/// The API has returned a bare list, a wrapped list, and a single object
/// over time; all three are accepted. Unparsable entries are skipped.
fn parse_smartlock_listing(body: Value) -> Vec<Smartlock> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("smartlocks") {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(obj)],
        },
        other => {
            warn!(body = %other, "smartlock_listing_unexpected_shape");
            vec![]
        }
    };

    let mut locks = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<Smartlock>(item) {
            Ok(lock) => locks.push(lock),
            Err(e) => warn!(error = %e, "smartlock_entry_unparsable"),
        }
    }
    locks
}

pub struct NukiApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl NukiApi {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
    }

    /// Check that the token is valid by fetching the account
    pub async fn test_connection(&self) -> anyhow::Result<()> {
        let response = self.get("/account").send().await.context("Failed to reach Nuki API")?;

        match response.status().as_u16() {
            200 => Ok(()),
            401 => bail!("Invalid API token - check your Nuki Web API token"),
            403 => bail!("API access forbidden - check token permissions"),
            status => bail!("Unexpected API response: {status}"),
        }
    }

    /// List smartlocks on the account
    pub async fn list_smartlocks(&self) -> anyhow::Result<Vec<Smartlock>> {
        let response = self
            .get("/smartlock")
            .send()
            .await
            .context("Failed to fetch smartlocks")?
            .error_for_status()
            .context("Smartlock listing rejected")?;

        let body: Value = response.json().await.context("Smartlock listing is not JSON")?;
        Ok(parse_smartlock_listing(body))
    }

    /// Fetch a smartlock's current state
    pub async fn smartlock_state(&self, smartlock_id: i64) -> anyhow::Result<Smartlock> {
        let response = self
            .get(&format!("/smartlock/{smartlock_id}"))
            .send()
            .await
            .context("Failed to fetch smartlock state")?
            .error_for_status()
            .context("Smartlock state rejected")?;

        response.json().await.context("Smartlock state is not JSON")
    }

    /// Fetch a smartlock's activity log, newest first.
    ///
    /// 403/404 mean the log endpoint is unavailable for this lock; that is
    /// an empty log, not an error.
    pub async fn smartlock_log(&self, smartlock_id: i64, limit: u32) -> anyhow::Result<Vec<LogRecord>> {
        let response = self
            .get(&format!("/smartlock/{smartlock_id}/log?limit={limit}"))
            .send()
            .await
            .context("Failed to fetch activity log")?;

        match response.status().as_u16() {
            403 | 404 => {
                warn!(smartlock_id = %smartlock_id, status = %response.status(), "log_endpoint_unavailable");
                return Ok(vec![]);
            }
            _ => {}
        }
        let response = response.error_for_status().context("Activity log rejected")?;

        let records: Vec<LogRecord> =
            response.json().await.context("Activity log is not a JSON list")?;
        debug!(smartlock_id = %smartlock_id, count = %records.len(), "activity_log_fetched");
        Ok(records)
    }

    /// Send a lock action (unlock/lock/unlatch/...)
    pub async fn send_action(&self, smartlock_id: i64, action: i64) -> anyhow::Result<()> {
        let response = self
            .client
            .post(format!("{}/smartlock/{smartlock_id}/action", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "action": action }))
            .send()
            .await
            .context("Failed to send lock action")?;

        response.error_for_status().context("Lock action rejected")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api =
            NukiApi::new("https://api.nuki.io/", "token", Duration::from_secs(5)).unwrap();
        assert_eq!(api.base_url, "https://api.nuki.io");
    }

    #[test]
    fn test_parse_listing_bare_list() {
        let body = serde_json::json!([{"smartlockId": 1, "name": "Front"}]);
        let locks = parse_smartlock_listing(body);
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].smartlock_id, 1);
        assert_eq!(locks[0].name, "Front");
    }

    #[test]
    fn test_parse_listing_wrapped_list() {
        let body = serde_json::json!({"smartlocks": [{"smartlockId": 2, "name": "Back"}]});
        let locks = parse_smartlock_listing(body);
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].smartlock_id, 2);
    }

    #[test]
    fn test_parse_listing_single_object() {
        let body = serde_json::json!({"smartlockId": 3, "name": "Cellar"});
        let locks = parse_smartlock_listing(body);
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].smartlock_id, 3);
    }

    #[test]
    fn test_parse_listing_skips_bad_entries() {
        let body = serde_json::json!([{"smartlockId": 4}, "garbage", {"name": "no id"}]);
        let locks = parse_smartlock_listing(body);
        // Entries without a smartlockId fail to parse and are skipped
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].smartlock_id, 4);
    }
}
