//! PocketBase HTTP record store client.
//!
//! Implements [`RecordStore`] against the PocketBase records API
//! (`/api/collections/{collection}/records`). A 404 from the getters is
//! mapped to `None`; every other non-success status becomes an error
//! carrying the status and a truncated response body for diagnosis.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::store::RecordStore;

pub struct PocketBaseStore {
    base_url: String,
    client: reqwest::Client,
    token: Option<String>,
}

impl PocketBaseStore {
    /// Build a client from the remote configuration.
    ///
    /// # Errors
    ///
    /// Fails when `remote.base_url` is unset or the HTTP client cannot
    /// be constructed.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .context("remote.base_url is required for the PocketBase store")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: config.token.clone(),
        })
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{}/records", self.base_url, collection)
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, token),
            None => request,
        }
    }
}

/// Read a response body, truncated for log-friendly error messages.
async fn error_body(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    body.chars().take(500).collect()
}

#[async_trait]
impl RecordStore for PocketBaseStore {
    async fn get_first_list_item(&self, collection: &str, filter: &str) -> Result<Option<Value>> {
        let response = self
            .with_auth(self.client.get(self.records_url(collection)))
            .query(&[
                ("page", "1"),
                ("perPage", "1"),
                ("skipTotal", "1"),
                ("filter", filter),
            ])
            .send()
            .await
            .with_context(|| format!("failed to list records in '{}'", collection))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            bail!(
                "record list in '{}' failed (HTTP {}): {}",
                collection,
                status,
                error_body(response).await
            );
        }

        let page: Value = response.json().await?;
        let first = page
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .cloned();
        Ok(first)
    }

    async fn get_one(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let url = format!("{}/{}", self.records_url(collection), id);
        let response = self
            .with_auth(self.client.get(&url))
            .send()
            .await
            .with_context(|| format!("failed to fetch record '{}' from '{}'", id, collection))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            bail!(
                "record fetch '{}' in '{}' failed (HTTP {}): {}",
                id,
                collection,
                status,
                error_body(response).await
            );
        }

        Ok(Some(response.json().await?))
    }

    async fn create(&self, collection: &str, payload: &Value) -> Result<Value> {
        let response = self
            .with_auth(self.client.post(self.records_url(collection)))
            .json(payload)
            .send()
            .await
            .with_context(|| format!("failed to create record in '{}'", collection))?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "record create in '{}' failed (HTTP {}): {}",
                collection,
                status,
                error_body(response).await
            );
        }

        Ok(response.json().await?)
    }

    async fn update(&self, collection: &str, id: &str, payload: &Value) -> Result<Value> {
        let url = format!("{}/{}", self.records_url(collection), id);
        let response = self
            .with_auth(self.client.patch(&url))
            .json(payload)
            .send()
            .await
            .with_context(|| format!("failed to update record '{}' in '{}'", id, collection))?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "record update '{}' in '{}' failed (HTTP {}): {}",
                id,
                collection,
                status,
                error_body(response).await
            );
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_base_url() {
        let config = RemoteConfig::default();
        assert!(PocketBaseStore::new(&config).is_err());
    }

    #[test]
    fn strips_trailing_slash_from_base_url() {
        let config = RemoteConfig {
            base_url: Some("https://pb.example.com/".to_string()),
            timeout_secs: 30,
            ..Default::default()
        };
        let store = PocketBaseStore::new(&config).unwrap();
        assert_eq!(
            store.records_url("carts"),
            "https://pb.example.com/api/collections/carts/records"
        );
    }
}
