//! RestTree: `TreeDatabase` over a realtime database's REST interface.
//!
//! Every path maps to `{base}/{path}.json`. Reads are `GET`, writes `PUT`
//! (or `DELETE` for `null`), appends `POST` (the server answers with the
//! generated key as `{"name": "..."}`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::RemoteOptions;
use crate::error::{Result, StoreError};

use super::tree::TreeDatabase;

pub struct RestTree {
    client: reqwest::Client,
    base: Url,
    auth_token: Option<String>,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

impl RestTree {
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let base = Url::parse(base_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid remote URL \"{base_url}\": {e}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base,
            auth_token,
        })
    }

    /// Build from options; `None` when no base URL is configured.
    pub fn from_options(options: &RemoteOptions) -> Option<Result<Self, StoreError>> {
        let base = options.base_url.as_deref()?;
        Some(Self::new(
            base,
            options.auth_token.clone(),
            options.request_timeout(),
        ))
    }

    /// REST URL for a tree path.
    pub fn url_for(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        let path = path.trim_matches('/');
        url.set_path(&format!("{prefix}/{path}.json"));
        url.set_query(None);
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        url
    }

    fn check(path: &str, response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(StoreError::remote(path, format!("HTTP {}", status.as_u16())))
        }
    }
}

#[async_trait]
impl TreeDatabase for RestTree {
    async fn connect(&self) -> Result<(), StoreError> {
        let mut url = self.url_for("");
        url.query_pairs_mut().append_pair("shallow", "true");
        let response = self.client.get(url).send().await?;
        Self::check("", response)?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let response = self.client.get(self.url_for(path)).send().await?;
        let value: Value = Self::check(path, response)?.json().await?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let url = self.url_for(path);
        let request = if value.is_null() {
            self.client.delete(url)
        } else {
            self.client.put(url).json(&value)
        };
        Self::check(path, request.send().await?)?;
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let response = self.client.post(self.url_for(path)).json(&value).send().await?;
        let body: PushResponse = Self::check(path, response)?.json().await?;
        Ok(body.name)
    }
}
