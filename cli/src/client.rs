// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Thin JSON client for the control plane's admin API. Error bodies carry
//! `{error, kind}`; both are surfaced to the operator.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{}:{}", host, port),
            client: reqwest::Client::new(),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .with_context(|| format!("control plane unreachable at {}", self.base_url))?;
        Self::decode(response).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("control plane unreachable at {}", self.base_url))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body: Value = response.json().await.context("malformed response body")?;

        if !status.is_success() {
            let kind = body["kind"].as_str().unwrap_or("unknown");
            let message = body["error"].as_str().unwrap_or("no error message");
            bail!("{} ({})", message, kind);
        }

        serde_json::from_value(body).context("unexpected response shape")
    }
}
