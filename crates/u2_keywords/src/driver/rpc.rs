//! JSON-RPC client for the uiautomator server behind the device agent

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::{secs, JSONRPC_PATH, MAX_WAIT, TIMING_CONFIG};
use crate::error::{Result, U2Error};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: String,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
}

impl JsonRpcClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            url: format!("{}{}", base_url.trim_end_matches('/'), JSONRPC_PATH),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Invoke `method`; `wait` extends the HTTP timeout for server-side waits
    pub async fn call(&self, method: &str, params: &[Value], wait: Duration) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: uuid::Uuid::new_v4().simple().to_string(),
            method,
            params,
        };
        debug!(method, "jsonrpc call");
        trace!(params = ?params, "jsonrpc params");

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .timeout(secs(TIMING_CONFIG.connection.rpc_timeout).saturating_add(wait.min(MAX_WAIT)))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.error {
            Some(error) => Err(map_rpc_error(method, error)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        }
    }

    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[Value],
        wait: Duration,
    ) -> Result<T> {
        let value = self.call(method, params, wait).await?;
        Ok(serde_json::from_value(value)?)
    }
}

fn map_rpc_error(method: &str, error: RpcErrorBody) -> U2Error {
    let data = error
        .data
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_default();
    if error.message.contains("UiObjectNotFoundException") || data.contains("UiObjectNotFoundException")
    {
        return U2Error::ElementNotFound(format!("{}: {}", method, error.message));
    }
    U2Error::Rpc {
        code: error.code,
        message: error.message,
    }
}
