//! bitcoind JSON-RPC client for `getblocktemplate` and `submitblock`.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use solo_core::BlockTemplate;
use thiserror::Error;

use crate::source::{BlockSubmitter, SourceError, SubmitError, TemplateSource};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Failure of a single JSON-RPC call.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl From<CallError> for SourceError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Transport(msg) => SourceError::Transport(msg),
            rpc @ CallError::Rpc { .. } => SourceError::Rpc(rpc.to_string()),
        }
    }
}

impl From<CallError> for SubmitError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Transport(msg) => SubmitError::Transport(msg),
            rpc @ CallError::Rpc { .. } => SubmitError::Rpc(rpc.to_string()),
        }
    }
}

/// Connection settings for the node.
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

/// Blocking JSON-RPC 1.0 client. No retries: a failed call is reported
/// to the caller as is.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: Client,
    settings: RpcSettings,
}

impl RpcClient {
    pub fn new(settings: RpcSettings) -> Result<Self, CallError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| CallError::Transport(e.to_string()))?;
        Ok(RpcClient { client, settings })
    }

    pub fn url(&self) -> &str {
        &self.settings.url
    }

    /// Call `method` and return its `result` field.
    pub fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: 1,
            method,
            params,
        };

        let mut builder = self.client.post(&self.settings.url).json(&request);
        if let Some(user) = &self.settings.user {
            builder = builder.basic_auth(user, self.settings.password.as_ref());
        }

        let response = builder
            .send()
            .map_err(|e| CallError::Transport(e.to_string()))?;
        let status = response.status();
        let body: Value = response
            .json()
            .map_err(|e| CallError::Transport(format!("HTTP {status}: {e}")))?;

        parse_response(body)
    }
}

/// Extract the result of a JSON-RPC response body.
fn parse_response(body: Value) -> Result<Value, CallError> {
    let response: RpcResponse = serde_json::from_value(body)
        .map_err(|e| CallError::Transport(format!("malformed response: {e}")))?;

    if let Some(error) = response.error {
        return Err(CallError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    Ok(response.result)
}

/// Interpret a `submitblock` result: `null` means accepted, anything else
/// is the node's rejection reason.
fn submit_result(result: Value) -> Result<(), SubmitError> {
    match result {
        Value::Null => Ok(()),
        Value::String(reason) if reason.is_empty() => Ok(()),
        Value::String(reason) => Err(SubmitError::Rejected(reason)),
        other => Err(SubmitError::Rejected(other.to_string())),
    }
}

impl TemplateSource for RpcClient {
    fn fetch_template(&self) -> Result<BlockTemplate, SourceError> {
        let result = self.call("getblocktemplate", json!([{ "rules": ["segwit"] }]))?;
        Ok(BlockTemplate::from_value(result)?)
    }
}

impl BlockSubmitter for RpcClient {
    fn submit_block(&self, block_hex: &str) -> Result<(), SubmitError> {
        let result = self.call("submitblock", json!([block_hex]))?;
        submit_result(result)
    }
}
