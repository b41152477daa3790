//! REST client for the hosted KV store.
//!
//! Speaks the Upstash Redis REST protocol (what Vercel KV exposes): a single
//! command is POSTed to the base URL as a JSON array, the response is
//! `{"result": ...}` on success or `{"error": "..."}` on failure. Integers
//! come back as JSON numbers from `INCR` but as strings from `GET`, so the
//! counter reads coerce both.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{KvError, KvStore};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Client for an Upstash-compatible KV REST endpoint.
pub struct RestKv {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestKv {
    /// Build a client for the given endpoint.
    ///
    /// `base_url` and `token` come from `KV_REST_API_URL` /
    /// `KV_REST_API_TOKEN` (see config).
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, KvError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    /// Issue one command and return its `result` value.
    async fn command(&self, cmd: &[&str]) -> Result<Value, KvError> {
        let resp = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&cmd)
            .send()
            .await?
            .error_for_status()?;

        let body: CommandResponse = resp.json().await?;
        if let Some(err) = body.error {
            return Err(KvError::Protocol(err));
        }
        Ok(body.result)
    }
}

/// Coerce a `result` value into an integer. `GET` on a counter returns the
/// value as a JSON string; `INCR` returns a number.
fn as_int(value: &Value) -> Result<i64, KvError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| KvError::Protocol(format!("non-integer result: {n}"))),
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|_| KvError::Protocol(format!("non-integer result: {s:?}"))),
        other => Err(KvError::Protocol(format!(
            "expected integer result, got {other}"
        ))),
    }
}

#[async_trait]
impl KvStore for RestKv {
    async fn is_member(&self, set_key: &str, value: &str) -> Result<bool, KvError> {
        let result = self.command(&["SISMEMBER", set_key, value]).await?;
        Ok(as_int(&result)? == 1)
    }

    async fn add_member(&self, set_key: &str, value: &str) -> Result<(), KvError> {
        self.command(&["SADD", set_key, value]).await?;
        Ok(())
    }

    async fn get_all_members(&self, set_key: &str) -> Result<Vec<String>, KvError> {
        let result = self.command(&["SMEMBERS", set_key]).await?;
        match result {
            Value::Array(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s),
                    other => Err(KvError::Protocol(format!(
                        "non-string set member: {other}"
                    ))),
                })
                .collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(KvError::Protocol(format!(
                "expected array from SMEMBERS, got {other}"
            ))),
        }
    }

    async fn write_fields(
        &self,
        hash_key: &str,
        fields: &[(String, String)],
    ) -> Result<(), KvError> {
        let mut cmd: Vec<&str> = Vec::with_capacity(2 + fields.len() * 2);
        cmd.push("HSET");
        cmd.push(hash_key);
        for (field, value) in fields {
            cmd.push(field);
            cmd.push(value);
        }
        self.command(&cmd).await?;
        Ok(())
    }

    async fn read_fields(&self, hash_key: &str) -> Result<HashMap<String, String>, KvError> {
        let result = self.command(&["HGETALL", hash_key]).await?;
        // HGETALL comes back as a flat [field, value, field, value, ...] array.
        let items = match result {
            Value::Array(items) => items,
            Value::Null => return Ok(HashMap::new()),
            other => {
                return Err(KvError::Protocol(format!(
                    "expected array from HGETALL, got {other}"
                )))
            }
        };
        if items.len() % 2 != 0 {
            return Err(KvError::Protocol(
                "odd-length HGETALL response".to_string(),
            ));
        }
        let mut map = HashMap::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            match (field, value) {
                (Value::String(f), Value::String(v)) => {
                    map.insert(f, v);
                }
                (f, v) => {
                    return Err(KvError::Protocol(format!(
                        "non-string hash pair: {f} => {v}"
                    )))
                }
            }
        }
        Ok(map)
    }

    async fn increment(&self, counter_key: &str) -> Result<i64, KvError> {
        let result = self.command(&["INCR", counter_key]).await?;
        as_int(&result)
    }

    async fn get(&self, counter_key: &str) -> Result<Option<i64>, KvError> {
        let result = self.command(&["GET", counter_key]).await?;
        match result {
            Value::Null => Ok(None),
            other => Ok(Some(as_int(&other)?)),
        }
    }
}
