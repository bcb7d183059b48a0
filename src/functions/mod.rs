pub mod collection;
pub mod hot;
pub mod search;
pub mod thing;

use crate::errors::{AppError, AppResult};
use serde::{de::DeserializeOwned, Deserialize};

pub const DEFAULT_TYPE: &str = "boardgame";

pub fn decode<T: DeserializeOwned>(function: &str, args: serde_json::Value) -> AppResult<T> {
    serde_json::from_value(args).map_err(|e| AppError::InvalidParameters(format!("{function}: {e}")))
}

// blank check only; the value is forwarded exactly as given
pub fn required(function: &str, field: &str, value: &str) -> AppResult<String> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidParameters(format!("{function}: `{field}` must not be empty")));
    }
    Ok(value.to_string())
}

pub fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IdPart {
    Num(u64),
    Str(String),
}

impl IdPart {
    fn as_string(&self) -> String {
        match self {
            IdPart::Num(n) => n.to_string(),
            IdPart::Str(s) => s.trim().to_string(),
        }
    }
}

pub fn join_ids(function: &str, parts: &[IdPart]) -> AppResult<String> {
    let mut ids = Vec::with_capacity(parts.len());
    for part in parts {
        for id in part.as_string().split(',') {
            let id = id.trim();
            if !id.is_empty() {
                ids.push(id.to_string());
            }
        }
    }
    if ids.is_empty() {
        return Err(AppError::InvalidParameters(format!("{function}: `id` must not be empty")));
    }
    Ok(ids.join(","))
}
