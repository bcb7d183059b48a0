use super::types::FunctionDescriptor;
use crate::{
    errors::{AppError, AppResult},
    upstream::{Upstream, UpstreamQuery},
};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;

pub type DynFunction = Arc<dyn Function + Send + Sync + 'static>;

pub trait Function {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> serde_json::Value;
    fn prepare(&self, args: serde_json::Value) -> AppResult<UpstreamQuery>;

    fn descriptor(&self) -> FunctionDescriptor {
        FunctionDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

#[derive(Clone)]
pub struct FunctionRegistry {
    functions: Vec<(String, DynFunction)>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        use crate::functions::{
            collection::GetUserCollection, hot::GetHotItems, search::SearchGame, thing::GetThing,
        };
        let functions: Vec<DynFunction> =
            vec![Arc::new(SearchGame), Arc::new(GetThing), Arc::new(GetHotItems), Arc::new(GetUserCollection)];
        Self { functions: functions.into_iter().map(|f| (f.name().to_string(), f)).collect() }
    }

    pub fn get(&self, name: &str) -> Option<DynFunction> {
        self.functions.iter().find(|(n, _)| n == name).map(|(_, f)| f.clone())
    }

    pub fn list_names(&self) -> Vec<String> {
        self.functions.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn descriptors(&self) -> Vec<FunctionDescriptor> {
        self.functions.iter().map(|(_, f)| f.descriptor()).collect()
    }

    pub async fn invoke(&self, upstream: &(dyn Upstream + Send + Sync), name: &str, args: serde_json::Value) -> AppResult<String> {
        let function = self.get(name).ok_or_else(|| AppError::UnknownFunction(name.to_string()))?;
        let query = function.prepare(args)?;
        tracing::debug!(function = name, endpoint = %query.endpoint, query = %query.query_string(), "forwarding");
        upstream.fetch(&query).await
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self { Self::new() }
}

#[derive(Debug, Deserialize)]
pub struct FunctionCall {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub function_call: FunctionCall,
    #[serde(default = "empty_object", deserialize_with = "arguments")]
    pub arguments: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// `arguments` arrives as a JSON-encoded string; a bare object or null is accepted too.
fn arguments<'de, D: Deserializer<'de>>(de: D) -> Result<serde_json::Value, D::Error> {
    use serde::de::Error;
    let raw = serde_json::Value::deserialize(de)?;
    let value = match raw {
        serde_json::Value::Null => empty_object(),
        serde_json::Value::String(s) if s.trim().is_empty() => empty_object(),
        serde_json::Value::String(s) => {
            serde_json::from_str(&s).map_err(|e| D::Error::custom(format!("arguments is not valid JSON: {e}")))?
        }
        other => other,
    };
    if !value.is_object() {
        return Err(D::Error::custom("arguments must be a JSON object"));
    }
    Ok(value)
}
