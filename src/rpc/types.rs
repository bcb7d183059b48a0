use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub schema_version: &'static str,
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub version: &'static str,
    pub callback_url: String,
    pub functions: &'a [FunctionDescriptor],
}

#[derive(Debug, Serialize)]
pub struct CallResponse {
    pub result: String,
}
