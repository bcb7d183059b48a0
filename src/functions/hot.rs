use super::{decode, optional, DEFAULT_TYPE};
use crate::{
    errors::AppResult,
    rpc::registry::Function,
    upstream::{Endpoint, UpstreamQuery},
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct HotArgs {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

pub struct GetHotItems;

impl Function for GetHotItems {
    fn name(&self) -> &'static str { "get_hot_items" }

    fn description(&self) -> &'static str {
        "Get the current BoardGameGeek hotness list."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "type": {"type": "string", "description": "Hot list type", "default": DEFAULT_TYPE}
            },
            "required": []
        })
    }

    fn prepare(&self, args: serde_json::Value) -> AppResult<UpstreamQuery> {
        let args: HotArgs = decode(self.name(), args)?;
        let kind = optional(args.kind).unwrap_or_else(|| DEFAULT_TYPE.to_string());
        Ok(UpstreamQuery::new(Endpoint::Hot).param("type", kind))
    }
}
