use super::{decode, optional, required, DEFAULT_TYPE};
use crate::{
    errors::AppResult,
    rpc::registry::Function,
    upstream::{Endpoint, UpstreamQuery},
};
use serde::Deserialize;
use serde_json::json;
use serde_with::{serde_as, BoolFromInt, DisplayFromStr, PickFirst};

#[serde_as]
#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr, BoolFromInt)>>")]
    #[serde(default)]
    exact: Option<bool>,
}

pub struct SearchGame;

impl Function for SearchGame {
    fn name(&self) -> &'static str { "search_game" }

    fn description(&self) -> &'static str {
        "Search BoardGameGeek for games by name."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Name or partial name to search for"},
                "type": {"type": "string", "description": "Thing type(s), comma separated", "default": DEFAULT_TYPE},
                "exact": {"type": "boolean", "description": "Only return exact name matches", "default": false}
            },
            "required": ["query"]
        })
    }

    fn prepare(&self, args: serde_json::Value) -> AppResult<UpstreamQuery> {
        let args: SearchArgs = decode(self.name(), args)?;
        let query = required(self.name(), "query", &args.query)?;
        let kind = optional(args.kind).unwrap_or_else(|| DEFAULT_TYPE.to_string());
        let mut q = UpstreamQuery::new(Endpoint::Search).param("query", query).param("type", kind);
        if args.exact.unwrap_or(false) {
            q = q.param("exact", "1");
        }
        Ok(q)
    }
}
