use super::{decode, join_ids, optional, IdPart};
use crate::{
    errors::AppResult,
    rpc::registry::Function,
    upstream::{Endpoint, UpstreamQuery},
};
use serde::Deserialize;
use serde_json::json;
use serde_with::{serde_as, BoolFromInt, DisplayFromStr, OneOrMany, PickFirst};

#[serde_as]
#[derive(Debug, Deserialize)]
struct ThingArgs {
    #[serde_as(as = "OneOrMany<_>")]
    id: Vec<IdPart>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr, BoolFromInt)>>")]
    #[serde(default)]
    stats: Option<bool>,
}

pub struct GetThing;

impl Function for GetThing {
    fn name(&self) -> &'static str { "get_thing" }

    fn description(&self) -> &'static str {
        "Get details for one or more BoardGameGeek items by id."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string", "description": "Item id, or several ids joined by commas"},
                "type": {"type": "string", "description": "Restrict results to these thing type(s)"},
                "stats": {"type": "boolean", "description": "Include ranking and rating stats", "default": true}
            },
            "required": ["id"]
        })
    }

    fn prepare(&self, args: serde_json::Value) -> AppResult<UpstreamQuery> {
        let args: ThingArgs = decode(self.name(), args)?;
        let mut q = UpstreamQuery::new(Endpoint::Thing).param("id", join_ids(self.name(), &args.id)?);
        if let Some(kind) = optional(args.kind) {
            q = q.param("type", kind);
        }
        if args.stats.unwrap_or(true) {
            q = q.param("stats", "1");
        }
        Ok(q)
    }
}
