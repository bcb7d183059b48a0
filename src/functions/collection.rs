use super::{decode, required};
use crate::{
    errors::AppResult,
    rpc::registry::Function,
    upstream::{Endpoint, UpstreamQuery},
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct CollectionArgs {
    username: String,
}

/// BGG answers `202 Accepted` while it builds a collection export; that body is relayed as-is.
pub struct GetUserCollection;

impl Function for GetUserCollection {
    fn name(&self) -> &'static str { "get_user_collection" }

    fn description(&self) -> &'static str {
        "Get a BoardGameGeek user's game collection."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "username": {"type": "string", "description": "BoardGameGeek username"}
            },
            "required": ["username"]
        })
    }

    fn prepare(&self, args: serde_json::Value) -> AppResult<UpstreamQuery> {
        let args: CollectionArgs = decode(self.name(), args)?;
        let username = required(self.name(), "username", &args.username)?;
        Ok(UpstreamQuery::new(Endpoint::Collection).param("username", username))
    }
}
