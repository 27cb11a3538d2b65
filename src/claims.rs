use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PERMISSIONS_CLAIM: &str = "permissions";

/// Decoded payload of a verified token.
///
/// Inserted into the request extensions by
/// [`RequirePermissionLayer`](crate::RequirePermissionLayer), so handlers can take it as
/// `Extension<Claims>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(pub Map<String, Value>);

impl Claims {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The `permissions` entry, or `None` if the token does not carry one.
    ///
    /// Entries that are not strings are skipped. A `permissions` value that is not an array yields
    /// an empty list.
    pub fn permissions(&self) -> Option<Vec<&str>> {
        let permissions = self.0.get(PERMISSIONS_CLAIM)?;
        Some(
            permissions
                .as_array()
                .map(|values| values.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default(),
        )
    }

    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Claims {
    fn from(claims: Map<String, Value>) -> Self {
        Claims(claims)
    }
}
