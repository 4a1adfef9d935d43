use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cached user profile, persisted verbatim from the login response. The
/// server owns the shape; anything beyond id/email/name is carried through
/// untouched so a re-serialized blob loses nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Profile {
    /// The id in display form; servers send it as either a number or a
    /// string.
    pub fn display_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
