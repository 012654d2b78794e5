//! Normalized claims structure.
//!
//! Both verification paths (local JWT and remote verify endpoint) produce this
//! type. Identity fields the authority emits as integers are normalized to
//! strings; anything not modelled here is kept in `extra`.
//!
//! `user_id` and `email` are redacted in Debug output to prevent exposure in logs.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Claims for a successfully validated credential.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user - redacted in Debug output.
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<String>,

    /// Client (account) the user acts for.
    #[serde(default, deserialize_with = "lenient_id")]
    pub client_id: Option<String>,

    /// Identifier of the API token, present for opaque API keys.
    #[serde(default, deserialize_with = "lenient_id")]
    pub token_id: Option<String>,

    /// User e-mail - redacted in Debug output.
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub user_type: Option<String>,

    #[serde(default)]
    pub client_name: Option<String>,

    #[serde(default, deserialize_with = "null_as_false")]
    pub is_admin: bool,

    #[serde(default, deserialize_with = "lenient_id")]
    pub sso_entity: Option<String>,

    /// Group names, in the order the authority returned them.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_groups: Vec<String>,

    /// Expiration timestamp (Unix epoch seconds), when the credential carries one.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,

    /// Authority-specific fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("user_id", &self.user_id.as_ref().map(|_| "[REDACTED]"))
            .field("client_id", &self.client_id)
            .field("token_id", &self.token_id)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("user_type", &self.user_type)
            .field("client_name", &self.client_name)
            .field("is_admin", &self.is_admin)
            .field("sso_entity", &self.sso_entity)
            .field("user_groups", &self.user_groups)
            .field("exp", &self.exp)
            .field("extra_keys", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Claims {
    /// Look up an authority-specific field.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Accept a string or an integer id; `null` means absent.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(de::Error::custom("expected a string or integer identifier")),
    }
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept integer or fractional epoch seconds (fraction truncated).
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            #[allow(clippy::cast_possible_truncation)]
            let secs = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64));
            secs.map(Some)
                .ok_or_else(|| de::Error::custom("timestamp out of range"))
        }
        Some(_) => Err(de::Error::custom("expected a numeric timestamp")),
    }
}
