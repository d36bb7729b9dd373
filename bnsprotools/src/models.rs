//! Data structures exchanged with Pro Tools

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Snapshot of the open session, as returned by `GetSessionName`
///
/// Only `session_name` is interpreted; any other field sent by Pro Tools is
/// kept in `extra`. Never cached: every call queries Pro Tools again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionInfo {
    /// Session name, or `default` when Pro Tools did not report one
    pub fn name_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.session_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(default)
    }
}

/// Body of `RegisterConnection`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RegisterConnectionBody<'a> {
    pub company_name: &'a str,
    pub application_name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RegisterConnectionResponse {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Extracts the session file path from a `GetSessionPath` body.
///
/// Accepts both `{"session_path": {"path": "..."}}` and
/// `{"session_path": "..."}`.
pub(crate) fn parse_session_path(body: &Value) -> Option<PathBuf> {
    let node = body.get("session_path")?;
    let path = match node {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => obj.get("path")?.as_str()?,
        _ => return None,
    };
    let path = path.trim();
    (!path.is_empty()).then(|| PathBuf::from(path))
}
