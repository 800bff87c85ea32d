use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Liveness snapshot of the supervised tileserver.
///
/// `pid` is present iff `running` is true; use the constructors rather than
/// building the struct by hand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessStatus {
    pub running: bool,
    pub pid: Option<u32>,
}

impl ProcessStatus {
    pub fn stopped() -> Self {
        Self {
            running: false,
            pid: None,
        }
    }

    pub fn running(pid: u32) -> Self {
        Self {
            running: true,
            pid: Some(pid),
        }
    }
}

impl Default for ProcessStatus {
    fn default() -> Self {
        Self::stopped()
    }
}

/// Response body of the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub tileserver: ProcessStatus,
}

/// A parsed tileserver-rs configuration file.
///
/// Only the keys Arcturus reads are typed; everything else is kept in `extra`
/// so the config can be echoed back unchanged. `files` is passed through
/// as-is since tileserver-rs owns its meaning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TileserverConfig {
    #[serde(default = "default_files")]
    pub files: Value,
    #[serde(default)]
    pub server: Map<String, Value>,
    #[serde(default)]
    pub sources: Vec<Value>,
    #[serde(default)]
    pub styles: Vec<StyleEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_files() -> Value {
    Value::String(String::new())
}

impl Default for TileserverConfig {
    fn default() -> Self {
        Self {
            files: default_files(),
            server: Map::new(),
            sources: Vec::new(),
            styles: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// A `[[styles]]` entry, exposed through the API as a map. Entries without
/// an `id` are listed but can never be looked up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_status_constructors() {
        let status = ProcessStatus::running(4242);
        assert!(status.running);
        assert_eq!(status.pid, Some(4242));

        let status = ProcessStatus::stopped();
        assert!(!status.running);
        assert_eq!(status.pid, None);
        assert_eq!(ProcessStatus::default(), status);
    }

    #[test]
    fn test_stopped_status_serializes_null_pid() {
        let json = serde_json::to_value(ProcessStatus::stopped()).unwrap();
        assert_eq!(json, serde_json::json!({ "running": false, "pid": null }));
    }

    #[test]
    fn test_style_entry_keeps_unknown_keys() {
        let entry: StyleEntry = serde_json::from_value(serde_json::json!({
            "id": "osm-bright",
            "path": "styles/osm-bright.json",
            "name": "OSM Bright"
        }))
        .unwrap();

        assert_eq!(entry.id.as_deref(), Some("osm-bright"));
        assert_eq!(entry.path.as_deref(), Some("styles/osm-bright.json"));
        assert_eq!(entry.extra.get("name"), Some(&Value::from("OSM Bright")));
    }

    #[test]
    fn test_style_entry_without_id() {
        let entry: StyleEntry =
            serde_json::from_value(serde_json::json!({ "path": "styles/x.json" })).unwrap();

        assert_eq!(entry.id, None);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({ "path": "styles/x.json" })
        );
    }

    #[test]
    fn test_default_config_has_empty_files() {
        let json = serde_json::to_value(TileserverConfig::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "files": "", "server": {}, "sources": [], "styles": [] })
        );
    }
}
