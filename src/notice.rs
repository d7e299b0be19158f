//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`.
//! Role: Carries plugin diagnostics (the native message slot) out of the CLI host.
//! Invariants: Notices are non-fatal and never alter stdout payloads.
//! Invariants: JSON schema is stable once published; fields are additive-only.
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub cmd: String,
    pub source: String,
    pub message: String,
    pub details: Map<String, Value>,
}

impl Notice {
    /// A message published by the plugin after the named entry point returned.
    pub fn plugin_log(cmd: &str, source: &str, entry: &str, message: impl Into<String>) -> Self {
        let mut details = Map::new();
        details.insert("entry".to_string(), json!(entry));
        Self {
            kind: "plugin_log".to_string(),
            cmd: cmd.to_string(),
            source: source.to_string(),
            message: message.into(),
            details,
        }
    }
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("cmd".to_string(), json!(notice.cmd));
    inner.insert("source".to_string(), json!(notice.source));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

#[cfg(test)]
mod tests {
    use super::{Notice, notice_json};

    #[test]
    fn notice_json_has_required_fields() {
        let notice = Notice::plugin_log(
            "decode",
            "sheet.bin",
            "recvui",
            "Plugin option 'Page' set to '2'.",
        );

        let value = notice_json(&notice);
        let obj = value
            .get("notice")
            .and_then(|v| v.as_object())
            .expect("notice object");

        assert_eq!(obj.get("kind").and_then(|v| v.as_str()), Some("plugin_log"));
        assert_eq!(obj.get("cmd").and_then(|v| v.as_str()), Some("decode"));
        assert_eq!(obj.get("source").and_then(|v| v.as_str()), Some("sheet.bin"));
        assert_eq!(
            obj.get("message").and_then(|v| v.as_str()),
            Some("Plugin option 'Page' set to '2'.")
        );
        assert_eq!(
            obj.get("details")
                .and_then(|v| v.get("entry"))
                .and_then(|v| v.as_str()),
            Some("recvui")
        );
    }
}
