//! Purpose: Plugin configuration document codec and option-change tracking.
//! Exports: `PluginConfiguration`, `PluginOption`, `OptionKind`, `ConfigurationUpdate`,
//!          `OptionSnapshot`, `encode_configuration`, `parse_update`, `normalize_value`.
//! Role: JSON shape exchanged with the host UI through send_ui/recv_ui.
//! Invariants: Options serialize in declaration order with their raw values untouched.
//! Invariants: Values compare by normalized string only; no numeric or fuzzy equality.
//! Invariants: A document without `name` and `plugincfg` is a no-op update.
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::{Error, ErrorKind};
use crate::json::parse;

pub const DEFAULT_DISPLAY_VERSION: &str = "v1.0.0";
pub const DEFAULT_HOST_VERSION: u32 = 400;

fn default_display_version() -> String {
    DEFAULT_DISPLAY_VERSION.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginConfiguration {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_display_version")]
    pub version: String,
    #[serde(rename = "tileviewerVersion", default)]
    pub required_host_version: u32,
    #[serde(rename = "plugincfg", default)]
    pub options: Vec<PluginOption>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OptionKind {
    Bool,
    Enum,
    Number,
    String,
}

impl OptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OptionKind::Bool => "bool",
            OptionKind::Enum => "enum",
            OptionKind::Number => "number",
            OptionKind::String => "string",
        }
    }
}

/// One user-facing option. `kind` is advisory for the host UI and is not enforced here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginOption {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "options", default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub value: Value,
}

impl PluginOption {
    pub fn new(
        name: impl Into<String>,
        kind: OptionKind,
        help: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.as_str().to_string(),
            choices: Vec::new(),
            help: help.into(),
            value: value.into(),
        }
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }
}

/// The subset of a host document that drives an update.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ConfigurationUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "plugincfg", default)]
    pub options: Option<Vec<PluginOption>>,
}

pub fn encode_configuration(configuration: &PluginConfiguration) -> Result<String, Error> {
    serde_json::to_string(configuration).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to serialize plugin configuration")
            .with_source(err)
    })
}

/// Parses a host document. `Ok(None)` means the document carries nothing to apply.
pub fn parse_update(bytes: &[u8]) -> Result<Option<ConfigurationUpdate>, Error> {
    let value: Value = parse::from_slice(bytes).map_err(|err| {
        Error::new(ErrorKind::Format)
            .with_message(parse::hint_for_error(&err, "plugin configuration"))
            .with_source(err)
    })?;
    let fields = match &value {
        Value::Null => return Ok(None),
        Value::Object(fields) => fields,
        _ => {
            return Err(Error::new(ErrorKind::Format)
                .with_message("plugin configuration must be a JSON object"));
        }
    };
    if !fields.contains_key("name") && !fields.contains_key("plugincfg") {
        return Ok(None);
    }
    serde_json::from_value(value).map(Some).map_err(|err| {
        Error::new(ErrorKind::Format)
            .with_message(parse::hint_for_error(&err, "plugin configuration fields"))
            .with_source(err)
    })
}

/// Null becomes empty, strings pass through, everything else uses its JSON text.
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn display_value(value: &str) -> &str {
    if value.is_empty() { "<empty>" } else { value }
}

/// Last-applied option values keyed by option name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OptionSnapshot {
    values: BTreeMap<String, String>,
}

impl OptionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Records `options` and returns one log line per added, changed or removed option.
    pub fn apply(&mut self, options: &[PluginOption]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut seen = HashSet::new();
        for option in options {
            if option.name.trim().is_empty() {
                continue;
            }
            seen.insert(option.name.as_str());
            let value = normalize_value(&option.value);
            match self.values.get(&option.name) {
                Some(previous) if *previous == value => {}
                Some(previous) => lines.push(format!(
                    "Plugin option '{}' changed from '{}' to '{}'.",
                    option.name,
                    display_value(previous),
                    display_value(&value)
                )),
                None => lines.push(format!(
                    "Plugin option '{}' set to '{}'.",
                    option.name,
                    display_value(&value)
                )),
            }
            self.values.insert(option.name.clone(), value);
        }

        let removed: Vec<String> = self
            .values
            .keys()
            .filter(|name| !seen.contains(name.as_str()))
            .cloned()
            .collect();
        for name in removed {
            self.values.remove(&name);
            lines.push(format!("Plugin option '{name}' cleared."));
        }
        lines
    }

    /// Forgets every option, returning one "cleared" line per forgotten name.
    pub fn clear(&mut self) -> Vec<String> {
        let lines = self
            .values
            .keys()
            .map(|name| format!("Plugin option '{name}' cleared."))
            .collect();
        self.values.clear();
        lines
    }
}
