// ABOUTME: Shared execution context threaded through every run task of a group
// ABOUTME: A JSON object enriched with each task's results and redacted after every task step

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// Top level key holding per task results, keyed by task identity
pub const TASK_RESULT_KEY: &str = "TaskResult";
/// Top level key holding the raw result payload of the most recent task
pub const JSON_RESULT_KEY: &str = "JsonResult";
/// Field under a task result listing the object(s) the task created
pub const OBJECT_NAME_KEY: &str = "objectName";
/// Top level key receiving command line variables
pub const VARIABLES_KEY: &str = "Variables";
/// Replaces the raw result payload once a task step is over
pub const REDACTED: &str = "--redacted--";

/// The shared context. Later tasks see every result recorded by earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(Map<String, JsonValue>);

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: JsonValue) -> Option<JsonValue> {
        self.0.insert(key.into(), value)
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    /// Walk nested objects along `path`
    pub fn nested(&self, path: &[&str]) -> Option<&JsonValue> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(*first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        Some(current)
    }

    pub fn nested_str(&self, path: &[&str]) -> Option<&str> {
        self.nested(path).and_then(JsonValue::as_str)
    }

    pub fn task_result(&self, identity: &str) -> Option<&JsonValue> {
        self.nested(&[TASK_RESULT_KEY, identity])
    }

    /// Comma separated object names recorded by the task, if any
    pub fn object_names(&self, identity: &str) -> Option<&str> {
        self.nested_str(&[TASK_RESULT_KEY, identity, OBJECT_NAME_KEY])
    }

    /// Record `TaskResult.<identity>.<field> = value`
    pub fn set_task_result(&mut self, identity: &str, field: &str, value: JsonValue) {
        let results = self
            .0
            .entry(TASK_RESULT_KEY.to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !results.is_object() {
            *results = JsonValue::Object(Map::new());
        }

        if let JsonValue::Object(results) = results {
            let entry = results
                .entry(identity.to_string())
                .or_insert_with(|| JsonValue::Object(Map::new()));
            if !entry.is_object() {
                *entry = JsonValue::Object(Map::new());
            }
            if let JsonValue::Object(entry) = entry {
                entry.insert(field.to_string(), value);
            }
        }
    }

    pub fn set_json_result(&mut self, raw: impl Into<String>) {
        self.0
            .insert(JSON_RESULT_KEY.to_string(), JsonValue::String(raw.into()));
    }

    pub fn json_result(&self) -> Option<&JsonValue> {
        self.0.get(JSON_RESULT_KEY)
    }

    /// Overwrite the raw result payload so it never reaches logs or later phases
    pub fn redact_json_result(&mut self) {
        self.0.insert(
            JSON_RESULT_KEY.to_string(),
            JsonValue::String(REDACTED.to_string()),
        );
    }

    pub fn is_json_result_redacted(&self) -> bool {
        self.json_result().and_then(JsonValue::as_str) == Some(REDACTED)
    }

    /// Add entries not already present; existing entries win
    pub fn merge_missing(&mut self, defaults: &Map<String, JsonValue>) {
        for (key, value) in defaults {
            if !self.0.contains_key(key) {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }

    /// Merge string variables under the `Variables` key, overriding existing ones
    pub fn merge_variables(&mut self, vars: &HashMap<String, String>) {
        let entry = self
            .0
            .entry(VARIABLES_KEY.to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !entry.is_object() {
            *entry = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(map) = entry {
            for (key, value) in vars {
                map.insert(key.clone(), JsonValue::String(value.clone()));
            }
        }
    }

    /// Context as a handlebars render root
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.0.clone())
    }

    /// YAML rendition for diagnostic logs
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.0).unwrap_or_else(|e| format!("<unrenderable values: {}>", e))
    }
}

impl From<Map<String, JsonValue>> for Values {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }
}
