use std::fs;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use log::warn;
use serde_yml::Value;
use yaml_merge_keys::merge_keys_serde_yml;

/// Ordered, textual visualization settings. Later loads win per key.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct State {
    values: IndexMap<String, String>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), String> {
        let source = fs::read_to_string(path).map_err(|err| {
            format!("failed to read state file '{}': {}", path.display(), err)
        })?;

        self.load_str(&source).map_err(|err| {
            format!("failed to load state file '{}': {}", path.display(), err)
        })
    }

    pub fn load_str(&mut self, source: &str) -> Result<(), String> {
        let raw: Value = serde_yml::from_str(source)
            .map_err(|err| format!("invalid YAML: {}", err))?;

        let merged = merge_keys_serde_yml(raw).map_err(|err| {
            format!("failed to process YAML merge keys: {}", err)
        })?;

        self.merge_value(merged)
    }

    /// Applies `key=value` override tokens, e.g. from the command line.
    pub fn load_args<S: AsRef<str>>(&mut self, tokens: &[S]) {
        for token in tokens {
            let token = token.as_ref();
            let Some((key, value)) = token.split_once('=') else {
                warn!(
                    "ignoring state override '{}' (expected KEY=VALUE)",
                    token
                );
                continue;
            };

            let key = key.trim().trim_start_matches("--");
            if key.is_empty() {
                warn!("ignoring state override '{}' (empty key)", token);
                continue;
            }

            self.set(key, value.trim());
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let yaml = serde_yml::to_string(&self.values)
            .map_err(|err| format!("failed to encode state: {}", err))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    format!(
                        "failed to create '{}': {}",
                        parent.display(),
                        err
                    )
                })?;
            }
        }

        fs::write(path, yaml).map_err(|err| {
            format!("failed to write state file '{}': {}", path.display(), err)
        })
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("state value for '{}' is not valid: '{}'", key, raw);
                None
            }
        }
    }

    /// Whitespace or comma separated floats, e.g. a color.
    pub fn floats(&self, key: &str) -> Option<Vec<f32>> {
        let raw = self.get(key)?;
        let parsed = raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(str::parse::<f32>)
            .collect::<Result<Vec<_>, _>>();

        match parsed {
            Ok(values) => Some(values),
            Err(_) => {
                warn!(
                    "state value for '{}' is not a float list: '{}'",
                    key, raw
                );
                None
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn merge_value(&mut self, value: Value) -> Result<(), String> {
        if value.is_null() {
            return Ok(());
        }

        let mapping = value
            .as_mapping()
            .ok_or_else(|| "top-level YAML must be a mapping".to_string())?;

        for (key, entry) in mapping {
            let Some(name) = key.as_str() else {
                warn!("skipping non-string state key {:?}", key);
                continue;
            };

            match value_to_text(entry) {
                Some(text) => self.set(name, text),
                None => {
                    warn!("skipping state key '{}': unsupported value", name)
                }
            }
        }

        Ok(())
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Sequence(items) => {
            let parts = items
                .iter()
                .map(scalar_to_text)
                .collect::<Option<Vec<_>>>()?;
            Some(parts.join(" "))
        }
        other => scalar_to_text(other),
    }
}

fn scalar_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
