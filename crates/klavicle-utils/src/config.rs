//! Persisted configuration file and credential lookup
//!
//! Configuration lives in a single JSON document (by default
//! `~/.klavicle/config.json`). Keys are addressed with dotted paths such as
//! `ai.providers.openai.api_key`.

use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_CONFIG_DIR: &str = ".klavicle";
const CONFIG_FILENAME: &str = "config.json";

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while reading or writing configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The dotted key was empty
    #[error("Key cannot be empty")]
    EmptyKey,

    /// No home directory could be resolved for the default location
    #[error("Could not determine home directory")]
    NoHomeDirectory,

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Source of provider credentials and model defaults
///
/// The analysis layer only depends on this seam, never on the file layout.
pub trait CredentialStore: Send + Sync {
    /// API key for a provider, if one is configured
    fn get_credential(&self, provider: &str) -> Option<String>;

    /// Default model name for a provider
    fn get_default_model(&self, provider: &str) -> String;

    /// Name of the provider to use when none is requested
    fn get_default_provider(&self) -> String;
}

/// Built-in model defaults used when the file does not name one
fn builtin_model(provider: &str) -> &'static str {
    match provider {
        "openai" => "gpt-4o",
        "anthropic" => "claude-3-opus-20240229",
        "mock" => "mock-model",
        _ => "",
    }
}

fn default_document() -> Value {
    json!({
        "ai": {
            "default_provider": "mock",
            "providers": {
                "openai": {
                    "api_key": "",
                    "default_model": "gpt-4o"
                },
                "anthropic": {
                    "api_key": "",
                    "default_model": "claude-3-opus-20240229"
                }
            },
            "output": {
                "color": true,
                "verbose": true
            }
        }
    })
}

/// JSON-file backed configuration with dotted-path access
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    document: Value,
}

impl ConfigManager {
    /// Open the configuration in the default per-user directory
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Self::open(home.join(DEFAULT_CONFIG_DIR))
    }

    /// Open (or create) the configuration file inside `dir`
    ///
    /// A missing file is created with the default document. A corrupt file is
    /// replaced by the default document.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILENAME);

        let document = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(value) if value.is_object() => value,
                _ => {
                    warn!(path = %path.display(), "Config file is corrupt, restoring defaults");
                    let value = default_document();
                    write_document(&path, &value)?;
                    value
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Creating default config file");
                let value = default_document();
                write_document(&path, &value)?;
                value
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self { path, document })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole configuration document
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Look up a dotted key
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.document, |node, part| node.as_object()?.get(part))
    }

    /// Look up a dotted key as a non-empty string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Set a dotted key and persist the file
    ///
    /// Intermediate segments that are missing or not objects are replaced by
    /// empty objects.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let parts = split_key(key)?;
        let (last, parents) = parts.split_last().ok_or(ConfigError::EmptyKey)?;

        let mut node = ensure_object(&mut self.document);
        for part in parents {
            let child = node
                .entry((*part).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            node = ensure_object(child);
        }
        node.insert((*last).to_string(), value);

        write_document(&self.path, &self.document)
    }

    /// Remove a dotted key and persist the file
    ///
    /// Removing a key that does not exist is not an error.
    pub fn unset(&mut self, key: &str) -> Result<()> {
        let parts = split_key(key)?;
        let (last, parents) = parts.split_last().ok_or(ConfigError::EmptyKey)?;

        let mut node = &mut self.document;
        for part in parents {
            match node.as_object_mut().and_then(|map| map.get_mut(*part)) {
                Some(child) if child.is_object() => node = child,
                _ => return Ok(()),
            }
        }
        if let Some(map) = node.as_object_mut() {
            map.remove(*last);
        }

        write_document(&self.path, &self.document)
    }
}

impl CredentialStore for ConfigManager {
    /// Environment variable `<PROVIDER>_API_KEY` takes precedence over the file
    fn get_credential(&self, provider: &str) -> Option<String> {
        let env_var = format!("{}_API_KEY", provider.to_uppercase());
        if let Ok(key) = std::env::var(&env_var) {
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.get_str(&format!("ai.providers.{provider}.api_key"))
            .map(str::to_string)
    }

    fn get_default_model(&self, provider: &str) -> String {
        self.get_str(&format!("ai.providers.{provider}.default_model"))
            .unwrap_or_else(|| builtin_model(provider))
            .to_string()
    }

    fn get_default_provider(&self) -> String {
        self.get_str("ai.default_provider")
            .unwrap_or("mock")
            .to_string()
    }
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    if key.is_empty() {
        return Err(ConfigError::EmptyKey);
    }
    Ok(key.split('.').collect())
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}

fn write_document(path: &Path, document: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(document)?;
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_default_document() {
        let dir = TempDir::new().unwrap();
        let config = ConfigManager::open(dir.path()).unwrap();

        assert!(config.path().exists());
        assert_eq!(config.get_default_provider(), "mock");
        assert_eq!(config.get_default_model("openai"), "gpt-4o");
        assert_eq!(
            config.get_default_model("anthropic"),
            "claude-3-opus-20240229"
        );
    }

    #[test]
    fn test_dotted_get_set_unset() {
        let dir = TempDir::new().unwrap();
        let mut config = ConfigManager::open(dir.path()).unwrap();

        config.set("ai.output.color", json!(false)).unwrap();
        assert_eq!(config.get("ai.output.color"), Some(&json!(false)));

        config.set("new.nested.key", json!("value")).unwrap();
        assert_eq!(config.get_str("new.nested.key"), Some("value"));

        config.unset("new.nested.key").unwrap();
        assert!(config.get("new.nested.key").is_none());

        // Missing parents are a no-op
        config.unset("does.not.exist").unwrap();
    }

    #[test]
    fn test_set_persists_to_disk() {
        let dir = TempDir::new().unwrap();
        {
            let mut config = ConfigManager::open(dir.path()).unwrap();
            config
                .set("ai.providers.openai.default_model", json!("gpt-4o-mini"))
                .unwrap();
        }

        let reopened = ConfigManager::open(dir.path()).unwrap();
        assert_eq!(reopened.get_default_model("openai"), "gpt-4o-mini");
    }

    #[test]
    fn test_set_replaces_scalar_parent() {
        let dir = TempDir::new().unwrap();
        let mut config = ConfigManager::open(dir.path()).unwrap();

        config.set("ai.default_provider.inner", json!(1)).unwrap();
        assert_eq!(config.get("ai.default_provider.inner"), Some(&json!(1)));
    }

    #[test]
    fn test_empty_key_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = ConfigManager::open(dir.path()).unwrap();

        assert!(matches!(
            config.set("", json!(1)),
            Err(ConfigError::EmptyKey)
        ));
        assert!(matches!(config.unset(""), Err(ConfigError::EmptyKey)));
    }

    #[test]
    fn test_corrupt_file_restored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "{not json").unwrap();

        let config = ConfigManager::open(dir.path()).unwrap();
        assert_eq!(config.get_default_provider(), "mock");
    }

    #[test]
    fn test_credential_env_precedence() {
        let dir = TempDir::new().unwrap();
        let mut config = ConfigManager::open(dir.path()).unwrap();
        config
            .set("ai.providers.credtest.api_key", json!("from-file"))
            .unwrap();

        // SAFETY: test-only env mutation on a variable no other test reads
        unsafe {
            std::env::remove_var("CREDTEST_API_KEY");
        }
        assert_eq!(config.get_credential("credtest").as_deref(), Some("from-file"));

        unsafe {
            std::env::set_var("CREDTEST_API_KEY", "from-env");
        }
        assert_eq!(config.get_credential("credtest").as_deref(), Some("from-env"));

        unsafe {
            std::env::remove_var("CREDTEST_API_KEY");
        }
    }

    #[test]
    fn test_empty_credential_is_none() {
        let dir = TempDir::new().unwrap();
        let config = ConfigManager::open(dir.path()).unwrap();

        unsafe {
            std::env::remove_var("EMPTYPROV_API_KEY");
        }
        assert!(config.get_credential("emptyprov").is_none());
    }
}
