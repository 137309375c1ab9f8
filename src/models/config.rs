use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "http://localhost:5000/v1";
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DB_NAME: &str = "Gen_AI";
pub const DEFAULT_EMBEDDING_COLLECTION: &str = "Embedings";
pub const DEFAULT_RESULT_COLLECTION: &str = "Result";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_RESPONSE_MODEL: &str = "deepseek/deepseek-r1-0528-qwen3-8b";
pub const DEFAULT_BATCH_SIZE: usize = 16;
pub const DEFAULT_TIMEOUT_SECS: u64 = 900;

pub const ENV_API_BASE: &str = "OPENAI_API_BASE";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MONGO_URI: &str = "MONGO_URI";
pub const ENV_DB_NAME: &str = "DB_NAME";
pub const ENV_EMBEDDING_COLLECTION: &str = "EMBEDDING_COLLECTION";
pub const ENV_RESULT_COLLECTION: &str = "RESULT_COLLECTION";
pub const ENV_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";
pub const ENV_RESPONSE_MODEL: &str = "RESPONSE_MODEL";
pub const ENV_BATCH_SIZE: &str = "BATCH_SIZE";
pub const ENV_TIMEOUT_SECS: &str = "REQUEST_TIMEOUT_SECS";

/// Effective configuration for one run. Read-only once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub models: ModelConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
    pub embedding_collection: String,
    pub result_collection: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_MONGO_URI.to_string(),
            name: DEFAULT_DB_NAME.to_string(),
            embedding_collection: DEFAULT_EMBEDDING_COLLECTION.to_string(),
            result_collection: DEFAULT_RESULT_COLLECTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelConfig {
    pub embedding: String,
    pub response: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding: DEFAULT_EMBEDDING_MODEL.to_string(),
            response: DEFAULT_RESPONSE_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingConfig {
    pub batch_size: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Values given explicitly on the command line. They win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub mongo_uri: Option<String>,
    pub db_name: Option<String>,
    pub embedding_collection: Option<String>,
    pub result_collection: Option<String>,
    pub embedding_model: Option<String>,
    pub response_model: Option<String>,
    pub batch_size: Option<String>,
    pub timeout_secs: Option<String>,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    #[default]
    Default,
    File,
    Env,
    Flag,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Env => write!(f, "env"),
            ConfigSource::Flag => write!(f, "flag"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigSources {
    pub api_base: ConfigSource,
    pub api_key: ConfigSource,
    pub timeout_secs: ConfigSource,
    pub mongo_uri: ConfigSource,
    pub db_name: ConfigSource,
    pub embedding_collection: ConfigSource,
    pub result_collection: ConfigSource,
    pub embedding_model: ConfigSource,
    pub response_model: ConfigSource,
    pub batch_size: ConfigSource,
}

/// A resolved configuration together with the provenance of each value.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub sources: ConfigSources,
    pub file_path: Option<PathBuf>,
}

/// On-disk configuration. Every field is optional; missing ones fall through.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    api: FileApi,
    #[serde(default)]
    database: FileDatabase,
    #[serde(default)]
    models: FileModels,
    #[serde(default)]
    processing: FileProcessing,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileApi {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileDatabase {
    uri: Option<String>,
    name: Option<String>,
    embedding_collection: Option<String>,
    result_collection: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileModels {
    embedding: Option<String>,
    response: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileProcessing {
    batch_size: Option<i64>,
}

impl FileConfig {
    fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            Some(path) => path.to_path_buf(),
            None => match Config::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok((Self::default(), None)),
            },
        };

        let content = std::fs::read_to_string(&path)?;
        let file: FileConfig = toml::from_str(&content)?;
        Ok((file, Some(path)))
    }
}

/// One candidate value from a configuration layer.
struct Layer<'a> {
    value: Option<String>,
    source: ConfigSource,
    label: &'a str,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// First non-blank value across `layers`, highest precedence first.
fn pick<'a>(layers: [Layer<'a>; 3]) -> Option<(String, ConfigSource, &'a str)> {
    layers
        .into_iter()
        .find_map(|l| non_blank(l.value.as_deref()).map(|v| (v, l.source, l.label)))
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("embed-store").join("config.toml"))
    }

    /// Resolve against the process environment.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<ResolvedConfig, ConfigError> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve with precedence flag > environment > config file > default, then validate.
    pub fn resolve_with<F>(overrides: &ConfigOverrides, env: F) -> Result<ResolvedConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (file, file_path) = FileConfig::load(overrides.config_path.as_deref())?;
        let mut sources = ConfigSources::default();

        let string_value = |flag: &Option<String>,
                            flag_label: &'static str,
                            var: &'static str,
                            from_file: &Option<String>,
                            default: &str,
                            source: &mut ConfigSource|
         -> String {
            let picked = pick([
                Layer {
                    value: flag.clone(),
                    source: ConfigSource::Flag,
                    label: flag_label,
                },
                Layer {
                    value: env(var),
                    source: ConfigSource::Env,
                    label: var,
                },
                Layer {
                    value: from_file.clone(),
                    source: ConfigSource::File,
                    label: "config file",
                },
            ]);
            match picked {
                Some((value, from, _)) => {
                    *source = from;
                    value
                }
                None => default.to_string(),
            }
        };

        let base_url = string_value(
            &overrides.api_base,
            "--api-base",
            ENV_API_BASE,
            &file.api.base_url,
            DEFAULT_API_BASE,
            &mut sources.api_base,
        );
        let api_key = string_value(
            &overrides.api_key,
            "--api-key",
            ENV_API_KEY,
            &file.api.api_key,
            "",
            &mut sources.api_key,
        );
        let uri = string_value(
            &overrides.mongo_uri,
            "--mongo-uri",
            ENV_MONGO_URI,
            &file.database.uri,
            DEFAULT_MONGO_URI,
            &mut sources.mongo_uri,
        );
        let name = string_value(
            &overrides.db_name,
            "--db-name",
            ENV_DB_NAME,
            &file.database.name,
            DEFAULT_DB_NAME,
            &mut sources.db_name,
        );
        let embedding_collection = string_value(
            &overrides.embedding_collection,
            "--embedding-collection",
            ENV_EMBEDDING_COLLECTION,
            &file.database.embedding_collection,
            DEFAULT_EMBEDDING_COLLECTION,
            &mut sources.embedding_collection,
        );
        let result_collection = string_value(
            &overrides.result_collection,
            "--result-collection",
            ENV_RESULT_COLLECTION,
            &file.database.result_collection,
            DEFAULT_RESULT_COLLECTION,
            &mut sources.result_collection,
        );
        let embedding_model = string_value(
            &overrides.embedding_model,
            "--embedding-model",
            ENV_EMBEDDING_MODEL,
            &file.models.embedding,
            DEFAULT_EMBEDDING_MODEL,
            &mut sources.embedding_model,
        );
        let response_model = string_value(
            &overrides.response_model,
            "--response-model",
            ENV_RESPONSE_MODEL,
            &file.models.response,
            DEFAULT_RESPONSE_MODEL,
            &mut sources.response_model,
        );

        let batch_size = positive_value(
            "batch_size",
            [
                Layer {
                    value: overrides.batch_size.clone(),
                    source: ConfigSource::Flag,
                    label: "--batch-size",
                },
                Layer {
                    value: env(ENV_BATCH_SIZE),
                    source: ConfigSource::Env,
                    label: ENV_BATCH_SIZE,
                },
                Layer {
                    value: file.processing.batch_size.map(|v| v.to_string()),
                    source: ConfigSource::File,
                    label: "config file",
                },
            ],
            DEFAULT_BATCH_SIZE as u64,
            &mut sources.batch_size,
        )?;
        let timeout_secs = positive_value(
            "timeout_secs",
            [
                Layer {
                    value: overrides.timeout_secs.clone(),
                    source: ConfigSource::Flag,
                    label: "--timeout-secs",
                },
                Layer {
                    value: env(ENV_TIMEOUT_SECS),
                    source: ConfigSource::Env,
                    label: ENV_TIMEOUT_SECS,
                },
                Layer {
                    value: file.api.timeout_secs.map(|v| v.to_string()),
                    source: ConfigSource::File,
                    label: "config file",
                },
            ],
            DEFAULT_TIMEOUT_SECS,
            &mut sources.timeout_secs,
        )?;

        let config = Config {
            api: ApiConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: Some(api_key).filter(|k| !k.is_empty()),
                timeout_secs,
            },
            database: DatabaseConfig {
                uri,
                name,
                embedding_collection,
                result_collection,
            },
            models: ModelConfig {
                embedding: embedding_model,
                response: response_model,
            },
            processing: ProcessingConfig {
                batch_size: batch_size as usize,
            },
        };
        config.validate()?;

        Ok(ResolvedConfig {
            config,
            sources,
            file_path,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                field: "api_base",
                message: format!(
                    "{ENV_API_BASE} must start with http:// or https:// (got {:?})",
                    self.api.base_url
                ),
            });
        }

        if !(self.database.uri.starts_with("mongodb://")
            || self.database.uri.starts_with("mongodb+srv://"))
        {
            return Err(ConfigError::Invalid {
                field: "mongo_uri",
                message: format!("{ENV_MONGO_URI} must start with mongodb:// or mongodb+srv://"),
            });
        }

        if let Some(c) = self
            .database
            .name
            .chars()
            .find(|c| matches!(c, '/' | '\\' | '.' | ' ' | '"' | '$'))
        {
            return Err(ConfigError::Invalid {
                field: "db_name",
                message: format!(
                    "database name {:?} contains forbidden character {c:?}",
                    self.database.name
                ),
            });
        }

        for (field, name) in [
            ("embedding_collection", &self.database.embedding_collection),
            ("result_collection", &self.database.result_collection),
        ] {
            if name.contains('$') || name.starts_with("system.") {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!(
                        "collection name {name:?} must not contain '$' or start with 'system.'"
                    ),
                });
            }
        }

        if self.processing.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_size",
                message: "must be a positive integer".to_string(),
            });
        }

        Ok(())
    }
}

fn positive_value(
    field: &'static str,
    layers: [Layer<'_>; 3],
    default: u64,
    source: &mut ConfigSource,
) -> Result<u64, ConfigError> {
    let Some((raw, from, label)) = pick(layers) else {
        return Ok(default);
    };

    match raw.parse::<i64>() {
        Ok(value) if value > 0 => {
            *source = from;
            Ok(value as u64)
        }
        _ => Err(ConfigError::Invalid {
            field,
            message: format!("must be a positive integer (got {raw:?} from {label})"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn no_file() -> (tempfile::NamedTempFile, ConfigOverrides) {
        let file = write_config("");
        let overrides = ConfigOverrides {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        (file, overrides)
    }

    #[test]
    fn test_defaults() {
        let (_file, overrides) = no_file();
        let resolved = Config::resolve_with(&overrides, env_from(&[])).unwrap();
        let config = resolved.config;

        assert_eq!(config.api.base_url, DEFAULT_API_BASE);
        assert_eq!(config.api.api_key, None);
        assert_eq!(config.database.uri, DEFAULT_MONGO_URI);
        assert_eq!(config.database.name, "Gen_AI");
        assert_eq!(config.database.embedding_collection, "Embedings");
        assert_eq!(config.database.result_collection, "Result");
        assert_eq!(config.models.embedding, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.processing.batch_size, 16);
        assert_eq!(resolved.sources.batch_size, ConfigSource::Default);
    }

    #[test]
    fn test_env_overrides_default() {
        let (_file, overrides) = no_file();
        let env = env_from(&[
            (ENV_API_BASE, "https://api.example.com/v1/"),
            (ENV_API_KEY, "sk-test"),
            (ENV_BATCH_SIZE, "4"),
            (ENV_DB_NAME, "Other"),
        ]);
        let resolved = Config::resolve_with(&overrides, env).unwrap();

        assert_eq!(resolved.config.api.base_url, "https://api.example.com/v1");
        assert_eq!(resolved.config.api.api_key.as_deref(), Some("sk-test"));
        assert_eq!(resolved.config.processing.batch_size, 4);
        assert_eq!(resolved.config.database.name, "Other");
        assert_eq!(resolved.sources.api_base, ConfigSource::Env);
        assert_eq!(resolved.sources.mongo_uri, ConfigSource::Default);
    }

    #[test]
    fn test_flag_overrides_env() {
        let (_file, mut overrides) = no_file();
        overrides.batch_size = Some("2".to_string());
        overrides.embedding_model = Some("nomic-embed-text".to_string());
        let env = env_from(&[(ENV_BATCH_SIZE, "8"), (ENV_EMBEDDING_MODEL, "env-model")]);

        let resolved = Config::resolve_with(&overrides, env).unwrap();
        assert_eq!(resolved.config.processing.batch_size, 2);
        assert_eq!(resolved.config.models.embedding, "nomic-embed-text");
        assert_eq!(resolved.sources.batch_size, ConfigSource::Flag);
        assert_eq!(resolved.sources.embedding_model, ConfigSource::Flag);
    }

    #[test]
    fn test_blank_values_fall_through() {
        let (_file, mut overrides) = no_file();
        overrides.db_name = Some("  ".to_string());
        let env = env_from(&[(ENV_DB_NAME, ""), (ENV_API_KEY, "")]);

        let resolved = Config::resolve_with(&overrides, env).unwrap();
        assert_eq!(resolved.config.database.name, DEFAULT_DB_NAME);
        assert_eq!(resolved.config.api.api_key, None);
    }

    #[test]
    fn test_file_layer_below_env() {
        let file = write_config(
            r#"
[database]
name = "FromFile"
embedding_collection = "Vectors"

[processing]
batch_size = 32
"#,
        );
        let overrides = ConfigOverrides {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let env = env_from(&[(ENV_DB_NAME, "FromEnv")]);

        let resolved = Config::resolve_with(&overrides, env).unwrap();
        assert_eq!(resolved.config.database.name, "FromEnv");
        assert_eq!(resolved.config.database.embedding_collection, "Vectors");
        assert_eq!(resolved.config.processing.batch_size, 32);
        assert_eq!(resolved.sources.embedding_collection, ConfigSource::File);
        assert_eq!(resolved.file_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_invalid_batch_size_fails() {
        for raw in ["0", "-3", "abc", "1.5"] {
            let (_file, mut overrides) = no_file();
            overrides.batch_size = Some(raw.to_string());
            let err = Config::resolve_with(&overrides, env_from(&[])).unwrap_err();
            match err {
                ConfigError::Invalid { field, message } => {
                    assert_eq!(field, "batch_size");
                    assert!(message.contains("--batch-size"), "{message}");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_env_batch_size_names_variable() {
        let (_file, overrides) = no_file();
        let err = Config::resolve_with(&overrides, env_from(&[(ENV_BATCH_SIZE, "many")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_BATCH_SIZE));
    }

    #[test]
    fn test_invalid_urls_fail() {
        let (_file, mut overrides) = no_file();
        overrides.api_base = Some("localhost:5000".to_string());
        assert!(Config::resolve_with(&overrides, env_from(&[])).is_err());

        let (_file, mut overrides) = no_file();
        overrides.mongo_uri = Some("postgres://localhost".to_string());
        assert!(Config::resolve_with(&overrides, env_from(&[])).is_err());
    }

    #[test]
    fn test_invalid_names_fail() {
        let (_file, mut overrides) = no_file();
        overrides.db_name = Some("Gen.AI".to_string());
        assert!(Config::resolve_with(&overrides, env_from(&[])).is_err());

        let (_file, mut overrides) = no_file();
        overrides.result_collection = Some("system.users".to_string());
        assert!(Config::resolve_with(&overrides, env_from(&[])).is_err());
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let overrides = ConfigOverrides {
            config_path: Some(PathBuf::from("/nonexistent/embed-store.toml")),
            ..Default::default()
        };
        let err = Config::resolve_with(&overrides, env_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_malformed_config_file() {
        let file = write_config("[processing]\nbatch = 3\n");
        let overrides = ConfigOverrides {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let err = Config::resolve_with(&overrides, env_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError(_)));
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = Config::default();
        config.api.api_key = Some("sk-secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
