//! Configuration types for formsheet.
//!
//! [`Config::load`] layers the embedded defaults, an optional TOML file
//! (`~/.config/formsheet/config.toml` unless a path is given, created with
//! the defaults on first use) and `FORMSHEET__*` environment variables, then
//! validates the result. [`Config::defaults`] returns the defaults without
//! touching the filesystem (useful in tests).

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[storage]
data_dir          = "form-data"
file_name         = "submissions.csv"
dedup_key         = "email"
protect_directory = true

[fields]
entry_id          = "form-field-ehvmdc"
email             = "form-field-2ba381"
phone             = "form-field-vsjpsv"
newsletter        = "form-field-wfejpt"
email_consent     = "form-field-vkpqeq"
phone_sms_consent = "form-field-gakgwk"
mail_consent      = "form-field-ytzddf"
terms             = "form-field-csfous"

[admin]
preview_limit = 10
"#;

const ENV_PREFIX: &str = "FORMSHEET";

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub fields: FieldMap,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Which column identifies "the same person" when upserting.
///
/// Only one scheme is active at a time. `EntryId` is the older behaviour,
/// kept for tables that were populated by entry id before email
/// deduplication existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    #[default]
    Email,
    EntryId,
}

/// `[storage]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default)]
    pub dedup_key: DedupKey,
    #[serde(default = "default_protect_directory")]
    pub protect_directory: bool,
}

fn default_file_name() -> String { "submissions.csv".to_string() }
fn default_protect_directory() -> bool { true }

/// `[fields]` section: canonical role → raw form identifier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldMap {
    pub entry_id: String,
    pub email: String,
    pub phone: String,
    pub newsletter: String,
    pub email_consent: String,
    pub phone_sms_consent: String,
    pub mail_consent: String,
    pub terms: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl FieldMap {
    /// Every configured `(role, identifier)` pair, in column order.
    pub fn roles(&self) -> Vec<(&'static str, &str)> {
        let mut roles = vec![
            ("entry_id", self.entry_id.as_str()),
            ("email", self.email.as_str()),
            ("phone", self.phone.as_str()),
            ("newsletter", self.newsletter.as_str()),
            ("email_consent", self.email_consent.as_str()),
            ("phone_sms_consent", self.phone_sms_consent.as_str()),
            ("mail_consent", self.mail_consent.as_str()),
            ("terms", self.terms.as_str()),
        ];
        if let Some(token) = &self.token {
            roles.push(("token", token.as_str()));
        }
        roles
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let roles = self.roles();
        let mut seen: HashMap<&str, &'static str> = HashMap::new();
        for (role, identifier) in roles {
            if identifier.trim().is_empty() {
                return Err(ConfigError::EmptyIdentifier { role });
            }
            if let Some(first) = seen.insert(identifier, role) {
                return Err(ConfigError::DuplicateIdentifier {
                    first,
                    second: role,
                    identifier: identifier.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A `[[groups]]` entry: forms whose submissions share one backing file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub forms: Vec<String>,
}

/// `[admin]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Secret that download/clear requests must present. Unset means the
    /// local operator is trusted.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,
}

fn default_preview_limit() -> usize { 10 }

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token: None,
            preview_limit: default_preview_limit(),
        }
    }
}

impl AdminConfig {
    /// The configured token, treating an empty string as unset.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load from `path` (or the default location), layered on top of the
    /// built-in defaults and overridden by `FORMSHEET__SECTION__KEY`
    /// environment variables. Creates the default file if it is missing.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        // An explicit path must exist; the default location is optional.
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => {
                let p = config_path();
                if !p.exists() {
                    write_default_file(&p);
                }
                (p, false)
            }
        };
        tracing::debug!(path = %path.display(), "loading configuration");

        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from(path.as_path()).required(required))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document layered over the defaults. No environment or
    /// filesystem access.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }

    /// Check field identifiers and group definitions for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fields.validate()?;

        let mut names: Vec<&str> = Vec::with_capacity(self.groups.len());
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for group in &self.groups {
            if !is_safe_name(&group.name) {
                return Err(ConfigError::InvalidGroupName(group.name.clone()));
            }
            if names.contains(&group.name.as_str()) {
                return Err(ConfigError::DuplicateGroup(group.name.clone()));
            }
            // Case-insensitive filesystems would map both to one file.
            if format!("{}.csv", group.name).eq_ignore_ascii_case(&self.storage.file_name) {
                return Err(ConfigError::GroupShadowsDefaultFile {
                    group: group.name.clone(),
                    file: self.storage.file_name.clone(),
                });
            }
            names.push(&group.name);
            for form in &group.forms {
                if let Some(first) = owners.insert(form, &group.name) {
                    if first != group.name {
                        return Err(ConfigError::FormInTwoGroups {
                            form: form.clone(),
                            first: first.to_string(),
                            second: group.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// The group a form id belongs to, if any.
    pub fn group_for_form(&self, form_id: Option<&str>) -> Option<&GroupConfig> {
        let form_id = form_id?;
        self.groups
            .iter()
            .find(|g| g.forms.iter().any(|f| f == form_id))
    }

    /// Look up a group by name.
    pub fn group(&self, name: &str) -> Result<&GroupConfig, ConfigError> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| ConfigError::UnknownGroup(name.to_string()))
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("formsheet")
        .join("config.toml")
}

fn write_default_file(path: &Path) {
    let result = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| std::fs::write(path, DEFAULT_CONFIG.trim_start()));
    if let Err(err) = result {
        // Defaults still apply; the file is a convenience for editing.
        tracing::warn!(path = %path.display(), error = %err, "could not write default config");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
