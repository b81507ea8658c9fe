//! `.databrickscfg` profile file.
//!
//! INI format: `[NAME]` section headers followed by `key = value` lines.
//! Lines starting with `#` or `;` are comments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConnectorError;

pub const DEFAULT_PROFILE: &str = "DEFAULT";

/// One `[section]` of the profile file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    values: HashMap<String, String>,
}

impl Profile {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn host(&self) -> Option<&str> {
        self.get("host")
    }

    pub fn token(&self) -> Option<&str> {
        self.get("token")
    }

    pub fn client_id(&self) -> Option<&str> {
        self.get("client_id")
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.get("client_secret")
    }

    pub fn username(&self) -> Option<&str> {
        self.get("username")
    }

    pub fn password(&self) -> Option<&str> {
        self.get("password")
    }
}

/// A parsed profile file.
#[derive(Debug, Clone, Default)]
pub struct ProfileFile {
    pub path: PathBuf,
    profiles: HashMap<String, Profile>,
}

impl ProfileFile {
    /// Default location: `$HOME/.databrickscfg`.
    pub fn default_path(home: Option<&str>) -> Option<PathBuf> {
        home.map(|h| Path::new(h).join(".databrickscfg"))
    }

    pub fn load(path: &Path) -> Result<Self, ConnectorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConnectorError::Configuration(format!(
                "cannot read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self, ConnectorError> {
        let mut profiles: HashMap<String, Profile> = HashMap::new();
        let mut current: Option<String> = None;

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = section.trim().to_string();
                profiles.entry(name.clone()).or_insert_with(|| Profile {
                    name: name.clone(),
                    values: HashMap::new(),
                });
                current = Some(name);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConnectorError::Configuration(format!(
                    "{}:{}: expected `key = value`",
                    path.display(),
                    lineno + 1
                )));
            };

            let Some(section) = current.as_ref() else {
                return Err(ConnectorError::Configuration(format!(
                    "{}:{}: key outside of a [profile] section",
                    path.display(),
                    lineno + 1
                )));
            };

            if let Some(profile) = profiles.get_mut(section) {
                profile
                    .values
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            profiles,
        })
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Look up a profile that the caller explicitly asked for.
    pub fn require(&self, name: &str) -> Result<&Profile, ConnectorError> {
        self.profile(name).ok_or_else(|| {
            ConnectorError::Configuration(format!(
                "profile '{}' not found in {}",
                name,
                self.path.display()
            ))
        })
    }
}
