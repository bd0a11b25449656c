//! Configuration loaded from `~/.securesphere/config.toml`
//!
//! Values may reference environment variables as `${VAR}`. After parsing,
//! `DATABASE_URL` and the `SECURESPHERE_*` variables override the file.

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SphereError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereConfig {
    pub bind: SocketAddr,
    pub database_url: String,
    pub max_connections: u32,
    pub questionnaire_path: PathBuf,
    /// Base of the registration links handed out with invitations
    pub public_base_url: String,
    pub session_ttl_hours: i64,
    pub invitation_ttl_days: i64,
    pub cors_permissive: bool,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Superuser created on `serve` when no user with this name exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for SphereConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            database_url: "postgres://localhost/securesphere".to_string(),
            max_connections: 5,
            questionnaire_path: PathBuf::from("data/questionnaire.csv"),
            public_base_url: "http://127.0.0.1:5000".to_string(),
            session_ttl_hours: 12,
            invitation_ttl_days: 7,
            cors_permissive: false,
            bootstrap_admin: None,
        }
    }
}

impl SphereConfig {
    /// Default config file path: ~/.securesphere/config.toml
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".securesphere/config.toml")
    }

    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    tracing::debug!(path = %default_path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SphereError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content, |key| env::var(key).ok())
    }

    /// Parse TOML, expanding `${VAR}` references with `lookup`.
    pub fn from_toml_str<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_vars(content, &lookup);
        toml::from_str(&expanded)
            .map_err(|e| SphereError::config(format!("invalid TOML: {}", e)))
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SECURESPHERE_DATABASE_URL").or_else(|| lookup("DATABASE_URL")) {
            self.database_url = url;
        }
        if let Some(bind) = lookup("SECURESPHERE_BIND") {
            self.bind = bind
                .parse()
                .map_err(|_| SphereError::config(format!("invalid SECURESPHERE_BIND '{}'", bind)))?;
        }
        if let Some(path) = lookup("SECURESPHERE_QUESTIONNAIRE") {
            self.questionnaire_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("SECURESPHERE_PUBLIC_BASE_URL") {
            self.public_base_url = url;
        }
        if let Some(flag) = lookup("SECURESPHERE_CORS_PERMISSIVE") {
            self.cors_permissive = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Registration link for an invitation token
    pub fn invitation_link(&self, token: &str) -> String {
        format!("{}/register/{}", self.public_base_url.trim_end_matches('/'), token)
    }
}

/// Replace `${VAR}` with the looked-up value. Unknown variables are kept.
fn expand_vars<F>(input: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
