use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// Collaborator permission levels GitHub can report for a repository.
pub const PERMISSION_LEVELS: &[&str] = &["admin", "maintain", "write", "triage", "read", "none"];

// ── Final (merged) config types ──

/// Policy for one evaluation. Built once, then passed by reference everywhere.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub permissions: PermissionsConfig,
    #[serde(default)]
    pub allowlist: AllowlistConfig,
    #[serde(default)]
    pub pull_request: PullRequestConfig,
    #[serde(default)]
    pub contexts: ContextsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Settings {
    /// Append-only verdict log. Disabled when unset.
    #[serde(default)]
    pub decision_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PermissionsConfig {
    /// Acceptable collaborator permission levels (order-insensitive).
    #[serde(default)]
    pub allowed: Vec<String>,
    /// When false, Bot actors are denied before any installation lookup.
    #[serde(default)]
    pub allow_bots: bool,
    /// Installation permission key a Bot must hold, e.g. `issues`.
    #[serde(default)]
    pub bot_permission: String,
    /// Required access for `bot_permission`, e.g. `write`.
    #[serde(default)]
    pub bot_access: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AllowlistConfig {
    /// Raw operator entries: handles (`monalisa`, `@monalisa`) or `org/team`.
    #[serde(default)]
    pub operators: Vec<String>,
    /// Elevated credential for org/team lookups. Empty or `false` disables them.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default)]
pub struct PullRequestConfig {
    #[serde(default)]
    pub allow_forks: bool,
    #[serde(default)]
    pub skip_ci: bool,
    #[serde(default)]
    pub skip_reviews: bool,
    #[serde(default)]
    pub allow_drafts: bool,
    #[serde(default)]
    pub fork_review_bypass: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ContextsConfig {
    /// Subset of `pull_request`, `issue`.
    #[serde(default)]
    pub allowed: Vec<String>,
}

impl AllowlistConfig {
    /// The elevated credential, if one is configured and not disabled.
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("false"))
    }
}

// ── Overlay types (merged over the defaults; every field optional) ──

/// Partial configuration. Scalars override, lists replace.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigOverlay {
    #[serde(default)]
    pub settings: SettingsOverlay,
    #[serde(default)]
    pub permissions: PermissionsOverlay,
    #[serde(default)]
    pub allowlist: AllowlistOverlay,
    #[serde(default)]
    pub pull_request: PullRequestOverlay,
    #[serde(default)]
    pub contexts: ContextsOverlay,
}

#[derive(Debug, Deserialize, Default)]
pub struct SettingsOverlay {
    pub decision_log: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PermissionsOverlay {
    pub allowed: Option<Vec<String>>,
    pub allow_bots: Option<bool>,
    pub bot_permission: Option<String>,
    pub bot_access: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AllowlistOverlay {
    pub operators: Option<Vec<String>>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PullRequestOverlay {
    pub allow_forks: Option<bool>,
    pub skip_ci: Option<bool>,
    pub skip_reviews: Option<bool>,
    pub allow_drafts: Option<bool>,
    pub fork_review_bypass: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ContextsOverlay {
    pub allowed: Option<Vec<String>>,
}

/// Split a comma-separated input into trimmed, non-empty items.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_list(items: &mut Vec<String>) {
    for item in items.iter_mut() {
        *item = item.trim().to_ascii_lowercase();
    }
    let mut seen = HashSet::new();
    items.retain(|item| !item.is_empty() && seen.insert(item.clone()));
}

impl PolicyConfig {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Build a validated config:
    /// 1. Start with embedded defaults
    /// 2. Merge the overlay file at `path` (if given)
    /// 3. Merge `inputs` (action inputs / CLI flags)
    pub fn load(path: Option<&Path>, inputs: ConfigOverlay) -> Result<Self> {
        let mut config = Self::default_config();
        if let Some(path) = path {
            config.apply_overlay(Self::read_overlay(path)?);
        }
        config.apply_overlay(inputs);
        config.validate()?;
        Ok(config)
    }

    fn read_overlay(path: &Path) -> Result<ConfigOverlay> {
        let content = std::fs::read_to_string(path).map_err(|source| GateError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply an overlay on top of this config.
    pub fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(v) = overlay.settings.decision_log {
            self.settings.decision_log = Some(v);
        }

        let p = overlay.permissions;
        if let Some(v) = p.allowed {
            self.permissions.allowed = v;
        }
        if let Some(v) = p.allow_bots {
            self.permissions.allow_bots = v;
        }
        if let Some(v) = p.bot_permission {
            self.permissions.bot_permission = v;
        }
        if let Some(v) = p.bot_access {
            self.permissions.bot_access = v;
        }

        let a = overlay.allowlist;
        if let Some(v) = a.operators {
            self.allowlist.operators = v;
        }
        if let Some(v) = a.token {
            self.allowlist.token = Some(v);
        }

        let pr = overlay.pull_request;
        let flags = &mut self.pull_request;
        for (slot, value) in [
            (&mut flags.allow_forks, pr.allow_forks),
            (&mut flags.skip_ci, pr.skip_ci),
            (&mut flags.skip_reviews, pr.skip_reviews),
            (&mut flags.allow_drafts, pr.allow_drafts),
            (&mut flags.fork_review_bypass, pr.fork_review_bypass),
        ] {
            if let Some(v) = value {
                *slot = v;
            }
        }

        if let Some(v) = overlay.contexts.allowed {
            self.contexts.allowed = v;
        }
    }

    /// Normalize list values and reject configurations that cannot gate anything.
    pub fn validate(&mut self) -> Result<()> {
        normalize_list(&mut self.permissions.allowed);
        normalize_list(&mut self.contexts.allowed);
        self.permissions.bot_permission = self.permissions.bot_permission.trim().to_string();
        self.permissions.bot_access = self.permissions.bot_access.trim().to_string();

        if self.permissions.allowed.is_empty() {
            return Err(GateError::Config(
                "permissions.allowed must name at least one permission level".into(),
            ));
        }
        if let Some(unknown) = self
            .permissions
            .allowed
            .iter()
            .find(|level| !PERMISSION_LEVELS.contains(&level.as_str()))
        {
            return Err(GateError::Config(format!(
                "unknown permission level '{unknown}' (expected one of: {})",
                PERMISSION_LEVELS.join(", ")
            )));
        }
        if self.permissions.bot_permission.is_empty() || self.permissions.bot_access.is_empty() {
            return Err(GateError::Config(
                "permissions.bot_permission and permissions.bot_access must be set".into(),
            ));
        }
        Ok(())
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
