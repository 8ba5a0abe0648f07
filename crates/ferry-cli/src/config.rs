use std::path::{Path, PathBuf};

use anyhow::Context;
use ferry_core::ReplicatorConfig;
use serde::{Deserialize, Serialize};

use crate::cli::ReplicateArgs;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "ferry.toml";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FerryConfig {
    pub source: SourceSection,
    pub destination: DestinationSection,
    pub replication: ReplicatorConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// Store name used in logs and object locations.
    pub name: String,
    pub root: Option<PathBuf>,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            name: "source".to_string(),
            root: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationSection {
    pub name: String,
    pub root: Option<PathBuf>,
    pub bucket: Option<String>,
}

impl Default for DestinationSection {
    fn default() -> Self {
        Self {
            name: "destination".to_string(),
            root: None,
            bucket: None,
        }
    }
}

impl FerryConfig {
    /// Load from an explicit path, or from `ferry.toml` if present, or fall
    /// back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Command-line flags win over file values.
    pub fn apply_overrides(&mut self, args: &ReplicateArgs) {
        if let Some(root) = &args.source_root {
            self.source.root = Some(root.clone());
        }
        if let Some(root) = &args.dest_root {
            self.destination.root = Some(root.clone());
        }
        if let Some(bucket) = &args.dest_bucket {
            self.destination.bucket = Some(bucket.clone());
        }
    }

    /// Every problem found, empty when the config is usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        check_root("source.root", self.source.root.as_deref(), &mut problems);
        check_root("destination.root", self.destination.root.as_deref(), &mut problems);
        match self.destination.bucket.as_deref() {
            None => problems.push("destination.bucket is not set".to_string()),
            Some(b) if b.is_empty() || b.contains('/') => {
                problems.push(format!("destination.bucket {b:?} is not a valid bucket name"))
            }
            Some(_) => {}
        }
        if let Err(e) = self.replication.validate() {
            problems.push(format!("replication: {e}"));
        }
        problems
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("invalid configuration: {}", problems.join("; "))
        }
    }
}

fn check_root(field: &str, root: Option<&Path>, problems: &mut Vec<String>) {
    match root {
        None => problems.push(format!("{field} is not set")),
        Some(p) if !p.is_dir() => {
            problems.push(format!("{field} {} is not a directory", p.display()))
        }
        Some(_) => {}
    }
}
