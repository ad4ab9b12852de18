//! Default definitions consumed by the control loop.
//!
//! # Responsibilities
//! - Load the default definitions once per leadership episode
//! - Hand them to the control loop as an immutable value
//!
//! # Design Decisions
//! - The defaults directory is explicit configuration threaded through
//!   constructors, never process-wide state
//! - A configured directory that cannot be read is an error; no directory
//!   configured means "no defaults"

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DefaultsError {
    #[error("defaults directory {0} does not exist")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("default definition {0:?} is defined more than once")]
    Duplicate(String),

    #[error("defaults task failed: {0}")]
    Task(String),
}

/// Named default definitions, keyed by file stem.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults {
    definitions: BTreeMap<String, Value>,
}

impl Defaults {
    pub fn new(definitions: BTreeMap<String, Value>) -> Self {
        Self { definitions }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.definitions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Names that were added, removed, or changed going from `self` to `other`.
    pub fn diff(&self, other: &Defaults) -> Vec<String> {
        let mut changed: Vec<String> = self
            .definitions
            .iter()
            .filter(|(name, value)| other.definitions.get(*name) != Some(*value))
            .map(|(name, _)| name.clone())
            .collect();
        changed.extend(
            other
                .definitions
                .keys()
                .filter(|name| !self.definitions.contains_key(*name))
                .cloned(),
        );
        changed.sort();
        changed
    }
}

/// Produces the defaults for a leadership episode.
pub trait DefaultsPopulator: Send + Sync {
    fn populate(&self) -> Result<Defaults, DefaultsError>;
}

/// Run [`DefaultsPopulator::populate`] on the blocking pool.
///
/// Populators read files synchronously and must not stall runtime workers.
pub async fn populate_blocking(source: Arc<dyn DefaultsPopulator>) -> Result<Defaults, DefaultsError> {
    tokio::task::spawn_blocking(move || source.populate())
        .await
        .map_err(|e| DefaultsError::Task(e.to_string()))?
}

/// Reads `*.json` and `*.toml` definitions from a directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryDefaults {
    dir: Option<PathBuf>,
}

impl DirectoryDefaults {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl DefaultsPopulator for DirectoryDefaults {
    fn populate(&self) -> Result<Defaults, DefaultsError> {
        let Some(dir) = &self.dir else {
            return Ok(Defaults::default());
        };
        if !dir.is_dir() {
            return Err(DefaultsError::Missing(dir.clone()));
        }

        let read_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| DefaultsError::Read { path, source }
        };

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(read_err(dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut definitions = BTreeMap::new();
        for path in paths {
            let Some(value) = load_definition(&path)? else {
                continue;
            };
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if definitions.insert(name.clone(), value).is_some() {
                return Err(DefaultsError::Duplicate(name));
            }
        }

        tracing::debug!(dir = %dir.display(), count = definitions.len(), "Loaded default definitions");
        Ok(Defaults::new(definitions))
    }
}

/// Parse one definition file; `None` for files with other extensions.
fn load_definition(path: &Path) -> Result<Option<Value>, DefaultsError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    if ext != "json" && ext != "toml" {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|source| DefaultsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |message: String| DefaultsError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let value = if ext == "json" {
        serde_json::from_str(&content).map_err(|e| parse_err(e.to_string()))?
    } else {
        toml::from_str(&content).map_err(|e| parse_err(e.to_string()))?
    };
    Ok(Some(value))
}
