//! providers::config
//!
//! Configuration provider.
//!
//! Issues one `git config <scope> --list` exchange and assembles a
//! [`ConfigMap`] from the `key=value` records. With the default `Local`
//! scope the exchange is gated on the `GitDir` fact; the other scopes run
//! immediately.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gitfacts::providers::config::{Config, ConfigOptions, ConfigScope};
//! use gitfacts::git::MockRunner;
//!
//! # async fn example() -> Result<(), gitfacts::GitError> {
//! let runner = Arc::new(MockRunner::new().stdout("config", "core.bare=false\n"));
//!
//! let config = Config::spawn(
//!     ConfigOptions {
//!         scope: ConfigScope::Local,
//!         gitdir: Some("/repo/.git".into()),
//!     },
//!     runner,
//! );
//!
//! let map = config.wait().await?;
//! assert_eq!(map.get_bool("core.bare"), Some(false));
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::bus::{FactBus, FactName, FactValue};
use crate::core::entities::ConfigMap;
use crate::git::{CommandRunner, Git, GitError, GitOptions};

/// Where a configuration listing is read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigScope {
    /// The repository's own configuration (`--local`). Gated on `GitDir`.
    #[default]
    Local,
    /// The user-wide configuration (`--global`).
    Global,
    /// The machine-wide configuration (`--system`).
    System,
    /// A specific configuration file (`--file=<path>`).
    File(PathBuf),
    /// All scopes merged, git's own resolution order.
    Merged,
}

/// Canonical options record for the config provider.
///
/// Accepts a plain path (a config file) or an explicit record; the
/// conversion happens once at this boundary.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    /// Which listing to read.
    pub scope: ConfigScope,
    /// Explicit metadata root. When absent and the scope is `Local`, the
    /// provider waits for `GitDir` on its bus.
    pub gitdir: Option<PathBuf>,
}

impl From<&str> for ConfigOptions {
    fn from(file: &str) -> Self {
        Self {
            scope: ConfigScope::File(PathBuf::from(file)),
            gitdir: None,
        }
    }
}

impl From<PathBuf> for ConfigOptions {
    fn from(file: PathBuf) -> Self {
        Self {
            scope: ConfigScope::File(file),
            gitdir: None,
        }
    }
}

impl From<ConfigScope> for ConfigOptions {
    fn from(scope: ConfigScope) -> Self {
        Self {
            scope,
            gitdir: None,
        }
    }
}

/// Configuration fact provider.
///
/// Publishes one `Entry` fact per parsed record and a terminal `Config`
/// fact carrying the assembled [`ConfigMap`]; failures publish `Error`.
pub struct Config {
    bus: FactBus,
}

impl Config {
    /// Start the provider. The exchange begins as soon as its
    /// prerequisites are available; an explicit `gitdir` in the options is
    /// published onto the provider's own bus immediately.
    pub fn spawn(options: impl Into<ConfigOptions>, runner: Arc<dyn CommandRunner>) -> Self {
        let options = options.into();
        let bus = FactBus::new();

        if let Some(gitdir) = &options.gitdir {
            bus.publish(FactName::GitDir, FactValue::Dir(gitdir.clone()));
        }

        let task_bus = bus.clone();
        tokio::spawn(async move {
            match load(&task_bus, &options, runner).await {
                Ok(map) => task_bus.publish(FactName::Config, FactValue::Config(map)),
                Err(err) => {
                    debug!(error = %err, "config exchange failed");
                    task_bus.publish(FactName::Error, FactValue::Error(err));
                }
            }
        });

        Self { bus }
    }

    /// The provider's fact bus.
    pub fn bus(&self) -> &FactBus {
        &self.bus
    }

    /// Subscribe to the incremental `Entry` facts.
    pub fn entries(&self) -> crate::bus::FactStream {
        self.bus.subscribe(FactName::Entry)
    }

    /// Wait for the terminal fact: the assembled map, or the first error.
    pub async fn wait(&self) -> Result<ConfigMap, GitError> {
        match self.bus.first_or_error(FactName::Config).await? {
            FactValue::Config(map) => Ok(map),
            _ => Err(GitError::Interrupted),
        }
    }
}

/// Perform the listing exchange and assemble the map.
async fn load(
    bus: &FactBus,
    options: &ConfigOptions,
    runner: Arc<dyn CommandRunner>,
) -> Result<ConfigMap, GitError> {
    let (git, selector) = match &options.scope {
        ConfigScope::Local => {
            let gitdir = match bus.first(FactName::GitDir).await {
                Some(FactValue::Dir(dir)) => dir,
                _ => return Err(GitError::Interrupted),
            };
            (
                Git::new(runner).with_gitdir(gitdir),
                GitOptions::new().flag("local", true),
            )
        }
        ConfigScope::Global => (
            Git::new(runner),
            GitOptions::new().flag("global", true),
        ),
        ConfigScope::System => (
            Git::new(runner),
            GitOptions::new().flag("system", true),
        ),
        ConfigScope::File(path) => (
            Git::new(runner),
            GitOptions::new().value("file", path.display().to_string()),
        ),
        ConfigScope::Merged => (Git::new(runner), GitOptions::new()),
    };

    let listing = git.config_list(selector).await?;

    let mut map = ConfigMap::new();
    for line in listing.lines() {
        if line.is_empty() {
            continue;
        }
        // Valueless keys list without `=`; record them with an empty value.
        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        bus.publish(
            FactName::Entry,
            FactValue::ConfigEntry {
                key: key.to_string(),
                value: value.to_string(),
            },
        );
        map.insert(key, value);
    }

    debug!(entries = map.len(), "config listing assembled");
    Ok(map)
}
