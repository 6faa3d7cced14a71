// ticketbot/src/config.rs

use anyhow::{Context, Result};
use directories::ProjectDirs;
use notify::{recommended_watcher, Event, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, sync::Arc};
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const DEFAULT_PREFIX: &str = "candra";
pub const DEFAULT_STORE: &str = "tickets.json";
/// Room name used for direct messages.
pub const DIRECT_ROOM: &str = "self";

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub bot: BotConfig,
    pub store: StoreConfig,
    pub trivia: TriviaConfig,
    pub log: LogConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    pub prefix: Option<String>,
    pub whitelisted: Vec<String>,   // room names, "self" for direct messages
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct TriviaConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: Option<String>,
}

impl Config {
    pub fn prefix(&self) -> &str {
        self.bot.prefix.as_deref().filter(|p| !p.is_empty()).unwrap_or(DEFAULT_PREFIX)
    }

    pub fn is_whitelisted(&self, room_name: &str) -> bool {
        self.bot.whitelisted.iter().any(|r| r == room_name)
    }

    /// Ticket file, relative paths taken from `root`.
    pub fn store_path(&self, root: &Path) -> PathBuf {
        root.join(self.store.path.as_deref().unwrap_or(Path::new(DEFAULT_STORE)))
    }

    pub fn trivia_dir(&self, root: &Path) -> PathBuf {
        root.join(self.trivia.dir.as_deref().unwrap_or(Path::new(".")))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope { System, User, Workspace, Runtime }

fn merge(a: &mut Config, b: &Config) {
    if b.bot.prefix.is_some() { a.bot.prefix = b.bot.prefix.clone(); }
    if !b.bot.whitelisted.is_empty() { a.bot.whitelisted = b.bot.whitelisted.clone(); }
    if b.store.path.is_some() { a.store.path = b.store.path.clone(); }
    if b.trivia.dir.is_some() { a.trivia.dir = b.trivia.dir.clone(); }
    if b.log.filter.is_some() { a.log.filter = b.log.filter.clone(); }
}

fn config_paths(workspace_root: &Path) -> Result<(PathBuf, PathBuf, PathBuf)> {
    let proj = ProjectDirs::from("org", "ticketbot", "ticketbot").context("ProjectDirs not available")?;
    let user = proj.config_dir().join("config.toml");
    let system = if cfg!(target_os = "windows") {
        PathBuf::from(r"C:\ProgramData\ticketbot\config.toml")
    } else {
        PathBuf::from("/etc/ticketbot/config.toml")
    };
    let workspace = workspace_root.join(".ticketbot").join("config.toml");
    Ok((system, user, workspace))
}

#[derive(Clone, Debug)]
struct Layers {
    system: PathBuf,
    user: PathBuf,
    workspace: PathBuf,
}

impl Layers {
    fn read_file(path: &Path) -> Option<Config> {
        let text = fs::read_to_string(path).ok()?;
        match toml::from_str(&text) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable config layer");
                None
            }
        }
    }

    fn merged(&self, runtime: &Config) -> Config {
        let mut merged = Config::default();
        for path in [&self.system, &self.user, &self.workspace] {
            if let Some(layer) = Self::read_file(path) { merge(&mut merged, &layer); }
        }
        merge(&mut merged, runtime);
        merged
    }
}

/// Merged configuration, re-read whenever one of the layer files changes.
#[derive(Clone)]
pub struct ConfigManager {
    inner: Arc<RwLock<Config>>,
    tx: broadcast::Sender<Config>,
    _watcher: Arc<RwLock<Option<notify::RecommendedWatcher>>>,
    layers: Layers,
    runtime_overlay: Arc<RwLock<Config>>,
}

impl ConfigManager {
    /// System, user and `<root>/.ticketbot/config.toml` layers, watched for changes.
    pub fn load(workspace_root: impl AsRef<Path>) -> Result<Self> {
        let (system, user, workspace) = config_paths(workspace_root.as_ref())?;
        let me = Self::with_paths(system, user, workspace)?;
        me.start_watch()?;
        Ok(me)
    }

    /// Explicit layer files, not watched.
    pub fn with_paths(system: PathBuf, user: PathBuf, workspace: PathBuf) -> Result<Self> {
        let me = Self {
            inner: Arc::new(RwLock::new(Config::default())),
            tx: broadcast::channel(64).0,
            _watcher: Arc::new(RwLock::new(None)),
            layers: Layers { system, user, workspace },
            runtime_overlay: Arc::new(RwLock::new(Config::default())),
        };
        me.reload_all()?;
        Ok(me)
    }

    pub fn reload_all(&self) -> Result<()> {
        let merged = self.layers.merged(&self.runtime_overlay.read());
        *self.inner.write() = merged.clone();
        let _ = self.tx.send(merged);
        Ok(())
    }

    pub fn start_watch(&self) -> Result<()> {
        let layers = self.layers.clone();
        let tx = self.tx.clone();
        let inner = self.inner.clone();
        let runtime_overlay = self.runtime_overlay.clone();

        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            debug!(paths = ?event.paths, "config layer changed");
            let merged = layers.merged(&runtime_overlay.read());
            *inner.write() = merged.clone();
            let _ = tx.send(merged);
        })?;
        for p in [&self.layers.system, &self.layers.user, &self.layers.workspace] {
            match p.parent() {
                Some(dir) if dir.is_dir() => watcher.watch(dir, RecursiveMode::NonRecursive)?,
                _ => debug!(path = %p.display(), "config layer directory missing, not watched"),
            }
        }
        *self._watcher.write() = Some(watcher);
        Ok(())
    }

    pub fn get(&self) -> Config { self.inner.read().clone() }
    pub fn subscribe(&self) -> broadcast::Receiver<Config> { self.tx.subscribe() }

    pub fn apply_runtime_overlay(&self, patch: Config) -> Result<()> {
        merge(&mut self.runtime_overlay.write(), &patch);
        self.reload_all()
    }

    pub fn write_patch(&self, scope: Scope, patch: &Config) -> Result<()> {
        let path = match scope {
            Scope::System    => &self.layers.system,
            Scope::User      => &self.layers.user,
            Scope::Workspace => &self.layers.workspace,
            Scope::Runtime   => anyhow::bail!("Runtime scope is ephemeral; cannot persist"),
        };
        if let Some(dir) = path.parent() { fs::create_dir_all(dir)?; }
        let mut merged = Layers::read_file(path).unwrap_or_default();
        merge(&mut merged, patch);
        let text = toml::to_string_pretty(&merged).context("serialize toml")?;
        fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
