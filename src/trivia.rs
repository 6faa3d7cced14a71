// ticketbot/src/trivia.rs

use rand::seq::SliceRandom;
use std::{collections::HashMap, fs, io, path::{Path, PathBuf}};
use tracing::debug;

/// Word lists for `gimme` / `what`, one `<kind>.txt` per list, loaded on first use.
#[derive(Clone, Debug, Default)]
pub struct Trivia {
    dir: PathBuf,
    cache: HashMap<String, Vec<String>>,
}

impl Trivia {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into(), cache: HashMap::new() } }

    pub fn dir(&self) -> &Path { &self.dir }

    /// `<kind>.txt` reduced to its last path component, so a kind can never
    /// reach outside the trivia directory.
    pub fn file_name(kind: &str) -> Option<String> {
        let kind = kind.trim();
        if kind.is_empty() { return None; }
        let candidate = format!("{kind}.txt");
        let name = Path::new(&candidate).file_name()?.to_str()?.to_string();
        (name != ".txt").then_some(name)
    }

    /// The whole list, or `None` when there is no file for `kind`.
    pub fn entries(&mut self, kind: &str) -> io::Result<Option<&[String]>> {
        let Some(name) = Self::file_name(kind) else { return Ok(None) };
        if !self.cache.contains_key(&name) {
            let text = match fs::read_to_string(self.dir.join(&name)) {
                Ok(text) => text,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e),
            };
            let lines: Vec<String> = text.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();
            debug!(file = %name, entries = lines.len(), "trivia list loaded");
            self.cache.insert(name.clone(), lines);
        }
        Ok(self.cache.get(&name).map(Vec::as_slice))
    }

    pub fn pick(&mut self, kind: &str) -> io::Result<Option<String>> {
        Ok(self.entries(kind)?.and_then(|list| list.choose(&mut rand::thread_rng()).cloned()))
    }
}
