// ticketbot/src/ticket.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, fs, io::Write, path::{Path, PathBuf}};
use thiserror::Error;
use tracing::{info, warn};

use crate::format::show_ticket;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Invalid id")]
    InvalidId,
    #[error("Not found: #{0}")]
    NotFound(String),
    #[error("Empty ticket content")]
    EmptyContent,
    #[error("no ticket ids left")]
    IdsExhausted,
    #[error("{0}")]
    InvalidData(String),
    #[error("invalid content of file: {}", .0.display())]
    CorruptFile(PathBuf),
    #[error("only accept Object and Array")]
    InvalidInput,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TicketError {
    /// Errors a user can cause by typing a bad command. The dispatcher answers
    /// these with their message instead of failing.
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::InvalidId | Self::NotFound(_) | Self::EmptyContent | Self::InvalidInput)
    }
}

pub type Result<T> = std::result::Result<T, TicketError>;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus { #[default] Open, Closed }

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Open => "open", Self::Closed => "closed" }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub status: TicketStatus,
    pub content: Option<String>,
    pub requester: Option<String>,
    pub assignee: Option<String>,
    pub room_name: Option<String>,   // "self" for direct messages
    pub created: Option<DateTime<Utc>>,
    pub closed: Option<DateTime<Utc>>,
    pub comments: Vec<String>,
}

impl Ticket {
    pub fn new(id: impl Into<String>) -> Self { Self { id: id.into(), ..Default::default() } }

    /// Appends a comment and returns the ticket as it now renders.
    pub fn add_comment(&mut self, comment: impl Into<String>) -> String {
        self.comments.push(comment.into());
        show_ticket(self)
    }
}

/// Result of [`TicketCollection::forget_all`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForgetAll {
    NothingToRemove,
    Removed(u64),
}

impl fmt::Display for ForgetAll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingToRemove => f.write_str("nothing to remove!"),
            Self::Removed(n) => write!(f, "{n}"),
        }
    }
}

/// Every ticket keyed by its id, plus the id allocator.
///
/// On disk this is a single JSON object: `"lastId"` next to one key per ticket.
/// Ids are never reused; only [`forget_all`](Self::forget_all) rewinds `last_id`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TicketCollection {
    #[serde(rename = "lastId")]
    pub last_id: u64,
    #[serde(flatten)]
    pub tickets: BTreeMap<String, Ticket>,
}

impl TicketCollection {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.tickets.len() }
    pub fn is_empty(&self) -> bool { self.tickets.is_empty() }

    /// Tickets in ascending numeric id order. Keys outside `1..=last_id` are skipped.
    pub fn iter(&self) -> impl Iterator<Item = &Ticket> + '_ {
        let mut numbered: Vec<(u64, &Ticket)> = self.tickets.iter()
            .filter_map(|(key, t)| key.parse::<u64>().ok().map(|n| (n, t)))
            .filter(|(n, _)| (1..=self.last_id).contains(n))
            .collect();
        numbered.sort_unstable_by_key(|(n, _)| *n);
        numbered.into_iter().map(|(_, t)| t)
    }

    pub fn open(&mut self, requester: &str, room_name: &str, content: &str) -> Result<&Ticket> {
        if content.is_empty() { return Err(TicketError::EmptyContent); }
        let next = self.last_id.checked_add(1).ok_or(TicketError::IdsExhausted)?;
        self.last_id = next;
        let id = next.to_string();
        let ticket = Ticket {
            id: id.clone(),
            status: TicketStatus::Open,
            content: Some(content.to_string()),
            requester: Some(requester.to_string()),
            room_name: Some(room_name.to_string()),
            created: Some(Utc::now()),
            ..Default::default()
        };
        Ok(&*self.tickets.entry(id).or_insert(ticket))
    }

    pub fn find(&self, id: &str) -> Result<&Ticket> {
        if id.is_empty() { return Err(TicketError::InvalidId); }
        self.tickets.get(id).ok_or_else(|| TicketError::NotFound(id.to_string()))
    }

    pub fn find_mut(&mut self, id: &str) -> Result<&mut Ticket> {
        if id.is_empty() { return Err(TicketError::InvalidId); }
        self.tickets.get_mut(id).ok_or_else(|| TicketError::NotFound(id.to_string()))
    }

    pub fn close(&mut self, id: &str) -> Result<&Ticket> {
        let it = self.find_mut(id)?;
        it.status = TicketStatus::Closed;
        it.closed = Some(Utc::now());
        Ok(&*it)
    }

    pub fn assign(&mut self, id: &str, assignee: &str) -> Result<&Ticket> {
        let it = self.find_mut(id)?;
        it.assignee = Some(assignee.to_string());
        Ok(&*it)
    }

    pub fn add_comment(&mut self, id: &str, comment: &str) -> Result<String> {
        Ok(self.find_mut(id)?.add_comment(comment))
    }

    /// Removes one ticket; `last_id` is left alone so the id is never handed out again.
    pub fn forget_one(&mut self, id: &str) -> Result<String> {
        self.find(id)?;
        self.tickets.remove(id);
        Ok(id.to_string())
    }

    pub fn forget_all(&mut self) -> ForgetAll {
        if self.last_id == 0 { return ForgetAll::NothingToRemove; }
        let removed = self.last_id;
        self.tickets.clear();
        self.last_id = 0;
        ForgetAll::Removed(removed)
    }

    /// Every key must be the id of its ticket and lie within `1..=last_id`.
    pub fn is_valid(&self) -> bool {
        self.tickets.iter().all(|(key, t)| {
            key == &t.id && key.parse::<u64>().is_ok_and(|n| (1..=self.last_id).contains(&n))
        })
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        if !self.is_valid() {
            let dump = serde_json::to_string(self)?;
            warn!(path = %path.display(), "refusing to persist invalid ticket data");
            return Err(TicketError::InvalidData(format!("refusing to write invalid data: {dump}")));
        }
        let dir = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => { fs::create_dir_all(dir)?; dir }
            None => Path::new("."),
        };
        // Readers see either the old store or the new one.
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        info!(path = %path.display(), tickets = self.len(), last_id = self.last_id, "tickets stored");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() { return Ok(Self::default()); }
        let data = fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&data)
            .map_err(|_| TicketError::CorruptFile(path.to_path_buf()))?;
        let invalid = || TicketError::InvalidData(format!("does not contain valid data: {}", path.display()));
        if !is_valid_json(&value) { return Err(invalid()); }
        let tickets: Self = serde_json::from_value(value).map_err(|_| invalid())?;
        if !tickets.is_valid() { return Err(invalid()); }
        info!(path = %path.display(), tickets = tickets.len(), "tickets loaded");
        Ok(tickets)
    }
}

/// Shape check on raw data: an object whose `lastId` is a non-negative integer.
pub fn is_valid_json(value: &serde_json::Value) -> bool {
    value.as_object()
        .and_then(|o| o.get("lastId"))
        .is_some_and(|n| n.as_u64().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn three() -> TicketCollection {
        let mut c = TicketCollection::new();
        for what in ["markers", "coffee", "chairs"] {
            c.open("Ricky", "MyRoom", what).unwrap();
        }
        c
    }

    #[test]
    fn open_assigns_sequential_ids() {
        let c = three();
        assert_eq!(c.last_id, 3);
        let ids: Vec<&str> = c.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        let t = c.find("2").unwrap();
        assert_eq!(t.status, TicketStatus::Open);
        assert_eq!(t.content.as_deref(), Some("coffee"));
        assert_eq!(t.requester.as_deref(), Some("Ricky"));
        assert_eq!(t.room_name.as_deref(), Some("MyRoom"));
        assert!(t.created.is_some());
        assert!(t.closed.is_none());
        assert!(t.comments.is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_forget() {
        let mut c = three();
        assert_eq!(c.forget_one("2").unwrap(), "2");
        let id = c.open("Fred", "self", "more coffee").unwrap().id.clone();
        assert_eq!(id, "4");
        assert!(matches!(c.find("2"), Err(TicketError::NotFound(_))));
    }

    #[test]
    fn open_rejects_empty_content() {
        let mut c = TicketCollection::new();
        assert!(matches!(c.open("Ricky", "self", ""), Err(TicketError::EmptyContent)));
        assert_eq!(c.last_id, 0);
    }

    #[test]
    fn find_distinguishes_invalid_and_missing() {
        let c = three();
        assert!(matches!(c.find(""), Err(TicketError::InvalidId)));
        let err = c.find("42").unwrap_err();
        assert_eq!(err.to_string(), "Not found: #42");
        assert!(err.is_domain());
    }

    #[test]
    fn close_sets_status_and_timestamp() {
        let mut c = three();
        let t = c.close("1").unwrap();
        assert_eq!(t.status, TicketStatus::Closed);
        assert!(t.closed.is_some());
        assert!(matches!(c.close("9"), Err(TicketError::NotFound(_))));
        assert!(matches!(c.close(""), Err(TicketError::InvalidId)));
    }

    #[test]
    fn assign_replaces_assignee() {
        let mut c = three();
        c.assign("1", "Fred").unwrap();
        assert_eq!(c.assign("1", "Dmitry").unwrap().assignee.as_deref(), Some("Dmitry"));
    }

    #[test]
    fn comments_append_in_order() {
        let mut c = three();
        c.add_comment("1", "first").unwrap();
        let shown = c.add_comment("1", "second").unwrap();
        assert_eq!(c.find("1").unwrap().comments, ["first", "second"]);
        assert!(shown.ends_with(" -- first; second"));
    }

    #[test]
    fn forget_one_twice_is_not_found() {
        let mut c = three();
        c.forget_one("1").unwrap();
        assert_eq!(c.forget_one("1").unwrap_err().to_string(), "Not found: #1");
        assert_eq!(c.last_id, 3);
    }

    #[test]
    fn forget_all_is_idempotent() {
        let mut c = three();
        assert_eq!(c.forget_all(), ForgetAll::Removed(3));
        assert!(c.is_empty());
        assert_eq!(c.forget_all(), ForgetAll::NothingToRemove);
        assert_eq!(c.last_id, 0);
        assert_eq!(ForgetAll::NothingToRemove.to_string(), "nothing to remove!");
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tickets.json");
        let mut c = three();
        c.close("2").unwrap();
        c.assign("1", "Fred").unwrap();
        c.add_comment("1", "on it").unwrap();
        c.forget_one("3").unwrap();
        c.store(&path).unwrap();
        let loaded = TicketCollection::load(&path).unwrap();
        assert_eq!(loaded, c);
        assert_eq!(loaded.find("3").unwrap_err().to_string(), "Not found: #3");
    }

    #[test]
    fn file_layout_uses_last_id_and_string_keys() {
        let mut c = TicketCollection::new();
        c.open("Ricky", "self", "get markers").unwrap();
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["lastId"], json!(1));
        assert_eq!(v["1"]["id"], json!("1"));
        assert_eq!(v["1"]["roomName"], json!("self"));
        assert_eq!(v["1"]["status"], json!("open"));
        assert_eq!(v["1"]["assignee"], json!(null));
        assert_eq!(v["1"]["comments"], json!([]));
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let c = TicketCollection::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(c, TicketCollection::new());
    }

    #[test]
    fn load_rejects_corrupt_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");

        fs::write(&path, "{ not json").unwrap();
        let err = TicketCollection::load(&path).unwrap_err();
        assert!(matches!(err, TicketError::CorruptFile(_)));
        assert!(err.to_string().starts_with("invalid content of file: "));

        for bad in [json!({}), json!({"lastId": -1}), json!({"lastId": "3"}), json!({"lastId": 1.5}), json!([1])] {
            fs::write(&path, bad.to_string()).unwrap();
            let err = TicketCollection::load(&path).unwrap_err();
            assert!(matches!(err, TicketError::InvalidData(_)), "{bad}");
            assert!(!err.is_domain());
        }

        fs::write(&path, json!({"lastId": 1, "2": {"id": "2"}}).to_string()).unwrap();
        assert!(matches!(TicketCollection::load(&path), Err(TicketError::InvalidData(_))));
    }

    #[test]
    fn load_fills_missing_ticket_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        fs::write(&path, json!({"lastId": 1, "1": {"id": "1", "content": "legacy"}}).to_string()).unwrap();
        let c = TicketCollection::load(&path).unwrap();
        let t = c.find("1").unwrap();
        assert_eq!(t.status, TicketStatus::Open);
        assert!(t.comments.is_empty());
        assert!(t.assignee.is_none());
    }

    #[test]
    fn store_refuses_invalid_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        let mut c = TicketCollection::new();
        c.tickets.insert("7".into(), Ticket::new("7"));
        let err = c.store(&path).unwrap_err();
        assert!(matches!(err, TicketError::InvalidData(_)));
        assert!(err.to_string().starts_with("refusing to write invalid data: "));
        assert!(!path.exists());
    }

    #[test]
    fn listing_cost_follows_ticket_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        let raw = json!({"lastId": 5_000_000_000u64, "1": {"id": "1", "content": "old"}, "4999999999": {"id": "4999999999"}});
        fs::write(&path, raw.to_string()).unwrap();
        let c = TicketCollection::load(&path).unwrap();
        let ids: Vec<&str> = c.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["1", "4999999999"]);
    }

    #[test]
    fn iter_orders_numerically() {
        let mut c = TicketCollection::new();
        for n in 0..12 { c.open("Ricky", "a", &format!("job {n}")).unwrap(); }
        c.forget_one("2").unwrap();
        let ids: Vec<&str> = c.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["1", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12"]);
    }

    #[test]
    fn open_fails_when_ids_run_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        fs::write(&path, json!({"lastId": u64::MAX}).to_string()).unwrap();
        let mut c = TicketCollection::load(&path).unwrap();
        let err = c.open("Ricky", "self", "x").unwrap_err();
        assert!(matches!(err, TicketError::IdsExhausted));
        assert!(!err.is_domain());
        assert_eq!(c.last_id, u64::MAX);
        assert!(c.is_empty() && c.is_valid());
    }

    #[test]
    fn store_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        fs::write(&path, "previous contents").unwrap();
        let c = three();
        c.store(&path).unwrap();
        assert_eq!(TicketCollection::load(&path).unwrap(), c);
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name().to_string_lossy().into_owned()).collect();
        assert_eq!(names, ["tickets.json"]);
    }

    #[test]
    fn validity_of_raw_values() {
        assert!(is_valid_json(&json!({"lastId": 0})));
        assert!(is_valid_json(&json!({"lastId": 3, "1": {}})));
        assert!(!is_valid_json(&json!(null)));
        assert!(!is_valid_json(&json!({"lastId": null})));
    }
}
