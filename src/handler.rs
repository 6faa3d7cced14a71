// ticketbot/src/handler.rs

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{
    config::{Config, DIRECT_ROOM},
    dispatch::Dispatcher,
    rules::Message,
    ticket::TicketCollection,
    trivia::Trivia,
};

/// One chat message as the transport delivers it.
#[derive(Clone, Debug)]
pub struct Inbound {
    pub text: String,
    pub user_name: String,
    /// `None` for a direct message.
    pub room: Option<String>,
}

impl Inbound {
    pub fn room_name(&self) -> &str { self.room.as_deref().unwrap_or(DIRECT_ROOM) }
}

/// Owns the ticket collection between messages and decides which messages
/// reach the dispatcher.
pub struct Handler {
    root: PathBuf,
    tickets: Option<TicketCollection>,
    loaded_from: Option<PathBuf>,
    trivia: Trivia,
    dispatcher: Dispatcher<'static>,
}

impl Handler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tickets: None,
            loaded_from: None,
            trivia: Trivia::default(),
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn tickets(&self) -> Option<&TicketCollection> { self.tickets.as_ref() }

    /// Content with the prefix cut off, or `None` when the message is not addressed to the bot.
    pub fn strip_prefix<'m>(prefix: &str, text: &'m str) -> Option<&'m str> {
        let n = prefix.chars().count();
        let cut = text.char_indices().nth(n).map_or(text.len(), |(i, _)| i);
        if text.chars().count() < n || text[..cut].to_lowercase() != prefix.to_lowercase() {
            return None;
        }
        Some(text[cut..].trim())
    }

    /// Reply to send back, if any.
    pub fn handle(&mut self, cfg: &Config, msg: &Inbound) -> Result<Option<String>> {
        let prefix = cfg.prefix();
        let Some(content) = Self::strip_prefix(prefix, &msg.text) else { return Ok(None) };
        let room_name = msg.room_name();
        if !cfg.is_whitelisted(room_name) {
            debug!(room = room_name, "room not whitelisted, ignoring");
            return Ok(None);
        }

        let trivia_dir = cfg.trivia_dir(&self.root);
        if self.trivia.dir() != trivia_dir.as_path() {
            self.trivia = Trivia::new(trivia_dir);
        }
        let path = cfg.store_path(&self.root);
        self.ensure_loaded(&path)?;
        let tickets = self.tickets.as_mut().context("ticket collection not loaded")?;

        let message = Message {
            content: content.to_string(),
            prefix: prefix.to_string(),
            room_name: room_name.to_string(),
            user_name: msg.user_name.clone(),
        };
        let reply = self.dispatcher.dispatch(tickets, &mut self.trivia, &message)?;
        if reply.mutated {
            tickets.store(&path).with_context(|| format!("persist tickets to {}", path.display()))?;
        }
        Ok(Some(reply.text))
    }

    fn ensure_loaded(&mut self, path: &Path) -> Result<()> {
        if self.loaded_from.as_deref() != Some(path) {
            self.tickets = None;
            self.loaded_from = None;
        }
        if self.tickets.is_none() {
            let loaded = TicketCollection::load(path)?;
            info!(path = %path.display(), tickets = loaded.len(), "ticket collection ready");
            self.loaded_from = Some(path.to_path_buf());
            self.tickets = Some(loaded);
        }
        Ok(())
    }
}
