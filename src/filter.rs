// ticketbot/src/filter.rs

use serde::Deserialize;
use serde_json::Value;

use crate::ticket::{Result, Ticket, TicketCollection, TicketError, TicketStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field { Id, Status, Content, Requester, Assignee, RoomName }

impl Field {
    pub fn of<'t>(&self, t: &'t Ticket) -> Option<&'t str> {
        match self {
            Self::Id => Some(t.id.as_str()),
            Self::Status => Some(t.status.as_str()),
            Self::Content => t.content.as_deref(),
            Self::Requester => t.requester.as_deref(),
            Self::Assignee => t.assignee.as_deref(),
            Self::RoomName => t.room_name.as_deref(),
        }
    }
}

pub type Test = Box<dyn Fn(Option<&str>) -> bool + Send + Sync>;

/// What one field has to satisfy.
pub enum Condition {
    /// Always satisfied; lets callers pass an optional criterion through unchanged.
    Any,
    /// Exact equality, `None` matching an absent field.
    Equals(Option<String>),
    Test(Test),
}

impl Condition {
    pub fn eq(value: impl Into<String>) -> Self { Self::Equals(Some(value.into())) }
    pub fn test(f: impl Fn(Option<&str>) -> bool + Send + Sync + 'static) -> Self { Self::Test(Box::new(f)) }
    pub fn maybe_eq(value: Option<&str>) -> Self { value.map_or(Self::Any, Self::eq) }

    pub fn holds(&self, value: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Equals(expected) => expected.as_deref() == value,
            Self::Test(f) => f(value),
        }
    }
}

#[derive(Default)]
pub struct Conditions(Vec<(Field, Condition)>);

impl Conditions {
    pub fn new() -> Self { Self::default() }
    pub fn with(mut self, field: Field, condition: Condition) -> Self {
        self.0.push((field, condition));
        self
    }
    fn all(&self, t: &Ticket) -> bool { self.0.iter().all(|(f, c)| c.holds(f.of(t))) }
    fn any(&self, t: &Ticket) -> bool { self.0.iter().any(|(f, c)| c.holds(f.of(t))) }
}

/// Anything a filter can run over: the live collection, an already selected
/// list, or raw JSON as found in a ticket file.
#[derive(Clone, Copy)]
pub enum TicketSource<'a> {
    Collection(&'a TicketCollection),
    List(&'a [Ticket]),
    Raw(&'a Value),
}

impl<'a> From<&'a TicketCollection> for TicketSource<'a> {
    fn from(c: &'a TicketCollection) -> Self { Self::Collection(c) }
}
impl<'a> From<&'a [Ticket]> for TicketSource<'a> {
    fn from(l: &'a [Ticket]) -> Self { Self::List(l) }
}
impl<'a> From<&'a Vec<Ticket>> for TicketSource<'a> {
    fn from(l: &'a Vec<Ticket>) -> Self { Self::List(l) }
}
impl<'a> From<&'a Value> for TicketSource<'a> {
    fn from(v: &'a Value) -> Self { Self::Raw(v) }
}

impl TicketSource<'_> {
    /// Tickets in ascending id order (list order for lists).
    pub fn materialize(self) -> Result<Vec<Ticket>> {
        match self {
            Self::Collection(c) => Ok(c.iter().cloned().collect()),
            Self::List(l) => Ok(l.to_vec()),
            Self::Raw(Value::Array(items)) => items.iter().map(raw_ticket).collect(),
            Self::Raw(Value::Object(map)) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().filter(|(k, _)| *k != "lastId").collect();
                entries.sort_by_key(|(k, _)| (k.parse::<u64>().unwrap_or(u64::MAX), k.to_string()));
                entries.into_iter().map(|(_, v)| raw_ticket(v)).collect()
            }
            Self::Raw(_) => Err(TicketError::InvalidInput),
        }
    }
}

fn raw_ticket(v: &Value) -> Result<Ticket> {
    Ticket::deserialize(v).map_err(|_| TicketError::InvalidInput)
}

pub fn filter_and<'a>(source: impl Into<TicketSource<'a>>, conditions: &Conditions) -> Result<Vec<Ticket>> {
    let mut tickets = source.into().materialize()?;
    tickets.retain(|t| conditions.all(t));
    Ok(tickets)
}

pub fn filter_or<'a>(source: impl Into<TicketSource<'a>>, conditions: &Conditions) -> Result<Vec<Ticket>> {
    let mut tickets = source.into().materialize()?;
    tickets.retain(|t| conditions.any(t));
    Ok(tickets)
}

/// Case-insensitive: does `name` start with `value`? Empty on either side never matches.
pub fn prefix_match(name: &str, value: Option<&str>) -> bool {
    match value {
        Some(v) if !name.is_empty() && !v.is_empty() => name.to_lowercase().starts_with(&v.to_lowercase()),
        _ => false,
    }
}

/// Tickets requested by or assigned to `name`.
pub fn by_user<'a>(source: impl Into<TicketSource<'a>>, name: &str) -> Result<Vec<Ticket>> {
    let (a, r) = (name.to_string(), name.to_string());
    let conditions = Conditions::new()
        .with(Field::Assignee, Condition::test(move |v| prefix_match(&a, v)))
        .with(Field::Requester, Condition::test(move |v| prefix_match(&r, v)));
    filter_or(source, &conditions)
}

pub fn by_status_and_room<'a>(
    source: impl Into<TicketSource<'a>>, statuses: &[TicketStatus], room_name: Option<&str>,
) -> Result<Vec<Ticket>> {
    let wanted: Vec<&'static str> = statuses.iter().map(TicketStatus::as_str).collect();
    let conditions = Conditions::new()
        .with(Field::Status, Condition::test(move |v| v.is_some_and(|s| wanted.iter().any(|w| *w == s))))
        .with(Field::RoomName, Condition::maybe_eq(room_name));
    filter_and(source, &conditions)
}
