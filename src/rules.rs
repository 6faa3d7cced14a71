// ticketbot/src/rules.rs
//
// The command table. Order is significant: the dispatcher commits to the first
// rule whose pattern matches anywhere in the message.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;

use crate::{
    filter::{by_status_and_room, by_user},
    format::{show_ticket, show_tickets},
    ticket::{ForgetAll, Result, Ticket, TicketCollection, TicketStatus},
    trivia::Trivia,
};

/// An inbound message with the command prefix already stripped.
#[derive(Clone, Debug, Default)]
pub struct Message {
    pub content: String,
    pub prefix: String,
    pub room_name: String,
    pub user_name: String,
}

/// Everything an action may read or change.
pub struct RuleEnv<'a> {
    pub tickets: &'a mut TicketCollection,
    pub trivia: &'a mut Trivia,
    pub message: &'a Message,
    pub rules: &'a [Rule],
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Nothing,
    Text(String),
    Ticket(Ticket),
    Tickets(Vec<Ticket>),
    Forgotten(String),
    Cleared(ForgetAll),
    /// The rule matched but has nothing to say (e.g. an unknown word list).
    NotUnderstood,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing | Self::NotUnderstood => Ok(()),
            Self::Text(s) | Self::Forgotten(s) => f.write_str(s),
            Self::Ticket(t) => f.write_str(&show_ticket(t)),
            Self::Tickets(list) => f.write_str(&show_tickets(list)),
            Self::Cleared(c) => write!(f, "{c}"),
        }
    }
}

/// Action keyed by how many capture groups it consumes.
#[derive(Clone, Copy)]
pub enum Action {
    Fixed(fn(&mut RuleEnv) -> Result<Outcome>),
    One(fn(&mut RuleEnv, &str) -> Result<Outcome>),
    Two(fn(&mut RuleEnv, &str, &str) -> Result<Outcome>),
}

impl Action {
    /// Runs the action; a group that did not participate is passed as `""`.
    pub fn run(&self, env: &mut RuleEnv, caps: &Captures) -> Result<Outcome> {
        let group = |i: usize| caps.get(i).map_or("", |m| m.as_str());
        match self {
            Self::Fixed(f) => f(env),
            Self::One(f) => f(env, group(1)),
            Self::Two(f) => f(env, group(1), group(2)),
        }
    }
}

pub type ReplyFn = fn(&Message, &Outcome) -> String;

pub struct Rule {
    pub name: &'static str,
    pub pattern: &'static Regex,
    pub action: Action,
    pub reply: ReplyFn,
    /// Whether a successful run changes the ticket collection.
    pub mutates: bool,
}

impl Rule {
    pub fn new(name: &'static str, pattern: &'static Regex, action: Action, reply: ReplyFn) -> Self {
        Self { name, pattern, action, reply, mutates: false }
    }
    pub fn mutating(mut self) -> Self {
        self.mutates = true;
        self
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("mutates", &self.mutates)
            .finish()
    }
}

pub fn not_understood(message: &Message) -> String {
    format!("I don't understand: {}. Can you try again?", message.content.trim())
}

static DEFAULT_RULES: Lazy<Vec<Rule>> = Lazy::new(build);

pub fn default_rules() -> &'static [Rule] { &DEFAULT_RULES }

fn build() -> Vec<Rule> {
    vec![
        Rule::new("greet", regex!(r"^$"), Action::Fixed(|_| Ok(Outcome::Nothing)),
            |m, _| format!("Yes {}?", m.user_name)),
        Rule::new("help", regex!(r"help"), Action::Fixed(help),
            |_, out| format!("\n{out}")),
        Rule::new("close", regex!(r"close #([0-9]*)"), Action::One(close), reply_closed).mutating(),
        Rule::new("please", regex!(r"please (.*)"), Action::One(please), reply_opened).mutating(),
        Rule::new("show", regex!(r"show #([0-9]*)"), Action::One(show), |_, out| out.to_string()),
        Rule::new("comment", regex!(r"ticket #([0-9]*) (.*)"), Action::Two(comment),
            |_, out| out.to_string()).mutating(),
        Rule::new("take", regex!(r"take #([0-9]*)"), Action::One(take), reply_assigned).mutating(),
        Rule::new("assign", regex!(r"assign #([0-9]*) to (\w*)"), Action::Two(assign), reply_assigned).mutating(),
        Rule::new("debug", regex!(r"debug"), Action::Fixed(debug), |_, out| out.to_string()),
        Rule::new("todo", regex!(r"todo(?:\s+(\w+))?"), Action::One(todo), |_, out| out.to_string()),
        Rule::new("mine", regex!(r"mine"), Action::Fixed(mine), |_, out| out.to_string()),
        Rule::new("history", regex!(r"history"), Action::Fixed(history), |_, out| out.to_string()),
        Rule::new("forget", regex!(r"forget #([0-9]*)"), Action::One(forget),
            |_, out| format!("ticket #{out} is forgotten")).mutating(),
        Rule::new("forget all", regex!(r"forget it"), Action::Fixed(forget_all), reply_cleared).mutating(),
        Rule::new("thanks", regex!(r"thank(?:s| you)"), Action::Fixed(|_| Ok(Outcome::Nothing)),
            |m, _| format!("you're welcome {}!", m.user_name)),
        Rule::new("ping", regex!(r"^ping$"), Action::Fixed(|_| Ok(Outcome::Nothing)), |_, _| "pong".into()),
        Rule::new("gimme", regex!(r"gimme\s+(?:an?\s+)?(\w*)"), Action::One(gimme), reply_gimme),
        Rule::new("what", regex!(r"^what (\w+?)s$"), Action::One(what), reply_what),
        Rule::new("hello", regex!(r"^(hi|hello|hey)\b"), Action::One(|_, word| Ok(Outcome::Text(word.into()))),
            |m, out| format!("{out} {}!", m.user_name)),
        Rule::new("question", regex!(r".*\?$"), Action::Fixed(|_| Ok(Outcome::Nothing)),
            |m, _| format!("good question {}, I have no idea.", m.user_name)),
    ]
}

// --- actions ---------------------------------------------------------------

fn help(env: &mut RuleEnv) -> Result<Outcome> {
    let patterns: Vec<&str> = env.rules.iter().map(|r| r.pattern.as_str()).collect();
    Ok(Outcome::Text(patterns.join("\n")))
}

fn close(env: &mut RuleEnv, id: &str) -> Result<Outcome> {
    Ok(Outcome::Ticket(env.tickets.close(id)?.clone()))
}

fn please(env: &mut RuleEnv, content: &str) -> Result<Outcome> {
    let m = env.message;
    Ok(Outcome::Ticket(env.tickets.open(&m.user_name, &m.room_name, content)?.clone()))
}

fn show(env: &mut RuleEnv, id: &str) -> Result<Outcome> {
    Ok(Outcome::Ticket(env.tickets.find(id)?.clone()))
}

fn comment(env: &mut RuleEnv, id: &str, text: &str) -> Result<Outcome> {
    Ok(Outcome::Text(env.tickets.add_comment(id, text)?))
}

fn take(env: &mut RuleEnv, id: &str) -> Result<Outcome> {
    Ok(Outcome::Ticket(env.tickets.assign(id, &env.message.user_name)?.clone()))
}

fn assign(env: &mut RuleEnv, id: &str, assignee: &str) -> Result<Outcome> {
    Ok(Outcome::Ticket(env.tickets.assign(id, assignee)?.clone()))
}

fn debug(env: &mut RuleEnv) -> Result<Outcome> {
    Ok(Outcome::Text(serde_json::to_string_pretty(&*env.tickets)?))
}

/// Open tickets: of the current room, or of the named user across rooms.
fn todo(env: &mut RuleEnv, name: &str) -> Result<Outcome> {
    let list = if name.is_empty() {
        by_status_and_room(&*env.tickets, &[TicketStatus::Open], Some(env.message.room_name.as_str()))?
    } else {
        by_user(&by_status_and_room(&*env.tickets, &[TicketStatus::Open], None)?, name)?
    };
    Ok(Outcome::Tickets(list))
}

fn mine(env: &mut RuleEnv) -> Result<Outcome> {
    let open = by_status_and_room(&*env.tickets, &[TicketStatus::Open], None)?;
    Ok(Outcome::Tickets(by_user(&open, &env.message.user_name)?))
}

fn history(env: &mut RuleEnv) -> Result<Outcome> {
    let all = [TicketStatus::Open, TicketStatus::Closed];
    Ok(Outcome::Tickets(by_status_and_room(&*env.tickets, &all, Some(env.message.room_name.as_str()))?))
}

fn forget(env: &mut RuleEnv, id: &str) -> Result<Outcome> {
    Ok(Outcome::Forgotten(env.tickets.forget_one(id)?))
}

fn forget_all(env: &mut RuleEnv) -> Result<Outcome> {
    Ok(Outcome::Cleared(env.tickets.forget_all()))
}

fn gimme(env: &mut RuleEnv, kind: &str) -> Result<Outcome> {
    Ok(env.trivia.pick(kind)?.map_or(Outcome::NotUnderstood, Outcome::Text))
}

fn what(env: &mut RuleEnv, kind: &str) -> Result<Outcome> {
    Ok(env.trivia.entries(kind)?.map_or(Outcome::NotUnderstood, |list| Outcome::Text(list.join("\n"))))
}

// --- replies ---------------------------------------------------------------

fn reply_closed(_: &Message, out: &Outcome) -> String {
    match out {
        Outcome::Ticket(t) => format!("ticket #{} is closed", t.id),
        other => other.to_string(),
    }
}

fn reply_opened(_: &Message, out: &Outcome) -> String {
    match out {
        Outcome::Ticket(t) => format!("will {} (ticket #{})", t.content.as_deref().unwrap_or_default(), t.id),
        other => other.to_string(),
    }
}

fn reply_assigned(_: &Message, out: &Outcome) -> String {
    match out {
        Outcome::Ticket(t) => format!("ticket #{} is assigned to {}", t.id, t.assignee.as_deref().unwrap_or("??")),
        other => other.to_string(),
    }
}

fn reply_cleared(_: &Message, out: &Outcome) -> String {
    match out {
        Outcome::Cleared(ForgetAll::Removed(n)) => format!("deleted {n} tickets"),
        other => other.to_string(),
    }
}

fn reply_gimme(m: &Message, out: &Outcome) -> String {
    match out {
        Outcome::Text(saying) => {
            let mut chars = saying.chars();
            let lowered: String = chars.next().map(|c| c.to_lowercase().chain(chars).collect()).unwrap_or_default();
            format!("{} {lowered}", m.user_name)
        }
        _ => not_understood(m),
    }
}

fn reply_what(m: &Message, out: &Outcome) -> String {
    match out {
        Outcome::Text(list) => format!("\n{list}"),
        _ => not_understood(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_match(content: &str) -> Option<&'static str> {
        default_rules().iter().find(|r| r.pattern.is_match(content)).map(|r| r.name)
    }

    #[test]
    fn table_order_decides() {
        assert_eq!(first_match(""), Some("greet"));
        assert_eq!(first_match("please help me"), Some("help"));
        assert_eq!(first_match("please close #3 for me"), Some("close"));
        assert_eq!(first_match("Please buy milk"), Some("please"));
        assert_eq!(first_match("ticket #2 done already"), Some("comment"));
        assert_eq!(first_match("can you show #1?"), Some("show"));
        assert_eq!(first_match("forget #4"), Some("forget"));
        assert_eq!(first_match("forget it"), Some("forget all"));
        assert_eq!(first_match("todo fred"), Some("todo"));
        assert_eq!(first_match("gimme a compliment"), Some("gimme"));
        assert_eq!(first_match("what jokes"), Some("what"));
        assert_eq!(first_match("hello there"), Some("hello"));
        assert_eq!(first_match("is it lunch yet?"), Some("question"));
        assert_eq!(first_match("handsome"), None);
    }

    #[test]
    fn captures_feed_actions() {
        let caps = regex!(r"assign #([0-9]*) to (\w*)").captures("ASSIGN #12 to Fred please").unwrap();
        assert_eq!(&caps[1], "12");
        assert_eq!(&caps[2], "Fred");
        let caps = regex!(r"gimme\s+(?:an?\s+)?(\w*)").captures("gimme an apple").unwrap();
        assert_eq!(&caps[1], "apple");
        let caps = regex!(r"gimme\s+(?:an?\s+)?(\w*)").captures("gimme apple").unwrap();
        assert_eq!(&caps[1], "apple");
        assert_eq!(first_match("so what jokes do you know"), None);
        let caps = regex!(r"todo(?:\s+(\w+))?").captures("todo").unwrap();
        assert!(caps.get(1).is_none());
    }

    #[test]
    fn outcome_rendering() {
        assert_eq!(Outcome::Nothing.to_string(), "");
        assert_eq!(Outcome::Tickets(vec![]).to_string(), "nothing TODO!");
        assert_eq!(Outcome::Cleared(ForgetAll::NothingToRemove).to_string(), "nothing to remove!");
        assert_eq!(Outcome::Ticket(Ticket::new("4")).to_string(), "#4: ?? >> ??");
    }

    #[test]
    fn gimme_lowercases_first_letter() {
        let m = Message { user_name: "Ricky".into(), ..Default::default() };
        assert_eq!(reply_gimme(&m, &Outcome::Text("You are great.".into())), "Ricky you are great.");
        let m = Message { content: "gimme a unknown".into(), ..m };
        assert_eq!(reply_gimme(&m, &Outcome::NotUnderstood), "I don't understand: gimme a unknown. Can you try again?");
    }

    #[test]
    fn every_rule_has_a_distinct_name() {
        let mut names: Vec<&str> = default_rules().iter().map(|r| r.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), default_rules().len());
    }
}
