// ticketbot/src/dispatch.rs

use regex::Captures;
use tracing::debug;

use crate::{
    rules::{default_rules, not_understood, Message, Rule, RuleEnv},
    ticket::{Result, TicketCollection, TicketError},
    trivia::Trivia,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Name of the rule that handled the message, if any.
    pub rule: Option<&'static str>,
    /// True when the collection changed and should be persisted.
    pub mutated: bool,
}

/// Runs messages through an ordered rule table. Holds no state of its own.
#[derive(Clone, Copy, Debug)]
pub struct Dispatcher<'r> {
    rules: &'r [Rule],
}

impl Default for Dispatcher<'static> {
    fn default() -> Self { Self::new() }
}

impl Dispatcher<'static> {
    pub fn new() -> Self { Self { rules: default_rules() } }
}

impl<'r> Dispatcher<'r> {
    pub fn with_rules(rules: &'r [Rule]) -> Self { Self { rules } }

    pub fn rules(&self) -> &'r [Rule] { self.rules }

    /// First rule, in table order, whose pattern matches anywhere in `content`.
    pub fn find<'c>(&self, content: &'c str) -> Option<(&'r Rule, Captures<'c>)> {
        self.rules.iter().find_map(|r| r.pattern.captures(content).map(|caps| (r, caps)))
    }

    /// Matches, runs the action and renders the reply as `#<prefix>: <text>`.
    ///
    /// A user-caused ticket error (bad or unknown id) comes back as the bare
    /// error message, without the prefix. Anything else is returned as `Err`.
    pub fn dispatch(&self, tickets: &mut TicketCollection, trivia: &mut Trivia, message: &Message) -> Result<Reply> {
        if !tickets.is_valid() {
            return Err(TicketError::InvalidData("refusing to dispatch on invalid ticket data".into()));
        }
        let content = message.content.trim();
        let Some((rule, caps)) = self.find(content) else {
            debug!(content, "no rule matched");
            return Ok(Reply { text: format!("#{}: {}", message.prefix, not_understood(message)), rule: None, mutated: false });
        };
        debug!(rule = rule.name, user = %message.user_name, room = %message.room_name, "rule matched");
        let mut env = RuleEnv { tickets, trivia, message, rules: self.rules };
        match rule.action.run(&mut env, &caps) {
            Ok(out) => Ok(Reply {
                text: format!("#{}: {}", message.prefix, (rule.reply)(message, &out)),
                rule: Some(rule.name),
                mutated: rule.mutates,
            }),
            Err(e) if e.is_domain() => {
                debug!(rule = rule.name, error = %e, "ticket error answered");
                Ok(Reply { text: e.to_string(), rule: Some(rule.name), mutated: false })
            }
            Err(e) => Err(e),
        }
    }
}
