#[macro_use]
mod macros;

pub mod config;
pub mod dispatch;
pub mod filter;
pub mod format;
pub mod handler;
pub mod rules;
pub mod ticket;
pub mod trivia;

pub use config::{Config, ConfigManager, Scope};
pub use dispatch::{Dispatcher, Reply};
pub use filter::{by_status_and_room, by_user, filter_and, filter_or, prefix_match, Condition, Conditions, Field, TicketSource};
pub use format::{show_ticket, show_tickets};
pub use handler::{Handler, Inbound};
pub use rules::{default_rules, Action, Message, Outcome, Rule, RuleEnv};
pub use ticket::{ForgetAll, Ticket, TicketCollection, TicketError, TicketStatus};
pub use trivia::Trivia;
