// ticketbot/src/format.rs

use crate::ticket::Ticket;

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("??")
}

/// `#<id>: <requester> >> <assignee> (<room>)`, then the content on its own
/// line and any comments after ` -- `.
pub fn show_ticket(ticket: &Ticket) -> String {
    let mut main = format!(
        "#{}: {} >> {}",
        ticket.id,
        or_unknown(ticket.requester.as_deref()),
        or_unknown(ticket.assignee.as_deref()),
    );
    if let Some(room) = ticket.room_name.as_deref().filter(|r| !r.is_empty()) {
        main.push_str(&format!(" ({room})"));
    }
    if let Some(content) = ticket.content.as_deref().filter(|c| !c.is_empty()) {
        main.push('\n');
        main.push_str(content);
    }
    if !ticket.comments.is_empty() {
        main.push_str(" -- ");
        main.push_str(&ticket.comments.join("; "));
    }
    main
}

pub fn show_tickets(tickets: &[Ticket]) -> String {
    if tickets.is_empty() { return "nothing TODO!".into(); }
    let mut out = String::from("\n");
    for t in tickets {
        out.push_str(&show_ticket(t));
        out.push_str("\n\n");
    }
    out
}
