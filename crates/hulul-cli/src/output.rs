use chrono::{DateTime, Local, Utc};
use colored::{ColoredString, Colorize};
use hulul_core::ticket::{Message, Ticket, TicketStatus};

pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn status(status: TicketStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        TicketStatus::Pending => label.yellow(),
        TicketStatus::InProgress => label.blue(),
        TicketStatus::Resolved => label.green(),
        TicketStatus::Closed => label.dimmed(),
    }
}

pub fn ticket_row(ticket: &Ticket) -> String {
    let count = ticket
        .messages_count
        .map(|n| format!(" ({} messages)", n))
        .unwrap_or_default();
    format!(
        "{}  {:<12} {}{}  {}",
        ticket.id.dimmed(),
        status(ticket.status),
        ticket.title.bold(),
        count,
        timestamp(&ticket.created_at).dimmed()
    )
}

pub fn ticket_header(ticket: &Ticket) -> String {
    let mut header = format!(
        "{} [{}] priority: {}, category: {}",
        ticket.title.bold(),
        status(ticket.status),
        ticket.priority,
        ticket.category
    );
    if !ticket.description.is_empty() {
        header.push('\n');
        header.push_str(&ticket.description);
    }
    header
}

pub fn message_line(message: &Message, own_user_id: Option<&str>) -> String {
    let author = if message.is_from_support_staff {
        "support".cyan().bold()
    } else if Some(message.sender_id.as_str()) == own_user_id {
        "you".green().bold()
    } else {
        message.sender_id.normal()
    };
    format!(
        "{} {}: {}",
        timestamp(&message.created_at).dimmed(),
        author,
        message.body
    )
}
