use anyhow::{Result, anyhow, bail};
use colored::Colorize;
use hulul_application::{ListPhase, TicketListView};
use hulul_core::ticket::StatusFilter;

use crate::bootstrap::AppBootstrap;
use crate::output;

pub async fn list(app: &AppBootstrap, search: &str, status: &str) -> Result<()> {
    let status: StatusFilter = status.parse().map_err(|_| {
        anyhow!(
            "Unknown status '{}'. Use all, pending, in_progress, resolved or closed",
            status
        )
    })?;
    app.require_user().await?;

    let mut view = TicketListView::new(
        app.ticket_gateway.clone(),
        app.config.timeouts.request_timeout(),
    );
    view.set_search_term(search);
    view.set_status_filter(status);

    if let ListPhase::Error(message) = view.load().await {
        bail!("Failed to load tickets: {}", message);
    }

    if view.is_empty_result() {
        if view.tickets().is_empty() {
            println!("No support tickets yet.");
        } else {
            println!("No tickets match the current filters.");
        }
        return Ok(());
    }

    for ticket in view.visible() {
        println!("{}", output::ticket_row(ticket));
    }
    println!(
        "{}",
        format!("{} of {} tickets", view.visible().len(), view.tickets().len()).dimmed()
    );
    Ok(())
}
