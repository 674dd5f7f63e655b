use std::collections::HashSet;

use anyhow::{Result, bail};
use colored::Colorize;
use hulul_application::thread::SendRefusal;
use hulul_application::{Route, SendOutcome, ThreadPhase, TicketThreadController};

use crate::bootstrap::AppBootstrap;
use crate::output;

pub struct ThreadOptions {
    pub send: Option<String>,
    pub retry: bool,
    pub follow: bool,
}

pub async fn run(app: &AppBootstrap, ticket_id: &str, options: ThreadOptions) -> Result<()> {
    let user_id = app.require_user().await?;
    let controller = TicketThreadController::new(
        app.ticket_gateway.clone(),
        app.config.timeouts.request_timeout(),
    );

    let result = show(app, &controller, ticket_id, &user_id, options).await;
    controller.deactivate();
    result
}

async fn show(
    app: &AppBootstrap,
    controller: &TicketThreadController,
    ticket_id: &str,
    user_id: &str,
    options: ThreadOptions,
) -> Result<()> {
    match controller.activate(ticket_id, Some(user_id.to_string())).await {
        ThreadPhase::Ready => {}
        ThreadPhase::NotFound => {
            println!("{}", format!("Ticket {} was not found.", ticket_id).yellow());
            println!("Back to {}", Route::Support.path());
            return Ok(());
        }
        ThreadPhase::Error(message) => bail!("Failed to load ticket {}: {}", ticket_id, message),
        phase => bail!("Ticket {} did not load ({:?})", ticket_id, phase),
    }

    let view = controller.view();
    if let Some(ticket) = &view.ticket {
        println!("{}\n", output::ticket_header(ticket));
    }
    let mut printed = HashSet::new();
    for message in view.messages() {
        println!("{}", output::message_line(message, Some(user_id)));
        printed.insert(message.id.clone());
    }
    if let Some(sync_error) = &view.sync_error {
        println!("{}", sync_error.yellow());
    }

    let draft = if options.retry {
        match app.drafts.load(ticket_id).await? {
            Some(stored) => Some(stored.text),
            None => {
                println!("{}", "No unsent draft for this ticket.".yellow());
                None
            }
        }
    } else {
        options.send
    };

    if let Some(text) = draft {
        controller.set_draft(text.clone());
        match controller.send().await {
            SendOutcome::Sent(message) => {
                app.drafts.discard(ticket_id).await?;
                println!("{}", output::message_line(&message, Some(user_id)));
                printed.insert(message.id);
            }
            SendOutcome::Failed(reason) => {
                app.drafts.save(ticket_id, &text).await?;
                eprintln!("{}", reason.red());
                eprintln!("Your draft was kept. Retry with `hulul thread {} --retry`", ticket_id);
            }
            SendOutcome::Refused(SendRefusal::EmptyDraft) => {
                println!("{}", "Nothing to send.".yellow())
            }
            SendOutcome::Refused(refusal) => bail!("Message not sent ({:?})", refusal),
            SendOutcome::Discarded => {}
        }
    }

    if options.follow {
        follow(controller, user_id, printed).await?;
    }
    Ok(())
}

/// Prints messages as they arrive until Ctrl-C or the live feed ends.
async fn follow(
    controller: &TicketThreadController,
    user_id: &str,
    mut printed: HashSet<String>,
) -> Result<()> {
    let mut updates = controller.subscribe();
    if !updates.borrow().live {
        println!("{}", "Live updates are not available for this ticket.".yellow());
        return Ok(());
    }
    println!("{}", "Following. Press Ctrl-C to stop.".dimmed());
    let mut last_sync_error = None;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                if view.phase != ThreadPhase::Ready {
                    break;
                }
                for message in view.messages() {
                    if printed.insert(message.id.clone()) {
                        println!("{}", output::message_line(message, Some(user_id)));
                    }
                }
                if view.sync_error != last_sync_error {
                    if let Some(error) = &view.sync_error {
                        eprintln!("{}", format!("Live update failed: {}", error).yellow());
                    }
                    last_sync_error = view.sync_error.clone();
                }
                if !view.live {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
