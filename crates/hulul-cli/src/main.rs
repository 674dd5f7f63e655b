use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use hulul_infrastructure::HululPaths;

mod bootstrap;
mod commands;
mod logging;
mod output;

use bootstrap::AppBootstrap;

#[derive(Parser)]
#[command(name = "hulul")]
#[command(about = "Hulul CLI - client dashboard and support tickets", long_about = None)]
struct Cli {
    /// Root directory for config, session and logs (defaults to $HULUL_HOME or ~/.config/hulul)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "HULUL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out and clear local session data
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Create an account
    Signup {
        email: String,
        #[arg(long, env = "HULUL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        company: Option<String>,
    },
    /// Send a password reset email
    ResetPassword { email: String },
    /// Show dashboard navigation
    Nav {
        /// Current path, used to mark the active item
        #[arg(long, default_value = "/dashboard")]
        path: String,
    },
    /// List support tickets
    Tickets {
        /// Case-insensitive match on title or description
        #[arg(long, default_value = "")]
        search: String,
        /// all, pending, in_progress, resolved or closed
        #[arg(long, default_value = "all")]
        status: String,
    },
    /// Show a ticket thread, optionally sending a message
    Thread {
        ticket_id: String,
        /// Message to send
        #[arg(long, conflicts_with = "retry")]
        send: Option<String>,
        /// Resend the draft saved by the last failed send
        #[arg(long)]
        retry: bool,
        /// Keep printing new messages until interrupted
        #[arg(long)]
        follow: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let paths = HululPaths::new(cli.home);
    let _log_guard = logging::init(&paths.logs_dir()?)?;
    let app = AppBootstrap::initialize(&paths).await?;

    match cli.command {
        Commands::Login { email, password } => commands::auth::login(&app, &email, password).await,
        Commands::Logout => commands::auth::logout(&app).await,
        Commands::Whoami => commands::auth::whoami(&app).await,
        Commands::Signup {
            email,
            password,
            full_name,
            phone,
            company,
        } => commands::auth::signup(&app, &email, password, full_name, phone, company).await,
        Commands::ResetPassword { email } => commands::auth::reset_password(&app, &email).await,
        Commands::Nav { path } => {
            commands::nav::show(&app, &path);
            Ok(())
        }
        Commands::Tickets { search, status } => {
            commands::tickets::list(&app, &search, &status).await
        }
        Commands::Thread {
            ticket_id,
            send,
            retry,
            follow,
        } => {
            let options = commands::thread::ThreadOptions {
                send,
                retry,
                follow,
            };
            commands::thread::run(&app, &ticket_id, options).await
        }
    }
}
