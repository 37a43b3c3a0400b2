//! frentista — operator CLI for the outbound messaging subsystem of the
//! gas-station dashboard.
//!
//! Usage:
//!   frentista campaign start --targets alvos.txt --template "Olá {name}!"
//!   frentista campaign resume <id>
//!   frentista campaign status <id>
//!   frentista campaign list
//!   frentista inbound 5511988887777 "oi" --first
//!   frentista contact show 5511988887777
//!   frentista config

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use frentista_campaign::{CampaignController, JobView, JsonJobStore, PacingConfig, RateBudget};
use frentista_conversation::{ConversationEngine, TemplateReplier};
use frentista_core::config::FrentistaConfig;
use frentista_core::phone;
use frentista_delivery::{DeliveryClient, DeliveryConfig, HttpTransport};
use frentista_store::SqliteStore;

#[derive(Parser)]
#[command(
    name = "frentista",
    version,
    about = "⛽ Frentista — outbound messaging for the forecourt"
)]
struct Cli {
    /// Path to config.toml (default: ~/.frentista/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bulk campaign control
    Campaign {
        #[command(subcommand)]
        cmd: CampaignCmd,
    },
    /// Inspect contacts
    Contact {
        #[command(subcommand)]
        cmd: ContactCmd,
    },
    /// Feed an inbound message to the conversation engine (webhook
    /// stand-in for local runs)
    Inbound {
        phone: String,
        text: String,
        /// Treat as the contact's first message
        #[arg(long)]
        first: bool,
    },
    /// Send the farewell and close a dialogue
    End { phone: String },
    /// Show the effective configuration
    Config,
}

#[derive(Subcommand)]
enum CampaignCmd {
    /// Start a campaign from a file of phone numbers, one per line
    Start {
        #[arg(long)]
        targets: PathBuf,
        /// Message template; `{name}` renders the contact's name
        #[arg(long)]
        template: String,
    },
    /// Resume a paused or rate-limited campaign
    Resume { id: String },
    /// Show a campaign's progress
    Status { id: String },
    /// List persisted campaigns
    List,
}

#[derive(Subcommand)]
enum ContactCmd {
    Show { phone: String },
}

struct App {
    config: FrentistaConfig,
    store: Arc<SqliteStore>,
}

impl App {
    fn open(config: FrentistaConfig) -> Result<Self> {
        let db_path = config.data_dir().join("frentista.db");
        let store = Arc::new(SqliteStore::open(&db_path)?);
        Ok(Self { config, store })
    }

    fn delivery_client(&self) -> Result<Arc<DeliveryClient>> {
        let transport = Arc::new(HttpTransport::new(&self.config.provider)?);
        Ok(Arc::new(DeliveryClient::new(
            transport,
            self.store.clone(),
            DeliveryConfig::from(&self.config.messaging),
        )))
    }

    fn controller(&self) -> Result<Arc<CampaignController>> {
        let job_store = Arc::new(JsonJobStore::new(&self.config.data_dir().join("campaigns")));
        let budget = Arc::new(RateBudget::new(self.config.messaging.max_messages_per_hour));
        Ok(Arc::new(CampaignController::new(
            self.delivery_client()?,
            job_store,
            self.store.clone(),
            budget,
            PacingConfig::from(&self.config.messaging),
            &self.config.country_code,
        )))
    }

    fn engine(&self) -> Result<ConversationEngine> {
        Ok(ConversationEngine::new(
            self.store.clone(),
            self.store.clone(),
            self.delivery_client()?,
            Arc::new(TemplateReplier),
            self.config.conversation.clone(),
            &self.config.country_code,
        ))
    }
}

/// Pause the campaign on ctrl-c so progress is persisted before exit.
fn pause_on_ctrl_c(controller: Arc<CampaignController>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n⏸ pausing campaign, persisting progress...");
            let _ = controller.pause().await;
        }
    });
}

fn print_view(view: &JobView) {
    println!("📋 campaign {}", view.id);
    println!("   status:  {}", view.status);
    println!(
        "   cursor:  {}/{} (sent {}, failed {})",
        view.cursor, view.total, view.sent, view.failed
    );
    println!("   window:  {}/{}", view.window_used, view.window_limit);
    if let Some(reason) = &view.pause_reason {
        println!("   reason:  {reason}");
    }
}

fn read_targets(path: &PathBuf) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "frentista=debug"
    } else {
        "frentista=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => FrentistaConfig::load_from(path)?,
        None => FrentistaConfig::load()?,
    };

    match cli.command {
        Command::Campaign { cmd } => {
            let app = App::open(config)?;
            match cmd {
                CampaignCmd::Start { targets, template } => {
                    let targets = read_targets(&targets)?;
                    let controller = app.controller()?;
                    pause_on_ctrl_c(controller.clone());
                    let view = controller.start(&targets, &template).await?;
                    print_view(&view);
                }
                CampaignCmd::Resume { id } => {
                    let controller = app.controller()?;
                    controller.load_job(&id).await?;
                    pause_on_ctrl_c(controller.clone());
                    let view = controller.resume().await?;
                    print_view(&view);
                }
                CampaignCmd::Status { id } => {
                    let controller = app.controller()?;
                    let view = controller.load_job(&id).await?;
                    print_view(&view);
                }
                CampaignCmd::List => {
                    let job_store =
                        JsonJobStore::new(&app.config.data_dir().join("campaigns"));
                    use frentista_core::traits::JobStore;
                    for id in job_store.list().await? {
                        println!("{id}");
                    }
                }
            }
        }
        Command::Contact { cmd } => {
            let app = App::open(config)?;
            match cmd {
                ContactCmd::Show { phone: raw } => {
                    use frentista_core::traits::ContactStore;
                    let normalized = phone::normalize(&raw, &app.config.country_code)?;
                    match app.store.get(&normalized).await? {
                        Some(contact) => {
                            println!("📇 {normalized}");
                            println!("   name:   {}", contact.name.as_deref().unwrap_or("-"));
                            println!("   state:  {}", contact.flow_state);
                            println!("   opt-in: {}", contact.opt_in);
                        }
                        None => println!("no contact {normalized}"),
                    }
                }
            }
        }
        Command::Inbound { phone, text, first } => {
            let app = App::open(config)?;
            let engine = app.engine()?;
            let state = engine.handle_inbound(&phone, &text, first).await?;
            println!("contact is now: {state}");
        }
        Command::End { phone } => {
            let app = App::open(config)?;
            let engine = app.engine()?;
            engine.end_conversation(&phone).await?;
            println!("farewell sent");
        }
        Command::Config => {
            println!("country_code = {}", config.country_code);
            println!("data_dir     = {}", config.data_dir().display());
            println!(
                "provider     = {}",
                if config.provider.api_url.is_empty() {
                    "(not configured)"
                } else {
                    &config.provider.api_url
                }
            );
            println!(
                "rate         = {}/hour, delays {}-{}s",
                config.messaging.max_messages_per_hour,
                config.messaging.min_delay_secs,
                config.messaging.max_delay_secs
            );
        }
    }

    Ok(())
}
