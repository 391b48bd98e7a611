use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use play4me_client::groq::GroqClient;
use play4me_engine::{
    EngineConfig,
    connector::SpotifyConnector,
    database::{Database, NewAccount},
    jobs,
    scheduler::RefillScheduler,
    selector::TrackSelector,
    session::SessionManager,
};
use play4me_web::AppState;
use snafu::prelude::*;
use time::UtcOffset;
use tokio::sync::broadcast;
use tokio_schedule::{Job, every};
use uuid::Uuid;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long)]
    /// Log level
    verbosity: Option<tracing::Level>,

    #[clap(long, env = "DATABASE_URL")]
    /// SQLite database [default: local data directory]
    database_url: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web api and the refill schedule
    Serve {
        #[clap(flatten)]
        services: ServiceArgs,

        #[clap(long, env = "PLAY4ME_PORT", default_value_t = 9888)]
        /// Port for the web server
        port: u16,

        #[clap(long, env = "PLAY4ME_REFILL_INTERVAL", default_value_t = 30)]
        /// Seconds between refill ticks. 0 disables the in-process schedule
        refill_interval: u32,

        #[clap(long, env = "PLAY4ME_REFILL_SECRET")]
        /// Secret required by POST /api/refill
        refill_secret: Option<String>,
    },
    /// Run one refill tick and exit
    Refill {
        #[clap(flatten)]
        services: ServiceArgs,

        #[clap(long)]
        /// Only refill this session
        session_id: Option<Uuid>,
    },
    /// Manage accounts
    Account {
        #[clap(subcommand)]
        command: AccountCommands,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Register an owner, or replace its tokens
    Add {
        owner_id: String,
        /// Bearer token the client app presents
        api_token: String,
        /// Spotify refresh token
        refresh_token: String,
    },
}

#[derive(Args)]
struct ServiceArgs {
    #[clap(long, env = "SPOTIFY_CLIENT_ID")]
    spotify_client_id: String,

    #[clap(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    spotify_client_secret: String,

    #[clap(long, env = "GROQ_API_KEY", hide_env_values = true)]
    groq_api_key: String,

    #[clap(long, env = "GROQ_MODEL")]
    groq_model: String,

    #[clap(long, env = "PLAY4ME_QUEUE_FLOOR", default_value_t = 10)]
    /// Tracks to keep ahead of the listener
    queue_floor: usize,
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{error}"))]
    EngineError { error: String },
    #[snafu(display("{error}"))]
    WebError { error: String },
}

impl From<play4me_engine::error::Error> for Error {
    fn from(error: play4me_engine::error::Error) -> Self {
        Error::EngineError {
            error: error.to_string(),
        }
    }
}

impl From<play4me_web::Error> for Error {
    fn from(error: play4me_web::Error) -> Self {
        Error::WebError {
            error: error.to_string(),
        }
    }
}

struct Services {
    database: Arc<Database>,
    sessions: Arc<SessionManager>,
    scheduler: Arc<RefillScheduler>,
}

impl Services {
    fn build(database: Arc<Database>, args: ServiceArgs, utc_offset: UtcOffset) -> Self {
        let http = reqwest::Client::new();

        let connector = Arc::new(SpotifyConnector::new(
            database.clone(),
            http.clone(),
            args.spotify_client_id,
            args.spotify_client_secret,
        ));
        let generator = Arc::new(GroqClient::new(http, args.groq_api_key, args.groq_model));
        let selector = Arc::new(TrackSelector::new(generator).with_utc_offset(utc_offset));

        let config = EngineConfig {
            queue_floor: args.queue_floor,
            ..Default::default()
        };

        let sessions = Arc::new(SessionManager::new(
            database.clone(),
            connector.clone(),
            selector.clone(),
            config,
        ));
        let scheduler = Arc::new(RefillScheduler::new(
            database.clone(),
            connector,
            selector,
            config,
        ));

        Self {
            database,
            sessions,
            scheduler,
        }
    }
}

pub async fn run(utc_offset: UtcOffset) -> Result<(), Error> {
    let cli = Cli::parse();

    let verbosity = match &cli.command {
        Commands::Serve { .. } => cli.verbosity.or(Some(tracing::Level::INFO)),
        _ => cli.verbosity,
    };

    tracing_subscriber::fmt()
        .with_max_level(verbosity)
        .with_target(false)
        .compact()
        .init();

    let database = Arc::new(Database::new(cli.database_url).await?);
    tracing::debug!("Using database {}", database.path().display());

    match cli.command {
        Commands::Serve {
            services,
            port,
            refill_interval,
            refill_secret,
        } => {
            let services = Services::build(database, services, utc_offset);
            let (exit_sender, exit_receiver) = broadcast::channel(5);

            let (jobs, worker) = jobs::channel(services.scheduler.clone());
            let worker_handle = tokio::spawn(worker.run(exit_receiver));

            if refill_interval != 0 {
                let jobs = jobs.clone();
                let refill_schedule = every(refill_interval).seconds().perform(move || {
                    let jobs = jobs.clone();
                    async move { jobs.refill_all() }
                });

                tokio::spawn(refill_schedule);
            }

            let state = AppState {
                database: services.database,
                sessions: services.sessions,
                jobs,
                refill_secret,
            };

            tokio::spawn(async move {
                if let Err(e) = play4me_web::init(state, port).await {
                    error_exit(e.into());
                }
            });

            tracing::info!("Listening on port {port}");

            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Unable to listen for shutdown signal: {e}");
            }

            tracing::info!("Shutting down");
            _ = exit_sender.send(true);
            _ = worker_handle.await;
            Ok(())
        }
        Commands::Refill {
            services,
            session_id,
        } => {
            let services = Services::build(database, services, utc_offset);

            match session_id {
                Some(session_id) => match services.scheduler.refill_by_id(session_id).await? {
                    Some(outcome) => println!("Session {session_id}: {outcome:?}"),
                    None => println!("Session {session_id} is not open."),
                },
                None => {
                    let summary = services.scheduler.tick().await?;
                    println!(
                        "Refilled {} sessions: {} appended, {} abandoned, {} failed.",
                        summary.sessions, summary.appended, summary.abandoned, summary.failed
                    );
                }
            }
            Ok(())
        }
        Commands::Account { command } => match command {
            AccountCommands::Add {
                owner_id,
                api_token,
                refresh_token,
            } => {
                database
                    .upsert_account(&NewAccount {
                        owner_id: owner_id.clone(),
                        api_token,
                        refresh_token,
                    })
                    .await?;
                println!("Account {owner_id} saved.");
                Ok(())
            }
        },
    }
}

pub fn error_exit(error: Error) {
    eprintln!("{error}");
    std::process::exit(1);
}
