use std::{fs::read_to_string, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        oneshot,
    },
    task::JoinSet,
};

use crate::{
    core::{
        db::MarketDb,
        listing,
        settings::Settings,
        vote::{run_vote_actor, VoteActor, VoteBackend},
    },
    integrations::{init_integrations, sync::SyncClient},
    web::dashboard::WebActor,
};

mod core;
mod error;
mod integrations;
mod util;
mod web;

pub use error::Error;

#[derive(Parser, Debug)]
#[command(name = "Rentloo")]
#[command(version = "0.1")]
#[command(about = "Backend service for the Rentloo rental marketplace.", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: RunType,
}

#[derive(Subcommand, Debug)]
enum RunType {
    /// Create a new market database and seed it with the starter catalog.
    Init {
        /// Location of the market database file to create.
        db_file: PathBuf,
    },

    /// Run the marketplace service against an existing database.
    Run {
        /// Location of a JSON settings file.
        /// If omitted, defaults are used and voting runs offline.
        #[arg(short, long)]
        settings_file: Option<PathBuf>,

        /// Location of the market database file.
        db_file: PathBuf,
    },
}

/// One-shot response slot carried inside an actor request.
pub struct Rto<T> {
    tx: oneshot::Sender<anyhow::Result<T>>,
}

impl<T> Rto<T> {
    pub fn new(tx: oneshot::Sender<anyhow::Result<T>>) -> Self {
        Rto { tx }
    }

    pub fn reply(self, msg: anyhow::Result<T>) {
        let _ = self.tx.send(msg);
    }
}

/// Cloneable mailbox handle for an actor task.
pub struct ActorRef<T> {
    tx: UnboundedSender<T>,
}

impl<T> ActorRef<T> {
    pub fn new() -> (Self, UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ActorRef { tx }, rx)
    }

    pub fn send(&self, msg: T) {
        let _ = self.tx.send(msg);
    }
}

impl<T> Clone for ActorRef<T> {
    fn clone(&self) -> Self {
        ActorRef {
            tx: self.tx.clone(),
        }
    }
}

/// Sends a request to an actor and awaits the reply slot.
#[macro_export]
macro_rules! send_message {
    ($actor:expr, $request:ident, $variant:ident $(, $arg:expr)*) => {{
        let (tx, rx) = tokio::sync::oneshot::channel();
        $actor.send($request::$variant($($arg,)* Rto::new(tx)));
        match rx.await {
            Ok(resp) => resp,
            Err(_) => Err(anyhow::anyhow!("Actor hung up before replying")),
        }
    }};
}

/// Handles for the long-lived actors, passed to anything that dispatches
/// work into them.
#[derive(Clone)]
pub struct Directory {
    pub vote_actor: VoteActor,
    pub web_actor: WebActor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        RunType::Init { db_file } => {
            let db = MarketDb::init(&db_file).await?;
            db.save_listings(&listing::seed_listings()).await?;
            println!(
                "Market database created and seeded at {}",
                db_file.display()
            );
            Ok(())
        }
        RunType::Run {
            settings_file,
            db_file,
        } => {
            let settings: Arc<Settings> = Arc::new(match settings_file {
                Some(path) => serde_json::from_str(&read_to_string(&path)?)?,
                None => {
                    log::info!("Settings file was not provided, using defaults.");
                    Settings::default()
                }
            });

            let db = Arc::new(MarketDb::load(&db_file).await?);

            // One-shot backing-store selection. A failure here is not an
            // error path: the process simply runs offline until it exits.
            let sync = match settings.sync_url.as_deref() {
                Some(url) => match SyncClient::connect(url).await {
                    Ok(client) => {
                        log::info!("Connected to sync service at {}", url);
                        Some(client)
                    }
                    Err(e) => {
                        log::warn!(
                            "Failed to reach sync service ({}), voting runs offline for this process",
                            e
                        );
                        None
                    }
                },
                None => {
                    log::info!("No sync service configured, voting runs offline.");
                    None
                }
            };

            let (vote_actor, vote_rx) = ActorRef::new();
            let (web_actor, web_rx) = ActorRef::new();
            let directory = Directory {
                vote_actor: vote_actor.clone(),
                web_actor: web_actor.clone(),
            };

            let backend = match sync.clone() {
                Some(client) => VoteBackend::Online(client),
                None => VoteBackend::Offline,
            };

            let mut tasks: JoinSet<Result<(), anyhow::Error>> = JoinSet::new();
            tasks.spawn(run_vote_actor(db.clone(), backend, web_actor, vote_rx));
            init_integrations(&mut tasks, settings, db, directory, sync, web_rx);

            log::info!("Rentloo initialized");

            while let Some(result) = tasks.join_next().await {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::error!("Task failed: {}", e),
                    Err(e) => log::error!("Task panicked: {}", e),
                }
            }

            Ok(())
        }
    }
}
