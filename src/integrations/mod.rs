use std::sync::Arc;

use tokio::{sync::mpsc::UnboundedReceiver, task::JoinSet};

use crate::{
    core::{db::MarketDb, settings::Settings},
    web::{self, dashboard::WebCommand},
    Directory,
};

use self::sync::SyncClient;

pub mod sync;

pub fn init_integrations(
    tasks: &mut JoinSet<Result<(), anyhow::Error>>,
    settings: Arc<Settings>,
    db: Arc<MarketDb>,
    directory: Directory,
    sync_client: Option<SyncClient>,
    web_rx: UnboundedReceiver<WebCommand>,
) {
    // Add the sync subscription feed when the online store was acquired
    if let Some(client) = sync_client {
        tasks.spawn(sync::run_sync_subscription(
            client,
            directory.vote_actor.clone(),
        ));
    }

    // Add webserver to tasks
    tasks.spawn(web::run_http_server(db, directory, settings, web_rx));
}
