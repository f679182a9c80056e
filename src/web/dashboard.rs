use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc::UnboundedReceiver};
use warp::{reject::Rejection, Filter};

use crate::{
    core::vote::{VoteRequest, VoteSnapshot},
    send_message, ActorRef, Directory, Rto,
};

use super::filters::with_directory;

pub enum WebCommand {
    SendStateUpdate,
}

pub type WebActor = ActorRef<WebCommand>;

/// Run a state websocket for a single client. Every connection receives
/// the current snapshot up front, then one message per engine mutation.
async fn run_state_websocket(
    directory: Directory,
    socket: warp::ws::WebSocket,
    mut state_rx: broadcast::Receiver<VoteSnapshot>,
    address: Option<SocketAddr>,
) {
    match address {
        Some(addr) => log::debug!("New state websocket connection opened from {}", addr.ip()),
        None => log::debug!("New state websocket connection opened"),
    };

    let (mut tx, _) = socket.split();

    match send_message!(directory.vote_actor, VoteRequest, GetSnapshot) {
        Ok(snapshot) => {
            if let Ok(snapshot) = serde_json::to_string(&snapshot) {
                if let Err(e) = tx.send(warp::ws::Message::text(snapshot)).await {
                    log::error!("Failed to send initial state: {}", e);
                    return;
                }
            }
        }
        Err(e) => {
            log::error!("Failed to assemble initial state: {}", e);
        }
    }

    while let Ok(update) = state_rx.recv().await {
        if let Ok(update) = serde_json::to_string(&update) {
            if let Err(e) = tx.send(warp::ws::Message::text(update)).await {
                log::error!("Failed to send state update: {}", e);
                break;
            }
        } else {
            log::error!("Failed to serialize state update");
            break;
        }
    }
}

pub fn websocket_filters(
    directory: Directory,
    mut rx: UnboundedReceiver<WebCommand>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let (state_update_tx, _) = broadcast::channel::<VoteSnapshot>(256);
    let state_reader_tx = state_update_tx.clone();

    let state_socket = warp::path!("ws")
        .and(warp::ws())
        .and(with_directory(directory.clone()))
        .and(warp::any().map(move || state_update_tx.subscribe()))
        .and(warp::filters::addr::remote())
        .map(
            |ws: warp::ws::Ws,
             directory: Directory,
             state_rx: broadcast::Receiver<VoteSnapshot>,
             address: Option<SocketAddr>| {
                ws.on_upgrade(move |socket| {
                    run_state_websocket(directory, socket, state_rx, address)
                })
            },
        );

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                WebCommand::SendStateUpdate => {
                    match send_message!(directory.vote_actor, VoteRequest, GetSnapshot) {
                        Ok(update) => {
                            let _ = state_reader_tx.send(update);
                        }
                        Err(e) => {
                            log::error!("Failed to assemble state update: {}", e);
                        }
                    }
                }
            }
        }
    });

    state_socket
}
