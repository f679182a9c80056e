use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

use crate::{
    core::vote::{Participant, VoteActor, VoteRequest},
    error::Error,
    util,
};

/// Client for the remote document sync service that backs the community
/// vote when configured. Individual documents are read and written over
/// JSON HTTP; live roster and config changes arrive over a WebSocket feed.
#[derive(Clone)]
pub struct SyncClient {
    base: String,
    http: reqwest::Client,
}

/// A participant document together with its store revision
#[derive(Debug, Clone, Deserialize)]
struct ParticipantDoc {
    id: String,
    name: String,
    description: String,
    avatar: String,
    votes: u32,
    rev: u64,
}

impl From<ParticipantDoc> for Participant {
    fn from(doc: ParticipantDoc) -> Participant {
        Participant {
            id: doc.id,
            name: doc.name,
            description: doc.description,
            avatar: doc.avatar,
            votes: doc.votes,
        }
    }
}

#[derive(Serialize)]
struct NewParticipantDoc<'a> {
    name: &'a str,
    description: &'a str,
    avatar: String,
    votes: u32,
}

/// One conditional write inside a transaction batch. The store applies
/// the whole batch or none of it, and rejects it when any revision moved.
#[derive(Serialize)]
struct DocWrite {
    id: String,
    expect_rev: u64,
    votes: u32,
}

#[derive(Deserialize)]
struct ConfigDoc {
    is_active: bool,
}

/// Messages pushed over the subscription socket
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SyncMessage {
    Participants { docs: Vec<ParticipantDoc> },
    Config { is_active: Option<bool> },
}

impl SyncClient {
    /// One-shot startup acquisition. Any failure here selects offline mode
    /// for the life of the process; the caller never retries.
    pub async fn connect(base: &str) -> anyhow::Result<SyncClient> {
        let base = base.trim_end_matches('/').to_owned();
        url::Url::parse(&base)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let client = SyncClient { base, http };

        // Probe the config document, seeding the default for a fresh store.
        if client.voting_active().await?.is_none() {
            client.set_voting_active(false).await?;
        }

        Ok(client)
    }

    async fn voting_active(&self) -> anyhow::Result<Option<bool>> {
        let resp = self
            .http
            .get(format!("{}/config/voting", self.base))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let config: ConfigDoc = resp.error_for_status()?.json().await?;
        Ok(Some(config.is_active))
    }

    pub async fn set_voting_active(&self, active: bool) -> anyhow::Result<()> {
        self.http
            .put(format!("{}/config/voting", self.base))
            .json(&serde_json::json!({ "is_active": active }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn create_participant(&self, name: &str, description: &str) -> anyhow::Result<()> {
        self.http
            .post(format!("{}/participants", self.base))
            .json(&NewParticipantDoc {
                name,
                description,
                avatar: util::avatar_url(name),
                votes: 0,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn delete_participant(&self, id: &str) -> anyhow::Result<()> {
        self.http
            .delete(format!("{}/participants/{}", self.base, id))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn set_votes(&self, id: &str, votes: u32) -> anyhow::Result<()> {
        self.http
            .put(format!("{}/participants/{}", self.base, id))
            .json(&serde_json::json!({ "votes": votes }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn get_participant(&self, id: &str) -> anyhow::Result<Option<ParticipantDoc>> {
        let resp = self
            .http
            .get(format!("{}/participants/{}", self.base, id))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }

    /// The two-document vote transaction: read the new and previous
    /// targets, then commit a revision-conditional batch that increments
    /// the new tally and decrements the previous one, floored at zero.
    /// A missing target or a conflicting concurrent write aborts the whole
    /// operation with no partial effect.
    pub async fn cast_vote(&self, new_id: &str, old_id: Option<&str>) -> anyhow::Result<()> {
        let target = self
            .get_participant(new_id)
            .await?
            .ok_or_else(|| Error::UnknownParticipant(new_id.to_owned()))?;

        let mut writes = vec![DocWrite {
            id: target.id,
            expect_rev: target.rev,
            votes: target.votes + 1,
        }];

        // The previous target may have been removed since the vote was
        // cast; in that case only the increment commits.
        if let Some(old_id) = old_id {
            if let Some(previous) = self.get_participant(old_id).await? {
                writes.push(DocWrite {
                    id: previous.id,
                    expect_rev: previous.rev,
                    votes: previous.votes.saturating_sub(1),
                });
            }
        }

        let resp = self
            .http
            .post(format!("{}/participants/transaction", self.base))
            .json(&writes)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            reqwest::StatusCode::CONFLICT => Err(Error::VoteConflict(new_id.to_owned()).into()),
            reqwest::StatusCode::NOT_FOUND => {
                Err(Error::UnknownParticipant(new_id.to_owned()).into())
            }
            s => Err(Error::SyncProtocol(format!(
                "Vote transaction rejected with status {}",
                s
            ))
            .into()),
        }
    }

    fn ws_url(&self) -> String {
        if let Some(rest) = self.base.strip_prefix("https://") {
            format!("wss://{}/ws", rest)
        } else if let Some(rest) = self.base.strip_prefix("http://") {
            format!("ws://{}/ws", rest)
        } else {
            format!("{}/ws", self.base)
        }
    }
}

/// Maintains the live subscription, pumping roster and config snapshots
/// into the vote actor. The socket is re-established while the process
/// lives; the online/offline decision itself is never revisited.
pub async fn run_sync_subscription(
    client: SyncClient,
    vote_actor: VoteActor,
) -> anyhow::Result<()> {
    loop {
        match run_subscription_socket(&client, &vote_actor).await {
            Ok(()) => log::warn!("Sync subscription closed, reconnecting in 10 seconds..."),
            Err(e) => log::warn!(
                "Sync subscription failed ({}), reconnecting in 10 seconds...",
                e
            ),
        }
        sleep(Duration::from_secs(10)).await;
    }
}

async fn run_subscription_socket(
    client: &SyncClient,
    vote_actor: &VoteActor,
) -> anyhow::Result<()> {
    let (mut stream, _) = tokio_tungstenite::connect_async(client.ws_url()).await?;
    log::info!("Sync subscription open");

    while let Some(message) = stream.next().await {
        let message = message?;
        if !message.is_text() {
            continue;
        }
        match serde_json::from_str::<SyncMessage>(message.to_text()?) {
            Ok(SyncMessage::Participants { docs }) => {
                log::debug!("Received roster snapshot with {} participants", docs.len());
                vote_actor.send(VoteRequest::SyncRoster(
                    docs.into_iter().map(Participant::from).collect(),
                ));
            }
            Ok(SyncMessage::Config { is_active }) => match is_active {
                Some(active) => vote_actor.send(VoteRequest::SyncVotingActive(active)),
                None => {
                    // Fresh store: seed the default config document. The
                    // follow-up change notification carries the real value.
                    if let Err(e) = client.set_voting_active(false).await {
                        log::error!("Failed to create default voting config: {}", e);
                    }
                    vote_actor.send(VoteRequest::SyncVotingActive(false));
                }
            },
            Err(e) => log::warn!("Failed to parse sync message: {}", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_message_parses_to_participants() {
        let json = r#"{
            "type": "participants",
            "docs": [
                {"id": "a1", "name": "Asha", "description": "Gardener",
                 "avatar": "https://api.dicebear.com/7.x/avataaars/svg?seed=Asha",
                 "votes": 3, "rev": 7}
            ]
        }"#;
        match serde_json::from_str::<SyncMessage>(json).unwrap() {
            SyncMessage::Participants { docs } => {
                let participant = Participant::from(docs[0].clone());
                assert_eq!(participant.id, "a1");
                assert_eq!(participant.votes, 3);
            }
            SyncMessage::Config { .. } => panic!("Parsed as the wrong message kind"),
        }
    }

    #[test]
    fn test_config_message_tolerates_missing_document() {
        let present = r#"{"type": "config", "is_active": true}"#;
        match serde_json::from_str::<SyncMessage>(present).unwrap() {
            SyncMessage::Config { is_active } => assert_eq!(is_active, Some(true)),
            SyncMessage::Participants { .. } => panic!("Parsed as the wrong message kind"),
        }

        let missing = r#"{"type": "config", "is_active": null}"#;
        match serde_json::from_str::<SyncMessage>(missing).unwrap() {
            SyncMessage::Config { is_active } => assert_eq!(is_active, None),
            SyncMessage::Participants { .. } => panic!("Parsed as the wrong message kind"),
        }
    }

    #[test]
    fn test_ws_url_follows_base_scheme() {
        let http = reqwest::Client::new();
        let client = SyncClient {
            base: "http://localhost:9600".to_owned(),
            http: http.clone(),
        };
        assert_eq!(client.ws_url(), "ws://localhost:9600/ws");

        let client = SyncClient {
            base: "https://sync.example.com".to_owned(),
            http,
        };
        assert_eq!(client.ws_url(), "wss://sync.example.com/ws");
    }
}
