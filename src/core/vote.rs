use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    core::db::MarketDb,
    error::Error,
    integrations::sync::SyncClient,
    util,
    web::dashboard::{WebActor, WebCommand},
    ActorRef, Rto,
};

/// A votable entry in the community vote
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Assigned by the sync store when online, generated locally when
    /// offline
    pub id: String,

    pub name: String,

    pub description: String,

    /// Derived from the name at creation time, immutable afterwards
    pub avatar: String,

    pub votes: u32,
}

impl Participant {
    pub fn new(name: &str, description: &str) -> Participant {
        Participant {
            id: util::generate_id(),
            name: name.to_owned(),
            description: description.to_owned(),
            avatar: util::avatar_url(name),
            votes: 0,
        }
    }
}

/// Voting state as observed by a UI: the roster, the session gate, this
/// client's vote, and which backing store is in use (status badge only).
#[derive(Debug, Clone, Serialize)]
pub struct VoteSnapshot {
    pub participants: Vec<Participant>,
    pub is_voting_active: bool,
    pub user_vote: Option<String>,
    pub is_online: bool,
}

/// The single owned container for the roster, the session flag, and this
/// client's current vote. Consumers receive a handle to the actor that
/// owns it; nothing reads it ambiently.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VoteLedger {
    pub participants: Vec<Participant>,
    pub is_voting_active: bool,
    pub user_vote: Option<String>,
}

impl VoteLedger {
    pub fn add(&mut self, participant: Participant) {
        self.participants.push(participant);
    }

    /// Drops a participant and clears the local vote if it pointed at them.
    /// Other tallies are left as-is.
    pub fn remove(&mut self, id: &str) {
        self.participants.retain(|p| p.id != id);
        if self.user_vote.as_deref() == Some(id) {
            self.user_vote = None;
        }
    }

    /// Whether casting for `id` would change any state. Voting while the
    /// session is closed, or re-voting the current target, is a no-op
    /// rather than an error.
    pub fn can_cast(&self, id: &str) -> bool {
        self.is_voting_active && self.user_vote.as_deref() != Some(id)
    }

    /// Moves this client's vote to `id`: the previous target (if still
    /// present) is decremented, floored at zero, the new target is
    /// incremented, and the vote reference is updated, as one synchronous
    /// step. A missing target aborts with no state change. Returns false
    /// when the cast was a no-op.
    pub fn cast(&mut self, id: &str) -> Result<bool, Error> {
        if !self.can_cast(id) {
            return Ok(false);
        }
        if !self.participants.iter().any(|p| p.id == id) {
            return Err(Error::UnknownParticipant(id.to_owned()));
        }

        if let Some(old) = self.user_vote.take() {
            if let Some(previous) = self.participants.iter_mut().find(|p| p.id == old) {
                previous.votes = previous.votes.saturating_sub(1);
            }
        }
        if let Some(target) = self.participants.iter_mut().find(|p| p.id == id) {
            target.votes += 1;
        }
        self.user_vote = Some(id.to_owned());
        Ok(true)
    }

    /// Zeroes every tally and forgets the local vote. The session flag is
    /// untouched.
    pub fn reset(&mut self) {
        for p in &mut self.participants {
            p.votes = 0;
        }
        self.user_vote = None;
    }

    pub fn toggle(&mut self) -> bool {
        self.is_voting_active = !self.is_voting_active;
        self.is_voting_active
    }

    pub fn total_votes(&self) -> u32 {
        self.participants.iter().map(|p| p.votes).sum()
    }
}

/// Which store backs the vote. Chosen once at startup, never revisited.
pub enum VoteBackend {
    Online(SyncClient),
    Offline,
}

impl VoteBackend {
    pub fn is_online(&self) -> bool {
        matches!(self, VoteBackend::Online(_))
    }
}

pub enum VoteRequest {
    AddParticipant(String, String, Rto<()>),
    RemoveParticipant(String, Rto<()>),
    /// Replies true if the vote moved, false for a silent no-op.
    CastVote(String, Rto<bool>),
    ToggleVoting(Rto<bool>),
    ResetVotes(Rto<()>),
    GetSnapshot(Rto<VoteSnapshot>),
    /// Roster snapshot pushed by the sync subscription
    SyncRoster(Vec<Participant>),
    /// Session-flag change pushed by the sync subscription
    SyncVotingActive(bool),
}

pub type VoteActor = ActorRef<VoteRequest>;

/// Owns the voting state and serializes every mutation, including the
/// backend vote transaction: a second cast issued while one is in flight
/// waits in the mailbox and sees the committed vote reference.
pub async fn run_vote_actor(
    db: Arc<MarketDb>,
    backend: VoteBackend,
    web_actor: WebActor,
    mut rx: UnboundedReceiver<VoteRequest>,
) -> anyhow::Result<()> {
    let mut ledger = VoteLedger {
        user_vote: db.user_vote().await?,
        ..VoteLedger::default()
    };

    // Offline state loads from the local snapshot; online state stays
    // empty until the subscription delivers the first roster.
    if !backend.is_online() {
        ledger.participants = db.get_participants().await?;
        ledger.is_voting_active = db.voting_active().await?;
    }

    while let Some(msg) = rx.recv().await {
        match msg {
            VoteRequest::AddParticipant(name, description, rto) => {
                log::info!("Adding participant {}", name);
                match &backend {
                    VoteBackend::Online(sync) => {
                        rto.reply(sync.create_participant(&name, &description).await);
                    }
                    VoteBackend::Offline => {
                        ledger.add(Participant::new(&name, &description));
                        rto.reply(db.save_participants(&ledger.participants).await);
                        web_actor.send(WebCommand::SendStateUpdate);
                    }
                }
            }
            VoteRequest::RemoveParticipant(id, rto) => {
                log::info!("Removing participant {}", id);
                let was_vote_target = ledger.user_vote.as_deref() == Some(id.as_str());
                let result = match &backend {
                    VoteBackend::Online(sync) => sync.delete_participant(&id).await,
                    VoteBackend::Offline => {
                        ledger.remove(&id);
                        db.save_participants(&ledger.participants).await
                    }
                };
                if result.is_ok() {
                    if was_vote_target {
                        ledger.user_vote = None;
                        if let Err(e) = db.set_user_vote(None).await {
                            log::error!("Failed to persist vote reference: {}", e);
                        }
                    }
                    web_actor.send(WebCommand::SendStateUpdate);
                }
                rto.reply(result);
            }
            VoteRequest::CastVote(id, rto) => {
                if !ledger.can_cast(&id) {
                    rto.reply(Ok(false));
                    continue;
                }
                match &backend {
                    VoteBackend::Online(sync) => {
                        match sync.cast_vote(&id, ledger.user_vote.as_deref()).await {
                            Ok(()) => {
                                ledger.user_vote = Some(id.clone());
                                if let Err(e) = db.set_user_vote(Some(&id)).await {
                                    log::error!("Failed to persist vote reference: {}", e);
                                }
                                web_actor.send(WebCommand::SendStateUpdate);
                                rto.reply(Ok(true));
                            }
                            Err(e) => {
                                log::error!("Vote for {} failed: {}", id, e);
                                rto.reply(Err(e));
                            }
                        }
                    }
                    VoteBackend::Offline => match ledger.cast(&id) {
                        Ok(_) => {
                            let persisted = db.save_participants(&ledger.participants).await;
                            if let Err(e) = db.set_user_vote(ledger.user_vote.as_deref()).await {
                                log::error!("Failed to persist vote reference: {}", e);
                            }
                            web_actor.send(WebCommand::SendStateUpdate);
                            rto.reply(persisted.map(|_| true));
                        }
                        Err(e) => {
                            log::error!("Vote for {} failed: {}", id, e);
                            rto.reply(Err(e.into()));
                        }
                    },
                }
            }
            VoteRequest::ToggleVoting(rto) => {
                let next = !ledger.is_voting_active;
                log::info!("Turning voting {}", if next { "on" } else { "off" });
                match &backend {
                    VoteBackend::Online(sync) => match sync.set_voting_active(next).await {
                        // The flag itself flips when the config
                        // subscription echoes the write back.
                        Ok(()) => rto.reply(Ok(next)),
                        Err(e) => rto.reply(Err(e)),
                    },
                    VoteBackend::Offline => {
                        ledger.toggle();
                        let result = db.set_voting_active(next).await;
                        web_actor.send(WebCommand::SendStateUpdate);
                        rto.reply(result.map(|_| next));
                    }
                }
            }
            VoteRequest::ResetVotes(rto) => {
                log::info!("Resetting all vote tallies");
                let result = match &backend {
                    VoteBackend::Online(sync) => {
                        // One update per participant; a concurrent vote can
                        // land between them.
                        let mut result = Ok(());
                        for p in &ledger.participants {
                            if let Err(e) = sync.set_votes(&p.id, 0).await {
                                log::error!("Failed to reset votes for {}: {}", p.id, e);
                                result = Err(e);
                            }
                        }
                        result
                    }
                    VoteBackend::Offline => {
                        ledger.reset();
                        db.save_participants(&ledger.participants).await
                    }
                };
                ledger.user_vote = None;
                if let Err(e) = db.set_user_vote(None).await {
                    log::error!("Failed to persist vote reference: {}", e);
                }
                web_actor.send(WebCommand::SendStateUpdate);
                rto.reply(result);
            }
            VoteRequest::GetSnapshot(rto) => {
                rto.reply(Ok(VoteSnapshot {
                    participants: ledger.participants.clone(),
                    is_voting_active: ledger.is_voting_active,
                    user_vote: ledger.user_vote.clone(),
                    is_online: backend.is_online(),
                }));
            }
            VoteRequest::SyncRoster(participants) => {
                ledger.participants = participants;
                web_actor.send(WebCommand::SendStateUpdate);
            }
            VoteRequest::SyncVotingActive(active) => {
                ledger.is_voting_active = active;
                web_actor.send(WebCommand::SendStateUpdate);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::send_message;

    fn ledger_with(names: &[&str]) -> VoteLedger {
        VoteLedger {
            participants: names
                .iter()
                .map(|name| Participant::new(name, "A neighbor"))
                .collect(),
            is_voting_active: true,
            user_vote: None,
        }
    }

    fn votes_of(ledger: &VoteLedger, idx: usize) -> u32 {
        ledger.participants[idx].votes
    }

    #[test]
    fn test_vote_sum_is_conserved() {
        let mut ledger = ledger_with(&["P1", "P2", "P3"]);
        let ids: Vec<String> = ledger.participants.iter().map(|p| p.id.clone()).collect();

        assert!(ledger.cast(&ids[0]).unwrap());
        assert_eq!(ledger.total_votes(), 1);

        // Moving the vote never changes the sum.
        assert!(ledger.cast(&ids[1]).unwrap());
        assert_eq!(ledger.total_votes(), 1);
        assert!(ledger.cast(&ids[2]).unwrap());
        assert_eq!(ledger.total_votes(), 1);
        assert_eq!(votes_of(&ledger, 0), 0);
        assert_eq!(votes_of(&ledger, 1), 0);
        assert_eq!(votes_of(&ledger, 2), 1);
    }

    #[test]
    fn test_tallies_never_go_negative() {
        let mut ledger = ledger_with(&["P1", "P2"]);
        let ids: Vec<String> = ledger.participants.iter().map(|p| p.id.clone()).collect();

        ledger.cast(&ids[0]).unwrap();
        // Another actor zeroed the tally before the vote moved away.
        ledger.participants[0].votes = 0;

        ledger.cast(&ids[1]).unwrap();
        assert_eq!(votes_of(&ledger, 0), 0);
        assert_eq!(votes_of(&ledger, 1), 1);
    }

    #[test]
    fn test_revoting_same_target_is_a_noop() {
        let mut ledger = ledger_with(&["P1"]);
        let id = ledger.participants[0].id.clone();

        assert!(ledger.cast(&id).unwrap());
        assert!(!ledger.cast(&id).unwrap());
        assert_eq!(votes_of(&ledger, 0), 1);
        assert_eq!(ledger.user_vote, Some(id));
    }

    #[test]
    fn test_closed_session_ignores_votes() {
        let mut ledger = ledger_with(&["P1", "P2"]);
        ledger.is_voting_active = false;
        let ids: Vec<String> = ledger.participants.iter().map(|p| p.id.clone()).collect();

        assert!(!ledger.cast(&ids[0]).unwrap());
        assert!(!ledger.cast(&ids[1]).unwrap());
        assert_eq!(ledger.total_votes(), 0);
        assert_eq!(ledger.user_vote, None);
    }

    #[test]
    fn test_reset_clears_tallies_and_vote_reference() {
        let mut ledger = ledger_with(&["P1", "P2"]);
        let id = ledger.participants[0].id.clone();
        ledger.cast(&id).unwrap();

        ledger.reset();
        assert!(ledger.participants.iter().all(|p| p.votes == 0));
        assert_eq!(ledger.user_vote, None);
        assert!(ledger.is_voting_active);
    }

    #[test]
    fn test_removal_clears_dangling_vote() {
        let mut ledger = ledger_with(&["P1", "P2"]);
        let id = ledger.participants[0].id.clone();
        ledger.cast(&id).unwrap();

        ledger.remove(&id);
        assert_eq!(ledger.user_vote, None);
        assert_eq!(ledger.participants.len(), 1);
        // The survivor's tally is not re-normalized.
        assert_eq!(votes_of(&ledger, 0), 0);
    }

    #[test]
    fn test_removing_someone_else_keeps_vote() {
        let mut ledger = ledger_with(&["P1", "P2"]);
        let ids: Vec<String> = ledger.participants.iter().map(|p| p.id.clone()).collect();
        ledger.cast(&ids[0]).unwrap();

        ledger.remove(&ids[1]);
        assert_eq!(ledger.user_vote, Some(ids[0].clone()));
        assert_eq!(votes_of(&ledger, 0), 1);
    }

    #[test]
    fn test_vote_moves_between_participants() {
        let mut ledger = ledger_with(&["P1", "P2"]);
        let ids: Vec<String> = ledger.participants.iter().map(|p| p.id.clone()).collect();

        assert!(ledger.cast(&ids[0]).unwrap());
        assert_eq!(votes_of(&ledger, 0), 1);
        assert_eq!(votes_of(&ledger, 1), 0);
        assert_eq!(ledger.user_vote, Some(ids[0].clone()));

        assert!(ledger.cast(&ids[1]).unwrap());
        assert_eq!(votes_of(&ledger, 0), 0);
        assert_eq!(votes_of(&ledger, 1), 1);
        assert_eq!(ledger.user_vote, Some(ids[1].clone()));

        assert!(!ledger.cast(&ids[1]).unwrap());
        assert_eq!(votes_of(&ledger, 0), 0);
        assert_eq!(votes_of(&ledger, 1), 1);
    }

    #[test]
    fn test_toggle_does_not_touch_tallies() {
        let mut ledger = ledger_with(&["P1"]);
        let id = ledger.participants[0].id.clone();
        ledger.cast(&id).unwrap();

        assert!(!ledger.toggle());
        assert!(ledger.toggle());
        assert_eq!(votes_of(&ledger, 0), 1);
    }

    #[test]
    fn test_missing_target_aborts_without_effect() {
        let mut ledger = ledger_with(&["P1"]);
        let id = ledger.participants[0].id.clone();
        ledger.cast(&id).unwrap();

        let before = ledger.clone();
        assert!(ledger.cast("gone12345").is_err());
        assert_eq!(ledger, before);
    }

    #[tokio::test]
    async fn test_offline_actor_persists_through_restart() {
        let db = Arc::new(MarketDb::open_in_memory().await.unwrap());

        let (vote_actor, vote_rx) = ActorRef::new();
        let (web_actor, _web_rx) = ActorRef::new();
        let actor = tokio::spawn(run_vote_actor(
            db.clone(),
            VoteBackend::Offline,
            web_actor,
            vote_rx,
        ));

        send_message!(
            vote_actor,
            VoteRequest,
            AddParticipant,
            "Asha".to_owned(),
            "Community gardener".to_owned()
        )
        .unwrap();
        assert!(send_message!(vote_actor, VoteRequest, ToggleVoting).unwrap());

        let snapshot = send_message!(vote_actor, VoteRequest, GetSnapshot).unwrap();
        assert!(!snapshot.is_online);
        let id = snapshot.participants[0].id.clone();

        assert!(send_message!(vote_actor, VoteRequest, CastVote, id.clone()).unwrap());
        let snapshot = send_message!(vote_actor, VoteRequest, GetSnapshot).unwrap();
        assert_eq!(snapshot.participants[0].votes, 1);
        assert_eq!(snapshot.user_vote, Some(id.clone()));

        drop(vote_actor);
        actor.await.unwrap().unwrap();

        // A fresh actor over the same store comes back with the same state.
        let (vote_actor, vote_rx) = ActorRef::new();
        let (web_actor, _web_rx) = ActorRef::new();
        tokio::spawn(run_vote_actor(
            db.clone(),
            VoteBackend::Offline,
            web_actor,
            vote_rx,
        ));

        let snapshot = send_message!(vote_actor, VoteRequest, GetSnapshot).unwrap();
        assert!(snapshot.is_voting_active);
        assert_eq!(snapshot.participants[0].votes, 1);
        assert_eq!(snapshot.user_vote, Some(id));
    }

    #[tokio::test]
    async fn test_offline_actor_ignores_votes_while_closed() {
        let db = Arc::new(MarketDb::open_in_memory().await.unwrap());

        let (vote_actor, vote_rx) = ActorRef::new();
        let (web_actor, _web_rx) = ActorRef::new();
        tokio::spawn(run_vote_actor(
            db.clone(),
            VoteBackend::Offline,
            web_actor,
            vote_rx,
        ));

        send_message!(
            vote_actor,
            VoteRequest,
            AddParticipant,
            "Ravi".to_owned(),
            "Repair cafe host".to_owned()
        )
        .unwrap();

        let snapshot = send_message!(vote_actor, VoteRequest, GetSnapshot).unwrap();
        let id = snapshot.participants[0].id.clone();

        assert!(!send_message!(vote_actor, VoteRequest, CastVote, id).unwrap());
        let snapshot = send_message!(vote_actor, VoteRequest, GetSnapshot).unwrap();
        assert_eq!(snapshot.participants[0].votes, 0);
        assert_eq!(snapshot.user_vote, None);
        assert_eq!(db.user_vote().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_offline_actor_remove_clears_persisted_vote() {
        let db = Arc::new(MarketDb::open_in_memory().await.unwrap());

        let (vote_actor, vote_rx) = ActorRef::new();
        let (web_actor, _web_rx) = ActorRef::new();
        tokio::spawn(run_vote_actor(
            db.clone(),
            VoteBackend::Offline,
            web_actor,
            vote_rx,
        ));

        send_message!(
            vote_actor,
            VoteRequest,
            AddParticipant,
            "Asha".to_owned(),
            "Community gardener".to_owned()
        )
        .unwrap();
        send_message!(vote_actor, VoteRequest, ToggleVoting).unwrap();

        let snapshot = send_message!(vote_actor, VoteRequest, GetSnapshot).unwrap();
        let id = snapshot.participants[0].id.clone();
        send_message!(vote_actor, VoteRequest, CastVote, id.clone()).unwrap();
        assert_eq!(db.user_vote().await.unwrap(), Some(id.clone()));

        send_message!(vote_actor, VoteRequest, RemoveParticipant, id).unwrap();
        let snapshot = send_message!(vote_actor, VoteRequest, GetSnapshot).unwrap();
        assert!(snapshot.participants.is_empty());
        assert_eq!(snapshot.user_vote, None);
        assert_eq!(db.user_vote().await.unwrap(), None);
    }
}
