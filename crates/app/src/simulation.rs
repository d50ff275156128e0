//! In-process simulation of several clients sharing one room
//!
//! Every simulated client is a full [`RoomSession`] with its own heartbeat
//! and sweep tasks, all talking to one [`MemoryStore`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use pokerroom_core::{
    Error, MemoryStore, ParticipantId, Result, RoomCode, RoundStats, RoundToken, SyncConfig,
};
use pokerroom_sync::RoomSession;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

pub struct SimulationOptions {
    pub room: RoomCode,
    pub participants: usize,
    pub rounds: u32,
    pub config: SyncConfig,
    /// Abandon the leader after the rounds and wait for a successor
    pub crash_leader: bool,
}

/// One revealed round
#[derive(Debug, Clone, Serialize)]
pub struct RoundOutcome {
    pub round: u32,
    pub token: RoundToken,
    pub leader: String,
    pub votes: Vec<CastVote>,
    pub stats: Option<RoundStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CastVote {
    pub name: String,
    pub card: String,
}

/// Leadership handover after the leader stopped responding
#[derive(Debug, Clone, Serialize)]
pub struct Failover {
    pub previous_leader: String,
    pub new_leader: String,
    pub waited_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub room: RoomCode,
    pub rounds: Vec<RoundOutcome>,
    pub failover: Option<Failover>,
}

type Client = RoomSession<MemoryStore>;

pub async fn run<R: Rng>(options: SimulationOptions, rng: &mut R) -> Result<SimulationReport> {
    let min_participants = if options.crash_leader { 2 } else { 1 };
    if options.participants < min_participants {
        return Err(Error::Config(format!(
            "need at least {} participants, got {}",
            min_participants, options.participants
        )));
    }

    let store = Arc::new(MemoryStore::new());
    let mut clients = Vec::with_capacity(options.participants);
    for seat in 1..=options.participants {
        let client =
            RoomSession::attach(store.clone(), options.room.clone(), options.config.clone()).await?;
        client.join(&format!("Player {}", seat)).await?;
        clients.push(client);
    }
    info!(room = %options.room, participants = clients.len(), "Clients seated");

    let mut report = SimulationReport {
        room: options.room.clone(),
        rounds: Vec::new(),
        failover: None,
    };

    for round in 1..=options.rounds {
        report.rounds.push(play_round(&clients, round, rng).await?);
    }

    if options.crash_leader {
        let failover = crash_leader(&mut clients, &options.config).await?;
        report.failover = Some(failover);
        // The new leader can run the table
        let round = options.rounds + 1;
        report.rounds.push(play_round(&clients, round, rng).await?);
    }

    for client in clients {
        client.detach();
    }
    Ok(report)
}

async fn play_round<R: Rng>(
    clients: &[Client],
    round: u32,
    rng: &mut R,
) -> Result<RoundOutcome> {
    let leader = clients
        .iter()
        .find(|c| c.is_leader())
        .ok_or_else(|| Error::NotFound("no client holds the lead".into()))?;

    let mut votes = Vec::with_capacity(clients.len());
    for client in clients {
        let Some(card) = client.config().deck.cards().choose(rng).cloned() else {
            continue;
        };
        client.vote(&card).await?;
        votes.push(CastVote {
            name: display_name(client),
            card,
        });
    }

    leader.reveal().await?;
    let view = leader.view();
    debug!(round, voted = view.voted_count(), "Round revealed");

    let outcome = RoundOutcome {
        round,
        token: view.round,
        leader: display_name(leader),
        votes,
        stats: view.stats,
    };
    leader.reset_round().await?;
    Ok(outcome)
}

/// Drop the current leader without teardown, then wait until another
/// client's sweep has evicted it and promoted a successor
async fn crash_leader(clients: &mut Vec<Client>, config: &SyncConfig) -> Result<Failover> {
    let index = clients
        .iter()
        .position(|c| c.is_leader())
        .ok_or_else(|| Error::NotFound("no client holds the lead".into()))?;
    let crashed = clients.remove(index);
    let previous_leader = display_name(&crashed);
    let crashed_id: Option<ParticipantId> = crashed.local_id();
    crashed.abandon();
    info!(leader = %previous_leader, "Leader stopped responding");

    // Eviction needs the threshold to pass and then one full sweep period
    let budget = Duration::from_millis(
        config.stale_threshold_ms + 3 * config.sweep_interval_ms + 2 * config.heartbeat_interval_ms,
    );
    let started = Instant::now();

    loop {
        if let Some(successor) = clients.iter().find(|c| c.is_leader()) {
            let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            info!(leader = %display_name(successor), waited_ms, "Successor promoted");
            return Ok(Failover {
                previous_leader,
                new_leader: display_name(successor),
                waited_ms,
            });
        }
        if started.elapsed() > budget {
            return Err(Error::NotFound(format!(
                "no successor for {:?} after {}ms",
                crashed_id,
                budget.as_millis()
            )));
        }
        tokio::time::sleep(config.heartbeat_interval()).await;
    }
}

fn display_name(client: &Client) -> String {
    client
        .context()
        .map(|c| c.display_name)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn options(participants: usize, rounds: u32, crash_leader: bool) -> SimulationOptions {
        SimulationOptions {
            room: RoomCode::parse("SIM001").unwrap(),
            participants,
            rounds,
            config: SyncConfig::default().scaled_down(1000),
            crash_leader,
        }
    }

    #[tokio::test]
    async fn test_rounds_played() {
        let mut rng = StdRng::seed_from_u64(7);
        let report = run(options(4, 3, false), &mut rng).await.unwrap();

        assert_eq!(report.rounds.len(), 3);
        assert!(report.failover.is_none());
        for outcome in &report.rounds {
            assert_eq!(outcome.leader, "Player 1");
            assert_eq!(outcome.votes.len(), 4);
        }
        assert_eq!(report.rounds[0].token, RoundToken::INITIAL);
        assert!(report.rounds[1].token > report.rounds[0].token);
    }

    #[tokio::test]
    async fn test_leader_crash_recovers() {
        let mut rng = StdRng::seed_from_u64(11);
        let report = run(options(3, 1, true), &mut rng).await.unwrap();

        let failover = report.failover.unwrap();
        assert_eq!(failover.previous_leader, "Player 1");
        assert_eq!(failover.new_leader, "Player 2");
        assert_eq!(report.rounds.len(), 2);
        assert_eq!(report.rounds[1].leader, "Player 2");
        assert_eq!(report.rounds[1].votes.len(), 2);
    }

    #[tokio::test]
    async fn test_crash_needs_two_participants() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = run(options(1, 1, true), &mut rng).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
