//! Authoritative match state
//!
//! Everything here is plain data owned by one [`crate::machine::MatchMachine`].
//! The whole tree serializes, which is what a checkpoint stores.

use rules::relay::{self, SlotAssignment, Takeover, TurnOrder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use types::ids::{MatchId, PlayerId};
use types::mode::{GameMode, MatchType, Side};
use types::outcome::MatchOutcome;
use types::participant::{Participant, PartyMember, PartyRole};
use types::question::{OperationCategory, Question};

use crate::bot::BotPlan;
use crate::phase::Phase;
use crate::questions::Band;
use crate::quit_vote::QuitVote;

/// Everything needed to start a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSetup {
    pub match_id: MatchId,
    pub mode: GameMode,
    pub match_type: MatchType,
    pub teams: [Vec<PartyMember>; 2],
}

impl MatchSetup {
    pub fn participants(&self) -> impl Iterator<Item = &PartyMember> {
        self.teams.iter().flatten()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.participants().map(|m| m.id()).collect()
    }

    /// Recover the setup a running match was created from
    pub fn from_state(state: &MatchState) -> Self {
        let teams = Side::both().map(|side| {
            state
                .team(side)
                .members
                .iter()
                .filter_map(|id| state.players.get(id))
                .map(|p| PartyMember {
                    participant: p.participant.clone(),
                    roles: p.roles.clone(),
                })
                .collect::<Vec<_>>()
        });
        Self {
            match_id: state.match_id,
            mode: state.mode,
            match_type: state.match_type,
            teams,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Seated but not yet joined
    Pending,
    Connected,
    Disconnected { since: i64 },
    Abandoned { at: i64 },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// A question waiting for an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub question: Question,
    pub issued_at: i64,
    pub expires_at: i64,
    /// Set when a bot is the one expected to answer
    pub bot_plan: Option<BotPlan>,
}

impl PendingQuestion {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMatchState {
    pub participant: Participant,
    pub side: Side,
    pub roles: Vec<PartyRole>,
    pub score: u32,
    pub correct_count: u32,
    pub total_answered: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub total_latency_ms: u64,
    /// Own question stream (duel only)
    pub pending: Option<PendingQuestion>,
    pub connection: ConnectionStatus,
}

impl PlayerMatchState {
    pub fn new(member: &PartyMember, side: Side) -> Self {
        let connection = if member.participant.is_bot() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Pending
        };
        Self {
            participant: member.participant.clone(),
            side,
            roles: member.roles.clone(),
            score: 0,
            correct_count: 0,
            total_answered: 0,
            current_streak: 0,
            best_streak: 0,
            total_latency_ms: 0,
            pending: None,
            connection,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.participant.id()
    }

    pub fn is_bot(&self) -> bool {
        self.participant.is_bot()
    }

    pub fn has_role(&self, role: PartyRole) -> bool {
        self.roles.contains(&role)
    }

    /// Whether timers and bots may act for this seat
    pub fn is_playing(&self) -> bool {
        self.connection.is_connected()
    }
}

/// Relay progress within the current round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    /// 1-based slot position
    pub slot: usize,
    pub answered_in_slot: u32,
    pub round_complete: bool,
}

impl TurnState {
    pub fn start() -> Self {
        Self {
            slot: 1,
            answered_in_slot: 0,
            round_complete: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamState {
    pub side: Side,
    pub members: Vec<PlayerId>,
    pub assignment: SlotAssignment,
    pub locked: bool,
    pub takeover: Option<Takeover>,
    pub turn: TurnState,
    /// Relay streak is shared by the whole team
    pub streak: u32,
    pub best_streak: u32,
    /// Relay question for whoever holds the turn
    pub pending: Option<PendingQuestion>,
    pub quit_vote: Option<QuitVote>,
}

impl TeamState {
    pub fn new(side: Side, members: Vec<PlayerId>, order: &TurnOrder) -> Self {
        let assignment = relay::default_assignment(order, &members);
        Self {
            side,
            members,
            assignment,
            locked: false,
            takeover: None,
            turn: TurnState::start(),
            streak: 0,
            best_streak: 0,
            pending: None,
            quit_vote: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub match_id: MatchId,
    pub mode: GameMode,
    pub match_type: MatchType,
    pub phase: Phase,
    pub created_at: i64,
    pub phase_started_at: i64,
    pub phase_deadline: Option<i64>,
    /// First entry into the active phase
    pub active_started_at: Option<i64>,
    /// 1-based round, 0 before play starts
    pub round: u32,
    pub players: BTreeMap<PlayerId, PlayerMatchState>,
    pub teams: [TeamState; 2],
    pub turn_order: TurnOrder,
    pub seed: u64,
    pub band: Band,
    pub next_question_id: u64,
    /// Players currently reported red by the integrity monitor
    pub red_players: BTreeSet<PlayerId>,
    pub outcome: Option<MatchOutcome>,
    pub ended_at: Option<i64>,
    /// Last event sequence number handed out
    pub sequence: u64,
}

impl MatchState {
    pub fn new(setup: &MatchSetup, now: i64) -> Self {
        let turn_order = TurnOrder::canonical();
        let mut players = BTreeMap::new();
        for side in Side::both() {
            for member in &setup.teams[side.index()] {
                players.insert(member.id(), PlayerMatchState::new(member, side));
            }
        }
        let teams = Side::both().map(|side| {
            let members = setup.teams[side.index()].iter().map(|m| m.id()).collect();
            TeamState::new(side, members, &turn_order)
        });

        let ratings: Vec<i32> = setup.participants().map(|m| m.participant.rating()).collect();
        let mean = if ratings.is_empty() {
            0
        } else {
            ratings.iter().sum::<i32>() / ratings.len() as i32
        };

        Self {
            match_id: setup.match_id,
            mode: setup.mode,
            match_type: setup.match_type,
            phase: Phase::Waiting,
            created_at: now,
            phase_started_at: now,
            phase_deadline: None,
            active_started_at: None,
            round: 0,
            players,
            teams,
            turn_order,
            seed: setup.match_id.seed(),
            band: Band::for_rating(mean),
            next_question_id: 1,
            red_players: BTreeSet::new(),
            outcome: None,
            ended_at: None,
            sequence: 0,
        }
    }

    pub fn is_team(&self) -> bool {
        self.mode.is_team()
    }

    pub fn team(&self, side: Side) -> &TeamState {
        &self.teams[side.index()]
    }

    pub fn team_mut(&mut self, side: Side) -> &mut TeamState {
        &mut self.teams[side.index()]
    }

    pub fn humans_on(&self, side: Side) -> impl Iterator<Item = &PlayerMatchState> {
        self.players.values().filter(move |p| p.side == side && !p.is_bot())
    }

    /// Player whose turn it is on a relay team
    pub fn active_player(&self, side: Side) -> Option<PlayerId> {
        let team = self.team(side);
        if team.turn.round_complete {
            return None;
        }
        relay::resolve_active_player(&self.turn_order, &team.assignment, team.takeover.as_ref(), team.turn.slot)
    }

    pub fn slot_category(&self, side: Side) -> Option<OperationCategory> {
        let team = self.team(side);
        relay::slot_category(&self.turn_order, &team.assignment, team.turn.slot)
    }

    pub fn slot_count(&self, side: Side) -> usize {
        relay::slot_count(&self.turn_order, &self.team(side).assignment)
    }

    pub fn team_score(&self, side: Side) -> u32 {
        self.players.values().filter(|p| p.side == side).map(|p| p.score).sum()
    }
}
