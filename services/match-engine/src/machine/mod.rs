//! Match State Machine
//!
//! Pure and synchronous: every input is an action or the current engine
//! time, every output is a mutation of [`MatchState`] plus queued
//! [`MatchEvent`]s. The owning actor drives it and delivers the events.
//!
//! **Key Invariants:**
//! - Rejected actions never mutate state
//! - Phases only move along the transition table
//! - Timers are derived from state on every call, so a timer that fires
//!   after the state moved on finds nothing due and does nothing
//! - Timers never touch the score or streak of a disconnected player

mod answers;
mod connection;
mod strategy;
mod votes;

use tracing::{info, warn};
use types::errors::ActionError;
use types::ids::{MatchId, PlayerId};
use types::mode::Side;
use types::outcome::{BoxScore, MatchOutcome, PlayerLine, TeamLine, WinReason};
use types::participant::PartyRole;

use crate::actions::{ActionOutcome, MatchAction};
use crate::config::MatchConfig;
use crate::events::{Audience, EventPayload, MatchEvent};
use crate::phase::Phase;
use crate::questions::QuestionGenerator;
use crate::state::{ConnectionStatus, MatchSetup, MatchState};
use crate::view::MatchSnapshot;

/// Upper bound on deadlines handled by one `tick`
const MAX_TICK_STEPS: usize = 10_000;

/// Something scheduled that can come due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Due {
    Phase,
    Abandon(PlayerId),
    /// Duel question expiry
    Expiry(PlayerId),
    /// Duel bot answer
    BotAnswer(PlayerId),
    TeamExpiry(Side),
    TeamBotAnswer(Side),
    QuitVote(Side),
}

pub struct MatchMachine {
    config: MatchConfig,
    state: MatchState,
    generator: QuestionGenerator,
    events: Vec<MatchEvent>,
}

impl MatchMachine {
    pub fn new(setup: MatchSetup, config: MatchConfig, now: i64) -> Self {
        let state = MatchState::new(&setup, now);
        let mut machine = Self::restore(state, config);
        machine.state.phase_deadline = Some(now + machine.config.waiting_ms);
        info!(match_id = %setup.match_id, mode = %setup.mode, match_type = %setup.match_type, "Match created");
        machine.emit(
            Audience::All,
            EventPayload::PhaseChanged {
                phase: Phase::Waiting,
                round: 0,
                deadline: machine.state.phase_deadline,
            },
        );
        machine
    }

    /// Rebuild a machine around existing state
    pub fn restore(state: MatchState, config: MatchConfig) -> Self {
        let generator = QuestionGenerator::new(state.seed, state.band);
        Self {
            config,
            state,
            generator,
            events: Vec::new(),
        }
    }

    pub fn match_id(&self) -> MatchId {
        self.state.match_id
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.state.phase.is_terminal()
    }

    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }

    /// Human players an event should be delivered to right now
    pub fn recipients(&self, audience: &Audience) -> Vec<PlayerId> {
        self.state
            .players
            .values()
            .filter(|p| !p.is_bot() && p.connection.is_connected())
            .filter(|p| match audience {
                Audience::All => true,
                Audience::Side(side) => p.side == *side,
                Audience::Player(id) => p.id() == *id,
            })
            .map(|p| p.id())
            .collect()
    }

    pub fn snapshot_for(&self, player: PlayerId) -> MatchSnapshot {
        MatchSnapshot::build(&self.state, player)
    }

    pub fn emit_ping(&mut self, player: PlayerId, nonce: u64) {
        self.emit(Audience::Player(player), EventPayload::Ping { nonce });
    }

    // ── Actions ─────────────────────────────────────────────────────────

    pub fn apply(&mut self, player: PlayerId, action: MatchAction, now: i64) -> Result<ActionOutcome, ActionError> {
        // Catch up on anything that came due before this action
        self.tick(now);

        if self.state.phase.is_terminal() {
            return Err(ActionError::MatchEnded);
        }
        let connection = match self.state.players.get(&player) {
            Some(p) => p.connection,
            None => return Err(ActionError::NotAMember),
        };

        match action {
            MatchAction::Join => self.join(player, now),
            MatchAction::Reconnect => self.reconnect(player, now),
            MatchAction::Disconnect => self.disconnect(player, now),
            MatchAction::IntegrityAlert { level } => self.integrity_alert(player, level, now),
            other => {
                match connection {
                    ConnectionStatus::Connected => {}
                    ConnectionStatus::Abandoned { .. } => return Err(ActionError::ReconnectWindowClosed),
                    _ => return Err(ActionError::Disconnected),
                }
                match other {
                    MatchAction::AssignSlot { category, player: target } => {
                        self.assign_slot(player, category, target)
                    }
                    MatchAction::ConfirmSlots => self.confirm_slots(player, now),
                    MatchAction::CallIn { category } => self.call_in(player, category, now),
                    MatchAction::ReleaseCallIn => self.release_call_in(player, now),
                    MatchAction::SubmitAnswer {
                        submitted_value,
                        question_id,
                        ..
                    } => self
                        .submit_answer(player, submitted_value, question_id, now)
                        .map(ActionOutcome::Answer),
                    MatchAction::OpenQuitVote => self.open_quit_vote(player, now),
                    MatchAction::CastBallot { yes } => self.cast_ballot(player, yes, now),
                    MatchAction::Forfeit => self.forfeit_by(player, now),
                    // Link statistics live with the actor
                    MatchAction::Pong { .. } => Ok(ActionOutcome::Ack),
                    MatchAction::Join
                    | MatchAction::Reconnect
                    | MatchAction::Disconnect
                    | MatchAction::IntegrityAlert { .. } => Ok(ActionOutcome::Ack),
                }
            }
        }
    }

    // ── Timers ──────────────────────────────────────────────────────────

    fn due_items(&self) -> Vec<(i64, Due)> {
        let state = &self.state;
        let mut items = Vec::new();
        if state.phase.is_terminal() {
            return items;
        }
        if let Some(deadline) = state.phase_deadline {
            items.push((deadline, Due::Phase));
        }
        if state.phase != Phase::PostMatch {
            for p in state.players.values() {
                if let ConnectionStatus::Disconnected { since } = p.connection {
                    items.push((since + self.config.reconnect_grace_ms, Due::Abandon(p.id())));
                }
            }
            for team in &state.teams {
                if let Some(vote) = &team.quit_vote {
                    items.push((vote.deadline, Due::QuitVote(team.side)));
                }
            }
        }
        if state.phase != Phase::Active {
            return items;
        }

        if state.is_team() {
            for side in Side::both() {
                let team = state.team(side);
                let (Some(pending), Some(active)) = (&team.pending, state.active_player(side)) else {
                    continue;
                };
                if !state.players.get(&active).map_or(false, |p| p.is_playing()) {
                    continue;
                }
                if let Some(plan) = pending.bot_plan.filter(|plan| plan.bot == active) {
                    if plan.answer_at < pending.expires_at {
                        items.push((plan.answer_at, Due::TeamBotAnswer(side)));
                    }
                }
                items.push((pending.expires_at, Due::TeamExpiry(side)));
            }
        } else {
            for p in state.players.values().filter(|p| p.is_playing()) {
                if let Some(pending) = &p.pending {
                    if let Some(plan) = pending.bot_plan {
                        if plan.answer_at < pending.expires_at {
                            items.push((plan.answer_at, Due::BotAnswer(p.id())));
                        }
                    }
                    items.push((pending.expires_at, Due::Expiry(p.id())));
                }
            }
        }
        items
    }

    fn next_due(&self) -> Option<(i64, Due)> {
        // Stable on ties: earlier entries in `due_items` go first
        self.due_items()
            .into_iter()
            .fold(None, |best: Option<(i64, Due)>, item| match best {
                Some(b) if b.0 <= item.0 => Some(b),
                _ => Some(item),
            })
    }

    /// Earliest engine time at which `tick` has work to do
    pub fn next_deadline(&self) -> Option<i64> {
        self.next_due().map(|(at, _)| at)
    }

    /// Fire everything due at or before `now`, in deadline order
    pub fn tick(&mut self, now: i64) {
        let mut steps = 0;
        while let Some((at, due)) = self.next_due() {
            if at > now {
                break;
            }
            if steps >= MAX_TICK_STEPS {
                warn!(match_id = %self.state.match_id, "Deadline loop did not settle");
                break;
            }
            self.fire(due, at);
            steps += 1;
        }
    }

    fn fire(&mut self, due: Due, at: i64) {
        match due {
            Due::Phase => self.on_phase_deadline(at),
            Due::Abandon(player) => self.abandon(player, at),
            Due::Expiry(player) => self.expire_duel_question(player, at),
            Due::BotAnswer(player) => self.bot_answer_duel(player, at),
            Due::TeamExpiry(side) => self.expire_team_question(side, at),
            Due::TeamBotAnswer(side) => self.bot_answer_team(side, at),
            Due::QuitVote(side) => self.quit_vote_deadline(side, at),
        }
    }

    fn on_phase_deadline(&mut self, at: i64) {
        match self.state.phase {
            Phase::Waiting => self.begin(at),
            Phase::Strategy => {
                for side in Side::both() {
                    self.lock_team(side);
                }
                self.start_round(at);
            }
            Phase::Active => {
                if self.state.is_team() {
                    self.end_round(at);
                } else {
                    self.enter_post_match(at);
                }
            }
            Phase::Break | Phase::Halftime => self.start_round(at),
            Phase::PostMatch => self.finish(at),
            Phase::Ended | Phase::Voided => {}
        }
    }

    // ── Phase flow ──────────────────────────────────────────────────────

    fn enter(&mut self, to: Phase, at: i64, deadline: Option<i64>) -> bool {
        match self.state.phase.transition(to) {
            Ok(phase) => {
                info!(match_id = %self.state.match_id, from = %self.state.phase, to = %phase, round = self.state.round, "Phase changed");
                self.state.phase = phase;
                self.state.phase_started_at = at;
                self.state.phase_deadline = deadline;
                self.emit(
                    Audience::All,
                    EventPayload::PhaseChanged {
                        phase,
                        round: self.state.round,
                        deadline,
                    },
                );
                true
            }
            Err(e) => {
                warn!(match_id = %self.state.match_id, error = %e, "Refused phase transition");
                false
            }
        }
    }

    /// Leave the waiting room: everyone still pending counts as disconnected
    fn begin(&mut self, at: i64) {
        if self.state.phase != Phase::Waiting {
            return;
        }
        let mut absent = Vec::new();
        for p in self.state.players.values_mut() {
            if p.connection == ConnectionStatus::Pending {
                p.connection = ConnectionStatus::Disconnected { since: at };
                absent.push(p.id());
            }
        }
        for player in absent {
            self.emit(Audience::All, EventPayload::PlayerDisconnected { player_id: player });
        }

        if self.state.is_team() {
            let deadline = at + self.config.strategy_ms;
            if !self.enter(Phase::Strategy, at, Some(deadline)) {
                return;
            }
            for side in Side::both() {
                if self.state.humans_on(side).next().is_none() {
                    self.lock_team(side);
                }
            }
            if self.state.teams.iter().all(|t| t.locked) {
                self.start_round(at);
            }
        } else {
            self.start_round(at);
        }
    }

    /// Enter the active phase: the whole duel, or the next relay round
    fn start_round(&mut self, at: i64) {
        let length = if self.state.is_team() {
            self.config.round_limit_ms
        } else {
            self.config.duel_length_ms
        };
        self.state.round += 1;
        if !self.enter(Phase::Active, at, Some(at + length)) {
            return;
        }
        self.state.active_started_at.get_or_insert(at);

        if self.state.is_team() {
            for side in Side::both() {
                let team = self.state.team_mut(side);
                team.turn = crate::state::TurnState::start();
                team.pending = None;
                self.announce_turn(side);
            }
        }
        self.fill_questions(at);
    }

    fn end_round(&mut self, at: i64) {
        for side in Side::both() {
            let team = self.state.team_mut(side);
            team.pending = None;
            if let Some(takeover) = team.takeover.take() {
                self.emit(
                    Audience::All,
                    EventPayload::TakeoverEnded {
                        side,
                        category: takeover.category,
                    },
                );
            }
        }

        let round = self.state.round;
        if round >= self.config.rounds {
            self.enter_post_match(at);
        } else if round == self.config.halftime_after_round {
            self.enter(Phase::Halftime, at, Some(at + self.config.halftime_ms));
        } else {
            self.enter(Phase::Break, at, Some(at + self.config.break_ms));
        }
    }

    fn clear_questions(&mut self) {
        for p in self.state.players.values_mut() {
            p.pending = None;
        }
        for team in self.state.teams.iter_mut() {
            team.pending = None;
        }
    }

    fn enter_post_match(&mut self, at: i64) {
        self.clear_questions();
        let teams = self.team_lines();
        let decision = rules::decide_winner(&teams[0], &teams[1]);
        let outcome = match (decision.winner, decision.decided_by.win_reason()) {
            (Some(side), Some(reason)) => MatchOutcome::Winner { side, reason },
            _ => MatchOutcome::Draw,
        };
        self.state.outcome = Some(outcome.clone());
        if self.enter(Phase::PostMatch, at, Some(at + self.config.post_match_ms)) {
            let box_score = self.box_score();
            self.emit(Audience::All, EventPayload::MatchEnded { outcome, box_score });
        }
    }

    fn finish(&mut self, at: i64) {
        if self.enter(Phase::Ended, at, None) {
            self.state.ended_at = Some(at);
        }
    }

    /// End the match now with `loser` forfeiting
    fn forfeit(&mut self, loser: Side, reason: WinReason, at: i64) {
        if self.state.phase.is_terminal() {
            return;
        }
        self.clear_questions();
        for team in self.state.teams.iter_mut() {
            team.quit_vote = None;
        }
        let outcome = MatchOutcome::Winner {
            side: loser.opposite(),
            reason,
        };
        info!(match_id = %self.state.match_id, loser = ?loser, ?reason, "Match forfeited");
        self.state.outcome = Some(outcome.clone());
        if self.enter(Phase::Ended, at, None) {
            self.state.ended_at = Some(at);
            let box_score = self.box_score();
            self.emit(Audience::All, EventPayload::MatchEnded { outcome, box_score });
        }
    }

    /// Void the match; no result is recorded for anyone
    pub fn void(&mut self, reason: &str, at: i64) {
        if self.state.phase.is_terminal() {
            return;
        }
        warn!(match_id = %self.state.match_id, reason, "Match voided");
        self.clear_questions();
        self.state.outcome = Some(MatchOutcome::Voided {
            reason: reason.to_string(),
        });
        if self.enter(Phase::Voided, at, None) {
            self.state.ended_at = Some(at);
            self.emit(
                Audience::All,
                EventPayload::MatchVoided {
                    reason: reason.to_string(),
                },
            );
        }
    }

    /// After a restore nobody is connected until they reconnect
    pub fn on_resume(&mut self, now: i64) {
        let mut dropped = Vec::new();
        for p in self.state.players.values_mut().filter(|p| !p.is_bot()) {
            if matches!(p.connection, ConnectionStatus::Connected | ConnectionStatus::Pending) {
                p.connection = ConnectionStatus::Disconnected { since: now };
                dropped.push(p.id());
            }
        }
        self.state.red_players.clear();
        for player in dropped {
            self.emit(Audience::All, EventPayload::PlayerDisconnected { player_id: player });
        }
        info!(match_id = %self.state.match_id, phase = %self.state.phase, "Match resumed from checkpoint");
    }

    // ── Results ─────────────────────────────────────────────────────────

    fn player_lines(&self) -> Vec<PlayerLine> {
        self.state
            .players
            .values()
            .map(|p| PlayerLine {
                player_id: p.id(),
                display_name: p.participant.display_name().to_string(),
                side: p.side,
                is_bot: p.is_bot(),
                rating_at_start: p.participant.rating(),
                score: p.score,
                correct: p.correct_count,
                answered: p.total_answered,
                best_streak: p.best_streak,
                total_latency_ms: p.total_latency_ms,
            })
            .collect()
    }

    fn team_lines(&self) -> [TeamLine; 2] {
        let players = self.player_lines();
        Side::both().map(|side| TeamLine::from_players(side, &players))
    }

    pub fn box_score(&self) -> BoxScore {
        let players = self.player_lines();
        let teams = Side::both().map(|side| TeamLine::from_players(side, &players));
        let end = self.state.ended_at.unwrap_or(self.state.phase_started_at);
        BoxScore {
            match_id: self.state.match_id,
            mode: self.state.mode,
            match_type: self.state.match_type,
            outcome: self.state.outcome.clone().unwrap_or(MatchOutcome::Voided {
                reason: "unfinished".to_string(),
            }),
            teams,
            players,
            duration_ms: end - self.state.created_at,
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn emit(&mut self, audience: Audience, payload: EventPayload) {
        self.state.sequence += 1;
        self.events.push(MatchEvent {
            sequence: self.state.sequence,
            audience,
            payload,
        });
    }

    fn side_of(&self, player: PlayerId) -> Result<Side, ActionError> {
        self.state.players.get(&player).map(|p| p.side).ok_or(ActionError::NotAMember)
    }

    /// Leader or IGL; a team with neither role held by a human lets any
    /// of its humans act as captain
    fn is_captain(&self, player: PlayerId) -> bool {
        let Some(p) = self.state.players.get(&player) else {
            return false;
        };
        if p.has_role(PartyRole::Leader) || p.has_role(PartyRole::Igl) {
            return true;
        }
        !self
            .state
            .humans_on(p.side)
            .any(|h| h.has_role(PartyRole::Leader) || h.has_role(PartyRole::Igl))
    }

    fn require_phase(&self, allowed: &[Phase]) -> Result<(), ActionError> {
        if allowed.contains(&self.state.phase) {
            Ok(())
        } else {
            Err(ActionError::WrongPhase {
                phase: self.state.phase.to_string(),
            })
        }
    }
}
