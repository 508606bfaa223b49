//! Question flow: issuing, answering, timeouts and relay turn advancement

use rules::scoring::score_answer;
use tracing::debug;
use types::errors::ActionError;
use types::ids::PlayerId;
use types::mode::Side;
use types::question::{OperationCategory, QuestionView};

use super::MatchMachine;
use crate::actions::AnswerResult;
use crate::bot::{plan_answer, submitted_value, BotPlan};
use crate::events::{Audience, EventPayload};
use crate::phase::Phase;
use crate::state::PendingQuestion;

impl MatchMachine {
    fn new_question(&mut self, category: OperationCategory, answerer: PlayerId, at: i64) -> PendingQuestion {
        let id = self.state.next_question_id;
        self.state.next_question_id += 1;
        let question = self.generator.generate(id, category);
        let bot_plan = self.plan_for(answerer, id, at);
        PendingQuestion {
            question,
            issued_at: at,
            expires_at: at + self.config.question_limit_ms,
            bot_plan,
        }
    }

    fn plan_for(&self, answerer: PlayerId, question_id: u64, issued_at: i64) -> Option<BotPlan> {
        let difficulty = self.state.players.get(&answerer)?.participant.difficulty()?;
        Some(plan_answer(difficulty, self.state.seed, question_id, answerer, issued_at))
    }

    /// Make sure every seat that should be answering has a question, and
    /// that relay bot plans belong to whoever holds the turn now
    pub(super) fn fill_questions(&mut self, at: i64) {
        if self.state.phase != Phase::Active {
            return;
        }
        if self.state.is_team() {
            for side in Side::both() {
                self.fill_team_question(side, at);
            }
        } else {
            let waiting: Vec<PlayerId> = self
                .state
                .players
                .values()
                .filter(|p| p.is_playing() && p.pending.is_none())
                .map(|p| p.id())
                .collect();
            for player in waiting {
                let pending = self.new_question(OperationCategory::Mixed, player, at);
                self.announce_question(Audience::Player(player), player, &pending);
                if let Some(p) = self.state.players.get_mut(&player) {
                    p.pending = Some(pending);
                }
            }
        }
    }

    fn fill_team_question(&mut self, side: Side, at: i64) {
        let Some(active) = self.state.active_player(side) else {
            return;
        };
        let (playing, is_bot) = match self.state.players.get(&active) {
            Some(p) => (p.is_playing(), p.is_bot()),
            None => return,
        };
        if !playing {
            return;
        }
        let existing = self
            .state
            .team(side)
            .pending
            .as_ref()
            .map(|p| (p.question.id, p.issued_at, p.bot_plan.map(|plan| plan.bot)));

        match existing {
            None => {
                let Some(category) = self.state.slot_category(side) else {
                    return;
                };
                let pending = self.new_question(category, active, at);
                self.announce_question(Audience::Side(side), active, &pending);
                self.state.team_mut(side).pending = Some(pending);
            }
            Some((question_id, issued_at, planned_for)) => {
                // The turn changed hands mid-question
                let expected = if is_bot { Some(active) } else { None };
                if planned_for != expected {
                    let plan = self.plan_for(active, question_id, issued_at);
                    if let Some(pending) = self.state.team_mut(side).pending.as_mut() {
                        pending.bot_plan = plan;
                    }
                }
            }
        }
    }

    fn announce_question(&mut self, audience: Audience, player: PlayerId, pending: &PendingQuestion) {
        self.emit(
            audience,
            EventPayload::QuestionIssued {
                player_id: player,
                question: pending.question.view(),
                expires_at: pending.expires_at,
            },
        );
    }

    pub(super) fn announce_turn(&mut self, side: Side) {
        let slot = self.state.team(side).turn.slot;
        let category = self.state.slot_category(side);
        let player = self.state.active_player(side);
        self.emit(
            Audience::All,
            EventPayload::TurnChanged {
                side,
                slot,
                category,
                player_id: player,
            },
        );
    }

    // ── Submission ──────────────────────────────────────────────────────

    pub(super) fn submit_answer(
        &mut self,
        player: PlayerId,
        value: i32,
        question_id: Option<u64>,
        at: i64,
    ) -> Result<AnswerResult, ActionError> {
        self.require_phase(&[Phase::Active])?;
        let side = self.side_of(player)?;

        let pending = if self.state.is_team() {
            if self.state.active_player(side) != Some(player) {
                return Err(ActionError::NotYourTurn);
            }
            self.state.team(side).pending.as_ref()
        } else {
            self.state.players.get(&player).and_then(|p| p.pending.as_ref())
        };
        let pending = pending.ok_or(ActionError::AlreadyAnswered)?;
        if question_id.map_or(false, |id| id != pending.question.id) {
            return Err(ActionError::AlreadyAnswered);
        }
        if pending.is_expired(at) {
            return Err(ActionError::QuestionExpired);
        }

        let correct = pending.question.is_correct(value);
        let latency = at - pending.issued_at;
        Ok(self.record_answer(player, correct, latency, at))
    }

    /// Score an answer (or a timeout) for the seat that held the question
    fn record_answer(&mut self, player: PlayerId, correct: bool, latency_ms: i64, at: i64) -> AnswerResult {
        let Some(side) = self.state.players.get(&player).map(|p| p.side) else {
            return AnswerResult::rejected(&ActionError::NotAMember);
        };
        let team_mode = self.state.is_team();

        let streak = if team_mode {
            self.state.team(side).streak
        } else {
            self.state.players.get(&player).map_or(0, |p| p.current_streak)
        };
        let scored = score_answer(correct, streak);

        if team_mode {
            let team = self.state.team_mut(side);
            team.streak = scored.new_streak;
            team.best_streak = team.best_streak.max(scored.new_streak);
            team.pending = None;
        }
        let player_score = match self.state.players.get_mut(&player) {
            Some(p) => {
                p.score += scored.points;
                p.total_answered += 1;
                if correct {
                    p.correct_count += 1;
                }
                p.current_streak = scored.new_streak;
                p.best_streak = p.best_streak.max(scored.new_streak);
                p.total_latency_ms += latency_ms.max(0) as u64;
                if !team_mode {
                    p.pending = None;
                }
                p.score
            }
            None => 0,
        };
        debug!(
            match_id = %self.state.match_id,
            player_id = %player,
            correct,
            points = scored.points,
            streak = scored.new_streak,
            "Answer recorded"
        );
        let team_score = self.state.team_score(side);
        self.emit(
            Audience::All,
            EventPayload::ScoreUpdate {
                player_id: player,
                side,
                correct,
                points: scored.points,
                player_score,
                team_score,
                streak: scored.new_streak,
            },
        );

        if team_mode {
            self.advance_turn(side, at);
        } else {
            self.fill_questions(at);
        }

        AnswerResult {
            accepted: true,
            points_awarded: scored.points,
            new_streak: scored.new_streak,
            correct,
            next_question: self.question_for(player),
            reason: None,
        }
    }

    fn question_for(&self, player: PlayerId) -> Option<QuestionView> {
        let p = self.state.players.get(&player)?;
        let pending = if self.state.is_team() {
            if self.state.active_player(p.side) != Some(player) {
                return None;
            }
            self.state.team(p.side).pending.as_ref()
        } else {
            p.pending.as_ref()
        };
        pending.map(|q| q.question.view())
    }

    /// Count the answer against the slot quota and move the relay on
    fn advance_turn(&mut self, side: Side, at: i64) {
        let slots = self.state.slot_count(side);
        let quota = self.config.questions_per_slot;
        let team = self.state.team_mut(side);
        team.turn.answered_in_slot += 1;
        if team.turn.answered_in_slot < quota {
            self.fill_questions(at);
            return;
        }

        team.turn.slot += 1;
        team.turn.answered_in_slot = 0;
        if team.turn.slot > slots {
            team.turn.round_complete = true;
        }
        let complete = team.turn.round_complete;
        self.announce_turn(side);

        if !complete {
            self.fill_questions(at);
        } else if self.state.teams.iter().all(|t| t.turn.round_complete) {
            self.end_round(at);
        }
    }

    // ── Timers ──────────────────────────────────────────────────────────

    pub(super) fn expire_duel_question(&mut self, player: PlayerId, at: i64) {
        let limit = self.config.question_limit_ms;
        debug!(match_id = %self.state.match_id, player_id = %player, "Question timed out");
        self.record_answer(player, false, limit, at);
    }

    pub(super) fn bot_answer_duel(&mut self, player: PlayerId, at: i64) {
        let Some(pending) = self.state.players.get(&player).and_then(|p| p.pending.as_ref()) else {
            return;
        };
        let Some(plan) = pending.bot_plan else {
            return;
        };
        let correct = pending.question.is_correct(submitted_value(&plan, pending.question.answer));
        let latency = at - pending.issued_at;
        self.record_answer(player, correct, latency, at);
    }

    pub(super) fn expire_team_question(&mut self, side: Side, at: i64) {
        let Some(active) = self.state.active_player(side) else {
            return;
        };
        let limit = self.config.question_limit_ms;
        debug!(match_id = %self.state.match_id, player_id = %active, side = ?side, "Relay question timed out");
        self.record_answer(active, false, limit, at);
    }

    pub(super) fn bot_answer_team(&mut self, side: Side, at: i64) {
        let Some(pending) = self.state.team(side).pending.as_ref() else {
            return;
        };
        let Some(plan) = pending.bot_plan else {
            return;
        };
        let correct = pending.question.is_correct(submitted_value(&plan, pending.question.answer));
        let latency = at - pending.issued_at;
        self.record_answer(plan.bot, correct, latency, at);
    }
}
