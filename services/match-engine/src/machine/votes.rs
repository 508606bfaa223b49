//! Quit votes and explicit forfeits

use tracing::info;
use types::errors::ActionError;
use types::ids::PlayerId;
use types::mode::Side;
use types::outcome::WinReason;

use super::MatchMachine;
use crate::actions::ActionOutcome;
use crate::events::{Audience, EventPayload};
use crate::phase::Phase;
use crate::quit_vote::{QuitVote, VoteResolution};

const VOTING_PHASES: [Phase; 4] = [Phase::Strategy, Phase::Active, Phase::Break, Phase::Halftime];

impl MatchMachine {
    pub(super) fn open_quit_vote(&mut self, player: PlayerId, at: i64) -> Result<ActionOutcome, ActionError> {
        self.require_phase(&VOTING_PHASES)?;
        let side = self.side_of(player)?;
        if !self.is_captain(player) {
            return Err(ActionError::NotPermitted {
                action: "open a quit vote".to_string(),
            });
        }
        if self.state.team(side).quit_vote.is_some() {
            return Err(ActionError::VoteAlreadyOpen);
        }

        let eligible: Vec<PlayerId> = self
            .state
            .humans_on(side)
            .filter(|p| p.connection.is_connected())
            .map(|p| p.id())
            .collect();
        let deadline = at + self.config.quit_vote_ms;
        let mut vote = QuitVote::new(player, side, eligible, at, deadline);
        vote.cast(player, true)?;
        let count = vote.eligible.len();
        self.state.team_mut(side).quit_vote = Some(vote);

        info!(match_id = %self.state.match_id, player_id = %player, side = ?side, "Quit vote opened");
        self.emit(
            Audience::Side(side),
            EventPayload::QuitVoteOpened {
                side,
                initiator: player,
                eligible: count,
                deadline,
            },
        );
        self.settle_vote(side, at);
        Ok(ActionOutcome::Ack)
    }

    pub(super) fn cast_ballot(&mut self, player: PlayerId, yes: bool, at: i64) -> Result<ActionOutcome, ActionError> {
        let side = self.side_of(player)?;
        let vote = self.state.team_mut(side).quit_vote.as_mut().ok_or(ActionError::NoOpenVote)?;
        vote.cast(player, yes)?;
        let (yes, no, outstanding) = (vote.yes(), vote.no(), vote.outstanding());
        self.emit(
            Audience::Side(side),
            EventPayload::QuitVoteUpdated {
                side,
                yes,
                no,
                outstanding,
            },
        );
        self.settle_vote(side, at);
        Ok(ActionOutcome::Ack)
    }

    /// Resolve early once the result can no longer change
    fn settle_vote(&mut self, side: Side, at: i64) {
        let early = self.state.team(side).quit_vote.as_ref().and_then(|v| v.early_resolution());
        if let Some(resolution) = early {
            self.resolve_vote(side, resolution, at);
        }
    }

    pub(super) fn quit_vote_deadline(&mut self, side: Side, at: i64) {
        let resolution = match &self.state.team(side).quit_vote {
            Some(vote) => vote.resolve_at_deadline(),
            None => return,
        };
        self.resolve_vote(side, resolution, at);
    }

    fn resolve_vote(&mut self, side: Side, resolution: VoteResolution, at: i64) {
        if self.state.team_mut(side).quit_vote.take().is_none() {
            return;
        }
        info!(match_id = %self.state.match_id, side = ?side, ?resolution, "Quit vote resolved");
        self.emit(Audience::All, EventPayload::QuitVoteResolved { side, resolution });
        if resolution == VoteResolution::Quit {
            self.forfeit(side, WinReason::QuitVote, at);
        }
    }

    pub(super) fn forfeit_by(&mut self, player: PlayerId, at: i64) -> Result<ActionOutcome, ActionError> {
        if self.state.phase == Phase::PostMatch {
            return Err(ActionError::WrongPhase {
                phase: self.state.phase.to_string(),
            });
        }
        let side = self.side_of(player)?;
        if self.state.is_team() && !self.is_captain(player) {
            return Err(ActionError::NotPermitted {
                action: "forfeit".to_string(),
            });
        }
        self.forfeit(side, WinReason::Forfeit, at);
        Ok(ActionOutcome::Ack)
    }
}
