//! Slot assignment and anchor call-ins

use rules::relay::Takeover;
use tracing::info;
use types::errors::ActionError;
use types::ids::PlayerId;
use types::mode::Side;
use types::participant::PartyRole;
use types::question::OperationCategory;

use super::MatchMachine;
use crate::actions::ActionOutcome;
use crate::events::{Audience, EventPayload};
use crate::phase::Phase;

impl MatchMachine {
    /// The IGL assigns; without a human IGL the leader does, and without
    /// either any human on the team may
    fn may_assign(&self, player: PlayerId, side: Side) -> bool {
        let holds = |role| {
            self.state
                .humans_on(side)
                .find(|h| h.has_role(role))
                .map(|h| h.id())
        };
        match (holds(PartyRole::Igl), holds(PartyRole::Leader)) {
            (Some(igl), _) => igl == player,
            (None, Some(leader)) => leader == player,
            (None, None) => true,
        }
    }

    pub(super) fn assign_slot(
        &mut self,
        player: PlayerId,
        category: OperationCategory,
        target: PlayerId,
    ) -> Result<ActionOutcome, ActionError> {
        self.require_phase(&[Phase::Strategy])?;
        let side = self.side_of(player)?;
        if self.state.team(side).locked {
            return Err(ActionError::SlotsLocked);
        }
        if !self.may_assign(player, side) {
            return Err(ActionError::NotPermitted {
                action: "assign slots".to_string(),
            });
        }
        if !self.state.team(side).members.contains(&target) {
            return Err(ActionError::InvalidAssignment {
                reason: "player is not on this team".to_string(),
            });
        }
        if !self.state.turn_order.categories().contains(&category) {
            return Err(ActionError::InvalidAssignment {
                reason: format!("{} is not played", category),
            });
        }

        let team = self.state.team_mut(side);
        team.assignment.assign(category, target);
        let assignment: Vec<(OperationCategory, PlayerId)> = team
            .assignment
            .categories()
            .filter_map(|c| team.assignment.holder(c).map(|p| (c, p)))
            .collect();
        self.emit(Audience::Side(side), EventPayload::SlotsUpdated { side, assignment });
        Ok(ActionOutcome::Ack)
    }

    pub(super) fn confirm_slots(&mut self, player: PlayerId, at: i64) -> Result<ActionOutcome, ActionError> {
        self.require_phase(&[Phase::Strategy])?;
        let side = self.side_of(player)?;
        if self.state.team(side).locked {
            return Err(ActionError::SlotsLocked);
        }
        if !self.may_assign(player, side) {
            return Err(ActionError::NotPermitted {
                action: "confirm slots".to_string(),
            });
        }
        self.lock_team(side);
        if self.state.teams.iter().all(|t| t.locked) {
            self.start_round(at);
        }
        Ok(ActionOutcome::Ack)
    }

    pub(super) fn lock_team(&mut self, side: Side) {
        let team = self.state.team_mut(side);
        if team.locked {
            return;
        }
        team.locked = true;
        info!(match_id = %self.state.match_id, side = ?side, "Slots locked");
        self.emit(Audience::All, EventPayload::SlotsLocked { side });
    }

    pub(super) fn call_in(
        &mut self,
        player: PlayerId,
        category: OperationCategory,
        at: i64,
    ) -> Result<ActionOutcome, ActionError> {
        self.require_phase(&[Phase::Active])?;
        let side = self.side_of(player)?;
        let is_anchor = self.state.players.get(&player).map_or(false, |p| p.has_role(PartyRole::Anchor));
        if !self.state.is_team() || !is_anchor {
            return Err(ActionError::NotPermitted {
                action: "call in".to_string(),
            });
        }
        let team = self.state.team(side);
        if team.turn.round_complete {
            return Err(ActionError::InvalidAssignment {
                reason: "round already complete".to_string(),
            });
        }
        if rules::relay::slot_of(&self.state.turn_order, &team.assignment, category).is_none() {
            return Err(ActionError::InvalidAssignment {
                reason: format!("{} is not played", category),
            });
        }

        let on_current_slot = self.state.slot_category(side) == Some(category);
        let team = self.state.team_mut(side);
        team.takeover = Some(Takeover { category, anchor: player });
        // An expired question is reissued to the anchor rather than resumed
        if on_current_slot && team.pending.as_ref().map_or(false, |q| q.is_expired(at)) {
            team.pending = None;
        }
        info!(match_id = %self.state.match_id, player_id = %player, %category, "Anchor called in");
        self.emit(
            Audience::All,
            EventPayload::TakeoverStarted {
                side,
                category,
                anchor: player,
            },
        );
        if on_current_slot {
            self.announce_turn(side);
        }
        self.fill_questions(at);
        Ok(ActionOutcome::Ack)
    }

    pub(super) fn release_call_in(&mut self, player: PlayerId, at: i64) -> Result<ActionOutcome, ActionError> {
        self.require_phase(&[Phase::Active, Phase::Break, Phase::Halftime])?;
        let side = self.side_of(player)?;
        let takeover = match self.state.team(side).takeover {
            Some(t) if t.anchor == player => t,
            _ => {
                return Err(ActionError::NotPermitted {
                    action: "release a call-in".to_string(),
                })
            }
        };
        let on_current_slot = self.state.slot_category(side) == Some(takeover.category);
        self.state.team_mut(side).takeover = None;
        self.emit(
            Audience::All,
            EventPayload::TakeoverEnded {
                side,
                category: takeover.category,
            },
        );
        if on_current_slot {
            self.announce_turn(side);
        }
        self.fill_questions(at);
        Ok(ActionOutcome::Ack)
    }
}
