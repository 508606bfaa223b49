//! Presence: joining, disconnects, reconnection, abandonment, and the
//! integrity policy

use tracing::{info, warn};
use types::errors::ActionError;
use types::ids::PlayerId;
use types::mode::{MatchType, Side};
use types::outcome::WinReason;

use super::MatchMachine;
use crate::actions::ActionOutcome;
use crate::events::{Audience, EventPayload};
use crate::integrity::LinkState;
use crate::phase::Phase;
use crate::state::ConnectionStatus;

impl MatchMachine {
    pub(super) fn join(&mut self, player: PlayerId, at: i64) -> Result<ActionOutcome, ActionError> {
        let connection = self.connection_of(player)?;
        match connection {
            ConnectionStatus::Pending => {}
            ConnectionStatus::Connected => return Err(ActionError::AlreadyConnected),
            ConnectionStatus::Disconnected { .. } => return self.reconnect(player, at),
            ConnectionStatus::Abandoned { .. } => return Err(ActionError::ReconnectWindowClosed),
        }
        self.set_connection(player, ConnectionStatus::Connected);
        info!(match_id = %self.state.match_id, player_id = %player, "Player joined");
        self.emit(Audience::All, EventPayload::PlayerJoined { player_id: player });

        let everyone_here = self
            .state
            .players
            .values()
            .all(|p| p.connection != ConnectionStatus::Pending);
        if self.state.phase == Phase::Waiting && everyone_here {
            self.begin(at);
        }
        Ok(ActionOutcome::Ack)
    }

    pub(super) fn disconnect(&mut self, player: PlayerId, at: i64) -> Result<ActionOutcome, ActionError> {
        match self.connection_of(player)? {
            ConnectionStatus::Connected => {}
            ConnectionStatus::Abandoned { .. } => return Err(ActionError::ReconnectWindowClosed),
            _ => return Err(ActionError::Disconnected),
        }
        // Only presence changes; score, streak and any question are kept
        self.set_connection(player, ConnectionStatus::Disconnected { since: at });
        info!(match_id = %self.state.match_id, player_id = %player, "Player disconnected");
        self.emit(Audience::All, EventPayload::PlayerDisconnected { player_id: player });
        Ok(ActionOutcome::Ack)
    }

    pub(super) fn reconnect(&mut self, player: PlayerId, at: i64) -> Result<ActionOutcome, ActionError> {
        match self.connection_of(player)? {
            ConnectionStatus::Connected => return Err(ActionError::AlreadyConnected),
            ConnectionStatus::Abandoned { .. } => return Err(ActionError::ReconnectWindowClosed),
            ConnectionStatus::Disconnected { since } if at - since >= self.config.reconnect_grace_ms => {
                return Err(ActionError::ReconnectWindowClosed)
            }
            ConnectionStatus::Pending => return self.join(player, at),
            // Play is over; the result screen is not rejoinable
            ConnectionStatus::Disconnected { .. } if self.state.phase == Phase::PostMatch => {
                return Err(ActionError::ReconnectWindowClosed)
            }
            ConnectionStatus::Disconnected { .. } => {}
        }
        let side = self.side_of(player)?;
        self.set_connection(player, ConnectionStatus::Connected);

        // An in-flight question survives only while it is still answerable
        if self.state.is_team() {
            if self.state.active_player(side) == Some(player) {
                let team = self.state.team_mut(side);
                if team.pending.as_ref().map_or(false, |q| q.is_expired(at)) {
                    team.pending = None;
                }
            }
        } else if let Some(p) = self.state.players.get_mut(&player) {
            if p.pending.as_ref().map_or(false, |q| q.is_expired(at)) {
                p.pending = None;
            }
        }

        info!(match_id = %self.state.match_id, player_id = %player, "Player reconnected");
        self.emit(Audience::All, EventPayload::PlayerReconnected { player_id: player });
        self.fill_questions(at);

        let snapshot = self.snapshot_for(player);
        self.emit(Audience::Player(player), EventPayload::Snapshot(snapshot.clone()));
        Ok(ActionOutcome::Resynced(Box::new(snapshot)))
    }

    /// Grace window ran out for a disconnected player
    pub(super) fn abandon(&mut self, player: PlayerId, at: i64) {
        let side = match self.state.players.get(&player) {
            Some(p) if matches!(p.connection, ConnectionStatus::Disconnected { .. }) => p.side,
            _ => return,
        };
        self.set_connection(player, ConnectionStatus::Abandoned { at });
        warn!(match_id = %self.state.match_id, player_id = %player, "Player abandoned the match");
        self.emit(Audience::All, EventPayload::PlayerAbandoned { player_id: player });

        // A team plays on while any of its humans may still come back
        let (any_human, all_gone) = {
            let mut humans = self.state.humans_on(side).peekable();
            let any_human = humans.peek().is_some();
            (any_human, humans.all(|p| matches!(p.connection, ConnectionStatus::Abandoned { .. })))
        };
        if !self.state.is_team() || (any_human && all_gone) {
            self.forfeit(side, WinReason::Abandonment, at);
        }
    }

    /// Sustained red (or recovery) reported by the integrity monitor
    pub(super) fn integrity_alert(
        &mut self,
        player: PlayerId,
        level: LinkState,
        at: i64,
    ) -> Result<ActionOutcome, ActionError> {
        let side = self.side_of(player)?;
        if level == LinkState::Red {
            self.state.red_players.insert(player);
        } else {
            self.state.red_players.remove(&player);
        }
        self.emit(
            Audience::All,
            EventPayload::IntegrityAlert {
                player_id: player,
                side,
                level,
            },
        );
        if level != LinkState::Red || self.state.phase == Phase::PostMatch {
            return Ok(ActionOutcome::Ack);
        }

        warn!(match_id = %self.state.match_id, player_id = %player, side = ?side, "Integrity alert");
        let red_on = |s: Side| {
            self.state
                .red_players
                .iter()
                .any(|p| self.state.players.get(p).map_or(false, |p| p.side == s))
        };
        let both_sides = red_on(Side::A) && red_on(Side::B);
        let early = match self.state.active_started_at {
            None => true,
            Some(started) => at - started < self.config.integrity_void_window_ms,
        };

        if both_sides {
            self.void("integrity: both sides degraded", at);
        } else if early {
            self.void("integrity: degraded connection at match start", at);
        } else if self.state.match_type == MatchType::Ranked {
            self.forfeit(side, WinReason::Integrity, at);
        }
        Ok(ActionOutcome::Ack)
    }

    fn connection_of(&self, player: PlayerId) -> Result<ConnectionStatus, ActionError> {
        self.state
            .players
            .get(&player)
            .map(|p| p.connection)
            .ok_or(ActionError::NotAMember)
    }

    fn set_connection(&mut self, player: PlayerId, connection: ConnectionStatus) {
        if let Some(p) = self.state.players.get_mut(&player) {
            p.connection = connection;
        }
    }
}
