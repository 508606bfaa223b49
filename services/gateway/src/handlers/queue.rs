use crate::auth::AuthenticatedPlayer;
use crate::error::AppError;
use crate::models::{JoinQueueRequest, JoinQueueResponse, QueueStatusResponse};
use crate::rate_limit::QUEUE_REQUESTS;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use matchmaking::{JoinRequest, LeaveReason};
use settlement::{ProfileService, SettlementError};
use tracing::info;
use types::ids::{EntrantId, PlayerId};
use types::mode::QueueKey;
use types::participant::{PartyMember, PlayerProfile};
use types::rating::STARTING_RATING;

/// Profile snapshot for the caller, created on first contact
async fn caller_profile(state: &AppState, player: &AuthenticatedPlayer) -> Result<PlayerProfile, AppError> {
    match state.profiles.snapshot(player.player_id).await {
        Ok(profile) => Ok(profile),
        Err(SettlementError::ProfileNotFound(_)) => {
            let profile = PlayerProfile::new(player.player_id, player.display_name.clone(), STARTING_RATING);
            state.profiles.upsert(profile.clone());
            Ok(profile)
        }
        Err(e) => Err(e.into()),
    }
}

/// The entrant a player is queued under, solo when unknown
fn entrant_of(state: &AppState, player: PlayerId) -> EntrantId {
    state
        .entrants
        .iter()
        .find(|e| e.value().contains(&player))
        .map(|e| *e.key())
        .unwrap_or(EntrantId::Player(player))
}

pub async fn join_queue(
    State(state): State<AppState>,
    player: AuthenticatedPlayer,
    Json(payload): Json<JoinQueueRequest>,
) -> Result<Json<JoinQueueResponse>, AppError> {
    state.rate_limiter.check(player.player_id, &QUEUE_REQUESTS)?;

    if let Some(match_id) = state.registry.match_of(&player.player_id) {
        return Err(AppError::BadRequest(format!("Already playing match {}", match_id)));
    }

    let own = caller_profile(&state, &player).await?;
    let (entrant, members) = match payload.party {
        None => (EntrantId::Player(player.player_id), vec![PartyMember::human(own)]),
        Some(party) => {
            if !party.members.iter().any(|m| m.player_id == player.player_id) {
                return Err(AppError::BadRequest("Caller is not a member of the party".into()));
            }
            let mut members = Vec::with_capacity(party.members.len());
            for request in party.members {
                let profile = if request.player_id == player.player_id {
                    own.clone()
                } else {
                    state.profiles.snapshot(request.player_id).await?
                };
                let member = request
                    .roles
                    .into_iter()
                    .fold(PartyMember::human(profile), |m, role| m.with_role(role));
                members.push(member);
            }
            (EntrantId::Party(party.party_id), members)
        }
    };

    let key = QueueKey::new(payload.mode, payload.match_type);
    let players: Vec<PlayerId> = members.iter().map(|m| m.id()).collect();
    // Registered first so the Queued event finds its players
    let previous = state.entrants.insert(entrant, players);
    let entry = match state.queue.join(JoinRequest { entrant, key, members }).await {
        Ok(entry) => entry,
        Err(e) => {
            match previous {
                Some(players) => state.entrants.insert(entrant, players),
                None => state.entrants.remove(&entrant).map(|(_, p)| p),
            };
            return Err(e.into());
        }
    };

    info!(entrant = %entry.entrant, key = %entry.key, rating = entry.rating, "Joined queue");
    Ok(Json(JoinQueueResponse {
        entrant: entry.entrant,
        key: entry.key,
        rating: entry.rating,
    }))
}

pub async fn leave_queue(State(state): State<AppState>, player: AuthenticatedPlayer) -> Result<StatusCode, AppError> {
    state.rate_limiter.check(player.player_id, &QUEUE_REQUESTS)?;
    state.queue.leave_player(player.player_id, LeaveReason::Requested).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn queue_status(
    State(state): State<AppState>,
    player: AuthenticatedPlayer,
) -> Result<Json<QueueStatusResponse>, AppError> {
    let entrant = entrant_of(&state, player.player_id);
    let entry_state = state.queue.state(entrant).await?;
    Ok(Json(QueueStatusResponse {
        entrant,
        state: entry_state,
    }))
}
