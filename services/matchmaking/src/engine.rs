//! Matchmaker core
//!
//! Synchronous owner of every rating queue and pending offer. The async
//! [`crate::service::QueueService`] drives it from a single task, so each
//! call here is one serialized step and a scan never sees a half-inserted
//! entry.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use types::errors::QueueError;
use types::ids::{EntrantId, MatchId, PlayerId};
use types::mode::{MatchType, QueueKey};
use types::participant::PartyMember;

use crate::book::RatingQueue;
use crate::bots;
use crate::config::QueueConfig;
use crate::entry::{party_rating, validate_party, EntryState, JoinRequest, QueueEntry};
use crate::events::{LeaveReason, MatchmakingEvent};
use crate::offer::{MatchFound, MatchOffer, OfferId, Opponent};
use crate::pairing::find_pairs;

/// Where an entrant currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Queued(QueueKey),
    Offered(OfferId),
}

/// Matchmaking state for all queue keys
pub struct Matchmaker {
    config: QueueConfig,
    queues: BTreeMap<QueueKey, RatingQueue>,
    index: HashMap<EntrantId, Location>,
    members: HashMap<PlayerId, EntrantId>,
    offers: BTreeMap<OfferId, MatchOffer>,
    next_seq: u64,
    next_offer: OfferId,
    rng: ChaCha8Rng,
}

impl Matchmaker {
    pub fn new(config: QueueConfig) -> Self {
        let rng = match config.bot_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            queues: BTreeMap::new(),
            index: HashMap::new(),
            members: HashMap::new(),
            offers: BTreeMap::new(),
            next_seq: 1,
            next_offer: 1,
            rng,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    // ── Admission ───────────────────────────────────────────────────────

    /// Validate and insert a new entry
    pub fn join(&mut self, request: JoinRequest, now: i64) -> Result<QueueEntry, QueueError> {
        if self.index.contains_key(&request.entrant) {
            return Err(QueueError::AlreadyQueued {
                entrant: request.entrant.to_string(),
            });
        }
        validate_party(&request.key, &request.members)?;
        if let Some(member) = request.members.iter().find(|m| self.members.contains_key(&m.id())) {
            return Err(QueueError::AlreadyQueued {
                entrant: member.id().to_string(),
            });
        }

        let entry = QueueEntry {
            entrant: request.entrant,
            key: request.key,
            rating: party_rating(&request.members),
            joined_at: now,
            members: request.members,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.admit(entry.clone());

        info!(
            entrant = %entry.entrant,
            queue = %entry.key,
            rating = entry.rating,
            "Entrant queued"
        );
        Ok(entry)
    }

    fn admit(&mut self, entry: QueueEntry) {
        for id in entry.member_ids() {
            self.members.insert(id, entry.entrant);
        }
        self.index.insert(entry.entrant, Location::Queued(entry.key));
        self.queues
            .entry(entry.key)
            .or_insert_with(|| RatingQueue::new(entry.key))
            .insert(entry);
    }

    fn forget(&mut self, entry: &QueueEntry) {
        self.index.remove(&entry.entrant);
        for id in entry.member_ids() {
            self.members.remove(&id);
        }
    }

    // ── Leaving ─────────────────────────────────────────────────────────

    /// Remove an entrant from its queue or pending offer.
    ///
    /// Leaving during an offer cancels the offer; the other side goes back
    /// into its queue with its original join time.
    pub fn leave(&mut self, entrant: &EntrantId, reason: LeaveReason) -> Result<Vec<MatchmakingEvent>, QueueError> {
        let location = self.index.get(entrant).copied().ok_or(QueueError::NotQueued)?;
        let mut events = Vec::new();

        match location {
            Location::Queued(key) => {
                let entry = self
                    .queues
                    .get_mut(&key)
                    .and_then(|q| q.remove(entrant))
                    .ok_or(QueueError::NotQueued)?;
                self.forget(&entry);
            }
            Location::Offered(offer_id) => {
                let offer = self.offers.remove(&offer_id).ok_or(QueueError::NotQueued)?;
                let mut requeued = Vec::new();
                let mut sides = vec![offer.entry];
                if let Opponent::Entry { entry } = offer.opponent {
                    sides.push(entry);
                }
                for side in sides {
                    self.forget(&side);
                    if &side.entrant != entrant {
                        requeued.push(side.entrant);
                        self.admit(side);
                    }
                }
                info!(offer_id, left = %entrant, "Offer cancelled before delivery");
                events.push(MatchmakingEvent::OfferCancelled {
                    offer_id,
                    left: *entrant,
                    requeued,
                });
            }
        }

        debug!(entrant = %entrant, ?reason, "Entrant left matchmaking");
        events.push(MatchmakingEvent::Left {
            entrant: *entrant,
            reason,
        });
        Ok(events)
    }

    /// Leave on behalf of a player, whichever entry they belong to
    pub fn leave_player(&mut self, player: &PlayerId, reason: LeaveReason) -> Result<Vec<MatchmakingEvent>, QueueError> {
        let entrant = self.members.get(player).copied().ok_or(QueueError::NotQueued)?;
        self.leave(&entrant, reason)
    }

    // ── Matching pass ───────────────────────────────────────────────────

    /// Run one matching pass, then deliver any offers that are due
    pub fn scan(&mut self, now: i64) -> Vec<MatchmakingEvent> {
        let mut events = Vec::new();
        let keys: Vec<QueueKey> = self.queues.keys().copied().collect();

        for key in keys {
            let pairs = match self.queues.get(&key) {
                Some(queue) => find_pairs(queue, now, &self.config),
                None => continue,
            };
            for (a, b) in pairs {
                let taken = self
                    .queues
                    .get_mut(&key)
                    .map(|q| (q.remove(&a), q.remove(&b)));
                if let Some((Some(entry), Some(opponent))) = taken {
                    let deliver_at = now + self.config.offer_delay_ms;
                    events.push(self.open_offer(key, entry, Opponent::Entry { entry: opponent }, now, deliver_at));
                }
            }
            self.handle_stale(key, now, &mut events);
        }

        events.extend(self.deliver_due(now));
        events
    }

    /// Bot fallback or expiry for entries left unpaired
    fn handle_stale(&mut self, key: QueueKey, now: i64, events: &mut Vec<MatchmakingEvent>) {
        let fallback = self.config.bot_fallback_ms(key.match_type);
        let stale: Vec<EntrantId> = match self.queues.get(&key) {
            Some(queue) => queue
                .oldest_first()
                .into_iter()
                .filter(|e| match fallback {
                    Some(after) => e.waited_ms(now) >= after,
                    None => e.waited_ms(now) >= self.config.queue_timeout_ms,
                })
                .map(|e| e.entrant)
                .collect(),
            None => return,
        };

        for entrant in stale {
            let Some(entry) = self.queues.get_mut(&key).and_then(|q| q.remove(&entrant)) else {
                continue;
            };
            if fallback.is_some() {
                let bots = bots::synthesize_team(
                    &mut self.rng,
                    key.mode.team_size(),
                    entry.rating,
                    self.config.bot_rating_spread,
                );
                info!(entrant = %entrant, queue = %key, "No opponent found, falling back to bots");
                events.push(self.open_offer(key, entry, Opponent::Bots { members: bots }, now, now));
            } else {
                self.forget(&entry);
                info!(entrant = %entrant, queue = %key, "Queue entry expired");
                events.push(MatchmakingEvent::Expired { entrant, key });
            }
        }
    }

    fn open_offer(
        &mut self,
        key: QueueKey,
        entry: QueueEntry,
        opponent: Opponent,
        now: i64,
        deliver_at: i64,
    ) -> MatchmakingEvent {
        let id = self.next_offer;
        self.next_offer += 1;
        let offer = MatchOffer {
            id,
            key,
            entry,
            opponent,
            created_at: now,
            deliver_at,
        };
        let entrants = offer.entrants();
        for entrant in &entrants {
            self.index.insert(*entrant, Location::Offered(id));
        }
        debug!(offer_id = id, queue = %key, vs_bots = offer.vs_bots(), "Offer created");
        self.offers.insert(id, offer);
        MatchmakingEvent::OfferCreated {
            offer_id: id,
            entrants,
            deliver_at,
        }
    }

    // ── Delivery ────────────────────────────────────────────────────────

    /// Turn due offers into matches
    pub fn deliver_due(&mut self, now: i64) -> Vec<MatchmakingEvent> {
        let due: Vec<OfferId> = self
            .offers
            .values()
            .filter(|o| o.is_due(now))
            .map(|o| o.id)
            .collect();

        let mut events = Vec::new();
        for id in due {
            if let Some(offer) = self.offers.remove(&id) {
                let found = self.into_match(offer, now);
                info!(
                    match_id = %found.match_id,
                    queue = %found.key,
                    vs_bots = found.vs_bots,
                    "Match found"
                );
                events.push(MatchmakingEvent::MatchFound(found));
            }
        }
        events
    }

    fn into_match(&mut self, offer: MatchOffer, now: i64) -> MatchFound {
        let entrants = offer.entrants();
        let vs_bots = offer.vs_bots();
        let key = offer.key;

        self.forget(&offer.entry);
        let side_a = self.seat_team(key, &offer.entry);
        let side_b = match offer.opponent {
            Opponent::Entry { entry } => {
                self.forget(&entry);
                self.seat_team(key, &entry)
            }
            Opponent::Bots { members } => members,
        };

        MatchFound {
            match_id: MatchId::new(),
            key,
            teams: [side_a, side_b],
            entrants,
            vs_bots,
            found_at: now,
        }
    }

    /// Casual partial parties get bot teammates; ranked parties are already full
    fn seat_team(&mut self, key: QueueKey, entry: &QueueEntry) -> Vec<PartyMember> {
        let size = key.mode.team_size();
        if key.match_type == MatchType::Casual && entry.members.len() < size {
            bots::fill_with_bots(&mut self.rng, &entry.members, size, entry.rating, self.config.bot_rating_spread)
        } else {
            entry.members.clone()
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Earliest offer delivery time
    pub fn next_deadline(&self) -> Option<i64> {
        self.offers.values().map(|o| o.deliver_at).min()
    }

    pub fn state_of(&self, entrant: &EntrantId) -> EntryState {
        match self.index.get(entrant) {
            Some(Location::Queued(_)) => EntryState::Queued,
            Some(Location::Offered(_)) => EntryState::Offered,
            None => EntryState::Idle,
        }
    }

    pub fn entrant_of(&self, player: &PlayerId) -> Option<EntrantId> {
        self.members.get(player).copied()
    }

    pub fn queued_count(&self, key: &QueueKey) -> usize {
        self.queues.get(key).map(|q| q.len()).unwrap_or(0)
    }

    /// Number of queues holding `entrant` (0 or 1)
    pub fn queues_containing(&self, entrant: &EntrantId) -> usize {
        self.queues.values().filter(|q| q.contains(entrant)).count()
    }

    pub fn pending_offers(&self) -> usize {
        self.offers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::PartyId;
    use types::mode::GameMode;
    use types::participant::{PartyRole, PlayerProfile};

    fn human(rating: i32) -> PartyMember {
        PartyMember::human(PlayerProfile::new(PlayerId::new(), "p", rating))
    }

    fn solo(key: QueueKey, rating: i32) -> JoinRequest {
        let m = human(rating);
        JoinRequest {
            entrant: EntrantId::Player(m.id()),
            key,
            members: vec![m],
        }
    }

    fn duel(mt: MatchType) -> QueueKey {
        QueueKey::new(GameMode::Duel, mt)
    }

    fn seeded(config: QueueConfig) -> Matchmaker {
        Matchmaker::new(QueueConfig {
            bot_seed: Some(9),
            ..config
        })
    }

    fn found(events: &[MatchmakingEvent]) -> Vec<&MatchFound> {
        events
            .iter()
            .filter_map(|e| match e {
                MatchmakingEvent::MatchFound(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_join_twice_rejected() {
        let mut mm = seeded(QueueConfig::default());
        let req = solo(duel(MatchType::Ranked), 1500);
        mm.join(req.clone(), 0).unwrap();
        let err = mm.join(req.clone(), 1).unwrap_err();
        assert_eq!(err.reason_code(), "already_queued");

        // Same player in a different queue is also refused
        let other = JoinRequest {
            key: duel(MatchType::Casual),
            ..req
        };
        assert!(mm.join(other, 2).is_err());
    }

    #[test]
    fn test_member_cannot_be_in_two_parties() {
        let mut mm = seeded(QueueConfig::default());
        let shared = human(1500);
        let key = QueueKey::new(GameMode::TwoVTwo, MatchType::Casual);
        mm.join(
            JoinRequest {
                entrant: EntrantId::Party(PartyId::new()),
                key,
                members: vec![shared.clone(), human(1500)],
            },
            0,
        )
        .unwrap();
        let err = mm
            .join(
                JoinRequest {
                    entrant: EntrantId::Party(PartyId::new()),
                    key,
                    members: vec![shared, human(1500)],
                },
                0,
            )
            .unwrap_err();
        assert_eq!(err.reason_code(), "already_queued");
    }

    #[test]
    fn test_pair_then_deliver_after_delay() {
        let mut mm = seeded(QueueConfig::default());
        let key = duel(MatchType::Ranked);
        let a = mm.join(solo(key, 1500), 0).unwrap();
        let b = mm.join(solo(key, 1550), 0).unwrap();

        let events = mm.scan(1_000);
        assert!(matches!(events[0], MatchmakingEvent::OfferCreated { .. }));
        assert!(found(&events).is_empty());
        assert_eq!(mm.state_of(&a.entrant), EntryState::Offered);
        assert_eq!(mm.next_deadline(), Some(4_000));

        let events = mm.scan(4_000);
        let matches = found(&events);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].teams[0].len(), 1);
        assert!(matches[0].entrants.contains(&b.entrant));
        assert_eq!(mm.state_of(&a.entrant), EntryState::Idle);
        assert_eq!(mm.pending_offers(), 0);
    }

    #[test]
    fn test_leave_cancels_offer_and_requeues_other() {
        let mut mm = seeded(QueueConfig::default());
        let key = duel(MatchType::Ranked);
        let a = mm.join(solo(key, 1500), 0).unwrap();
        let b = mm.join(solo(key, 1520), 500).unwrap();
        mm.scan(1_000);

        let events = mm.leave(&a.entrant, LeaveReason::Requested).unwrap();
        assert!(matches!(
            &events[0],
            MatchmakingEvent::OfferCancelled { requeued, .. } if requeued == &vec![b.entrant]
        ));
        assert_eq!(mm.state_of(&a.entrant), EntryState::Idle);
        assert_eq!(mm.state_of(&b.entrant), EntryState::Queued);
        assert_eq!(mm.pending_offers(), 0);

        // Nothing is ever delivered to the leaver
        let later = mm.scan(10_000);
        assert!(found(&later).is_empty());
    }

    #[test]
    fn test_requeued_entry_keeps_join_time() {
        let mut mm = seeded(QueueConfig::humans_only());
        let key = duel(MatchType::Ranked);
        let a = mm.join(solo(key, 1500), 0).unwrap();
        let b = mm.join(solo(key, 1510), 0).unwrap();
        mm.scan(1_000);
        mm.leave(&a.entrant, LeaveReason::Disconnected).unwrap();
        // Expires against its original join time
        let events = mm.scan(180_000);
        assert!(events.iter().any(|e| matches!(e, MatchmakingEvent::Expired { entrant, .. } if *entrant == b.entrant)));
    }

    #[test]
    fn test_bot_fallback_after_timeout() {
        let mut mm = seeded(QueueConfig::default());
        let key = duel(MatchType::Casual);
        let a = mm.join(solo(key, 1500), 0).unwrap();

        assert!(mm.scan(29_999).is_empty());
        let events = mm.scan(30_000);
        let matches = found(&events);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].vs_bots);
        assert!(matches[0].teams[1][0].participant.is_bot());
        assert_eq!(mm.state_of(&a.entrant), EntryState::Idle);
    }

    #[test]
    fn test_ranked_fallback_is_longer() {
        let mut mm = seeded(QueueConfig::default());
        let key = duel(MatchType::Ranked);
        mm.join(solo(key, 1500), 0).unwrap();
        assert!(found(&mm.scan(30_000)).is_empty());
        assert_eq!(found(&mm.scan(60_000)).len(), 1);
    }

    #[test]
    fn test_expiry_without_fallback() {
        let mut mm = seeded(QueueConfig::humans_only());
        let key = duel(MatchType::Ranked);
        let a = mm.join(solo(key, 1500), 0).unwrap();
        assert!(mm.scan(179_999).is_empty());
        let events = mm.scan(180_000);
        assert_eq!(events, vec![MatchmakingEvent::Expired { entrant: a.entrant, key }]);
        assert_eq!(mm.state_of(&a.entrant), EntryState::Idle);
    }

    #[test]
    fn test_queue_keys_never_cross() {
        let mut mm = seeded(QueueConfig::humans_only());
        mm.join(solo(duel(MatchType::Ranked), 1500), 0).unwrap();
        mm.join(solo(duel(MatchType::Casual), 1500), 0).unwrap();
        assert!(mm.scan(1_000).is_empty());
    }

    #[test]
    fn test_casual_partial_party_filled() {
        let mut mm = seeded(QueueConfig::default());
        let key = QueueKey::new(GameMode::ThreeVThree, MatchType::Casual);
        let leader = human(1400).with_role(PartyRole::Leader);
        mm.join(
            JoinRequest {
                entrant: EntrantId::Party(PartyId::new()),
                key,
                members: vec![leader, human(1400)],
            },
            0,
        )
        .unwrap();
        let events = mm.scan(30_000);
        let matches = found(&events);
        assert_eq!(matches[0].teams[0].len(), 3);
        assert_eq!(matches[0].teams[1].len(), 3);
        assert_eq!(matches[0].human_players().len(), 2);
    }

    #[test]
    fn test_leave_player_resolves_party() {
        let mut mm = seeded(QueueConfig::default());
        let key = QueueKey::new(GameMode::TwoVTwo, MatchType::Casual);
        let m = human(1300);
        let pid = m.id();
        let party = EntrantId::Party(PartyId::new());
        mm.join(
            JoinRequest {
                entrant: party,
                key,
                members: vec![m, human(1300)],
            },
            0,
        )
        .unwrap();
        assert_eq!(mm.entrant_of(&pid), Some(party));
        mm.leave_player(&pid, LeaveReason::PartyDisbanded).unwrap();
        assert_eq!(mm.queued_count(&key), 0);
        assert!(mm.leave(&party, LeaveReason::Requested).is_err());
    }
}
