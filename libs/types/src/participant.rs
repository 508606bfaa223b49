//! Participants: human players and synthetic opponents
//!
//! A match seat is either a `Human` carrying the profile snapshot taken at
//! queue-join time, or a `Bot` carrying its difficulty profile. Gameplay code
//! goes through the shared accessors and never inspects an `is_bot` flag on a
//! loosely-typed record.

use crate::ids::PlayerId;
use serde::{Deserialize, Serialize};

/// Equipped cosmetic items, opaque keys owned by the inventory subsystem
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cosmetics {
    pub title: Option<String>,
    pub avatar: Option<String>,
    pub banner: Option<String>,
    pub badge: Option<String>,
}

/// Read-only snapshot of a player's profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player_id: PlayerId,
    pub display_name: String,
    pub rating: i32,
    pub level: u32,
    pub equipped: Cosmetics,
}

impl PlayerProfile {
    pub fn new(player_id: PlayerId, display_name: impl Into<String>, rating: i32) -> Self {
        Self {
            player_id,
            display_name: display_name.into(),
            rating,
            level: 1,
            equipped: Cosmetics::default(),
        }
    }
}

/// How a synthetic opponent plays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    /// Probability of answering correctly, 0.0..=1.0
    pub accuracy: f64,
    /// Mean time to answer in milliseconds
    pub mean_answer_ms: u32,
    /// Uniform spread around the mean in milliseconds
    pub jitter_ms: u32,
}

/// Synthetic opponent description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotProfile {
    pub player_id: PlayerId,
    pub display_name: String,
    pub rating: i32,
    pub difficulty: DifficultyProfile,
}

/// A seat in a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Participant {
    Human(PlayerProfile),
    Bot(BotProfile),
}

impl Participant {
    pub fn id(&self) -> PlayerId {
        match self {
            Participant::Human(p) => p.player_id,
            Participant::Bot(b) => b.player_id,
        }
    }

    pub fn rating(&self) -> i32 {
        match self {
            Participant::Human(p) => p.rating,
            Participant::Bot(b) => b.rating,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Participant::Human(p) => &p.display_name,
            Participant::Bot(b) => &b.display_name,
        }
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, Participant::Bot(_))
    }

    pub fn difficulty(&self) -> Option<&DifficultyProfile> {
        match self {
            Participant::Human(_) => None,
            Participant::Bot(b) => Some(&b.difficulty),
        }
    }

    pub fn equipped(&self) -> Option<&Cosmetics> {
        match self {
            Participant::Human(p) => Some(&p.equipped),
            Participant::Bot(_) => None,
        }
    }
}

/// Role a party member holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    /// Party captain, may open quit votes
    Leader,
    /// In-game leader, assigns relay slots
    Igl,
    /// May call in to take over another slot's turn
    Anchor,
}

/// A member of a queue entry, with any roles they hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyMember {
    pub participant: Participant,
    #[serde(default)]
    pub roles: Vec<PartyRole>,
}

impl PartyMember {
    pub fn human(profile: PlayerProfile) -> Self {
        Self {
            participant: Participant::Human(profile),
            roles: Vec::new(),
        }
    }

    pub fn bot(profile: BotProfile) -> Self {
        Self {
            participant: Participant::Bot(profile),
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: PartyRole) -> Self {
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    pub fn has_role(&self, role: PartyRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn id(&self) -> PlayerId {
        self.participant.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> BotProfile {
        BotProfile {
            player_id: PlayerId::new(),
            display_name: "Calculon".to_string(),
            rating: 1350,
            difficulty: DifficultyProfile {
                accuracy: 0.8,
                mean_answer_ms: 3000,
                jitter_ms: 750,
            },
        }
    }

    #[test]
    fn test_participant_accessors() {
        let profile = PlayerProfile::new(PlayerId::new(), "Ada", 1500);
        let human = Participant::Human(profile.clone());
        assert_eq!(human.id(), profile.player_id);
        assert_eq!(human.rating(), 1500);
        assert!(!human.is_bot());
        assert!(human.difficulty().is_none());

        let bot = Participant::Bot(bot());
        assert!(bot.is_bot());
        assert_eq!(bot.difficulty().unwrap().mean_answer_ms, 3000);
        assert!(bot.equipped().is_none());
    }

    #[test]
    fn test_party_member_roles() {
        let member = PartyMember::human(PlayerProfile::new(PlayerId::new(), "Ada", 1500))
            .with_role(PartyRole::Igl)
            .with_role(PartyRole::Igl)
            .with_role(PartyRole::Leader);
        assert_eq!(member.roles.len(), 2);
        assert!(member.has_role(PartyRole::Leader));
        assert!(!member.has_role(PartyRole::Anchor));
    }

    #[test]
    fn test_participant_serialization_is_tagged() {
        let json = serde_json::to_string(&Participant::Bot(bot())).unwrap();
        assert!(json.contains("\"kind\":\"bot\""));
        let back: Participant = serde_json::from_str(&json).unwrap();
        assert!(back.is_bot());
    }
}
