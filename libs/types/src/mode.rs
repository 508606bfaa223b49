//! Game modes, match types and team sides

use serde::{Deserialize, Serialize};
use std::fmt;

/// Arena game mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// 1v1, both players answer their own question stream
    Duel,
    #[serde(rename = "2v2")]
    TwoVTwo,
    #[serde(rename = "3v3")]
    ThreeVThree,
    #[serde(rename = "4v4")]
    FourVFour,
    #[serde(rename = "5v5")]
    FiveVFive,
}

impl GameMode {
    /// Number of seats per side
    pub fn team_size(&self) -> usize {
        match self {
            GameMode::Duel => 1,
            GameMode::TwoVTwo => 2,
            GameMode::ThreeVThree => 3,
            GameMode::FourVFour => 4,
            GameMode::FiveVFive => 5,
        }
    }

    /// Team modes are played as relays with a strategy phase
    pub fn is_team(&self) -> bool {
        !matches!(self, GameMode::Duel)
    }

    pub fn all() -> [GameMode; 5] {
        [
            GameMode::Duel,
            GameMode::TwoVTwo,
            GameMode::ThreeVThree,
            GameMode::FourVFour,
            GameMode::FiveVFive,
        ]
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::Duel => write!(f, "duel"),
            other => write!(f, "{}v{}", other.team_size(), other.team_size()),
        }
    }
}

/// Whether the match affects ratings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Ranked,
    Casual,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Ranked => write!(f, "ranked"),
            MatchType::Casual => write!(f, "casual"),
        }
    }
}

/// Identifies one matchmaking queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueKey {
    pub mode: GameMode,
    pub match_type: MatchType,
}

impl QueueKey {
    pub fn new(mode: GameMode, match_type: MatchType) -> Self {
        Self { mode, match_type }
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.mode, self.match_type)
    }
}

/// One of the two sides of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    pub fn both() -> [Side; 2] {
        [Side::A, Side::B]
    }
}
