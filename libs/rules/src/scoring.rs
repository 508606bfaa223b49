//! Scoring: per-answer points and the match tiebreak cascade
//!
//! Ratios are compared as fixed-point `Decimal` values rounded to a fixed
//! number of places, so two teams that differ only by floating-point noise
//! tie at that step and fall through to the next one.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use types::mode::Side;
use types::outcome::{TeamLine, WinReason};

/// Points for any correct answer.
pub const BASE_POINTS: u32 = 100;

/// Extra points per streak step already built.
pub const STREAK_BONUS: u32 = 5;

/// Accuracy comparison precision (decimal places).
const ACCURACY_DP: u32 = 4;

/// Average latency comparison precision, milliseconds.
const LATENCY_DP: u32 = 1;

// ── Per-answer scoring ──────────────────────────────────────────────────

/// Result of scoring one answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerScore {
    pub points: u32,
    pub new_streak: u32,
}

pub fn score_answer(correct: bool, current_streak: u32) -> AnswerScore {
    if correct {
        AnswerScore {
            points: BASE_POINTS + current_streak.saturating_mul(STREAK_BONUS),
            new_streak: current_streak.saturating_add(1),
        }
    } else {
        AnswerScore {
            points: 0,
            new_streak: 0,
        }
    }
}

// ── Tiebreak cascade ────────────────────────────────────────────────────

/// Cascade step that separated the teams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidedBy {
    Score,
    Accuracy,
    Speed,
    Streak,
    Correct,
    Draw,
}

impl DecidedBy {
    /// Win reason for a decided match, `None` for a draw
    pub fn win_reason(&self) -> Option<WinReason> {
        match self {
            DecidedBy::Score => Some(WinReason::Score),
            DecidedBy::Accuracy => Some(WinReason::Accuracy),
            DecidedBy::Speed => Some(WinReason::Speed),
            DecidedBy::Streak => Some(WinReason::Streak),
            DecidedBy::Correct => Some(WinReason::Correct),
            DecidedBy::Draw => None,
        }
    }
}

/// Winner decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub winner: Option<Side>,
    pub decided_by: DecidedBy,
}

fn rounded(value: f64, dp: u32) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO).round_dp(dp)
}

/// Apply the cascade: score, accuracy, lower speed, max streak, correct, draw.
pub fn decide_winner(a: &TeamLine, b: &TeamLine) -> Decision {
    let steps: [(DecidedBy, Ordering); 5] = [
        (DecidedBy::Score, a.score.cmp(&b.score)),
        (
            DecidedBy::Accuracy,
            rounded(a.accuracy, ACCURACY_DP).cmp(&rounded(b.accuracy, ACCURACY_DP)),
        ),
        // Lower average latency is better, so compare reversed
        (
            DecidedBy::Speed,
            rounded(b.avg_latency_ms, LATENCY_DP).cmp(&rounded(a.avg_latency_ms, LATENCY_DP)),
        ),
        (DecidedBy::Streak, a.max_streak.cmp(&b.max_streak)),
        (DecidedBy::Correct, a.correct.cmp(&b.correct)),
    ];

    for (step, ordering) in steps {
        match ordering {
            Ordering::Greater => {
                return Decision {
                    winner: Some(a.side),
                    decided_by: step,
                }
            }
            Ordering::Less => {
                return Decision {
                    winner: Some(b.side),
                    decided_by: step,
                }
            }
            Ordering::Equal => continue,
        }
    }

    Decision {
        winner: None,
        decided_by: DecidedBy::Draw,
    }
}
