//! Synthetic opponent play
//!
//! A bot's answer to a question is planned the moment the question is
//! issued: when it answers and whether it is right. Plans are seeded from
//! the match seed, question and bot, so replays and restored matches agree.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use types::ids::PlayerId;
use types::participant::DifficultyProfile;

use crate::questions::mix;

/// Fastest a bot ever answers
const MIN_ANSWER_MS: i64 = 400;

/// When and how a bot answers the pending question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotPlan {
    pub bot: PlayerId,
    pub answer_at: i64,
    pub correct: bool,
}

pub fn plan_answer(
    difficulty: &DifficultyProfile,
    seed: u64,
    question_id: u64,
    bot: PlayerId,
    issued_at: i64,
) -> BotPlan {
    let (hi, lo) = bot.as_uuid().as_u64_pair();
    let mut rng = ChaCha8Rng::seed_from_u64(mix(mix(seed, question_id), hi ^ lo));

    let correct = rng.gen_bool(difficulty.accuracy.clamp(0.0, 1.0));
    let jitter = difficulty.jitter_ms as i64;
    let spread = if jitter > 0 { rng.gen_range(-jitter..=jitter) } else { 0 };
    let delay = (difficulty.mean_answer_ms as i64 + spread).max(MIN_ANSWER_MS);

    BotPlan {
        bot,
        answer_at: issued_at + delay,
        correct,
    }
}

/// Value a bot submits for its plan
pub fn submitted_value(plan: &BotPlan, answer: i32) -> i32 {
    if plan.correct {
        answer
    } else {
        answer.wrapping_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(accuracy: f64) -> DifficultyProfile {
        DifficultyProfile {
            accuracy,
            mean_answer_ms: 3_000,
            jitter_ms: 750,
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        let bot = PlayerId::new();
        let a = plan_answer(&profile(0.8), 11, 3, bot, 1_000);
        let b = plan_answer(&profile(0.8), 11, 3, bot, 1_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_plan_timing_within_jitter() {
        let bot = PlayerId::new();
        for q in 0..200 {
            let plan = plan_answer(&profile(0.8), 5, q, bot, 0);
            assert!(plan.answer_at >= 2_250 && plan.answer_at <= 3_750);
        }
    }

    #[test]
    fn test_accuracy_extremes() {
        let bot = PlayerId::new();
        for q in 0..50 {
            assert!(plan_answer(&profile(1.0), 1, q, bot, 0).correct);
            assert!(!plan_answer(&profile(0.0), 1, q, bot, 0).correct);
        }
    }

    #[test]
    fn test_submitted_value() {
        let bot = PlayerId::new();
        let right = BotPlan { bot, answer_at: 0, correct: true };
        let wrong = BotPlan { bot, answer_at: 0, correct: false };
        assert_eq!(submitted_value(&right, 42), 42);
        assert_ne!(submitted_value(&wrong, 42), 42);
    }
}
