//! Question generation
//!
//! Each question is derived from the match seed and its sequence number
//! alone, so a restored match keeps producing the same questions without
//! persisting RNG state.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use types::question::{OperationCategory, Operator, Question};

/// Operand range band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Easy,
    Medium,
    Hard,
}

impl Band {
    /// Band for the average starting rating of a match
    pub fn for_rating(rating: i32) -> Self {
        match rating {
            r if r < 1400 => Band::Easy,
            r if r < 1900 => Band::Medium,
            _ => Band::Hard,
        }
    }

    fn additive(&self) -> (i32, i32) {
        match self {
            Band::Easy => (1, 20),
            Band::Medium => (10, 99),
            Band::Hard => (100, 999),
        }
    }

    /// (factor range, other factor range)
    fn multiplicative(&self) -> ((i32, i32), (i32, i32)) {
        match self {
            Band::Easy => ((2, 9), (2, 9)),
            Band::Medium => ((2, 12), (2, 12)),
            Band::Hard => ((6, 25), (3, 15)),
        }
    }
}

pub(crate) fn mix(seed: u64, salt: u64) -> u64 {
    seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(29)
}

/// Stateless question source for one match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionGenerator {
    seed: u64,
    band: Band,
}

impl QuestionGenerator {
    pub fn new(seed: u64, band: Band) -> Self {
        Self { seed, band }
    }

    pub fn band(&self) -> Band {
        self.band
    }

    /// Question number `id` in the given category
    pub fn generate(&self, id: u64, category: OperationCategory) -> Question {
        let mut rng = ChaCha8Rng::seed_from_u64(mix(self.seed, id));
        let operator = match category {
            OperationCategory::Addition => Operator::Add,
            OperationCategory::Subtraction => Operator::Sub,
            OperationCategory::Multiplication => Operator::Mul,
            OperationCategory::Division => Operator::Div,
            OperationCategory::Mixed => {
                [Operator::Add, Operator::Sub, Operator::Mul, Operator::Div][rng.gen_range(0..4)]
            }
        };

        let (left, right) = match operator {
            Operator::Add => {
                let (lo, hi) = self.band.additive();
                (rng.gen_range(lo..=hi), rng.gen_range(lo..=hi))
            }
            Operator::Sub => {
                let (lo, hi) = self.band.additive();
                let a = rng.gen_range(lo..=hi);
                let b = rng.gen_range(lo..=hi);
                // Non-negative results only
                (a.max(b), a.min(b))
            }
            Operator::Mul => {
                let ((alo, ahi), (blo, bhi)) = self.band.multiplicative();
                (rng.gen_range(alo..=ahi), rng.gen_range(blo..=bhi))
            }
            Operator::Div => {
                let ((alo, ahi), (blo, bhi)) = self.band.multiplicative();
                let quotient = rng.gen_range(alo..=ahi);
                let divisor = rng.gen_range(blo..=bhi);
                (quotient * divisor, divisor)
            }
        };

        // Operand ranges keep every operator in range and division exact
        let answer = operator.apply(left, right).unwrap_or_default();
        Question {
            id,
            category,
            left,
            right,
            operator,
            answer,
        }
    }
}
