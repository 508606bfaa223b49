//! Question and operation category types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation category a relay slot is dedicated to
///
/// The declaration order here is the canonical turn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Mixed,
}

impl OperationCategory {
    /// All categories in canonical order
    pub const CANONICAL: [OperationCategory; 5] = [
        OperationCategory::Addition,
        OperationCategory::Subtraction,
        OperationCategory::Multiplication,
        OperationCategory::Division,
        OperationCategory::Mixed,
    ];
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationCategory::Addition => "addition",
            OperationCategory::Subtraction => "subtraction",
            OperationCategory::Multiplication => "multiplication",
            OperationCategory::Division => "division",
            OperationCategory::Mixed => "mixed",
        };
        write!(f, "{}", s)
    }
}

/// Arithmetic operator of a concrete question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '×',
            Operator::Div => '÷',
        }
    }

    /// Evaluate; division is only generated with exact quotients
    pub fn apply(&self, left: i32, right: i32) -> Option<i32> {
        match self {
            Operator::Add => left.checked_add(right),
            Operator::Sub => left.checked_sub(right),
            Operator::Mul => left.checked_mul(right),
            Operator::Div => {
                if right == 0 || left % right != 0 {
                    None
                } else {
                    Some(left / right)
                }
            }
        }
    }
}

/// A generated question, including its answer (server side only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Per-match sequence number
    pub id: u64,
    pub category: OperationCategory,
    pub left: i32,
    pub right: i32,
    pub operator: Operator,
    pub answer: i32,
}

impl Question {
    pub fn is_correct(&self, submitted: i32) -> bool {
        self.answer == submitted
    }

    /// Client-facing view without the answer
    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id,
            category: self.category,
            prompt: format!("{} {} {}", self.left, self.operator.symbol(), self.right),
        }
    }
}

/// What a client is shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: u64,
    pub category: OperationCategory,
    pub prompt: String,
}
