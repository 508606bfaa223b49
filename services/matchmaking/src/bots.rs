//! Synthetic opponent teams
//!
//! Difficulty is a pure function of the target rating; ratings and names are
//! drawn from a seeded `ChaCha8Rng` so a given seed always yields the same
//! team.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use types::ids::PlayerId;
use types::participant::{BotProfile, DifficultyProfile, PartyMember, PartyRole};

const BOT_NAMES: [&str; 12] = [
    "Abacus", "Cosine", "Digit", "Euler", "Fermat", "Gauss", "Hypatia", "Integral", "Lemma", "Modulo",
    "Quotient", "Vector",
];

/// Difficulty for a bot aimed at `rating`
pub fn difficulty_for(rating: i32) -> DifficultyProfile {
    let above_floor = (rating - 1100) as f64;
    let accuracy = (0.55 + above_floor / 3000.0).clamp(0.5, 0.97);
    let mean = (6500.0 - above_floor * 2.5).clamp(1500.0, 6500.0);
    let mean_answer_ms = mean.round() as u32;
    DifficultyProfile {
        accuracy,
        mean_answer_ms,
        jitter_ms: mean_answer_ms / 4,
    }
}

/// Offsets in `[-spread, spread]` whose sum is zero, so the team mean is exact
fn centred_offsets(rng: &mut ChaCha8Rng, size: usize, spread: i32) -> Vec<i32> {
    if size == 0 {
        return Vec::new();
    }
    let spread = spread.max(0);
    let mut offsets = Vec::with_capacity(size);
    for _ in 0..size / 2 {
        let d = rng.gen_range(0..=spread);
        offsets.push(d);
        offsets.push(-d);
    }
    if size % 2 == 1 {
        offsets.push(0);
    }
    offsets.shuffle(rng);
    offsets
}

/// Bot team of `size` centred on `rating`.
///
/// The first bot holds Leader and IGL, the last holds Anchor, so the team
/// satisfies every composition rule.
pub fn synthesize_team(rng: &mut ChaCha8Rng, size: usize, rating: i32, spread: i32) -> Vec<PartyMember> {
    let offsets = centred_offsets(rng, size, spread);
    let mut names: Vec<&str> = BOT_NAMES.to_vec();
    names.shuffle(rng);

    offsets
        .into_iter()
        .enumerate()
        .map(|(i, offset)| {
            let bot_rating = rating + offset;
            let mut member = PartyMember::bot(BotProfile {
                player_id: PlayerId::new(),
                display_name: format!("{} (bot)", names[i % names.len()]),
                rating: bot_rating,
                difficulty: difficulty_for(bot_rating),
            });
            if i == 0 {
                member = member.with_role(PartyRole::Leader).with_role(PartyRole::Igl);
            }
            if i + 1 == size {
                member = member.with_role(PartyRole::Anchor);
            }
            member
        })
        .collect()
}

/// Fill a partial human party up to `size` with bots at the party's rating
pub fn fill_with_bots(
    rng: &mut ChaCha8Rng,
    members: &[PartyMember],
    size: usize,
    rating: i32,
    spread: i32,
) -> Vec<PartyMember> {
    let mut team: Vec<PartyMember> = members.to_vec();
    if team.len() >= size {
        return team;
    }
    let mut fillers = synthesize_team(rng, size - team.len(), rating, spread);
    // Humans keep their roles; bot fillers only take roles nobody holds
    for filler in fillers.iter_mut() {
        filler
            .roles
            .retain(|role| !team.iter().any(|m| m.has_role(*role)));
    }
    team.extend(fillers);
    team
}
