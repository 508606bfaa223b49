use crate::models::RankResponse;
use axum::{Json, extract::Path};
use rules::rank::rank_of_rating;

pub async fn get_rank(Path(rating): Path<i32>) -> Json<RankResponse> {
    let rank = rank_of_rating(rating);
    Json(RankResponse {
        rating,
        tier: rank.tier,
        division: rank.division,
        label: rank.to_string(),
    })
}
