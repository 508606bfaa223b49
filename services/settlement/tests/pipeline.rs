//! Live match to settled ratings, end to end

use chrono::{Duration as WallDuration, Utc};
use match_engine::{
    ActorContext, EngineClock, EngineConfig, IntegrityConfig, MatchAction, MatchSetup, MatchSupervisor,
    MemoryCheckpointStore, RecordingTransport,
};
use settlement::records::{TEMPLATE_RANK_CHANGED, TEMPLATE_SETTLEMENT_COMPLETED};
use settlement::{
    HistoryResult, MemoryHistoryStore, MemoryProfiles, MemoryRatingStore, RecordingNotifier, SettlementConfig,
    SettlementPorts, SettlementService,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use types::ids::{MatchId, PlayerId};
use types::mode::{GameMode, MatchType};
use types::participant::{BotProfile, DifficultyProfile, PartyMember, PlayerProfile};
use types::rating::RatingRecord;

struct Arena {
    supervisor: MatchSupervisor,
    ratings: Arc<MemoryRatingStore>,
    history: Arc<MemoryHistoryStore>,
    notifier: Arc<RecordingNotifier>,
    profiles: Arc<MemoryProfiles>,
}

fn arena() -> Arena {
    let config = EngineConfig {
        integrity: IntegrityConfig {
            red_sustain_ms: 10_000_000,
            ..IntegrityConfig::default()
        },
        ..EngineConfig::default()
    };
    let (outcomes_tx, outcomes_rx) = mpsc::channel(16);
    let ctx = ActorContext {
        transport: Arc::new(RecordingTransport::new()),
        checkpoints: Arc::new(MemoryCheckpointStore::new()),
        outcomes: outcomes_tx,
        integrity: config.integrity.clone(),
        retry: config.retry,
        clock: EngineClock::start(),
    };

    let ratings = Arc::new(MemoryRatingStore::new());
    let history = Arc::new(MemoryHistoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let profiles = Arc::new(MemoryProfiles::new());
    let settlement = Arc::new(SettlementService::new(
        SettlementConfig::default(),
        SettlementPorts {
            profiles: profiles.clone(),
            ratings: ratings.clone(),
            history: history.clone(),
            notifier: notifier.clone(),
        },
    ));
    tokio::spawn(settlement.run(outcomes_rx));

    Arena {
        supervisor: MatchSupervisor::new(config, ctx),
        ratings,
        history,
        notifier,
        profiles,
    }
}

fn enrol(arena: &Arena, rating: i32) -> PartyMember {
    let profile = PlayerProfile::new(PlayerId::new(), "ada", rating);
    let mut record = RatingRecord::with_rating(profile.player_id, rating, Utc::now() - WallDuration::days(3));
    record.matches_played = 25;
    arena.ratings.insert(record);
    arena.profiles.upsert(profile.clone());
    PartyMember::human(profile)
}

fn flawless_bot(rating: i32) -> PartyMember {
    PartyMember::bot(BotProfile {
        player_id: PlayerId::new(),
        display_name: "Hypatia (bot)".to_string(),
        rating,
        difficulty: DifficultyProfile {
            accuracy: 1.0,
            mean_answer_ms: 3_000,
            jitter_ms: 0,
        },
    })
}

async fn play_out(arena: &Arena, match_type: MatchType, rating: i32) -> PlayerId {
    let me = enrol(arena, rating);
    let player = me.id();
    let setup = MatchSetup {
        match_id: MatchId::new(),
        mode: GameMode::Duel,
        match_type,
        teams: [vec![me], vec![flawless_bot(rating)]],
    };
    let registry = arena.supervisor.registry();
    arena.supervisor.start(setup.clone()).unwrap();
    registry.act(&setup.match_id, player, MatchAction::Join).await.unwrap();

    for _ in 0..200 {
        if !arena.history.rows_for(&player).is_empty() {
            break;
        }
        sleep(Duration::from_secs(1)).await;
    }
    player
}

#[tokio::test(start_paused = true)]
async fn test_ranked_loss_to_bot_is_settled() {
    let arena = arena();
    let player = play_out(&arena, MatchType::Ranked, 1300).await;

    let rows = arena.history.rows_for(&player);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].result, HistoryResult::Loss);
    assert_eq!(rows[0].rating_before, 1300);
    assert_eq!(rows[0].rating_after, 1284);

    let record = arena.ratings.get(&player).unwrap();
    assert_eq!(record.rating, 1284);
    assert_eq!(record.matches_played, 26);
    assert_eq!(record.peak_rating, 1300);

    sleep(Duration::from_millis(50)).await;
    let completed = arena.notifier.with_template(TEMPLATE_SETTLEMENT_COMPLETED);
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].params["result"], "loss");
    // Bronze I down to Bronze II
    let demoted = arena.notifier.with_template(TEMPLATE_RANK_CHANGED);
    assert_eq!(demoted.len(), 1);
    assert_eq!(demoted[0].params["direction"], "demoted");
}

#[tokio::test(start_paused = true)]
async fn test_casual_match_leaves_rating_alone() {
    let arena = arena();
    let player = play_out(&arena, MatchType::Casual, 1500).await;

    let rows = arena.history.rows_for(&player);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].delta, 0);
    assert_eq!(arena.ratings.get(&player).unwrap().rating, 1500);
    assert_eq!(arena.ratings.get(&player).unwrap().matches_played, 25);
}
