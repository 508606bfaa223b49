use crate::error::AppError;
use dashmap::DashMap;
use std::time::Instant;
use types::ids::PlayerId;

/// Token bucket parameters for one kind of request
#[derive(Debug, Clone, Copy)]
pub struct Limit {
    pub name: &'static str,
    pub capacity: u32,
    pub refill_per_sec: f64,
}

pub const QUEUE_REQUESTS: Limit = Limit {
    name: "queue",
    capacity: 10,
    refill_per_sec: 1.0,
};

pub const WS_CONNECTIONS: Limit = Limit {
    name: "ws_connect",
    capacity: 10,
    refill_per_sec: 0.5,
};

/// Client messages on an open socket; answers arrive in bursts
pub const WS_MESSAGES: Limit = Limit {
    name: "ws_message",
    capacity: 40,
    refill_per_sec: 20.0,
};

#[derive(Clone)]
struct Bucket {
    capacity: u32,
    tokens: f64,
    refill_rate: f64,
    last_update: Instant,
}

impl Bucket {
    fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            tokens: capacity as f64,
            refill_rate,
            last_update: Instant::now(),
        }
    }

    fn allow_request(&mut self, tokens: u32) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = f64::min(self.capacity as f64, self.tokens + elapsed * self.refill_rate);
        self.last_update = now;

        if self.tokens >= tokens as f64 {
            self.tokens -= tokens as f64;
            true
        } else {
            false
        }
    }
}

#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<(PlayerId, &'static str), Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, player: PlayerId, limit: &Limit) -> Result<(), AppError> {
        let mut bucket = self
            .buckets
            .entry((player, limit.name))
            .or_insert_with(|| Bucket::new(limit.capacity, limit.refill_per_sec));

        if bucket.allow_request(1) {
            Ok(())
        } else {
            Err(AppError::RateLimitExceeded(format!("{} for {}", limit.name, player)))
        }
    }
}
