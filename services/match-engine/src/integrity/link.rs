//! Per-participant link statistics
//!
//! Round-trip time and jitter are smoothed the RFC 6298 way. Loss is the
//! share of lost pings among the most recent `loss_window` results.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::config::IntegrityConfig;

/// Traffic-light link quality, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Green => write!(f, "green"),
            LinkState::Yellow => write!(f, "yellow"),
            LinkState::Red => write!(f, "red"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    srtt: Option<f64>,
    rttvar: f64,
    /// nonce → sent at
    outstanding: BTreeMap<u64, i64>,
    /// true = answered, false = lost
    window: VecDeque<bool>,
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn srtt_ms(&self) -> Option<f64> {
        self.srtt
    }

    pub fn jitter_ms(&self) -> f64 {
        self.rttvar
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub fn record_sent(&mut self, nonce: u64, at: i64) {
        self.outstanding.insert(nonce, at);
    }

    /// Feed a pong. Unknown or already-expired nonces are ignored.
    pub fn record_pong(&mut self, nonce: u64, now: i64, config: &IntegrityConfig) -> Option<f64> {
        let sent = self.outstanding.remove(&nonce)?;
        let sample = (now - sent).max(0) as f64;
        match self.srtt {
            None => {
                self.srtt = Some(sample);
                self.rttvar = sample / 2.0;
            }
            Some(srtt) => {
                self.rttvar = (1.0 - config.jitter_beta) * self.rttvar + config.jitter_beta * (srtt - sample).abs();
                self.srtt = Some((1.0 - config.rtt_alpha) * srtt + config.rtt_alpha * sample);
            }
        }
        self.push(true, config.loss_window);
        Some(sample)
    }

    /// Count pings older than the loss timeout as lost
    pub fn expire(&mut self, now: i64, config: &IntegrityConfig) -> usize {
        let lost: Vec<u64> = self
            .outstanding
            .iter()
            .filter(|(_, sent)| now - **sent >= config.loss_timeout_ms)
            .map(|(nonce, _)| *nonce)
            .collect();
        for nonce in &lost {
            self.outstanding.remove(nonce);
            self.push(false, config.loss_window);
        }
        lost.len()
    }

    pub fn loss_ratio(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let lost = self.window.iter().filter(|ok| !**ok).count();
        lost as f64 / self.window.len() as f64
    }

    fn push(&mut self, ok: bool, cap: usize) {
        self.window.push_back(ok);
        while self.window.len() > cap.max(1) {
            self.window.pop_front();
        }
    }
}

/// Classify a link. Disconnected links are always red.
pub fn classify(stats: &LinkStats, connected: bool, config: &IntegrityConfig) -> LinkState {
    if !connected {
        return LinkState::Red;
    }
    let rtt = stats.srtt_ms().unwrap_or(0.0);
    let jitter = stats.jitter_ms();
    let loss = stats.loss_ratio();
    if rtt < config.green_rtt_ms && jitter < config.green_jitter_ms && loss < config.green_loss {
        LinkState::Green
    } else if rtt < config.yellow_rtt_ms && jitter < config.yellow_jitter_ms && loss < config.yellow_loss {
        LinkState::Yellow
    } else {
        LinkState::Red
    }
}
