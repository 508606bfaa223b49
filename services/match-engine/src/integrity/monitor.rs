use std::collections::BTreeMap;
use tracing::debug;
use types::ids::PlayerId;

use super::link::{classify, LinkState, LinkStats};
use crate::config::IntegrityConfig;

/// Report for the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegritySignal {
    pub player: PlayerId,
    pub level: LinkState,
}

#[derive(Debug, Clone)]
struct Link {
    stats: LinkStats,
    connected: bool,
    state: LinkState,
    red_since: Option<i64>,
    /// An alert went out for the current red episode
    alerted: bool,
}

/// Connection Integrity Monitor for the humans of one match
///
/// Pings are only sent to connected participants. A participant that stays
/// red for longer than the sustain period produces one red signal per
/// episode, and one recovery signal when the episode ends. Disconnected
/// participants count as red for the match-wide state but never raise
/// signals; the reconnect grace window handles them.
#[derive(Debug, Clone)]
pub struct IntegrityMonitor {
    config: IntegrityConfig,
    links: BTreeMap<PlayerId, Link>,
    next_nonce: u64,
    next_ping_at: i64,
}

impl IntegrityMonitor {
    pub fn new(config: IntegrityConfig, players: impl IntoIterator<Item = PlayerId>, now: i64) -> Self {
        let links = players
            .into_iter()
            .map(|p| {
                let link = Link {
                    stats: LinkStats::new(),
                    connected: false,
                    state: LinkState::Red,
                    red_since: None,
                    alerted: false,
                };
                (p, link)
            })
            .collect();
        Self {
            next_ping_at: now + config.ping_interval_ms,
            config,
            links,
            next_nonce: 1,
        }
    }

    pub fn config(&self) -> &IntegrityConfig {
        &self.config
    }

    pub fn set_connected(&mut self, player: PlayerId, connected: bool, now: i64) {
        if let Some(link) = self.links.get_mut(&player) {
            link.connected = connected;
            if connected {
                // Fresh link, old samples describe the old connection
                link.stats = LinkStats::new();
                link.red_since = None;
            }
            link.state = classify(&link.stats, connected, &self.config);
            debug!(player_id = %player, connected, state = %link.state, at = now, "Link connectivity changed");
        }
    }

    /// Pings to send now, if the ping interval elapsed
    pub fn due_pings(&mut self, now: i64) -> Vec<(PlayerId, u64)> {
        if now < self.next_ping_at {
            return Vec::new();
        }
        self.next_ping_at = now + self.config.ping_interval_ms;
        let mut out = Vec::new();
        for (player, link) in self.links.iter_mut().filter(|(_, l)| l.connected) {
            let nonce = self.next_nonce;
            self.next_nonce += 1;
            link.stats.record_sent(nonce, now);
            out.push((*player, nonce));
        }
        out
    }

    pub fn record_pong(&mut self, player: PlayerId, nonce: u64, now: i64) -> bool {
        let config = &self.config;
        match self.links.get_mut(&player) {
            Some(link) => link.stats.record_pong(nonce, now, config).is_some(),
            None => false,
        }
    }

    /// Expire lost pings, reclassify every link and collect signals
    pub fn sweep(&mut self, now: i64) -> Vec<IntegritySignal> {
        let config = &self.config;
        let mut signals = Vec::new();
        for (player, link) in self.links.iter_mut() {
            link.stats.expire(now, config);
            link.state = classify(&link.stats, link.connected, config);

            if !link.connected {
                link.red_since = None;
                continue;
            }
            if link.state == LinkState::Red {
                let since = *link.red_since.get_or_insert(now);
                if !link.alerted && now - since > config.red_sustain_ms {
                    link.alerted = true;
                    signals.push(IntegritySignal { player: *player, level: LinkState::Red });
                }
            } else {
                link.red_since = None;
                if link.alerted {
                    link.alerted = false;
                    signals.push(IntegritySignal { player: *player, level: link.state });
                }
            }
        }
        signals
    }

    pub fn is_connected(&self, player: &PlayerId) -> bool {
        self.links.get(player).map_or(false, |l| l.connected)
    }

    pub fn state_of(&self, player: &PlayerId) -> Option<LinkState> {
        self.links.get(player).map(|l| l.state)
    }

    /// Worst state across all participants
    pub fn match_state(&self) -> LinkState {
        self.links.values().map(|l| l.state).max().unwrap_or(LinkState::Green)
    }

    pub fn next_wake(&self) -> i64 {
        self.next_ping_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(n: usize) -> (IntegrityMonitor, Vec<PlayerId>) {
        let players: Vec<PlayerId> = (0..n).map(|_| PlayerId::new()).collect();
        let mut m = IntegrityMonitor::new(IntegrityConfig::default(), players.clone(), 0);
        for p in &players {
            m.set_connected(*p, true, 0);
        }
        (m, players)
    }

    /// One ping round where `answer` decides who replies and with what rtt
    fn round(m: &mut IntegrityMonitor, now: i64, answer: impl Fn(&PlayerId) -> Option<i64>) -> Vec<IntegritySignal> {
        for (player, nonce) in m.due_pings(now) {
            if let Some(rtt) = answer(&player) {
                m.record_pong(player, nonce, now + rtt);
            }
        }
        m.sweep(now)
    }

    #[test]
    fn test_pings_only_when_due() {
        let (mut m, _) = monitor(2);
        assert!(m.due_pings(1_000).is_empty());
        assert_eq!(m.due_pings(2_000).len(), 2);
        assert!(m.due_pings(2_500).is_empty());
        assert_eq!(m.next_wake(), 4_000);
    }

    #[test]
    fn test_disconnected_player_not_pinged() {
        let (mut m, players) = monitor(2);
        m.set_connected(players[0], false, 0);
        let pings = m.due_pings(2_000);
        assert_eq!(pings.len(), 1);
        assert_eq!(pings[0].0, players[1]);
        assert_eq!(m.match_state(), LinkState::Red);
    }

    #[test]
    fn test_sustained_red_alerts_once() {
        let (mut m, players) = monitor(2);
        let bad = players[0];
        let mut alerts = Vec::new();
        let mut now = 2_000;
        while now <= 40_000 {
            alerts.extend(round(&mut m, now, |p| if *p == bad { None } else { Some(30) }));
            now += 2_000;
        }
        assert_eq!(alerts, vec![IntegritySignal { player: bad, level: LinkState::Red }]);
        assert_eq!(m.state_of(&players[1]), Some(LinkState::Green));
        assert_eq!(m.match_state(), LinkState::Red);
    }

    #[test]
    fn test_short_red_episode_is_silent() {
        let (mut m, players) = monitor(1);
        let p = players[0];
        let mut alerts = Vec::new();
        // One lost ping is red for a few seconds, then healthy again
        alerts.extend(round(&mut m, 2_000, |_| None));
        for i in 2..=40 {
            alerts.extend(round(&mut m, i * 2_000, |_| Some(20)));
        }
        assert!(alerts.is_empty());
        assert_eq!(m.state_of(&p), Some(LinkState::Green));
    }

    #[test]
    fn test_recovery_signal_after_alert() {
        let (mut m, players) = monitor(1);
        let p = players[0];
        let mut alerts = Vec::new();
        let mut now = 2_000;
        while now <= 30_000 {
            alerts.extend(round(&mut m, now, |_| None));
            now += 2_000;
        }
        assert_eq!(alerts.len(), 1);
        // Reconnect resets the link, next sweep reports the recovery
        m.set_connected(p, true, now);
        let recovered = round(&mut m, now, |_| Some(20));
        assert_eq!(recovered.len(), 1);
        assert_ne!(recovered[0].level, LinkState::Red);
    }
}
