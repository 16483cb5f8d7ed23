//! Rolling performance mirror: per-`(provider, upstreamModel)` TTFT,
//! throughput, and request-volume samples, read by the `latency`,
//! `performance`, and `usage` selectors.
//!
//! Tracked per selector-relevant target rather than per credential; grounded on
//! `other_examples/45e4b927_RESMP-DEV-ccr-rust__src-router.rs.rs`'s
//! `ewma_tracker.sort_tiers` pattern of keeping a small rolling stat per
//! upstream target and consulting it at selection time, generalized here
//! from an EWMA to plain capped ring buffers (simpler, and sufficient for
//! the p50/avg/share aggregates the selectors ask for).

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use novagate_provider_core::UsageBy;

const SAMPLE_CAP: usize = 128;
const USAGE_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Default)]
struct TargetStats {
    ttft_ms: VecDeque<f64>,
    tokens_per_sec: VecDeque<f64>,
    requests: VecDeque<Instant>,
    /// `(timestamp, token_count)` pairs, tracked separately from `requests`
    /// since `usage by: tokens` weights by volume rather than call count.
    tokens: VecDeque<(Instant, u64)>,
}

impl TargetStats {
    fn push_capped<T>(buf: &mut VecDeque<T>, value: T) {
        buf.push_back(value);
        while buf.len() > SAMPLE_CAP {
            buf.pop_front();
        }
    }

    fn trim_window(buf: &mut VecDeque<Instant>, now: Instant) {
        while let Some(front) = buf.front() {
            if now.duration_since(*front) > USAGE_WINDOW {
                buf.pop_front();
            } else {
                break;
            }
        }
    }

    fn trim_token_window(buf: &mut VecDeque<(Instant, u64)>, now: Instant) {
        while let Some((ts, _)) = buf.front() {
            if now.duration_since(*ts) > USAGE_WINDOW {
                buf.pop_front();
            } else {
                break;
            }
        }
    }
}

pub struct PerformanceMirror {
    stats: RwLock<HashMap<(String, String), TargetStats>>,
}

impl Default for PerformanceMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMirror {
    pub fn new() -> Self {
        Self {
            stats: RwLock::new(HashMap::new()),
        }
    }

    fn key(provider_id: &str, model: &str) -> (String, String) {
        (provider_id.to_string(), model.to_string())
    }

    pub fn record_ttft(&self, provider_id: &str, model: &str, ttft: Duration) {
        let mut stats = self.stats.write().unwrap();
        let entry = stats.entry(Self::key(provider_id, model)).or_default();
        TargetStats::push_capped(&mut entry.ttft_ms, ttft.as_secs_f64() * 1000.0);
    }

    pub fn record_throughput(&self, provider_id: &str, model: &str, tokens_per_sec: f64) {
        let mut stats = self.stats.write().unwrap();
        let entry = stats.entry(Self::key(provider_id, model)).or_default();
        TargetStats::push_capped(&mut entry.tokens_per_sec, tokens_per_sec);
    }

    pub fn record_request(&self, provider_id: &str, model: &str, tokens: u64, now: Instant) {
        let mut stats = self.stats.write().unwrap();
        let entry = stats.entry(Self::key(provider_id, model)).or_default();
        TargetStats::trim_window(&mut entry.requests, now);
        entry.requests.push_back(now);
        TargetStats::trim_token_window(&mut entry.tokens, now);
        entry.tokens.push_back((now, tokens));
    }

    /// Rolling p50 TTFT in milliseconds, or `None` if no samples have ever
    /// been recorded for this target.
    pub fn p50_ttft_ms(&self, provider_id: &str, model: &str) -> Option<f64> {
        let stats = self.stats.read().unwrap();
        let entry = stats.get(&Self::key(provider_id, model))?;
        percentile_50(&entry.ttft_ms)
    }

    /// Rolling average tokens/sec, or `None` if no samples have ever been
    /// recorded for this target.
    pub fn avg_tokens_per_sec(&self, provider_id: &str, model: &str) -> Option<f64> {
        let stats = self.stats.read().unwrap();
        let entry = stats.get(&Self::key(provider_id, model))?;
        if entry.tokens_per_sec.is_empty() {
            return None;
        }
        Some(entry.tokens_per_sec.iter().sum::<f64>() / entry.tokens_per_sec.len() as f64)
    }

    /// Request (or token) volume in the trailing hour, used by the `usage`
    /// selector to compute each candidate's share of the set's total.
    pub fn windowed_volume(&self, provider_id: &str, model: &str, by: UsageBy, now: Instant) -> u64 {
        let mut stats = self.stats.write().unwrap();
        let Some(entry) = stats.get_mut(&Self::key(provider_id, model)) else {
            return 0;
        };
        match by {
            UsageBy::Requests => {
                TargetStats::trim_window(&mut entry.requests, now);
                entry.requests.len() as u64
            }
            UsageBy::Tokens => {
                TargetStats::trim_token_window(&mut entry.tokens, now);
                entry.tokens.iter().map(|(_, n)| *n).sum()
            }
        }
    }
}

fn percentile_50(samples: &VecDeque<f64>) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = samples.iter().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Some(sorted[sorted.len() / 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p50_ttft_is_none_without_samples() {
        let mirror = PerformanceMirror::new();
        assert_eq!(mirror.p50_ttft_ms("p1", "m1"), None);
    }

    #[test]
    fn p50_ttft_tracks_median() {
        let mirror = PerformanceMirror::new();
        for ms in [100.0, 200.0, 300.0] {
            mirror.record_ttft("p1", "m1", Duration::from_secs_f64(ms / 1000.0));
        }
        assert_eq!(mirror.p50_ttft_ms("p1", "m1"), Some(200.0));
    }

    #[test]
    fn windowed_volume_excludes_old_requests() {
        let mirror = PerformanceMirror::new();
        let t0 = Instant::now();
        mirror.record_request("p1", "m1", 10, t0);
        let later = t0 + Duration::from_secs(3700);
        assert_eq!(
            mirror.windowed_volume("p1", "m1", UsageBy::Requests, later),
            0
        );
    }

    #[test]
    fn sample_buffer_is_capped() {
        let mirror = PerformanceMirror::new();
        for _ in 0..(SAMPLE_CAP + 10) {
            mirror.record_throughput("p1", "m1", 1.0);
        }
        let stats = mirror.stats.read().unwrap();
        assert_eq!(
            stats.get(&("p1".to_string(), "m1".to_string())).unwrap().tokens_per_sec.len(),
            SAMPLE_CAP
        );
    }
}
