//! Selector application: turns a filtered candidate set into the ordered
//! failover chain the Dispatcher walks.
//!
//! Grounded on `gproxy-core/src/proxy_engine/dispatch.rs`'s dense
//! match-per-variant dispatch shape (kept here as a `match` over
//! [`Selector`] with one sort rule per arm) and on
//! `other_examples/60442534_wutongshenqiu-ai-proxy__crates-server-src-
//! dispatch.rs.rs`'s `router.pick` contract of handing the dispatcher a
//! plain ordered vector rather than a lazy iterator.

use std::collections::HashMap;

use novagate_common::Clock;
use novagate_provider_core::{Provider, Selector, UsageBy};
use rand::Rng;

use crate::performance::PerformanceMirror;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub provider_id: String,
    pub upstream_model: String,
    pub weight: f64,
}

pub fn apply(
    selector: Selector,
    mut candidates: Vec<Candidate>,
    providers: &HashMap<String, Provider>,
    perf: &PerformanceMirror,
    clock: &dyn Clock,
    rng: &mut impl Rng,
) -> Vec<Candidate> {
    match selector {
        Selector::InOrder => candidates,
        Selector::Random => weighted_shuffle(candidates, rng),
        Selector::Cost => {
            sort_ascending(&mut candidates, |c| estimated_cost(c, providers));
            candidates
        }
        Selector::Latency => {
            sort_ascending(&mut candidates, |c| {
                perf.p50_ttft_ms(&c.provider_id, &c.upstream_model)
                    .unwrap_or(f64::INFINITY)
            });
            candidates
        }
        Selector::Performance => {
            // Descending by tokens/sec; missing telemetry sorts as "best"
            // (f64::INFINITY) so an untested target still gets a turn
            // instead of being starved by a 0 it never earned.
            sort_descending(&mut candidates, |c| {
                perf.avg_tokens_per_sec(&c.provider_id, &c.upstream_model)
                    .unwrap_or(f64::INFINITY)
            });
            candidates
        }
        Selector::Usage { by } => {
            let now = clock.now_monotonic();
            let volumes: Vec<u64> = candidates
                .iter()
                .map(|c| perf.windowed_volume(&c.provider_id, &c.upstream_model, by, now))
                .collect();
            let total: u64 = volumes.iter().sum();
            let shares: HashMap<(String, String), f64> = candidates
                .iter()
                .zip(volumes)
                .map(|(c, v)| {
                    let share = if total == 0 {
                        0.0
                    } else {
                        v as f64 / total as f64
                    };
                    ((c.provider_id.clone(), c.upstream_model.clone()), share)
                })
                .collect();
            sort_ascending(&mut candidates, |c| {
                shares[&(c.provider_id.clone(), c.upstream_model.clone())]
            });
            candidates
        }
    }
}

fn estimated_cost(candidate: &Candidate, providers: &HashMap<String, Provider>) -> f64 {
    let Some(provider) = providers.get(&candidate.provider_id) else {
        return f64::INFINITY;
    };
    let Some(model) = provider.models.get(&candidate.upstream_model) else {
        return f64::INFINITY;
    };
    let base = model.pricing.estimate_cost(1000, 1000);
    let discount = provider.discount.unwrap_or(0.0).clamp(0.0, 1.0);
    base * (1.0 - discount)
}

fn tie_break(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
    (&a.provider_id, &a.upstream_model).cmp(&(&b.provider_id, &b.upstream_model))
}

fn sort_ascending(candidates: &mut [Candidate], key: impl Fn(&Candidate) -> f64) {
    candidates.sort_by(|a, b| {
        key(a)
            .partial_cmp(&key(b))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| tie_break(a, b))
    });
}

fn sort_descending(candidates: &mut [Candidate], key: impl Fn(&Candidate) -> f64) {
    candidates.sort_by(|a, b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| tie_break(a, b))
    });
}

/// Efficient weighted random shuffle without replacement (the "A-ES"
/// algorithm): each candidate gets a key of `-ln(uniform) / weight`, and
/// ascending key order is a correct weighted-without-replacement sample.
fn weighted_shuffle(candidates: Vec<Candidate>, rng: &mut impl Rng) -> Vec<Candidate> {
    let mut keyed: Vec<(f64, Candidate)> = candidates
        .into_iter()
        .map(|c| {
            let u: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
            let weight = c.weight.max(f64::MIN_POSITIVE);
            (-u.ln() / weight, c)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    keyed.into_iter().map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use novagate_common::SystemClock;

    fn candidate(provider_id: &str, upstream_model: &str) -> Candidate {
        Candidate {
            provider_id: provider_id.to_string(),
            upstream_model: upstream_model.to_string(),
            weight: 1.0,
        }
    }

    #[test]
    fn latency_selector_puts_missing_telemetry_last() {
        let perf = PerformanceMirror::new();
        perf.record_ttft("fast", "m", std::time::Duration::from_millis(10));
        let candidates = vec![candidate("untested", "m"), candidate("fast", "m")];
        let providers = HashMap::new();
        let clock = SystemClock;
        let mut rng = rand::rng();
        let ordered = apply(
            Selector::Latency,
            candidates,
            &providers,
            &perf,
            &clock,
            &mut rng,
        );
        assert_eq!(ordered[0].provider_id, "fast");
        assert_eq!(ordered[1].provider_id, "untested");
    }

    #[test]
    fn performance_selector_puts_missing_telemetry_first() {
        let perf = PerformanceMirror::new();
        perf.record_throughput("proven", "m", 5.0);
        let candidates = vec![candidate("proven", "m"), candidate("untested", "m")];
        let providers = HashMap::new();
        let clock = SystemClock;
        let mut rng = rand::rng();
        let ordered = apply(
            Selector::Performance,
            candidates,
            &providers,
            &perf,
            &clock,
            &mut rng,
        );
        assert_eq!(ordered[0].provider_id, "untested");
        assert_eq!(ordered[1].provider_id, "proven");
    }

    #[test]
    fn tie_break_is_alphabetical() {
        let perf = PerformanceMirror::new();
        let candidates = vec![candidate("zeta", "m"), candidate("alpha", "m")];
        let providers = HashMap::new();
        let clock = SystemClock;
        let mut rng = rand::rng();
        let ordered = apply(
            Selector::Latency,
            candidates,
            &providers,
            &perf,
            &clock,
            &mut rng,
        );
        assert_eq!(ordered[0].provider_id, "alpha");
        assert_eq!(ordered[1].provider_id, "zeta");
    }
}
