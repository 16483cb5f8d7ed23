use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(1);

/// A locally-unique id for objects the destination family requires but the
/// canonical snapshot doesn't carry one for (response ids, or tool-call ids
/// for a family like Gemini that never assigns them). Not a UUID: ids only
/// need to be unique within one response, and callers that need cross-
/// process uniqueness already have a request id from `novagate_common`.
pub fn synthesize_id(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{n:016x}")
}
