use uuid::Uuid;

/// A per-request identifier, surfaced to clients as `x-novagate-request-id`
/// and used as the join key across UsageRecord/ErrorRecord/DebugTrace.
pub fn new_request_id() -> String {
    Uuid::now_v7().to_string()
}

/// A per-attempt trace identifier, one per upstream call within a request's
/// failover chain.
pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}
