/// Counter of requests that completed and passed validation.
pub const SUCCESS_COUNTER: &str = "surge_requests_success";

/// Counter of transport failures and validator rejections.
pub const ERROR_COUNTER: &str = "surge_requests_error";

/// Counter of connection failures caused by local resource exhaustion.
pub const CLIENT_LIMIT_COUNTER: &str = "surge_requests_client_limit";

/// Histogram of successful request latencies, in seconds.
pub const LATENCY_HISTOGRAM: &str = "surge_request_latency";

/// Label carrying the phase name on every metric.
pub const PHASE_LABEL: &str = "phase";
