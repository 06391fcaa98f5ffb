use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const DISPATCH_DURATION: MetricDef = MetricDef {
    name: "dispatch.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of a single sendMessage call in seconds. Tagged with outcome.",
};

pub const DISPATCH_FAILURES: MetricDef = MetricDef {
    name: "dispatch.failures",
    metric_type: MetricType::Counter,
    description: "Number of recipients a notification could not be delivered to",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    DISPATCH_DURATION,
    DISPATCH_FAILURES,
];
