use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    HistogramVec, IntCounterVec, IntGaugeVec,
};

lazy_static! {
    pub static ref CONNECTION_OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "shardkit_connection_operation_duration_seconds",
        "Connection and topology operation duration in seconds",
        &["operation", "kind", "status"]
    ).unwrap();

    pub static ref OPERATION_COUNTER: IntCounterVec = register_int_counter_vec!(
        "shardkit_operations_total",
        "Total number of connection and topology operations",
        &["operation", "status"]
    ).unwrap();

    pub static ref ACTIVE_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "shardkit_active_connections",
        "Number of open ClickHouse connections held by registries",
        &["kind"]
    ).unwrap();
}

pub fn record_operation(operation: &str, kind: &str, success: bool, duration: f64) {
    let status = if success { "success" } else { "failure" };
    CONNECTION_OPERATION_DURATION
        .with_label_values(&[operation, kind, status])
        .observe(duration);
    OPERATION_COUNTER
        .with_label_values(&[operation, status])
        .inc();
}

pub fn connection_opened(kind: &str) {
    ACTIVE_CONNECTIONS.with_label_values(&[kind]).inc();
}

pub fn connection_released(kind: &str) {
    ACTIVE_CONNECTIONS.with_label_values(&[kind]).dec();
}
