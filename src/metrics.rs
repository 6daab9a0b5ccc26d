// Prometheus metrics for command execution
//
// Exposed on the /metrics HTTP endpoint:
// - Executions by command and outcome (counter)
// - Execution latency by command (histogram)
// - Unknown command lookups (counter)
// - Audit write failures (counter)

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramVec, IntCounter, Registry, TextEncoder};
use std::sync::{Arc, Once};

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref COMMANDS_EXECUTED_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("commands_executed_total", "Total number of commands executed"),
        &["command", "status"]
    ).expect("Failed to create commands executed metric");

    pub static ref COMMAND_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("command_duration_seconds", "Command execution duration in seconds"),
        &["command"]
    ).expect("Failed to create command duration metric");

    pub static ref COMMANDS_NOT_FOUND_TOTAL: IntCounter = IntCounter::new(
        "commands_not_found_total",
        "Total number of requests for unknown commands"
    ).expect("Failed to create commands not found metric");

    pub static ref AUDIT_WRITE_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "audit_write_failures_total",
        "Total number of audit entries that could not be written"
    ).expect("Failed to create audit write failures metric");
}

static INIT: Once = Once::new();

/// Register all metrics with the registry; later calls are no-ops
pub fn init() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(COMMANDS_EXECUTED_TOTAL.clone()),
            Box::new(COMMAND_DURATION_SECONDS.clone()),
            Box::new(COMMANDS_NOT_FOUND_TOTAL.clone()),
            Box::new(AUDIT_WRITE_FAILURES_TOTAL.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Record one finished execution
pub fn observe_execution(command: &str, status: &str, duration_ms: f64) {
    COMMANDS_EXECUTED_TOTAL
        .with_label_values(&[command, status])
        .inc();
    COMMAND_DURATION_SECONDS
        .with_label_values(&[command])
        .observe(duration_ms / 1000.0);
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
