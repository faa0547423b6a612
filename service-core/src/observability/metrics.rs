use crate::error::AppError;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the process-wide Prometheus recorder behind the `metrics` facade.
///
/// The returned handle renders the text exposition format for `/metrics`.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, AppError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Failed to install metrics recorder: {}", e)))
}
