//! Prometheus 指标模块
//!
//! 基于 metrics crate 记录规则引擎指标；安装 metrics-exporter-prometheus recorder 后
//! 可通过句柄渲染文本快照。未安装 recorder 时所有记录函数均为空操作。

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// 安装全局 Prometheus recorder 并注册指标描述
pub fn init() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_common_metrics();
    Ok(handle)
}

/// 注册通用指标描述，出现在渲染结果的 HELP 注释中
fn register_common_metrics() {
    metrics::describe_counter!("rule_evaluations_total", "Total number of rule evaluations");
    metrics::describe_histogram!(
        "rule_evaluation_duration_seconds",
        metrics::Unit::Seconds,
        "Rule evaluation duration in seconds"
    );
    metrics::describe_counter!("rule_mutations_total", "Total number of rule store mutations");
}

/// 记录一次规则评估
///
/// `kind` 为 simple / combination，`status` 为 matched / not_matched / fault
#[inline]
pub fn record_rule_evaluation(kind: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        "rule_evaluations_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "rule_evaluation_duration_seconds",
        "kind" => kind.to_string()
    )
    .record(duration_secs);
}

/// 记录规则变更（create / modify / combine / delete）
#[inline]
pub fn record_rule_mutation(operation: &str, status: &str) {
    metrics::counter!(
        "rule_mutations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
