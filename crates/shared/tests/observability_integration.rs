//! 可观测性模块集成测试
//!
//! 全局 subscriber 和 recorder 只能安装一次，因此初始化相关断言集中在同一个测试中。

use rules_shared::observability::metrics::{record_rule_evaluation, record_rule_mutation};
use rules_shared::observability::{self, ObservabilityConfig, ObservabilityGuard};

#[test]
fn test_init_and_render_metrics() {
    let config = ObservabilityConfig {
        log_level: "debug".to_string(),
        json_logs: true,
        metrics_enabled: true,
    };

    let guard = observability::init(&config).unwrap();

    record_rule_evaluation("simple", "matched", 0.001);
    record_rule_evaluation("combination", "fault", 0.002);
    record_rule_mutation("create", "success");

    let rendered = guard.render_metrics().unwrap();
    assert!(rendered.contains("rule_evaluations_total"));
    assert!(rendered.contains("rule_mutations_total"));

    // 重复初始化应返回错误而不是 panic
    assert!(observability::init(&config).is_err());
}

#[test]
fn test_empty_guard_has_no_metrics() {
    let guard = ObservabilityGuard::empty();
    assert!(guard.render_metrics().is_none());
}

#[test]
fn test_default_observability_config() {
    let config = ObservabilityConfig::default();
    assert_eq!(config.log_level, "info");
    assert!(!config.json_logs);
    assert!(config.metrics_enabled);
}
