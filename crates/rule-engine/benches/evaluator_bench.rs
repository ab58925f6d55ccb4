//! 规则评估性能基准测试
//!
//! 覆盖解析、值绑定、单条件比较、表达式求值和组合规则评估。

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rule_engine::{
    ConditionEvaluator, Operator, Record, RuleEngine, Scalar, bind, evaluate, parse, populate,
};
use rules_shared::AppConfig;
use std::hint::black_box;

const RULE_TEXT: &str =
    "(age > 30 AND department = 'Marketing') OR (salary > 20000 AND experience > 5)";

fn employee() -> Record {
    Record::new()
        .with("age", 35)
        .with("department", "Marketing")
        .with("salary", "52000")
        .with("experience", 3)
}

/// 生成由 `size` 个比较组成的 AND 链
fn chained_rule(size: usize) -> String {
    (0..size)
        .map(|i| format!("age > {}", i))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// 单条件比较基准
fn bench_condition_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("condition_operations");

    let number = Scalar::Number(1000.0);
    let threshold = Scalar::Number(500.0);
    let text = Scalar::from("marketing");
    let other_text = Scalar::from("sales");
    let numeric_text = Scalar::from("1000");

    for (name, operator) in [
        ("eq", Operator::Eq),
        ("neq", Operator::Neq),
        ("gt", Operator::Gt),
        ("lte", Operator::Lte),
    ] {
        group.bench_function(format!("number_{}", name), |b| {
            b.iter(|| {
                ConditionEvaluator::evaluate(
                    black_box(&number),
                    black_box(operator),
                    black_box(&threshold),
                )
            })
        });
    }

    group.bench_function("text_eq", |b| {
        b.iter(|| {
            ConditionEvaluator::evaluate(
                black_box(&text),
                black_box(Operator::Eq),
                black_box(&other_text),
            )
        })
    });

    group.bench_function("text_ordering", |b| {
        b.iter(|| {
            ConditionEvaluator::evaluate(
                black_box(&text),
                black_box(Operator::Lt),
                black_box(&other_text),
            )
        })
    });

    group.bench_function("mixed_eq", |b| {
        b.iter(|| {
            ConditionEvaluator::evaluate(
                black_box(&number),
                black_box(Operator::Eq),
                black_box(&numeric_text),
            )
        })
    });

    group.finish();
}

/// 解析基准
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    group.bench_function("grouped_rule", |b| b.iter(|| parse(black_box(RULE_TEXT))));

    for size in [2, 8, 32, 128].iter() {
        let text = chained_rule(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| parse(black_box(&text)))
        });
    }

    group.finish();
}

/// 绑定与求值基准
fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    let record = employee();
    let ast = parse(RULE_TEXT).unwrap();
    let expression = bind(&ast, &record).unwrap();

    group.bench_function("bind", |b| b.iter(|| bind(black_box(&ast), black_box(&record))));
    group.bench_function("populate", |b| {
        b.iter(|| populate(black_box(RULE_TEXT), black_box(&record)))
    });
    group.bench_function("execute", |b| b.iter(|| evaluate(black_box(&expression))));

    group.finish();
}

/// 组合规则评估基准
fn bench_combination(c: &mut Criterion) {
    let mut group = c.benchmark_group("combination");

    let config = AppConfig::load("eligibility-rules-bench").unwrap_or_default();
    let engine = RuleEngine::in_memory(&config).unwrap();
    let record = employee();
    let simple = engine.create_rule("grouped", RULE_TEXT).unwrap();

    for width in [2, 8, 32].iter() {
        let ids = vec![simple.id; *width];
        let combined = engine.combine_rules(&ids, None).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, _| {
            b.iter(|| engine.evaluate_rule(black_box(combined.id), black_box(&record)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_condition_operations,
    bench_parse,
    bench_evaluate,
    bench_combination,
);

criterion_main!(benches);
