//! 规则引擎
//!
//! 在 `RuleStore` 与 `AttributeCatalog` 之上提供规则的创建、修改、组合、评估与字段查询。
//! 写入前完成全部校验（语法、属性白名单、循环引用），校验失败时不会修改存储。
//! 评估永远不会中断：任何错误都让对应规则按不匹配处理，错误随结果一并返回。

use crate::ast::Ast;
use crate::binder::{BoundExpression, bind};
use crate::error::{Result, RuleError};
use crate::executor::RuleExecutor;
use crate::fields::collect_fields;
use crate::graph::ReferenceGraph;
use crate::models::{EvaluationResult, Record, Rule, RuleId, RuleKind, combination_text};
use crate::store::{AttributeCatalog, InMemoryCatalog, InMemoryRuleStore, RuleStore};
use crate::validator::{is_valid_attribute_name, validate};
use chrono::Utc;
use rules_shared::observability::metrics::{record_rule_evaluation, record_rule_mutation};
use rules_shared::{AppConfig, EngineConfig};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// 未指定名称时组合规则的默认名称
pub const DEFAULT_COMBINATION_NAME: &str = "Combined Rule";

/// 规则引擎
pub struct RuleEngine<S, C> {
    store: S,
    catalog: C,
    config: EngineConfig,
}

impl RuleEngine<InMemoryRuleStore, InMemoryCatalog> {
    /// 按应用配置创建使用内存存储的引擎，属性目录用配置中的属性初始化
    pub fn in_memory(config: &AppConfig) -> Result<Self> {
        if let Some(invalid) = config
            .catalog
            .attributes
            .iter()
            .find(|attr| !is_valid_attribute_name(attr))
        {
            return Err(RuleError::InvalidAttributeName(invalid.clone()));
        }

        let catalog = InMemoryCatalog::with_attributes(config.catalog.attributes.clone());
        Ok(Self::new(InMemoryRuleStore::new(), catalog).with_config(config.engine.clone()))
    }
}

impl<S: RuleStore, C: AttributeCatalog> RuleEngine<S, C> {
    pub fn new(store: S, catalog: C) -> Self {
        Self {
            store,
            catalog,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    // ==================== 属性目录 ====================

    pub fn get_attributes(&self) -> Result<Vec<String>> {
        self.catalog.get_attributes()
    }

    /// 向属性目录追加属性
    #[instrument(skip(self))]
    pub fn add_attribute(&self, name: &str) -> Result<()> {
        if !is_valid_attribute_name(name) {
            return Err(RuleError::InvalidAttributeName(name.to_string()));
        }

        let mut attributes = self.catalog.get_attributes()?;
        if attributes.iter().any(|a| a == name) {
            return Err(RuleError::DuplicateAttribute(name.to_string()));
        }

        attributes.push(name.to_string());
        self.catalog.set_attributes(attributes)?;
        info!("属性已添加: {}", name);
        Ok(())
    }

    /// 从属性目录移除属性；已有规则不受影响，但此后修改时会校验失败
    #[instrument(skip(self))]
    pub fn remove_attribute(&self, name: &str) -> Result<()> {
        let mut attributes = self.catalog.get_attributes()?;
        let before = attributes.len();
        attributes.retain(|a| a != name);

        if attributes.len() == before {
            return Err(RuleError::AttributeNotFound(name.to_string()));
        }

        self.catalog.set_attributes(attributes)?;
        info!("属性已删除: {}", name);
        Ok(())
    }

    // ==================== 规则管理 ====================

    /// 校验并创建简单规则
    #[instrument(skip(self, rule_text))]
    pub fn create_rule(&self, name: &str, rule_text: &str) -> Result<Rule> {
        let result = self.try_create_rule(name, rule_text);
        record_mutation("create", &result);
        result
    }

    fn try_create_rule(&self, name: &str, rule_text: &str) -> Result<Rule> {
        require_non_empty("规则名称", name)?;
        let ast = self.validate_text(rule_text)?;

        let mut rule = Rule::simple(name.trim(), rule_text.trim(), ast);
        rule.id = self.store.put_rule(rule.clone())?;

        info!(rule_id = rule.id, rule_name = %rule.name, "规则已创建");
        Ok(rule)
    }

    /// 修改简单规则的文本
    #[instrument(skip(self, rule_text))]
    pub fn modify_rule(&self, id: RuleId, rule_text: &str) -> Result<Rule> {
        let result = self.try_modify_rule(id, rule_text);
        record_mutation("modify", &result);
        result
    }

    fn try_modify_rule(&self, id: RuleId, rule_text: &str) -> Result<Rule> {
        let mut rule = self.store.get_rule(id)?;
        if rule.is_combination() {
            return Err(RuleError::NotSimpleRule(id));
        }

        let ast = self.validate_text(rule_text)?;
        rule.raw_text = rule_text.trim().to_string();
        rule.kind = RuleKind::Simple { ast };
        rule.updated_at = Utc::now();
        self.store.put_rule(rule.clone())?;

        info!(rule_id = id, "规则已修改");
        Ok(rule)
    }

    /// 按 AND 组合已有规则
    ///
    /// 引用的规则在评估时才解析，未解析的引用会让评估结果为 false。
    ///
    /// 新 ID 由存储分配，因此先写入再检测循环引用，存在环时删除刚写入的规则。
    /// 从写入到回滚之间，并发的 `list_rules` / `evaluate_rule` 可能看到这条组合规则；
    /// 评估时的路径检查会把其中的环报告为 `CyclicReference`。
    /// 回滚失败时返回 `RollbackFailed`，其中保留原始的循环引用错误。
    #[instrument(skip(self))]
    pub fn combine_rules(&self, rule_ids: &[RuleId], name: Option<&str>) -> Result<Rule> {
        let result = self.try_combine_rules(rule_ids, name);
        record_mutation("combine", &result);
        result
    }

    fn try_combine_rules(&self, rule_ids: &[RuleId], name: Option<&str>) -> Result<Rule> {
        if rule_ids.is_empty() {
            return Err(RuleError::InvalidInput("组合规则至少需要引用一条规则".to_string()));
        }

        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n,
            _ => DEFAULT_COMBINATION_NAME,
        };

        let mut rule = Rule::combination(name, rule_ids.to_vec());
        rule.id = self.store.put_rule(rule.clone())?;

        // 新 ID 可能恰好是已有组合规则中的悬空引用，因此在写入后检测
        if let Err(e) = self.check_references(rule.id, rule_ids) {
            warn!(rule_id = rule.id, error = %e, "组合规则存在循环引用，回滚写入");
            if let Err(rollback) = self.store.delete_rule(rule.id) {
                error!(rule_id = rule.id, error = %rollback, "回滚失败，存储中残留循环引用的组合规则");
                return Err(RuleError::RollbackFailed {
                    cause: Box::new(e),
                    rollback: Box::new(rollback),
                });
            }
            return Err(e);
        }

        info!(rule_id = rule.id, references = ?rule_ids, "组合规则已创建");
        Ok(rule)
    }

    /// 修改组合规则引用的规则列表
    #[instrument(skip(self))]
    pub fn modify_combination(&self, id: RuleId, rule_ids: &[RuleId]) -> Result<Rule> {
        let result = self.try_modify_combination(id, rule_ids);
        record_mutation("modify_combination", &result);
        result
    }

    fn try_modify_combination(&self, id: RuleId, rule_ids: &[RuleId]) -> Result<Rule> {
        if rule_ids.is_empty() {
            return Err(RuleError::InvalidInput("组合规则至少需要引用一条规则".to_string()));
        }

        let mut rule = self.store.get_rule(id)?;
        let RuleKind::Combination { combinator, .. } = rule.kind else {
            return Err(RuleError::InvalidInput(format!("规则 {} 不是组合规则", id)));
        };

        self.check_references(id, rule_ids)?;

        rule.kind = RuleKind::Combination {
            rule_ids: rule_ids.to_vec(),
            combinator,
        };
        rule.raw_text = combination_text(rule_ids);
        rule.updated_at = Utc::now();
        self.store.put_rule(rule.clone())?;

        info!(rule_id = id, references = ?rule_ids, "组合规则已修改");
        Ok(rule)
    }

    #[instrument(skip(self))]
    pub fn delete_rule(&self, id: RuleId) -> Result<()> {
        let result = self.store.delete_rule(id);
        record_mutation("delete", &result);
        result
    }

    pub fn get_rule(&self, id: RuleId) -> Result<Rule> {
        self.store.get_rule(id)
    }

    pub fn list_rules(&self) -> Result<Vec<Rule>> {
        self.store.list_rules()
    }

    // ==================== 评估 ====================

    /// 评估规则
    ///
    /// 组合规则会评估全部子规则（不短路）以收集完整的诊断信息，再按 AND 合并结果。
    #[instrument(skip(self, record))]
    pub fn evaluate_rule(&self, id: RuleId, record: &Record) -> EvaluationResult {
        let start = Instant::now();

        // 根规则只读取一次，名称、指标标签与评估使用同一份数据
        let (mut result, kind) = match self.store.get_rule(id) {
            Ok(rule) => {
                let mut result = EvaluationResult::new(id, rule.name.clone());
                let mut path = Vec::new();
                result.matched = self.evaluate_loaded(&rule, record, 0, &mut path, &mut result);
                (result, rule.kind_label())
            }
            Err(e) => {
                let mut result = EvaluationResult::new(id, String::new());
                result.push_fault(id, e);
                (result, "unknown")
            }
        };

        let elapsed = start.elapsed();
        result.evaluation_time_ms = elapsed.as_millis() as i64;

        let status = if result.has_faults() {
            "fault"
        } else if result.matched {
            "matched"
        } else {
            "not_matched"
        };
        record_rule_evaluation(kind, status, elapsed.as_secs_f64());

        if result.has_faults() {
            warn!(rule_id = id, faults = ?result.faults, "规则评估出现错误，结果按不匹配处理");
        } else {
            debug!(rule_id = id, matched = result.matched, "规则评估完成");
        }

        result
    }

    /// 读取并评估组合规则 `combination` 引用的规则
    fn evaluate_reference(
        &self,
        id: RuleId,
        combination: RuleId,
        record: &Record,
        depth: usize,
        path: &mut Vec<RuleId>,
        result: &mut EvaluationResult,
    ) -> bool {
        match self.store.get_rule(id) {
            Ok(rule) => self.evaluate_loaded(&rule, record, depth, path, result),
            Err(RuleError::RuleNotFound(_)) => {
                result.push_fault(
                    combination,
                    RuleError::DanglingReference {
                        combination,
                        missing: id,
                    },
                );
                false
            }
            Err(e) => {
                result.push_fault(id, e);
                false
            }
        }
    }

    /// 评估已读取的规则，`path` 为当前递归路径上的组合规则
    fn evaluate_loaded(
        &self,
        rule: &Rule,
        record: &Record,
        depth: usize,
        path: &mut Vec<RuleId>,
        result: &mut EvaluationResult,
    ) -> bool {
        let id = rule.id;

        if depth > self.config.max_combination_depth {
            result.push_fault(
                id,
                RuleError::DepthExceeded {
                    limit: self.config.max_combination_depth,
                },
            );
            return false;
        }

        // 创建时已检测环，这里防御存储被绕过引擎修改的情况
        if path.contains(&id) {
            let mut cycle = path.clone();
            cycle.push(id);
            result.push_fault(id, RuleError::CyclicReference(cycle));
            return false;
        }

        match &rule.kind {
            RuleKind::Simple { ast } => self.evaluate_simple(id, ast, record, result),
            RuleKind::Combination { rule_ids, .. } => {
                path.push(id);
                let mut matched = true;
                for child in rule_ids {
                    let child_matched =
                        self.evaluate_reference(*child, id, record, depth + 1, path, result);
                    matched &= child_matched;
                }
                path.pop();

                if self.config.trace_enabled {
                    result.evaluation_trace.push(format!(
                        "rule {}: AND 组合 {:?} => {}",
                        id,
                        rule_ids,
                        if matched { "MATCHED" } else { "NOT_MATCHED" }
                    ));
                }
                matched
            }
        }
    }

    fn evaluate_simple(
        &self,
        id: RuleId,
        ast: &Ast,
        record: &Record,
        result: &mut EvaluationResult,
    ) -> bool {
        let executor = RuleExecutor::new().with_trace_enabled(self.config.trace_enabled);

        let outcome = bind(ast, record).and_then(|expression| {
            debug!(rule_id = id, populated = %expression, "规则已代入记录值");
            let mut trace = Vec::new();
            let matched = executor.execute(&expression, &mut trace);
            result
                .evaluation_trace
                .extend(trace.into_iter().map(|line| format!("rule {}: {}", id, line)));
            matched
        });

        match outcome {
            Ok(matched) => matched,
            Err(e) => {
                result.push_fault(id, e);
                false
            }
        }
    }

    // ==================== 元数据 ====================

    /// 规则引用的全部属性，组合规则递归合并子规则的属性
    pub fn rule_fields(&self, id: RuleId) -> Result<BTreeSet<String>> {
        let mut fields = BTreeSet::new();
        let mut path = Vec::new();
        self.collect_rule_fields(id, None, 0, &mut path, &mut fields)?;
        Ok(fields)
    }

    fn collect_rule_fields(
        &self,
        id: RuleId,
        parent: Option<RuleId>,
        depth: usize,
        path: &mut Vec<RuleId>,
        fields: &mut BTreeSet<String>,
    ) -> Result<()> {
        if depth > self.config.max_combination_depth {
            return Err(RuleError::DepthExceeded {
                limit: self.config.max_combination_depth,
            });
        }
        if path.contains(&id) {
            let mut cycle = path.clone();
            cycle.push(id);
            return Err(RuleError::CyclicReference(cycle));
        }

        let rule = self.store.get_rule(id).map_err(|e| match (e, parent) {
            (RuleError::RuleNotFound(missing), Some(combination)) => {
                RuleError::DanglingReference {
                    combination,
                    missing,
                }
            }
            (e, _) => e,
        })?;

        match &rule.kind {
            RuleKind::Simple { ast } => collect_fields(ast, fields),
            RuleKind::Combination { rule_ids, .. } => {
                path.push(id);
                for child in rule_ids {
                    self.collect_rule_fields(*child, Some(id), depth + 1, path, fields)?;
                }
                path.pop();
            }
        }
        Ok(())
    }

    /// 将记录代入已存储的简单规则，返回绑定后的表达式
    pub fn populate(&self, id: RuleId, record: &Record) -> Result<BoundExpression> {
        match self.store.get_rule(id)?.kind {
            RuleKind::Simple { ast } => bind(&ast, record),
            RuleKind::Combination { .. } => Err(RuleError::NotSimpleRule(id)),
        }
    }

    // ==================== 内部辅助 ====================

    fn validate_text(&self, rule_text: &str) -> Result<Ast> {
        require_non_empty("规则文本", rule_text)?;
        let catalog = self.catalog.get_attributes()?;
        validate(rule_text, &catalog).inspect_err(|e| {
            warn!(error = %e, rule_text = %rule_text, "规则校验失败");
        })
    }

    /// 以 `id -> rule_ids` 替换引用图中的边后检测环
    fn check_references(&self, id: RuleId, rule_ids: &[RuleId]) -> Result<()> {
        let rules = self.store.list_rules()?;
        let mut graph = ReferenceGraph::from_rules(&rules);
        graph.set_references(id, rule_ids.to_vec());
        graph.ensure_acyclic(id)
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RuleError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}

fn record_mutation<T>(operation: &str, result: &Result<T>) {
    let status = match result {
        Ok(_) => "success",
        Err(e) => e.code(),
    };
    record_rule_mutation(operation, status);
}
