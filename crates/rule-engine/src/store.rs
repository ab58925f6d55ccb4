//! 规则存储与属性目录
//!
//! 引擎通过 `RuleStore` / `AttributeCatalog` 两个 trait 访问外部存储，自身不做缓存。
//! 这里同时提供基于 DashMap 与 RwLock 的内存实现，用于嵌入式场景和测试。

use crate::error::{Result, RuleError};
use crate::models::{Rule, RuleId, UNASSIGNED_ID};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{info, instrument, warn};

/// 规则存储
#[cfg_attr(test, mockall::automock)]
pub trait RuleStore: Send + Sync {
    /// 获取规则，不存在时返回 `RuleNotFound`
    fn get_rule(&self, id: RuleId) -> Result<Rule>;

    /// 写入规则；`id` 为 `UNASSIGNED_ID` 时分配新 ID，否则覆盖已有规则
    fn put_rule(&self, rule: Rule) -> Result<RuleId>;

    /// 删除规则，不存在时返回 `RuleNotFound`
    fn delete_rule(&self, id: RuleId) -> Result<()>;

    /// 按 ID 升序列出全部规则
    fn list_rules(&self) -> Result<Vec<Rule>>;
}

/// 属性目录：允许在规则中使用的属性白名单
pub trait AttributeCatalog: Send + Sync {
    fn get_attributes(&self) -> Result<Vec<String>>;

    fn set_attributes(&self, attributes: Vec<String>) -> Result<()>;
}

/// 内存规则存储
#[derive(Clone)]
pub struct InMemoryRuleStore {
    rules: Arc<DashMap<RuleId, Rule>>,
    /// 自增 ID，从 1 开始
    next_id: Arc<AtomicI64>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// 获取当前存储的规则数量
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains(&self, id: RuleId) -> bool {
        self.rules.contains_key(&id)
    }
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleStore for InMemoryRuleStore {
    fn get_rule(&self, id: RuleId) -> Result<Rule> {
        self.rules
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(RuleError::RuleNotFound(id))
    }

    #[instrument(skip(self, rule), fields(rule_id = rule.id, rule_name = %rule.name))]
    fn put_rule(&self, mut rule: Rule) -> Result<RuleId> {
        if rule.id == UNASSIGNED_ID {
            rule.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        } else {
            // 显式指定的 ID 之后不能再被自增分配
            self.next_id.fetch_max(rule.id + 1, Ordering::SeqCst);
            rule.updated_at = Utc::now();
        }

        let id = rule.id;
        self.rules.insert(id, rule);

        info!("规则已保存: {}", id);
        Ok(id)
    }

    #[instrument(skip(self))]
    fn delete_rule(&self, id: RuleId) -> Result<()> {
        if self.rules.remove(&id).is_some() {
            info!("规则已删除: {}", id);
            Ok(())
        } else {
            warn!("删除不存在的规则: {}", id);
            Err(RuleError::RuleNotFound(id))
        }
    }

    fn list_rules(&self) -> Result<Vec<Rule>> {
        let mut rules: Vec<Rule> = self.rules.iter().map(|r| r.value().clone()).collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }
}

/// 内存属性目录，保持插入顺序
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    attributes: Arc<RwLock<Vec<String>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用初始属性列表创建，重复项只保留第一次出现
    pub fn with_attributes(attributes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let catalog = Self::new();
        catalog.replace(attributes.into_iter().map(Into::into).collect());
        catalog
    }

    fn replace(&self, attributes: Vec<String>) {
        let mut deduped: Vec<String> = Vec::with_capacity(attributes.len());
        for attr in attributes {
            if !deduped.contains(&attr) {
                deduped.push(attr);
            }
        }
        *self.attributes.write() = deduped;
    }
}

impl AttributeCatalog for InMemoryCatalog {
    fn get_attributes(&self) -> Result<Vec<String>> {
        Ok(self.attributes.read().clone())
    }

    #[instrument(skip(self, attributes), fields(count = attributes.len()))]
    fn set_attributes(&self, attributes: Vec<String>) -> Result<()> {
        self.replace(attributes);
        info!("属性目录已更新");
        Ok(())
    }
}
