//! 组合规则引用图
//!
//! 组合规则通过 ID 引用其他规则，引用关系构成一张有向图，独立于 AST 存放。
//! 在写入组合规则前做深度优先遍历检测环，保证图始终是 DAG。

use crate::error::{Result, RuleError};
use crate::models::{Rule, RuleId};
use std::collections::{HashMap, HashSet};

/// 规则引用图
#[derive(Debug, Default, Clone)]
pub struct ReferenceGraph {
    /// rule_id -> 直接引用的规则
    edges: HashMap<RuleId, Vec<RuleId>>,
}

impl ReferenceGraph {
    /// 从规则列表构建引用图（只有组合规则产生边）
    pub fn from_rules<'a>(rules: impl IntoIterator<Item = &'a Rule>) -> Self {
        let mut graph = Self::default();
        for rule in rules {
            if rule.is_combination() {
                graph.set_references(rule.id, rule.referenced_ids().to_vec());
            }
        }
        graph
    }

    /// 设置（或替换）某规则的直接引用
    pub fn set_references(&mut self, rule_id: RuleId, references: Vec<RuleId>) {
        self.edges.insert(rule_id, references);
    }

    /// 获取某规则的直接引用
    pub fn references(&self, rule_id: RuleId) -> &[RuleId] {
        self.edges
            .get(&rule_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// 查找从 `start` 出发可达的环，返回环上的路径（首尾为同一规则）
    pub fn find_cycle_from(&self, start: RuleId) -> Option<Vec<RuleId>> {
        // 显式栈模拟递归：(节点, 下一个待访问的子节点下标)
        let mut stack: Vec<(RuleId, usize)> = vec![(start, 0)];
        let mut visiting: HashSet<RuleId> = HashSet::from([start]);
        let mut done: HashSet<RuleId> = HashSet::new();

        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            let children = self.references(node);

            if *next >= children.len() {
                stack.pop();
                visiting.remove(&node);
                done.insert(node);
                continue;
            }

            let child = children[*next];
            *next += 1;

            if visiting.contains(&child) {
                let from = stack.iter().position(|(id, _)| *id == child).unwrap_or(0);
                let mut cycle: Vec<RuleId> = stack[from..].iter().map(|(id, _)| *id).collect();
                cycle.push(child);
                return Some(cycle);
            }

            if !done.contains(&child) {
                visiting.insert(child);
                stack.push((child, 0));
            }
        }

        None
    }

    /// 确认从 `start` 出发不存在环
    pub fn ensure_acyclic(&self, start: RuleId) -> Result<()> {
        match self.find_cycle_from(start) {
            Some(cycle) => Err(RuleError::CyclicReference(cycle)),
            None => Ok(()),
        }
    }
}
