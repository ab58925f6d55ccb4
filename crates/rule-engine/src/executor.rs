//! 规则执行器
//!
//! 对绑定表达式做短路求值：AND 遇到 false、OR 遇到 true 时不再评估右侧，
//! 被跳过的分支不会产生任何错误。

use crate::ast::NodeId;
use crate::binder::{BoundComparison, BoundExpression, BoundNode};
use crate::error::Result;
use crate::evaluator::ConditionEvaluator;
use crate::operators::LogicalOperator;

/// 评估绑定表达式
pub fn evaluate(expression: &BoundExpression) -> Result<bool> {
    RuleExecutor::new().execute(expression, &mut Vec::new())
}

/// 规则执行器
pub struct RuleExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self {
            trace_enabled: false,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// 按配置决定是否启用追踪
    pub fn with_trace_enabled(mut self, enabled: bool) -> Self {
        self.trace_enabled = enabled;
        self
    }

    /// 执行表达式求值，追踪信息追加到 `trace`
    pub fn execute(&self, expression: &BoundExpression, trace: &mut Vec<String>) -> Result<bool> {
        self.evaluate_node(expression, expression.root(), trace, "root")
    }

    fn evaluate_node(
        &self,
        expression: &BoundExpression,
        id: NodeId,
        trace: &mut Vec<String>,
        path: &str,
    ) -> Result<bool> {
        match expression.node(id) {
            BoundNode::Comparison(cmp) => self.evaluate_comparison(cmp, trace, path),
            BoundNode::Logical {
                operator,
                left,
                right,
            } => {
                let left_path = format!("{}.left", path);
                let left_matched = self.evaluate_node(expression, *left, trace, &left_path)?;

                let short_circuit = match operator {
                    LogicalOperator::And => !left_matched,
                    LogicalOperator::Or => left_matched,
                };
                if short_circuit {
                    if self.trace_enabled {
                        trace.push(format!("{}: {} 短路 - 跳过右侧", path, operator));
                    }
                    return Ok(left_matched);
                }

                let right_path = format!("{}.right", path);
                self.evaluate_node(expression, *right, trace, &right_path)
            }
        }
    }

    fn evaluate_comparison(
        &self,
        cmp: &BoundComparison,
        trace: &mut Vec<String>,
        path: &str,
    ) -> Result<bool> {
        let matched = ConditionEvaluator::evaluate(&cmp.value, cmp.operator, &cmp.literal)?;

        if self.trace_enabled {
            trace.push(format!(
                "{}: {} ({}) {} {} => {}",
                path,
                cmp.attribute,
                cmp.value,
                cmp.operator,
                cmp.literal,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            ));
        }

        Ok(matched)
    }
}

impl Default for RuleExecutor {
    fn default() -> Self {
        Self::new()
    }
}
