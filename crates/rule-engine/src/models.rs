//! 规则引擎领域模型

use crate::ast::{Ast, Scalar};
use crate::error::{Result, RuleError};
use crate::operators::LogicalOperator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;

/// 规则 ID，由存储分配
pub type RuleId = i64;

/// 尚未分配 ID 的规则使用此值，写入存储时会分配新 ID
pub const UNASSIGNED_ID: RuleId = 0;

/// 规则定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub raw_text: String,
    pub kind: RuleKind,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// 由解析后的 AST 创建简单规则
    pub fn simple(name: impl Into<String>, raw_text: impl Into<String>, ast: Ast) -> Self {
        let now = Utc::now();
        Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            raw_text: raw_text.into(),
            kind: RuleKind::Simple { ast },
            created_at: now,
            updated_at: now,
        }
    }

    /// 创建按 AND 组合其他规则的组合规则
    pub fn combination(name: impl Into<String>, rule_ids: Vec<RuleId>) -> Self {
        let now = Utc::now();
        Self {
            id: UNASSIGNED_ID,
            name: name.into(),
            raw_text: combination_text(&rule_ids),
            kind: RuleKind::Combination {
                rule_ids,
                combinator: LogicalOperator::And,
            },
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_combination(&self) -> bool {
        matches!(self.kind, RuleKind::Combination { .. })
    }

    /// 组合规则直接引用的规则 ID；简单规则返回空切片
    pub fn referenced_ids(&self) -> &[RuleId] {
        match &self.kind {
            RuleKind::Combination { rule_ids, .. } => rule_ids,
            RuleKind::Simple { .. } => &[],
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            RuleKind::Simple { .. } => "simple",
            RuleKind::Combination { .. } => "combination",
        }
    }
}

/// 组合规则的展示文本
pub fn combination_text(rule_ids: &[RuleId]) -> String {
    let ids: Vec<String> = rule_ids.iter().map(|id| id.to_string()).collect();
    format!("Combination of rules: [{}]", ids.join(", "))
}

/// 规则类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    Simple {
        ast: Ast,
    },
    Combination {
        rule_ids: Vec<RuleId>,
        combinator: LogicalOperator,
    },
}

/// 评估记录 - 调用方提供的属性值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: HashMap<String, Scalar>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式添加字段
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Scalar>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.values.get(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 从 JSON 对象字符串创建
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| RuleError::InvalidRecord(e.to_string()))?;
        Self::try_from(value)
    }
}

impl TryFrom<Value> for Record {
    type Error = RuleError;

    /// 只接受字段值为数字或字符串的 JSON 对象
    fn try_from(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(RuleError::InvalidRecord("记录必须是 JSON 对象".to_string()));
        };

        let mut record = Self::new();
        for (field, value) in map {
            let scalar = match value {
                Value::Number(n) => n.as_f64().map(Scalar::Number).ok_or_else(|| {
                    RuleError::InvalidRecord(format!("字段 '{}' 的数值无法表示", field))
                })?,
                Value::String(s) => Scalar::Text(s),
                other => {
                    return Err(RuleError::InvalidRecord(format!(
                        "字段 '{}' 必须是数字或字符串，实际为 {}",
                        field,
                        json_type_name(&other)
                    )));
                }
            };
            record.values.insert(field, scalar);
        }
        Ok(record)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 评估过程中出现的错误，附带出错规则的 ID
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationFault {
    pub rule_id: RuleId,
    #[serde(serialize_with = "serialize_error")]
    pub error: RuleError,
}

fn serialize_error<S: Serializer>(error: &RuleError, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct;

    let mut state = serializer.serialize_struct("RuleError", 2)?;
    state.serialize_field("code", error.code())?;
    state.serialize_field("message", &error.to_string())?;
    state.end()
}

/// 评估结果
///
/// 评估错误不会中断调用方：出错的规则按不匹配处理，错误记录在 `faults` 中。
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    pub rule_id: RuleId,
    pub rule_name: String,
    pub faults: Vec<EvaluationFault>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_ms: i64,
}

impl EvaluationResult {
    pub fn new(rule_id: RuleId, rule_name: String) -> Self {
        Self {
            matched: false,
            rule_id,
            rule_name,
            faults: Vec::new(),
            evaluation_trace: Vec::new(),
            evaluation_time_ms: 0,
        }
    }

    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }

    pub fn push_fault(&mut self, rule_id: RuleId, error: RuleError) {
        self.faults.push(EvaluationFault { rule_id, error });
    }

    /// 是否包含指定错误码的错误
    pub fn has_fault_code(&self, code: &str) -> bool {
        self.faults.iter().any(|f| f.error.code() == code)
    }
}
