//! 规则引擎错误类型

use crate::models::RuleId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("规则语法错误 (位置 {position}): {message}")]
    Syntax { position: usize, message: String },

    #[error("未知属性: {}", .0.join(", "))]
    InvalidAttribute(Vec<String>),

    #[error("记录缺少字段: {0}")]
    MissingField(String),

    #[error("类型不匹配: 操作符 {operator} 无法比较 {left} 与 {right}")]
    TypeMismatch {
        operator: String,
        left: String,
        right: String,
    },

    #[error("规则执行失败: {0}")]
    Evaluation(String),

    #[error("组合规则 {combination} 引用了不存在的规则 {missing}")]
    DanglingReference { combination: RuleId, missing: RuleId },

    #[error("组合规则存在循环引用: {}", format_path(.0))]
    CyclicReference(Vec<RuleId>),

    #[error("组合规则嵌套超过最大深度 {limit}")]
    DepthExceeded { limit: usize },

    #[error("规则未找到: {0}")]
    RuleNotFound(RuleId),

    #[error("规则 {0} 是组合规则，不能按文本修改")]
    NotSimpleRule(RuleId),

    #[error("无效的属性名: {0}")]
    InvalidAttributeName(String),

    #[error("属性已存在: {0}")]
    DuplicateAttribute(String),

    #[error("属性不存在: {0}")]
    AttributeNotFound(String),

    #[error("无效的记录: {0}")]
    InvalidRecord(String),

    #[error("无效的参数: {0}")]
    InvalidInput(String),

    #[error("存储错误: {0}")]
    Storage(String),

    /// 写入后校验失败且回滚也失败，`cause` 为原始校验错误
    #[error("{cause}；回滚失败: {rollback}")]
    RollbackFailed {
        cause: Box<RuleError>,
        rollback: Box<RuleError>,
    },
}

impl RuleError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }

    /// 稳定的错误码，用于日志和对外展示
    pub fn code(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "syntax_error",
            Self::InvalidAttribute(_) => "invalid_attribute",
            Self::MissingField(_) => "missing_field",
            Self::TypeMismatch { .. } | Self::Evaluation(_) => "evaluation_error",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::CyclicReference(_) => "cyclic_reference",
            Self::DepthExceeded { .. } => "depth_exceeded",
            Self::RuleNotFound(_) => "rule_not_found",
            Self::NotSimpleRule(_) => "not_simple_rule",
            Self::InvalidAttributeName(_) => "invalid_attribute_name",
            Self::DuplicateAttribute(_) => "duplicate_attribute",
            Self::AttributeNotFound(_) => "attribute_not_found",
            Self::InvalidRecord(_) => "invalid_record",
            Self::InvalidInput(_) => "invalid_input",
            Self::Storage(_) => "storage_error",
            Self::RollbackFailed { cause, .. } => cause.code(),
        }
    }
}

fn format_path(path: &[RuleId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, RuleError>;
