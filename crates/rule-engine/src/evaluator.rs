//! 条件评估器
//!
//! 实现单个比较的求值规则：
//! - 数字与数字：数值比较，相等判断允许 `f64::EPSILON` 误差
//! - 字符串与字符串：`=` / `!=` 精确相等，大小比较按字节字典序
//! - 数字与字符串：`=` / `!=` 在字符串可解析为数字时按数值比较，否则视为不相等；
//!   大小比较返回类型不匹配错误，不做隐式转换

use crate::ast::Scalar;
use crate::error::{Result, RuleError};
use crate::operators::Operator;
use std::cmp::Ordering;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `value` - 记录中绑定的字段值
    /// * `operator` - 操作符
    /// * `literal` - 规则中定义的比较值
    pub fn evaluate(value: &Scalar, operator: Operator, literal: &Scalar) -> Result<bool> {
        match operator {
            Operator::Eq => Ok(Self::eq(value, literal)),
            Operator::Neq => Ok(!Self::eq(value, literal)),
            Operator::Gt => Self::compare(value, operator, literal, Ordering::is_gt),
            Operator::Gte => Self::compare(value, operator, literal, Ordering::is_ge),
            Operator::Lt => Self::compare(value, operator, literal, Ordering::is_lt),
            Operator::Lte => Self::compare(value, operator, literal, Ordering::is_le),
        }
    }

    /// 相等比较
    fn eq(left: &Scalar, right: &Scalar) -> bool {
        match (left, right) {
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            // 数值比较需要统一转为浮点数，字符串一侧尝试解析
            _ => match (Self::as_f64(left), Self::as_f64(right)) {
                (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                _ => false,
            },
        }
    }

    /// 大小比较
    fn compare<F>(left: &Scalar, operator: Operator, right: &Scalar, cmp: F) -> Result<bool>
    where
        F: Fn(Ordering) -> bool,
    {
        let ordering = match (left, right) {
            (Scalar::Number(a), Scalar::Number(b)) => {
                a.partial_cmp(b).ok_or_else(|| {
                    RuleError::Evaluation(format!("无法比较数值 {} 与 {}", a, b))
                })?
            }
            (Scalar::Text(a), Scalar::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            _ => {
                return Err(RuleError::TypeMismatch {
                    operator: operator.to_string(),
                    left: left.type_name().to_string(),
                    right: right.type_name().to_string(),
                });
            }
        };

        Ok(cmp(ordering))
    }

    /// 尝试将值转换为 f64
    fn as_f64(value: &Scalar) -> Option<f64> {
        match value {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok().filter(|n: &f64| n.is_finite()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Scalar {
        Scalar::Number(n)
    }

    fn text(s: &str) -> Scalar {
        Scalar::from(s)
    }

    #[test]
    fn test_eq_numbers() {
        assert!(ConditionEvaluator::evaluate(&num(100.0), Operator::Eq, &num(100.0)).unwrap());
        assert!(!ConditionEvaluator::evaluate(&num(100.0), Operator::Eq, &num(100.5)).unwrap());
        assert!(ConditionEvaluator::evaluate(&num(100.0), Operator::Neq, &num(100.5)).unwrap());
    }

    #[test]
    fn test_eq_strings() {
        assert!(ConditionEvaluator::evaluate(&text("sales"), Operator::Eq, &text("sales")).unwrap());
        assert!(!ConditionEvaluator::evaluate(&text("sales"), Operator::Eq, &text("Sales")).unwrap());
        assert!(ConditionEvaluator::evaluate(&text("sales"), Operator::Neq, &text("hr")).unwrap());
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(ConditionEvaluator::evaluate(&num(35.0), Operator::Gt, &num(30.0)).unwrap());
        assert!(ConditionEvaluator::evaluate(&num(30.0), Operator::Gte, &num(30.0)).unwrap());
        assert!(ConditionEvaluator::evaluate(&num(20.0), Operator::Lt, &num(30.0)).unwrap());
        assert!(ConditionEvaluator::evaluate(&num(30.0), Operator::Lte, &num(30.0)).unwrap());
        assert!(!ConditionEvaluator::evaluate(&num(30.0), Operator::Gt, &num(30.0)).unwrap());
    }

    #[test]
    fn test_string_ordering_is_lexicographic() {
        assert!(ConditionEvaluator::evaluate(&text("beta"), Operator::Gt, &text("alpha")).unwrap());
        assert!(ConditionEvaluator::evaluate(&text("Zulu"), Operator::Lt, &text("alpha")).unwrap());
        // 字典序而非数值序
        assert!(ConditionEvaluator::evaluate(&text("10"), Operator::Lt, &text("9")).unwrap());
    }

    #[test]
    fn test_mixed_equality() {
        assert!(ConditionEvaluator::evaluate(&num(2134.0), Operator::Eq, &text("02134")).unwrap());
        assert!(!ConditionEvaluator::evaluate(&num(35.0), Operator::Eq, &text("sales")).unwrap());
        assert!(ConditionEvaluator::evaluate(&text("sales"), Operator::Neq, &num(35.0)).unwrap());
    }

    #[test]
    fn test_mixed_ordering_is_type_mismatch() {
        let err = ConditionEvaluator::evaluate(&text("sales"), Operator::Gt, &num(5.0)).unwrap_err();
        assert_eq!(
            err,
            RuleError::TypeMismatch {
                operator: ">".to_string(),
                left: "string".to_string(),
                right: "number".to_string(),
            }
        );
        assert!(ConditionEvaluator::evaluate(&num(5.0), Operator::Lte, &text("5")).is_err());
    }

    #[test]
    fn test_nan_ordering_is_error() {
        assert!(ConditionEvaluator::evaluate(&num(f64::NAN), Operator::Gt, &num(1.0)).is_err());
    }
}
