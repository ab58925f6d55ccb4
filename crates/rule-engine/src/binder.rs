//! 值绑定
//!
//! 把记录中的字段值代入 AST，生成一份临时的绑定表达式，存储的 AST 不会被修改。
//! 看起来像数字的值按数字绑定，其余按带引号的字符串绑定，
//! 这决定了后续比较是数值比较还是字符串比较。

use crate::ast::{Ast, Node, NodeId, Scalar};
use crate::error::{Result, RuleError};
use crate::models::Record;
use crate::operators::{LogicalOperator, Operator};
use crate::parser::parse;
use std::fmt;

/// 绑定后的比较：左侧为记录中的值
#[derive(Debug, Clone, PartialEq)]
pub struct BoundComparison {
    pub attribute: String,
    pub value: Scalar,
    pub operator: Operator,
    pub literal: Scalar,
}

impl fmt::Display for BoundComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.value, self.operator, self.literal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundNode {
    Comparison(BoundComparison),
    Logical {
        operator: LogicalOperator,
        left: NodeId,
        right: NodeId,
    },
}

/// 绑定表达式，与源 AST 拥有相同的节点布局
#[derive(Debug, Clone, PartialEq)]
pub struct BoundExpression {
    nodes: Vec<BoundNode>,
    root: NodeId,
}

impl BoundExpression {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &BoundNode {
        &self.nodes[id.index()]
    }

    fn fmt_node(&self, id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node(id) {
            BoundNode::Comparison(cmp) => write!(f, "{}", cmp),
            BoundNode::Logical {
                operator,
                left,
                right,
            } => {
                write!(f, "(")?;
                self.fmt_node(*left, f)?;
                write!(f, " {} ", operator)?;
                self.fmt_node(*right, f)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for BoundExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(self.root, f)
    }
}

/// 将记录绑定到 AST
pub fn bind(ast: &Ast, record: &Record) -> Result<BoundExpression> {
    let nodes = ast
        .nodes()
        .iter()
        .map(|node| match node {
            Node::Comparison(cmp) => {
                let value = record
                    .get(&cmp.attribute)
                    .ok_or_else(|| RuleError::MissingField(cmp.attribute.clone()))?;
                Ok(BoundNode::Comparison(BoundComparison {
                    attribute: cmp.attribute.clone(),
                    value: classify(value),
                    operator: cmp.operator,
                    literal: cmp.literal.clone(),
                }))
            }
            Node::Logical {
                operator,
                left,
                right,
            } => Ok(BoundNode::Logical {
                operator: *operator,
                left: *left,
                right: *right,
            }),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(BoundExpression {
        nodes,
        root: ast.root(),
    })
}

/// 解析规则文本并绑定记录
pub fn populate(rule_text: &str, record: &Record) -> Result<BoundExpression> {
    let ast = parse(rule_text)?;
    bind(&ast, record)
}

/// 判定记录值的绑定类型：能解析为有限数值的字符串按数字处理
fn classify(value: &Scalar) -> Scalar {
    match value {
        Scalar::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Scalar::Number(n),
            _ => Scalar::Text(s.clone()),
        },
        Scalar::Number(n) => Scalar::Number(*n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_binding() {
        let bound = populate("age > 30", &Record::new().with("age", 35)).unwrap();
        assert_eq!(bound.to_string(), "35 > 30");
        match bound.node(bound.root()) {
            BoundNode::Comparison(cmp) => assert_eq!(cmp.value, Scalar::Number(35.0)),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_string_binding_is_quoted() {
        let bound = populate("department = sales", &Record::new().with("department", "sales")).unwrap();
        assert_eq!(bound.to_string(), "'sales' = 'sales'");
        match bound.node(bound.root()) {
            BoundNode::Comparison(cmp) => {
                assert_eq!(cmp.value, Scalar::from("sales"));
                assert_eq!(cmp.literal, Scalar::from("sales"));
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_numeric_looking_string_binds_as_number() {
        let bound = populate("salary >= 50000", &Record::new().with("salary", " 52000.5 ")).unwrap();
        assert_eq!(bound.to_string(), "52000.5 >= 50000");
    }

    #[test]
    fn test_non_finite_text_stays_text() {
        let bound = populate("department = inf", &Record::new().with("department", "inf")).unwrap();
        assert_eq!(bound.to_string(), "'inf' = 'inf'");
    }

    #[test]
    fn test_missing_field() {
        let err = populate(
            "age > 30 AND department = 'sales'",
            &Record::new().with("age", 35),
        )
        .unwrap_err();
        assert_eq!(err, RuleError::MissingField("department".to_string()));
    }

    #[test]
    fn test_bind_does_not_mutate_ast() {
        let ast = parse("age > 30 OR department = 'sales'").unwrap();
        let before = ast.clone();
        let record = Record::new().with("age", 20).with("department", "sales");

        let bound = bind(&ast, &record).unwrap();

        assert_eq!(ast, before);
        assert_eq!(bound.to_string(), "(20 > 30 OR 'sales' = 'sales')");
    }
}
