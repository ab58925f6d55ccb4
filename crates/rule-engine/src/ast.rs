//! 规则抽象语法树
//!
//! AST 以 arena 形式存放：每条规则拥有一个节点表，子节点通过下标引用。
//! 节点总是先于父节点入表，因此子节点下标严格小于父节点下标，
//! 这保证了树是有限且无环的；反序列化时会重新校验该不变量。

use crate::error::{Result, RuleError};
use crate::operators::{LogicalOperator, Operator};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 单条规则允许的最大节点数
pub const MAX_NODES: usize = 1024;

/// 节点下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// 标量值：规则中的字面量与记录中的字段值共用此类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "string",
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // 整数值不输出小数部分，保证渲染结果可以被重新解析
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        }
    }
}

/// 比较条件：属性总在左侧，字面量总在右侧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub attribute: String,
    pub operator: Operator,
    pub literal: Scalar,
}

impl Comparison {
    pub fn new(attribute: impl Into<String>, operator: Operator, literal: impl Into<Scalar>) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            literal: literal.into(),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute, self.operator, self.literal)
    }
}

/// AST 节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Comparison(Comparison),
    Logical {
        operator: LogicalOperator,
        left: NodeId,
        right: NodeId,
    },
}

/// 规则的抽象语法树
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AstParts", into = "AstParts")]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Ast {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 按入表顺序遍历所有比较条件
    pub fn comparisons(&self) -> impl Iterator<Item = &Comparison> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Comparison(cmp) => Some(cmp),
            Node::Logical { .. } => None,
        })
    }

    fn fmt_node(&self, id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node(id) {
            Node::Comparison(cmp) => write!(f, "{}", cmp),
            Node::Logical {
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

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(self.root, f)
    }
}

/// AST 构建器，由解析器使用
#[derive(Debug, Default)]
pub struct AstBuilder {
    nodes: Vec<Node>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comparison(&mut self, comparison: Comparison, position: usize) -> Result<NodeId> {
        self.push(Node::Comparison(comparison), position)
    }

    pub fn logical(
        &mut self,
        operator: LogicalOperator,
        left: NodeId,
        right: NodeId,
        position: usize,
    ) -> Result<NodeId> {
        self.push(
            Node::Logical {
                operator,
                left,
                right,
            },
            position,
        )
    }

    pub fn finish(self, root: NodeId) -> Ast {
        Ast {
            nodes: self.nodes,
            root,
        }
    }

    fn push(&mut self, node: Node, position: usize) -> Result<NodeId> {
        if self.nodes.len() >= MAX_NODES {
            return Err(RuleError::syntax(
                position,
                format!("规则过长，最多允许 {} 个节点", MAX_NODES),
            ));
        }
        self.nodes.push(node);
        Ok(NodeId(self.nodes.len() - 1))
    }
}

/// 序列化形式
#[derive(Serialize, Deserialize)]
struct AstParts {
    nodes: Vec<Node>,
    root: NodeId,
}

impl From<Ast> for AstParts {
    fn from(ast: Ast) -> Self {
        Self {
            nodes: ast.nodes,
            root: ast.root,
        }
    }
}

impl TryFrom<AstParts> for Ast {
    type Error = String;

    fn try_from(parts: AstParts) -> std::result::Result<Self, Self::Error> {
        if parts.nodes.is_empty() || parts.nodes.len() > MAX_NODES {
            return Err(format!("节点数量无效: {}", parts.nodes.len()));
        }
        // 构建器总是最后写入根节点
        let last = parts.nodes.len() - 1;
        if parts.root.index() != last {
            return Err(format!("根节点必须是最后一个节点: {}", parts.root.index()));
        }

        // 除根节点外，每个节点恰好作为一次子节点出现，否则不是树
        let mut referenced = vec![false; parts.nodes.len()];
        for (i, node) in parts.nodes.iter().enumerate() {
            let Node::Logical { left, right, .. } = node else {
                continue;
            };
            for child in [left.index(), right.index()] {
                if child >= i {
                    return Err(format!("节点 {} 的子节点下标必须小于自身", i));
                }
                if referenced[child] {
                    return Err(format!("节点 {} 被多次引用", child));
                }
                referenced[child] = true;
            }
        }
        if let Some(orphan) = referenced[..last].iter().position(|r| !r) {
            return Err(format!("节点 {} 无法从根节点到达", orphan));
        }

        Ok(Self {
            nodes: parts.nodes,
            root: parts.root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ast() -> Ast {
        let mut builder = AstBuilder::new();
        let age = builder
            .comparison(Comparison::new("age", Operator::Gt, 30), 0)
            .unwrap();
        let dept = builder
            .comparison(Comparison::new("department", Operator::Eq, "sales"), 0)
            .unwrap();
        let root = builder.logical(LogicalOperator::And, age, dept, 0).unwrap();
        builder.finish(root)
    }

    #[test]
    fn test_display() {
        assert_eq!(sample_ast().to_string(), "(age > 30 AND department = 'sales')");
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Number(50000.0).to_string(), "50000");
        assert_eq!(Scalar::Number(2.5).to_string(), "2.5");
        assert_eq!(Scalar::from("o'neil").to_string(), r"'o\'neil'");
    }

    #[test]
    fn test_serde_round_trip() {
        let ast = sample_ast();
        let json = serde_json::to_string(&ast).unwrap();
        let parsed: Ast = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ast);
    }

    #[test]
    fn test_deserialize_rejects_forward_reference() {
        // 子节点下标指向自身之后的节点，可能构成环
        let json = r#"
        {
            "nodes": [
                {"type": "logical", "operator": "AND", "left": 1, "right": 0},
                {"type": "comparison", "attribute": "age", "operator": "gt", "literal": 30}
            ],
            "root": 0
        }
        "#;
        let result: std::result::Result<Ast, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_shared_child() {
        // 两个 AND 共用同一比较节点，展开后规模按层数指数增长
        let json = r#"
        {
            "nodes": [
                {"type": "comparison", "attribute": "age", "operator": "gt", "literal": 1},
                {"type": "logical", "operator": "AND", "left": 0, "right": 0},
                {"type": "logical", "operator": "AND", "left": 1, "right": 1}
            ],
            "root": 2
        }
        "#;
        let result: std::result::Result<Ast, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_unreachable_node() {
        let json = r#"
        {
            "nodes": [
                {"type": "comparison", "attribute": "age", "operator": "gt", "literal": 1},
                {"type": "comparison", "attribute": "bonus", "operator": "gt", "literal": 1}
            ],
            "root": 0
        }
        "#;
        let result: std::result::Result<Ast, _> = serde_json::from_str(json);
        assert!(result.is_err());

        // 根节点不在末尾时同样拒绝，即使其余节点都可达
        let json = r#"
        {
            "nodes": [
                {"type": "comparison", "attribute": "age", "operator": "gt", "literal": 1},
                {"type": "comparison", "attribute": "bonus", "operator": "gt", "literal": 1},
                {"type": "logical", "operator": "OR", "left": 0, "right": 1},
                {"type": "comparison", "attribute": "salary", "operator": "gt", "literal": 1}
            ],
            "root": 2
        }
        "#;
        let result: std::result::Result<Ast, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_parsed_ast_survives_validation() {
        let ast = crate::parser::parse("(age > 1 OR (salary > 2 AND experience > 3)) AND department = x")
            .unwrap();
        let json = serde_json::to_string(&ast).unwrap();
        let parsed: Ast = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ast);
    }

    #[test]
    fn test_deserialize_rejects_empty() {
        let result: std::result::Result<Ast, _> = serde_json::from_str(r#"{"nodes": [], "root": 0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_comparisons_iter() {
        let ast = sample_ast();
        let attrs: Vec<&str> = ast.comparisons().map(|c| c.attribute.as_str()).collect();
        assert_eq!(attrs, vec!["age", "department"]);
    }
}
