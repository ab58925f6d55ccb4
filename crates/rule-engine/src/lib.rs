//! 资格规则引擎
//!
//! 以类 SQL 的文本表达式描述资格规则，提供：
//! - 规则文本解析为 AST，并按属性白名单校验
//! - 记录值绑定与短路求值
//! - 规则按 AND 组合，写入前检测循环引用
//! - 评估错误降级为不匹配，错误随结果返回

pub mod ast;
pub mod binder;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod fields;
pub mod graph;
pub mod lexer;
pub mod models;
pub mod operators;
pub mod parser;
pub mod store;
pub mod validator;

pub use ast::{Ast, Comparison, Node, NodeId, Scalar};
pub use binder::{BoundExpression, bind, populate};
pub use engine::RuleEngine;
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::{RuleExecutor, evaluate};
pub use fields::{extract_fields, extract_fields_from_text};
pub use graph::ReferenceGraph;
pub use models::{EvaluationFault, EvaluationResult, Record, Rule, RuleId, RuleKind};
pub use operators::{LogicalOperator, Operator};
pub use parser::parse;
pub use store::{AttributeCatalog, InMemoryCatalog, InMemoryRuleStore, RuleStore};
pub use validator::validate;
