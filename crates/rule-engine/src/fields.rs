//! 规则字段提取
//!
//! 列出规则引用的全部属性名，供前端动态生成输入表单。
//! 只收集比较左侧的属性，不包括字面量、操作符和连接词。

use crate::ast::Ast;
use crate::error::Result;
use crate::parser::parse;
use std::collections::BTreeSet;

/// 提取 AST 中引用的属性名（去重且有序）
pub fn extract_fields(ast: &Ast) -> BTreeSet<String> {
    let mut fields = BTreeSet::new();
    collect_fields(ast, &mut fields);
    fields
}

/// 解析规则文本后提取属性名
pub fn extract_fields_from_text(rule_text: &str) -> Result<BTreeSet<String>> {
    let ast = parse(rule_text)?;
    Ok(extract_fields(&ast))
}

/// 把 AST 中的属性名并入已有集合，组合规则用它合并子规则的字段
pub fn collect_fields(ast: &Ast, fields: &mut BTreeSet<String>) {
    for cmp in ast.comparisons() {
        fields.insert(cmp.attribute.clone());
    }
}
