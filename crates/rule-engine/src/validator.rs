//! 规则校验器
//!
//! 在规则写入存储前确认语法正确，且引用的每个属性都在属性目录中。
//! 任一未知属性都会使整条规则被拒绝。

use crate::ast::Ast;
use crate::error::{Result, RuleError};
use crate::fields::extract_fields;
use crate::lexer::is_keyword;
use crate::parser::parse;
use regex::Regex;
use std::sync::LazyLock;

static ATTRIBUTE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("attribute name pattern is valid")
});

/// 属性名是否合法：标识符格式且不是连接词关键字
pub fn is_valid_attribute_name(name: &str) -> bool {
    ATTRIBUTE_NAME.is_match(name) && !is_keyword(name)
}

/// 校验规则文本，成功时返回解析后的 AST 供调用方直接存储
pub fn validate(rule_text: &str, catalog: &[String]) -> Result<Ast> {
    let ast = parse(rule_text)?;

    let unknown: Vec<String> = extract_fields(&ast)
        .into_iter()
        .filter(|field| !catalog.iter().any(|attr| attr == field))
        .collect();

    if !unknown.is_empty() {
        return Err(RuleError::InvalidAttribute(unknown));
    }

    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<String> {
        ["age", "department", "salary", "experience"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_valid_rule() {
        let ast = validate("age > 30 AND department = 'sales'", &catalog()).unwrap();
        assert_eq!(ast.len(), 3);
    }

    #[test]
    fn test_unknown_attribute() {
        let err = validate("age > 30 AND bonus > 100", &catalog()).unwrap_err();
        assert_eq!(err, RuleError::InvalidAttribute(vec!["bonus".to_string()]));
    }

    #[test]
    fn test_reports_all_unknown_attributes() {
        let err = validate("level = 3 OR age > 30 AND bonus > 100", &catalog()).unwrap_err();
        assert_eq!(
            err,
            RuleError::InvalidAttribute(vec!["bonus".to_string(), "level".to_string()])
        );
    }

    #[test]
    fn test_bareword_literal_not_checked() {
        // 右侧的 sales 是字面量，不是属性
        assert!(validate("department = sales", &catalog()).is_ok());
    }

    #[test]
    fn test_syntax_error_before_catalog_check() {
        let err = validate("bonus >", &catalog()).unwrap_err();
        assert!(matches!(err, RuleError::Syntax { .. }));
    }

    #[test]
    fn test_empty_catalog_rejects_everything() {
        assert!(validate("age > 30", &[]).is_err());
    }

    #[test]
    fn test_attribute_name_format() {
        assert!(is_valid_attribute_name("age"));
        assert!(is_valid_attribute_name("_internal_score2"));
        assert!(!is_valid_attribute_name("2fast"));
        assert!(!is_valid_attribute_name("first-name"));
        assert!(!is_valid_attribute_name(""));
        assert!(!is_valid_attribute_name("AND"));
        assert!(!is_valid_attribute_name("or"));
    }
}
