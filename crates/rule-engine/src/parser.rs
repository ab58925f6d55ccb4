//! 规则解析器
//!
//! 递归下降解析，语法如下：
//!
//! ```text
//! expr       := term ( (AND|OR) term )*
//! term       := comparison | '(' expr ')'
//! comparison := IDENT COMPOP LITERAL
//! LITERAL    := NUMBER | STRING | IDENT
//! ```
//!
//! AND 与 OR 优先级相同，从左到右结合；括号只用于分组。

use crate::ast::{Ast, AstBuilder, Comparison, NodeId, Scalar};
use crate::error::{Result, RuleError};
use crate::lexer::{Spanned, Token, tokenize};
use crate::operators::LogicalOperator;

/// 括号最大嵌套层数
pub const MAX_NESTING: usize = 64;

/// 解析规则文本为 AST
pub fn parse(rule_text: &str) -> Result<Ast> {
    let tokens = tokenize(rule_text)?;
    if tokens.is_empty() {
        return Err(RuleError::syntax(0, "规则文本为空"));
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        end: rule_text.len(),
        depth: 0,
        builder: AstBuilder::new(),
    };

    let root = parser.parse_expr()?;

    if let Some(extra) = parser.peek() {
        let message = match extra.token {
            Token::RParen => "括号不匹配: 多余的 ')'".to_string(),
            ref other => format!("期望 AND 或 OR，实际为 {}", other.describe()),
        };
        return Err(RuleError::syntax(extra.position, message));
    }

    Ok(parser.builder.finish(root))
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    /// 文本末尾位置，用于报告意外结束
    end: usize,
    depth: usize,
    builder: AstBuilder,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_more(&mut self, expected: &str) -> Result<&'a Spanned> {
        self.advance()
            .ok_or_else(|| RuleError::syntax(self.end, format!("规则意外结束，期望{}", expected)))
    }

    fn parse_expr(&mut self) -> Result<NodeId> {
        let mut left = self.parse_term()?;

        while let Some(spanned) = self.peek() {
            let operator = match spanned.token {
                Token::And => LogicalOperator::And,
                Token::Or => LogicalOperator::Or,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = self.builder.logical(operator, left, right, spanned.position)?;
        }

        Ok(left)
    }

    fn parse_term(&mut self) -> Result<NodeId> {
        let spanned = self.expect_more("比较条件或 '('")?;

        match &spanned.token {
            Token::LParen => {
                self.depth += 1;
                if self.depth > MAX_NESTING {
                    return Err(RuleError::syntax(
                        spanned.position,
                        format!("括号嵌套超过 {} 层", MAX_NESTING),
                    ));
                }
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some(Spanned {
                        token: Token::RParen,
                        ..
                    }) => {
                        self.depth -= 1;
                        Ok(inner)
                    }
                    Some(other) => Err(RuleError::syntax(
                        other.position,
                        format!("期望 ')'，实际为 {}", other.token.describe()),
                    )),
                    None => Err(RuleError::syntax(spanned.position, "括号不匹配: 缺少 ')'")),
                }
            }
            Token::Ident(attribute) => self.parse_comparison(attribute, spanned.position),
            Token::Number(_) | Token::Str(_) => Err(RuleError::syntax(
                spanned.position,
                format!("比较左侧必须是属性名，实际为 {}", spanned.token.describe()),
            )),
            other => Err(RuleError::syntax(
                spanned.position,
                format!("期望比较条件，实际为 {}", other.describe()),
            )),
        }
    }

    fn parse_comparison(&mut self, attribute: &str, position: usize) -> Result<NodeId> {
        let op_token = self.expect_more("比较操作符")?;
        let operator = match op_token.token {
            Token::Op(op) => op,
            ref other => {
                return Err(RuleError::syntax(
                    op_token.position,
                    format!("属性 '{}' 后缺少比较操作符，实际为 {}", attribute, other.describe()),
                ));
            }
        };

        let literal_token = self.expect_more("比较值")?;
        let literal = match &literal_token.token {
            Token::Number(n) => Scalar::Number(*n),
            Token::Str(s) => Scalar::Text(s.clone()),
            // 右侧未加引号的单词视为字符串字面量
            Token::Ident(word) => Scalar::Text(word.clone()),
            other => {
                return Err(RuleError::syntax(
                    literal_token.position,
                    format!("期望比较值，实际为 {}", other.describe()),
                ));
            }
        };

        self.builder.comparison(
            Comparison {
                attribute: attribute.to_string(),
                operator,
                literal,
            },
            position,
        )
    }
}
