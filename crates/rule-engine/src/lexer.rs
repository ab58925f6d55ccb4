//! 规则文本分词器

use crate::error::{Result, RuleError};
use crate::operators::Operator;

/// 词法单元
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// 标识符：属性名，或比较右侧的未加引号字符串
    Ident(String),
    Number(f64),
    /// 引号字符串
    Str(String),
    Op(Operator),
    And,
    Or,
    LParen,
    RParen,
}

impl Token {
    /// 用于错误信息的描述
    pub fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("标识符 '{}'", name),
            Self::Number(n) => format!("数字 {}", n),
            Self::Str(s) => format!("字符串 '{}'", s),
            Self::Op(op) => format!("操作符 '{}'", op),
            Self::And => "AND".to_string(),
            Self::Or => "OR".to_string(),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
        }
    }
}

/// 带位置（字节偏移）的词法单元
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// 连接词关键字（大小写不敏感）
pub fn is_keyword(word: &str) -> bool {
    word.eq_ignore_ascii_case("and") || word.eq_ignore_ascii_case("or")
}

/// 将规则文本切分为词法单元
pub fn tokenize(input: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match c {
            '(' => {
                chars.next();
                Token::LParen
            }
            ')' => {
                chars.next();
                Token::RParen
            }
            '>' | '<' | '=' | '!' => {
                chars.next();
                let mut symbol = c.to_string();
                if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                    symbol.push('=');
                }
                let op = Operator::from_symbol(&symbol)
                    .ok_or_else(|| RuleError::syntax(position, format!("无效的操作符 '{}'", symbol)))?;
                Token::Op(op)
            }
            '\'' | '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some((_, escaped)) => value.push(escaped),
                            None => break,
                        },
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => value.push(ch),
                    }
                }
                if !closed {
                    return Err(RuleError::syntax(position, "字符串缺少结束引号"));
                }
                Token::Str(value)
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut text = String::new();
                text.push(c);
                chars.next();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // 数字后紧跟字母，如 30abc
                if let Some(&(_, ch)) = chars.peek()
                    && (ch.is_ascii_alphabetic() || ch == '_')
                {
                    return Err(RuleError::syntax(position, format!("无效的数字 '{}{}'", text, ch)));
                }
                let number: f64 = text
                    .parse()
                    .map_err(|_| RuleError::syntax(position, format!("无效的数字 '{}'", text)))?;
                Token::Number(number)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if word.eq_ignore_ascii_case("and") {
                    Token::And
                } else if word.eq_ignore_ascii_case("or") {
                    Token::Or
                } else {
                    Token::Ident(word)
                }
            }
            other => {
                return Err(RuleError::syntax(position, format!("无法识别的字符 '{}'", other)));
            }
        };

        tokens.push(Spanned { token, position });
    }

    Ok(tokens)
}
