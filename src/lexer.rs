//! Filter的词法分析器

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 读取数字字面量（整数或浮点数，允许前导负号）
    fn read_number(&mut self, start: usize) -> Token<'a> {
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == '.' && !is_float {
                // 只有后面紧跟数字才算小数点，否则是路径分隔符
                let rest = &self.input[self.position + 1..];
                if rest.chars().next().is_some_and(|n| n.is_ascii_digit()) {
                    is_float = true;
                    self.bump();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
        let value_str = &self.input[start..self.position];
        let kind = if is_float {
            match value_str.parse::<f64>() {
                Ok(value) => TokenKind::Float(value),
                Err(_) => TokenKind::Illegal,
            }
        } else {
            match value_str.parse::<i64>() {
                Ok(value) => TokenKind::Int(value),
                Err(_) => TokenKind::Illegal,
            }
        };
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    /// 读取双引号包围的字符串字面量，处理反斜杠转义
    /// 注意：开始的引号已经被调用者消费
    fn read_string(&mut self, start: usize) -> Token<'a> {
        let mut content = String::new();
        loop {
            match self.bump() {
                Some('"') => {
                    return Token {
                        kind: TokenKind::String(content),
                        span: Span::new(start, self.position),
                    };
                }
                Some('\\') => match self.bump() {
                    Some(escaped @ ('"' | '\\')) => content.push(escaped),
                    Some(other) => {
                        // 未知转义序列按原样保留
                        content.push('\\');
                        content.push(other);
                    }
                    None => break,
                },
                Some(c) => content.push(c),
                None => break,
            }
        }
        // 字符串未闭合
        Token {
            kind: TokenKind::Illegal,
            span: Span::new(start, self.position),
        }
    }

    /// 读取标识符或连接词
    /// 标识符可以包含字母、数字、连字符和下划线
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];

        // 连接词区分大小写："AND"/"OR" 之外的任何写法都是普通标识符
        let kind = match literal {
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            _ => TokenKind::Identifier(literal),
        };
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;

        let Some(c) = self.bump() else {
            return None; // 到达输入末尾
        };

        let token = match c {
            '=' => Token { kind: TokenKind::Eq, span: Span::new(start, self.position) },
            '.' => Token { kind: TokenKind::Dot, span: Span::new(start, self.position) },
            ',' => Token { kind: TokenKind::Comma, span: Span::new(start, self.position) },
            '(' => Token { kind: TokenKind::LParen, span: Span::new(start, self.position) },
            ')' => Token { kind: TokenKind::RParen, span: Span::new(start, self.position) },
            '[' => Token { kind: TokenKind::LBracket, span: Span::new(start, self.position) },
            ']' => Token { kind: TokenKind::RBracket, span: Span::new(start, self.position) },
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: TokenKind::Lte, span: Span::new(start, self.position) }
                } else {
                    Token { kind: TokenKind::Lt, span: Span::new(start, self.position) }
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: TokenKind::Gte, span: Span::new(start, self.position) }
                } else {
                    Token { kind: TokenKind::Gt, span: Span::new(start, self.position) }
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: TokenKind::NotEq, span: Span::new(start, self.position) }
                } else {
                    Token { kind: TokenKind::Illegal, span: Span::new(start, self.position) }
                }
            }
            '-' => {
                // 负号后面必须紧跟数字
                if self.peek().is_some_and(|n| n.is_ascii_digit()) {
                    self.read_number(start)
                } else {
                    Token { kind: TokenKind::Illegal, span: Span::new(start, self.position) }
                }
            }
            '"' => self.read_string(start),
            c if c.is_ascii_digit() => self.read_number(start),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
            _ => Token { kind: TokenKind::Illegal, span: Span::new(start, self.position) },
        };
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_condition() {
        let input = r#"status="active""#;
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("status"),
                TokenKind::Eq,
                TokenKind::String("active".to_string()),
            ]
        );
    }

    #[test]
    fn test_all_operators_and_punctuation() {
        let input = "!= = > < >= <= ( ) [ ] , .";
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::NotEq, TokenKind::Eq, TokenKind::Gt, TokenKind::Lt,
                TokenKind::Gte, TokenKind::Lte, TokenKind::LParen, TokenKind::RParen,
                TokenKind::LBracket, TokenKind::RBracket, TokenKind::Comma,
                TokenKind::Dot,
            ]
        );
    }

    #[test]
    fn test_connectives_are_case_sensitive() {
        let input = "AND OR and or And";
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Identifier("and"),
                TokenKind::Identifier("or"),
                TokenKind::Identifier("And"),
            ]
        );
    }

    #[test]
    fn test_dotted_path() {
        let input = "a.b.c=1";
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("a"),
                TokenKind::Dot,
                TokenKind::Identifier("b"),
                TokenKind::Dot,
                TokenKind::Identifier("c"),
                TokenKind::Eq,
                TokenKind::Int(1),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let input = "12345 -7 3.25 -0.5";
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Int(12345),
                TokenKind::Int(-7),
                TokenKind::Float(3.25),
                TokenKind::Float(-0.5),
            ]
        );
    }

    #[test]
    fn test_float_dot_vs_path_dot() {
        // `1.5` 是浮点数，`a.5` 中的点是路径分隔符
        let kinds: Vec<_> = Lexer::new("1.5").map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::Float(1.5)]);

        let kinds: Vec<_> = Lexer::new("a.b").map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::Identifier("a"), TokenKind::Dot, TokenKind::Identifier("b")]
        );
    }

    #[test]
    fn test_string_escapes() {
        let input = r#""he said \"hi\"" "back\\slash""#;
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::String(r#"he said "hi""#.to_string()),
                TokenKind::String(r"back\slash".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_is_illegal() {
        let kinds: Vec<_> = Lexer::new(r#""open"#).map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::Illegal]);
    }

    #[test]
    fn test_bracket_expansion_tokens() {
        let input = r#"instrument[stock OR currency].active=true"#;
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("instrument"),
                TokenKind::LBracket,
                TokenKind::Identifier("stock"),
                TokenKind::Or,
                TokenKind::Identifier("currency"),
                TokenKind::RBracket,
                TokenKind::Dot,
                TokenKind::Identifier("active"),
                TokenKind::Eq,
                TokenKind::Identifier("true"),
            ]
        );
    }

    #[test]
    fn test_value_list_tokens() {
        let input = "id=1,2,3";
        let kinds: Vec<_> = Lexer::new(input).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("id"),
                TokenKind::Eq,
                TokenKind::Int(1),
                TokenKind::Comma,
                TokenKind::Int(2),
                TokenKind::Comma,
                TokenKind::Int(3),
            ]
        );
    }
}
