//! Filter的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse_filter()
//!   └─ parse_or_expression()            → 析取范式的 OR 层
//!        ├─ parse_and_expression()      → AND 层（DNF 叉积展开）
//!        │    └─ parse_clause()
//!        │         ├─ "(" → 分组表达式（递归调用 parse_or_expression）
//!        │         └─ parse_term()
//!        │              ├─ 解析前缀路径 (a.b.c)
//!        │              ├─ "[" → parse_bracket_or() → "]"
//!        │              │        └─ 括号内的子条件或备选路径段
//!        │              ├─ 解析后缀路径 (.z)
//!        │              └─ 比较运算符 + 字面值
//!        │
//!        └─ 遇到 OR 时，继续解析右侧 AND 表达式
//! ```
//!
//! ## 语法优先级（从高到低）
//!
//! 1. **括号分组** `(expression)`
//! 2. **比较操作** `path=value`
//! 3. **AND操作** `expr1 AND expr2`
//! 4. **OR操作** `expr1 OR expr2`
//!
//! 输出直接是析取范式（外层 OR、内层 AND 的条件列表），AND 与括号分组
//! 通过叉积展开，保持源代码从左到右的顺序。
//!
//! ## 支持的语法结构
//!
//! ### 点路径与方括号展开
//! ```text
//! user.group.id=5
//! instrument[stock OR currency].active=true   →  两个 OR 分支
//! group[isPremium=true AND active=true]       →  共享前缀的两个 AND 条件
//! ```
//!
//! ### 字面值类型
//! - **整数/浮点数**: `123`, `-4`, `2.5`
//! - **布尔值**: `true`, `false`（区分大小写）
//! - **字符串**: `"quoted \"string\""`
//! - **空值**: `null`（区分大小写）
//! - **列表**: `1,2,3`（任意标量的逗号分隔组合）
//!
//! ## 解析示例
//!
//! ```text
//! // 简单过滤
//! type=1
//!
//! // AND 优先于 OR
//! a=1 AND b=2 OR c=3        →  [[a=1, b=2], [c=3]]
//!
//! // 分组分配到外层 AND
//! a=1 AND (b=2 OR c=3)      →  [[a=1, b=2], [a=1, c=3]]
//! ```

use crate::ast::{CompOp, Condition, FilterExpression, FilterValue};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// 方括号展开过程中的中间状态：
/// 已带运算符的完整条件，或等待共享运算符的裸路径
#[derive(Debug, Clone)]
enum Part {
    Done(Condition),
    Pending(Vec<String>),
}

/// 两层列表：外层 OR 连接，内层 AND 连接
type PartGroups = Vec<Vec<Part>>;

/// 把输入字符串编译为析取范式的过滤表达式
pub fn parse_filter(input: &str) -> Result<FilterExpression, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::new(
            "filter must be a non-empty string".to_string(),
        ));
    }
    let tokens: Vec<_> = Lexer::new(input).collect();
    for token in &tokens {
        if token.kind == TokenKind::Illegal {
            return Err(ParseError::at_position(
                "unrecognized character in filter".to_string(),
                token.span,
            ));
        }
    }
    Parser::new(&tokens).parse()
}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&Token<'a>> {
        if self.position < self.tokens.len() {
            let token = &self.tokens[self.position];
            self.position += 1;
            Some(token)
        } else {
            None
        }
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenKind) -> Result<&Token<'a>, ParseError> {
        if let Some(token) = self.peek() {
            if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) {
                Ok(self.advance().expect("peeked token"))
            } else {
                Err(ParseError::at_position(
                    format!("Expected {:?}, found {:?}", expected, token.kind),
                    token.span,
                ))
            }
        } else {
            Err(ParseError::new(format!(
                "Expected {:?}, but reached end of input",
                expected
            )))
        }
    }

    /// 期望一个标识符并返回其文本
    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        let token = self.expect(TokenKind::Identifier(""))?;
        match &token.kind {
            TokenKind::Identifier(name) => Ok(name.to_string()),
            _ => unreachable!("expect() guarantees an identifier"),
        }
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    /// 检查当前 token 是否为比较运算符
    fn is_comparison_operator(&self) -> bool {
        if let Some(token) = self.peek() {
            matches!(
                token.kind,
                TokenKind::Eq
                    | TokenKind::NotEq
                    | TokenKind::Gt
                    | TokenKind::Lt
                    | TokenKind::Gte
                    | TokenKind::Lte
            )
        } else {
            false
        }
    }

    pub fn parse(&mut self) -> Result<FilterExpression, ParseError> {
        let groups = self.parse_or_expression()?;
        if let Some(token) = self.peek() {
            return Err(ParseError::at_position(
                format!("Unexpected token: {:?}", token.kind),
                token.span,
            ));
        }
        Ok(FilterExpression(groups))
    }

    /// 解析OR表达式 (最低优先级)
    ///
    /// 语法: `and_expr (OR and_expr)*`
    fn parse_or_expression(&mut self) -> Result<Vec<Vec<Condition>>, ParseError> {
        let mut groups = self.parse_and_expression()?;

        while self.match_token(&TokenKind::Or) {
            self.advance(); // 消费 OR
            groups.extend(self.parse_and_expression()?);
        }

        Ok(groups)
    }

    /// 解析AND表达式
    ///
    /// 语法: `clause (AND clause)*`
    /// 子句本身可能含有 OR 分支（括号或方括号展开），通过叉积分配
    fn parse_and_expression(&mut self) -> Result<Vec<Vec<Condition>>, ParseError> {
        let mut groups = self.parse_clause()?;

        while self.match_token(&TokenKind::And) {
            self.advance(); // 消费 AND
            let right = self.parse_clause()?;
            groups = cross_product(groups, right);
        }

        Ok(groups)
    }

    /// 解析单个子句：括号分组或完整的比较条件
    fn parse_clause(&mut self) -> Result<Vec<Vec<Condition>>, ParseError> {
        if self.match_token(&TokenKind::LParen) {
            self.advance(); // 消费 (
            let inner = self.parse_or_expression()?;
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }

        let groups = self.parse_term()?;
        // 顶层子句必须已经带有运算符和值
        let mut conditions = Vec::with_capacity(groups.len());
        for group in groups {
            let mut complete = Vec::with_capacity(group.len());
            for part in group {
                match part {
                    Part::Done(condition) => complete.push(condition),
                    Part::Pending(path) => {
                        return Err(ParseError::new(format!(
                            "Expected comparison operator after attribute '{}'",
                            path.join(".")
                        )));
                    }
                }
            }
            conditions.push(complete);
        }
        Ok(conditions)
    }

    /// 解析一个属性条目：`路径 [方括号展开] [.后缀路径] [运算符 值]`
    ///
    /// 运算符和值是可选的——方括号内部的裸路径段由外层条目补全
    fn parse_term(&mut self) -> Result<PartGroups, ParseError> {
        let mut prefix = vec![self.expect_identifier()?];
        let mut groups: Option<PartGroups> = None;

        loop {
            if self.match_token(&TokenKind::Dot) {
                self.advance(); // 消费 .
                let segment = self.expect_identifier()?;
                match groups.as_mut() {
                    None => prefix.push(segment),
                    Some(groups) => append_suffix(groups, segment)?,
                }
            } else if groups.is_none() && self.match_token(&TokenKind::LBracket) {
                self.advance(); // 消费 [
                let inner = self.parse_bracket_or()?;
                self.expect(TokenKind::RBracket)?;
                groups = Some(apply_prefix(std::mem::take(&mut prefix), inner));
            } else {
                break;
            }
        }

        let mut groups = groups.unwrap_or_else(|| vec![vec![Part::Pending(prefix)]]);

        if self.is_comparison_operator() {
            let operator = self.parse_comparison_operator()?;
            let value = self.parse_value()?;
            for group in &mut groups {
                for part in group.iter_mut() {
                    if let Part::Pending(path) = part {
                        let attribute_path = std::mem::take(path);
                        *part = Part::Done(Condition {
                            attribute_path,
                            operator,
                            value: value.clone(),
                        });
                    }
                }
            }
        }

        Ok(groups)
    }

    /// 解析方括号内部的 OR 层
    fn parse_bracket_or(&mut self) -> Result<PartGroups, ParseError> {
        let mut groups = self.parse_bracket_and()?;

        while self.match_token(&TokenKind::Or) {
            self.advance(); // 消费 OR
            groups.extend(self.parse_bracket_and()?);
        }

        Ok(groups)
    }

    /// 解析方括号内部的 AND 层
    fn parse_bracket_and(&mut self) -> Result<PartGroups, ParseError> {
        let mut groups = self.parse_bracket_item()?;

        while self.match_token(&TokenKind::And) {
            self.advance(); // 消费 AND
            let right = self.parse_bracket_item()?;
            groups = cross_product(groups, right);
        }

        Ok(groups)
    }

    /// 方括号内的单个条目：括号分组或（可能不完整的）属性条目
    fn parse_bracket_item(&mut self) -> Result<PartGroups, ParseError> {
        if self.match_token(&TokenKind::LParen) {
            self.advance(); // 消费 (
            let inner = self.parse_bracket_or()?;
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }
        self.parse_term()
    }

    fn parse_comparison_operator(&mut self) -> Result<CompOp, ParseError> {
        if let Some(token) = self.advance() {
            match &token.kind {
                TokenKind::Eq => Ok(CompOp::Equal),
                TokenKind::NotEq => Ok(CompOp::NotEqual),
                TokenKind::Gt => Ok(CompOp::Greater),
                TokenKind::Lt => Ok(CompOp::Less),
                TokenKind::Gte => Ok(CompOp::GreaterOrEqual),
                TokenKind::Lte => Ok(CompOp::LessOrEqual),
                _ => Err(ParseError::at_position(
                    format!("Expected comparison operator, found {:?}", token.kind),
                    token.span,
                )),
            }
        } else {
            Err(ParseError::new(
                "Expected comparison operator".to_string(),
            ))
        }
    }

    /// 解析单个值或逗号分隔的值列表
    fn parse_value(&mut self) -> Result<FilterValue, ParseError> {
        let first = self.parse_scalar_value()?;
        if !self.match_token(&TokenKind::Comma) {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.match_token(&TokenKind::Comma) {
            self.advance(); // 消费 ,
            items.push(self.parse_scalar_value()?);
        }
        Ok(FilterValue::List(items))
    }

    fn parse_scalar_value(&mut self) -> Result<FilterValue, ParseError> {
        if let Some(token) = self.advance() {
            match &token.kind {
                TokenKind::Int(n) => Ok(FilterValue::Int(*n)),
                TokenKind::Float(x) => Ok(FilterValue::Float(*x)),
                TokenKind::String(s) => Ok(FilterValue::String(s.clone())),
                // true/false/null 区分大小写，其余裸词不是合法字面值
                TokenKind::Identifier("true") => Ok(FilterValue::Bool(true)),
                TokenKind::Identifier("false") => Ok(FilterValue::Bool(false)),
                TokenKind::Identifier("null") => Ok(FilterValue::Null),
                TokenKind::Identifier(other) => Err(ParseError::at_position(
                    format!("Unrecognized literal '{}'", other),
                    token.span,
                )),
                other => Err(ParseError::at_position(
                    format!("Expected literal value, found {:?}", other),
                    token.span,
                )),
            }
        } else {
            Err(ParseError::new("Expected literal value".to_string()))
        }
    }
}

/// AND 连接的叉积展开：每个左分支与每个右分支组合，保持源顺序
fn cross_product<T: Clone>(left: Vec<Vec<T>>, right: Vec<Vec<T>>) -> Vec<Vec<T>> {
    let mut result = Vec::with_capacity(left.len() * right.len());
    for left_group in &left {
        for right_group in &right {
            let mut combined = left_group.clone();
            combined.extend(right_group.iter().cloned());
            result.push(combined);
        }
    }
    result
}

/// 把共享前缀加到方括号展开出的每个分支上
fn apply_prefix(prefix: Vec<String>, groups: PartGroups) -> PartGroups {
    groups
        .into_iter()
        .map(|group| {
            group
                .into_iter()
                .map(|part| match part {
                    Part::Pending(path) => {
                        let mut full = prefix.clone();
                        full.extend(path);
                        Part::Pending(full)
                    }
                    Part::Done(mut condition) => {
                        let mut full = prefix.clone();
                        full.extend(condition.attribute_path);
                        condition.attribute_path = full;
                        Part::Done(condition)
                    }
                })
                .collect()
        })
        .collect()
}

/// 把方括号后面的路径段追加到每个未完成分支上
fn append_suffix(groups: &mut PartGroups, segment: String) -> Result<(), ParseError> {
    for group in groups {
        for part in group {
            match part {
                Part::Pending(path) => path.push(segment.clone()),
                Part::Done(condition) => {
                    return Err(ParseError::new(format!(
                        "Cannot append path segment '{}' to the completed condition on '{}'",
                        segment,
                        condition.attribute_path.join(".")
                    )));
                }
            }
        }
    }
    Ok(())
}
