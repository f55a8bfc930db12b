//! Select语言的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse_select()
//!   ├─ parse_expr_list()                 → 逗号分隔的顶层表达式
//!   │    └─ parse_expr()
//!   │         ├─ parse_item()            → 属性名 + 内联选项组
//!   │         │    ├─ read_name()
//!   │         │    └─ read_option_group()  (key=value)，值按括号深度原样捕获
//!   │         ├─ "." → 继续解析下一级 item（点式子属性）
//!   │         └─ "[" → parse_expr_list() → "]"（方括号子属性列表）
//!   │
//!   └─ merge_into()                      → 纯函数的 AST→树合并
//!        ├─ 按路径结构合并同名节点
//!        ├─ 标量选项后写覆盖先写
//!        └─ 已识别的选项键交给对应的编译器做类型化校验
//! ```
//!
//! 解析分两个阶段：先用常规的递归下降把输入变成显式 AST
//! （`Leaf` / `Sequence` / `Group`），再用独立的合并过程产出选择树。
//! 两个阶段都没有共享的可变暂存状态，节点只按路径定位。
//!
//! ## 支持的语法结构
//!
//! ```text
//! // 点式与方括号子属性等价
//! a.b            ≡  a[b]
//!
//! // 内联选项，后面的组合并进同一个选项表
//! items(limit=3)(order=name:asc)[id,title]
//!
//! // 选项值可以是嵌套的 DSL，按括号深度原样捕获后再校验
//! items(filter=type=1 AND (a=2 OR b=3))
//! ```

use crate::ast::{FilterExpression, Limit, OrderSpec};
use crate::error::ParseError;
use crate::order::parse_order;
use crate::parser::parse_filter;
use crate::scalar::{validate_limit, validate_page};
use crate::token::Span;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// 选择树：顶层属性名到节点的映射
pub type SelectTree = BTreeMap<String, SelectNode>;

/// 一个内联选项的取值
///
/// 已识别的键由对应编译器校验并以类型化形式存储，
/// 未识别的键原样透传（向前兼容）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Limit(Limit),
    Page(u64),
    Order(OrderSpec),
    Filter(FilterExpression),
    Raw(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Limit(limit) => write!(f, "{}", limit),
            OptionValue::Page(page) => write!(f, "{}", page),
            OptionValue::Order(order) => write!(f, "{}", order),
            OptionValue::Filter(filter) => write!(f, "{}", filter),
            OptionValue::Raw(raw) => write!(f, "{}", raw),
        }
    }
}

/// 选择树中的一个节点：选项表加可选的子属性表
///
/// `children` 为 `None` 表示叶子节点（没有声明子选择）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectNode {
    pub options: BTreeMap<String, OptionValue>,
    pub children: Option<SelectTree>,
}

impl Serialize for SelectNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.options.len() + usize::from(self.children.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.options {
            map.serialize_entry(key, value)?;
        }
        if let Some(children) = &self.children {
            map.serialize_entry("select", children)?;
        }
        map.end()
    }
}

/// 显式的选择表达式 AST，合并之前的中间形态
#[derive(Debug, Clone, PartialEq)]
enum SelectExpr {
    /// 单个属性及其内联选项（按出现顺序保留原始文本）
    Leaf {
        name: String,
        options: Vec<(String, String)>,
    },
    /// 点式链 `a.b.c`，末位可能是一个 Group
    Sequence(Vec<SelectExpr>),
    /// 方括号子属性列表 `[x,y]`
    Group(Vec<SelectExpr>),
}

/// 把选择字符串编译为选择树
pub fn parse_select(input: &str) -> Result<SelectTree, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::new(
            "select must be a non-empty string".to_string(),
        ));
    }

    let mut cursor = Cursor::new(input);
    let exprs = parse_expr_list(&mut cursor)?;
    cursor.skip_whitespace();
    if let Some(c) = cursor.peek() {
        return Err(ParseError::at_position(
            format!("Unexpected character '{}'", c),
            Span::new(cursor.position, cursor.position + c.len_utf8()),
        ));
    }

    let mut tree = SelectTree::new();
    for expr in &exprs {
        merge_into(&mut tree, expr)?;
    }
    Ok(tree)
}

/// 把选择树渲染为规范的方括号形式
///
/// 满足往返性质：`parse(serialize(parse(s))) == parse(s)`
pub fn serialize_select(tree: &SelectTree) -> String {
    let mut rendered: Vec<String> = Vec::with_capacity(tree.len());
    for (name, node) in tree {
        let mut out = name.clone();
        for (key, value) in &node.options {
            out.push_str(&format!("({}={})", key, value));
        }
        if let Some(children) = &node.children {
            out.push('[');
            out.push_str(&serialize_select(children));
            out.push(']');
        }
        rendered.push(out);
    }
    rendered.join(",")
}

/// 字符游标，与Filter词法分析器相同的 peek/bump 风格
struct Cursor<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Cursor { input, position: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 如果当前字符等于期望值则消费它
    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(match self.peek() {
                Some(found) => ParseError::at_position(
                    format!("Expected '{}', found '{}'", expected, found),
                    Span::new(self.position, self.position + found.len_utf8()),
                ),
                None => ParseError::new(format!(
                    "Expected '{}', but reached end of input",
                    expected
                )),
            })
        }
    }

    /// 读取属性名或选项键（字母、数字、连字符、下划线）
    fn read_name(&mut self) -> Result<String, ParseError> {
        let start = self.position;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.bump();
        }
        if self.position == start {
            return Err(ParseError::at_position(
                "Expected attribute name".to_string(),
                Span::new(start, start + 1),
            ));
        }
        Ok(self.input[start..self.position].to_string())
    }

    /// 原样读取选项值，直到零深度的 ')'
    ///
    /// 选项值本身可以是嵌套 DSL（含括号、方括号和带转义的引号字符串），
    /// 这里只跟踪深度，不理解内容
    fn read_raw_value(&mut self) -> Result<String, ParseError> {
        let start = self.position;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => {
                    return Err(ParseError::new(
                        "Unterminated option group".to_string(),
                    ));
                }
                Some(')') if depth == 0 => break,
                Some('(' | '[') => {
                    depth += 1;
                    self.bump();
                }
                Some(')' | ']') => {
                    depth = depth.saturating_sub(1);
                    self.bump();
                }
                Some('"') => {
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('"') => break,
                            Some('\\') => {
                                self.bump();
                            }
                            Some(_) => {}
                            None => {
                                return Err(ParseError::new(
                                    "Unterminated string in option value".to_string(),
                                ));
                            }
                        }
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        Ok(self.input[start..self.position].to_string())
    }
}

/// 解析逗号分隔的表达式列表
fn parse_expr_list(cursor: &mut Cursor) -> Result<Vec<SelectExpr>, ParseError> {
    let mut exprs = vec![parse_expr(cursor)?];
    loop {
        cursor.skip_whitespace();
        if cursor.eat(',') {
            cursor.skip_whitespace();
            exprs.push(parse_expr(cursor)?);
        } else {
            break;
        }
    }
    Ok(exprs)
}

/// 解析单个表达式：`item (("." item) | bracket-group)*`，方括号组是终结的
fn parse_expr(cursor: &mut Cursor) -> Result<SelectExpr, ParseError> {
    let mut items = vec![parse_item(cursor)?];

    loop {
        if cursor.eat('.') {
            items.push(parse_item(cursor)?);
        } else if cursor.eat('[') {
            cursor.skip_whitespace();
            if cursor.peek() == Some(']') {
                return Err(ParseError::at_position(
                    "Empty bracket group".to_string(),
                    Span::new(cursor.position, cursor.position + 1),
                ));
            }
            let children = parse_expr_list(cursor)?;
            cursor.skip_whitespace();
            cursor.expect(']')?;
            items.push(SelectExpr::Group(children));
            break; // 方括号组之后不允许继续下降
        } else {
            break;
        }
    }

    if items.len() == 1 {
        Ok(items.pop().expect("one parsed item"))
    } else {
        Ok(SelectExpr::Sequence(items))
    }
}

/// 解析属性名和它的零个或多个 `(key=value)` 选项组
fn parse_item(cursor: &mut Cursor) -> Result<SelectExpr, ParseError> {
    let name = cursor.read_name()?;
    let mut options = Vec::new();
    while cursor.eat('(') {
        let key = cursor.read_name()?;
        cursor.expect('=')?;
        let value = cursor.read_raw_value()?;
        cursor.expect(')')?;
        options.push((key, value));
    }
    Ok(SelectExpr::Leaf { name, options })
}

/// 纯函数的 AST→树合并：共享路径前缀的节点合并为一个，
/// 标量选项后写覆盖先写
fn merge_into(tree: &mut SelectTree, expr: &SelectExpr) -> Result<(), ParseError> {
    match expr {
        SelectExpr::Leaf { name, options } => {
            let node = tree.entry(name.clone()).or_default();
            apply_options(node, options)
        }
        SelectExpr::Group(children) => {
            for child in children {
                merge_into(tree, child)?;
            }
            Ok(())
        }
        SelectExpr::Sequence(items) => {
            // 前面的项构成下降链，末位项（叶子或 Group）落在链尾的子表上
            let (last, chain) = items.split_last().expect("a sequence is never empty");
            let mut current = tree;
            for item in chain {
                let SelectExpr::Leaf { name, options } = item else {
                    unreachable!("the parser only nests leaves inside a sequence chain")
                };
                let node = current.entry(name.clone()).or_default();
                apply_options(node, options)?;
                current = node.children.get_or_insert_with(SelectTree::new);
            }
            merge_into(current, last)
        }
    }
}

/// 选项键的类型化校验：已识别的键交给对应的编译器，其余透传
fn apply_options(node: &mut SelectNode, options: &[(String, String)]) -> Result<(), ParseError> {
    for (key, raw) in options {
        let value = match key.as_str() {
            "limit" => OptionValue::Limit(
                validate_limit(&Value::String(raw.clone())).map_err(|e| option_error(key, e))?,
            ),
            "page" => OptionValue::Page(
                validate_page(Some(&Value::String(raw.clone())))
                    .map_err(|e| option_error(key, e))?,
            ),
            "order" => OptionValue::Order(parse_order(raw).map_err(|e| option_error(key, e))?),
            "filter" => OptionValue::Filter(parse_filter(raw).map_err(|e| option_error(key, e))?),
            _ => OptionValue::Raw(raw.clone()),
        };
        node.options.insert(key.clone(), value);
    }
    Ok(())
}

fn option_error(key: &str, error: ParseError) -> ParseError {
    ParseError::new(format!("Invalid value for option '{}': {}", key, error.message))
}
