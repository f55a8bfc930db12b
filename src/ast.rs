//! 编译后的请求描述所用的值类型

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// 符号化的比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompOp {
    Equal,          // =
    NotEqual,       // !=
    Less,           // <
    LessOrEqual,    // <=
    Greater,        // >
    GreaterOrEqual, // >=
}

impl CompOp {
    /// 运算符在 DSL 中的字面形式
    pub fn as_symbol(&self) -> &'static str {
        match self {
            CompOp::Equal => "=",
            CompOp::NotEqual => "!=",
            CompOp::Less => "<",
            CompOp::LessOrEqual => "<=",
            CompOp::Greater => ">",
            CompOp::GreaterOrEqual => ">=",
        }
    }
}

/// 过滤条件中的字面量值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Null,
    /// 逗号分隔的多个标量
    List(Vec<FilterValue>),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Int(n) => write!(f, "{}", n),
            // {:?} 保证 1.0 渲染为 "1.0" 而不是 "1"
            FilterValue::Float(x) => write!(f, "{:?}", x),
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::String(s) => {
                write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            FilterValue::Null => write!(f, "null"),
            FilterValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

/// 单个过滤条件, DNF 结构的叶子节点
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub attribute_path: Vec<String>,
    pub operator: CompOp,
    pub value: FilterValue,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.attribute_path.join("."),
            self.operator.as_symbol(),
            self.value
        )
    }
}

/// 析取范式：外层列表 OR 连接，内层列表 AND 连接
///
/// 两层列表都保留源代码从左到右的顺序
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FilterExpression(pub Vec<Vec<Condition>>);

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, group) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " OR ")?;
            }
            for (j, condition) in group.iter().enumerate() {
                if j > 0 {
                    write!(f, " AND ")?;
                }
                write!(f, "{}", condition)?;
            }
        }
        Ok(())
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
    Topflop,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
            Direction::Topflop => "topflop",
        }
    }
}

/// 单个排序项
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTerm {
    pub attribute_path: Vec<String>,
    pub direction: Direction,
}

/// 排序说明：要么是排序项列表，要么是随机排序哨兵（二者互斥）
#[derive(Debug, Clone, PartialEq)]
pub enum OrderSpec {
    Terms(Vec<OrderTerm>),
    Random,
}

impl Serialize for OrderSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OrderSpec::Terms(terms) => terms.serialize(serializer),
            // 随机哨兵没有属性路径
            OrderSpec::Random => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("direction", "random")?;
                map.end()
            }
        }
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSpec::Random => write!(f, ":random"),
            OrderSpec::Terms(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(
                        f,
                        "{}:{}",
                        term.attribute_path.join("."),
                        term.direction.as_str()
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// 结果条数上限，`unlimited` 表示不设上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Bounded(u64),
    Unlimited,
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Limit::Bounded(n) => serializer.serialize_u64(*n),
            Limit::Unlimited => serializer.serialize_unit(),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Bounded(n) => write!(f, "{}", n),
            Limit::Unlimited => write!(f, "unlimited"),
        }
    }
}
