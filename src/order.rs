//! Order参数的编译器
//!
//! 输入形如 `path1:direction1,path2:direction2`，方向取
//! `asc`/`desc`/`topflop`（区分大小写）。特例：整个输入恰好为
//! `:random` 时产生随机排序哨兵，且不允许与其他排序项组合。

use crate::ast::{Direction, OrderSpec, OrderTerm};
use crate::error::ParseError;

/// 把排序字符串编译为排序说明
pub fn parse_order(input: &str) -> Result<OrderSpec, ParseError> {
    if input.is_empty() {
        return Err(ParseError::new(
            "order must be a non-empty string".to_string(),
        ));
    }

    // 随机排序是全有或全无的
    if input == ":random" {
        return Ok(OrderSpec::Random);
    }

    let mut terms = Vec::new();
    for component in input.split(',') {
        if component.is_empty() {
            return Err(ParseError::new("Empty order component".to_string()));
        }

        let mut parts = component.split(':');
        let path = parts.next().unwrap_or_default();
        let Some(direction) = parts.next() else {
            return Err(ParseError::new(format!(
                "Missing ':' in order component '{}'",
                component
            )));
        };
        if parts.next().is_some() {
            return Err(ParseError::new(format!(
                "Unexpected extra ':' in order component '{}'",
                component
            )));
        }

        let direction = match direction {
            "asc" => Direction::Asc,
            "desc" => Direction::Desc,
            "topflop" => Direction::Topflop,
            "random" => {
                // 能到这里说明 :random 没有单独出现
                let message = if path.is_empty() {
                    "Random order cannot be combined with other order components".to_string()
                } else {
                    format!("Random order cannot be applied to attribute '{}'", path)
                };
                return Err(ParseError::new(message));
            }
            other => {
                return Err(ParseError::new(format!(
                    "Unknown order direction '{}'",
                    other
                )));
            }
        };

        if path.is_empty() {
            return Err(ParseError::new(format!(
                "Missing attribute path in order component '{}'",
                component
            )));
        }
        let segments: Vec<String> = path.split('.').map(|s| s.to_string()).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ParseError::new(format!(
                "Empty path segment in order component '{}'",
                component
            )));
        }

        terms.push(OrderTerm {
            attribute_path: segments,
            direction,
        });
    }

    Ok(OrderSpec::Terms(terms))
}
