//! 请求编译器：把松散类型的参数包编译为结构化、已校验的请求描述
//!
//! 遍历输入包的每个键：已识别的参数交给对应的编译器，未识别的键原样
//! 透传。任何子编译器失败都会带上出错的参数名包装为请求错误，并立即
//! 停止（第一个失败即终止，不再解析剩余的键）。

use crate::ast::{FilterExpression, Limit, OrderSpec};
use crate::error::{Error, ParseError};
use crate::order::parse_order;
use crate::parser::parse_filter;
use crate::scalar::{validate_id, validate_limit, validate_page, validate_search};
use crate::select::{parse_select, SelectTree};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// 编译完成的请求描述
///
/// 由外部的规划器/执行器消费；`extra` 保存原样透传的未识别参数
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<Limit>,
    /// 缺省时为第 1 页
    pub page: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<SelectTree>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ParsedRequest {
    fn default() -> Self {
        Self {
            id: None,
            filter: None,
            order: None,
            limit: None,
            page: 1,
            search: None,
            select: None,
            extra: Map::new(),
        }
    }
}

/// 把请求参数包编译为请求描述
pub fn compile_request(bag: &Value) -> Result<ParsedRequest, Error> {
    let Some(object) = bag.as_object() else {
        return Err(Error::Request {
            key: "request".to_string(),
            message: "expected a key/value object".to_string(),
        });
    };

    let mut request = ParsedRequest::default();
    for (key, value) in object {
        compile_parameter(&mut request, key, value).map_err(|e| Error::request(key, e))?;
    }

    debug!(
        "compiled request: {} recognized parameter(s), {} passed through",
        object.len() - request.extra.len(),
        request.extra.len()
    );
    Ok(request)
}

fn compile_parameter(
    request: &mut ParsedRequest,
    key: &str,
    value: &Value,
) -> Result<(), ParseError> {
    match key {
        "id" => request.id = Some(validate_id(value)?),
        "filter" => request.filter = Some(parse_filter(expect_string(value)?)?),
        "order" => request.order = Some(parse_order(expect_string(value)?)?),
        "limit" => request.limit = Some(validate_limit(value)?),
        "page" => request.page = validate_page(Some(value))?,
        "search" => request.search = Some(validate_search(value)?),
        "select" => request.select = Some(parse_select(expect_string(value)?)?),
        // 预留参数，出现即失败
        "aggregate" => {
            return Err(ParseError::new(
                "aggregate is reserved and not implemented".to_string(),
            ));
        }
        _ => {
            request.extra.insert(key.to_string(), value.clone());
        }
    }
    Ok(())
}

fn expect_string(value: &Value) -> Result<&str, ParseError> {
    value
        .as_str()
        .ok_or_else(|| ParseError::new("expected a string".to_string()))
}
