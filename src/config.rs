//! 配置模块，承载已解析的资源配置树并负责从JSON文件加载
//!
//! 配置树由外部的配置解析器产出（合并资源定义与请求选择的结果），
//! 结果组装器只读地消费它。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// 配置加载错误
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "配置错误: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

/// 属性声明的类型，决定组装时的强制转换规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    String,
    Int,
    Float,
    Boolean,
    Date,
    Datetime,
    Time,
    /// 原样透传，不做任何转换
    Raw,
}

impl Default for AttributeType {
    fn default() -> Self {
        AttributeType::Raw
    }
}

/// 单个属性的已解析配置
///
/// `attributes` 非空时该属性是一个子资源，`many` 决定它的基数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolvedAttribute {
    /// 本次请求是否选中了该属性
    pub selected: bool,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    /// 上下文名 → 数据源名 → 源字段名 的别名映射
    pub map: HashMap<String, HashMap<String, String>>,
    /// 该属性取值的数据源
    pub selected_data_source: String,
    /// 静态字面值，优先于任何数据源取值
    pub value: Option<Value>,
    /// 子属性（非空时本属性是子资源）
    pub attributes: BTreeMap<String, ResolvedAttribute>,
    /// 子资源的基数：true 输出数组，false 输出单个对象或 null
    pub many: bool,
}

impl Default for ResolvedAttribute {
    fn default() -> Self {
        Self {
            selected: true,
            attribute_type: AttributeType::default(),
            map: HashMap::new(),
            selected_data_source: default_data_source(),
            value: None,
            attributes: BTreeMap::new(),
            many: false,
        }
    }
}

impl ResolvedAttribute {
    /// 该属性是否为子资源
    pub fn is_sub_resource(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// 解析属性在给定数据源中的源字段名
    ///
    /// 组装器读取 "default" 上下文；没有别名条目时退回属性自身的名字
    pub fn source_field<'a>(&'a self, attribute_name: &'a str) -> &'a str {
        self.map
            .get("default")
            .and_then(|by_source| by_source.get(&self.selected_data_source))
            .map(String::as_str)
            .unwrap_or(attribute_name)
    }
}

/// 资源根节点的已解析配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    /// 根资源的基数：true 输出数组加 cursor，false 输出单个对象
    #[serde(default)]
    pub many: bool,
    /// 主数据源每行必须携带的主键列
    pub primary_key: Vec<String>,
    /// 根资源的主数据源名
    #[serde(default = "default_data_source")]
    pub primary_data_source: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, ResolvedAttribute>,
}

fn default_data_source() -> String {
    "primary".to_string()
}

impl ResolvedConfig {
    /// 从JSON文件加载配置树
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::new(format!(
                "配置文件不存在: {}",
                path_ref.display()
            )));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|e| {
            ConfigError::new(format!("无法读取配置文件 {}: {}", path_ref.display(), e))
        })?;

        // 解析JSON
        let config: ResolvedConfig = serde_json::from_str(&content).map_err(|e| {
            ConfigError::new(format!(
                "无法解析JSON配置文件 {}: {}",
                path_ref.display(),
                e
            ))
        })?;

        Ok(config)
    }

    /// 按属性路径查找配置节点；空路径表示根节点本身，返回 None
    /// 由调用方单独处理
    pub fn attribute_at(&self, path: &[String]) -> Option<&ResolvedAttribute> {
        let (first, rest) = path.split_first()?;
        let mut node = self.attributes.get(first)?;
        for segment in rest {
            node = node.attributes.get(segment)?;
        }
        Some(node)
    }

    /// 创建默认配置（用于演示或fallback）：带邮箱子资源的用户资源
    pub fn default() -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "id".to_string(),
            ResolvedAttribute {
                attribute_type: AttributeType::Int,
                ..Default::default()
            },
        );
        attributes.insert(
            "name".to_string(),
            ResolvedAttribute {
                attribute_type: AttributeType::String,
                ..Default::default()
            },
        );

        let mut email_attributes = BTreeMap::new();
        email_attributes.insert(
            "address".to_string(),
            ResolvedAttribute {
                attribute_type: AttributeType::String,
                ..Default::default()
            },
        );
        attributes.insert(
            "emails".to_string(),
            ResolvedAttribute {
                attributes: email_attributes,
                many: true,
                ..Default::default()
            },
        );

        Self {
            many: true,
            primary_key: vec!["id".to_string()],
            primary_data_source: default_data_source(),
            attributes,
        }
    }
}
