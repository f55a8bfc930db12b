//! Result assembler that joins raw per-data-source row sets into the nested
//! response tree described by the resolved configuration.
//!
//! Assembly is a single depth-first traversal driven by the configuration,
//! not by the raw inputs: every selected attribute of every config node is
//! resolved against the supplied result sets, so a missing result set is a
//! configuration defect rather than "no data".

use crate::config::{AttributeType, ResolvedAttribute, ResolvedConfig};
use crate::error::Error;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Configuration for result assembly
#[derive(Debug, Clone, Copy)]
pub struct AssemblerOptions {
    /// Time zone offset in which the data sources report local timestamps
    pub source_offset: FixedOffset,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            source_offset: Utc.fix(),
        }
    }
}

/// One raw row set returned by the external data-source executor.
///
/// An empty `attribute_path` attaches the set to the resource root;
/// `parent_key`/`child_key` name the join columns in the parent rows and in
/// this set's own rows respectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResultSet {
    #[serde(default)]
    pub attribute_path: Vec<String>,
    pub data_source_name: String,
    #[serde(default)]
    pub parent_key: Option<Vec<String>>,
    #[serde(default)]
    pub child_key: Option<Vec<String>>,
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
    #[serde(default)]
    pub total_count: u64,
}

/// Result sets indexed by (attribute path, data source name)
type ResultSetIndex<'r> = HashMap<(Vec<String>, String), &'r RawResultSet>;

/// Per-node traversal context: where we are in the config tree, which data
/// source feeds the node's primary rows, and which columns identify a row.
struct NodeCtx<'a> {
    path: Vec<String>,
    attributes: &'a BTreeMap<String, ResolvedAttribute>,
    data_source: &'a str,
    key_columns: &'a [String],
}

/// Assembler that converts raw result sets into the nested output tree
pub struct Assembler {
    options: AssemblerOptions,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            options: AssemblerOptions::default(),
        }
    }

    pub fn with_options(options: AssemblerOptions) -> Self {
        Self { options }
    }

    /// Assemble the output envelope for one request/response cycle.
    pub fn assemble(
        &self,
        config: &ResolvedConfig,
        results: &[RawResultSet],
    ) -> Result<Value, Error> {
        let index = index_result_sets(config, results)?;
        let root_set = require_result_set(&index, &[], &config.primary_data_source)?;
        debug!(
            "assembling resource root: {} rows, many={}",
            root_set.rows.len(),
            config.many
        );

        let ctx = NodeCtx {
            path: Vec::new(),
            attributes: &config.attributes,
            data_source: &config.primary_data_source,
            key_columns: &config.primary_key,
        };

        if config.many {
            let mut data = Vec::with_capacity(root_set.rows.len());
            for row in &root_set.rows {
                data.push(self.build_record(&ctx, row, &index)?);
            }
            Ok(json!({
                "cursor": { "totalCount": root_set.total_count },
                "data": data,
            }))
        } else {
            // A single-record root with zero rows is an expected not-found
            // outcome, not a data inconsistency.
            let Some(row) = root_set.rows.first() else {
                return Err(Error::NotFound);
            };
            Ok(json!({ "data": self.build_record(&ctx, row, &index)? }))
        }
    }

    /// Build one output record from one primary row of the current node.
    fn build_record(
        &self,
        ctx: &NodeCtx,
        row: &Map<String, Value>,
        index: &ResultSetIndex,
    ) -> Result<Value, Error> {
        let row_key = match key_tuple(row, ctx.key_columns) {
            Ok(Some(tuple)) => tuple.join(","),
            Ok(None) => {
                return Err(Error::data(
                    &ctx.path,
                    ctx.data_source,
                    None,
                    "row has a null key column",
                ));
            }
            Err(column) => {
                return Err(Error::data(
                    &ctx.path,
                    ctx.data_source,
                    None,
                    format!("row is missing key column '{}'", column),
                ));
            }
        };

        let mut record = Map::new();
        for (name, attribute) in ctx.attributes {
            if !attribute.selected {
                continue;
            }
            let value = if attribute.is_sub_resource() {
                self.build_relation(ctx, name, attribute, row, &row_key, index)?
            } else if let Some(value) = &attribute.value {
                // A static value takes precedence over any data source
                value.clone()
            } else {
                self.build_scalar(ctx, name, attribute, row, &row_key, index)?
            };
            record.insert(name.clone(), value);
        }
        Ok(Value::Object(record))
    }

    /// Resolve one scalar attribute: alias lookup, optional secondary-source
    /// join, then type coercion.
    fn build_scalar(
        &self,
        ctx: &NodeCtx,
        name: &str,
        attribute: &ResolvedAttribute,
        row: &Map<String, Value>,
        row_key: &str,
        index: &ResultSetIndex,
    ) -> Result<Value, Error> {
        let data_source = attribute.selected_data_source.as_str();
        let field = attribute.source_field(name);
        let mut attribute_path = ctx.path.clone();
        attribute_path.push(name.to_string());

        let raw = if data_source == ctx.data_source {
            row.get(field)
        } else {
            let secondary = require_result_set(index, &ctx.path, data_source)?;
            let secondary_row = self.join_secondary_row(ctx, secondary, row, row_key)?;
            secondary_row.get(field)
        };

        let Some(raw) = raw else {
            return Err(Error::data(
                &attribute_path,
                data_source,
                Some(row_key.to_string()),
                format!("required column '{}' is missing", field),
            ));
        };
        self.coerce(attribute.attribute_type, raw, &attribute_path, data_source, row_key)
    }

    /// Locate the row of a same-node secondary result set matching the
    /// current primary row by parent/child key.
    fn join_secondary_row<'r>(
        &self,
        ctx: &NodeCtx,
        secondary: &'r RawResultSet,
        row: &Map<String, Value>,
        row_key: &str,
    ) -> Result<&'r Map<String, Value>, Error> {
        let parent_columns = secondary.parent_key.as_deref().ok_or_else(|| {
            Error::implementation(
                &secondary.attribute_path,
                format!(
                    "result set for data source '{}' lacks parentKey columns",
                    secondary.data_source_name
                ),
            )
        })?;
        let child_columns = secondary.child_key.as_deref().ok_or_else(|| {
            Error::implementation(
                &secondary.attribute_path,
                format!(
                    "result set for data source '{}' lacks childKey columns",
                    secondary.data_source_name
                ),
            )
        })?;

        let parent_tuple = key_tuple(row, parent_columns)
            .map_err(|column| {
                Error::data(
                    &ctx.path,
                    ctx.data_source,
                    Some(row_key.to_string()),
                    format!("row is missing parentKey column '{}'", column),
                )
            })?
            .ok_or_else(|| {
                Error::data(
                    &ctx.path,
                    ctx.data_source,
                    Some(row_key.to_string()),
                    "parentKey column for a secondary data source is null",
                )
            })?;

        for candidate in &secondary.rows {
            let candidate_tuple = key_tuple(candidate, child_columns).map_err(|column| {
                Error::data(
                    &secondary.attribute_path,
                    &secondary.data_source_name,
                    None,
                    format!("row is missing childKey column '{}'", column),
                )
            })?;
            if candidate_tuple.as_ref() == Some(&parent_tuple) {
                return Ok(candidate);
            }
        }

        Err(Error::data(
            &ctx.path,
            &secondary.data_source_name,
            Some(parent_tuple.join(",")),
            format!(
                "no row in data source '{}' matches the primary row",
                secondary.data_source_name
            ),
        ))
    }

    /// Join a sub-resource's rows to the current parent row and apply the
    /// relation's cardinality rules.
    fn build_relation(
        &self,
        ctx: &NodeCtx,
        name: &str,
        attribute: &ResolvedAttribute,
        parent_row: &Map<String, Value>,
        parent_row_key: &str,
        index: &ResultSetIndex,
    ) -> Result<Value, Error> {
        let mut child_path = ctx.path.clone();
        child_path.push(name.to_string());
        let child_set = require_result_set(index, &child_path, &attribute.selected_data_source)?;

        let parent_columns = child_set.parent_key.as_deref().ok_or_else(|| {
            Error::implementation(&child_path, "result set lacks parentKey columns")
        })?;
        let child_columns = child_set.child_key.as_deref().ok_or_else(|| {
            Error::implementation(&child_path, "result set lacks childKey columns")
        })?;

        let parent_tuple = key_tuple(parent_row, parent_columns).map_err(|column| {
            Error::data(
                &ctx.path,
                ctx.data_source,
                Some(parent_row_key.to_string()),
                format!("row is missing parentKey column '{}'", column),
            )
        })?;

        // A null parent key means the relation itself is absent
        let Some(parent_tuple) = parent_tuple else {
            return Ok(if attribute.many {
                Value::Array(Vec::new())
            } else {
                Value::Null
            });
        };

        let child_ctx = NodeCtx {
            path: child_path.clone(),
            attributes: &attribute.attributes,
            data_source: &attribute.selected_data_source,
            key_columns: child_columns,
        };

        let mut matches = Vec::new();
        for child_row in &child_set.rows {
            let child_tuple = key_tuple(child_row, child_columns).map_err(|column| {
                Error::data(
                    &child_path,
                    &attribute.selected_data_source,
                    None,
                    format!("row is missing childKey column '{}'", column),
                )
            })?;
            if child_tuple.as_ref() == Some(&parent_tuple) {
                matches.push(child_row);
            }
        }
        debug!(
            "joined sub-resource '{}': {} matching rows",
            child_path.join("."),
            matches.len()
        );

        if attribute.many {
            // Source row order is preserved in the output array
            let mut items = Vec::with_capacity(matches.len());
            for child_row in matches {
                items.push(self.build_record(&child_ctx, child_row, index)?);
            }
            Ok(Value::Array(items))
        } else {
            match matches.len() {
                0 => Err(Error::data(
                    &child_path,
                    &attribute.selected_data_source,
                    Some(parent_tuple.join(",")),
                    "related row not found for a non-null key",
                )),
                1 => self.build_record(&child_ctx, matches[0], index),
                found => Err(Error::data(
                    &child_path,
                    &attribute.selected_data_source,
                    Some(parent_tuple.join(",")),
                    format!("expected at most one related row, found {}", found),
                )),
            }
        }
    }

    /// Coerce a raw value to the attribute's declared type.
    ///
    /// A null input is always passed through as null, regardless of the
    /// declared type.
    fn coerce(
        &self,
        attribute_type: AttributeType,
        raw: &Value,
        path: &[String],
        data_source: &str,
        row_key: &str,
    ) -> Result<Value, Error> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let data_error = |message: String| {
            Error::data(path, data_source, Some(row_key.to_string()), message)
        };

        match attribute_type {
            AttributeType::Raw => Ok(raw.clone()),
            AttributeType::String => match raw {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(data_error(format!("cannot render {} as a string", other))),
            },
            AttributeType::Int => coerce_int(raw)
                .map(Value::from)
                .ok_or_else(|| data_error(format!("cannot coerce {} to type int", raw))),
            AttributeType::Float => coerce_float(raw)
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| data_error(format!("cannot coerce {} to type float", raw))),
            AttributeType::Boolean => coerce_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| data_error(format!("cannot coerce {} to type boolean", raw))),
            AttributeType::Date | AttributeType::Datetime | AttributeType::Time => self
                .coerce_timestamp(raw)
                .map(Value::String)
                .ok_or_else(|| data_error(format!("unparseable timestamp {}", raw))),
        }
    }

    /// Parse a timestamp string and render it as a fixed ISO-8601 UTC string.
    ///
    /// Input carrying an explicit offset is taken as-is; bare timestamps are
    /// interpreted in the configured source offset.
    fn coerce_timestamp(&self, raw: &Value) -> Option<String> {
        let text = raw.as_str()?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(format_utc(dt.with_timezone(&Utc)));
        }
        let naive = parse_local_timestamp(text)?;
        let local = self.options.source_offset.from_local_datetime(&naive).single()?;
        Some(format_utc(local.with_timezone(&Utc)))
    }
}

/// Index result sets by (attribute path, data source), validating that every
/// path resolves to a config node and that no pair is duplicated.
fn index_result_sets<'r>(
    config: &ResolvedConfig,
    results: &'r [RawResultSet],
) -> Result<ResultSetIndex<'r>, Error> {
    let mut index = ResultSetIndex::with_capacity(results.len());
    for result_set in results {
        if !result_set.attribute_path.is_empty()
            && config.attribute_at(&result_set.attribute_path).is_none()
        {
            return Err(Error::implementation(
                &result_set.attribute_path,
                "result set references an attribute path missing from the configuration",
            ));
        }
        let key = (
            result_set.attribute_path.clone(),
            result_set.data_source_name.clone(),
        );
        if index.insert(key, result_set).is_some() {
            return Err(Error::implementation(
                &result_set.attribute_path,
                format!(
                    "duplicate result set for data source '{}'",
                    result_set.data_source_name
                ),
            ));
        }
    }
    Ok(index)
}

/// Look up a result set the configuration requires; absence is a defect in
/// the executor or the config resolver, never "empty data".
fn require_result_set<'r>(
    index: &ResultSetIndex<'r>,
    path: &[String],
    data_source: &str,
) -> Result<&'r RawResultSet, Error> {
    index
        .get(&(path.to_vec(), data_source.to_string()))
        .copied()
        .ok_or_else(|| {
            Error::implementation(
                path,
                format!("no result set supplied for data source '{}'", data_source),
            )
        })
}

/// Read the values of `columns` from a row as a comparable string tuple.
///
/// `Err(column)` when a column is absent entirely; `Ok(None)` when any of
/// the values is null.
fn key_tuple(
    row: &Map<String, Value>,
    columns: &[String],
) -> Result<Option<Vec<String>>, String> {
    let mut tuple = Vec::with_capacity(columns.len());
    for column in columns {
        match row.get(column) {
            None => return Err(column.clone()),
            Some(Value::Null) => return Ok(None),
            Some(value) => tuple.push(scalar_key(value)),
        }
    }
    Ok(Some(tuple))
}

/// Render a key value for comparison and error messages. Keys coming from
/// different sources may differ in raw type (e.g. 1 vs "1"), so comparison
/// happens on the stringified form.
fn scalar_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_int(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64)),
        _ => None,
    }
}

fn coerce_float(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn coerce_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.as_str() {
            "" | "false" => Some(false),
            "true" => Some(true),
            other => other.parse::<f64>().ok().map(|f| f != 0.0),
        },
        _ => None,
    }
}

fn parse_local_timestamp(text: &str) -> Option<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(time) = NaiveTime::parse_from_str(text, "%H:%M:%S%.f") {
        return NaiveDate::from_ymd_opt(1970, 1, 1).map(|d| d.and_time(time));
    }
    None
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> ResolvedConfig {
        serde_json::from_value(value).expect("test config should deserialize")
    }

    fn result_set(
        path: &[&str],
        data_source: &str,
        parent_key: Option<&[&str]>,
        child_key: Option<&[&str]>,
        rows: Value,
        total_count: u64,
    ) -> RawResultSet {
        RawResultSet {
            attribute_path: path.iter().map(|s| s.to_string()).collect(),
            data_source_name: data_source.to_string(),
            parent_key: parent_key.map(|k| k.iter().map(|s| s.to_string()).collect()),
            child_key: child_key.map(|k| k.iter().map(|s| s.to_string()).collect()),
            rows: serde_json::from_value(rows).expect("test rows should deserialize"),
            total_count,
        }
    }

    fn user_config() -> ResolvedConfig {
        config(json!({
            "many": true,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "name": {"type": "string"},
                "emails": {
                    "many": true,
                    "attributes": {
                        "address": {"type": "string"}
                    }
                }
            }
        }))
    }

    #[test]
    fn test_many_relation_nests_children_in_source_order() {
        let config = user_config();
        let results = vec![
            result_set(
                &[],
                "primary",
                None,
                None,
                json!([{"id": "1", "name": "Alice"}]),
                1,
            ),
            result_set(
                &["emails"],
                "primary",
                Some(&["id"]),
                Some(&["userId"]),
                json!([
                    {"userId": "1", "address": "first@example.com"},
                    {"userId": "2", "address": "other@example.com"},
                    {"userId": "1", "address": "second@example.com"}
                ]),
                3,
            ),
        ];

        let output = Assembler::new().assemble(&config, &results).unwrap();
        assert_eq!(
            output,
            json!({
                "cursor": {"totalCount": 1},
                "data": [{
                    "id": 1,
                    "name": "Alice",
                    "emails": [
                        {"address": "first@example.com"},
                        {"address": "second@example.com"}
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_many_relation_with_no_matches_is_empty_array() {
        let config = user_config();
        let results = vec![
            result_set(&[], "primary", None, None, json!([{"id": 9, "name": "Solo"}]), 1),
            result_set(
                &["emails"],
                "primary",
                Some(&["id"]),
                Some(&["userId"]),
                json!([]),
                0,
            ),
        ];

        let output = Assembler::new().assemble(&config, &results).unwrap();
        assert_eq!(output["data"][0]["emails"], json!([]));
    }

    fn article_config() -> ResolvedConfig {
        // many=false 的作者关系，通过文章行里的 authorId 联接
        config(json!({
            "many": true,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "author": {
                    "attributes": {
                        "name": {"type": "string"}
                    }
                }
            }
        }))
    }

    #[test]
    fn test_one_relation_zero_matches_for_non_null_key_is_data_error() {
        let config = article_config();
        let results = vec![
            result_set(&[], "primary", None, None, json!([{"id": 1, "authorId": 5}]), 1),
            result_set(
                &["author"],
                "primary",
                Some(&["authorId"]),
                Some(&["id"]),
                json!([]),
                0,
            ),
        ];

        let err = Assembler::new().assemble(&config, &results).unwrap_err();
        match err {
            Error::Data { attribute_path, row_key, .. } => {
                assert_eq!(attribute_path.0, vec!["author".to_string()]);
                assert_eq!(row_key.0.as_deref(), Some("5"));
            }
            other => panic!("expected a data error, got {:?}", other),
        }
    }

    #[test]
    fn test_one_relation_null_key_yields_null() {
        let config = article_config();
        let results = vec![
            result_set(&[], "primary", None, None, json!([{"id": 1, "authorId": null}]), 1),
            result_set(
                &["author"],
                "primary",
                Some(&["authorId"]),
                Some(&["id"]),
                json!([]),
                0,
            ),
        ];

        let output = Assembler::new().assemble(&config, &results).unwrap();
        assert_eq!(output["data"][0]["author"], Value::Null);
    }

    #[test]
    fn test_one_relation_multiple_matches_is_data_error() {
        let config = article_config();
        let results = vec![
            result_set(&[], "primary", None, None, json!([{"id": 1, "authorId": 5}]), 1),
            result_set(
                &["author"],
                "primary",
                Some(&["authorId"]),
                Some(&["id"]),
                json!([{"id": 5, "name": "A"}, {"id": 5, "name": "B"}]),
                2,
            ),
        ];

        let err = Assembler::new().assemble(&config, &results).unwrap_err();
        assert!(matches!(err, Error::Data { .. }));
        assert!(err.to_string().contains("at most one"));
    }

    #[test]
    fn test_single_root_with_zero_rows_is_not_found() {
        let config = config(json!({
            "many": false,
            "primaryKey": ["id"],
            "attributes": {"id": {"type": "int"}}
        }));
        let results = vec![result_set(&[], "primary", None, None, json!([]), 0)];

        let err = Assembler::new().assemble(&config, &results).unwrap_err();
        assert_eq!(err, Error::NotFound);
    }

    #[test]
    fn test_many_root_with_zero_rows_is_empty_collection() {
        let config = config(json!({
            "many": true,
            "primaryKey": ["id"],
            "attributes": {"id": {"type": "int"}}
        }));
        let results = vec![result_set(&[], "primary", None, None, json!([]), 0)];

        let output = Assembler::new().assemble(&config, &results).unwrap();
        assert_eq!(output, json!({"cursor": {"totalCount": 0}, "data": []}));
    }

    #[test]
    fn test_cursor_carries_total_count_from_result_set() {
        let config = config(json!({
            "many": true,
            "primaryKey": ["id"],
            "attributes": {"id": {"type": "int"}}
        }));
        // 分页场景：行数少于总数
        let results = vec![result_set(&[], "primary", None, None, json!([{"id": 1}]), 57)];

        let output = Assembler::new().assemble(&config, &results).unwrap();
        assert_eq!(output["cursor"]["totalCount"], json!(57));
    }

    #[test]
    fn test_date_coercion_renders_fixed_utc() {
        let config = config(json!({
            "many": false,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "publishedAt": {"type": "date"}
            }
        }));
        let results = vec![result_set(
            &[],
            "primary",
            None,
            None,
            json!([{"id": 1, "publishedAt": "2015-03-03 15:00:00"}]),
            1,
        )];

        let offset = FixedOffset::east_opt(3600).expect("one hour east");
        let assembler = Assembler::with_options(AssemblerOptions { source_offset: offset });
        let output = assembler.assemble(&config, &results).unwrap();
        assert_eq!(
            output["data"]["publishedAt"],
            json!("2015-03-03T14:00:00.000Z")
        );
    }

    #[test]
    fn test_raw_type_preserves_values_unchanged() {
        let config = config(json!({
            "many": false,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "payload": {"type": "raw"}
            }
        }));
        for raw in [json!({"nested": [1, 2]}), json!("text"), json!(42.5)] {
            let results = vec![result_set(
                &[],
                "primary",
                None,
                None,
                json!([{"id": 1, "payload": raw.clone()}]),
                1,
            )];
            let output = Assembler::new().assemble(&config, &results).unwrap();
            assert_eq!(output["data"]["payload"], raw);
        }
    }

    #[test]
    fn test_null_passes_through_every_declared_type() {
        for declared in ["string", "int", "float", "boolean", "date", "raw"] {
            let config = config(json!({
                "many": false,
                "primaryKey": ["id"],
                "attributes": {
                    "id": {"type": "int"},
                    "field": {"type": declared}
                }
            }));
            let results = vec![result_set(
                &[],
                "primary",
                None,
                None,
                json!([{"id": 1, "field": null}]),
                1,
            )];
            let output = Assembler::new().assemble(&config, &results).unwrap();
            assert_eq!(output["data"]["field"], Value::Null, "type {}", declared);
        }
    }

    #[test]
    fn test_scalar_coercions() {
        let config = config(json!({
            "many": false,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "count": {"type": "int"},
                "ratio": {"type": "float"},
                "active": {"type": "boolean"},
                "blocked": {"type": "boolean"},
                "label": {"type": "string"}
            }
        }));
        let results = vec![result_set(
            &[],
            "primary",
            None,
            None,
            json!([{
                "id": "7",
                "count": "42",
                "ratio": "2.5",
                "active": "1",
                "blocked": "0",
                "label": 19
            }]),
            1,
        )];

        let output = Assembler::new().assemble(&config, &results).unwrap();
        assert_eq!(
            output["data"],
            json!({
                "id": 7,
                "count": 42,
                "ratio": 2.5,
                "active": true,
                "blocked": false,
                "label": "19"
            })
        );
    }

    #[test]
    fn test_uncoercible_value_is_data_error() {
        let config = config(json!({
            "many": false,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "count": {"type": "int"}
            }
        }));
        let results = vec![result_set(
            &[],
            "primary",
            None,
            None,
            json!([{"id": 1, "count": "many"}]),
            1,
        )];

        let err = Assembler::new().assemble(&config, &results).unwrap_err();
        match err {
            Error::Data { attribute_path, .. } => {
                assert_eq!(attribute_path.0, vec!["count".to_string()]);
            }
            other => panic!("expected a data error, got {:?}", other),
        }
    }

    #[test]
    fn test_static_value_takes_precedence() {
        let config = config(json!({
            "many": false,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "kind": {"value": "user"}
            }
        }));
        // 行里没有 kind 列也不报错，静态值直接生效
        let results = vec![result_set(&[], "primary", None, None, json!([{"id": 1}]), 1)];

        let output = Assembler::new().assemble(&config, &results).unwrap();
        assert_eq!(output["data"]["kind"], json!("user"));
    }

    #[test]
    fn test_unselected_attributes_are_skipped() {
        let config = config(json!({
            "many": false,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "secret": {"type": "string", "selected": false}
            }
        }));
        let results = vec![result_set(&[], "primary", None, None, json!([{"id": 1}]), 1)];

        let output = Assembler::new().assemble(&config, &results).unwrap();
        assert_eq!(output["data"], json!({"id": 1}));
    }

    #[test]
    fn test_attribute_alias_resolution() {
        let config = config(json!({
            "many": false,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "name": {
                    "type": "string",
                    "map": {"default": {"primary": "full_name"}}
                }
            }
        }));
        let results = vec![result_set(
            &[],
            "primary",
            None,
            None,
            json!([{"id": 1, "full_name": "Alice"}]),
            1,
        )];

        let output = Assembler::new().assemble(&config, &results).unwrap();
        assert_eq!(output["data"]["name"], json!("Alice"));
    }

    fn secondary_source_config() -> ResolvedConfig {
        config(json!({
            "many": false,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "displayName": {
                    "type": "string",
                    "selectedDataSource": "profile",
                    "map": {"default": {"profile": "display_name"}}
                }
            }
        }))
    }

    #[test]
    fn test_secondary_data_source_join() {
        let config = secondary_source_config();
        let results = vec![
            result_set(&[], "primary", None, None, json!([{"id": 1}]), 1),
            result_set(
                &[],
                "profile",
                Some(&["id"]),
                Some(&["uid"]),
                json!([{"uid": 1, "display_name": "Alice"}]),
                1,
            ),
        ];

        let output = Assembler::new().assemble(&config, &results).unwrap();
        assert_eq!(output["data"]["displayName"], json!("Alice"));
    }

    #[test]
    fn test_secondary_row_without_match_is_data_error() {
        let config = secondary_source_config();
        let results = vec![
            result_set(&[], "primary", None, None, json!([{"id": 1}]), 1),
            result_set(
                &[],
                "profile",
                Some(&["id"]),
                Some(&["uid"]),
                json!([{"uid": 2, "display_name": "Other"}]),
                1,
            ),
        ];

        let err = Assembler::new().assemble(&config, &results).unwrap_err();
        assert!(matches!(err, Error::Data { .. }));
        assert!(err.to_string().contains("profile"));
    }

    #[test]
    fn test_missing_secondary_result_set_is_implementation_error() {
        let config = secondary_source_config();
        let results = vec![result_set(&[], "primary", None, None, json!([{"id": 1}]), 1)];

        let err = Assembler::new().assemble(&config, &results).unwrap_err();
        assert!(matches!(err, Error::Implementation { .. }));
        assert!(err.to_string().contains("profile"));
    }

    #[test]
    fn test_missing_sub_resource_result_set_is_implementation_error() {
        let config = user_config();
        let results = vec![result_set(
            &[],
            "primary",
            None,
            None,
            json!([{"id": 1, "name": "Alice"}]),
            1,
        )];

        let err = Assembler::new().assemble(&config, &results).unwrap_err();
        match err {
            Error::Implementation { attribute_path, .. } => {
                assert_eq!(attribute_path.0, vec!["emails".to_string()]);
            }
            other => panic!("expected an implementation error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_result_set_path_is_implementation_error() {
        let config = user_config();
        let results = vec![
            result_set(&[], "primary", None, None, json!([]), 0),
            result_set(&["bogus"], "primary", None, None, json!([]), 0),
        ];

        let err = Assembler::new().assemble(&config, &results).unwrap_err();
        assert!(matches!(err, Error::Implementation { .. }));
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_duplicate_result_set_is_implementation_error() {
        let config = config(json!({
            "many": true,
            "primaryKey": ["id"],
            "attributes": {"id": {"type": "int"}}
        }));
        let results = vec![
            result_set(&[], "primary", None, None, json!([]), 0),
            result_set(&[], "primary", None, None, json!([]), 0),
        ];

        let err = Assembler::new().assemble(&config, &results).unwrap_err();
        assert!(matches!(err, Error::Implementation { .. }));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_missing_primary_key_column_is_data_error() {
        let config = config(json!({
            "many": true,
            "primaryKey": ["id"],
            "attributes": {"id": {"type": "int"}}
        }));
        let results = vec![result_set(&[], "primary", None, None, json!([{"name": "x"}]), 1)];

        let err = Assembler::new().assemble(&config, &results).unwrap_err();
        assert!(matches!(err, Error::Data { .. }));
        assert!(err.to_string().contains("key column 'id'"));
    }

    #[test]
    fn test_missing_attribute_column_names_row_and_source() {
        let config = config(json!({
            "many": true,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "name": {"type": "string"}
            }
        }));
        let results = vec![result_set(&[], "primary", None, None, json!([{"id": 3}]), 1)];

        let err = Assembler::new().assemble(&config, &results).unwrap_err();
        match &err {
            Error::Data { data_source, row_key, .. } => {
                assert_eq!(data_source, "primary");
                assert_eq!(row_key.0.as_deref(), Some("3"));
            }
            other => panic!("expected a data error, got {:?}", other),
        }
        assert!(err.to_string().contains("column 'name'"));
    }

    #[test]
    fn test_rfc3339_input_is_taken_as_is() {
        let config = config(json!({
            "many": false,
            "primaryKey": ["id"],
            "attributes": {
                "id": {"type": "int"},
                "at": {"type": "datetime"}
            }
        }));
        let results = vec![result_set(
            &[],
            "primary",
            None,
            None,
            json!([{"id": 1, "at": "2015-03-03T15:00:00+02:00"}]),
            1,
        )];

        // 配置的偏移对带时区的输入不生效
        let offset = FixedOffset::east_opt(3600).expect("one hour east");
        let assembler = Assembler::with_options(AssemblerOptions { source_offset: offset });
        let output = assembler.assemble(&config, &results).unwrap();
        assert_eq!(output["data"]["at"], json!("2015-03-03T13:00:00.000Z"));
    }

    #[test]
    fn test_key_comparison_is_type_insensitive() {
        // 主数据源给出数字键，子数据源给出字符串键
        let config = user_config();
        let results = vec![
            result_set(&[], "primary", None, None, json!([{"id": 1, "name": "A"}]), 1),
            result_set(
                &["emails"],
                "primary",
                Some(&["id"]),
                Some(&["userId"]),
                json!([{"userId": "1", "address": "a@x"}]),
                1,
            ),
        ];

        let output = Assembler::new().assemble(&config, &results).unwrap();
        assert_eq!(output["data"][0]["emails"], json!([{"address": "a@x"}]));
    }
}
