use crate::types::{IngestError, Result};
use std::collections::HashMap;

/// Scalar value as stored on a node or passed as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<&String> for PropertyValue {
    fn from(value: &String) -> Self {
        PropertyValue::String(value.clone())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

/// A node returned by the store: opaque identity plus its property map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphNode {
    pub element_id: String,
    pub properties: HashMap<String, PropertyValue>,
}

impl GraphNode {
    pub fn new(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// String property that must be present. A missing or non-string value
    /// is a data integrity problem, not absence.
    pub fn required_str(&self, entity: &'static str, field: &'static str) -> Result<String> {
        match self.properties.get(field) {
            Some(PropertyValue::String(s)) => Ok(s.clone()),
            _ => Err(IngestError::MissingRequiredField {
                entity,
                id: self.element_id.clone(),
                field,
            }),
        }
    }

    pub fn optional_str(&self, field: &str) -> String {
        match self.properties.get(field) {
            Some(PropertyValue::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    pub fn optional_i64(&self, field: &str) -> Option<i64> {
        match self.properties.get(field) {
            Some(PropertyValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Flags written as 0/1 integers by older writers read the same as booleans.
    pub fn flag(&self, field: &str) -> bool {
        match self.properties.get(field) {
            Some(PropertyValue::Boolean(b)) => *b,
            Some(PropertyValue::Integer(i)) => *i != 0,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Node(GraphNode),
    Scalar(PropertyValue),
}

/// One result row, columns kept in `RETURN` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, GraphValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: GraphValue) -> Self {
        self.push(key, value);
        self
    }

    pub fn with_node(self, key: &str, node: GraphNode) -> Self {
        self.with(key, GraphValue::Node(node))
    }

    pub fn push(&mut self, key: &str, value: GraphValue) {
        self.columns.push((key.to_string(), value));
    }

    pub fn get(&self, key: &str) -> Option<&GraphValue> {
        self.columns.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn first(&self) -> Option<&GraphValue> {
        self.columns.first().map(|(_, v)| v)
    }

    pub fn node(&self, key: &str) -> Option<&GraphNode> {
        match self.get(key) {
            Some(GraphValue::Node(node)) => Some(node),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A parameterized Cypher statement. `returns` names the columns the
/// driver should pull out of each row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub cypher: String,
    pub params: Vec<(String, PropertyValue)>,
    pub returns: Vec<String>,
}

impl Statement {
    pub fn new(cypher: &str) -> Self {
        Self {
            cypher: cypher.to_string(),
            ..Default::default()
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn returns(mut self, columns: &[&str]) -> Self {
        self.returns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.iter().find_map(|(k, v)| match v {
            PropertyValue::String(s) if k == key => Some(s.as_str()),
            _ => None,
        })
    }
}

/// First record, first column, as a node. Zero records is `None`; more than
/// one record means the uniqueness invariant on `key` was violated.
pub fn single_node(records: Vec<Record>, entity: &'static str, key: &str) -> Result<Option<GraphNode>> {
    if records.len() > 1 {
        return Err(IngestError::AmbiguousResult {
            entity,
            key: key.to_string(),
            count: records.len(),
        });
    }

    let Some(record) = records.into_iter().next() else {
        return Ok(None);
    };

    match record.first() {
        Some(GraphValue::Node(node)) => Ok(Some(node.clone())),
        Some(GraphValue::Scalar(_)) | None => Err(IngestError::Graph(format!(
            "expected a {entity} node in the first column for {key}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_record(id: &str) -> Record {
        Record::new().with_node("source", GraphNode::new(id).with("name", "38 North"))
    }

    #[test]
    fn single_node_empty_is_none() {
        let node = single_node(vec![], "Source", "38 North").unwrap();
        assert!(node.is_none());
    }

    #[test]
    fn single_node_returns_first_column() {
        let node = single_node(vec![source_record("4:1")], "Source", "38 North")
            .unwrap()
            .unwrap();
        assert_eq!(node.element_id, "4:1");
        assert_eq!(node.optional_str("name"), "38 North");
    }

    #[test]
    fn single_node_rejects_duplicates() {
        let err = single_node(
            vec![source_record("4:1"), source_record("4:2")],
            "Source",
            "38 North",
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::AmbiguousResult { count: 2, .. }));
    }

    #[test]
    fn single_node_rejects_scalar_column() {
        let record = Record::new().with("count", GraphValue::Scalar(PropertyValue::Integer(1)));
        assert!(single_node(vec![record], "Source", "x").is_err());
    }

    #[test]
    fn required_str_reports_missing_field() {
        let node = GraphNode::new("4:9").with("email", "a@b.c");
        let err = node.required_str("Author", "name").unwrap_err();
        match err {
            IngestError::MissingRequiredField { entity, id, field } => {
                assert_eq!(entity, "Author");
                assert_eq!(id, "4:9");
                assert_eq!(field, "name");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn flag_accepts_integer_and_bool() {
        let node = GraphNode::new("1")
            .with("a", 1i64)
            .with("b", false)
            .with("c", 0i64);
        assert!(node.flag("a"));
        assert!(!node.flag("b"));
        assert!(!node.flag("c"));
        assert!(!node.flag("missing"));
    }
}
