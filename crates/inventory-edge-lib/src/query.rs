//! Query builder.
//!
//! A [`QuerySpec`] pairs one of the six inventory operations with its bound
//! parameters. The FQL template for each operation references parameters by
//! name only; values travel separately in the `arguments` object of the wire
//! request, so user input never becomes part of the query text.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// Fixed projection applied to every inventory document.
pub const ITEM_PROJECTION: &str = "{ id, item, quantity, price }";

const HEALTH_TEMPLATE: &str = r#"let helloWorld = "Hello " + "World"
helloWorld"#;
const LIST_TEMPLATE: &str = "Inventory.all() { id, item, quantity, price }";
const GET_BY_ID_TEMPLATE: &str = "Inventory.byId(id) { id, item, quantity, price }";
const CREATE_TEMPLATE: &str = "Inventory.create({ item: item, quantity: quantity, price: price }) { id, item, quantity, price }";
const UPDATE_TEMPLATE: &str = "let itemToUpdate = Inventory.byId(id)
itemToUpdate?.update({ item: item, quantity: quantity, price: price }) { id, item, quantity, price }";
// The deleted document renders as null in the simple format, so a successful
// delete answers with the id instead.
const DELETE_TEMPLATE: &str = "let toDelete = Inventory.byId(id)
if (toDelete.exists()) {
  toDelete!.delete()
  id
} else {
  null
}";

/// The six database operations exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Liveness probe returning a fixed greeting.
    Health,
    List,
    GetById,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// FQL template for this operation.
    pub fn template(self) -> &'static str {
        match self {
            Operation::Health => HEALTH_TEMPLATE,
            Operation::List => LIST_TEMPLATE,
            Operation::GetById => GET_BY_ID_TEMPLATE,
            Operation::Create => CREATE_TEMPLATE,
            Operation::Update => UPDATE_TEMPLATE,
            Operation::Delete => DELETE_TEMPLATE,
        }
    }

    /// Stable label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Health => "health",
            Operation::List => "list",
            Operation::GetById => "get-by-id",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Whether a null result means the addressed document does not exist.
    pub fn is_id_scoped(self) -> bool {
        matches!(
            self,
            Operation::GetById | Operation::Update | Operation::Delete
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a create or update request.
///
/// Field values are kept as raw JSON; shape and type checks belong to the
/// database schema. Missing fields decode to `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPayload {
    #[serde(default)]
    pub item: Value,
    #[serde(default)]
    pub quantity: Value,
    #[serde(default)]
    pub price: Value,
}

impl ItemPayload {
    /// Decode a request body. Malformed JSON or a non-object body is an
    /// [`Error::InvalidBody`].
    pub fn from_body(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| Error::InvalidBody {
            message: e.to_string(),
        })
    }
}

/// An operation plus its named, bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    operation: Operation,
    params: BTreeMap<&'static str, Value>,
}

impl QuerySpec {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            params: BTreeMap::new(),
        }
    }

    fn bind(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.params.insert(name, value.into());
        self
    }

    fn bind_payload(self, payload: ItemPayload) -> Self {
        self.bind("item", payload.item)
            .bind("quantity", payload.quantity)
            .bind("price", payload.price)
    }

    pub fn health() -> Self {
        Self::new(Operation::Health)
    }

    pub fn list() -> Self {
        Self::new(Operation::List)
    }

    pub fn get_by_id(id: &str) -> Self {
        Self::new(Operation::GetById).bind("id", id)
    }

    pub fn create(payload: ItemPayload) -> Self {
        Self::new(Operation::Create).bind_payload(payload)
    }

    pub fn update(id: &str, payload: ItemPayload) -> Self {
        Self::new(Operation::Update)
            .bind("id", id)
            .bind_payload(payload)
    }

    pub fn delete(id: &str) -> Self {
        Self::new(Operation::Delete).bind("id", id)
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn template(&self) -> &'static str {
        self.operation.template()
    }

    /// Look up a bound parameter by name.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn params(&self) -> &BTreeMap<&'static str, Value> {
        &self.params
    }

    /// Wire body for the query endpoint: the template text plus the
    /// parameters in tagged-argument encoding.
    pub fn to_wire(&self) -> Value {
        let arguments: Map<String, Value> = self
            .params
            .iter()
            .map(|(name, value)| (name.to_string(), encode_argument(value)))
            .collect();

        json!({
            "query": self.template(),
            "arguments": arguments,
        })
    }
}

/// Encode a JSON value as a tagged query argument.
///
/// Numbers carry their precise type (`@int`, `@long`, `@double`) as strings,
/// and objects whose keys could be mistaken for tags are wrapped in
/// `@object`.
pub fn encode_argument(value: &Value) -> Value {
    match value {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                if i32::try_from(int).is_ok() {
                    json!({ "@int": int.to_string() })
                } else {
                    json!({ "@long": int.to_string() })
                }
            } else if let Some(uint) = number.as_u64() {
                json!({ "@long": uint.to_string() })
            } else {
                json!({ "@double": number.to_string() })
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(encode_argument).collect()),
        Value::Object(fields) => {
            let encoded: Map<String, Value> = fields
                .iter()
                .map(|(key, field)| (key.clone(), encode_argument(field)))
                .collect();
            if fields.keys().any(|key| key.starts_with('@')) {
                json!({ "@object": encoded })
            } else {
                Value::Object(encoded)
            }
        }
        other => other.clone(),
    }
}
