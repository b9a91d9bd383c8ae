//! Structural integrity validation for store and backup files
//!
//! Checks the JSON shape of a snapshot before typed deserialization so a
//! damaged file is rejected with a path-qualified reason such as
//! `users.alice.accounts[0].balance: expected integer`. Balances are not
//! re-derived from transaction history.

use serde_json::{Map, Value};

use crate::models::{Ledger, SCHEMA_VERSION};

/// Kind of JSON value a field must hold
#[derive(Debug, Clone, Copy)]
enum Shape {
    String,
    Integer,
    Bool,
    Array,
    Object,
}

impl Shape {
    fn matches(self, value: &Value) -> bool {
        match self {
            Shape::String => value.is_string(),
            Shape::Integer => value.is_i64() || value.is_u64(),
            Shape::Bool => value.is_boolean(),
            Shape::Array => value.is_array(),
            Shape::Object => value.is_object(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Shape::String => "string",
            Shape::Integer => "integer",
            Shape::Bool => "boolean",
            Shape::Array => "array",
            Shape::Object => "object",
        }
    }
}

const USER_FIELDS: &[(&str, Shape)] = &[
    ("username", Shape::String),
    ("credential_hash", Shape::String),
    ("email", Shape::String),
    ("created_at", Shape::String),
    ("accounts", Shape::Array),
];

const ACCOUNT_FIELDS: &[(&str, Shape)] = &[
    ("id", Shape::String),
    ("kind", Shape::String),
    ("balance", Shape::Integer),
    ("overdraft_limit", Shape::Integer),
    ("active", Shape::Bool),
    ("created_at", Shape::String),
    ("last_activity", Shape::String),
    ("transactions", Shape::Array),
];

const TRANSACTION_FIELDS: &[(&str, Shape)] = &[
    ("id", Shape::String),
    ("amount", Shape::Integer),
    ("kind", Shape::String),
    ("created_at", Shape::String),
    ("balance_after", Shape::Integer),
];

/// Validate raw snapshot bytes and decode them.
///
/// Returns the decoded ledger, or a human-readable reason on failure.
pub fn check_snapshot(bytes: &[u8]) -> Result<Ledger, String> {
    let root: Value =
        serde_json::from_slice(bytes).map_err(|e| format!("not valid JSON: {}", e))?;

    check_structure(&root)?;

    serde_json::from_value(root).map_err(|e| format!("snapshot does not decode: {}", e))
}

fn check_structure(root: &Value) -> Result<(), String> {
    let root = root
        .as_object()
        .ok_or_else(|| "top level: expected object".to_string())?;

    let version = root
        .get("schema_version")
        .ok_or_else(|| "schema_version: missing".to_string())?
        .as_u64()
        .ok_or_else(|| "schema_version: expected unsigned integer".to_string())?;
    if version == 0 || version > u64::from(SCHEMA_VERSION) {
        return Err(format!(
            "schema_version: unsupported version {} (supported: 1..={})",
            version, SCHEMA_VERSION
        ));
    }

    let users = require(root, "users", Shape::Object, "")?;
    for (key, user) in users.as_object().into_iter().flatten() {
        let path = format!("users.{}", key);
        let user = as_object(user, &path)?;
        require_all(user, USER_FIELDS, &path)?;

        if user.get("username").and_then(Value::as_str) != Some(key.as_str()) {
            return Err(format!("{}.username: does not match its key", path));
        }

        for (i, account) in array_items(user, "accounts") {
            let path = format!("{}.accounts[{}]", path, i);
            let account = as_object(account, &path)?;
            require_all(account, ACCOUNT_FIELDS, &path)?;

            for (j, txn) in array_items(account, "transactions") {
                let path = format!("{}.transactions[{}]", path, j);
                let txn = as_object(txn, &path)?;
                require_all(txn, TRANSACTION_FIELDS, &path)?;
            }
        }
    }

    Ok(())
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, String> {
    value
        .as_object()
        .ok_or_else(|| format!("{}: expected object", path))
}

fn require<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    shape: Shape,
    path: &str,
) -> Result<&'a Value, String> {
    let qualified = if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    };
    let value = object
        .get(field)
        .ok_or_else(|| format!("{}: missing", qualified))?;
    if !shape.matches(value) {
        return Err(format!("{}: expected {}", qualified, shape.name()));
    }
    Ok(value)
}

fn require_all(
    object: &Map<String, Value>,
    fields: &[(&str, Shape)],
    path: &str,
) -> Result<(), String> {
    for (field, shape) in fields {
        require(object, field, *shape, path)?;
    }
    Ok(())
}

fn array_items<'a>(
    object: &'a Map<String, Value>,
    field: &str,
) -> impl Iterator<Item = (usize, &'a Value)> {
    object
        .get(field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
}
