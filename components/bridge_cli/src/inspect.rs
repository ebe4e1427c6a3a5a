//! Bridging JSON documents and reporting the result.

use serde::Serialize;
use serde_json::{Map, Number, Value as Json};
use std::time::Duration;

use host_types::{HostRealm, HostValue};
use persistent_types::{CellClass, PersistentValue};
use value_bridge::{
    BridgeConfig, BridgeStats, ContextId, ExecutionContext, LeakReport,
};

use crate::error::{CliError, CliResult};

/// A property write, parsed from `KEY=JSON`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Property key
    pub key: String,
    /// Value written
    pub value: Json,
}

impl Assignment {
    /// Parses `KEY=JSON`. A value that is not valid JSON is taken as a
    /// string.
    pub fn parse(arg: &str) -> CliResult<Self> {
        let (key, raw) = arg
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| CliError::InvalidAssignment(arg.to_string()))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Json::String(raw.to_string()));
        Ok(Assignment {
            key: key.to_string(),
            value,
        })
    }
}

/// Structured result of one inspection.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    /// Context the document was bridged into
    pub context: ContextId,
    /// Kind of the final persistent handle
    pub kind: String,
    /// The final persistent value, rendered as JSON
    pub value: Json,
    /// Number of handle swaps caused by assignments
    pub swaps: usize,
    /// Bridge table counters
    pub stats: BridgeStats,
    /// Leak scan over rooted entries
    pub leaks: LeakReport,
}

/// Bridges documents into a private execution context.
pub struct Inspector {
    context: ExecutionContext,
}

impl Inspector {
    /// Creates an inspector with its own context.
    pub fn new(config: BridgeConfig) -> Self {
        Inspector {
            context: ExecutionContext::new(ContextId::from_raw(1), config),
        }
    }

    /// The underlying context.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Bridges `document`, applies `assignments` through the redirector,
    /// optionally roots the result and reports.
    pub fn inspect(
        &self,
        document: &Json,
        assignments: &[Assignment],
        root: bool,
        leak_age: Option<Duration>,
    ) -> CliResult<InspectReport> {
        let cx = &self.context;
        let host = json_to_host(cx.realm(), document);
        let mut handle = cx.bridge(&host)?;
        let mut swaps = 0;

        if !assignments.is_empty() {
            let object = host
                .as_object()
                .ok_or(CliError::NotAnObject(host.type_of()))?;
            for assignment in assignments {
                let value = json_to_host(cx.realm(), &assignment.value);
                cx.set_property(object, &assignment.key, &value)?;
                let current = cx
                    .table()
                    .lookup_by_host(object.identity())?
                    .unwrap_or_else(|| handle.clone());
                if !current.same_handle(&handle) {
                    swaps += 1;
                    handle = current;
                }
            }
        }

        if root {
            if let Some(object) = host.as_object() {
                cx.roots().register_root(object.identity())?;
            } else {
                log::warn!("document root is a {}; nothing to root", host.type_of());
            }
        }

        let leaks = match leak_age {
            Some(age) => cx.roots().detect_leaks(age)?,
            None => cx.detect_leaks_default()?,
        };
        let report = InspectReport {
            context: cx.id(),
            kind: handle.kind().to_string(),
            value: persistent_to_json(&handle),
            swaps,
            stats: cx.stats()?,
            leaks,
        };
        log::debug!("inspection finished: {:?}", report.stats);
        Ok(report)
    }
}

/// Builds host values from JSON.
pub fn json_to_host(realm: &HostRealm, json: &Json) -> HostValue {
    match json {
        Json::Null => HostValue::Null,
        Json::Bool(b) => HostValue::Boolean(*b),
        Json::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => HostValue::String(s.clone()),
        Json::Array(items) => HostValue::Object(
            realm.new_array(items.iter().map(|item| json_to_host(realm, item)).collect()),
        ),
        Json::Object(fields) => HostValue::Object(
            realm.new_object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), json_to_host(realm, value)))
                    .collect(),
            ),
        ),
    }
}

/// Renders a persistent value as JSON.
///
/// Maps with only string keys become objects; other maps become arrays of
/// `[key, value]` pairs. Cells other than plain objects carry a `$class`
/// field. Non-finite doubles become `null`.
pub fn persistent_to_json(value: &PersistentValue) -> Json {
    match value {
        PersistentValue::Unit => Json::Null,
        PersistentValue::Boolean(b) => Json::Bool(*b),
        PersistentValue::Integer(n) => Json::Number((*n).into()),
        PersistentValue::Double(d) => Number::from_f64(*d).map_or(Json::Null, Json::Number),
        PersistentValue::String(s) => Json::String(s.to_string()),
        PersistentValue::List(items) => Json::Array(items.iter().map(persistent_to_json).collect()),
        PersistentValue::Tuple(items) => {
            Json::Array(items.iter().map(persistent_to_json).collect())
        }
        PersistentValue::Set(items) => Json::Array(items.iter().map(persistent_to_json).collect()),
        PersistentValue::Map(entries) => {
            if entries.keys().all(|key| key.as_str().is_some()) {
                Json::Object(
                    entries
                        .iter()
                        .filter_map(|(k, v)| Some((k.as_str()?.to_string(), persistent_to_json(v))))
                        .collect(),
                )
            } else {
                Json::Array(
                    entries
                        .iter()
                        .map(|(k, v)| Json::Array(vec![persistent_to_json(k), persistent_to_json(v)]))
                        .collect(),
                )
            }
        }
        PersistentValue::Multiset(counts) => Json::Array(
            counts
                .iter()
                .map(|(item, count)| Json::Array(vec![persistent_to_json(item), Json::from(*count)]))
                .collect(),
        ),
        PersistentValue::ByteBuffer(bytes) => {
            Json::Array(bytes.iter().map(|b| Json::from(*b)).collect())
        }
        PersistentValue::Cell(cell) => {
            let mut fields = Map::new();
            if cell.class() != CellClass::Object {
                fields.insert("$class".to_string(), Json::String(format!("{:?}", cell.class())));
            }
            for (key, attribute) in cell.attributes().iter() {
                fields.insert(key.to_string(), persistent_to_json(attribute));
            }
            Json::Object(fields)
        }
        PersistentValue::Method(method) => {
            let mut fields = Map::new();
            fields.insert("$method".to_string(), Json::String(method.name().to_string()));
            Json::Object(fields)
        }
    }
}
