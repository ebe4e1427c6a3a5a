//! Conversion between host values and persistent values.
//!
//! Host to persistent mapping:
//!
//! | Host                         | Persistent                              |
//! |------------------------------|-----------------------------------------|
//! | undefined, null              | Unit                                    |
//! | boolean                      | Boolean                                 |
//! | safe integral number         | Integer                                 |
//! | other number (incl. -0, NaN) | Double                                  |
//! | string                       | String                                  |
//! | BigInt                       | `Cell{BigInt}` with decimal `digits`    |
//! | dense array below threshold  | List                                    |
//! | sparse or large array        | Map from Integer index                  |
//! | plain object                 | `Cell{Object}`, immutable when frozen   |
//! | function                     | `Cell{Function}` placeholder            |
//! | Date                         | `Cell{Date}` with `time`                |
//! | Map / Set / ArrayBuffer      | Map / Set / ByteBuffer                  |
//! | external                     | `Cell{External}` with side-table handle |
//!
//! Symbols have no persistent form and are rejected. Doubles are never
//! reinterpreted from their magnitude: a date is only produced from a cell
//! explicitly tagged `Date`.

use std::collections::HashSet;

use num_bigint::BigInt;

use host_types::{HostIdentity, HostObjectRef, HostRealm, HostValue, ObjectKind};
use persistent_types::{CellClass, PersistentValue};

use crate::resources::{NativeResourceTable, ResourceHandle};
use crate::{BridgeConfig, ConversionError, ConversionResult};

/// Largest integer a double represents exactly: 2^53 - 1.
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Looks up the current handle of an already bridged host object.
pub type BridgedLookup<'l> = dyn Fn(HostIdentity) -> Option<PersistentValue> + 'l;

/// Stateless converter bound to one context's realm, config and resources.
#[derive(Clone, Copy)]
pub struct ValueConverter<'a> {
    config: &'a BridgeConfig,
    realm: &'a HostRealm,
    resources: &'a NativeResourceTable,
}

/// Per-call traversal state.
struct Traversal<'l> {
    in_progress: HashSet<HostIdentity>,
    bridged: &'l BridgedLookup<'l>,
}

impl<'a> ValueConverter<'a> {
    /// Creates a converter.
    pub fn new(
        config: &'a BridgeConfig,
        realm: &'a HostRealm,
        resources: &'a NativeResourceTable,
    ) -> Self {
        ValueConverter {
            config,
            realm,
            resources,
        }
    }

    /// Converts a host value to a fresh persistent value.
    ///
    /// Fails with `CyclicStructure` when the object graph re-enters an object
    /// still being converted, and with `DepthLimitExceeded` when nesting goes
    /// beyond the configured limit.
    pub fn from_host(&self, value: &HostValue) -> ConversionResult<PersistentValue> {
        self.from_host_with(value, &|_| None)
    }

    /// Converts a host value, substituting the current handle for every
    /// nested object that `bridged` reports as already bridged.
    pub fn from_host_with(
        &self,
        value: &HostValue,
        bridged: &BridgedLookup<'_>,
    ) -> ConversionResult<PersistentValue> {
        let mut traversal = Traversal {
            in_progress: HashSet::new(),
            bridged,
        };
        self.convert(value, &mut traversal, 0)
    }

    fn convert(
        &self,
        value: &HostValue,
        traversal: &mut Traversal<'_>,
        depth: usize,
    ) -> ConversionResult<PersistentValue> {
        match value {
            HostValue::Undefined | HostValue::Null => Ok(PersistentValue::Unit),
            HostValue::Boolean(b) => Ok(PersistentValue::Boolean(*b)),
            HostValue::Number(n) => Ok(number_to_persistent(*n)),
            HostValue::String(s) => Ok(PersistentValue::string(s.as_str())),
            HostValue::BigInt(n) => Ok(bigint_cell(n)),
            HostValue::Symbol(_) => Err(ConversionError::UnsupportedKind { kind: "symbol" }),
            HostValue::Object(obj) => {
                let identity = obj.identity();
                if let Some(handle) = (traversal.bridged)(identity) {
                    return Ok(handle);
                }
                if depth >= self.config.max_conversion_depth {
                    return Err(ConversionError::DepthLimitExceeded {
                        limit: self.config.max_conversion_depth,
                    });
                }
                if !traversal.in_progress.insert(identity) {
                    return Err(ConversionError::CyclicStructure { identity });
                }
                let converted = self.convert_object(obj, &obj.kind(), traversal, depth + 1);
                traversal.in_progress.remove(&identity);
                converted
            }
        }
    }

    fn convert_object(
        &self,
        obj: &HostObjectRef,
        kind: &ObjectKind,
        traversal: &mut Traversal<'_>,
        depth: usize,
    ) -> ConversionResult<PersistentValue> {
        match kind {
            ObjectKind::Plain { properties, frozen } => {
                let mut attributes = Vec::with_capacity(properties.len());
                for (key, value) in properties {
                    attributes.push((key.as_str(), self.convert(value, traversal, depth)?));
                }
                Ok(PersistentValue::cell(CellClass::Object, attributes, !frozen))
            }
            ObjectKind::Array { elements, .. } => {
                let dense = elements.len() < self.config.dense_array_threshold
                    && elements.iter().all(Option::is_some);
                if dense {
                    let mut items = Vec::with_capacity(elements.len());
                    for element in elements.iter().flatten() {
                        items.push(self.convert(element, traversal, depth)?);
                    }
                    Ok(PersistentValue::list(items))
                } else {
                    let mut entries = Vec::new();
                    for (index, element) in elements.iter().enumerate() {
                        if let Some(element) = element {
                            entries.push((
                                PersistentValue::Integer(index as i64),
                                self.convert(element, traversal, depth)?,
                            ));
                        }
                    }
                    Ok(PersistentValue::map(entries))
                }
            }
            ObjectKind::Function(data) => Ok(PersistentValue::cell(
                CellClass::Function,
                [("name", PersistentValue::string(data.name.as_str()))],
                false,
            )),
            ObjectKind::Date(time) => Ok(PersistentValue::cell(
                CellClass::Date,
                [("time", PersistentValue::Double(*time))],
                false,
            )),
            ObjectKind::Map(entries) => {
                let mut converted = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    converted.push((
                        self.convert(key, traversal, depth)?,
                        self.convert(value, traversal, depth)?,
                    ));
                }
                Ok(PersistentValue::map(converted))
            }
            ObjectKind::Set(values) => {
                let mut converted = Vec::with_capacity(values.len());
                for value in values {
                    converted.push(self.convert(value, traversal, depth)?);
                }
                Ok(PersistentValue::set(converted))
            }
            ObjectKind::ArrayBuffer(bytes) => Ok(PersistentValue::bytes(bytes.as_slice())),
            ObjectKind::External(resource) => {
                let handle = self.resources.insert_owned(resource.clone(), obj);
                Ok(PersistentValue::cell(
                    CellClass::External,
                    [("handle", PersistentValue::Integer(handle.to_raw()))],
                    false,
                ))
            }
        }
    }

    /// Materializes a host value from a persistent value.
    ///
    /// Every call builds new host objects; identity preservation for mapped
    /// handles is the caller's concern.
    pub fn to_host(&self, value: &PersistentValue) -> ConversionResult<HostValue> {
        let realm = self.realm;
        Ok(match value {
            PersistentValue::Unit => HostValue::Null,
            PersistentValue::Boolean(b) => HostValue::Boolean(*b),
            PersistentValue::Integer(n) => integer_to_host(*n),
            PersistentValue::Double(d) => HostValue::Number(*d),
            PersistentValue::String(s) => HostValue::String(s.to_string()),
            PersistentValue::List(items) => {
                HostValue::Object(realm.new_array(self.to_host_all(items.iter())?))
            }
            PersistentValue::Tuple(items) => {
                let array = realm.new_array(self.to_host_all(items.iter())?);
                array.freeze();
                HostValue::Object(array)
            }
            PersistentValue::Map(entries) => {
                let mut converted = Vec::with_capacity(entries.len());
                for (key, value) in entries.iter() {
                    converted.push((self.to_host(key)?, self.to_host(value)?));
                }
                HostValue::Object(realm.new_map(converted))
            }
            PersistentValue::Set(items) => {
                HostValue::Object(realm.new_set(self.to_host_all(items.iter())?))
            }
            PersistentValue::Multiset(counts) => {
                let mut converted = Vec::with_capacity(counts.len());
                for (item, count) in counts.iter() {
                    converted.push((self.to_host(item)?, HostValue::Number(*count as f64)));
                }
                HostValue::Object(realm.new_map(converted))
            }
            PersistentValue::ByteBuffer(bytes) => {
                HostValue::Object(realm.new_array_buffer(bytes.to_vec()))
            }
            PersistentValue::Cell(_) => self.cell_to_host(value)?,
            PersistentValue::Method(method) => {
                HostValue::Object(realm.new_placeholder_function(method.name()))
            }
        })
    }

    fn to_host_all<'v>(
        &self,
        items: impl Iterator<Item = &'v PersistentValue>,
    ) -> ConversionResult<Vec<HostValue>> {
        items.map(|item| self.to_host(item)).collect()
    }

    fn cell_to_host(&self, value: &PersistentValue) -> ConversionResult<HostValue> {
        let Some(cell) = value.as_cell() else {
            return Err(ConversionError::UnsupportedKind { kind: "cell" });
        };
        let class = cell.class();
        let realm = self.realm;
        match class {
            CellClass::Object => {
                let mut properties = Vec::with_capacity(cell.attributes().len());
                for (key, attribute) in cell.attributes().iter() {
                    properties.push((key.to_string(), self.to_host(attribute)?));
                }
                let object = realm.new_object(properties);
                if !cell.is_mutable() {
                    object.freeze();
                }
                Ok(HostValue::Object(object))
            }
            CellClass::Date => {
                let time = match cell.get("time") {
                    Some(PersistentValue::Double(t)) => *t,
                    Some(PersistentValue::Integer(t)) => *t as f64,
                    _ => {
                        return Err(ConversionError::MalformedCell {
                            class,
                            attribute: "time",
                        })
                    }
                };
                Ok(HostValue::Object(realm.new_date(time)))
            }
            CellClass::BigInt => cell
                .get("digits")
                .and_then(PersistentValue::as_str)
                .and_then(|digits| digits.parse::<BigInt>().ok())
                .map(HostValue::BigInt)
                .ok_or(ConversionError::MalformedCell {
                    class,
                    attribute: "digits",
                }),
            CellClass::Function => {
                let name = cell
                    .get("name")
                    .and_then(PersistentValue::as_str)
                    .unwrap_or("");
                Ok(HostValue::Object(realm.new_placeholder_function(name)))
            }
            CellClass::External => {
                let raw = cell
                    .get("handle")
                    .and_then(PersistentValue::as_integer)
                    .ok_or(ConversionError::MalformedCell {
                        class,
                        attribute: "handle",
                    })?;
                let (handle, resource) = ResourceHandle::from_raw(raw)
                    .and_then(|handle| Some((handle, self.resources.get(handle)?)))
                    .ok_or(ConversionError::StaleResource { handle: raw })?;
                let external = realm.new_external(resource);
                self.resources.adopt(handle, &external);
                Ok(HostValue::Object(external))
            }
        }
    }
}

/// Maps a host number: safe integral values become `Integer`, everything
/// else (fractions, -0, NaN, infinities, unsafe magnitudes) stays `Double`.
pub fn number_to_persistent(n: f64) -> PersistentValue {
    let integral = n.is_finite()
        && n.fract() == 0.0
        && !(n == 0.0 && n.is_sign_negative())
        && n.abs() <= MAX_SAFE_INTEGER as f64;
    if integral {
        PersistentValue::Integer(n as i64)
    } else {
        PersistentValue::Double(n)
    }
}

/// Maps a persistent integer: values a double cannot hold exactly become
/// host BigInts.
pub fn integer_to_host(n: i64) -> HostValue {
    if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&n) {
        HostValue::Number(n as f64)
    } else {
        HostValue::BigInt(BigInt::from(n))
    }
}

fn bigint_cell(n: &BigInt) -> PersistentValue {
    PersistentValue::cell(
        CellClass::BigInt,
        [("digits", PersistentValue::string(n.to_string()))],
        false,
    )
}
