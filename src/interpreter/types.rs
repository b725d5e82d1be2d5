use super::Interpreter;
use super::error::EvalResult;
use super::scope::ScopeRef;
use super::suspension::{DeferredState, GeneratorState};
use crate::ast::{FunctionNode, Name};
use crate::types::{JsObject, JsValue, number_ops};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Writing an index further than this past the dense elements stores it as
/// a keyed property instead of growing the element vector.
pub const MAX_DENSE_GAP: usize = 1024;

/// Largest array the engine will join into a string or spread into a list.
pub const MAX_MATERIALIZED_LENGTH: usize = 1 << 22;

#[derive(Debug, Clone, Default)]
pub struct PropertyDescriptor {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub get: Option<JsValue>,
    pub set: Option<JsValue>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn data(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: Some(value),
            writable: Some(writable),
            get: None,
            set: None,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    pub fn data_default(value: JsValue) -> Self {
        Self::data(value, true, true, true)
    }

    pub fn accessor(get: Option<JsValue>, set: Option<JsValue>, enumerable: bool) -> Self {
        Self {
            value: None,
            writable: None,
            get,
            set,
            enumerable: Some(enumerable),
            configurable: Some(true),
        }
    }

    pub fn is_data_descriptor(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_enumerable(&self) -> bool {
        self.enumerable != Some(false)
    }
}

pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &JsValue, &[JsValue]) -> EvalResult<JsValue>>;

pub struct NativeFunction {
    pub name: Name,
    pub arity: usize,
    pub func: NativeFn,
    /// Whether `new` may be used on it (the error constructors).
    pub constructor: bool,
}

/// What `super` refers to inside a method: the parent constructor for
/// `super(...)` and the object `super.x` lookups start from.
#[derive(Debug, Clone)]
pub struct SuperLink {
    pub constructor: JsValue,
    pub base: JsValue,
}

/// A guest function: its syntax plus everything it closed over.
pub struct Closure {
    pub node: Rc<FunctionNode>,
    pub scope: ScopeRef,
    pub super_link: Option<SuperLink>,
    pub is_class_constructor: bool,
}

#[derive(Clone)]
pub enum FunctionData {
    Closure(Rc<Closure>),
    Native(Rc<NativeFunction>),
}

impl FunctionData {
    pub fn name(&self) -> Name {
        match self {
            FunctionData::Closure(c) => c.node.name.clone().unwrap_or_else(|| Rc::from("")),
            FunctionData::Native(n) => n.name.clone(),
        }
    }
}

pub enum ObjectKind {
    Ordinary,
    Array(Vec<JsValue>),
    Arguments(Vec<JsValue>),
    Function(FunctionData),
    Generator(Rc<RefCell<GeneratorState>>),
    Deferred(Rc<RefCell<DeferredState>>),
    Error,
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Arguments(_) => "Arguments",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Generator(_) => "Generator",
            ObjectKind::Deferred(_) => "Deferred",
            ObjectKind::Error => "Error",
        }
    }

    fn elements(&self) -> Option<&Vec<JsValue>> {
        match self {
            ObjectKind::Array(items) | ObjectKind::Arguments(items) => Some(items),
            _ => None,
        }
    }

    fn elements_mut(&mut self) -> Option<&mut Vec<JsValue>> {
        match self {
            ObjectKind::Array(items) | ObjectKind::Arguments(items) => Some(items),
            _ => None,
        }
    }
}

/// Own state of a guest object. Indexed elements of arrays and `arguments`
/// live in the kind's vector; indices far past its end are kept as keyed
/// properties, and `array_length` covers them.
pub struct ObjectData {
    pub prototype: Option<JsObject>,
    properties: FxHashMap<String, PropertyDescriptor>,
    property_order: Vec<String>,
    array_length: usize,
    pub extensible: bool,
    frozen: bool,
    pub kind: ObjectKind,
}

impl ObjectData {
    pub fn new(prototype: Option<JsObject>, kind: ObjectKind) -> Self {
        Self {
            prototype,
            properties: FxHashMap::default(),
            property_order: Vec::new(),
            array_length: 0,
            extensible: true,
            frozen: false,
            kind,
        }
    }

    /// `length` of an array or `arguments` object.
    pub fn array_length(&self) -> Option<usize> {
        self.kind.elements().map(|elems| elems.len().max(self.array_length))
    }

    /// Data values at their indices: the dense elements, then sparse ones.
    pub fn indexed_values(&self) -> Vec<(usize, JsValue)> {
        let Some(elems) = self.kind.elements() else {
            return Vec::new();
        };
        let mut values: Vec<(usize, JsValue)> = elems.iter().cloned().enumerate().collect();
        values.extend(self.sparse_indices().into_iter().filter_map(|i| {
            let desc = self.properties.get(&i.to_string())?;
            Some((i, desc.value.clone()?))
        }));
        values
    }

    fn sparse_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .property_order
            .iter()
            .filter_map(|k| number_ops::to_array_index(k))
            .collect();
        indices.sort_unstable();
        indices
    }

    pub fn get_own_property(&self, key: &str) -> Option<PropertyDescriptor> {
        if let Some(elems) = self.kind.elements() {
            if key == "length" {
                let writable = !self.frozen && matches!(self.kind, ObjectKind::Array(_));
                return Some(PropertyDescriptor::data(
                    JsValue::from(elems.len().max(self.array_length)),
                    writable,
                    false,
                    false,
                ));
            }
            if let Some(idx) = number_ops::to_array_index(key)
                && idx < elems.len()
            {
                let open = !self.frozen;
                return Some(PropertyDescriptor::data(elems[idx].clone(), open, true, open));
            }
        }
        self.properties.get(key).cloned()
    }

    pub fn has_own_property(&self, key: &str) -> bool {
        self.get_own_property(key).is_some()
    }

    pub fn get_own_value(&self, key: &str) -> Option<JsValue> {
        self.get_own_property(key).and_then(|d| d.value)
    }

    /// Defines or updates an own property; false when the object's
    /// integrity rules forbid it.
    pub fn define_own_property(&mut self, key: String, desc: PropertyDescriptor) -> bool {
        let frozen = self.frozen;
        let extensible = self.extensible;
        let mut sparse_index = None;
        if let Some(elems) = self.kind.elements_mut() {
            if key == "length" {
                if frozen || desc.is_accessor_descriptor() {
                    return false;
                }
                if let Some(len) = desc.value.as_ref().and_then(JsValue::as_number) {
                    if !(0.0..=f64::from(u32::MAX)).contains(&len) || len.fract() != 0.0 {
                        return false;
                    }
                    let len = len as usize;
                    elems.truncate(len);
                    self.truncate_sparse(len);
                    self.array_length = len;
                }
                return true;
            }
            if let Some(idx) = number_ops::to_array_index(&key) {
                let dense = elems.len();
                if idx < dense && desc.is_data_descriptor() && desc.enumerable != Some(false) {
                    if frozen {
                        return false;
                    }
                    elems[idx] = desc.value.unwrap_or_default();
                    return true;
                }
                if idx >= dense
                    && idx - dense <= MAX_DENSE_GAP
                    && extensible
                    && desc.is_data_descriptor()
                    && desc.enumerable != Some(false)
                {
                    elems.resize(idx + 1, JsValue::Undefined);
                    elems[idx] = desc.value.unwrap_or_default();
                    self.absorb_sparse(dense, idx);
                    return true;
                }
                sparse_index = Some(idx);
            }
        }

        let defined = self.define_keyed_property(key, desc);
        if defined && let Some(idx) = sparse_index {
            self.array_length = self.array_length.max(idx + 1);
        }
        defined
    }

    /// Moves keyed indices in `from..=to` into the element vector, which
    /// already spans them.
    fn absorb_sparse(&mut self, from: usize, to: usize) {
        let mut moved = false;
        for i in from..=to {
            let Some(desc) = self.properties.remove(&i.to_string()) else {
                continue;
            };
            moved = true;
            if i < to
                && let Some(elems) = self.kind.elements_mut()
            {
                elems[i] = desc.value.unwrap_or_default();
            }
        }
        if moved {
            let properties = &self.properties;
            self.property_order
                .retain(|k| number_ops::to_array_index(k).is_none() || properties.contains_key(k));
        }
    }

    fn truncate_sparse(&mut self, len: usize) {
        let properties = &mut self.properties;
        self.property_order.retain(|k| match number_ops::to_array_index(k) {
            Some(i) if i >= len => {
                properties.remove(k);
                false
            }
            _ => true,
        });
    }

    /// Appends after the current `length`, the way `push` does.
    pub fn push_values(&mut self, values: &[JsValue]) -> Option<usize> {
        let mut len = self.array_length()?;
        if self.frozen {
            return None;
        }
        for value in values {
            if !self.define_own_property(len.to_string(), PropertyDescriptor::data_default(value.clone())) {
                return None;
            }
            len += 1;
        }
        Some(len)
    }

    fn define_keyed_property(&mut self, key: String, desc: PropertyDescriptor) -> bool {
        if let Some(current) = self.properties.get(&key) {
            if current.configurable == Some(false) {
                if desc.configurable == Some(true) {
                    return false;
                }
                if desc.enumerable.is_some() && desc.enumerable != current.enumerable {
                    return false;
                }
                if current.is_data_descriptor() && current.writable == Some(false) && desc.value.is_some() {
                    return false;
                }
                if current.is_accessor_descriptor() && desc.is_data_descriptor() {
                    return false;
                }
            }
        } else if !self.extensible {
            return false;
        } else {
            self.property_order.push(key.clone());
        }
        self.properties.insert(key, desc);
        true
    }

    /// Writes an own data property the way plain assignment does.
    pub fn set_own_value(&mut self, key: &str, value: JsValue) -> bool {
        match self.properties.get_mut(key) {
            Some(desc) if desc.is_data_descriptor() => {
                if desc.writable == Some(false) {
                    return false;
                }
                desc.value = Some(value);
                true
            }
            Some(_) => false,
            None => self.define_own_property(key.to_string(), PropertyDescriptor::data_default(value)),
        }
    }

    pub fn insert_value(&mut self, key: &str, value: JsValue) {
        self.define_own_property(key.to_string(), PropertyDescriptor::data_default(value));
    }

    /// Non-enumerable, writable and configurable, like built-in methods.
    pub fn insert_builtin(&mut self, key: &str, value: JsValue) {
        self.define_own_property(key.to_string(), PropertyDescriptor::data(value, true, false, true));
    }

    pub fn delete(&mut self, key: &str) -> bool {
        let frozen = self.frozen;
        if let Some(elems) = self.kind.elements_mut() {
            if key == "length" {
                return false;
            }
            if let Some(idx) = number_ops::to_array_index(key)
                && idx < elems.len()
            {
                if frozen {
                    return false;
                }
                elems[idx] = JsValue::Undefined;
                return true;
            }
        }
        match self.properties.get(key) {
            None => true,
            Some(desc) if desc.configurable == Some(false) => false,
            Some(_) => {
                self.properties.remove(key);
                self.property_order.retain(|k| k != key);
                true
            }
        }
    }

    /// Own keys in guest order: indices ascending, then insertion order.
    pub fn own_keys(&self) -> Vec<String> {
        let Some(elems) = self.kind.elements() else {
            return self.property_order.clone();
        };
        let mut keys: Vec<String> = (0..elems.len()).map(|i| i.to_string()).collect();
        keys.extend(self.sparse_indices().into_iter().map(|i| i.to_string()));
        keys.extend(
            self.property_order
                .iter()
                .filter(|k| number_ops::to_array_index(k).is_none())
                .cloned(),
        );
        keys
    }

    pub fn own_enumerable_keys(&self) -> Vec<String> {
        self.own_keys()
            .into_iter()
            .filter(|k| !k.starts_with("Symbol("))
            .filter(|k| self.get_own_property(k).is_some_and(|d| d.is_enumerable()))
            .collect()
    }

    pub fn freeze(&mut self) {
        for desc in self.properties.values_mut() {
            if desc.is_data_descriptor() {
                desc.writable = Some(false);
            }
            desc.configurable = Some(false);
        }
        self.extensible = false;
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        if self.extensible {
            return false;
        }
        if self.kind.elements().is_some_and(|e| !e.is_empty()) && !self.frozen {
            return false;
        }
        self.properties.values().all(|d| {
            d.configurable == Some(false) && (d.is_accessor_descriptor() || d.writable == Some(false))
        })
    }

    pub fn function(&self) -> Option<&FunctionData> {
        match &self.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(items: Vec<JsValue>) -> ObjectData {
        ObjectData::new(None, ObjectKind::Array(items))
    }

    #[test]
    fn array_length_is_live() {
        let mut arr = array(vec![JsValue::from(1), JsValue::from(2)]);
        assert_eq!(arr.get_own_value("length").and_then(|v| v.as_number()), Some(2.0));
        assert!(arr.define_own_property("4".into(), PropertyDescriptor::data_default(JsValue::from(5))));
        assert_eq!(arr.get_own_value("length").and_then(|v| v.as_number()), Some(5.0));
        assert!(arr.get_own_value("3").is_some_and(|v| v.is_undefined()));
        assert!(arr.define_own_property("length".into(), PropertyDescriptor::data_default(JsValue::from(1))));
        assert_eq!(arr.own_keys(), vec!["0".to_string()]);
    }

    #[test]
    fn far_indices_stay_sparse() {
        let mut arr = array(vec![JsValue::from(1)]);
        assert!(arr.define_own_property("300000000".into(), PropertyDescriptor::data_default(JsValue::from(7))));
        assert!(matches!(&arr.kind, ObjectKind::Array(items) if items.len() == 1));
        assert_eq!(arr.array_length(), Some(300_000_001));
        assert_eq!(arr.get_own_value("300000000").and_then(|v| v.as_number()), Some(7.0));
        assert!(arr.get_own_value("5").is_none());
        arr.insert_value("tag", JsValue::Null);
        assert_eq!(arr.own_keys(), vec!["0", "300000000", "tag"]);

        assert!(arr.define_own_property("length".into(), PropertyDescriptor::data_default(JsValue::from(10))));
        assert_eq!(arr.own_keys(), vec!["0", "tag"]);
        assert_eq!(arr.array_length(), Some(10));
        assert!(!arr.define_own_property("length".into(), PropertyDescriptor::data_default(JsValue::from(4294967296.0))));
    }

    #[test]
    fn growing_dense_elements_absorbs_sparse_ones() {
        let mut arr = array(Vec::new());
        arr.insert_value("2000", JsValue::from("far"));
        arr.insert_value("1500", JsValue::from("mid"));
        assert_eq!(arr.own_keys(), vec!["1500", "2000"]);
        assert_eq!(arr.push_values(&[JsValue::from("next")]), Some(2002));
        arr.insert_value("1000", JsValue::from("near"));
        arr.insert_value("2001", JsValue::from("end"));
        assert!(matches!(&arr.kind, ObjectKind::Array(items) if items.len() == 2002));
        assert_eq!(arr.get_own_value("1500").map(|v| v.to_string()).as_deref(), Some("mid"));
        assert_eq!(arr.get_own_value("2001").map(|v| v.to_string()).as_deref(), Some("end"));
        assert_eq!(arr.own_keys().len(), 2002);
    }

    #[test]
    fn insertion_order_is_kept() {
        let mut obj = ObjectData::new(None, ObjectKind::Ordinary);
        obj.insert_value("b", JsValue::from(1));
        obj.insert_value("a", JsValue::from(2));
        obj.insert_builtin("hidden", JsValue::Null);
        obj.insert_value("b", JsValue::from(3));
        assert_eq!(obj.own_keys(), vec!["b", "a", "hidden"]);
        assert_eq!(obj.own_enumerable_keys(), vec!["b", "a"]);
    }

    #[test]
    fn frozen_objects_reject_writes() {
        let mut obj = ObjectData::new(None, ObjectKind::Ordinary);
        obj.insert_value("x", JsValue::from(1));
        obj.freeze();
        assert!(obj.is_frozen());
        assert!(!obj.set_own_value("x", JsValue::from(2)));
        assert!(!obj.set_own_value("y", JsValue::from(2)));
        assert!(!obj.delete("x"));

        let mut arr = array(vec![JsValue::from(1)]);
        arr.freeze();
        assert!(arr.is_frozen());
        assert!(!arr.define_own_property("0".into(), PropertyDescriptor::data_default(JsValue::Null)));
    }

    #[test]
    fn accessor_pairs_merge_into_one_descriptor() {
        let mut obj = ObjectData::new(None, ObjectKind::Ordinary);
        obj.define_own_property("v".into(), PropertyDescriptor::accessor(Some(JsValue::from(1)), None, false));
        let mut desc = obj.get_own_property("v").unwrap();
        desc.set = Some(JsValue::from(2));
        obj.define_own_property("v".into(), desc);
        let merged = obj.get_own_property("v").unwrap();
        assert!(merged.get.is_some() && merged.set.is_some());
    }

    #[test]
    fn delete_respects_configurable() {
        let mut obj = ObjectData::new(None, ObjectKind::Ordinary);
        obj.define_own_property("fixed".into(), PropertyDescriptor::data(JsValue::Null, true, true, false));
        obj.insert_value("loose", JsValue::Null);
        assert!(!obj.delete("fixed"));
        assert!(obj.delete("loose"));
        assert!(obj.delete("missing"));
        assert_eq!(obj.own_keys(), vec!["fixed"]);
    }
}
