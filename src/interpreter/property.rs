//! Property access along prototype chains, and iteration over guest values.

use super::frames::{IterSource, Resume};
use super::*;

impl Interpreter {
    pub(crate) fn create_object(&self) -> JsObject {
        JsObject::new(ObjectData::new(
            Some(self.intrinsics.object_prototype.clone()),
            ObjectKind::Ordinary,
        ))
    }

    pub(crate) fn create_array(&self, items: Vec<JsValue>) -> JsObject {
        JsObject::new(ObjectData::new(
            Some(self.intrinsics.array_prototype.clone()),
            ObjectKind::Array(items),
        ))
    }

    pub(crate) fn create_iter_result(&self, value: JsValue, done: bool) -> JsValue {
        let obj = self.create_object();
        {
            let mut data = obj.borrow_mut();
            data.insert_value("value", value);
            data.insert_value("done", JsValue::Boolean(done));
        }
        JsValue::Object(obj)
    }

    /// The object whose chain a property lookup on `value` walks.
    fn lookup_start(&mut self, value: &JsValue, key: &str, writing: bool) -> EvalResult<JsObject> {
        match value {
            JsValue::Object(o) => Ok(o.clone()),
            JsValue::Undefined | JsValue::Null => {
                let message = if writing {
                    format!("Cannot set properties of {value} (setting '{key}')")
                } else {
                    format!("Cannot read properties of {value} (reading '{key}')")
                };
                Err(self.type_error(&message))
            }
            _ => Ok(self.intrinsics.object_prototype.clone()),
        }
    }

    /// Finds `key` on `start` or its prototypes.
    pub(crate) fn find_property(start: &JsObject, key: &str) -> Option<PropertyDescriptor> {
        let mut current = Some(start.clone());
        while let Some(obj) = current {
            if let Some(desc) = obj.borrow().get_own_property(key) {
                return Some(desc);
            }
            current = obj.prototype();
        }
        None
    }

    pub(crate) fn has_property(&self, value: &JsValue, key: &str) -> bool {
        match value {
            JsValue::Object(o) => Self::find_property(o, key).is_some(),
            _ => false,
        }
    }

    pub(crate) fn get_property(&mut self, object: &JsValue, key: &str) -> EvalResult<JsValue> {
        self.get_property_with_receiver(object, key, object)
    }

    pub(crate) fn get_property_with_receiver(
        &mut self,
        object: &JsValue,
        key: &str,
        receiver: &JsValue,
    ) -> EvalResult<JsValue> {
        if let JsValue::String(s) = object {
            if key == "length" {
                return Ok(JsValue::from(s.len()));
            }
            if let Some(idx) = number_ops::to_array_index(key) {
                return Ok(s.char_at(idx).map(JsValue::String).unwrap_or_default());
            }
        }
        let start = self.lookup_start(object, key, false)?;
        match Self::find_property(&start, key) {
            None => Ok(JsValue::Undefined),
            Some(desc) if desc.is_accessor_descriptor() => match desc.get {
                Some(getter) if getter.is_callable() => self.call_function(&getter, receiver.clone(), &[]),
                _ => Ok(JsValue::Undefined),
            },
            Some(desc) => Ok(desc.value.unwrap_or_default()),
        }
    }

    /// Ordinary assignment: setters found on the chain run with `receiver`,
    /// otherwise the value lands as an own property of `receiver`. Writes
    /// that integrity rules forbid are ignored.
    pub(crate) fn set_property_with_receiver(
        &mut self,
        object: &JsValue,
        key: &str,
        value: JsValue,
        receiver: &JsValue,
    ) -> EvalResult<()> {
        let start = self.lookup_start(object, key, true)?;
        let JsValue::Object(target) = receiver else {
            return Ok(());
        };
        match Self::find_property(&start, key) {
            Some(desc) if desc.is_accessor_descriptor() => {
                if let Some(setter) = desc.set.filter(JsValue::is_callable) {
                    self.call_function(&setter, receiver.clone(), &[value])?;
                }
                Ok(())
            }
            Some(desc) if desc.writable == Some(false) => Ok(()),
            _ if key == "length" && target.is_array() => {
                let len = self.to_number(&value)?;
                if !(0.0..=f64::from(u32::MAX)).contains(&len) || len.fract() != 0.0 {
                    return Err(self.range_error("Invalid array length"));
                }
                target.borrow_mut().set_own_value(key, JsValue::from(len));
                Ok(())
            }
            _ => {
                target.borrow_mut().set_own_value(key, value);
                Ok(())
            }
        }
    }

    pub(crate) fn delete_property(&mut self, object: &JsValue, key: &str) -> EvalResult<bool> {
        let start = self.lookup_start(object, key, true)?;
        match object {
            JsValue::Object(_) => Ok(start.borrow_mut().delete(key)),
            _ => Ok(true),
        }
    }

    /// Keys `for-in` visits: enumerable string keys, own first, then
    /// inherited ones not shadowed by a nearer property.
    pub(crate) fn for_in_keys(&self, value: &JsValue) -> Vec<String> {
        let mut current = match value {
            JsValue::Object(o) => Some(o.clone()),
            JsValue::String(s) => return (0..s.len()).map(|i| i.to_string()).collect(),
            _ => None,
        };
        let mut seen = rustc_hash::FxHashSet::default();
        let mut keys = Vec::new();
        while let Some(obj) = current {
            let data = obj.borrow();
            for key in data.own_keys() {
                if key.starts_with("Symbol(") || !seen.insert(key.clone()) {
                    continue;
                }
                if data.get_own_property(&key).is_some_and(|d| d.is_enumerable()) {
                    keys.push(key);
                }
            }
            current = data.prototype.clone();
        }
        keys
    }

    pub(crate) fn get_iter_source(&mut self, value: &JsValue) -> EvalResult<IterSource> {
        match value {
            JsValue::String(s) => Ok(IterSource::List {
                items: s.chars().map(JsValue::String).collect(),
                index: 0,
            }),
            JsValue::Object(obj) => {
                let (elements, sync_generator) = match &obj.borrow().kind {
                    ObjectKind::Array(_) | ObjectKind::Arguments(_) => (true, false),
                    ObjectKind::Generator(state) => (false, !state.borrow().is_async),
                    _ => (false, false),
                };
                if elements {
                    return Ok(IterSource::ArrayLike {
                        object: obj.clone(),
                        index: 0,
                    });
                }
                if sync_generator {
                    return Ok(IterSource::Generator {
                        object: obj.clone(),
                        done: false,
                    });
                }
                let method = self.get_property(value, &JsSymbol::iterator().to_property_key())?;
                if method.is_callable() {
                    let iterator = self.call_function(&method, value.clone(), &[])?;
                    let generator = match &iterator {
                        JsValue::Object(it) if matches!(it.borrow().kind, ObjectKind::Generator(_)) => Some(it.clone()),
                        _ => None,
                    };
                    if let Some(object) = generator {
                        return Ok(IterSource::Generator { object, done: false });
                    }
                    if !iterator.is_object() {
                        return Err(self.type_error("Result of the Symbol.iterator method is not an object"));
                    }
                    return Ok(IterSource::Protocol { iterator, done: false });
                }
                if self.get_property(value, "length")?.as_number().is_some() {
                    return Ok(IterSource::ArrayLike {
                        object: obj.clone(),
                        index: 0,
                    });
                }
                let message = format!("{} is not iterable", self.describe(value));
                Err(self.type_error(&message))
            }
            other => {
                let message = format!("{} is not iterable", self.describe(other));
                Err(self.type_error(&message))
            }
        }
    }

    /// Next element, or `None` once the source is exhausted.
    pub(crate) fn iter_next(&mut self, source: &mut IterSource) -> EvalResult<Option<JsValue>> {
        match source {
            IterSource::List { items, index } => {
                let item = items.get(*index).cloned();
                *index += 1;
                Ok(item)
            }
            IterSource::ArrayLike { object, index } => {
                let object = JsValue::Object(object.clone());
                let len = self.get_property(&object, "length")?;
                let len = self.to_number(&len)?;
                if (*index as f64) >= len {
                    return Ok(None);
                }
                let item = self.get_property(&object, &index.to_string())?;
                *index += 1;
                Ok(Some(item))
            }
            IterSource::Generator { object, done } => {
                if *done {
                    return Ok(None);
                }
                let object = object.clone();
                let result = self.generator_resume(&object, Resume::Next(JsValue::Undefined));
                match result {
                    Ok((value, false)) => Ok(Some(value)),
                    Ok((_, true)) => {
                        *done = true;
                        Ok(None)
                    }
                    Err(e) => {
                        *done = true;
                        Err(e)
                    }
                }
            }
            IterSource::Protocol { iterator, done } => {
                if *done {
                    return Ok(None);
                }
                let iterator = iterator.clone();
                let next = self.get_property(&iterator, "next")?;
                let record = self.call_function(&next, iterator, &[])?;
                if !record.is_object() {
                    return Err(self.type_error("Iterator result is not an object"));
                }
                if self.get_property(&record, "done")?.to_boolean() {
                    *done = true;
                    return Ok(None);
                }
                Ok(Some(self.get_property(&record, "value")?))
            }
        }
    }

    /// Runs the cleanup of a source abandoned before exhaustion.
    pub(crate) fn close_iter_source(&mut self, source: &mut IterSource) -> EvalResult<()> {
        match source {
            IterSource::Generator { object, done } if !*done => {
                *done = true;
                let object = object.clone();
                self.generator_resume(&object, Resume::Return(JsValue::Undefined))?;
                Ok(())
            }
            IterSource::Protocol { iterator, done } if !*done => {
                *done = true;
                let iterator = iterator.clone();
                let ret = self.get_property(&iterator, "return")?;
                if ret.is_callable() {
                    self.call_function(&ret, iterator, &[])?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn iterate_to_vec(&mut self, value: &JsValue) -> EvalResult<Vec<JsValue>> {
        if let JsValue::Object(o) = value {
            let data = o.borrow();
            if let ObjectKind::Array(items) = &data.kind
                && data.array_length() == Some(items.len())
            {
                return Ok(items.clone());
            }
        }
        let mut source = self.get_iter_source(value)?;
        let mut items = Vec::new();
        while let Some(item) = self.iter_next(&mut source)? {
            if items.len() >= MAX_MATERIALIZED_LENGTH {
                return Err(self.range_error("Invalid array length"));
            }
            items.push(item);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::helpers::strict_equality;

    #[test]
    fn accessors_run_with_the_receiver() {
        let mut interp = Interpreter::new();
        let proto = interp.create_object();
        let getter = interp.native_function("get", 0, |_, this, _| Ok(this.clone()));
        proto.borrow_mut().define_own_property(
            "me".to_string(),
            PropertyDescriptor::accessor(Some(JsValue::Object(getter)), None, false),
        );
        let child = JsObject::new(ObjectData::new(Some(proto), ObjectKind::Ordinary));
        let child = JsValue::Object(child);
        let me = interp.get_property(&child, "me").unwrap();
        assert!(strict_equality(&me, &child));
    }

    #[test]
    fn writes_land_on_the_receiver() {
        let mut interp = Interpreter::new();
        let proto = interp.create_object();
        proto.borrow_mut().insert_value("x", JsValue::from(1));
        let child = JsValue::Object(JsObject::new(ObjectData::new(Some(proto.clone()), ObjectKind::Ordinary)));
        interp.set_property_with_receiver(&child, "x", JsValue::from(2), &child).unwrap();
        assert_eq!(proto.borrow().get_own_value("x").and_then(|v| v.as_number()), Some(1.0));
        assert_eq!(interp.get_property(&child, "x").unwrap().as_number(), Some(2.0));
    }

    #[test]
    fn reading_from_undefined_is_a_type_error() {
        let mut interp = Interpreter::new();
        assert!(matches!(
            interp.get_property(&JsValue::Undefined, "x"),
            Err(EvalError::Thrown(_))
        ));
    }

    #[test]
    fn for_in_skips_shadowed_and_hidden_keys() {
        let interp = Interpreter::new();
        let proto = interp.create_object();
        proto.borrow_mut().insert_value("a", JsValue::from(1));
        proto.borrow_mut().insert_value("b", JsValue::from(1));
        let child = JsObject::new(ObjectData::new(Some(proto), ObjectKind::Ordinary));
        child
            .borrow_mut()
            .define_own_property("a".to_string(), PropertyDescriptor::data(JsValue::Null, true, false, true));
        child.borrow_mut().insert_value("c", JsValue::from(1));
        assert_eq!(interp.for_in_keys(&JsValue::Object(child)), vec!["c", "b"]);
    }

    #[test]
    fn strings_iterate_by_character() {
        let mut interp = Interpreter::new();
        let items = interp.iterate_to_vec(&JsValue::from("héy")).unwrap();
        let text: Vec<String> = items.iter().map(|v| v.to_string()).collect();
        assert_eq!(text, vec!["h", "é", "y"]);
    }
}
