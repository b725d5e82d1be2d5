use super::super::*;

fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or_default()
}

impl Interpreter {
    fn require_object_coercible(&mut self, value: &JsValue) -> EvalResult<()> {
        if value.is_nullish() {
            return Err(self.type_error("Cannot convert undefined or null to object"));
        }
        Ok(())
    }

    fn from_property_descriptor(&self, desc: &PropertyDescriptor) -> JsValue {
        let result = self.create_object();
        {
            let mut r = result.borrow_mut();
            if desc.is_accessor_descriptor() {
                r.insert_value("get", desc.get.clone().unwrap_or_default());
                r.insert_value("set", desc.set.clone().unwrap_or_default());
            } else {
                r.insert_value("value", desc.value.clone().unwrap_or_default());
                r.insert_value("writable", JsValue::Boolean(desc.writable.unwrap_or(false)));
            }
            r.insert_value("enumerable", JsValue::Boolean(desc.enumerable.unwrap_or(false)));
            r.insert_value("configurable", JsValue::Boolean(desc.configurable.unwrap_or(false)));
        }
        JsValue::Object(result)
    }

    pub(super) fn setup_object(&mut self, global: &JsObject) {
        let func: NativeFn = Rc::new(|interp: &mut Interpreter, _: &JsValue, args: &[JsValue]| match args.first() {
            Some(JsValue::Object(o)) => Ok(JsValue::Object(o.clone())),
            _ => Ok(JsValue::Object(interp.create_object())),
        });
        let object = self.native_object("Object", 1, func, true);
        let prototype = self.intrinsics.object_prototype.clone();
        self.link_constructor(&object, &prototype);

        self.define_function(&prototype, "toString", 0, |interp, this, _| {
            if let JsValue::Object(o) = this
                && o.borrow().array_length().is_some_and(|len| len > MAX_MATERIALIZED_LENGTH)
            {
                return Err(interp.range_error("Invalid string length"));
            }
            Ok(JsValue::from(this.to_string()))
        });
        self.define_function(&prototype, "valueOf", 0, |_, this, _| Ok(this.clone()));
        self.define_function(&prototype, "hasOwnProperty", 1, |interp, this, args| {
            let key = interp.to_property_key(&arg(args, 0))?;
            Ok(JsValue::Boolean(match this {
                JsValue::Object(o) => o.borrow().has_own_property(&key),
                _ => false,
            }))
        });

        self.define_function(&object, "freeze", 1, |_, _, args| {
            let target = arg(args, 0);
            if let JsValue::Object(o) = &target {
                o.borrow_mut().freeze();
            }
            Ok(target)
        });

        self.define_function(&object, "isFrozen", 1, |_, _, args| {
            Ok(JsValue::Boolean(match &arg(args, 0) {
                JsValue::Object(o) => o.borrow().is_frozen(),
                _ => true,
            }))
        });

        self.define_function(&object, "keys", 1, |interp, _, args| {
            let target = arg(args, 0);
            interp.require_object_coercible(&target)?;
            let keys: Vec<JsValue> = match &target {
                JsValue::Object(o) => o.borrow().own_enumerable_keys().into_iter().map(JsValue::from).collect(),
                JsValue::String(s) => (0..s.len()).map(|i| JsValue::from(i.to_string())).collect(),
                _ => Vec::new(),
            };
            Ok(JsValue::Object(interp.create_array(keys)))
        });

        self.define_function(&object, "getPrototypeOf", 1, |interp, _, args| {
            let target = arg(args, 0);
            interp.require_object_coercible(&target)?;
            Ok(match &target {
                JsValue::Object(o) => o.prototype().map(JsValue::Object).unwrap_or(JsValue::Null),
                _ => JsValue::Object(interp.intrinsics.object_prototype.clone()),
            })
        });

        self.define_function(&object, "getOwnPropertyDescriptor", 2, |interp, _, args| {
            let target = arg(args, 0);
            interp.require_object_coercible(&target)?;
            let key = interp.to_property_key(&arg(args, 1))?;
            let desc = match &target {
                JsValue::Object(o) => o.borrow().get_own_property(&key),
                JsValue::String(s) if key == "length" => Some(PropertyDescriptor::data(JsValue::from(s.len()), false, false, false)),
                JsValue::String(s) => number_ops::to_array_index(&key)
                    .and_then(|i| s.char_at(i))
                    .map(|c| PropertyDescriptor::data(JsValue::String(c), false, true, false)),
                _ => None,
            };
            Ok(match desc {
                Some(desc) => interp.from_property_descriptor(&desc),
                None => JsValue::Undefined,
            })
        });

        global.borrow_mut().insert_builtin("Object", JsValue::Object(object));
    }

    pub(super) fn setup_array(&mut self, global: &JsObject) {
        let func: NativeFn = Rc::new(|interp: &mut Interpreter, _: &JsValue, args: &[JsValue]| {
            Ok(JsValue::Object(interp.create_array(args.to_vec())))
        });
        let array = self.native_object("Array", 0, func, true);
        let prototype = self.intrinsics.array_prototype.clone();
        self.link_constructor(&array, &prototype);

        self.define_function(&array, "isArray", 1, |_, _, args| {
            Ok(JsValue::Boolean(matches!(&arg(args, 0), JsValue::Object(o) if o.is_array())))
        });

        self.define_function(&prototype, "push", 1, |interp, this, args| {
            let pushed = match this {
                JsValue::Object(o) if o.is_array() => o.borrow_mut().push_values(args),
                _ => None,
            };
            match pushed {
                Some(len) => Ok(JsValue::from(len)),
                None => Err(interp.type_error("Array.prototype.push called on a frozen or non-array object")),
            }
        });

        global.borrow_mut().insert_builtin("Array", JsValue::Object(array));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> String {
        let mut interp = Interpreter::new();
        interp.run(src).unwrap().to_string()
    }

    #[test]
    fn freeze_makes_writes_silent_no_ops() {
        assert_eq!(run("const o = Object.freeze({a: 1}); o.a = 2; o.b = 3; `${o.a} ${o.b} ${Object.isFrozen(o)}`"), "1 undefined true");
    }

    #[test]
    fn keys_follow_insertion_order() {
        assert_eq!(run("const o = {b: 1, a: 2}; o.c = 3; Object.keys(o)"), "b,a,c");
        assert_eq!(run("Object.keys([7, 8])"), "0,1");
    }

    #[test]
    fn descriptors_of_methods_and_accessors() {
        let src = "class K { m() {} get g() { return 1; } } const d = Object.getOwnPropertyDescriptor(K.prototype, 'm'); const a = Object.getOwnPropertyDescriptor(K.prototype, 'g'); `${d.enumerable} ${d.writable} ${typeof a.get} ${typeof a.set}`";
        assert_eq!(run(src), "false true function undefined");
    }

    #[test]
    fn prototypes_are_observable() {
        assert_eq!(run("function F() {} Object.getPrototypeOf(new F()) === F.prototype"), "true");
        assert_eq!(run("Object.getPrototypeOf(Object.prototype)"), "null");
    }

    #[test]
    fn values_convert_through_the_shared_prototype() {
        assert_eq!(run("`${[1, [2, 3]]}|${{}}|${new Error('e')}`"), "1,2,3|[object Object]|Error: e");
        assert_eq!(run("const o = {a: 1}; `${o.hasOwnProperty('a')} ${o.hasOwnProperty('toString')}`"), "true false");
    }

    #[test]
    fn arrays_push_and_report_themselves() {
        assert_eq!(run("const a = [1]; const n = a.push(2, 3); `${n} ${a} ${Array.isArray(a)} ${Array.isArray({length: 0})}`"), "3 1,2,3 true false");
    }
}
