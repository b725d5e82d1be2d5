mod iterators;
mod object;
mod promise;

use super::*;
use std::io::Write;

const ERROR_KINDS: [&str; 5] = ["Error", "TypeError", "ReferenceError", "RangeError", "SyntaxError"];

/// Prototypes the engine itself allocates values against.
pub struct Intrinsics {
    pub object_prototype: JsObject,
    pub function_prototype: JsObject,
    pub array_prototype: JsObject,
    pub generator_prototype: JsObject,
    pub async_generator_prototype: JsObject,
    pub deferred_prototype: JsObject,
    /// Keyed by constructor name; every entry but `Error` inherits from
    /// `Error.prototype`.
    pub error_prototypes: FxHashMap<String, JsObject>,
}

impl Intrinsics {
    pub fn new() -> Self {
        let object_prototype = JsObject::new(ObjectData::new(None, ObjectKind::Ordinary));
        let ordinary = |parent: &JsObject| JsObject::new(ObjectData::new(Some(parent.clone()), ObjectKind::Ordinary));
        let error_prototype = ordinary(&object_prototype);
        let mut error_prototypes = FxHashMap::default();
        for kind in ERROR_KINDS {
            let proto = if kind == "Error" {
                error_prototype.clone()
            } else {
                ordinary(&error_prototype)
            };
            error_prototypes.insert(kind.to_string(), proto);
        }
        Self {
            function_prototype: ordinary(&object_prototype),
            array_prototype: ordinary(&object_prototype),
            generator_prototype: ordinary(&object_prototype),
            async_generator_prototype: ordinary(&object_prototype),
            deferred_prototype: ordinary(&object_prototype),
            error_prototypes,
            object_prototype,
        }
    }
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Installs a native method as a non-enumerable property of `target`.
    pub(crate) fn define_function(
        &self,
        target: &JsObject,
        name: &str,
        arity: usize,
        func: impl Fn(&mut Interpreter, &JsValue, &[JsValue]) -> EvalResult<JsValue> + 'static,
    ) {
        let f = self.native_function(name, arity, func);
        target.borrow_mut().insert_builtin(name, JsValue::Object(f));
    }

    /// Links a constructor and its prototype both ways.
    fn link_constructor(&self, constructor: &JsObject, prototype: &JsObject) {
        constructor.borrow_mut().define_own_property(
            "prototype".to_string(),
            PropertyDescriptor::data(JsValue::Object(prototype.clone()), false, false, false),
        );
        prototype
            .borrow_mut()
            .insert_builtin("constructor", JsValue::Object(constructor.clone()));
    }

    pub(crate) fn setup_globals(&mut self) {
        let global = self.global.clone();
        {
            let mut g = global.borrow_mut();
            g.insert_builtin("globalThis", JsValue::Object(global.clone()));
            for (name, value) in [
                ("undefined", JsValue::Undefined),
                ("NaN", JsValue::Number(f64::NAN)),
                ("Infinity", JsValue::Number(f64::INFINITY)),
            ] {
                g.define_own_property(name.to_string(), PropertyDescriptor::data(value, false, false, false));
            }
        }

        let exports = self.create_object();
        let module = self.create_object();
        module.borrow_mut().insert_value("exports", JsValue::Object(exports.clone()));
        global.borrow_mut().insert_builtin("exports", JsValue::Object(exports));
        global.borrow_mut().insert_builtin("module", JsValue::Object(module));

        let console = self.create_object();
        self.define_function(&console, "log", 0, |_, _, args| {
            let line = args.iter().map(JsValue::to_string).collect::<Vec<_>>().join(" ");
            let mut out = std::io::stdout().lock();
            writeln!(out, "{line}").map_err(|e| EvalError::Fatal(EngineError::Io(e)))?;
            Ok(JsValue::Undefined)
        });
        global.borrow_mut().insert_builtin("console", JsValue::Object(console));

        self.setup_object(&global);
        self.setup_array(&global);
        self.setup_symbol(&global);
        self.setup_errors(&global);
        self.setup_generator_prototypes();
        self.setup_deferred(&global);
    }

    fn setup_symbol(&mut self, global: &JsObject) {
        let symbol = self.native_function("Symbol", 0, |interp, _, args| {
            let description = match args.first() {
                Some(v) if !v.is_undefined() => Some(interp.to_js_string(v)?),
                _ => None,
            };
            let id = interp.next_symbol_id;
            interp.next_symbol_id += 1;
            Ok(JsValue::Symbol(JsSymbol { id, description }))
        });
        {
            let mut data = symbol.borrow_mut();
            for well_known in [JsSymbol::iterator(), JsSymbol::async_iterator()] {
                let key = well_known
                    .description
                    .as_ref()
                    .and_then(|d| d.as_str().strip_prefix("Symbol.").map(str::to_string))
                    .unwrap_or_default();
                data.define_own_property(
                    key,
                    PropertyDescriptor::data(JsValue::Symbol(well_known), false, false, false),
                );
            }
        }
        global.borrow_mut().insert_builtin("Symbol", JsValue::Object(symbol));
    }

    fn setup_errors(&mut self, global: &JsObject) {
        for kind in ERROR_KINDS {
            let Some(prototype) = self.intrinsics.error_prototypes.get(kind).cloned() else {
                continue;
            };
            {
                let mut data = prototype.borrow_mut();
                data.insert_builtin("name", JsValue::from(kind));
                data.insert_builtin("message", JsValue::from(""));
            }
            let proto = prototype.clone();
            let func: NativeFn = Rc::new(move |interp: &mut Interpreter, this: &JsValue, args: &[JsValue]| {
                let message = match args.first() {
                    Some(v) if !v.is_undefined() => Some(interp.to_js_string(v)?),
                    _ => None,
                };
                // `new` and `super(...)` hand in an instance to initialize.
                let target = match this {
                    JsValue::Object(o) if interp.inherits_from(o, &proto) => o.clone(),
                    _ => JsObject::new(ObjectData::new(Some(proto.clone()), ObjectKind::Ordinary)),
                };
                {
                    let mut data = target.borrow_mut();
                    data.kind = ObjectKind::Error;
                    if let Some(message) = message {
                        data.insert_builtin("message", JsValue::String(message));
                    }
                }
                Ok(JsValue::Object(target))
            });
            let constructor = self.native_object(kind, 1, func, true);
            self.link_constructor(&constructor, &prototype);
            global.borrow_mut().insert_builtin(kind, JsValue::Object(constructor));
        }
    }

    fn inherits_from(&self, object: &JsObject, prototype: &JsObject) -> bool {
        let mut current = object.prototype();
        while let Some(p) = current {
            if p.ptr_eq(prototype) {
                return true;
            }
            current = p.prototype();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> String {
        let mut interp = Interpreter::new();
        interp.run(src).unwrap().to_string()
    }

    #[test]
    fn error_constructors_share_the_error_prototype() {
        assert_eq!(run("const e = new TypeError('bad'); `${e instanceof TypeError} ${e instanceof Error} ${e}`"), "true true TypeError: bad");
        assert_eq!(run("RangeError('x').name"), "RangeError");
    }

    #[test]
    fn subclassed_errors_keep_their_message() {
        let src = "class Oops extends Error { constructor(m) { super(m); this.name = 'Oops'; } } const e = new Oops('late'); `${e}|${e instanceof Error}`";
        assert_eq!(run(src), "Oops: late|true");
    }

    #[test]
    fn engine_errors_are_instances_of_the_globals() {
        let src = "let r; try { null.x; } catch (e) { r = e instanceof TypeError && e.constructor === TypeError; } r";
        assert_eq!(run(src), "true");
    }

    #[test]
    fn symbols_are_unique_and_usable_as_keys() {
        let src = "const a = Symbol('k'); const b = Symbol('k'); const o = {[a]: 1, [b]: 2}; `${a === b} ${o[a] + o[b]} ${Object.keys(o).length}`";
        assert_eq!(run(src), "false 3 0");
    }

    #[test]
    fn globals_are_read_only_where_expected() {
        assert_eq!(run("undefined = 1; NaN = 2; `${undefined} ${NaN}`"), "undefined NaN");
        assert_eq!(run("globalThis.shared = 4; shared"), "4");
    }
}
