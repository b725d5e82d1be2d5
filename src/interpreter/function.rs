//! Turning function syntax into callables, and calling them.

use super::frames::{BindMode, Coroutine, Frame, Outcome, Resume};
use super::scope::Scope;
use super::*;

/// Hidden bindings a call scope carries for `super`.
pub(crate) const SUPER_CONSTRUCTOR: &str = "%super";
pub(crate) const SUPER_BASE: &str = "%superbase";

impl Interpreter {
    pub(crate) fn native_function(
        &self,
        name: &str,
        arity: usize,
        func: impl Fn(&mut Interpreter, &JsValue, &[JsValue]) -> EvalResult<JsValue> + 'static,
    ) -> JsObject {
        self.native_object(name, arity, Rc::new(func), false)
    }

    pub(crate) fn native_object(&self, name: &str, arity: usize, func: NativeFn, constructor: bool) -> JsObject {
        let native = NativeFunction {
            name: Name::from(name),
            arity,
            func,
            constructor,
        };
        self.function_object(FunctionData::Native(Rc::new(native)), name, arity)
    }

    pub(crate) fn function_object(&self, function: FunctionData, name: &str, arity: usize) -> JsObject {
        let mut data = ObjectData::new(
            Some(self.intrinsics.function_prototype.clone()),
            ObjectKind::Function(function),
        );
        data.define_own_property(
            "length".to_string(),
            PropertyDescriptor::data(JsValue::from(arity), false, false, true),
        );
        data.define_own_property(
            "name".to_string(),
            PropertyDescriptor::data(JsValue::from(name), false, false, true),
        );
        JsObject::new(data)
    }

    /// Builds a callable from a function node closing over `scope`.
    pub(crate) fn create_closure(
        &mut self,
        node: Rc<FunctionNode>,
        scope: ScopeRef,
        super_link: Option<SuperLink>,
    ) -> JsObject {
        let is_function = matches!(node.kind, FunctionKind::Normal | FunctionKind::Method);
        let prototype = match (is_function, node.is_async, node.is_generator) {
            (true, true, true) => Some(self.intrinsics.async_generator_prototype.clone()),
            (true, false, true) => Some(self.intrinsics.generator_prototype.clone()),
            _ if node.kind == FunctionKind::Normal && !node.is_async => Some(self.intrinsics.object_prototype.clone()),
            _ => None,
        };
        let name = node.name.clone().unwrap_or_else(|| Name::from(""));
        let arity = node.expected_argument_count();
        let is_generator = node.is_generator;
        let closure = Closure {
            node,
            scope,
            super_link,
            is_class_constructor: false,
        };
        let func = self.function_object(FunctionData::Closure(Rc::new(closure)), &name, arity);
        if let Some(parent) = prototype {
            let proto = JsObject::new(ObjectData::new(Some(parent), ObjectKind::Ordinary));
            if !is_generator {
                proto.borrow_mut().insert_builtin("constructor", JsValue::Object(func.clone()));
            }
            func.borrow_mut().define_own_property(
                "prototype".to_string(),
                PropertyDescriptor::data(JsValue::Object(proto), true, false, false),
            );
        }
        func
    }

    /// Renames an anonymous function or class after the binding it is
    /// assigned to.
    pub(crate) fn set_function_name(&self, func: &JsValue, name: &str) {
        let JsValue::Object(obj) = func else {
            return;
        };
        let mut data = obj.borrow_mut();
        let unnamed = matches!(data.get_own_value("name"), Some(JsValue::String(s)) if s.is_empty());
        if unnamed {
            data.define_own_property(
                "name".to_string(),
                PropertyDescriptor::data(JsValue::from(name), false, false, true),
            );
        }
    }

    pub(crate) fn enter_call(&mut self) -> EvalResult<()> {
        if self.call_depth >= self.options.max_call_depth {
            return Err(self.range_error("Maximum call stack size exceeded"));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    fn function_data(&mut self, func: &JsValue) -> EvalResult<(JsObject, FunctionData)> {
        if let JsValue::Object(obj) = func
            && let Some(data) = obj.borrow().function().cloned()
        {
            return Ok((obj.clone(), data));
        }
        let message = format!("{} is not a function", self.describe(func));
        Err(self.type_error(&message))
    }

    pub(crate) fn call_function(&mut self, func: &JsValue, this: JsValue, args: &[JsValue]) -> EvalResult<JsValue> {
        let (obj, data) = self.function_data(func)?;
        if let FunctionData::Closure(closure) = &data
            && closure.is_class_constructor
        {
            let message = format!("Class constructor {} cannot be invoked without 'new'", data.name());
            return Err(self.type_error(&message));
        }
        self.invoke(&obj, &data, this, args)
    }

    /// `super(...)`: runs the parent constructor against the current `this`.
    pub(crate) fn call_super_constructor(
        &mut self,
        parent: &JsValue,
        this: JsValue,
        args: &[JsValue],
    ) -> EvalResult<JsValue> {
        if !parent.is_callable() {
            return Err(self.type_error("Super constructor is not a constructor"));
        }
        let (obj, data) = self.function_data(parent)?;
        self.invoke(&obj, &data, this.clone(), args)?;
        Ok(this)
    }

    fn invoke(&mut self, obj: &JsObject, data: &FunctionData, this: JsValue, args: &[JsValue]) -> EvalResult<JsValue> {
        self.enter_call()?;
        let result = match data {
            FunctionData::Native(native) => (native.func)(self, &this, args),
            FunctionData::Closure(closure) => self.call_closure(closure, obj, this, args),
        };
        self.exit_call();
        result
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, obj: &JsObject, this: JsValue, args: &[JsValue]) -> EvalResult<JsValue> {
        let co = self.prepare_call(closure, this, args)?;
        match (closure.node.is_async, closure.node.is_generator) {
            (false, false) => self.run_to_completion(co),
            (false, true) => Ok(JsValue::Object(self.create_generator_object(co, obj, false))),
            (true, false) => self.start_async(co),
            (true, true) => Ok(JsValue::Object(self.create_generator_object(co, obj, true))),
        }
    }

    /// The coroutine of an async callee when `func` is a plain async
    /// function; used to run `await f()` inside the caller's chain.
    pub(crate) fn prepare_awaited_call(
        &mut self,
        func: &JsValue,
        this: &JsValue,
        args: &[JsValue],
    ) -> EvalResult<Option<Coroutine>> {
        let closure = match func {
            JsValue::Object(obj) => match obj.borrow().function() {
                Some(FunctionData::Closure(c))
                    if c.node.is_async && !c.node.is_generator && !c.is_class_constructor =>
                {
                    Some(c.clone())
                }
                _ => None,
            },
            _ => None,
        };
        match closure {
            Some(c) => Ok(Some(self.prepare_call(&c, this.clone(), args)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn run_to_completion(&mut self, mut co: Coroutine) -> EvalResult<JsValue> {
        match self.resume(&mut co, Resume::Next(JsValue::Undefined))? {
            Outcome::Complete(v) => Ok(v),
            Outcome::Threw(e) => Err(EvalError::Thrown(e)),
            Outcome::Yield(_) => Err(EvalError::suspension("yield outside of a generator")),
            Outcome::Await(_) => Err(EvalError::suspension("await is only valid in async functions")),
        }
    }

    /// Allocates the call scope, binds `this`, `arguments`, the super-link
    /// and parameters, and hoists the body.
    pub(crate) fn prepare_call(&mut self, closure: &Rc<Closure>, this: JsValue, args: &[JsValue]) -> EvalResult<Coroutine> {
        let node = &closure.node;
        let strict = node.strict || self.options.strict;
        let scope = Scope::new_child(&closure.scope, true);
        if node.kind != FunctionKind::Arrow {
            let arguments = JsObject::new(ObjectData::new(
                Some(self.intrinsics.object_prototype.clone()),
                ObjectKind::Arguments(args.to_vec()),
            ));
            let mut s = scope.borrow_mut();
            s.declare_lexical(&Name::from("this"), VarKind::Const, Some(this))?;
            s.declare_lexical(&Name::from("arguments"), VarKind::Let, Some(JsValue::Object(arguments)))?;
            if let Some(link) = &closure.super_link {
                s.declare_lexical(&Name::from(SUPER_CONSTRUCTOR), VarKind::Const, Some(link.constructor.clone()))?;
                s.declare_lexical(&Name::from(SUPER_BASE), VarKind::Const, Some(link.base.clone()))?;
            }
        }

        let mut pending = Vec::new();
        for (i, param) in node.params.iter().enumerate() {
            let (pattern, value) = match param {
                Pattern::Rest(inner) => {
                    let rest = args.get(i..).map(<[JsValue]>::to_vec).unwrap_or_default();
                    ((**inner).clone(), JsValue::Object(self.create_array(rest)))
                }
                other => (other.clone(), args.get(i).cloned().unwrap_or_default()),
            };
            match pattern {
                Pattern::Identifier(name) if pending.is_empty() => Scope::declare_var(&scope, &name, Some(value))?,
                pattern => pending.push(Frame::Bind {
                    pattern,
                    mode: BindMode::Declare(VarKind::Var),
                    value: Some(value),
                }),
            }
        }
        self.hoist_body(&node.body, &scope)?;

        let mut co = Coroutine::new(node.body.clone(), scope, strict);
        co.is_async = node.is_async;
        co.is_generator = node.is_generator;
        co.frames.extend(pending.into_iter().rev());
        Ok(co)
    }

    /// `new F(...args)`.
    pub(crate) fn construct(&mut self, func: &JsValue, args: &[JsValue]) -> EvalResult<JsValue> {
        let (obj, data) = self.function_data(func)?;
        let constructible = match &data {
            FunctionData::Native(native) => native.constructor,
            FunctionData::Closure(c) => {
                c.is_class_constructor
                    || (c.node.kind == FunctionKind::Normal && !c.node.is_async && !c.node.is_generator)
            }
        };
        if !constructible {
            let message = format!("{} is not a constructor", self.describe(func));
            return Err(self.type_error(&message));
        }
        let prototype = match self.get_property(func, "prototype")? {
            JsValue::Object(p) => p,
            _ => self.intrinsics.object_prototype.clone(),
        };
        let this = JsValue::Object(JsObject::new(ObjectData::new(Some(prototype), ObjectKind::Ordinary)));
        let result = self.invoke(&obj, &data, this.clone(), args)?;
        Ok(if result.is_object() { result } else { this })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natives_carry_name_and_length() {
        let interp = Interpreter::new();
        let f = interp.native_function("add", 2, |_, _, _| Ok(JsValue::Undefined));
        let data = f.borrow();
        assert_eq!(data.get_own_value("name").map(|v| v.to_string()), Some("add".to_string()));
        assert_eq!(data.get_own_value("length").and_then(|v| v.as_number()), Some(2.0));
        assert!(!data.get_own_property("name").is_some_and(|d| d.is_enumerable()));
    }

    #[test]
    fn calling_a_non_function_is_a_type_error() {
        let mut interp = Interpreter::new();
        let err = interp.call_function(&JsValue::from(3), JsValue::Undefined, &[]);
        assert!(matches!(err, Err(EvalError::Thrown(_))));
    }

    #[test]
    fn call_depth_is_bounded() {
        let mut interp = Interpreter::with_options(InterpreterOptions::default().max_call_depth(2));
        interp.enter_call().unwrap();
        interp.enter_call().unwrap();
        assert!(matches!(interp.enter_call(), Err(EvalError::Thrown(_))));
        interp.exit_call();
        assert!(interp.enter_call().is_ok());
    }
}
