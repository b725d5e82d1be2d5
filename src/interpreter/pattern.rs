//! Destructuring: binding a value against array, object, default and rest
//! patterns, either declaring new names or assigning through references.

use super::frames::{BindMode, Coroutine, Frame, RefUse};
use super::scope::{Binding, Scope};
use super::*;

impl Interpreter {
    pub(crate) fn resolve_binding(&mut self, co: &Coroutine, name: &Name) -> EvalResult<Binding> {
        Scope::resolve(&co.scope, name, co.strict).map_err(|n| self.reference_error(&format!("{n} is not defined")))
    }

    pub(crate) fn bind_name(&mut self, co: &mut Coroutine, name: &Name, mode: BindMode, value: JsValue) -> EvalResult<()> {
        match mode {
            BindMode::Declare(VarKind::Var) => Scope::declare_var(&co.scope, name, Some(value))?,
            BindMode::Declare(kind) => co.scope.borrow_mut().declare_lexical(name, kind, Some(value))?,
            BindMode::Assign => {
                let binding = self.resolve_binding(co, name)?;
                binding.set(self, value)?;
            }
        }
        Ok(())
    }

    /// One pattern against one value; nested work is queued as frames.
    pub(crate) fn step_bind(&mut self, co: &mut Coroutine, pattern: Pattern, mode: BindMode, value: Option<JsValue>) -> EvalResult<()> {
        let value = match value {
            Some(v) => v,
            None => co.pop_value(),
        };
        match pattern {
            Pattern::Identifier(name) => self.bind_name(co, &name, mode, value)?,
            Pattern::Assign(inner, default) => {
                if value.is_undefined() {
                    co.push(Frame::Bind {
                        pattern: (*inner).clone(),
                        mode,
                        value: None,
                    });
                    match &*inner {
                        Pattern::Identifier(name) if default.is_anonymous_function_definition() => {
                            co.push(Frame::NamedExpr(default, name.clone()))
                        }
                        _ => co.push(Frame::Expr(default)),
                    }
                } else {
                    co.push(Frame::Bind {
                        pattern: (*inner).clone(),
                        mode,
                        value: Some(value),
                    });
                }
            }
            Pattern::Array(items) => {
                let values = self.iterate_to_vec(&value)?;
                co.push(Frame::ArrayPatternStep {
                    items,
                    values: values.into(),
                    index: 0,
                    mode,
                });
            }
            Pattern::Object(props) => {
                if value.is_nullish() {
                    let message = format!("Cannot destructure '{value}' as it is {value}.");
                    return Err(self.type_error(&message));
                }
                co.push(Frame::ObjectPatternStep {
                    props,
                    feed: value,
                    index: 0,
                    used: Vec::new(),
                    mode,
                });
            }
            Pattern::Rest(inner) => co.push(Frame::Bind {
                pattern: (*inner).clone(),
                mode,
                value: Some(value),
            }),
            Pattern::Member(target) => {
                if let BindMode::Declare(_) = mode {
                    return Err(EvalError::syntax("Invalid destructuring target in declaration"));
                }
                co.values.push(value);
                self.push_reference(co, &target, RefUse::Store)?;
            }
        }
        Ok(())
    }

    pub(crate) fn step_array_pattern(
        &mut self,
        co: &mut Coroutine,
        items: Rc<[Option<Pattern>]>,
        values: Rc<[JsValue]>,
        mut index: usize,
        mode: BindMode,
    ) -> EvalResult<()> {
        while let Some(item) = items.get(index) {
            match item {
                None => index += 1,
                Some(Pattern::Rest(inner)) => {
                    let rest = values.get(index..).map(<[JsValue]>::to_vec).unwrap_or_default();
                    let rest = JsValue::Object(self.create_array(rest));
                    co.push(Frame::Bind {
                        pattern: (**inner).clone(),
                        mode,
                        value: Some(rest),
                    });
                    return Ok(());
                }
                Some(pattern) => {
                    let value = values.get(index).cloned().unwrap_or_default();
                    let pattern = pattern.clone();
                    co.push(Frame::ArrayPatternStep {
                        items,
                        values,
                        index: index + 1,
                        mode,
                    });
                    co.push(Frame::Bind {
                        pattern,
                        mode,
                        value: Some(value),
                    });
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Binds entry `index` of an object pattern. `key` is the already
    /// evaluated computed key, if the entry has one.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn step_object_pattern(
        &mut self,
        co: &mut Coroutine,
        props: Rc<[ObjectPatternProperty]>,
        feed: JsValue,
        index: usize,
        mut used: Vec<String>,
        mode: BindMode,
        key: Option<String>,
    ) -> EvalResult<()> {
        let Some(prop) = props.get(index) else {
            return Ok(());
        };
        match prop {
            ObjectPatternProperty::KeyValue(prop_key, pattern) => {
                let key = match (key, prop_key) {
                    (Some(k), _) => k,
                    (None, PropertyKey::Static(k)) => k.to_string(),
                    (None, PropertyKey::Computed(expr)) => {
                        let expr = expr.clone();
                        co.push(Frame::ObjectPatternKey {
                            props,
                            feed,
                            index,
                            used,
                            mode,
                        });
                        co.push(Frame::Expr(expr));
                        return Ok(());
                    }
                };
                let value = self.get_property(&feed, &key)?;
                let pattern = pattern.clone();
                used.push(key);
                co.push(Frame::ObjectPatternStep {
                    props,
                    feed,
                    index: index + 1,
                    used,
                    mode,
                });
                co.push(Frame::Bind {
                    pattern,
                    mode,
                    value: Some(value),
                });
            }
            ObjectPatternProperty::Rest(pattern) => {
                let rest = self.create_object();
                let keys = match &feed {
                    JsValue::Object(o) => o.borrow().own_enumerable_keys(),
                    _ => Vec::new(),
                };
                for key in keys.into_iter().filter(|k| !used.contains(k)) {
                    let value = self.get_property(&feed, &key)?;
                    rest.borrow_mut().insert_value(&key, value);
                }
                co.push(Frame::Bind {
                    pattern: pattern.clone(),
                    mode,
                    value: Some(JsValue::Object(rest)),
                });
            }
        }
        Ok(())
    }

    /// Destructuring assignment expression: leaves its result on the stack
    /// (the assigned elements for array patterns, the source otherwise).
    pub(crate) fn step_assign_pattern(&mut self, co: &mut Coroutine, pattern: Rc<Pattern>) -> EvalResult<()> {
        let value = co.pop_value();
        if let Pattern::Array(items) = &*pattern {
            let values = self.iterate_to_vec(&value)?;
            co.values.push(JsValue::Object(self.create_array(values.clone())));
            co.push(Frame::ArrayPatternStep {
                items: items.clone(),
                values: values.into(),
                index: 0,
                mode: BindMode::Assign,
            });
            return Ok(());
        }
        co.values.push(value.clone());
        co.push(Frame::Bind {
            pattern: (*pattern).clone(),
            mode: BindMode::Assign,
            value: Some(value),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> JsValue {
        let mut interp = Interpreter::new();
        interp.run(src).unwrap()
    }

    #[test]
    fn swap_through_array_pattern() {
        assert_eq!(run("let a = 1, b = 2; [a, b] = [b, a]; a * 10 + b").as_number(), Some(21.0));
    }

    #[test]
    fn defaults_only_apply_to_undefined() {
        assert_eq!(run("const [x = 5, y = 6] = [undefined, null]; `${x},${y}`").to_string(), "5,null");
    }

    #[test]
    fn object_rest_skips_taken_keys() {
        let v = run("const {a, ...others} = {a: 1, b: 2, c: 3}; Object.keys(others).length * 100 + others.b + others.c");
        assert_eq!(v.as_number(), Some(205.0));
    }

    #[test]
    fn computed_keys_and_nesting() {
        let v = run("const k = 'inner'; const {[k]: {deep: [, second]}} = {inner: {deep: [1, 2]}}; second");
        assert_eq!(v.as_number(), Some(2.0));
    }

    #[test]
    fn member_targets_in_assignment_patterns() {
        let v = run("const o = {}; [o.a, o['b']] = [1, 2]; ({c: o.c} = {c: 3}); o.a + o.b + o.c");
        assert_eq!(v.as_number(), Some(6.0));
    }

    #[test]
    fn destructuring_null_throws() {
        let mut interp = Interpreter::new();
        assert!(interp.run("const {a} = null;").is_err());
    }
}
