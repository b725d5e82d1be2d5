//! Class construction.

use super::frames::{Coroutine, Frame};
use super::scope::Scope;
use super::*;

/// Attaches a method or accessor half to `target`. A getter and a setter
/// for the same key end up on one accessor property.
pub(crate) fn define_method(target: &JsObject, key: String, kind: MethodKind, func: JsValue, enumerable: bool) {
    let mut data = target.borrow_mut();
    let existing = data.get_own_property(&key).filter(PropertyDescriptor::is_accessor_descriptor);
    let (get, set) = existing.map(|d| (d.get, d.set)).unwrap_or((None, None));
    let desc = match kind {
        MethodKind::Get => PropertyDescriptor::accessor(Some(func), set, enumerable),
        MethodKind::Set => PropertyDescriptor::accessor(get, Some(func), enumerable),
        MethodKind::Method | MethodKind::Constructor => PropertyDescriptor::data(func, true, enumerable, true),
    };
    data.define_own_property(key, desc);
}

/// Constructor used when a class declares none: derived classes forward
/// their arguments to the parent constructor.
fn default_constructor(name: Option<Name>, derived: bool) -> Rc<FunctionNode> {
    let args = Name::from("args");
    let (params, body): (Rc<[Pattern]>, Rc<[Statement]>) = if derived {
        let spread = Expression::Spread(Rc::new(Expression::Identifier(args.clone())));
        let call = Expression::Call(Rc::new(Expression::Super), Rc::from(vec![spread]), false);
        (
            Rc::from(vec![Pattern::Rest(Rc::new(Pattern::Identifier(args)))]),
            Rc::from(vec![Statement::Expression(Rc::new(call))]),
        )
    } else {
        (Rc::from(Vec::new()), Rc::from(Vec::new()))
    };
    Rc::new(FunctionNode {
        name,
        params,
        body,
        kind: FunctionKind::Constructor,
        is_async: false,
        is_generator: false,
        strict: true,
    })
}

impl Interpreter {
    /// Creates the constructor and prototype of a class once its heritage
    /// is known, then queues the member definitions.
    pub(crate) fn begin_class(
        &mut self,
        co: &mut Coroutine,
        node: Rc<ClassNode>,
        name: Option<Name>,
        parent: Option<JsValue>,
    ) -> EvalResult<()> {
        let (proto_parent, constructor_parent) = match &parent {
            None => (
                Some(self.intrinsics.object_prototype.clone()),
                self.intrinsics.function_prototype.clone(),
            ),
            Some(JsValue::Null) => (None, self.intrinsics.function_prototype.clone()),
            Some(JsValue::Object(p)) if p.is_callable() => {
                let proto = match self.get_property(&JsValue::Object(p.clone()), "prototype")? {
                    JsValue::Object(o) => Some(o),
                    JsValue::Null => None,
                    _ => return Err(self.type_error("Class extends value does not have valid prototype property")),
                };
                (proto, p.clone())
            }
            Some(other) => {
                let message = format!("Class extends value {} is not a constructor or null", self.describe(other));
                return Err(self.type_error(&message));
            }
        };

        let class_scope = Scope::new_child(&co.scope, false);
        if let Some(n) = &node.name {
            class_scope.borrow_mut().declare_lexical(n, VarKind::Const, None)?;
        }
        let derived = parent.as_ref().is_some_and(|p| !p.is_null());
        let ctor_node = node
            .members
            .iter()
            .find(|m| m.kind == MethodKind::Constructor)
            .map(|m| m.value.clone())
            .unwrap_or_else(|| default_constructor(name.clone(), derived));

        let prototype = JsObject::new(ObjectData::new(proto_parent.clone(), ObjectKind::Ordinary));
        let link = SuperLink {
            constructor: parent.clone().unwrap_or_default(),
            base: proto_parent.map(JsValue::Object).unwrap_or(JsValue::Null),
        };
        let class_name = name.clone().unwrap_or_else(|| Name::from(""));
        let arity = ctor_node.expected_argument_count();
        let closure = Closure {
            node: ctor_node,
            scope: class_scope.clone(),
            super_link: Some(link),
            is_class_constructor: true,
        };
        let constructor = self.function_object(FunctionData::Closure(Rc::new(closure)), &class_name, arity);
        {
            let mut data = constructor.borrow_mut();
            data.prototype = Some(constructor_parent);
            data.define_own_property(
                "prototype".to_string(),
                PropertyDescriptor::data(JsValue::Object(prototype.clone()), false, false, false),
            );
        }
        prototype
            .borrow_mut()
            .insert_builtin("constructor", JsValue::Object(constructor.clone()));
        if let Some(n) = &node.name {
            class_scope
                .borrow_mut()
                .declare_lexical(n, VarKind::Const, Some(JsValue::Object(constructor.clone())))?;
        }

        let saved = std::mem::replace(&mut co.scope, class_scope);
        co.push(Frame::RestoreScope(saved));
        co.push(Frame::ClassMembers {
            node,
            index: 0,
            constructor,
            prototype,
            parent,
            key_pending: false,
        });
        Ok(())
    }

    /// Defines members from `index` on; suspends into key evaluation for
    /// computed keys and leaves the constructor on the stack when done.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn step_class_members(
        &mut self,
        co: &mut Coroutine,
        node: Rc<ClassNode>,
        mut index: usize,
        constructor: JsObject,
        prototype: JsObject,
        parent: Option<JsValue>,
        mut key_pending: bool,
    ) -> EvalResult<()> {
        while let Some(member) = node.members.get(index) {
            if member.kind == MethodKind::Constructor {
                index += 1;
                continue;
            }
            let key = match &member.key {
                PropertyKey::Static(k) => k.to_string(),
                PropertyKey::Computed(_) if key_pending => {
                    key_pending = false;
                    let value = co.pop_value();
                    self.to_property_key(&value)?
                }
                PropertyKey::Computed(expr) => {
                    let expr = expr.clone();
                    co.push(Frame::ClassMembers {
                        node,
                        index,
                        constructor,
                        prototype,
                        parent,
                        key_pending: true,
                    });
                    co.push(Frame::Expr(expr));
                    return Ok(());
                }
            };
            let (target, base) = if member.is_static {
                let base = constructor.prototype().map(JsValue::Object).unwrap_or(JsValue::Null);
                (constructor.clone(), base)
            } else {
                let base = prototype.prototype().map(JsValue::Object).unwrap_or(JsValue::Null);
                (prototype.clone(), base)
            };
            let link = SuperLink {
                constructor: parent.clone().unwrap_or_default(),
                base,
            };
            let func = JsValue::Object(self.create_closure(member.value.clone(), co.scope.clone(), Some(link)));
            let display_name = match member.kind {
                MethodKind::Get => format!("get {key}"),
                MethodKind::Set => format!("set {key}"),
                _ => key.clone(),
            };
            self.set_function_name(&func, &display_name);
            define_method(&target, key, member.kind, func, false);
            index += 1;
        }
        co.values.push(JsValue::Object(constructor));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getter_and_setter_share_one_property() {
        let interp = Interpreter::new();
        let target = interp.create_object();
        let getter = JsValue::Object(interp.native_function("g", 0, |_, _, _| Ok(JsValue::from(1))));
        let setter = JsValue::Object(interp.native_function("s", 1, |_, _, _| Ok(JsValue::Undefined)));
        define_method(&target, "x".into(), MethodKind::Get, getter, false);
        define_method(&target, "x".into(), MethodKind::Set, setter, false);
        let desc = target.borrow().get_own_property("x").unwrap();
        assert!(desc.get.is_some());
        assert!(desc.set.is_some());
    }

    #[test]
    fn plain_method_replaces_accessor() {
        let interp = Interpreter::new();
        let target = interp.create_object();
        let f = JsValue::Object(interp.native_function("f", 0, |_, _, _| Ok(JsValue::Undefined)));
        define_method(&target, "m".into(), MethodKind::Get, f.clone(), true);
        define_method(&target, "m".into(), MethodKind::Method, f, true);
        assert!(target.borrow().get_own_property("m").unwrap().is_data_descriptor());
    }

    #[test]
    fn derived_default_constructor_forwards_arguments() {
        let node = default_constructor(None, true);
        assert_eq!(node.params.len(), 1);
        assert!(matches!(&node.body[0], Statement::Expression(e) if matches!(**e, Expression::Call(..))));
        assert!(default_constructor(None, false).body.is_empty());
    }
}
