//! Lexical environments and the binding abstraction over them.

use super::Interpreter;
use super::error::{EvalError, EvalResult};
use crate::ast::{Name, VarKind};
use crate::types::{JsObject, JsValue};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

pub type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug, Clone)]
struct Slot {
    /// `None` until the declaration runs (hoisted or temporal dead zone).
    value: Option<JsValue>,
    kind: VarKind,
}

#[derive(Debug)]
pub struct Scope {
    slots: FxHashMap<Name, Slot>,
    parent: Option<ScopeRef>,
    function_boundary: bool,
    /// Fallback target for unresolved names; only set on the outermost scope.
    global: Option<JsObject>,
}

/// Why a declaration was refused.
#[derive(Debug, PartialEq)]
pub enum DeclareError {
    AlreadyDeclared(Name),
}

impl Scope {
    pub fn new_global(global: JsObject) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            slots: FxHashMap::default(),
            parent: None,
            function_boundary: true,
            global: Some(global),
        }))
    }

    pub fn new_child(parent: &ScopeRef, function_boundary: bool) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            slots: FxHashMap::default(),
            parent: Some(parent.clone()),
            function_boundary,
            global: None,
        }))
    }

    pub fn is_function_boundary(&self) -> bool {
        self.function_boundary
    }

    /// Declares a `var` in the nearest function-boundary scope. Re-declaring
    /// keeps the current value unless `value` is given.
    pub fn declare_var(scope: &ScopeRef, name: &Name, value: Option<JsValue>) -> Result<(), DeclareError> {
        let target = Self::var_target(scope);
        let mut target = target.borrow_mut();
        match target.slots.get_mut(name) {
            Some(slot) if slot.kind != VarKind::Var => Err(DeclareError::AlreadyDeclared(name.clone())),
            Some(slot) => {
                if value.is_some() {
                    slot.value = value;
                }
                Ok(())
            }
            None => {
                target.slots.insert(name.clone(), Slot { value, kind: VarKind::Var });
                Ok(())
            }
        }
    }

    /// Declares a `let`/`const` in this very scope. A name that was only
    /// pre-declared (still uninitialized, same kind) gets initialized.
    pub fn declare_lexical(&mut self, name: &Name, kind: VarKind, value: Option<JsValue>) -> Result<(), DeclareError> {
        match self.slots.get_mut(name) {
            Some(slot) if slot.kind == kind && slot.value.is_none() => {
                slot.value = value;
                Ok(())
            }
            Some(_) => Err(DeclareError::AlreadyDeclared(name.clone())),
            None => {
                self.slots.insert(name.clone(), Slot { value, kind });
                Ok(())
            }
        }
    }

    fn var_target(scope: &ScopeRef) -> ScopeRef {
        let mut current = scope.clone();
        loop {
            let parent = {
                let s = current.borrow();
                if s.function_boundary {
                    return current.clone();
                }
                s.parent.clone()
            };
            match parent {
                Some(p) => current = p,
                None => return current,
            }
        }
    }

    /// The scope that declares `name`, walking outwards.
    pub fn lookup(scope: &ScopeRef, name: &str) -> Option<ScopeRef> {
        let mut current = scope.clone();
        loop {
            let parent = {
                let s = current.borrow();
                if s.slots.contains_key(name) {
                    return Some(current.clone());
                }
                s.parent.clone()
            };
            current = parent?;
        }
    }

    pub fn global_object(scope: &ScopeRef) -> Option<JsObject> {
        let mut current = scope.clone();
        loop {
            let parent = {
                let s = current.borrow();
                if let Some(g) = &s.global {
                    return Some(g.clone());
                }
                s.parent.clone()
            };
            current = parent?;
        }
    }

    /// Resolves a name to a binding. Unknown names fall back to a property
    /// of the global object unless `strict` is set and the global object
    /// lacks it.
    pub fn resolve(scope: &ScopeRef, name: &Name, strict: bool) -> Result<Binding, Name> {
        if let Some(found) = Self::lookup(scope, name) {
            return Ok(Binding::Variable {
                scope: found,
                name: name.clone(),
            });
        }
        let global = Self::global_object(scope).ok_or_else(|| name.clone())?;
        if strict && !global.borrow().has_own_property(name) {
            return Err(name.clone());
        }
        let object = JsValue::Object(global);
        Ok(Binding::Property {
            object: object.clone(),
            key: name.to_string(),
            receiver: object,
        })
    }

    /// Copies the slots of a loop-head scope into a fresh sibling, giving
    /// closures created in each iteration their own bindings.
    pub fn copy_for_iteration(scope: &ScopeRef) -> ScopeRef {
        let s = scope.borrow();
        Rc::new(RefCell::new(Scope {
            slots: s.slots.clone(),
            parent: s.parent.clone(),
            function_boundary: s.function_boundary,
            global: s.global.clone(),
        }))
    }

    fn read_slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }
}

/// A place a value can be read from and written to: a variable slot or an
/// object property. `receiver` is the `this` accessors run with.
#[derive(Debug, Clone)]
pub enum Binding {
    Variable { scope: ScopeRef, name: Name },
    Property { object: JsValue, key: String, receiver: JsValue },
}

impl Binding {
    pub fn get(&self, interp: &mut Interpreter) -> EvalResult<JsValue> {
        match self {
            Binding::Variable { scope, name } => {
                let slot = scope.borrow().read_slot(name).cloned();
                match slot {
                    Some(Slot { value: Some(v), .. }) => Ok(v),
                    Some(Slot { value: None, kind: VarKind::Var }) => Ok(JsValue::Undefined),
                    Some(Slot { value: None, .. }) => {
                        Err(interp.reference_error(&format!("Cannot access '{name}' before initialization")))
                    }
                    None => Ok(JsValue::Undefined),
                }
            }
            Binding::Property { object, key, receiver } => interp.get_property_with_receiver(object, key, receiver),
        }
    }

    pub fn set(&self, interp: &mut Interpreter, value: JsValue) -> EvalResult<()> {
        match self {
            Binding::Variable { scope, name } => {
                let state = {
                    let mut s = scope.borrow_mut();
                    let Some(slot) = s.slots.get_mut(name) else {
                        return Ok(());
                    };
                    match (slot.kind, slot.value.is_some()) {
                        (VarKind::Var, _) | (VarKind::Let, true) => {
                            slot.value = Some(value);
                            return Ok(());
                        }
                        state => state,
                    }
                };
                match state {
                    (VarKind::Const, true) => Err(interp.type_error("Assignment to constant variable.")),
                    _ => Err(interp.reference_error(&format!("Cannot access '{name}' before initialization"))),
                }
            }
            Binding::Property { object, key, receiver } => {
                interp.set_property_with_receiver(object, key, value, receiver)
            }
        }
    }

    pub fn delete(&self, interp: &mut Interpreter) -> EvalResult<bool> {
        match self {
            // Declared variables are never deletable.
            Binding::Variable { .. } => Ok(false),
            Binding::Property { object, key, .. } => interp.delete_property(object, key),
        }
    }
}

impl From<DeclareError> for EvalError {
    fn from(e: DeclareError) -> Self {
        match e {
            DeclareError::AlreadyDeclared(name) => {
                EvalError::syntax(format!("Identifier '{name}' has already been declared"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::{ObjectData, ObjectKind};

    fn name(s: &str) -> Name {
        Rc::from(s)
    }

    fn global() -> ScopeRef {
        Scope::new_global(JsObject::new(ObjectData::new(None, ObjectKind::Ordinary)))
    }

    #[test]
    fn var_hoists_to_function_boundary() {
        let top = global();
        let func = Scope::new_child(&top, true);
        let block = Scope::new_child(&func, false);
        Scope::declare_var(&block, &name("x"), Some(JsValue::from(1))).unwrap();
        assert!(block.borrow().read_slot("x").is_none());
        assert!(func.borrow().read_slot("x").is_some());
        assert!(Scope::lookup(&block, "x").is_some_and(|s| Rc::ptr_eq(&s, &func)));
    }

    #[test]
    fn var_redeclaration_keeps_value() {
        let top = global();
        Scope::declare_var(&top, &name("x"), Some(JsValue::from(7))).unwrap();
        Scope::declare_var(&top, &name("x"), None).unwrap();
        let slot = top.borrow().read_slot("x").cloned().unwrap();
        assert!(matches!(slot.value, Some(JsValue::Number(n)) if n == 7.0));
    }

    #[test]
    fn lexical_redeclaration_is_refused() {
        let top = global();
        top.borrow_mut().declare_lexical(&name("a"), VarKind::Let, Some(JsValue::Null)).unwrap();
        assert_eq!(
            top.borrow_mut().declare_lexical(&name("a"), VarKind::Let, Some(JsValue::Null)),
            Err(DeclareError::AlreadyDeclared(name("a")))
        );
        assert!(Scope::declare_var(&top, &name("a"), None).is_err());
    }

    #[test]
    fn predeclared_lexical_gets_initialized_once() {
        let top = global();
        top.borrow_mut().declare_lexical(&name("c"), VarKind::Const, None).unwrap();
        top.borrow_mut().declare_lexical(&name("c"), VarKind::Const, Some(JsValue::from(1))).unwrap();
        assert!(top.borrow_mut().declare_lexical(&name("c"), VarKind::Const, Some(JsValue::from(2))).is_err());
    }

    #[test]
    fn unresolved_names_fall_back_to_the_global_object() {
        let top = global();
        let inner = Scope::new_child(&top, true);
        assert!(matches!(
            Scope::resolve(&inner, &name("nowhere"), false),
            Ok(Binding::Property { key, .. }) if key == "nowhere"
        ));
        assert_eq!(Scope::resolve(&inner, &name("nowhere"), true).err(), Some(name("nowhere")));
    }

    #[test]
    fn iteration_copies_are_independent() {
        let top = global();
        let head = Scope::new_child(&top, false);
        head.borrow_mut().declare_lexical(&name("i"), VarKind::Let, Some(JsValue::from(0))).unwrap();
        let next = Scope::copy_for_iteration(&head);
        next.borrow_mut().slots.get_mut("i").unwrap().value = Some(JsValue::from(1));
        let first = head.borrow().read_slot("i").cloned().unwrap();
        assert!(matches!(first.value, Some(JsValue::Number(n)) if n == 0.0));
    }
}
