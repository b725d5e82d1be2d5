//! Declaration pre-pass run before a body executes.

use super::scope::Scope;
use super::*;

/// Names a pattern declares, in source order.
pub(crate) fn bound_names(pattern: &Pattern, out: &mut Vec<Name>) {
    match pattern {
        Pattern::Identifier(name) => out.push(name.clone()),
        Pattern::Array(items) => {
            for item in items.iter().flatten() {
                bound_names(item, out);
            }
        }
        Pattern::Object(props) => {
            for prop in props.iter() {
                match prop {
                    ObjectPatternProperty::KeyValue(_, p) | ObjectPatternProperty::Rest(p) => bound_names(p, out),
                }
            }
        }
        Pattern::Assign(inner, _) | Pattern::Rest(inner) => bound_names(inner, out),
        Pattern::Member(_) => {}
    }
}

fn declare_var_pattern(pattern: &Pattern, scope: &ScopeRef) -> EvalResult<()> {
    let mut names = Vec::new();
    bound_names(pattern, &mut names);
    for name in &names {
        Scope::declare_var(scope, name, None)?;
    }
    Ok(())
}

/// Pre-declares every `var` in `body`, looking into nested statements but
/// not into nested functions.
pub(crate) fn hoist_var_names(body: &[Statement], scope: &ScopeRef) -> EvalResult<()> {
    for stmt in body {
        hoist_var_statement(stmt, scope)?;
    }
    Ok(())
}

fn hoist_var_statement(stmt: &Statement, scope: &ScopeRef) -> EvalResult<()> {
    match stmt {
        Statement::Variable(decl) if decl.kind == VarKind::Var => {
            for d in decl.declarations.iter() {
                declare_var_pattern(&d.pattern, scope)?;
            }
        }
        Statement::Block(body) => hoist_var_names(body, scope)?,
        Statement::If(node) => {
            hoist_var_statement(&node.consequent, scope)?;
            if let Some(alt) = &node.alternate {
                hoist_var_statement(alt, scope)?;
            }
        }
        Statement::While(node) | Statement::DoWhile(node) => hoist_var_statement(&node.body, scope)?,
        Statement::For(node) => {
            if let Some(ForInit::Variable(decl)) = &node.init
                && decl.kind == VarKind::Var
            {
                for d in decl.declarations.iter() {
                    declare_var_pattern(&d.pattern, scope)?;
                }
            }
            hoist_var_statement(&node.body, scope)?;
        }
        Statement::ForIn(ForInStatement { left, body, .. }) | Statement::ForOf(ForOfStatement { left, body, .. }) => {
            if let ForInOfLeft::Declaration(VarKind::Var, pattern) = left {
                declare_var_pattern(pattern, scope)?;
            }
            hoist_var_statement(body, scope)?;
        }
        Statement::Try(node) => {
            hoist_var_names(&node.block, scope)?;
            if let Some(handler) = &node.handler {
                hoist_var_names(&handler.body, scope)?;
            }
            if let Some(finalizer) = &node.finalizer {
                hoist_var_names(finalizer, scope)?;
            }
        }
        Statement::Switch(node) => {
            for case in node.cases.iter() {
                hoist_var_names(&case.consequent, scope)?;
            }
        }
        Statement::Labeled(_, body) => hoist_var_statement(body, scope)?,
        _ => {}
    }
    Ok(())
}

impl Interpreter {
    /// Declares the lexical bindings of one statement list in `scope`:
    /// `let`/`const`/`class` names start uninitialized and function
    /// declarations are defined up front. At a function boundary the
    /// functions become `var` bindings.
    pub(crate) fn hoist_lexical<'a>(
        &mut self,
        body: impl IntoIterator<Item = &'a Statement>,
        scope: &ScopeRef,
    ) -> EvalResult<()> {
        let boundary = scope.borrow().is_function_boundary();
        for stmt in body {
            match stmt {
                Statement::Variable(decl) if decl.kind != VarKind::Var => {
                    let mut names = Vec::new();
                    for d in decl.declarations.iter() {
                        bound_names(&d.pattern, &mut names);
                    }
                    for name in &names {
                        scope.borrow_mut().declare_lexical(name, decl.kind, None)?;
                    }
                }
                Statement::ClassDeclaration(class) => {
                    if let Some(name) = &class.name {
                        scope.borrow_mut().declare_lexical(name, VarKind::Let, None)?;
                    }
                }
                Statement::FunctionDeclaration(node) => {
                    let Some(name) = &node.name else {
                        continue;
                    };
                    let func = JsValue::Object(self.create_closure(node.clone(), scope.clone(), None));
                    if boundary {
                        Scope::declare_var(scope, name, Some(func))?;
                    } else {
                        scope.borrow_mut().declare_lexical(name, VarKind::Let, Some(func))?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Full pre-pass for a function body or program.
    pub(crate) fn hoist_body(&mut self, body: &[Statement], scope: &ScopeRef) -> EvalResult<()> {
        hoist_var_names(body, scope)?;
        self.hoist_lexical(body, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn collects_names_from_nested_patterns() {
        let program = parse("var [a, {b, c: [d]}, ...e] = x;").unwrap();
        let Statement::Variable(decl) = &program.body[0] else {
            panic!("expected a declaration");
        };
        let mut names = Vec::new();
        bound_names(&decl.declarations[0].pattern, &mut names);
        let names: Vec<&str> = names.iter().map(|n| &**n).collect();
        assert_eq!(names, vec!["a", "b", "d", "e"]);
    }

    #[test]
    fn vars_in_nested_blocks_hoist_but_function_bodies_do_not() {
        let program = parse("if (x) { for (var i = 0;;) { var y; } } function f() { var inner; }").unwrap();
        let interp = Interpreter::new();
        let scope = Scope::new_child(&interp.global_scope, true);
        hoist_var_names(&program.body, &scope).unwrap();
        assert!(Scope::lookup(&scope, "i").is_some());
        assert!(Scope::lookup(&scope, "y").is_some());
        assert!(Scope::lookup(&scope, "inner").is_none());
    }

    #[test]
    fn lexical_names_start_uninitialized() {
        let program = parse("let a = 1; class K {} function f() {}").unwrap();
        let mut interp = Interpreter::new();
        let scope = Scope::new_child(&interp.global_scope, true);
        interp.hoist_body(&program.body, &scope).unwrap();
        let read = |interp: &mut Interpreter, name: &str| {
            Scope::resolve(&scope, &Name::from(name), true)
                .ok()
                .map(|b| b.get(interp))
        };
        assert!(matches!(read(&mut interp, "a"), Some(Err(EvalError::Thrown(_)))));
        assert!(matches!(read(&mut interp, "K"), Some(Err(EvalError::Thrown(_)))));
        assert!(matches!(read(&mut interp, "f"), Some(Ok(v)) if v.is_callable()));
    }
}
