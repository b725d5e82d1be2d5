//! The evaluation engine.
//!
//! An [`Interpreter`] owns one global object, the program scope that falls
//! back to it, and the job queue async continuations run from. Instances
//! share nothing, so several can live side by side.

use crate::ast::*;
use crate::parser;
use crate::types::{FIRST_USER_SYMBOL_ID, JsObject, JsString, JsSymbol, JsValue, number_ops};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, warn};

mod error;
pub use error::*;
mod types;
pub use types::*;

mod helpers;
mod scope;
pub(crate) use scope::ScopeRef;
mod frames;
mod property;
mod hoist;
mod pattern;
mod function;
mod class;
mod suspension;
pub use suspension::{DeferredState, GeneratorState, Settlement};
mod exec;
mod eval;
mod builtins;

use builtins::Intrinsics;
use frames::{Coroutine, Outcome, Resume};
use scope::Scope;
use suspension::Job;

/// Knobs the embedding host sets before running anything.
#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// Treat every program as strict: assigning an undeclared name throws.
    pub strict: bool,
    /// Nesting of guest calls before a RangeError is thrown.
    pub max_call_depth: usize,
    /// Evaluation steps a single `run` may take.
    pub step_limit: Option<u64>,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_call_depth: 512,
            step_limit: None,
        }
    }
}

impl InterpreterOptions {
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }
}

pub struct Interpreter {
    options: InterpreterOptions,
    global: JsObject,
    pub(crate) global_scope: ScopeRef,
    intrinsics: Intrinsics,
    jobs: VecDeque<Job>,
    call_depth: usize,
    steps: u64,
    next_symbol_id: u64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_options(InterpreterOptions::default())
    }

    pub fn with_options(options: InterpreterOptions) -> Self {
        let intrinsics = Intrinsics::new();
        let global = JsObject::new(ObjectData::new(
            Some(intrinsics.object_prototype.clone()),
            ObjectKind::Ordinary,
        ));
        let global_scope = Scope::new_global(global.clone());
        let mut interp = Self {
            options,
            global,
            global_scope,
            intrinsics,
            jobs: VecDeque::new(),
            call_depth: 0,
            steps: 0,
            next_symbol_id: FIRST_USER_SYMBOL_ID,
        };
        interp.setup_globals();
        interp
    }

    pub fn options(&self) -> &InterpreterOptions {
        &self.options
    }

    pub fn global_object(&self) -> &JsObject {
        &self.global
    }

    /// Binds `name` on the global object before (or between) runs.
    pub fn set_global(&mut self, name: &str, value: JsValue) {
        self.global.borrow_mut().insert_value(name, value);
    }

    /// Exposes a host function to guest code as a global.
    pub fn register_native(
        &mut self,
        name: &str,
        arity: usize,
        func: impl Fn(&mut Interpreter, &JsValue, &[JsValue]) -> EvalResult<JsValue> + 'static,
    ) {
        let f = self.native_function(name, arity, func);
        self.set_global(name, JsValue::Object(f));
    }

    /// Parses and runs `source`, then drains the job queue.
    pub fn run(&mut self, source: &str) -> Result<JsValue, EngineError> {
        let program = parser::parse(source)?;
        self.run_program(&program)
    }

    /// Result is the value of the last expression statement executed.
    pub fn run_program(&mut self, program: &Program) -> Result<JsValue, EngineError> {
        let strict = program.strict || self.options.strict;
        debug!(statements = program.body.len(), strict, "program started");
        self.steps = 0;
        let scope = self.global_scope.clone();
        if let Err(e) = self.hoist_body(&program.body, &scope) {
            return Err(self.uncaught(e));
        }
        let mut co = Coroutine::for_program(program, scope, strict);
        let result = match self.resume(&mut co, Resume::Next(JsValue::Undefined))? {
            Outcome::Complete(value) => value,
            Outcome::Threw(error) => return Err(self.uncaught(EvalError::Thrown(error))),
            Outcome::Yield(_) => return Err(EngineError::SyntaxViolation("yield outside of a generator".into())),
            Outcome::Await(_) => {
                return Err(EngineError::SuspensionProtocol("await is only valid in async functions".into()));
            }
        };
        self.run_jobs()?;
        self.warn_unhandled(&result);
        debug!(steps = self.steps, "program finished");
        Ok(result)
    }

    /// Calls a guest function from the host and drains the jobs it queued.
    /// The step limit applies to each call on its own.
    pub fn call(&mut self, func: &JsValue, this: JsValue, args: &[JsValue]) -> Result<JsValue, EngineError> {
        self.steps = 0;
        let result = match self.call_function(func, this, args) {
            Ok(value) => value,
            Err(e) => return Err(self.uncaught(e)),
        };
        self.run_jobs()?;
        Ok(result)
    }

    /// The exports carrier: `module.exports` if guest code replaced it,
    /// otherwise the global `exports` object.
    pub fn exports(&self) -> JsObject {
        let object_at = |holder: &JsObject, key: &str| match holder.borrow().get_own_value(key) {
            Some(JsValue::Object(o)) => Some(o),
            _ => None,
        };
        object_at(&self.global, "module")
            .and_then(|module| object_at(&module, "exports"))
            .or_else(|| object_at(&self.global, "exports"))
            .unwrap_or_else(|| self.create_object())
    }

    pub fn export(&mut self, name: &str) -> Option<JsValue> {
        let exports = JsValue::Object(self.exports());
        if !self.has_property(&exports, name) {
            return None;
        }
        self.get_property(&exports, name).ok()
    }

    fn uncaught(&self, error: EvalError) -> EngineError {
        match error {
            EvalError::Fatal(e) => e,
            EvalError::Thrown(value) => {
                let message = value.to_string();
                warn!(error = %message, "uncaught guest error");
                EngineError::Uncaught { message, value }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn instances_do_not_share_globals() {
        let mut a = Interpreter::new();
        let mut b = Interpreter::new();
        a.run("x = 1;").unwrap();
        assert!(matches!(b.run("x"), Err(EngineError::Uncaught { .. })));
        assert_eq!(a.run("x").unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn host_values_and_natives_are_visible() {
        let mut interp = Interpreter::new();
        interp.set_global("base", JsValue::from(40));
        interp.register_native("add", 2, |interp, _, args| {
            let a = interp.to_number(args.first().unwrap_or(&JsValue::Undefined))?;
            let b = interp.to_number(args.get(1).unwrap_or(&JsValue::Undefined))?;
            Ok(JsValue::from(a + b))
        });
        assert_eq!(interp.run("add(base, 2)").unwrap().as_number(), Some(42.0));
    }

    #[test]
    fn exports_follow_module_exports_reassignment() {
        let mut interp = Interpreter::new();
        interp.run("exports.a = 1;").unwrap();
        assert_eq!(interp.export("a").and_then(|v| v.as_number()), Some(1.0));
        interp.run("module.exports = {b: 2};").unwrap();
        assert!(interp.export("a").is_none());
        assert_eq!(interp.export("b").and_then(|v| v.as_number()), Some(2.0));
    }

    #[test]
    fn host_can_call_guest_functions() {
        let mut interp = Interpreter::new();
        interp.run("exports.twice = function (n) { return n * 2; };").unwrap();
        let f = interp.export("twice").unwrap();
        let r = interp.call(&f, JsValue::Undefined, &[JsValue::from(21)]).unwrap();
        assert_eq!(r.as_number(), Some(42.0));
    }

    #[test]
    fn step_limit_is_per_host_call() {
        let mut interp = Interpreter::with_options(InterpreterOptions::default().step_limit(5_000));
        interp
            .run("exports.spin = function (n) { let i = 0; while (i < n) i++; return i; };")
            .unwrap();
        let spin = interp.export("spin").unwrap();
        for _ in 0..100 {
            let r = interp.call(&spin, JsValue::Undefined, &[JsValue::from(100)]).unwrap();
            assert_eq!(r.as_number(), Some(100.0));
        }
        let err = interp.call(&spin, JsValue::Undefined, &[JsValue::from(100_000)]).unwrap_err();
        assert!(matches!(&err, EngineError::SuspensionProtocol(m) if m == "step limit exceeded"), "{err}");
    }

    #[test]
    fn strict_option_rejects_implicit_globals() {
        let mut interp = Interpreter::with_options(InterpreterOptions::default().strict(true));
        let err = interp.run("undeclared = 1;").unwrap_err();
        assert_eq!(err.to_string(), "Uncaught ReferenceError: undeclared is not defined");
    }

    #[test]
    fn uncaught_errors_carry_the_guest_value() {
        let mut interp = Interpreter::new();
        match interp.run("throw {code: 7};") {
            Err(EngineError::Uncaught { value, .. }) => {
                assert_eq!(interp.get_property(&value, "code").ok().and_then(|v| v.as_number()), Some(7.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_errors_surface_as_engine_errors() {
        let mut interp = Interpreter::new();
        assert!(matches!(interp.run("let = ;"), Err(EngineError::Parse(_))));
    }
}
