use super::super::*;
use super::super::frames::Resume;

impl Interpreter {
    /// `next`/`return`/`throw` shared by generator and async generator
    /// objects; the async variants answer with deferred `{value, done}`
    /// records.
    pub(super) fn setup_generator_prototypes(&mut self) {
        for (prototype, symbol) in [
            (self.intrinsics.generator_prototype.clone(), JsSymbol::iterator()),
            (self.intrinsics.async_generator_prototype.clone(), JsSymbol::async_iterator()),
        ] {
            self.define_function(&prototype, "next", 1, |interp, this, args| {
                interp.generator_method(this, Resume::Next(args.first().cloned().unwrap_or_default()))
            });
            self.define_function(&prototype, "return", 1, |interp, this, args| {
                interp.generator_method(this, Resume::Return(args.first().cloned().unwrap_or_default()))
            });
            self.define_function(&prototype, "throw", 1, |interp, this, args| {
                interp.generator_method(this, Resume::Throw(args.first().cloned().unwrap_or_default()))
            });
            let name = format!("[{}]", symbol.description.as_ref().map(JsString::as_str).unwrap_or_default());
            let this_fn = self.native_function(&name, 0, |_, this, _| Ok(this.clone()));
            prototype
                .borrow_mut()
                .insert_builtin(&symbol.to_property_key(), JsValue::Object(this_fn));
        }
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
    fn generator_objects_step_and_finish() {
        let src = "function* g() { yield 1; yield 2; return 3; } const it = g(); const a = it.next(); const b = it.next(); const c = it.next(); `${a.value}${a.done} ${b.value}${b.done} ${c.value}${c.done}`";
        assert_eq!(run(src), "1false 2false 3true");
    }

    #[test]
    fn stepping_a_finished_generator_is_a_protocol_error() {
        let mut interp = Interpreter::new();
        let err = interp.run("function* g() {} const it = g(); it.next(); it.next();").unwrap_err();
        assert!(matches!(err, EngineError::SuspensionProtocol(_)), "{err}");
    }

    #[test]
    fn throw_lands_in_the_generator_catch() {
        let src = "function* g() { try { yield 1; } catch (e) { yield 'caught ' + e; } } const it = g(); it.next(); it.throw('x').value";
        assert_eq!(run(src), "caught x");
    }

    #[test]
    fn return_runs_finally_blocks() {
        let src = "let log = ''; function* g() { try { yield 1; } finally { log += 'f'; } } const it = g(); it.next(); const r = it.return(9); `${r.value} ${r.done} ${log}`";
        assert_eq!(run(src), "9 true f");
    }

    #[test]
    fn generators_are_their_own_iterators() {
        let src = "function* g() {} const it = g(); it[Symbol.iterator]() === it && Object.getPrototypeOf(it) === g.prototype";
        assert_eq!(run(src), "true");
    }
}
