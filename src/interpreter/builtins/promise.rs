use super::super::*;

impl Interpreter {
    /// Deferred results: `then`/`catch` on the shared prototype, plus a
    /// global `Deferred` with `resolve`/`reject` for already-settled ones.
    pub(super) fn setup_deferred(&mut self, global: &JsObject) {
        let prototype = self.intrinsics.deferred_prototype.clone();
        self.define_function(&prototype, "then", 2, |interp, this, args| {
            let on_fulfilled = args.first().cloned().unwrap_or_default();
            let on_rejected = args.get(1).cloned().unwrap_or_default();
            interp.deferred_then(this, on_fulfilled, on_rejected)
        });
        self.define_function(&prototype, "catch", 1, |interp, this, args| {
            let on_rejected = args.first().cloned().unwrap_or_default();
            interp.deferred_then(this, JsValue::Undefined, on_rejected)
        });

        let deferred = self.create_object();
        self.define_function(&deferred, "resolve", 1, |interp, _, args| {
            let value = args.first().cloned().unwrap_or_default();
            if Self::deferred_state(&value).is_some() {
                return Ok(value);
            }
            let result = interp.new_deferred();
            interp.resolve_deferred(&result, value);
            Ok(JsValue::Object(result))
        });
        self.define_function(&deferred, "reject", 1, |interp, _, args| {
            let result = interp.new_deferred();
            interp.reject_deferred(&result, args.first().cloned().unwrap_or_default());
            Ok(JsValue::Object(result))
        });
        deferred
            .borrow_mut()
            .insert_builtin("prototype", JsValue::Object(prototype));
        global.borrow_mut().insert_builtin("Deferred", JsValue::Object(deferred));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn then_chains_run_after_the_program() {
        let mut interp = Interpreter::new();
        let src = "let seen = []; Deferred.resolve(1).then(v => v + 1).then(v => seen.push(v)); seen.push('sync'); exports.seen = seen;";
        interp.run(src).unwrap();
        assert_eq!(interp.export("seen").map(|v| v.to_string()), Some("sync,2".to_string()));
    }

    #[test]
    fn catch_receives_the_rejection() {
        let mut interp = Interpreter::new();
        interp
            .run("Deferred.reject(new TypeError('no')).catch(e => { exports.caught = e.message; });")
            .unwrap();
        assert_eq!(interp.export("caught").map(|v| v.to_string()), Some("no".to_string()));
    }

    #[test]
    fn resolve_passes_deferred_results_through() {
        let mut interp = Interpreter::new();
        let v = interp.run("const d = Deferred.resolve(1); Deferred.resolve(d) === d").unwrap();
        assert_eq!(v.to_string(), "true");
    }
}
