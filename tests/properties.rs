use indoc::indoc;
use jsbox::{EngineError, Interpreter};
use pretty_assertions::assert_eq;

fn eval(src: &str) -> String {
    let mut interp = Interpreter::new();
    match interp.run(src) {
        Ok(value) => value.to_string(),
        Err(e) => panic!("{e}\n--- source ---\n{src}"),
    }
}

#[test]
fn destructuring_swap() {
    let src = indoc! {"
        let a = 1, b = 2;
        [a, b] = [b, a];
        `${a} ${b}`
    "};
    assert_eq!(eval(src), "2 1");
}

#[test]
fn missing_object_pattern_keys_are_undefined() {
    let src = indoc! {"
        const {a, b} = {a: 1};
        `${a} ${typeof b}`
    "};
    assert_eq!(eval(src), "1 undefined");
}

#[test]
fn rest_elements_keep_order_and_length() {
    let src = indoc! {"
        const [c, ...d] = [1, 2, 3];
        let a;
        [...a] = [1, 2];
        `${c}|${d}|${d.length}|${a}|${Array.isArray(a)}`
    "};
    assert_eq!(eval(src), "1|2,3|2|1,2|true");
}

#[test]
fn rest_parameters_collect_the_tail() {
    let src = indoc! {"
        function f(...b) { return b; }
        function g(d, ...e) { return e; }
        `${f(1, 2)}|${g(1, 2, 3)}|${g(1).length}`
    "};
    assert_eq!(eval(src), "1,2|2,3|0");
}

#[test]
fn vars_and_functions_are_hoisted() {
    let src = indoc! {"
        function outer() {
            const early = v;
            var v = 5;
            return `${early} ${v} ${sibling()}`;
            function sibling() { return 'called'; }
        }
        outer()
    "};
    assert_eq!(eval(src), "undefined 5 called");
}

#[test]
fn const_reassignment_fails_at_any_depth() {
    let src = indoc! {"
        const k = 1;
        const seen = [];
        function nested() { { if (true) { k = 2; } } }
        try { nested(); } catch (e) { seen.push(e instanceof TypeError); }
        try { k += 1; } catch (e) { seen.push(e instanceof TypeError); }
        try { (() => { k++; })(); } catch (e) { seen.push(e instanceof TypeError); }
        `${seen} ${k}`
    "};
    assert_eq!(eval(src), "true,true,true 1");

    let mut interp = Interpreter::new();
    let err = interp.run("const z = 1; z = 2;").unwrap_err();
    assert!(matches!(err, EngineError::Uncaught { .. }), "{err}");
}

#[test]
fn templates_interpolate_in_source_order() {
    assert_eq!(eval("`a: ${1 + 1}`"), "a: 2");
    let src = indoc! {"
        let n = 0;
        `${++n}-${++n}-${n * 10}`
    "};
    assert_eq!(eval(src), "1-2-20");
}

#[test]
fn generator_round_trip() {
    let src = indoc! {"
        function* g() { yield 1; yield 2; return 3; }
        const it = g();
        const steps = [];
        for (let i = 0; i < 3; i++) {
            const r = it.next();
            steps.push(`${r.value}:${r.done}`);
        }
        exports.it = it;
        `${steps}`
    "};
    let mut interp = Interpreter::new();
    assert_eq!(interp.run(src).unwrap().to_string(), "1:false,2:false,3:true");
    let err = interp.run("exports.it.next()").unwrap_err();
    assert!(matches!(err, EngineError::SuspensionProtocol(_)), "{err}");
}

#[test]
fn awaited_async_calls_stay_in_the_caller_chain() {
    let src = indoc! {"
        const log = [];
        async function inner(tag) {
            log.push(tag + '1');
            await null;
            log.push(tag + '2');
            return tag;
        }
        async function outer(tag) {
            const v = await inner(tag);
            log.push(v + '3');
        }
        outer('a');
        outer('b');
        log.push('sync');
        exports.log = log;
    "};
    let mut interp = Interpreter::new();
    interp.run(src).unwrap();
    let log = interp.export("log").map(|v| v.to_string());
    assert_eq!(log.as_deref(), Some("a1,b1,sync,a2,a3,b2,b3"));
}

#[test]
fn accessor_halves_merge_on_one_descriptor() {
    let src = indoc! {"
        class Box {
            get v() { return this._v * 2; }
            set v(x) { this._v = x; }
        }
        class Late {
            get v() { return 'got'; }
            static touch() {}
            set v(x) { this.stored = x; }
        }
        const b = new Box();
        b.v = 4;
        const l = new Late();
        l.v = 'x';
        const d = Object.getOwnPropertyDescriptor(Late.prototype, 'v');
        `${b.v} ${l.v} ${l.stored} ${typeof d.get} ${typeof d.set}`
    "};
    assert_eq!(eval(src), "8 got x function function");
}

#[test]
fn super_calls_bind_the_overriding_instance() {
    let src = indoc! {"
        class Base {
            describe() { return `base of ${this.name}`; }
        }
        class Derived extends Base {
            constructor() { super(); this.name = 'derived'; }
            describe() { return `${super.describe()} (override)`; }
        }
        new Derived().describe()
    "};
    assert_eq!(eval(src), "base of derived (override)");
}
