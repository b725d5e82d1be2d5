use indoc::indoc;
use jsbox::{EngineError, Interpreter, InterpreterOptions};
use pretty_assertions::assert_eq;

fn eval(src: &str) -> String {
    let mut interp = Interpreter::new();
    match interp.run(src) {
        Ok(value) => value.to_string(),
        Err(e) => panic!("{e}\n--- source ---\n{src}"),
    }
}

#[test]
fn unresolved_names() {
    let src = indoc! {"
        let r;
        try { missing; } catch (e) { r = e instanceof ReferenceError; }
        globalThis.doomed = 1;
        const deleted = delete doomed;
        `${r} ${typeof missing} ${deleted} ${typeof doomed}`
    "};
    assert_eq!(eval(src), "true undefined true undefined");
}

#[test]
fn temporal_dead_zone_reads_throw() {
    let src = indoc! {"
        let r;
        try { early; let early = 1; } catch (e) { r = e instanceof ReferenceError; }
        r
    "};
    assert_eq!(eval(src), "true");
}

#[test]
fn object_literals() {
    let src = indoc! {"
        const key = 'dyn';
        const x = 1;
        const base = {inherited: true, shared: 'base'};
        const o = {
            x,
            [key + 'amic']: 2,
            shared: 'own',
            ...base,
            get twice() { return this.x * 2; },
            set twice(v) { this.x = v / 2; },
            method() { return 'm'; },
        };
        o.twice = 10;
        `${o.x} ${o.dynamic} ${o.shared} ${o.inherited} ${o.twice} ${o.method()} ${Object.keys(o)}`
    "};
    assert_eq!(eval(src), "5 2 base true 10 m x,dynamic,shared,inherited,twice,method");
}

#[test]
fn array_holes_and_spread() {
    let src = indoc! {"
        const a = [1, , 3];
        const b = [0, ...a, ...'hi'];
        `${a.length} ${typeof a[1]} ${b.length} ${b[4]}${b[5]}`
    "};
    assert_eq!(eval(src), "3 undefined 6 hi");
}

#[test]
fn spread_accepts_every_iterable_kind() {
    let src = indoc! {"
        function* gen() { yield 'g1'; yield 'g2'; }
        function args() { return [...arguments]; }
        function count(...xs) { return xs.length; }
        const like = {length: 2, 0: 'l0', 1: 'l1'};
        const out = [];
        for (const v of like) out.push(v);
        for (const c of 'ab') out.push(c);
        `${count(...gen(), ...[1, 2])} ${args(7, 8)} ${out}`
    "};
    assert_eq!(eval(src), "4 7,8 l0,l1,a,b");
}

#[test]
fn spread_in_new() {
    let src = indoc! {"
        function P(x, y) { this.sum = x + y; }
        new P(...[2, 3]).sum
    "};
    assert_eq!(eval(src), "5");
}

#[test]
fn optional_chaining_short_circuits() {
    let src = indoc! {"
        const o = {inner: {f() { return 'f'; }}};
        const none = null;
        let evaluated = false;
        const r = [
            none?.deep.deeper,
            none?.[(evaluated = true, 'k')],
            o.missing?.(),
            o.inner?.f(),
            o.inner.f?.(),
        ];
        `${typeof r[0]} ${typeof r[1]} ${evaluated} ${typeof r[2]} ${r[3]} ${r[4]}`
    "};
    assert_eq!(eval(src), "undefined undefined false undefined f f");
}

#[test]
fn for_in_sees_inherited_enumerable_keys() {
    let src = indoc! {"
        function Base() { this.own = 1; }
        Base.prototype.shared = 2;
        const keys = [];
        for (const k in new Base()) keys.push(k);
        `${keys}`
    "};
    assert_eq!(eval(src), "own,shared");
}

#[test]
fn let_loop_heads_bind_per_iteration() {
    let src = indoc! {"
        const fs = [];
        for (let i = 0; i < 3; i++) fs.push(() => i);
        const gs = [];
        for (const v of [4, 5]) gs.push(() => v);
        const hs = [];
        for (var j = 0; j < 2; j++) hs.push(() => j);
        `${fs[0]()}${fs[1]()}${fs[2]()} ${gs[0]()}${gs[1]()} ${hs[0]()}${hs[1]()}`
    "};
    assert_eq!(eval(src), "012 45 22");
}

#[test]
fn breaking_out_of_for_of_closes_the_generator() {
    let src = indoc! {"
        const log = [];
        function* g() {
            try { yield 1; yield 2; } finally { log.push('closed'); }
        }
        for (const v of g()) { log.push(v); break; }
        `${log}`
    "};
    assert_eq!(eval(src), "1,closed");
}

#[test]
fn labeled_break_and_continue() {
    let src = indoc! {"
        const seen = [];
        outer: for (let i = 0; i < 3; i++) {
            for (let j = 0; j < 3; j++) {
                if (j === 1) continue outer;
                if (i === 2) break outer;
                seen.push(`${i}${j}`);
            }
        }
        block: {
            seen.push('in');
            break block;
        }
        `${seen}`
    "};
    assert_eq!(eval(src), "00,10,in");
}

#[test]
fn instanceof_and_in() {
    let src = indoc! {"
        class A {}
        class B extends A {}
        const b = new B();
        const o = Object.freeze({p: undefined});
        `${b instanceof A} ${b instanceof B} ${({}) instanceof A} ${'p' in o} ${'toString' in o} ${'q' in o}`
    "};
    assert_eq!(eval(src), "true true false true true false");
}

#[test]
fn function_metadata() {
    let src = indoc! {"
        function f(a, b = 1, ...c) {}
        const anon = function () {};
        const arrow = (x) => x;
        const d = Object.getOwnPropertyDescriptor(f, 'name');
        `${f.name} ${f.length} ${anon.name} ${arrow.name} ${arrow.length} ${d.enumerable} ${d.configurable} ${f.prototype.constructor === f}`
    "};
    assert_eq!(eval(src), "f 1 anon arrow 1 false true true");
}

#[test]
fn constructors_honor_returned_objects() {
    let src = indoc! {"
        function Plain() { this.kind = 'plain'; return 5; }
        function Swap() { this.kind = 'lost'; return {kind: 'swapped'}; }
        const p = new Plain();
        `${p.kind} ${p instanceof Plain} ${new Swap().kind}`
    "};
    assert_eq!(eval(src), "plain true swapped");
}

#[test]
fn arrows_capture_this_and_cannot_be_constructed() {
    let src = indoc! {"
        const o = {
            v: 'lexical',
            make() { return () => this.v; },
            args() { return (() => arguments[0])(); },
        };
        let r;
        try { new (() => {})(); } catch (e) { r = e instanceof TypeError; }
        `${o.make()()} ${o.args('first')} ${r}`
    "};
    assert_eq!(eval(src), "lexical first true");
}

#[test]
fn named_function_expressions_see_themselves() {
    let src = indoc! {"
        const fact = function inner(n) { return n <= 1 ? 1 : n * inner(n - 1); };
        `${fact(5)} ${typeof inner}`
    "};
    assert_eq!(eval(src), "120 undefined");
}

#[test]
fn classes_need_new() {
    let src = indoc! {"
        class K {}
        let r;
        try { K(); } catch (e) { r = e instanceof TypeError; }
        r
    "};
    assert_eq!(eval(src), "true");
}

#[test]
fn super_resolves_per_method_kind() {
    let src = indoc! {"
        class Base {
            static who() { return 'static base'; }
            who() { return 'proto base'; }
        }
        class Child extends Base {
            static who() { return `${super.who()} via child`; }
            who() { return `${super.who()} via child`; }
            get label() { return super.who(); }
        }
        const c = new Child();
        `${Child.who()}|${c.who()}|${c.label}`
    "};
    assert_eq!(eval(src), "static base via child|proto base via child|proto base");
}

#[test]
fn class_bindings_are_not_hoisted() {
    let src = indoc! {"
        let r;
        try { new Later(); } catch (e) { r = e instanceof ReferenceError; }
        class Later {}
        r
    "};
    assert_eq!(eval(src), "true");
}

#[test]
fn generator_objects_inherit_from_the_function_prototype() {
    let src = indoc! {"
        function* g() { yield 1; }
        g.prototype.extra = function () { return 'extra'; };
        const it = g();
        `${it.extra()} ${[...it]}`
    "};
    assert_eq!(eval(src), "extra 1");
}

#[test]
fn tagged_templates() {
    let src = indoc! {"
        const obj = {
            prefix: '>',
            tag(strings, ...values) {
                return `${this.prefix}${strings.raw[0]}|${values}|${Object.isFrozen(strings)}|${Object.isFrozen(strings.raw)}`;
            },
        };
        obj.tag`a\\n${1}b${2}`
    "};
    assert_eq!(eval(src), ">a\\n|1,2|true|true");
}

#[test]
fn async_generators_answer_with_deferred_records() {
    let src = indoc! {"
        const seen = [];
        async function* ticks() {
            yield 1;
            await null;
            yield 2;
        }
        async function drive() {
            const it = ticks();
            let r = await it.next();
            while (!r.done) {
                seen.push(r.value);
                r = await it.next();
            }
            for await (const v of ticks()) seen.push(`again${v}`);
        }
        drive();
        exports.seen = seen;
    "};
    let mut interp = Interpreter::new();
    interp.run(src).unwrap();
    assert_eq!(interp.export("seen").map(|v| v.to_string()).as_deref(), Some("1,2,again1,again2"));
}

#[test]
fn concurrent_async_calls_interleave_fifo() {
    let src = indoc! {"
        const log = [];
        async function worker(tag) {
            log.push(`${tag}0`);
            await 1;
            log.push(`${tag}1`);
            await Deferred.resolve(2);
            log.push(`${tag}2`);
        }
        worker('a');
        worker('b');
        exports.log = log;
    "};
    let mut interp = Interpreter::new();
    interp.run(src).unwrap();
    assert_eq!(interp.export("log").map(|v| v.to_string()).as_deref(), Some("a0,b0,a1,b1,a2,b2"));
}

#[test]
fn async_rejections_reach_catch_handlers() {
    let src = indoc! {"
        async function fails() { await null; throw new RangeError('late'); }
        async function recovers() {
            try { await fails(); } catch (e) { return `caught ${e.message}`; }
        }
        recovers().then(v => { exports.result = v; });
    "};
    let mut interp = Interpreter::new();
    interp.run(src).unwrap();
    assert_eq!(interp.export("result").map(|v| v.to_string()).as_deref(), Some("caught late"));
}

#[test]
fn finally_runs_on_every_exit() {
    let src = indoc! {"
        const log = [];
        function f() {
            try { return 'try'; } finally { log.push('f1'); }
        }
        function g() {
            for (const x of [1, 2]) {
                try { if (x === 1) continue; break; } finally { log.push(`g${x}`); }
            }
            return 'g';
        }
        `${f()} ${g()} ${log}`
    "};
    assert_eq!(eval(src), "try g f1,g1,g2");
}

#[test]
fn switch_falls_through_until_break() {
    let src = indoc! {"
        function pick(v) {
            const out = [];
            switch (v) {
                case 1: out.push('one');
                case 2: out.push('two'); break;
                default: out.push('other');
                case 3: out.push('three');
            }
            return `${out}`;
        }
        `${pick(1)}|${pick(2)}|${pick(9)}|${pick(3)}`
    "};
    assert_eq!(eval(src), "one,two|two|other,three|three");
}

#[test]
fn call_depth_is_bounded() {
    let mut interp = Interpreter::with_options(InterpreterOptions::default().max_call_depth(64));
    let src = indoc! {"
        function down(n) { return down(n + 1); }
        let r;
        try { down(0); } catch (e) { r = e instanceof RangeError; }
        r
    "};
    assert_eq!(interp.run(src).unwrap().to_string(), "true");
}

#[test]
fn default_call_depth_throws_before_the_host_stack_runs_out() {
    let src = indoc! {"
        function down(n) { return down(n + 1); }
        const looping = { get x() { return this.x; } };
        function* nest() { yield* nest(); }
        const names = [];
        try { down(0); } catch (e) { names.push(e.name); }
        try { looping.x; } catch (e) { names.push(e.name); }
        try { [...nest()]; } catch (e) { names.push(e.name); }
        names.join()
    "};
    assert_eq!(eval(src), "RangeError,RangeError,RangeError");
}

#[test]
fn runaway_async_recursion_rejects_with_range_error() {
    let mut interp = Interpreter::new();
    let src = indoc! {"
        async function deeper(n) { return await deeper(n + 1); }
        deeper(0).catch((e) => { exports.name = e.name; });
    "};
    interp.run(src).unwrap();
    assert_eq!(interp.export("name").unwrap().to_string(), "RangeError");
}

#[test]
fn far_array_indices_do_not_allocate() {
    let src = indoc! {"
        const a = [];
        a[3e8] = 1;
        const before = `${a.length} ${a[300000000]} ${Object.keys(a)}`;
        let tooLong;
        try { a.length = 2 ** 32; } catch (e) { tooLong = e.name; }
        let printed;
        try { `${a}`; } catch (e) { printed = e.name; }
        a.length = 2;
        `${before} ${tooLong} ${printed} ${a.length} ${a[300000000]}`
    "};
    assert_eq!(eval(src), "300000001 1 300000000 RangeError RangeError 2 undefined");
}

#[test]
fn sparse_arrays_keep_their_shape() {
    let src = indoc! {"
        const a = [1];
        a[5000] = 2;
        a.push(3);
        const sparse = `${a.length} ${a[5000]} ${a[5001]} ${a[2]}`;
        a[3] = 4;
        a.length = 4;
        `${sparse} ${a}`
    "};
    assert_eq!(eval(src), "5002 2 3 undefined 1,,,4");
}

#[test]
fn cyclic_arrays_print_once() {
    let src = indoc! {"
        const c = [1];
        c.push(c, 2);
        `${c}`
    "};
    assert_eq!(eval(src), "1,,2");
}

#[test]
fn step_limit_stops_runaway_programs() {
    let mut interp = Interpreter::with_options(InterpreterOptions::default().step_limit(10_000));
    let err = interp.run("while (true) {}").unwrap_err();
    assert!(matches!(&err, EngineError::SuspensionProtocol(m) if m == "step limit exceeded"), "{err}");
}

#[test]
fn fatal_errors_skip_catch_but_run_finally() {
    let mut interp = Interpreter::new();
    let src = indoc! {"
        function* g() {}
        const it = g();
        it.next();
        try { it.next(); } catch (e) { exports.caught = true; } finally { exports.cleaned = true; }
    "};
    let err = interp.run(src).unwrap_err();
    assert!(matches!(err, EngineError::SuspensionProtocol(_)), "{err}");
    assert!(interp.export("caught").is_none());
    assert_eq!(interp.export("cleaned").map(|v| v.to_string()).as_deref(), Some("true"));
}
