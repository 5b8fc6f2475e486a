//! Compile-and-run scenarios across the registry, frontend and VM

use gridscript_compiler::{CompileOptions, CompileReport, Compiler, DiagnosticKind, Vm};
use gridscript_core::{Dialect, Dialects, ScriptType, Value};
use gridscript_registry::{FunctionDescriptor, Registry, ScriptContext, Visibility};
use std::collections::BTreeMap;
use std::thread;

const BRANCHING: &str = "default {
    state_entry() {
        integer a = 2 + 3 * 4;
        if (a > 10) {
            a = a - 1;
        } else {
            a = a + 1;
        }
    }
}
";

fn compile(registry: &Registry, source: &str) -> Result<gridscript_compiler::CompiledUnit, CompileReport> {
    Compiler::new(registry).compile(source, &BTreeMap::new())
}

#[test]
fn test_branching_script_runs() {
    let registry = Registry::standard();
    let unit = compile(&registry, BRANCHING).unwrap();

    let mut vm = Vm::new(&unit, &registry, ScriptContext::new("Door")).unwrap();
    vm.start().unwrap();
    assert_eq!(vm.local("a"), Some(&Value::Integer(13)));
}

#[test]
fn test_missing_final_brace() {
    let registry = Registry::standard();
    let source = BRANCHING.trim_end().strip_suffix('}').unwrap();

    let report = compile(&registry, source).unwrap_err();
    let first = report.first().unwrap();
    assert_eq!(first.kind, DiagnosticKind::Syntax);
    assert_eq!(first.line, 1);
    assert!(first.message.contains("\"default\""), "{}", first.message);
}

#[test]
fn test_stray_close_after_state() {
    let registry = Registry::standard();
    let source = "default {\n state_entry() {\n integer a;\n }\n }\n }\n";
    let report = compile(&registry, source).unwrap_err();
    let first = report.first().unwrap();
    assert_eq!(first.kind, DiagnosticKind::Syntax);
    assert_eq!(first.line, 6);
    assert_eq!(first.message, "mismatched '}': nothing left to close after state \"default\"");
}

#[test]
fn test_unclosed_handler_before_next_handler() {
    let registry = Registry::standard();
    let source = "default {\n state_entry() {\n integer a = 1;\n if (a > 0) {\n a = 2;\n }\n touch_start(integer n) {\n }\n}";
    let report = compile(&registry, source).unwrap_err();
    let first = report.first().unwrap();
    assert_eq!(first.kind, DiagnosticKind::Syntax);
    assert_eq!(first.line, 2);
    assert_eq!(first.message, "missing '}' to close \"function entry\"");
}

#[test]
fn test_unclosed_if_names_the_if() {
    let registry = Registry::standard();
    let source = "default {\n state_entry() {\n integer a = 1;\n if (a > 0) {\n a = 2;\n touch_start(integer n) {\n }\n}";
    let report = compile(&registry, source).unwrap_err();
    let first = report.first().unwrap();
    assert_eq!(first.kind, DiagnosticKind::Syntax);
    assert_eq!(first.line, 4);
    assert_eq!(first.message, "missing '}' to close \"if\"");

    // Same answer without code generation
    let checked = Compiler::new(&registry).check(source, &BTreeMap::new()).unwrap_err();
    assert_eq!(checked.first(), Some(first));
}

#[test]
fn test_statements_after_premature_close() {
    let registry = Registry::standard();
    let source = "default {\n state_entry() {\n integer a = 1;\n }\n a = 2;\n }\n}";
    let report = compile(&registry, source).unwrap_err();
    let first = report.first().unwrap();
    assert_eq!(first.kind, DiagnosticKind::Syntax);
    assert_eq!(first.line, 4);
    assert!(first.message.contains("\"function entry\""), "{}", first.message);
}

#[test]
fn test_unclosed_function_before_state() {
    let registry = Registry::standard();
    let source = "integer twice(integer n) {\n while (n < 10) {\n n *= 2;\n return n;\ndefault { state_entry() { } }";
    let report = compile(&registry, source).unwrap_err();
    let first = report.first().unwrap();
    assert_eq!(first.line, 2);
    assert_eq!(first.message, "missing '}' to close \"while\"");
}

#[test]
fn test_dialect_gating() {
    let registry = Registry::standard();
    let source = "default { state_entry() { string v = osGetSimulatorVersion(); } }";

    let report = compile(&registry, source).unwrap_err();
    let first = report.first().unwrap();
    assert_eq!(first.kind, DiagnosticKind::Semantic);
    assert!(first.message.contains("undeclared identifier 'osGetSimulatorVersion'"));

    let ossl = Compiler::with_options(
        &registry,
        CompileOptions {
            visibility: Visibility::new(Dialects::LSL.with(Dialect::Ossl)),
            ..CompileOptions::default()
        },
    );
    assert!(ossl.compile(source, &BTreeMap::new()).is_ok());

    let with_directive = format!("#dialect ossl\n{}", source);
    assert!(compile(&registry, &with_directive).is_ok());
}

#[test]
fn test_extension_groups() {
    let registry = Registry::standard();
    let source = "default { state_entry() { string kind = JSON_NULL; } }";

    let report = compile(&registry, source).unwrap_err();
    assert!(report.first().unwrap().message.contains("undeclared identifier 'JSON_NULL'"));

    let enabled = format!("#extension json\n{}", source);
    assert!(compile(&registry, &enabled).is_ok());
}

fn pick_int(_: &mut ScriptContext, _: &[Value]) -> gridscript_registry::Result<Option<Value>> {
    Ok(Some(Value::String("integer".into())))
}

fn pick_str(_: &mut ScriptContext, _: &[Value]) -> gridscript_registry::Result<Option<Value>> {
    Ok(Some(Value::String("string".into())))
}

#[test]
fn test_overloads_are_selected_statically() {
    let mut builder = Registry::builder();
    builder.install(&gridscript_registry::providers::ChatProvider);
    builder.register_function(
        FunctionDescriptor::method("pickInteger", pick_int)
            .named("pick")
            .param(ScriptType::Integer)
            .returns(ScriptType::String),
    );
    builder.register_function(
        FunctionDescriptor::method("pickString", pick_str)
            .named("pick")
            .param(ScriptType::String)
            .returns(ScriptType::String),
    );
    let registry = builder.build();

    let unit = compile(
        &registry,
        "default { state_entry() { llSay(0, pick(1)); llSay(0, pick(\"x\")); } }",
    )
    .unwrap();
    let members: Vec<&str> = unit
        .call_sites()
        .iter()
        .map(|site| registry.function(site.function).member)
        .collect();
    // Arguments are evaluated before the call that consumes them
    assert_eq!(members, vec!["pickInteger", "llSay", "pickString", "llSay"]);

    let mut vm = Vm::new(&unit, &registry, ScriptContext::default()).unwrap();
    vm.start().unwrap();
    let chat: Vec<&str> = vm.context().chat().iter().map(|l| l.text.as_str()).collect();
    assert_eq!(chat, vec!["integer", "string"]);

    let report = compile(&registry, "default { state_entry() { pick(<1, 2, 3>); } }").unwrap_err();
    let first = report.first().unwrap();
    assert_eq!(first.kind, DiagnosticKind::Semantic);
    assert!(first.message.contains("no overload of 'pick'"));
}

#[test]
fn test_check_mode_matches_compile() {
    let registry = Registry::standard();
    let compiler = Compiler::new(&registry);

    assert!(compiler.check(BRANCHING, &BTreeMap::new()).is_ok());

    let broken = "default { state_entry() { integer a = ; } }";
    let checked = compiler.check(broken, &BTreeMap::new()).unwrap_err();
    let compiled = compiler.compile(broken, &BTreeMap::new()).unwrap_err();
    assert_eq!(checked, compiled);
}

#[test]
fn test_concurrent_compiles_share_the_registry() {
    let registry = Registry::standard();
    let sources: Vec<String> = (0..8)
        .map(|i| {
            format!(
                "integer seed = {};\ndefault {{ state_entry() {{ seed = seed * 2; llSay(0, (string)seed); }} }}",
                i
            )
        })
        .collect();

    let results: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                let registry = &registry;
                scope.spawn(move || {
                    let unit = compile(registry, source).unwrap();
                    let mut vm = Vm::new(&unit, registry, ScriptContext::default()).unwrap();
                    vm.start().unwrap();
                    vm.context().chat()[0].text.clone()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let expected: Vec<String> = (0..8).map(|i| (i * 2).to_string()).collect();
    assert_eq!(results, expected);
}

#[test]
fn test_disassembly_names_every_body() {
    let registry = Registry::standard();
    let unit = compile(
        &registry,
        "integer n = 1;\nbump() { n++; }\ndefault { state_entry() { bump(); } }",
    )
    .unwrap();
    let text = unit.disassemble();
    assert!(text.contains("== global integer n =="));
    assert!(text.contains("== function bump =="));
    assert!(text.contains("== default.state_entry =="));
}
