//! Simulation VM
//!
//! Executes a [`CompiledUnit`] the way a host would drive it: global
//! initializers once, then one event at a time, each running to completion.
//! Intended for tests and tooling; scheduling, sleeping and event queues are
//! left to the real runtime.

use crate::arith;
use crate::ast::{CallTarget, VarRef};
use crate::bytecode::{Chunk, Instr};
use crate::emit::Op;
use crate::unit::{CompiledUnit, EventHandler};
use gridscript_core::{Rotation, Value, Vector};
use gridscript_registry::{Registry, Result, ScriptContext, ScriptError};
use tracing::{debug, trace};

/// Deepest script-function nesting before [`ScriptError::StackOverflow`]
pub const MAX_CALL_DEPTH: usize = 64;

/// Instructions one dispatch may execute
pub const MAX_STEPS: usize = 1_000_000;

/// Consecutive state changes one dispatch may trigger
const MAX_STATE_CHANGES: usize = 16;

/// How a chunk finished
#[derive(Debug)]
enum Exit {
    Return(Option<Value>),
    ChangeState(usize),
}

/// Executes one compiled script
pub struct Vm<'u> {
    /// Script being run
    unit: &'u CompiledUnit,

    /// Registry the script was compiled against
    registry: &'u Registry,

    /// Host context handed to every API call
    ctx: ScriptContext,

    /// Global variable values, by slot
    globals: Vec<Value>,

    /// Index of the active state
    current_state: usize,

    /// Locals of the most recent top-level event, by slot
    last_locals: Vec<(String, Value)>,

    /// Energy charged by API calls so far
    energy_used: f64,

    /// Instructions executed in the current dispatch
    steps: usize,
}

impl<'u> Vm<'u> {
    /// Create a VM and run every global initializer
    pub fn new(unit: &'u CompiledUnit, registry: &'u Registry, ctx: ScriptContext) -> Result<Self> {
        let current_state = unit
            .state_index("default")
            .ok_or_else(|| ScriptError::RuntimeError("script has no default state".into()))?;

        let mut vm = Self {
            unit,
            registry,
            ctx,
            globals: Vec::with_capacity(unit.globals().len()),
            current_state,
            last_locals: Vec::new(),
            energy_used: 0.0,
            steps: 0,
        };

        for global in unit.globals() {
            let value = match vm.run(&global.init, Vec::new(), 0)?.0 {
                Exit::Return(Some(value)) => value.coerce(global.ty),
                _ => global.ty.default_value(),
            };
            trace!(global = %global.name, %value, "initialized");
            vm.globals.push(value);
        }
        Ok(vm)
    }

    /// Enter the default state
    pub fn start(&mut self) -> Result<()> {
        self.steps = 0;
        let unit = self.unit;
        let Some(entry) = unit.states()[self.current_state].event("state_entry") else {
            return Ok(());
        };
        if let Exit::ChangeState(target) = self.run_event(entry, Vec::new())? {
            self.change_state(target)?;
        }
        Ok(())
    }

    /// Deliver an event to the active state
    ///
    /// Returns `false` when the state has no handler for it.
    pub fn dispatch(&mut self, event: &str, args: Vec<Value>) -> Result<bool> {
        self.steps = 0;
        let unit = self.unit;
        let Some(handler) = unit.states()[self.current_state].event(event) else {
            return Ok(false);
        };
        if args.len() != handler.params.len() {
            return Err(ScriptError::invalid_args(
                event,
                format!("expected {} argument(s), got {}", handler.params.len(), args.len()),
            ));
        }
        if let Exit::ChangeState(target) = self.run_event(handler, args)? {
            self.change_state(target)?;
        }
        Ok(true)
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        let index = self.unit.globals().iter().position(|g| g.name == name)?;
        self.globals.get(index)
    }

    /// Local of the last top-level event; the first slot with that name wins
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.last_locals.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn current_state(&self) -> &str {
        &self.unit.states()[self.current_state].name
    }

    pub fn context(&self) -> &ScriptContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut ScriptContext {
        &mut self.ctx
    }

    pub fn energy_used(&self) -> f64 {
        self.energy_used
    }

    fn run_event(&mut self, handler: &'u EventHandler, args: Vec<Value>) -> Result<Exit> {
        debug!(state = %self.current_state(), event = %handler.name, "dispatch");
        let (exit, locals) = self.run(&handler.chunk, args, 0)?;
        self.last_locals = handler
            .chunk
            .locals
            .iter()
            .map(|slot| slot.name.clone())
            .zip(locals)
            .collect();
        Ok(exit)
    }

    fn change_state(&mut self, mut target: usize) -> Result<()> {
        let unit = self.unit;
        for _ in 0..MAX_STATE_CHANGES {
            if target == self.current_state {
                return Ok(());
            }
            if let Some(exit) = unit.states()[self.current_state].event("state_exit") {
                // State changes requested while leaving are ignored
                self.run_event(exit, Vec::new())?;
            }
            self.current_state = target;
            debug!(state = %self.current_state(), "state changed");

            let Some(entry) = unit.states()[target].event("state_entry") else {
                return Ok(());
            };
            match self.run_event(entry, Vec::new())? {
                Exit::ChangeState(next) => target = next,
                Exit::Return(_) => return Ok(()),
            }
        }
        Err(ScriptError::RuntimeError("too many consecutive state changes".into()))
    }

    /// Execute `chunk` with `args` in its leading local slots
    fn run(&mut self, chunk: &'u Chunk, args: Vec<Value>, depth: usize) -> Result<(Exit, Vec<Value>)> {
        if depth > MAX_CALL_DEPTH {
            return Err(ScriptError::StackOverflow);
        }

        let mut locals: Vec<Value> = chunk.locals.iter().map(|slot| slot.ty.default_value()).collect();
        for (slot, arg) in args.into_iter().enumerate() {
            match chunk.locals.get(slot) {
                Some(local) => locals[slot] = arg.coerce(local.ty),
                None => return Err(ScriptError::InvalidFunctionCall("too many arguments".into())),
            }
        }

        let mut stack: Vec<Value> = Vec::new();
        let mut ip = 0;
        while let Some(instr) = chunk.code.get(ip) {
            self.steps += 1;
            if self.steps > MAX_STEPS {
                return Err(ScriptError::RuntimeError("instruction limit exceeded".into()));
            }
            ip += 1;

            match instr {
                Instr::Jump(target) => ip = *target,
                Instr::JumpIfFalse(target) => {
                    if !pop(&mut stack)?.is_truthy() {
                        ip = *target;
                    }
                }
                Instr::Call { target, argc } => {
                    let args = pop_n(&mut stack, *argc)?;
                    if let Some(value) = self.call(*target, args, depth)? {
                        stack.push(value);
                    }
                }
                Instr::Op(op) => match op {
                    Op::Return { with_value } => {
                        let value = if *with_value { Some(pop(&mut stack)?) } else { None };
                        return Ok((Exit::Return(value), locals));
                    }
                    Op::ChangeState(target) => return Ok((Exit::ChangeState(*target), locals)),
                    op => self.execute(op, &mut stack, &mut locals)?,
                },
            }
        }
        Ok((Exit::Return(None), locals))
    }

    fn execute(&mut self, op: &Op, stack: &mut Vec<Value>, locals: &mut [Value]) -> Result<()> {
        match op {
            Op::Push(value) => stack.push(value.clone()),
            Op::Load(var) => {
                let value = self.slot(*var, locals)?.clone();
                stack.push(value);
            }
            Op::Store(var) => {
                let value = pop(stack)?;
                *self.slot(*var, locals)? = value;
            }
            Op::GetMember(axis) => {
                let value = pop(stack)?;
                stack.push(arith::component(&value, *axis)?);
            }
            Op::StoreMember(var, axis) => {
                let value = pop(stack)?;
                let f = value
                    .as_float()
                    .ok_or_else(|| ScriptError::RuntimeError(format!("cannot store {} in a component", value)))?;
                arith::set_component(self.slot(*var, locals)?, *axis, f)?;
            }
            Op::Pop => {
                pop(stack)?;
            }
            Op::Dup => {
                let top = stack.last().cloned().ok_or_else(underflow)?;
                stack.push(top);
            }
            Op::Unary(op) => {
                let value = pop(stack)?;
                stack.push(arith::apply_unary(*op, value)?);
            }
            Op::Binary(op) => {
                let right = pop(stack)?;
                let left = pop(stack)?;
                stack.push(arith::apply_binary(*op, left, right)?);
            }
            Op::Cast(ty) => {
                let value = pop(stack)?;
                stack.push(arith::cast(value, *ty)?);
            }
            Op::Convert(ty) => {
                let value = pop(stack)?;
                stack.push(value.coerce(*ty));
            }
            Op::MakeVector => {
                let parts = floats(pop_n(stack, 3)?)?;
                stack.push(Value::Vector(Vector::new(parts[0], parts[1], parts[2])));
            }
            Op::MakeRotation => {
                let parts = floats(pop_n(stack, 4)?)?;
                stack.push(Value::Rotation(Rotation::new(parts[0], parts[1], parts[2], parts[3])));
            }
            Op::MakeList(n) => {
                let items = pop_n(stack, *n)?;
                stack.push(Value::List(items));
            }
            Op::Return { .. } | Op::ChangeState(_) => {
                return Err(ScriptError::RuntimeError(format!("'{}' reached the operation executor", op)))
            }
        }
        Ok(())
    }

    fn slot<'a>(&'a mut self, var: VarRef, locals: &'a mut [Value]) -> Result<&'a mut Value> {
        let slot = match var {
            VarRef::Local(i) => locals.get_mut(i),
            VarRef::Global(i) => self.globals.get_mut(i),
        };
        slot.ok_or_else(|| ScriptError::RuntimeError(format!("no variable in slot {}", var)))
    }

    fn call(&mut self, target: CallTarget, args: Vec<Value>, depth: usize) -> Result<Option<Value>> {
        match target {
            CallTarget::Api(id) => {
                let registry = self.registry;
                let function = registry.function(id);
                self.energy_used += function.meta.energy;
                trace!(function = %function.name, args = args.len(), "api call");
                let result = (function.implementation)(&mut self.ctx, &args)?;
                Ok(function
                    .returns
                    .map(|ty| result.map_or_else(|| ty.default_value(), |v| v.coerce(ty))))
            }
            CallTarget::Script(index) => {
                let unit = self.unit;
                let function = unit
                    .functions()
                    .get(index)
                    .ok_or_else(|| ScriptError::InvalidFunctionCall(format!("no script function {}", index)))?;
                match self.run(&function.chunk, args, depth + 1)?.0 {
                    Exit::Return(value) => Ok(function.returns.map(|ty| value.unwrap_or_else(|| ty.default_value()))),
                    Exit::ChangeState(_) => Err(ScriptError::RuntimeError(format!(
                        "function '{}' changed state",
                        function.name
                    ))),
                }
            }
        }
    }
}

fn underflow() -> ScriptError {
    ScriptError::RuntimeError("value stack underflow".into())
}

fn pop(stack: &mut Vec<Value>) -> Result<Value> {
    stack.pop().ok_or_else(underflow)
}

/// The top `n` values, in push order
fn pop_n(stack: &mut Vec<Value>, n: usize) -> Result<Vec<Value>> {
    if stack.len() < n {
        return Err(underflow());
    }
    Ok(stack.split_off(stack.len() - n))
}

fn floats(values: Vec<Value>) -> Result<Vec<f64>> {
    values
        .into_iter()
        .map(|v| {
            v.as_float()
                .ok_or_else(|| ScriptError::RuntimeError(format!("{} is not a number", v.script_type())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use std::collections::BTreeMap;

    fn run(registry: &Registry, source: &str) -> (CompiledUnit, ScriptContext) {
        let unit = Compiler::new(registry).compile(source, &BTreeMap::new()).unwrap();
        let ctx = {
            let mut vm = Vm::new(&unit, registry, ScriptContext::default()).unwrap();
            vm.start().unwrap();
            vm.context().clone()
        };
        (unit, ctx)
    }

    fn said(source: &str) -> Vec<String> {
        let registry = Registry::standard();
        let (_, ctx) = run(&registry, source);
        ctx.chat().iter().map(|line| line.text.clone()).collect()
    }

    #[test]
    fn test_precedence_and_casts() {
        let lines = said(
            "default { state_entry() {\n\
             llSay(0, (string)(2 + 3 * 4));\n\
             llSay(0, (string)(-2 + 3));\n\
             llSay(0, (string)((integer)\"3\" + 1));\n\
             } }",
        );
        assert_eq!(lines, vec!["14", "1", "4"]);
    }

    #[test]
    fn test_chained_assignment() {
        let registry = Registry::standard();
        let unit = Compiler::new(&registry)
            .compile(
                "default { state_entry() { integer a; integer b; a = b = 5; } }",
                &BTreeMap::new(),
            )
            .unwrap();
        let mut vm = Vm::new(&unit, &registry, ScriptContext::default()).unwrap();
        vm.start().unwrap();
        assert_eq!(vm.local("a"), Some(&Value::Integer(5)));
        assert_eq!(vm.local("b"), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_loops_and_branches() {
        let lines = said(
            "default { state_entry() {\n\
             integer i; integer total;\n\
             for (i = 0; i < 5; i++) { if (i == 2) continue; total += i; }\n\
             llSay(0, (string)total);\n\
             integer n = 3;\n\
             while (n) n--;\n\
             do { n += 10; } while (n < 25);\n\
             llSay(0, (string)n);\n\
             if (n > 100) llSay(0, \"big\"); else if (n > 20) llSay(0, \"mid\"); else llSay(0, \"small\");\n\
             } }",
        );
        assert_eq!(lines, vec!["8", "30", "mid"]);
    }

    #[test]
    fn test_if_chains_run_exactly_one_arm() {
        let lines = said(
            "integer braced(integer n) {\n\
             integer r;\n\
             if (n == 0) { r += 1; } else if (n == 1) { r += 10; } else { r += 100; }\n\
             return r + 1000;\n\
             }\n\
             integer braceless(integer n) {\n\
             integer r;\n\
             if (n == 0) r += 1; else if (n == 1) r += 10; else r += 100;\n\
             return r + 1000;\n\
             }\n\
             integer dangling(integer n) {\n\
             integer r;\n\
             if (n > 0) if (n > 1) r = 2; else r = 1;\n\
             r = r * 10 + 9;\n\
             return r;\n\
             }\n\
             default { state_entry() {\n\
             integer n;\n\
             for (n = 0; n < 3; n++) {\n\
             llSay(0, (string)braced(n) + \" \" + (string)braceless(n) + \" \" + (string)dangling(n));\n\
             }\n\
             } }",
        );
        assert_eq!(lines, vec!["1001 1001 9", "1010 1010 19", "1100 1100 29"]);
    }

    #[test]
    fn test_loop_forms_converge() {
        let lines = said(
            "integer loops(integer n) {\n\
             integer i; integer total;\n\
             for (i = 0; i < n; i++) total += 1;\n\
             while (i > 0) { i--; total += 10; }\n\
             do total += 100; while (total < 100 * n);\n\
             return total;\n\
             }\n\
             default { state_entry() {\n\
             llSay(0, (string)loops(0));\n\
             llSay(0, (string)loops(2));\n\
             llSay(0, (string)loops(3));\n\
             } }",
        );
        assert_eq!(lines, vec!["100", "222", "333"]);
    }

    #[test]
    fn test_braceless_if_body_ends_at_statement() {
        let lines = said(
            "default { state_entry() {\n\
             integer y; integer z;\n\
             if (0) y = 1; z = 2;\n\
             llSay(0, (string)y + \",\" + (string)z);\n\
             } }",
        );
        assert_eq!(lines, vec!["0,2"]);
    }

    #[test]
    fn test_script_functions_and_recursion() {
        let lines = said(
            "integer fact(integer n) { if (n <= 1) return 1; return n * fact(n - 1); }\n\
             greet(string who) { llSay(0, \"hi \" + who); }\n\
             default { state_entry() { greet(\"bob\"); llSay(0, (string)fact(5)); } }",
        );
        assert_eq!(lines, vec!["hi bob", "120"]);
    }

    #[test]
    fn test_unbounded_recursion_overflows() {
        let registry = Registry::standard();
        let unit = Compiler::new(&registry)
            .compile(
                "integer down(integer n) { return down(n + 1); }\n\
                 default { state_entry() { down(0); } }",
                &BTreeMap::new(),
            )
            .unwrap();
        let mut vm = Vm::new(&unit, &registry, ScriptContext::default()).unwrap();
        assert_eq!(vm.start(), Err(ScriptError::StackOverflow));
    }

    #[test]
    fn test_globals_and_state_changes() {
        let registry = Registry::standard();
        let unit = Compiler::new(&registry)
            .compile(
                "integer count = 2;\nvector pos = <1, 2, 3>;\n\
                 default {\n\
                   state_entry() { count = count * 10; }\n\
                   touch_start(integer n) { pos.z = 9; state busy; }\n\
                   state_exit() { llSay(0, \"leaving\"); }\n\
                 }\n\
                 state busy { state_entry() { llSay(0, \"busy\"); count++; } }",
                &BTreeMap::new(),
            )
            .unwrap();
        let mut vm = Vm::new(&unit, &registry, ScriptContext::default()).unwrap();
        assert_eq!(vm.global("count"), Some(&Value::Integer(2)));

        vm.start().unwrap();
        assert_eq!(vm.global("count"), Some(&Value::Integer(20)));

        assert!(vm.dispatch("touch_start", vec![Value::Integer(1)]).unwrap());
        assert_eq!(vm.current_state(), "busy");
        assert_eq!(vm.global("count"), Some(&Value::Integer(21)));
        assert_eq!(vm.global("pos"), Some(&Value::Vector(Vector::new(1.0, 2.0, 9.0))));

        let chat: Vec<&str> = vm.context().chat().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(chat, vec!["leaving", "busy"]);

        // No handler in this state
        assert!(!vm.dispatch("touch_start", vec![Value::Integer(1)]).unwrap());
    }

    #[test]
    fn test_dispatch_checks_arity() {
        let registry = Registry::standard();
        let unit = Compiler::new(&registry)
            .compile("default { touch_start(integer n) { } }", &BTreeMap::new())
            .unwrap();
        let mut vm = Vm::new(&unit, &registry, ScriptContext::default()).unwrap();
        assert!(matches!(
            vm.dispatch("touch_start", Vec::new()),
            Err(ScriptError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_runtime_errors_surface() {
        let registry = Registry::standard();
        let unit = Compiler::new(&registry)
            .compile("default { state_entry() { integer z; integer q = 1 / z; } }", &BTreeMap::new())
            .unwrap();
        let mut vm = Vm::new(&unit, &registry, ScriptContext::default()).unwrap();
        assert_eq!(vm.start(), Err(ScriptError::DivisionByZero));
    }

    #[test]
    fn test_jumps_to_user_labels() {
        let registry = Registry::standard();
        let (unit, ctx) = run(
            &registry,
            "default { state_entry() {\n\
             integer i;\n\
             @again;\n\
             i++;\n\
             if (i < 3) jump again;\n\
             llOwnerSay((string)i);\n\
             } }",
        );
        assert_eq!(ctx.chat()[0].text, "3");
        assert_eq!(unit.call_sites().len(), 1);
    }
}
