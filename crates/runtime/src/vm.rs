//! The stack-based bytecode virtual machine.
//!
//! One [`Vm`] owns the whole runtime: the value stack, the call-frame
//! stack, and the [`Heap`] the compiler's constants and every value
//! produced at runtime live in. `run` is a single dispatch loop reading
//! one instruction at a time out of the current frame's chunk.

use std::collections::HashMap;
use std::fmt::Write as _;

use ember_core::{Heap, NativeFn, ObjHandle, Obj, OpCode, Value, is_falsey, values_equal};

use crate::natives;

const MAX_FRAMES: usize = 64;

struct CallFrame {
    function: ObjHandle,
    ip: usize,
    slots_base: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

enum Callee {
    Function(ObjHandle, u8),
    Native(NativeFn),
}

pub struct Vm {
    heap: Heap,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: HashMap<ObjHandle, Value>,
}

impl Vm {
    pub fn new(heap: Heap) -> Self {
        let mut vm = Vm {
            heap,
            stack: Vec::new(),
            frames: Vec::new(),
            globals: HashMap::new(),
        };
        vm.define_native("print", natives::print);
        vm.define_native("clock", natives::clock);
        vm.define_native("append", natives::append);
        vm.define_native("delete", natives::delete);
        vm
    }

    fn define_native(&mut self, name: &'static str, func: NativeFn) {
        let handle = self.heap.alloc_native(name, func);
        let name_handle = self.heap.intern_str(name);
        self.globals.insert(name_handle, Value::Object(handle));
    }

    /// Runs the top-level `<script>` function produced by the compiler.
    pub fn run(&mut self, script: ObjHandle) -> InterpretResult {
        self.stack.push(Value::Object(script));
        self.frames.push(CallFrame {
            function: script,
            ip: 0,
            slots_base: 0,
        });
        self.execute()
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow: compiler bug")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("at least one call frame")
    }

    fn chunk_byte(&self, ip: usize) -> u8 {
        let Obj::Function(f) = self.heap.get(self.frame().function) else {
            unreachable!("call frame never points at a non-function object")
        };
        f.chunk.code[ip]
    }

    fn read_byte(&mut self) -> u8 {
        let ip = self.frame().ip;
        let byte = self.chunk_byte(ip);
        self.frames.last_mut().unwrap().ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let hi = self.read_byte() as u16;
        let lo = self.read_byte() as u16;
        (hi << 8) | lo
    }

    fn read_constant(&mut self, idx: u8) -> Value {
        let Obj::Function(f) = self.heap.get(self.frame().function) else {
            unreachable!()
        };
        f.chunk.constants[idx as usize]
    }

    fn current_line(&self) -> u32 {
        let Obj::Function(f) = self.heap.get(self.frame().function) else {
            unreachable!()
        };
        let ip = self.frame().ip.saturating_sub(1);
        f.chunk.lines.get(ip).copied().unwrap_or(0)
    }

    fn execute(&mut self) -> InterpretResult {
        loop {
            let byte = self.read_byte();
            let Ok(op) = OpCode::try_from(byte) else {
                return self.runtime_error("Invalid opcode encountered.");
            };

            let outcome = match op {
                OpCode::Constant => {
                    let idx = self.read_byte();
                    let value = self.read_constant(idx);
                    self.push(value);
                    Ok(())
                }
                OpCode::None => {
                    self.push(Value::None);
                    Ok(())
                }
                OpCode::True => {
                    self.push(Value::Bool(true));
                    Ok(())
                }
                OpCode::False => {
                    self.push(Value::Bool(false));
                    Ok(())
                }
                OpCode::Pop => {
                    self.pop();
                    Ok(())
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().slots_base;
                    self.push(self.stack[base + slot]);
                    Ok(())
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frame().slots_base;
                    self.stack[base + slot] = self.peek(0);
                    Ok(())
                }
                OpCode::GetGlobal => self.op_get_global(),
                OpCode::DefineGlobal => {
                    let idx = self.read_byte();
                    let name = self.read_constant(idx);
                    let value = self.pop();
                    self.globals.insert(Self::as_handle(name), value);
                    Ok(())
                }
                OpCode::SetGlobal => self.op_set_global(),
                OpCode::BuildList => {
                    let count = self.read_byte() as usize;
                    let start = self.stack.len() - count;
                    let items = self.stack.split_off(start);
                    let handle = self.heap.alloc_list(items);
                    self.push(Value::Object(handle));
                    Ok(())
                }
                OpCode::IndexSubscr => self.op_index(),
                OpCode::StoreSubscr => self.op_store_index(),
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(values_equal(&a, &b)));
                    Ok(())
                }
                OpCode::Greater => self.binary_compare(|a, b| a > b),
                OpCode::Less => self.binary_compare(|a, b| a < b),
                OpCode::Add => self.op_add(),
                OpCode::Subtract => self.binary_number(|a, b| Ok(a - b)),
                OpCode::Multiply => self.binary_number(|a, b| Ok(a * b)),
                OpCode::Divide => self.binary_number(|a, b| Ok(a / b)),
                OpCode::IntDiv => self.binary_number(|a, b| Ok((a / b).floor())),
                OpCode::Mod => self.binary_number(|a, b| Ok(a - (a / b).floor() * b)),
                OpCode::Pow => self.binary_number(|a, b| Ok(a.powf(b))),
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(is_falsey(&value, &self.heap)));
                    Ok(())
                }
                OpCode::Negate => {
                    let value = self.peek(0);
                    match value.as_number() {
                        Some(n) => {
                            self.pop();
                            self.push(Value::Number(-n));
                            Ok(())
                        }
                        None => Err("Operand must be a number.".to_string()),
                    }
                }
                OpCode::BitNot => self.unary_integer(|a| !a),
                OpCode::BitAnd => self.binary_integer(|a, b| a & b),
                OpCode::BitOr => self.binary_integer(|a, b| a | b),
                OpCode::BitXor => self.binary_integer(|a, b| a ^ b),
                OpCode::ShiftLeft => self.binary_shift(|a, n| a << n),
                OpCode::ShiftRight => self.binary_shift(|a, n| a >> n),
                OpCode::Jump => {
                    let offset = self.read_u16();
                    self.frames.last_mut().unwrap().ip += offset as usize;
                    Ok(())
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16();
                    if is_falsey(&self.peek(0), &self.heap) {
                        self.frames.last_mut().unwrap().ip += offset as usize;
                    }
                    Ok(())
                }
                OpCode::Loop => {
                    let offset = self.read_u16();
                    self.frames.last_mut().unwrap().ip -= offset as usize;
                    Ok(())
                }
                OpCode::Call => {
                    let arg_count = self.read_byte();
                    self.call(arg_count)
                }
                OpCode::Return => {
                    let result = self.pop();
                    let finished_frame = self.frames.pop().expect("matching call frame");
                    if self.frames.is_empty() {
                        return InterpretResult::Ok;
                    }
                    self.stack.truncate(finished_frame.slots_base);
                    self.push(result);
                    Ok(())
                }
            };

            if let Err(message) = outcome {
                return self.runtime_error(&message);
            }
        }
    }

    fn as_handle(value: Value) -> ObjHandle {
        value.as_object().expect("constant pool name is always a string")
    }

    fn op_get_global(&mut self) -> Result<(), String> {
        let idx = self.read_byte();
        let name = Self::as_handle(self.read_constant(idx));
        match self.globals.get(&name) {
            Some(value) => {
                self.push(*value);
                Ok(())
            }
            Option::None => Err(format!(
                "Undefined variable '{}'.",
                self.name_str(name)
            )),
        }
    }

    fn op_set_global(&mut self) -> Result<(), String> {
        let idx = self.read_byte();
        let name = Self::as_handle(self.read_constant(idx));
        if !self.globals.contains_key(&name) {
            return Err(format!("Undefined variable '{}'.", self.name_str(name)));
        }
        self.globals.insert(name, self.peek(0));
        Ok(())
    }

    fn name_str(&self, handle: ObjHandle) -> String {
        match self.heap.get(handle) {
            Obj::Str(s) => s.as_str().to_string(),
            _ => String::new(),
        }
    }

    fn op_add(&mut self) -> Result<(), String> {
        let b = self.peek(0);
        let a = self.peek(1);
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(x + y));
                return Ok(());
            }
            _ => {}
        }
        if let (Some(ha), Some(hb)) = (a.as_object(), b.as_object()) {
            if matches!(self.heap.get(ha), Obj::Str(_)) && matches!(self.heap.get(hb), Obj::Str(_))
            {
                self.pop();
                self.pop();
                let result = self.heap.concat_strings(ha, hb);
                self.push(Value::Object(result));
                return Ok(());
            }
        }
        Err("Operands must be two numbers or two strings.".to_string())
    }

    fn binary_number(&mut self, op: impl Fn(f64, f64) -> Result<f64, String>) -> Result<(), String> {
        let b = self.peek(0);
        let a = self.peek(1);
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => {
                let result = op(x, y)?;
                self.pop();
                self.pop();
                self.push(Value::Number(result));
                Ok(())
            }
            _ => Err("Operands must be numbers.".to_string()),
        }
    }

    fn binary_compare(&mut self, op: impl Fn(f64, f64) -> bool) -> Result<(), String> {
        let b = self.peek(0);
        let a = self.peek(1);
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => {
                self.pop();
                self.pop();
                self.push(Value::Bool(op(x, y)));
                Ok(())
            }
            _ => Err("Operands must be numbers.".to_string()),
        }
    }

    /// Truncates toward zero onto the 64-bit representation bitwise and
    /// subscript operations work on. This never errors on a fractional
    /// or huge operand; `as` saturates to `i64::MIN`/`MAX` instead of
    /// wrapping or panicking.
    fn truncate_to_i64(value: f64) -> i64 {
        value as i64
    }

    fn unary_integer(&mut self, op: impl Fn(i64) -> i64) -> Result<(), String> {
        let value = self.peek(0);
        let n = value
            .as_number()
            .ok_or_else(|| "Operand must be a number.".to_string())?;
        let result = op(Self::truncate_to_i64(n));
        self.pop();
        self.push(Value::Number(result as f64));
        Ok(())
    }

    fn binary_integer(&mut self, op: impl Fn(i64, i64) -> i64) -> Result<(), String> {
        let b = self.peek(0);
        let a = self.peek(1);
        let (x, y) = (
            a.as_number().ok_or_else(|| "Operands must be numbers.".to_string())?,
            b.as_number().ok_or_else(|| "Operands must be numbers.".to_string())?,
        );
        let result = op(Self::truncate_to_i64(x), Self::truncate_to_i64(y));
        self.pop();
        self.pop();
        self.push(Value::Number(result as f64));
        Ok(())
    }

    fn binary_shift(&mut self, op: impl Fn(i64, u32) -> i64) -> Result<(), String> {
        let b = self.peek(0);
        let a = self.peek(1);
        let (x, y) = (
            a.as_number().ok_or_else(|| "Operands must be numbers.".to_string())?,
            b.as_number().ok_or_else(|| "Operands must be numbers.".to_string())?,
        );
        let x = Self::truncate_to_i64(x);
        let shift = Self::truncate_to_i64(y);
        if !(0..=63).contains(&shift) {
            return Err("Shift amount out of range.".to_string());
        }
        let result = op(x, shift as u32);
        self.pop();
        self.pop();
        self.push(Value::Number(result as f64));
        Ok(())
    }

    fn op_index(&mut self) -> Result<(), String> {
        let index = self.pop();
        let target = self.pop();
        let handle = target
            .as_object()
            .filter(|h| matches!(self.heap.get(*h), Obj::List(_)))
            .ok_or_else(|| "Invalid type to index into.".to_string())?;
        let i = index
            .as_number()
            .ok_or_else(|| "List index is not a number.".to_string())?;
        let idx = Self::truncate_to_i64(i);
        let Obj::List(items) = self.heap.get(handle) else {
            unreachable!("checked above");
        };
        if idx < 0 || idx as usize >= items.len() {
            return Err("List index out of range.".to_string());
        }
        self.push(items[idx as usize]);
        Ok(())
    }

    fn op_store_index(&mut self) -> Result<(), String> {
        let value = self.pop();
        let index = self.pop();
        let target = self.pop();
        let handle = target
            .as_object()
            .filter(|h| matches!(self.heap.get(*h), Obj::List(_)))
            .ok_or_else(|| "Cannot store value in a non-list.".to_string())?;
        let i = index
            .as_number()
            .ok_or_else(|| "List index is not a number.".to_string())?;
        let idx = Self::truncate_to_i64(i);
        let Obj::List(items) = self.heap.get_mut(handle) else {
            unreachable!("checked above");
        };
        if idx < 0 || idx as usize >= items.len() {
            return Err("Invalid list index.".to_string());
        }
        items[idx as usize] = value;
        self.push(value);
        Ok(())
    }

    fn classify_callee(&self, value: Value) -> Option<Callee> {
        let handle = value.as_object()?;
        match self.heap.get(handle) {
            Obj::Function(f) => Some(Callee::Function(handle, f.arity)),
            Obj::Native(n) => Some(Callee::Native(n.func)),
            _ => None,
        }
    }

    fn call(&mut self, arg_count: u8) -> Result<(), String> {
        let callee = self.peek(arg_count as usize);
        match self.classify_callee(callee) {
            Some(Callee::Function(handle, arity)) => {
                if arity != arg_count {
                    return Err(format!(
                        "Expected {arity} arguments but got {arg_count}."
                    ));
                }
                if self.frames.len() >= MAX_FRAMES {
                    return Err("Stack overflow.".to_string());
                }
                let slots_base = self.stack.len() - arg_count as usize - 1;
                self.frames.push(CallFrame {
                    function: handle,
                    ip: 0,
                    slots_base,
                });
                Ok(())
            }
            Some(Callee::Native(func)) => {
                let args_start = self.stack.len() - arg_count as usize;
                let args: Vec<Value> = self.stack[args_start..].to_vec();
                self.stack.truncate(args_start - 1);
                let result = func(&mut self.heap, &args)?;
                self.push(result);
                Ok(())
            }
            None => Err("Can only call functions and classes.".to_string()),
        }
    }

    fn runtime_error(&mut self, message: &str) -> InterpretResult {
        eprintln!("{message}");
        for frame in self.frames.iter().rev() {
            let Obj::Function(f) = self.heap.get(frame.function) else {
                continue;
            };
            let line = f.chunk.lines.get(frame.ip.saturating_sub(1)).copied().unwrap_or(0);
            let mut label = String::new();
            match f.name {
                Some(name_handle) => {
                    if let Obj::Str(s) = self.heap.get(name_handle) {
                        let _ = write!(label, "{}()", s.as_str());
                    }
                }
                Option::None => label.push_str("script"),
            }
            eprintln!("[line {line}] in {label}");
        }
        InterpretResult::RuntimeError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_compiler::compile;

    fn run_source(source: &str) -> InterpretResult {
        let mut heap = Heap::new();
        let function = compile(source, &mut heap).expect("source compiles");
        let mut vm = Vm::new(heap);
        vm.run(function)
    }

    #[test]
    fn arithmetic_precedence_runs_clean() {
        assert_eq!(run_source("print(1 + 2 * 3);"), InterpretResult::Ok);
    }

    #[test]
    fn undefined_global_is_a_runtime_error() {
        assert_eq!(run_source("print(undefined_name);"), InterpretResult::RuntimeError);
    }

    #[test]
    fn division_by_zero_follows_float_semantics_instead_of_erroring() {
        // No explicit zero-check: division by zero produces IEEE-754
        // infinity rather than a runtime error, same as the bare `f64` ops.
        assert_eq!(run_source("print(1 / 0);"), InterpretResult::Ok);
    }

    #[test]
    fn recursive_function_runs_clean() {
        let source = "\
def fib(n):
    if n < 2:
        return n;
    end
    return fib(n - 1) + fib(n - 2);
end
print(fib(10));
";
        assert_eq!(run_source(source), InterpretResult::Ok);
    }

    #[test]
    fn list_index_out_of_bounds_is_a_runtime_error() {
        assert_eq!(run_source("var xs = [1, 2]; print(xs[5]);"), InterpretResult::RuntimeError);
    }

    #[test]
    fn break_exits_while_loop_cleanly() {
        let source = "\
var i = 0;
while true:
    if i == 3:
        break;
    end
    i = i + 1;
end
print(i);
";
        assert_eq!(run_source(source), InterpretResult::Ok);
    }

    #[test]
    fn wrong_arity_call_is_a_runtime_error() {
        let source = "\
def add(a, b):
    return a + b;
end
print(add(1));
";
        assert_eq!(run_source(source), InterpretResult::RuntimeError);
    }

    #[test]
    fn bitwise_and_shift_ops_run_clean() {
        assert_eq!(run_source("print((6 & 3) | (1 << 4));"), InterpretResult::Ok);
    }
}
