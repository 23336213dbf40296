//! Ember Runtime: the stack VM, native functions, and the top-level
//! `interpret` entry point the CLI driver and tests call into.

pub mod natives;
pub mod vm;

pub use vm::{InterpretResult, Vm};

use ember_core::Heap;

/// Compiles and runs `source` end to end: a fresh [`Heap`], the
/// compiler, then the VM. Diagnostics are printed to stderr as they
/// happen; the return value only tells the caller which exit code to
/// use.
pub fn interpret(source: &str) -> InterpretResult {
    let mut heap = Heap::new();
    let Some(script) = ember_compiler::compile(source, &mut heap) else {
        return InterpretResult::CompileError;
    };
    let mut vm = Vm::new(heap);
    vm.run(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_is_reported_without_running() {
        assert_eq!(interpret("var = ;"), InterpretResult::CompileError);
    }

    #[test]
    fn well_formed_program_runs_to_completion() {
        assert_eq!(interpret("print(1 + 1);"), InterpretResult::Ok);
    }
}
