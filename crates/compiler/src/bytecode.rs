//! Bytecode backend

use crate::ast::CallTarget;
use crate::emit::{Emitter, Label, Op};
use gridscript_core::ScriptType;
use std::fmt;

/// One instruction; jump operands are absolute offsets into the chunk
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Op(Op),
    Jump(usize),
    JumpIfFalse(usize),
    Call { target: CallTarget, argc: usize },
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Op(op) => write!(f, "{}", op),
            Instr::Jump(to) => write!(f, "JUMP -> {:04}", to),
            Instr::JumpIfFalse(to) => write!(f, "JUMP_IF_FALSE -> {:04}", to),
            Instr::Call {
                target: CallTarget::Api(id),
                argc,
            } => write!(f, "CALL api{} ({} args)", id.0, argc),
            Instr::Call {
                target: CallTarget::Script(index),
                argc,
            } => write!(f, "CALL fn{} ({} args)", index, argc),
        }
    }
}

/// Local variable slot of a compiled body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSlot {
    pub name: String,
    pub ty: ScriptType,
}

/// Compiled body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub code: Vec<Instr>,

    /// Source line of each instruction
    pub lines: Vec<usize>,

    /// Every local slot the body uses, parameters first
    pub locals: Vec<LocalSlot>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, instr: Instr, line: usize) {
        self.code.push(instr);
        self.lines.push(line);
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Disassemble the chunk for debugging
    pub fn disassemble(&self, name: &str) -> String {
        let mut output = format!("== {} ==\n", name);
        for (slot, local) in self.locals.iter().enumerate() {
            output.push_str(&format!("; local{} {} {}\n", slot, local.ty, local.name));
        }
        for offset in 0..self.code.len() {
            output.push_str(&self.disassemble_instruction(offset));
            output.push('\n');
        }
        output
    }

    fn disassemble_instruction(&self, offset: usize) -> String {
        let line = self.lines[offset];
        if offset > 0 && self.lines[offset - 1] == line {
            format!("{:04}    | {}", offset, self.code[offset])
        } else {
            format!("{:04} {:4} {}", offset, line, self.code[offset])
        }
    }
}

/// [`Emitter`] that assembles a [`Chunk`]
///
/// Jumps are written with the label id as a placeholder and patched to
/// offsets by [`ChunkEmitter::finish`].
#[derive(Debug, Default)]
pub struct ChunkEmitter {
    chunk: Chunk,
    targets: Vec<Option<usize>>,
    line: usize,
}

impl ChunkEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch jump targets; fails with the first label that was never marked
    pub fn finish(mut self, locals: Vec<LocalSlot>) -> Result<Chunk, Label> {
        for instr in &mut self.chunk.code {
            if let Instr::Jump(target) | Instr::JumpIfFalse(target) = instr {
                let label = Label(*target as u32);
                *target = self.targets.get(*target).copied().flatten().ok_or(label)?;
            }
        }
        self.chunk.locals = locals;
        Ok(self.chunk)
    }

    fn write(&mut self, instr: Instr) {
        self.chunk.write(instr, self.line);
    }
}

impl Emitter for ChunkEmitter {
    fn new_label(&mut self) -> Label {
        self.targets.push(None);
        Label((self.targets.len() - 1) as u32)
    }

    fn mark_label(&mut self, label: Label) {
        if let Some(slot) = self.targets.get_mut(label.0 as usize) {
            *slot = Some(self.chunk.len());
        }
    }

    fn branch(&mut self, label: Label) {
        self.write(Instr::Jump(label.0 as usize));
    }

    fn branch_if_false(&mut self, label: Label) {
        self.write(Instr::JumpIfFalse(label.0 as usize));
    }

    fn emit_call(&mut self, target: CallTarget, argc: usize) {
        self.write(Instr::Call { target, argc });
    }

    fn emit(&mut self, op: Op) {
        self.write(Instr::Op(op));
    }

    fn set_line(&mut self, line: usize) {
        self.line = line;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridscript_core::Value;

    #[test]
    fn test_labels_patch_to_offsets() {
        let mut em = ChunkEmitter::new();
        let top = em.new_label();
        let end = em.new_label();

        em.set_line(1);
        em.mark_label(top);
        em.emit(Op::Push(Value::Integer(0)));
        em.branch_if_false(end);
        em.set_line(2);
        em.branch(top);
        em.mark_label(end);
        em.emit(Op::Return { with_value: false });

        let chunk = em.finish(Vec::new()).unwrap();
        assert_eq!(chunk.code[1], Instr::JumpIfFalse(3));
        assert_eq!(chunk.code[2], Instr::Jump(0));
        assert_eq!(chunk.lines, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_unmarked_label_is_reported() {
        let mut em = ChunkEmitter::new();
        let _unused = em.new_label();
        let dangling = em.new_label();
        em.branch(dangling);
        assert_eq!(em.finish(Vec::new()), Err(dangling));
    }

    #[test]
    fn test_disassemble() {
        let mut em = ChunkEmitter::new();
        em.set_line(4);
        em.emit(Op::Push(Value::String("hi".into())));
        em.emit(Op::Pop);
        let chunk = em
            .finish(vec![LocalSlot {
                name: "a".into(),
                ty: ScriptType::Integer,
            }])
            .unwrap();

        let text = chunk.disassemble("default.state_entry");
        assert!(text.starts_with("== default.state_entry ==\n"));
        assert!(text.contains("; local0 integer a"));
        assert!(text.contains("0000    4 PUSH \"hi\""));
        assert!(text.contains("0001    | POP"));
    }
}
