use enum_as_inner::EnumAsInner;
use parse::{
    attributes::{CodeAttribute, ExceptionEntry},
    classfile::Method,
};
use thiserror::Error;

use crate::class::Class;

/// An opaque handle to a heap object. The heap itself lives elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(usize);

impl ObjectRef {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn id(&self) -> usize {
        self.0
    }
}

#[derive(EnumAsInner, Debug, Clone, Copy, PartialEq)]
pub enum RuntimeValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Reference(ObjectRef),
    Null,
    ReturnAddress(u32),
}

impl RuntimeValue {
    /// Longs and doubles take two stack units and two local slots.
    pub fn category_type(&self) -> u8 {
        match self {
            RuntimeValue::Long(_) | RuntimeValue::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("operand stack overflow (max_stack {max_stack})")]
    StackOverflow { max_stack: u16 },

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("local {index} is outside of max_locals {max_locals}")]
    LocalOutOfRange { index: u16, max_locals: u16 },

    #[error("local {0} has not been written")]
    UninitializedLocal(u16),

    #[error("pc {pc} is outside of the code array (length {length})")]
    PcOutOfRange { pc: usize, length: usize },

    #[error("method {0} has no code")]
    NoCode(String),

    #[error("{class} has no method {name}")]
    NoSuchMethod { class: String, name: String },
}

pub type FrameResult<T> = Result<T, FrameError>;

/// The per-invocation state an interpreter works against: an operand stack,
/// local variable slots and a program counter into one method's code.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    method: &'a Method,
    code: &'a CodeAttribute,
    stack: Vec<RuntimeValue>,
    stack_units: usize,
    locals: Vec<Option<RuntimeValue>>,
    pc: usize,
}

impl<'a> Frame<'a> {
    pub fn new(method: &'a Method) -> FrameResult<Self> {
        let code = method
            .code
            .as_ref()
            .ok_or_else(|| FrameError::NoCode(method.name.clone()))?;

        Ok(Self {
            method,
            code,
            stack: Vec::with_capacity(code.max_stack.into()),
            stack_units: 0,
            locals: vec![None; code.max_locals.into()],
            pc: 0,
        })
    }

    pub fn for_method(class: &'a Class, name: &str) -> FrameResult<Self> {
        let method = class
            .find_method(name)
            .ok_or_else(|| FrameError::NoSuchMethod {
                class: class.name().to_string(),
                name: name.to_string(),
            })?;

        Self::new(method)
    }

    pub fn for_method_by_descriptor(
        class: &'a Class,
        name: &str,
        descriptor: &str,
    ) -> FrameResult<Self> {
        let method = class
            .find_method_by_descriptor(name, descriptor)
            .ok_or_else(|| FrameError::NoSuchMethod {
                class: class.name().to_string(),
                name: format!("{}{}", name, descriptor),
            })?;

        Self::new(method)
    }

    pub fn method(&self) -> &'a Method {
        self.method
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Stack usage in units, where longs and doubles count twice.
    pub fn stack_depth(&self) -> usize {
        self.stack_units
    }

    pub fn push(&mut self, value: RuntimeValue) -> FrameResult<()> {
        let units = self.stack_units + value.category_type() as usize;
        if units > usize::from(self.code.max_stack) {
            return Err(FrameError::StackOverflow {
                max_stack: self.code.max_stack,
            });
        }

        self.stack_units = units;
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> FrameResult<RuntimeValue> {
        let value = self.stack.pop().ok_or(FrameError::StackUnderflow)?;
        self.stack_units -= value.category_type() as usize;
        Ok(value)
    }

    pub fn peek(&self) -> FrameResult<&RuntimeValue> {
        self.stack.last().ok_or(FrameError::StackUnderflow)
    }

    pub fn load_local(&self, index: u16) -> FrameResult<RuntimeValue> {
        self.locals
            .get(index as usize)
            .ok_or(FrameError::LocalOutOfRange {
                index,
                max_locals: self.code.max_locals,
            })?
            .ok_or(FrameError::UninitializedLocal(index))
    }

    /// A category two value also claims the slot after `index`, which must exist.
    pub fn store_local(&mut self, index: u16, value: RuntimeValue) -> FrameResult<()> {
        let slot = index as usize;
        let width = value.category_type() as usize;
        if slot + width > self.locals.len() {
            return Err(FrameError::LocalOutOfRange {
                index,
                max_locals: self.code.max_locals,
            });
        }

        // Overwriting the upper half of a long or double invalidates the whole value
        if let Some(previous) = slot.checked_sub(1) {
            if matches!(self.locals[previous], Some(v) if v.category_type() == 2) {
                self.locals[previous] = None;
            }
        }

        self.locals[slot] = Some(value);
        if width == 2 {
            self.locals[slot + 1] = None;
        }

        Ok(())
    }

    fn fetch<const N: usize>(&mut self) -> FrameResult<[u8; N]> {
        let end = self.pc + N;
        let bytes = self
            .code
            .code
            .get(self.pc..end)
            .ok_or(FrameError::PcOutOfRange {
                pc: self.pc,
                length: self.code.code.len(),
            })?;

        let mut out = [0; N];
        out.copy_from_slice(bytes);
        self.pc = end;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> FrameResult<u8> {
        self.fetch::<1>().map(|[byte]| byte)
    }

    pub fn read_u16(&mut self) -> FrameResult<u16> {
        self.fetch().map(u16::from_be_bytes)
    }

    pub fn read_i16(&mut self) -> FrameResult<i16> {
        self.fetch().map(i16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> FrameResult<u32> {
        self.fetch().map(u32::from_be_bytes)
    }

    pub fn jump(&mut self, pc: usize) -> FrameResult<()> {
        if pc >= self.code.code.len() {
            return Err(FrameError::PcOutOfRange {
                pc,
                length: self.code.code.len(),
            });
        }

        self.pc = pc;
        Ok(())
    }

    pub fn is_at_end(&self) -> bool {
        self.pc >= self.code.code.len()
    }

    /// The first exception table entry covering `pc` whose catch type is
    /// accepted by `matches`. Catch-all entries accept everything.
    pub fn handler_for(
        &self,
        pc: u16,
        mut matches: impl FnMut(u16) -> bool,
    ) -> Option<&'a ExceptionEntry> {
        self.code
            .exception_table
            .iter()
            .find(|entry| entry.covers(pc) && (entry.is_catch_all() || matches(entry.catch_type)))
    }

    pub fn current_line(&self) -> Option<u16> {
        u16::try_from(self.pc)
            .ok()
            .and_then(|pc| self.code.line_for(pc))
    }
}
