//! Method bodies as a small stack-machine instruction list.
//!
//! The instruction set is intentionally narrow: it covers exactly the operations the
//! merger has to reason about (allocation, invocation by kind, field access, runtime
//! type checks, switches for synthesized dispatch) plus the debug information the
//! rewrite lens has to keep consistent. Control flow uses symbolic [`Label`]s so that
//! code can be spliced and concatenated without offset fixups.
//!
//! # Key Types
//! - [`Instruction`] - a single operation
//! - [`InvokeKind`] - dispatch kind of an invoke
//! - [`Code`] - instructions, exception handlers and local variable debug info
//! - [`ReferenceKind`] - how an instruction uses a [`Reference`]

use std::sync::Arc;

use strum::{Display, EnumIter, IntoStaticStr};

use crate::program::{FieldRef, MethodRef, Reference, TypeName, TypeRef};

/// Symbolic branch target inside one [`Code`] body.
pub type Label = u32;

/// Dispatch kind of an invoke instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, IntoStaticStr)]
pub enum InvokeKind {
    /// `invokestatic`
    Static,
    /// `invokevirtual`
    Virtual,
    /// `invokeinterface`
    Interface,
    /// `invokespecial` on a constructor or private method
    Direct,
    /// `invokespecial` on a superclass method
    Super,
}

impl InvokeKind {
    /// Returns true if the invoke passes a receiver.
    #[must_use]
    pub fn has_receiver(self) -> bool {
        !matches!(self, InvokeKind::Static)
    }
}

/// A single instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Push an integer constant
    ConstInt(i64),
    /// Push a string constant
    ConstString(Arc<str>),
    /// Push `null`
    ConstNull,
    /// Push a class literal
    ConstClass(TypeRef),
    /// Push the name of a class or member tracked for reflective lookups
    ConstIdentifier(Reference),
    /// Push a local
    Load(u16),
    /// Pop into a local
    Store(u16),
    /// Duplicate the top of the stack
    Dup,
    /// Discard the top of the stack
    Pop,
    /// Allocate an uninitialized instance
    NewInstance(TypeName),
    /// Invoke a method
    Invoke {
        /// Dispatch kind
        kind: InvokeKind,
        /// Invoked method as written
        method: MethodRef,
    },
    /// Invoke through a call site bootstrap
    InvokeDynamic {
        /// Bootstrap method
        bootstrap: MethodRef,
        /// True for lambda metafactory call sites
        lambda: bool,
    },
    /// Read an instance field
    GetField(FieldRef),
    /// Write an instance field
    PutField(FieldRef),
    /// Read a static field
    GetStatic(FieldRef),
    /// Write a static field
    PutStatic(FieldRef),
    /// Checked downcast
    CheckCast(TypeRef),
    /// Runtime type test
    InstanceOf(TypeRef),
    /// Acquire the monitor of the top of the stack
    MonitorEnter,
    /// Release the monitor of the top of the stack
    MonitorExit,
    /// Branch target
    Label(Label),
    /// Unconditional branch
    Goto(Label),
    /// Branch on an integer key
    Switch {
        /// Key and target pairs
        cases: Vec<(i32, Label)>,
        /// Target when no case matches
        default: Label,
    },
    /// Return from a `void` method
    Return,
    /// Return the top of the stack
    ReturnValue,
    /// Throw the top of the stack
    Throw,
    /// Line number entry; `method` is the original method the line belongs to
    Position {
        /// Source line
        line: u32,
        /// Original (pre-merge) method
        method: MethodRef,
    },
}

/// How an instruction or handler uses a [`Reference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ReferenceKind {
    /// `new T`
    NewInstance,
    /// An invoke of the given kind
    Invoke(InvokeKind),
    /// `invokedynamic` bootstrap
    InvokeDynamic,
    /// Instance field read
    FieldRead,
    /// Instance field write
    FieldWrite,
    /// Static field read
    StaticRead,
    /// Static field write
    StaticWrite,
    /// `checkcast T`
    CheckCast,
    /// `instanceof T`
    InstanceOf,
    /// `T.class`
    ConstClass,
    /// Exception handler catch type
    CatchType,
    /// Tracked identifier string
    Identifier,
}

impl ReferenceKind {
    /// Returns true for uses that observe the runtime identity of a type.
    #[must_use]
    pub fn is_runtime_type_check(self) -> bool {
        matches!(
            self,
            ReferenceKind::CheckCast
                | ReferenceKind::InstanceOf
                | ReferenceKind::ConstClass
                | ReferenceKind::CatchType
        )
    }
}

/// An exception handler covering the instructions between two labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExceptionHandler {
    /// First covered label
    pub start: Label,
    /// Label after the last covered instruction
    pub end: Label,
    /// Handler entry
    pub handler: Label,
    /// Caught type, `None` for catch-all
    pub catch_type: Option<TypeName>,
}

/// Debug information for a local variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalVariable {
    /// Local slot
    pub index: u16,
    /// Source name
    pub name: Arc<str>,
    /// Declared type
    pub ty: TypeRef,
}

/// A method body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Code {
    /// Instructions in execution order
    pub instructions: Vec<Instruction>,
    /// Exception handlers, innermost first
    pub handlers: Vec<ExceptionHandler>,
    /// Local variable debug info
    pub locals: Vec<LocalVariable>,
    /// Number of local slots used, receiver included
    pub max_locals: u16,
}

impl Code {
    /// Creates a body from instructions, computing `max_locals` from the highest slot used.
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        let max_locals = instructions
            .iter()
            .filter_map(|insn| match insn {
                Instruction::Load(slot) | Instruction::Store(slot) => Some(slot + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        Code {
            instructions,
            handlers: Vec::new(),
            locals: Vec::new(),
            max_locals,
        }
    }

    /// Returns the first label not used in this body.
    #[must_use]
    pub fn next_free_label(&self) -> Label {
        self.instructions
            .iter()
            .filter_map(|insn| match insn {
                Instruction::Label(label) => Some(*label + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Returns true if the body contains no instructions other than labels, positions and a
    /// trailing return.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.instructions.iter().all(|insn| {
            matches!(
                insn,
                Instruction::Label(_) | Instruction::Position { .. } | Instruction::Return
            )
        })
    }

    /// Calls `visit` for every reference made by this body.
    ///
    /// The first argument is the instruction index; handler catch types report the index
    /// of the handler entry in [`Code::handlers`] offset by the instruction count.
    pub fn for_each_reference<F>(&self, mut visit: F)
    where
        F: FnMut(usize, ReferenceKind, Reference),
    {
        for (index, insn) in self.instructions.iter().enumerate() {
            match insn {
                Instruction::NewInstance(ty) => {
                    visit(index, ReferenceKind::NewInstance, Reference::Type(ty.clone()));
                }
                Instruction::Invoke { kind, method } => {
                    visit(index, ReferenceKind::Invoke(*kind), Reference::Method(method.clone()));
                }
                Instruction::InvokeDynamic { bootstrap, .. } => visit(
                    index,
                    ReferenceKind::InvokeDynamic,
                    Reference::Method(bootstrap.clone()),
                ),
                Instruction::GetField(field) => {
                    visit(index, ReferenceKind::FieldRead, Reference::Field(field.clone()));
                }
                Instruction::PutField(field) => {
                    visit(index, ReferenceKind::FieldWrite, Reference::Field(field.clone()));
                }
                Instruction::GetStatic(field) => {
                    visit(index, ReferenceKind::StaticRead, Reference::Field(field.clone()));
                }
                Instruction::PutStatic(field) => {
                    visit(index, ReferenceKind::StaticWrite, Reference::Field(field.clone()));
                }
                Instruction::CheckCast(ty) | Instruction::InstanceOf(ty) | Instruction::ConstClass(ty) => {
                    if let Some(name) = ty.base_class() {
                        let kind = match insn {
                            Instruction::CheckCast(_) => ReferenceKind::CheckCast,
                            Instruction::InstanceOf(_) => ReferenceKind::InstanceOf,
                            _ => ReferenceKind::ConstClass,
                        };
                        visit(index, kind, Reference::Type(name.clone()));
                    }
                }
                Instruction::ConstIdentifier(reference) => {
                    visit(index, ReferenceKind::Identifier, reference.clone());
                }
                _ => {}
            }
        }

        let base = self.instructions.len();
        for (offset, handler) in self.handlers.iter().enumerate() {
            if let Some(catch_type) = &handler.catch_type {
                visit(
                    base + offset,
                    ReferenceKind::CatchType,
                    Reference::Type(catch_type.clone()),
                );
            }
        }
    }
}
