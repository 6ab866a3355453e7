//! A reference interpreter for test programs.
//!
//! Executes a static entry point and collects everything written through
//! `System.out.println`. Only what the merger can observe or synthesize is supported:
//! objects with fields, statics with lazy class initialization, every invoke kind,
//! runtime type checks and switches. Throwing, `invokedynamic` and exception handlers end
//! the run with an error.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    program::{
        Code, FieldRef, Instruction, InvokeKind, Label, MethodRef, MethodSig, Program, Proto,
        HierarchyResolver, Resolver, TypeName, TypeRef, CLINIT, INIT,
    },
    test::builder::{system_out, PRINT_STREAM},
};

const STEP_LIMIT: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Str(Arc<str>),
    Null,
    Object(usize),
    Class(TypeRef),
    Stream,
}

impl Value {
    fn default_for(ty: &TypeRef) -> Self {
        if ty.is_reference() {
            Value::Null
        } else {
            Value::Int(0)
        }
    }
}

type FieldKey = (TypeName, Arc<str>);

struct Object {
    class: TypeName,
    fields: FxHashMap<FieldKey, Value>,
}

struct Machine<'a> {
    program: &'a Program,
    heap: Vec<Object>,
    statics: FxHashMap<FieldKey, Value>,
    initialized: FxHashSet<TypeName>,
    output: Vec<String>,
    steps: usize,
}

/// Runs the static `void method()` of `class` and returns the printed lines.
///
/// # Errors
///
/// Returns a description of the first failure: a missing class or member, a failed cast,
/// a null receiver, an unsupported instruction or an exhausted step budget.
pub fn run(program: &Program, class: &str, method: &str) -> Result<Vec<String>, String> {
    let mut machine = Machine {
        program,
        heap: Vec::new(),
        statics: FxHashMap::default(),
        initialized: FxHashSet::default(),
        output: Vec::new(),
        steps: 0,
    };
    let entry = MethodRef::new(TypeName::new(class), method, Proto::void(vec![]));
    machine.initialize(&entry.holder)?;
    machine.call(&entry, Vec::new())?;
    Ok(machine.output)
}

impl Machine<'_> {
    fn initialize(&mut self, class: &TypeName) -> Result<(), String> {
        if !self.program.is_program_class(class) || !self.initialized.insert(class.clone()) {
            return Ok(());
        }
        let Some(def) = self.program.class_by_name(class) else {
            return Ok(());
        };
        if let Some(super_type) = def.super_type.clone() {
            self.initialize(&super_type)?;
        }
        if def.class_initializer().is_some() {
            let clinit = MethodRef::new(class.clone(), CLINIT, Proto::void(vec![]));
            self.call(&clinit, Vec::new())?;
        }
        Ok(())
    }

    /// Calls the method declared exactly by `method.holder`.
    fn call(&mut self, method: &MethodRef, args: Vec<Value>) -> Result<Option<Value>, String> {
        let program = self.program;
        let def = program
            .method(method)
            .ok_or_else(|| format!("NoSuchMethodError: {method}"))?;
        let code = def
            .code
            .as_ref()
            .ok_or_else(|| format!("AbstractMethodError: {method}"))?;
        self.execute(code, args)
    }

    fn execute(&mut self, code: &Code, args: Vec<Value>) -> Result<Option<Value>, String> {
        let labels: FxHashMap<Label, usize> = code
            .instructions
            .iter()
            .enumerate()
            .filter_map(|(index, insn)| match insn {
                Instruction::Label(label) => Some((*label, index)),
                _ => None,
            })
            .collect();
        let jump = |label: &Label| {
            labels
                .get(label)
                .copied()
                .ok_or_else(|| format!("undefined label {label}"))
        };

        let mut locals = args;
        let width = usize::from(code.max_locals).max(locals.len());
        locals.resize(width, Value::Null);
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0usize;

        while let Some(insn) = code.instructions.get(pc) {
            self.steps += 1;
            if self.steps > STEP_LIMIT {
                return Err("step limit exceeded".to_string());
            }
            pc += 1;
            match insn {
                Instruction::ConstInt(value) => stack.push(Value::Int(*value)),
                Instruction::ConstString(value) => stack.push(Value::Str(value.clone())),
                Instruction::ConstNull => stack.push(Value::Null),
                Instruction::ConstClass(ty) => stack.push(Value::Class(ty.clone())),
                Instruction::ConstIdentifier(reference) => {
                    stack.push(Value::Str(reference.to_string().into()));
                }
                Instruction::Load(slot) => {
                    let value = locals.get(usize::from(*slot)).cloned().unwrap_or(Value::Null);
                    stack.push(value);
                }
                Instruction::Store(slot) => {
                    let value = pop(&mut stack)?;
                    let slot = usize::from(*slot);
                    if slot >= locals.len() {
                        locals.resize(slot + 1, Value::Null);
                    }
                    locals[slot] = value;
                }
                Instruction::Dup => {
                    let top = stack.last().cloned().ok_or("stack underflow")?;
                    stack.push(top);
                }
                Instruction::Pop | Instruction::MonitorEnter | Instruction::MonitorExit => {
                    pop(&mut stack)?;
                }
                Instruction::NewInstance(ty) => {
                    self.initialize(ty)?;
                    self.heap.push(Object {
                        class: ty.clone(),
                        fields: FxHashMap::default(),
                    });
                    stack.push(Value::Object(self.heap.len() - 1));
                }
                Instruction::Invoke { kind, method } => {
                    let arity = method.sig.proto.params.len() + usize::from(kind.has_receiver());
                    if stack.len() < arity {
                        return Err(format!("stack underflow calling {method}"));
                    }
                    let args = stack.split_off(stack.len() - arity);
                    if let Some(result) = self.invoke(*kind, method, args)? {
                        stack.push(result);
                    }
                }
                Instruction::GetField(field) => {
                    let receiver = self.object(pop(&mut stack)?)?;
                    let key = self.field_key(field)?;
                    let value = self.heap[receiver]
                        .fields
                        .get(&key)
                        .cloned()
                        .unwrap_or_else(|| Value::default_for(&field.ty));
                    stack.push(value);
                }
                Instruction::PutField(field) => {
                    let value = pop(&mut stack)?;
                    let receiver = self.object(pop(&mut stack)?)?;
                    let key = self.field_key(field)?;
                    self.heap[receiver].fields.insert(key, value);
                }
                Instruction::GetStatic(field) => {
                    if *field == system_out() {
                        stack.push(Value::Stream);
                        continue;
                    }
                    self.initialize(&field.holder)?;
                    let key = self.field_key(field)?;
                    let value = self
                        .statics
                        .get(&key)
                        .cloned()
                        .unwrap_or_else(|| Value::default_for(&field.ty));
                    stack.push(value);
                }
                Instruction::PutStatic(field) => {
                    let value = pop(&mut stack)?;
                    self.initialize(&field.holder)?;
                    let key = self.field_key(field)?;
                    self.statics.insert(key, value);
                }
                Instruction::CheckCast(ty) => {
                    let top = stack.last().cloned().ok_or("stack underflow")?;
                    if !self.is_instance(&top, ty) && top != Value::Null {
                        return Err(format!("ClassCastException: {top:?} is not {ty}"));
                    }
                }
                Instruction::InstanceOf(ty) => {
                    let value = pop(&mut stack)?;
                    stack.push(Value::Int(i64::from(self.is_instance(&value, ty))));
                }
                Instruction::Label(_) | Instruction::Position { .. } => {}
                Instruction::Goto(label) => pc = jump(label)?,
                Instruction::Switch { cases, default } => {
                    let Value::Int(key) = pop(&mut stack)? else {
                        return Err("switch on a non-integer".to_string());
                    };
                    let target = cases
                        .iter()
                        .find(|(case, _)| i64::from(*case) == key)
                        .map_or(default, |(_, label)| label);
                    pc = jump(target)?;
                }
                Instruction::Return => return Ok(None),
                Instruction::ReturnValue => return pop(&mut stack).map(Some),
                Instruction::Throw => return Err("exception thrown".to_string()),
                Instruction::InvokeDynamic { bootstrap, .. } => {
                    return Err(format!("unsupported invokedynamic {bootstrap}"));
                }
            }
        }
        Err("fell off the end of the method".to_string())
    }

    fn invoke(
        &mut self,
        kind: InvokeKind,
        method: &MethodRef,
        args: Vec<Value>,
    ) -> Result<Option<Value>, String> {
        let program = self.program;
        let callee = match kind {
            InvokeKind::Static => {
                self.initialize(&method.holder)?;
                self.resolve(method)?
            }
            InvokeKind::Direct | InvokeKind::Super => {
                if !program.is_program_class(&method.holder) {
                    return Self::library_call(method, &args).map(|()| None);
                }
                self.resolve(method)?
            }
            InvokeKind::Virtual | InvokeKind::Interface => match args.first() {
                Some(Value::Stream) => {
                    self.print(method, &args)?;
                    return Ok(None);
                }
                Some(Value::Object(index)) => {
                    let receiver = self.heap[*index].class.clone();
                    self.dispatch(&receiver, &method.sig)?
                }
                Some(Value::Null) => return Err(format!("NullPointerException calling {method}")),
                other => return Err(format!("cannot dispatch {method} on {other:?}")),
            },
        };
        if !program.is_program_class(&callee.holder) {
            return Self::library_call(&callee, &args).map(|()| None);
        }
        self.call(&callee, args)
    }

    fn resolve(&self, method: &MethodRef) -> Result<MethodRef, String> {
        let program = self.program;
        program
            .lookup_method(method)
            .and_then(|(id, _)| program.class(id))
            .map(|class| MethodRef::from_sig(class.name.clone(), method.sig.clone()))
            .ok_or_else(|| format!("NoSuchMethodError: {method}"))
    }

    fn dispatch(&self, receiver: &TypeName, sig: &MethodSig) -> Result<MethodRef, String> {
        HierarchyResolver
            .resolve_virtual(self.program, receiver, sig)
            .single()
            .cloned()
            .ok_or_else(|| format!("AbstractMethodError: {receiver}.{sig}"))
    }

    fn library_call(method: &MethodRef, args: &[Value]) -> Result<(), String> {
        if method.holder.is_object() && method.sig.name.as_ref() == INIT && args.len() == 1 {
            return Ok(());
        }
        Err(format!("unsupported library call {method}"))
    }

    fn print(&mut self, method: &MethodRef, args: &[Value]) -> Result<(), String> {
        if method.holder.as_str() != PRINT_STREAM || method.sig.name.as_ref() != "println" {
            return Err(format!("unsupported stream call {method}"));
        }
        let line = match args.get(1) {
            Some(Value::Str(text)) => text.to_string(),
            Some(Value::Int(value)) => value.to_string(),
            Some(Value::Null) => "null".to_string(),
            Some(Value::Object(index)) => format!("{}@{index}", self.heap[*index].class),
            other => format!("{other:?}"),
        };
        self.output.push(line);
        Ok(())
    }

    fn object(&self, value: Value) -> Result<usize, String> {
        match value {
            Value::Object(index) => Ok(index),
            Value::Null => Err("NullPointerException on field access".to_string()),
            other => Err(format!("field access on {other:?}")),
        }
    }

    fn field_key(&self, field: &FieldRef) -> Result<FieldKey, String> {
        let program = self.program;
        program
            .resolve_field(field)
            .and_then(|(id, def)| program.class(id).map(|class| (class.name.clone(), def.name.clone())))
            .ok_or_else(|| format!("NoSuchFieldError: {field}"))
    }

    fn is_instance(&self, value: &Value, ty: &TypeRef) -> bool {
        match value {
            Value::Object(index) => self
                .program
                .is_assignable(&TypeRef::Class(self.heap[*index].class.clone()), ty),
            Value::Str(_) => {
                *ty == TypeRef::class("java.lang.String") || *ty == TypeRef::object()
            }
            _ => false,
        }
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, String> {
    stack.pop().ok_or_else(|| "stack underflow".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::builder::{call_virtual, new_instance, print, ClassBuilder, ProgramBuilder};

    #[test]
    fn test_prints_through_virtual_dispatch() {
        let mut main = new_instance("a.Sub", vec![], vec![]);
        main.push(Instruction::Store(0));
        main.extend(call_virtual(0, "a.Base", "f"));
        main.extend(print("done"));
        main.push(Instruction::Return);

        let mut base_f = print("base");
        base_f.push(Instruction::Return);
        let mut sub_f = print("sub");
        sub_f.push(Instruction::Return);
        let program = ProgramBuilder::new()
            .class(
                ClassBuilder::new("a.Base")
                    .default_constructor()
                    .virtual_method("f", Proto::void(vec![]), base_f)
                    .build(),
            )
            .class(
                ClassBuilder::new("a.Sub")
                    .extends("a.Base")
                    .default_constructor()
                    .virtual_method("f", Proto::void(vec![]), sub_f)
                    .build(),
            )
            .class(ClassBuilder::new("a.Main").static_method("main", vec![], main).build())
            .build();

        assert_eq!(run(&program, "a.Main", "main").unwrap(), vec!["sub", "done"]);
    }

    #[test]
    fn test_static_initialization_runs_once() {
        let value = FieldRef::new(TypeName::new("a.A"), "COUNT", TypeRef::Int);
        let mut clinit = print("init");
        clinit.extend([
            Instruction::ConstInt(7),
            Instruction::PutStatic(value.clone()),
            Instruction::Return,
        ]);
        let main = vec![
            Instruction::GetStatic(value.clone()),
            Instruction::Pop,
            Instruction::GetStatic(system_out()),
            Instruction::GetStatic(value),
            Instruction::Invoke {
                kind: InvokeKind::Virtual,
                method: crate::test::builder::println(),
            },
            Instruction::Return,
        ];
        let program = ProgramBuilder::new()
            .class(
                ClassBuilder::new("a.A")
                    .field("COUNT", TypeRef::Int, crate::program::FieldAccessFlags::STATIC)
                    .class_initializer(clinit)
                    .build(),
            )
            .class(ClassBuilder::new("a.Main").static_method("main", vec![], main).build())
            .build();

        assert_eq!(run(&program, "a.Main", "main").unwrap(), vec!["init", "7"]);
    }

    #[test]
    fn test_missing_method_is_reported() {
        let main = vec![
            Instruction::Invoke {
                kind: InvokeKind::Static,
                method: MethodRef::new(TypeName::new("a.Main"), "gone", Proto::void(vec![])),
            },
            Instruction::Return,
        ];
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.Main").static_method("main", vec![], main).build())
            .build();
        let error = run(&program, "a.Main", "main").unwrap_err();
        assert!(error.contains("NoSuchMethodError"));
    }
}
