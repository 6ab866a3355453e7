//! Applying a lens to method bodies.

use crate::{
    lens::RewriteLens,
    program::{
        Code, ExceptionHandler, Instruction, LocalVariable, Program, Reference, TypeName, TypeRef,
    },
    Error, Result,
};

/// Rewrites method bodies through a [`RewriteLens`].
///
/// Besides mapping references the rewriter
/// - pushes the extra arguments of rewritten invokes (class ids, `null` markers)
/// - inserts a `checkcast` after reads of fields whose type was widened
/// - maps exception handler catch types and local variable types
///
/// Debug positions keep naming their original method, which is what retracing needs.
pub struct CodeRewriter<'a> {
    lens: &'a RewriteLens,
}

impl<'a> CodeRewriter<'a> {
    /// Creates a rewriter for `lens`.
    #[must_use]
    pub fn new(lens: &'a RewriteLens) -> Self {
        CodeRewriter { lens }
    }

    /// Rewrites every method body of every program class in place.
    pub fn apply(&self, program: &mut Program) {
        if self.lens.is_identity() {
            return;
        }
        let mut rewritten = 0usize;
        program.for_each_code_mut(|_, method| {
            if let Some(code) = &mut method.code {
                *code = self.rewrite_code(code);
                rewritten += 1;
            }
        });
        log::debug!("rewrote {rewritten} method bodies");
    }

    /// Returns a rewritten copy of `code`.
    #[must_use]
    pub fn rewrite_code(&self, code: &Code) -> Code {
        let lens = self.lens;
        let mut instructions = Vec::with_capacity(code.instructions.len());
        for insn in &code.instructions {
            match insn {
                Instruction::Invoke { kind, method } => {
                    let lookup = lens.rewrite_method(method);
                    instructions.extend(lookup.extra.iter().map(|e| e.push_instruction()));
                    instructions.push(Instruction::Invoke {
                        kind: *kind,
                        method: lookup.method,
                    });
                }
                Instruction::InvokeDynamic { bootstrap, lambda } => {
                    instructions.push(Instruction::InvokeDynamic {
                        bootstrap: lens.rewrite_method(bootstrap).method,
                        lambda: *lambda,
                    });
                }
                Instruction::GetField(field) | Instruction::GetStatic(field) => {
                    let mapped = lens.rewrite_field(field);
                    let expected = lens.rewrite_type_ref(&field.ty);
                    let widened = expected != mapped.ty && expected.is_reference();
                    instructions.push(match insn {
                        Instruction::GetField(_) => Instruction::GetField(mapped),
                        _ => Instruction::GetStatic(mapped),
                    });
                    if widened {
                        instructions.push(Instruction::CheckCast(expected));
                    }
                }
                Instruction::PutField(field) => {
                    instructions.push(Instruction::PutField(lens.rewrite_field(field)));
                }
                Instruction::PutStatic(field) => {
                    instructions.push(Instruction::PutStatic(lens.rewrite_field(field)));
                }
                Instruction::NewInstance(ty) => {
                    instructions.push(Instruction::NewInstance(lens.rewrite_type(ty)));
                }
                Instruction::CheckCast(ty) => {
                    instructions.push(Instruction::CheckCast(lens.rewrite_type_ref(ty)));
                }
                Instruction::InstanceOf(ty) => {
                    instructions.push(Instruction::InstanceOf(lens.rewrite_type_ref(ty)));
                }
                Instruction::ConstClass(ty) => {
                    instructions.push(Instruction::ConstClass(lens.rewrite_type_ref(ty)));
                }
                Instruction::ConstIdentifier(reference) => {
                    instructions.push(Instruction::ConstIdentifier(lens.rewrite(reference)));
                }
                other => instructions.push(other.clone()),
            }
        }

        Code {
            instructions,
            handlers: code
                .handlers
                .iter()
                .map(|h| ExceptionHandler {
                    catch_type: h.catch_type.as_ref().map(|t| lens.rewrite_type(t)),
                    ..h.clone()
                })
                .collect(),
            locals: code
                .locals
                .iter()
                .map(|l| LocalVariable {
                    ty: lens.rewrite_type_ref(&l.ty),
                    ..l.clone()
                })
                .collect(),
            max_locals: code.max_locals,
        }
    }
}

/// Checks that every reference left in the program still resolves.
///
/// Member references whose holder is a program class must resolve against the rewritten
/// program, and no reference may name a class that was merged away.
///
/// # Errors
///
/// Returns [`Error::MissingReference`] naming the first reference that does not resolve.
pub fn verify_references(program: &Program, lens: &RewriteLens) -> Result<()> {
    for (_, class) in program.program_classes() {
        for method in &class.methods {
            let Some(code) = &method.code else {
                continue;
            };
            let site = class.method_ref(method);
            let mut failure: Option<String> = None;
            code.for_each_reference(|_, _, reference| {
                if failure.is_some() {
                    return;
                }
                if !resolves(program, lens, &reference) {
                    failure = Some(format!("{reference} (used in {site})"));
                }
            });
            if let Some(missing) = failure {
                return Err(Error::MissingReference(missing));
            }
        }
    }
    Ok(())
}

fn resolves(program: &Program, lens: &RewriteLens, reference: &Reference) -> bool {
    let mentions_merged = |name: &TypeName| lens.is_merged_away(name);
    match reference {
        Reference::Type(name) => !mentions_merged(name),
        Reference::Field(field) => {
            if mentions_merged(&field.holder) {
                return false;
            }
            if !program.is_program_class(&field.holder) {
                return true;
            }
            program.resolve_field(field).is_some()
        }
        Reference::Method(method) => {
            let stale_param = method
                .sig
                .proto
                .params
                .iter()
                .filter_map(TypeRef::base_class)
                .any(|n| mentions_merged(n));
            if stale_param || mentions_merged(&method.holder) {
                return false;
            }
            if !program.is_program_class(&method.holder) {
                return true;
            }
            program.lookup_method(method).is_some()
        }
    }
}
