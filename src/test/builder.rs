//! Fluent builders for small test programs.
//!
//! [`ProgramBuilder`] seeds every program with the library classes the helpers below
//! reference (`java.lang.Object`, `java.lang.System`, `java.io.PrintStream`).
//! [`ClassBuilder`] defaults to a public program class extending `java.lang.Object`.

use crate::program::{
    Annotation, ClassAccessFlags, ClassDef, ClassOrigin, Code, DataResource, FieldAccessFlags,
    FieldDef, FieldRef, Instruction, InvokeKind, MethodAccessFlags, MethodDef, MethodRef,
    Placement, ProfileRule, Program, Proto, TypeName, TypeRef, CLINIT, INIT,
};

/// Name of the library class `print` writes through.
pub const PRINT_STREAM: &str = "java.io.PrintStream";

/// The field `print` reads its stream from.
pub fn system_out() -> FieldRef {
    FieldRef::new(TypeName::new("java.lang.System"), "out", TypeRef::class(PRINT_STREAM))
}

/// The method `print` invokes.
pub fn println() -> MethodRef {
    MethodRef::new(
        TypeName::new(PRINT_STREAM),
        "println",
        Proto::void(vec![TypeRef::class("java.lang.String")]),
    )
}

/// `System.out.println(text)`, without a trailing return.
pub fn print(text: &str) -> Vec<Instruction> {
    vec![
        Instruction::GetStatic(system_out()),
        Instruction::ConstString(text.into()),
        Instruction::Invoke {
            kind: InvokeKind::Virtual,
            method: println(),
        },
    ]
}

/// `new ty(args)`, leaving the instance on the stack.
pub fn new_instance(ty: &str, params: Vec<TypeRef>, args: Vec<Instruction>) -> Vec<Instruction> {
    let ty = TypeName::new(ty);
    let mut code = vec![Instruction::NewInstance(ty.clone()), Instruction::Dup];
    code.extend(args);
    code.push(Instruction::Invoke {
        kind: InvokeKind::Direct,
        method: MethodRef::new(ty, INIT, Proto::void(params)),
    });
    code
}

/// `receiver.name()` on an instance stored in local `slot`.
pub fn call_virtual(slot: u16, holder: &str, name: &str) -> Vec<Instruction> {
    vec![
        Instruction::Load(slot),
        Instruction::Invoke {
            kind: InvokeKind::Virtual,
            method: MethodRef::new(TypeName::new(holder), name, Proto::void(vec![])),
        },
    ]
}

fn library(name: &str, super_type: Option<TypeName>) -> ClassDef {
    let mut class = ClassDef::new(name, super_type);
    class.origin = ClassOrigin::Library;
    class
}

/// Builds a [`Program`] from class definitions.
pub struct ProgramBuilder {
    classes: Vec<ClassDef>,
    resources: Vec<DataResource>,
    startup_profile: Vec<ProfileRule>,
}

impl ProgramBuilder {
    /// A builder seeded with the library classes.
    pub fn new() -> Self {
        let object = library("java.lang.Object", None).with_method(MethodDef::new(
            INIT,
            Proto::void(vec![]),
            MethodAccessFlags::PUBLIC,
            Some(Code::new(vec![Instruction::Return])),
        ));
        let system = library("java.lang.System", Some(TypeName::object())).with_field(FieldDef::new(
            "out",
            TypeRef::class(PRINT_STREAM),
            FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
        ));
        let stream = library(PRINT_STREAM, Some(TypeName::object())).with_method(MethodDef::new(
            "println",
            println().sig.proto,
            MethodAccessFlags::PUBLIC,
            None,
        ));
        let string = library("java.lang.String", Some(TypeName::object()));
        ProgramBuilder {
            classes: vec![object, system, stream, string],
            resources: Vec::new(),
            startup_profile: Vec::new(),
        }
    }

    /// Adds a class.
    pub fn class(mut self, class: ClassDef) -> Self {
        self.classes.push(class);
        self
    }

    /// Adds a data resource.
    pub fn resource(mut self, name: &str, contents: &str) -> Self {
        self.resources.push(DataResource {
            name: name.to_string(),
            contents: contents.to_string(),
            adapt_contents: true,
        });
        self
    }

    /// Adds a startup profile rule.
    pub fn startup(mut self, rule: ProfileRule) -> Self {
        self.startup_profile.push(rule);
        self
    }

    /// Builds the program, panicking on duplicate class names.
    pub fn build(self) -> Program {
        let mut program = Program::new();
        for class in self.classes {
            program.add_class(class).unwrap();
        }
        program.resources = self.resources;
        program.startup_profile = self.startup_profile;
        program
    }
}

/// Builds a single [`ClassDef`].
pub struct ClassBuilder {
    class: ClassDef,
}

impl ClassBuilder {
    /// A public class extending `java.lang.Object`.
    pub fn new(name: &str) -> Self {
        ClassBuilder {
            class: ClassDef::new(name, Some(TypeName::object())),
        }
    }

    /// A public interface.
    pub fn interface(name: &str) -> Self {
        let mut builder = Self::new(name);
        builder.class.flags =
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
        builder
    }

    /// Sets the superclass.
    pub fn extends(mut self, super_type: &str) -> Self {
        self.class.super_type = Some(TypeName::new(super_type));
        self
    }

    /// Adds a direct superinterface.
    pub fn implements(mut self, interface: &str) -> Self {
        self.class.interfaces.push(TypeName::new(interface));
        self
    }

    /// Adds class flags.
    pub fn flags(mut self, flags: ClassAccessFlags) -> Self {
        self.class.flags |= flags;
        self
    }

    /// Marks the class abstract.
    pub fn make_abstract(self) -> Self {
        self.flags(ClassAccessFlags::ABSTRACT)
    }

    /// Adds an annotation.
    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.class.annotations.push(annotation);
        self
    }

    /// Marks the class as synthesized by the compiler, of the given kind.
    pub fn synthetic(mut self, kind: &str) -> Self {
        self.class.synthetic = Some(kind.into());
        self.class.flags |= ClassAccessFlags::SYNTHETIC;
        self
    }

    /// Marks the class as kept by the configuration.
    pub fn pinned(mut self) -> Self {
        self.class.pinned = true;
        self
    }

    /// Sets the output partition.
    pub fn placement(mut self, placement: Placement) -> Self {
        self.class.placement = placement;
        self
    }

    /// Sets the nest host.
    pub fn nest_host(mut self, host: &str) -> Self {
        self.class.nest_host = Some(TypeName::new(host));
        self
    }

    /// Sets the nest members of a nest host.
    pub fn nest_members(mut self, members: &[&str]) -> Self {
        self.class.nest_members = members.iter().map(TypeName::new).collect();
        self
    }

    /// Adds a field.
    pub fn field(self, name: &str, ty: TypeRef, flags: FieldAccessFlags) -> Self {
        self.field_def(FieldDef::new(name, ty, flags))
    }

    /// Adds a prepared field definition.
    pub fn field_def(mut self, field: FieldDef) -> Self {
        self.class.fields.push(field);
        self
    }

    /// Adds a prepared method definition.
    pub fn method(mut self, method: MethodDef) -> Self {
        self.class.methods.push(method);
        self
    }

    /// Adds `public <init>()` that only calls the superclass constructor.
    pub fn default_constructor(self) -> Self {
        self.constructor(vec![], vec![])
    }

    /// Adds a public constructor. `body` runs after the superclass constructor call and is
    /// followed by a return.
    pub fn constructor(self, params: Vec<TypeRef>, body: Vec<Instruction>) -> Self {
        let super_type = self.class.super_type.clone().unwrap_or_else(TypeName::object);
        let mut code = vec![
            Instruction::Load(0),
            Instruction::Invoke {
                kind: InvokeKind::Direct,
                method: MethodRef::new(super_type, INIT, Proto::void(vec![])),
            },
        ];
        code.extend(body);
        code.push(Instruction::Return);
        let mut code = Code::new(code);
        code.max_locals = code.max_locals.max(1 + params_width(&params));
        self.method(MethodDef::new(
            INIT,
            Proto::void(params),
            MethodAccessFlags::PUBLIC,
            Some(code),
        ))
    }

    /// Adds a public virtual method with the complete `body`.
    pub fn virtual_method(self, name: &str, proto: Proto, body: Vec<Instruction>) -> Self {
        let mut code = Code::new(body);
        code.max_locals = code.max_locals.max(1 + params_width(&proto.params));
        self.method(MethodDef::new(name, proto, MethodAccessFlags::PUBLIC, Some(code)))
    }

    /// Adds a public static `void` method with the complete `body`.
    pub fn static_method(self, name: &str, params: Vec<TypeRef>, body: Vec<Instruction>) -> Self {
        let mut code = Code::new(body);
        code.max_locals = code.max_locals.max(params_width(&params));
        self.method(MethodDef::new(
            name,
            Proto::void(params),
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            Some(code),
        ))
    }

    /// Adds a public abstract method. Classes (not interfaces) become abstract.
    pub fn abstract_method(mut self, name: &str, proto: Proto) -> Self {
        if !self.class.is_interface() {
            self.class.flags |= ClassAccessFlags::ABSTRACT;
        }
        self.method(MethodDef::new(
            name,
            proto,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
            None,
        ))
    }

    /// Adds `<clinit>` with the complete `body`.
    pub fn class_initializer(self, body: Vec<Instruction>) -> Self {
        self.method(MethodDef::new(
            CLINIT,
            Proto::void(vec![]),
            MethodAccessFlags::STATIC,
            Some(Code::new(body)),
        ))
    }

    /// Finishes the class.
    pub fn build(self) -> ClassDef {
        self.class
    }
}

fn params_width(params: &[TypeRef]) -> u16 {
    u16::try_from(params.len()).unwrap_or(u16::MAX)
}
