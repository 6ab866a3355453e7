//! Applying a lens outside of code: annotations, data resources and the startup profile.

use rustc_hash::FxHashSet;

use crate::{
    lens::RewriteLens,
    program::{Annotation, AnnotationValue, ProfileRule, Program, TypeName},
};

/// Rewrites class, field and method annotations of every program class.
pub fn rewrite_annotations(program: &mut Program, lens: &RewriteLens) {
    for id in program.class_ids() {
        let Some(class) = program.class_mut(id) else {
            continue;
        };
        if class.is_library() {
            continue;
        }
        rewrite_all(&mut class.annotations, lens);
        for field in &mut class.fields {
            rewrite_all(&mut field.annotations, lens);
        }
        for method in &mut class.methods {
            rewrite_all(&mut method.annotations, lens);
        }
    }
}

fn rewrite_all(annotations: &mut [Annotation], lens: &RewriteLens) {
    for annotation in annotations {
        *annotation = rewrite_annotation(annotation, lens);
    }
}

fn rewrite_annotation(annotation: &Annotation, lens: &RewriteLens) -> Annotation {
    Annotation {
        ty: lens.rewrite_type(&annotation.ty),
        elements: annotation
            .elements
            .iter()
            .map(|(name, value)| (name.clone(), rewrite_value(value, lens)))
            .collect(),
    }
}

fn rewrite_value(value: &AnnotationValue, lens: &RewriteLens) -> AnnotationValue {
    match value {
        AnnotationValue::Type(ty) => AnnotationValue::Type(lens.rewrite_type_ref(ty)),
        AnnotationValue::Enum(field) => AnnotationValue::Enum(lens.rewrite_field(field)),
        AnnotationValue::Annotation(nested) => {
            AnnotationValue::Annotation(rewrite_annotation(nested, lens))
        }
        AnnotationValue::Array(values) => {
            AnnotationValue::Array(values.iter().map(|v| rewrite_value(v, lens)).collect())
        }
        other => other.clone(),
    }
}

/// Rewrites class names inside adaptable data resources and their file names.
///
/// A class name is recognized as a whole token of identifier characters, dots, `$` and
/// slashes, in either `a.b.C` or `a/b/C` form; the replacement keeps the form it found.
pub fn rewrite_resources(program: &mut Program, lens: &RewriteLens) {
    for resource in &mut program.resources {
        if !resource.adapt_contents {
            continue;
        }
        resource.contents = rewrite_class_names(&resource.contents, lens);
        resource.name = rewrite_class_names(&resource.name, lens);
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '/')
}

fn rewrite_class_names(text: &str, lens: &RewriteLens) -> String {
    let mut result = String::with_capacity(text.len());
    let mut token = String::new();
    for c in text.chars() {
        if is_name_char(c) {
            token.push(c);
            continue;
        }
        flush_token(&mut token, &mut result, lens);
        result.push(c);
    }
    flush_token(&mut token, &mut result, lens);
    result
}

fn flush_token(token: &mut String, out: &mut String, lens: &RewriteLens) {
    if token.is_empty() {
        return;
    }
    // a path like META-INF/services/a.B only names a class in its last segment
    let (prefix, candidate) = match token.rfind('/') {
        Some(index) if token[index + 1..].contains('.') => token.split_at(index + 1),
        _ => ("", token.as_str()),
    };
    let slashed = candidate.contains('/');
    let dotted = candidate.replace('/', ".");
    let name = TypeName::new(&dotted);
    if lens.is_merged_away(&name) {
        let target = lens.rewrite_type(&name);
        out.push_str(prefix);
        if slashed {
            out.push_str(&target.as_str().replace('.', "/"));
        } else {
            out.push_str(target.as_str());
        }
    } else {
        out.push_str(token);
    }
    token.clear();
}

/// Rewrites the startup profile, dropping entries that became duplicates.
pub fn rewrite_startup_profile(program: &mut Program, lens: &RewriteLens) {
    let mut seen: FxHashSet<ProfileRule> = FxHashSet::default();
    let rules = std::mem::take(&mut program.startup_profile);
    for rule in rules {
        let rewritten = match rule {
            ProfileRule::Class(name) => ProfileRule::Class(lens.rewrite_type(&name)),
            ProfileRule::Method(method) => ProfileRule::Method(lens.rewrite_method(&method).method),
        };
        if seen.insert(rewritten.clone()) {
            program.startup_profile.push(rewritten);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lens::LensBuilder,
        program::{DataResource, TypeRef},
    };

    fn lens() -> RewriteLens {
        let mut builder = LensBuilder::new();
        builder
            .map_type(TypeName::new("a.B"), TypeName::new("a.A"))
            .unwrap();
        builder.freeze()
    }

    #[test]
    fn test_resource_contents_and_names() {
        let mut program = Program::new();
        program.resources.push(DataResource {
            name: "META-INF/services/a.B".to_string(),
            contents: "a.B\na.BB # uses a/B\n".to_string(),
            adapt_contents: true,
        });
        program.resources.push(DataResource {
            name: "raw.txt".to_string(),
            contents: "a.B".to_string(),
            adapt_contents: false,
        });

        rewrite_resources(&mut program, &lens());
        assert_eq!(program.resources[0].name, "META-INF/services/a.A");
        assert_eq!(program.resources[0].contents, "a.A\na.BB # uses a/A\n");
        assert_eq!(program.resources[1].contents, "a.B");
    }

    #[test]
    fn test_startup_profile_deduplicates() {
        let mut program = Program::new();
        program.startup_profile = vec![
            ProfileRule::Class(TypeName::new("a.A")),
            ProfileRule::Class(TypeName::new("a.B")),
            ProfileRule::Class(TypeName::new("a.C")),
        ];
        rewrite_startup_profile(&mut program, &lens());
        assert_eq!(
            program.startup_profile,
            vec![
                ProfileRule::Class(TypeName::new("a.A")),
                ProfileRule::Class(TypeName::new("a.C")),
            ]
        );
    }

    #[test]
    fn test_annotation_values() {
        let annotation = Annotation {
            ty: TypeName::new("a.Ann"),
            elements: vec![(
                "value".into(),
                AnnotationValue::Array(vec![AnnotationValue::Type(
                    TypeRef::class("a.B"),
                )]),
            )],
        };
        let rewritten = rewrite_annotation(&annotation, &lens());
        assert_eq!(
            rewritten.elements[0].1,
            AnnotationValue::Array(vec![AnnotationValue::Type(
                TypeRef::class("a.A")
            )])
        );
    }
}
