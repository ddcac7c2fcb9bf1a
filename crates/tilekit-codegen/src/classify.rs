use crate::schema::{PropDefinition, PropType};

/// Whether a component can use the default structural encoder or needs the
/// hybrid encoder with callable registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    PlainData,
    Hybrid,
}

/// Classify a property list: plain-data only if no `function` type occurs
/// at any nesting depth.
pub fn classify(props: &[PropDefinition]) -> Classification {
    if props.iter().all(|p| type_is_plain(&p.ty)) {
        Classification::PlainData
    } else {
        Classification::Hybrid
    }
}

fn type_is_plain(ty: &PropType) -> bool {
    match ty {
        PropType::Function { .. } => false,
        PropType::Primitive { .. } | PropType::Constant { .. } => true,
        PropType::Object { properties, .. } => properties.iter().all(|p| type_is_plain(&p.ty)),
        PropType::Array { element_type, .. } => type_is_plain(element_type),
        PropType::Union { types, .. } | PropType::Tuple { types, .. } => {
            types.iter().all(type_is_plain)
        }
    }
}

/// Collapse a union with an explicit absent alternative into an optional
/// version of the remainder.
///
/// A singleton remainder becomes a plain optional; a multi-member one
/// stays a union of the rest, still optional. This is normalization only —
/// no runtime behavior attaches to it. Non-union types pass through
/// unchanged.
pub fn normalize(ty: &PropType, optional: bool) -> (PropType, bool) {
    let PropType::Union { types, .. } = ty else {
        return (ty.clone(), optional);
    };
    let remainder: Vec<PropType> = types
        .iter()
        .filter(|member| !is_absent(member))
        .cloned()
        .collect();
    if remainder.len() == types.len() {
        return (ty.clone(), optional);
    }
    match remainder.len() {
        0 => (
            PropType::Primitive {
                syntax: "undefined".into(),
            },
            true,
        ),
        1 => normalize(&remainder[0], true),
        _ => {
            let syntax = remainder
                .iter()
                .map(|t| t.syntax().to_owned())
                .collect::<Vec<_>>()
                .join(" | ");
            (
                PropType::Union {
                    syntax,
                    types: remainder,
                },
                true,
            )
        }
    }
}

fn is_absent(ty: &PropType) -> bool {
    matches!(ty, PropType::Primitive { syntax } if syntax == "undefined")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitive(syntax: &str) -> PropType {
        PropType::Primitive {
            syntax: syntax.into(),
        }
    }

    fn prop(name: &str, ty: PropType) -> PropDefinition {
        PropDefinition {
            name: name.into(),
            ty,
            optional: false,
            description: None,
        }
    }

    #[test]
    fn purely_primitive_fields_are_plain_data() {
        let props = vec![prop("name", primitive("string")), prop("age", primitive("number"))];
        assert_eq!(classify(&props), Classification::PlainData);
    }

    #[test]
    fn a_function_field_forces_hybrid() {
        let props = vec![
            prop("count", primitive("number")),
            prop(
                "increment",
                PropType::Function {
                    syntax: "() => void".into(),
                    parameters: vec![],
                },
            ),
        ];
        assert_eq!(classify(&props), Classification::Hybrid);
    }

    #[test]
    fn a_nested_function_forces_hybrid_at_any_depth() {
        let props = vec![prop(
            "callbacks",
            PropType::Object {
                syntax: "{ increment: () => void }".into(),
                properties: vec![prop(
                    "increment",
                    PropType::Function {
                        syntax: "() => void".into(),
                        parameters: vec![],
                    },
                )],
            },
        )];
        assert_eq!(classify(&props), Classification::Hybrid);
    }

    #[test]
    fn functions_inside_arrays_and_unions_also_force_hybrid() {
        let in_array = vec![prop(
            "handlers",
            PropType::Array {
                syntax: "(() => void)[]".into(),
                element_type: Box::new(PropType::Function {
                    syntax: "() => void".into(),
                    parameters: vec![],
                }),
            },
        )];
        assert_eq!(classify(&in_array), Classification::Hybrid);

        let in_union = vec![prop(
            "maybe",
            PropType::Union {
                syntax: "(() => void) | undefined".into(),
                types: vec![
                    PropType::Function {
                        syntax: "() => void".into(),
                        parameters: vec![],
                    },
                    primitive("undefined"),
                ],
            },
        )];
        assert_eq!(classify(&in_union), Classification::Hybrid);
    }

    #[test]
    fn nested_plain_objects_stay_plain() {
        let props = vec![prop(
            "address",
            PropType::Object {
                syntax: "{ street: string }".into(),
                properties: vec![prop("street", primitive("string"))],
            },
        )];
        assert_eq!(classify(&props), Classification::PlainData);
    }

    #[test]
    fn union_with_undefined_collapses_to_optional() {
        let ty = PropType::Union {
            syntax: "string | undefined".into(),
            types: vec![primitive("string"), primitive("undefined")],
        };
        let (normalized, optional) = normalize(&ty, false);
        assert!(optional);
        assert!(matches!(normalized, PropType::Primitive { ref syntax } if syntax == "string"));
    }

    #[test]
    fn multi_member_union_with_undefined_stays_a_union() {
        let ty = PropType::Union {
            syntax: "string | number | undefined".into(),
            types: vec![
                primitive("string"),
                primitive("number"),
                primitive("undefined"),
            ],
        };
        let (normalized, optional) = normalize(&ty, false);
        assert!(optional);
        match normalized {
            PropType::Union { types, syntax } => {
                assert_eq!(types.len(), 2);
                assert_eq!(syntax, "string | number");
            }
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn union_without_undefined_passes_through() {
        let ty = PropType::Union {
            syntax: "string | number".into(),
            types: vec![primitive("string"), primitive("number")],
        };
        let (normalized, optional) = normalize(&ty, false);
        assert!(!optional);
        assert!(matches!(normalized, PropType::Union { ref types, .. } if types.len() == 2));
    }
}
