//! Rust source emission.
//!
//! The generator is a pure function from a [`Manifest`] to Rust source
//! text. Nested `object` property types expand into generated record
//! types held in an arena indexed by the stable path from the component
//! root (`Counter.callbacks` → `CounterCallbacks`), so repeated nested
//! names across components never collide and no shared namespace is
//! mutated during generation.
//!
//! Generated code targets `tilekit-codec` and `tilekit-session` plus
//! `serde`/`serde_json`; the host application adds those as dependencies
//! and includes the emitted file as a module.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::classify::{Classification, classify, normalize};
use crate::error::GenerateError;
use crate::schema::{ComponentSchema, Manifest, PropDefinition, PropType};

/// A generated record type: either a component root or a nested object
/// expanded from a property path.
#[derive(Debug, Clone)]
struct RecordDescriptor {
    /// Stable path from the component root, e.g. `Counter.callbacks`.
    path: String,
    rust_name: String,
    props: Vec<PropDefinition>,
    hybrid: bool,
}

/// How a mapped property participates in construction and encoding.
#[derive(Debug, Clone)]
enum FieldKind {
    /// Directly serde-serializable.
    Plain,
    /// A nested generated record.
    Record { name: String, hybrid: bool },
    /// A host callable with a typed wrapper.
    Function(FunctionSig),
}

#[derive(Debug, Clone)]
struct FunctionSig {
    is_async: bool,
    params: Vec<String>,
    /// `None` for void returns.
    ret: Option<String>,
}

#[derive(Debug, Clone)]
struct MappedProp {
    field: String,
    json_key: String,
    rust_type: String,
    kind: FieldKind,
    optional: bool,
    description: Option<String>,
}

/// Generate the full bindings file for a manifest.
pub fn generate(manifest: &Manifest) -> Result<String, GenerateError> {
    let mut out = String::new();
    out.push_str("// Generated by tilekit-gen. Do not edit manually.\n");
    out.push_str("#![allow(unused_imports)]\n\n");
    out.push_str("use std::future::Future;\n");
    out.push_str("use std::pin::Pin;\n");
    out.push_str("use std::sync::Arc;\n\n");
    out.push_str("use tilekit_codec::{EncodeError, EncodingContext};\n");
    out.push_str("use tilekit_session::{ComponentBinding, ComponentDescriptor, PrecacheAsset};\n");

    for component in &manifest.components {
        out.push('\n');
        out.push_str(&generate_component(component, &manifest.import_map)?);
    }
    tracing::info!(
        components = manifest.components.len(),
        "Generated bindings"
    );
    Ok(out)
}

/// Generate one component: nested records first, then the root record with
/// its descriptor and binding constructor.
pub fn generate_component(
    component: &ComponentSchema,
    import_map: &BTreeMap<String, String>,
) -> Result<String, GenerateError> {
    let root_name = pascal_ident(&component.name);
    let mut records = Vec::new();
    collect_records(&root_name, &component.props, &mut records);

    let mut out = String::new();
    // Children precede the root so each record's dependencies are already
    // on the page, matching the reading order of the schema.
    for record in records.iter().rev() {
        let is_root = record.path == root_name;
        if is_root {
            continue;
        }
        out.push_str(&emit_record(record, None, import_map)?);
        out.push('\n');
    }
    let root = records
        .first()
        .expect("collect_records always yields the root");
    out.push_str(&emit_record(root, Some(component), import_map)?);
    Ok(out)
}

/// Depth-first expansion of object-typed properties into the arena.
/// The root record is always element 0; nested records follow.
fn collect_records(path: &str, props: &[PropDefinition], records: &mut Vec<RecordDescriptor>) {
    records.push(RecordDescriptor {
        path: path.to_owned(),
        rust_name: record_name_for_path(path),
        props: props.to_vec(),
        hybrid: classify(props) == Classification::Hybrid,
    });
    for prop in props {
        let (ty, _) = normalize(&prop.ty, prop.optional);
        if let PropType::Object { properties, .. } = &ty {
            let child_path = format!("{path}.{}", prop.name);
            collect_records(&child_path, properties, records);
        }
    }
}

fn record_name_for_path(path: &str) -> String {
    path.split('.').map(pascal_ident).collect()
}

fn emit_record(
    record: &RecordDescriptor,
    root: Option<&ComponentSchema>,
    import_map: &BTreeMap<String, String>,
) -> Result<String, GenerateError> {
    let mapped: Vec<MappedProp> = record
        .props
        .iter()
        .map(|prop| map_prop(&record.path, prop))
        .collect::<Result<_, _>>()?;

    let name = &record.rust_name;
    let mut out = String::new();

    if let Some(component) = root
        && let Some(description) = &component.description
    {
        for line in description.lines() {
            writeln!(out, "/// {line}").unwrap();
        }
    }
    if record.hybrid {
        writeln!(out, "#[derive(Clone)]").unwrap();
    } else {
        writeln!(out, "#[derive(Debug, Clone, serde::Serialize)]").unwrap();
    }
    writeln!(out, "pub struct {name} {{").unwrap();
    for prop in &mapped {
        if let Some(description) = &prop.description {
            writeln!(out, "    /// {description}").unwrap();
        }
        if !record.hybrid {
            if prop.json_key != raw_stripped(&prop.field) {
                writeln!(out, "    #[serde(rename = \"{}\")]", prop.json_key).unwrap();
            }
            if prop.optional {
                writeln!(out, "    #[serde(skip_serializing_if = \"Option::is_none\")]").unwrap();
            }
        }
        writeln!(out, "    pub {}: {},", prop.field, prop.rust_type).unwrap();
    }
    writeln!(out, "}}\n").unwrap();

    writeln!(out, "impl {name} {{").unwrap();
    emit_constructor(&mut out, &mapped);
    if record.hybrid {
        out.push('\n');
        emit_encode_props(&mut out, &mapped);
    }
    if let Some(component) = root {
        out.push('\n');
        emit_descriptor(&mut out, component, import_map);
        out.push('\n');
        emit_into_binding(&mut out, record.hybrid);
    }
    writeln!(out, "}}").unwrap();
    Ok(out)
}

fn emit_constructor(out: &mut String, mapped: &[MappedProp]) {
    write!(out, "    pub fn new(").unwrap();
    for (i, prop) in mapped.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write!(out, "{}: {}", prop.field, prop.rust_type).unwrap();
    }
    writeln!(out, ") -> Self {{").unwrap();
    write!(out, "        Self {{ ").unwrap();
    for (i, prop) in mapped.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&prop.field);
    }
    writeln!(out, " }}").unwrap();
    writeln!(out, "    }}").unwrap();
}

/// The hybrid encode routine: emits the object literal property by
/// property, registering function props through the encoding context.
fn emit_encode_props(out: &mut String, mapped: &[MappedProp]) {
    writeln!(
        out,
        "    pub fn encode_props(&self, ctx: &dyn EncodingContext) -> Result<String, EncodeError> {{"
    )
    .unwrap();
    writeln!(out, "        let mut out = String::from(\"{{\");").unwrap();
    for (i, prop) in mapped.iter().enumerate() {
        if i > 0 {
            writeln!(out, "        out.push(',');").unwrap();
        }
        writeln!(out, "        out.push_str(\"\\\"{}\\\":\");", prop.json_key).unwrap();
        match &prop.kind {
            FieldKind::Plain => {
                writeln!(
                    out,
                    "        out.push_str(&serde_json::to_string(&self.{})?);",
                    prop.field
                )
                .unwrap();
            }
            FieldKind::Record { hybrid, .. } => {
                let encode_one = |access: &str| {
                    if *hybrid {
                        format!("{access}.encode_props(ctx)?")
                    } else {
                        format!("serde_json::to_string({access})?")
                    }
                };
                if prop.optional {
                    writeln!(out, "        match &self.{} {{", prop.field).unwrap();
                    writeln!(
                        out,
                        "            Some(value) => out.push_str(&{}),",
                        encode_one("value")
                    )
                    .unwrap();
                    writeln!(out, "            None => out.push_str(\"null\"),").unwrap();
                    writeln!(out, "        }}").unwrap();
                } else {
                    writeln!(
                        out,
                        "        out.push_str(&{});",
                        encode_one(&format!("(&self.{})", prop.field))
                    )
                    .unwrap();
                }
            }
            FieldKind::Function(sig) => {
                if prop.optional {
                    writeln!(out, "        match &self.{} {{", prop.field).unwrap();
                    writeln!(out, "            Some(callback) => {{").unwrap();
                    writeln!(out, "                let callback = callback.clone();").unwrap();
                    emit_registration(out, sig, "                ");
                    writeln!(out, "            }}").unwrap();
                    // Absent marker, never a dangling registration.
                    writeln!(out, "            None => out.push_str(\"undefined\"),").unwrap();
                    writeln!(out, "        }}").unwrap();
                } else {
                    writeln!(out, "        {{").unwrap();
                    writeln!(
                        out,
                        "            let callback = self.{}.clone();",
                        prop.field
                    )
                    .unwrap();
                    emit_registration(out, sig, "            ");
                    writeln!(out, "        }}").unwrap();
                }
            }
        }
    }
    writeln!(out, "        out.push('}}');").unwrap();
    writeln!(out, "        Ok(out)").unwrap();
    writeln!(out, "    }}").unwrap();
}

/// One `register_blocking`/`register_non_blocking` call with a typed
/// wrapper that decodes the JSON argument array and encodes the result.
fn emit_registration(out: &mut String, sig: &FunctionSig, indent: &str) {
    let args_pattern = if sig.params.is_empty() {
        String::new()
    } else {
        let names: Vec<String> = (0..sig.params.len()).map(|i| format!("arg{i}")).collect();
        let types = sig.params.join(", ");
        format!(
            "let ({},): ({},) = serde_json::from_str({})?;\n",
            names.join(", "),
            types,
            if sig.is_async { "&args" } else { "args" }
        )
    };
    let call_args = (0..sig.params.len())
        .map(|i| format!("arg{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    if sig.is_async {
        writeln!(
            out,
            "{indent}out.push_str(&ctx.register_non_blocking(Arc::new(move |args: String| {{"
        )
        .unwrap();
        writeln!(out, "{indent}    let callback = callback.clone();").unwrap();
        writeln!(out, "{indent}    Box::pin(async move {{").unwrap();
        if !args_pattern.is_empty() {
            writeln!(out, "{indent}        {}", args_pattern.trim_end()).unwrap();
        }
        match &sig.ret {
            Some(_) => {
                writeln!(out, "{indent}        let result = callback({call_args}).await;").unwrap();
                writeln!(
                    out,
                    "{indent}        Ok(Some(serde_json::to_string(&result)?))"
                )
                .unwrap();
            }
            None => {
                writeln!(out, "{indent}        callback({call_args}).await;").unwrap();
                writeln!(out, "{indent}        Ok(None)").unwrap();
            }
        }
        writeln!(out, "{indent}    }})").unwrap();
        writeln!(out, "{indent}}})));").unwrap();
    } else {
        let args_ident = if sig.params.is_empty() { "_args" } else { "args" };
        writeln!(
            out,
            "{indent}out.push_str(&ctx.register_blocking(Arc::new(move |{args_ident}: &str| {{"
        )
        .unwrap();
        if !args_pattern.is_empty() {
            writeln!(out, "{indent}    {}", args_pattern.trim_end()).unwrap();
        }
        match &sig.ret {
            Some(_) => {
                writeln!(out, "{indent}    let result = callback({call_args});").unwrap();
                writeln!(out, "{indent}    Ok(Some(serde_json::to_string(&result)?))").unwrap();
            }
            None => {
                writeln!(out, "{indent}    callback({call_args});").unwrap();
                writeln!(out, "{indent}    Ok(None)").unwrap();
            }
        }
        writeln!(out, "{indent}}})));").unwrap();
    }
}

fn emit_descriptor(
    out: &mut String,
    component: &ComponentSchema,
    import_map: &BTreeMap<String, String>,
) {
    writeln!(out, "    pub fn descriptor() -> ComponentDescriptor {{").unwrap();
    writeln!(out, "        ComponentDescriptor {{").unwrap();
    writeln!(out, "            entry: \"{}\".into(),", component.entry).unwrap();
    writeln!(out, "            styles: vec![").unwrap();
    for style in &component.styles {
        writeln!(out, "                \"{style}\".into(),").unwrap();
    }
    writeln!(out, "            ],").unwrap();
    writeln!(out, "            import_map: vec![").unwrap();
    for (key, value) in import_map {
        writeln!(out, "                (\"{key}\".into(), \"{value}\".into()),").unwrap();
    }
    writeln!(out, "            ],").unwrap();
    writeln!(out, "            precache: vec![").unwrap();
    for (path, content_type) in precache_assets(component) {
        writeln!(out, "                PrecacheAsset {{").unwrap();
        writeln!(out, "                    path: \"{path}\".into(),").unwrap();
        writeln!(
            out,
            "                    content_type: \"{content_type}\".into(),"
        )
        .unwrap();
        writeln!(out, "                }},").unwrap();
    }
    writeln!(out, "            ],").unwrap();
    writeln!(out, "        }}").unwrap();
    writeln!(out, "    }}").unwrap();
}

fn emit_into_binding(out: &mut String, hybrid: bool) {
    writeln!(out, "    pub fn into_binding(self) -> ComponentBinding {{").unwrap();
    if hybrid {
        writeln!(
            out,
            "        ComponentBinding::new(Self::descriptor(), move |ctx| self.encode_props(ctx))"
        )
        .unwrap();
    } else {
        writeln!(
            out,
            "        ComponentBinding::new(Self::descriptor(), move |_ctx| {{"
        )
        .unwrap();
        writeln!(out, "            Ok(serde_json::to_string(&self)?)").unwrap();
        writeln!(out, "        }})").unwrap();
    }
    writeln!(out, "    }}").unwrap();
}

/// Bundle-relative precache list: entry and styles with fixed content
/// types, extra assets by extension.
fn precache_assets(component: &ComponentSchema) -> Vec<(String, String)> {
    let mut assets = Vec::new();
    assets.push((
        strip_dot_slash(&component.entry),
        "application/javascript".to_owned(),
    ));
    for style in &component.styles {
        assets.push((strip_dot_slash(style), "text/css".to_owned()));
    }
    for asset in &component.assets {
        assets.push((strip_dot_slash(asset), content_type_for(asset).to_owned()));
    }
    assets
}

fn strip_dot_slash(path: &str) -> String {
    path.strip_prefix("./").unwrap_or(path).to_owned()
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("js" | "mjs") => "application/javascript",
        Some("css") => "text/css",
        Some("json" | "map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

fn map_prop(path: &str, prop: &PropDefinition) -> Result<MappedProp, GenerateError> {
    let prop_path = format!("{path}.{}", prop.name);
    let (ty, optional) = normalize(&prop.ty, prop.optional);

    let (rust_type, kind, description) = match &ty {
        PropType::Object { properties, .. } => {
            let name = record_name_for_path(&prop_path);
            let hybrid = classify(properties) == Classification::Hybrid;
            (name.clone(), FieldKind::Record { name, hybrid }, None)
        }
        PropType::Function {
            syntax, parameters, ..
        } => {
            let sig = function_signature(&prop_path, syntax, parameters)?;
            (function_type(&sig), FieldKind::Function(sig), None)
        }
        other => {
            let rust = map_plain_type(&prop_path, other)?;
            let doc = match other {
                PropType::Union { syntax, .. } | PropType::Constant { syntax, .. } => {
                    Some(format!("Source type: `{syntax}`"))
                }
                _ => None,
            };
            (rust, FieldKind::Plain, doc)
        }
    };

    let rust_type = if optional {
        format!("Option<{rust_type}>")
    } else {
        rust_type
    };

    Ok(MappedProp {
        field: sanitize_ident(&prop.name),
        json_key: prop.name.clone(),
        rust_type,
        kind,
        optional,
        description: prop.description.clone().or(description),
    })
}

/// Rust types for positions that must be serde-serializable: parameters,
/// array elements, tuple members, and plain fields. A function type here
/// cannot be registered by generated code and fails generation.
fn map_plain_type(path: &str, ty: &PropType) -> Result<String, GenerateError> {
    match ty {
        PropType::Primitive { syntax } => Ok(map_primitive(syntax).to_owned()),
        PropType::Array { element_type, .. } => {
            let elem = match element_type.as_ref() {
                PropType::Object { .. } => "serde_json::Value".to_owned(),
                other => map_plain_type(path, other)?,
            };
            Ok(format!("Vec<{elem}>"))
        }
        PropType::Tuple { types, .. } => {
            let members = types
                .iter()
                .map(|member| match member {
                    PropType::Object { .. } => Ok("serde_json::Value".to_owned()),
                    other => map_plain_type(path, other),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("({})", members.join(", ")))
        }
        PropType::Union { .. } => {
            let (normalized, optional) = normalize(ty, false);
            if optional {
                let inner = map_plain_type(path, &normalized)?;
                Ok(format!("Option<{inner}>"))
            } else {
                Ok("serde_json::Value".to_owned())
            }
        }
        PropType::Constant { .. } => Ok("serde_json::Value".to_owned()),
        PropType::Object { .. } => Ok("serde_json::Value".to_owned()),
        PropType::Function { .. } => Err(GenerateError::unsupported(
            path,
            "function types are only supported as (possibly nested) component properties",
        )),
    }
}

fn map_primitive(syntax: &str) -> &'static str {
    match syntax.trim() {
        "string" => "String",
        "number" => "f64",
        "boolean" => "bool",
        _ => "serde_json::Value",
    }
}

fn function_signature(
    path: &str,
    syntax: &str,
    parameters: &[PropDefinition],
) -> Result<FunctionSig, GenerateError> {
    let params = parameters
        .iter()
        .map(|param| {
            let (ty, optional) = normalize(&param.ty, param.optional);
            let rust = map_plain_type(&format!("{path}.{}", param.name), &ty)?;
            Ok(if optional {
                format!("Option<{rust}>")
            } else {
                rust
            })
        })
        .collect::<Result<Vec<_>, GenerateError>>()?;

    let (is_async, ret) = parse_return_type(syntax);
    Ok(FunctionSig {
        is_async,
        params,
        ret,
    })
}

fn function_type(sig: &FunctionSig) -> String {
    let params = sig.params.join(", ");
    if sig.is_async {
        let output = sig.ret.as_deref().unwrap_or("()");
        format!(
            "Arc<dyn Fn({params}) -> Pin<Box<dyn Future<Output = {output}> + Send>> + Send + Sync>"
        )
    } else {
        match &sig.ret {
            Some(ret) => format!("Arc<dyn Fn({params}) -> {ret} + Send + Sync>"),
            None => format!("Arc<dyn Fn({params}) + Send + Sync>"),
        }
    }
}

/// Read the declared return type out of the function's source syntax.
/// `Promise<…>` marks the callable asynchronous and routes it through
/// non-blocking registration.
fn parse_return_type(syntax: &str) -> (bool, Option<String>) {
    let inner = strip_wrapping_parens(syntax.trim());
    let Some((_, ret)) = inner.split_once("=>") else {
        return (false, None);
    };
    let ret = ret.trim();
    if let Some(promised) = ret
        .strip_prefix("Promise<")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        (true, map_return(promised.trim()))
    } else {
        (false, map_return(ret))
    }
}

fn map_return(syntax: &str) -> Option<String> {
    match syntax {
        "" | "void" | "undefined" | "null" => None,
        other => Some(map_primitive(other).to_owned()),
    }
}

/// Strip parentheses only when they wrap the entire expression.
fn strip_wrapping_parens(s: &str) -> &str {
    let mut current = s;
    loop {
        let bytes = current.as_bytes();
        if bytes.first() != Some(&b'(') || bytes.last() != Some(&b')') {
            return current;
        }
        let mut depth = 0usize;
        for (i, b) in bytes.iter().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 && i != bytes.len() - 1 {
                        return current;
                    }
                }
                _ => {}
            }
        }
        current = &current[1..current.len() - 1];
    }
}

fn ident_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_]").expect("ident pattern is valid"))
}

/// Map a schema name to a valid Rust identifier: invalid characters become
/// underscores, keywords get a raw prefix.
pub fn sanitize_ident(name: &str) -> String {
    let mut sanitized = ident_pattern().replace_all(name, "_").into_owned();
    if sanitized
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
    {
        sanitized.insert(0, '_');
    }
    if is_keyword(&sanitized) {
        format!("r#{sanitized}")
    } else if matches!(sanitized.as_str(), "self" | "Self" | "super" | "crate") {
        // Not raw-escapable; suffix instead.
        format!("{sanitized}_")
    } else {
        sanitized
    }
}

fn raw_stripped(ident: &str) -> &str {
    ident.strip_prefix("r#").unwrap_or(ident)
}

fn pascal_ident(name: &str) -> String {
    let mut pascal: String = sanitize_ident(name)
        .trim_start_matches("r#")
        .split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if pascal.chars().next().is_none_or(|c| c.is_ascii_digit()) {
        pascal.insert(0, '_');
    }
    pascal
}

fn is_keyword(ident: &str) -> bool {
    matches!(
        ident,
        "as" | "break" | "const" | "continue" | "else" | "enum" | "extern" | "false" | "fn"
            | "for" | "if" | "impl" | "in" | "let" | "loop" | "match" | "mod" | "move" | "mut"
            | "pub" | "ref" | "return" | "static" | "struct" | "trait" | "true" | "type"
            | "unsafe" | "use" | "where" | "while" | "async" | "await" | "dyn" | "abstract"
            | "become" | "box" | "do" | "final" | "macro" | "override" | "priv" | "typeof"
            | "unsized" | "virtual" | "yield" | "try"
    )
}
