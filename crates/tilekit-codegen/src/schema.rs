use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::GenerateError;

/// Build-pipeline output consumed by the generator: every component in the
/// bundle plus the shared import-resolution map.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub components: Vec<ComponentSchema>,
    /// Bare module specifier → resolved URL. Kept sorted for deterministic
    /// generated output.
    #[serde(default)]
    pub import_map: BTreeMap<String, String>,
}

impl Manifest {
    pub fn from_json(json: &str) -> Result<Self, GenerateError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentSchema {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Script entry path, relative to the bundle root.
    pub entry: String,
    #[serde(default)]
    pub styles: Vec<String>,
    /// Additional bundled assets to precache (images, fonts, …).
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub props: Vec<PropDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: PropType,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// Recursive property-type description.
///
/// `syntax` carries the source-language type text for diagnostics and doc
/// comments. An unrecognized `kind` tag fails deserialization, which the
/// generator surfaces as a hard [`GenerateError`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropType {
    Primitive {
        syntax: String,
    },
    Object {
        syntax: String,
        properties: Vec<PropDefinition>,
    },
    Function {
        syntax: String,
        #[serde(default)]
        parameters: Vec<PropDefinition>,
    },
    Union {
        syntax: String,
        types: Vec<PropType>,
    },
    Constant {
        syntax: String,
        value: serde_json::Value,
    },
    Array {
        syntax: String,
        element_type: Box<PropType>,
    },
    Tuple {
        syntax: String,
        types: Vec<PropType>,
    },
}

impl PropType {
    pub fn syntax(&self) -> &str {
        match self {
            PropType::Primitive { syntax }
            | PropType::Object { syntax, .. }
            | PropType::Function { syntax, .. }
            | PropType::Union { syntax, .. }
            | PropType::Constant { syntax, .. }
            | PropType::Array { syntax, .. }
            | PropType::Tuple { syntax, .. } => syntax,
        }
    }
}
