// src/models.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- ARGUMENT DECLARATIONS ---
// These are read from the `[[args]]` array of a command definition file and never
// mutated afterwards.

/// The semantic type of a declared argument.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    #[default]
    String,
    Number,
    Boolean,
}

impl ArgType {
    /// The lowercase name used in definition files and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// One named argument accepted by a command.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ArgumentDeclaration {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ArgType,
    #[serde(default)]
    pub description: String,
    /// Single-character short flag, e.g. `p` for `-p`.
    pub alias: Option<String>,
    #[serde(default)]
    pub positional: bool,
    pub default: Option<Value>,
    /// Explicit environment variable; overrides the auto-derived name.
    pub env: Option<String>,
    /// Explicit dotted configuration key; overrides the auto-derived path.
    pub config: Option<String>,
    /// Repeatable: every supplied value is kept and the argument resolves to a list.
    #[serde(default)]
    pub multiple: bool,

    // Constraints, checked after coercion.
    #[serde(default)]
    pub optional: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(default)]
    pub integer: bool,
    pub choices: Option<Vec<String>>,
}

impl ArgumentDeclaration {
    /// Creates a declaration with the given name and type and no metadata.
    pub fn new(name: impl Into<String>, kind: ArgType) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == ArgType::Boolean
    }
}

// --- COMMAND DEFINITION FILES ---

/// The deserialized content of a command definition file (`serve.toml`, `index.toml`, ...).
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct CommandDefinition {
    pub description: Option<String>,
    /// Key of the registered handler. Defaults to the file's path relative to the
    /// commands root, without extension (`remote/[name]/push`).
    pub handler: Option<String>,
    #[serde(default)]
    pub args: Vec<ArgumentDeclaration>,
}

// --- PLUGIN DESCRIPTORS ---

/// The deserialized content of a file under `_plugins/`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct PluginDescriptor {
    /// Name of the registered setup function. Required.
    pub setup: Option<String>,
    /// Free-form options handed to the setup function.
    pub options: Option<Value>,
}
