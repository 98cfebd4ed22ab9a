//! Customization hooks.
//!
//! The generator calls a [`Hooks`] implementation at fixed points of the
//! pipeline: naming, filtering, post-typing preparation and final name
//! override for functions; preparation and getter filtering for structs.
//! [`ConfigHooks`] drives all of them from the `[rules]` table of the
//! configuration file.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::{BOOL_NAME, Function, FunctionParameter, STRING_HANDLE_NAME, Struct, StructMember};
use crate::registry::Registry;

pub trait Hooks {
    /// Name a function before classification trims it further.
    fn name_function(&self, f: &Function, _registry: &Registry) -> String {
        f.c_name.clone()
    }

    /// Adjust parameter flags once parameter types are resolved.
    fn prepare_function(&self, _f: &mut Function) {}

    /// `false` excludes the function from generation.
    fn filter_function(&self, _f: &Function) -> bool {
        true
    }

    /// `false` exempts the parameter from the eligibility check.
    fn filter_parameter(&self, _p: &FunctionParameter) -> bool {
        true
    }

    /// Final name, overriding everything classification decided.
    fn fixed_name(&self, _f: &Function) -> Option<String> {
        None
    }

    fn prepare_struct_members(&self, _s: &mut Struct) {}

    /// `false` suppresses the getter of a struct member.
    fn filter_member_getter(&self, _m: &StructMember) -> bool {
        true
    }
}

/// No customization at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl Hooks for DefaultHooks {}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct IgnoreRule {
    pub function: String,
    #[serde(default)]
    pub reason: String,
}

/// Trim `prefix` from names of functions whose first parameter is a `receiver`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverTrim {
    pub receiver: String,
    pub prefix: String,
}

/// Parameters of target type `type` at `pointer_level` are out-parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ReturnArgumentRule {
    #[serde(rename = "type")]
    pub type_name: String,
    pub pointer_level: u32,
}

/// Explicit array/length pairing, by C parameter name.
#[derive(Debug, Clone, Deserialize)]
pub struct SliceRule {
    pub function: String,
    pub array: String,
    pub length: Option<String>,
}

/// `[rules]`: the data-driven hook set. Defaults describe libclang.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Stripped from function names, each at most once, in order.
    pub strip_prefixes: Vec<String>,
    /// The first of these a function name starts with is stripped.
    pub trim_prefixes: Vec<String>,
    pub receiver_trims: Vec<ReceiverTrim>,
    /// C name → prepared name, replacing all prefix rules.
    pub renames: HashMap<String, String>,
    /// C name → final target name.
    pub fixed_names: HashMap<String, String>,
    pub ignore: Vec<IgnoreRule>,
    /// Functions declared in a file ending with one of these are skipped.
    pub ignore_files: Vec<String>,
    pub return_argument: Vec<ReturnArgumentRule>,
    pub slice: Vec<SliceRule>,
    /// Single-pointer parameters of these types are passed through as is.
    pub opaque_pointer_params: Vec<String>,
    /// Turn `int` members named `is...`/`has...` into booleans.
    pub bool_members: bool,
    pub skip_member_suffixes: Vec<String>,
}

impl Default for Rules {
    fn default() -> Self {
        let ignore = |function: &str, reason: &str| IgnoreRule {
            function: function.to_string(),
            reason: reason.to_string(),
        };
        let not_compiled = "not compiled into libclang";
        let not_automatic = "cannot be handled automatically";
        let manual = "manually implemented";
        let return_argument = |type_name: &str, pointer_level| ReturnArgumentRule {
            type_name: type_name.to_string(),
            pointer_level,
        };
        let receiver_trim = |receiver: &str, prefix: &str| ReceiverTrim {
            receiver: receiver.to_string(),
            prefix: prefix.to_string(),
        };

        Self {
            strip_prefixes: strings(&["clang_"]),
            trim_prefixes: strings(&["indexLoc_", "index_", "Location_", "Range_", "remap_"]),
            receiver_trims: vec![
                receiver_trim("CodeCompleteResults", "codeComplete"),
                receiver_trim("CompletionString", "getCompletion"),
                receiver_trim("SourceRange", "getRange"),
            ],
            renames: HashMap::from([(
                "clang_getNumCompletionChunks".to_string(),
                "NumChunks".to_string(),
            )]),
            fixed_names: HashMap::from([(
                "clang_getTranslationUnitCursor".to_string(),
                "TranslationUnitCursor".to_string(),
            )]),
            ignore: vec![
                ignore("clang_CompileCommand_getMappedSourceContent", not_compiled),
                ignore("clang_CompileCommand_getMappedSourcePath", not_compiled),
                ignore("clang_CompileCommand_getNumMappedSources", not_compiled),
                ignore("clang_executeOnThread", not_automatic),
                ignore("clang_getInclusions", not_automatic),
                ignore("clang_annotateTokens", manual),
                ignore("clang_getCursorPlatformAvailability", manual),
                ignore("clang_visitChildren", manual),
            ],
            ignore_files: strings(&["CXString.h"]),
            return_argument: vec![
                return_argument("File", 1),
                return_argument("FileUniqueID", 1),
                return_argument("IdxClientFile", 1),
                return_argument(STRING_HANDLE_NAME, 1),
                return_argument("i32", 1),
                return_argument("u32", 1),
                return_argument("CompilationDatabase_Error", 1),
                return_argument("PlatformAvailability", 1),
                return_argument("SourceRange", 1),
                return_argument("LoadDiag_Error", 1),
                return_argument("Token", 2),
                return_argument("Cursor", 2),
            ],
            slice: vec![
                SliceRule {
                    function: "clang_getRemappingsFromFileList".to_string(),
                    array: "filePaths".to_string(),
                    length: Some("numFiles".to_string()),
                },
                SliceRule {
                    function: "clang_disposeOverriddenCursors".to_string(),
                    array: "overridden".to_string(),
                    length: None,
                },
            ],
            opaque_pointer_params: strings(&[
                "UnsavedFile",
                "CodeCompleteResults",
                "CursorKind",
                "IdxContainerInfo",
                "IdxDeclInfo",
                "IndexerCallbacks",
                "TranslationUnit",
                "IdxEntityInfo",
                "IdxAttrInfo",
            ]),
            bool_members: true,
            skip_member_suffixes: strings(&["int_data"]),
        }
    }
}

impl Rules {
    /// Rules that change nothing.
    pub fn empty() -> Self {
        Self {
            strip_prefixes: Vec::new(),
            trim_prefixes: Vec::new(),
            receiver_trims: Vec::new(),
            renames: HashMap::new(),
            fixed_names: HashMap::new(),
            ignore: Vec::new(),
            ignore_files: Vec::new(),
            return_argument: Vec::new(),
            slice: Vec::new(),
            opaque_pointer_params: Vec::new(),
            bool_members: false,
            skip_member_suffixes: Vec::new(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// ConfigHooks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConfigHooks {
    rules: Rules,
}

impl ConfigHooks {
    pub fn new(rules: Rules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    fn apply_slice_rule(f: &mut Function, rule: &SliceRule) {
        let array = f
            .parameters
            .iter()
            .position(|p| p.c_name == rule.array);
        let length = rule
            .length
            .as_ref()
            .and_then(|l| f.parameters.iter().position(|p| &p.c_name == l));
        let Some(array) = array else {
            warn!(function = %f.c_name, array = %rule.array, "slice rule names an unknown parameter");
            return;
        };

        f.parameters[array].ty.is_slice = true;
        if let Some(length) = length {
            let array_name = f.parameters[array].name.clone();
            let length_name = f.parameters[length].name.clone();
            f.parameters[array].ty.length_of_slice = Some(length_name);
            f.parameters[length].ty.is_slice = false;
            f.parameters[length].ty.length_of_slice = Some(array_name);
        }
        debug!(function = %f.c_name, array = %rule.array, "applied slice rule");
    }
}

impl Hooks for ConfigHooks {
    fn name_function(&self, f: &Function, registry: &Registry) -> String {
        if let Some(name) = self.rules.renames.get(&f.c_name) {
            return name.clone();
        }

        let mut name = f.c_name.as_str();
        for prefix in &self.rules.strip_prefixes {
            name = name.strip_prefix(prefix.as_str()).unwrap_or(name);
        }
        if let Some(rest) = self
            .rules
            .trim_prefixes
            .iter()
            .find_map(|p| name.strip_prefix(p.as_str()))
        {
            name = rest;
        }

        if let Some(first) = f.parameters.first() {
            let receiver = &first.ty.target_name;
            if registry.is_enum_or_struct(receiver) {
                for trim in self.rules.receiver_trims.iter().filter(|t| &t.receiver == receiver) {
                    name = name.strip_prefix(trim.prefix.as_str()).unwrap_or(name);
                }
            }
        }
        name.to_string()
    }

    fn prepare_function(&self, f: &mut Function) {
        let rules: Vec<&SliceRule> = self
            .rules
            .slice
            .iter()
            .filter(|r| r.function == f.c_name)
            .collect();
        if !rules.is_empty() {
            for rule in rules {
                Self::apply_slice_rule(f, rule);
            }
            return;
        }

        for p in &mut f.parameters {
            let out = self
                .rules
                .return_argument
                .iter()
                .any(|r| r.type_name == p.ty.target_name && r.pointer_level == p.ty.pointer_level);
            if out {
                p.ty.is_return_argument = true;
            }
        }
    }

    fn filter_function(&self, f: &Function) -> bool {
        if let Some(rule) = self.rules.ignore.iter().find(|r| r.function == f.c_name) {
            warn!(function = %f.c_name, reason = %rule.reason, "ignoring function");
            return false;
        }
        let in_ignored_file = f.file.as_ref().is_some_and(|file| {
            let file = file.to_string_lossy();
            self.rules
                .ignore_files
                .iter()
                .any(|suffix| file.ends_with(suffix.as_str()))
        });
        !in_ignored_file
    }

    fn filter_parameter(&self, p: &FunctionParameter) -> bool {
        if p.ty.pointer_level != 1 {
            return true;
        }
        !(p.ty.is_narrow_string()
            || self
                .rules
                .opaque_pointer_params
                .contains(&p.ty.target_name))
    }

    fn fixed_name(&self, f: &Function) -> Option<String> {
        self.rules.fixed_names.get(&f.c_name).cloned()
    }

    fn prepare_struct_members(&self, s: &mut Struct) {
        if !self.rules.bool_members {
            return;
        }
        for m in &mut s.members {
            let flag = m.c_name.starts_with("has") || m.c_name.starts_with("is");
            if flag && m.ty.pointer_level == 0 && m.ty.target_name == "i32" {
                m.ty.target_name = BOOL_NAME.to_string();
            }
        }
    }

    fn filter_member_getter(&self, m: &StructMember) -> bool {
        !self
            .rules
            .skip_member_suffixes
            .iter()
            .any(|s| m.c_name.ends_with(s.as_str()))
    }
}
