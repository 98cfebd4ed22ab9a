//! Naming utilities: case folding, prefix trimming, keyword escaping.
//!
//! Everything here is a pure function of its input and the configured
//! [`NamingRules`].

use serde::Deserialize;

/// Naming conventions of the wrapped C library.
///
/// The defaults describe libclang's `clang-c` headers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NamingRules {
    /// Prefixes stripped (in order, each at most once) from C spellings.
    pub language_prefixes: Vec<String>,
    /// Names that keep their language prefix because trimming would collide.
    pub language_prefix_exceptions: Vec<String>,
    /// Typedef name of the library's opaque string handle.
    pub string_handle: String,
    /// Typedef name of the platform time type.
    pub time_type: String,
    /// C-name prefixes that mark a creation-style function.
    pub factory_prefixes: Vec<String>,
    /// C-name suffixes that mark a creation-style function.
    pub factory_suffixes: Vec<String>,
    /// Type-name suffixes dropped when trimming method names (`CursorKind` → `Cursor`).
    pub generic_suffixes: Vec<String>,
}

impl Default for NamingRules {
    fn default() -> Self {
        Self {
            language_prefixes: strings(&["CX_CXX", "CXX", "CX", "ObjC"]),
            language_prefix_exceptions: strings(&["CXXManglings", "ObjCManglings"]),
            string_handle: "CXString".to_string(),
            time_type: "time_t".to_string(),
            factory_prefixes: strings(&["clang_create", "clang_get"]),
            factory_suffixes: strings(&["_create"]),
            generic_suffixes: strings(&["Kind"]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl NamingRules {
    /// Strip the language prefixes from `name`, then a single leading `_`.
    pub fn trim_language_prefix(&self, name: &str) -> String {
        let mut name = name;
        for prefix in &self.language_prefixes {
            name = name.strip_prefix(prefix.as_str()).unwrap_or(name);
        }
        name.strip_prefix('_').unwrap_or(name).to_string()
    }

    /// Strip accessor verbs (`create`, `get`, `Get`) and the language prefix.
    pub fn trim_common_function_name_prefix(&self, name: &str) -> String {
        let mut name = name.strip_prefix("create").unwrap_or(name);
        name = name.strip_prefix("get").unwrap_or(name);
        if name.len() > 4 && name.chars().nth(3).is_some_and(char::is_uppercase) {
            name = name.strip_prefix("Get").unwrap_or(name);
        }
        if self.language_prefix_exceptions.iter().any(|e| e == name) {
            return name.to_string();
        }
        self.trim_language_prefix(name)
    }

    /// Trim the owning type's name (and its generic-suffix-stripped form)
    /// from a method name. An empty result means the method is a
    /// constructor and takes the type's name.
    pub fn trim_common_function_name(&self, name: &str, type_name: &str) -> String {
        let mut name = self.trim_common_function_name_prefix(name);
        name = trim_type_name(&name, type_name);

        for suffix in &self.generic_suffixes {
            if let Some(stem) = type_name.strip_suffix(suffix.as_str()) {
                name = trim_type_name(&name, stem);
                break;
            }
        }

        let name = self.trim_common_function_name_prefix(&name);
        if name.is_empty() {
            type_name.to_string()
        } else {
            name
        }
    }

    /// Whether a C function name reads like a constructor (`clang_createIndex`,
    /// `clang_getNullCursor`, `foo_create`).
    pub fn is_factory_name(&self, c_name: &str) -> bool {
        self.factory_prefixes
            .iter()
            .any(|p| c_name.starts_with(p.as_str()))
            || self
                .factory_suffixes
                .iter()
                .any(|s| c_name.ends_with(s.as_str()))
    }

    /// Strip the first generic suffix `type_name` ends with, or `None`.
    pub fn strip_generic_suffix<'a>(&self, type_name: &'a str) -> Option<&'a str> {
        self.generic_suffixes
            .iter()
            .find_map(|s| type_name.strip_suffix(s.as_str()))
    }
}

fn trim_type_name(name: &str, type_name: &str) -> String {
    if type_name.is_empty() {
        return name.to_string();
    }
    if let Some(rest) = name.strip_prefix(&format!("{type_name}_")) {
        return rest.to_string();
    }
    name.strip_prefix(type_name).unwrap_or(name).to_string()
}

pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Receiver-style short name of a type: its capitals, lower-cased
/// (`TranslationUnit` → `tu`).
pub fn common_receiver_name(type_name: &str) -> String {
    type_name
        .chars()
        .filter(|c| c.is_uppercase())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Target-side parameter name for a C parameter name: `_`-separated words
/// joined in camel case, keywords escaped.
pub fn parameter_name(c_name: &str) -> String {
    let joined: String = c_name.split('_').map(upper_first).collect();
    escape_keyword(&lower_first(&joined))
}

/// The array name a length field/parameter counts, if its name follows
/// the `num_X` / `numX` / `NumX` / `X_size` conventions.
pub fn array_name_from_length(length_name: &str) -> Option<&str> {
    if let Some(rest) = length_name.strip_prefix("num_") {
        return Some(rest);
    }
    if let Some(rest) = length_name.strip_prefix("num") {
        return Some(rest);
    }
    match length_name.strip_prefix("Num") {
        Some(rest) if rest.chars().next().is_some_and(char::is_uppercase) => Some(rest),
        _ => length_name.strip_suffix("_size"),
    }
}

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait",
    "true", "type", "unsafe", "use", "where", "while", "yield",
];

/// Append `_` to identifiers that collide with a Rust keyword.
pub fn escape_keyword(name: &str) -> String {
    if RUST_KEYWORDS.contains(&name) {
        format!("{name}_")
    } else {
        name.to_string()
    }
}

/// `CursorKind` → `cursor_kind`, `CXXManglings` → `cxx_manglings`,
/// `sourceFilename` → `source_filename`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p == '_' => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
