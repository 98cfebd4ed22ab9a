//! Configuration types for `bnd-wrapgen.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::emit::EmitOptions;
use crate::hooks::Rules;
use crate::naming::NamingRules;

/// Root configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub output: OutputConfig,
    /// Additional directories to search when resolving header paths. Each
    /// entry is tried in order after `base_dir` (the TOML file's parent
    /// directory). Also injected as `-I` flags for clang.
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    /// Extra clang arguments applied to every header. Per-header
    /// `clang_args` are appended after these.
    #[serde(default)]
    pub clang_args: Vec<String>,
    #[serde(default)]
    pub header: Vec<HeaderConfig>,
    #[serde(default)]
    pub naming: NamingRules,
    #[serde(default)]
    pub rules: Rules,
}

/// Output file settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Generated Rust file (e.g. `src/generated.rs`).
    pub file: PathBuf,
    /// Path of the raw `extern "C"` bindings as seen from the generated
    /// module.
    #[serde(default = "default_ffi_path")]
    pub ffi_path: String,
    #[serde(default = "default_string_text_fn")]
    pub string_text_fn: String,
    #[serde(default = "default_string_dispose_fn")]
    pub string_dispose_fn: String,
    /// Releases `char *` out-parameters the library allocates.
    #[serde(default = "default_free_fn")]
    pub free_fn: String,
}

fn default_ffi_path() -> String {
    EmitOptions::default().ffi_path
}

fn default_string_text_fn() -> String {
    EmitOptions::default().string_text_fn
}

fn default_string_dispose_fn() -> String {
    EmitOptions::default().string_dispose_fn
}

fn default_free_fn() -> String {
    EmitOptions::default().free_fn
}

/// One header unit. Each is parsed on its own; declarations from all units
/// share one registry.
#[derive(Debug, Deserialize)]
pub struct HeaderConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub clang_args: Vec<String>,
}

impl Config {
    /// Names the emitted code refers to.
    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions {
            ffi_path: self.output.ffi_path.clone(),
            string_handle: self.naming.string_handle.clone(),
            string_text_fn: self.output.string_text_fn.clone(),
            string_dispose_fn: self.output.string_dispose_fn.clone(),
            free_fn: self.output.free_fn.clone(),
        }
    }

    /// Clang arguments for `header`: include paths, then global, then
    /// per-header arguments.
    pub fn clang_args_for(&self, header: &HeaderConfig) -> Vec<String> {
        self.include_paths
            .iter()
            .map(|p| format!("-I{}", p.display()))
            .chain(self.clang_args.iter().cloned())
            .chain(header.clang_args.iter().cloned())
            .collect()
    }
}

/// Resolve a header path by searching `base_dir` first, then each
/// `include_paths` entry. Absolute paths are returned as-is. If the file
/// is not found anywhere, falls back to `base_dir.join(path)` so that the
/// caller gets a meaningful error from clang.
pub fn resolve_header(path: &Path, base_dir: &Path, include_paths: &[PathBuf]) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let candidate = base_dir.join(path);
    if candidate.exists() {
        return candidate;
    }
    include_paths
        .iter()
        .map(|inc| inc.join(path))
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| base_dir.join(path))
}

/// Load and parse a `bnd-wrapgen.toml` configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}
