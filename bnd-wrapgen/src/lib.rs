//! bnd-wrapgen: C header → idiomatic Rust wrapper generator.
//!
//! Parses C headers via libclang, shapes the discovered functions into
//! methods on the enums and structs they operate on, and emits a Rust
//! module of safe wrappers over a raw `extern "C"` bindings crate.
//!
//! # Quick start
//!
//! Generate the wrapper module from a config (suitable for `build.rs`):
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads config TOML, parses headers, writes the generated Rust file.
//! bnd_wrapgen::run(Path::new("bnd-wrapgen.toml"), None).unwrap();
//! ```
//!
//! Or get the source text without writing to disk:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let source = bnd_wrapgen::generate(Path::new("bnd-wrapgen.toml")).unwrap();
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub mod callback;
pub mod config;
pub mod emit;
pub mod extract;
pub mod front;
pub mod generate;
pub mod hooks;
pub mod ir;
pub mod marshal;
pub mod model;
pub mod naming;
pub mod registry;
pub mod shape;
pub mod translate;

use front::Cursor;
use generate::Bindings;
use hooks::{ConfigHooks, Hooks};
use naming::NamingRules;
use registry::Discovery;
use translate::TranslateError;

/// Run the full pipeline: load config, parse C headers, generate the
/// wrapper module, and write the output file.
///
/// `config_path` is the path to a `bnd-wrapgen.toml` configuration file.
/// `output` optionally overrides the output file path from the config.
///
/// Returns the path the generated file was written to.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let source = generate_from_config(&cfg, base_dir)?;

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => base_dir.join(&cfg.output.file),
    };
    if let Some(dir) = output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }
    std::fs::write(&output_path, &source)
        .with_context(|| format!("writing output to {}", output_path.display()))?;

    info!(
        path = %output_path.display(),
        size = source.len(),
        "wrote wrapper module"
    );

    Ok(output_path)
}

/// Parse a `bnd-wrapgen.toml` config file, bind the referenced C headers,
/// and return the generated source without writing to disk.
pub fn generate(config_path: &Path) -> Result<String> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    generate_from_config(&cfg, base_dir)
}

/// Generate the wrapper module from an already-loaded [`config::Config`].
///
/// `base_dir` is the directory relative to which header paths in the config
/// are resolved (typically the parent directory of the TOML file).
pub fn generate_from_config(cfg: &config::Config, base_dir: &Path) -> Result<String> {
    let bindings = bind_headers(cfg, base_dir)?;
    let source = emit::emit_module(&bindings, &cfg.emit_options())?;
    info!(size = source.len(), "generated wrapper module");
    Ok(source)
}

/// Parse and bind every configured header, without emitting.
pub fn bind_headers(cfg: &config::Config, base_dir: &Path) -> Result<Bindings> {
    info!(headers = cfg.header.len(), "loaded configuration");

    let clang =
        clang::Clang::new().map_err(|e| anyhow::anyhow!("failed to initialize libclang: {e}"))?;
    let index = clang::Index::new(&clang, false, false);

    let mut units = Vec::new();
    for header in &cfg.header {
        let path = config::resolve_header(&header.path, base_dir, &cfg.include_paths);
        // libclang reports locations under the path it was given.
        let path = std::fs::canonicalize(&path)
            .with_context(|| format!("resolving header {}", path.display()))?;
        let tu = front::clang::parse_header(&index, &path, &cfg.clang_args_for(header))?;
        units.push((tu, path));
    }

    let roots: Vec<(front::clang::ClangCursor<'_>, &Path)> = units
        .iter()
        .map(|(tu, path)| (front::clang::ClangCursor::root(tu), path.as_path()))
        .collect();
    let hooks = ConfigHooks::new(cfg.rules.clone());
    let bindings = bind(&roots, &cfg.naming, &hooks)?;
    Ok(bindings)
}

/// Discover the declarations under each `(root, header)` unit, in order,
/// then shape and marshal them.
///
/// Works with any front-end; an unsupported C type aborts the run.
pub fn bind<C: Cursor>(
    units: &[(C, &Path)],
    naming: &NamingRules,
    hooks: &dyn Hooks,
) -> Result<Bindings, TranslateError> {
    let mut discovery = Discovery::new(&naming.string_handle);
    for (root, header) in units {
        extract::discover_unit(root, header, &mut discovery, naming)?;
    }
    let (registry, functions) = discovery.freeze();
    Ok(generate::synthesize(registry, functions, hooks, naming))
}
