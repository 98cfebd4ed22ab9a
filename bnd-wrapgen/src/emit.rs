//! Emitter: [`Bindings`] → Rust source of a wrapper module over a raw
//! `extern "C"` bindings crate.

use std::fmt::Write;

use anyhow::{Result, bail};
use tracing::debug;

use crate::generate::{Bindings, EnumBinding, StructBinding};
use crate::ir::{Cleanup, Conversion, ElementConversion, Expr, Method, NativeType, Stmt, TargetType};
use crate::marshal::ident;
use crate::model::{STRING_HANDLE_NAME, Scalar};
use crate::naming;

/// Names the generated code refers to.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Path of the raw bindings, imported as `ffi`.
    pub ffi_path: String,
    /// C name of the string handle type.
    pub string_handle: String,
    /// Native function returning the text of a string handle.
    pub string_text_fn: String,
    /// Native function disposing a string handle.
    pub string_dispose_fn: String,
    /// Function releasing `char *` results allocated by the library.
    pub free_fn: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            ffi_path: "clang_sys".to_string(),
            string_handle: "CXString".to_string(),
            string_text_fn: "clang_getCString".to_string(),
            string_dispose_fn: "clang_disposeString".to_string(),
            free_fn: "libc::free".to_string(),
        }
    }
}

/// Render the whole wrapper module.
pub fn emit_module(bindings: &Bindings, options: &EmitOptions) -> Result<String> {
    if options.ffi_path.is_empty() {
        bail!("`ffi_path` must name the raw bindings module");
    }
    let mut out = String::new();
    emit_prelude(&mut out, options)?;

    for e in &bindings.enums {
        emit_enum(&mut out, e, options)?;
    }
    for s in &bindings.structs {
        emit_struct(&mut out, s, options)?;
    }
    for m in &bindings.functions {
        writeln!(out)?;
        emit_method(&mut out, m, 0, options)?;
    }

    debug!(
        enums = bindings.enums.len(),
        structs = bindings.structs.len(),
        functions = bindings.functions.len(),
        bytes = out.len(),
        "emitted wrapper module"
    );
    Ok(out)
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

fn emit_prelude(out: &mut String, options: &EmitOptions) -> Result<()> {
    let EmitOptions {
        ffi_path,
        string_handle,
        string_text_fn,
        ..
    } = options;
    write!(
        out,
        r#"// Code generated by bnd-wrapgen. DO NOT EDIT.

#![allow(
    non_camel_case_types,
    non_upper_case_globals,
    dead_code,
    unused_mut,
    unused_unsafe,
    clippy::needless_range_loop,
    clippy::too_many_arguments
)]

use std::ffi::{{CStr, CString, c_char}};
use std::time::{{Duration, SystemTime, UNIX_EPOCH}};

use {ffi_path} as ffi;

/// Runs a native cleanup when dropped.
struct Deferred<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Deferred<F> {{
    fn new(f: F) -> Self {{
        Self(Some(f))
    }}
}}

impl<F: FnOnce()> Drop for Deferred<F> {{
    fn drop(&mut self) {{
        if let Some(f) = self.0.take() {{
            f();
        }}
    }}
}}

/// Owned NUL-terminated copy of `s`; interior NULs are dropped.
fn native_string(s: &str) -> *mut c_char {{
    let bytes: Vec<u8> = s.bytes().filter(|&b| b != 0).collect();
    CString::new(bytes).map_or(std::ptr::null_mut(), CString::into_raw)
}}

fn c_text(p: *const c_char) -> String {{
    if p.is_null() {{
        return String::new();
    }}
    unsafe {{ CStr::from_ptr(p) }}.to_string_lossy().into_owned()
}}

fn string_handle_text(s: ffi::{string_handle}) -> String {{
    c_text(unsafe {{ ffi::{string_text_fn}(s) }})
}}

#[repr(transparent)]
#[derive(Clone, Copy)]
pub struct {STRING_HANDLE_NAME} {{
    c: ffi::{string_handle},
}}
"#
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

fn emit_doc(out: &mut String, comment: &str, indent: usize) -> Result<()> {
    let pad = "    ".repeat(indent);
    for line in comment.lines() {
        if line.is_empty() {
            writeln!(out, "{pad}///")?;
        } else {
            writeln!(out, "{pad}/// {line}")?;
        }
    }
    Ok(())
}

fn emit_enum(out: &mut String, e: &EnumBinding, options: &EmitOptions) -> Result<()> {
    let underlying = e.underlying.target_name();
    writeln!(out)?;
    emit_doc(out, &e.comment, 0)?;
    writeln!(out, "#[repr(transparent)]")?;
    writeln!(out, "#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]")?;
    writeln!(out, "pub struct {}(pub {underlying});", e.name)?;
    writeln!(out)?;
    writeln!(out, "impl {} {{", e.name)?;
    for item in &e.items {
        emit_doc(out, &item.comment, 1)?;
        // Values are stored as raw 64-bit patterns; keep the low 32 bits.
        let value = match e.underlying {
            Scalar::Int => (item.value as u32 as i32).to_string(),
            _ => (item.value as u32).to_string(),
        };
        writeln!(out, "    pub const {}: Self = Self({value});", item.name)?;
    }
    for m in &e.methods {
        writeln!(out)?;
        emit_method(out, m, 1, options)?;
    }
    writeln!(out, "}}")?;

    let has_spelling = e
        .methods
        .iter()
        .any(|m| m.name == "Spelling" && m.params.is_empty() && m.returns == TargetType::String);
    if has_spelling {
        writeln!(out)?;
        writeln!(out, "impl std::fmt::Display for {} {{", e.name)?;
        writeln!(
            out,
            "    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {{"
        )?;
        writeln!(out, "        f.write_str(&self.spelling())")?;
        writeln!(out, "    }}")?;
        writeln!(out, "}}")?;
        if e.name.ends_with("Error") {
            writeln!(out)?;
            writeln!(out, "impl std::error::Error for {} {{}}", e.name)?;
        }
    }
    Ok(())
}

fn emit_struct(out: &mut String, s: &StructBinding, options: &EmitOptions) -> Result<()> {
    let native = if s.is_pointer_composition {
        format!("*mut ffi::{}", s.c_name)
    } else {
        format!("ffi::{}", s.c_name)
    };
    writeln!(out)?;
    emit_doc(out, &s.comment, 0)?;
    writeln!(out, "#[repr(transparent)]")?;
    writeln!(out, "#[derive(Clone, Copy)]")?;
    writeln!(out, "pub struct {} {{", s.name)?;
    writeln!(out, "    c: {native},")?;
    writeln!(out, "}}")?;

    if s.methods.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "impl {} {{", s.name)?;
    for (i, m) in s.methods.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        emit_method(out, m, 1, options)?;
    }
    writeln!(out, "}}")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

fn emit_method(out: &mut String, m: &Method, indent: usize, options: &EmitOptions) -> Result<()> {
    let pad = "    ".repeat(indent);
    emit_doc(out, &m.comment, indent)?;

    let mut params: Vec<String> = Vec::new();
    if m.has_receiver {
        params.push("self".to_string());
    }
    params.extend(
        m.params
            .iter()
            .map(|p| format!("{}: {}", p.name, target_type(&p.ty))),
    );
    let returns = match &m.returns {
        TargetType::Unit => String::new(),
        ty => format!(" -> {}", target_type(ty)),
    };
    writeln!(
        out,
        "{pad}pub fn {}({}){returns} {{",
        ident(&m.name),
        params.join(", ")
    )?;

    let mut body = BodyWriter {
        out: &mut *out,
        options,
        deferred: 0,
    };
    body.stmts(&m.body, indent + 1)?;
    writeln!(out, "{pad}}}")?;
    Ok(())
}

struct BodyWriter<'a> {
    out: &'a mut String,
    options: &'a EmitOptions,
    deferred: usize,
}

impl BodyWriter<'_> {
    fn stmts(&mut self, stmts: &[Stmt], indent: usize) -> Result<()> {
        for stmt in stmts {
            self.stmt(stmt, indent)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt, indent: usize) -> Result<()> {
        let pad = "    ".repeat(indent);
        match stmt {
            Stmt::Let {
                name,
                mutable,
                ty,
                value,
            } => {
                let binding = if *mutable { "let mut" } else { "let" };
                let ty = ty.as_ref().map(|t| format!(": {}", native_type(t))).unwrap_or_default();
                writeln!(self.out, "{pad}{binding} {name}{ty} = {};", expr(value))?;
            }
            Stmt::Assign { target, value } => {
                let target = match target {
                    Expr::Deref(inner) => format!("*{}", expr(inner)),
                    other => expr(other),
                };
                writeln!(self.out, "{pad}{target} = {};", expr(value))?;
            }
            Stmt::IfNonEmpty { collection, then } => {
                writeln!(self.out, "{pad}if !{collection}.is_empty() {{")?;
                self.stmts(then, indent + 1)?;
                writeln!(self.out, "{pad}}}")?;
            }
            Stmt::IfSome {
                binding,
                value,
                by_ref,
                then,
            } => {
                let value = expr(value);
                let value = if *by_ref {
                    format!("{value}.as_deref()")
                } else {
                    value
                };
                writeln!(self.out, "{pad}if let Some({binding}) = {value} {{")?;
                self.stmts(then, indent + 1)?;
                writeln!(self.out, "{pad}}}")?;
            }
            Stmt::ForEach {
                index,
                collection,
                body,
            } => {
                writeln!(self.out, "{pad}for {index} in 0..{collection}.len() {{")?;
                self.stmts(body, indent + 1)?;
                writeln!(self.out, "{pad}}}")?;
            }
            Stmt::Push { buffer, value } => {
                writeln!(self.out, "{pad}{buffer}.push({});", expr(value))?;
            }
            Stmt::NewBuffer { name, element, len } => {
                writeln!(
                    self.out,
                    "{pad}let mut {name}: Vec<{}> = Vec::with_capacity({len}.len());",
                    native_type(element)
                )?;
            }
            Stmt::DeferList(name) => {
                writeln!(
                    self.out,
                    "{pad}let mut {name}: Vec<Deferred<Box<dyn FnOnce()>>> = Vec::new();"
                )?;
            }
            Stmt::Defer { cleanup, list } => {
                let cleanup = self.cleanup(cleanup);
                match list {
                    Some(list) => writeln!(
                        self.out,
                        "{pad}{list}.push(Deferred::new(Box::new(move || unsafe {{ {cleanup} }}) as Box<dyn FnOnce()>));"
                    )?,
                    None => {
                        writeln!(
                            self.out,
                            "{pad}let _deferred_{} = Deferred::new(move || unsafe {{ {cleanup} }});",
                            self.deferred
                        )?;
                        self.deferred += 1;
                    }
                }
            }
            Stmt::Expr(e) => writeln!(self.out, "{pad}{};", expr(e))?,
            Stmt::Return(e) => writeln!(self.out, "{pad}{}", expr(e))?,
            Stmt::Match {
                scrutinee,
                arms,
                fallback,
            } => {
                let scrutinee = expr(scrutinee);
                writeln!(self.out, "{pad}match {scrutinee} {{")?;
                for arm in arms {
                    let labels: Vec<String> = arm.labels.iter().map(|l| format!("Self::{l}")).collect();
                    writeln!(
                        self.out,
                        "{pad}    {} => {:?}.to_string(),",
                        labels.join(" | "),
                        arm.text
                    )?;
                }
                writeln!(self.out, "{pad}    _ => format!({fallback:?}, {scrutinee}.0),")?;
                writeln!(self.out, "{pad}}}")?;
            }
        }
        Ok(())
    }

    fn cleanup(&self, cleanup: &Cleanup) -> String {
        match cleanup {
            Cleanup::ReleaseString(name) => format!("drop(CString::from_raw({name}))"),
            Cleanup::DisposeString(name) => {
                format!("ffi::{}({name})", self.options.string_dispose_fn)
            }
            Cleanup::FreeNative(name) => format!("{}({name}.cast())", self.options.free_fn),
        }
    }
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Ident(name) => name.clone(),
        Expr::NativeCall { function, args } => {
            let args: Vec<String> = args.iter().map(|a| expr(a)).collect();
            format!("unsafe {{ ffi::{function}({}) }}", args.join(", "))
        }
        Expr::Convert { value, to } => {
            let value = atom(value);
            match to {
                Conversion::Native => format!("{value} as _"),
                Conversion::EnumToNative => format!("{value}.0 as _"),
                Conversion::Scalar(target) => format!("{value} as {target}"),
                Conversion::Enum(target) => format!("{target}({value} as _)"),
            }
        }
        Expr::Inner(value) => format!("{}.c", atom(value)),
        Expr::Field {
            base,
            field,
            through_pointer,
        } => {
            let field = naming::escape_keyword(field);
            if *through_pointer {
                format!("unsafe {{ (*{}).{field} }}", expr(base))
            } else {
                format!("{}.{field}", atom(base))
            }
        }
        Expr::Deref(value) => format!("unsafe {{ *{} }}", atom(value)),
        Expr::AddrOfMut(name) => format!("std::ptr::addr_of_mut!({name}).cast()"),
        Expr::AddrOf(value) => format!("std::ptr::addr_of!({}) as _", expr(value)),
        Expr::PointerArg(value) => format!("{} as _", atom(value)),
        Expr::Index { base, index } => format!("{}[{index}]", atom(base)),
        Expr::Len(name) => format!("{name}.len()"),
        Expr::BufferPtr(name) => format!("{name}.as_mut_ptr()"),
        Expr::NullPointer => "std::ptr::null_mut()".to_string(),
        Expr::Default => "unsafe { std::mem::zeroed() }".to_string(),
        Expr::Compose { target, value } => format!("{target} {{ c: {} }}", expr(value)),
        Expr::ComposeBoxed { target, value } => {
            format!("{target} {{ c: Box::into_raw(Box::new({})) }}", expr(value))
        }
        Expr::NewNativeString(value) => format!("native_string({})", expr(value)),
        Expr::FromNativeString(value) => format!("c_text({})", expr(value)),
        Expr::StringHandleText(value) => format!("string_handle_text({})", expr(value)),
        Expr::NotZero(value) => format!("{} != 0", atom(value)),
        Expr::TimeFromSeconds(value) => {
            format!("UNIX_EPOCH + Duration::from_secs({} as u64)", atom(value))
        }
        Expr::TimeToSeconds(value) => format!(
            "{}.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs()) as _",
            atom(value)
        ),
        Expr::NonNull { pointer, some } => format!(
            "if {pointer}.is_null() {{ None }} else {{ Some({}) }}",
            expr(some)
        ),
        Expr::SliceView {
            pointer,
            len,
            element,
        } => {
            let pointer = atom(pointer);
            let convert = match element {
                ElementConversion::Compose(target) => format!("{target} {{ c: *e }}"),
                ElementConversion::Enum(target) => format!("{target}(*e as _)"),
                ElementConversion::Scalar(target) => format!("*e as {target}"),
                ElementConversion::Text => "c_text(*e)".to_string(),
            };
            format!(
                "if {pointer}.is_null() {{ Vec::new() }} else {{ unsafe {{ std::slice::from_raw_parts({pointer}, {} as usize) }}.iter().map(|e| {convert}).collect() }}",
                atom(len)
            )
        }
        Expr::Tuple(items) => {
            let items: Vec<String> = items.iter().map(|i| expr(i)).collect();
            format!("({})", items.join(", "))
        }
    }
}

/// `e`, parenthesized unless it is a plain path, call or index.
fn atom(e: &Expr) -> String {
    let text = expr(e);
    let simple = matches!(
        e,
        Expr::Ident(_) | Expr::Inner(_) | Expr::Index { .. } | Expr::Len(_) | Expr::Tuple(_)
    ) || matches!(e, Expr::Field { through_pointer: false, .. });
    if simple { text } else { format!("({text})") }
}

fn native_type(ty: &NativeType) -> String {
    match ty {
        NativeType::Scalar(s) => s.native_name().to_string(),
        NativeType::Ffi(name) => format!("ffi::{name}"),
        NativeType::Pointer(inner) => format!("*mut {}", native_type(inner)),
    }
}

fn target_type(ty: &TargetType) -> String {
    match ty {
        TargetType::Unit => "()".to_string(),
        TargetType::Bool => "bool".to_string(),
        TargetType::Str => "&str".to_string(),
        TargetType::String => "String".to_string(),
        TargetType::Time => "SystemTime".to_string(),
        TargetType::Scalar(name) | TargetType::Named(name) => name.clone(),
        TargetType::SliceRef(inner) => format!("&[{}]", target_type(inner)),
        TargetType::Vec(inner) => format!("Vec<{}>", target_type(inner)),
        TargetType::OptionalMut(inner) => format!("Option<&mut {}>", target_type(inner)),
        TargetType::Optional(inner) => format!("Option<{}>", target_type(inner)),
        TargetType::Tuple(items) => {
            let items: Vec<String> = items.iter().map(target_type).collect();
            format!("({})", items.join(", "))
        }
    }
}
