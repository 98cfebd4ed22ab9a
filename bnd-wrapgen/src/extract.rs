//! Discovery: walk one header unit and register its declarations.

use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::front::{ChildVisit, Cursor, DeclKind, TypeHandle};
use crate::model::{Enum, EnumItem, Function, FunctionParameter, Scalar, Struct, StructMember};
use crate::naming::{self, NamingRules};
use crate::registry::Discovery;
use crate::translate::{TranslateError, translate};

/// Walk the translation unit under `root` and register the enums, structs
/// and functions declared in `header` (and, for enums and structs, in any
/// file next to it).
///
/// A type that cannot be translated stops the walk and is returned.
pub fn discover_unit<C: Cursor>(
    root: &C,
    header: &Path,
    discovery: &mut Discovery,
    naming: &NamingRules,
) -> Result<(), TranslateError> {
    let dir = header.parent().unwrap_or(Path::new(""));
    let before = (
        discovery.enums().len(),
        discovery.structs().len(),
        discovery.functions().len(),
    );
    let mut failure = None;

    root.visit(&mut |cursor, parent| {
        let Some(file) = cursor.file() else {
            return ChildVisit::Continue;
        };
        if !file.starts_with(dir) {
            return ChildVisit::Continue;
        }
        match visit_decl(cursor, parent, file.as_path() == header, discovery, naming) {
            Ok(()) => ChildVisit::Recurse,
            Err(e) => {
                failure = Some(e);
                ChildVisit::Break
            }
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }

    info!(
        header = %header.display(),
        enums = discovery.enums().len() - before.0,
        structs = discovery.structs().len() - before.1,
        functions = discovery.functions().len() - before.2,
        "header unit discovered"
    );
    Ok(())
}

fn visit_decl<C: Cursor>(
    cursor: &C,
    parent: &C,
    in_header: bool,
    discovery: &mut Discovery,
    naming: &NamingRules,
) -> Result<(), TranslateError> {
    let mut c_name = cursor.spelling();
    let mut is_typedef = false;
    if parent.kind() == DeclKind::Typedef {
        let parent_name = parent.spelling();
        if !parent_name.is_empty() {
            c_name = parent_name;
            is_typedef = true;
        }
    }

    // The string handle is represented by the built-in identity.
    if c_name == naming.string_handle && matches!(cursor.kind(), DeclKind::Struct | DeclKind::Typedef) {
        trace!(name = %c_name, "skipping string handle declaration");
        return Ok(());
    }

    match cursor.kind() {
        DeclKind::Enum if !is_anonymous(&c_name) => {
            let e = enum_decl(cursor, &c_name, is_typedef, naming);
            debug!(name = %e.name, items = e.items.len(), "extracted enum");
            discovery.register_enum(e);
        }
        DeclKind::Struct if !is_anonymous(&c_name) => {
            let s = struct_decl(cursor, &c_name, is_typedef, naming)?;
            debug!(name = %s.name, members = s.members.len(), "extracted struct");
            discovery.register_struct(s);
        }
        DeclKind::Function if in_header => {
            let f = function_decl(cursor, naming)?;
            debug!(name = %f.c_name, params = f.parameters.len(), "extracted function");
            discovery.add_function(f);
        }
        DeclKind::Typedef => typedef_decl(cursor, &c_name, discovery, naming)?,
        _ => {}
    }
    Ok(())
}

fn is_anonymous(c_name: &str) -> bool {
    c_name.is_empty() || c_name.contains("(unnamed") || c_name.contains("(anonymous")
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

fn enum_decl<C: Cursor>(cursor: &C, c_name: &str, is_typedef: bool, naming: &NamingRules) -> Enum {
    let name = naming.trim_language_prefix(c_name);
    let stem = naming.strip_generic_suffix(&name).unwrap_or(&name);
    let mut prefix = stem.split('_').next().unwrap_or_default().to_string();

    let mut items: Vec<EnumItem> = Vec::new();
    cursor.visit(&mut |item, _| {
        if item.kind() != DeclKind::EnumConstant {
            return ChildVisit::Continue;
        }
        let item_c_name = item.spelling();
        let mut item_name = naming.trim_language_prefix(&item_c_name);

        // Items that already carry a `Prefix_` keep their names as they are.
        if items.is_empty() && item_name.contains('_') {
            prefix.clear();
        }
        if !prefix.is_empty() {
            item_name = item_name
                .strip_suffix(prefix.as_str())
                .unwrap_or(&item_name)
                .to_string();
            if !item_name.starts_with(prefix.as_str()) {
                item_name = format!("{prefix}_{item_name}");
            }
        }

        trace!(item = %item_name, "enum item");
        items.push(EnumItem {
            name: item_name,
            c_name: item_c_name,
            comment: item.raw_comment().map(|c| clean_comment(&c)).unwrap_or_default(),
            value: item.enum_value().unwrap_or_default(),
        });
        ChildVisit::Continue
    });

    let underlying = if name.ends_with("Error") {
        Scalar::Int
    } else {
        Scalar::UInt
    };
    Enum {
        name,
        c_name: c_name.to_string(),
        is_typedef,
        comment: cursor.raw_comment().map(|c| clean_comment(&c)).unwrap_or_default(),
        underlying,
        items,
        methods: Vec::new(),
    }
}

fn struct_decl<C: Cursor>(
    cursor: &C,
    c_name: &str,
    is_typedef: bool,
    naming: &NamingRules,
) -> Result<Struct, TranslateError> {
    let mut s = Struct::new(naming.trim_language_prefix(c_name), c_name, is_typedef);
    s.comment = cursor.raw_comment().map(|c| clean_comment(&c)).unwrap_or_default();

    let mut failure = None;
    cursor.visit(&mut |field, _| {
        if field.kind() != DeclKind::Field {
            return ChildVisit::Continue;
        }
        let Some(ty) = field.ty() else {
            failure = Some(TranslateError::MissingType {
                what: format!("field `{}`", field.spelling()),
            });
            return ChildVisit::Break;
        };
        match translate(&ty, naming) {
            Ok(ty) if ty.is_function_pointer => {
                trace!(member = %field.spelling(), "skipping function pointer member");
            }
            Ok(ty) => s.members.push(StructMember {
                c_name: field.display_name(),
                comment: field.raw_comment().map(|c| clean_comment(&c)).unwrap_or_default(),
                ty,
            }),
            Err(e) => {
                failure = Some(e);
                return ChildVisit::Break;
            }
        }
        ChildVisit::Continue
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(s),
    }
}

fn function_decl<C: Cursor>(cursor: &C, naming: &NamingRules) -> Result<Function, TranslateError> {
    let c_name = cursor.spelling();
    let result = cursor.result_type().ok_or_else(|| TranslateError::MissingType {
        what: format!("result of `{c_name}`"),
    })?;
    let mut f = Function::new(c_name, translate(&result, naming)?);
    f.comment = cursor.raw_comment().map(|c| clean_comment(&c)).unwrap_or_default();
    f.file = cursor.file();

    for param in cursor.arguments() {
        let param_c_name = param.display_name();
        let ty = param.ty().ok_or_else(|| TranslateError::MissingType {
            what: format!("parameter `{param_c_name}` of `{}`", f.c_name),
        })?;
        let ty = translate(&ty, naming)?;
        let name = if param_c_name.is_empty() {
            naming::escape_keyword(&naming::common_receiver_name(&ty.target_name))
        } else {
            naming::parameter_name(&param_c_name)
        };
        f.parameters.push(FunctionParameter {
            name,
            c_name: param_c_name,
            ty,
        });
    }
    Ok(f)
}

/// Typedefs that are siblings of the struct they name take over its
/// identity; `void *` typedefs become opaque handle structs.
fn typedef_decl<C: Cursor>(
    cursor: &C,
    c_name: &str,
    discovery: &mut Discovery,
    naming: &NamingRules,
) -> Result<(), TranslateError> {
    let underlying = cursor
        .typedef_underlying()
        .map(|t| t.spelling())
        .unwrap_or_default();
    let struct_name = underlying.strip_prefix("struct ").unwrap_or(&underlying);
    let struct_name = struct_name.strip_suffix(" *").unwrap_or(struct_name);

    match discovery.lookup_struct(struct_name) {
        Some(id)
            if !discovery.struct_(id).is_typedef
                && underlying.starts_with(&format!("struct {}", discovery.struct_(id).c_name)) =>
        {
            let old = discovery.struct_(id);
            let mut replacement = struct_decl(cursor, c_name, true, naming)?;
            if replacement.comment.is_empty() {
                replacement.comment = old.comment.clone();
            }
            replacement.members = old.members.clone();
            replacement.methods = old.methods.clone();
            discovery.replace_struct(id, replacement);
        }
        _ if underlying == "void *" => {
            let s = struct_decl(cursor, c_name, true, naming)?;
            debug!(name = %s.name, "extracted opaque handle");
            discovery.register_struct(s);
        }
        Some(id) => {
            let name = naming.trim_language_prefix(c_name);
            if discovery.lookup_struct(&name).is_none() && discovery.lookup_struct(c_name).is_none() {
                warn!(
                    typedef = %c_name,
                    target = %discovery.struct_(id).name,
                    "typedef does not match its struct, registering a fresh identity"
                );
                let s = struct_decl(cursor, c_name, true, naming)?;
                discovery.register_struct(s);
            }
        }
        None => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// Reduce a raw documentation comment to plain text. Paragraphs stay
/// separated by blank lines; a single paragraph is folded onto one line.
pub fn clean_comment(raw: &str) -> String {
    let body = raw.trim();
    let body = body
        .strip_prefix("/**")
        .or_else(|| body.strip_prefix("/*!"))
        .or_else(|| body.strip_prefix("///"))
        .or_else(|| body.strip_prefix("//"))
        .unwrap_or(body);
    let body = body.strip_suffix("*/").unwrap_or(body);

    let lines: Vec<&str> = body
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line
                .strip_prefix("///")
                .or_else(|| line.strip_prefix("//"))
                .or_else(|| line.strip_prefix('*'))
                .unwrap_or(line);
            line.trim()
        })
        .collect();
    let mut text = lines.join("\n").trim().to_string();

    text = text
        .replace("\\brief ", "")
        .replace("\\c ", "")
        .replace("\\param ", "Parameter ")
        .replace("\\returns ", "Returns ");
    if !text.contains("\n\n") {
        text = text.replace('\n', " ");
    }
    while text.contains("  ") {
        text = text.replace("  ", " ");
    }
    let text = text.trim();

    // libclang attaches group headers to the first declaration after them.
    if text.starts_with("\\defgroup") {
        return String::new();
    }
    text.to_string()
}
