//! In-memory fixture modelled on a slice of libclang's `Index.h`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;

use bnd_wrapgen::front::TypeKind;
use bnd_wrapgen::front::tree::Tree;
use bnd_wrapgen::generate::Bindings;
use bnd_wrapgen::hooks::{ConfigHooks, IgnoreRule, ReturnArgumentRule, Rules};
use bnd_wrapgen::ir::Method;
use bnd_wrapgen::model::STRING_HANDLE_NAME;
use bnd_wrapgen::naming::NamingRules;

pub const INDEX_H: &str = "/virtual/clang-c/Index.h";

pub fn index_rules() -> Rules {
    Rules {
        strip_prefixes: vec!["clang_".to_string()],
        fixed_names: HashMap::from([(
            "clang_getTranslationUnitCursor".to_string(),
            "TranslationUnitCursor".to_string(),
        )]),
        ignore: vec![IgnoreRule {
            function: "clang_visitChildren".to_string(),
            reason: "manually implemented".to_string(),
        }],
        return_argument: vec![
            ReturnArgumentRule {
                type_name: STRING_HANDLE_NAME.to_string(),
                pointer_level: 1,
            },
            ReturnArgumentRule {
                type_name: "u32".to_string(),
                pointer_level: 1,
            },
        ],
        opaque_pointer_params: vec!["StringSet".to_string()],
        ..Rules::empty()
    }
}

/// Declarations of the fixture header, in header order.
pub fn index_tree() -> Tree {
    let mut t = Tree::new(INDEX_H);
    let root = t.root();

    let int = t.builtin(TypeKind::Int);
    let uint = t.builtin(TypeKind::UInt);
    let long = t.builtin(TypeKind::Long);
    let void = t.builtin(TypeKind::Void);
    let char_ = t.builtin(TypeKind::Char);
    let opaque = t.builtin(TypeKind::Other("opaque".to_string()));
    let void_ptr = t.pointer(void);
    let char_ptr = t.pointer(char_);
    let char_ptr_ptr = t.pointer(char_ptr);
    let int_ptr = t.pointer(int);
    let uint_ptr = t.pointer(uint);

    let (_, cx_string) = t.add_typedef(root, "CXString", opaque);
    let (_, time_t) = t.add_typedef(root, "time_t", long);
    let (_, cx_index) = t.add_typedef(root, "CXIndex", void_ptr);
    let (_, cx_file) = t.add_typedef(root, "CXFile", void_ptr);

    let (_, tu_impl) = t.add_struct(root, "CXTranslationUnitImpl");
    let tu_impl_ref = t.elaborated(tu_impl);
    let tu_impl_ptr = t.pointer(tu_impl_ref);
    let (_, cx_tu) = t.add_typedef(root, "CXTranslationUnit", tu_impl_ptr);

    let (kind_node, kind) = t.add_enum(root, "CXCursorKind");
    t.set_comment(kind_node, "/** Describes the kind of entity that a cursor refers to. */");
    t.add_enum_constant(kind_node, "CXCursor_StructDecl", 2);
    t.add_enum_constant(kind_node, "CXCursor_UnionDecl", 3);
    t.add_enum_constant(kind_node, "CXCursor_FirstDecl", 2);
    let kind_ref = t.elaborated(kind);

    let (cursor_node, cursor_rec) = t.add_struct(root, "CXCursor");
    t.add_field(cursor_node, "kind", kind_ref);
    t.add_field(cursor_node, "xdata", int);
    let data = t.constant_array(void_ptr, 3);
    t.add_field(cursor_node, "data", data);
    let cursor_ref = t.elaborated(cursor_rec);
    let (_, cx_cursor) = t.add_typedef(root, "CXCursor", cursor_ref);

    let (save_node, save) = t.add_enum(root, "CXSaveError");
    t.add_enum_constant(save_node, "CXSaveError_None", 0);
    t.add_enum_constant(save_node, "CXSaveError_Unknown", 1);
    let save_ref = t.elaborated(save);

    let (linkage_node, _) = t.add_enum(root, "CXLinkageKind");
    t.add_enum_constant(linkage_node, "CXLinkage_Invalid", 0);
    t.add_enum_constant(linkage_node, "CXLinkage_NoLinkage", 1);

    let (set_node, set_rec) = t.add_struct(root, "CXStringSet");
    let string_ptr = t.pointer(cx_string);
    t.add_field(set_node, "Strings", string_ptr);
    t.add_field(set_node, "Count", uint);
    let set_ref = t.elaborated(set_rec);
    let (_, cx_string_set) = t.add_typedef(root, "CXStringSet", set_ref);
    let set_ptr = t.pointer(cx_string_set);

    let callback = t.function_proto(void, &[]);
    let callback_ptr = t.pointer(callback);

    t.add_function(
        root,
        "clang_createIndex",
        cx_index,
        &[("excludeDeclarationsFromPCH", int), ("displayDiagnostics", int)],
    );
    t.add_function(root, "clang_disposeIndex", void, &[("index", cx_index)]);
    let parse = t.add_function(
        root,
        "clang_parseTranslationUnit",
        cx_tu,
        &[
            ("CIdx", cx_index),
            ("source_filename", char_ptr),
            ("command_line_args", char_ptr_ptr),
            ("num_command_line_args", int),
        ],
    );
    t.set_comment(
        parse,
        "/**\n * \\brief Same as \\c parseTranslationUnit2, but returns\n * the translation unit.\n */",
    );
    t.add_function(root, "clang_disposeTranslationUnit", void, &[("", cx_tu)]);
    t.add_function(root, "clang_getTranslationUnitCursor", cx_cursor, &[("", cx_tu)]);
    t.add_function(
        root,
        "clang_saveTranslationUnit",
        save_ref,
        &[("TU", cx_tu), ("FileName", char_ptr)],
    );
    t.add_function(root, "clang_getCursorKind", kind_ref, &[("", cx_cursor)]);
    t.add_function(root, "clang_isDeclaration", uint, &[("", kind_ref)]);
    t.add_function(root, "clang_getCursorKindSpelling", cx_string, &[("Kind", kind_ref)]);
    t.add_function(root, "clang_equalCursors", uint, &[("", cx_cursor), ("", cx_cursor)]);
    t.add_function(root, "clang_getCursorSpelling", cx_string, &[("", cx_cursor)]);
    t.add_function(root, "clang_Cursor_getSpelling", cx_string, &[("C", cx_cursor)]);
    t.add_function(
        root,
        "clang_getCursorLocation",
        uint,
        &[("C", cx_cursor), ("file", string_ptr), ("line", uint_ptr)],
    );
    t.add_function(root, "clang_setDepth", void, &[("C", cx_cursor), ("depth", int_ptr)]);
    t.add_function(root, "clang_getCursorStrings", set_ptr, &[("C", cx_cursor)]);
    t.add_function(root, "clang_disposeStringSet", void, &[("set", set_ptr)]);
    t.add_function(root, "clang_getFileTime", time_t, &[("SFile", cx_file)]);
    t.add_function(root, "clang_getVersionString", int, &[("out", char_ptr_ptr)]);
    t.add_function(
        root,
        "clang_setCallback",
        void,
        &[("index", cx_index), ("cb", callback_ptr)],
    );
    t.add_function(root, "clang_getClientData", void_ptr, &[("index", cx_index)]);
    t.add_function(root, "clang_visitChildren", uint, &[("parent", cx_cursor)]);

    t
}

pub fn bind_tree(tree: &Tree, rules: Rules) -> Bindings {
    let naming = NamingRules::default();
    let hooks = ConfigHooks::new(rules);
    let root = tree.root_cursor();
    bnd_wrapgen::bind(&[(root, Path::new(INDEX_H))], &naming, &hooks).expect("bind fixture tree")
}

pub fn bind_index() -> Bindings {
    bind_tree(&index_tree(), index_rules())
}

/// The method `name` of the enum or struct `owner`.
pub fn method<'a>(bindings: &'a Bindings, owner: &str, name: &str) -> &'a Method {
    let methods = bindings
        .enum_(owner)
        .map(|e| &e.methods)
        .or_else(|| bindings.struct_(owner).map(|s| &s.methods))
        .unwrap_or_else(|| panic!("no enum or struct named {owner}"));
    methods
        .iter()
        .find(|m| m.name == name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();
            panic!("{owner} has no method {name}. Found: {names:?}")
        })
}

pub fn method_names<'a>(bindings: &'a Bindings, owner: &str) -> Vec<&'a str> {
    bindings
        .enum_(owner)
        .map(|e| &e.methods)
        .or_else(|| bindings.struct_(owner).map(|s| &s.methods))
        .map(|methods| methods.iter().map(|m| m.name.as_str()).collect())
        .unwrap_or_default()
}
