//! Header discovery over the in-memory front-end.

use std::path::Path;

use bnd_wrapgen::extract::discover_unit;
use bnd_wrapgen::front::TypeKind;
use bnd_wrapgen::front::tree::Tree;
use bnd_wrapgen::hooks::DefaultHooks;
use bnd_wrapgen::model::Scalar;
use bnd_wrapgen::naming::NamingRules;
use bnd_wrapgen::registry::{Discovery, Registry};
use bnd_wrapgen::translate::TranslateError;

const HEADER: &str = "/virtual/include/clang-c/Index.h";

fn discover(tree: &Tree) -> (Registry, Vec<bnd_wrapgen::model::Function>) {
    let mut discovery = Discovery::new("CXString");
    discover_unit(
        &tree.root_cursor(),
        Path::new(HEADER),
        &mut discovery,
        &NamingRules::default(),
    )
    .expect("discover fixture");
    discovery.freeze()
}

#[test]
fn enum_items_get_the_type_prefix() {
    let mut t = Tree::new(HEADER);
    let root = t.root();
    let (options, _) = t.add_enum(root, "CXOptions");
    t.add_enum_constant(options, "CXNone", 0);
    t.add_enum_constant(options, "CXDetailedOptions", 1);
    let (kind, _) = t.add_enum(root, "CXCursorKind");
    t.add_enum_constant(kind, "CXCursor_StructDecl", 2);
    t.add_enum_constant(kind, "CXCursor_UnionDecl", 3);

    let (registry, _) = discover(&t);
    let names = |c_name: &str| -> Vec<String> {
        let id = registry.lookup_enum(c_name).expect("enum registered");
        registry.enum_(id).items.iter().map(|i| i.name.clone()).collect()
    };
    assert_eq!(names("CXOptions"), ["Options_None", "Options_Detailed"]);
    assert_eq!(names("CXCursorKind"), ["Cursor_StructDecl", "Cursor_UnionDecl"]);

    let id = registry.lookup_enum("CursorKind").expect("by target name");
    let e = registry.enum_(id);
    assert!(!e.is_typedef);
    assert_eq!(e.underlying, Scalar::UInt);
    assert_eq!(e.items[1].value, 3);
}

#[test]
fn error_enums_are_signed() {
    let mut t = Tree::new(HEADER);
    let root = t.root();
    let (save, _) = t.add_enum(root, "CXSaveError");
    t.add_enum_constant(save, "CXSaveError_None", 0);

    let (registry, _) = discover(&t);
    let id = registry.lookup_enum("SaveError").expect("SaveError");
    assert_eq!(registry.enum_(id).underlying, Scalar::Int);
}

#[test]
fn anonymous_enum_takes_the_typedef_name() {
    let mut t = Tree::new(HEADER);
    let root = t.root();
    let uint = t.builtin(TypeKind::UInt);
    let (typedef, _) = t.add_typedef(root, "CXGlobalOptFlags", uint);
    let (flags, _) = t.add_enum(typedef, "");
    t.add_enum_constant(flags, "CXGlobalOpt_None", 0);

    let (registry, _) = discover(&t);
    assert_eq!(registry.enums().len(), 1, "the anonymous enum is registered once");
    let e = &registry.enums()[0];
    assert_eq!(e.name, "GlobalOptFlags");
    assert_eq!(e.c_name, "CXGlobalOptFlags");
    assert!(e.is_typedef);
    assert_eq!(e.items[0].name, "GlobalOpt_None");
}

#[test]
fn void_pointer_typedefs_are_opaque_handles() {
    let mut t = Tree::new(HEADER);
    let root = t.root();
    let void = t.builtin(TypeKind::Void);
    let void_ptr = t.pointer(void);
    t.add_typedef(root, "CXIndex", void_ptr);

    let (registry, _) = discover(&t);
    let id = registry.lookup_struct("Index").expect("opaque handle");
    let s = registry.struct_(id);
    assert_eq!(s.c_name, "CXIndex");
    assert!(s.is_typedef);
    assert!(s.members.is_empty());
}

#[test]
fn typedef_takes_over_its_struct() {
    let mut t = Tree::new(HEADER);
    let root = t.root();
    let int = t.builtin(TypeKind::Int);
    let (imp, imp_ty) = t.add_struct(root, "CXTranslationUnitImpl");
    t.set_comment(imp, "/** A single translation unit. */");
    t.add_field(imp, "flags", int);
    let named = t.elaborated(imp_ty);
    let ptr = t.pointer(named);
    t.add_typedef(root, "CXTranslationUnit", ptr);

    let (registry, _) = discover(&t);
    assert_eq!(registry.structs().len(), 1);
    let id = registry
        .lookup_struct("CXTranslationUnitImpl")
        .expect("old name still resolves");
    let s = registry.struct_(id);
    assert_eq!(s.name, "TranslationUnit");
    assert_eq!(s.c_name, "CXTranslationUnit");
    assert!(s.is_typedef);
    assert_eq!(s.comment, "A single translation unit.", "comment is inherited");
    assert_eq!(s.members.len(), 1, "members are inherited");
    assert_eq!(registry.lookup_struct("TranslationUnit"), Some(id));
}

#[test]
fn typedef_of_a_typedef_gets_a_fresh_identity() {
    let mut t = Tree::new(HEADER);
    let root = t.root();
    let (_, foo_ty) = t.add_struct(root, "CXFoo");
    let named = t.elaborated(foo_ty);
    let (_, foo_alias) = t.add_typedef(root, "CXFoo", named);
    t.add_typedef(root, "CXFooRef", foo_alias);

    let (registry, _) = discover(&t);
    let names: Vec<&str> = registry.structs().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Foo", "FooRef"]);
    let id = registry.lookup_struct("CXFooRef").expect("fresh identity");
    assert!(registry.struct_(id).is_typedef);
}

#[test]
fn struct_members_skip_function_pointers() {
    let mut t = Tree::new(HEADER);
    let root = t.root();
    let int = t.builtin(TypeKind::Int);
    let void = t.builtin(TypeKind::Void);
    let char_ = t.builtin(TypeKind::Char);
    let name_ty = t.pointer(char_);
    let proto = t.function_proto(void, &[int]);
    let callback = t.pointer(proto);
    let (file, _) = t.add_struct(root, "CXUnsavedFile");
    t.add_field(file, "Filename", name_ty);
    t.add_field(file, "OnChange", callback);
    t.add_field(file, "Length", int);

    let (registry, _) = discover(&t);
    let id = registry.lookup_struct("UnsavedFile").expect("UnsavedFile");
    let members: Vec<&str> = registry
        .struct_(id)
        .members
        .iter()
        .map(|m| m.c_name.as_str())
        .collect();
    assert_eq!(members, ["Filename", "Length"]);
}

#[test]
fn functions_come_only_from_the_header() {
    let mut t = Tree::new(HEADER);
    let root = t.root();
    let void = t.builtin(TypeKind::Void);
    t.add_function(root, "clang_toggleCrashRecovery", void, &[]);

    t.set_file("/virtual/include/clang-c/CXString.h");
    t.add_struct(root, "CXSibling");
    t.add_function(root, "clang_siblingFunction", void, &[]);

    t.set_file("/usr/include/time.h");
    t.add_struct(root, "CXOutside");

    let (registry, functions) = discover(&t);
    let names: Vec<&str> = functions.iter().map(|f| f.c_name.as_str()).collect();
    assert_eq!(names, ["clang_toggleCrashRecovery"]);
    assert!(
        registry.lookup_struct("Sibling").is_some(),
        "structs next to the header are registered"
    );
    assert!(registry.lookup_struct("Outside").is_none());
    assert_eq!(
        functions[0].file.as_deref(),
        Some(Path::new(HEADER)),
        "functions remember their file"
    );
}

#[test]
fn parameters_are_named() {
    let mut t = Tree::new(HEADER);
    let root = t.root();
    let int = t.builtin(TypeKind::Int);
    let (_, cursor_ty) = t.add_struct(root, "CXCursor");
    let named = t.elaborated(cursor_ty);
    let (_, cursor) = t.add_typedef(root, "CXCursor", named);
    let char_ = t.builtin(TypeKind::Char);
    let text = t.pointer(char_);
    let f = t.add_function(
        root,
        "clang_doThings",
        int,
        &[("", cursor), ("source_filename", text), ("type", int)],
    );
    t.set_comment(f, "/**\n * \\brief Does things\n * with \\c CXCursor.\n */");

    let (_, functions) = discover(&t);
    let f = &functions[0];
    let names: Vec<&str> = f.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["c", "sourceFilename", "type_"]);
    assert_eq!(f.parameters[0].ty.target_name, "Cursor");
    assert!(f.parameters[1].ty.is_narrow_string());
    assert_eq!(f.comment, "Does things with CXCursor.");
}

#[test]
fn string_handle_declarations_are_not_discovered() {
    let mut t = Tree::new(HEADER);
    let root = t.root();
    let (_, handle_ty) = t.add_struct(root, "CXString");
    let named = t.elaborated(handle_ty);
    t.add_typedef(root, "CXString", named);

    let (registry, _) = discover(&t);
    assert!(registry.structs().is_empty());
    assert!(registry.lookup_struct("String").is_none());
}

#[test]
fn unsupported_types_abort_the_run() {
    let mut t = Tree::new(HEADER);
    let root = t.root();
    let int = t.builtin(TypeKind::Int);
    let vector = t.builtin(TypeKind::Other("Vector".to_string()));
    t.add_function(root, "clang_first", int, &[]);
    t.add_function(root, "clang_vectorize", int, &[("v", vector)]);

    let mut discovery = Discovery::new("CXString");
    let result = discover_unit(
        &t.root_cursor(),
        Path::new(HEADER),
        &mut discovery,
        &NamingRules::default(),
    );
    assert!(
        matches!(result, Err(TranslateError::Unsupported { ref spelling, .. }) if spelling == "Vector"),
        "Found: {result:?}"
    );
    assert!(t.callbacks().is_empty(), "the aborted walk released its visitor");

    let units = [(t.root_cursor(), Path::new(HEADER))];
    let bound = bnd_wrapgen::bind(&units, &NamingRules::default(), &DefaultHooks);
    assert!(bound.is_err());
}
