//! Entity registration, lookup and re-pointing.

use bnd_wrapgen::model::{Enum, Function, STRING_HANDLE_NAME, Scalar, Struct, Type};
use bnd_wrapgen::registry::{Discovery, Owner};

fn cursor_kind() -> Enum {
    Enum {
        name: "CursorKind".to_string(),
        c_name: "CXCursorKind".to_string(),
        is_typedef: false,
        comment: String::new(),
        underlying: Scalar::UInt,
        items: Vec::new(),
        methods: Vec::new(),
    }
}

#[test]
fn registration_is_idempotent() {
    let mut d = Discovery::new("CXString");
    let first = d.register_struct(Struct::new("Cursor", "CXCursor", true));
    let mut again = Struct::new("Cursor", "CXCursor", true);
    again.comment = "later".to_string();
    let second = d.register_struct(again);

    assert_eq!(first, second);
    assert_eq!(d.structs().len(), 1);
    assert!(d.struct_(first).comment.is_empty(), "the first registration wins");

    let e1 = d.register_enum(cursor_kind());
    let e2 = d.register_enum(cursor_kind());
    assert_eq!(e1, e2);
    assert_eq!(d.enums().len(), 1);
}

#[test]
fn lookups_by_name_c_name_and_spelling() {
    let mut d = Discovery::new("CXString");
    let s = d.register_struct(Struct::new("UnsavedFile", "CXUnsavedFile", false));
    let e = d.register_enum(cursor_kind());
    let (registry, _) = d.freeze();

    assert_eq!(registry.lookup_struct("UnsavedFile"), Some(s));
    assert_eq!(registry.lookup_struct("CXUnsavedFile"), Some(s));
    assert_eq!(registry.lookup_non_typedef("struct CXUnsavedFile"), Some("UnsavedFile"));
    assert_eq!(registry.lookup_enum("CXCursorKind"), Some(e));
    assert_eq!(registry.lookup_non_typedef("enum CXCursorKind"), Some("CursorKind"));
    assert_eq!(registry.owner("CursorKind"), Some(Owner::Enum(e)));
    assert_eq!(registry.owner("UnsavedFile"), Some(Owner::Struct(s)));
    assert_eq!(registry.owner("Missing"), None);
}

#[test]
fn string_handle_is_builtin() {
    let d = Discovery::new("CXString");
    let (registry, _) = d.freeze();
    let id = registry
        .lookup_struct(STRING_HANDLE_NAME)
        .expect("built-in string handle");
    assert_eq!(registry.struct_(id).c_name, "CXString");
    assert!(registry.is_enum_or_struct(STRING_HANDLE_NAME));
    assert!(
        registry.lookup_struct("CXString").is_none(),
        "only the internal name is indexed"
    );
    assert!(registry.structs().is_empty());
    assert!(registry.struct_ids().is_empty());

    let (enums, structs) = registry.into_entities();
    assert!(enums.is_empty() && structs.is_empty());
}

#[test]
fn replacement_takes_over_every_name() {
    let mut d = Discovery::new("CXString");
    let old = d.register_struct(Struct::new("TranslationUnitImpl", "CXTranslationUnitImpl", false));
    d.replace_struct(old, Struct::new("TranslationUnit", "CXTranslationUnit", true));
    let (registry, _) = d.freeze();

    for name in [
        "TranslationUnitImpl",
        "CXTranslationUnitImpl",
        "TranslationUnit",
        "CXTranslationUnit",
    ] {
        assert_eq!(registry.lookup_struct(name), Some(old), "lookup of {name}");
    }
    assert_eq!(registry.struct_(old).name, "TranslationUnit");
    assert_eq!(
        registry.lookup_non_typedef("struct CXTranslationUnitImpl"),
        Some("TranslationUnit")
    );
    assert_eq!(registry.structs().len(), 1);
}

#[test]
fn freeze_hands_over_functions_in_order() {
    let mut d = Discovery::new("CXString");
    d.add_function(Function::new("clang_a", Type::scalar(Scalar::Void)));
    d.add_function(Function::new("clang_b", Type::scalar(Scalar::Void)));
    assert_eq!(d.functions().len(), 2);

    let (_, functions) = d.freeze();
    let names: Vec<&str> = functions.iter().map(|f| f.c_name.as_str()).collect();
    assert_eq!(names, ["clang_a", "clang_b"]);
}

#[test]
fn pointer_composition_is_per_struct() {
    let mut d = Discovery::new("CXString");
    let set = d.register_struct(Struct::new("StringSet", "CXStringSet", true));
    d.register_struct(Struct::new("Cursor", "CXCursor", true));
    let (mut registry, _) = d.freeze();

    registry.struct_mut(set).is_pointer_composition = true;
    assert!(registry.is_pointer_composition("StringSet"));
    assert!(registry.is_pointer_composition("CXStringSet"));
    assert!(!registry.is_pointer_composition("Cursor"));
}
