//! Wrapper bodies: argument conversion, native cleanups and result
//! assembly.

mod common;

use std::sync::LazyLock;

use bnd_wrapgen::generate::Bindings;
use bnd_wrapgen::ir::{Cleanup, Conversion, ElementConversion, Expr, Method, Param, Stmt, TargetType};
use bnd_wrapgen::marshal::Marshaller;
use bnd_wrapgen::model::{Function, FunctionParameter, Scalar, Struct, Type};
use bnd_wrapgen::registry::Discovery;

static INDEX: LazyLock<Bindings> = LazyLock::new(common::bind_index);

fn native_call(m: &Method) -> (&str, &[Expr]) {
    m.body
        .iter()
        .find_map(|stmt| match stmt {
            Stmt::Let {
                value: Expr::NativeCall { function, args },
                ..
            }
            | Stmt::Expr(Expr::NativeCall { function, args }) => Some((function.as_str(), args.as_slice())),
            _ => None,
        })
        .unwrap_or_else(|| panic!("{} makes no native call", m.name))
}

fn position(m: &Method, pred: impl Fn(&Stmt) -> bool) -> usize {
    m.body
        .iter()
        .position(pred)
        .unwrap_or_else(|| panic!("statement not found in {}: {:#?}", m.name, m.body))
}

#[test]
fn strings_and_string_arrays_in() {
    let m = common::method(&INDEX, "Index", "ParseTranslationUnit");
    assert!(m.has_receiver);
    assert_eq!(
        m.params,
        [
            Param {
                name: "source_filename".to_string(),
                ty: TargetType::Str,
            },
            Param {
                name: "command_line_args".to_string(),
                ty: TargetType::SliceRef(Box::new(TargetType::Str)),
            },
        ]
    );
    assert_eq!(m.returns, TargetType::Named("TranslationUnit".to_string()));

    let (function, args) = native_call(m);
    assert_eq!(function, "clang_parseTranslationUnit");
    assert_eq!(args.len(), 4, "every native parameter gets an argument");
    assert_eq!(
        args[3],
        Expr::Convert {
            value: Box::new(Expr::Len("command_line_args".to_string())),
            to: Conversion::Native,
        },
        "the count comes from the slice"
    );

    let cleanups = m.cleanups();
    assert!(cleanups.contains(&&Cleanup::ReleaseString("c_source_filename".to_string())));
    assert!(
        cleanups.contains(&&Cleanup::ReleaseString("ci_str".to_string())),
        "each array element is released"
    );
    assert!(m.body.contains(&Stmt::DeferList("cs_command_line_args".to_string())));
}

#[test]
fn cleanups_are_scheduled_after_the_call() {
    let m = common::method(&INDEX, "Index", "ParseTranslationUnit");
    let call = position(m, |s| matches!(s, Stmt::Let { name, .. } if name == "o"));
    let release = position(m, |s| {
        matches!(s, Stmt::Defer { cleanup: Cleanup::ReleaseString(name), list: None } if name == "c_source_filename")
    });
    let conversion = position(m, |s| matches!(s, Stmt::Let { name, .. } if name == "c_source_filename"));
    assert!(conversion < call && call < release);
    assert!(matches!(m.body.last(), Some(Stmt::Return(_))));
}

#[test]
fn return_arguments_join_the_result_tuple() {
    let m = common::method(&INDEX, "Cursor", "Location");
    assert!(m.params.is_empty(), "out-parameters are not positional");
    assert_eq!(
        m.returns,
        TargetType::Tuple(vec![
            TargetType::Scalar("u32".to_string()),
            TargetType::String,
            TargetType::Scalar("u32".to_string()),
        ])
    );
    assert_eq!(m.cleanups(), [&Cleanup::DisposeString("file".to_string())]);

    let (_, args) = native_call(m);
    assert_eq!(
        &args[1..],
        [
            Expr::AddrOfMut("file".to_string()),
            Expr::AddrOfMut("line".to_string())
        ]
    );
}

#[test]
fn string_results_are_released() {
    let m = common::method(&INDEX, "Cursor", "Spelling");
    assert_eq!(m.returns, TargetType::String);
    assert_eq!(m.cleanups(), [&Cleanup::DisposeString("o".to_string())]);

    let m = INDEX.function("GetVersionString").expect("GetVersionString");
    assert_eq!(
        m.returns,
        TargetType::Tuple(vec![TargetType::Scalar("i32".to_string()), TargetType::String])
    );
    assert_eq!(m.cleanups(), [&Cleanup::FreeNative("out".to_string())]);
}

#[test]
fn scalar_pointer_is_optional_in_out_value() {
    let m = common::method(&INDEX, "Cursor", "SetDepth");
    assert_eq!(
        m.params,
        [Param {
            name: "depth".to_string(),
            ty: TargetType::OptionalMut(Box::new(TargetType::Scalar("i32".to_string()))),
        }]
    );
    assert_eq!(m.returns, TargetType::Unit);
    let write_backs = m
        .body
        .iter()
        .filter(|s| matches!(s, Stmt::IfSome { .. }))
        .count();
    assert_eq!(write_backs, 2, "value read before and written back after the call");
}

#[test]
fn pointer_results_are_optional() {
    let m = common::method(&INDEX, "Cursor", "Strings");
    assert_eq!(
        m.returns,
        TargetType::Optional(Box::new(TargetType::Named("StringSet".to_string())))
    );
}

#[test]
fn member_getters_read_through_pointer_receivers() {
    let m = common::method(&INDEX, "StringSet", "Strings");
    assert!(m.has_receiver);
    assert_eq!(
        m.returns,
        TargetType::Vec(Box::new(TargetType::Named("NativeString".to_string())))
    );
    assert!(m.cleanups().is_empty(), "getters do not release what the struct owns");

    let Some(Stmt::Let { value, .. }) = m.body.first() else {
        panic!("getter should bind the member first: {:#?}", m.body);
    };
    assert!(
        matches!(value, Expr::Field { field, through_pointer: true, .. } if field == "Strings"),
        "Found: {value:?}"
    );
    let Some(Stmt::Return(Expr::SliceView { len, element, .. })) = m.body.last() else {
        panic!("getter should return a slice view: {:#?}", m.body);
    };
    assert!(matches!(len.as_ref(), Expr::Field { field, .. } if field == "Count"));
    assert_eq!(*element, ElementConversion::Compose("NativeString".to_string()));
}

#[test]
fn enum_results_and_time() {
    let m = common::method(&INDEX, "Cursor", "Kind");
    assert_eq!(m.returns, TargetType::Named("CursorKind".to_string()));
    let m = common::method(&INDEX, "File", "Time");
    assert_eq!(m.returns, TargetType::Time);
    let m = common::method(&INDEX, "TranslationUnit", "SaveTranslationUnit");
    assert_eq!(m.returns, TargetType::Named("SaveError".to_string()));
    assert_eq!(
        m.params,
        [Param {
            name: "file_name".to_string(),
            ty: TargetType::Str,
        }]
    );
}

#[test]
fn struct_out_parameter_without_receiver() {
    // int clang_f(int x, CXThing **out)
    let thing = Type {
        target_name: "Thing".to_string(),
        c_name: "CXThing".to_string(),
        pointer_level: 2,
        array_size: -1,
        is_return_argument: true,
        ..Default::default()
    };
    let mut f = Function::new("clang_f", Type::scalar(Scalar::Int));
    f.name = "F".to_string();
    f.parameters.push(FunctionParameter {
        name: "x".to_string(),
        c_name: "x".to_string(),
        ty: Type::scalar(Scalar::Int),
    });
    f.parameters.push(FunctionParameter {
        name: "out".to_string(),
        c_name: "out".to_string(),
        ty: thing,
    });
    assert_eq!(f.positional_parameters().count(), 1);

    let mut d = Discovery::new("CXString");
    d.register_struct(Struct::new("Thing", "CXThing", true));
    let (registry, _) = d.freeze();
    let m = Marshaller::new(&registry).method(&f);

    assert_eq!(m.params.len(), 1);
    assert_eq!(m.params[0].name, "x");
    let TargetType::Tuple(items) = &m.returns else {
        panic!("expected a tuple, found {:?}", m.returns);
    };
    assert_eq!(
        items,
        &[
            TargetType::Scalar("i32".to_string()),
            TargetType::Optional(Box::new(TargetType::Named("Thing".to_string()))),
        ]
    );
}
