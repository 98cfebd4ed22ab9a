//! Type translation: front-end type handles → [`Type`].

use thiserror::Error;
use tracing::trace;

use crate::front::{TypeHandle, TypeKind};
use crate::model::{BuiltinAlias, STRING_HANDLE_NAME, Scalar, Type};
use crate::naming::NamingRules;

#[derive(Debug, Error)]
pub enum TranslateError {
    /// A C type kind with no mapping. Aborts the run.
    #[error("unsupported C type `{spelling}` of kind {kind}")]
    Unsupported { spelling: String, kind: String },
    /// The front-end returned no type where one is required.
    #[error("missing type for {what}")]
    MissingType { what: String },
}

/// Translate a C type.
pub fn translate<T: TypeHandle>(ty: &T, naming: &NamingRules) -> Result<Type, TranslateError> {
    let kind = ty.kind();
    if let Some(scalar) = scalar_kind(&kind) {
        return Ok(Type::scalar(scalar));
    }

    let translated = match kind {
        TypeKind::Typedef => typedef(ty, naming),
        TypeKind::Pointer => pointer(ty, naming)?,
        TypeKind::ConstantArray | TypeKind::IncompleteArray => array(ty, naming)?,
        TypeKind::Record => {
            let c_name = declared_type_spelling(ty);
            Type {
                target_name: naming.trim_language_prefix(&trim_tag(&c_name)),
                c_name,
                array_size: -1,
                ..Default::default()
            }
        }
        TypeKind::Enum => {
            let display = ty
                .declaration()
                .map(|d| d.display_name)
                .unwrap_or_else(|| trim_tag(&ty.spelling()));
            Type {
                c_name: declared_type_spelling(ty),
                target_name: naming.trim_language_prefix(&display),
                is_primitive: true,
                is_enum_literal: true,
                array_size: -1,
                ..Default::default()
            }
        }
        TypeKind::FunctionPrototype => function_pointer(ty.spelling()),
        TypeKind::Elaborated => match ty.named() {
            Some(named) => translate(&named, naming)?,
            None => resolve_canonical(ty, naming)?,
        },
        // libclang reports some enum references as unexposed; the canonical
        // type carries the real kind.
        TypeKind::Unexposed => resolve_canonical(ty, naming)?,
        kind => return Err(unsupported(ty, &kind)),
    };
    trace!(spelling = %ty.spelling(), target = %translated.target_name, level = translated.pointer_level, "translated type");
    Ok(translated)
}

fn scalar_kind(kind: &TypeKind) -> Option<Scalar> {
    let scalar = match kind {
        TypeKind::Void => Scalar::Void,
        TypeKind::Bool => Scalar::Bool,
        TypeKind::Char => Scalar::Char,
        TypeKind::SChar => Scalar::SChar,
        TypeKind::UChar => Scalar::UChar,
        TypeKind::Short => Scalar::Short,
        TypeKind::UShort => Scalar::UShort,
        TypeKind::Int => Scalar::Int,
        TypeKind::UInt => Scalar::UInt,
        TypeKind::Long => Scalar::Long,
        TypeKind::ULong => Scalar::ULong,
        TypeKind::LongLong => Scalar::LongLong,
        TypeKind::ULongLong => Scalar::ULongLong,
        TypeKind::Float => Scalar::Float,
        TypeKind::Double => Scalar::Double,
        _ => return None,
    };
    Some(scalar)
}

fn unsupported<T: TypeHandle>(ty: &T, kind: &TypeKind) -> TranslateError {
    TranslateError::Unsupported {
        spelling: ty.spelling(),
        kind: format!("{kind:?}"),
    }
}

fn resolve_canonical<T: TypeHandle>(ty: &T, naming: &NamingRules) -> Result<Type, TranslateError> {
    let canonical = ty.canonical();
    match canonical.kind() {
        kind @ (TypeKind::Unexposed | TypeKind::Elaborated) => Err(unsupported(ty, &kind)),
        _ => translate(&canonical, naming),
    }
}

/// Spelling of the type's own declaration, without qualifiers.
fn declared_type_spelling<T: TypeHandle>(ty: &T) -> String {
    ty.declaration()
        .map(|d| d.type_spelling)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ty.spelling().trim_start_matches("const ").to_string())
}

fn trim_tag(spelling: &str) -> String {
    spelling
        .strip_prefix("struct ")
        .or_else(|| spelling.strip_prefix("union "))
        .or_else(|| spelling.strip_prefix("enum "))
        .unwrap_or(spelling)
        .to_string()
}

fn function_pointer(spelling: String) -> Type {
    Type {
        target_name: spelling.clone(),
        c_name: spelling,
        is_function_pointer: true,
        array_size: -1,
        ..Default::default()
    }
}

fn typedef<T: TypeHandle>(ty: &T, naming: &NamingRules) -> Type {
    let c_name = declared_type_spelling(ty);

    if c_name == naming.string_handle {
        return Type {
            c_name,
            target_name: STRING_HANDLE_NAME.to_string(),
            alias: Some(BuiltinAlias::StringHandle),
            array_size: -1,
            ..Default::default()
        };
    }
    if c_name == naming.time_type {
        return Type {
            c_name,
            target_name: "SystemTime".to_string(),
            alias: Some(BuiltinAlias::Time),
            is_primitive: true,
            array_size: -1,
            ..Default::default()
        };
    }

    let mut translated = Type {
        target_name: naming.trim_language_prefix(&c_name),
        c_name,
        array_size: -1,
        ..Default::default()
    };
    let canonical = ty.canonical();
    match canonical.kind() {
        TypeKind::Enum => {
            translated.is_primitive = true;
            translated.is_enum_literal = true;
        }
        TypeKind::FunctionPrototype => translated.is_function_pointer = true,
        TypeKind::Pointer => {
            translated.is_function_pointer = canonical
                .pointee()
                .is_some_and(|p| p.canonical().kind() == TypeKind::FunctionPrototype);
        }
        _ => {}
    }
    translated
}

fn pointer<T: TypeHandle>(ty: &T, naming: &NamingRules) -> Result<Type, TranslateError> {
    let pointee = ty.pointee().ok_or_else(|| TranslateError::MissingType {
        what: format!("pointee of `{}`", ty.spelling()),
    })?;

    // Function pointers are opaque: their prototypes are never walked.
    if pointee.canonical().kind() == TypeKind::FunctionPrototype {
        let mut translated = function_pointer(ty.spelling());
        translated.pointer_level = 1;
        return Ok(translated);
    }

    let inner = translate(&pointee, naming)?;
    Ok(Type {
        pointer_level: inner.pointer_level + 1,
        is_array: false,
        array_size: -1,
        ..inner
    })
}

fn array<T: TypeHandle>(ty: &T, naming: &NamingRules) -> Result<Type, TranslateError> {
    let element = ty.element().ok_or_else(|| TranslateError::MissingType {
        what: format!("element of `{}`", ty.spelling()),
    })?;
    let inner = translate(&element, naming)?;
    let array_size = match ty.kind() {
        TypeKind::ConstantArray => ty
            .array_size()
            .and_then(|n| i64::try_from(n).ok())
            .unwrap_or(-1),
        _ => -1,
    };
    Ok(Type {
        is_array: true,
        array_size,
        ..inner
    })
}
