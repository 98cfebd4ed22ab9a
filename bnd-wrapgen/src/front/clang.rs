//! libclang backend.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clang::diagnostic::Severity;
use clang::{Entity, EntityKind, EntityVisitResult, Index, TranslationUnit};
use tracing::{debug, warn};

use crate::front::{ChildVisit, Cursor, DeclKind, DeclRef, TypeHandle, TypeKind};

/// Parse one header. Error and fatal diagnostics fail the parse; warnings
/// are logged.
pub fn parse_header<'i>(
    index: &'i Index<'_>,
    path: &Path,
    args: &[String],
) -> Result<TranslationUnit<'i>> {
    debug!(header = %path.display(), ?args, "parsing header");
    let tu = index
        .parser(path)
        .arguments(&args.iter().map(|s| s.as_str()).collect::<Vec<_>>())
        .skip_function_bodies(true)
        .parse()
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {:?}", path.display(), e))?;

    for diagnostic in tu.get_diagnostics() {
        match diagnostic.get_severity() {
            Severity::Error | Severity::Fatal => {
                bail!("{}: {}", path.display(), diagnostic.get_text());
            }
            Severity::Warning => warn!(header = %path.display(), "{}", diagnostic.get_text()),
            _ => {}
        }
    }
    Ok(tu)
}

#[derive(Debug, Clone, Copy)]
pub struct ClangCursor<'tu>(Entity<'tu>);

impl<'tu> ClangCursor<'tu> {
    pub fn new(entity: Entity<'tu>) -> Self {
        Self(entity)
    }

    /// Root cursor of a parsed translation unit.
    pub fn root(tu: &'tu TranslationUnit<'_>) -> Self {
        Self(tu.get_entity())
    }
}

impl<'tu> Cursor for ClangCursor<'tu> {
    type Type = ClangType<'tu>;

    fn kind(&self) -> DeclKind {
        match self.0.get_kind() {
            EntityKind::TranslationUnit => DeclKind::TranslationUnit,
            EntityKind::EnumDecl => DeclKind::Enum,
            EntityKind::EnumConstantDecl => DeclKind::EnumConstant,
            EntityKind::StructDecl => DeclKind::Struct,
            EntityKind::FieldDecl => DeclKind::Field,
            EntityKind::FunctionDecl => DeclKind::Function,
            EntityKind::ParmDecl => DeclKind::Parameter,
            EntityKind::TypedefDecl => DeclKind::Typedef,
            _ => DeclKind::Other,
        }
    }

    fn spelling(&self) -> String {
        self.0.get_name().unwrap_or_default()
    }

    fn display_name(&self) -> String {
        self.0.get_display_name().unwrap_or_default()
    }

    fn raw_comment(&self) -> Option<String> {
        self.0.get_comment()
    }

    fn ty(&self) -> Option<ClangType<'tu>> {
        self.0.get_type().map(ClangType)
    }

    fn result_type(&self) -> Option<ClangType<'tu>> {
        self.0.get_result_type().map(ClangType)
    }

    fn arguments(&self) -> Vec<Self> {
        self.0
            .get_arguments()
            .unwrap_or_default()
            .into_iter()
            .map(ClangCursor)
            .collect()
    }

    fn typedef_underlying(&self) -> Option<ClangType<'tu>> {
        self.0.get_typedef_underlying_type().map(ClangType)
    }

    fn enum_value(&self) -> Option<u64> {
        self.0.get_enum_constant_value().map(|(_, unsigned)| unsigned)
    }

    fn file(&self) -> Option<PathBuf> {
        let file = self.0.get_location()?.get_file_location().file?;
        Some(file.get_path())
    }

    fn visit(&self, visitor: &mut dyn FnMut(&Self, &Self) -> ChildVisit) -> bool {
        self.0.visit_children(|entity, parent| {
            match visitor(&ClangCursor(entity), &ClangCursor(parent)) {
                ChildVisit::Break => EntityVisitResult::Break,
                ChildVisit::Continue => EntityVisitResult::Continue,
                ChildVisit::Recurse => EntityVisitResult::Recurse,
            }
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClangType<'tu>(clang::Type<'tu>);

impl TypeHandle for ClangType<'_> {
    fn kind(&self) -> TypeKind {
        use clang::TypeKind as K;
        match self.0.get_kind() {
            K::Void => TypeKind::Void,
            K::Bool => TypeKind::Bool,
            K::CharS | K::CharU => TypeKind::Char,
            K::SChar => TypeKind::SChar,
            K::UChar => TypeKind::UChar,
            K::Short => TypeKind::Short,
            K::UShort => TypeKind::UShort,
            K::Int => TypeKind::Int,
            K::UInt => TypeKind::UInt,
            K::Long => TypeKind::Long,
            K::ULong => TypeKind::ULong,
            K::LongLong => TypeKind::LongLong,
            K::ULongLong => TypeKind::ULongLong,
            K::Float => TypeKind::Float,
            K::Double => TypeKind::Double,
            K::Pointer => TypeKind::Pointer,
            K::ConstantArray => TypeKind::ConstantArray,
            K::IncompleteArray => TypeKind::IncompleteArray,
            K::Record => TypeKind::Record,
            K::Enum => TypeKind::Enum,
            K::Typedef => TypeKind::Typedef,
            K::FunctionPrototype | K::FunctionNoPrototype => TypeKind::FunctionPrototype,
            K::Elaborated => TypeKind::Elaborated,
            K::Unexposed => TypeKind::Unexposed,
            other => TypeKind::Other(format!("{other:?}")),
        }
    }

    fn spelling(&self) -> String {
        self.0.get_display_name()
    }

    fn pointee(&self) -> Option<Self> {
        self.0.get_pointee_type().map(ClangType)
    }

    fn canonical(&self) -> Self {
        ClangType(self.0.get_canonical_type())
    }

    fn element(&self) -> Option<Self> {
        self.0.get_element_type().map(ClangType)
    }

    fn array_size(&self) -> Option<usize> {
        self.0.get_size()
    }

    fn declaration(&self) -> Option<DeclRef> {
        let decl = self.0.get_declaration()?;
        Some(DeclRef {
            display_name: decl.get_display_name().unwrap_or_default(),
            type_spelling: decl
                .get_type()
                .map(|t| t.get_display_name())
                .unwrap_or_default(),
        })
    }

    fn named(&self) -> Option<Self> {
        self.0.get_elaborated_type().map(ClangType)
    }
}
