//! Header front-end boundary.
//!
//! The discovery pass and the type translator only see declarations through
//! the [`Cursor`] and [`TypeHandle`] traits. [`clang`] implements them over
//! libclang; [`tree`] over a declaration tree built in memory.

use std::path::PathBuf;

pub mod clang;
pub mod tree;

/// Declaration kinds the discovery pass distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    TranslationUnit,
    Enum,
    EnumConstant,
    Struct,
    Field,
    Function,
    Parameter,
    Typedef,
    Other,
}

/// C type kinds the type translator distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Void,
    Bool,
    /// Plain `char`, either signedness.
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    Pointer,
    ConstantArray,
    IncompleteArray,
    Record,
    Enum,
    Typedef,
    FunctionPrototype,
    /// Sugar for a named type (`struct X`, or a typedef name in newer
    /// libclang releases).
    Elaborated,
    /// A front-end reporting gap; the canonical type tells the truth.
    Unexposed,
    Other(String),
}

/// What a visitor asks the traversal to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildVisit {
    /// Stop the whole traversal.
    Break,
    /// Skip this node's children, continue with its next sibling.
    Continue,
    /// Descend into this node's children.
    Recurse,
}

/// Back-reference from a type to the declaration that introduced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclRef {
    /// Display name of the declaration (`CXCursorKind`).
    pub display_name: String,
    /// Spelling of the declaration's own type (`enum CXCursorKind`).
    pub type_spelling: String,
}

pub trait TypeHandle: Sized {
    fn kind(&self) -> TypeKind;
    fn spelling(&self) -> String;
    fn pointee(&self) -> Option<Self>;
    fn canonical(&self) -> Self;
    fn element(&self) -> Option<Self>;
    fn array_size(&self) -> Option<usize>;
    fn declaration(&self) -> Option<DeclRef>;
    /// The type an [`TypeKind::Elaborated`] spelling names.
    fn named(&self) -> Option<Self>;
}

pub trait Cursor: Sized {
    type Type: TypeHandle;

    fn kind(&self) -> DeclKind;
    fn spelling(&self) -> String;
    fn display_name(&self) -> String;
    fn raw_comment(&self) -> Option<String>;
    fn ty(&self) -> Option<Self::Type>;
    fn result_type(&self) -> Option<Self::Type>;
    /// Parameters of a function declaration.
    fn arguments(&self) -> Vec<Self>;
    fn typedef_underlying(&self) -> Option<Self::Type>;
    fn enum_value(&self) -> Option<u64>;
    /// File the declaration is spelled in.
    fn file(&self) -> Option<PathBuf>;
    /// Depth-first visit of the children. Returns `true` when the visitor
    /// stopped the traversal early.
    fn visit(&self, visitor: &mut dyn FnMut(&Self, &Self) -> ChildVisit) -> bool;
}
