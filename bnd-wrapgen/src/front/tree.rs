//! In-memory declaration tree.
//!
//! Declarations are added through a small builder API and read back through
//! the [`Cursor`]/[`TypeHandle`] traits. Traversal goes through a C-ABI
//! visit function shaped like libclang's `clang_visitChildren`: it takes an
//! `extern "C"` visitor and an opaque client-data word, so closures reach it
//! through the tree's [`CallbackRegistry`].

use std::ffi::{c_uint, c_void};
use std::path::{Path, PathBuf};

use crate::callback::{CallbackRegistry, Handle};
use crate::front::{ChildVisit, Cursor, DeclKind, DeclRef, TypeHandle, TypeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(usize);

#[derive(Debug)]
struct Node {
    kind: DeclKind,
    spelling: String,
    comment: Option<String>,
    ty: Option<TypeId>,
    result: Option<TypeId>,
    underlying: Option<TypeId>,
    value: Option<u64>,
    file: Option<PathBuf>,
    children: Vec<NodeId>,
    params: Vec<NodeId>,
}

#[derive(Debug)]
struct TypeData {
    kind: TypeKind,
    spelling: String,
    pointee: Option<TypeId>,
    canonical: Option<TypeId>,
    element: Option<TypeId>,
    size: Option<usize>,
    decl: Option<DeclRef>,
    named: Option<TypeId>,
}

impl TypeData {
    fn new(kind: TypeKind, spelling: impl Into<String>) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            pointee: None,
            canonical: None,
            element: None,
            size: None,
            decl: None,
            named: None,
        }
    }
}

#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    types: Vec<TypeData>,
    file: PathBuf,
    callbacks: CallbackRegistry<NodeId>,
}

impl Tree {
    /// A tree whose translation unit is `file`. Declarations added later are
    /// located in `file` until [`set_file`](Self::set_file) says otherwise.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let root = Node {
            kind: DeclKind::TranslationUnit,
            spelling: file.display().to_string(),
            comment: None,
            ty: None,
            result: None,
            underlying: None,
            value: None,
            file: None,
            children: Vec::new(),
            params: Vec::new(),
        };
        Self {
            nodes: vec![root],
            types: Vec::new(),
            file,
            callbacks: CallbackRegistry::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn cursor(&self, id: NodeId) -> TreeCursor<'_> {
        TreeCursor { tree: self, id }
    }

    pub fn root_cursor(&self) -> TreeCursor<'_> {
        self.cursor(self.root())
    }

    /// Closures currently registered for traversal.
    pub fn callbacks(&self) -> &CallbackRegistry<NodeId> {
        &self.callbacks
    }

    /// Locate subsequently added declarations in `file`.
    pub fn set_file(&mut self, file: impl Into<PathBuf>) {
        self.file = file.into();
    }

    pub fn set_comment(&mut self, node: NodeId, comment: &str) {
        self.nodes[node.0].comment = Some(comment.to_string());
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    fn push_type(&mut self, data: TypeData) -> TypeId {
        self.types.push(data);
        TypeId(self.types.len() - 1)
    }

    fn canonical_of(&self, ty: TypeId) -> TypeId {
        self.types[ty.0].canonical.unwrap_or(ty)
    }

    fn spelling_of(&self, ty: TypeId) -> &str {
        &self.types[ty.0].spelling
    }

    /// A scalar type. Non-scalar kinds get their debug name as spelling.
    pub fn builtin(&mut self, kind: TypeKind) -> TypeId {
        let spelling = match &kind {
            TypeKind::Void => "void",
            TypeKind::Bool => "bool",
            TypeKind::Char => "char",
            TypeKind::SChar => "signed char",
            TypeKind::UChar => "unsigned char",
            TypeKind::Short => "short",
            TypeKind::UShort => "unsigned short",
            TypeKind::Int => "int",
            TypeKind::UInt => "unsigned int",
            TypeKind::Long => "long",
            TypeKind::ULong => "unsigned long",
            TypeKind::LongLong => "long long",
            TypeKind::ULongLong => "unsigned long long",
            TypeKind::Float => "float",
            TypeKind::Double => "double",
            TypeKind::Other(name) => name.as_str(),
            _ => "<builtin>",
        }
        .to_string();
        self.push_type(TypeData::new(kind, spelling))
    }

    pub fn pointer(&mut self, pointee: TypeId) -> TypeId {
        let inner = self.spelling_of(pointee);
        let spelling = if inner.ends_with('*') {
            format!("{inner}*")
        } else {
            format!("{inner} *")
        };
        let canonical_pointee = self.canonical_of(pointee);
        let canonical = (canonical_pointee != pointee).then(|| self.pointer(canonical_pointee));
        let mut data = TypeData::new(TypeKind::Pointer, spelling);
        data.pointee = Some(pointee);
        data.canonical = canonical;
        self.push_type(data)
    }

    pub fn constant_array(&mut self, element: TypeId, size: usize) -> TypeId {
        let spelling = format!("{} [{size}]", self.spelling_of(element));
        let mut data = TypeData::new(TypeKind::ConstantArray, spelling);
        data.element = Some(element);
        data.size = Some(size);
        self.push_type(data)
    }

    pub fn incomplete_array(&mut self, element: TypeId) -> TypeId {
        let spelling = format!("{} []", self.spelling_of(element));
        let mut data = TypeData::new(TypeKind::IncompleteArray, spelling);
        data.element = Some(element);
        self.push_type(data)
    }

    pub fn function_proto(&mut self, result: TypeId, params: &[TypeId]) -> TypeId {
        let params: Vec<&str> = params.iter().map(|p| self.spelling_of(*p)).collect();
        let spelling = format!("{} ({})", self.spelling_of(result), params.join(", "));
        self.push_type(TypeData::new(TypeKind::FunctionPrototype, spelling))
    }

    /// Sugar spelling `named` (`struct X` written in a declaration).
    pub fn elaborated(&mut self, named: TypeId) -> TypeId {
        let mut data = TypeData::new(TypeKind::Elaborated, self.spelling_of(named).to_string());
        data.named = Some(named);
        data.canonical = Some(self.canonical_of(named));
        self.push_type(data)
    }

    /// A type the front-end reports as unexposed; its canonical form is
    /// `actual`'s.
    pub fn unexposed(&mut self, actual: TypeId) -> TypeId {
        let mut data = TypeData::new(TypeKind::Unexposed, self.spelling_of(actual).to_string());
        data.canonical = Some(self.canonical_of(actual));
        self.push_type(data)
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn push_node(&mut self, parent: NodeId, kind: DeclKind, spelling: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            spelling: spelling.to_string(),
            comment: None,
            ty: None,
            result: None,
            underlying: None,
            value: None,
            file: Some(self.file.clone()),
            children: Vec::new(),
            params: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// A struct declaration; an empty `name` declares an anonymous struct.
    pub fn add_struct(&mut self, parent: NodeId, name: &str) -> (NodeId, TypeId) {
        let node = self.push_node(parent, DeclKind::Struct, name);
        let spelling = format!("struct {name}");
        let mut data = TypeData::new(TypeKind::Record, spelling.clone());
        data.decl = Some(DeclRef {
            display_name: name.to_string(),
            type_spelling: spelling,
        });
        let ty = self.push_type(data);
        self.nodes[node.0].ty = Some(ty);
        (node, ty)
    }

    pub fn add_field(&mut self, parent: NodeId, name: &str, ty: TypeId) -> NodeId {
        let node = self.push_node(parent, DeclKind::Field, name);
        self.nodes[node.0].ty = Some(ty);
        node
    }

    pub fn add_enum(&mut self, parent: NodeId, name: &str) -> (NodeId, TypeId) {
        let node = self.push_node(parent, DeclKind::Enum, name);
        let spelling = format!("enum {name}");
        let mut data = TypeData::new(TypeKind::Enum, spelling.clone());
        data.decl = Some(DeclRef {
            display_name: name.to_string(),
            type_spelling: spelling,
        });
        let ty = self.push_type(data);
        self.nodes[node.0].ty = Some(ty);
        (node, ty)
    }

    pub fn add_enum_constant(&mut self, parent: NodeId, name: &str, value: u64) -> NodeId {
        let node = self.push_node(parent, DeclKind::EnumConstant, name);
        self.nodes[node.0].value = Some(value);
        node
    }

    /// `typedef <underlying> name;`
    pub fn add_typedef(&mut self, parent: NodeId, name: &str, underlying: TypeId) -> (NodeId, TypeId) {
        let node = self.push_node(parent, DeclKind::Typedef, name);
        let mut data = TypeData::new(TypeKind::Typedef, name);
        data.canonical = Some(self.canonical_of(underlying));
        data.decl = Some(DeclRef {
            display_name: name.to_string(),
            type_spelling: name.to_string(),
        });
        let ty = self.push_type(data);
        self.nodes[node.0].ty = Some(ty);
        self.nodes[node.0].underlying = Some(underlying);
        (node, ty)
    }

    pub fn add_function(
        &mut self,
        parent: NodeId,
        name: &str,
        result: TypeId,
        params: &[(&str, TypeId)],
    ) -> NodeId {
        let param_types: Vec<TypeId> = params.iter().map(|(_, ty)| *ty).collect();
        let proto = self.function_proto(result, &param_types);
        let node = self.push_node(parent, DeclKind::Function, name);
        self.nodes[node.0].ty = Some(proto);
        self.nodes[node.0].result = Some(result);
        for (param_name, ty) in params {
            let param = self.push_node(node, DeclKind::Parameter, param_name);
            self.nodes[param.0].ty = Some(*ty);
            self.nodes[node.0].params.push(param);
        }
        node
    }

    // -----------------------------------------------------------------------
    // Native traversal
    // -----------------------------------------------------------------------

    fn raw(&self, id: NodeId) -> RawNode {
        RawNode {
            tree: self,
            id: id.0,
        }
    }

    /// Returns `true` when the visitor broke off the traversal.
    fn walk(&self, parent: NodeId, visitor: NativeVisitor, data: *mut c_void) -> bool {
        for &child in &self.nodes[parent.0].children {
            match visitor(self.raw(child), self.raw(parent), data) {
                VISIT_CONTINUE => {}
                VISIT_RECURSE => {
                    if self.walk(child, visitor, data) {
                        return true;
                    }
                }
                _ => return true,
            }
        }
        false
    }
}

/// A node as seen across the C boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawNode {
    tree: *const Tree,
    id: usize,
}

pub const VISIT_BREAK: c_uint = 0;
pub const VISIT_CONTINUE: c_uint = 1;
pub const VISIT_RECURSE: c_uint = 2;

pub type NativeVisitor = extern "C-unwind" fn(RawNode, RawNode, *mut c_void) -> c_uint;

/// Visit the children of `parent` depth-first, calling `visitor` with each
/// child, its parent and `data`. Returns non-zero when the visitor stopped
/// the traversal.
///
/// # Safety
///
/// `parent` must come from a [`Tree`] that stays alive and unmodified for
/// the duration of the call.
pub unsafe extern "C-unwind" fn visit_children(
    parent: RawNode,
    visitor: NativeVisitor,
    data: *mut c_void,
) -> c_uint {
    // SAFETY: guaranteed by the caller.
    let tree = unsafe { &*parent.tree };
    c_uint::from(tree.walk(NodeId(parent.id), visitor, data))
}

extern "C-unwind" fn trampoline(node: RawNode, parent: RawNode, data: *mut c_void) -> c_uint {
    // SAFETY: `visit_children` only passes nodes of the live tree it walks.
    let tree = unsafe { &*node.tree };
    let handle = Handle::from_client_data(data);
    // SAFETY: `TreeCursor::visit` registered `handle` on this thread and is
    // blocked in the traversal calling us.
    let visit = unsafe {
        tree.callbacks
            .dispatch(handle, NodeId(node.id), NodeId(parent.id))
    };
    match visit {
        Some(ChildVisit::Recurse) => VISIT_RECURSE,
        Some(ChildVisit::Continue) => VISIT_CONTINUE,
        Some(ChildVisit::Break) | None => VISIT_BREAK,
    }
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct TreeCursor<'t> {
    tree: &'t Tree,
    id: NodeId,
}

impl TreeCursor<'_> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn node(&self) -> &Node {
        &self.tree.nodes[self.id.0]
    }
}

impl<'t> Cursor for TreeCursor<'t> {
    type Type = TreeType<'t>;

    fn kind(&self) -> DeclKind {
        self.node().kind
    }

    fn spelling(&self) -> String {
        self.node().spelling.clone()
    }

    fn display_name(&self) -> String {
        self.node().spelling.clone()
    }

    fn raw_comment(&self) -> Option<String> {
        self.node().comment.clone()
    }

    fn ty(&self) -> Option<TreeType<'t>> {
        let tree = self.tree;
        tree.nodes[self.id.0].ty.map(|id| TreeType { tree, id })
    }

    fn result_type(&self) -> Option<TreeType<'t>> {
        let tree = self.tree;
        tree.nodes[self.id.0].result.map(|id| TreeType { tree, id })
    }

    fn arguments(&self) -> Vec<Self> {
        self.node()
            .params
            .iter()
            .map(|&id| self.tree.cursor(id))
            .collect()
    }

    fn typedef_underlying(&self) -> Option<TreeType<'t>> {
        let tree = self.tree;
        tree.nodes[self.id.0].underlying.map(|id| TreeType { tree, id })
    }

    fn enum_value(&self) -> Option<u64> {
        self.node().value
    }

    fn file(&self) -> Option<PathBuf> {
        self.node().file.clone()
    }

    fn visit(&self, visitor: &mut dyn FnMut(&Self, &Self) -> ChildVisit) -> bool {
        let tree = self.tree;
        let mut bridge =
            |node: NodeId, parent: NodeId| visitor(&tree.cursor(node), &tree.cursor(parent));
        tree.callbacks.scope(&mut bridge, |handle| {
            // SAFETY: `tree` is borrowed, so alive and unmodified, for the
            // whole traversal.
            let stopped =
                unsafe { visit_children(tree.raw(self.id), trampoline, handle.as_client_data()) };
            stopped != 0
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TreeType<'t> {
    tree: &'t Tree,
    id: TypeId,
}

impl TreeType<'_> {
    fn data(&self) -> &TypeData {
        &self.tree.types[self.id.0]
    }
}

impl<'t> TreeType<'t> {
    fn at(&self, id: Option<TypeId>) -> Option<TreeType<'t>> {
        let tree = self.tree;
        id.map(|id| TreeType { tree, id })
    }
}

impl TypeHandle for TreeType<'_> {
    fn kind(&self) -> TypeKind {
        self.data().kind.clone()
    }

    fn spelling(&self) -> String {
        self.data().spelling.clone()
    }

    fn pointee(&self) -> Option<Self> {
        self.at(self.data().pointee)
    }

    fn canonical(&self) -> Self {
        TreeType {
            tree: self.tree,
            id: self.tree.canonical_of(self.id),
        }
    }

    fn element(&self) -> Option<Self> {
        self.at(self.data().element)
    }

    fn array_size(&self) -> Option<usize> {
        self.data().size
    }

    fn declaration(&self) -> Option<DeclRef> {
        self.data().decl.clone()
    }

    fn named(&self) -> Option<Self> {
        self.at(self.data().named)
    }
}

impl Tree {
    /// Path of the file declarations are currently added to.
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn ty(&self, id: TypeId) -> TreeType<'_> {
        TreeType { tree: self, id }
    }
}
