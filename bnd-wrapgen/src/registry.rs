//! Entity registry: cross-references between typedefs, enums and structs.
//!
//! A [`Discovery`] session is opened before the headers are walked and is
//! the only way to register entities. [`Discovery::freeze`] closes the
//! session; the resulting [`Registry`] answers lookups for the shaping and
//! synthesis passes and only lets callers edit entities it already holds.

use std::collections::HashMap;
use std::ops::Deref;

use tracing::{debug, trace};

use crate::model::{Enum, Function, STRING_HANDLE_NAME, Struct};

/// Index of an enum in the registry's declaration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumId(usize);

/// Index of a struct in the registry's declaration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructId(usize);

/// The entity a name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Enum(EnumId),
    Struct(StructId),
}

#[derive(Debug)]
pub struct Registry {
    enums: Vec<Enum>,
    structs: Vec<Struct>,
    /// Number of leading built-in structs that are not part of the
    /// discovered declaration list.
    builtins: usize,
    enum_index: HashMap<String, EnumId>,
    struct_index: HashMap<String, StructId>,
    /// `"struct X"` / `"enum X"` → target name.
    non_typedef: HashMap<String, String>,
}

impl Registry {
    fn new(string_handle: &str) -> Self {
        let mut registry = Self {
            enums: Vec::new(),
            structs: Vec::new(),
            builtins: 0,
            enum_index: HashMap::new(),
            struct_index: HashMap::new(),
            non_typedef: HashMap::new(),
        };
        // Only the internal name is indexed: a discovered struct spelled like
        // the handle typedef keeps its own identity.
        registry
            .structs
            .push(Struct::new(STRING_HANDLE_NAME, string_handle, true));
        registry
            .struct_index
            .insert(STRING_HANDLE_NAME.to_string(), StructId(0));
        registry.builtins = 1;
        registry
    }

    pub fn lookup_enum(&self, name: &str) -> Option<EnumId> {
        self.enum_index.get(name).copied()
    }

    pub fn lookup_struct(&self, name: &str) -> Option<StructId> {
        self.struct_index.get(name).copied()
    }

    /// Resolve a `struct X` / `enum X` spelling to the target name of the
    /// entity registered for it.
    pub fn lookup_non_typedef(&self, spelling: &str) -> Option<&str> {
        self.non_typedef.get(spelling).map(String::as_str)
    }

    pub fn is_enum_or_struct(&self, name: &str) -> bool {
        self.owner(name).is_some()
    }

    pub fn owner(&self, name: &str) -> Option<Owner> {
        self.lookup_enum(name)
            .map(Owner::Enum)
            .or_else(|| self.lookup_struct(name).map(Owner::Struct))
    }

    pub fn enum_(&self, id: EnumId) -> &Enum {
        &self.enums[id.0]
    }

    pub fn enum_mut(&mut self, id: EnumId) -> &mut Enum {
        &mut self.enums[id.0]
    }

    pub fn struct_(&self, id: StructId) -> &Struct {
        &self.structs[id.0]
    }

    pub fn struct_mut(&mut self, id: StructId) -> &mut Struct {
        &mut self.structs[id.0]
    }

    /// Whether `name` is a struct marked for pointer composition.
    pub fn is_pointer_composition(&self, name: &str) -> bool {
        self.lookup_struct(name)
            .is_some_and(|id| self.struct_(id).is_pointer_composition)
    }

    /// Discovered enums in declaration order.
    pub fn enums(&self) -> &[Enum] {
        &self.enums
    }

    /// Discovered structs in declaration order (built-ins excluded).
    pub fn structs(&self) -> &[Struct] {
        &self.structs[self.builtins..]
    }

    pub fn enum_ids(&self) -> Vec<EnumId> {
        (0..self.enums.len()).map(EnumId).collect()
    }

    pub fn struct_ids(&self) -> Vec<StructId> {
        (self.builtins..self.structs.len()).map(StructId).collect()
    }

    /// Hand the discovered entities over, in declaration order.
    pub fn into_entities(self) -> (Vec<Enum>, Vec<Struct>) {
        let builtins = self.builtins;
        let structs = self.structs.into_iter().skip(builtins).collect();
        (self.enums, structs)
    }
}

/// An open discovery session: the registry plus the functions found so far.
#[derive(Debug)]
pub struct Discovery {
    registry: Registry,
    functions: Vec<Function>,
}

impl Discovery {
    pub fn new(string_handle: &str) -> Self {
        Self {
            registry: Registry::new(string_handle),
            functions: Vec::new(),
        }
    }

    /// Register an enum under its name, C name and `enum` spelling. The
    /// first registration of a name wins; later ones are dropped.
    pub fn register_enum(&mut self, e: Enum) -> EnumId {
        if let Some(id) = self.registry.lookup_enum(&e.name) {
            trace!(name = %e.name, "enum already registered");
            return id;
        }
        let id = EnumId(self.registry.enums.len());
        let r = &mut self.registry;
        r.enum_index.insert(e.name.clone(), id);
        r.enum_index.entry(e.c_name.clone()).or_insert(id);
        r.non_typedef
            .entry(format!("enum {}", e.c_name))
            .or_insert_with(|| e.name.clone());
        r.enums.push(e);
        id
    }

    /// Register a struct under its name, C name and `struct` spelling. The
    /// first registration of a name wins; later ones are dropped.
    pub fn register_struct(&mut self, s: Struct) -> StructId {
        if let Some(id) = self.registry.lookup_struct(&s.name) {
            trace!(name = %s.name, "struct already registered");
            return id;
        }
        let id = StructId(self.registry.structs.len());
        self.registry.structs.push(s);
        self.index_struct(id);
        id
    }

    fn index_struct(&mut self, id: StructId) {
        let r = &mut self.registry;
        let s = &r.structs[id.0];
        r.struct_index.entry(s.name.clone()).or_insert(id);
        r.struct_index.entry(s.c_name.clone()).or_insert(id);
        r.non_typedef
            .entry(format!("struct {}", s.c_name))
            .or_insert_with(|| s.name.clone());
    }

    /// Make `replacement` the authoritative identity of the struct at `old`.
    ///
    /// The replacement takes over the old slot in the declaration list, so
    /// every [`StructId`] handed out for the old struct, and all three of its
    /// index entries, now name the replacement. The replacement's own names
    /// are indexed on top.
    pub fn replace_struct(&mut self, old: StructId, replacement: Struct) {
        let r = &mut self.registry;
        let previous = std::mem::replace(&mut r.structs[old.0], replacement);
        let name = r.structs[old.0].name.clone();
        debug!(old = %previous.name, new = %name, "re-pointing struct");

        // The old name and C name keep resolving to the slot, which now holds
        // the replacement; only the spelling entry stores a name.
        r.non_typedef
            .insert(format!("struct {}", previous.c_name), name);
        self.index_struct(old);
    }

    pub fn add_function(&mut self, f: Function) {
        self.functions.push(f);
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Close the session.
    pub fn freeze(self) -> (Registry, Vec<Function>) {
        (self.registry, self.functions)
    }
}

impl Deref for Discovery {
    type Target = Registry;

    fn deref(&self) -> &Registry {
        &self.registry
    }
}
