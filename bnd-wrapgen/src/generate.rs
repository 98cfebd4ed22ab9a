//! Generation driver: shape the discovered functions into methods, add
//! member getters and enum spellings, and marshal everything into
//! [`Bindings`] ready for emission.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info, warn};

use crate::hooks::Hooks;
use crate::ir::{Method, TargetType};
use crate::marshal::{Marshaller, enum_spelling};
use crate::model::{EnumItem, Function, FunctionParameter, Receiver, Scalar, Struct, Type};
use crate::naming::{self, NamingRules};
use crate::registry::{Registry, StructId};
use crate::shape::{self, Placement, Unclassifiable};

/// Something the generator left out, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEntry {
    /// Excluded by the filter hook.
    Filtered { function: String },
    Unclassifiable(Unclassifiable),
    /// A second method of the same name on one owner.
    NameCollision {
        function: String,
        owner: String,
        name: String,
    },
    /// An enum or struct no generated signature mentions and that has no
    /// methods of its own.
    Unused { name: String },
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportEntry::Filtered { function } => write!(f, "`{function}` filtered out"),
            ReportEntry::Unclassifiable(e) => e.fmt(f),
            ReportEntry::NameCollision {
                function,
                owner,
                name,
            } => write!(f, "`{function}` collides with `{owner}::{name}`"),
            ReportEntry::Unused { name } => write!(f, "`{name}` is not used by any binding"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub entries: Vec<ReportEntry>,
}

impl Report {
    fn push(&mut self, entry: ReportEntry) {
        match &entry {
            ReportEntry::Filtered { function } => debug!(function = %function, "filtered"),
            _ => warn!("{entry}"),
        }
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unclassifiable(&self) -> impl Iterator<Item = &Unclassifiable> {
        self.entries.iter().filter_map(|e| match e {
            ReportEntry::Unclassifiable(u) => Some(u),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EnumBinding {
    pub name: String,
    pub c_name: String,
    pub comment: String,
    pub underlying: Scalar,
    pub items: Vec<EnumItem>,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone)]
pub struct StructBinding {
    pub name: String,
    pub c_name: String,
    pub comment: String,
    /// The wrapper holds a pointer to the native value.
    pub is_pointer_composition: bool,
    pub methods: Vec<Method>,
}

/// Everything to emit.
#[derive(Debug, Clone)]
pub struct Bindings {
    pub enums: Vec<EnumBinding>,
    pub structs: Vec<StructBinding>,
    pub functions: Vec<Method>,
    pub report: Report,
}

impl Bindings {
    pub fn enum_(&self, name: &str) -> Option<&EnumBinding> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn struct_(&self, name: &str) -> Option<&StructBinding> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&Method> {
        self.functions.iter().find(|m| m.name == name)
    }
}

/// Shape, complete and marshal the declarations of a frozen discovery.
pub fn synthesize(
    mut registry: Registry,
    functions: Vec<Function>,
    hooks: &dyn Hooks,
    naming: &NamingRules,
) -> Bindings {
    let mut report = Report::default();
    let total = functions.len();

    let mut free = Vec::new();
    for f in functions {
        match shape_function(f, &mut registry, hooks, naming) {
            Ok(Placement::Free(f)) => free.push(f),
            Ok(Placement::Method { .. }) => {}
            Err(entry) => report.push(entry),
        }
    }

    for id in registry.struct_ids() {
        add_member_getters(&mut registry, id, hooks);
    }

    let mut enums = Vec::new();
    for id in registry.enum_ids() {
        let (owner_name, methods) = {
            let e = registry.enum_mut(id);
            (e.name.clone(), std::mem::take(&mut e.methods))
        };
        let (kept, mut bound) = bind_methods(&owner_name, methods, &registry, hooks, &mut report);
        let e = registry.enum_mut(id);
        e.methods = kept;
        bound.extend(enum_spelling(e));
        enums.push(EnumBinding {
            name: e.name.clone(),
            c_name: e.c_name.clone(),
            comment: e.comment.clone(),
            underlying: e.underlying,
            items: e.items.clone(),
            methods: bound,
        });
    }

    let mut structs = Vec::new();
    for id in registry.struct_ids() {
        let (owner_name, methods) = {
            let s = registry.struct_mut(id);
            (s.name.clone(), std::mem::take(&mut s.methods))
        };
        let (kept, bound) = bind_methods(&owner_name, methods, &registry, hooks, &mut report);
        let s = registry.struct_mut(id);
        s.methods = kept;
        structs.push(StructBinding {
            name: s.name.clone(),
            c_name: s.c_name.clone(),
            comment: s.comment.clone(),
            is_pointer_composition: s.is_pointer_composition,
            methods: bound,
        });
    }

    let (_, functions) = bind_methods("", free, &registry, hooks, &mut report);
    report_unused(&enums, &structs, &functions, &mut report);

    info!(
        functions = total,
        enums = enums.len(),
        structs = structs.len(),
        free_functions = functions.len(),
        skipped = report.entries.len(),
        "bindings synthesized"
    );
    Bindings {
        enums,
        structs,
        functions,
        report,
    }
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

fn shape_function(
    mut f: Function,
    registry: &mut Registry,
    hooks: &dyn Hooks,
    naming: &NamingRules,
) -> Result<Placement, ReportEntry> {
    shape::resolve_parameter_types(&mut f, registry);
    let prepared = hooks.name_function(&f, registry);
    f.name = prepared.clone();
    f.prepared_name = prepared;

    if !hooks.filter_function(&f) {
        return Err(ReportEntry::Filtered { function: f.c_name });
    }

    shape::pair_slices(&mut f);
    hooks.prepare_function(&mut f);
    shape::propagate_return_arguments(&mut f);
    shape::mark_string_out_params(&mut f);
    shape::resolve_type(&mut f.return_type, registry);

    shape::check_eligibility(&f, registry, hooks).map_err(ReportEntry::Unclassifiable)?;
    Ok(shape::classify(f, registry, naming))
}

// ---------------------------------------------------------------------------
// Struct getters
// ---------------------------------------------------------------------------

fn add_member_getters(registry: &mut Registry, id: StructId, hooks: &dyn Hooks) {
    let mut s = registry.struct_(id).clone();
    for m in &mut s.members {
        shape::resolve_type(&mut m.ty, registry);
    }
    hooks.prepare_struct_members(&mut s);
    shape::pair_struct_members(&mut s);

    let mut getters = Vec::new();
    for m in &s.members {
        if !hooks.filter_member_getter(m) || !has_getter(&m.ty, registry) {
            continue;
        }
        let name = naming::upper_first(&m.c_name);
        if s.contains_method(&name) || getters.iter().any(|g: &Function| g.name == name) {
            continue;
        }
        getters.push(member_getter(&s, &name, &m.c_name, &m.comment, &m.ty));
    }
    debug!(name = %s.name, getters = getters.len(), "member getters");

    let target = registry.struct_mut(id);
    target.members = s.members;
    target.methods.extend(getters);
}

/// Members whose values the wrappers can hand out.
fn has_getter(ty: &Type, registry: &Registry) -> bool {
    if ty.scalar == Some(Scalar::Void) || ty.is_array || ty.is_function_pointer {
        return false;
    }
    if ty.is_slice {
        return ty.pointer_level >= 1;
    }
    if ty.is_primitive {
        return ty.pointer_level == 0 || ty.is_narrow_string();
    }
    registry.is_enum_or_struct(&ty.target_name) && ty.pointer_level <= 1
}

fn member_getter(s: &Struct, name: &str, member: &str, comment: &str, ty: &Type) -> Function {
    let receiver_ty = Type {
        target_name: s.name.clone(),
        c_name: s.c_name.clone(),
        array_size: -1,
        ..Default::default()
    };
    let receiver_name = naming::common_receiver_name(&s.name);
    let mut f = Function::new(member, ty.clone());
    f.name = name.to_string();
    f.prepared_name = String::new();
    f.comment = comment.to_string();
    f.member = Some(member.to_string());
    f.parameters.push(FunctionParameter {
        name: receiver_name,
        c_name: String::new(),
        ty: receiver_ty,
    });
    f
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Finalize names and receivers of an owner's functions and marshal them.
/// Returns the functions kept and their wrappers.
fn bind_methods(
    owner: &str,
    functions: Vec<Function>,
    registry: &Registry,
    hooks: &dyn Hooks,
    report: &mut Report,
) -> (Vec<Function>, Vec<Method>) {
    let marshaller = Marshaller::new(registry);
    let mut names = HashSet::new();
    let mut kept = Vec::new();
    let mut methods = Vec::new();

    for mut f in functions {
        if let Some(name) = hooks.fixed_name(&f) {
            f.name = name;
        }
        if !owner.is_empty() {
            if let Some(first) = f.parameters.first() {
                if !first.ty.is_slice && first.ty.target_name == owner {
                    f.receiver = Some(Receiver {
                        name: naming::common_receiver_name(owner),
                        ty: first.ty.clone(),
                    });
                }
            }
        }
        mark_pointer_composition(&mut f, registry);
        if !f.prepared_name.is_empty() && f.prepared_name != f.name {
            f.comment = f.comment.replace(&f.prepared_name, &f.name);
        }

        if !names.insert(f.name.clone()) {
            report.push(ReportEntry::NameCollision {
                function: f.c_name.clone(),
                owner: owner.to_string(),
                name: f.name.clone(),
            });
            continue;
        }
        methods.push(marshaller.method(&f));
        kept.push(f);
    }
    (kept, methods)
}

fn mark_pointer_composition(f: &mut Function, registry: &Registry) {
    let mark = |ty: &mut Type| {
        if registry.is_pointer_composition(&ty.target_name) {
            ty.is_pointer_composition = true;
        }
    };
    if let Some(receiver) = &mut f.receiver {
        mark(&mut receiver.ty);
    }
    for p in &mut f.parameters {
        mark(&mut p.ty);
    }
    mark(&mut f.return_type);
}

// ---------------------------------------------------------------------------
// Unused entities
// ---------------------------------------------------------------------------

fn report_unused(
    enums: &[EnumBinding],
    structs: &[StructBinding],
    functions: &[Method],
    report: &mut Report,
) {
    let mut used = HashSet::new();
    let methods = enums
        .iter()
        .flat_map(|e| &e.methods)
        .chain(structs.iter().flat_map(|s| &s.methods))
        .chain(functions);
    for m in methods {
        for p in &m.params {
            collect_named(&p.ty, &mut used);
        }
        collect_named(&m.returns, &mut used);
    }

    let own_methods = |methods: &[Method]| methods.iter().any(|m| m.name != "Spelling");
    let unused: Vec<String> = enums
        .iter()
        .filter(|e| !own_methods(&e.methods) && !used.contains(e.name.as_str()))
        .map(|e| e.name.clone())
        .chain(
            structs
                .iter()
                .filter(|s| !own_methods(&s.methods) && !used.contains(s.name.as_str()))
                .map(|s| s.name.clone()),
        )
        .collect();
    for name in unused {
        report.push(ReportEntry::Unused { name });
    }
}

fn collect_named<'a>(ty: &'a TargetType, used: &mut HashSet<&'a str>) {
    match ty {
        TargetType::Named(name) => {
            used.insert(name.as_str());
        }
        TargetType::SliceRef(inner)
        | TargetType::Vec(inner)
        | TargetType::OptionalMut(inner)
        | TargetType::Optional(inner) => collect_named(inner, used),
        TargetType::Tuple(items) => {
            for item in items {
                collect_named(item, used);
            }
        }
        _ => {}
    }
}
