//! API shaping: decide which target type a C function becomes a method of,
//! and under which name.

use thiserror::Error;
use tracing::{debug, trace};

use crate::hooks::Hooks;
use crate::model::{BOOL_NAME, Function, Receiver, Scalar, Struct, Type};
use crate::naming::{self, NamingRules};
use crate::registry::{Owner, Registry};

/// A function the heuristics cannot shape automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot classify `{function}`: `{parameter}` {reason}")]
pub struct Unclassifiable {
    pub function: String,
    /// Offending parameter, `return` for the result.
    pub parameter: String,
    pub reason: String,
}

/// Where classification put a function.
#[derive(Debug)]
pub enum Placement {
    /// Added to the methods of an enum or struct under `name`.
    Method { owner: Owner, name: String },
    /// Not attached to any type; emitted as a free function.
    Free(Function),
}

// ---------------------------------------------------------------------------
// Type resolution
// ---------------------------------------------------------------------------

/// Point `struct X`/`enum X` spellings at their registered identities;
/// enum-typed values adopt the enum's receiver type.
pub fn resolve_type(ty: &mut Type, registry: &Registry) {
    if let Some(name) = registry.lookup_non_typedef(&ty.c_name) {
        ty.target_name = name.to_string();
    }
    if let Some(id) = registry.lookup_enum(&ty.target_name) {
        let e = registry.enum_(id).receiver_type();
        ty.target_name = e.target_name;
        ty.c_name = e.c_name;
        ty.scalar = e.scalar;
        ty.is_primitive = true;
        ty.is_enum_literal = true;
    }
}

pub fn resolve_parameter_types(f: &mut Function, registry: &Registry) {
    for p in &mut f.parameters {
        resolve_type(&mut p.ty, registry);
    }
}

// ---------------------------------------------------------------------------
// Array/length pairing
// ---------------------------------------------------------------------------

/// Pair array parameters with the parameters counting them
/// (`num_files`/`files`, `tokens_size`/`tokens`).
pub fn pair_slices(f: &mut Function) {
    for i in 0..f.parameters.len() {
        let length = &f.parameters[i];
        if length.ty.is_slice || length.ty.length_of_slice.is_some() {
            continue;
        }
        let Some(array_name) = naming::array_name_from_length(&length.c_name) else {
            continue;
        };
        if array_name.is_empty() {
            continue;
        }
        let array_name = array_name.to_lowercase();
        let Some(j) = f
            .parameters
            .iter()
            .position(|p| p.c_name.to_lowercase() == array_name)
        else {
            continue;
        };
        let array = &f.parameters[j];
        if j == i || array.ty.pointer_level == 0 || array.ty.is_slice {
            continue;
        }

        let length_name = f.parameters[i].name.clone();
        let array_name = f.parameters[j].name.clone();
        trace!(function = %f.c_name, array = %array_name, length = %length_name, "paired slice");
        f.parameters[j].ty.is_slice = true;
        f.parameters[j].ty.length_of_slice = Some(length_name);
        f.parameters[i].ty.length_of_slice = Some(array_name);
    }
}

/// The length of an out-slice is an out-parameter too, when it is passed
/// by pointer.
pub fn propagate_return_arguments(f: &mut Function) {
    let out_lengths: Vec<usize> = f
        .parameters
        .iter()
        .enumerate()
        .filter(|(_, p)| p.ty.is_length() && p.ty.pointer_level > 0)
        .filter(|(_, p)| {
            f.slice_partner(p)
                .is_some_and(|array| array.ty.is_return_argument)
        })
        .map(|(i, _)| i)
        .collect();
    for i in out_lengths {
        f.parameters[i].ty.is_return_argument = true;
    }
}

/// `char **` parameters that are not string arrays hand a string back.
pub fn mark_string_out_params(f: &mut Function) {
    for p in &mut f.parameters {
        if p.ty.is_char_based() && p.ty.pointer_level == 2 && !p.ty.is_slice {
            p.ty.is_return_argument = true;
        }
    }
}

const LENGTH_MEMBER_NAMES: &[&str] = &["count", "len", "length", "size"];

/// Pair array members with the members counting them, by name and, for
/// two-member structs, by shape.
pub fn pair_struct_members(s: &mut Struct) {
    for i in 0..s.members.len() {
        let Some(array_name) = naming::array_name_from_length(&s.members[i].c_name) else {
            continue;
        };
        if array_name.is_empty() {
            continue;
        }
        let array_name = array_name.to_lowercase();
        let Some(j) = s
            .members
            .iter()
            .position(|m| m.c_name.to_lowercase() == array_name)
        else {
            continue;
        };
        if j == i || s.members[j].ty.pointer_level == 0 {
            continue;
        }
        let length = s.members[i].c_name.clone();
        let array = s.members[j].c_name.clone();
        s.members[i].ty.length_of_slice = Some(array);
        s.members[j].ty.is_slice = true;
        s.members[j].ty.length_of_slice = Some(length);
    }

    pair_two_member_struct(s);
}

fn pair_two_member_struct(s: &mut Struct) {
    let [first, second] = s.members.as_slice() else {
        return;
    };
    let combination =
        |x: &Type, y: &Type| x.pointer_level == 1 && y.pointer_level == 0 && !x.is_integer() && y.is_integer();
    if !combination(&first.ty, &second.ty) && !combination(&second.ty, &first.ty) {
        return;
    }
    // Already covered by the name rule.
    if [&first.ty, &second.ty]
        .iter()
        .any(|t| t.is_array || t.is_slice)
    {
        return;
    }

    let (a, c) = if first.ty.pointer_level == 1 { (0, 1) } else { (1, 0) };
    let count_name = s.members[c].c_name.to_lowercase();
    if !LENGTH_MEMBER_NAMES.contains(&count_name.as_str()) {
        return;
    }
    let array = s.members[a].c_name.clone();
    let count = s.members[c].c_name.clone();
    trace!(name = %s.name, array = %array, count = %count, "paired array struct");
    s.members[c].ty.length_of_slice = Some(array);
    s.members[a].ty.is_slice = true;
    s.members[a].ty.length_of_slice = Some(count);
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// Reject functions whose parameters or result the marshaller cannot
/// handle.
pub fn check_eligibility(
    f: &Function,
    registry: &Registry,
    hooks: &dyn Hooks,
) -> Result<(), Unclassifiable> {
    let reject = |parameter: &str, reason: String| Unclassifiable {
        function: f.c_name.clone(),
        parameter: parameter.to_string(),
        reason,
    };

    for p in &f.parameters {
        if !hooks.filter_parameter(p) || p.ty.is_return_argument || p.ty.is_slice {
            continue;
        }
        let known = registry.is_enum_or_struct(&p.ty.target_name);
        if p.ty.is_function_pointer {
            return Err(reject(&p.c_name, "is a function pointer".to_string()));
        }
        if p.ty.pointer_level != 0 {
            let scalar_cell = p.ty.pointer_level == 1
                && p.ty.is_primitive
                && (p.ty.scalar.is_some_and(|s| s != Scalar::Void) || (p.ty.is_enum_literal && known));
            if !(p.ty.is_narrow_string() || scalar_cell) {
                return Err(reject(
                    &p.c_name,
                    format!("has unexpected pointer level {} on `{}`", p.ty.pointer_level, p.ty.target_name),
                ));
            }
        } else if !p.ty.is_primitive && !known {
            return Err(reject(&p.c_name, format!("has unknown type `{}`", p.ty.target_name)));
        }
    }

    let r = &f.return_type;
    let known = registry.is_enum_or_struct(&r.target_name);
    if r.is_function_pointer {
        return Err(reject("return", "is a function pointer".to_string()));
    }
    if r.is_primitive && r.pointer_level > 0 && !r.is_narrow_string() {
        return Err(reject("return", format!("is a pointer to `{}`", r.target_name)));
    }
    if !r.is_primitive && !known {
        return Err(reject("return", format!("has unknown type `{}`", r.target_name)));
    }
    if !r.is_primitive && r.pointer_level >= 2 {
        return Err(reject(
            "return",
            format!("has pointer level {} on `{}`", r.pointer_level, r.target_name),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// The receiver a function is considered for: its first parameter's type,
/// or for parameterless functions the enum or struct it returns.
pub fn receiver_of(f: &Function, registry: &Registry) -> Receiver {
    if let Some(first) = f.parameters.first() {
        return Receiver {
            name: naming::common_receiver_name(&first.ty.target_name),
            ty: first.ty.clone(),
        };
    }
    match registry.owner(&f.return_type.target_name) {
        Some(Owner::Enum(id)) => Receiver {
            name: String::new(),
            ty: registry.enum_(id).receiver_type(),
        },
        Some(Owner::Struct(id)) => Receiver {
            name: String::new(),
            ty: Type {
                target_name: registry.struct_(id).name.clone(),
                array_size: -1,
                ..Default::default()
            },
        },
        None => Receiver::default(),
    }
}

/// Attach `f` to an enum or struct, or hand it back as a free function.
pub fn classify(mut f: Function, registry: &mut Registry, naming: &NamingRules) -> Placement {
    let fname = f.prepared_name.clone();
    let rt = receiver_of(&f, registry);

    f = match add_basic_methods(registry, naming, f, &fname, "", &rt) {
        Ok(placed) => return placed,
        Err(f) => f,
    };

    let parts: Vec<String> = f.name.split('_').map(str::to_string).collect();
    if let [head, tail] = parts.as_slice() {
        let attempt = if *head == rt.ty.target_name {
            let rtc = Receiver {
                name: head.clone(),
                ..rt.clone()
            };
            add_basic_methods(registry, naming, f, tail, "", &rtc)
        } else {
            let prefix = if head.is_empty() {
                String::new()
            } else {
                format!("{head}_")
            };
            add_basic_methods(registry, naming, f, tail, &prefix, &rt)
        };
        f = match attempt {
            Ok(placed) => return placed,
            Err(f) => f,
        };
    }

    let mut fname = naming.trim_common_function_name(&fname, &rt.ty.target_name);
    if let Some(rest) = fname.strip_prefix(&format!("{}_", f.return_type.target_name)) {
        fname = rest.to_string();
    }
    f = match add_method(registry, naming, f, &fname, "", &rt) {
        Ok(placed) => return placed,
        Err(f) => f,
    };

    // Second chance: a method on the type the function returns.
    if registry.is_enum_or_struct(&f.return_type.target_name) {
        let rtc = Receiver {
            ty: f.return_type.clone(),
            ..rt.clone()
        };
        let mut name = naming.trim_common_function_name_prefix(&fname);
        if name.is_empty() {
            name = f.return_type.target_name.clone();
        }
        if naming.is_factory_name(&f.c_name) {
            name = format!("New{name}");
        }
        f = match add_method(registry, naming, f, &name, "", &rtc) {
            Ok(placed) => return placed,
            Err(f) => f,
        };
    }

    f.name = naming::upper_first(&f.name);
    debug!(function = %f.c_name, name = %f.name, "free function");
    Placement::Free(f)
}

/// Constructors, predicates, disposers and equality checks.
fn add_basic_methods(
    registry: &mut Registry,
    naming: &NamingRules,
    mut f: Function,
    fname: &str,
    prefix: &str,
    rt: &Receiver,
) -> Result<Placement, Function> {
    if f.parameters.is_empty() && registry.is_enum_or_struct(&f.return_type.target_name) {
        let rtc = Receiver {
            ty: f.return_type.clone(),
            ..rt.clone()
        };
        let mut name = naming.trim_common_function_name_prefix(fname);
        if name.is_empty() {
            name = f.return_type.target_name.clone();
        }
        if naming.is_factory_name(&f.c_name) {
            name = format!("New{name}");
        }
        return add_method(registry, naming, f, &name, prefix, &rtc);
    }

    if let Some(name) = predicate_name(fname) {
        f.return_type.target_name = BOOL_NAME.to_string();
        return add_method(registry, naming, f, &name, prefix, rt);
    }

    let first_known = f
        .parameters
        .first()
        .is_some_and(|p| registry.is_enum_or_struct(&p.ty.target_name));

    if f.parameters.len() == 1 && first_known && fname.starts_with("dispose") && f.return_type.is_void() {
        return add_method(registry, naming, f, "Dispose", prefix, rt);
    }

    if f.parameters.len() == 2
        && fname.starts_with("equal")
        && first_known
        && f.parameters[0].ty == f.parameters[1].ty
    {
        let name = naming::common_receiver_name(&f.parameters[0].ty.target_name);
        f.parameters[1].name = format!("{name}2");
        f.parameters[0].name = name;
        f.return_type.target_name = BOOL_NAME.to_string();
        return add_method(registry, naming, f, "Equal", prefix, rt);
    }

    Err(f)
}

/// `isFoo` → `Foo`, `hasFoo` → `hasFoo`; `None` for anything else.
fn predicate_name(fname: &str) -> Option<String> {
    let upper_at = |i: usize| fname.chars().nth(i).is_some_and(char::is_uppercase);
    if fname.starts_with("is") && upper_at(2) {
        return Some(fname["is".len()..].to_string());
    }
    if fname.starts_with("has") && upper_at(3) {
        return Some(fname.to_string());
    }
    None
}

fn add_method(
    registry: &mut Registry,
    naming: &NamingRules,
    mut f: Function,
    fname: &str,
    prefix: &str,
    rt: &Receiver,
) -> Result<Placement, Function> {
    let name = naming::upper_first(&format!("{prefix}{}", naming::upper_first(fname)));

    match registry.owner(&rt.ty.target_name) {
        Some(Owner::Enum(id)) => {
            debug!(function = %f.c_name, owner = %registry.enum_(id).name, name = %name, "enum method");
            f.name = name.clone();
            registry.enum_mut(id).methods.push(f);
            Ok(Placement::Method {
                owner: Owner::Enum(id),
                name,
            })
        }
        Some(Owner::Struct(id)) if registry.struct_(id).c_name != naming.string_handle => {
            debug!(function = %f.c_name, owner = %registry.struct_(id).name, name = %name, "struct method");
            f.name = name.clone();
            let s = registry.struct_mut(id);
            if !rt.ty.is_slice && rt.ty.pointer_level > 0 {
                s.is_pointer_composition = true;
            }
            s.methods.push(f);
            Ok(Placement::Method {
                owner: Owner::Struct(id),
                name,
            })
        }
        _ => Err(f),
    }
}
