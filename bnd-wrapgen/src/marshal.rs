//! Marshalling: turn a shaped [`Function`] into a wrapper [`Method`]:
//! public signature plus the statements converting arguments, calling the
//! native function, releasing native resources and converting results.

use crate::ir::{
    Cleanup, Conversion, ElementConversion, Expr, MatchArm, Method, NativeType, Param, Stmt,
    TargetType,
};
use crate::model::{Enum, Function, FunctionParameter, Scalar, Type};
use crate::naming;
use crate::registry::Registry;

/// Local holding the native result.
const RESULT: &str = "o";

/// Rust identifier for a target-side name.
pub fn ident(name: &str) -> String {
    naming::escape_keyword(&naming::to_snake_case(name))
}

pub struct Marshaller<'a> {
    registry: &'a Registry,
}

/// Everything one parameter contributes to a body.
#[derive(Default)]
struct Plan {
    params: Vec<Param>,
    pre: Vec<Stmt>,
    args: Vec<Expr>,
    post: Vec<Stmt>,
    outs: Vec<(Expr, TargetType)>,
}

impl<'a> Marshaller<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Build the wrapper of a function, method or member getter.
    pub fn method(&self, f: &Function) -> Method {
        let mut plan = Plan::default();
        for (i, p) in f.parameters.iter().enumerate() {
            let is_receiver = i == 0 && f.receiver.is_some();
            let name = if is_receiver {
                "self".to_string()
            } else {
                ident(&p.name)
            };
            self.parameter(f, p, &name, is_receiver, &mut plan);
        }

        let source = match &f.member {
            Some(member) => Expr::Field {
                base: Box::new(Expr::Inner(Box::new(Expr::Ident("self".to_string())))),
                field: member.clone(),
                through_pointer: f
                    .receiver
                    .as_ref()
                    .is_some_and(|r| self.is_pointer_composition(&r.ty)),
            },
            None => Expr::NativeCall {
                function: f.c_name.clone(),
                args: std::mem::take(&mut plan.args),
            },
        };

        let mut body = plan.pre;
        let primary = if f.return_type.is_void() {
            body.push(Stmt::Expr(source));
            None
        } else {
            body.push(Stmt::Let {
                name: RESULT.to_string(),
                mutable: false,
                ty: None,
                value: source,
            });
            Some(self.result(f, &mut body))
        };
        body.extend(plan.post);

        let (value, returns) = match (primary, plan.outs.len()) {
            (None, 0) => (None, TargetType::Unit),
            (Some((value, ty)), 0) => (Some(value), ty),
            (None, 1) => {
                let (value, ty) = plan.outs.remove(0);
                (Some(value), ty)
            }
            (primary, _) => {
                let (values, types): (Vec<Expr>, Vec<TargetType>) =
                    primary.into_iter().chain(plan.outs).unzip();
                (Some(Expr::Tuple(values)), TargetType::Tuple(types))
            }
        };
        if let Some(value) = value {
            body.push(Stmt::Return(value));
        }

        Method {
            name: f.name.clone(),
            c_name: f.c_name.clone(),
            comment: f.comment.clone(),
            has_receiver: f.receiver.is_some(),
            params: plan.params,
            returns,
            body,
        }
    }

    fn is_pointer_composition(&self, ty: &Type) -> bool {
        ty.is_pointer_composition || self.registry.is_pointer_composition(&ty.target_name)
    }

    fn is_enum(&self, ty: &Type) -> bool {
        ty.is_enum_literal && self.registry.lookup_enum(&ty.target_name).is_some()
    }

    /// Name of the raw bindings type a struct-like type maps to.
    fn ffi_name(&self, ty: &Type) -> String {
        match self.registry.lookup_struct(&ty.target_name) {
            Some(id) => self.registry.struct_(id).c_name.clone(),
            None => {
                let c_name = ty.c_name.as_str();
                c_name
                    .strip_prefix("struct ")
                    .or_else(|| c_name.strip_prefix("enum "))
                    .unwrap_or(c_name)
                    .to_string()
            }
        }
    }

    /// Native type of a value of `ty` with `level` indirections.
    fn native_type(&self, ty: &Type, level: u32) -> NativeType {
        let mut native = if ty.is_time() {
            NativeType::Scalar(Scalar::Long)
        } else if let Some(scalar) = ty.scalar {
            NativeType::Scalar(scalar)
        } else {
            NativeType::Ffi(self.ffi_name(ty))
        };
        for _ in 0..level {
            native = NativeType::pointer_to(native);
        }
        native
    }

    /// Target type of a single value of `ty`, ignoring indirection.
    fn value_target(&self, ty: &Type) -> TargetType {
        if ty.is_char_based() {
            TargetType::Str
        } else if ty.is_bool() {
            TargetType::Bool
        } else if ty.is_time() {
            TargetType::Time
        } else if self.is_enum(ty) || !ty.is_primitive {
            TargetType::Named(ty.target_name.clone())
        } else {
            TargetType::Scalar(ty.target_name.clone())
        }
    }

    fn element_conversion(&self, ty: &Type) -> ElementConversion {
        if ty.is_char_based() {
            ElementConversion::Text
        } else if self.is_enum(ty) {
            ElementConversion::Enum(ty.target_name.clone())
        } else if ty.is_primitive {
            ElementConversion::Scalar(ty.target_name.clone())
        } else {
            ElementConversion::Compose(ty.target_name.clone())
        }
    }

    fn element_target(&self, ty: &Type) -> TargetType {
        match self.element_conversion(ty) {
            ElementConversion::Text => TargetType::String,
            ElementConversion::Scalar(name) => TargetType::Scalar(name),
            ElementConversion::Enum(name) | ElementConversion::Compose(name) => {
                TargetType::Named(name)
            }
        }
    }

    /// Native value → target value, for scalars and enums.
    fn from_native(&self, ty: &Type, value: Expr) -> Expr {
        let to = if self.is_enum(ty) {
            Conversion::Enum(ty.target_name.clone())
        } else if ty.is_bool() {
            return match ty.scalar {
                Some(Scalar::Bool) => value,
                _ => Expr::NotZero(Box::new(value)),
            };
        } else {
            Conversion::Scalar(ty.target_name.clone())
        };
        Expr::Convert {
            value: Box::new(value),
            to,
        }
    }

    /// Target value → native value, for scalars and enums.
    fn to_native(&self, ty: &Type, value: Expr) -> Expr {
        let to = if self.is_enum(ty) {
            Conversion::EnumToNative
        } else {
            Conversion::Native
        };
        Expr::Convert {
            value: Box::new(value),
            to,
        }
    }

    // -----------------------------------------------------------------------
    // Parameters
    // -----------------------------------------------------------------------

    fn parameter(&self, f: &Function, p: &FunctionParameter, name: &str, is_receiver: bool, plan: &mut Plan) {
        let ty = &p.ty;
        let id = || Expr::Ident(name.to_string());

        if f.is_hidden_length(p) {
            let array = f.slice_partner(p).map(|a| ident(&a.name)).unwrap_or_default();
            plan.args.push(Expr::Convert {
                value: Box::new(Expr::Len(array)),
                to: Conversion::Native,
            });
            return;
        }
        if ty.is_return_argument {
            self.out_parameter(f, p, name, plan);
            return;
        }
        if ty.is_slice {
            self.input_slice(p, name, plan);
            return;
        }

        let (target, arg) = if ty.is_narrow_string() {
            let c_name = format!("c_{name}");
            plan.pre.push(Stmt::Let {
                name: c_name.clone(),
                mutable: false,
                ty: None,
                value: Expr::NewNativeString(Box::new(id())),
            });
            plan.post.push(Stmt::Defer {
                cleanup: Cleanup::ReleaseString(c_name.clone()),
                list: None,
            });
            (TargetType::Str, Expr::Ident(c_name))
        } else if ty.is_primitive && ty.pointer_level == 1 {
            self.scalar_cell(p, name, plan)
        } else if ty.is_string_handle() {
            (TargetType::Named(ty.target_name.clone()), Expr::Inner(Box::new(id())))
        } else if ty.is_time() {
            (TargetType::Time, Expr::TimeToSeconds(Box::new(id())))
        } else if ty.is_primitive {
            (self.value_target(ty), self.to_native(ty, id()))
        } else {
            let pc = self.is_pointer_composition(ty);
            let inner = Expr::Inner(Box::new(id()));
            let arg = match (ty.pointer_level, pc) {
                (0, true) => Expr::Deref(Box::new(inner)),
                (0, false) | (_, true) => inner,
                (_, false) => Expr::AddrOf(Box::new(inner)),
            };
            (TargetType::Named(ty.target_name.clone()), arg)
        };

        if !is_receiver {
            plan.params.push(Param {
                name: name.to_string(),
                ty: target,
            });
        }
        plan.args.push(arg);
    }

    /// `T *` input of a scalar or enum: an optional in/out value.
    fn scalar_cell(&self, p: &FunctionParameter, name: &str, plan: &mut Plan) -> (TargetType, Expr) {
        let value_ty = Type {
            pointer_level: 0,
            ..p.ty.clone()
        };
        let cell = format!("cp_{name}");
        plan.pre.push(Stmt::Let {
            name: cell.clone(),
            mutable: true,
            ty: Some(self.native_type(&value_ty, 0)),
            value: Expr::Default,
        });
        plan.pre.push(Stmt::IfSome {
            binding: "v".to_string(),
            value: Expr::Ident(name.to_string()),
            by_ref: true,
            then: vec![Stmt::Assign {
                target: Expr::Ident(cell.clone()),
                value: self.to_native(&value_ty, Expr::Deref(Box::new(Expr::Ident("v".to_string())))),
            }],
        });
        plan.post.push(Stmt::IfSome {
            binding: "v".to_string(),
            value: Expr::Ident(name.to_string()),
            by_ref: false,
            then: vec![Stmt::Assign {
                target: Expr::Deref(Box::new(Expr::Ident("v".to_string()))),
                value: self.from_native(&value_ty, Expr::Ident(cell.clone())),
            }],
        });
        (
            TargetType::OptionalMut(Box::new(self.value_target(&value_ty))),
            Expr::AddrOfMut(cell),
        )
    }

    fn input_slice(&self, p: &FunctionParameter, name: &str, plan: &mut Plan) {
        let element = Type {
            pointer_level: p.ty.pointer_level.saturating_sub(1),
            ..p.ty.clone()
        };
        let buffer = format!("ca_{name}");
        let pointer = format!("cp_{name}");
        let item = || Expr::Index {
            base: Box::new(Expr::Ident(name.to_string())),
            index: "i".to_string(),
        };

        let (native_element, target_element, body) = if element.is_narrow_string() {
            let strings = format!("cs_{name}");
            plan.pre.push(Stmt::DeferList(strings.clone()));
            let body = vec![
                Stmt::Let {
                    name: "ci_str".to_string(),
                    mutable: false,
                    ty: None,
                    value: Expr::NewNativeString(Box::new(item())),
                },
                Stmt::Defer {
                    cleanup: Cleanup::ReleaseString("ci_str".to_string()),
                    list: Some(strings),
                },
                Stmt::Push {
                    buffer: buffer.clone(),
                    value: Expr::Ident("ci_str".to_string()),
                },
            ];
            (NativeType::c_string(), TargetType::Str, body)
        } else {
            let value = if element.is_primitive {
                self.to_native(&element, item())
            } else {
                Expr::Inner(Box::new(item()))
            };
            let native = if element.is_primitive {
                self.native_type(&element, 0)
            } else {
                self.native_type(&element, element.pointer_level)
            };
            let body = vec![Stmt::Push {
                buffer: buffer.clone(),
                value,
            }];
            (native, self.value_target(&element), body)
        };

        plan.pre.push(Stmt::NewBuffer {
            name: buffer.clone(),
            element: native_element.clone(),
            len: name.to_string(),
        });
        plan.pre.push(Stmt::ForEach {
            index: "i".to_string(),
            collection: name.to_string(),
            body,
        });
        plan.pre.push(Stmt::Let {
            name: pointer.clone(),
            mutable: true,
            ty: Some(NativeType::pointer_to(native_element)),
            value: Expr::NullPointer,
        });
        plan.pre.push(Stmt::IfNonEmpty {
            collection: name.to_string(),
            then: vec![Stmt::Assign {
                target: Expr::Ident(pointer.clone()),
                value: Expr::BufferPtr(buffer),
            }],
        });

        plan.params.push(Param {
            name: name.to_string(),
            ty: TargetType::SliceRef(Box::new(target_element)),
        });
        plan.args.push(Expr::PointerArg(Box::new(Expr::Ident(pointer))));
    }

    fn out_parameter(&self, f: &Function, p: &FunctionParameter, name: &str, plan: &mut Plan) {
        let ty = &p.ty;
        let cell = || Expr::Ident(name.to_string());
        let pointee = Type {
            pointer_level: ty.pointer_level.saturating_sub(1),
            ..ty.clone()
        };

        if ty.is_slice {
            // The native side allocates; we get a pointer and a count back.
            let element = Type {
                pointer_level: pointee.pointer_level.saturating_sub(1),
                ..ty.clone()
            };
            let len = f.slice_partner(p).map(|l| ident(&l.name)).unwrap_or_default();
            plan.pre.push(Stmt::Let {
                name: name.to_string(),
                mutable: true,
                ty: Some(self.native_type(&element, pointee.pointer_level)),
                value: Expr::NullPointer,
            });
            plan.args.push(Expr::AddrOfMut(name.to_string()));
            plan.outs.push((
                Expr::SliceView {
                    pointer: Box::new(cell()),
                    len: Box::new(Expr::Ident(len)),
                    element: self.element_conversion(&element),
                },
                TargetType::Vec(Box::new(self.element_target(&element))),
            ));
            return;
        }

        let (native, result, target) = if pointee.is_narrow_string() {
            plan.post.push(Stmt::Defer {
                cleanup: Cleanup::FreeNative(name.to_string()),
                list: None,
            });
            (
                NativeType::c_string(),
                Expr::FromNativeString(Box::new(cell())),
                TargetType::String,
            )
        } else if pointee.is_string_handle() && pointee.pointer_level == 0 {
            plan.post.push(Stmt::Defer {
                cleanup: Cleanup::DisposeString(name.to_string()),
                list: None,
            });
            (
                self.native_type(&pointee, 0),
                Expr::StringHandleText(Box::new(cell())),
                TargetType::String,
            )
        } else if pointee.is_time() {
            (
                self.native_type(&pointee, 0),
                Expr::TimeFromSeconds(Box::new(cell())),
                TargetType::Time,
            )
        } else if pointee.is_primitive && pointee.pointer_level == 0 {
            (
                self.native_type(&pointee, 0),
                self.from_native(&pointee, cell()),
                self.value_target(&pointee),
            )
        } else {
            let target = pointee.target_name.clone();
            let pc = self.is_pointer_composition(&pointee);
            match (pointee.pointer_level, pc) {
                (0, false) => (
                    self.native_type(&pointee, 0),
                    Expr::Compose {
                        target: target.clone(),
                        value: Box::new(cell()),
                    },
                    TargetType::Named(target),
                ),
                (0, true) => (
                    self.native_type(&pointee, 0),
                    Expr::ComposeBoxed {
                        target: target.clone(),
                        value: Box::new(cell()),
                    },
                    TargetType::Named(target),
                ),
                (level, true) => (
                    self.native_type(&pointee, level),
                    Expr::Compose {
                        target: target.clone(),
                        value: Box::new(cell()),
                    },
                    TargetType::Named(target),
                ),
                (level, false) => (
                    self.native_type(&pointee, level),
                    Expr::NonNull {
                        pointer: name.to_string(),
                        some: Box::new(Expr::Compose {
                            target: target.clone(),
                            value: Box::new(Expr::Deref(Box::new(cell()))),
                        }),
                    },
                    TargetType::Optional(Box::new(TargetType::Named(target))),
                ),
            }
        };

        let value = match native {
            NativeType::Pointer(_) => Expr::NullPointer,
            _ => Expr::Default,
        };
        plan.pre.push(Stmt::Let {
            name: name.to_string(),
            mutable: true,
            ty: Some(native),
            value,
        });
        plan.args.push(Expr::AddrOfMut(name.to_string()));
        // Lengths of out slices are consumed by the slice view.
        if !ty.is_length() {
            plan.outs.push((result, target));
        }
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Convert the native result bound to [`RESULT`].
    fn result(&self, f: &Function, body: &mut Vec<Stmt>) -> (Expr, TargetType) {
        let r = &f.return_type;
        let o = || Expr::Ident(RESULT.to_string());

        if r.is_slice {
            if let Some(length) = &r.length_of_slice {
                let element = Type {
                    pointer_level: r.pointer_level.saturating_sub(1),
                    ..r.clone()
                };
                let len = Expr::Field {
                    base: Box::new(Expr::Inner(Box::new(Expr::Ident("self".to_string())))),
                    field: length.clone(),
                    through_pointer: f
                        .receiver
                        .as_ref()
                        .is_some_and(|rt| self.is_pointer_composition(&rt.ty)),
                };
                return (
                    Expr::SliceView {
                        pointer: Box::new(o()),
                        len: Box::new(len),
                        element: self.element_conversion(&element),
                    },
                    TargetType::Vec(Box::new(self.element_target(&element))),
                );
            }
        }

        if r.is_string_handle() && r.pointer_level == 0 {
            // Getters read a handle the struct still owns.
            if f.member.is_none() {
                body.push(Stmt::Defer {
                    cleanup: Cleanup::DisposeString(RESULT.to_string()),
                    list: None,
                });
            }
            return (Expr::StringHandleText(Box::new(o())), TargetType::String);
        }
        if r.is_narrow_string() {
            return (Expr::FromNativeString(Box::new(o())), TargetType::String);
        }
        if r.is_time() {
            return (Expr::TimeFromSeconds(Box::new(o())), TargetType::Time);
        }
        if r.is_primitive {
            return (self.from_native(r, o()), self.value_target(r));
        }

        let target = r.target_name.clone();
        let pc = self.is_pointer_composition(r);
        if r.pointer_level > 0 {
            let value = if pc { o() } else { Expr::Deref(Box::new(o())) };
            return (
                Expr::NonNull {
                    pointer: RESULT.to_string(),
                    some: Box::new(Expr::Compose {
                        target: target.clone(),
                        value: Box::new(value),
                    }),
                },
                TargetType::Optional(Box::new(TargetType::Named(target))),
            );
        }
        let value = Box::new(o());
        let expr = if pc {
            Expr::ComposeBoxed {
                target: target.clone(),
                value,
            }
        } else {
            Expr::Compose {
                target: target.clone(),
                value,
            }
        };
        (expr, TargetType::Named(target))
    }
}

// ---------------------------------------------------------------------------
// Enum spelling
// ---------------------------------------------------------------------------

/// `Spelling` method of an enum: one arm per distinct value, aliases
/// listed after the first name. `None` when the enum already has one.
pub fn enum_spelling(e: &Enum) -> Option<Method> {
    if e.contains_method("Spelling") {
        return None;
    }

    let mut arms: Vec<(u64, MatchArm)> = Vec::new();
    for item in &e.items {
        match arms.iter_mut().find(|(value, _)| *value == item.value) {
            Some((_, arm)) => {
                let alias = item
                    .name
                    .split_once('_')
                    .map_or(item.name.as_str(), |(_, rest)| rest);
                arm.labels.push(item.name.clone());
                arm.text.push_str(", ");
                arm.text.push_str(alias);
            }
            None => arms.push((
                item.value,
                MatchArm {
                    labels: vec![item.name.clone()],
                    text: item.name.replacen('_', "=", 1),
                },
            )),
        }
    }

    Some(Method {
        name: "Spelling".to_string(),
        c_name: String::new(),
        comment: format!("Spelling returns the string representation of the value of {}.", e.name),
        has_receiver: true,
        params: Vec::new(),
        returns: TargetType::String,
        body: vec![Stmt::Match {
            scrutinee: Expr::Ident("self".to_string()),
            arms: arms.into_iter().map(|(_, arm)| arm).collect(),
            fallback: format!("{} unknown {{}}", e.name),
        }],
    })
}
