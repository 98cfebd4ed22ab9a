//! Structured statements and expressions that generated method bodies are
//! made of. The marshaller builds them; [`crate::emit`] renders them.

use crate::model::Scalar;

/// A type on the native side of the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeType {
    Scalar(Scalar),
    /// A type of the raw bindings module, by C name (`CXCursor`).
    Ffi(String),
    Pointer(Box<NativeType>),
}

impl NativeType {
    pub fn pointer_to(inner: NativeType) -> Self {
        NativeType::Pointer(Box::new(inner))
    }

    /// `char *`
    pub fn c_string() -> Self {
        NativeType::pointer_to(NativeType::Scalar(Scalar::Char))
    }
}

/// A type in the generated public signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetType {
    Unit,
    Bool,
    /// Borrowed text parameter.
    Str,
    /// Owned text result.
    String,
    Time,
    /// A fixed-width scalar (`i32`, `f64`).
    Scalar(String),
    /// A generated enum or struct wrapper.
    Named(String),
    SliceRef(Box<TargetType>),
    Vec(Box<TargetType>),
    OptionalMut(Box<TargetType>),
    Optional(Box<TargetType>),
    Tuple(Vec<TargetType>),
}

/// Target of a value conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// Whatever native type the context expects.
    Native,
    /// Enum wrapper to its native value.
    EnumToNative,
    /// Native value to a target scalar.
    Scalar(String),
    /// Native value to an enum wrapper.
    Enum(String),
}

/// How a native element becomes a target element in a slice view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementConversion {
    /// Wrap the native value in a struct wrapper.
    Compose(String),
    Enum(String),
    Scalar(String),
    /// `char *` element → owned text.
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    /// `ffi::name(args)`
    NativeCall { function: String, args: Vec<Expr> },
    Convert { value: Box<Expr>, to: Conversion },
    /// The native value inside a wrapper (`x.c`).
    Inner(Box<Expr>),
    /// A field of a native struct value, or of the value a pointer
    /// points to.
    Field { base: Box<Expr>, field: String, through_pointer: bool },
    Deref(Box<Expr>),
    /// Address of a mutable local handed to the native side.
    AddrOfMut(String),
    /// Address of a read-only value handed to the native side.
    AddrOf(Box<Expr>),
    /// A raw pointer passed on as whatever pointer type the native side
    /// expects.
    PointerArg(Box<Expr>),
    Index { base: Box<Expr>, index: String },
    /// Element count of a slice, converted to the native length type.
    Len(String),
    BufferPtr(String),
    NullPointer,
    Default,
    /// Wrap a native value in a struct wrapper.
    Compose { target: String, value: Box<Expr> },
    /// Wrap a native value behind a pointer in a struct wrapper by leaking
    /// a heap copy of it.
    ComposeBoxed { target: String, value: Box<Expr> },
    NewNativeString(Box<Expr>),
    FromNativeString(Box<Expr>),
    StringHandleText(Box<Expr>),
    NotZero(Box<Expr>),
    TimeFromSeconds(Box<Expr>),
    TimeToSeconds(Box<Expr>),
    /// `None` for a null pointer, otherwise `Some(some)`.
    NonNull { pointer: String, some: Box<Expr> },
    /// Copy `len` elements behind `pointer` into a vector, empty for null.
    SliceView {
        pointer: Box<Expr>,
        len: Box<Expr>,
        element: ElementConversion,
    },
    Tuple(Vec<Expr>),
}

/// A deferred native cleanup.
#[derive(Debug, Clone, PartialEq)]
pub enum Cleanup {
    /// Release a string made by [`Expr::NewNativeString`].
    ReleaseString(String),
    /// Dispose a string handle.
    DisposeString(String),
    /// Free a `char *` the native side allocated.
    FreeNative(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        mutable: bool,
        ty: Option<NativeType>,
        value: Expr,
    },
    Assign { target: Expr, value: Expr },
    /// `if !name.is_empty() { .. }`
    IfNonEmpty { collection: String, then: Vec<Stmt> },
    /// `if let Some(binding) = value { .. }`
    IfSome {
        binding: String,
        value: Expr,
        by_ref: bool,
        then: Vec<Stmt>,
    },
    ForEach {
        index: String,
        collection: String,
        body: Vec<Stmt>,
    },
    /// Append to a native buffer.
    Push { buffer: String, value: Expr },
    /// Native buffer with room for `len` elements of `element`.
    NewBuffer { name: String, element: NativeType, len: String },
    /// A list collecting cleanups registered inside loops.
    DeferList(String),
    /// Run `cleanup` when the enclosing function returns. Inside a loop the
    /// cleanup goes to the named [`Stmt::DeferList`].
    Defer { cleanup: Cleanup, list: Option<String> },
    Expr(Expr),
    Return(Expr),
    /// One arm per distinct enum value; `fallback` formats the raw value.
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm>,
        fallback: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    /// Associated constants matched by this arm.
    pub labels: Vec<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TargetType,
}

/// A finished wrapper method or free function.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub c_name: String,
    pub comment: String,
    /// Takes `self` by value.
    pub has_receiver: bool,
    pub params: Vec<Param>,
    pub returns: TargetType,
    pub body: Vec<Stmt>,
}

impl Method {
    /// Cleanups scheduled anywhere in the body.
    pub fn cleanups(&self) -> Vec<&Cleanup> {
        fn collect<'a>(stmts: &'a [Stmt], out: &mut Vec<&'a Cleanup>) {
            for stmt in stmts {
                match stmt {
                    Stmt::Defer { cleanup, .. } => out.push(cleanup),
                    Stmt::IfNonEmpty { then: body, .. }
                    | Stmt::IfSome { then: body, .. }
                    | Stmt::ForEach { body, .. } => collect(body, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.body, &mut out);
        out
    }
}
