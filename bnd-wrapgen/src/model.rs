//! Declaration model: the enums, structs and functions discovered in the
//! C headers, with their types already translated.

use std::path::PathBuf;

/// C scalar kinds, one per distinct C spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
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
    Bool,
    Void,
}

impl Scalar {
    pub fn c_name(self) -> &'static str {
        match self {
            Scalar::Char => "char",
            Scalar::SChar => "signed char",
            Scalar::UChar => "unsigned char",
            Scalar::Short => "short",
            Scalar::UShort => "unsigned short",
            Scalar::Int => "int",
            Scalar::UInt => "unsigned int",
            Scalar::Long => "long",
            Scalar::ULong => "unsigned long",
            Scalar::LongLong => "long long",
            Scalar::ULongLong => "unsigned long long",
            Scalar::Float => "float",
            Scalar::Double => "double",
            Scalar::Bool => "bool",
            Scalar::Void => "void",
        }
    }

    /// Fixed-width Rust type the scalar is exposed as.
    // C `long` is 64-bit on LP64 targets
    pub fn target_name(self) -> &'static str {
        match self {
            Scalar::Char | Scalar::SChar => "i8",
            Scalar::UChar => "u8",
            Scalar::Short => "i16",
            Scalar::UShort => "u16",
            Scalar::Int => "i32",
            Scalar::UInt => "u32",
            Scalar::Long | Scalar::LongLong => "i64",
            Scalar::ULong | Scalar::ULongLong => "u64",
            Scalar::Float => "f32",
            Scalar::Double => "f64",
            Scalar::Bool => "bool",
            Scalar::Void => "void",
        }
    }

    /// `std::ffi` type used on the native side of the boundary.
    pub fn native_name(self) -> &'static str {
        match self {
            Scalar::Char => "std::ffi::c_char",
            Scalar::SChar => "std::ffi::c_schar",
            Scalar::UChar => "std::ffi::c_uchar",
            Scalar::Short => "std::ffi::c_short",
            Scalar::UShort => "std::ffi::c_ushort",
            Scalar::Int => "std::ffi::c_int",
            Scalar::UInt => "std::ffi::c_uint",
            Scalar::Long => "std::ffi::c_long",
            Scalar::ULong => "std::ffi::c_ulong",
            Scalar::LongLong => "std::ffi::c_longlong",
            Scalar::ULongLong => "std::ffi::c_ulonglong",
            Scalar::Float => "std::ffi::c_float",
            Scalar::Double => "std::ffi::c_double",
            Scalar::Bool => "bool",
            Scalar::Void => "std::ffi::c_void",
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            Scalar::Float | Scalar::Double | Scalar::Bool | Scalar::Void
        )
    }
}

/// Typedefs with built-in meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinAlias {
    /// The library's opaque string handle (`CXString`).
    StringHandle,
    /// The platform time type (`time_t`).
    Time,
}

/// Target name given to the built-in string handle identity.
pub const STRING_HANDLE_NAME: &str = "NativeString";

/// Target name of a value coerced to a boolean.
pub const BOOL_NAME: &str = "bool";

/// A C type after translation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Type {
    /// C-side spelling of the innermost named type (`int`, `CXCursor`,
    /// `struct CXUnsavedFile`).
    pub c_name: String,
    pub target_name: String,
    pub pointer_level: u32,
    pub scalar: Option<Scalar>,
    pub alias: Option<BuiltinAlias>,
    pub is_primitive: bool,
    pub is_array: bool,
    /// Element count of an array, -1 when unknown.
    pub array_size: i64,
    pub is_enum_literal: bool,
    pub is_function_pointer: bool,
    pub is_return_argument: bool,
    pub is_slice: bool,
    /// Name of the partner in an array/length pair. The array side carries
    /// the length's name, the length side carries the array's name.
    pub length_of_slice: Option<String>,
    pub is_pointer_composition: bool,
}

impl Type {
    pub fn scalar(scalar: Scalar) -> Self {
        Self {
            c_name: scalar.c_name().to_string(),
            target_name: scalar.target_name().to_string(),
            scalar: Some(scalar),
            is_primitive: true,
            array_size: -1,
            ..Default::default()
        }
    }

    pub fn is_void(&self) -> bool {
        self.scalar == Some(Scalar::Void) && self.pointer_level == 0
    }

    /// A `char *`.
    pub fn is_narrow_string(&self) -> bool {
        self.scalar == Some(Scalar::Char) && self.pointer_level == 1
    }

    /// Element type `char` at any indirection.
    pub fn is_char_based(&self) -> bool {
        self.scalar == Some(Scalar::Char)
    }

    /// The length side of an array/length pair.
    pub fn is_length(&self) -> bool {
        self.length_of_slice.is_some() && !self.is_slice
    }

    pub fn is_bool(&self) -> bool {
        self.target_name == BOOL_NAME
    }

    /// Integer element type, ignoring indirection.
    pub fn is_integer(&self) -> bool {
        self.scalar.is_some_and(Scalar::is_integer) && !self.is_enum_literal && !self.is_bool()
    }

    pub fn is_string_handle(&self) -> bool {
        self.alias == Some(BuiltinAlias::StringHandle)
    }

    pub fn is_time(&self) -> bool {
        self.alias == Some(BuiltinAlias::Time)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumItem {
    pub name: String,
    pub c_name: String,
    pub comment: String,
    pub value: u64,
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub name: String,
    pub c_name: String,
    pub is_typedef: bool,
    pub comment: String,
    /// Signed enums (`...Error`) use `i32`, everything else `u32`.
    pub underlying: Scalar,
    pub items: Vec<EnumItem>,
    pub methods: Vec<Function>,
}

impl Enum {
    /// Type used for parameters and receivers of this enum.
    pub fn receiver_type(&self) -> Type {
        Type {
            c_name: self.c_name.clone(),
            target_name: self.name.clone(),
            scalar: Some(self.underlying),
            is_primitive: true,
            is_enum_literal: true,
            array_size: -1,
            ..Default::default()
        }
    }

    pub fn contains_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructMember {
    pub c_name: String,
    pub comment: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Struct {
    pub name: String,
    pub c_name: String,
    pub is_typedef: bool,
    pub comment: String,
    pub is_pointer_composition: bool,
    pub members: Vec<StructMember>,
    pub methods: Vec<Function>,
}

impl Struct {
    pub fn new(name: impl Into<String>, c_name: impl Into<String>, is_typedef: bool) -> Self {
        Self {
            name: name.into(),
            c_name: c_name.into(),
            is_typedef,
            comment: String::new(),
            is_pointer_composition: false,
            members: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn contains_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionParameter {
    pub name: String,
    pub c_name: String,
    pub ty: Type,
}

/// The target type a method is attached to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Receiver {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub c_name: String,
    pub comment: String,
    pub parameters: Vec<FunctionParameter>,
    pub return_type: Type,
    pub receiver: Option<Receiver>,
    /// Set on member getters: the C name of the struct member read.
    pub member: Option<String>,
    /// Header the declaration was found in.
    pub file: Option<PathBuf>,
    /// Name after the naming hook, before classification trimmed it.
    pub prepared_name: String,
}

impl Function {
    pub fn new(c_name: impl Into<String>, return_type: Type) -> Self {
        let c_name = c_name.into();
        Self {
            name: c_name.clone(),
            prepared_name: c_name.clone(),
            c_name,
            comment: String::new(),
            parameters: Vec::new(),
            return_type,
            receiver: None,
            member: None,
            file: None,
        }
    }

    /// The other side of `p`'s array/length pair.
    pub fn slice_partner(&self, p: &FunctionParameter) -> Option<&FunctionParameter> {
        let name = p.ty.length_of_slice.as_deref()?;
        self.parameters.iter().find(|q| q.name == name)
    }

    /// Whether `p` counts an input slice and is filled in from it.
    pub fn is_hidden_length(&self, p: &FunctionParameter) -> bool {
        p.ty.is_length()
            && self
                .slice_partner(p)
                .is_some_and(|array| !array.ty.is_return_argument)
    }

    /// Parameters the caller passes explicitly.
    pub fn positional_parameters(&self) -> impl Iterator<Item = &FunctionParameter> {
        let skip = usize::from(self.receiver.is_some());
        self.parameters
            .iter()
            .skip(skip)
            .filter(|p| !p.ty.is_return_argument && !self.is_hidden_length(p))
    }
}
