//! Parameter Logger
//!
//! Turns one call argument into the source text that reproduces it. Small
//! values render as literals. Vectors, arrays and raw buffers are written to
//! the payload store and render as a `trace::Replayer` load expression
//! pointing back at the dumped region.
//!
//! # Rendering
//! | Variant | Text |
//! |---|---|
//! | fundamental | `42`, `0.5`, `true` |
//! | enum | `(Color)7` |
//! | vector | `trace::Replayer::get_vector<int32_t>(0, 3)` |
//! | array | `trace::Replayer::get_array<uint32_t, 2>(12, 2)` |
//! | traced object | `tensor_3` |
//! | traced vector | `{tensor_0, tensor_1}` |
//! | buffer | `trace::Replayer::get_vector<char>(20, 64).data()` or `nullptr` |
//! | unsupported | empty |

use crate::trace::forward::Traced;
use crate::trace::payload::PayloadStore;
use smallvec::SmallVec;
use std::sync::Arc;

/// Scalar types with a literal source representation.
pub trait Fundamental: Copy {
    /// C++ spelling of the type.
    const CXX_TYPE: &'static str;

    fn literal(self) -> String;
}

/// Fundamentals that can be dumped to the payload store as raw bytes.
pub trait Element: Fundamental + bytemuck::Pod {}

/// Enumerations rendered as a cast of their integer value.
pub trait TraceEnum: Copy {
    const TYPE_NAME: &'static str;

    fn raw_value(self) -> i64;
}

macro_rules! impl_integer {
    ($($ty:ty => $cxx:literal),* $(,)?) => {
        $(
            impl Fundamental for $ty {
                const CXX_TYPE: &'static str = $cxx;

                fn literal(self) -> String {
                    integer_literal(self as i128)
                }
            }

            impl Element for $ty {}
        )*
    };
}

impl_integer! {
    i8 => "int8_t",
    u8 => "uint8_t",
    i16 => "int16_t",
    u16 => "uint16_t",
    i32 => "int32_t",
    u32 => "uint32_t",
    i64 => "int64_t",
    u64 => "uint64_t",
}

impl Fundamental for f32 {
    const CXX_TYPE: &'static str = "float";

    fn literal(self) -> String {
        float_literal(self.is_nan(), self.is_infinite(), self.is_sign_negative(), || {
            format!("{self:?}")
        })
    }
}

impl Element for f32 {}

impl Fundamental for f64 {
    const CXX_TYPE: &'static str = "double";

    fn literal(self) -> String {
        float_literal(self.is_nan(), self.is_infinite(), self.is_sign_negative(), || {
            format!("{self:?}")
        })
    }
}

impl Element for f64 {}

impl Fundamental for bool {
    const CXX_TYPE: &'static str = "bool";

    fn literal(self) -> String {
        self.to_string()
    }
}

impl Fundamental for usize {
    const CXX_TYPE: &'static str = "size_t";

    fn literal(self) -> String {
        integer_literal(self as i128)
    }
}

/// Decimal literal a C++ compiler reads back as the same value. `i64::MIN`
/// has no plain literal form and values past `INT64_MAX` need `ULL`.
fn integer_literal(value: i128) -> String {
    if value == i128::from(i64::MIN) {
        "INT64_MIN".to_string()
    } else if value > i128::from(i64::MAX) {
        format!("{value}ULL")
    } else {
        value.to_string()
    }
}

fn float_literal(nan: bool, inf: bool, negative: bool, finite: impl FnOnce() -> String) -> String {
    match (nan, inf, negative) {
        (true, _, _) => "NAN".to_string(),
        (false, true, false) => "INFINITY".to_string(),
        (false, true, true) => "-INFINITY".to_string(),
        _ => finite(),
    }
}

/// One argument, classified by how it renders.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceArg<'a> {
    Fundamental(String),
    Enum {
        type_name: &'static str,
        value: i64,
    },
    Array {
        elem_type: &'static str,
        len: usize,
        bytes: &'a [u8],
    },
    Vector {
        elem_type: &'static str,
        count: usize,
        bytes: &'a [u8],
    },
    Traced(String),
    TracedVec(Vec<String>),
    Buffer(Option<&'a [u8]>),
    /// Text already rendered by a call-specific hook.
    Expr(String),
    Unsupported,
}

impl<'a> TraceArg<'a> {
    pub fn scalar<T: Fundamental>(value: T) -> Self {
        Self::Fundamental(value.literal())
    }

    pub fn enumeration<E: TraceEnum>(value: E) -> Self {
        Self::Enum {
            type_name: E::TYPE_NAME,
            value: value.raw_value(),
        }
    }

    pub fn array<T: Element, const N: usize>(values: &'a [T; N]) -> Self {
        Self::Array {
            elem_type: T::CXX_TYPE,
            len: N,
            bytes: bytemuck::cast_slice(values.as_slice()),
        }
    }

    pub fn vector<T: Element>(values: &'a [T]) -> Self {
        Self::Vector {
            elem_type: T::CXX_TYPE,
            count: values.len(),
            bytes: bytemuck::cast_slice(values),
        }
    }

    pub fn traced<T: Traced + ?Sized>(object: &T) -> Self {
        Self::Traced(object.trace_name().to_string())
    }

    pub fn traced_vec<T: Traced>(objects: &[Arc<T>]) -> Self {
        Self::TracedVec(objects.iter().map(|o| o.trace_name().to_string()).collect())
    }

    pub fn buffer(bytes: Option<&'a [u8]>) -> Self {
        Self::Buffer(bytes)
    }

    pub fn expr(text: impl Into<String>) -> Self {
        Self::Expr(text.into())
    }

    /// Whether rendering this argument writes to the payload store.
    pub fn touches_store(&self) -> bool {
        matches!(
            self,
            Self::Array { .. } | Self::Vector { .. } | Self::Buffer(Some(_))
        )
    }

    /// Render to source text, dumping bulk data into `store`.
    pub fn render(&self, store: &PayloadStore) -> String {
        match self {
            Self::Fundamental(literal) => literal.clone(),
            Self::Enum { type_name, value } => format!("({type_name}){value}"),
            Self::Array {
                elem_type,
                len,
                bytes,
            } => {
                let offset = store.dump(bytes, element_size(bytes.len(), *len), *len);
                format!("trace::Replayer::get_array<{elem_type}, {len}>({offset}, {len})")
            }
            Self::Vector {
                elem_type,
                count,
                bytes,
            } => {
                let offset = store.dump(bytes, element_size(bytes.len(), *count), *count);
                format!("trace::Replayer::get_vector<{elem_type}>({offset}, {count})")
            }
            Self::Traced(name) | Self::Expr(name) => name.clone(),
            Self::TracedVec(names) => format!("{{{}}}", names.join(", ")),
            Self::Buffer(Some(bytes)) => {
                let offset = store.dump(bytes, 1, bytes.len());
                format!(
                    "trace::Replayer::get_vector<char>({offset}, {}).data()",
                    bytes.len()
                )
            }
            Self::Buffer(None) => "nullptr".to_string(),
            Self::Unsupported => String::new(),
        }
    }
}

fn element_size(byte_len: usize, count: usize) -> usize {
    if count == 0 {
        0
    } else {
        byte_len / count
    }
}

/// Values that know how to classify themselves as a [`TraceArg`].
pub trait Loggable {
    fn trace_arg(&self) -> TraceArg<'_>;
}

macro_rules! impl_loggable_fundamental {
    ($($ty:ty),*) => {
        $(
            impl Loggable for $ty {
                fn trace_arg(&self) -> TraceArg<'_> {
                    TraceArg::scalar(*self)
                }
            }
        )*
    };
}

impl_loggable_fundamental!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, bool, usize);

macro_rules! impl_loggable_element {
    ($($ty:ty),*) => {
        $(
            impl Loggable for [$ty] {
                fn trace_arg(&self) -> TraceArg<'_> {
                    TraceArg::vector(self)
                }
            }

            impl Loggable for Vec<$ty> {
                fn trace_arg(&self) -> TraceArg<'_> {
                    TraceArg::vector(self.as_slice())
                }
            }

            impl<const N: usize> Loggable for [$ty; N] {
                fn trace_arg(&self) -> TraceArg<'_> {
                    TraceArg::array(self)
                }
            }
        )*
    };
}

impl_loggable_element!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl<T: Traced> Loggable for Arc<T> {
    fn trace_arg(&self) -> TraceArg<'_> {
        TraceArg::traced(self.as_ref())
    }
}

impl<T: Traced> Loggable for [Arc<T>] {
    fn trace_arg(&self) -> TraceArg<'_> {
        TraceArg::traced_vec(self)
    }
}

impl<T: Traced> Loggable for Vec<Arc<T>> {
    fn trace_arg(&self) -> TraceArg<'_> {
        TraceArg::traced_vec(self)
    }
}

impl Loggable for Option<&[u8]> {
    fn trace_arg(&self) -> TraceArg<'_> {
        TraceArg::buffer(*self)
    }
}

impl<T: Loggable + ?Sized> Loggable for &T {
    fn trace_arg(&self) -> TraceArg<'_> {
        (**self).trace_arg()
    }
}

/// Implement [`TraceEnum`], [`Loggable`] and [`Forwardable`](crate::trace::Forwardable)
/// for a fieldless `Copy` enum.
#[macro_export]
macro_rules! trace_enum {
    ($ty:ty, $name:expr) => {
        impl $crate::trace::TraceEnum for $ty {
            const TYPE_NAME: &'static str = $name;

            fn raw_value(self) -> i64 {
                self as i64
            }
        }

        impl $crate::trace::Loggable for $ty {
            fn trace_arg(&self) -> $crate::trace::TraceArg<'_> {
                $crate::trace::TraceArg::enumeration(*self)
            }
        }

        impl $crate::trace::Forwardable for $ty {
            type Forwarded<'a> = $ty where Self: 'a;

            fn forward(&self) -> $ty {
                *self
            }
        }
    };
}

/// Rendered arguments of the call being logged, by position.
#[derive(Debug, Default)]
pub struct ParamCache {
    params: SmallVec<[String; 8]>,
}

impl ParamCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-sized for a call with `arity` declared parameters.
    pub fn with_arity(arity: usize) -> Self {
        let mut params = SmallVec::new();
        params.resize(arity, String::new());
        Self { params }
    }

    /// Set the parameter at `index`, growing the cache if needed.
    pub fn insert_at(&mut self, index: usize, text: String) {
        if index >= self.params.len() {
            self.params.resize(index + 1, String::new());
        }
        self.params[index] = text;
    }

    pub fn append(&mut self, text: String) {
        self.params.push(text);
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn join(&self) -> String {
        self.params.join(", ")
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }
}
