//! Argument Forwarder
//!
//! The runtime-value dual of the parameter logger: unwrap traced wrappers to
//! the runtime objects they own so the real call can be made. Nothing here
//! copies bulk data; fundamentals pass through and wrappers hand out their
//! payload by reference or by shared handle.

use crate::trace::registry::TraceHandle;
use std::sync::Arc;

/// How a receiver is spelled in the emitted source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Value object: `quant_0.SetScales(...)`.
    Value,
    /// Shared handle: `graph_0->Compile()`.
    Pointer,
}

impl Access {
    pub fn token(self) -> &'static str {
        match self {
            Access::Value => ".",
            Access::Pointer => "->",
        }
    }
}

/// Capability marker for wrapper types.
pub trait Traced {
    /// Runtime type the wrapper owns.
    type Target: ?Sized;

    /// API type name, used to pick the naming prefix.
    const TYPE_NAME: &'static str;

    /// Receiver spelling for methods called on this type.
    const ACCESS: Access = Access::Pointer;

    fn trace_name(&self) -> &str;

    fn trace_handle(&self) -> TraceHandle;

    fn target(&self) -> &Self::Target;

    fn shared_target(&self) -> Arc<Self::Target>;
}

/// Values that can be handed to the runtime.
pub trait Forwardable {
    type Forwarded<'a>
    where
        Self: 'a;

    fn forward(&self) -> Self::Forwarded<'_>;
}

macro_rules! impl_forward_fundamental {
    ($($ty:ty),*) => {
        $(
            impl Forwardable for $ty {
                type Forwarded<'a> = $ty;

                fn forward(&self) -> $ty {
                    *self
                }
            }
        )*
    };
}

impl_forward_fundamental!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, bool, usize);

macro_rules! impl_forward_element {
    ($($ty:ty),*) => {
        $(
            impl Forwardable for Vec<$ty> {
                type Forwarded<'a> = &'a [$ty];

                fn forward(&self) -> &[$ty] {
                    self.as_slice()
                }
            }

            impl Forwardable for [$ty] {
                type Forwarded<'a> = &'a [$ty];

                fn forward(&self) -> &[$ty] {
                    self
                }
            }

            impl<const N: usize> Forwardable for [$ty; N] {
                type Forwarded<'a> = &'a [$ty; N];

                fn forward(&self) -> &[$ty; N] {
                    self
                }
            }
        )*
    };
}

impl_forward_element!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl<T: Traced> Forwardable for Arc<T> {
    type Forwarded<'a> = Arc<T::Target> where Self: 'a;

    fn forward(&self) -> Arc<T::Target> {
        self.shared_target()
    }
}

impl<T: Traced> Forwardable for [Arc<T>] {
    type Forwarded<'a> = Vec<Arc<T::Target>> where Self: 'a;

    fn forward(&self) -> Vec<Arc<T::Target>> {
        unwrap_all(self)
    }
}

impl<T: Traced> Forwardable for Vec<Arc<T>> {
    type Forwarded<'a> = Vec<Arc<T::Target>> where Self: 'a;

    fn forward(&self) -> Vec<Arc<T::Target>> {
        unwrap_all(self)
    }
}

impl<'b> Forwardable for Option<&'b [u8]> {
    type Forwarded<'a> = Option<&'b [u8]> where Self: 'a;

    fn forward(&self) -> Option<&'b [u8]> {
        *self
    }
}

/// Forward a traced value by its shared runtime handle instead of by
/// reference, for runtime calls that keep the object.
#[derive(Debug, Clone, Copy)]
pub struct Shared<'t, T: ?Sized>(pub &'t T);

impl<T: Traced + ?Sized> Forwardable for Shared<'_, T> {
    type Forwarded<'a> = Arc<T::Target> where Self: 'a;

    fn forward(&self) -> Arc<T::Target> {
        self.0.shared_target()
    }
}

/// Unwrap a by-value traced object to its runtime payload.
pub fn unwrap_ref<T: Traced + ?Sized>(object: &T) -> &T::Target {
    object.target()
}

/// Unwrap each traced handle in `objects` to its runtime shared handle.
pub fn unwrap_all<T: Traced>(objects: &[Arc<T>]) -> Vec<Arc<T::Target>> {
    objects.iter().map(|o| o.shared_target()).collect()
}
