//! Bundles of field descriptors.
//!
//! A bundle groups descriptors that are iterated together. Tuples of
//! descriptors (arity 1 to 8) are positional bundles; [`composite!`]
//! declares a keyed bundle whose member names are the keys. Either way the
//! bundle is itself a [`FieldDescriptor`]: its origin is one handle per
//! member, and advancing it along a tag advances every member that carries
//! the tag while holding the others fixed.
//!
//! Building a bundle copies descriptors (or moves a [`SidMut`](crate::SidMut)
//! in). It never allocates or touches field data.

use std::fmt;
use std::marker::PhantomData;

use crate::dim::DimKey;
use crate::error::ContractViolation;
use crate::ptr::Unit;
use crate::sid::{FieldDescriptor, SharedDescriptor, StorageKind, StrideSet};

/// Shared form of a keyed bundle: the members' shared forms plus the
/// conversion into the bundle's handle type.
pub struct SharedBundle<S, H> {
    members: S,
    _handle: PhantomData<fn() -> H>,
}

impl<S, H> SharedBundle<S, H> {
    /// Wrap the members' shared forms.
    pub fn new(members: S) -> Self {
        Self {
            members,
            _handle: PhantomData,
        }
    }
}

impl<S, H> SharedDescriptor for SharedBundle<S, H>
where
    S: SharedDescriptor,
    H: From<S::Handle>,
{
    type Handle = H;

    fn unit_origin(&self, unit: &Unit) -> H {
        H::from(self.members.unit_origin(unit))
    }
}

impl<S, H> fmt::Debug for SharedBundle<S, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedBundle")
    }
}

macro_rules! tuple_bundle {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: StrideSet),+> StrideSet for ($($name,)+) {
            type Step = ($($name::Step,)+);

            fn carries(&self, dim: DimKey) -> bool {
                false $(|| self.$idx.carries(dim))+
            }

            fn step_of(&self, dim: DimKey) -> Self::Step {
                ($(self.$idx.step_of(dim),)+)
            }
        }

        impl<$($name: SharedDescriptor),+> SharedDescriptor for ($($name,)+) {
            type Handle = ($($name::Handle,)+);

            fn unit_origin(&self, unit: &Unit) -> Self::Handle {
                ($(self.$idx.unit_origin(unit),)+)
            }
        }

        impl<$($name: FieldDescriptor),+> crate::__private::Sealed for ($($name,)+) {}

        impl<$($name: FieldDescriptor),+> FieldDescriptor for ($($name,)+) {
            type Handle = ($($name::Handle,)+);
            type Strides = ($($name::Strides,)+);
            type Bounds = ($($name::Bounds,)+);
            type Shared = ($($name::Shared,)+);

            fn origin(&self) -> Self::Handle {
                ($(self.$idx.origin(),)+)
            }

            fn strides(&self) -> Self::Strides {
                ($(self.$idx.strides(),)+)
            }

            fn upper_bounds(&self) -> Self::Bounds {
                ($(self.$idx.upper_bounds(),)+)
            }

            fn element_origin(&self, dim: DimKey, index: usize) -> Self::Handle {
                ($(self.$idx.element_origin(dim, index),)+)
            }

            fn share(&self) -> Self::Shared {
                ($(self.$idx.share(),)+)
            }

            fn check_member(
                &self,
                dim: DimKey,
                extent: usize,
                storage: StorageKind,
            ) -> Result<(), ContractViolation> {
                $(self.$idx.check_member(dim, extent, storage)?;)+
                Ok(())
            }
        }
    };
}

tuple_bundle!(A 0);
tuple_bundle!(A 0, B 1);
tuple_bundle!(A 0, B 1, C 2);
tuple_bundle!(A 0, B 1, C 2, D 3);
tuple_bundle!(A 0, B 1, C 2, D 3, E 4);
tuple_bundle!(A 0, B 1, C 2, D 3, E 4, F 5);
tuple_bundle!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple_bundle!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, I 7);

/// Declare a keyed bundle of field descriptors.
///
/// Generates the bundle struct (members become public fields) and a
/// `Copy` handle struct with one handle per member, named after `=>`.
///
/// ```
/// use usid_core::{composite, Dim, FieldDescriptor, Sid, SidMut, StorageKind, H};
///
/// composite! {
///     /// Inputs and output of an edge pass.
///     pub struct EdgeFields<'a> => EdgePtr {
///         weight: Sid<'a, f64>,
///         out: SidMut<'a, f64>,
///     }
/// }
///
/// let weight = vec![2.0; 3];
/// let mut out = vec![0.0; 3];
/// let fields = EdgeFields {
///     weight: Sid::horizontal(&weight, StorageKind::Host),
///     out: SidMut::horizontal(&mut out, StorageKind::Host),
/// };
/// let p = fields.element_origin(H::key(), 1);
/// p.out.set(p.weight.get() * 3.0);
/// drop(fields);
/// assert_eq!(out, vec![0.0, 6.0, 0.0]);
/// ```
#[macro_export]
macro_rules! composite {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident<$lt:lifetime> => $handle:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name<$lt> {
            $( $(#[$fmeta])* pub $field: $ty, )+
        }

        #[doc = concat!("Handle of [`", stringify!($name), "`], one per member.")]
        #[derive(Clone, Copy, Debug)]
        $vis struct $handle<$lt> {
            $(
                #[doc = concat!("Handle of `", stringify!($field), "`.")]
                pub $field: <$ty as $crate::FieldDescriptor>::Handle,
            )+
        }

        impl<$lt> $crate::Shift for $handle<$lt> {
            type Step = (
                $( <<$ty as $crate::FieldDescriptor>::Strides as $crate::StrideSet>::Step, )+
            );

            fn shift_by(&mut self, step: Self::Step, count: isize) {
                let ( $( $field, )+ ) = step;
                $( $crate::Shift::shift_by(&mut self.$field, $field, count); )+
            }
        }

        impl<$lt> ::core::convert::From<( $( <$ty as $crate::FieldDescriptor>::Handle, )+ )>
            for $handle<$lt>
        {
            fn from(
                ( $( $field, )+ ): ( $( <$ty as $crate::FieldDescriptor>::Handle, )+ ),
            ) -> Self {
                Self { $( $field, )+ }
            }
        }

        impl<$lt> $crate::__private::Sealed for $name<$lt> {}

        impl<$lt> $crate::FieldDescriptor for $name<$lt> {
            type Handle = $handle<$lt>;
            type Strides = ( $( <$ty as $crate::FieldDescriptor>::Strides, )+ );
            type Bounds = ( $( <$ty as $crate::FieldDescriptor>::Bounds, )+ );
            type Shared = $crate::SharedBundle<
                ( $( <$ty as $crate::FieldDescriptor>::Shared, )+ ),
                $handle<$lt>,
            >;

            fn origin(&self) -> $handle<$lt> {
                $handle { $( $field: $crate::FieldDescriptor::origin(&self.$field), )+ }
            }

            fn strides(&self) -> Self::Strides {
                ( $( $crate::FieldDescriptor::strides(&self.$field), )+ )
            }

            fn upper_bounds(&self) -> Self::Bounds {
                ( $( $crate::FieldDescriptor::upper_bounds(&self.$field), )+ )
            }

            fn element_origin(&self, dim: $crate::DimKey, index: usize) -> $handle<$lt> {
                $handle {
                    $( $field: $crate::FieldDescriptor::element_origin(&self.$field, dim, index), )+
                }
            }

            fn share(&self) -> Self::Shared {
                $crate::SharedBundle::new(( $( $crate::FieldDescriptor::share(&self.$field), )+ ))
            }

            fn check_member(
                &self,
                dim: $crate::DimKey,
                extent: usize,
                storage: $crate::StorageKind,
            ) -> ::core::result::Result<(), $crate::ContractViolation> {
                $( $crate::FieldDescriptor::check_member(&self.$field, dim, extent, storage)?; )+
                ::core::result::Result::Ok(())
            }
        }
    };
}
