//! Dimension tags and their runtime keys.
//!
//! A dimension tag is a zero-size type naming one logical axis of a field:
//! the horizontal element axis, the vertical level axis, the neighbour slot
//! axis of a connectivity table, or any axis a caller declares with
//! [`dimension!`](crate::dimension). Tags carry no runtime state; they key
//! [`StrideMap`](crate::StrideMap)s and [`Loop`](crate::Loop)s through their
//! [`DimKey`].

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A logical axis of a field.
///
/// Implemented by unit structs, usually through [`dimension!`](crate::dimension).
pub trait Dim: Copy + Default + fmt::Debug + Send + Sync + 'static {
    /// Short name used in diagnostics and error messages.
    const NAME: &'static str;

    /// Runtime key of this tag.
    fn key() -> DimKey {
        DimKey::of::<Self>()
    }
}

/// Runtime identity of a dimension tag.
///
/// Two keys are equal exactly when they were produced from the same tag
/// type. The name is carried for diagnostics only.
#[derive(Clone, Copy)]
pub struct DimKey {
    id: TypeId,
    name: &'static str,
}

impl DimKey {
    /// Key of tag `D`.
    pub fn of<D: Dim>() -> Self {
        Self {
            id: TypeId::of::<D>(),
            name: D::NAME,
        }
    }

    /// Diagnostic name of the tag.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for DimKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DimKey {}

impl Hash for DimKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DimKey({})", self.name)
    }
}

impl fmt::Display for DimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Declare a dimension tag.
///
/// ```
/// usid_core::dimension! {
///     /// Edge-to-vertex slot axis.
///     pub E2V = "e2v"
/// }
/// use usid_core::Dim;
/// assert_eq!(E2V::NAME, "e2v");
/// ```
#[macro_export]
macro_rules! dimension {
    ($(#[$meta:meta])* $vis:vis $name:ident = $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        $vis struct $name;

        impl $crate::Dim for $name {
            const NAME: &'static str = $label;
        }
    };
    ($(#[$meta:meta])* $vis:vis $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        $vis struct $name;

        impl $crate::Dim for $name {
            const NAME: &'static str = stringify!($name);
        }
    };
}

dimension! {
    /// The horizontal (element) axis: vertices, edges or cells.
    pub Horizontal = "h"
}

dimension! {
    /// The vertical (level) axis.
    pub Vertical = "k"
}

dimension! {
    /// The neighbour slot axis of a connectivity table.
    pub Neighbor = "n"
}

/// Short alias for [`Horizontal`].
pub type H = Horizontal;
/// Short alias for [`Vertical`].
pub type K = Vertical;
/// Short alias for [`Neighbor`].
pub type N = Neighbor;
