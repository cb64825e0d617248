use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::codec::Kind;
use crate::transfer::ElementWidth;

mod sealed {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for f64 {}
}

/// Array element types the protocol can carry.
///
/// Arrays are sent straight from their memory (`as_bytes`) and received
/// straight into it (`as_mut_bytes`); only byte order is ever adjusted.
pub trait Element: FromBytes + IntoBytes + Immutable + Copy + Default + sealed::Sealed {
    /// Header kind for an array of this element.
    const KIND: Kind;
    const WIDTH: ElementWidth;
}

impl Element for i32 {
    const KIND: Kind = Kind::Int32Array;
    const WIDTH: ElementWidth = ElementWidth::Four;
}

impl Element for f64 {
    const KIND: Kind = Kind::Float64Array;
    const WIDTH: ElementWidth = ElementWidth::Eight;
}

/// Byte length of an element slice, as carried in a header.
pub fn byte_len<E: Element>(elements: &[E]) -> u64 {
    elements.as_bytes().len() as u64
}
