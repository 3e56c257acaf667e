//! Stable integer handles into the [`crate::buffer::BufferPool`].
//!
//! Each handle is a thin newtype around a dense `usize` index, cheap to
//! `Copy` like the node handles of a graph-backed structure, but kept as
//! distinct types so the compiler rejects passing a matrix handle where a
//! partial handle is expected.

use std::fmt;

macro_rules! handle_type {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub const KIND: &'static str = $kind;

            pub fn index(&self) -> usize {
                self.0
            }
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                Self(index)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

handle_type!(TipHandle, "tip");
handle_type!(PartialHandle, "partial");
handle_type!(MatrixHandle, "matrix");
handle_type!(EigenHandle, "eigen");
handle_type!(ScaleHandle, "scale");
