//! Re-exports of std values for when std is available, or local
//! reimplementations of the same surface when it is not.

#[cfg(feature = "std")]
mod std_impl;
#[cfg(feature = "std")]
pub use std_impl::*;

#[cfg(not(feature = "std"))]
mod nostd_impl;
#[cfg(not(feature = "std"))]
pub use nostd_impl::*;
