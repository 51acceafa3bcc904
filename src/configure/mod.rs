//! Edits applied to a mounted image partition.
//!
//! Each function takes the root of a mounted partition. Applying an edit
//! twice leaves the same state as applying it once, except for the fresh salt
//! of a password hash.

mod nfsroot;
mod shadow;
mod ssh;
mod wifi;

pub use nfsroot::*;
pub use shadow::*;
pub use ssh::*;
pub use wifi::*;
