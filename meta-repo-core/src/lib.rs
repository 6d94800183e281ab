//! Coordination engine for mono-repositories built out of Git submodules.

#![warn(missing_docs)]
#![warn(
    clippy::all,
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro
)]
#![allow(clippy::too_many_arguments, clippy::blocks_in_conditions)]

pub mod assert;
pub mod ast;
pub mod codec;
pub mod coordinator;
pub mod git;
pub mod status;
pub mod testing;
pub mod util;
