//! provrb assembly toolchain.
//!
//! Assembles `.pvb` source into a [`virtual_machine::program::Program`] and runs it
//! on a small stack/register virtual machine.

pub mod types;
pub mod utils;
pub mod virtual_machine;
