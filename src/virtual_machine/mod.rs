//! Assembler and virtual machine for provrb assembly.
//!
//! Source text is scanned by the [`assembler`] into an immutable
//! [`program::Program`], which the [`vm::VM`] executes to completion.
//!
//! # Architecture
//!
//! - **Registers**: 14 general-purpose registers (`rax` to `r15`) holding typed [`operand::Value`]s
//! - **Stack**: bounded LIFO of values, sized by the [`config::Profile`]
//! - **Flags**: zero, sign and overflow, set by `cmp` and read by conditional jumps
//! - **Control flow**: one saved return address shared by `call`, `ret` and the
//!   auto-return of a `jmp` into a label region
//! - **Dialects**: arithmetic either on register pairs or on the stack
//!
//! # Modules
//!
//! - [`assembler`]: Source scanning, label resolution and diagnostics
//! - [`config`]: Build profiles and assembler/machine settings
//! - [`errors`]: Assembly and execution error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`operand`]: Values, registers and instruction operands
//! - [`program`]: Assembled programs, listings and the binary image format
//! - [`vm`]: Core virtual machine, syscalls and host I/O

pub mod assembler;
pub mod config;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod operand;
pub mod program;
pub mod vm;
