//! Core type definitions shared by the assembler and the VM.
//!
//! - `encoding`: deterministic binary encoding used for program images
//! - `hash`: SHA3-256 digests sealing those images

pub mod encoding;
pub mod hash;
