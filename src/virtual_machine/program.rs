//! Assembled program representation and its binary image.
//!
//! A [`Program`] is built once by the assembler and then only read: the VM
//! borrows it for a run, so one program can back several machines at once.
//!
//! # Image format
//!
//! ```text
//! "PVBIMG" | version (3 x u8) | program (BinaryCodec) | SHA3-256 of everything before
//! ```

use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use crate::types::hash::{HASH_LEN, Hash};
use crate::virtual_machine::config::Dialect;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::operand::Operand;
use provrb_derive::BinaryCodec;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Magic bytes identifying a program image.
const MAGIC: &[u8; 6] = b"PVBIMG";

/// Current image format version.
const CURRENT_VERSION: Version = Version::new(1, 0, 0);

/// Name of the label where execution starts.
pub const ENTRY_LABEL: &str = "start";

#[derive(Debug, PartialEq, Eq, BinaryCodec)]
struct Version {
    major: u8,
    minor: u8,
    patch: u8,
}

impl Version {
    const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Encode for Opcode {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        (*self as u8).encode(out);
    }
}

impl Decode for Opcode {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Opcode::try_from(u8::decode(input)?).map_err(|_| DecodeError::InvalidValue)
    }
}

#[derive(Clone, Debug, PartialEq, BinaryCodec)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Self { opcode, operand }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.operand {
            Operand::None => write!(f, "{}", self.opcode),
            ref operand => write!(f, "{} {}", self.opcode, operand),
        }
    }
}

/// Named jump target bound to the index of the instruction after its declaration.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Label {
    pub name: String,
    pub target: usize,
}

/// Source position of an assembled instruction, kept for listings and diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Token {
    /// Index of the instruction in the program.
    pub instruction: usize,
    /// 1-based source line.
    pub line: usize,
    /// Statement text without its comment.
    pub text: String,
    pub file: Arc<str>,
}

#[derive(Clone, Debug, Default, PartialEq, BinaryCodec)]
pub struct Program {
    pub dialect: Dialect,
    pub instructions: Vec<Instruction>,
    pub labels: Vec<Label>,
    pub tokens: Vec<Token>,
}

impl Program {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Finds a label by name.
    pub fn label(&self, name: &str) -> Option<&Label> {
        self.labels.iter().find(|label| label.name == name)
    }

    /// Returns the index execution starts at.
    ///
    /// Register-dialect programs must declare `start`. Stack-dialect programs
    /// without it start at the first instruction.
    pub fn entry_point(&self) -> Result<usize, VMError> {
        match (self.label(ENTRY_LABEL), self.dialect) {
            (Some(label), _) => Ok(label.target),
            (None, Dialect::Stack) => Ok(0),
            (None, Dialect::Register) => Err(VMError::NoEntryPoint),
        }
    }

    /// Returns the index of the last instruction in the label region holding `target`.
    ///
    /// A region runs up to the instruction before the next label, or to the end
    /// of the program.
    pub fn region_end(&self, target: usize) -> usize {
        self.labels
            .iter()
            .map(|label| label.target)
            .filter(|&start| start > target)
            .min()
            .map(|next| next - 1)
            .unwrap_or_else(|| self.len().saturating_sub(1))
    }

    /// Renders one `line: statement` row per instruction.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            let _ = writeln!(out, "{:06}: {}", token.line, token.text);
        }
        out
    }

    /// Returns true when `data` starts with the image magic.
    pub fn is_image(data: &[u8]) -> bool {
        data.starts_with(MAGIC)
    }

    /// Serializes the program into a sealed, versioned image.
    pub fn to_image(&self) -> Vec<u8> {
        let mut out = Vec::new();
        MAGIC.encode(&mut out);
        CURRENT_VERSION.encode(&mut out);
        self.encode(&mut out);

        let mut digest = Hash::sha3();
        digest.update(&out);
        digest.finalize().encode(&mut out);
        out
    }

    /// Deserializes and validates an image produced by [`Program::to_image`].
    pub fn from_image(data: &[u8]) -> Result<Program, VMError> {
        if data.len() < MAGIC.len() + HASH_LEN {
            return Err(decode_error("truncated"));
        }

        let (body, trailer) = data.split_at(data.len() - HASH_LEN);
        let mut input = body;

        if &<[u8; 6]>::decode(&mut input)? != MAGIC {
            return Err(decode_error("bad magic"));
        }

        if Version::decode(&mut input)? != CURRENT_VERSION {
            return Err(decode_error("unsupported version"));
        }

        let mut digest = Hash::sha3();
        digest.update(body);
        if digest.finalize().as_slice() != trailer {
            return Err(decode_error("digest mismatch"));
        }

        let program = Program::decode(&mut input)?;
        if !input.is_empty() {
            return Err(decode_error("trailing bytes"));
        }
        program.validate()?;
        Ok(program)
    }

    /// Reads an image from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Program, VMError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| io_error(path, e))?;
        Program::from_image(&data)
    }

    /// Writes this program's image to disk.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), VMError> {
        let path = path.as_ref();
        fs::write(path, self.to_image()).map_err(|e| io_error(path, e))
    }

    /// Checks that every jump and label target lies within the program.
    fn validate(&self) -> Result<(), VMError> {
        let len = self.len();
        for (index, instruction) in self.instructions.iter().enumerate() {
            if let Operand::Target(target) = instruction.operand
                && target > len
            {
                return Err(decode_error(&format!(
                    "instruction {index} targets {target} past the end ({len})"
                )));
            }
        }
        if let Some(label) = self.labels.iter().find(|label| label.target > len) {
            return Err(decode_error(&format!(
                "label '{}' targets {} past the end ({len})",
                label.name, label.target
            )));
        }
        Ok(())
    }
}

fn decode_error(reason: &str) -> VMError {
    VMError::Decode {
        reason: reason.to_string(),
    }
}

pub(crate) fn io_error(path: &Path, err: std::io::Error) -> VMError {
    VMError::Io {
        path: path.display().to_string(),
        source: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::assembler::assemble_source;
    use crate::virtual_machine::operand::{Register, Source, Value};

    const SAMPLE: &str = "_start:\n    mov $2, rax ; two\n    jmp _done\n_done:\n    push rax\n    print\n";

    fn sample() -> Program {
        assemble_source(SAMPLE).expect("sample assembles")
    }

    #[test]
    fn image_roundtrip_preserves_program() {
        let program = sample();
        let image = program.to_image();
        assert!(Program::is_image(&image));
        assert_eq!(Program::from_image(&image).unwrap(), program);
    }

    #[test]
    fn image_layout_starts_with_magic_and_version() {
        let image = sample().to_image();
        assert_eq!(&image[..6], b"PVBIMG");
        assert_eq!(&image[6..9], &[1, 0, 0]);
    }

    #[test]
    fn image_rejects_bad_magic() {
        let mut image = sample().to_image();
        image[0] = b'X';
        let err = Program::from_image(&image).unwrap_err();
        assert!(matches!(err, VMError::Decode { ref reason } if reason == "bad magic"));
    }

    #[test]
    fn image_rejects_other_versions() {
        let mut image = sample().to_image();
        image[6] = 2;
        let err = Program::from_image(&image).unwrap_err();
        assert!(matches!(err, VMError::Decode { ref reason } if reason == "unsupported version"));
    }

    #[test]
    fn image_rejects_corruption() {
        let mut image = sample().to_image();
        let middle = image.len() / 2;
        image[middle] ^= 0x40;
        let err = Program::from_image(&image).unwrap_err();
        assert!(matches!(err, VMError::Decode { ref reason } if reason == "digest mismatch"));
    }

    #[test]
    fn image_rejects_truncation() {
        let image = sample().to_image();
        assert!(Program::from_image(&image[..10]).is_err());
        assert!(Program::from_image(&image[..image.len() - 1]).is_err());
    }

    #[test]
    fn image_rejects_out_of_range_targets() {
        let mut program = Program::new(Dialect::Register);
        program
            .instructions
            .push(Instruction::new(Opcode::Jmp, Operand::Target(9)));
        let err = Program::from_image(&program.to_image()).unwrap_err();
        assert!(matches!(err, VMError::Decode { ref reason } if reason.contains("past the end")));
    }

    #[test]
    fn entry_point_rules() {
        assert_eq!(sample().entry_point().unwrap(), 0);
        assert!(matches!(
            Program::new(Dialect::Register).entry_point(),
            Err(VMError::NoEntryPoint)
        ));
        assert_eq!(Program::new(Dialect::Stack).entry_point().unwrap(), 0);
    }

    #[test]
    fn region_end_stops_before_next_label() {
        let program = sample();
        // _start covers 0..=1, _done covers 2..=3.
        assert_eq!(program.region_end(0), 1);
        assert_eq!(program.region_end(2), 3);
        assert_eq!(program.region_end(3), 3);
    }

    #[test]
    fn listing_pads_line_numbers() {
        let listing = sample().listing();
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines[0], "000002: mov $2, rax");
        assert_eq!(lines[1], "000003: jmp _done");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn instruction_display() {
        let mov = Instruction::new(
            Opcode::Mov,
            Operand::Pair {
                source: Source::Immediate(Value::I64(2)),
                destination: Register::Rax,
            },
        );
        assert_eq!(mov.to_string(), "mov $2, rax");
        assert_eq!(Instruction::new(Opcode::Ret, Operand::None).to_string(), "ret");
    }

    #[test]
    fn save_and_load_through_disk() {
        let path = std::env::temp_dir().join(format!("provrb-image-{}.pvbc", std::process::id()));
        let program = sample();
        program.save(&path).unwrap();
        let loaded = Program::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, program);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Program::load("/nonexistent/provrb/image.pvbc").unwrap_err();
        assert!(matches!(err, VMError::Io { .. }));
    }
}
