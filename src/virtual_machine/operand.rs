//! Values, registers and instruction operands.

use provrb_derive::BinaryCodec;
use std::fmt;
use std::sync::Arc;

/// User-addressable registers.
///
/// `rax` is the accumulator: it holds the syscall number and result and the
/// exit code read by `exit`. Syscall arguments travel in `rdi rsi rdx r10 r8 r9`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BinaryCodec)]
pub enum Register {
    Rax = 0,
    Rbx = 1,
    Rcx = 2,
    Rdx = 3,
    Rdi = 4,
    Rsi = 5,
    R8 = 6,
    R9 = 7,
    R10 = 8,
    R11 = 9,
    R12 = 10,
    R13 = 11,
    R14 = 12,
    R15 = 13,
}

impl Register {
    pub const COUNT: usize = 14;

    pub const ALL: [Register; Register::COUNT] = [
        Register::Rax,
        Register::Rbx,
        Register::Rcx,
        Register::Rdx,
        Register::Rdi,
        Register::Rsi,
        Register::R8,
        Register::R9,
        Register::R10,
        Register::R11,
        Register::R12,
        Register::R13,
        Register::R14,
        Register::R15,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Register::Rax => "rax",
            Register::Rbx => "rbx",
            Register::Rcx => "rcx",
            Register::Rdx => "rdx",
            Register::Rdi => "rdi",
            Register::Rsi => "rsi",
            Register::R8 => "r8",
            Register::R9 => "r9",
            Register::R10 => "r10",
            Register::R11 => "r11",
            Register::R12 => "r12",
            Register::R13 => "r13",
            Register::R14 => "r14",
            Register::R15 => "r15",
        }
    }

    /// Resolves a register name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Register> {
        Register::ALL
            .into_iter()
            .find(|reg| reg.name().eq_ignore_ascii_case(name))
    }

    pub fn from_id(id: u8) -> Option<Register> {
        Register::ALL.get(id as usize).copied()
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tagged value held by stack slots, registers and literal operands.
#[derive(Clone, Debug, PartialEq, Default, BinaryCodec)]
pub enum Value {
    #[default]
    Empty,
    I64(i64),
    U64(u64),
    F64(f64),
    Byte(u8),
    /// Raw string bytes; escapes are decoded only when written out.
    Str(Arc<[u8]>),
    Register(Register),
    /// Host handle such as a mapped memory address.
    Opaque(u64),
}

impl Value {
    pub fn str(text: &str) -> Value {
        Value::Str(Arc::from(text.as_bytes()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Empty => "empty",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F64(_) => "f64",
            Value::Byte(_) => "byte",
            Value::Str(_) => "str",
            Value::Register(_) => "register",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Numeric view used by arithmetic, comparison and syscalls.
    ///
    /// `Empty` reads as zero so untouched registers behave like cleared ones.
    pub fn as_number(&self) -> Option<Number> {
        match *self {
            Value::Empty => Some(Number::Int(0)),
            Value::I64(v) => Some(Number::Int(v)),
            Value::U64(v) => Some(Number::UInt(v)),
            Value::F64(v) => Some(Number::Float(v)),
            Value::Byte(v) => Some(Number::Int(v as i64)),
            Value::Str(_) | Value::Register(_) | Value::Opaque(_) => None,
        }
    }

    /// Integer view used for descriptors, pins, addresses and exit codes.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Empty => Some(0),
            Value::I64(v) => Some(v),
            Value::U64(v) => Some(v as i64),
            Value::Byte(v) => Some(v as i64),
            Value::Opaque(v) => Some(v as i64),
            Value::F64(_) | Value::Str(_) | Value::Register(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("empty"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v:.6}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Str(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            Value::Register(reg) => f.write_str(reg.name()),
            Value::Opaque(v) => write!(f, "0x{v:x}"),
        }
    }
}

/// Numeric operand after type resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::UInt(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    /// Two's-complement view; floats truncate toward zero.
    pub fn as_i64(self) -> i64 {
        match self {
            Number::Int(v) => v,
            Number::UInt(v) => v as i64,
            Number::Float(v) => v as i64,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(v) => v == 0,
            Number::UInt(v) => v == 0,
            Number::Float(v) => v == 0.0,
        }
    }
}

/// Source side of a two-operand instruction.
#[derive(Clone, Debug, PartialEq, BinaryCodec)]
pub enum Source {
    Register(Register),
    /// `$`-prefixed constant.
    Immediate(Value),
}

/// Operand attached to an instruction.
#[derive(Clone, Debug, PartialEq, Default, BinaryCodec)]
pub enum Operand {
    #[default]
    None,
    /// Literal, register reference (PUSH/POP) or shift amount.
    Value(Value),
    /// Resolved instruction index of a label.
    Target(usize),
    /// `source, destination` pair for MOV, CMP and register-form arithmetic.
    Pair {
        source: Source,
        destination: Register,
    },
}

impl Operand {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operand::None => "no operand",
            Operand::Value(_) => "value",
            Operand::Target(_) => "label target",
            Operand::Pair { .. } => "register pair",
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Value(Value::Str(bytes)) => {
                write!(f, "\"{}\"", String::from_utf8_lossy(bytes))
            }
            Operand::Value(value) => write!(f, "{value}"),
            Operand::Target(index) => write!(f, "@{index}"),
            Operand::Pair {
                source: Source::Register(reg),
                destination,
            } => write!(f, "{reg}, {destination}"),
            Operand::Pair {
                source: Source::Immediate(value),
                destination,
            } => write!(f, "${value}, {destination}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::{Decode, DecodeError, Encode};

    #[test]
    fn register_names_resolve_case_insensitively() {
        assert_eq!(Register::from_name("rax"), Some(Register::Rax));
        assert_eq!(Register::from_name("R15"), Some(Register::R15));
        assert_eq!(Register::from_name("rdi"), Some(Register::Rdi));
        assert_eq!(Register::from_name("r16"), None);
        assert_eq!(Register::from_name("ep"), None);
    }

    #[test]
    fn register_ids_follow_declaration_order() {
        for (i, reg) in Register::ALL.iter().enumerate() {
            assert_eq!(reg.index(), i);
            assert_eq!(Register::from_id(i as u8), Some(*reg));
        }
        assert_eq!(Register::from_id(Register::COUNT as u8), None);
    }

    #[test]
    fn unknown_register_id_fails_to_decode() {
        assert_eq!(Register::from_bytes(&[14]), Err(DecodeError::InvalidValue));
        assert_eq!(Register::from_bytes(&[8]).unwrap(), Register::R10);
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Empty.to_string(), "empty");
        assert_eq!(Value::I64(-4).to_string(), "-4");
        assert_eq!(Value::F64(2.5).to_string(), "2.500000");
        assert_eq!(Value::str("a\\n").to_string(), "a\\n");
        assert_eq!(Value::Register(Register::Rbx).to_string(), "rbx");
        assert_eq!(Value::Opaque(0x1000_0000).to_string(), "0x10000000");
    }

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Empty.as_number(), Some(Number::Int(0)));
        assert_eq!(Value::Byte(7).as_number(), Some(Number::Int(7)));
        assert_eq!(Value::U64(3).as_number(), Some(Number::UInt(3)));
        assert_eq!(Value::str("1").as_number(), None);
        assert_eq!(Value::F64(1.0).as_i64(), None);
        assert_eq!(Value::Opaque(16).as_i64(), Some(16));
    }

    #[test]
    fn operand_encoding_is_tagged() {
        let operand = Operand::Pair {
            source: Source::Immediate(Value::I64(5)),
            destination: Register::Rcx,
        };
        let bytes = operand.to_bytes();
        // Pair tag, Immediate tag, I64 tag, payload, destination id.
        assert_eq!(bytes[0], 3);
        assert_eq!(bytes[1], 1);
        assert_eq!(bytes[2], 1);
        assert_eq!(&bytes[3..11], &5i64.to_le_bytes());
        assert_eq!(bytes[11], Register::Rcx as u8);
        assert_eq!(Operand::from_bytes(&bytes).unwrap(), operand);
    }

    #[test]
    fn operand_display() {
        let pair = Operand::Pair {
            source: Source::Register(Register::Rax),
            destination: Register::Rbx,
        };
        assert_eq!(pair.to_string(), "rax, rbx");
        assert_eq!(Operand::Value(Value::str("hi")).to_string(), "\"hi\"");
        assert_eq!(Operand::Target(3).to_string(), "@3");
    }
}
