use crate::types::encoding::DecodeError;
use provrb_derive::Error;

/// Error classes visible to the host process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed source: unknown opcode, bad operand count, bad label, bad literal.
    Syntax,
    /// An operand of the wrong type for its opcode.
    Type,
    /// A machine invariant was violated while loading or executing a program.
    Runtime,
}

impl ErrorKind {
    /// Process exit status used when an error of this class ends a run.
    pub const fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Runtime => 1,
            ErrorKind::Syntax => 2,
            ErrorKind::Type => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Type => "type error",
            ErrorKind::Runtime => "runtime error",
        }
    }
}

/// Errors that can occur during assembly, image loading or execution.
#[derive(Debug, Error)]
#[kind(ErrorKind)]
pub enum VMError {
    /// Malformed token stream at a source position.
    #[error("{message}")]
    #[kind(Syntax)]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    /// Operand type does not satisfy the opcode at a source position.
    #[error("{message}")]
    #[kind(Type)]
    Type {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("no entry point: label 'start' is not defined")]
    #[kind(Runtime)]
    NoEntryPoint,
    #[error("stack overflow: capacity of {capacity} values exceeded")]
    #[kind(Runtime)]
    StackOverflow { capacity: usize },
    #[error("stack underflow: {instruction} needs {needed} value(s), stack holds {available}")]
    #[kind(Runtime)]
    StackUnderflow {
        instruction: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("division by zero in {instruction}")]
    #[kind(Runtime)]
    DivisionByZero { instruction: &'static str },
    #[error("{instruction} expected {expected} but found {actual}")]
    #[kind(Runtime)]
    TypeMismatch {
        instruction: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("jump target {target} is outside the program ({len} instructions)")]
    #[kind(Runtime)]
    JumpOutOfBounds { target: usize, len: usize },
    #[error("ret without a pending return address")]
    #[kind(Runtime)]
    ReturnWithoutCall,
    #[error("invalid file descriptor {0}")]
    #[kind(Runtime)]
    InvalidFileDescriptor(i64),
    #[error("invalid pin {0}")]
    #[kind(Runtime)]
    InvalidPin(i64),
    #[error("invalid state {0} for pin (expected 0 or 1)")]
    #[kind(Runtime)]
    InvalidPinState(i64),
    #[error("invalid analog value {0} (expected 0..=255)")]
    #[kind(Runtime)]
    InvalidAnalogValue(i64),
    #[error("{0} is not implemented on this target")]
    #[kind(Runtime)]
    NotImplemented(&'static str),
    #[error("invalid opcode byte 0x{0:02x}")]
    #[kind(Runtime)]
    InvalidOpcode(u8),
    #[error("invalid program image: {reason}")]
    #[kind(Runtime)]
    Decode { reason: String },
    #[error("{path}: {source}")]
    #[kind(Runtime)]
    Io { path: String, source: String },
}

impl VMError {
    pub(crate) fn syntax(line: usize, column: usize, message: impl Into<String>) -> VMError {
        VMError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn type_error(line: usize, column: usize, message: impl Into<String>) -> VMError {
        VMError::Type {
            line,
            column,
            message: message.into(),
        }
    }

    /// Returns the 1-based `(line, column)` for errors raised while assembling.
    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            VMError::Syntax { line, column, .. } | VMError::Type { line, column, .. } => {
                Some((*line, *column))
            }
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

impl From<DecodeError> for VMError {
    fn from(err: DecodeError) -> Self {
        VMError::Decode {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_distinct_exit_codes() {
        assert_eq!(VMError::syntax(1, 1, "x").exit_code(), 2);
        assert_eq!(VMError::type_error(1, 1, "x").exit_code(), 3);
        assert_eq!(VMError::NoEntryPoint.exit_code(), 1);
        assert_eq!(VMError::ReturnWithoutCall.kind(), ErrorKind::Runtime);
    }

    #[test]
    fn display_interpolates_fields() {
        let err = VMError::StackUnderflow {
            instruction: "swap",
            needed: 2,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "stack underflow: swap needs 2 value(s), stack holds 1"
        );
        assert_eq!(
            VMError::InvalidOpcode(0xAB).to_string(),
            "invalid opcode byte 0xab"
        );
    }

    #[test]
    fn location_only_for_assembly_errors() {
        assert_eq!(VMError::syntax(4, 7, "bad").location(), Some((4, 7)));
        assert_eq!(VMError::DivisionByZero { instruction: "div" }.location(), None);
    }

    #[test]
    fn decode_errors_convert() {
        let err: VMError = DecodeError::UnexpectedEof.into();
        assert!(matches!(err, VMError::Decode { ref reason } if reason.contains("end of input")));
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }
}
