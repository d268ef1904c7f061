use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::operand::{Register, Value};
use std::fmt::Write;

/// Register file indexed by [`Register`].
///
/// Every register starts [`Value::Empty`], which arithmetic reads as zero.
pub(super) struct Registers {
    values: [Value; Register::COUNT],
}

impl Registers {
    pub(super) fn new() -> Self {
        Self {
            values: Default::default(),
        }
    }

    pub(super) fn get(&self, reg: Register) -> &Value {
        &self.values[reg.index()]
    }

    pub(super) fn set(&mut self, reg: Register, value: Value) {
        self.values[reg.index()] = value;
    }

    /// One `name : value (type)` line per register.
    pub(super) fn dump(&self) -> String {
        let mut out = String::new();
        for reg in Register::ALL {
            let _ = match self.get(reg) {
                Value::Empty => writeln!(out, "{:<3} : empty", reg.name()),
                value => writeln!(out, "{:<3} : {} ({})", reg.name(), value, value.type_name()),
            };
        }
        out
    }
}

/// Condition flags written by `cmp`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    pub zero: bool,
    pub sign: bool,
    pub overflow: bool,
}

impl Flags {
    /// Flags for the wrapping integer difference `dest - src`.
    pub(super) fn from_int_difference(dest: i64, src: i64) -> Self {
        let (result, overflow) = dest.overflowing_sub(src);
        Self {
            zero: result == 0,
            sign: result < 0,
            overflow,
        }
    }

    pub(super) fn from_float_comparison(dest: f64, src: f64) -> Self {
        Self {
            zero: dest == src,
            sign: dest < src,
            overflow: false,
        }
    }

    /// Whether the conditional jump `opcode` is taken. Non-conditional opcodes never are.
    pub(super) fn satisfies(self, opcode: Opcode) -> bool {
        let Flags {
            zero,
            sign,
            overflow,
        } = self;
        match opcode {
            Opcode::Je => zero,
            Opcode::Jne => !zero,
            Opcode::Jg => !zero && sign == overflow,
            Opcode::Jge => zero || sign == overflow,
            Opcode::Jl => sign != overflow,
            Opcode::Jle => zero || sign != overflow,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_start_empty() {
        let regs = Registers::new();
        for reg in Register::ALL {
            assert_eq!(regs.get(reg), &Value::Empty);
        }
    }

    #[test]
    fn dump_lists_every_register() {
        let mut regs = Registers::new();
        regs.set(Register::Rax, Value::I64(5));
        let dump = regs.dump();
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), Register::COUNT);
        assert_eq!(lines[0], "rax : 5 (i64)");
        assert_eq!(lines[6], "r8  : empty");
    }

    #[test]
    fn flags_from_difference() {
        assert_eq!(
            Flags::from_int_difference(3, 3),
            Flags {
                zero: true,
                sign: false,
                overflow: false
            }
        );
        assert!(Flags::from_int_difference(1, 2).sign);
        assert!(Flags::from_int_difference(i64::MIN, 1).overflow);
        assert!(Flags::from_float_comparison(1.0, 2.0).sign);
    }

    #[test]
    fn conditions_follow_signed_ordering() {
        let less = Flags::from_int_difference(1, 2);
        let equal = Flags::from_int_difference(2, 2);
        let greater = Flags::from_int_difference(3, 2);
        assert!(less.satisfies(Opcode::Jl) && less.satisfies(Opcode::Jle));
        assert!(!less.satisfies(Opcode::Jg) && !less.satisfies(Opcode::Jge));
        assert!(equal.satisfies(Opcode::Je) && equal.satisfies(Opcode::Jge));
        assert!(!equal.satisfies(Opcode::Jne));
        assert!(greater.satisfies(Opcode::Jg) && greater.satisfies(Opcode::Jne));
        // Overflowed difference still orders correctly.
        assert!(Flags::from_int_difference(i64::MIN, 1).satisfies(Opcode::Jl));
        assert!(!greater.satisfies(Opcode::Jmp));
    }
}
