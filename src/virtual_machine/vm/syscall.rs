use super::{Flow, VM};
use crate::debug;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::{Number, Register, Value};
use std::thread;

/// Registers carrying syscall arguments, in order.
pub const ARGUMENT_REGISTERS: [Register; 6] = [
    Register::Rdi,
    Register::Rsi,
    Register::Rdx,
    Register::R10,
    Register::R8,
    Register::R9,
];

/// Result written to `rax` for unsupported or failed calls.
const FAILURE: i64 = -1;

/// Services reachable through `syscall`, numbered by the value in `rax`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i64)]
pub enum Syscall {
    Exec = 1,
    Alloc = 2,
    Free = 3,
    Realloc = 4,
    Protect = 5,
    Env = 6,
    Sleep = 7,
    Cycles = 8,
}

impl Syscall {
    pub fn from_number(number: i64) -> Option<Syscall> {
        Some(match number {
            1 => Syscall::Exec,
            2 => Syscall::Alloc,
            3 => Syscall::Free,
            4 => Syscall::Realloc,
            5 => Syscall::Protect,
            6 => Syscall::Env,
            7 => Syscall::Sleep,
            8 => Syscall::Cycles,
            _ => return None,
        })
    }
}

impl VM<'_> {
    /// Integer view of argument `index`; non-integers read as 0.
    fn argument(&self, index: usize) -> i64 {
        self.registers
            .get(ARGUMENT_REGISTERS[index])
            .as_i64()
            .unwrap_or(0)
    }

    pub(super) fn op_syscall(&mut self, _instr: &'static str) -> Result<Flow, VMError> {
        let number = match self.registers.get(Register::Rax).as_number() {
            Some(Number::Int(v)) => Some(v),
            Some(Number::UInt(v)) => i64::try_from(v).ok(),
            _ => None,
        };
        let call = number.and_then(Syscall::from_number);
        debug!("syscall {:?} ({:?}) at instruction {}", call, number, self.pc);

        let result = match call {
            Some(Syscall::Alloc) => {
                let (hint, length, protection) = (self.argument(0), self.argument(1), self.argument(2));
                u64::try_from(length)
                    .ok()
                    .and_then(|length| self.memory.map(hint.max(0) as u64, length, protection))
                    .map_or(Value::I64(FAILURE), Value::Opaque)
            }
            Some(Syscall::Free) => {
                let (address, length) = (self.argument(0), self.argument(1));
                let freed = u64::try_from(length)
                    .is_ok_and(|length| self.memory.unmap(address as u64, length));
                Value::I64(freed as i64)
            }
            Some(Syscall::Protect) => {
                let (address, length, protection) =
                    (self.argument(0), self.argument(1), self.argument(2));
                let old = u64::try_from(length)
                    .ok()
                    .and_then(|length| self.memory.protect(address as u64, length, protection));
                match old {
                    Some(old) => {
                        self.registers.set(Register::R10, Value::I64(old));
                        Value::I64(1)
                    }
                    None => Value::I64(0),
                }
            }
            Some(Syscall::Sleep) => {
                let units = u32::try_from(self.argument(0).max(0)).unwrap_or(u32::MAX);
                thread::sleep(self.config.sleep_unit.saturating_mul(units));
                Value::I64(0)
            }
            Some(Syscall::Cycles) => Value::U64(self.cycles),
            Some(Syscall::Exec | Syscall::Realloc | Syscall::Env) | None => Value::I64(FAILURE),
        };

        self.registers.set(Register::Rax, result);
        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syscall_numbers() {
        for call in [
            Syscall::Exec,
            Syscall::Alloc,
            Syscall::Free,
            Syscall::Realloc,
            Syscall::Protect,
            Syscall::Env,
            Syscall::Sleep,
            Syscall::Cycles,
        ] {
            assert_eq!(Syscall::from_number(call as i64), Some(call));
        }
        assert_eq!(Syscall::from_number(0), None);
        assert_eq!(Syscall::from_number(9), None);
    }
}
