use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::operand::Value;

/// Bounded operand stack.
///
/// Handlers check depth with [`Stack::require`] or [`Stack::peek`] before
/// popping so a failing instruction leaves the stack as it found it.
pub(super) struct Stack {
    values: Vec<Value>,
    capacity: usize,
}

impl Stack {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            values: Vec::new(),
            capacity,
        }
    }

    pub(super) fn len(&self) -> usize {
        self.values.len()
    }

    /// Values from bottom to top.
    pub(super) fn as_slice(&self) -> &[Value] {
        &self.values
    }

    pub(super) fn push(&mut self, value: Value) -> Result<(), VMError> {
        if self.values.len() >= self.capacity {
            return Err(VMError::StackOverflow {
                capacity: self.capacity,
            });
        }
        self.values.push(value);
        Ok(())
    }

    pub(super) fn require(&self, instr: &'static str, needed: usize) -> Result<(), VMError> {
        if self.values.len() < needed {
            return Err(VMError::StackUnderflow {
                instruction: instr,
                needed,
                available: self.values.len(),
            });
        }
        Ok(())
    }

    pub(super) fn pop(&mut self, instr: &'static str) -> Result<Value, VMError> {
        self.values.pop().ok_or(VMError::StackUnderflow {
            instruction: instr,
            needed: 1,
            available: 0,
        })
    }

    /// Returns the value `depth` slots below the top.
    pub(super) fn peek(&self, instr: &'static str, depth: usize) -> Result<&Value, VMError> {
        self.require(instr, depth + 1)?;
        let index = self.values.len() - 1 - depth;
        self.values.get(index).ok_or(VMError::StackUnderflow {
            instruction: instr,
            needed: depth + 1,
            available: self.values.len(),
        })
    }

    pub(super) fn replace_top(&mut self, instr: &'static str, value: Value) -> Result<(), VMError> {
        let available = self.values.len();
        let top = self.values.last_mut().ok_or(VMError::StackUnderflow {
            instruction: instr,
            needed: 1,
            available,
        })?;
        *top = value;
        Ok(())
    }

    pub(super) fn swap_top(&mut self, instr: &'static str) -> Result<(), VMError> {
        self.require(instr, 2)?;
        let len = self.values.len();
        self.values.swap(len - 1, len - 2);
        Ok(())
    }

    pub(super) fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_respects_capacity() {
        let mut stack = Stack::new(2);
        stack.push(Value::I64(1)).unwrap();
        stack.push(Value::I64(2)).unwrap();
        assert!(matches!(
            stack.push(Value::I64(3)),
            Err(VMError::StackOverflow { capacity: 2 })
        ));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn pop_is_lifo() {
        let mut stack = Stack::new(4);
        stack.push(Value::I64(1)).unwrap();
        stack.push(Value::I64(2)).unwrap();
        assert_eq!(stack.pop("pop").unwrap(), Value::I64(2));
        assert_eq!(stack.pop("pop").unwrap(), Value::I64(1));
        assert!(matches!(
            stack.pop("pop"),
            Err(VMError::StackUnderflow {
                instruction: "pop",
                needed: 1,
                available: 0
            })
        ));
    }

    #[test]
    fn peek_counts_from_top() {
        let mut stack = Stack::new(4);
        stack.push(Value::I64(1)).unwrap();
        stack.push(Value::I64(2)).unwrap();
        assert_eq!(stack.peek("x", 0).unwrap(), &Value::I64(2));
        assert_eq!(stack.peek("x", 1).unwrap(), &Value::I64(1));
        assert!(matches!(
            stack.peek("x", 2),
            Err(VMError::StackUnderflow { needed: 3, .. })
        ));
    }

    #[test]
    fn swap_needs_two_values() {
        let mut stack = Stack::new(4);
        stack.push(Value::I64(1)).unwrap();
        assert!(stack.swap_top("swap").is_err());
        stack.push(Value::I64(2)).unwrap();
        stack.swap_top("swap").unwrap();
        assert_eq!(stack.as_slice(), &[Value::I64(2), Value::I64(1)]);
    }
}
