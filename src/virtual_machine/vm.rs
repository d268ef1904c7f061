//! Stack/register machine executing an assembled [`Program`].
//!
//! The machine borrows its program, so several machines can run the same
//! program at once. Values live on a bounded operand stack and in a fixed
//! register file; `cmp` writes the [`Flags`] read by conditional jumps.
//!
//! # Control flow
//!
//! `call` stores the return pointer and `ret` resumes after it. `jmp` also
//! stores it and arms an auto-return: once execution falls through the last
//! instruction of the target's label region, it resumes after the `jmp`.
//! Only one return pointer is kept, so nested calls overwrite it.

mod io;
mod memory;
mod registers;
mod stack;
mod syscall;

pub use io::{
    BufferConsole, Console, HardwareIo, NoHardware, PIN_COUNT, PWM_PINS, SimulatedPins,
    StdConsole, Stream, decode_escapes, fd,
};
pub use memory::{BASE_ADDRESS, PAGE_SIZE, protection};
pub use registers::Flags;
pub use syscall::{ARGUMENT_REGISTERS, Syscall};

use crate::debug;
use crate::virtual_machine::config::MachineConfig;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::operand::{Number, Operand, Register, Source, Value};
use crate::virtual_machine::program::{Instruction, Program};
use memory::MappedMemory;
use registers::Registers;
use stack::Stack;

/// How a run ended without error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The program counter ran past the last instruction.
    Halted,
    /// `exit` was executed with this code.
    Exit(i32),
}

impl ExitOutcome {
    /// Process status for this outcome.
    pub fn code(self) -> i32 {
        match self {
            ExitOutcome::Halted => 0,
            ExitOutcome::Exit(code) => code,
        }
    }
}

/// Where execution continues after an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Next,
    Jump(usize),
    Exit(i32),
}

#[derive(Clone, Copy, Debug)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Clone, Copy, Debug)]
enum BitOp {
    And,
    Or,
    Xor,
}

/// Host services borrowed for one run.
struct Devices<'a> {
    console: &'a mut dyn Console,
    hardware: &'a mut dyn HardwareIo,
}

macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        devices = $devices:ident,
        instruction = $instr:ident,
        { $( $variant:ident => $handler:ident $args:tt ),* $(,)? }
    ) => {{
        match $instr.opcode {
            $(
                Opcode::$variant => {
                    let instr_name = $instr.opcode.mnemonic();
                    exec_vm!(@call $vm, $devices, $instr, instr_name, $handler, $args)
                }
            ),*
        }
    }};

    // Handler with host devices (semicolon separator)
    (@call $vm:ident, $devices:ident, $instr:ident, $instr_name:expr, $handler:ident,
        (devices; $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        $( let $field = exec_vm!(@read $instr, $instr_name, $kind)?; )*
        $vm.$handler($instr_name, $devices, $( $field ),*)
    }};

    // Handler without devices
    (@call $vm:ident, $devices:ident, $instr:ident, $instr_name:expr, $handler:ident,
        ( $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        $( let $field = exec_vm!(@read $instr, $instr_name, $kind)?; )*
        $vm.$handler($instr_name, $( $field ),*)
    }};

    // Literal or register reference
    (@read $instr:ident, $name:expr, Value) => {{
        match &$instr.operand {
            Operand::Value(value) => Ok::<&Value, VMError>(value),
            other => Err(operand_mismatch($name, "value", other)),
        }
    }};

    // Optional destination register
    (@read $instr:ident, $name:expr, OptRegister) => {{
        match &$instr.operand {
            Operand::None => Ok::<Option<Register>, VMError>(None),
            Operand::Value(Value::Register(reg)) => Ok(Some(*reg)),
            other => Err(operand_mismatch($name, "register", other)),
        }
    }};

    // `source, destination`
    (@read $instr:ident, $name:expr, Pair) => {{
        match &$instr.operand {
            Operand::Pair { source, destination } => Ok::<(&Source, Register), VMError>((source, *destination)),
            other => Err(operand_mismatch($name, "register pair", other)),
        }
    }};

    // Pair in the register dialect, nothing in the stack dialect
    (@read $instr:ident, $name:expr, OptPair) => {{
        match &$instr.operand {
            Operand::None => Ok::<Option<(&Source, Register)>, VMError>(None),
            Operand::Pair { source, destination } => Ok(Some((source, *destination))),
            other => Err(operand_mismatch($name, "register pair", other)),
        }
    }};

    // Resolved label index
    (@read $instr:ident, $name:expr, Target) => {{
        match &$instr.operand {
            Operand::Target(target) => Ok::<usize, VMError>(*target),
            other => Err(operand_mismatch($name, "label target", other)),
        }
    }};

    // The dispatched opcode itself
    (@read $instr:ident, $name:expr, Opcode) => {{
        Ok::<Opcode, VMError>($instr.opcode)
    }};

    // Shift amount
    (@read $instr:ident, $name:expr, Shift) => {{
        match &$instr.operand {
            Operand::Value(Value::I64(amount)) if (0..64).contains(amount) => Ok::<u32, VMError>(*amount as u32),
            other => Err(operand_mismatch($name, "shift amount", other)),
        }
    }};
}

fn operand_mismatch(instr: &'static str, expected: &'static str, actual: &Operand) -> VMError {
    VMError::TypeMismatch {
        instruction: instr,
        expected,
        actual: actual.kind_name(),
    }
}

fn numeric(instr: &'static str, value: &Value) -> Result<Number, VMError> {
    value.as_number().ok_or(VMError::TypeMismatch {
        instruction: instr,
        expected: "number",
        actual: value.type_name(),
    })
}

/// Integer view for bitwise operations. Bytes and `Empty` widen to i64.
fn integer(instr: &'static str, value: &Value) -> Result<Number, VMError> {
    match value.as_number() {
        Some(number @ (Number::Int(_) | Number::UInt(_))) => Ok(number),
        _ => Err(VMError::TypeMismatch {
            instruction: instr,
            expected: "integer",
            actual: value.type_name(),
        }),
    }
}

/// Computes `lhs op rhs`, promoting to float when either side is a float.
///
/// Division by zero is reported before any result is produced.
fn arithmetic(instr: &'static str, op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value, VMError> {
    let (a, b) = (numeric(instr, lhs)?, numeric(instr, rhs)?);
    if matches!(op, ArithOp::Div | ArithOp::Mod) && b.is_zero() {
        return Err(VMError::DivisionByZero { instruction: instr });
    }

    Ok(match (a, b) {
        (Number::Float(_), _) | (_, Number::Float(_)) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            Value::F64(match op {
                ArithOp::Add => x + y,
                ArithOp::Sub => x - y,
                ArithOp::Mul => x * y,
                ArithOp::Div => x / y,
                ArithOp::Mod => x % y,
            })
        }
        (Number::UInt(x), Number::UInt(y)) => Value::U64(match op {
            ArithOp::Add => x.wrapping_add(y),
            ArithOp::Sub => x.wrapping_sub(y),
            ArithOp::Mul => x.wrapping_mul(y),
            ArithOp::Div => x / y,
            ArithOp::Mod => x % y,
        }),
        _ => {
            let (x, y) = (a.as_i64(), b.as_i64());
            Value::I64(match op {
                ArithOp::Add => x.wrapping_add(y),
                ArithOp::Sub => x.wrapping_sub(y),
                ArithOp::Mul => x.wrapping_mul(y),
                ArithOp::Div => x.wrapping_div(y),
                ArithOp::Mod => x.wrapping_rem(y),
            })
        }
    })
}

/// Machine state for one program.
pub struct VM<'p> {
    program: &'p Program,
    config: MachineConfig,
    /// Index of the instruction being executed.
    pc: usize,
    stack: Stack,
    registers: Registers,
    flags: Flags,
    /// Index of the last `call` or `jmp`.
    return_pointer: Option<usize>,
    /// Last index of the region entered by `jmp`; reaching it triggers the auto-return.
    scope_end: Option<usize>,
    memory: MappedMemory,
    cycles: u64,
}

impl<'p> VM<'p> {
    pub fn new(program: &'p Program, config: MachineConfig) -> Self {
        Self {
            program,
            stack: Stack::new(config.stack_capacity),
            registers: Registers::new(),
            flags: Flags::default(),
            return_pointer: None,
            scope_end: None,
            memory: MappedMemory::new(config.memory_limit),
            pc: 0,
            cycles: 0,
            config,
        }
    }

    /// Values on the stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        self.stack.as_slice()
    }

    pub fn register(&self, reg: Register) -> &Value {
        self.registers.get(reg)
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Instructions dispatched so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn return_pointer(&self) -> Option<usize> {
        self.return_pointer
    }

    /// Bytes currently mapped through the alloc syscall.
    pub fn mapped_bytes(&self) -> u64 {
        self.memory.mapped_bytes()
    }

    pub fn register_dump(&self) -> String {
        self.registers.dump()
    }

    /// Runs from the entry point until the program halts, exits or fails.
    pub fn run<C: Console, H: HardwareIo>(
        &mut self,
        console: &mut C,
        hardware: &mut H,
    ) -> Result<ExitOutcome, VMError> {
        let program = self.program;
        let mut devices = Devices { console, hardware };

        self.pc = program.entry_point()?;
        debug!("entry point at instruction {}", self.pc);

        while let Some(instruction) = program.get(self.pc) {
            self.cycles += 1;
            match self.exec(instruction, &mut devices)? {
                Flow::Next => self.advance(),
                Flow::Jump(target) if target > program.len() => {
                    return Err(VMError::JumpOutOfBounds {
                        target,
                        len: program.len(),
                    });
                }
                Flow::Jump(target) => self.pc = target,
                Flow::Exit(code) => {
                    debug!("exit {code} after {} cycles", self.cycles);
                    return Ok(ExitOutcome::Exit(code));
                }
            }
        }

        debug!("halted after {} cycles", self.cycles);
        Ok(ExitOutcome::Halted)
    }

    /// Moves past a fall-through instruction, taking a pending auto-return.
    fn advance(&mut self) {
        match (self.scope_end, self.return_pointer) {
            (Some(end), Some(origin)) if end == self.pc => {
                self.pc = origin + 1;
                self.scope_end = None;
                self.return_pointer = None;
            }
            _ => self.pc += 1,
        }
    }

    fn exec(&mut self, instruction: &Instruction, devices: &mut Devices<'_>) -> Result<Flow, VMError> {
        exec_vm! {
            vm = self,
            devices = devices,
            instruction = instruction,
            {
                Nop => op_nop(),
                // Stack
                Push => op_push(value: Value),
                Pop => op_pop(destination: OptRegister),
                Swap => op_swap(),
                Dup => op_dup(),
                Clr => op_clear(),
                Size => op_size(),
                // Movement and comparison
                Mov => op_mov(pair: Pair),
                Cmp => op_cmp(pair: Pair),
                // Control flow
                Call => op_call(target: Target),
                Ret => op_ret(),
                Jmp => op_jmp(target: Target),
                Jne => op_jump_if(opcode: Opcode, target: Target),
                Je => op_jump_if(opcode: Opcode, target: Target),
                Jg => op_jump_if(opcode: Opcode, target: Target),
                Jge => op_jump_if(opcode: Opcode, target: Target),
                Jl => op_jump_if(opcode: Opcode, target: Target),
                Jle => op_jump_if(opcode: Opcode, target: Target),
                // Arithmetic
                Add => op_add(operands: OptPair),
                Sub => op_sub(operands: OptPair),
                Mul => op_mul(operands: OptPair),
                Div => op_div(operands: OptPair),
                Mod => op_mod(operands: OptPair),
                Neg => op_neg(),
                // Bitwise
                And => op_and(),
                Or => op_or(),
                Not => op_not(),
                Xor => op_xor(),
                Shl => op_shl(amount: Shift),
                Shr => op_shr(amount: Shift),
                // I/O and system
                Prnt => op_print(devices;),
                Write => op_write(devices;),
                Read => op_read(devices;),
                AnalogWrite => op_analog_write(devices;),
                Syscall => op_syscall(),
                Exit => op_exit(),
            }
        }
    }

    fn source_value(&self, source: &Source) -> Value {
        match source {
            Source::Register(reg) => self.registers.get(*reg).clone(),
            Source::Immediate(value) => value.clone(),
        }
    }

    fn op_nop(&mut self, _instr: &'static str) -> Result<Flow, VMError> {
        Ok(Flow::Next)
    }

    fn op_push(&mut self, _instr: &'static str, value: &Value) -> Result<Flow, VMError> {
        let value = match value {
            Value::Register(reg) => self.registers.get(*reg).clone(),
            literal => literal.clone(),
        };
        self.stack.push(value)?;
        Ok(Flow::Next)
    }

    fn op_pop(&mut self, instr: &'static str, destination: Option<Register>) -> Result<Flow, VMError> {
        let value = self.stack.pop(instr)?;
        if let Some(reg) = destination {
            let value = match value {
                Value::I64(_) | Value::U64(_) | Value::Byte(_) => {
                    Value::I64(value.as_i64().unwrap_or_default())
                }
                other => other,
            };
            self.registers.set(reg, value);
        }
        Ok(Flow::Next)
    }

    fn op_swap(&mut self, instr: &'static str) -> Result<Flow, VMError> {
        self.stack.swap_top(instr)?;
        Ok(Flow::Next)
    }

    fn op_dup(&mut self, instr: &'static str) -> Result<Flow, VMError> {
        let top = self.stack.peek(instr, 0)?.clone();
        self.stack.push(top)?;
        Ok(Flow::Next)
    }

    fn op_clear(&mut self, _instr: &'static str) -> Result<Flow, VMError> {
        self.stack.clear();
        Ok(Flow::Next)
    }

    fn op_size(&mut self, _instr: &'static str) -> Result<Flow, VMError> {
        self.stack.push(Value::I64(self.stack.len() as i64))?;
        Ok(Flow::Next)
    }

    fn op_mov(&mut self, _instr: &'static str, (source, destination): (&Source, Register)) -> Result<Flow, VMError> {
        let value = self.source_value(source);
        self.registers.set(destination, value);
        Ok(Flow::Next)
    }

    fn op_cmp(&mut self, instr: &'static str, (source, destination): (&Source, Register)) -> Result<Flow, VMError> {
        let src = numeric(instr, &self.source_value(source))?;
        let dest = numeric(instr, self.registers.get(destination))?;
        self.flags = match (dest, src) {
            (Number::Float(_), _) | (_, Number::Float(_)) => {
                Flags::from_float_comparison(dest.as_f64(), src.as_f64())
            }
            _ => Flags::from_int_difference(dest.as_i64(), src.as_i64()),
        };
        Ok(Flow::Next)
    }

    fn op_call(&mut self, _instr: &'static str, target: usize) -> Result<Flow, VMError> {
        self.return_pointer = Some(self.pc);
        self.scope_end = None;
        Ok(Flow::Jump(target))
    }

    fn op_ret(&mut self, _instr: &'static str) -> Result<Flow, VMError> {
        let origin = self.return_pointer.take().ok_or(VMError::ReturnWithoutCall)?;
        self.scope_end = None;
        Ok(Flow::Jump(origin + 1))
    }

    fn op_jmp(&mut self, _instr: &'static str, target: usize) -> Result<Flow, VMError> {
        self.return_pointer = Some(self.pc);
        self.scope_end = Some(self.program.region_end(target));
        Ok(Flow::Jump(target))
    }

    fn op_jump_if(&mut self, _instr: &'static str, opcode: Opcode, target: usize) -> Result<Flow, VMError> {
        if self.flags.satisfies(opcode) {
            Ok(Flow::Jump(target))
        } else {
            Ok(Flow::Next)
        }
    }

    /// Register form updates `dest`; stack form replaces the top two values.
    fn arithmetic(
        &mut self,
        instr: &'static str,
        op: ArithOp,
        operands: Option<(&Source, Register)>,
    ) -> Result<Flow, VMError> {
        match operands {
            Some((source, destination)) => {
                let rhs = self.source_value(source);
                let result = arithmetic(instr, op, self.registers.get(destination), &rhs)?;
                self.registers.set(destination, result);
            }
            None => {
                let rhs = self.stack.peek(instr, 0)?;
                let lhs = self.stack.peek(instr, 1)?;
                let result = arithmetic(instr, op, lhs, rhs)?;
                self.stack.pop(instr)?;
                self.stack.replace_top(instr, result)?;
            }
        }
        Ok(Flow::Next)
    }

    fn op_add(&mut self, instr: &'static str, operands: Option<(&Source, Register)>) -> Result<Flow, VMError> {
        self.arithmetic(instr, ArithOp::Add, operands)
    }

    fn op_sub(&mut self, instr: &'static str, operands: Option<(&Source, Register)>) -> Result<Flow, VMError> {
        self.arithmetic(instr, ArithOp::Sub, operands)
    }

    fn op_mul(&mut self, instr: &'static str, operands: Option<(&Source, Register)>) -> Result<Flow, VMError> {
        self.arithmetic(instr, ArithOp::Mul, operands)
    }

    fn op_div(&mut self, instr: &'static str, operands: Option<(&Source, Register)>) -> Result<Flow, VMError> {
        self.arithmetic(instr, ArithOp::Div, operands)
    }

    fn op_mod(&mut self, instr: &'static str, operands: Option<(&Source, Register)>) -> Result<Flow, VMError> {
        self.arithmetic(instr, ArithOp::Mod, operands)
    }

    fn op_neg(&mut self, instr: &'static str) -> Result<Flow, VMError> {
        let negated = match numeric(instr, self.stack.peek(instr, 0)?)? {
            Number::Float(v) => Value::F64(-v),
            number => Value::I64(number.as_i64().wrapping_neg()),
        };
        self.stack.replace_top(instr, negated)?;
        Ok(Flow::Next)
    }

    fn bitwise(&mut self, instr: &'static str, op: BitOp) -> Result<Flow, VMError> {
        let b = integer(instr, self.stack.peek(instr, 0)?)?;
        let a = integer(instr, self.stack.peek(instr, 1)?)?;
        let apply = |x: u64, y: u64| match op {
            BitOp::And => x & y,
            BitOp::Or => x | y,
            BitOp::Xor => x ^ y,
        };
        let result = match (a, b) {
            (Number::UInt(x), Number::UInt(y)) => Value::U64(apply(x, y)),
            _ => Value::I64(apply(a.as_i64() as u64, b.as_i64() as u64) as i64),
        };
        self.stack.pop(instr)?;
        self.stack.replace_top(instr, result)?;
        Ok(Flow::Next)
    }

    fn op_and(&mut self, instr: &'static str) -> Result<Flow, VMError> {
        self.bitwise(instr, BitOp::And)
    }

    fn op_or(&mut self, instr: &'static str) -> Result<Flow, VMError> {
        self.bitwise(instr, BitOp::Or)
    }

    fn op_xor(&mut self, instr: &'static str) -> Result<Flow, VMError> {
        self.bitwise(instr, BitOp::Xor)
    }

    fn op_not(&mut self, instr: &'static str) -> Result<Flow, VMError> {
        let result = match integer(instr, self.stack.peek(instr, 0)?)? {
            Number::UInt(v) => Value::U64(!v),
            number => Value::I64(!number.as_i64()),
        };
        self.stack.replace_top(instr, result)?;
        Ok(Flow::Next)
    }

    fn op_shl(&mut self, instr: &'static str, amount: u32) -> Result<Flow, VMError> {
        let result = match integer(instr, self.stack.peek(instr, 0)?)? {
            Number::UInt(v) => Value::U64(v << amount),
            number => Value::I64(number.as_i64() << amount),
        };
        self.stack.replace_top(instr, result)?;
        Ok(Flow::Next)
    }

    /// Arithmetic shift for signed values, logical for unsigned.
    fn op_shr(&mut self, instr: &'static str, amount: u32) -> Result<Flow, VMError> {
        let result = match integer(instr, self.stack.peek(instr, 0)?)? {
            Number::UInt(v) => Value::U64(v >> amount),
            number => Value::I64(number.as_i64() >> amount),
        };
        self.stack.replace_top(instr, result)?;
        Ok(Flow::Next)
    }

    fn console_write(devices: &mut Devices<'_>, stream: Stream, bytes: &[u8]) -> Result<(), VMError> {
        devices
            .console
            .write(stream, bytes)
            .map_err(|e| VMError::Io {
                path: stream.name().to_string(),
                source: e.to_string(),
            })
    }

    fn op_print(&mut self, _instr: &'static str, devices: &mut Devices<'_>) -> Result<Flow, VMError> {
        let mut out = String::from("--- Stack Start ---\n");
        for value in self.stack.as_slice().iter().rev() {
            out.push_str(&value.to_string());
            out.push('\n');
        }
        out.push_str("--- Stack End   ---\n");
        Self::console_write(devices, Stream::Stdout, out.as_bytes())?;
        Ok(Flow::Next)
    }

    /// Integer popped as a descriptor, pin or state.
    fn peek_int(&self, instr: &'static str, depth: usize) -> Result<i64, VMError> {
        let value = self.stack.peek(instr, depth)?;
        match value.as_number() {
            Some(Number::Int(v)) => Ok(v),
            Some(Number::UInt(v)) => Ok(v as i64),
            _ => Err(VMError::TypeMismatch {
                instruction: instr,
                expected: "integer",
                actual: value.type_name(),
            }),
        }
    }

    fn op_write(&mut self, instr: &'static str, devices: &mut Devices<'_>) -> Result<Flow, VMError> {
        match self.peek_int(instr, 0)? {
            descriptor @ (fd::STDOUT | fd::STDERR) => {
                let stream = if descriptor == fd::STDOUT {
                    Stream::Stdout
                } else {
                    Stream::Stderr
                };
                let bytes = match self.stack.peek(instr, 1)? {
                    Value::Str(raw) => decode_escapes(raw),
                    other => other.to_string().into_bytes(),
                };
                Self::console_write(devices, stream, &bytes)?;
                self.stack.pop(instr)?;
                self.stack.pop(instr)?;
            }
            fd::PIN => {
                let pin = self.peek_int(instr, 1)?;
                let high = match self.peek_int(instr, 2)? {
                    0 => false,
                    1 => true,
                    state => return Err(VMError::InvalidPinState(state)),
                };
                devices.hardware.digital_write(pin, high)?;
                for _ in 0..3 {
                    self.stack.pop(instr)?;
                }
            }
            other => return Err(VMError::InvalidFileDescriptor(other)),
        }
        Ok(Flow::Next)
    }

    fn op_read(&mut self, instr: &'static str, devices: &mut Devices<'_>) -> Result<Flow, VMError> {
        match self.peek_int(instr, 0)? {
            fd::STDIN => {
                let line = devices.console.read_line().map_err(|e| VMError::Io {
                    path: "<stdin>".to_string(),
                    source: e.to_string(),
                })?;
                let mut bytes = line.unwrap_or_default().into_bytes();
                while matches!(bytes.last(), Some(b'\n' | b'\r')) {
                    bytes.pop();
                }
                bytes.truncate(self.config.max_input_len);
                self.stack.replace_top(instr, Value::Str(bytes.into()))?;
            }
            fd::PIN => {
                let pin = self.peek_int(instr, 1)?;
                let high = devices.hardware.digital_read(pin)?;
                self.stack.pop(instr)?;
                self.stack.replace_top(instr, Value::Byte(high as u8))?;
            }
            other => return Err(VMError::InvalidFileDescriptor(other)),
        }
        Ok(Flow::Next)
    }

    fn op_analog_write(&mut self, instr: &'static str, devices: &mut Devices<'_>) -> Result<Flow, VMError> {
        let pin = self.peek_int(instr, 0)?;
        let raw = self.peek_int(instr, 1)?;
        let value = u8::try_from(raw).map_err(|_| VMError::InvalidAnalogValue(raw))?;
        devices.hardware.analog_write(pin, value)?;
        self.stack.pop(instr)?;
        self.stack.pop(instr)?;
        Ok(Flow::Next)
    }

    fn op_exit(&mut self, instr: &'static str) -> Result<Flow, VMError> {
        let code = numeric(instr, self.registers.get(Register::Rax))?.as_i64();
        Ok(Flow::Exit(code as i32))
    }
}
