//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical opcode table and invokes a callback macro for code generation, so
//! the assembler, the image decoder and the VM all agree on one definition.
//!
//! This module generates:
//! - The [`Opcode`] enum with its image byte
//! - `TryFrom<u8>` for decoding images
//! - Mnemonic lookup, operand shape, category and capability queries
//!
//! # Table format
//!
//! `Name = byte, "mnemonic" => Shape, Category, Capability`
//!
//! - `Shape`: what the assembler parses after the mnemonic (see [`OperandShape`])
//! - `Category`: grouping used by the VM and listings (see [`Category`])
//! - `Capability`: `core` everywhere, `hardware` only with the embedded profile

use crate::virtual_machine::config::Dialect;
use crate::virtual_machine::errors::VMError;

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Diagnostics
            // =========================
            /// NOP ; does nothing
            Nop = 0x00, "nop" => None, Diagnostic, core,
            // =========================
            // Stack
            // =========================
            /// PUSH value|reg ; push a literal or a register's value
            Push = 0x01, "push" => StackValue, Stack, core,
            /// POP [reg] ; pop, optionally storing into reg
            Pop = 0x02, "pop" => OptionalRegister, Stack, core,
            // =========================
            // Movement
            // =========================
            /// MOV src, dest ; dest = src
            Mov = 0x03, "mov" => Pair, Movement, core,
            /// SWAP ; exchange the two top values
            Swap = 0x04, "swap" => None, Stack, core,
            // =========================
            // Control flow
            // =========================
            /// CALL label ; rp = pc, jump
            Call = 0x05, "call" => Label, Control, core,
            /// RET ; pc = rp + 1
            Ret = 0x06, "ret" => None, Control, core,
            /// CMP src, dest ; flags from dest - src
            Cmp = 0x07, "cmp" => Pair, Comparison, core,
            /// JMP label ; rp = pc, jump, return at the end of the label's region
            Jmp = 0x08, "jmp" => Label, Control, core,
            /// JNE label ; jump if !ZF
            Jne = 0x09, "jne" => Label, Control, core,
            /// JE label ; jump if ZF
            Je = 0x0A, "je" => Label, Control, core,
            /// JG label ; jump if !ZF && SF == OF
            Jg = 0x0B, "jg" => Label, Control, core,
            /// JGE label ; jump if ZF || SF == OF
            Jge = 0x0C, "jge" => Label, Control, core,
            /// JL label ; jump if SF != OF
            Jl = 0x0D, "jl" => Label, Control, core,
            /// JLE label ; jump if ZF || SF != OF
            Jle = 0x0E, "jle" => Label, Control, core,
            // =========================
            // Arithmetic
            // =========================
            /// ADD src, dest ; dest = dest + src
            Add = 0x0F, "add" => Pair, Arithmetic, core,
            /// SUB src, dest ; dest = dest - src
            Sub = 0x10, "sub" => Pair, Arithmetic, core,
            /// MUL src, dest ; dest = dest * src
            Mul = 0x11, "mul" => Pair, Arithmetic, core,
            /// DIV src, dest ; dest = dest / src (fails on zero)
            Div = 0x12, "div" => Pair, Arithmetic, core,
            /// MOD src, dest ; dest = dest % src (fails on zero)
            Mod = 0x13, "mod" => Pair, Arithmetic, core,
            /// NEG ; push(-pop)
            Neg = 0x14, "neg" => None, Arithmetic, core,
            // =========================
            // Bitwise
            // =========================
            /// AND ; push(pop & pop)
            And = 0x15, "AND" => None, Bitwise, core,
            /// OR ; push(pop | pop)
            Or = 0x16, "OR" => None, Bitwise, core,
            /// NOT ; push(!pop)
            Not = 0x17, "NOT" => None, Bitwise, core,
            /// XOR ; push(pop ^ pop)
            Xor = 0x18, "XOR" => None, Bitwise, core,
            /// SHL n ; push(pop << n)
            Shl = 0x19, "shl" => ShiftAmount, Bitwise, core,
            /// SHR n ; push(pop >> n)
            Shr = 0x1A, "shr" => ShiftAmount, Bitwise, core,
            // =========================
            // Stack
            // =========================
            /// DUP ; push a copy of the top value
            Dup = 0x1B, "dup" => None, Stack, core,
            /// CLEAR ; drop every value
            Clr = 0x1C, "clear" => None, Stack, core,
            /// SIZE ; push the current depth
            Size = 0x1D, "size" => None, Stack, core,
            /// PRINT ; dump the stack to stdout, top first
            Prnt = 0x1E, "print" => None, Diagnostic, core,
            // =========================
            // I/O
            // =========================
            /// WRITE ; fd = pop; stdout/stderr: write pop; pin: pin = pop, state = pop
            Write = 0x1F, "write" => None, Io, core,
            /// READ ; fd = pop; stdin: push line; pin: push sample of pop
            Read = 0x20, "read" => None, Io, core,
            /// AWRITE ; pin = pop, value = pop, analog output
            AnalogWrite = 0x21, "awrite" => None, Io, hardware,
            // =========================
            // System
            // =========================
            /// SYSCALL ; service number in rax
            Syscall = 0x22, "syscall" => None, System, core,
            /// EXIT ; stop with exit code rax
            Exit = 0x23, "exit" => None, System, core,
        }
    };
}

/// Operand syntax accepted after a mnemonic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandShape {
    None,
    /// Integer, float, quoted string or register name.
    StackValue,
    /// Nothing, or a destination register.
    OptionalRegister,
    /// `source, destination` where source is a register or `$` constant.
    Pair,
    /// Plain decimal shift amount.
    ShiftAmount,
    /// Label reference.
    Label,
}

impl OperandShape {
    /// Maximum number of operands.
    pub const fn arity(self) -> usize {
        match self {
            OperandShape::None => 0,
            OperandShape::StackValue
            | OperandShape::OptionalRegister
            | OperandShape::ShiftAmount
            | OperandShape::Label => 1,
            OperandShape::Pair => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Stack,
    Arithmetic,
    Bitwise,
    Movement,
    Comparison,
    Control,
    Io,
    System,
    Diagnostic,
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => $shape:ident, $category:ident, $cap:ident
        ),* $(,)?
    ) => {
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Opcode {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Opcode::$name), )*
                    _ => Err(VMError::InvalidOpcode(value)),
                }
            }
        }

        impl Opcode {
            /// Every opcode in table order.
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            /// Returns the canonical assembly mnemonic.
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns the operand syntax in the register dialect.
            pub const fn shape(self) -> OperandShape {
                match self {
                    $( Opcode::$name => OperandShape::$shape, )*
                }
            }

            pub const fn category(self) -> Category {
                match self {
                    $( Opcode::$name => Category::$category, )*
                }
            }

            /// Whether the opcode needs the embedded hardware capability.
            pub const fn requires_hardware(self) -> bool {
                match self {
                    $( Opcode::$name => define_instructions!(@hardware $cap), )*
                }
            }
        }
    };

    (@hardware core) => { false };
    (@hardware hardware) => { true };
}

for_each_instruction!(define_instructions);

impl Opcode {
    /// Looks up a mnemonic, ignoring ASCII case.
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }

    /// Returns the operand syntax under `dialect`.
    pub const fn shape_in(self, dialect: Dialect) -> OperandShape {
        match (dialect, self.shape()) {
            (Dialect::Stack, OperandShape::Pair) if matches!(self.category(), Category::Arithmetic) => {
                OperandShape::None
            }
            (_, shape) => shape,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
