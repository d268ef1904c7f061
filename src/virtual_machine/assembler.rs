//! Assembly language scanner and program builder.
//!
//! Converts `.pvb` source into a [`Program`]. Mnemonics, operand shapes and
//! capabilities come from the [`for_each_instruction!`](crate::for_each_instruction)
//! table through [`Opcode`].
//!
//! # Syntax
//!
//! ```text
//! _start:                 ; label declaration
//!     mov $10, rcx        ; constant source, register destination
//!     push "hi\n"         ; escapes are kept raw until written
//!     jmp _loop           ; label reference, with or without '_'
//! ```
//!
//! - `;` starts a comment that runs to the end of the line
//! - `_name:` declares a label at the next instruction's index
//! - `,` separates the two operands of `mov`, `cmp` and register-form arithmetic
//! - `$` marks a numeric constant where a register could appear
//! - Mnemonics and register names are case-insensitive
//!
//! Labels are collected over the whole file before references are checked, so
//! jumps may point forward. [`LabelResolution::BackwardOnly`] restores the
//! older rule that a label must be declared before it is referenced.

use crate::virtual_machine::config::{AssemblerConfig, LabelResolution};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Opcode, OperandShape};
use crate::virtual_machine::operand::{Operand, Register, Source, Value};
use crate::virtual_machine::program::{Instruction, Label, Program, Token, io_error};
use crate::{debug, error};
use std::fmt::Write;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const COMMENT_CHAR: u8 = b';';
const SEPARATOR: u8 = b',';
const QUOTE: u8 = b'"';
const ESCAPE: u8 = b'\\';
const LABEL_PREFIX: u8 = b'_';
const LABEL_SUFFIX: u8 = b':';
const CONSTANT_PREFIX: u8 = b'$';

/// Formats a compiler-style diagnostic for an assembly failure.
pub fn render_diagnostic(file: &str, source: &str, err: &VMError) -> String {
    let Some((line, column)) = err.location() else {
        return format!("{}: {err}\n", err.kind().label());
    };

    let mut diag = String::new();
    let _ = writeln!(diag, "{}: {err}", err.kind().label());
    let _ = writeln!(diag, " --> {file}:{line}:{column}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let underline = " ".repeat(column.saturating_sub(1));
        let _ = writeln!(diag, "{:>4} |", "");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "{:>4} | {}^", "", underline);
    }

    diag
}

/// Numeric literal as written in source.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Literal {
    Int(i64),
    Float(f64),
}

impl Literal {
    fn value(self) -> Value {
        match self {
            Literal::Int(v) => Value::I64(v),
            Literal::Float(v) => Value::F64(v),
        }
    }
}

/// Parses a decimal literal with an optional sign and at most one `.`.
fn parse_literal(text: &str) -> Result<Literal, String> {
    let digits = text.strip_prefix(|c| c == '-' || c == '+').unwrap_or(text);
    if digits.is_empty() {
        return Err("expected a number".to_string());
    }

    let well_formed = digits.bytes().all(|c| c.is_ascii_digit() || c == b'.')
        && digits.bytes().filter(|&c| c == b'.').count() <= 1
        && digits.bytes().any(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(format!("malformed numeric literal '{text}'"));
    }

    if digits.contains('.') {
        text.parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| format!("malformed numeric literal '{text}'"))
    } else {
        text.parse::<i64>()
            .map(Literal::Int)
            .map_err(|_| format!("numeric literal '{text}' is out of range"))
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Lexeme {
    Str(Vec<u8>),
    Number(Literal),
    Constant(Literal),
    Name(String),
    LabelRef(String),
}

impl Lexeme {
    fn describe(&self) -> &'static str {
        match self {
            Lexeme::Str(_) => "string",
            Lexeme::Number(Literal::Int(_)) => "integer",
            Lexeme::Number(Literal::Float(_)) => "float",
            Lexeme::Constant(_) => "constant",
            Lexeme::Name(_) => "name",
            Lexeme::LabelRef(_) => "label reference",
        }
    }
}

#[derive(Debug)]
struct RawOperand {
    lexeme: Lexeme,
    line: usize,
    column: usize,
}

/// Label reference waiting for the full label table.
struct Fixup {
    instruction: usize,
    name: String,
    line: usize,
    column: usize,
}

/// Byte cursor tracking 1-based line and column.
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
            line_start: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(c)
    }

    fn column(&self) -> usize {
        self.pos - self.line_start + 1
    }

    fn current_char(&self) -> char {
        self.text
            .get(self.pos..)
            .and_then(|rest| rest.chars().next())
            .unwrap_or(' ')
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek(), None | Some(b'\n') | Some(COMMENT_CHAR))
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.bump();
        }
    }

    fn skip_inline_space(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r')) {
            self.pos += 1;
        }
    }

    fn skip_line(&mut self) {
        while !matches!(self.peek(), None | Some(b'\n')) {
            self.pos += 1;
        }
    }

    /// Consumes ASCII bytes matching `pred`; never crosses a newline.
    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != b'\n' && c.is_ascii() && pred(c)) {
            self.pos += 1;
        }
        self.slice(start, self.pos)
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        self.text.get(start..end).unwrap_or_default()
    }
}

struct Assembler<'a> {
    cursor: Cursor<'a>,
    config: &'a AssemblerConfig,
    file: Arc<str>,
    program: Program,
    fixups: Vec<Fixup>,
}

impl<'a> Assembler<'a> {
    fn new(source: &'a str, file: &str, config: &'a AssemblerConfig) -> Self {
        Self {
            cursor: Cursor::new(source),
            config,
            file: Arc::from(file),
            program: Program::new(config.dialect),
            fixups: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Program, VMError> {
        loop {
            self.cursor.skip_whitespace();
            let Some(c) = self.cursor.peek() else {
                break;
            };
            match c {
                COMMENT_CHAR => self.cursor.skip_line(),
                LABEL_PREFIX => self.label_declaration()?,
                c if c.is_ascii_alphabetic() => self.statement()?,
                _ => {
                    return Err(VMError::syntax(
                        self.cursor.line,
                        self.cursor.column(),
                        format!("unknown character '{}'", self.cursor.current_char()),
                    ));
                }
            }
        }

        self.resolve_fixups()?;
        Ok(self.program)
    }

    fn label_declaration(&mut self) -> Result<(), VMError> {
        let (line, column) = (self.cursor.line, self.cursor.column());
        self.cursor.bump();
        let name = self.cursor.take_while(|c| c.is_ascii_alphabetic());
        if name.is_empty() {
            return Err(VMError::syntax(line, column, "label name is empty"));
        }

        match self.cursor.peek() {
            Some(LABEL_SUFFIX) => {
                self.cursor.bump();
            }
            Some(c) if c.is_ascii_alphanumeric() || c == LABEL_PREFIX => {
                return Err(VMError::syntax(
                    line,
                    self.cursor.column(),
                    format!("invalid character '{}' in label name", c as char),
                ));
            }
            _ => {
                return Err(VMError::syntax(
                    line,
                    self.cursor.column(),
                    format!("missing ':' after label '_{name}'"),
                ));
            }
        }

        if self.program.label(name).is_some() {
            return Err(VMError::syntax(
                line,
                column,
                format!("duplicate label '{name}'"),
            ));
        }
        if self.program.labels.len() >= self.config.max_labels {
            return Err(VMError::syntax(
                line,
                column,
                format!("too many labels (maximum {})", self.config.max_labels),
            ));
        }

        self.program.labels.push(Label {
            name: name.to_string(),
            target: self.program.len(),
        });
        Ok(())
    }

    fn statement(&mut self) -> Result<(), VMError> {
        let (line, column, start) = (self.cursor.line, self.cursor.column(), self.cursor.pos);

        let mut word = self.cursor.take_while(|c| c.is_ascii_alphabetic());
        if self
            .cursor
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == LABEL_PREFIX)
        {
            self.cursor
                .take_while(|c| c.is_ascii_alphanumeric() || c == LABEL_PREFIX);
            word = self.cursor.slice(start, self.cursor.pos);
        }

        let known = Opcode::from_mnemonic(word);
        let Some(opcode) =
            known.filter(|op| !op.requires_hardware() || self.config.profile.has_hardware_io())
        else {
            let hint = if known.is_some() {
                " (requires the embedded profile)"
            } else {
                ""
            };
            return Err(VMError::syntax(
                line,
                column,
                format!("unknown opcode '{word}'{hint}"),
            ));
        };

        let shape = opcode.shape_in(self.config.dialect);
        let operands = self.operands(opcode, shape)?;
        let text = self.cursor.slice(start, self.cursor.pos).trim_end().to_string();

        if self.program.len() >= self.config.max_instructions {
            return Err(VMError::syntax(
                line,
                column,
                format!(
                    "program exceeds the maximum of {} instructions",
                    self.config.max_instructions
                ),
            ));
        }

        let operand = self.build_operand(opcode, shape, &operands, line)?;
        let index = self.program.len();
        self.program.instructions.push(Instruction::new(opcode, operand));
        self.program.tokens.push(Token {
            instruction: index,
            line,
            text,
            file: self.file.clone(),
        });
        Ok(())
    }

    /// Scans the operands on the rest of the statement's line.
    fn operands(&mut self, opcode: Opcode, shape: OperandShape) -> Result<Vec<RawOperand>, VMError> {
        let mut operands = Vec::new();
        loop {
            self.cursor.skip_inline_space();
            if self.cursor.at_statement_end() {
                return Ok(operands);
            }

            let (line, column) = (self.cursor.line, self.cursor.column());
            if operands.len() == shape.arity() {
                let message = match (shape.arity(), self.cursor.peek()) {
                    (0, _) => format!("'{opcode}' takes no operands"),
                    (_, Some(SEPARATOR)) => "unexpected ',' after the last operand".to_string(),
                    (n, _) => format!("too many operands for '{opcode}' (expected {n})"),
                };
                return Err(VMError::syntax(line, column, message));
            }

            if !operands.is_empty() {
                if self.cursor.peek() != Some(SEPARATOR) {
                    return Err(VMError::syntax(
                        line,
                        column,
                        "missing separator ',' between operands",
                    ));
                }
                self.cursor.bump();
                self.cursor.skip_inline_space();
                if self.cursor.at_statement_end() {
                    return Err(VMError::syntax(
                        self.cursor.line,
                        self.cursor.column(),
                        "missing operand after ','",
                    ));
                }
            }

            operands.push(self.operand()?);
        }
    }

    fn operand(&mut self) -> Result<RawOperand, VMError> {
        let (line, column) = (self.cursor.line, self.cursor.column());
        let lexeme = match self.cursor.peek() {
            Some(QUOTE) => Lexeme::Str(self.string(line, column)?),
            Some(CONSTANT_PREFIX) => {
                self.cursor.bump();
                Lexeme::Constant(self.number(line, column)?)
            }
            Some(c) if c.is_ascii_digit() || matches!(c, b'-' | b'+' | b'.') => {
                Lexeme::Number(self.number(line, column)?)
            }
            Some(LABEL_PREFIX) => {
                self.cursor.bump();
                let name = self
                    .cursor
                    .take_while(|c| c.is_ascii_alphanumeric() || c == LABEL_PREFIX);
                if name.is_empty() {
                    return Err(VMError::syntax(line, column, "label reference is empty"));
                }
                Lexeme::LabelRef(name.to_string())
            }
            Some(c) if c.is_ascii_alphabetic() => Lexeme::Name(
                self.cursor
                    .take_while(|c| c.is_ascii_alphanumeric() || c == LABEL_PREFIX)
                    .to_string(),
            ),
            _ => {
                return Err(VMError::syntax(
                    line,
                    column,
                    format!("unexpected character '{}' in operand", self.cursor.current_char()),
                ));
            }
        };
        Ok(RawOperand {
            lexeme,
            line,
            column,
        })
    }

    /// Reads a quoted string, keeping escape sequences undecoded.
    fn string(&mut self, line: usize, column: usize) -> Result<Vec<u8>, VMError> {
        self.cursor.bump();
        let mut bytes = Vec::new();
        loop {
            match self.cursor.peek() {
                None | Some(b'\n') => {
                    return Err(VMError::syntax(line, column, "missing quotation mark"));
                }
                Some(QUOTE) => {
                    self.cursor.bump();
                    return Ok(bytes);
                }
                Some(ESCAPE) => {
                    self.cursor.bump();
                    bytes.push(ESCAPE);
                    if let Some(c) = self.cursor.peek()
                        && c != b'\n'
                    {
                        self.cursor.bump();
                        bytes.push(c);
                    }
                }
                Some(c) => {
                    self.cursor.bump();
                    bytes.push(c);
                }
            }
        }
    }

    fn number(&mut self, line: usize, column: usize) -> Result<Literal, VMError> {
        let start = self.cursor.pos;
        if matches!(self.cursor.peek(), Some(b'-' | b'+')) {
            self.cursor.bump();
        }
        self.cursor
            .take_while(|c| c.is_ascii_alphanumeric() || c == b'.' || c == LABEL_PREFIX);
        parse_literal(self.cursor.slice(start, self.cursor.pos))
            .map_err(|message| VMError::syntax(line, column, message))
    }

    fn build_operand(
        &mut self,
        opcode: Opcode,
        shape: OperandShape,
        operands: &[RawOperand],
        line: usize,
    ) -> Result<Operand, VMError> {
        match (shape, operands) {
            (OperandShape::None | OperandShape::OptionalRegister, []) => Ok(Operand::None),
            (OperandShape::StackValue, [raw]) => stack_value(opcode, raw).map(Operand::Value),
            (OperandShape::OptionalRegister, [raw]) => {
                register(opcode, raw, "destination").map(|reg| Operand::Value(Value::Register(reg)))
            }
            (OperandShape::Pair, [source, destination]) => Ok(Operand::Pair {
                source: pair_source(opcode, source)?,
                destination: register(opcode, destination, "destination")?,
            }),
            (OperandShape::ShiftAmount, [raw]) => shift_amount(opcode, raw).map(Operand::Value),
            (OperandShape::Label, [raw]) => self.label_reference(opcode, raw),
            (_, found) => Err(VMError::syntax(
                line,
                self.cursor.column(),
                format!(
                    "'{opcode}' expects {} operand(s), found {}",
                    shape.arity(),
                    found.len()
                ),
            )),
        }
    }

    fn label_reference(&mut self, opcode: Opcode, raw: &RawOperand) -> Result<Operand, VMError> {
        let name = match &raw.lexeme {
            Lexeme::LabelRef(name) | Lexeme::Name(name) => name,
            other => {
                return Err(VMError::type_error(
                    raw.line,
                    raw.column,
                    format!("'{opcode}' expects a label, found {}", other.describe()),
                ));
            }
        };

        if let Some(label) = self.program.label(name) {
            return Ok(Operand::Target(label.target));
        }

        match self.config.label_resolution {
            LabelResolution::BackwardOnly => Err(VMError::syntax(
                raw.line,
                raw.column,
                format!("undefined label '{name}' (labels must be declared before use)"),
            )),
            LabelResolution::Forward => {
                self.fixups.push(Fixup {
                    instruction: self.program.len(),
                    name: name.clone(),
                    line: raw.line,
                    column: raw.column,
                });
                // Patched in `resolve_fixups`.
                Ok(Operand::Target(0))
            }
        }
    }

    fn resolve_fixups(&mut self) -> Result<(), VMError> {
        for fixup in std::mem::take(&mut self.fixups) {
            let target = self
                .program
                .label(&fixup.name)
                .map(|label| label.target)
                .ok_or_else(|| {
                    VMError::syntax(
                        fixup.line,
                        fixup.column,
                        format!("undefined label '{}'", fixup.name),
                    )
                })?;
            if let Some(instruction) = self.program.instructions.get_mut(fixup.instruction) {
                instruction.operand = Operand::Target(target);
            }
        }
        Ok(())
    }
}

fn stack_value(opcode: Opcode, raw: &RawOperand) -> Result<Value, VMError> {
    match &raw.lexeme {
        Lexeme::Str(bytes) => Ok(Value::Str(Arc::from(bytes.as_slice()))),
        Lexeme::Number(literal) | Lexeme::Constant(literal) => Ok(literal.value()),
        Lexeme::Name(_) => register(opcode, raw, "operand").map(Value::Register),
        other => Err(VMError::type_error(
            raw.line,
            raw.column,
            format!("'{opcode}' expects a value or register, found {}", other.describe()),
        )),
    }
}

fn register(opcode: Opcode, raw: &RawOperand, role: &str) -> Result<Register, VMError> {
    match &raw.lexeme {
        Lexeme::Name(name) => Register::from_name(name).ok_or_else(|| {
            VMError::syntax(raw.line, raw.column, format!("invalid register '{name}'"))
        }),
        other => Err(VMError::type_error(
            raw.line,
            raw.column,
            format!("'{opcode}' {role} must be a register, found {}", other.describe()),
        )),
    }
}

fn pair_source(opcode: Opcode, raw: &RawOperand) -> Result<Source, VMError> {
    match &raw.lexeme {
        Lexeme::Constant(literal) => Ok(Source::Immediate(literal.value())),
        Lexeme::Name(_) => register(opcode, raw, "source").map(Source::Register),
        Lexeme::Number(_) => Err(VMError::type_error(
            raw.line,
            raw.column,
            format!("'{opcode}' constant source needs a '$' prefix"),
        )),
        other => Err(VMError::type_error(
            raw.line,
            raw.column,
            format!(
                "'{opcode}' source must be a register or '$' constant, found {}",
                other.describe()
            ),
        )),
    }
}

fn shift_amount(opcode: Opcode, raw: &RawOperand) -> Result<Value, VMError> {
    match raw.lexeme {
        Lexeme::Number(Literal::Int(n)) if (0..64).contains(&n) => Ok(Value::I64(n)),
        Lexeme::Number(Literal::Int(n)) => Err(VMError::type_error(
            raw.line,
            raw.column,
            format!("shift amount {n} is outside 0..=63"),
        )),
        ref other => Err(VMError::type_error(
            raw.line,
            raw.column,
            format!("'{opcode}' expects a plain integer shift amount, found {}", other.describe()),
        )),
    }
}

/// Assembles source text with the desktop defaults.
pub fn assemble_source(source: &str) -> Result<Program, VMError> {
    assemble_source_with(source, "<source>", &AssemblerConfig::default())
}

/// Assembles source text, attributing tokens and diagnostics to `file`.
///
/// Logs a compiler-style diagnostic on failure.
pub fn assemble_source_with(
    source: &str,
    file: &str,
    config: &AssemblerConfig,
) -> Result<Program, VMError> {
    let result = Assembler::new(source, file, config).run();
    match &result {
        Ok(program) => debug!(
            "assembled {file}: {} instructions, {} labels",
            program.len(),
            program.labels.len()
        ),
        Err(err) => error!("{}", render_diagnostic(file, source, err).trim_end()),
    }
    result
}

/// Convenience: assemble directly from a file path.
pub fn assemble_file<P: AsRef<Path>>(path: P, config: &AssemblerConfig) -> Result<Program, VMError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    assemble_source_with(&source, &path.display().to_string(), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::config::{Dialect, Profile};
    use crate::virtual_machine::errors::ErrorKind;

    fn assemble_with(source: &str, config: &AssemblerConfig) -> Result<Program, VMError> {
        assemble_source_with(source, "test.pvb", config)
    }

    fn expect_err(source: &str) -> VMError {
        assemble_source(source).unwrap_err()
    }

    fn assert_syntax(err: VMError, line: usize, column: usize, needle: &str) {
        assert_eq!(err.kind(), ErrorKind::Syntax, "{err}");
        assert_eq!(err.location(), Some((line, column)), "{err}");
        assert!(err.to_string().contains(needle), "{err}");
    }

    fn assert_type(err: VMError, line: usize, column: usize, needle: &str) {
        assert_eq!(err.kind(), ErrorKind::Type, "{err}");
        assert_eq!(err.location(), Some((line, column)), "{err}");
        assert!(err.to_string().contains(needle), "{err}");
    }

    // ==================== Literals ====================

    #[test]
    fn parse_literal_variants() {
        assert_eq!(parse_literal("42"), Ok(Literal::Int(42)));
        assert_eq!(parse_literal("-7"), Ok(Literal::Int(-7)));
        assert_eq!(parse_literal("+3"), Ok(Literal::Int(3)));
        assert_eq!(parse_literal("2.5"), Ok(Literal::Float(2.5)));
        assert_eq!(parse_literal("-.5"), Ok(Literal::Float(-0.5)));
        assert!(parse_literal("1.2.3").is_err());
        assert!(parse_literal("-").is_err());
        assert!(parse_literal("12ab").is_err());
        assert!(parse_literal("").is_err());
        assert!(
            parse_literal("99999999999999999999")
                .unwrap_err()
                .contains("out of range")
        );
    }

    // ==================== Layout ====================

    #[test]
    fn assemble_empty_source() {
        let program = assemble_source("").unwrap();
        assert!(program.is_empty());
        assert!(program.labels.is_empty());
    }

    #[test]
    fn assemble_comments_and_blank_lines() {
        let program = assemble_source("; header\n\n   ; indented\nnop ; trailing\n\n").unwrap();
        assert_eq!(program.len(), 1);
        assert_eq!(program.tokens[0].line, 4);
        assert_eq!(program.tokens[0].text, "nop");
    }

    #[test]
    fn label_targets_next_instruction() {
        let program = assemble_source("nop\n_start:\n  push 1\n_end: nop").unwrap();
        assert_eq!(program.label("start").unwrap().target, 1);
        assert_eq!(program.label("end").unwrap().target, 2);
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn tokens_record_file_and_text() {
        let program = assemble_with("_start:\n  mov $1 ,  rax ; set\n", &AssemblerConfig::default())
            .unwrap();
        let token = &program.tokens[0];
        assert_eq!(token.instruction, 0);
        assert_eq!(token.line, 2);
        assert_eq!(token.text, "mov $1 ,  rax");
        assert_eq!(&*token.file, "test.pvb");
    }

    // ==================== Operands ====================

    #[test]
    fn push_literals_and_registers() {
        let program = assemble_source("push 42\npush -2.5\npush \"hi\"\nPUSH RBX").unwrap();
        let operands: Vec<_> = program.instructions.iter().map(|i| &i.operand).collect();
        assert_eq!(operands[0], &Operand::Value(Value::I64(42)));
        assert_eq!(operands[1], &Operand::Value(Value::F64(-2.5)));
        assert_eq!(operands[2], &Operand::Value(Value::str("hi")));
        assert_eq!(operands[3], &Operand::Value(Value::Register(Register::Rbx)));
    }

    #[test]
    fn string_escapes_are_kept_raw() {
        let program = assemble_source(r#"push "a\"b\n""#).unwrap();
        assert_eq!(
            program.instructions[0].operand,
            Operand::Value(Value::str(r#"a\"b\n"#))
        );
    }

    #[test]
    fn unterminated_string() {
        assert_syntax(expect_err("push \"oops\nnop"), 1, 6, "missing quotation mark");
    }

    #[test]
    fn pair_operands() {
        let program = assemble_source("mov $-3, rcx\ncmp rcx, rdx\nadd $1.5, r8").unwrap();
        assert_eq!(
            program.instructions[0].operand,
            Operand::Pair {
                source: Source::Immediate(Value::I64(-3)),
                destination: Register::Rcx,
            }
        );
        assert_eq!(
            program.instructions[1].operand,
            Operand::Pair {
                source: Source::Register(Register::Rcx),
                destination: Register::Rdx,
            }
        );
        assert_eq!(
            program.instructions[2].operand,
            Operand::Pair {
                source: Source::Immediate(Value::F64(1.5)),
                destination: Register::R8,
            }
        );
    }

    #[test]
    fn pop_with_and_without_destination() {
        let program = assemble_source("pop\npop r15").unwrap();
        assert_eq!(program.instructions[0].operand, Operand::None);
        assert_eq!(
            program.instructions[1].operand,
            Operand::Value(Value::Register(Register::R15))
        );
    }

    #[test]
    fn shift_amounts() {
        let program = assemble_source("shl 3\nshr 63").unwrap();
        assert_eq!(program.instructions[0].operand, Operand::Value(Value::I64(3)));
        assert_type(expect_err("shl 64"), 1, 5, "outside 0..=63");
        assert_type(expect_err("shr rax"), 1, 5, "plain integer");
        assert_type(expect_err("shr $2"), 1, 5, "plain integer");
    }

    // ==================== Errors ====================

    #[test]
    fn unknown_opcode() {
        assert_syntax(expect_err("nop\n  foo rax"), 2, 3, "unknown opcode 'foo'");
        assert_syntax(expect_err("push2 3"), 1, 1, "unknown opcode 'push2'");
    }

    #[test]
    fn unknown_character() {
        assert_syntax(expect_err("nop\n@push 1"), 2, 1, "unknown character '@'");
    }

    #[test]
    fn invalid_register() {
        assert_syntax(expect_err("mov rzz, rax"), 1, 5, "invalid register 'rzz'");
        assert_syntax(expect_err("push ep"), 1, 6, "invalid register 'ep'");
    }

    #[test]
    fn operand_count_errors() {
        assert_syntax(expect_err("dup 5"), 1, 5, "takes no operands");
        assert_syntax(expect_err("push 1 2"), 1, 8, "too many operands");
        assert_syntax(expect_err("push 1,"), 1, 7, "unexpected ','");
        assert_syntax(expect_err("mov rax rbx"), 1, 9, "missing separator");
        assert_syntax(expect_err("mov rax,"), 1, 9, "missing operand");
        assert_syntax(expect_err("mov rax"), 1, 8, "expects 2 operand(s), found 1");
        assert_syntax(expect_err("jmp"), 1, 4, "expects 1 operand(s), found 0");
    }

    #[test]
    fn operand_type_errors() {
        assert_type(expect_err("mov 5, rax"), 1, 5, "needs a '$' prefix");
        assert_type(expect_err("mov rax, $5"), 1, 10, "destination must be a register");
        assert_type(expect_err("add \"x\", rax"), 1, 5, "found string");
        assert_type(expect_err("pop $1"), 1, 5, "destination must be a register");
        assert_type(expect_err("jmp 3"), 1, 5, "expects a label");
        assert_type(expect_err("_start:\npush _start"), 2, 6, "found label reference");
    }

    #[test]
    fn malformed_numbers() {
        assert_syntax(expect_err("push 1.2.3"), 1, 6, "malformed");
        assert_syntax(expect_err("mov $, rax"), 1, 5, "expected a number");
        assert_syntax(expect_err("push 99999999999999999999"), 1, 6, "out of range");
    }

    // ==================== Labels ====================

    #[test]
    fn duplicate_label_error() {
        assert_syntax(expect_err("_dup: nop\n_dup: nop"), 2, 1, "duplicate label 'dup'");
    }

    #[test]
    fn malformed_labels() {
        assert_syntax(expect_err("_: nop"), 1, 1, "label name is empty");
        assert_syntax(expect_err("_start nop"), 1, 7, "missing ':'");
        assert_syntax(expect_err("_loop2: nop"), 1, 6, "invalid character '2'");
    }

    #[test]
    fn forward_references_resolve() {
        let program = assemble_source("_start:\n  jmp _later\n  nop\n_later:\n  ret").unwrap();
        assert_eq!(program.instructions[0].operand, Operand::Target(2));
    }

    #[test]
    fn references_without_underscore() {
        let program = assemble_source("_loop: nop\njne loop\ncall _loop").unwrap();
        assert_eq!(program.instructions[1].operand, Operand::Target(0));
        assert_eq!(program.instructions[2].operand, Operand::Target(0));
    }

    #[test]
    fn backward_only_rejects_forward_references() {
        let config =
            AssemblerConfig::default().with_label_resolution(LabelResolution::BackwardOnly);
        let err = assemble_with("_start:\n  jmp _later\n_later: nop", &config).unwrap_err();
        assert_syntax(err, 2, 7, "undefined label 'later'");
        assert!(assemble_with("_later: nop\n_start: jmp _later", &config).is_ok());
    }

    #[test]
    fn undefined_label_error() {
        assert_syntax(expect_err("nop\ncall _missing"), 2, 6, "undefined label 'missing'");
    }

    // ==================== Configuration ====================

    #[test]
    fn hardware_opcodes_need_embedded_profile() {
        assert_syntax(expect_err("awrite"), 1, 1, "requires the embedded profile");
        let embedded = AssemblerConfig::for_profile(Profile::Embedded);
        let program = assemble_with("awrite", &embedded).unwrap();
        assert_eq!(program.instructions[0].opcode, Opcode::AnalogWrite);
    }

    #[test]
    fn instruction_limit() {
        let embedded = AssemblerConfig::for_profile(Profile::Embedded);
        assert!(assemble_with(&"nop\n".repeat(15), &embedded).is_ok());
        let err = assemble_with(&"nop\n".repeat(16), &embedded).unwrap_err();
        assert_syntax(err, 16, 1, "maximum of 15 instructions");
    }

    #[test]
    fn label_limit() {
        let embedded = AssemblerConfig::for_profile(Profile::Embedded);
        let source = "_a: nop\n_b: nop\n_c: nop\n_d: nop\n_e: nop\n_f: nop";
        assert_syntax(assemble_with(source, &embedded).unwrap_err(), 6, 1, "too many labels");
    }

    #[test]
    fn stack_dialect_arithmetic_takes_no_operands() {
        let stack = AssemblerConfig::default().with_dialect(Dialect::Stack);
        let program = assemble_with("push 2\npush 3\nadd\nprint", &stack).unwrap();
        assert_eq!(program.dialect, Dialect::Stack);
        assert_eq!(program.instructions[2], Instruction::new(Opcode::Add, Operand::None));
        let err = assemble_with("add $1, rax", &stack).unwrap_err();
        assert_syntax(err, 1, 5, "takes no operands");
    }

    // ==================== Diagnostics ====================

    #[test]
    fn diagnostic_points_at_column() {
        let source = "nop\n  mov rax, $5\n";
        let err = assemble_source(source).unwrap_err();
        let diag = render_diagnostic("prog.pvb", source, &err);
        let lines: Vec<_> = diag.lines().collect();
        assert_eq!(lines[0], "type error: 'mov' destination must be a register, found constant");
        assert_eq!(lines[1], " --> prog.pvb:2:12");
        assert_eq!(lines[2], "     |");
        assert_eq!(lines[3], "   2 |   mov rax, $5");
        assert_eq!(lines[4], format!("     | {}^", " ".repeat(11)));
    }

    #[test]
    fn diagnostic_caret_sits_under_reported_column() {
        let source = "_start:
	push 1
  frob rax
";
        let err = assemble_source(source).unwrap_err();
        let (_, column) = err.location().unwrap();
        let diag = render_diagnostic("prog.pvb", source, &err);
        let lines: Vec<_> = diag.lines().collect();
        let source_row = lines[3];
        let caret_row = lines[4];
        let caret = caret_row.find('^').unwrap();
        let gutter = source_row.find("| ").unwrap() + 2;
        assert_eq!(caret, gutter + column - 1);
        assert_eq!(&source_row[caret..caret + 4], "frob");
    }

    #[test]
    fn diagnostic_without_location() {
        let diag = render_diagnostic("x.pvb", "", &VMError::NoEntryPoint);
        assert!(diag.starts_with("runtime error: no entry point"));
    }

    #[test]
    fn assemble_file_reports_missing_file() {
        let err = assemble_file("/nonexistent/provrb/missing.pvb", &AssemblerConfig::default())
            .unwrap_err();
        assert!(matches!(err, VMError::Io { .. }));
    }
}
