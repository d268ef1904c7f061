//! Host I/O seen by `read`, `write`, `awrite` and `print`.

use crate::virtual_machine::errors::VMError;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// File descriptor numbers popped by `read` and `write`.
pub mod fd {
    pub const STDIN: i64 = 1;
    pub const STDERR: i64 = 2;
    pub const STDOUT: i64 = 3;
    pub const PIN: i64 = 4;
}

/// Output stream of a [`Console`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn name(self) -> &'static str {
        match self {
            Stream::Stdout => "<stdout>",
            Stream::Stderr => "<stderr>",
        }
    }
}

/// Standard streams of the machine.
pub trait Console {
    /// Reads one line, including its terminator. `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    fn write(&mut self, stream: Stream, bytes: &[u8]) -> io::Result<()>;
}

/// Console bound to the process's standard streams.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    }

    fn write(&mut self, stream: Stream, bytes: &[u8]) -> io::Result<()> {
        match stream {
            Stream::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)?;
                out.flush()
            }
            Stream::Stderr => io::stderr().lock().write_all(bytes),
        }
    }
}

/// In-memory console with scripted input and captured output.
#[derive(Debug, Default)]
pub struct BufferConsole {
    input: VecDeque<String>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `text` as input, one entry per line.
    pub fn with_input(text: &str) -> Self {
        Self {
            input: text.lines().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl Console for BufferConsole {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.input.pop_front())
    }

    fn write(&mut self, stream: Stream, bytes: &[u8]) -> io::Result<()> {
        match stream {
            Stream::Stdout => self.stdout.extend_from_slice(bytes),
            Stream::Stderr => self.stderr.extend_from_slice(bytes),
        }
        Ok(())
    }
}

/// Board pins driven by `write`/`read` on [`fd::PIN`] and by `awrite`.
pub trait HardwareIo {
    fn digital_write(&mut self, pin: i64, high: bool) -> Result<(), VMError>;
    fn digital_read(&mut self, pin: i64) -> Result<bool, VMError>;
    fn analog_write(&mut self, pin: i64, value: u8) -> Result<(), VMError>;
}

/// Hardware of a desktop host: every call fails.
#[derive(Debug, Default)]
pub struct NoHardware;

impl HardwareIo for NoHardware {
    fn digital_write(&mut self, _pin: i64, _high: bool) -> Result<(), VMError> {
        Err(VMError::NotImplemented("digital pin write"))
    }

    fn digital_read(&mut self, _pin: i64) -> Result<bool, VMError> {
        Err(VMError::NotImplemented("digital pin read"))
    }

    fn analog_write(&mut self, _pin: i64, _value: u8) -> Result<(), VMError> {
        Err(VMError::NotImplemented("analog write"))
    }
}

/// Number of digital pins on the simulated board.
pub const PIN_COUNT: usize = 20;

/// Pins with a PWM output.
pub const PWM_PINS: [usize; 6] = [3, 5, 6, 9, 10, 11];

/// In-memory stand-in for a board's pin header.
#[derive(Clone, Debug, Default)]
pub struct SimulatedPins {
    levels: [bool; PIN_COUNT],
    duty: [Option<u8>; PIN_COUNT],
}

impl SimulatedPins {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(pin: i64) -> Result<usize, VMError> {
        usize::try_from(pin)
            .ok()
            .filter(|&index| index < PIN_COUNT)
            .ok_or(VMError::InvalidPin(pin))
    }

    /// Drives an input level as if from outside the board.
    pub fn set_level(&mut self, pin: usize, high: bool) {
        if let Some(level) = self.levels.get_mut(pin) {
            *level = high;
        }
    }

    pub fn level(&self, pin: usize) -> Option<bool> {
        self.levels.get(pin).copied()
    }

    /// Last PWM duty written to `pin`, if it is a PWM pin and has been written.
    pub fn duty(&self, pin: usize) -> Option<u8> {
        self.duty.get(pin).copied().flatten()
    }
}

impl HardwareIo for SimulatedPins {
    fn digital_write(&mut self, pin: i64, high: bool) -> Result<(), VMError> {
        let index = Self::index(pin)?;
        self.levels[index] = high;
        self.duty[index] = None;
        Ok(())
    }

    fn digital_read(&mut self, pin: i64) -> Result<bool, VMError> {
        Ok(self.levels[Self::index(pin)?])
    }

    fn analog_write(&mut self, pin: i64, value: u8) -> Result<(), VMError> {
        let index = Self::index(pin)?;
        if PWM_PINS.contains(&index) {
            self.duty[index] = Some(value);
            self.levels[index] = value > 0;
        } else {
            // Pins without PWM snap to the nearer level.
            self.levels[index] = value >= 128;
        }
        Ok(())
    }
}

/// Expands backslash escapes in a string literal.
///
/// Unknown escapes are kept with their backslash, as is a trailing backslash.
pub fn decode_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.iter().copied();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b't') => out.push(b'\t'),
            Some(b'r') => out.push(b'\r'),
            Some(b'b') => out.push(0x08),
            Some(b'f') => out.push(0x0c),
            Some(b'a') => out.push(0x07),
            Some(b'v') => out.push(0x0b),
            Some(c @ (b'\\' | b'"' | b'\'')) => out.push(c),
            Some(other) => out.extend_from_slice(&[b'\\', other]),
            None => out.push(b'\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_known_escapes() {
        assert_eq!(decode_escapes(br"a\nb\tc"), b"a\nb\tc");
        assert_eq!(decode_escapes(br#"\"q\" \'s\' \\"#), b"\"q\" 's' \\");
        assert_eq!(decode_escapes(br"\r\b\f\a\v"), b"\r\x08\x0c\x07\x0b");
    }

    #[test]
    fn decode_keeps_unknown_and_trailing() {
        assert_eq!(decode_escapes(br"\q"), br"\q");
        assert_eq!(decode_escapes(br"end\"), br"end\");
        assert_eq!(decode_escapes(b"plain"), b"plain");
    }

    #[test]
    fn buffer_console_scripts_input() {
        let mut console = BufferConsole::with_input("one\ntwo\n");
        assert_eq!(console.read_line().unwrap().as_deref(), Some("one"));
        assert_eq!(console.read_line().unwrap().as_deref(), Some("two"));
        assert_eq!(console.read_line().unwrap(), None);
        console.write(Stream::Stderr, b"e").unwrap();
        console.write(Stream::Stdout, b"o").unwrap();
        assert_eq!(console.stdout_str(), "o");
        assert_eq!(console.stderr_str(), "e");
    }

    #[test]
    fn no_hardware_is_not_implemented() {
        let mut hw = NoHardware;
        assert!(matches!(hw.digital_write(1, true), Err(VMError::NotImplemented(_))));
        assert!(matches!(hw.digital_read(1), Err(VMError::NotImplemented(_))));
        assert!(matches!(hw.analog_write(3, 9), Err(VMError::NotImplemented(_))));
    }

    #[test]
    fn simulated_pins() {
        let mut pins = SimulatedPins::new();
        pins.digital_write(13, true).unwrap();
        assert_eq!(pins.level(13), Some(true));
        assert!(pins.digital_read(13).unwrap());

        pins.analog_write(9, 100).unwrap();
        assert_eq!(pins.duty(9), Some(100));
        pins.analog_write(2, 200).unwrap();
        assert_eq!(pins.duty(2), None);
        assert_eq!(pins.level(2), Some(true));

        assert!(matches!(pins.digital_write(20, true), Err(VMError::InvalidPin(20))));
        assert!(matches!(pins.digital_read(-1), Err(VMError::InvalidPin(-1))));
    }
}
