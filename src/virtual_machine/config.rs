//! Assembler and machine configuration.
//!
//! A [`Profile`] picks the capacities of one build target. The desktop profile
//! sizes everything for a host process; the embedded profile mirrors the limits
//! of a small microcontroller and enables the hardware I/O opcodes.

use provrb_derive::BinaryCodec;
use std::time::Duration;

/// Build target whose limits and capabilities apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Desktop,
    Embedded,
}

impl Profile {
    pub const fn stack_capacity(self) -> usize {
        match self {
            Profile::Desktop => 2048,
            Profile::Embedded => 15,
        }
    }

    pub const fn max_instructions(self) -> usize {
        match self {
            Profile::Desktop => 2048,
            Profile::Embedded => 15,
        }
    }

    pub const fn max_labels(self) -> usize {
        match self {
            Profile::Desktop => 100,
            Profile::Embedded => 5,
        }
    }

    /// Upper bound on bytes mapped through the alloc syscall.
    pub const fn memory_limit(self) -> u64 {
        match self {
            Profile::Desktop => 16 * 1024 * 1024,
            Profile::Embedded => 256,
        }
    }

    /// Longest stdin line kept by `read`, in bytes.
    pub const fn max_input_len(self) -> usize {
        match self {
            Profile::Desktop => 256,
            Profile::Embedded => 32,
        }
    }

    /// Whether pin and analog I/O opcodes are available.
    pub const fn has_hardware_io(self) -> bool {
        matches!(self, Profile::Embedded)
    }
}

/// How ADD/SUB/MUL/DIV/MOD take their operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, BinaryCodec)]
pub enum Dialect {
    /// `add src, dest` updates a register.
    #[default]
    Register,
    /// `add` pops two values and pushes the result.
    Stack,
}

/// When label references may be resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LabelResolution {
    /// Labels are collected first, so references may point forward.
    #[default]
    Forward,
    /// A label must be declared before any reference to it.
    BackwardOnly,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblerConfig {
    pub profile: Profile,
    pub dialect: Dialect,
    pub label_resolution: LabelResolution,
    pub max_instructions: usize,
    pub max_labels: usize,
}

impl AssemblerConfig {
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            profile,
            dialect: Dialect::default(),
            label_resolution: LabelResolution::default(),
            max_instructions: profile.max_instructions(),
            max_labels: profile.max_labels(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_label_resolution(mut self, label_resolution: LabelResolution) -> Self {
        self.label_resolution = label_resolution;
        self
    }
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self::for_profile(Profile::Desktop)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineConfig {
    pub profile: Profile,
    pub stack_capacity: usize,
    pub memory_limit: u64,
    pub max_input_len: usize,
    /// Duration of one unit passed to the sleep syscall.
    pub sleep_unit: Duration,
}

impl MachineConfig {
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            profile,
            stack_capacity: profile.stack_capacity(),
            memory_limit: profile.memory_limit(),
            max_input_len: profile.max_input_len(),
            sleep_unit: Duration::from_millis(1),
        }
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::for_profile(Profile::Desktop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_profile_is_smaller() {
        let desktop = AssemblerConfig::default();
        let embedded = AssemblerConfig::for_profile(Profile::Embedded);
        assert_eq!(desktop.max_instructions, 2048);
        assert_eq!(desktop.max_labels, 100);
        assert_eq!(embedded.max_instructions, 15);
        assert_eq!(embedded.max_labels, 5);
        assert_eq!(MachineConfig::for_profile(Profile::Embedded).stack_capacity, 15);
    }

    #[test]
    fn only_embedded_has_hardware() {
        assert!(!Profile::Desktop.has_hardware_io());
        assert!(Profile::Embedded.has_hardware_io());
    }

    #[test]
    fn builders_override_defaults() {
        let config = AssemblerConfig::default()
            .with_dialect(Dialect::Stack)
            .with_label_resolution(LabelResolution::BackwardOnly);
        assert_eq!(config.dialect, Dialect::Stack);
        assert_eq!(config.label_resolution, LabelResolution::BackwardOnly);
        assert_eq!(config.profile, Profile::Desktop);
    }
}
