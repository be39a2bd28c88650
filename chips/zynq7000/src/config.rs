// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Data structure for storing configuration options of the QSPI flash driver.
//!
//! Configuration is a typed `const` object rather than a set of Cargo
//! features, so that every code path is type-checked regardless of the
//! options a board picks. The single Cargo feature, `bounded_polling`, only
//! changes the value of [`Config::DEFAULT`].

use crate::qspi_flash::{ProgramCommand, ReadCommand};

/// Number of polls allowed per wait when `bounded_polling` is enabled.
///
/// One poll is one read of the interrupt status register, or one status
/// register read of the flash device while waiting for completion. Bulk erase
/// of a 16 MiB part takes tens of seconds, so boards that erase whole chips
/// should raise this.
pub const DEFAULT_POLL_LIMIT: u32 = 1_000_000;

/// Divisor applied to the QSPI reference clock to produce SCLK.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum BaudRateDivisor {
    Div2 = 0,
    Div4 = 1,
    Div8 = 2,
    Div16 = 3,
    Div32 = 4,
    Div64 = 5,
    Div128 = 6,
    Div256 = 7,
}

/// Driver configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// SCLK divisor written to `CONFIG.BAUD_RATE_DIV` at init.
    pub baud_rate_div: BaudRateDivisor,

    /// Upper bound on every hardware wait.
    ///
    /// `None` spins until the hardware answers, which is what a bare-metal
    /// target without a watchdog strategy expects: a dead device hangs the
    /// caller. `Some(n)` gives up after `n` polls and reports
    /// [`ErrorCode::BUSY`](crate::ErrorCode::BUSY), with chip select released.
    pub poll_limit: Option<u32>,

    /// Array read used by the streaming read. All variants use one dummy
    /// byte after the address.
    pub read_command: ReadCommand,

    /// Page program variant used by `write` and `program_page`.
    pub program_command: ProgramCommand,
}

impl Config {
    pub const DEFAULT: Config = Config {
        baud_rate_div: BaudRateDivisor::Div4,
        poll_limit: if cfg!(feature = "bounded_polling") {
            Some(DEFAULT_POLL_LIMIT)
        } else {
            None
        },
        read_command: ReadCommand::QuadOutput,
        program_command: ProgramCommand::QuadPageProgram,
    };
}

impl Default for Config {
    fn default() -> Self {
        Config::DEFAULT
    }
}
