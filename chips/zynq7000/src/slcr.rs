// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! System Level Control Registers (SLCR).
//!
//! The SLCR block is write protected. Every write must be bracketed by the
//! unlock and lock keys; only the QSPI reset control is used here.

use tock_registers::interfaces::Writeable;
use tock_registers::registers::{ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs};

use crate::static_ref::StaticRef;

register_structs! {
    pub SlcrRegisters {
        (0x000 => _reserved0),
        /// Write protection lock, takes [`LOCK_KEY`].
        (0x004 => slcr_lock: WriteOnly<u32>),
        /// Write protection unlock, takes [`UNLOCK_KEY`].
        (0x008 => slcr_unlock: WriteOnly<u32>),
        (0x00C => _reserved1),
        /// Quad-SPI software reset control.
        (0x230 => lqspi_rst_ctrl: ReadWrite<u32, LQSPI_RST_CTRL::Register>),
        (0x234 => @END),
    }
}

register_bitfields![u32,
    pub LQSPI_RST_CTRL [
        /// AMBA (CPU_1x) clock domain reset
        LQSPI_CPU1X_RST OFFSET(0) NUMBITS(1) [],
        /// Reference clock domain reset
        LQSPI_REF_RST OFFSET(1) NUMBITS(1) []
    ]
];

pub const SLCR_BASE: StaticRef<SlcrRegisters> =
    unsafe { StaticRef::new(0xF800_0000 as *const SlcrRegisters) };

pub const LOCK_KEY: u32 = 0x767B;
pub const UNLOCK_KEY: u32 = 0xDF0D;

/// The SLCR registers the QSPI driver touches.
pub trait SlcrRegisterBlock {
    type Key: Writeable<T = u32, R = ()>;
    type ResetControl: Writeable<T = u32, R = LQSPI_RST_CTRL::Register>;

    fn slcr_lock(&self) -> &Self::Key;
    fn slcr_unlock(&self) -> &Self::Key;
    fn lqspi_rst_ctrl(&self) -> &Self::ResetControl;
}

impl SlcrRegisterBlock for StaticRef<SlcrRegisters> {
    type Key = WriteOnly<u32>;
    type ResetControl = ReadWrite<u32, LQSPI_RST_CTRL::Register>;

    fn slcr_lock(&self) -> &WriteOnly<u32> {
        &self.slcr_lock
    }

    fn slcr_unlock(&self) -> &WriteOnly<u32> {
        &self.slcr_unlock
    }

    fn lqspi_rst_ctrl(&self) -> &ReadWrite<u32, LQSPI_RST_CTRL::Register> {
        &self.lqspi_rst_ctrl
    }
}

/// Runs `f` with the SLCR write protection lifted.
pub fn with_unlocked<S: SlcrRegisterBlock, T>(slcr: &S, f: impl FnOnce(&S) -> T) -> T {
    slcr.slcr_unlock().set(UNLOCK_KEY);
    let result = f(slcr);
    slcr.slcr_lock().set(LOCK_KEY);
    result
}

/// Pulses the reset of both QSPI clock domains. This returns every
/// controller register and both FIFOs to their reset state.
pub fn reset_qspi_clocks<S: SlcrRegisterBlock>(slcr: &S) {
    with_unlocked(slcr, |regs| {
        regs.lqspi_rst_ctrl()
            .write(LQSPI_RST_CTRL::LQSPI_REF_RST::SET + LQSPI_RST_CTRL::LQSPI_CPU1X_RST::SET);
        regs.lqspi_rst_ctrl().set(0);
    });
}
