// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Drivers and chip support for the Zynq-7000 processing system.
//!
//! Only the Quad-SPI flash path is covered: the QSPI controller in manual
//! start mode, the command set of the attached serial NOR flash, and the
//! software-pumped streaming engine that moves arbitrary-length reads and
//! multi-page writes through the controller's 63-word FIFOs.

#![no_std]
#![crate_name = "zynq7000"]
#![crate_type = "rlib"]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod errorcode;
pub mod mailbox;
pub mod qspi;
pub mod qspi_flash;
pub mod slcr;
pub mod static_ref;


pub use crate::config::Config;
pub use crate::errorcode::ErrorCode;
pub use crate::mailbox::Mailbox;
pub use crate::qspi::{Qspi, QspiRegisterBlock, QspiRegisters};
pub use crate::qspi_flash::{EraseCommand, Opcode};
pub use crate::slcr::{SlcrRegisterBlock, SlcrRegisters};
pub use crate::static_ref::StaticRef;
