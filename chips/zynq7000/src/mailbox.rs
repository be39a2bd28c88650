// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Request mailbox for driving the flash from a debugger.
//!
//! A debugger halts the core, fills in the command index, address and count,
//! sets the launch flag and resumes. The firmware main loop calls
//! [`Mailbox::service`], which runs the request once and leaves the result
//! in the response slot for the debugger to pick up.

use log::debug;

use crate::errorcode::ErrorCode;
use crate::qspi::{Qspi, QspiRegisterBlock};
use crate::slcr::SlcrRegisterBlock;

/// Mailbox command, numbered by its index in the request slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    ReadId = 0,
    ReadStatus = 1,
    ReadConfig = 2,
    /// Read `count` words into the buffer. Responds with the byte count.
    Read = 3,
    WriteEnable = 4,
    /// Write the status and configuration registers from `buffer[0]`.
    WriteRegisters = 5,
    SectorErase = 6,
    /// Program `count` words from the buffer.
    Write = 7,
}

impl TryFrom<u32> for Command {
    type Error = ErrorCode;

    fn try_from(index: u32) -> Result<Command, ErrorCode> {
        match index {
            0 => Ok(Command::ReadId),
            1 => Ok(Command::ReadStatus),
            2 => Ok(Command::ReadConfig),
            3 => Ok(Command::Read),
            4 => Ok(Command::WriteEnable),
            5 => Ok(Command::WriteRegisters),
            6 => Ok(Command::SectorErase),
            7 => Ok(Command::Write),
            _ => Err(ErrorCode::NOSUPPORT),
        }
    }
}

#[derive(Debug)]
pub struct Mailbox {
    command: u32,
    address: u32,
    count: usize,
    launch: bool,
    response: Result<u32, ErrorCode>,
}

impl Mailbox {
    pub const fn new() -> Self {
        Mailbox {
            command: 0,
            address: 0,
            count: 0,
            launch: false,
            response: Ok(0),
        }
    }

    /// Arms the mailbox with a request.
    pub fn post(&mut self, command: u32, address: u32, count: usize) {
        self.command = command;
        self.address = address;
        self.count = count;
        self.launch = true;
    }

    pub fn is_pending(&self) -> bool {
        self.launch
    }

    /// Result of the last serviced request.
    pub fn response(&self) -> Result<u32, ErrorCode> {
        self.response
    }

    /// Runs the pending request, if any, against `qspi` using `buffer` as
    /// the data area. Returns whether a request was run.
    pub fn service<Q: QspiRegisterBlock, S: SlcrRegisterBlock>(
        &mut self,
        qspi: &mut Qspi<Q, S>,
        buffer: &mut [u32],
    ) -> bool {
        if !self.launch {
            return false;
        }
        self.response = self.execute(qspi, buffer);
        debug!(
            "mailbox: command {} at {:#08x} -> {:?}",
            self.command, self.address, self.response
        );
        self.launch = false;
        true
    }

    fn execute<Q: QspiRegisterBlock, S: SlcrRegisterBlock>(
        &self,
        qspi: &mut Qspi<Q, S>,
        buffer: &mut [u32],
    ) -> Result<u32, ErrorCode> {
        let count = self.count;
        match Command::try_from(self.command)? {
            Command::ReadId => qspi.read_id().map(u32::from),
            Command::ReadStatus => qspi.read_sr().map(u32::from),
            Command::ReadConfig => qspi.read_cr().map(u32::from),
            Command::Read => {
                let dst = buffer.get_mut(..count).ok_or(ErrorCode::SIZE)?;
                qspi.read(self.address, dst).map(|bytes| bytes as u32)
            }
            Command::WriteEnable => qspi.wren().map(u32::from),
            Command::WriteRegisters => {
                let regs = buffer.get(0).ok_or(ErrorCode::SIZE)?;
                qspi.wrr(*regs as u16).map(|()| 0)
            }
            Command::SectorErase => qspi.sector_erase(self.address).map(|()| 0),
            Command::Write => {
                let data = buffer.get(..count).ok_or(ErrorCode::SIZE)?;
                qspi.write(self.address, data).map(|()| 0)
            }
        }
    }
}
