// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Serial NOR flash behind the QSPI controller.
//!
//! Command set and streaming transfers for S25FL-class devices with 24-bit
//! addressing and 256-byte pages.
//!
//! Framing
//! -------
//!
//! Transmit words go out least significant byte first, and the width of a
//! word is picked by the data port it is written to. Addresses go out most
//! significant byte first, so they are byte-reversed before being packed
//! behind the opcode. A receive word collects the bytes clocked in while its
//! transmit word was shifted out, in the top bytes of the word for narrow
//! frames.
//!
//! Reads
//! -----
//!
//! Reads longer than the FIFO are pumped: the transmit side is topped up with
//! filler words in 32-word chunks while the receive side is drained in
//! 32-word chunks, each side paced by its own threshold. Once the outstanding
//! word count fits in the FIFO, the receive threshold is lowered to exactly
//! the remainder so the last chunk is drained in one go.
//!
//! Writes
//! ------
//!
//! A page is 64 words, one more than a manual start can move. Each page is
//! sent in a single chip-select assertion as 16 words followed by 48 words,
//! with the transmit threshold set so the second push fits.

use core::cmp;
use core::iter;

use log::{debug, error, trace};
use tock_registers::{register_bitfields, LocalRegisterCopy};

use crate::errorcode::ErrorCode;
use crate::qspi::{Qspi, QspiRegisterBlock, TxWidth, FIFO_DEPTH, INT_STS};
use crate::slcr::SlcrRegisterBlock;

/// Words per program page.
pub const PAGE_WORDS: usize = 64;
pub const PAGE_BYTES: u32 = 256;
/// Words moved per refill or drain while pumping a long read.
pub const PUMP_CHUNK: usize = 32;
/// Words pushed before the first start of a page program.
const PROGRAM_HEAD: usize = 16;
const PROGRAM_TAIL: usize = PAGE_WORDS - PROGRAM_HEAD;
/// Programming an erased word leaves the cell unchanged.
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    READ_ID = 0x90,   // Read Electronic Manufacturer and Device ID
    RDID = 0x9F,      // Read JEDEC ID
    RES = 0xAB,       // Read Electronic Signature
    RDSR1 = 0x05,     // Read Status Register 1
    RDSR2 = 0x07,     // Read Status Register 2
    RDCR = 0x35,      // Read Configuration Register
    WRR = 0x01,       // Write Status and Configuration Registers
    WRDI = 0x04,      // Write Disable
    WREN = 0x06,      // Write Enable
    CLSR = 0x30,      // Clear Status Register
    ABRD = 0x14,      // AutoBoot Register Read
    ABWR = 0x15,      // AutoBoot Register Write
    BRRD = 0x16,      // Bank Register Read
    BRWR = 0x17,      // Bank Register Write
    BRAC = 0xB9,      // Bank Register Access
    DLPRD = 0x41,     // Data Learning Pattern Read
    PNVDLR = 0x43,    // Program NV Data Learning Register
    WVDLR = 0x4A,     // Write Volatile Data Learning Register
    READ = 0x03,      // Read
    FAST_READ = 0x0B, // Fast Read
    DOR = 0x3B,       // Dual Output Read
    QOR = 0x6B,       // Quad Output Read
    DIOR = 0xBB,      // Dual I/O Read
    QIOR = 0xEB,      // Quad I/O Read
    PP = 0x02,        // Page Program
    QPP = 0x32,       // Quad Page Program
    P4E = 0x20,       // Parameter 4 KiB Sector Erase
    SE = 0xD8,        // Sector Erase
    BE = 0x60,        // Bulk Erase
}

impl From<Opcode> for u32 {
    fn from(opcode: Opcode) -> u32 {
        opcode as u32
    }
}

/// Array read used by [`Qspi::read`]. Each takes one dummy byte after the
/// address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadCommand {
    FastRead,
    DualOutput,
    QuadOutput,
}

impl ReadCommand {
    pub const fn opcode(self) -> Opcode {
        match self {
            ReadCommand::FastRead => Opcode::FAST_READ,
            ReadCommand::DualOutput => Opcode::DOR,
            ReadCommand::QuadOutput => Opcode::QOR,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramCommand {
    PageProgram,
    QuadPageProgram,
}

impl ProgramCommand {
    pub const fn opcode(self) -> Opcode {
        match self {
            ProgramCommand::PageProgram => Opcode::PP,
            ProgramCommand::QuadPageProgram => Opcode::QPP,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EraseCommand {
    /// 4 KiB parameter sector
    Parameter4K,
    /// 64 KiB sector
    Sector,
    /// Whole device. The address is sent all the same.
    Bulk,
}

impl EraseCommand {
    pub const fn opcode(self) -> Opcode {
        match self {
            EraseCommand::Parameter4K => Opcode::P4E,
            EraseCommand::Sector => Opcode::SE,
            EraseCommand::Bulk => Opcode::BE,
        }
    }
}

register_bitfields![u8,
    pub STATUS1 [
        /// Write in progress
        WIP OFFSET(0) NUMBITS(1) [],
        /// Write enable latch
        WEL OFFSET(1) NUMBITS(1) [],
        /// Block protect, BP2..BP0
        BP OFFSET(2) NUMBITS(3) [],
        E_ERR OFFSET(5) NUMBITS(1) [],
        P_ERR OFFSET(6) NUMBITS(1) [],
        /// Status register write disable
        SRWD OFFSET(7) NUMBITS(1) []
    ]
];

/// Opcode followed by the low 24 bits of `addr`, most significant byte first.
pub fn command_word(opcode: Opcode, addr: u32) -> u32 {
    u32::from(opcode) | ((addr.swap_bytes() >> 8) << 8)
}

impl<Q: QspiRegisterBlock, S: SlcrRegisterBlock> Qspi<Q, S> {
    /// Sends `frames` in one transaction and returns the receive word of the
    /// last frame.
    fn exchange(&mut self, frames: &[(TxWidth, u32)]) -> Result<u32, ErrorCode> {
        self.set_rx_threshold(frames.len());
        self.transaction(|qspi| {
            for &(width, word) in frames {
                qspi.push(width, word);
            }
            qspi.start_transfer();
            qspi.wait_for(INT_STS::RX_FIFO_NOT_EMPTY)
        })?;

        let mut response = 0;
        for _ in frames {
            response = self.pop_rx();
        }
        Ok(response)
    }

    /// Opcode plus one response byte.
    fn read_register(&mut self, opcode: Opcode) -> Result<u8, ErrorCode> {
        let response = self.exchange(&[(TxWidth::TwoBytes, opcode.into())])?;
        Ok((response >> 24) as u8)
    }

    /// Manufacturer ID in the low byte, device ID in the high byte.
    pub fn read_id(&mut self) -> Result<u16, ErrorCode> {
        let response = self.exchange(&[
            (TxWidth::Word, command_word(Opcode::READ_ID, 0)),
            (TxWidth::TwoBytes, 0),
        ])?;
        Ok((response >> 16) as u16)
    }

    /// Manufacturer, memory type and capacity, most significant first.
    pub fn read_jedec_id(&mut self) -> Result<u32, ErrorCode> {
        let response = self.exchange(&[(TxWidth::Word, Opcode::RDID.into())])?;
        Ok(response.swap_bytes() & 0x00FF_FFFF)
    }

    pub fn read_sr(&mut self) -> Result<u8, ErrorCode> {
        self.read_register(Opcode::RDSR1)
    }

    pub fn read_sr2(&mut self) -> Result<u8, ErrorCode> {
        self.read_register(Opcode::RDSR2)
    }

    pub fn read_cr(&mut self) -> Result<u8, ErrorCode> {
        self.read_register(Opcode::RDCR)
    }

    fn status(&mut self) -> Result<LocalRegisterCopy<u8, STATUS1::Register>, ErrorCode> {
        Ok(LocalRegisterCopy::new(self.read_sr()?))
    }

    /// Sets the write enable latch. Returns the byte clocked in while the
    /// opcode went out.
    pub fn wren(&mut self) -> Result<u8, ErrorCode> {
        let response = self.exchange(&[(TxWidth::OneByte, Opcode::WREN.into())])?;
        Ok((response >> 24) as u8)
    }

    pub fn write_disable(&mut self) -> Result<(), ErrorCode> {
        self.exchange(&[(TxWidth::OneByte, Opcode::WRDI.into())])
            .map(|_| ())
    }

    /// Clears the program and erase error flags.
    pub fn clear_status(&mut self) -> Result<(), ErrorCode> {
        self.exchange(&[(TxWidth::OneByte, Opcode::CLSR.into())])
            .map(|_| ())
    }

    /// Writes status register 1 from `regs[7:0]` and the configuration
    /// register from `regs[15:8]`, then waits for the non-volatile write to
    /// finish.
    pub fn wrr(&mut self, regs: u16) -> Result<(), ErrorCode> {
        self.wren()?;
        let word = u32::from(Opcode::WRR) | (u32::from(regs) << 8);
        self.exchange(&[(TxWidth::ThreeBytes, word)])?;
        self.wait_while_busy()
    }

    pub fn is_busy(&mut self) -> Result<bool, ErrorCode> {
        Ok(self.status()?.is_set(STATUS1::WIP))
    }

    /// Polls status register 1 until the device is idle.
    ///
    /// A device that flagged a program or erase error stays busy until the
    /// flag is cleared, so an error is cleared here and reported as `FAIL`.
    pub fn wait_while_busy(&mut self) -> Result<(), ErrorCode> {
        self.poll("flash ready", |qspi| {
            let status = qspi.status()?;
            if status.is_set(STATUS1::P_ERR) || status.is_set(STATUS1::E_ERR) {
                error!("qspi: flash reported error, status {:#04x}", status.get());
                qspi.clear_status()?;
                return Err(ErrorCode::FAIL);
            }
            Ok(!status.is_set(STATUS1::WIP))
        })
    }

    pub fn erase(&mut self, addr: u32, kind: EraseCommand) -> Result<(), ErrorCode> {
        let opcode = kind.opcode();
        debug!("qspi: erase {:?} at {:#08x}", opcode, addr);
        self.wren()?;
        self.exchange(&[(TxWidth::Word, command_word(opcode, addr))])?;
        self.wait_while_busy()
    }

    pub fn p4_erase(&mut self, addr: u32) -> Result<(), ErrorCode> {
        self.erase(addr, EraseCommand::Parameter4K)
    }

    pub fn sector_erase(&mut self, addr: u32) -> Result<(), ErrorCode> {
        self.erase(addr, EraseCommand::Sector)
    }

    /// Programs one page at `addr` from the first 64 words of `page`. A
    /// shorter page is padded with erased words.
    ///
    /// Fails with `NOSUPPORT` unless [`Qspi::init`] selected manual mode.
    pub fn program_page(&mut self, addr: u32, page: &[u32]) -> Result<(), ErrorCode> {
        self.require_manual_mode()?;
        let used = &page[..cmp::min(page.len(), PAGE_WORDS)];
        let mut words = used
            .iter()
            .copied()
            .chain(iter::repeat(ERASED_WORD))
            .take(PAGE_WORDS);
        let opcode = self.config().program_command.opcode();

        self.wren()?;
        self.transaction(|qspi| {
            qspi.push(TxWidth::Word, command_word(opcode, addr));
            qspi.set_tx_threshold(FIFO_DEPTH - PROGRAM_TAIL);
            qspi.write_tx_fifo(words.by_ref().take(PROGRAM_HEAD));
            qspi.start_transfer();

            qspi.wait_for(INT_STS::TX_FIFO_NOT_FULL)?;
            // Echo of the command and head words.
            qspi.flush_rx_fifo();
            qspi.write_tx_fifo(words.by_ref());
            qspi.start_transfer();

            qspi.set_tx_threshold(1);
            qspi.wait_for(INT_STS::TX_FIFO_NOT_FULL)
        })?;
        self.flush_rx_fifo();
        self.wait_while_busy()
    }

    /// Programs `data` from `addr` on, one page per 64 words.
    pub fn write(&mut self, addr: u32, data: &[u32]) -> Result<(), ErrorCode> {
        let pages = data.chunks(PAGE_WORDS);
        debug!("qspi: write {} page(s) at {:#08x}", pages.len(), addr);

        let mut page_addr = addr;
        for page in pages {
            self.program_page(page_addr, page)?;
            page_addr = page_addr.wrapping_add(PAGE_BYTES);
        }
        Ok(())
    }

    /// Fills `dst` from flash starting at `addr`. Returns the number of bytes
    /// read.
    ///
    /// Fails with `NOSUPPORT` unless [`Qspi::init`] selected manual mode.
    pub fn read(&mut self, addr: u32, dst: &mut [u32]) -> Result<usize, ErrorCode> {
        if dst.is_empty() {
            return Ok(0);
        }
        self.require_manual_mode()?;
        let opcode = self.config().read_command.opcode();

        self.transaction(|qspi| {
            qspi.set_rx_threshold(1);
            qspi.push(TxWidth::OneByte, opcode.into());
            qspi.start_transfer();
            qspi.wait_for(INT_STS::RX_FIFO_NOT_EMPTY)?;
            qspi.pop_rx();

            // Address and dummy byte.
            qspi.push(TxWidth::Word, addr.swap_bytes() >> 8);
            qspi.start_transfer();
            qspi.wait_for(INT_STS::RX_FIFO_NOT_EMPTY)?;
            qspi.pop_rx();

            qspi.pump(dst)
        })?;

        trace!("qspi: read {} words at {:#08x}", dst.len(), addr);
        Ok(dst.len() * 4)
    }

    /// Reads and page programs pace the FIFOs by hand, which only works
    /// while software owns the start trigger and chip select.
    fn require_manual_mode(&self) -> Result<(), ErrorCode> {
        if self.manual_mode() {
            Ok(())
        } else {
            Err(ErrorCode::NOSUPPORT)
        }
    }

    /// Data phase of a read: clocks in `dst.len()` words.
    fn pump(&mut self, dst: &mut [u32]) -> Result<(), ErrorCode> {
        let count = dst.len();
        let mut unfilled;
        let mut chunk;

        if count > FIFO_DEPTH {
            self.fill_tx_fifo(FIFO_DEPTH);
            unfilled = count - FIFO_DEPTH;
            self.set_tx_threshold(FIFO_DEPTH - PUMP_CHUNK + 1);
            self.set_rx_threshold(PUMP_CHUNK);
            chunk = PUMP_CHUNK;
        } else {
            self.fill_tx_fifo(count);
            unfilled = 0;
            self.set_rx_threshold(count);
            chunk = count;
        }
        self.start_transfer();

        let mut received = 0;
        let mut idle_polls: u32 = 0;
        while received < count {
            let mut progress = false;

            if unfilled > 0
                && self
                    .interrupt_status()
                    .is_set(INT_STS::TX_FIFO_NOT_FULL)
            {
                let refill = cmp::min(unfilled, PUMP_CHUNK);
                self.fill_tx_fifo(refill);
                unfilled -= refill;
                progress = true;
            }

            if self
                .interrupt_status()
                .is_set(INT_STS::RX_FIFO_NOT_EMPTY)
            {
                self.read_rx_fifo(&mut dst[received..received + chunk]);
                received += chunk;
                let outstanding = count - received;
                if outstanding > 0 && outstanding <= FIFO_DEPTH {
                    self.set_rx_threshold(outstanding);
                    chunk = outstanding;
                }
                progress = true;
            }

            if progress {
                idle_polls = 0;
            } else {
                idle_polls = idle_polls.saturating_add(1);
                self.check_poll_budget(idle_polls, "read data")?;
            }
        }
        Ok(())
    }
}
