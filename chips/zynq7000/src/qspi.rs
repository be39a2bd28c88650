// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Quad-SPI controller in flash I/O mode.
//!
//! This module owns the controller registers and provides the primitives the
//! flash protocol is built from: chip-select control, the manual-start
//! trigger, FIFO thresholds and FIFO data movement. The flash command set and
//! the streaming engine live in [`crate::qspi_flash`].
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! use zynq7000::{qspi, slcr, Config, Qspi};
//!
//! let mut flash = Qspi::new(qspi::QSPI_BASE, slcr::SLCR_BASE, Config::DEFAULT);
//! flash.init(true);
//! let id = flash.read_id()?;
//! ```
//!
//! The configuration register holds a write-only trigger bit, so the driver
//! keeps a shadow copy of it. The shadow is seeded from hardware once in
//! [`Qspi::init`] and from then on every write to the register is a write of
//! the shadow.

use log::{debug, trace, warn};
use tock_registers::fields::Field;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite, WriteOnly};
use tock_registers::{register_bitfields, register_structs, LocalRegisterCopy, RegisterLongName};

use crate::config::Config;
use crate::errorcode::ErrorCode;
use crate::slcr::{self, SlcrRegisterBlock};
use crate::static_ref::StaticRef;

register_structs! {
    pub QspiRegisters {
        (0x00 => config: ReadWrite<u32, CONFIG::Register>),
        (0x04 => int_sts: ReadWrite<u32, INT_STS::Register>),
        (0x08 => _reserved0),
        (0x14 => en: ReadWrite<u32, EN::Register>),
        (0x18 => _reserved1),
        /// Transmit data, 4 bytes per word.
        (0x1C => txd0: WriteOnly<u32>),
        (0x20 => rx_data: ReadOnly<u32>),
        (0x24 => _reserved2),
        (0x28 => tx_thres: ReadWrite<u32>),
        (0x2C => rx_thres: ReadWrite<u32>),
        (0x30 => _reserved3),
        /// Transmit data, 1 byte per word.
        (0x80 => txd1: WriteOnly<u32>),
        /// Transmit data, 2 bytes per word.
        (0x84 => txd2: WriteOnly<u32>),
        /// Transmit data, 3 bytes per word.
        (0x88 => txd3: WriteOnly<u32>),
        (0x8C => _reserved4),
        (0xA0 => lqspi_cfg: ReadWrite<u32, LQSPI_CFG::Register>),
        (0xA4 => @END),
    }
}

pub const QSPI_BASE: StaticRef<QspiRegisters> =
    unsafe { StaticRef::new(0xE000_D000 as *const QspiRegisters) };

/// Depth of each FIFO in words. This is also the most a single manual start
/// moves before software has to refill the transmit side.
pub const FIFO_DEPTH: usize = 63;

register_bitfields![u32,
    pub CONFIG [
        MODE_SEL OFFSET(0) NUMBITS(1) [
            Slave = 0,
            Master = 1
        ],
        CLK_POL OFFSET(1) NUMBITS(1) [],
        CLK_PH OFFSET(2) NUMBITS(1) [],
        BAUD_RATE_DIV OFFSET(3) NUMBITS(3) [],
        FIFO_WIDTH OFFSET(6) NUMBITS(2) [
            Width32 = 0b11
        ],
        REF_CLK OFFSET(8) NUMBITS(1) [],
        /// Chip select level, 0 selects the device.
        PCS OFFSET(10) NUMBITS(1) [
            Asserted = 0,
            Deasserted = 1
        ],
        RESERVED OFFSET(11) NUMBITS(3) [],
        MANUAL_CS OFFSET(14) NUMBITS(1) [],
        MAN_START_EN OFFSET(15) NUMBITS(1) [],
        /// Write-only trigger, reads as zero.
        MAN_START_COM OFFSET(16) NUMBITS(1) [],
        HOLDB_DR OFFSET(19) NUMBITS(1) [],
        ENDIAN OFFSET(26) NUMBITS(1) [
            Little = 0,
            Big = 1
        ],
        IFMODE OFFSET(31) NUMBITS(1) [
            Legacy = 0,
            FlashMemory = 1
        ]
    ],
    pub INT_STS [
        RX_OVERFLOW OFFSET(0) NUMBITS(1) [],
        /// TX FIFO level is below TX_THRES
        TX_FIFO_NOT_FULL OFFSET(2) NUMBITS(1) [],
        TX_FIFO_FULL OFFSET(3) NUMBITS(1) [],
        /// RX FIFO level is at or above RX_THRES
        RX_FIFO_NOT_EMPTY OFFSET(4) NUMBITS(1) [],
        RX_FIFO_FULL OFFSET(5) NUMBITS(1) [],
        TX_FIFO_UNDERFLOW OFFSET(6) NUMBITS(1) []
    ],
    pub EN [
        ENABLE OFFSET(0) NUMBITS(1) []
    ],
    pub LQSPI_CFG [
        LQ_MODE OFFSET(31) NUMBITS(1) []
    ]
];

/// Transmit data port. The port a word is written to selects how many of its
/// bytes go out on the bus, least significant byte first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxWidth {
    OneByte,
    TwoBytes,
    ThreeBytes,
    Word,
}


impl TxWidth {
    pub const fn bytes(self) -> usize {
        match self {
            TxWidth::OneByte => 1,
            TxWidth::TwoBytes => 2,
            TxWidth::ThreeBytes => 3,
            TxWidth::Word => 4,
        }
    }
}

/// The controller registers the driver uses.
///
/// [`QspiRegisters`] behind a [`StaticRef`] is the memory-mapped controller.
/// Any other block works as long as its registers implement the
/// `tock-registers` interfaces.
pub trait QspiRegisterBlock {
    type Control<N: RegisterLongName>: Readable<T = u32, R = N> + Writeable<T = u32, R = N>;
    type Status: Readable<T = u32, R = INT_STS::Register>;
    type TxData: Writeable<T = u32, R = ()>;
    type RxData: Readable<T = u32, R = ()>;

    fn config(&self) -> &Self::Control<CONFIG::Register>;
    fn int_sts(&self) -> &Self::Status;
    fn en(&self) -> &Self::Control<EN::Register>;
    fn tx_thres(&self) -> &Self::Control<()>;
    fn rx_thres(&self) -> &Self::Control<()>;
    fn lqspi_cfg(&self) -> &Self::Control<LQSPI_CFG::Register>;
    /// Transmit data port for frames of `width`.
    fn txd(&self, width: TxWidth) -> &Self::TxData;
    fn rx_data(&self) -> &Self::RxData;
}

impl QspiRegisterBlock for StaticRef<QspiRegisters> {
    type Control<N: RegisterLongName> = ReadWrite<u32, N>;
    type Status = ReadWrite<u32, INT_STS::Register>;
    type TxData = WriteOnly<u32>;
    type RxData = ReadOnly<u32>;

    fn config(&self) -> &ReadWrite<u32, CONFIG::Register> {
        &self.config
    }

    fn int_sts(&self) -> &ReadWrite<u32, INT_STS::Register> {
        &self.int_sts
    }

    fn en(&self) -> &ReadWrite<u32, EN::Register> {
        &self.en
    }

    fn tx_thres(&self) -> &ReadWrite<u32> {
        &self.tx_thres
    }

    fn rx_thres(&self) -> &ReadWrite<u32> {
        &self.rx_thres
    }

    fn lqspi_cfg(&self) -> &ReadWrite<u32, LQSPI_CFG::Register> {
        &self.lqspi_cfg
    }

    fn txd(&self, width: TxWidth) -> &WriteOnly<u32> {
        match width {
            TxWidth::OneByte => &self.txd1,
            TxWidth::TwoBytes => &self.txd2,
            TxWidth::ThreeBytes => &self.txd3,
            TxWidth::Word => &self.txd0,
        }
    }

    fn rx_data(&self) -> &ReadOnly<u32> {
        &self.rx_data
    }
}

/// Controller handle. There is one per physical controller and it is never
/// shared: every operation borrows it mutably.
pub struct Qspi<Q: QspiRegisterBlock, S: SlcrRegisterBlock> {
    registers: Q,
    slcr: S,
    config: Config,
    shadow: LocalRegisterCopy<u32, CONFIG::Register>,
}

impl<Q: QspiRegisterBlock, S: SlcrRegisterBlock> Qspi<Q, S> {
    pub const fn new(registers: Q, slcr: S, config: Config) -> Self {
        Qspi {
            registers,
            slcr,
            config,
            shadow: LocalRegisterCopy::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The value last written to the configuration register.
    pub fn shadow(&self) -> u32 {
        self.shadow.get()
    }

    /// Whether software starts transfers and drives chip select. False until
    /// [`Qspi::init`] has run.
    pub fn manual_mode(&self) -> bool {
        self.shadow.is_set(CONFIG::MAN_START_EN) && self.shadow.is_set(CONFIG::MANUAL_CS)
    }

    /// Resets and configures the controller for flash I/O mode.
    ///
    /// With `manual_mode` the driver owns chip select and starts every
    /// transfer itself, which the streaming read and page program require.
    pub fn init(&mut self, manual_mode: bool) {
        self.registers.en().write(EN::ENABLE::CLEAR);
        slcr::reset_qspi_clocks(&self.slcr);

        let start_mode = if manual_mode {
            CONFIG::MAN_START_EN::SET + CONFIG::MANUAL_CS::SET
        } else {
            CONFIG::MAN_START_EN::CLEAR + CONFIG::MANUAL_CS::CLEAR
        };
        let setup = CONFIG::IFMODE::FlashMemory
            + start_mode
            + CONFIG::PCS::Deasserted
            + CONFIG::FIFO_WIDTH::Width32
            + CONFIG::MODE_SEL::Master
            + CONFIG::HOLDB_DR::SET
            + CONFIG::BAUD_RATE_DIV.val(self.config.baud_rate_div as u32)
            + CONFIG::CLK_PH::SET
            + CONFIG::CLK_POL::SET
            + CONFIG::RESERVED.val(0)
            + CONFIG::ENDIAN::Little
            + CONFIG::REF_CLK::CLEAR
            + CONFIG::MAN_START_COM::CLEAR;

        self.shadow.set(self.registers.config().get());
        self.shadow.modify(setup);
        self.configure();
        debug!("qspi: config {:#010x}", self.shadow.get());
    }

    /// Brings a freshly reset controller up from the shadow: thresholds at
    /// one word, linear mode off, configuration written, controller enabled.
    fn configure(&mut self) {
        self.set_rx_threshold(1);
        self.set_tx_threshold(1);
        self.registers.lqspi_cfg().modify(LQSPI_CFG::LQ_MODE::CLEAR);
        self.write_config();
        self.registers.en().write(EN::ENABLE::SET);
    }

    /// Resets the controller after an aborted transfer. Whatever either FIFO
    /// still holds is dropped and the configuration is restored from the
    /// shadow with chip select released.
    pub(crate) fn recover(&mut self) {
        warn!("qspi: resetting controller after aborted transfer");
        self.registers.en().write(EN::ENABLE::CLEAR);
        slcr::reset_qspi_clocks(&self.slcr);
        self.shadow
            .modify(CONFIG::PCS::Deasserted + CONFIG::MAN_START_COM::CLEAR);
        self.configure();
    }

    pub fn cs_on(&mut self) {
        self.shadow
            .modify(CONFIG::PCS::Asserted + CONFIG::MAN_START_COM::CLEAR);
        self.write_config();
    }

    pub fn cs_off(&mut self) {
        self.shadow
            .modify(CONFIG::PCS::Deasserted + CONFIG::MAN_START_COM::CLEAR);
        self.write_config();
    }

    /// Starts shifting out whatever is in the transmit FIFO.
    pub fn start_transfer(&mut self) {
        self.shadow.modify(CONFIG::MAN_START_COM::SET);
        self.write_config();
    }

    fn write_config(&self) {
        self.registers.config().set(self.shadow.get());
    }

    /// Runs `f` with chip select asserted. Chip select is released on every
    /// path out of `f`. If `f` fails the controller is also reset, so no
    /// half-finished transfer is left in the FIFOs for the next command.
    pub(crate) fn transaction<T, F>(&mut self, f: F) -> Result<T, ErrorCode>
    where
        F: FnOnce(&mut Self) -> Result<T, ErrorCode>,
    {
        self.cs_on();
        let result = f(self);
        self.cs_off();
        if result.is_err() {
            self.recover();
        }
        result
    }

    pub(crate) fn set_rx_threshold(&self, words: usize) {
        self.registers.rx_thres().set(words as u32);
    }

    pub(crate) fn set_tx_threshold(&self, words: usize) {
        self.registers.tx_thres().set(words as u32);
    }

    /// Fresh snapshot of the interrupt status register.
    pub(crate) fn interrupt_status(&self) -> LocalRegisterCopy<u32, INT_STS::Register> {
        self.registers.int_sts().extract()
    }

    pub(crate) fn push(&self, width: TxWidth, word: u32) {
        self.registers.txd(width).set(word);
    }

    /// Pushes `count` filler words, each clocking one word in.
    pub(crate) fn fill_tx_fifo(&self, count: usize) {
        for _ in 0..count {
            self.push(TxWidth::Word, 0);
        }
    }

    pub(crate) fn write_tx_fifo<I: IntoIterator<Item = u32>>(&self, words: I) {
        for word in words {
            self.push(TxWidth::Word, word);
        }
    }

    pub(crate) fn pop_rx(&self) -> u32 {
        self.registers.rx_data().get()
    }

    pub(crate) fn read_rx_fifo(&self, dst: &mut [u32]) {
        for word in dst.iter_mut() {
            *word = self.pop_rx();
        }
    }

    /// Discards everything the receive FIFO holds.
    pub(crate) fn flush_rx_fifo(&self) {
        self.set_rx_threshold(1);
        let mut discarded = 0;
        while self
            .interrupt_status()
            .is_set(INT_STS::RX_FIFO_NOT_EMPTY)
        {
            self.pop_rx();
            discarded += 1;
        }
        trace!("qspi: flushed {} rx words", discarded);
    }

    /// Fails with `BUSY` once `polls` reaches the configured limit.
    pub(crate) fn check_poll_budget(&self, polls: u32, what: &str) -> Result<(), ErrorCode> {
        match self.config.poll_limit {
            Some(limit) if polls >= limit => {
                warn!("qspi: gave up waiting for {} after {} polls", what, polls);
                Err(ErrorCode::BUSY)
            }
            _ => Ok(()),
        }
    }

    /// Calls `ready` until it returns true or the poll budget runs out.
    pub(crate) fn poll<F>(&mut self, what: &str, mut ready: F) -> Result<(), ErrorCode>
    where
        F: FnMut(&mut Self) -> Result<bool, ErrorCode>,
    {
        let mut polls: u32 = 0;
        loop {
            if ready(self)? {
                return Ok(());
            }
            polls = polls.saturating_add(1);
            self.check_poll_budget(polls, what)?;
        }
    }

    /// Spins until `flag` reads as set.
    pub(crate) fn wait_for(&mut self, flag: Field<u32, INT_STS::Register>) -> Result<(), ErrorCode> {
        self.poll("interrupt status", |qspi| {
            Ok(qspi.interrupt_status().is_set(flag))
        })
    }
}
