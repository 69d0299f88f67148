// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Multi-chip addressing mode.
//!
//! A switch strapped for multi-chip mode answers at a single SMI address and
//! exposes only two registers there: SMI Command and SMI Data.  Every other
//! register is reached by writing its device and register address into the
//! command register, the same way as any other indirect window.

use std::sync::Arc;
use std::time::Duration;

use slog::o;
use slog::Logger;

use sal::RegField;
use sal::SmiBus;
use sal::SwitchError;
use sal::SwitchResult;

use crate::config::CHIP_ADDR_MAX;
use crate::indirect::IndirectWindow;
use crate::indirect::Target;
use crate::indirect::WindowLayout;
use crate::poll::RetryPolicy;

const SMI_CMD: u8 = 0x00;
const SMI_DATA: u8 = 0x01;

/// Clause 22 frame format
const SMI_MODE_C22: RegField = RegField::bit(SMI_CMD, 12);

pub(crate) const SMI_WINDOW: WindowLayout = WindowLayout {
    name: "smi",
    target: Target::Device(0),
    cmd_reg: SMI_CMD,
    data_reg: SMI_DATA,
    busy: RegField::bit(SMI_CMD, 15),
    opcode: RegField::new(SMI_CMD, 10, 2),
    // Device address in bits 9:5, register in bits 4:0
    pointer: RegField::new(SMI_CMD, 0, 10),
    fixed: SMI_MODE_C22.mask(),
    read_op: 0b10,
    write_op: 0b01,
    data: RegField::new(SMI_DATA, 0, 16),
    attempts: 16,
};

/// A bus onto one switch in multi-chip mode, layered over the bus shared by
/// every chip on the MDIO segment.
pub struct MultiChipBus {
    inner: Arc<dyn SmiBus>,
    chip_addr: u8,
    window: IndirectWindow,
}

impl MultiChipBus {
    pub fn new(
        log: &Logger,
        inner: Arc<dyn SmiBus>,
        chip_addr: u8,
        policy: RetryPolicy,
        lock_timeout: Option<Duration>,
    ) -> SwitchResult<Self> {
        if chip_addr > CHIP_ADDR_MAX {
            return Err(SwitchError::BadParam(format!(
                "chip address {chip_addr} out of range"
            )));
        }
        let layout = WindowLayout {
            target: Target::Device(chip_addr),
            ..SMI_WINDOW
        };
        let log = log.new(o!("chip_addr" => chip_addr));
        Ok(MultiChipBus {
            inner,
            chip_addr,
            window: IndirectWindow::new(&log, layout, policy, lock_timeout),
        })
    }

    pub fn chip_addr(&self) -> u8 {
        self.chip_addr
    }

    fn pointer(dev: u8, reg: u8) -> SwitchResult<u16> {
        if dev > 0x1f || reg > 0x1f {
            return Err(SwitchError::BadParam(format!(
                "smi address {dev:#x}/{reg:#x} out of range"
            )));
        }
        Ok((u16::from(dev) << 5) | u16::from(reg))
    }
}

impl SmiBus for MultiChipBus {
    fn read(&self, dev: u8, reg: u8) -> SwitchResult<u16> {
        let ptr = Self::pointer(dev, reg)?;
        self.window.read(self.inner.as_ref(), self.chip_addr, ptr)
    }

    fn write(&self, dev: u8, reg: u8, value: u16) -> SwitchResult<()> {
        let ptr = Self::pointer(dev, reg)?;
        self.window
            .write(self.inner.as_ref(), self.chip_addr, ptr, value)
    }
}
