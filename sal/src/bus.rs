// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use crate::field::RegField;
use crate::SwitchResult;

/// Access to the registers of one management bus.  A register is addressed
/// by the SMI device address that answers for it and its 5-bit register
/// address within that device.
///
/// Implementations are supplied by the platform and must be shareable
/// between threads; serialising multi-transaction sequences is the caller's
/// job, not the bus's.
pub trait SmiBus: Send + Sync {
    /// Read one 16-bit register.
    fn read(&self, dev: u8, reg: u8) -> SwitchResult<u16>;

    /// Write one 16-bit register.
    fn write(&self, dev: u8, reg: u8, value: u16) -> SwitchResult<()>;

    /// Read a single field of a register.
    fn read_field(&self, dev: u8, field: RegField) -> SwitchResult<u16> {
        Ok(field.extract(self.read(dev, field.reg)?))
    }

    /// Update a single field of a register, preserving the rest of the word.
    fn write_field(
        &self,
        dev: u8,
        field: RegField,
        value: u16,
    ) -> SwitchResult<()> {
        let old = self.read(dev, field.reg)?;
        let new = field.insert_checked(old, value)?;
        self.write(dev, field.reg, new)
    }

    /// Performs a read-modify-write operation on a register.
    fn modify(
        &self,
        dev: u8,
        reg: u8,
        f: &dyn Fn(&mut u16),
    ) -> SwitchResult<()> {
        let mut data = self.read(dev, reg)?;
        f(&mut data);
        self.write(dev, reg, data)
    }
}
