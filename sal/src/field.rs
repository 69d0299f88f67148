// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Bitfields within 16-bit register words.

use std::fmt;

use crate::SwitchError;
use crate::SwitchResult;

/// Width of every register on the management bus.
pub const REG_WIDTH: u8 = 16;

/// Describes a field of `width` bits starting at bit `offset` of register
/// `reg`.  For fields of an indirect register, `reg` is the pointer used to
/// reach it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegField {
    pub reg: u8,
    pub offset: u8,
    pub width: u8,
}

impl RegField {
    /// Build a field descriptor.  Intended for `const` items, where an
    /// out-of-range field fails the build.
    pub const fn new(reg: u8, offset: u8, width: u8) -> Self {
        assert!(width > 0 && offset as u16 + width as u16 <= REG_WIDTH as u16);
        RegField { reg, offset, width }
    }

    /// Build a field descriptor from values only known at runtime.
    pub fn try_new(reg: u8, offset: u8, width: u8) -> SwitchResult<Self> {
        check_range(offset, width)?;
        Ok(RegField { reg, offset, width })
    }

    /// A one-bit field.
    pub const fn bit(reg: u8, bit: u8) -> Self {
        RegField::new(reg, bit, 1)
    }

    /// The field's bits, in place within the register word.
    pub const fn mask(&self) -> u16 {
        value_mask(self.width) << self.offset
    }

    /// The largest value the field can hold.
    pub const fn max(&self) -> u16 {
        value_mask(self.width)
    }

    /// Does `value` fit in the field without truncation?
    pub const fn fits(&self, value: u16) -> bool {
        value <= self.max()
    }

    /// Pull the field's value out of a register word.
    pub const fn extract(&self, word: u16) -> u16 {
        (word & self.mask()) >> self.offset
    }

    /// Replace the field's bits in `word` with `value`, leaving every other
    /// bit untouched.  Bits of `value` beyond the field's width are dropped.
    pub const fn insert(&self, word: u16, value: u16) -> u16 {
        let mask = self.mask();
        (word & !mask) | ((value << self.offset) & mask)
    }

    /// Like [`RegField::insert`], but refuses values that would be
    /// truncated.
    pub fn insert_checked(&self, word: u16, value: u16) -> SwitchResult<u16> {
        if !self.fits(value) {
            return Err(SwitchError::BadParam(format!(
                "value {value:#x} exceeds {self}"
            )));
        }
        Ok(self.insert(word, value))
    }
}

impl fmt::Display for RegField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width == 1 {
            write!(f, "reg {:#04x} bit {}", self.reg, self.offset)
        } else {
            write!(
                f,
                "reg {:#04x} bits {}:{}",
                self.reg,
                self.offset + self.width - 1,
                self.offset
            )
        }
    }
}

// Shifting a u16 by 16 overflows, so a full-width field is special-cased.
const fn value_mask(width: u8) -> u16 {
    if width >= REG_WIDTH {
        u16::MAX
    } else {
        (1u16 << width) - 1
    }
}

fn check_range(offset: u8, width: u8) -> SwitchResult<()> {
    if width == 0 || offset as u16 + width as u16 > REG_WIDTH as u16 {
        Err(SwitchError::BadParam(format!(
            "field of {width} bits at offset {offset} does not fit a \
             {REG_WIDTH}-bit register"
        )))
    } else {
        Ok(())
    }
}

/// Extract the `width`-bit field at `offset` from `word`.
pub fn extract(word: u16, offset: u8, width: u8) -> SwitchResult<u16> {
    check_range(offset, width)?;
    Ok((word >> offset) & value_mask(width))
}

/// Insert `value` as the `width`-bit field at `offset` of `word`.
pub fn insert(word: u16, offset: u8, width: u8, value: u16) -> SwitchResult<u16> {
    check_range(offset, width)?;
    let mask = value_mask(width) << offset;
    Ok((word & !mask) | ((value << offset) & mask))
}
