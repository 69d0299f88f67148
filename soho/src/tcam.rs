// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! TCAM range-check units.  Each unit is three words behind the TCAM
//! window at pointer `(unit << 2) | word`: low bound, high bound, control.

use slog::debug;

use sal::RangeCheck;
use sal::RangeField;
use sal::RegField;
use sal::SwitchError;
use sal::SwitchResult;

use crate::family::Core;
use crate::indirect::IndirectWindow;
use crate::indirect::Target;

const LOW: u8 = 0;
const HIGH: u8 = 1;
const CTRL: u8 = 2;

const CTRL_ENABLE: RegField = RegField::bit(CTRL, 15);
const CTRL_FIELD: RegField = RegField::new(CTRL, 0, 2);

fn unit_pointer(unit: u8, word: u8) -> u16 {
    (u16::from(unit) << 2) | u16::from(word)
}

pub fn encode(check: &RangeCheck) -> SwitchResult<[u16; 3]> {
    if check.low > check.high {
        return Err(SwitchError::BadParam(format!(
            "range low bound {} above high bound {}",
            check.low, check.high
        )));
    }
    let ctrl = CTRL_ENABLE.insert(0, check.enabled.into());
    let ctrl = CTRL_FIELD.insert(ctrl, check.field.into());
    Ok([check.low, check.high, ctrl])
}

pub fn decode(words: &[u16; 3]) -> SwitchResult<RangeCheck> {
    let ctrl = words[CTRL as usize];
    Ok(RangeCheck {
        enabled: CTRL_ENABLE.extract(ctrl) != 0,
        field: RangeField::try_from(CTRL_FIELD.extract(ctrl))?,
        low: words[LOW as usize],
        high: words[HIGH as usize],
    })
}

// The window and device address for `unit`, once the unit is known to exist.
fn unit_window(
    core: &Core,
    unit: u8,
) -> SwitchResult<(&IndirectWindow, u8)> {
    let (window, layout) = core.tcam.as_ref().ok_or(SwitchError::NotSupported)?;
    if unit >= layout.range_units {
        return Err(SwitchError::BadParam(format!(
            "range check unit {unit} out of range ({} units)",
            layout.range_units
        )));
    }
    match window.layout().target {
        Target::Device(addr) => Ok((window, addr)),
        Target::Port => Err(SwitchError::Internal(
            "tcam window must be device-wide".to_string(),
        )),
    }
}

pub fn range_check_get(core: &Core, unit: u8) -> SwitchResult<RangeCheck> {
    let (window, dev) = unit_window(core, unit)?;
    let mut guard = window.lock(core.bus.as_ref())?;
    let mut words = [0u16; 3];
    for word in [LOW, HIGH, CTRL] {
        words[word as usize] = guard.read(dev, unit_pointer(unit, word))?;
    }
    decode(&words)
}

pub fn range_check_set(
    core: &Core,
    unit: u8,
    check: &RangeCheck,
) -> SwitchResult<()> {
    let (window, dev) = unit_window(core, unit)?;
    let words = encode(check)?;
    let mut guard = window.lock(core.bus.as_ref())?;
    // Bounds first, so enabling a unit never exposes stale bounds.
    for word in [LOW, HIGH, CTRL] {
        guard.write(dev, unit_pointer(unit, word), words[word as usize])?;
    }
    debug!(core.log, "range check set"; "unit" => unit, "check" => ?check);
    Ok(())
}
