// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! 802.1Qci stream filter, stream gate and flow meter tables.
//!
//! Each entry is a short run of 16-bit words behind the QCI window, at
//! pointer `(table << 10) | (index << 3) | word`.  One word of every entry
//! carries a valid bit; an entry whose valid bit is clear is unused.

use slog::debug;

use sal::ColorMode;
use sal::FlowMeter;
use sal::GateState;
use sal::QciId;
use sal::RegField;
use sal::StreamFilter;
use sal::StreamGate;
use sal::SwitchError;
use sal::SwitchResult;

use crate::family::Core;
use crate::family::QciLayout;
use crate::indirect::IndirectWindow;
use crate::indirect::Target;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Table {
    Filter = 0,
    Gate = 1,
    Meter = 2,
}

// In the field definitions below, `reg` is the word index within the entry.

const F_VALID: RegField = RegField::bit(0, 15);
const F_HANDLE_EN: RegField = RegField::bit(0, 14);
const F_HANDLE: RegField = RegField::new(0, 0, 12);
const F_PRIO_EN: RegField = RegField::bit(1, 15);
const F_PRIO: RegField = RegField::new(1, 12, 3);
const F_GATE: RegField = RegField::new(1, 0, 7);
const F_METER_EN: RegField = RegField::bit(2, 15);
const F_METER: RegField = RegField::new(2, 0, 7);
const F_BLOCK: RegField = RegField::bit(3, 15);
const F_MAX_SDU: RegField = RegField::new(3, 0, 14);
const FILTER_WORDS: usize = 4;

const G_VALID: RegField = RegField::bit(0, 15);
const G_CLOSED: RegField = RegField::bit(0, 14);
const G_IPV_EN: RegField = RegField::bit(0, 13);
const G_IPV: RegField = RegField::new(0, 0, 3);
const G_CLOSE_INVALID: RegField = RegField::bit(1, 0);
const G_CLOSE_OCTETS: RegField = RegField::bit(1, 1);
const GATE_WORDS: usize = 2;

const M_CIR_LO: RegField = RegField::new(0, 0, 16);
const M_CIR_HI: RegField = RegField::new(1, 0, 8);
const M_CBS: RegField = RegField::new(2, 0, 16);
const M_EIR_LO: RegField = RegField::new(3, 0, 16);
const M_EIR_HI: RegField = RegField::new(4, 0, 8);
const M_EBS: RegField = RegField::new(5, 0, 16);
const M_VALID: RegField = RegField::bit(6, 15);
const M_COUPLING: RegField = RegField::bit(6, 0);
const M_COLOR_AWARE: RegField = RegField::bit(6, 1);
const M_DROP_YELLOW: RegField = RegField::bit(6, 2);
const METER_WORDS: usize = 7;

/// Largest committed or excess information rate
pub const RATE_MAX: u32 = 0xff_ffff;

fn entry_pointer(table: Table, index: QciId, word: u8) -> u16 {
    ((table as u16) << 10) | (index << 3) | u16::from(word)
}

fn get(words: &[u16], field: RegField) -> u16 {
    field.extract(words[field.reg as usize])
}

fn set(
    words: &mut [u16],
    field: RegField,
    value: u16,
    what: &str,
) -> SwitchResult<()> {
    let w = &mut words[field.reg as usize];
    *w = field.insert_checked(*w, value).map_err(|_| {
        SwitchError::BadParam(format!("{what} {value} out of range"))
    })?;
    Ok(())
}

fn check_id(what: &str, id: QciId, size: u16) -> SwitchResult<()> {
    if id >= size {
        Err(SwitchError::BadParam(format!(
            "{what} {id} out of range (table has {size} entries)"
        )))
    } else {
        Ok(())
    }
}

fn check_rate(what: &str, rate: u32) -> SwitchResult<()> {
    if rate > RATE_MAX {
        Err(SwitchError::BadParam(format!("{what} {rate} exceeds 24 bits")))
    } else {
        Ok(())
    }
}

pub fn encode_filter(
    filter: &StreamFilter,
    layout: &QciLayout,
) -> SwitchResult<[u16; FILTER_WORDS]> {
    check_id("gate id", filter.gate_id, layout.gates)?;
    let mut w = [0u16; FILTER_WORDS];
    set(&mut w, F_VALID, 1, "valid")?;
    if let Some(handle) = filter.stream_handle {
        set(&mut w, F_HANDLE_EN, 1, "handle enable")?;
        set(&mut w, F_HANDLE, handle, "stream handle")?;
    }
    if let Some(prio) = filter.priority {
        set(&mut w, F_PRIO_EN, 1, "priority enable")?;
        set(&mut w, F_PRIO, prio.into(), "priority")?;
    }
    set(&mut w, F_GATE, filter.gate_id, "gate id")?;
    if let Some(meter) = filter.meter_id {
        check_id("meter id", meter, layout.meters)?;
        set(&mut w, F_METER_EN, 1, "meter enable")?;
        set(&mut w, F_METER, meter, "meter id")?;
    }
    set(&mut w, F_BLOCK, filter.block_oversize.into(), "block")?;
    set(&mut w, F_MAX_SDU, filter.max_sdu, "max sdu")?;
    Ok(w)
}

pub fn decode_filter(w: &[u16; FILTER_WORDS]) -> StreamFilter {
    StreamFilter {
        stream_handle: (get(w, F_HANDLE_EN) != 0).then(|| get(w, F_HANDLE)),
        priority: (get(w, F_PRIO_EN) != 0).then(|| get(w, F_PRIO) as u8),
        gate_id: get(w, F_GATE),
        meter_id: (get(w, F_METER_EN) != 0).then(|| get(w, F_METER)),
        max_sdu: get(w, F_MAX_SDU),
        block_oversize: get(w, F_BLOCK) != 0,
    }
}

pub fn encode_gate(gate: &StreamGate) -> SwitchResult<[u16; GATE_WORDS]> {
    let mut w = [0u16; GATE_WORDS];
    set(&mut w, G_VALID, 1, "valid")?;
    let closed = gate.initial_state == GateState::Closed;
    set(&mut w, G_CLOSED, closed.into(), "state")?;
    if let Some(ipv) = gate.initial_ipv {
        set(&mut w, G_IPV_EN, 1, "ipv enable")?;
        set(&mut w, G_IPV, ipv.into(), "ipv")?;
    }
    set(&mut w, G_CLOSE_INVALID, gate.close_on_invalid_rx.into(), "flag")?;
    set(&mut w, G_CLOSE_OCTETS, gate.close_on_octets_exceeded.into(), "flag")?;
    Ok(w)
}

pub fn decode_gate(w: &[u16; GATE_WORDS]) -> StreamGate {
    StreamGate {
        initial_state: if get(w, G_CLOSED) != 0 {
            GateState::Closed
        } else {
            GateState::Open
        },
        initial_ipv: (get(w, G_IPV_EN) != 0).then(|| get(w, G_IPV) as u8),
        close_on_invalid_rx: get(w, G_CLOSE_INVALID) != 0,
        close_on_octets_exceeded: get(w, G_CLOSE_OCTETS) != 0,
    }
}

pub fn encode_meter(meter: &FlowMeter) -> SwitchResult<[u16; METER_WORDS]> {
    check_rate("cir", meter.cir)?;
    check_rate("eir", meter.eir)?;
    let mut w = [0u16; METER_WORDS];
    set(&mut w, M_CIR_LO, meter.cir as u16, "cir")?;
    set(&mut w, M_CIR_HI, (meter.cir >> 16) as u16, "cir")?;
    set(&mut w, M_CBS, meter.cbs, "cbs")?;
    set(&mut w, M_EIR_LO, meter.eir as u16, "eir")?;
    set(&mut w, M_EIR_HI, (meter.eir >> 16) as u16, "eir")?;
    set(&mut w, M_EBS, meter.ebs, "ebs")?;
    set(&mut w, M_VALID, 1, "valid")?;
    set(&mut w, M_COUPLING, meter.coupling.into(), "coupling")?;
    let aware = meter.color_mode == ColorMode::Aware;
    set(&mut w, M_COLOR_AWARE, aware.into(), "color mode")?;
    set(&mut w, M_DROP_YELLOW, meter.drop_on_yellow.into(), "drop")?;
    Ok(w)
}

pub fn decode_meter(w: &[u16; METER_WORDS]) -> FlowMeter {
    let rate = |lo, hi| u32::from(get(w, lo)) | (u32::from(get(w, hi)) << 16);
    FlowMeter {
        cir: rate(M_CIR_LO, M_CIR_HI),
        cbs: get(w, M_CBS),
        eir: rate(M_EIR_LO, M_EIR_HI),
        ebs: get(w, M_EBS),
        coupling: get(w, M_COUPLING) != 0,
        color_mode: if get(w, M_COLOR_AWARE) != 0 {
            ColorMode::Aware
        } else {
            ColorMode::Blind
        },
        drop_on_yellow: get(w, M_DROP_YELLOW) != 0,
    }
}

fn qci(core: &Core) -> SwitchResult<(&IndirectWindow, &QciLayout)> {
    match &core.qci {
        Some((window, layout)) => Ok((window, layout)),
        None => Err(SwitchError::NotSupported),
    }
}

// Read an entry, starting with its valid word.  Unused entries cost a single
// transaction.
fn read_entry<const N: usize>(
    core: &Core,
    window: &IndirectWindow,
    table: Table,
    id: QciId,
    valid: RegField,
) -> SwitchResult<Option<[u16; N]>> {
    let dev = device(window)?;
    let ptr = |word: usize| entry_pointer(table, id, word as u8);
    let mut guard = window.lock(core.bus.as_ref())?;

    let mut words = [0u16; N];
    let v = valid.reg as usize;
    words[v] = guard.read(dev, ptr(v))?;
    if get(&words, valid) == 0 {
        return Ok(None);
    }
    for (i, word) in words.iter_mut().enumerate() {
        if i != v {
            *word = guard.read(dev, ptr(i))?;
        }
    }
    Ok(Some(words))
}

// Write an entry.  The entry is invalidated first and its valid word goes in
// last, so the hardware never acts on a mix of old and new words.
fn write_entry(
    core: &Core,
    window: &IndirectWindow,
    table: Table,
    id: QciId,
    valid: RegField,
    words: &[u16],
) -> SwitchResult<()> {
    let dev = device(window)?;
    let v = valid.reg as usize;
    let mut guard = window.lock(core.bus.as_ref())?;
    guard.write(
        dev,
        entry_pointer(table, id, v as u8),
        valid.insert(words[v], 0),
    )?;
    for (i, word) in words.iter().enumerate() {
        if i != v {
            guard.write(dev, entry_pointer(table, id, i as u8), *word)?;
        }
    }
    guard.write(dev, entry_pointer(table, id, v as u8), words[v])
}

fn clear_entry(
    core: &Core,
    window: &IndirectWindow,
    table: Table,
    id: QciId,
    valid: RegField,
) -> SwitchResult<()> {
    let dev = device(window)?;
    window.write(
        core.bus.as_ref(),
        dev,
        entry_pointer(table, id, valid.reg),
        0,
    )
}

fn device(window: &IndirectWindow) -> SwitchResult<u8> {
    match window.layout().target {
        Target::Device(addr) => Ok(addr),
        Target::Port => Err(SwitchError::Internal(
            "qci window must be device-wide".to_string(),
        )),
    }
}

pub fn filter_get(core: &Core, id: QciId) -> SwitchResult<Option<StreamFilter>> {
    let (window, layout) = qci(core)?;
    check_id("stream filter", id, layout.filters)?;
    let words = read_entry::<FILTER_WORDS>(core, window, Table::Filter, id, F_VALID)?;
    Ok(words.map(|w| decode_filter(&w)))
}

pub fn filter_set(
    core: &Core,
    id: QciId,
    filter: &StreamFilter,
) -> SwitchResult<()> {
    let (window, layout) = qci(core)?;
    check_id("stream filter", id, layout.filters)?;
    let words = encode_filter(filter, layout)?;
    write_entry(core, window, Table::Filter, id, F_VALID, &words)?;
    debug!(core.log, "stream filter set"; "id" => id, "filter" => ?filter);
    Ok(())
}

pub fn filter_clear(core: &Core, id: QciId) -> SwitchResult<()> {
    let (window, layout) = qci(core)?;
    check_id("stream filter", id, layout.filters)?;
    clear_entry(core, window, Table::Filter, id, F_VALID)
}

pub fn gate_get(core: &Core, id: QciId) -> SwitchResult<Option<StreamGate>> {
    let (window, layout) = qci(core)?;
    check_id("stream gate", id, layout.gates)?;
    let words = read_entry::<GATE_WORDS>(core, window, Table::Gate, id, G_VALID)?;
    Ok(words.map(|w| decode_gate(&w)))
}

pub fn gate_set(core: &Core, id: QciId, gate: &StreamGate) -> SwitchResult<()> {
    let (window, layout) = qci(core)?;
    check_id("stream gate", id, layout.gates)?;
    let words = encode_gate(gate)?;
    write_entry(core, window, Table::Gate, id, G_VALID, &words)?;
    debug!(core.log, "stream gate set"; "id" => id, "gate" => ?gate);
    Ok(())
}

pub fn gate_clear(core: &Core, id: QciId) -> SwitchResult<()> {
    let (window, layout) = qci(core)?;
    check_id("stream gate", id, layout.gates)?;
    clear_entry(core, window, Table::Gate, id, G_VALID)
}

pub fn meter_get(core: &Core, id: QciId) -> SwitchResult<Option<FlowMeter>> {
    let (window, layout) = qci(core)?;
    check_id("flow meter", id, layout.meters)?;
    let words = read_entry::<METER_WORDS>(core, window, Table::Meter, id, M_VALID)?;
    Ok(words.map(|w| decode_meter(&w)))
}

pub fn meter_set(
    core: &Core,
    id: QciId,
    meter: &FlowMeter,
) -> SwitchResult<()> {
    let (window, layout) = qci(core)?;
    check_id("flow meter", id, layout.meters)?;
    let words = encode_meter(meter)?;
    write_entry(core, window, Table::Meter, id, M_VALID, &words)?;
    debug!(core.log, "flow meter set"; "id" => id, "meter" => ?meter);
    Ok(())
}

pub fn meter_clear(core: &Core, id: QciId) -> SwitchResult<()> {
    let (window, layout) = qci(core)?;
    check_id("flow meter", id, layout.meters)?;
    clear_entry(core, window, Table::Meter, id, M_VALID)
}
