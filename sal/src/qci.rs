// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! 802.1Qci per-stream filtering and policing entries.

use serde::Deserialize;
use serde::Serialize;

/// Identifies an entry within one of the QCI tables.
pub type QciId = u16;

/// A stream filter matches frames by stream handle and priority, and hands
/// them to a stream gate and, optionally, a flow meter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFilter {
    /// Stream handle to match; `None` matches any stream.
    pub stream_handle: Option<u16>,
    /// Priority to match; `None` matches any priority.
    pub priority: Option<u8>,
    /// Gate that frames matching this filter pass through.
    pub gate_id: QciId,
    /// Meter applied to matching frames, if any.
    pub meter_id: Option<QciId>,
    /// Maximum SDU size in octets; 0 disables the check.
    pub max_sdu: u16,
    /// Permanently block the stream after an oversize frame.
    pub block_oversize: bool,
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    #[default]
    Open,
    Closed,
}

/// A stream gate admits or drops frames and may assign them an internal
/// priority value (IPV).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamGate {
    pub initial_state: GateState,
    /// Internal priority assigned to admitted frames; `None` keeps the
    /// frame's own priority.
    pub initial_ipv: Option<u8>,
    pub close_on_invalid_rx: bool,
    pub close_on_octets_exceeded: bool,
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Blind,
    Aware,
}

/// A two-rate, three-color flow meter.  Rates and burst sizes are the raw
/// token values programmed into the hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMeter {
    /// Committed information rate
    pub cir: u32,
    /// Committed burst size
    pub cbs: u16,
    /// Excess information rate
    pub eir: u32,
    /// Excess burst size
    pub ebs: u16,
    pub coupling: bool,
    pub color_mode: ColorMode,
    pub drop_on_yellow: bool,
}
