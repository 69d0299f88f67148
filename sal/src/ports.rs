// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::SwitchError;
use crate::SwitchResult;

/// Largest VLAN ID a port may default to.
pub const VID_MAX: u16 = 0xfff;

/// The 802.1D forwarding state of a port.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    #[default]
    Disabled,
    Blocking,
    Learning,
    Forwarding,
}

impl From<PortState> for u16 {
    fn from(s: PortState) -> Self {
        match s {
            PortState::Disabled => 0,
            PortState::Blocking => 1,
            PortState::Learning => 2,
            PortState::Forwarding => 3,
        }
    }
}

impl TryFrom<u16> for PortState {
    type Error = SwitchError;

    fn try_from(v: u16) -> SwitchResult<Self> {
        match v {
            0 => Ok(PortState::Disabled),
            1 => Ok(PortState::Blocking),
            2 => Ok(PortState::Learning),
            3 => Ok(PortState::Forwarding),
            x => Err(SwitchError::Internal(format!("invalid port state {x}"))),
        }
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::Disabled => write!(f, "disabled"),
            PortState::Blocking => write!(f, "blocking"),
            PortState::Learning => write!(f, "learning"),
            PortState::Forwarding => write!(f, "forwarding"),
        }
    }
}

/// Which directions of 802.3x pause (or priority flow control) a port
/// honours.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FlowCtrlMode {
    #[default]
    RxTx,
    RxOnly,
    TxOnly,
    Pfc,
}

impl From<FlowCtrlMode> for u16 {
    fn from(m: FlowCtrlMode) -> Self {
        match m {
            FlowCtrlMode::RxTx => 0,
            FlowCtrlMode::RxOnly => 1,
            FlowCtrlMode::TxOnly => 2,
            FlowCtrlMode::Pfc => 3,
        }
    }
}

impl TryFrom<u16> for FlowCtrlMode {
    type Error = SwitchError;

    fn try_from(v: u16) -> SwitchResult<Self> {
        match v {
            0 => Ok(FlowCtrlMode::RxTx),
            1 => Ok(FlowCtrlMode::RxOnly),
            2 => Ok(FlowCtrlMode::TxOnly),
            3 => Ok(FlowCtrlMode::Pfc),
            x => Err(SwitchError::Internal(format!(
                "invalid flow control mode {x}"
            ))),
        }
    }
}

/// Flow control configuration for a port.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct FlowCtrl {
    pub enabled: bool,
    pub mode: FlowCtrlMode,
}
