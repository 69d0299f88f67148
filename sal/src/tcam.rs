// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

use serde::Deserialize;
use serde::Serialize;

use crate::SwitchError;
use crate::SwitchResult;

/// The frame field a TCAM range-check unit compares.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RangeField {
    #[default]
    SrcPort,
    DstPort,
    VlanId,
    FrameLength,
}

impl From<RangeField> for u16 {
    fn from(f: RangeField) -> Self {
        match f {
            RangeField::SrcPort => 0,
            RangeField::DstPort => 1,
            RangeField::VlanId => 2,
            RangeField::FrameLength => 3,
        }
    }
}

impl TryFrom<u16> for RangeField {
    type Error = SwitchError;

    fn try_from(v: u16) -> SwitchResult<Self> {
        match v {
            0 => Ok(RangeField::SrcPort),
            1 => Ok(RangeField::DstPort),
            2 => Ok(RangeField::VlanId),
            3 => Ok(RangeField::FrameLength),
            x => Err(SwitchError::Internal(format!("invalid range field {x}"))),
        }
    }
}

/// A range-check unit sets its TCAM key bit when `field` lies within
/// `[low, high]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeCheck {
    pub enabled: bool,
    pub field: RangeField,
    pub low: u16,
    pub high: u16,
}
