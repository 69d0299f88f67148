// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! The switch abstraction layer: the operations, types and errors shared by
//! every supported SOHO switch family.  The per-family implementations live
//! in the `soho` crate.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub mod bus;
pub mod field;

mod ports;
pub use ports::*;

mod qci;
pub use qci::*;

mod tcam;
pub use tcam::*;

pub use bus::SmiBus;
pub use field::RegField;

/// A logical port number, as seen by callers.  Each device maps logical
/// ports onto physical ports, and physical ports onto SMI addresses.
pub type LPort = u8;

/// A specialized Result type for switch operations
pub type SwitchResult<T> = Result<T, SwitchError>;

/// Error type conveying additional information about switch errors
#[derive(Error, Debug)]
pub enum SwitchError {
    /// A transaction on the management bus failed.  Reports the location in
    /// the switch layer along with the platform's description of the failure.
    #[error("bus error at {ctx}: {err}")]
    Bus { ctx: String, err: String },
    /// The hardware never cleared the busy bit of an indirect window within
    /// the retry bound.
    #[error("{window}: busy bit stuck at dev {dev:#04x} reg {reg:#04x}")]
    Timeout {
        window: &'static str,
        dev: u8,
        reg: u8,
    },
    /// The lock guarding an indirect window could not be acquired within the
    /// configured timeout.
    #[error("{window}: timed out waiting for window lock")]
    LockTimeout { window: &'static str },
    /// An argument is out of range for the operation or for this chip.
    /// Indicates misbehavior from the caller.
    #[error("Invalid argument: {}", .0)]
    BadParam(String),
    /// This operation is unsupported by the chip family being used
    #[error("Operation unsupported by this chip family")]
    NotSupported,
    /// The switch reported a product number that matches no known family
    #[error("Unrecognized switch product number: {:#05x}", .0)]
    UnknownFamily(u16),
    /// The device configuration is unusable
    #[error("Invalid configuration: {}", .0)]
    Config(String),
    /// The switch layer detected some internal inconsistency
    #[error("Internal error: {}", .0)]
    Internal(String),
}

impl SwitchError {
    /// Collapse the error into the coarse status taxonomy.
    pub fn status(&self) -> Status {
        match self {
            SwitchError::BadParam(_) => Status::BadParam,
            SwitchError::NotSupported => Status::NotSupported,
            SwitchError::Bus { .. }
            | SwitchError::Timeout { .. }
            | SwitchError::LockTimeout { .. }
            | SwitchError::UnknownFamily(_)
            | SwitchError::Config(_)
            | SwitchError::Internal(_) => Status::Fail,
        }
    }

    /// Convenience for platform bus implementations.
    pub fn bus(ctx: impl ToString, err: impl ToString) -> Self {
        SwitchError::Bus {
            ctx: ctx.to_string(),
            err: err.to_string(),
        }
    }
}

/// The status code every operation ultimately reduces to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    /// Bus failure, timeout, or other failure not attributable to the caller
    Fail,
    /// The caller supplied an out-of-range port, value or mode
    BadParam,
    /// The chip family does not implement the operation
    NotSupported,
}

impl<T> From<&SwitchResult<T>> for Status {
    fn from(r: &SwitchResult<T>) -> Self {
        match r {
            Ok(_) => Status::Ok,
            Err(e) => e.status(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Fail => write!(f, "FAIL"),
            Status::BadParam => write!(f, "BAD_PARAM"),
            Status::NotSupported => write!(f, "NOT_SUPPORTED"),
        }
    }
}

/// The supported switch silicon families.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::EnumString,
    strum::Display,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChipFamily {
    /// 88E6172, 88E6176, 88E6240, 88E6352
    Agate,
    /// 88E6085, 88E6095, 88E6096, 88E6097
    Pearl,
    /// 88E6141, 88E6341
    Topaz,
    /// 88E6190, 88E6290, 88E6390 and their X variants
    Peridot,
    /// 88E6191X, 88E6193X, 88E6393X
    Amethyst,
    /// Automotive switch with 802.1Qci support
    #[serde(rename = "bonsai_z1")]
    #[strum(serialize = "bonsai_z1")]
    BonsaiZ1,
    /// Automotive switch with 802.1Qci support and larger tables
    Fir,
}

impl ChipFamily {
    /// Map the product number from a switch's ID register (bits 15:4) onto
    /// the family it belongs to.
    pub fn from_product_id(product: u16) -> SwitchResult<Self> {
        use strum::IntoEnumIterator;

        ChipFamily::iter()
            .find(|f| f.product_ids().contains(&product))
            .ok_or(SwitchError::UnknownFamily(product))
    }

    /// The product numbers reported by members of this family.
    pub fn product_ids(&self) -> &'static [u16] {
        match self {
            ChipFamily::Agate => &[0x172, 0x176, 0x240, 0x352],
            ChipFamily::Pearl => &[0x04a, 0x095, 0x098, 0x099],
            ChipFamily::Topaz => &[0x340, 0x341],
            ChipFamily::Peridot => &[0x190, 0x290, 0x390, 0x0a0, 0x0a1],
            ChipFamily::Amethyst => &[0x192, 0x193, 0x393],
            ChipFamily::BonsaiZ1 => &[0xa72, 0xa73],
            ChipFamily::Fir => &[0xa12, 0xa15],
        }
    }
}

/// The `SwitchOps` trait contains every named switch-control capability.
/// Each chip family provides one implementation, selected when a device is
/// opened.  A family that lacks a capability leaves the provided method in
/// place, which reports [`SwitchError::NotSupported`].
pub trait SwitchOps: Send + Sync {
    /// The family this implementation drives
    fn family(&self) -> ChipFamily;

    /// Number of logical ports on the device
    fn num_ports(&self) -> u8;

    /// Get the VLAN ID assigned to untagged frames received on a port
    fn port_pvid_get(&self, _port: LPort) -> SwitchResult<u16> {
        Err(SwitchError::NotSupported)
    }

    /// Set the VLAN ID assigned to untagged frames received on a port
    fn port_pvid_set(&self, _port: LPort, _vid: u16) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }

    /// Get a port's forwarding state
    fn port_state_get(&self, _port: LPort) -> SwitchResult<PortState> {
        Err(SwitchError::NotSupported)
    }

    /// Update a port's forwarding state
    fn port_state_set(
        &self,
        _port: LPort,
        _state: PortState,
    ) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }

    /// Get a port's flow control settings
    fn port_flow_ctrl_get(&self, _port: LPort) -> SwitchResult<FlowCtrl> {
        Err(SwitchError::NotSupported)
    }

    /// Update a port's flow control settings
    fn port_flow_ctrl_set(
        &self,
        _port: LPort,
        _fc: FlowCtrl,
    ) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }

    /// Read one 8-bit register behind a port's flow-control window
    fn flow_ctrl_reg_read(
        &self,
        _port: LPort,
        _pointer: u8,
    ) -> SwitchResult<u8> {
        Err(SwitchError::NotSupported)
    }

    /// Write one 8-bit register behind a port's flow-control window
    fn flow_ctrl_reg_write(
        &self,
        _port: LPort,
        _pointer: u8,
        _data: u8,
    ) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }

    /// Read one register behind a port's extended port-control window
    fn ext_port_ctrl_read(
        &self,
        _port: LPort,
        _pointer: u8,
    ) -> SwitchResult<u16> {
        Err(SwitchError::NotSupported)
    }

    /// Write one register behind a port's extended port-control window
    fn ext_port_ctrl_write(
        &self,
        _port: LPort,
        _pointer: u8,
        _data: u16,
    ) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }

    /// Fetch a stream filter, or `None` if the entry is unused
    fn qci_stream_filter_get(
        &self,
        _id: QciId,
    ) -> SwitchResult<Option<StreamFilter>> {
        Err(SwitchError::NotSupported)
    }

    /// Install a stream filter
    fn qci_stream_filter_set(
        &self,
        _id: QciId,
        _filter: &StreamFilter,
    ) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }

    /// Mark a stream filter entry unused
    fn qci_stream_filter_clear(&self, _id: QciId) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }

    /// Fetch a stream gate, or `None` if the entry is unused
    fn qci_stream_gate_get(
        &self,
        _id: QciId,
    ) -> SwitchResult<Option<StreamGate>> {
        Err(SwitchError::NotSupported)
    }

    /// Install a stream gate
    fn qci_stream_gate_set(
        &self,
        _id: QciId,
        _gate: &StreamGate,
    ) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }

    /// Mark a stream gate entry unused
    fn qci_stream_gate_clear(&self, _id: QciId) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }

    /// Fetch a flow meter, or `None` if the entry is unused
    fn qci_flow_meter_get(
        &self,
        _id: QciId,
    ) -> SwitchResult<Option<FlowMeter>> {
        Err(SwitchError::NotSupported)
    }

    /// Install a flow meter
    fn qci_flow_meter_set(
        &self,
        _id: QciId,
        _meter: &FlowMeter,
    ) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }

    /// Mark a flow meter entry unused
    fn qci_flow_meter_clear(&self, _id: QciId) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }

    /// Fetch the configuration of a TCAM range-check unit
    fn tcam_range_check_get(&self, _unit: u8) -> SwitchResult<RangeCheck> {
        Err(SwitchError::NotSupported)
    }

    /// Configure a TCAM range-check unit
    fn tcam_range_check_set(
        &self,
        _unit: u8,
        _check: &RangeCheck,
    ) -> SwitchResult<()> {
        Err(SwitchError::NotSupported)
    }
}
