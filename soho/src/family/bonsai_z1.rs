// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Automotive TSN switch with 802.1Qci.
//!
//! Its windows are slower than those of the other families, so every bound
//! is raised to 16 polls, and its flow-control window and QCI window use
//! their own opcodes.  Flow control sits at pointer 0x08 and, unlike the
//! older families, accepts priority flow control.

use sal::ChipFamily;
use sal::FlowCtrl;
use sal::FlowMeter;
use sal::LPort;
use sal::PortState;
use sal::QciId;
use sal::RangeCheck;
use sal::RegField;
use sal::StreamFilter;
use sal::StreamGate;
use sal::SwitchOps;
use sal::SwitchResult;

use crate::indirect::WindowLayout;
use crate::qci;
use crate::tcam;

use super::Core;
use super::EXT_PORT_CTRL_WINDOW;
use super::FLOW_CTRL_WINDOW;
use super::FlowCtrlFields;
use super::Layout;
use super::QCI_WINDOW;
use super::QciLayout;
use super::TCAM_WINDOW;
use super::TcamLayout;

const FLOW_CTRL: WindowLayout = WindowLayout {
    read_op: 0b11,
    write_op: 0b10,
    attempts: 16,
    ..FLOW_CTRL_WINDOW
};

const FLOW_CTRL_FIELDS: FlowCtrlFields = FlowCtrlFields {
    enable: RegField::bit(0x08, 0),
    mode: RegField::new(0x08, 2, 2),
    pfc: true,
};

const EXT_PORT_CTRL: WindowLayout = WindowLayout {
    attempts: 16,
    ..EXT_PORT_CTRL_WINDOW
};

const QCI: WindowLayout = WindowLayout {
    read_op: 0b100,
    write_op: 0b011,
    ..QCI_WINDOW
};

pub(crate) const LAYOUT: Layout = Layout {
    family: ChipFamily::BonsaiZ1,
    port_base: 0x00,
    num_ports: 11,
    flow_ctrl: Some((FLOW_CTRL, FLOW_CTRL_FIELDS)),
    ext_port_ctrl: Some(EXT_PORT_CTRL),
    qci: Some(QciLayout {
        window: QCI,
        filters: 64,
        gates: 32,
        meters: 64,
    }),
    tcam: Some(TcamLayout {
        window: TCAM_WINDOW,
        range_units: 8,
    }),
};

pub struct BonsaiZ1 {
    core: Core,
}

impl BonsaiZ1 {
    pub fn new(core: Core) -> Self {
        BonsaiZ1 { core }
    }
}

impl SwitchOps for BonsaiZ1 {
    fn family(&self) -> ChipFamily {
        self.core.family()
    }

    fn num_ports(&self) -> u8 {
        self.core.num_ports()
    }

    fn port_pvid_get(&self, port: LPort) -> SwitchResult<u16> {
        self.core.pvid_get(port)
    }

    fn port_pvid_set(&self, port: LPort, vid: u16) -> SwitchResult<()> {
        self.core.pvid_set(port, vid)
    }

    fn port_state_get(&self, port: LPort) -> SwitchResult<PortState> {
        self.core.state_get(port)
    }

    fn port_state_set(&self, port: LPort, state: PortState) -> SwitchResult<()> {
        self.core.state_set(port, state)
    }

    fn port_flow_ctrl_get(&self, port: LPort) -> SwitchResult<FlowCtrl> {
        self.core.flow_ctrl_get(port)
    }

    fn port_flow_ctrl_set(&self, port: LPort, fc: FlowCtrl) -> SwitchResult<()> {
        self.core.flow_ctrl_set(port, fc)
    }

    fn flow_ctrl_reg_read(&self, port: LPort, pointer: u8) -> SwitchResult<u8> {
        self.core.flow_ctrl_reg_read(port, pointer)
    }

    fn flow_ctrl_reg_write(
        &self,
        port: LPort,
        pointer: u8,
        data: u8,
    ) -> SwitchResult<()> {
        self.core.flow_ctrl_reg_write(port, pointer, data)
    }

    fn ext_port_ctrl_read(&self, port: LPort, pointer: u8) -> SwitchResult<u16> {
        self.core.ext_port_ctrl_read(port, pointer)
    }

    fn ext_port_ctrl_write(
        &self,
        port: LPort,
        pointer: u8,
        data: u16,
    ) -> SwitchResult<()> {
        self.core.ext_port_ctrl_write(port, pointer, data)
    }

    fn qci_stream_filter_get(
        &self,
        id: QciId,
    ) -> SwitchResult<Option<StreamFilter>> {
        qci::filter_get(&self.core, id)
    }

    fn qci_stream_filter_set(
        &self,
        id: QciId,
        filter: &StreamFilter,
    ) -> SwitchResult<()> {
        qci::filter_set(&self.core, id, filter)
    }

    fn qci_stream_filter_clear(&self, id: QciId) -> SwitchResult<()> {
        qci::filter_clear(&self.core, id)
    }

    fn qci_stream_gate_get(&self, id: QciId) -> SwitchResult<Option<StreamGate>> {
        qci::gate_get(&self.core, id)
    }

    fn qci_stream_gate_set(
        &self,
        id: QciId,
        gate: &StreamGate,
    ) -> SwitchResult<()> {
        qci::gate_set(&self.core, id, gate)
    }

    fn qci_stream_gate_clear(&self, id: QciId) -> SwitchResult<()> {
        qci::gate_clear(&self.core, id)
    }

    fn qci_flow_meter_get(&self, id: QciId) -> SwitchResult<Option<FlowMeter>> {
        qci::meter_get(&self.core, id)
    }

    fn qci_flow_meter_set(
        &self,
        id: QciId,
        meter: &FlowMeter,
    ) -> SwitchResult<()> {
        qci::meter_set(&self.core, id, meter)
    }

    fn qci_flow_meter_clear(&self, id: QciId) -> SwitchResult<()> {
        qci::meter_clear(&self.core, id)
    }

    fn tcam_range_check_get(&self, unit: u8) -> SwitchResult<RangeCheck> {
        tcam::range_check_get(&self.core, unit)
    }

    fn tcam_range_check_set(
        &self,
        unit: u8,
        check: &RangeCheck,
    ) -> SwitchResult<()> {
        tcam::range_check_set(&self.core, unit, check)
    }
}
