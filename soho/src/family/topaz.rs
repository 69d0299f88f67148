// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! 88E6141/6341.  The first family with the per-port flow-control and
//! extended port-control windows.

use sal::ChipFamily;
use sal::FlowCtrl;
use sal::LPort;
use sal::PortState;
use sal::SwitchOps;
use sal::SwitchResult;

use super::Core;
use super::EXT_PORT_CTRL_WINDOW;
use super::FLOW_CTRL_FIELDS;
use super::FLOW_CTRL_WINDOW;
use super::Layout;

pub(crate) const LAYOUT: Layout = Layout {
    family: ChipFamily::Topaz,
    port_base: 0x00,
    num_ports: 6,
    flow_ctrl: Some((FLOW_CTRL_WINDOW, FLOW_CTRL_FIELDS)),
    ext_port_ctrl: Some(EXT_PORT_CTRL_WINDOW),
    qci: None,
    tcam: None,
};

pub struct Topaz {
    core: Core,
}

impl Topaz {
    pub fn new(core: Core) -> Self {
        Topaz { core }
    }
}

impl SwitchOps for Topaz {
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
}
