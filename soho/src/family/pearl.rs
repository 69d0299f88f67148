// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! 88E6085/6095/6096/6097.  Register-compatible with Agate for everything
//! driven here, but with eleven ports.

use sal::ChipFamily;
use sal::FlowCtrl;
use sal::LPort;
use sal::PortState;
use sal::SwitchOps;
use sal::SwitchResult;

use super::Core;
use super::Layout;

pub(crate) const LAYOUT: Layout = Layout {
    family: ChipFamily::Pearl,
    port_base: 0x10,
    num_ports: 11,
    flow_ctrl: None,
    ext_port_ctrl: None,
    qci: None,
    tcam: None,
};

pub struct Pearl {
    core: Core,
}

impl Pearl {
    pub fn new(core: Core) -> Self {
        Pearl { core }
    }
}

impl SwitchOps for Pearl {
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
        self.core.direct_flow_ctrl_get(port)
    }

    fn port_flow_ctrl_set(&self, port: LPort, fc: FlowCtrl) -> SwitchResult<()> {
        self.core.direct_flow_ctrl_set(port, fc)
    }
}
