// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Per-family register layouts, and the state and operations they share.
//!
//! Every family type wraps a [`Core`] and implements [`SwitchOps`] by
//! forwarding the capabilities it has to the shared code below, or to its
//! own code where the silicon differs.  Capabilities a family lacks are left
//! to the trait's `NotSupported` defaults.

use std::sync::Arc;

use slog::debug;
use slog::o;
use slog::Logger;

use sal::ChipFamily;
use sal::FlowCtrl;
use sal::FlowCtrlMode;
use sal::LPort;
use sal::PortState;
use sal::RegField;
use sal::SmiBus;
use sal::SwitchError;
use sal::SwitchOps;
use sal::SwitchResult;
use sal::VID_MAX;

use crate::config::DeviceConfig;
use crate::indirect::IndirectWindow;
use crate::indirect::Target;
use crate::indirect::WindowLayout;

mod agate;
mod amethyst;
mod bonsai_z1;
mod fir;
mod pearl;
mod peridot;
mod topaz;

pub use agate::Agate;
pub use amethyst::Amethyst;
pub use bonsai_z1::BonsaiZ1;
pub use fir::Fir;
pub use pearl::Pearl;
pub use peridot::Peridot;
pub use topaz::Topaz;

/// Switch identifier: product number and silicon revision
pub const SWITCH_ID: u8 = 0x03;
pub const PRODUCT_NUM: RegField = RegField::new(SWITCH_ID, 4, 12);
pub const REVISION: RegField = RegField::new(SWITCH_ID, 0, 4);

/// Port control: 802.1D forwarding state
pub const PORT_STATE: RegField = RegField::new(0x04, 0, 2);

/// Default VLAN ID applied to untagged ingress frames
pub const DEFAULT_VID: RegField = RegField::new(0x07, 0, 12);

/// Physical control: forced flow control on families without a
/// flow-control window
pub const PHYS_CTRL: u8 = 0x01;
pub const FC_VALUE: RegField = RegField::bit(PHYS_CTRL, 7);
pub const FC_FORCED: RegField = RegField::bit(PHYS_CTRL, 6);

pub const GLOBAL1_ADDR: u8 = 0x1b;
pub const GLOBAL2_ADDR: u8 = 0x1c;

/// Per-port flow-control window.  Registers behind it are 8 bits wide.
pub(crate) const FLOW_CTRL_WINDOW: WindowLayout = WindowLayout {
    name: "flow_ctrl",
    target: Target::Port,
    cmd_reg: 0x1a,
    data_reg: 0x1b,
    busy: RegField::bit(0x1a, 15),
    opcode: RegField::new(0x1a, 12, 2),
    pointer: RegField::new(0x1a, 0, 7),
    fixed: 0,
    read_op: 0b10,
    write_op: 0b01,
    data: RegField::new(0x1b, 0, 8),
    attempts: 5,
};

/// Per-port extended port-control window.
pub(crate) const EXT_PORT_CTRL_WINDOW: WindowLayout = WindowLayout {
    name: "ext_port_ctrl",
    target: Target::Port,
    cmd_reg: 0x1c,
    data_reg: 0x1d,
    busy: RegField::bit(0x1c, 15),
    opcode: RegField::new(0x1c, 12, 2),
    pointer: RegField::new(0x1c, 0, 8),
    fixed: 0,
    read_op: 0b10,
    write_op: 0b01,
    data: RegField::new(0x1d, 0, 16),
    attempts: 5,
};

/// Device-wide window onto the QCI stream filter, stream gate and flow
/// meter tables.
pub(crate) const QCI_WINDOW: WindowLayout = WindowLayout {
    name: "qci",
    target: Target::Device(0x1e),
    cmd_reg: 0x00,
    data_reg: 0x01,
    busy: RegField::bit(0x00, 15),
    opcode: RegField::new(0x00, 12, 3),
    pointer: RegField::new(0x00, 0, 12),
    fixed: 0,
    read_op: 0b010,
    write_op: 0b001,
    data: RegField::new(0x01, 0, 16),
    attempts: 16,
};

/// Device-wide window onto the TCAM range-check units.
pub(crate) const TCAM_WINDOW: WindowLayout = WindowLayout {
    name: "tcam",
    target: Target::Device(0x1f),
    cmd_reg: 0x18,
    data_reg: 0x19,
    busy: RegField::bit(0x18, 15),
    opcode: RegField::new(0x18, 12, 2),
    pointer: RegField::new(0x18, 0, 8),
    fixed: 0,
    read_op: 0b10,
    write_op: 0b01,
    data: RegField::new(0x19, 0, 16),
    attempts: 16,
};

/// Where flow control lives in the registers behind the flow-control
/// window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowCtrlFields {
    pub enable: RegField,
    pub mode: RegField,
    /// Whether the mode field accepts priority flow control
    pub pfc: bool,
}

pub(crate) const FLOW_CTRL_FIELDS: FlowCtrlFields = FlowCtrlFields {
    enable: RegField::bit(0x10, 7),
    mode: RegField::new(0x10, 0, 2),
    pfc: false,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QciLayout {
    pub window: WindowLayout,
    pub filters: u16,
    pub gates: u16,
    pub meters: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TcamLayout {
    pub window: WindowLayout,
    pub range_units: u8,
}

/// Everything that distinguishes one family's register map from another's,
/// as far as this crate is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub family: ChipFamily,
    /// SMI address of physical port 0.  Port n answers at `port_base + n`.
    pub port_base: u8,
    pub num_ports: u8,
    pub flow_ctrl: Option<(WindowLayout, FlowCtrlFields)>,
    pub ext_port_ctrl: Option<WindowLayout>,
    pub qci: Option<QciLayout>,
    pub tcam: Option<TcamLayout>,
}

impl Layout {
    /// All of the family's indirect windows.
    pub fn windows(&self) -> Vec<WindowLayout> {
        let mut windows = Vec::new();
        if let Some((w, _)) = self.flow_ctrl {
            windows.push(w);
        }
        if let Some(w) = self.ext_port_ctrl {
            windows.push(w);
        }
        if let Some(q) = self.qci {
            windows.push(q.window);
        }
        if let Some(t) = self.tcam {
            windows.push(t.window);
        }
        windows
    }

    /// The SMI addresses of every physical port.
    pub fn port_addrs(&self) -> impl Iterator<Item = u8> {
        let base = self.port_base;
        (0..self.num_ports).map(move |p| base + p)
    }
}

/// Return the register layout of a chip family.
pub fn layout(family: ChipFamily) -> &'static Layout {
    match family {
        ChipFamily::Agate => &agate::LAYOUT,
        ChipFamily::Pearl => &pearl::LAYOUT,
        ChipFamily::Topaz => &topaz::LAYOUT,
        ChipFamily::Peridot => &peridot::LAYOUT,
        ChipFamily::Amethyst => &amethyst::LAYOUT,
        ChipFamily::BonsaiZ1 => &bonsai_z1::LAYOUT,
        ChipFamily::Fir => &fir::LAYOUT,
    }
}

/// Select the implementation for the family `core` was built for.
pub fn build(core: Core) -> Box<dyn SwitchOps> {
    match core.layout.family {
        ChipFamily::Agate => Box::new(Agate::new(core)),
        ChipFamily::Pearl => Box::new(Pearl::new(core)),
        ChipFamily::Topaz => Box::new(Topaz::new(core)),
        ChipFamily::Peridot => Box::new(Peridot::new(core)),
        ChipFamily::Amethyst => Box::new(Amethyst::new(core)),
        ChipFamily::BonsaiZ1 => Box::new(BonsaiZ1::new(core)),
        ChipFamily::Fir => Box::new(Fir::new(core)),
    }
}

/// State shared by all family implementations: the bus, the layout, the
/// logical port map, and one lock-guarded window per indirect register
/// space the family has.
pub struct Core {
    pub(crate) log: Logger,
    pub(crate) bus: Arc<dyn SmiBus>,
    pub(crate) layout: &'static Layout,
    port_map: Vec<u8>,
    flow_ctrl: Option<(IndirectWindow, FlowCtrlFields)>,
    ext_port_ctrl: Option<IndirectWindow>,
    pub(crate) qci: Option<(IndirectWindow, QciLayout)>,
    pub(crate) tcam: Option<(IndirectWindow, TcamLayout)>,
}

impl Core {
    pub fn new(
        log: &Logger,
        bus: Arc<dyn SmiBus>,
        layout: &'static Layout,
        config: &DeviceConfig,
    ) -> SwitchResult<Self> {
        let port_map = match &config.port_map {
            Some(map) => {
                if map.len() > layout.num_ports as usize {
                    return Err(SwitchError::Config(format!(
                        "port map has {} entries, {} has {} ports",
                        map.len(),
                        layout.family,
                        layout.num_ports
                    )));
                }
                if let Some(p) = map.iter().find(|p| **p >= layout.num_ports) {
                    return Err(SwitchError::Config(format!(
                        "port map names physical port {p}, {} has {} ports",
                        layout.family, layout.num_ports
                    )));
                }
                map.clone()
            }
            None => (0..layout.num_ports).collect(),
        };

        let window = |w: WindowLayout| -> SwitchResult<IndirectWindow> {
            let policy = config.retry_policy(w.attempts)?;
            Ok(IndirectWindow::new(log, w, policy, config.lock_timeout()))
        };

        let flow_ctrl = match layout.flow_ctrl {
            Some((w, fields)) => Some((window(w)?, fields)),
            None => None,
        };
        let ext_port_ctrl = match layout.ext_port_ctrl {
            Some(w) => Some(window(w)?),
            None => None,
        };
        let qci = match layout.qci {
            Some(q) => Some((window(q.window)?, q)),
            None => None,
        };
        let tcam = match layout.tcam {
            Some(t) => Some((window(t.window)?, t)),
            None => None,
        };

        Ok(Core {
            log: log.new(o!("unit" => "core")),
            bus,
            layout,
            port_map,
            flow_ctrl,
            ext_port_ctrl,
            qci,
            tcam,
        })
    }

    pub fn family(&self) -> ChipFamily {
        self.layout.family
    }

    pub fn num_ports(&self) -> u8 {
        self.port_map.len() as u8
    }

    /// Map a logical port to the SMI address of its physical port.
    pub fn port_addr(&self, port: LPort) -> SwitchResult<u8> {
        match self.port_map.get(port as usize) {
            Some(phys) => Ok(self.layout.port_base + phys),
            None => {
                debug!(self.log, "bad port"; "port" => port);
                Err(SwitchError::BadParam(format!("no such port: {port}")))
            }
        }
    }

    /// The SMI address at which `window` answers for `port`.
    fn window_addr(
        &self,
        window: &IndirectWindow,
        port: LPort,
    ) -> SwitchResult<u8> {
        match window.layout().target {
            Target::Port => self.port_addr(port),
            Target::Device(addr) => Ok(addr),
        }
    }

    pub fn pvid_get(&self, port: LPort) -> SwitchResult<u16> {
        let addr = self.port_addr(port)?;
        self.bus.read_field(addr, DEFAULT_VID)
    }

    pub fn pvid_set(&self, port: LPort, vid: u16) -> SwitchResult<()> {
        let addr = self.port_addr(port)?;
        if vid > VID_MAX {
            return Err(SwitchError::BadParam(format!("invalid vlan id {vid}")));
        }
        self.bus.write_field(addr, DEFAULT_VID, vid)
    }

    pub fn state_get(&self, port: LPort) -> SwitchResult<PortState> {
        let addr = self.port_addr(port)?;
        PortState::try_from(self.bus.read_field(addr, PORT_STATE)?)
    }

    pub fn state_set(&self, port: LPort, state: PortState) -> SwitchResult<()> {
        let addr = self.port_addr(port)?;
        self.bus.write_field(addr, PORT_STATE, state.into())
    }

    /// Flow control for families that force it through the physical
    /// control register.  Only symmetric flow control is possible there.
    pub fn direct_flow_ctrl_get(&self, port: LPort) -> SwitchResult<FlowCtrl> {
        let addr = self.port_addr(port)?;
        let reg = self.bus.read(addr, PHYS_CTRL)?;
        Ok(FlowCtrl {
            enabled: FC_FORCED.extract(reg) != 0 && FC_VALUE.extract(reg) != 0,
            mode: FlowCtrlMode::RxTx,
        })
    }

    pub fn direct_flow_ctrl_set(
        &self,
        port: LPort,
        fc: FlowCtrl,
    ) -> SwitchResult<()> {
        let addr = self.port_addr(port)?;
        if fc.mode != FlowCtrlMode::RxTx {
            return Err(SwitchError::BadParam(format!(
                "{} supports only rx/tx flow control",
                self.layout.family
            )));
        }
        let value: u16 = fc.enabled.into();
        self.bus.modify(addr, PHYS_CTRL, &|reg| {
            *reg = FC_FORCED.insert(*reg, 1);
            *reg = FC_VALUE.insert(*reg, value);
        })
    }

    fn flow_ctrl_window(
        &self,
    ) -> SwitchResult<&(IndirectWindow, FlowCtrlFields)> {
        self.flow_ctrl.as_ref().ok_or(SwitchError::NotSupported)
    }

    pub fn flow_ctrl_reg_read(
        &self,
        port: LPort,
        pointer: u8,
    ) -> SwitchResult<u8> {
        let (window, _) = self.flow_ctrl_window()?;
        let addr = self.window_addr(window, port)?;
        Ok(window.read(self.bus.as_ref(), addr, pointer.into())? as u8)
    }

    pub fn flow_ctrl_reg_write(
        &self,
        port: LPort,
        pointer: u8,
        data: u8,
    ) -> SwitchResult<()> {
        let (window, _) = self.flow_ctrl_window()?;
        let addr = self.window_addr(window, port)?;
        window.write(self.bus.as_ref(), addr, pointer.into(), data.into())
    }

    /// Flow control settings for families that keep them behind the
    /// flow-control window.
    pub fn flow_ctrl_get(&self, port: LPort) -> SwitchResult<FlowCtrl> {
        let (window, fields) = self.flow_ctrl_window()?;
        let addr = self.window_addr(window, port)?;
        let reg = window.read(self.bus.as_ref(), addr, fields.enable.reg.into())?;
        Ok(FlowCtrl {
            enabled: fields.enable.extract(reg) != 0,
            mode: FlowCtrlMode::try_from(fields.mode.extract(reg))?,
        })
    }

    pub fn flow_ctrl_set(&self, port: LPort, fc: FlowCtrl) -> SwitchResult<()> {
        let (window, fields) = self.flow_ctrl_window()?;
        let addr = self.window_addr(window, port)?;
        if fc.mode == FlowCtrlMode::Pfc && !fields.pfc {
            return Err(SwitchError::BadParam(format!(
                "{} does not support priority flow control",
                self.layout.family
            )));
        }

        // Both fields share one register; hold the window across the
        // read-modify-write.
        let ptr: u16 = fields.enable.reg.into();
        let mut guard = window.lock(self.bus.as_ref())?;
        let reg = guard.read(addr, ptr)?;
        let reg = fields.enable.insert(reg, fc.enabled.into());
        let reg = fields.mode.insert(reg, fc.mode.into());
        guard.write(addr, ptr, reg)
    }

    fn ext_port_ctrl_window(&self) -> SwitchResult<&IndirectWindow> {
        self.ext_port_ctrl.as_ref().ok_or(SwitchError::NotSupported)
    }

    pub fn ext_port_ctrl_read(
        &self,
        port: LPort,
        pointer: u8,
    ) -> SwitchResult<u16> {
        let window = self.ext_port_ctrl_window()?;
        let addr = self.window_addr(window, port)?;
        window.read(self.bus.as_ref(), addr, pointer.into())
    }

    pub fn ext_port_ctrl_write(
        &self,
        port: LPort,
        pointer: u8,
        data: u16,
    ) -> SwitchResult<()> {
        let window = self.ext_port_ctrl_window()?;
        let addr = self.window_addr(window, port)?;
        window.write(self.bus.as_ref(), addr, pointer.into(), data)
    }
}
