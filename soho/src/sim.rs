// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! A simulated management bus, for exercising the switch layer without
//! hardware.
//!
//! The simulator keeps a flat register file and, for every indirect window
//! it has been told about, emulates the hardware behind the command/data
//! pair: commands complete after a configurable number of busy polls (or
//! never), writes land in per-device window storage, and reads latch the
//! stored value into the data register.  Every bus transaction is logged.
//!
//! It also watches for the one thing the window locks exist to prevent: a
//! thread touching a window's registers while another thread's transaction
//! on that window is still in flight.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::Mutex;
use rand::random;
use serde::Deserialize;
use serde::Serialize;
use slog::error;
use slog::o;
use slog::trace;
use slog::Logger;

use sal::ChipFamily;
use sal::SmiBus;
use sal::SwitchError;
use sal::SwitchResult;

use crate::family;
use crate::indirect::IndirectOp;
use crate::indirect::Target;
use crate::indirect::WindowLayout;
use crate::multichip::SMI_WINDOW;

/// One logged bus transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusOp {
    Read { dev: u8, reg: u8, value: u16 },
    Write { dev: u8, reg: u8, value: u16 },
}

/// Chaos that happens according to a probability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Chaos {
    /// A probability between 0.0 and 1.0
    pub value: f64,
}

impl Chaos {
    pub fn new(value: f64) -> SwitchResult<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(SwitchError::BadParam(format!(
                "probability {value} out of range"
            )));
        }
        Ok(Chaos { value })
    }

    /// Return a synthetic bus error according to the probability.
    pub fn unfurled(&self, log: &Logger, message: &str) -> SwitchResult<()> {
        if self.value > random::<f64>() {
            error!(log, "chaos error: {}", message);
            return Err(SwitchError::bus("chaos", message));
        }
        Ok(())
    }
}

/// Fault probabilities for each kind of bus transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BusChaos {
    pub read: Chaos,
    pub write: Chaos,
}

impl BusChaos {
    pub fn uniform(value: f64) -> SwitchResult<Self> {
        let c = Chaos::new(value)?;
        Ok(BusChaos { read: c, write: c })
    }
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    op: IndirectOp,
    pointer: u16,
    /// Busy polls left before the command completes
    remaining: u32,
}

// Per-device state of an emulated window
#[derive(Debug, Default)]
struct WindowDev {
    storage: BTreeMap<u16, u16>,
    pending: Option<Pending>,
    /// Data written for a command that has not been issued yet
    staged: bool,
    /// The thread whose transaction is in flight
    owner: Option<ThreadId>,
}

#[derive(Debug)]
struct SimWindow {
    layout: WindowLayout,
    devs: BTreeMap<u8, WindowDev>,
    latency: u32,
    stuck: bool,
}

#[derive(Debug, Default)]
struct SimState {
    regs: BTreeMap<(u8, u8), u16>,
    windows: Vec<SimWindow>,
    log: Vec<BusOp>,
    chaos: BusChaos,
    violations: u64,
    /// Address of the SMI command/data pair in multi-chip mode
    chip_addr: Option<u8>,
}

/// A simulated SMI bus.  Clones share the same simulated hardware.
#[derive(Clone)]
pub struct SimBus {
    log: Logger,
    state: Arc<Mutex<SimState>>,
}

impl SimBus {
    /// A bus with an empty register file and no windows.
    pub fn new(log: &Logger) -> Self {
        SimBus {
            log: log.new(o!("unit" => "simbus")),
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    /// A bus populated with a member of `family`: its switch ID register
    /// identifies it, and all of its windows are emulated.
    pub fn for_family(log: &Logger, family: ChipFamily) -> Self {
        let bus = SimBus::new(log);
        let layout = family::layout(family);
        let product = family.product_ids()[0];
        for addr in layout.port_addrs() {
            let id = family::PRODUCT_NUM.insert(0, product);
            bus.poke(addr, family::SWITCH_ID, family::REVISION.insert(id, 1));
        }
        for w in layout.windows() {
            let devs: Vec<u8> = match w.target {
                Target::Port => layout.port_addrs().collect(),
                Target::Device(addr) => vec![addr],
            };
            bus.add_window(w, devs);
        }
        bus
    }

    /// Put the simulated chip in multi-chip mode at `chip_addr`.  From then
    /// on the only registers on the bus are SMI Command and SMI Data at that
    /// address; everything else is reached through them.
    pub fn with_chip_addr(self, chip_addr: u8) -> Self {
        self.state.lock().chip_addr = Some(chip_addr);
        self
    }

    /// Emulate `layout` at each of `devs`.
    pub fn add_window(&self, layout: WindowLayout, devs: impl IntoIterator<Item = u8>) {
        let devs = devs.into_iter().map(|d| (d, WindowDev::default())).collect();
        self.state.lock().windows.push(SimWindow {
            layout,
            devs,
            latency: 0,
            stuck: false,
        });
    }

    /// Make commands on the named window report busy for `polls` reads of
    /// the command register before completing.
    pub fn set_latency(&self, window: &str, polls: u32) {
        for w in self.state.lock().windows.iter_mut() {
            if w.layout.name == window {
                w.latency = polls;
            }
        }
    }

    /// Make commands on the named window never complete.  Freeing a stuck
    /// window drops whatever commands it was holding.
    pub fn set_stuck(&self, window: &str, stuck: bool) {
        for w in self.state.lock().windows.iter_mut() {
            if w.layout.name == window {
                w.stuck = stuck;
                if !stuck {
                    for wd in w.devs.values_mut() {
                        wd.pending = None;
                        wd.staged = false;
                        wd.owner = None;
                    }
                }
            }
        }
    }

    pub fn set_chaos(&self, chaos: BusChaos) {
        self.state.lock().chaos = chaos;
    }

    /// Set a register directly, bypassing the transaction log and any
    /// window emulation.
    pub fn poke(&self, dev: u8, reg: u8, value: u16) {
        self.state.lock().regs.insert((dev, reg), value);
    }

    /// Examine a register directly.
    pub fn peek(&self, dev: u8, reg: u8) -> u16 {
        self.state.lock().regs.get(&(dev, reg)).copied().unwrap_or(0)
    }

    /// Examine the storage behind a window.
    pub fn window_peek(&self, window: &str, dev: u8, pointer: u16) -> Option<u16> {
        let state = self.state.lock();
        state
            .windows
            .iter()
            .filter(|w| w.layout.name == window)
            .find_map(|w| w.devs.get(&dev))
            .and_then(|d| d.storage.get(&pointer).copied())
    }

    /// Set the storage behind a window directly.
    pub fn window_poke(&self, window: &str, dev: u8, pointer: u16, value: u16) {
        let mut state = self.state.lock();
        if let Some(d) = state
            .windows
            .iter_mut()
            .filter(|w| w.layout.name == window)
            .find_map(|w| w.devs.get_mut(&dev))
        {
            d.storage.insert(pointer, value);
        }
    }

    pub fn transactions(&self) -> Vec<BusOp> {
        self.state.lock().log.clone()
    }

    pub fn clear_transactions(&self) {
        self.state.lock().log.clear();
    }

    /// How many times a thread touched a window while another thread's
    /// transaction on it was in flight.
    pub fn violations(&self) -> u64 {
        self.state.lock().violations
    }
}

impl SimState {
    fn reg(&self, dev: u8, reg: u8) -> u16 {
        self.regs.get(&(dev, reg)).copied().unwrap_or(0)
    }

    fn window_at(&self, dev: u8, reg: u8) -> Option<usize> {
        self.windows.iter().position(|w| {
            w.devs.contains_key(&dev)
                && (reg == w.layout.cmd_reg || reg == w.layout.data_reg)
        })
    }

    // Note an access to a window by the current thread.  An access while
    // another thread's transaction is in flight is a violation; any other
    // access starts or continues the current thread's transaction.
    fn claim(&mut self, idx: usize, dev: u8) {
        let me = std::thread::current().id();
        let wd = self.windows[idx].devs.entry(dev).or_default();
        match wd.owner {
            Some(owner) if owner != me => self.violations += 1,
            _ => wd.owner = Some(me),
        }
    }

    fn read(&mut self, dev: u8, reg: u8) -> u16 {
        match self.chip_addr {
            None => self.inner_read(dev, reg),
            // SMI commands complete immediately.
            Some(chip) if dev == chip && reg == SMI_WINDOW.cmd_reg => 0,
            Some(chip) if dev == chip && reg == SMI_WINDOW.data_reg => {
                self.reg(dev, reg)
            }
            // Nothing else answers directly in multi-chip mode.
            Some(_) => 0xffff,
        }
    }

    fn write(&mut self, dev: u8, reg: u8, value: u16) {
        match self.chip_addr {
            None => self.inner_write(dev, reg, value),
            Some(chip) if dev == chip && reg == SMI_WINDOW.cmd_reg => {
                self.smi_command(chip, value)
            }
            Some(chip) if dev == chip && reg == SMI_WINDOW.data_reg => {
                self.regs.insert((dev, reg), value);
            }
            Some(_) => {}
        }
    }

    fn smi_command(&mut self, chip: u8, cmd: u16) {
        if SMI_WINDOW.busy.extract(cmd) == 0 {
            return;
        }
        let Some((op, ptr)) = SMI_WINDOW.decode(cmd) else {
            return;
        };
        let (dev, reg) = ((ptr >> 5) as u8, (ptr & 0x1f) as u8);
        match op {
            IndirectOp::Read => {
                let v = self.inner_read(dev, reg);
                self.regs.insert((chip, SMI_WINDOW.data_reg), v);
            }
            IndirectOp::Write => {
                let v = self.reg(chip, SMI_WINDOW.data_reg);
                self.inner_write(dev, reg, v);
            }
        }
    }

    fn inner_read(&mut self, dev: u8, reg: u8) -> u16 {
        let Some(idx) = self.window_at(dev, reg) else {
            return self.reg(dev, reg);
        };
        {
            // An idle window with nothing staged has no transaction in
            // flight, so any owner left behind belongs to one that was
            // abandoned.
            let w = &mut self.windows[idx];
            let cmd = reg == w.layout.cmd_reg;
            let stuck = w.stuck;
            let wd = w.devs.entry(dev).or_default();
            if cmd && !stuck && wd.pending.is_none() && !wd.staged {
                wd.owner = None;
            }
        }
        self.claim(idx, dev);

        let w = &mut self.windows[idx];
        let layout = w.layout;
        let busy = layout.busy.insert(0, 1);
        let wd = w.devs.entry(dev).or_default();

        if reg == layout.data_reg {
            // Fetching the data ends a read transaction.
            wd.owner = None;
            return self.regs.get(&(dev, reg)).copied().unwrap_or(0);
        }
        if w.stuck {
            return busy;
        }
        let Some(mut pending) = wd.pending else {
            return 0;
        };
        if pending.remaining > 0 {
            pending.remaining -= 1;
            wd.pending = Some(pending);
            return busy;
        }

        wd.pending = None;
        match pending.op {
            IndirectOp::Write => {
                let data = self
                    .regs
                    .get(&(dev, layout.data_reg))
                    .copied()
                    .unwrap_or(0);
                wd.storage.insert(pending.pointer, layout.data.extract(data));
                // Seeing the busy bit clear ends a write transaction.
                wd.owner = None;
            }
            IndirectOp::Read => {
                let v = wd.storage.get(&pending.pointer).copied().unwrap_or(0);
                self.regs
                    .insert((dev, layout.data_reg), layout.data.insert(0, v));
            }
        }
        0
    }

    fn inner_write(&mut self, dev: u8, reg: u8, value: u16) {
        let Some(idx) = self.window_at(dev, reg) else {
            self.regs.insert((dev, reg), value);
            return;
        };
        self.claim(idx, dev);

        let w = &mut self.windows[idx];
        let layout = w.layout;
        let remaining = w.latency;
        let wd = w.devs.entry(dev).or_default();
        if reg == layout.data_reg {
            wd.staged = true;
            self.regs.insert((dev, reg), value);
            return;
        }
        if layout.busy.extract(value) == 0 {
            return;
        }
        wd.staged = false;
        if let Some((op, pointer)) = layout.decode(value) {
            wd.pending = Some(Pending {
                op,
                pointer,
                remaining,
            });
        }
    }
}

impl SmiBus for SimBus {
    fn read(&self, dev: u8, reg: u8) -> SwitchResult<u16> {
        let mut state = self.state.lock();
        state.chaos.read.unfurled(&self.log, "smi read")?;
        let value = state.read(dev, reg);
        state.log.push(BusOp::Read { dev, reg, value });
        trace!(self.log, "read"; "dev" => dev, "reg" => reg, "value" => value);
        Ok(value)
    }

    fn write(&self, dev: u8, reg: u8, value: u16) -> SwitchResult<()> {
        let mut state = self.state.lock();
        state.chaos.write.unfurled(&self.log, "smi write")?;
        state.write(dev, reg, value);
        state.log.push(BusOp::Write { dev, reg, value });
        trace!(self.log, "write"; "dev" => dev, "reg" => reg, "value" => value);
        Ok(())
    }
}
