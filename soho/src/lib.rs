// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Register-level control of SOHO Ethernet switch families over an SMI
//! (MDIO) management bus.
//!
//! A [`Device`] is opened over a platform-provided [`SmiBus`].  Opening
//! identifies the chip family, either from configuration or by probing the
//! switch ID register, and selects the family's implementation of
//! [`SwitchOps`], which the device then dereferences to.

use std::ops::Deref;
use std::sync::Arc;

use slog::debug;
use slog::info;
use slog::o;
use slog::Logger;

pub use sal::ChipFamily;
pub use sal::SmiBus;
pub use sal::Status;
pub use sal::SwitchError;
pub use sal::SwitchOps;
pub use sal::SwitchResult;

pub mod config;
pub mod family;
pub mod indirect;
pub mod multichip;
pub mod poll;
pub mod qci;
pub mod sim;
pub mod tcam;

use config::DeviceConfig;
use family::Core;
use multichip::MultiChipBus;

/// Where a switch's ports may start on the bus, in the order probed.
const PORT_BASES: [u8; 2] = [0x10, 0x00];

/// Identify the switch on `bus` from its switch ID register, returning the
/// family and silicon revision.
pub fn identify(bus: &dyn SmiBus) -> SwitchResult<(ChipFamily, u8)> {
    let mut product = 0;
    for base in PORT_BASES {
        let id = bus.read(base, family::SWITCH_ID)?;
        product = family::PRODUCT_NUM.extract(id);
        if let Ok(family) = ChipFamily::from_product_id(product) {
            let revision = family::REVISION.extract(id) as u8;
            // Only trust a product number read where its family's ports
            // actually start.
            if family::layout(family).port_base == base {
                return Ok((family, revision));
            }
        }
    }
    Err(SwitchError::UnknownFamily(product))
}

/// An open switch.
pub struct Device {
    log: Logger,
    family: ChipFamily,
    revision: Option<u8>,
    ops: Box<dyn SwitchOps>,
}

impl Device {
    /// Open the switch on `bus`.  On any error no device exists, and nothing
    /// beyond identification reads has touched the bus.
    pub fn open(
        log: &Logger,
        bus: Arc<dyn SmiBus>,
        config: &DeviceConfig,
    ) -> SwitchResult<Device> {
        config.validate()?;

        let bus: Arc<dyn SmiBus> = match config.chip_addr {
            Some(chip_addr) => {
                let policy =
                    config.retry_policy(multichip::SMI_WINDOW.attempts)?;
                Arc::new(MultiChipBus::new(
                    log,
                    bus,
                    chip_addr,
                    policy,
                    config.lock_timeout(),
                )?)
            }
            None => bus,
        };

        let (family, revision) = match config.family {
            Some(family) => (family, None),
            None => match identify(bus.as_ref()) {
                Ok((family, revision)) => (family, Some(revision)),
                Err(e) => {
                    debug!(log, "failed to identify switch"; "error" => %e);
                    return Err(e);
                }
            },
        };

        let log = log.new(o!("family" => family.to_string()));
        let core = Core::new(&log, bus, family::layout(family), config)?;
        let ops = family::build(core);
        info!(log, "opened switch";
            "revision" => revision,
            "ports" => ops.num_ports(),
            "chip_addr" => config.chip_addr);

        Ok(Device {
            log,
            family,
            revision,
            ops,
        })
    }

    pub fn family(&self) -> ChipFamily {
        self.family
    }

    /// The silicon revision, if the chip was probed rather than named in the
    /// configuration.
    pub fn revision(&self) -> Option<u8> {
        self.revision
    }

    pub fn ops(&self) -> &dyn SwitchOps {
        self.ops.as_ref()
    }

    /// Release the device.  Any operation still holding a window lock has
    /// finished by the time this can be called.
    pub fn close(self) {
        debug!(self.log, "closed switch");
    }
}

impl Deref for Device {
    type Target = dyn SwitchOps;

    fn deref(&self) -> &Self::Target {
        self.ops.as_ref()
    }
}
