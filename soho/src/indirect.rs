// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Registers reached through a command/data register pair.
//!
//! The direct register space of these switches is too small for everything
//! they contain, so many registers and table entries sit behind a window: a
//! command register carrying a busy bit, an opcode and a pointer, and a data
//! register holding the value being moved.  Each transaction is:
//!
//! 1. wait for the busy bit to clear,
//! 2. for writes, load the data register,
//! 3. write the command word with the busy bit set,
//! 4. wait for the hardware to clear the busy bit,
//! 5. for reads, fetch the data register.
//!
//! Only one transaction may be in flight per window, so every window carries
//! a lock that is held across the whole sequence.

use std::time::Duration;

use parking_lot::Mutex;
use parking_lot::MutexGuard;
use slog::debug;
use slog::o;
use slog::trace;
use slog::Logger;

use sal::RegField;
use sal::SmiBus;
use sal::SwitchError;
use sal::SwitchResult;

use crate::poll::poll_until;
use crate::poll::RetryPolicy;

/// Where a window's registers live on the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Every port has its own copy of the window, at the port's address.
    Port,
    /// The window lives at a single, fixed device address.
    Device(u8),
}

/// The register placement and command-word encoding of one window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowLayout {
    pub name: &'static str,
    pub target: Target,
    pub cmd_reg: u8,
    pub data_reg: u8,
    /// Set by software to start an operation, cleared by hardware when done
    pub busy: RegField,
    pub opcode: RegField,
    pub pointer: RegField,
    /// Bits that are always set in the command word
    pub fixed: u16,
    pub read_op: u16,
    pub write_op: u16,
    /// The portion of the data register carrying the value
    pub data: RegField,
    /// Default bound on busy-bit polls
    pub attempts: u32,
}

impl WindowLayout {
    /// Build the command word that starts `op` on `pointer`.
    pub fn command(&self, op: IndirectOp, pointer: u16) -> u16 {
        let opcode = match op {
            IndirectOp::Read => self.read_op,
            IndirectOp::Write => self.write_op,
        };
        let word = self.busy.insert(self.fixed, 1);
        let word = self.opcode.insert(word, opcode);
        self.pointer.insert(word, pointer)
    }

    /// Split a command word back into its operation and pointer.  Used by
    /// the simulated bus.
    pub fn decode(&self, word: u16) -> Option<(IndirectOp, u16)> {
        let opcode = self.opcode.extract(word);
        let op = if opcode == self.read_op {
            IndirectOp::Read
        } else if opcode == self.write_op {
            IndirectOp::Write
        } else {
            return None;
        };
        Some((op, self.pointer.extract(word)))
    }

    fn is_busy(&self, word: u16) -> bool {
        self.busy.extract(word) != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndirectOp {
    Read,
    Write,
}

/// A single operation on a window.  Requests are transient: nothing about
/// one survives past the transaction that carries it out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndirectRequest {
    dev: u8,
    pointer: u16,
    op: IndirectOp,
    data: Option<u16>,
}

impl IndirectRequest {
    pub fn read(dev: u8, pointer: u16) -> Self {
        IndirectRequest {
            dev,
            pointer,
            op: IndirectOp::Read,
            data: None,
        }
    }

    pub fn write(dev: u8, pointer: u16, data: u16) -> Self {
        IndirectRequest {
            dev,
            pointer,
            op: IndirectOp::Write,
            data: Some(data),
        }
    }

    pub fn dev(&self) -> u8 {
        self.dev
    }

    pub fn pointer(&self) -> u16 {
        self.pointer
    }

    pub fn op(&self) -> IndirectOp {
        self.op
    }

    pub fn data(&self) -> Option<u16> {
        self.data
    }

    // Range checks happen before the request touches the bus.
    fn validate(&self, layout: &WindowLayout) -> SwitchResult<()> {
        if !layout.pointer.fits(self.pointer) {
            return Err(SwitchError::BadParam(format!(
                "{}: pointer {:#x} exceeds {}",
                layout.name, self.pointer, layout.pointer
            )));
        }
        if let Some(data) = self.data {
            if !layout.data.fits(data) {
                return Err(SwitchError::BadParam(format!(
                    "{}: value {:#x} wider than {} bits",
                    layout.name, data, layout.data.width
                )));
            }
        }
        Ok(())
    }
}

/// One indirect window of one device, along with the lock serialising its
/// transactions.
pub struct IndirectWindow {
    log: Logger,
    layout: WindowLayout,
    policy: RetryPolicy,
    lock_timeout: Option<Duration>,
    lock: Mutex<()>,
}

impl IndirectWindow {
    /// Create a window.  With no `lock_timeout`, callers wait for the lock
    /// for as long as it takes.
    pub fn new(
        log: &Logger,
        layout: WindowLayout,
        policy: RetryPolicy,
        lock_timeout: Option<Duration>,
    ) -> Self {
        IndirectWindow {
            log: log.new(o!("window" => layout.name)),
            layout,
            policy,
            lock_timeout,
            lock: Mutex::new(()),
        }
    }

    pub fn layout(&self) -> &WindowLayout {
        &self.layout
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Take the window's lock, for a sequence of transactions that must not
    /// be interleaved with anyone else's.
    pub fn lock<'a>(
        &'a self,
        bus: &'a dyn SmiBus,
    ) -> SwitchResult<WindowGuard<'a>> {
        let guard = match self.lock_timeout {
            Some(timeout) => match self.lock.try_lock_for(timeout) {
                Some(guard) => guard,
                None => {
                    debug!(self.log, "lock not acquired";
                        "timeout_ms" => timeout.as_millis() as u64);
                    return Err(SwitchError::LockTimeout {
                        window: self.layout.name,
                    });
                }
            },
            None => self.lock.lock(),
        };
        Ok(WindowGuard {
            window: self,
            bus,
            _guard: guard,
        })
    }

    /// Carry out a single request under the window's lock.
    pub fn execute(
        &self,
        bus: &dyn SmiBus,
        req: &IndirectRequest,
    ) -> SwitchResult<Option<u16>> {
        self.lock(bus)?.execute(req)
    }

    pub fn read(
        &self,
        bus: &dyn SmiBus,
        dev: u8,
        pointer: u16,
    ) -> SwitchResult<u16> {
        self.lock(bus)?.read(dev, pointer)
    }

    pub fn write(
        &self,
        bus: &dyn SmiBus,
        dev: u8,
        pointer: u16,
        data: u16,
    ) -> SwitchResult<()> {
        self.lock(bus)?.write(dev, pointer, data)
    }
}

/// Exclusive use of a window.  The lock is released when the guard is
/// dropped.
pub struct WindowGuard<'a> {
    window: &'a IndirectWindow,
    bus: &'a dyn SmiBus,
    _guard: MutexGuard<'a, ()>,
}

impl WindowGuard<'_> {
    pub fn execute(
        &mut self,
        req: &IndirectRequest,
    ) -> SwitchResult<Option<u16>> {
        let layout = &self.window.layout;
        req.validate(layout)?;

        self.wait_idle(req.dev)?;
        if let Some(data) = req.data {
            self.bus.write(req.dev, layout.data_reg, layout.data.insert(0, data))?;
        }
        self.bus
            .write(req.dev, layout.cmd_reg, layout.command(req.op, req.pointer))?;
        self.wait_idle(req.dev)?;

        let out = match req.op {
            IndirectOp::Read => {
                Some(layout.data.extract(self.bus.read(req.dev, layout.data_reg)?))
            }
            IndirectOp::Write => None,
        };
        trace!(self.window.log, "indirect {:?}", req.op;
            "dev" => req.dev, "pointer" => req.pointer, "data" => ?req.data.or(out));
        Ok(out)
    }

    pub fn read(&mut self, dev: u8, pointer: u16) -> SwitchResult<u16> {
        let req = IndirectRequest::read(dev, pointer);
        self.execute(&req)?.ok_or_else(|| {
            SwitchError::Internal("indirect read returned no data".to_string())
        })
    }

    pub fn write(
        &mut self,
        dev: u8,
        pointer: u16,
        data: u16,
    ) -> SwitchResult<()> {
        let req = IndirectRequest::write(dev, pointer, data);
        self.execute(&req).map(|_| ())
    }

    fn wait_idle(&self, dev: u8) -> SwitchResult<()> {
        let layout = &self.window.layout;
        let idle = poll_until(self.window.policy, || {
            Ok(!layout.is_busy(self.bus.read(dev, layout.cmd_reg)?))
        })?;
        match idle {
            Some(_) => Ok(()),
            None => {
                debug!(self.window.log, "busy bit never cleared";
                    "dev" => dev,
                    "attempts" => self.window.policy.attempts());
                Err(SwitchError::Timeout {
                    window: layout.name,
                    dev,
                    reg: layout.cmd_reg,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use slog::Drain;
    use std::sync::Arc;

    mockall::mock! {
        pub Bus {}
        impl SmiBus for Bus {
            fn read(&self, dev: u8, reg: u8) -> SwitchResult<u16>;
            fn write(&self, dev: u8, reg: u8, value: u16) -> SwitchResult<()>;
        }
    }

    const DEV: u8 = 0x03;
    const CMD: u8 = 0x1a;
    const DATA: u8 = 0x1b;
    const BUSY: u16 = 0x8000;

    const LAYOUT: WindowLayout = WindowLayout {
        name: "test",
        target: Target::Port,
        cmd_reg: CMD,
        data_reg: DATA,
        busy: RegField::bit(CMD, 15),
        opcode: RegField::new(CMD, 12, 2),
        pointer: RegField::new(CMD, 0, 7),
        fixed: 0,
        read_op: 0b10,
        write_op: 0b01,
        data: RegField::new(DATA, 0, 8),
        attempts: 5,
    };

    fn logger() -> Logger {
        let decorator =
            slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        Logger::root(drain, o!())
    }

    fn window(lock_timeout: Option<Duration>) -> IndirectWindow {
        let policy = RetryPolicy::new(LAYOUT.attempts, Duration::ZERO).unwrap();
        IndirectWindow::new(&logger(), LAYOUT, policy, lock_timeout)
    }

    // Expect `busy_polls` reads of the command register reporting busy,
    // followed by one reporting idle.
    fn expect_polls(bus: &mut MockBus, seq: &mut Sequence, busy_polls: usize) {
        if busy_polls > 0 {
            bus.expect_read()
                .with(eq(DEV), eq(CMD))
                .times(busy_polls)
                .in_sequence(seq)
                .returning(|_, _| Ok(BUSY));
        }
        bus.expect_read()
            .with(eq(DEV), eq(CMD))
            .times(1)
            .in_sequence(seq)
            .returning(|_, _| Ok(0));
    }

    #[test]
    fn test_command_word() {
        assert_eq!(LAYOUT.command(IndirectOp::Write, 0x10), 0x9010);
        assert_eq!(LAYOUT.command(IndirectOp::Read, 0x7f), 0xa07f);
        assert_eq!(
            LAYOUT.decode(0xa07f),
            Some((IndirectOp::Read, 0x7f))
        );
        assert_eq!(LAYOUT.decode(0x8000), None);
    }

    // Idle check and completion poll each pass on the first read: two busy
    // polls, one data write and one command write, in protocol order.
    #[test]
    fn test_write_sequence() -> anyhow::Result<()> {
        let mut bus = MockBus::new();
        let mut seq = Sequence::new();
        expect_polls(&mut bus, &mut seq, 0);
        bus.expect_write()
            .with(eq(DEV), eq(DATA), eq(0x5a))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        bus.expect_write()
            .with(eq(DEV), eq(CMD), eq(0x9010))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        expect_polls(&mut bus, &mut seq, 0);

        window(None).write(&bus, DEV, 0x10, 0x5a)?;
        Ok(())
    }

    // The hardware stays busy for some polls on either side of the command,
    // but clears within the bound of 5.
    #[test]
    fn test_write_busy_within_bound() -> anyhow::Result<()> {
        let mut bus = MockBus::new();
        let mut seq = Sequence::new();
        expect_polls(&mut bus, &mut seq, 1);
        bus.expect_write()
            .with(eq(DEV), eq(DATA), eq(0x01))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        bus.expect_write()
            .with(eq(DEV), eq(CMD), eq(0x9020))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        expect_polls(&mut bus, &mut seq, 4);

        window(None).write(&bus, DEV, 0x20, 0x01)?;
        Ok(())
    }

    #[test]
    fn test_read_sequence() -> anyhow::Result<()> {
        let mut bus = MockBus::new();
        let mut seq = Sequence::new();
        expect_polls(&mut bus, &mut seq, 0);
        bus.expect_write()
            .with(eq(DEV), eq(CMD), eq(0xa005))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        expect_polls(&mut bus, &mut seq, 2);
        bus.expect_read()
            .with(eq(DEV), eq(DATA))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(0xff33));

        // Only the low 8 bits of the data register belong to the window.
        assert_eq!(window(None).read(&bus, DEV, 0x05)?, 0x33);
        Ok(())
    }

    // A busy bit that never clears fails after exactly the bound, without a
    // command being issued or the data register being read.
    #[test]
    fn test_read_stuck_busy() {
        let mut bus = MockBus::new();
        bus.expect_read()
            .with(eq(DEV), eq(CMD))
            .times(LAYOUT.attempts as usize)
            .returning(|_, _| Ok(BUSY));
        bus.expect_write().never();

        let err = window(None).read(&bus, DEV, 0x05).unwrap_err();
        assert!(matches!(err, SwitchError::Timeout { window: "test", .. }));
        assert_eq!(err.status(), sal::Status::Fail);
    }

    // The command is accepted but never completes: the data register is
    // left alone.
    #[test]
    fn test_read_completion_timeout() {
        let mut bus = MockBus::new();
        let mut seq = Sequence::new();
        expect_polls(&mut bus, &mut seq, 0);
        bus.expect_write()
            .with(eq(DEV), eq(CMD), eq(0xa005))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        bus.expect_read()
            .with(eq(DEV), eq(CMD))
            .times(LAYOUT.attempts as usize)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(BUSY));
        bus.expect_read().with(eq(DEV), eq(DATA)).never();

        let r = window(None).read(&bus, DEV, 0x05);
        assert!(matches!(r, Err(SwitchError::Timeout { .. })));
    }

    #[test]
    fn test_bus_error_propagates() {
        let mut bus = MockBus::new();
        bus.expect_read()
            .times(1)
            .returning(|_, _| Err(SwitchError::bus("mdio", "no ack")));
        bus.expect_write().never();

        let r = window(None).write(&bus, DEV, 0x10, 0x01);
        assert!(matches!(r, Err(SwitchError::Bus { .. })));
    }

    #[test]
    fn test_out_of_range_rejected_before_bus() {
        let mut bus = MockBus::new();
        bus.expect_read().never();
        bus.expect_write().never();

        let w = window(None);
        assert!(matches!(
            w.write(&bus, DEV, 0x80, 0),
            Err(SwitchError::BadParam(_))
        ));
        assert!(matches!(
            w.write(&bus, DEV, 0x10, 0x100),
            Err(SwitchError::BadParam(_))
        ));
        assert!(matches!(
            w.read(&bus, DEV, 0x1000),
            Err(SwitchError::BadParam(_))
        ));
    }

    #[test]
    fn test_lock_timeout() -> anyhow::Result<()> {
        let bus = MockBus::new();
        let w = Arc::new(window(Some(Duration::from_millis(10))));

        let held = w.lock(&bus)?;
        let other = Arc::clone(&w);
        let r = std::thread::spawn(move || {
            let bus = MockBus::new();
            other.lock(&bus).map(|_| ())
        })
        .join()
        .unwrap();
        assert!(matches!(r, Err(SwitchError::LockTimeout { window: "test" })));
        drop(held);

        assert!(w.lock(&bus).is_ok());
        Ok(())
    }
}
