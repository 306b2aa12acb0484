//! Device lifecycle: PnP state and the power gate.
//!
//! Two orthogonal pieces of state decide whether the device may do work:
//!
//! - The PnP state ([`PnpState`]) decides whether new reads are accepted.
//!   Its "running" half lives in the pending queue's gate so that it is read
//!   under the same lock as the queue itself.
//! - The power gate decides whether the collaborator capability is active
//!   (acquired and enabled). Control requests hold the gate's read guard for
//!   the whole collaborator call, and power transitions take the write
//!   guard, so a control request can never overlap a transition out of D0.
//!
//! ```text
//!            start               query-stop/remove
//!   Stopped -------> Started <-----------------------> Suspended
//!      ^                      cancel-stop/remove           |
//!      |                    stop                           |
//!      +---------------------------------------------------+
//!
//!   remove / surprise-removal from any state: Removed (terminal)
//! ```
//!
//! Power transitions are idempotent: D0 while enabled and D3 while disabled
//! do nothing, so acquire/release calls on the capability always pair up.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockWriteGuard};

use crate::{
    interface::{HidInterface, ReportCallback},
    ioctl::DevicePowerState,
    queue::PendingQueue,
    HidError, Result,
};

/// PnP state of the device.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PnpState {
    /// Attached but not started, or stopped for resource rebalancing.
    Stopped,
    /// Started and accepting requests.
    Started,
    /// A stop or remove is being queried; pending reads were failed.
    Suspended,
    /// Terminal.
    Removed,
}

pub(crate) struct Lifecycle {
    state: Mutex<PnpState>,
    /// `true` while the capability is acquired and enabled.
    enabled: RwLock<bool>,
    queue: PendingQueue,
    interface: Arc<dyn HidInterface>,
    callback: ReportCallback,
    drain_on_power_down: bool,
}

impl Lifecycle {
    pub fn new(
        interface: Arc<dyn HidInterface>,
        queue: PendingQueue,
        callback: ReportCallback,
        drain_on_power_down: bool,
    ) -> Self {
        // Nothing is accepted before start.
        queue.close();
        Self {
            state: Mutex::new(PnpState::Stopped),
            enabled: RwLock::new(false),
            queue,
            interface,
            callback,
            drain_on_power_down,
        }
    }

    pub fn state(&self) -> PnpState {
        *self.state.lock()
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.read()
    }

    pub fn is_running(&self) -> bool {
        self.queue.is_open()
    }

    /// Run `f` against the capability, holding off power transitions until
    /// it returns. Fails with [`HidError::NotReady`] if the capability is not
    /// active.
    pub fn with_capability<R>(&self, f: impl FnOnce(&dyn HidInterface) -> Result<R>) -> Result<R> {
        let enabled = self.enabled.read();
        if !*enabled {
            return Err(HidError::NotReady);
        }
        f(self.interface.as_ref())
    }

    /// Finish a start once the lower layer has started.
    ///
    /// Starting a started device does nothing. A suspended device has to be
    /// resumed or stopped first, and a removed one never starts again.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        tracing::trace!(state = ?*state, "start");
        match *state {
            PnpState::Stopped => {}
            PnpState::Started => return Ok(()),
            PnpState::Suspended | PnpState::Removed => return Err(HidError::InvalidDeviceState),
        }
        self.power_up()?;
        self.queue.open();
        *state = PnpState::Started;
        Ok(())
    }

    /// Query-stop / query-remove: stop accepting reads and fail the pending ones.
    pub fn suspend(&self) {
        let mut state = self.state.lock();
        if *state != PnpState::Started {
            tracing::trace!(state = ?*state, "suspend: not running");
            return;
        }
        let drained = self.queue.close().unwrap_or(0);
        *state = PnpState::Suspended;
        tracing::debug!(drained, "suspended");
    }

    /// Cancel-stop / cancel-remove: accept reads again.
    pub fn resume(&self) {
        let mut state = self.state.lock();
        if *state != PnpState::Suspended {
            tracing::trace!(state = ?*state, "resume: not suspended");
            return;
        }
        self.queue.open();
        *state = PnpState::Started;
        tracing::debug!("resumed");
    }

    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state == PnpState::Removed {
            return;
        }
        self.queue.close();
        *state = PnpState::Stopped;
    }

    /// Remove and surprise removal: tear down the capability and fail
    /// anything still pending. No report is accepted afterwards.
    pub fn remove(&self) {
        let mut state = self.state.lock();
        self.power_down();
        self.queue.close();
        *state = PnpState::Removed;
        tracing::debug!("removed");
    }

    /// Device power transition.
    pub fn set_power(&self, power: DevicePowerState) -> Result<()> {
        let state = self.state.lock();
        if power.is_operational() {
            if *state == PnpState::Removed {
                return Err(HidError::InvalidDeviceState);
            }
            self.power_up()
        } else {
            self.power_down();
            if self.drain_on_power_down {
                self.queue.drain();
            }
            Ok(())
        }
    }

    fn power_up(&self) -> Result<()> {
        let mut enabled = self.enabled.write();
        if *enabled {
            return Ok(());
        }

        if let Err(e) = self.interface.acquire() {
            tracing::error!(error = %e, "failed to acquire capability");
            return Err(e);
        }
        if let Err(e) = self.interface.enable(self.callback.clone()) {
            tracing::error!(error = %e, "failed to enable capability");
            self.interface.release();
            return Err(e);
        }

        *enabled = true;
        tracing::debug!("capability enabled");

        // Reads queued while powered down never got a report requested.
        let _enabled = RwLockWriteGuard::downgrade(enabled);
        let pending = self.queue.len();
        for _ in 0..pending {
            self.interface.read_report();
        }
        if pending > 0 {
            tracing::debug!(pending, "reports requested for queued reads");
        }
        Ok(())
    }

    fn power_down(&self) {
        let mut enabled = self.enabled.write();
        if !*enabled {
            return;
        }
        self.interface.disable();
        self.interface.release();
        *enabled = false;
        tracing::debug!("capability disabled");
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.power_down();
        self.queue.close();
    }
}
