use std::{fmt::Debug, sync::Arc};

use crate::{
    config::FdoConfig,
    interface::ReportCallback,
    lifecycle::{Lifecycle, PnpState},
    lower::{query_interface, LowerDevice},
    queue::PendingQueue,
    Result,
};

/// Functional device object for one HID device.
///
/// The FDO sits between the HID class layer above it and a lower layer
/// below it. It services HID requests through the collaborator capability
/// negotiated when it is created, defers input-report reads until the
/// collaborator delivers data, and follows PnP and power transitions.
///
/// Every entry point takes `&self`; an `Fdo` is meant to be shared across
/// threads, typically behind an [`Arc`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use hidfdo::{ioctl::PnpMinor, Fdo, FdoConfig, LowerDevice, Request};
///
/// # fn lower() -> Arc<dyn LowerDevice> { unimplemented!() }
/// let fdo = Fdo::create(lower(), FdoConfig::default()).expect("attach failed");
///
/// let (start, handle) = Request::pnp(PnpMinor::StartDevice);
/// fdo.dispatch(start).expect("start failed");
/// handle.wait().result().expect("start failed");
///
/// // Reads stay pending until the device produces a report.
/// let (read, handle) = Request::read_report(64);
/// fdo.dispatch(read).expect("read refused");
/// let report = handle.wait();
/// println!("{:02x?}", report.data());
/// ```
pub struct Fdo {
    pub(crate) lower: Arc<dyn LowerDevice>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) queue: PendingQueue,
    config: FdoConfig,
}

impl Fdo {
    /// Attach to `lower`.
    ///
    /// Negotiates the collaborator capability with the lower layer. Fails if
    /// the configuration is invalid or the lower layer does not provide the
    /// capability. The device is created stopped and powered down.
    pub fn create(lower: Arc<dyn LowerDevice>, config: FdoConfig) -> Result<Self> {
        config.validate()?;
        let interface = query_interface(lower.as_ref(), config.interface_version)?;

        let queue = PendingQueue::new();
        let callback = ReportCallback::new(queue.downgrade(), config.oversize());
        let lifecycle = Lifecycle::new(interface, queue.clone(), callback, config.drain_on_power_down);

        tracing::debug!(version = config.interface_version, "attached");
        Ok(Self {
            lower,
            lifecycle,
            queue,
            config,
        })
    }

    /// Configuration the device was attached with.
    #[must_use]
    pub fn config(&self) -> &FdoConfig {
        &self.config
    }

    /// Current PnP state.
    #[must_use]
    pub fn state(&self) -> PnpState {
        self.lifecycle.state()
    }

    /// Whether the collaborator capability is acquired and enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.lifecycle.is_enabled()
    }

    /// Whether new reads are accepted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Number of reads waiting for a report.
    #[must_use]
    pub fn pending_reads(&self) -> usize {
        self.queue.len()
    }
}

impl Debug for Fdo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fdo")
            .field("state", &self.state())
            .field("enabled", &self.is_enabled())
            .field("pending_reads", &self.pending_reads())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
