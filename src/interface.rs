//! Collaborator capability.
//!
//! The device underneath this driver exposes its HID functionality through a
//! capability negotiated at attach time (see
//! [`Fdo::create`](crate::Fdo::create)). The capability must be acquired and
//! enabled before it is used, and disabled and released when the device
//! leaves D0.
//!
//! Input reports arrive asynchronously: once [`HidInterface::read_report`] is
//! called, the collaborator eventually invokes the [`ReportCallback`] handed
//! to [`HidInterface::enable`] with the next report. The callback may run in
//! any context and never blocks.
//!
//! A minimal collaborator looks like this:
//!
//! ```
//! use hidfdo::{interface::{HidInterface, ReportCallback}, HidError, Result};
//!
//! struct Null;
//!
//! impl HidInterface for Null {
//!     fn acquire(&self) -> Result<()> { Ok(()) }
//!     fn release(&self) {}
//!     fn enable(&self, _callback: ReportCallback) -> Result<()> { Ok(()) }
//!     fn disable(&self) {}
//!     fn get_device_attributes(&self, _buf: &mut [u8]) -> Result<usize> { Ok(0) }
//!     fn get_device_descriptor(&self, _buf: &mut [u8]) -> Result<usize> { Ok(0) }
//!     fn get_report_descriptor(&self, _buf: &mut [u8]) -> Result<usize> { Ok(0) }
//!     fn get_string(&self, _id: u32, _buf: &mut [u8]) -> Result<usize> { Err(HidError::NotSupported) }
//!     fn get_indexed_string(&self, _index: u32, _buf: &mut [u8]) -> Result<usize> { Err(HidError::NotSupported) }
//!     fn get_feature(&self, _report_id: u8, _buf: &mut [u8]) -> Result<usize> { Ok(0) }
//!     fn set_feature(&self, _report_id: u8, _buf: &[u8]) -> Result<()> { Ok(()) }
//!     fn get_input_report(&self, _report_id: u8, _buf: &mut [u8]) -> Result<usize> { Ok(0) }
//!     fn set_output_report(&self, _report_id: u8, _buf: &[u8]) -> Result<()> { Ok(()) }
//!     fn write_report(&self, _report_id: u8, _buf: &[u8]) -> Result<()> { Ok(()) }
//!     fn read_report(&self) {}
//! }
//! ```

use std::sync::Arc;

use crate::{queue::WeakQueue, HidError, Result};

/// Highest collaborator interface version this driver understands.
pub const HID_INTERFACE_VERSION_MAX: u32 = 1;

/// The collaborator's HID capability.
///
/// Calls returning `Result<usize>` report the number of bytes written to the
/// buffer. Failures are surfaced to the requester verbatim.
pub trait HidInterface: Send + Sync {
    /// Take a reference on the capability.
    fn acquire(&self) -> Result<()>;
    /// Drop the reference taken by [`HidInterface::acquire`].
    fn release(&self);
    /// Start delivering reports to `callback`.
    fn enable(&self, callback: ReportCallback) -> Result<()>;
    /// Stop delivering reports. No callback runs after this returns.
    fn disable(&self);

    /// Vendor id, product id and version.
    fn get_device_attributes(&self, buffer: &mut [u8]) -> Result<usize>;
    /// HID descriptor.
    fn get_device_descriptor(&self, buffer: &mut [u8]) -> Result<usize>;
    /// Report descriptor.
    fn get_report_descriptor(&self, buffer: &mut [u8]) -> Result<usize>;
    /// String identified by `identifier` (string id and language id).
    fn get_string(&self, identifier: u32, buffer: &mut [u8]) -> Result<usize>;
    /// String at `index` in the device's string table.
    fn get_indexed_string(&self, index: u32, buffer: &mut [u8]) -> Result<usize>;
    /// Feature report `report_id`.
    fn get_feature(&self, report_id: u8, buffer: &mut [u8]) -> Result<usize>;
    /// Send feature report `report_id`.
    fn set_feature(&self, report_id: u8, buffer: &[u8]) -> Result<()>;
    /// Current input report `report_id`, bypassing the read queue.
    fn get_input_report(&self, report_id: u8, buffer: &mut [u8]) -> Result<usize>;
    /// Send output report `report_id` on the control channel.
    fn set_output_report(&self, report_id: u8, buffer: &[u8]) -> Result<()>;
    /// Send output report `report_id` on the interrupt channel.
    fn write_report(&self, report_id: u8, buffer: &[u8]) -> Result<()>;

    /// Ask for the next input report to be delivered through the callback.
    fn read_report(&self);
}

/// Payload of a query-interface request.
///
/// The lower layer answering the query fills in the interface and completes
/// the request successfully.
#[derive(Clone)]
pub struct InterfaceQuery {
    version: u32,
    interface: Option<Arc<dyn HidInterface>>,
}

impl InterfaceQuery {
    pub(crate) fn new(version: u32) -> Self {
        Self {
            version,
            interface: None,
        }
    }

    /// Interface version requested.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Answer the query.
    pub fn provide(&mut self, interface: Arc<dyn HidInterface>) {
        self.interface = Some(interface);
    }

    pub(crate) fn take(&mut self) -> Option<Arc<dyn HidInterface>> {
        self.interface.take()
    }
}

impl std::fmt::Debug for InterfaceQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceQuery")
            .field("version", &self.version)
            .field("answered", &self.interface.is_some())
            .finish()
    }
}

/// What [`ReportCallback::deliver`] does with a report larger than the
/// destination buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Oversize {
    Truncate,
    Fail,
}

/// Data-delivery callback handed to the collaborator.
///
/// Holds only a weak reference to the pending queue, so a collaborator that
/// keeps the callback around after the device is gone just finds no taker.
#[derive(Clone)]
pub struct ReportCallback {
    queue: WeakQueue,
    oversize: Oversize,
}

impl ReportCallback {
    pub(crate) fn new(queue: WeakQueue, oversize: Oversize) -> Self {
        Self { queue, oversize }
    }

    /// Complete the oldest pending read with `report`.
    ///
    /// Returns `false` if no read was pending; the collaborator then keeps or
    /// drops the report itself. Never blocks beyond the queue lock, and the
    /// read is completed after the lock is released.
    pub fn deliver(&self, report: &[u8]) -> bool {
        let Some(queue) = self.queue.upgrade() else {
            return false;
        };
        let Some(mut request) = queue.remove_oldest() else {
            tracing::trace!(len = report.len(), "no pending read for report");
            return false;
        };

        let capacity = request.buffer().len();
        if report.len() > capacity {
            if self.oversize == Oversize::Fail {
                tracing::warn!(request = %request.id(), len = report.len(), capacity, "report does not fit");
                request.complete(Err(HidError::BufferTooSmall));
                return true;
            }
            tracing::warn!(request = %request.id(), len = report.len(), capacity, "report truncated");
        }

        let copied = request.fill(report);
        request.complete(Ok(copied));
        true
    }
}

impl std::fmt::Debug for ReportCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportCallback")
            .field("oversize", &self.oversize)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{queue::PendingQueue, request::Request};

    #[test]
    fn delivers_to_oldest_read() {
        let queue = PendingQueue::new();
        let callback = ReportCallback::new(queue.downgrade(), Oversize::Truncate);
        let (first, first_handle) = Request::read_report(8);
        let (second, second_handle) = Request::read_report(8);
        queue.insert(first).expect("open");
        queue.insert(second).expect("open");

        assert!(callback.deliver(&[1, 2, 3, 4]));
        let completion = first_handle.wait();
        assert_eq!(completion.result(), Ok(4));
        assert_eq!(completion.data(), &[1, 2, 3, 4]);
        assert!(second_handle.try_wait().is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn no_taker_without_pending_read() {
        let queue = PendingQueue::new();
        let callback = ReportCallback::new(queue.downgrade(), Oversize::Truncate);
        assert!(!callback.deliver(&[1]));
    }

    #[test]
    fn no_taker_once_queue_is_gone() {
        let queue = PendingQueue::new();
        let callback = ReportCallback::new(queue.downgrade(), Oversize::Truncate);
        drop(queue);
        assert!(!callback.deliver(&[1]));
    }

    #[test]
    fn oversized_report_is_truncated() {
        let queue = PendingQueue::new();
        let callback = ReportCallback::new(queue.downgrade(), Oversize::Truncate);
        let (request, handle) = Request::read_report(2);
        queue.insert(request).expect("open");
        assert!(callback.deliver(&[5, 6, 7]));
        assert_eq!(handle.wait().data(), &[5, 6]);
    }

    #[test]
    fn oversized_report_can_fail_the_read() {
        let queue = PendingQueue::new();
        let callback = ReportCallback::new(queue.downgrade(), Oversize::Fail);
        let (request, handle) = Request::read_report(2);
        queue.insert(request).expect("open");
        assert!(callback.deliver(&[5, 6, 7]));
        assert_eq!(handle.wait().result(), Err(HidError::BufferTooSmall));
    }
}
