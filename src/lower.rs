//! Forwarding to the next-lower layer.
//!
//! Most requests are simply handed down: the lower layer takes ownership and
//! completes them to the originator. Start and capability negotiation instead
//! need the request back once the lower layer is done with it, so they are
//! forwarded synchronously:
//!
//! 1. The request's completion is redirected to a private one-slot channel.
//! 2. The request is handed down.
//! 3. The caller blocks on the channel until the request comes back, whether
//!    the lower layer completed it before returning or completes it later
//!    from another thread.
//! 4. The previous completion target is restored.
//!
//! The channel is the only signal, so an early completion and a late one look
//! the same to the waiter and nothing is signalled twice.

use std::sync::Arc;

use crossbeam::channel;

use crate::{
    error::status_code,
    interface::HidInterface,
    request::Request,
    Disposition, HidError, Result,
};

/// The next-lower layer of the driver stack.
pub trait LowerDevice: Send + Sync {
    /// Hand `request` down.
    ///
    /// The lower layer owns the request from here on and must complete it,
    /// either before returning or later. [`Disposition::Pending`] means it
    /// will be completed later.
    fn call(&self, request: Request) -> Result<Disposition>;
}

/// Pass `request` down without watching for its completion.
pub(crate) fn pass_through(lower: &dyn LowerDevice, request: Request) -> Result<Disposition> {
    tracing::trace!(request = %request.id(), major = ?request.operation().major(), "passing down");
    lower.call(request)
}

/// Hand `request` down and block until the lower layer completes it.
///
/// Returns the request, carrying the lower layer's status, for the caller to
/// finish. Only call this where blocking is allowed.
pub(crate) fn forward_synchronously(lower: &dyn LowerDevice, mut request: Request) -> Result<Request> {
    let id = request.id();
    let (sender, receiver) = channel::bounded(1);
    let originator = request.redirect_completion(sender);

    let immediate = lower.call(request);
    let Ok(mut request) = receiver.recv() else {
        // Only reachable if the lower layer leaked the request.
        tracing::error!(request = %id, "lower layer never completed the request");
        return Err(HidError::Unsuccessful);
    };
    if let Some(originator) = originator {
        request.redirect_completion(originator);
    }

    let status = request.status();
    match immediate {
        Ok(Disposition::Pending) => {}
        immediate => debug_assert_eq!(immediate.map(|_| ()), status),
    }
    tracing::trace!(request = %id, status = format_args!("{:08x}", status_code(&status)), "forwarded");
    Ok(request)
}

/// Negotiate the collaborator capability with the lower layer.
pub(crate) fn query_interface(lower: &dyn LowerDevice, version: u32) -> Result<Arc<dyn HidInterface>> {
    // Nobody waits on this request; it exists only to carry the query.
    let (request, _handle) = Request::query_interface(version);
    let mut request = forward_synchronously(lower, request)?;

    let result = match request.status() {
        Ok(()) => request
            .interface_query_mut()
            .and_then(|query| query.take())
            .ok_or(HidError::Unsuccessful),
        Err(e) => Err(e),
    };
    let outcome = match &result {
        Ok(_) => Ok(0),
        Err(e) => Err(*e),
    };
    request.complete(outcome);

    if let Err(e) = &result {
        tracing::error!(version, error = %e, "capability query failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ioctl::PnpMinor,
        mock::{MockInterface, MockLower},
        request::Operation,
    };

    #[test]
    fn synchronous_forward_with_immediate_completion() {
        let lower = MockLower::new();
        let (request, handle) = Request::pnp(PnpMinor::StartDevice);
        let request = forward_synchronously(&lower, request).expect("completed");
        assert_eq!(request.status(), Ok(()));
        // The originator hears nothing until the request is finished here.
        assert!(handle.try_wait().is_none());
        request.complete(Ok(0));
        assert_eq!(handle.wait().result(), Ok(0));
    }

    #[test]
    fn synchronous_forward_with_deferred_completion() {
        let lower = MockLower::new().deferred();
        let (request, handle) = Request::pnp(PnpMinor::StartDevice);
        let request = forward_synchronously(&lower, request).expect("completed");
        assert_eq!(request.status(), Ok(()));
        assert!(handle.try_wait().is_none());
        request.complete_with_status();
        assert_eq!(handle.wait().result(), Ok(0));
    }

    #[test]
    fn synchronous_forward_reports_lower_failure() {
        let lower = MockLower::new().failing_start(HidError::InsufficientResources);
        let (request, _handle) = Request::pnp(PnpMinor::StartDevice);
        let request = forward_synchronously(&lower, request).expect("completed");
        assert_eq!(request.status(), Err(HidError::InsufficientResources));
    }

    #[test]
    fn dropped_request_comes_back_unsuccessful() {
        let lower = MockLower::new().dropping();
        let (request, _handle) = Request::pnp(PnpMinor::StartDevice);
        let request = forward_synchronously(&lower, request).expect("returned by drop");
        assert_eq!(request.status(), Err(HidError::Unsuccessful));
    }

    #[test]
    fn query_interface_returns_capability() {
        let interface = MockInterface::new();
        let lower = MockLower::new().with_interface(interface.clone());
        assert!(query_interface(&lower, 1).is_ok());
        assert_eq!(lower.calls(), vec![Operation::Pnp(PnpMinor::QueryInterface)]);
    }

    #[test]
    fn query_interface_unanswered_is_not_supported() {
        let lower = MockLower::new();
        assert_eq!(query_interface(&lower, 1).err(), Some(HidError::NotSupported));
    }

    #[test]
    fn pass_through_hands_request_down() {
        let lower = MockLower::new();
        let (request, handle) = Request::pnp(PnpMinor::QueryCapabilities);
        // Nothing below answers the request, so it keeps its initial status.
        assert_eq!(pass_through(&lower, request), Err(HidError::NotSupported));
        assert_eq!(handle.wait().result(), Err(HidError::NotSupported));
        assert_eq!(lower.calls(), vec![Operation::Pnp(PnpMinor::QueryCapabilities)]);
    }
}
