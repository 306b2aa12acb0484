//! Requests and their completion.
//!
//! A [`Request`] is created together with a [`RequestHandle`]. The request is
//! handed to [`Fdo::dispatch`](crate::Fdo::dispatch) and owned by whichever
//! layer is currently working on it; the handle stays with the originator and
//! is used to wait for the outcome or to cancel the request.
//!
//! Completing a request consumes it, so a request can only ever be completed
//! once. A request that is dropped without being completed is completed with
//! [`HidError::Unsuccessful`] on the way out, which means an originator is
//! never left waiting on a request that no longer exists.
//!
//! ```
//! use hidfdo::request::Request;
//!
//! let (request, handle) = Request::read_report(8);
//! request.complete(Ok(0));
//! assert_eq!(handle.wait().result(), Ok(0));
//! ```

use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::{
    interface::InterfaceQuery,
    ioctl::{IoControlCode, MajorFunction, PnpMinor, PowerMinor},
    HidError, Result,
};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a request, unique for the lifetime of the process.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        RequestId(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parameters of an internal device-control request.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DeviceControl {
    /// Raw control code; see [`IoControlCode`].
    pub code: u32,
    /// String identifier or index for the string requests.
    pub string_id: u32,
    /// Report id for the feature/input/output report requests.
    pub report_id: u8,
}

impl DeviceControl {
    /// Parameters for `code` with string id and report id zero.
    #[must_use]
    pub fn new(code: IoControlCode) -> Self {
        Self {
            code: code.into(),
            string_id: 0,
            report_id: 0,
        }
    }
}

/// What a request asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// A HID request from the class layer.
    InternalDeviceControl(DeviceControl),
    /// A Plug and Play notification.
    Pnp(PnpMinor),
    /// A power notification.
    Power(PowerMinor),
    /// Any other major function; always passed to the lower layer.
    Other(MajorFunction),
}

impl Operation {
    /// Major function this operation belongs to.
    #[must_use]
    pub fn major(&self) -> MajorFunction {
        match self {
            Operation::InternalDeviceControl(_) => MajorFunction::InternalDeviceControl,
            Operation::Pnp(_) => MajorFunction::Pnp,
            Operation::Power(_) => MajorFunction::Power,
            Operation::Other(major) => *major,
        }
    }
}

pub(crate) type CancelRoutine = Box<dyn FnOnce() + Send>;

struct CancelState {
    cancelled: AtomicBool,
    routine: Mutex<Option<CancelRoutine>>,
}

/// Cancellation flag shared between a request and its originator.
///
/// While a request sits in a queue the queue arms the token with a cancel
/// routine. [`CancelToken::cancel`] sets the flag and, if a routine is armed,
/// takes it and runs it. Whoever takes the routine first (the canceller, or a
/// queue removing the request for another reason) decides the outcome.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            inner: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                routine: Mutex::new(None),
            }),
        }
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel the request.
    ///
    /// Returns `true` if this call ran the cancel routine, i.e. the request
    /// was still queued. Cancelling twice, or cancelling a request that is
    /// not queued, is a no-op.
    pub fn cancel(&self) -> bool {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let routine = self.inner.routine.lock().take();
        match routine {
            Some(routine) => {
                routine();
                true
            }
            None => false,
        }
    }

    pub(crate) fn arm(&self, routine: CancelRoutine) {
        let previous = self.inner.routine.lock().replace(routine);
        debug_assert!(previous.is_none(), "cancel routine armed twice");
    }

    /// Take the cancel routine back. Returns `false` if a canceller already
    /// took it, in which case the canceller owns the outcome.
    pub(crate) fn disarm(&self) -> bool {
        self.inner.routine.lock().take().is_some()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// An operation travelling through the driver stack.
pub struct Request {
    id: RequestId,
    operation: Operation,
    /// Caller's buffer: output buffer for data-producing requests, input data
    /// for write-style requests.
    buffer: Vec<u8>,
    status: Result<()>,
    information: usize,
    interface: Option<InterfaceQuery>,
    cancel: CancelToken,
    // `None` only once the request has been completed.
    completion: Option<Sender<Request>>,
}

impl Request {
    /// Create a request and the handle its originator keeps.
    #[must_use]
    pub fn new(operation: Operation, buffer: Vec<u8>) -> (Self, RequestHandle) {
        let (sender, receiver) = channel::bounded(1);
        let id = RequestId::next();
        let cancel = CancelToken::new();
        let request = Self {
            id,
            operation,
            buffer,
            // Lower layers expect an untouched request to report "not supported".
            status: Err(HidError::NotSupported),
            information: 0,
            interface: None,
            cancel: cancel.clone(),
            completion: Some(sender),
        };
        let handle = RequestHandle {
            id,
            cancel,
            completion: receiver,
        };
        (request, handle)
    }

    /// A device-control request whose buffer holds `buffer`.
    #[must_use]
    pub fn device_control(control: DeviceControl, buffer: Vec<u8>) -> (Self, RequestHandle) {
        Self::new(Operation::InternalDeviceControl(control), buffer)
    }

    /// An asynchronous input-report read with room for `capacity` bytes.
    #[must_use]
    pub fn read_report(capacity: usize) -> (Self, RequestHandle) {
        Self::device_control(DeviceControl::new(IoControlCode::ReadReport), vec![0; capacity])
    }

    /// A PnP notification.
    #[must_use]
    pub fn pnp(minor: PnpMinor) -> (Self, RequestHandle) {
        Self::new(Operation::Pnp(minor), Vec::new())
    }

    /// A power notification.
    #[must_use]
    pub fn power(minor: PowerMinor) -> (Self, RequestHandle) {
        Self::new(Operation::Power(minor), Vec::new())
    }

    /// A query for the collaborator interface at `version`.
    #[must_use]
    pub fn query_interface(version: u32) -> (Self, RequestHandle) {
        let (mut request, handle) = Self::pnp(PnpMinor::QueryInterface);
        request.interface = Some(InterfaceQuery::new(version));
        (request, handle)
    }

    /// Identity of the request.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// What the request asks for.
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The caller's buffer.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// The caller's buffer, for filling in output.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Current status of the request.
    #[must_use]
    pub fn status(&self) -> Result<()> {
        self.status
    }

    /// Set the status carried down to the lower layer.
    pub fn set_status(&mut self, status: Result<()>) {
        self.status = status;
    }

    /// Number of bytes produced, valid once the request succeeded.
    #[must_use]
    pub fn information(&self) -> usize {
        self.information
    }

    /// Cancellation flag shared with the originator.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// The interface query carried by a query-interface request.
    #[must_use]
    pub fn interface_query(&self) -> Option<&InterfaceQuery> {
        self.interface.as_ref()
    }

    /// The interface query, for the lower layer to answer.
    pub fn interface_query_mut(&mut self) -> Option<&mut InterfaceQuery> {
        self.interface.as_mut()
    }

    /// Copy `data` into the request's buffer, truncating to its capacity.
    ///
    /// Returns the number of bytes copied.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(self.buffer.len());
        self.buffer[..len].copy_from_slice(&data[..len]);
        len
    }

    /// Complete the request with `result` (bytes produced on success).
    pub fn complete(mut self, result: Result<usize>) {
        match result {
            Ok(information) => {
                self.status = Ok(());
                self.information = information;
            }
            Err(e) => {
                self.status = Err(e);
                self.information = 0;
            }
        }
        self.send();
    }

    /// Complete the request with whatever status it currently carries.
    pub fn complete_with_status(mut self) {
        if self.status.is_err() {
            self.information = 0;
        }
        self.send();
    }

    /// Route the eventual completion to `sender` instead of the current target,
    /// returning the previous target.
    pub(crate) fn redirect_completion(&mut self, sender: Sender<Request>) -> Option<Sender<Request>> {
        self.completion.replace(sender)
    }

    fn send(mut self) {
        let Some(sender) = self.completion.take() else {
            return;
        };
        let id = self.id;
        tracing::trace!(request = %id, status = ?self.status, "completing");
        if sender.send(self).is_err() {
            tracing::trace!(request = %id, "originator no longer waiting");
        }
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        let Some(sender) = self.completion.take() else {
            return;
        };
        tracing::warn!(request = %self.id, "request dropped without completion");
        let orphan = Request {
            id: self.id,
            operation: self.operation.clone(),
            buffer: std::mem::take(&mut self.buffer),
            status: Err(HidError::Unsuccessful),
            information: 0,
            interface: self.interface.take(),
            cancel: self.cancel.clone(),
            completion: None,
        };
        // A closed channel only means nobody is waiting.
        if sender.send(orphan).is_err() {
            tracing::trace!(request = %self.id, "originator no longer waiting");
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("buffer_len", &self.buffer.len())
            .field("status", &self.status)
            .field("information", &self.information)
            .finish_non_exhaustive()
    }
}

/// The originator's side of a request.
pub struct RequestHandle {
    id: RequestId,
    cancel: CancelToken,
    completion: Receiver<Request>,
}

impl RequestHandle {
    /// Identity of the request this handle belongs to.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Cancel the request. See [`CancelToken::cancel`].
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    /// Get the outcome if the request has already been completed.
    #[must_use]
    pub fn try_wait(&self) -> Option<Completion> {
        self.completion.try_recv().ok().map(Completion::from)
    }

    /// Block until the request is completed.
    #[must_use]
    pub fn wait(self) -> Completion {
        match self.completion.recv() {
            Ok(request) => Completion::from(request),
            Err(_) => Completion {
                id: self.id,
                result: Err(HidError::Unsuccessful),
                buffer: Vec::new(),
            },
        }
    }

    /// Block until the request is completed or `timeout` elapses.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Completion> {
        self.completion
            .recv_timeout(timeout)
            .ok()
            .map(Completion::from)
    }
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Outcome of a completed request, as seen by its originator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    id: RequestId,
    result: Result<usize>,
    buffer: Vec<u8>,
}

impl Completion {
    /// Identity of the completed request.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Bytes produced on success, or the failure.
    #[must_use]
    pub fn result(&self) -> Result<usize> {
        self.result
    }

    /// The bytes produced, empty on failure.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self.result {
            Ok(len) => &self.buffer[..len.min(self.buffer.len())],
            Err(_) => &[],
        }
    }
}

impl From<Request> for Completion {
    fn from(mut request: Request) -> Self {
        // Already completed, so dropping the request afterwards is silent.
        request.completion = None;
        Completion {
            id: request.id,
            result: request.status.map(|()| request.information),
            buffer: std::mem::take(&mut request.buffer),
        }
    }
}
