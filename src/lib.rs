//! A HID functional device object (FDO) for paravirtual input devices.
//!
//! The FDO is the layer of a HID driver stack that sits directly below the
//! HID class layer. The actual device lives in another domain and is reached
//! through a backend, which a lower layer of the stack exposes as a
//! capability ([`HidInterface`]). This crate translates HID requests coming
//! from above into calls on that capability, and turns input reports pushed
//! by the backend into completions of pending read requests.
//!
//! # What This Crate Does
//!
//! - Negotiates the collaborator capability with the lower layer on attach
//! - Services synchronous HID requests (descriptors, attributes, strings,
//!   feature reports, input/output reports)
//! - Queues read requests until the backend delivers a report, with
//!   cancellation at any time
//! - Follows PnP transitions (start, stop, query/cancel stop and remove,
//!   remove, surprise removal)
//! - Follows device power transitions, acquiring the capability on D0 and
//!   releasing it on every other device state
//!
//! # Requests
//!
//! Every operation arrives as a [`Request`], created together with a
//! [`RequestHandle`] that the originator keeps. A request is completed
//! exactly once, either here or by a lower layer, and the handle observes
//! the outcome. See the [`request`] module.
//!
//! ## Error Handling
//!
//! Outcomes are reported as [`HidError`] values carrying stable status codes.
//! Failures reported by the collaborator are passed to the requester
//! verbatim, so the set of errors a request may fail with is not closed.
//!
//! ## Concurrency
//!
//! All entry points of [`Fdo`] take `&self` and may be called from any
//! thread, including the delivery callback, which may run concurrently with
//! dispatch. Locks are always taken in the order PnP state, power gate,
//! pending queue, and no request is completed while the queue lock is held.
//!
//! # Simple Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hidfdo::{
//!     ioctl::{IoControlCode, PnpMinor},
//!     request::DeviceControl,
//!     Fdo, FdoConfig, LowerDevice, Request,
//! };
//!
//! # fn lower() -> Arc<dyn LowerDevice> { unimplemented!() }
//! let fdo = Fdo::create(lower(), FdoConfig::default()).expect("attach failed");
//!
//! let (start, handle) = Request::pnp(PnpMinor::StartDevice);
//! fdo.dispatch(start).expect("start failed");
//! handle.wait();
//!
//! let control = DeviceControl::new(IoControlCode::GetDeviceAttributes);
//! let (request, handle) = Request::device_control(control, vec![0; 32]);
//! fdo.dispatch(request).expect("request failed");
//! println!("{:02x?}", handle.wait().data());
//! ```
#![warn(clippy::all, clippy::pedantic, clippy::cargo, missing_docs)]
// Collaborator failures are surfaced verbatim, so error conditions are open-ended.
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod config;
mod device;
mod dispatch;
mod error;
pub mod interface;
pub mod ioctl;
pub mod lifecycle;
pub mod lower;
#[cfg(test)]
mod mock;
pub mod prelude;
pub mod queue;
pub mod request;

pub use config::FdoConfig;
pub use device::Fdo;
pub use error::{Disposition, HidError, Result, STATUS_PENDING, STATUS_SUCCESS};
pub use interface::{HidInterface, ReportCallback};
pub use lower::LowerDevice;
pub use queue::PendingQueue;
pub use request::{Completion, Request, RequestHandle};
