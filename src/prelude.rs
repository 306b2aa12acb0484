//! Public prelude of the crate containing the most commonly used types.

pub use crate::{
    Completion, Disposition, Fdo, FdoConfig, HidError, HidInterface, LowerDevice, ReportCallback,
    Request, RequestHandle, Result,
};
