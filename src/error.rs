use std::fmt::Display;

/// Result of an operation on the device.
pub type Result<T, E = HidError> = std::result::Result<T, E>;

/// Status code reported for a successfully completed request.
pub const STATUS_SUCCESS: u32 = 0x0000_0000;

/// Status code reported for a request that was accepted but not yet completed.
pub const STATUS_PENDING: u32 = 0x0000_0103;

/// Represents a failed request outcome.
///
/// Each variant carries a stable NTSTATUS-style code so that outcomes can be
/// logged and compared against what a lower layer or collaborator reported.
///
/// If necessary, a [`HidError`] may be constructed from a status code:
///
/// ```
/// use hidfdo::HidError;
///
/// let err = HidError::from(0xC000_00A3);
/// assert_eq!(err, HidError::NotReady);
/// ```
///
/// Codes without a dedicated variant are kept verbatim in [`HidError::Other`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HidError {
    /// Generic failure, also reported for requests dropped without completion.
    Unsuccessful,
    /// The device is suspended, removed or powered down.
    NotReady,
    /// The operation is not interpreted by this layer.
    NotSupported,
    /// The request is not valid in the current PnP state.
    InvalidDeviceState,
    /// A configuration value or request parameter is out of range.
    InvalidParameter,
    /// The caller's buffer cannot hold the data.
    BufferTooSmall,
    /// The collaborator or lower layer ran out of resources.
    InsufficientResources,
    /// A failure reported by a collaborator that has no dedicated variant.
    Other(u32),
}

impl HidError {
    /// Get the error as a status code.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            HidError::Unsuccessful => 0xC000_0001,
            HidError::NotReady => 0xC000_00A3,
            HidError::NotSupported => 0xC000_00BB,
            HidError::InvalidDeviceState => 0xC000_0184,
            HidError::InvalidParameter => 0xC000_000D,
            HidError::BufferTooSmall => 0xC000_0023,
            HidError::InsufficientResources => 0xC000_009A,
            HidError::Other(code) => *code,
        }
    }
}

impl Display for HidError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.code();
        write!(f, "{self:?} (status 0x{code:08x})")
    }
}

impl From<u32> for HidError {
    /// A success code is not an error; it maps to [`HidError::Unsuccessful`]
    /// so a confused collaborator can never smuggle a success through.
    fn from(value: u32) -> Self {
        match value {
            STATUS_SUCCESS => HidError::Unsuccessful,
            0xC000_0001 => HidError::Unsuccessful,
            0xC000_00A3 => HidError::NotReady,
            0xC000_00BB => HidError::NotSupported,
            0xC000_0184 => HidError::InvalidDeviceState,
            0xC000_000D => HidError::InvalidParameter,
            0xC000_0023 => HidError::BufferTooSmall,
            0xC000_009A => HidError::InsufficientResources,
            code => HidError::Other(code),
        }
    }
}

/// How a dispatched request was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// The request finished; `information` holds the number of bytes produced.
    Complete {
        /// Bytes produced.
        information: usize,
    },
    /// The request was queued and will be completed later.
    Pending,
}

impl Disposition {
    /// Status code of this disposition, for tracing.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Disposition::Complete { .. } => STATUS_SUCCESS,
            Disposition::Pending => STATUS_PENDING,
        }
    }
}

/// Status code of any outcome, for tracing.
pub(crate) fn status_code<T>(result: &Result<T>) -> u32 {
    match result {
        Ok(_) => STATUS_SUCCESS,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_back_to_variants() {
        for err in [
            HidError::Unsuccessful,
            HidError::NotReady,
            HidError::NotSupported,
            HidError::InvalidDeviceState,
            HidError::InvalidParameter,
            HidError::BufferTooSmall,
            HidError::InsufficientResources,
        ] {
            assert_eq!(HidError::from(err.code()), err);
        }
    }

    #[test]
    fn unknown_code_is_kept_verbatim() {
        let err = HidError::from(0xC000_0010);
        assert_eq!(err, HidError::Other(0xC000_0010));
        assert_eq!(err.code(), 0xC000_0010);
    }

    #[test]
    fn success_is_not_an_error() {
        assert_eq!(HidError::from(STATUS_SUCCESS), HidError::Unsuccessful);
    }

    #[test]
    fn display_includes_code() {
        assert_eq!(
            HidError::NotReady.to_string(),
            "NotReady (status 0xc00000a3)"
        );
    }

    #[test]
    fn status_code_of_outcomes() {
        assert_eq!(status_code::<()>(&Ok(())), STATUS_SUCCESS);
        assert_eq!(status_code::<()>(&Err(HidError::NotSupported)), 0xC000_00BB);
        assert_eq!(Disposition::Pending.code(), STATUS_PENDING);
    }
}
