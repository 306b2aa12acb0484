//! Function codes understood by the dispatcher.
//!
//! Requests arrive from the HID class layer tagged with a major function and,
//! depending on the major function, either a device-control code or a minor
//! function code. The types in this module give those raw numbers names.
//!
//! # Resources
//! - <https://learn.microsoft.com/en-us/windows-hardware/drivers/ddi/hidport/>
//! - <https://learn.microsoft.com/en-us/windows-hardware/drivers/kernel/plug-and-play-minor-irps>

use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

/// Internal device-control codes sent by the HID class layer.
///
/// Codes follow the `CTL_CODE(FILE_DEVICE_KEYBOARD, function, method, FILE_ANY_ACCESS)`
/// layout. Only the codes listed here are serviced; anything else fails with
/// [`HidError::NotSupported`](crate::HidError::NotSupported).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum IoControlCode {
    /// `IOCTL_HID_GET_DEVICE_DESCRIPTOR`.
    GetDeviceDescriptor = 0x000B_0003,
    /// `IOCTL_HID_GET_REPORT_DESCRIPTOR`.
    GetReportDescriptor = 0x000B_0007,
    /// `IOCTL_HID_READ_REPORT`, serviced asynchronously.
    ReadReport = 0x000B_000B,
    /// `IOCTL_HID_WRITE_REPORT`.
    WriteReport = 0x000B_000F,
    /// `IOCTL_HID_GET_STRING`.
    GetString = 0x000B_0013,
    /// `IOCTL_HID_GET_DEVICE_ATTRIBUTES`.
    GetDeviceAttributes = 0x000B_0027,
    /// `IOCTL_HID_SET_FEATURE`.
    SetFeature = 0x000B_0191,
    /// `IOCTL_HID_GET_FEATURE`.
    GetFeature = 0x000B_0192,
    /// `IOCTL_HID_SET_OUTPUT_REPORT`.
    SetOutputReport = 0x000B_0195,
    /// `IOCTL_HID_GET_INPUT_REPORT`.
    GetInputReport = 0x000B_01A2,
    /// `IOCTL_HID_GET_INDEXED_STRING`.
    GetIndexedString = 0x000B_01E2,
}

/// Major function codes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MajorFunction {
    /// `IRP_MJ_CREATE`.
    Create = 0x00,
    /// `IRP_MJ_CLOSE`.
    Close = 0x02,
    /// `IRP_MJ_READ`.
    Read = 0x03,
    /// `IRP_MJ_WRITE`.
    Write = 0x04,
    /// `IRP_MJ_DEVICE_CONTROL`.
    DeviceControl = 0x0e,
    /// `IRP_MJ_INTERNAL_DEVICE_CONTROL`.
    InternalDeviceControl = 0x0f,
    /// `IRP_MJ_POWER`.
    Power = 0x16,
    /// `IRP_MJ_SYSTEM_CONTROL`.
    SystemControl = 0x17,
    /// `IRP_MJ_PNP`.
    Pnp = 0x1b,
    /// Any other code.
    #[num_enum(catch_all)]
    Other(u8),
}

/// Plug and Play minor function codes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PnpMinor {
    /// `IRP_MN_START_DEVICE`.
    StartDevice = 0x00,
    /// `IRP_MN_QUERY_REMOVE_DEVICE`.
    QueryRemoveDevice = 0x01,
    /// `IRP_MN_REMOVE_DEVICE`.
    RemoveDevice = 0x02,
    /// `IRP_MN_CANCEL_REMOVE_DEVICE`.
    CancelRemoveDevice = 0x03,
    /// `IRP_MN_STOP_DEVICE`.
    StopDevice = 0x04,
    /// `IRP_MN_QUERY_STOP_DEVICE`.
    QueryStopDevice = 0x05,
    /// `IRP_MN_CANCEL_STOP_DEVICE`.
    CancelStopDevice = 0x06,
    /// `IRP_MN_QUERY_DEVICE_RELATIONS`.
    QueryDeviceRelations = 0x07,
    /// `IRP_MN_QUERY_INTERFACE`.
    QueryInterface = 0x08,
    /// `IRP_MN_QUERY_CAPABILITIES`.
    QueryCapabilities = 0x09,
    /// `IRP_MN_SURPRISE_REMOVAL`.
    SurpriseRemoval = 0x17,
    /// Any other code.
    #[num_enum(catch_all)]
    Other(u8),
}

/// Device power states.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DevicePowerState {
    /// Fully on.
    D0 = 1,
    /// Low power, context kept.
    D1 = 2,
    /// Lower power, context may be lost.
    D2 = 3,
    /// Off.
    D3 = 4,
}

impl DevicePowerState {
    /// Only D0 is operational; every other state powers the capability down.
    #[inline]
    #[must_use]
    pub fn is_operational(self) -> bool {
        self == DevicePowerState::D0
    }
}

/// System power states.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SystemPowerState {
    /// S0.
    Working = 1,
    /// S1.
    Sleeping1 = 2,
    /// S2.
    Sleeping2 = 3,
    /// S3.
    Sleeping3 = 4,
    /// S4.
    Hibernate = 5,
    /// S5.
    Shutdown = 6,
}

/// Target of a power request.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PowerState {
    /// A device power state.
    Device(DevicePowerState),
    /// A system power state.
    System(SystemPowerState),
}

/// Power minor functions, with their parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PowerMinor {
    /// `IRP_MN_WAIT_WAKE`.
    WaitWake,
    /// `IRP_MN_POWER_SEQUENCE`.
    PowerSequence,
    /// `IRP_MN_SET_POWER` with the target state.
    SetPower(PowerState),
    /// `IRP_MN_QUERY_POWER` with the target state.
    QueryPower(PowerState),
}
