//! Request routing.
//!
//! | Operation                         | Handling                                         |
//! |-----------------------------------|--------------------------------------------------|
//! | read-report                       | queued until a report arrives                    |
//! | other known device-control codes  | serviced synchronously through the capability    |
//! | unknown device-control codes      | failed with `NotSupported`                       |
//! | PnP start                         | forwarded synchronously, then device powered up  |
//! | other PnP                         | state transition, then passed down               |
//! | power                             | device-power transition, then passed down        |
//! | anything else                     | passed down untouched                            |

use crate::{
    interface::HidInterface,
    ioctl::{IoControlCode, PnpMinor, PowerMinor, PowerState},
    lower::{forward_synchronously, pass_through},
    request::{DeviceControl, Operation, Request},
    Disposition, Fdo, HidError, Result,
};

impl Fdo {
    /// Route a request to its handler.
    ///
    /// The request is always consumed: it is completed here, queued, or
    /// handed to the lower layer. The return value mirrors the outcome the
    /// originator will see, with [`Disposition::Pending`] meaning the outcome
    /// arrives later through the request's handle.
    pub fn dispatch(&self, request: Request) -> Result<Disposition> {
        tracing::trace!(request = %request.id(), operation = ?request.operation(), "dispatch");
        let operation = request.operation().clone();
        match operation {
            Operation::InternalDeviceControl(control) => self.device_control(control, request),
            Operation::Pnp(minor) => self.pnp(minor, request),
            Operation::Power(minor) => self.power(minor, request),
            Operation::Other(_) => pass_through(self.lower.as_ref(), request),
        }
    }

    fn device_control(&self, control: DeviceControl, mut request: Request) -> Result<Disposition> {
        let Ok(code) = IoControlCode::try_from(control.code) else {
            tracing::debug!(code = format_args!("{:08x}", control.code), "unsupported control code");
            request.complete(Err(HidError::NotSupported));
            return Err(HidError::NotSupported);
        };
        if code == IoControlCode::ReadReport {
            return self.read_report(request);
        }

        let result = self
            .lifecycle
            .with_capability(|hid| call_capability(hid, code, control, request.buffer_mut()));
        match &result {
            Ok(information) => tracing::trace!(?code, information, "control request serviced"),
            Err(e) => tracing::debug!(?code, error = %e, "control request failed"),
        }
        request.complete(result);
        result.map(|information| Disposition::Complete { information })
    }

    fn read_report(&self, request: Request) -> Result<Disposition> {
        let id = request.id();
        self.queue.insert(request)?;

        // While powered down the read stays queued; power-up requests a
        // report for every queued read.
        let requested = self.lifecycle.with_capability(|hid| {
            hid.read_report();
            Ok(())
        });
        if requested.is_err() {
            tracing::debug!(request = %id, "capability inactive, read left queued");
        }
        Ok(Disposition::Pending)
    }

    fn pnp(&self, minor: PnpMinor, mut request: Request) -> Result<Disposition> {
        match minor {
            PnpMinor::StartDevice => return self.start(request),
            PnpMinor::QueryStopDevice | PnpMinor::QueryRemoveDevice => self.lifecycle.suspend(),
            PnpMinor::CancelStopDevice | PnpMinor::CancelRemoveDevice => self.lifecycle.resume(),
            PnpMinor::StopDevice => self.lifecycle.stop(),
            PnpMinor::RemoveDevice | PnpMinor::SurpriseRemoval => self.lifecycle.remove(),
            _ => return pass_through(self.lower.as_ref(), request),
        }
        tracing::debug!(?minor, state = ?self.lifecycle.state(), "pnp transition");
        request.set_status(Ok(()));
        pass_through(self.lower.as_ref(), request)
    }

    fn start(&self, request: Request) -> Result<Disposition> {
        let request = forward_synchronously(self.lower.as_ref(), request)?;
        if let Err(e) = request.status() {
            tracing::error!(error = %e, "lower layer failed to start");
            request.complete_with_status();
            return Err(e);
        }

        let result = self.lifecycle.start();
        match result {
            Ok(()) => tracing::info!("device started"),
            Err(e) => tracing::error!(error = %e, "failed to start device"),
        }
        request.complete(result.map(|()| 0));
        result.map(|()| Disposition::Complete { information: 0 })
    }

    fn power(&self, minor: PowerMinor, request: Request) -> Result<Disposition> {
        if let PowerMinor::SetPower(PowerState::Device(power)) = minor {
            // The lower layer still sees the request if the transition fails.
            if let Err(e) = self.lifecycle.set_power(power) {
                tracing::warn!(?power, error = %e, "device power transition failed");
            } else {
                tracing::debug!(?power, enabled = self.lifecycle.is_enabled(), "device power");
            }
        }
        pass_through(self.lower.as_ref(), request)
    }
}

fn call_capability(
    hid: &dyn HidInterface,
    code: IoControlCode,
    control: DeviceControl,
    buffer: &mut [u8],
) -> Result<usize> {
    let DeviceControl {
        string_id, report_id, ..
    } = control;
    match code {
        IoControlCode::GetDeviceAttributes => hid.get_device_attributes(buffer),
        IoControlCode::GetDeviceDescriptor => hid.get_device_descriptor(buffer),
        IoControlCode::GetReportDescriptor => hid.get_report_descriptor(buffer),
        IoControlCode::GetString => hid.get_string(string_id, buffer),
        IoControlCode::GetIndexedString => hid.get_indexed_string(string_id, buffer),
        IoControlCode::GetFeature => hid.get_feature(report_id, buffer),
        IoControlCode::GetInputReport => hid.get_input_report(report_id, buffer),
        IoControlCode::SetFeature => hid.set_feature(report_id, buffer).map(|()| 0),
        IoControlCode::SetOutputReport => hid.set_output_report(report_id, buffer).map(|()| 0),
        IoControlCode::WriteReport => hid.write_report(report_id, buffer).map(|()| 0),
        // Queued by the caller, never serviced synchronously.
        IoControlCode::ReadReport => Err(HidError::NotSupported),
    }
}
