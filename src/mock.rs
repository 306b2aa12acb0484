//! Test doubles for the lower layer and the collaborator.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;

use crate::{
    interface::{HidInterface, ReportCallback},
    ioctl::PnpMinor,
    lower::LowerDevice,
    request::{Operation, Request},
    Disposition, HidError, Result,
};

/// Device attributes returned by [`MockInterface`]: vendor 0x5853, product 0x0001.
pub const ATTRIBUTES: [u8; 4] = [0x53, 0x58, 0x01, 0x00];
pub const REPORT_DESCRIPTOR: [u8; 6] = [0x05, 0x01, 0x09, 0x02, 0xa1, 0x01];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub acquire: usize,
    pub release: usize,
    pub enable: usize,
    pub disable: usize,
    pub read_report: usize,
}

#[derive(Default)]
struct Failures {
    acquire: Option<HidError>,
    enable: Option<HidError>,
    control: Option<HidError>,
}

#[derive(Default)]
pub struct MockInterface {
    acquire: AtomicUsize,
    release: AtomicUsize,
    enable: AtomicUsize,
    disable: AtomicUsize,
    read_report: AtomicUsize,
    callback: Mutex<Option<ReportCallback>>,
    failures: Mutex<Failures>,
    written: Mutex<Vec<(u8, Vec<u8>)>>,
}

impl MockInterface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_acquire(&self, error: Option<HidError>) {
        self.failures.lock().acquire = error;
    }

    pub fn fail_enable(&self, error: Option<HidError>) {
        self.failures.lock().enable = error;
    }

    pub fn fail_control(&self, error: Option<HidError>) {
        self.failures.lock().control = error;
    }

    pub fn counts(&self) -> Counts {
        Counts {
            acquire: self.acquire.load(Ordering::SeqCst),
            release: self.release.load(Ordering::SeqCst),
            enable: self.enable.load(Ordering::SeqCst),
            disable: self.disable.load(Ordering::SeqCst),
            read_report: self.read_report.load(Ordering::SeqCst),
        }
    }

    /// Reports written through the set/write calls, with their report ids.
    pub fn written(&self) -> Vec<(u8, Vec<u8>)> {
        self.written.lock().clone()
    }

    /// Deliver `report` the way the backend would. `false` if nothing took it
    /// or the capability is not enabled.
    pub fn deliver(&self, report: &[u8]) -> bool {
        let callback = self.callback.lock().clone();
        callback.is_some_and(|callback| callback.deliver(report))
    }

    fn check(&self) -> Result<()> {
        if self.acquire.load(Ordering::SeqCst) == self.release.load(Ordering::SeqCst) {
            return Err(HidError::Unsuccessful);
        }
        match self.failures.lock().control {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn copy_out(&self, data: &[u8], buffer: &mut [u8]) -> Result<usize> {
        self.check()?;
        let dest = buffer.get_mut(..data.len()).ok_or(HidError::BufferTooSmall)?;
        dest.copy_from_slice(data);
        Ok(data.len())
    }

    fn record(&self, report_id: u8, buffer: &[u8]) -> Result<()> {
        self.check()?;
        self.written.lock().push((report_id, buffer.to_vec()));
        Ok(())
    }
}

impl HidInterface for MockInterface {
    fn acquire(&self) -> Result<()> {
        if let Some(e) = self.failures.lock().acquire {
            return Err(e);
        }
        self.acquire.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.release.fetch_add(1, Ordering::SeqCst);
    }

    fn enable(&self, callback: ReportCallback) -> Result<()> {
        if let Some(e) = self.failures.lock().enable {
            return Err(e);
        }
        self.enable.fetch_add(1, Ordering::SeqCst);
        *self.callback.lock() = Some(callback);
        Ok(())
    }

    fn disable(&self) {
        self.disable.fetch_add(1, Ordering::SeqCst);
        self.callback.lock().take();
    }

    fn get_device_attributes(&self, buffer: &mut [u8]) -> Result<usize> {
        self.copy_out(&ATTRIBUTES, buffer)
    }

    fn get_device_descriptor(&self, buffer: &mut [u8]) -> Result<usize> {
        self.copy_out(&[9, 0x21, 0x11, 0x01], buffer)
    }

    fn get_report_descriptor(&self, buffer: &mut [u8]) -> Result<usize> {
        self.copy_out(&REPORT_DESCRIPTOR, buffer)
    }

    fn get_string(&self, identifier: u32, buffer: &mut [u8]) -> Result<usize> {
        self.copy_out(&identifier.to_le_bytes(), buffer)
    }

    fn get_indexed_string(&self, index: u32, buffer: &mut [u8]) -> Result<usize> {
        self.copy_out(&(index | 0x8000_0000).to_le_bytes(), buffer)
    }

    fn get_feature(&self, report_id: u8, buffer: &mut [u8]) -> Result<usize> {
        self.copy_out(&[report_id, 0xfe], buffer)
    }

    fn set_feature(&self, report_id: u8, buffer: &[u8]) -> Result<()> {
        self.record(report_id, buffer)
    }

    fn get_input_report(&self, report_id: u8, buffer: &mut [u8]) -> Result<usize> {
        self.copy_out(&[report_id, 0x01, 0x02], buffer)
    }

    fn set_output_report(&self, report_id: u8, buffer: &[u8]) -> Result<()> {
        self.record(report_id, buffer)
    }

    fn write_report(&self, report_id: u8, buffer: &[u8]) -> Result<()> {
        self.record(report_id, buffer)
    }

    fn read_report(&self) {
        self.read_report.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Complete before returning.
    Immediate,
    /// Complete later from another thread.
    Deferred,
    /// Drop the request without completing it.
    Dropping,
}

/// Lower layer that answers start and query-interface and records what it saw.
pub struct MockLower {
    mode: Mode,
    start: Result<()>,
    interface: Option<Arc<dyn HidInterface>>,
    calls: Mutex<Vec<(Operation, Result<()>)>>,
}

impl MockLower {
    pub fn new() -> Self {
        Self {
            mode: Mode::Immediate,
            start: Ok(()),
            interface: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn deferred(mut self) -> Self {
        self.mode = Mode::Deferred;
        self
    }

    pub fn dropping(mut self) -> Self {
        self.mode = Mode::Dropping;
        self
    }

    pub fn failing_start(mut self, error: HidError) -> Self {
        self.start = Err(error);
        self
    }

    pub fn with_interface(mut self, interface: Arc<MockInterface>) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Operations handed down, oldest first.
    pub fn calls(&self) -> Vec<Operation> {
        self.calls.lock().iter().map(|(op, _)| op.clone()).collect()
    }

    /// Status each request carried when it arrived here.
    pub fn arrival_statuses(&self) -> Vec<Result<()>> {
        self.calls.lock().iter().map(|(_, status)| *status).collect()
    }
}

impl LowerDevice for MockLower {
    fn call(&self, mut request: Request) -> Result<Disposition> {
        let operation = request.operation().clone();
        self.calls.lock().push((operation.clone(), request.status()));

        match operation {
            Operation::Pnp(PnpMinor::StartDevice) => request.set_status(self.start),
            Operation::Pnp(PnpMinor::QueryInterface) => {
                if let (Some(interface), Some(query)) = (&self.interface, request.interface_query_mut()) {
                    query.provide(interface.clone());
                    request.set_status(Ok(()));
                }
            }
            _ => {}
        }

        match self.mode {
            Mode::Immediate => {
                let status = request.status();
                let information = request.information();
                request.complete_with_status();
                status.map(|()| Disposition::Complete { information })
            }
            Mode::Deferred => {
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    request.complete_with_status();
                });
                Ok(Disposition::Pending)
            }
            Mode::Dropping => {
                drop(request);
                Ok(Disposition::Pending)
            }
        }
    }
}
