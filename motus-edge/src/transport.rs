use std::io;

use motus_core::ArmRequest;

use crate::dispatch::GestureReport;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("unsupported bus clock of {0} Hz")]
    UnsupportedClock(u32),
}

/// Outcome of one FIFO read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Bytes written at the start of the region.
    pub written: usize,
    /// Bytes still queued in the hardware FIFO after this read.
    pub pending: usize,
}

/// Reads raw bytes out of the coprocessor's FIFO.
pub trait TransferSource {
    /// Fill the front of `region` with newly available FIFO bytes.
    fn fill(&mut self, region: &mut [u8]) -> Result<Transfer, BusError>;
}

impl<T: TransferSource + ?Sized> TransferSource for &mut T {
    fn fill(&mut self, region: &mut [u8]) -> Result<Transfer, BusError> {
        (**self).fill(region)
    }
}

/// Command channel to the coprocessor.
pub trait Coprocessor {
    /// Enable a virtual sensor. Re-arming a sensor that is already armed is harmless.
    fn arm(&mut self, request: &ArmRequest) -> Result<(), BusError>;
}

impl<T: Coprocessor + ?Sized> Coprocessor for &mut T {
    fn arm(&mut self, request: &ArmRequest) -> Result<(), BusError> {
        (**self).arm(request)
    }
}

/// Records every request instead of talking to hardware.
impl Coprocessor for Vec<ArmRequest> {
    fn arm(&mut self, request: &ArmRequest) -> Result<(), BusError> {
        self.push(*request);
        Ok(())
    }
}

/// Line-oriented output for gesture reports.
pub trait ReportSink {
    fn emit(&mut self, report: &GestureReport) -> io::Result<()>;
}

impl<T: ReportSink + ?Sized> ReportSink for &mut T {
    fn emit(&mut self, report: &GestureReport) -> io::Result<()> {
        (**self).emit(report)
    }
}

impl ReportSink for Vec<GestureReport> {
    fn emit(&mut self, report: &GestureReport) -> io::Result<()> {
        self.push(*report);
        Ok(())
    }
}

/// Writes one newline-terminated line per report.
pub struct LineSink<W> {
    writer: W,
}

impl<W: io::Write> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: io::Write> ReportSink for LineSink<W> {
    fn emit(&mut self, report: &GestureReport) -> io::Result<()> {
        writeln!(self.writer, "{report}")?;
        self.writer.flush()
    }
}
