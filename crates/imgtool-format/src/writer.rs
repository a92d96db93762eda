//! Streaming archive writer
//!
//! Writes a planned archive front to back: header, directory, padding, then
//! each member's bytes followed by zero fill to the next sector.

use crate::directory::{encode_record, write_header};
use crate::plan::LayoutPlan;
use imgtool_core::{sector_padding, Error, Result};
use std::io::{self, Read, Write};

const ZEROS: [u8; 2048] = [0u8; 2048];

/// Sequential writer for a planned archive
pub struct ArchiveWriter<W: Write> {
    inner: W,
    plan: LayoutPlan,
    next_member: usize,
}

impl<W: Write> ArchiveWriter<W> {
    /// Write header, directory and padding up to the payload region
    pub fn new(mut inner: W, plan: LayoutPlan) -> Result<Self> {
        let entry_count = plan.entries().len() as u32;
        write_header(&mut inner, plan.layout(), entry_count)?;

        for entry in plan.entries() {
            inner.write_all(&encode_record(entry).bytes)?;
        }

        write_zeros(&mut inner, plan.data_start_byte() - plan.directory_size())?;

        Ok(Self {
            inner,
            plan,
            next_member: 0,
        })
    }

    /// The plan being written
    pub fn plan(&self) -> &LayoutPlan {
        &self.plan
    }

    /// Copy the next member's payload from `source`
    ///
    /// Exactly the planned byte size is copied; a source that ends early
    /// fails with an `UnexpectedEof` I/O error.
    pub fn write_member<R: Read + ?Sized>(&mut self, source: &mut R) -> Result<()> {
        let entry = self
            .plan
            .entries()
            .get(self.next_member)
            .ok_or_else(|| Error::validation("more members written than planned"))?;
        let expected = entry.byte_size as u64;

        let copied = io::copy(&mut source.take(expected), &mut self.inner)?;
        if copied != expected {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "member '{}' ended after {} of {} bytes",
                    entry.name, copied, expected
                ),
            )));
        }

        write_zeros(&mut self.inner, sector_padding(expected))?;
        self.next_member += 1;
        Ok(())
    }

    /// Flush and return the underlying writer
    ///
    /// # Errors
    ///
    /// `Error::Validation` if not every planned member was written.
    pub fn finish(mut self) -> Result<W> {
        let planned = self.plan.entries().len();
        if self.next_member != planned {
            return Err(Error::validation(format!(
                "archive incomplete: {} of {} members written",
                self.next_member, planned
            )));
        }

        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn write_zeros<W: Write>(out: &mut W, mut count: u64) -> Result<()> {
    while count > 0 {
        let chunk = count.min(ZEROS.len() as u64) as usize;
        out.write_all(&ZEROS[..chunk])?;
        count -= chunk as u64;
    }
    Ok(())
}
