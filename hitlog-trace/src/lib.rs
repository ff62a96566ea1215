//! Run-trace container and replay host.
//!
//! A run trace is the recorded event stream of one execution of a target
//! process: which images were loaded where, and every instruction execution
//! in order. External tracers write the stream with [`TraceWriter`]; the
//! [`replay`] module drives the stream through the engine's capability
//! interface exactly the way a live instrumentation host would, producing
//! the hit-count artifact without re-running the target.

pub mod record;
pub mod replay;

use std::io::{self, BufReader, BufWriter, Read, Write};

use record::{Exec, Image, Record, RecordKind, MAGIC_BYTES};

/// Streaming reader for run traces.
///
/// Records are framed by their kind tag; the internal buffer is reused
/// across records.
pub struct TraceReader<R> {
    reader: BufReader<R>,
    buffer: Vec<u8>,
}

impl<R: Read> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buffer: Vec::with_capacity(256),
        }
    }

    /// Reads the next record. Returns `None` at a clean end of stream; a
    /// stream that ends inside a record is an error.
    pub fn next_record(&mut self) -> Result<Option<Record>, ReadError> {
        let Some(tag) = self.read_tag()? else {
            return Ok(None);
        };
        let kind = RecordKind::try_from(tag).map_err(record::Error::from)?;
        match kind {
            RecordKind::Magic => {
                self.fill(MAGIC_BYTES.len())?;
                if self.buffer.as_slice() != MAGIC_BYTES.as_slice() {
                    return Err(record::Error::InvalidMagic.into());
                }
                Ok(Some(Record::Magic))
            }
            RecordKind::Image => {
                self.fill(Image::HEADER_LEN)?;
                let name_len = u16::from_le_bytes([self.buffer[17], self.buffer[18]]) as usize;
                self.extend(name_len)?;
                Ok(Some(Record::Image(Image::parse(&self.buffer)?)))
            }
            RecordKind::Exec => {
                self.fill(Exec::PAYLOAD_LEN)?;
                Ok(Some(Record::Exec(Exec::parse(&self.buffer)?)))
            }
        }
    }

    fn read_tag(&mut self) -> Result<Option<u8>, ReadError> {
        let mut tag = [0u8; 1];
        loop {
            match self.reader.read(&mut tag) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(tag[0])),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(ReadError::Io(err)),
            }
        }
    }

    fn fill(&mut self, len: usize) -> Result<(), ReadError> {
        self.buffer.resize(len, 0);
        read_mid_record(&mut self.reader, &mut self.buffer[..])
    }

    fn extend(&mut self, extra: usize) -> Result<(), ReadError> {
        let start = self.buffer.len();
        self.buffer.resize(start + extra, 0);
        read_mid_record(&mut self.reader, &mut self.buffer[start..])
    }
}

fn read_mid_record<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<(), ReadError> {
    reader.read_exact(buffer).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => ReadError::Truncated,
        _ => ReadError::Io(err),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Record(#[from] record::Error),

    #[error("trace ends in the middle of a record")]
    Truncated,
}

/// Buffered run-trace writer; emits the magic record on creation.
pub struct TraceWriter<W: Write> {
    writer: BufWriter<W>,
    buffer: Vec<u8>,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(writer: W) -> io::Result<Self> {
        let mut writer = Self {
            writer: BufWriter::new(writer),
            buffer: Vec::with_capacity(64),
        };
        writer.write(&Record::Magic)?;
        Ok(writer)
    }

    pub fn write(&mut self, record: &Record) -> io::Result<()> {
        record.emit(&mut self.buffer);
        self.writer.write_all(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }

    /// Flushes buffered records into the underlying writer.
    pub fn finish(mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_traces_round_trip_through_the_container() {
        let mut bytes = Vec::new();
        let mut writer = TraceWriter::new(&mut bytes).unwrap();
        writer
            .write(&Image::new("/usr/bin/nc", 0x1000, 0x1010, true).into())
            .unwrap();
        writer.write(&Exec::new(0x1000).into()).unwrap();
        writer.write(&Exec::new(0x1008).into()).unwrap();
        writer.finish().unwrap();

        let mut reader = TraceReader::new(bytes.as_slice());
        assert_eq!(reader.next_record().unwrap(), Some(Record::Magic));
        let Some(Record::Image(image)) = reader.next_record().unwrap() else {
            panic!("expected an image record");
        };
        assert_eq!(image.name(), "/usr/bin/nc");
        assert_eq!(
            reader.next_record().unwrap(),
            Some(Record::Exec(Exec::new(0x1000)))
        );
        assert_eq!(
            reader.next_record().unwrap(),
            Some(Record::Exec(Exec::new(0x1008)))
        );
        assert_eq!(reader.next_record().unwrap(), None);
    }

    #[test]
    fn ensure_truncated_traces_are_detected() {
        let mut bytes = Vec::new();
        let mut writer = TraceWriter::new(&mut bytes).unwrap();
        writer.write(&Exec::new(0x1000).into()).unwrap();
        writer.finish().unwrap();
        bytes.truncate(bytes.len() - 2);

        let mut reader = TraceReader::new(bytes.as_slice());
        assert_eq!(reader.next_record().unwrap(), Some(Record::Magic));
        assert!(matches!(reader.next_record(), Err(ReadError::Truncated)));
    }

    #[test]
    fn ensure_unknown_tags_are_errors() {
        let mut reader = TraceReader::new([0x7fu8, 0, 0].as_slice());
        assert!(matches!(
            reader.next_record(),
            Err(ReadError::Record(record::Error::UnknownRecordKind(_)))
        ));
    }

    #[test]
    fn ensure_corrupt_magic_is_rejected() {
        let mut reader = TraceReader::new([0xf0u8, b'H', b'I', b'T', b'X', 0, 0, 0].as_slice());
        assert!(matches!(
            reader.next_record(),
            Err(ReadError::Record(record::Error::InvalidMagic))
        ));
    }
}
