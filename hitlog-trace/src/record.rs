//! On-disk record format for recorded runs.
//!
//! A run trace is the magic record followed by any sequence of image-load
//! and execution records, in the order the events occurred. All multi-byte
//! fields are little-endian regardless of the traced architecture; the only
//! variable-length field is the image name.

/// Enumeration of record types; the first byte of every record.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Magic = 0xf0,
    Image = 0x10,
    Exec = 0x20,
}

impl TryFrom<u8> for RecordKind {
    type Error = UnknownRecordKind;

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xf0 => Ok(Self::Magic),
            0x10 => Ok(Self::Image),
            0x20 => Ok(Self::Exec),
            _ => Err(UnknownRecordKind(value)),
        }
    }
}

/// Magic payload identifying a run trace, version included.
pub static MAGIC_BYTES: &[u8; 7] = b"HITLOG\x01";

/// A parsed record corresponding to one recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Magic,
    Image(Image),
    Exec(Exec),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Magic => RecordKind::Magic,
            Self::Image(_) => RecordKind::Image,
            Self::Exec(_) => RecordKind::Exec,
        }
    }

    /// Serializes the record, tag byte included, into the provided buffer.
    pub fn emit(&self, buffer: &mut Vec<u8>) {
        match self {
            Self::Magic => {
                buffer.push(RecordKind::Magic as u8);
                buffer.extend_from_slice(MAGIC_BYTES);
            }
            Self::Image(record) => record.emit(buffer),
            Self::Exec(record) => record.emit(buffer),
        }
    }
}

impl From<Image> for Record {
    fn from(record: Image) -> Self {
        Self::Image(record)
    }
}

impl From<Exec> for Record {
    fn from(record: Exec) -> Self {
        Self::Exec(record)
    }
}

/// Record describing one image loaded into the target process.
///
/// # Format
///
/// `| 0x10 | low: le64 | high: le64 | flags: u8 | name_len: le16 | name: [u8] |`
///
/// Bit 0 of `flags` marks the process's main executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    name: String,
    low: u64,
    high: u64,
    main: bool,
}

impl Image {
    const MAIN_EXECUTABLE: u8 = 1 << 0;

    /// Fixed-size part of the payload: low, high, flags and name length.
    pub(crate) const HEADER_LEN: usize = 8 + 8 + 1 + 2;

    pub fn new(name: impl Into<String>, low: u64, high: u64, main: bool) -> Self {
        Self {
            name: name.into(),
            low,
            high,
            main,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn low(&self) -> u64 {
        self.low
    }

    pub fn high(&self) -> u64 {
        self.high
    }

    pub fn main(&self) -> bool {
        self.main
    }

    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let (low, bytes) = parse_le64(bytes)?;
        let (high, bytes) = parse_le64(bytes)?;
        let (&flags, bytes) = bytes.split_first().ok_or(Error::NotEnoughBytes)?;
        let (name_len, bytes) = parse_le16(bytes)?;
        let name = bytes.get(..name_len as usize).ok_or(Error::NotEnoughBytes)?;
        let name = std::str::from_utf8(name).map_err(|_| Error::BadImageName)?;
        Ok(Self {
            name: name.to_string(),
            low,
            high,
            main: flags & Self::MAIN_EXECUTABLE != 0,
        })
    }

    fn emit(&self, buffer: &mut Vec<u8>) {
        let name = self.name.as_bytes();
        debug_assert!(name.len() <= u16::MAX as usize);
        buffer.push(RecordKind::Image as u8);
        buffer.extend_from_slice(&self.low.to_le_bytes());
        buffer.extend_from_slice(&self.high.to_le_bytes());
        buffer.push(if self.main { Self::MAIN_EXECUTABLE } else { 0 });
        buffer.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buffer.extend_from_slice(name);
    }
}

/// Record indicating that the instruction at `pc` is about to execute.
///
/// # Format
///
/// `| 0x20 | pc: le64 |`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Exec {
    pc: u64,
}

impl Exec {
    pub(crate) const PAYLOAD_LEN: usize = 8;

    pub fn new(pc: u64) -> Self {
        Self { pc }
    }

    pub fn pc(&self) -> u64 {
        self.pc
    }

    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let (pc, _) = parse_le64(bytes)?;
        Ok(Self { pc })
    }

    fn emit(&self, buffer: &mut Vec<u8>) {
        buffer.push(RecordKind::Exec as u8);
        buffer.extend_from_slice(&self.pc.to_le_bytes());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("record contains invalid magic bytes")]
    InvalidMagic,

    #[error(transparent)]
    UnknownRecordKind(#[from] UnknownRecordKind),

    #[error("record data does not contain enough bytes")]
    NotEnoughBytes,

    #[error("image name is not valid UTF-8")]
    BadImageName,
}

#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("unknown record kind: {0:#x}")]
pub struct UnknownRecordKind(pub(crate) u8);

fn parse_le64(bytes: &[u8]) -> Result<(u64, &[u8]), Error> {
    if bytes.len() < 8 {
        return Err(Error::NotEnoughBytes);
    }
    let (left, right) = bytes.split_at(8);
    let mut buffer = [0u8; 8];
    buffer.copy_from_slice(left);
    Ok((u64::from_le_bytes(buffer), right))
}

fn parse_le16(bytes: &[u8]) -> Result<(u16, &[u8]), Error> {
    if bytes.len() < 2 {
        return Err(Error::NotEnoughBytes);
    }
    let (left, right) = bytes.split_at(2);
    let mut buffer = [0u8; 2];
    buffer.copy_from_slice(left);
    Ok((u16::from_le_bytes(buffer), right))
}
