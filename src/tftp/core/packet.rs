use std::fmt;

use super::convert::Convert;
use super::error::{DecodeError, EncodeError};

/// Maximum payload of a single Data packet
pub const BLOCK_SIZE: usize = 512;

/// Largest datagram the engine accepts; anything larger is rejected
pub const MAX_DATAGRAM: usize = 1024;

/// TFTP opcodes ([RFC 1350](https://www.rfc-editor.org/rfc/rfc1350) section 5)
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Rrq = 1,
    Wrq = 2,
    Data = 3,
    Ack = 4,
    Error = 5,
}

impl Opcode {
    pub fn from_u16(value: u16) -> Result<Self, DecodeError> {
        match value {
            1 => Ok(Opcode::Rrq),
            2 => Ok(Opcode::Wrq),
            3 => Ok(Opcode::Data),
            4 => Ok(Opcode::Ack),
            5 => Ok(Opcode::Error),
            other => Err(DecodeError::UnknownOpcode(other)),
        }
    }
}

/// Transfer mode named in a request.
///
/// Only the two RFC 1350 modes are distinguished; anything else is handled as
/// [`TransferMode::Octet`]. The engine moves bytes unchanged in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    NetAscii,
    #[default]
    Octet,
}

impl TransferMode {
    /// Interpret a mode string from the wire, case-insensitively
    pub fn parse(mode: &[u8]) -> Self {
        if mode.eq_ignore_ascii_case(b"netascii") {
            TransferMode::NetAscii
        } else {
            TransferMode::Octet
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::NetAscii => "netascii",
            TransferMode::Octet => "octet",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TFTP error codes carried in Error packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotDefined,
    FileNotFound,
    AccessViolation,
    DiskFull,
    IllegalOperation,
    UnknownId,
    FileExists,
    NoSuchUser,
    /// Code outside the RFC 1350 table, kept verbatim
    Other(u16),
}

impl From<u16> for ErrorCode {
    fn from(value: u16) -> Self {
        match value {
            0 => ErrorCode::NotDefined,
            1 => ErrorCode::FileNotFound,
            2 => ErrorCode::AccessViolation,
            3 => ErrorCode::DiskFull,
            4 => ErrorCode::IllegalOperation,
            5 => ErrorCode::UnknownId,
            6 => ErrorCode::FileExists,
            7 => ErrorCode::NoSuchUser,
            other => ErrorCode::Other(other),
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::NotDefined => 0,
            ErrorCode::FileNotFound => 1,
            ErrorCode::AccessViolation => 2,
            ErrorCode::DiskFull => 3,
            ErrorCode::IllegalOperation => 4,
            ErrorCode::UnknownId => 5,
            ErrorCode::FileExists => 6,
            ErrorCode::NoSuchUser => 7,
            ErrorCode::Other(value) => value,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCode::NotDefined => "not defined",
            ErrorCode::FileNotFound => "file not found",
            ErrorCode::AccessViolation => "access violation",
            ErrorCode::DiskFull => "disk full",
            ErrorCode::IllegalOperation => "illegal operation",
            ErrorCode::UnknownId => "unknown transfer id",
            ErrorCode::FileExists => "file already exists",
            ErrorCode::NoSuchUser => "no such user",
            ErrorCode::Other(value) => return write!(f, "code {}", value),
        };
        f.write_str(text)
    }
}

/// A TFTP packet
///
/// Filenames, modes and messages are raw byte strings, kept exactly as
/// received; use [`Packet::transfer_mode`] to interpret a mode. They must not
/// contain a zero byte, which [`Packet::rrq`], [`Packet::wrq`] and
/// [`Packet::error`] guarantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Rrq { filename: Vec<u8>, mode: Vec<u8> },
    Wrq { filename: Vec<u8>, mode: Vec<u8> },
    Data { block_num: u16, data: Vec<u8> },
    Ack(u16),
    Error { code: ErrorCode, msg: Vec<u8> },
}

impl Packet {
    /// Decode a UDP payload.
    ///
    /// Data payloads are taken as-is, whatever their length.
    pub fn deserialize(buf: &[u8]) -> Result<Packet, DecodeError> {
        let opcode = Opcode::from_u16(Convert::to_u16(buf, 0)?)?;
        let body = &buf[2..];

        match opcode {
            Opcode::Rrq | Opcode::Wrq => {
                let (filename, rest) = Self::parse_field(
                    body,
                    DecodeError::MissingFilename,
                    DecodeError::EmptyFilename,
                )?;
                let (mode, _) =
                    Self::parse_field(rest, DecodeError::MissingMode, DecodeError::EmptyMode)?;

                let (filename, mode) = (filename.to_vec(), mode.to_vec());
                if opcode == Opcode::Rrq {
                    Ok(Packet::Rrq { filename, mode })
                } else {
                    Ok(Packet::Wrq { filename, mode })
                }
            }
            Opcode::Data => Ok(Packet::Data {
                block_num: Convert::to_u16(buf, 2)?,
                data: buf[4..].to_vec(),
            }),
            Opcode::Ack => Ok(Packet::Ack(Convert::to_u16(buf, 2)?)),
            Opcode::Error => {
                let code = ErrorCode::from(Convert::to_u16(buf, 2)?);
                // an empty message is valid
                let (msg, _) =
                    Convert::take_cstr(&buf[4..]).ok_or(DecodeError::MissingErrorMessage)?;
                Ok(Packet::Error {
                    code,
                    msg: msg.to_vec(),
                })
            }
        }
    }

    fn parse_field(
        buf: &[u8],
        missing: DecodeError,
        empty: DecodeError,
    ) -> Result<(&[u8], &[u8]), DecodeError> {
        match Convert::find_null(buf) {
            None => Err(missing),
            Some(0) => Err(empty),
            Some(_) => Convert::take_cstr(buf).ok_or(missing),
        }
    }

    /// Encode into a UDP payload
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + BLOCK_SIZE);
        buf.extend_from_slice(&(self.opcode() as u16).to_be_bytes());

        match self {
            Packet::Rrq { filename, mode } | Packet::Wrq { filename, mode } => {
                Convert::put_cstr(&mut buf, filename);
                Convert::put_cstr(&mut buf, mode);
            }
            Packet::Data { block_num, data } => {
                buf.extend_from_slice(&block_num.to_be_bytes());
                buf.extend_from_slice(data);
            }
            Packet::Ack(block_num) => buf.extend_from_slice(&block_num.to_be_bytes()),
            Packet::Error { code, msg } => {
                buf.extend_from_slice(&u16::from(*code).to_be_bytes());
                Convert::put_cstr(&mut buf, msg);
            }
        }

        buf
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Packet::Rrq { .. } => Opcode::Rrq,
            Packet::Wrq { .. } => Opcode::Wrq,
            Packet::Data { .. } => Opcode::Data,
            Packet::Ack(_) => Opcode::Ack,
            Packet::Error { .. } => Opcode::Error,
        }
    }

    /// Short packet name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Rrq { .. } => "RRQ",
            Packet::Wrq { .. } => "WRQ",
            Packet::Data { .. } => "DATA",
            Packet::Ack(_) => "ACK",
            Packet::Error { .. } => "ERROR",
        }
    }

    /// Interpreted mode of a request packet
    pub fn transfer_mode(&self) -> Option<TransferMode> {
        match self {
            Packet::Rrq { mode, .. } | Packet::Wrq { mode, .. } => Some(TransferMode::parse(mode)),
            _ => None,
        }
    }

    /// Read request for `filename`
    pub fn rrq(
        filename: impl Into<Vec<u8>>,
        mode: impl Into<Vec<u8>>,
    ) -> Result<Self, EncodeError> {
        let (filename, mode) = Self::request_fields(filename.into(), mode.into())?;
        Ok(Packet::Rrq { filename, mode })
    }

    /// Write request for `filename`
    pub fn wrq(
        filename: impl Into<Vec<u8>>,
        mode: impl Into<Vec<u8>>,
    ) -> Result<Self, EncodeError> {
        let (filename, mode) = Self::request_fields(filename.into(), mode.into())?;
        Ok(Packet::Wrq { filename, mode })
    }

    fn request_fields(
        filename: Vec<u8>,
        mode: Vec<u8>,
    ) -> Result<(Vec<u8>, Vec<u8>), EncodeError> {
        if filename.is_empty() {
            return Err(EncodeError::Empty { field: "filename" });
        }
        if mode.is_empty() {
            return Err(EncodeError::Empty { field: "mode" });
        }
        if Convert::find_null(&filename).is_some() {
            return Err(EncodeError::InteriorNul { field: "filename" });
        }
        if Convert::find_null(&mode).is_some() {
            return Err(EncodeError::InteriorNul { field: "mode" });
        }
        Ok((filename, mode))
    }

    /// Error packet; the message is cut at its first zero byte
    pub fn error(code: ErrorCode, msg: impl Into<Vec<u8>>) -> Self {
        let mut msg = msg.into();
        if let Some(end) = Convert::find_null(&msg) {
            msg.truncate(end);
        }
        Packet::Error { code, msg }
    }
}
