//! STPv3 request frames

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use tracing::trace;

use crate::{
    command::Command,
    constants::{BROADCAST_RID, MAX_TID_LENGTH, ProtocolMode, STX},
    crc,
    error::{Error, Result},
    flags::RequestFlags,
    tag::{Tag, TagType},
};

/// STPv3 request
///
/// # Frame Structure
///
/// ```text
/// ┌─────┬────────┬───────┬─────────┬───────┬──────────────────────┬───────┐
/// │ STX │ Length │ Flags │ Command │ [RID] │ [Tag] [AFI] [Session] │  CRC  │
/// │ 1 B │ 2 B BE │ 2 B BE│  2 B BE │  4 B  │ [Addr Blocks] [Data]  │ 2 B BE│
/// └─────┴────────┴───────┴─────────┴───────┴──────────────────────┴───────┘
/// ```
///
/// `Length` counts every byte from `Flags` through `CRC`. The CRC covers
/// `Length` through the last field.
///
/// Optional fields appear in this fixed order:
///
/// - RID: 4 bytes, only when not broadcast (sets `RID`)
/// - Tag: type(2), then TID length(1) + TID when a TID is set (sets `TID`)
/// - AFI: 1 byte when non-zero (sets `AFI`)
/// - Session: 1 byte when non-zero (sets `SESSION`)
/// - Address(2) + blocks(2): when the command requires them
/// - Data: length(2) + bytes when the command requires them (sets `DATA`)
///
/// # Examples
///
/// ```
/// use skyetek_core::{Command, Request, Tag};
///
/// let request = Request::new(Command::SelectTag)
///     .with_tag(Tag::new())
///     .inventory(true);
///
/// let frame = request.encode().unwrap();
/// assert_eq!(frame[0], 0x02);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Request {
    mode: ProtocolMode,
    command: Command,
    tag: Option<Tag>,
    rid: [u8; 4],
    address: u16,
    blocks: u16,
    data: Option<Bytes>,
    afi: u8,
    session: u8,
    flags: RequestFlags,
}

impl Request {
    /// Fixed bytes before the optional fields: STX, length, flags, command
    pub const HEADER_SIZE: usize = 7;

    /// Smallest encodable frame (header plus CRC)
    pub const MIN_FRAME_SIZE: usize = Self::HEADER_SIZE + 2;

    /// Create a broadcast request with no optional fields
    pub fn new(command: Command) -> Self {
        Self {
            mode: ProtocolMode::Binary,
            command,
            tag: None,
            rid: BROADCAST_RID,
            address: 0,
            blocks: 0,
            data: None,
            afi: 0,
            session: 0,
            flags: RequestFlags::empty(),
        }
    }

    /// Set the framing mode
    pub fn with_mode(mut self, mode: ProtocolMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the target tag
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Address a specific reader
    pub fn with_rid(mut self, rid: [u8; 4]) -> Self {
        self.rid = rid;
        self
    }

    /// Set address and block count
    pub fn with_address(mut self, address: u16, blocks: u16) -> Self {
        self.address = address;
        self.blocks = blocks;
        self
    }

    /// Set the data payload
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the application family identifier
    pub fn with_afi(mut self, afi: u8) -> Self {
        self.afi = afi;
        self
    }

    /// Set the session byte
    pub fn with_session(mut self, session: u8) -> Self {
        self.session = session;
        self
    }

    /// Add caller-controlled flags (LOOP, INV, LOCK, RF, ENCRYPTION, HMAC)
    pub fn with_flags(mut self, flags: RequestFlags) -> Self {
        self.flags |= flags - RequestFlags::FIELD_DERIVED;
        self
    }

    /// Toggle inventory mode
    pub fn inventory(mut self, enabled: bool) -> Self {
        self.flags.set(RequestFlags::INV, enabled);
        self
    }

    /// Toggle loop mode
    pub fn looping(mut self, enabled: bool) -> Self {
        self.flags.set(RequestFlags::LOOP, enabled);
        self
    }

    /// Replace the target tag in place
    pub fn set_tag(&mut self, tag: Option<Tag>) {
        self.tag = tag;
    }

    /// Replace the data payload in place
    pub fn set_data(&mut self, data: Option<Bytes>) {
        self.data = data;
    }

    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    pub fn rid(&self) -> [u8; 4] {
        self.rid
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn blocks(&self) -> u16 {
        self.blocks
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn afi(&self) -> u8 {
        self.afi
    }

    pub fn session(&self) -> u8 {
        self.session
    }

    /// Caller-controlled flags
    pub fn flags(&self) -> RequestFlags {
        self.flags
    }

    pub fn is_inventory(&self) -> bool {
        self.flags.contains(RequestFlags::INV)
    }

    pub fn is_loop(&self) -> bool {
        self.flags.contains(RequestFlags::LOOP)
    }

    /// Targets a specific reader rather than broadcasting
    pub fn is_addressed(&self) -> bool {
        self.rid != BROADCAST_RID
    }

    /// Default response timeout for this request's command
    pub fn timeout(&self) -> std::time::Duration {
        self.command.timeout()
    }

    /// Facts a response needs to locate its fields
    pub fn context(&self) -> RequestContext {
        RequestContext {
            mode: self.mode,
            command: self.command,
            tag: self.tag.clone(),
            rid: self.rid,
        }
    }

    /// Serialize to a binary STPv3 frame
    ///
    /// # Errors
    ///
    /// - [`Error::AsciiModeUnsupported`] in ASCII mode
    /// - [`Error::MissingTag`], [`Error::MissingBlocks`], [`Error::MissingData`]
    ///   when the command requires a field that is absent
    /// - [`Error::TidTooLong`], [`Error::PayloadTooLarge`] on oversized fields
    pub fn encode(&self) -> Result<BytesMut> {
        if self.mode == ProtocolMode::Ascii {
            return Err(Error::AsciiModeUnsupported);
        }

        let name = self.command.name();
        let mut flags = (self.flags - RequestFlags::FIELD_DERIVED) | RequestFlags::CRC;
        let mut buf = BytesMut::with_capacity(Self::MIN_FRAME_SIZE + 32);

        // Length and flags are patched once all fields are known
        buf.put_u8(STX);
        buf.put_u16(0);
        buf.put_u16(0);
        buf.put_u16(self.command.code());

        if self.is_addressed() {
            flags |= RequestFlags::RID;
            buf.put_slice(&self.rid);
        }

        if self.command.requires_tag() {
            let tag = self.tag.as_ref().ok_or(Error::MissingTag { command: name })?;
            buf.put_u16(tag.tag_type.code());

            if let Some(tid) = tag.tid.as_ref().filter(|tid| !tid.is_empty()) {
                if tid.len() > MAX_TID_LENGTH {
                    return Err(Error::TidTooLong {
                        len: tid.len(),
                        max: MAX_TID_LENGTH,
                    });
                }

                flags |= RequestFlags::TID;
                buf.put_u8(tid.len() as u8);
                buf.put_slice(tid);
            }
        }

        if self.afi != 0 {
            flags |= RequestFlags::AFI;
            buf.put_u8(self.afi);
        }

        if self.session != 0 {
            flags |= RequestFlags::SESSION;
            buf.put_u8(self.session);
        }

        if self.command.requires_address() {
            if self.blocks == 0 {
                return Err(Error::MissingBlocks { command: name });
            }

            buf.put_u16(self.address);
            buf.put_u16(self.blocks);
        }

        if self.command.requires_data() {
            let data = self
                .data
                .as_ref()
                .filter(|data| !data.is_empty())
                .ok_or(Error::MissingData { command: name })?;

            if data.len() > u16::MAX as usize {
                return Err(Error::PayloadTooLarge {
                    size: data.len(),
                    max: u16::MAX as usize,
                });
            }

            flags |= RequestFlags::DATA;
            buf.put_u16(data.len() as u16);
            buf.put_slice(data);
        }

        // Everything after the length field, plus the CRC
        let length = buf.len() - 3 + 2;
        if length > u16::MAX as usize {
            return Err(Error::PayloadTooLarge {
                size: length,
                max: u16::MAX as usize,
            });
        }

        buf[1..3].copy_from_slice(&(length as u16).to_be_bytes());
        buf[3..5].copy_from_slice(&flags.bits().to_be_bytes());

        let crc = crc::stpv3(0, &buf[1..]);
        buf.put_u16(crc);

        trace!(
            command = %self.command,
            flags = format!("0x{:04X}", flags.bits()),
            len = buf.len(),
            "Encoded request"
        );

        Ok(buf)
    }

    /// Hex string of the encoded frame
    pub fn to_hex(&self) -> Result<String> {
        Ok(hex::encode_upper(self.encode()?))
    }

    /// Parse a binary request frame, the inverse of [`Request::encode`]
    ///
    /// Used by reader emulators and for inspecting captured traffic.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < Self::MIN_FRAME_SIZE {
            return Err(Error::ResponseTooShort {
                expected: Self::MIN_FRAME_SIZE,
                actual: frame.len(),
            });
        }

        let declared = u16::from_be_bytes([frame[1], frame[2]]) as usize;
        if frame[0] != STX || declared + 3 != frame.len() {
            return Err(Error::InvalidLength {
                declared,
                actual: frame.len(),
            });
        }

        if let Some((calculated, received)) = crc::stpv3_check(frame) {
            if calculated != received {
                return Err(Error::CrcMismatch {
                    expected: calculated,
                    received,
                });
            }
        }

        let mut body = &frame[3..frame.len() - 2];
        let flags = RequestFlags::from_bits_retain(body.get_u16());
        let command = Command::try_from(body.get_u16())?;

        let mut request = Request::new(command);
        request.flags = flags - RequestFlags::FIELD_DERIVED;

        if flags.contains(RequestFlags::RID) {
            let rid = take(&mut body, 4, "RID")?;
            request.rid.copy_from_slice(&rid);
        }

        if command.requires_tag() {
            let tag_type = TagType(take_u16(&mut body, "tag type")?);
            let tid = if flags.contains(RequestFlags::TID) {
                let len = take(&mut body, 1, "TID length")?[0] as usize;
                Some(take(&mut body, len, "TID")?)
            } else {
                None
            };

            request.tag = Some(Tag { tag_type, tid });
        }

        if flags.contains(RequestFlags::AFI) {
            request.afi = take(&mut body, 1, "AFI")?[0];
        }

        if flags.contains(RequestFlags::SESSION) {
            request.session = take(&mut body, 1, "session")?[0];
        }

        if command.requires_address() {
            request.address = take_u16(&mut body, "address")?;
            request.blocks = take_u16(&mut body, "blocks")?;
        }

        if flags.contains(RequestFlags::DATA) {
            let len = take_u16(&mut body, "data length")? as usize;
            request.data = Some(take(&mut body, len, "data")?);
        }

        Ok(request)
    }
}

fn take(body: &mut &[u8], n: usize, field: &'static str) -> Result<Bytes> {
    if body.remaining() < n {
        return Err(Error::FieldOutOfBounds {
            field,
            offset: 0,
            needed: n,
            len: body.remaining(),
        });
    }

    Ok(body.copy_to_bytes(n))
}

fn take_u16(body: &mut &[u8], field: &'static str) -> Result<u16> {
    if body.remaining() < 2 {
        return Err(Error::FieldOutOfBounds {
            field,
            offset: 0,
            needed: 2,
            len: body.remaining(),
        });
    }

    Ok(body.get_u16())
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("command", &self.command)
            .field("tag", &self.tag)
            .field("rid", &hex::encode_upper(self.rid))
            .field("address", &format!("0x{:04X}", self.address))
            .field("blocks", &self.blocks)
            .field("data_len", &self.data.as_ref().map_or(0, |d| d.len()))
            .field("flags", &self.flags)
            .finish()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request[{}]", self.command)?;
        if self.is_addressed() {
            write!(f, "(rid={})", hex::encode_upper(self.rid))?;
        }
        Ok(())
    }
}

/// Snapshot of the request fields that shape a response's layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub mode: ProtocolMode,
    pub command: Command,
    pub tag: Option<Tag>,
    pub rid: [u8; 4],
}

impl RequestContext {
    /// Request targeted a specific reader
    pub fn is_addressed(&self) -> bool {
        self.rid != BROADCAST_RID
    }

    /// Requested tag type; a missing tag counts as auto-detect
    pub fn tag_type(&self) -> TagType {
        self.tag.as_ref().map_or(TagType::AUTO_DETECT, |t| t.tag_type)
    }

    /// Requested TID, if any
    pub fn tid(&self) -> Option<Bytes> {
        self.tag.as_ref().and_then(|t| t.tid.clone())
    }
}

impl From<&Request> for RequestContext {
    fn from(request: &Request) -> Self {
        request.context()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn full_request(command: Command) -> Request {
        let mut request = Request::new(command);
        if command.requires_tag() {
            request = request.with_tag(Tag::with_tid(TagType::MIFARE_1K, vec![0x04, 0xA1, 0xB2, 0xC3]));
        }
        if command.requires_address() {
            request = request.with_address(0x0010, 2);
        }
        if command.requires_data() {
            request = request.with_data(vec![0xCA, 0xFE]);
        }
        request
    }

    #[test]
    fn test_encode_select_tag_minimal() {
        let frame = Request::new(Command::SelectTag)
            .with_tag(Tag::new())
            .encode()
            .unwrap();

        // STX, len=8, flags=CRC, cmd=0x0101, type=0x0000, crc
        assert_eq!(&frame[..9], &[0x02, 0x00, 0x08, 0x00, 0x20, 0x01, 0x01, 0x00, 0x00]);
        assert_eq!(frame.len(), 11);

        let (calculated, received) = crc::stpv3_check(&frame).unwrap();
        assert_eq!(calculated, received);
    }

    #[test]
    fn test_encode_sets_field_flags() {
        let frame = Request::new(Command::SelectTag)
            .with_tag(Tag::with_tid(TagType::AUTO_DETECT, vec![0x01, 0x02]))
            .with_rid([0x00, 0x00, 0x00, 0x01])
            .with_afi(0x07)
            .with_session(0x01)
            .inventory(true)
            .encode()
            .unwrap();

        let flags = RequestFlags::from_bits_retain(u16::from_be_bytes([frame[3], frame[4]]));
        assert_eq!(
            flags,
            RequestFlags::CRC
                | RequestFlags::RID
                | RequestFlags::TID
                | RequestFlags::AFI
                | RequestFlags::SESSION
                | RequestFlags::INV
        );

        // RID immediately follows the command
        assert_eq!(&frame[7..11], &[0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_encode_length_matches_frame() {
        let frame = full_request(Command::WriteTag).encode().unwrap();
        let declared = u16::from_be_bytes([frame[1], frame[2]]) as usize;
        assert_eq!(declared + 3, frame.len());
    }

    #[test]
    fn test_encode_missing_tag() {
        let result = Request::new(Command::ReadTag).with_address(0, 1).encode();
        assert_eq!(result, Err(Error::MissingTag { command: "Read Tag" }));
    }

    #[test]
    fn test_encode_missing_blocks() {
        let result = Request::new(Command::ReadSystemParameter).encode();
        assert_eq!(result, Err(Error::MissingBlocks { command: "Read System Parameter" }));
    }

    #[test]
    fn test_encode_missing_data() {
        let result = Request::new(Command::WriteSystemParameter)
            .with_address(0x0A, 1)
            .with_data(Vec::new())
            .encode();
        assert_eq!(result, Err(Error::MissingData { command: "Write System Parameter" }));
    }

    #[test]
    fn test_encode_tid_too_long() {
        let result = Request::new(Command::SelectTag)
            .with_tag(Tag::with_tid(TagType::AUTO_DETECT, vec![0u8; 17]))
            .encode();
        assert_eq!(result, Err(Error::TidTooLong { len: 17, max: 16 }));
    }

    #[test]
    fn test_encode_ascii_rejected() {
        let result = Request::new(Command::ScanEas).with_mode(ProtocolMode::Ascii).encode();
        assert_eq!(result, Err(Error::AsciiModeUnsupported));
    }

    #[test]
    fn test_empty_tid_not_encoded() {
        let frame = Request::new(Command::SelectTag)
            .with_tag(Tag::with_tid(TagType::AUTO_DETECT, Vec::new()))
            .encode()
            .unwrap();
        let flags = RequestFlags::from_bits_retain(u16::from_be_bytes([frame[3], frame[4]]));
        assert!(!flags.contains(RequestFlags::TID));
    }

    #[test]
    fn test_with_flags_ignores_field_derived() {
        let request = Request::new(Command::ScanEas).with_flags(RequestFlags::LOOP | RequestFlags::TID);
        assert_eq!(request.flags(), RequestFlags::LOOP);
    }

    #[test]
    fn test_round_trip_whole_catalogue() {
        for &command in Command::ALL {
            let original = full_request(command).looping(true).with_rid([0, 0, 0, 9]);
            let frame = original.encode().unwrap();
            let parsed = Request::parse(&frame).unwrap();

            assert_eq!(parsed.command(), command);
            assert_eq!(parsed.tag(), original.tag());
            assert_eq!(parsed.rid(), original.rid());
            assert_eq!(parsed.data(), original.data());
            assert!(parsed.is_loop());
            if command.requires_address() {
                assert_eq!(parsed.address(), 0x0010);
                assert_eq!(parsed.blocks(), 2);
            }
        }
    }

    #[test]
    fn test_parse_rejects_corruption() {
        let mut frame = full_request(Command::ReadTag).encode().unwrap();
        frame[8] ^= 0x55;
        assert!(matches!(Request::parse(&frame), Err(Error::CrcMismatch { .. })));
    }

    #[test]
    fn test_parse_rejects_short() {
        assert!(matches!(
            Request::parse(&[0x02, 0x00]),
            Err(Error::ResponseTooShort { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_parse_inverts_encode(
            command in proptest::sample::select(Command::ALL),
            rid in any::<[u8; 4]>(),
            tag_type in any::<u16>(),
            tid in proptest::collection::vec(any::<u8>(), 0..=MAX_TID_LENGTH),
            afi in any::<u8>(),
            session in any::<u8>(),
            address in any::<u16>(),
            blocks in 1..=u16::MAX,
            data in proptest::collection::vec(any::<u8>(), 1..64),
            inventory in any::<bool>(),
            looping in any::<bool>(),
        ) {
            let mut request = Request::new(command)
                .with_rid(rid)
                .with_afi(afi)
                .with_session(session)
                .inventory(inventory)
                .looping(looping);
            if command.requires_tag() {
                let tag = if tid.is_empty() {
                    Tag::with_type(TagType(tag_type))
                } else {
                    Tag::with_tid(TagType(tag_type), tid)
                };
                request = request.with_tag(tag);
            }
            if command.requires_address() {
                request = request.with_address(address, blocks);
            }
            if command.requires_data() {
                request = request.with_data(data);
            }

            let frame = request.encode().unwrap();
            let parsed = Request::parse(&frame).unwrap();
            prop_assert_eq!(parsed, request);
        }
    }

    #[test]
    fn test_to_hex() {
        let hex = Request::new(Command::SelectTag).with_tag(Tag::new()).to_hex().unwrap();
        assert!(hex.starts_with("020008002001010000"));
    }

    #[test]
    fn test_context() {
        let request = Request::new(Command::ReadTag).with_rid([1, 2, 3, 4]);
        let context = request.context();
        assert!(context.is_addressed());
        assert_eq!(context.tag_type(), TagType::AUTO_DETECT);
        assert_eq!(context.tid(), None);
    }
}
