//! STPv3 response frames

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use tracing::{trace, warn};

use crate::{
    command::{Command, is_system_code},
    constants::{MIN_RESPONSE_SIZE, ProtocolMode, STX},
    crc,
    error::{Error, Result},
    request::RequestContext,
    response_code::ResponseCode,
    tag::{Tag, TagType},
};

/// What to do when a response's CRC does not match its contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrcPolicy {
    /// Reject the frame with [`Error::CrcMismatch`]
    #[default]
    Strict,
    /// Log and accept the frame
    Lenient,
}

/// Where a response's tag type comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagTypeSource {
    /// System command; the response has no tag type
    Absent,
    /// Big-endian u16 at this byte offset
    At(usize),
    /// Same as the request's tag type
    Echo,
}

/// Where a response's TID comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TidSource {
    /// System command; the response has no TID
    Absent,
    /// The data field is the TID
    Data,
    /// Same as the request's TID
    Echo,
}

/// Resolved field positions inside a response buffer
///
/// ```text
/// broadcast, generic        STX len code │ dlen data │ crc
///                                          5
/// broadcast, SELECT non-ISO STX len code │ type │ dlen data │ crc
///                                          5      7
/// addressed, generic        STX len code │ rid │ dlen data │ crc
///                                          5     9
/// addressed, SELECT non-ISO STX len code │ rid │ type │ dlen data │ crc
///                                          5     9      11
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    /// Offset of the 2-byte data length prefix
    pub data_offset: usize,
    pub tag_type: TagTypeSource,
    pub tid: TidSource,
}

impl FieldLayout {
    /// Base offset of the first field after the response code
    pub const BASE_OFFSET: usize = 5;

    /// Resolve field positions from the minimal set of facts that shift them
    ///
    /// - `command_code`: the request's command
    /// - `response`: the received response code
    /// - `request_tag_type`: tag type the request carried (auto-detect if none)
    /// - `addressed`: the request targeted a non-broadcast RID
    pub fn resolve(
        command_code: u16,
        response: ResponseCode,
        request_tag_type: TagType,
        addressed: bool,
    ) -> Self {
        let select_pass = response == ResponseCode::SELECT_TAG_PASS;
        let carries_type = select_pass && !request_tag_type.is_iso15693_class();

        let mut data_offset = Self::BASE_OFFSET;
        if carries_type {
            data_offset += 2;
        }
        if addressed {
            data_offset += 4;
        }

        let system = is_system_code(command_code);

        let tag_type = if system {
            TagTypeSource::Absent
        } else if addressed {
            TagTypeSource::At(9)
        } else if carries_type {
            TagTypeSource::At(Self::BASE_OFFSET)
        } else {
            TagTypeSource::Echo
        };

        let tid = if system {
            TidSource::Absent
        } else if select_pass {
            TidSource::Data
        } else {
            TidSource::Echo
        };

        Self {
            data_offset,
            tag_type,
            tid,
        }
    }
}

/// Build a response frame around a body, for reader emulators and tests
///
/// `body` is everything between the response code and the CRC.
pub fn build_frame(code: ResponseCode, body: &[u8]) -> BytesMut {
    let length = 2 + body.len() + 2;
    let mut buf = BytesMut::with_capacity(length + 3);

    buf.put_u8(STX);
    buf.put_u16(length as u16);
    buf.put_u16(code.code());
    buf.put_slice(body);

    let crc = crc::stpv3(0, &buf[1..]);
    buf.put_u16(crc);

    buf
}

/// Decoded STPv3 response
///
/// Holds the raw frame plus the request context needed to locate its
/// fields. Field accessors fail on responses whose code has the failure bit
/// set.
#[derive(Clone, PartialEq, Eq)]
pub struct Response {
    buf: Bytes,
    context: RequestContext,
    crc_valid: bool,
}

impl Response {
    /// Decode a complete frame (`STX | len | code | ... | crc`)
    ///
    /// # Errors
    ///
    /// - [`Error::AsciiModeUnsupported`] if the request was built in ASCII mode
    /// - [`Error::ResponseTooShort`] below 7 bytes
    /// - [`Error::InvalidLength`] when the length field disagrees with the buffer
    /// - [`Error::CrcMismatch`] under [`CrcPolicy::Strict`]
    pub fn decode(context: RequestContext, buf: impl Into<Bytes>, policy: CrcPolicy) -> Result<Self> {
        let buf = buf.into();

        if context.mode == ProtocolMode::Ascii {
            return Err(Error::AsciiModeUnsupported);
        }

        if buf.len() < MIN_RESPONSE_SIZE {
            return Err(Error::ResponseTooShort {
                expected: MIN_RESPONSE_SIZE,
                actual: buf.len(),
            });
        }

        let declared = u16::from_be_bytes([buf[1], buf[2]]) as usize;
        if declared + 3 != buf.len() {
            return Err(Error::InvalidLength {
                declared,
                actual: buf.len(),
            });
        }

        let crc_at = buf.len() - 2;
        let received = u16::from_be_bytes([buf[crc_at], buf[crc_at + 1]]);
        let calculated = crc::stpv3(0, &buf[1..crc_at]);
        let crc_valid = calculated == received;

        if !crc_valid {
            match policy {
                CrcPolicy::Strict => {
                    return Err(Error::CrcMismatch {
                        expected: calculated,
                        received,
                    });
                }
                CrcPolicy::Lenient => {
                    warn!(
                        expected = format!("0x{:04X}", calculated),
                        received = format!("0x{:04X}", received),
                        "Accepting response with bad CRC"
                    );
                }
            }
        }

        let response = Self {
            buf,
            context,
            crc_valid,
        };

        trace!(code = %response.code(), len = response.buf.len(), "Decoded response");

        Ok(response)
    }

    /// Response code at bytes `[3..5]`
    pub fn code(&self) -> ResponseCode {
        ResponseCode(u16::from_be_bytes([self.buf[3], self.buf[4]]))
    }

    /// Length field at bytes `[1..3]`
    pub fn message_length(&self) -> u16 {
        u16::from_be_bytes([self.buf[1], self.buf[2]])
    }

    /// Failure bit of the response code is clear
    pub fn is_success(&self) -> bool {
        self.code().is_success()
    }

    /// The trailing CRC matched (always true under [`CrcPolicy::Strict`])
    pub fn crc_valid(&self) -> bool {
        self.crc_valid
    }

    /// Command that produced this response
    pub fn command(&self) -> Command {
        self.context.command
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Raw frame bytes
    pub fn bytes(&self) -> &Bytes {
        &self.buf
    }

    /// Field positions for this response
    pub fn layout(&self) -> FieldLayout {
        FieldLayout::resolve(
            self.context.command.code(),
            self.code(),
            self.context.tag_type(),
            self.context.is_addressed(),
        )
    }

    fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::UnsuccessfulResponse(self.code()))
        }
    }

    /// Fields end where the CRC starts
    fn field(&self, field: &'static str, offset: usize, needed: usize) -> Result<&[u8]> {
        let end = self.buf.len() - 2;

        if offset + needed > end {
            return Err(Error::FieldOutOfBounds {
                field,
                offset,
                needed,
                len: end,
            });
        }

        Ok(&self.buf[offset..offset + needed])
    }

    /// Length-prefixed data block
    pub fn data(&self) -> Result<Bytes> {
        self.ensure_success()?;

        let offset = self.layout().data_offset;
        let prefix = self.field("data length", offset, 2)?;
        let len = u16::from_be_bytes([prefix[0], prefix[1]]) as usize;

        self.field("data", offset + 2, len)?;
        Ok(self.buf.slice(offset + 2..offset + 2 + len))
    }

    /// Tag type, `None` for system commands
    pub fn tag_type(&self) -> Result<Option<TagType>> {
        self.ensure_success()?;

        match self.layout().tag_type {
            TagTypeSource::Absent => Ok(None),
            TagTypeSource::At(offset) => {
                let raw = self.field("tag type", offset, 2)?;
                Ok(Some(TagType(u16::from_be_bytes([raw[0], raw[1]]))))
            }
            TagTypeSource::Echo => Ok(Some(self.context.tag_type())),
        }
    }

    /// Tag ID, `None` for system commands or when the request carried none
    pub fn tid(&self) -> Result<Option<Bytes>> {
        self.ensure_success()?;

        match self.layout().tid {
            TidSource::Absent => Ok(None),
            TidSource::Data => self.data().map(Some),
            TidSource::Echo => Ok(self.context.tid()),
        }
    }

    /// Discovered tag, built from [`Response::tag_type`] and [`Response::tid`]
    pub fn tag(&self) -> Result<Option<Tag>> {
        let tid = self.tid()?;
        let tag_type = self.tag_type()?;

        Ok(tag_type.map(|tag_type| Tag { tag_type, tid }))
    }

    /// Hex string of the raw frame
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.buf)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("code", &self.code())
            .field("command", &self.context.command)
            .field("len", &self.buf.len())
            .field("crc_valid", &self.crc_valid)
            .finish()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Response[{}] for {}", self.code(), self.context.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::BROADCAST_RID, request::Request};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const RID: [u8; 4] = [0x00, 0x00, 0x00, 0x2A];
    const TID: [u8; 4] = [0xE0, 0x04, 0x01, 0x50];
    const DISCOVERED: u16 = 0x0212;

    fn context(command: Command, tag_type: TagType, addressed: bool) -> RequestContext {
        let mut request = Request::new(command).with_tag(Tag::with_tid(tag_type, vec![0xAA, 0xBB]));
        if addressed {
            request = request.with_rid(RID);
        }
        request.context()
    }

    /// Body laid out exactly as the resolved layout expects
    fn body(code: ResponseCode, tag_type: TagType, addressed: bool, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        if addressed {
            body.extend_from_slice(&RID);
        }
        if code == ResponseCode::SELECT_TAG_PASS && !tag_type.is_iso15693_class() {
            body.extend_from_slice(&DISCOVERED.to_be_bytes());
        }
        body.extend_from_slice(&(data.len() as u16).to_be_bytes());
        body.extend_from_slice(data);
        body
    }

    #[test]
    fn test_layout_table() {
        let iso = TagType::TAGIT_HF1_STANDARD;
        let other = TagType::AUTO_DETECT;
        let select = ResponseCode::SELECT_TAG_PASS;
        let read = ResponseCode::READ_TAG_DATA_PASS;
        let tag_cmd = Command::SelectTag.code();

        use TagTypeSource as T;
        use TidSource as I;

        // (response, tag type, addressed) -> (data offset, tag type, tid)
        let table = [
            (read, iso, false, 5, T::Echo, I::Echo),
            (read, iso, true, 9, T::At(9), I::Echo),
            (read, other, false, 5, T::Echo, I::Echo),
            (read, other, true, 9, T::At(9), I::Echo),
            (select, iso, false, 5, T::Echo, I::Data),
            (select, iso, true, 9, T::At(9), I::Data),
            (select, other, false, 7, T::At(5), I::Data),
            (select, other, true, 11, T::At(9), I::Data),
        ];

        for (response, tag_type, addressed, offset, tag_source, tid_source) in table {
            let layout = FieldLayout::resolve(tag_cmd, response, tag_type, addressed);
            assert_eq!(
                layout,
                FieldLayout {
                    data_offset: offset,
                    tag_type: tag_source,
                    tid: tid_source,
                },
                "response={} tag_type={:?} addressed={}",
                response,
                tag_type,
                addressed
            );
        }
    }

    #[test]
    fn test_layout_system_commands_have_no_tag_fields() {
        for addressed in [false, true] {
            let layout = FieldLayout::resolve(
                Command::ReadSystemParameter.code(),
                ResponseCode::READ_SYSTEM_PARAMETER_PASS,
                TagType::AUTO_DETECT,
                addressed,
            );
            assert_eq!(layout.tag_type, TagTypeSource::Absent);
            assert_eq!(layout.tid, TidSource::Absent);
            assert_eq!(layout.data_offset, if addressed { 9 } else { 5 });
        }
    }

    #[test]
    fn test_layout_system_range_bounds() {
        let pass = ResponseCode(0x0001);
        assert_eq!(FieldLayout::resolve(0x1100, pass, TagType::AUTO_DETECT, false).tag_type, TagTypeSource::Echo);
        assert_eq!(FieldLayout::resolve(0x1101, pass, TagType::AUTO_DETECT, false).tag_type, TagTypeSource::Absent);
        assert_eq!(FieldLayout::resolve(0x7FFF, pass, TagType::AUTO_DETECT, false).tag_type, TagTypeSource::Absent);
        assert_eq!(FieldLayout::resolve(0x8000, pass, TagType::AUTO_DETECT, false).tag_type, TagTypeSource::Echo);
    }

    #[test]
    fn test_field_extraction_fixtures() {
        let data = [0x11, 0x22, 0x33];

        for command in [Command::SelectTag, Command::ReadTag] {
            for code in [ResponseCode::SELECT_TAG_PASS, ResponseCode::READ_TAG_DATA_PASS] {
                for tag_type in [TagType::ICODE_SLI_SL2, TagType::MIFARE_1K] {
                    for addressed in [false, true] {
                        let ctx = context(command, tag_type, addressed);
                        let frame = build_frame(code, &body(code, tag_type, addressed, &data));
                        let response = Response::decode(ctx, frame.freeze(), CrcPolicy::Strict).unwrap();

                        assert_eq!(response.data().unwrap().as_ref(), &data);

                        let expected_type = if addressed {
                            // Offset 9 holds the discovered type only when one was sent,
                            // otherwise it lands on the data length prefix
                            if code == ResponseCode::SELECT_TAG_PASS && !tag_type.is_iso15693_class() {
                                TagType(DISCOVERED)
                            } else {
                                TagType(data.len() as u16)
                            }
                        } else if code == ResponseCode::SELECT_TAG_PASS && !tag_type.is_iso15693_class() {
                            TagType(DISCOVERED)
                        } else {
                            tag_type
                        };
                        assert_eq!(response.tag_type().unwrap(), Some(expected_type));

                        let expected_tid = if code == ResponseCode::SELECT_TAG_PASS {
                            Bytes::copy_from_slice(&data)
                        } else {
                            Bytes::from_static(&[0xAA, 0xBB])
                        };
                        assert_eq!(response.tid().unwrap(), Some(expected_tid));
                    }
                }
            }
        }
    }

    #[test]
    fn test_select_tag_pass_discovers_tag() {
        let ctx = Request::new(Command::SelectTag).with_tag(Tag::new()).context();
        let frame = build_frame(
            ResponseCode::SELECT_TAG_PASS,
            &body(ResponseCode::SELECT_TAG_PASS, TagType::AUTO_DETECT, false, &TID),
        );
        let response = Response::decode(ctx, frame, CrcPolicy::Strict).unwrap();

        let tag = response.tag().unwrap().unwrap();
        assert_eq!(tag.tag_type, TagType(DISCOVERED));
        assert_eq!(tag.tid.as_deref(), Some(&TID[..]));
    }

    #[test]
    fn test_system_response_has_no_tag() {
        let ctx = Request::new(Command::ReadSystemParameter).with_address(0, 4).context();
        let frame = build_frame(ResponseCode::READ_SYSTEM_PARAMETER_PASS, &[0x00, 0x02, 0x12, 0x34]);
        let response = Response::decode(ctx, frame, CrcPolicy::Strict).unwrap();

        assert_eq!(response.data().unwrap().as_ref(), &[0x12, 0x34]);
        assert_eq!(response.tag_type().unwrap(), None);
        assert_eq!(response.tid().unwrap(), None);
        assert_eq!(response.tag().unwrap(), None);
    }

    #[test]
    fn test_unsuccessful_response_fields_error() {
        let ctx = Request::new(Command::SelectTag).with_tag(Tag::new()).context();
        let frame = build_frame(ResponseCode::NO_TAG_IN_FIELD, &[]);
        let response = Response::decode(ctx, frame, CrcPolicy::Strict).unwrap();

        assert!(!response.is_success());
        assert_eq!(
            response.data(),
            Err(Error::UnsuccessfulResponse(ResponseCode::NO_TAG_IN_FIELD))
        );
        assert!(response.tag_type().is_err());
        assert!(response.tid().is_err());
    }

    #[test]
    fn test_decode_too_short_never_panics() {
        let ctx = Request::new(Command::SelectTag).context();

        for len in 0..MIN_RESPONSE_SIZE {
            let buf = vec![STX; len];
            let result = Response::decode(ctx.clone(), buf, CrcPolicy::Lenient);
            assert_eq!(
                result,
                Err(Error::ResponseTooShort {
                    expected: MIN_RESPONSE_SIZE,
                    actual: len,
                })
            );
        }
    }

    #[test]
    fn test_decode_length_mismatch() {
        let ctx = Request::new(Command::SelectTag).context();
        let mut frame = build_frame(ResponseCode::SELECT_TAG_PASS, &[0x00, 0x00]).to_vec();
        frame.push(0x00);

        assert!(matches!(
            Response::decode(ctx, frame, CrcPolicy::Lenient),
            Err(Error::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_decode_crc_policy() {
        let ctx = Request::new(Command::ReadSystemParameter).context();
        let mut frame = build_frame(ResponseCode::READ_SYSTEM_PARAMETER_PASS, &[0x00, 0x01, 0x05]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        let strict = Response::decode(ctx.clone(), frame.clone(), CrcPolicy::Strict);
        assert!(matches!(strict, Err(Error::CrcMismatch { .. })));

        let lenient = Response::decode(ctx, frame, CrcPolicy::Lenient).unwrap();
        assert!(!lenient.crc_valid());
        assert_eq!(lenient.data().unwrap().as_ref(), &[0x05]);
    }

    #[test]
    fn test_data_out_of_bounds() {
        let ctx = Request::new(Command::ReadSystemParameter).context();
        // Declares 10 data bytes, carries 1
        let frame = build_frame(ResponseCode::READ_SYSTEM_PARAMETER_PASS, &[0x00, 0x0A, 0x05]);
        let response = Response::decode(ctx, frame, CrcPolicy::Strict).unwrap();

        assert!(matches!(response.data(), Err(Error::FieldOutOfBounds { field: "data", .. })));
    }

    #[test]
    fn test_decode_ascii_rejected() {
        let ctx = Request::new(Command::SelectTag).with_mode(ProtocolMode::Ascii).context();
        let frame = build_frame(ResponseCode::SELECT_TAG_PASS, &[0x00, 0x00]);
        assert_eq!(
            Response::decode(ctx, frame, CrcPolicy::Strict),
            Err(Error::AsciiModeUnsupported)
        );
    }

    proptest! {
        #[test]
        fn prop_decode_reads_fields_at_resolved_offsets(
            command in proptest::sample::select(vec![Command::SelectTag, Command::ReadTag, Command::ReadSystemParameter]),
            code in proptest::sample::select(vec![
                ResponseCode::SELECT_TAG_PASS,
                ResponseCode::READ_TAG_DATA_PASS,
                ResponseCode::READ_SYSTEM_PARAMETER_PASS,
            ]),
            request_type in any::<u16>(),
            discovered in any::<u16>(),
            rid in any::<[u8; 4]>(),
            data in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let request_type = TagType(request_type);
            let addressed = rid != BROADCAST_RID;
            let carries_type = code == ResponseCode::SELECT_TAG_PASS && !request_type.is_iso15693_class();

            let ctx = Request::new(command)
                .with_tag(Tag::with_tid(request_type, vec![0xAA, 0xBB]))
                .with_rid(rid)
                .context();

            let mut body = Vec::new();
            if addressed {
                body.extend_from_slice(&rid);
            }
            if carries_type {
                body.extend_from_slice(&discovered.to_be_bytes());
            }
            body.extend_from_slice(&(data.len() as u16).to_be_bytes());
            body.extend_from_slice(&data);

            let response = Response::decode(ctx, build_frame(code, &body), CrcPolicy::Strict).unwrap();
            let layout = response.layout();
            prop_assert_eq!(layout, FieldLayout::resolve(command.code(), code, request_type, addressed));

            let buf = response.bytes();
            let prefix = u16::from_be_bytes([buf[layout.data_offset], buf[layout.data_offset + 1]]);
            prop_assert_eq!(prefix as usize, data.len());
            let extracted = response.data().unwrap();
            prop_assert_eq!(extracted.as_ref(), &data[..]);

            match layout.tag_type {
                TagTypeSource::Absent => prop_assert_eq!(response.tag_type().unwrap(), None),
                TagTypeSource::At(offset) => {
                    let raw = TagType(u16::from_be_bytes([buf[offset], buf[offset + 1]]));
                    prop_assert_eq!(response.tag_type().unwrap(), Some(raw));
                    if carries_type {
                        prop_assert_eq!(raw, TagType(discovered));
                    }
                }
                TagTypeSource::Echo => prop_assert_eq!(response.tag_type().unwrap(), Some(request_type)),
            }
        }
    }

    #[test]
    fn test_to_hex() {
        let ctx = Request::new(Command::SelectTag).context();
        let frame = build_frame(ResponseCode::SELECT_TAG_INVENTORY_DONE, &[]);
        let response = Response::decode(ctx, frame, CrcPolicy::Strict).unwrap();
        assert!(response.to_hex().starts_with("020004810F"));
    }
}
