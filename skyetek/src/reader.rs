//! High-level reader interface

use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use skyetek_core::{
    constants::{MAX_LOOP_OFF_REISSUES, MAX_RESPONSE_LENGTH, NACK, STX},
    Command, CrcPolicy, FirmwareImage, Request, Response, ResponseCode, SystemParameter, Tag,
    TagType,
};
use skyetek_transport::Transport;
use skyetek_types::{MuxPorts, ProductFamily, ReaderId, ReaderInfo};

use crate::bootload::{BootloadConfig, Bootloader};
use crate::error::{Error, Result};

/// Bytes reserved for the reader name parameter
pub const READER_NAME_LEN: usize = 32;

/// Tag type to scan for on a given module family
pub fn default_tag_type(family: ProductFamily) -> TagType {
    match family {
        ProductFamily::Hf => TagType::ISO_15693_AUTO_DETECT,
        ProductFamily::Uhf => TagType::ISO_18000_6C_AUTO_DETECT,
        ProductFamily::Unknown => TagType::AUTO_DETECT,
    }
}

/// SkyeTek reader session
///
/// Owns one transport and runs one exchange at a time over it.
///
/// # Examples
///
/// ```no_run
/// use skyetek::Reader;
/// use skyetek_transport::Transport;
///
/// async fn identify(transport: impl Transport + 'static) -> skyetek::Result<()> {
///     let mut reader = Reader::new(transport);
///
///     reader.open().await?;
///     println!("Serial number: {}", reader.serial_number().await?);
///
///     reader.close().await
/// }
/// ```
pub struct Reader {
    transport: Box<dyn Transport>,
    reader_id: ReaderId,
    crc_policy: CrcPolicy,
    response_timeout: Option<Duration>,
    firmware_version: Option<String>,
}

impl Reader {
    /// Create a reader over any transport
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_transport(Box::new(transport))
    }

    /// Create a reader over a boxed transport
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            reader_id: ReaderId::BROADCAST,
            crc_policy: CrcPolicy::Strict,
            response_timeout: None,
            firmware_version: None,
        }
    }

    /// Create a reader on a serial port
    #[cfg(feature = "serial")]
    pub fn serial(port: impl Into<String>, baud_rate: u32) -> Self {
        Self::new(skyetek_transport::SerialTransport::new(port, baud_rate))
    }

    /// Create a reader on a USB-HID device path
    #[cfg(feature = "hid")]
    pub fn usb(path: impl Into<String>) -> Self {
        Self::new(skyetek_transport::HidTransport::new(
            skyetek_transport::HidApiReports::new(path),
        ))
    }

    /// Create a reader on the first SkyeTek USB device found
    #[cfg(feature = "hid")]
    pub fn first_usb() -> Result<Self> {
        let reports = skyetek_transport::HidApiReports::first()?;
        Ok(Self::new(skyetek_transport::HidTransport::new(reports)))
    }

    /// Set how CRC mismatches on responses are treated (default: strict)
    pub fn with_crc_policy(mut self, policy: CrcPolicy) -> Self {
        self.crc_policy = policy;
        self
    }

    /// Override the per-command response timeouts
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Address requests to a specific reader ID
    pub fn with_reader_id(mut self, reader_id: ReaderId) -> Self {
        self.reader_id = reader_id;
        self
    }

    /// Reader ID this session addresses
    pub fn rid(&self) -> ReaderId {
        self.reader_id
    }

    pub fn crc_policy(&self) -> CrcPolicy {
        self.crc_policy
    }

    /// Check if open
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Open the transport
    pub async fn open(&mut self) -> Result<()> {
        info!("Opening reader at {}...", self.transport.address());
        self.transport.open().await?;
        info!("Reader open");
        Ok(())
    }

    /// Close the transport
    pub async fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }

        info!("Closing reader at {}...", self.transport.address());
        self.transport.close().await?;
        Ok(())
    }

    /// New request for `command`, addressed to this session's reader ID
    pub fn request(&self, command: Command) -> Request {
        Request::new(command).with_rid(self.reader_id.0)
    }

    /// Encode and send a request
    pub async fn issue(&mut self, request: &Request) -> Result<()> {
        self.ensure_open()?;

        let frame = request.encode()?;
        debug!("Issuing {}", request);
        trace!("Sending {} bytes: {:02X?}", frame.len(), &frame[..]);

        self.transport.write(&frame).await?;
        self.transport.flush().await?;
        Ok(())
    }

    /// Read one response to `request`.
    ///
    /// `None` means nothing usable arrived: a timeout, a frame that did not
    /// start with STX, or a malformed frame.
    pub async fn get_response(&mut self, request: &Request) -> Result<Option<Response>> {
        self.ensure_open()?;

        let timeout = self.response_timeout.unwrap_or_else(|| request.timeout());
        self.transport.set_read_timeout(timeout);

        let Some(first) = self.transport.read_byte().await? else {
            debug!("No response to {}", request.command());
            return Ok(None);
        };

        if first != STX {
            if first == NACK {
                warn!("Reader answered NACK, it is in bootload mode");
            } else {
                debug!("Discarding byte 0x{:02X}, expected STX", first);
            }
            return Ok(None);
        }

        let mut length = [0u8; 2];
        if self.transport.read_full(&mut length).await? != length.len() {
            debug!("Response to {} ended before its length", request.command());
            return Ok(None);
        }

        let declared = u16::from_be_bytes(length) as usize;
        if declared > MAX_RESPONSE_LENGTH {
            warn!("Response length {} exceeds {}", declared, MAX_RESPONSE_LENGTH);
            return Ok(None);
        }

        let mut frame = vec![0u8; declared + 3];
        frame[0] = STX;
        frame[1..3].copy_from_slice(&length);

        let read = self.transport.read_full(&mut frame[3..]).await?;
        if read < declared {
            warn!("Short response: {} of {} bytes", read, declared);
            return Ok(None);
        }

        trace!("Received {} bytes: {:02X?}", frame.len(), &frame[..frame.len().min(32)]);

        match Response::decode(request.context(), frame, self.crc_policy) {
            Ok(response) => {
                debug!("Received {} for {}", response.code(), request.command());
                Ok(Some(response))
            }
            Err(e) if e.is_framing() => {
                warn!("Discarding malformed response: {}", e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Issue a request and return its response.
    ///
    /// A `SELECT_TAG_LOOP_OFF` answer means the reader just left loop mode;
    /// the request is sent again, at most [`MAX_LOOP_OFF_REISSUES`] times.
    pub async fn exchange(&mut self, request: &Request) -> Result<Response> {
        let mut reissues = 0;
        loop {
            self.issue(request).await?;

            let response = self.get_response(request).await?.ok_or(Error::NoResponse {
                command: request.command(),
            })?;

            if response.code() != ResponseCode::SELECT_TAG_LOOP_OFF {
                return Ok(response);
            }

            reissues += 1;
            if reissues > MAX_LOOP_OFF_REISSUES {
                return Err(Error::LoopOffReissues {
                    command: request.command(),
                    attempts: MAX_LOOP_OFF_REISSUES,
                });
            }

            debug!("Loop mode switched off, re-issuing {}", request.command());
        }
    }

    /// Exchange and require a successful response code
    async fn execute(&mut self, request: &Request) -> Result<Response> {
        let response = self.exchange(request).await?;
        if !response.is_success() {
            return Err(Error::Rejected {
                command: request.command(),
                code: response.code(),
            });
        }
        Ok(response)
    }

    // System parameters

    pub async fn read_system_parameter(&mut self, address: u16, blocks: u16) -> Result<Bytes> {
        let request = self
            .request(Command::ReadSystemParameter)
            .with_address(address, blocks);
        Ok(self.execute(&request).await?.data()?)
    }

    pub async fn write_system_parameter(
        &mut self,
        address: u16,
        blocks: u16,
        data: impl Into<Bytes>,
    ) -> Result<()> {
        let request = self
            .request(Command::WriteSystemParameter)
            .with_address(address, blocks)
            .with_data(data);
        self.execute(&request).await?;
        Ok(())
    }

    /// Read the power-on default of a system parameter
    pub async fn retrieve_default_parameter(&mut self, address: u16, blocks: u16) -> Result<Bytes> {
        let request = self
            .request(Command::RetrieveDefaultSystemParameter)
            .with_address(address, blocks);
        Ok(self.execute(&request).await?.data()?)
    }

    /// Change the power-on default of a system parameter
    pub async fn store_default_parameter(
        &mut self,
        address: u16,
        blocks: u16,
        data: impl Into<Bytes>,
    ) -> Result<()> {
        let request = self
            .request(Command::StoreDefaultSystemParameter)
            .with_address(address, blocks)
            .with_data(data);
        self.execute(&request).await?;
        Ok(())
    }

    pub async fn read_parameter(&mut self, parameter: SystemParameter) -> Result<Bytes> {
        self.read_system_parameter(parameter.address(), parameter.blocks())
            .await
    }

    async fn read_parameter_hex(&mut self, parameter: SystemParameter) -> Result<String> {
        let data = self.read_parameter(parameter).await?;
        Ok(hex::encode_upper(data))
    }

    pub async fn serial_number(&mut self) -> Result<String> {
        self.read_parameter_hex(SystemParameter::SerialNumber).await
    }

    /// Firmware version, read once per session
    pub async fn firmware_version(&mut self) -> Result<String> {
        if let Some(version) = &self.firmware_version {
            return Ok(version.clone());
        }

        let version = self.read_parameter_hex(SystemParameter::FirmwareVersion).await?;
        self.firmware_version = Some(version.clone());
        Ok(version)
    }

    pub async fn hardware_version(&mut self) -> Result<String> {
        self.read_parameter_hex(SystemParameter::HardwareVersion).await
    }

    /// 4 hex digits identifying the module, e.g. `"0007"`
    pub async fn product_code(&mut self) -> Result<String> {
        self.read_parameter_hex(SystemParameter::ProductCode).await
    }

    pub async fn reader_name(&mut self) -> Result<String> {
        let data = self.read_parameter(SystemParameter::ReaderName).await?;
        Ok(String::from_utf8_lossy(&data).trim_matches('\0').to_string())
    }

    /// Store an ASCII name of up to 32 bytes
    pub async fn set_reader_name(&mut self, name: &str) -> Result<()> {
        if !name.is_ascii() || name.len() > READER_NAME_LEN {
            return Err(skyetek_types::Error::Validation(format!(
                "reader name must be ASCII and at most {} bytes",
                READER_NAME_LEN
            ))
            .into());
        }

        let mut data = vec![0u8; READER_NAME_LEN];
        data[..name.len()].copy_from_slice(name.as_bytes());

        let parameter = SystemParameter::ReaderName;
        self.write_system_parameter(parameter.address(), parameter.blocks(), data)
            .await
    }

    /// Reader ID stored on the device
    pub async fn reader_id(&mut self) -> Result<ReaderId> {
        let data = self.read_parameter(SystemParameter::ReaderId).await?;
        Ok(ReaderId::from_slice(&data)?)
    }

    /// Store a new reader ID on the device.
    ///
    /// On success the session addresses all later requests to the new ID.
    pub async fn set_reader_id(&mut self, reader_id: ReaderId) -> Result<()> {
        let parameter = SystemParameter::ReaderId;
        self.write_system_parameter(
            parameter.address(),
            parameter.blocks(),
            Bytes::copy_from_slice(reader_id.as_bytes()),
        )
        .await?;

        info!("Reader ID changed from {} to {}", self.reader_id, reader_id);
        self.reader_id = reader_id;
        Ok(())
    }

    /// Collect the reader's identity parameters
    pub async fn reader_info(&mut self) -> Result<ReaderInfo> {
        let serial_number = self.serial_number().await?;
        let firmware_version = self.firmware_version().await?;
        let product_code = self.product_code().await?;

        let mut info = ReaderInfo::new(serial_number, firmware_version, product_code);
        info.hardware_version = self.hardware_version().await?;
        info.reader_id = self.reader_id().await?;
        info.reader_name = match self.reader_name().await {
            Ok(name) if !name.is_empty() => Some(name),
            Ok(_) | Err(Error::Rejected { .. }) => None,
            Err(e) => return Err(e),
        };

        debug!("Reader info: {}", info);
        Ok(info)
    }

    // Mux

    /// Size of the attached antenna mux.
    ///
    /// A rejected read or an unrecognised value means no mux.
    pub async fn mux_port_count(&mut self) -> Result<MuxPorts> {
        let product_code = self.product_code().await?;

        let parameter = SystemParameter::MuxControl;
        let request = self
            .request(Command::ReadSystemParameter)
            .with_address(parameter.address(), parameter.blocks());
        let response = self.exchange(&request).await?;

        if response.code() != ResponseCode::READ_SYSTEM_PARAMETER_PASS {
            debug!("Mux query answered {}", response.code());
            return Ok(MuxPorts::None);
        }

        let ports = response
            .data()?
            .first()
            .map_or(MuxPorts::None, |&value| MuxPorts::detect(&product_code, value));

        debug!("Detected {} on product {}", ports, product_code);
        Ok(ports)
    }

    /// Route the radio to one mux port
    pub async fn select_mux_port(&mut self, port: u8) -> Result<()> {
        let parameter = SystemParameter::MuxControl;
        self.write_system_parameter(parameter.address(), parameter.blocks(), vec![port])
            .await
    }

    // Tags

    /// Select a single tag in the field.
    ///
    /// On success fills in the tag's TID, and its type if it was the
    /// generic auto-detect type. A family auto-detect type such as
    /// ISO14443A stays as it was. Returns `false` when the reader found no tag.
    pub async fn select_tag(&mut self, tag: &mut Tag) -> Result<bool> {
        let request = self.request(Command::SelectTag).with_tag(tag.clone());
        let response = self.exchange(&request).await?;

        if !response.is_success() {
            debug!("No tag selected: {}", response.code());
            return Ok(false);
        }

        tag.tid = response.tid()?;
        if tag.tag_type == TagType::AUTO_DETECT {
            if let Some(tag_type) = response.tag_type()? {
                tag.tag_type = tag_type;
            }
        }

        debug!("Selected {}", tag);
        Ok(true)
    }

    pub async fn read_tag_data(&mut self, tag: &Tag, address: u16, blocks: u16) -> Result<Bytes> {
        let request = self
            .request(Command::ReadTag)
            .with_tag(tag.clone())
            .with_address(address, blocks);
        Ok(self.execute(&request).await?.data()?)
    }

    pub async fn write_tag_data(
        &mut self,
        tag: &Tag,
        data: impl Into<Bytes>,
        address: u16,
        blocks: u16,
    ) -> Result<()> {
        let request = self
            .request(Command::WriteTag)
            .with_tag(tag.clone())
            .with_address(address, blocks)
            .with_data(data);
        self.execute(&request).await?;
        Ok(())
    }

    // Device control

    /// Restart the module
    pub async fn reset_device(&mut self) -> Result<()> {
        warn!("Resetting reader...");
        let request = self.request(Command::ResetDevice);
        self.execute(&request).await?;
        self.firmware_version = None;
        Ok(())
    }

    /// Switch the module into bootload mode
    pub async fn enter_bootload(&mut self) -> Result<()> {
        let request = self.request(Command::EnterBootload);
        self.execute(&request).await?;
        Ok(())
    }

    /// Flash a firmware image.
    ///
    /// The reader is switched into bootload mode first. A failure part way
    /// through may leave the module without working firmware.
    pub async fn upload_firmware(
        &mut self,
        image: &FirmwareImage,
        config: BootloadConfig,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!("Entering bootload mode");
        self.enter_bootload().await?;

        Bootloader::new(self.transport.as_mut(), config)
            .upload(image, cancel)
            .await?;

        self.firmware_version = None;
        Ok(())
    }

    // Helper methods

    fn ensure_open(&self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotOpen);
        }
        Ok(())
    }
}
