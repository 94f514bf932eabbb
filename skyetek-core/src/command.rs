//! STPv3 command catalogue

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

macro_rules! commands {
    (
        $(
            $(#[$meta:meta])*
            $variant:ident = $code:literal, $name:literal, $timeout:literal,
                tag: $tag:literal, address: $address:literal, data: $data:literal;
        )*
    ) => {
        /// STPv3 command codes
        ///
        /// Each command carries a display name, a default timeout, and which of
        /// the tag / address+blocks / data fields must be present on a request.
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum Command {
            $( $(#[$meta])* $variant = $code, )*
        }

        impl Command {
            /// Every known command, in code order
            pub const ALL: &'static [Command] = &[ $( Command::$variant, )* ];

            /// Display name
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )*
                }
            }

            /// Default response timeout in milliseconds
            pub fn timeout_ms(self) -> u64 {
                match self {
                    $( Self::$variant => $timeout, )*
                }
            }

            /// Request must carry a tag
            pub fn requires_tag(self) -> bool {
                match self {
                    $( Self::$variant => $tag, )*
                }
            }

            /// Request must carry an address/blocks pair
            pub fn requires_address(self) -> bool {
                match self {
                    $( Self::$variant => $address, )*
                }
            }

            /// Request must carry a data payload
            pub fn requires_data(self) -> bool {
                match self {
                    $( Self::$variant => $data, )*
                }
            }
        }

        impl TryFrom<u16> for Command {
            type Error = Error;

            fn try_from(value: u16) -> Result<Self> {
                match value {
                    $( $code => Ok(Self::$variant), )*
                    _ => Err(Error::UnknownCommand(value)),
                }
            }
        }
    };
}

commands! {
    // Tag commands
    SelectTag = 0x0101, "Select Tag", 300, tag: true, address: false, data: false;
    ReadTag = 0x0102, "Read Tag", 300, tag: true, address: true, data: false;
    WriteTag = 0x0103, "Write Tag", 300, tag: true, address: true, data: true;
    ActivateTag = 0x0104, "Activate Tag", 300, tag: true, address: false, data: false;
    DeactivateTag = 0x0105, "Deactivate Tag", 300, tag: true, address: false, data: false;
    SetTagBitRate = 0x0106, "Set Tag Bitrate", 300, tag: true, address: false, data: false;
    GetTagInfo = 0x0107, "Get Tag Info", 300, tag: true, address: false, data: false;
    GetLockStatus = 0x0108, "Get Lock Status", 300, tag: true, address: true, data: false;
    KillTag = 0x0109, "Kill Tag", 300, tag: true, address: false, data: false;
    ReviveTag = 0x010A, "Revive Tag", 300, tag: true, address: false, data: false;
    EraseTag = 0x010B, "Erase Tag", 300, tag: true, address: true, data: false;
    FormatTag = 0x010C, "Format Tag", 300, tag: true, address: false, data: false;
    DeselectTag = 0x010D, "Deselect Tag", 300, tag: true, address: false, data: false;
    ReadTagConfig = 0x0110, "Read Tag Config", 300, tag: true, address: true, data: false;
    WriteTagConfig = 0x0111, "Write Tag Config", 300, tag: true, address: true, data: true;

    // Security
    AuthenticateTag = 0x0201, "Authenticate Tag", 300, tag: true, address: false, data: true;
    SendTagPassword = 0x0202, "Send Tag Password", 300, tag: true, address: false, data: true;
    InitSecureMemory = 0x0203, "Initialize Secure Memory", 300, tag: true, address: false, data: true;
    SetupSecureMemory = 0x0204, "Setup Secure Memory", 300, tag: true, address: false, data: true;

    // Applications
    GetApplicationIds = 0x0301, "Get Application IDs", 400, tag: true, address: false, data: true;
    SelectApplication = 0x0302, "Select Application", 400, tag: true, address: false, data: true;
    CreateApplication = 0x0303, "Create Application", 400, tag: true, address: false, data: true;
    DeleteApplication = 0x0304, "Delete Application", 400, tag: true, address: false, data: true;

    // Files
    GetFileIds = 0x0401, "Get File Ids", 400, tag: true, address: false, data: true;
    SelectFile = 0x0402, "Select File", 400, tag: true, address: false, data: true;
    CreateFile = 0x0403, "Create File", 400, tag: true, address: false, data: true;
    GetFileSettings = 0x0404, "Get File Settings", 400, tag: true, address: false, data: true;
    ChangeFileSettings = 0x0405, "Change File Settings", 400, tag: true, address: false, data: true;
    ReadFile = 0x0406, "Read File", 400, tag: true, address: true, data: true;
    WriteFile = 0x0407, "Write File", 400, tag: true, address: true, data: true;
    DeleteFile = 0x0408, "Delete File", 400, tag: true, address: false, data: true;
    ClearFile = 0x0409, "Clear File", 400, tag: true, address: false, data: true;
    CreditValueFile = 0x040A, "Credit Value File", 400, tag: true, address: false, data: true;
    DebitValueFile = 0x040B, "Debit Value File", 400, tag: true, address: false, data: true;
    LimitedCreditValueFile = 0x040C, "Limited Credit Value File", 400, tag: true, address: false, data: true;
    GetValue = 0x040D, "Get Value", 400, tag: true, address: false, data: true;
    CommitTransaction = 0x040E, "Commit Transaction", 400, tag: true, address: false, data: false;
    AbortTransaction = 0x040F, "Abort Transaction", 400, tag: true, address: false, data: false;
    ReadRecords = 0x0410, "Read Records", 400, tag: true, address: true, data: true;
    WriteRecord = 0x0411, "Write Record", 400, tag: true, address: true, data: true;
    ChangeKeySettings = 0x0412, "Change Key Settings", 400, tag: true, address: false, data: true;
    GetKeySettings = 0x0413, "Get Key Settings", 400, tag: true, address: false, data: false;
    GetKeyVersion = 0x0414, "Get Key Version", 400, tag: true, address: false, data: true;
    ChangeKey = 0x0415, "Change Key", 400, tag: true, address: false, data: true;

    // EAS / AFI / DSFID
    EnableEas = 0x0501, "Enable EAS", 300, tag: true, address: false, data: false;
    DisableEas = 0x0502, "Disable EAS", 300, tag: true, address: false, data: false;
    ScanEas = 0x0503, "Scan EAS", 300, tag: false, address: false, data: false;
    WriteAfi = 0x0504, "Write AFI", 300, tag: true, address: false, data: true;
    ReadAfi = 0x0505, "Read AFI", 300, tag: true, address: false, data: false;
    WriteDsfid = 0x0506, "Write DSFID", 300, tag: true, address: false, data: true;
    ReadDsfid = 0x0507, "Read DSFID", 300, tag: true, address: false, data: false;

    // Keys
    StoreKey = 0x0601, "Store Key", 300, tag: true, address: true, data: true;
    LoadKey = 0x0602, "Load Key", 300, tag: true, address: true, data: true;

    // Pass-through
    InterfaceSend = 0x0701, "Interface Send", 400, tag: true, address: false, data: true;
    TransportSend = 0x0702, "Transport Send", 400, tag: true, address: false, data: true;

    // Payment
    InitiatePayment = 0x0801, "Initiate Payment", 500, tag: true, address: false, data: true;
    ComputePayment = 0x0802, "Compute Payment", 500, tag: true, address: false, data: true;

    // Reader control
    ResetDevice = 0x1102, "Reset Device", 500, tag: false, address: false, data: false;
    EnterBootload = 0x1103, "Enter Bootload Mode", 500, tag: false, address: false, data: false;

    // System parameters
    ReadSystemParameter = 0x1201, "Read System Parameter", 300, tag: false, address: true, data: false;
    WriteSystemParameter = 0x1202, "Write System Parameter", 300, tag: false, address: true, data: true;
    StoreDefaultSystemParameter = 0x1301, "Store Default System Parameter", 300, tag: false, address: true, data: true;
    RetrieveDefaultSystemParameter = 0x1302, "Retrieve Default System Parameter", 300, tag: false, address: true, data: false;

    // Reader security / debug
    AuthenticateReader = 0x1401, "Authenticate Reader", 300, tag: false, address: false, data: true;
    EnableDebug = 0x1402, "Enable Debug", 300, tag: false, address: false, data: false;
    DisableDebug = 0x1403, "Disable Debug", 300, tag: false, address: false, data: false;
    DebugMessages = 0x1404, "Debug Messages", 300, tag: false, address: false, data: false;
    EnterPaymentScanMode = 0x1405, "Enter Payment Scan Mode", 300, tag: false, address: false, data: false;
}

impl Command {
    /// Numeric code
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Default response timeout
    pub fn timeout(self) -> Duration {
        Duration::from_millis(self.timeout_ms())
    }

    /// System/admin commands whose responses carry no tag type or TID
    pub fn is_system(self) -> bool {
        is_system_code(self.code())
    }

    /// Look up a command by its display name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|cmd| cmd.name().eq_ignore_ascii_case(name))
    }
}

/// Codes above 0x1100 and below the failure bit address the reader itself
pub(crate) fn is_system_code(code: u16) -> bool {
    code > 0x1100 && code < 0x8000
}

impl From<Command> for u16 {
    fn from(cmd: Command) -> u16 {
        cmd as u16
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:04X})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_conversion() {
        assert_eq!(u16::from(Command::SelectTag), 0x0101);
        assert_eq!(Command::try_from(0x1201).unwrap(), Command::ReadSystemParameter);
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(Command::try_from(0xBEEF), Err(Error::UnknownCommand(0xBEEF)));
    }

    #[test]
    fn test_catalogue_round_trips_codes() {
        for &cmd in Command::ALL {
            assert_eq!(Command::try_from(cmd.code()).unwrap(), cmd);
        }
    }

    #[test]
    fn test_catalogue_is_sorted_and_unique() {
        let codes: Vec<u16> = Command::ALL.iter().map(|c| c.code()).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        sorted.dedup();

        assert_eq!(codes, sorted);
    }

    #[test]
    fn test_requirements() {
        let read = Command::ReadTag;
        assert!(read.requires_tag());
        assert!(read.requires_address());
        assert!(!read.requires_data());

        let scan = Command::ScanEas;
        assert!(!scan.requires_tag());

        let write_param = Command::WriteSystemParameter;
        assert!(!write_param.requires_tag());
        assert!(write_param.requires_address());
        assert!(write_param.requires_data());
    }

    #[test]
    fn test_timeouts() {
        assert_eq!(Command::SelectTag.timeout(), Duration::from_millis(300));
        assert_eq!(Command::SelectFile.timeout_ms(), 400);
        assert_eq!(Command::EnterBootload.timeout_ms(), 500);
    }

    #[test]
    fn test_system_range() {
        assert!(Command::ReadSystemParameter.is_system());
        assert!(Command::EnterBootload.is_system());
        assert!(!Command::SelectTag.is_system());
        assert!(!Command::ComputePayment.is_system());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Command::from_name("select tag"), Some(Command::SelectTag));
        assert_eq!(Command::from_name("Write AFI"), Some(Command::WriteAfi));
        assert_eq!(Command::from_name("nope"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Command::ReadTag.to_string(), "Read Tag(0x0102)");
    }
}
