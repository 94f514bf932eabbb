//! STPv3 response codes

use std::fmt;

macro_rules! response_codes {
    ( $( $ident:ident = $code:literal; )* ) => {
        impl ResponseCode {
            $( pub const $ident: ResponseCode = ResponseCode($code); )*

            /// Symbolic name, or `None` for codes outside the catalogue
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $( $code => Some(stringify!($ident)), )*
                    _ => None,
                }
            }
        }
    };
}

/// Response code carried at bytes `[3..5]` of every response
///
/// The high bit marks failure. Codes the catalogue doesn't know are still
/// representable; they just have no name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResponseCode(pub u16);

response_codes! {
    SELECT_TAG_PASS = 0x0101;
    READ_TAG_DATA_PASS = 0x0102;
    WRITE_TAG_DATA_PASS = 0x0103;
    ACTIVATE_TAG_TYPE_PASS = 0x0104;
    DEACTIVATE_TAG_TYPE_PASS = 0x0105;
    SET_TAG_BIT_RATE_PASS = 0x0106;
    GET_TAG_INFO_PASS = 0x0107;
    GET_LOCK_STATUS_PASS = 0x0108;
    KILL_TAG_PASS = 0x0109;
    REVIVE_TAG_PASS = 0x010A;
    ERASE_TAG_PASS = 0x010B;
    FORMAT_TAG_PASS = 0x010C;
    DESELECT_TAG_PASS = 0x010D;
    READ_TAG_CONFIG_PASS = 0x0110;
    WRITE_TAG_CONFIG_PASS = 0x0111;
    SELECT_TAG_LOOP_ON = 0x01C1;
    AUTHENTICATE_TAG_PASS = 0x0201;
    SEND_TAG_PASSWORD_PASS = 0x0202;
    INIT_SECURE_MEMORY_PASS = 0x0203;
    SETUP_SECURE_MEMORY_PASS = 0x0204;
    GET_APPLICATION_IDS_PASS = 0x0301;
    SELECT_APPLICATION_PASS = 0x0302;
    CREATE_APPLICATION_PASS = 0x0303;
    DELETE_APPLICATION_PASS = 0x0304;
    GET_FILE_IDS_PASS = 0x0401;
    SELECT_FILE_PASS = 0x0402;
    CREATE_FILE_PASS = 0x0403;
    GET_FILE_SETTINGS_PASS = 0x0404;
    CHANGE_FILE_SETTINGS_PASS = 0x0405;
    READ_FILE_PASS = 0x0406;
    WRITE_FILE_PASS = 0x0407;
    DELETE_FILE_PASS = 0x0408;
    CLEAR_FILE_PASS = 0x0409;
    CREDIT_VALUE_FILE_PASS = 0x040A;
    DEBIT_VALUE_FILE_PASS = 0x040B;
    LIMITED_CREDIT_VALUE_FILE_PASS = 0x040C;
    GET_VALUE_PASS = 0x040D;
    COMMIT_TRANSACTION_PASS = 0x040E;
    ABORT_TRANSACTION_PASS = 0x040F;
    READ_RECORDS_PASS = 0x0410;
    WRITE_RECORD_PASS = 0x0411;
    CHANGE_KEY_SETTINGS_PASS = 0x0412;
    GET_KEY_SETTINGS_PASS = 0x0413;
    GET_KEY_VERSION_PASS = 0x0414;
    CHANGE_KEY_PASS = 0x0415;
    ENABLE_EAS_PASS = 0x0501;
    DISABLE_EAS_PASS = 0x0502;
    SCAN_EAS_PASS = 0x0503;
    WRITE_AFI_PASS = 0x0504;
    READ_AFI_PASS = 0x0505;
    WRITE_DSFID_PASS = 0x0506;
    READ_DSFID_PASS = 0x0507;
    STORE_KEY_PASS = 0x0601;
    LOAD_KEY_PASS = 0x0602;
    INTERFACE_SEND_PASS = 0x0701;
    TRANSPORT_SEND_PASS = 0x0702;
    INITIATE_PAYMENT_PASS = 0x0801;
    COMPUTE_PAYMENT_PASS = 0x0802;
    LOAD_DEFAULTS_PASS = 0x1101;
    RESET_DEVICE_PASS = 0x1102;
    BOOTLOAD_PASS = 0x1103;
    READ_SYSTEM_PARAMETER_PASS = 0x1201;
    WRITE_SYSTEM_PARAMETER_PASS = 0x1202;
    STORE_DEFAULT_SYSTEM_PARAMETER_PASS = 0x1301;
    RETRIEVE_DEFAULT_SYSTEM_PARAMETER_PASS = 0x1302;
    AUTHENTICATE_READER_PASS = 0x1401;
    ENABLE_DEBUG_PASS = 0x1402;
    DISABLE_DEBUG_PASS = 0x1403;
    GET_DEBUG_MESSAGES_PASS = 0x1404;
    ENTER_PAYMENT_SCAN_MODE_PASS = 0x1405;
    INVALID_TAG_TYPE = 0x8001;
    NO_TAG_IN_FIELD = 0x8002;
    COLLISION_DETECTED = 0x8003;
    TAG_DATA_INTEGRITY_CHECK_FAILED = 0x8004;
    TAG_BLOCKS_LOCKED = 0x8005;
    NOT_AUTHENTICATED = 0x8006;
    NO_TAG_ID_MATCH = 0x8007;
    TAG_DATA_RATE_NOT_SUPPORTED = 0x800B;
    ENCRYPT_TAG_DATA_FAIL = 0x800C;
    DECRYPT_TAG_DATA_FAIL = 0x800D;
    INVALID_SIGNATURE_HMAC = 0x800E;
    INVALID_KEY_FOR_AUTHENTICATION = 0x800F;
    NO_APPLICATION_PRESENT = 0x8010;
    FILE_NOT_FOUND = 0x8011;
    NO_FILE_SELECTED = 0x8012;
    INVALID_KEY_NUMBER = 0x8013;
    INVALID_KEY_LENGTH = 0x8014;
    SELECT_TAG_FAIL = 0x8101;
    READ_TAG_DATA_FAIL = 0x8102;
    WRITE_TAG_DATA_FAIL = 0x8103;
    ACTIVATE_TAG_TYPE_FAIL = 0x8104;
    DEACTIVATE_TAG_TYPE_FAIL = 0x8105;
    SET_TAG_BIT_RATE_FAIL = 0x8106;
    GET_TAG_INFO_FAIL = 0x8107;
    GET_LOCK_STATUS_FAIL = 0x8108;
    KILL_TAG_FAIL = 0x8109;
    REVIVE_TAG_FAIL = 0x810A;
    ERASE_TAG_FAIL = 0x810B;
    FORMAT_TAG_FAIL = 0x810C;
    DESELECT_TAG_FAIL = 0x810D;
    SELECT_TAG_INVENTORY_DONE = 0x810F;
    READ_TAG_CONFIG_FAIL = 0x8110;
    WRITE_TAG_CONFIG_FAIL = 0x8111;
    SELECT_TAG_LOOP_OFF = 0x81C1;
    AUTHENTICATE_TAG_FAIL = 0x8201;
    SEND_TAG_PASSWORD_FAIL = 0x8202;
    INIT_SECURE_MEMORY_FAIL = 0x8203;
    SETUP_SECURE_MEMORY_FAIL = 0x8204;
    GET_APPLICATION_IDS_FAIL = 0x8301;
    SELECT_APPLICATION_FAIL = 0x8302;
    CREATE_APPLICATION_FAIL = 0x8303;
    DELETE_APPLICATION_FAIL = 0x8304;
    GET_FILE_IDS_FAIL = 0x8401;
    SELECT_FILE_FAIL = 0x8402;
    CREATE_FILE_FAIL = 0x8403;
    GET_FILE_SETTINGS_FAIL = 0x8404;
    CHANGE_FILE_SETTINGS_FAIL = 0x8405;
    READ_FILE_FAIL = 0x8406;
    WRITE_FILE_FAIL = 0x8407;
    DELETE_FILE_FAIL = 0x8408;
    CLEAR_FILE_FAIL = 0x8409;
    CREDIT_VALUE_FILE_FAIL = 0x840A;
    DEBIT_VALUE_FILE_FAIL = 0x840B;
    LIMITED_CREDIT_VALUE_FILE_FAIL = 0x840C;
    GET_VALUE_FAIL = 0x840D;
    COMMIT_TRANSACTION_FAIL = 0x840E;
    ABORT_TRANSACTION_FAIL = 0x840F;
    READ_RECORDS_FAIL = 0x8410;
    WRITE_RECORD_FAIL = 0x8411;
    CHANGE_KEY_SETTINGS_FAIL = 0x8412;
    GET_KEY_SETTINGS_FAIL = 0x8413;
    GET_KEY_VERSION_FAIL = 0x8414;
    CHANGE_KEY_FAIL = 0x8415;
    ENABLE_EAS_FAIL = 0x8501;
    DISABLE_EAS_FAIL = 0x8502;
    SCAN_EAS_FAIL = 0x8503;
    WRITE_AFI_FAIL = 0x8504;
    READ_AFI_FAIL = 0x8505;
    WRITE_DSFID_FAIL = 0x8506;
    READ_DSFID_FAIL = 0x8507;
    SCAN_EAS_LOOP_EXIT = 0x85C3;
    STORE_KEY_FAIL = 0x8601;
    LOAD_KEY_FAIL = 0x8602;
    INTERFACE_SEND_FAIL = 0x8701;
    TRANSPORT_SEND_FAIL = 0x8702;
    INITIATE_PAYMENT_FAIL = 0x8801;
    COMPUTE_PAYMENT_FAIL = 0x8802;
    UNKNOWN_ERROR = 0x9001;
    INVALID_COMMAND = 0x9002;
    INVALID_CRC = 0x9003;
    INVALID_MESSAGE_LENGTH = 0x9004;
    INVALID_ADDRESS = 0x9005;
    INVALID_FLAGS = 0x9006;
    INVALID_ASCII_CHAR = 0x9007;
    INVALID_NUMBER_OF_BLOCKS = 0x9008;
    INVALID_DATA_LEN = 0x9009;
    NO_ANTENNA_DETECTED = 0x900F;
    INVALID_ENCODING = 0x9010;
    INVALID_ARGUMENT = 0x9011;
    INVALID_SESSION = 0x9012;
    CMD_NOT_IMPLEMENTED = 0x9013;
    LOAD_DEFAULTS_FAIL = 0x9101;
    RESET_DEVICE_FAIL = 0x9102;
    BOOTLOAD_FAIL = 0x9103;
    READ_SYSTEM_PARAMETER_FAIL = 0x9201;
    WRITE_SYSTEM_PARAMETER_FAIL = 0x9202;
    STORE_DEFAULT_SYSTEM_PARAMETER_FAIL = 0x9301;
    RETRIEVE_DEFAULT_SYSTEM_PARAMETER_FAIL = 0x9302;
    AUTHENTICATE_READER_FAIL = 0x9401;
    ENABLE_DEBUG_FAIL = 0x9402;
    DISABLE_DEBUG_FAIL = 0x9403;
    GET_DEBUG_MESSAGES_FAIL = 0x9404;
    ENTER_PAYMENT_SCAN_MODE_FAIL = 0x9405;
}

impl ResponseCode {
    /// Failure bit clear
    pub fn is_success(self) -> bool {
        self.0 & 0x8000 == 0
    }

    /// Raw code
    pub fn code(self) -> u16 {
        self.0
    }
}

impl From<u16> for ResponseCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<ResponseCode> for u16 {
    fn from(code: ResponseCode) -> u16 {
        code.0
    }
}

impl fmt::Debug for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResponseCode({})", self)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}(0x{:04X})", name, self.0),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_bit() {
        assert!(ResponseCode::SELECT_TAG_PASS.is_success());
        assert!(ResponseCode::SELECT_TAG_LOOP_ON.is_success());
        assert!(!ResponseCode::SELECT_TAG_LOOP_OFF.is_success());
        assert!(!ResponseCode::SELECT_TAG_INVENTORY_DONE.is_success());
        assert!(!ResponseCode(0x8000).is_success());
        assert!(ResponseCode(0x7FFF).is_success());
    }

    #[test]
    fn test_names() {
        assert_eq!(ResponseCode::NO_TAG_IN_FIELD.name(), Some("NO_TAG_IN_FIELD"));
        assert_eq!(ResponseCode(0x1234).name(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ResponseCode::SELECT_TAG_INVENTORY_DONE.to_string(),
            "SELECT_TAG_INVENTORY_DONE(0x810F)"
        );
        assert_eq!(ResponseCode(0x7777).to_string(), "0x7777");
    }
}
