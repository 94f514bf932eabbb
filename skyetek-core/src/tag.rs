//! Tag types and tag values

use bytes::Bytes;
use std::fmt;

macro_rules! tag_types {
    ( $( $ident:ident = $code:literal, $desc:literal; )* ) => {
        impl TagType {
            $( pub const $ident: TagType = TagType($code); )*

            /// Every catalogued tag type
            pub const ALL: &'static [TagType] = &[ $( TagType::$ident, )* ];

            /// Product description, or `None` for uncatalogued values
            pub fn description(self) -> Option<&'static str> {
                match self.0 {
                    $( $code => Some($desc), )*
                    _ => None,
                }
            }
        }
    };
}

/// 16-bit tag family code
///
/// The catalogue is closed upstream, but readers may report values it does
/// not list, so this stays an open newtype.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TagType(pub u16);

tag_types! {
    AUTO_DETECT = 0x0000, "Auto Detect";
    ISO_15693_AUTO_DETECT = 0x0100, "ISO15693 Auto Detect";
    TI_15693_AUTO_DETECT = 0x0110, "TI 15693 Auto Detect";
    TAGIT_HF1_STANDARD = 0x0111, "Tag-It HF-I Standard (2k bits)";
    TAGIT_HF1_PRO = 0x0112, "Tag-It HF-I Pro";
    TAGIT_HF1_PLUS = 0x0113, "Tag-It HF-I Plus";
    PHILIPS_15693_AUTO_DETECT = 0x0120, "Philips 15693 Auto Detect";
    ICODE_SLI_SL2 = 0x0121, "I-Code SLI SL2 (1k bits)";
    ST_15693_AUTO_DETECT = 0x0130, "ST 15693 Auto Detect";
    ISO_LRI64 = 0x0131, "LRI 64";
    LRI512 = 0x0132, "LRI 512";
    LRI2K = 0x0133, "LRI 2K";
    LRIS2K = 0x0134, "LRIS 2K";
    EM_15693_AUTO_DETECT = 0x0140, "EM 15693 Auto Detect";
    EM4006 = 0x0141, "EM4006";
    EM4034 = 0x0142, "EM4034";
    EM4035_CRYPTO = 0x0143, "EM4035 (Crypto)";
    EM4135 = 0x0144, "EM4135";
    INFINEON_15693_AUTO_DETECT = 0x0150, "Infineon 15693 Auto Detect";
    MYD2K = 0x0151, "My-D 2K";
    MYD2KS = 0x0152, "My-D 2KS";
    MYD10K = 0x0153, "My-D 10K";
    MYD10KS = 0x0154, "My-D 10KS";
    FUJITSU_AUTO_DETECT = 0x0160, "Fujitsu Auto Detect";
    MB89R118 = 0x0161, "MB89R118";
    TAGSYS_15693 = 0x0170, "TagSys 15693";
    TAGSYS_C370 = 0x0171, "TagSys C370";
    ISO_14443A_AUTO_DETECT = 0x0200, "ISO14443A Auto Detect";
    PHILIPS_14443A_AUTO_DETECT = 0x0210, "Philips 14443A Auto Detect";
    ISO_MIFARE_ULTRALIGHT = 0x0211, "Mifare Ultralight";
    MIFARE_1K = 0x0212, "Mifare 1k";
    MIFARE_4K = 0x0213, "Mifare 4k";
    MIFARE_DESFIRE = 0x0214, "Mifare DESfire";
    MIFARE_PROX = 0x0215, "Mifare Pro X";
    INNOVISION_14443A_AUTO_DETECT = 0x0220, "Innovision 14443A Auto Detect";
    JEWEL = 0x0221, "Jewel";
    ISO_14443B_AUTO_DETECT = 0x0300, "ISO14443B Auto Detect";
    ATMEL_14443B_AUTO_DETECT = 0x0310, "Atmel 14443B Auto Detect";
    CRYPTORF_1K = 0x0311, "CryptoRF (1k bits)";
    CRYPTORF_2K = 0x0312, "CryptoRF (2k bits)";
    CRYPTORF_4K = 0x0313, "CryptoRF (4k bits)";
    CRYPTORF_8K = 0x0314, "CryptoRF (8k bits)";
    CRYPTORF_16K = 0x0315, "CryptoRF (16k bits)";
    CRYPTORF_32K = 0x0316, "CryptoRF (32k bits)";
    CRYPTORF_64K = 0x0317, "CryptoRF (64k bits)";
    AT88RF001 = 0x0318, "AT88RF001 (256 bits)";
    AT88RF020 = 0x0319, "AT88RF020";
    SAMSUNG_14443B_AUTO_DETECT = 0x0330, "Samsung 14443B Auto Detect";
    S3C89K8 = 0x0331, "S3C89K8 (8k bits)";
    S3C89V5 = 0x0332, "S3C89V5 (16k bits)";
    S3C89V8 = 0x0333, "S3C89V8 (8192)";
    S3CC9G4 = 0x0334, "S3CC9G4 (4096)";
    S3CC9GC = 0x0335, "S3CC9GC (72kB)";
    S3CC9GW = 0x0336, "S3CC9GW (144 kB)";
    S3CC9W4 = 0x0337, "S3CC9W4 (4 kB)";
    S3CC9W9 = 0x0338, "S3CC9W9 (32 kB)";
    ST_MICRO_14443B_AUTO_DETECT = 0x0350, "ST Micro 14443B Auto Detect";
    ST_MICRO_SRIX4K = 0x0351, "ST Micro SRIX4K";
    ST_MICRO_SRI176 = 0x0352, "ST Micro SRI176";
    ST_MICRO_SRI512 = 0x0353, "ST Micro SRI512";
    AMEX_CARD = 0x0361, "AMEX Card";
    AMEX_FOB = 0x0362, "AMEX FOB";
    ISO_18000_3_MODE1_AUTO_DETECT = 0x0400, "ISO18000-3 Mode 1 Auto Detect";
    M1_TI_15693_AUTO_DETECT = 0x0410, "TI 15693 Auto Detect (M1)";
    M1_TAGIT_HF1_STANDARD = 0x0411, "Tag-It HF-I Standard (2k bits) (M1)";
    M1_TAGIT_HF1_PRO = 0x0412, "Tag-It HF-I Pro (M1)";
    M1_TAGIT_HF1_PLUS = 0x0413, "Tag-It HF-I Plus (M1)";
    M1_PHILIPS_15693_AUTO_DETECT = 0x0420, "Philips 15693 Auto Detect (M1)";
    M1_ICODE_SLI_SL2 = 0x0421, "I-Code SLI SL2 (1k bits) (M1)";
    M1_ST_15693_AUTO_DETECT = 0x0430, "ST 15693 Auto Detect (M1)";
    M1_LRI64 = 0x0431, "LRI 64 (M1)";
    M1_LRI512 = 0x0432, "LRI 512 (M1)";
    M1_EM_15693_AUTO_DETECT = 0x0440, "EM 15693 Auto Detect (M1)";
    M1_EM4006 = 0x0441, "EM4006 (M1)";
    M1_EM4034 = 0x0442, "EM4034 (M1)";
    M1_EM4035_CRYPTO = 0x0443, "EM4035 (Crypto) (M1)";
    M1_EM4135 = 0x0444, "EM4135 (M1)";
    M1_INFINEON_15693_AUTO_DETECT = 0x0450, "Infineon 15693 Auto Detect (M1)";
    M1_MYD2K = 0x0451, "My-D 2K (M1)";
    M1_MYD2KS = 0x0452, "My-D 2KS (M1)";
    M1_MYD10K = 0x0453, "My-D 10K (M1)";
    M1_MYD10KS = 0x0454, "My-D 10KS (M1)";
    ISO_18000_3_MODE1_EXTENDED_AUTO_DETECT = 0x0500, "ISO18000-3 Mode 1 Extended Auto Detect";
    RFU = 0x0510, "RFU";
    TAGSYS = 0x0511, "TagSys";
    ISO_18000_3_MODE2_AUTO_DETECT = 0x0600, "ISO18000-3 Mode 2 Auto Detect";
    INFINEON_AUTO_DETECT = 0x0610, "Infineon Auto Detect";
    INFINEON_PJM_TAG = 0x0611, "Infineon PJM Tag";
    ISO_18092_AUTO_DETECT = 0x0700, "ISO18092 Auto Detect";
    ISO_21481_AUTO_DETECT = 0x0800, "ISO21481 Auto Detect";
    HF_PROPRIETARY_RFU = 0x0900, "HF Proprietary RFU";
    TAGIT_HF = 0x0901, "Tag-It HF";
    ICODE1 = 0x0902, "I-Code1";
    HF_EPC = 0x0903, "HF EPC";
    LTO_PHILIPS = 0x0904, "LTO - Philips";
    LTO_ATMEL = 0x0905, "LTO - Atmel";
    FELICA = 0x0906, "FeliCA";
    PICOTAG_2K = 0x0907, "PicoTag 2k";
    PICOTAG_16K = 0x0908, "PicoTag 16k";
    PICOTAG_2KS = 0x0909, "PicoTag 2kS";
    PICOTAG_16KS = 0x0910, "PicoTag 16kS";
    HID_ICLASS = 0x0911, "HID I-Class";
    GEMWAVE_C210 = 0x0912, "GemWave C210";
    GEMWAVE_C220 = 0x0913, "GemWave C220";
    GEMWAVE_C240 = 0x0914, "GemWave C240";
    SR176 = 0x0915, "SR176";
    SKYETEK_AFE = 0x0916, "SkyeTek Crypto API";
    ICODE_UID_ICS11 = 0x0917, "I-Code UID ICS 11";
    ICODE_UID_ICS12 = 0x0918, "I-Code UID ICS 12";
    EPC_CLASS0_AUTO_DETECT = 0x8000, "EPC Class 0 Auto Detect";
    SYMBOL_CLASS0_AUTO_DETECT = 0x8010, "Symbol Class 0 Auto Detect";
    MATRICS_CLASS0 = 0x8011, "Matrics Class 0  (96 bits)";
    MATRICS_CLASS0_PLUS = 0x8012, "Matrics Class 0+  (256 bits)";
    IMPINJ_CLASS0_AUTO_DETECT = 0x8020, "Impinj Class 0 Auto Detect";
    ZUMA = 0x8021, "Zuma (256 bits) (Class 0+)";
    EPC_CLASS1_GEN1_AUTO_DETECT = 0x8100, "EPC Class 1 Gen 1 Auto Detect";
    ALIEN_C1G1_AUTO_DETECT = 0x8110, "Alien C1G1 Auto Detect";
    QUARK = 0x8111, "Quark (64 bits)";
    OMEGA = 0x8112, "Omega (64 bits)";
    LEPTON = 0x8113, "Lepton (96 bits)";
    ST_MICRO_C1G1_AUTO_DETECT = 0x8120, "ST Micro C1G1 Auto Detect";
    XRA00 = 0x8121, "XRA00 (64 bits)";
    ISO_18000_6C_AUTO_DETECT = 0x8200, "ISO18000-6C (EPC Class 1 Gen 2) Auto Detect";
    IMPINJ_C1G2_AUTO_DETECT = 0x8210, "Impinj C1G2 Auto Detect";
    MONZA = 0x8211, "Monza (256 bits)";
    PHILIPS_C1G2_AUTO_DETECT = 0x8220, "Philips C1G2 Auto Detect";
    UCODE_EPC_G2 = 0x8221, "UCode EPC G2 (512 bits)";
    MOTOROLA_EPC_G2 = 0x8222, "Motorola EPC Gen2";
    ST_C1G2_AUTO_DETECT = 0x8230, "ST C1G2 Auto Detect";
    XRAG2 = 0x8231, "XRAG2 (432 bits)";
    ALIEN_HIGGS = 0x8251, "Alien Higgs";
    EM_C1G2_AUTO = 0x8260, "EM C1G2 Auto Detect";
    EM_C1G2_EM4024 = 0x8261, "EM4024 C1G2";
    EM_C1G2_EM4124 = 0x8262, "EM4124 C1G2";
    EM_C1G2_EM4224 = 0x8263, "EM4224 C1G2";
    EM_C1G2_EM4324 = 0x8264, "EM4324 C1G2";
    ISO_18000_6B_AUTO_DETECT = 0x8300, "ISO18000-6B Auto Detect";
    PHILIPS_18000_6B_AUTO_DETECT = 0x8310, "Philips 18000-6B Auto Detect";
    UCODE_1_19 = 0x8311, "UCode EPC 1.19 (256 bits)";
    UCODE_HSL = 0x8312, "UCode HSL (1728 bits)";
    FUJITSU_ISO180006B_AUTO_DETECT = 0x8320, "Fujitsu ISO180006B Auto Detect";
    FUJITSU_MB97R8010 = 0x8321, "Fujitsu MB97R8010";
    FUJITSU_MB97R8020 = 0x8322, "Fujitsu MB97R8020";
    ISO_18000_6A_AUTO_DETECT = 0x8400, "ISO18000-6A Auto Detect";
    EM_6A = 0x8401, "EM 6A Tag";
    EM_IPX_AUTO = 0x8500, "EM IPX Auto Detect";
    EM4X22_AUTO = 0x8510, "EM4X22 Auto Detect";
    EM4022 = 0x8511, "EM4022";
    EM4122 = 0x8512, "EM4122";
    EM4222 = 0x8513, "EM4222";
    EM4X44_AUTO = 0x8520, "EM4X44 Auto Detect";
    EM4044 = 0x8521, "EM4044";
    EM4144 = 0x8522, "EM4144";
    EM4244 = 0x8523, "EM4244";
    EM4344 = 0x8524, "EM4344";
    EM4444 = 0x8525, "EM4444";
}

impl TagType {
    /// Raw code
    pub fn code(self) -> u16 {
        self.0
    }

    /// Low nibble of 1 marks the ISO-15693-shaped types whose `SELECT_TAG`
    /// response omits the discovered tag type
    pub fn is_iso15693_class(self) -> bool {
        self.0 & 0x000F == 1
    }

    /// Family auto-detect code (low byte zero)
    pub fn is_auto_detect(self) -> bool {
        self.0 & 0x00FF == 0
    }
}

impl From<u16> for TagType {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<TagType> for u16 {
    fn from(tag_type: TagType) -> u16 {
        tag_type.0
    }
}

impl fmt::Debug for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagType(0x{:04X})", self.0)
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(desc) => f.write_str(desc),
            None => write!(f, "Unknown tag type 0x{:04X}", self.0),
        }
    }
}

/// An RFID tag: family plus optional tag ID
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag family
    pub tag_type: TagType,

    /// Tag ID (up to 16 bytes); `None` when not yet known
    pub tid: Option<Bytes>,
}

impl Tag {
    /// Auto-detect tag with no TID
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag of a specific family with no TID
    pub fn with_type(tag_type: TagType) -> Self {
        Self {
            tag_type,
            tid: None,
        }
    }

    /// Tag with both family and TID
    pub fn with_tid(tag_type: TagType, tid: impl Into<Bytes>) -> Self {
        Self {
            tag_type,
            tid: Some(tid.into()),
        }
    }

    /// Hex-encoded TID, empty when absent
    pub fn tid_hex(&self) -> String {
        self.tid.as_deref().map(hex::encode_upper).unwrap_or_default()
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("tag_type", &self.tag_type)
            .field("tid", &self.tid_hex())
            .finish()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.tid_hex(), self.tag_type)
    }
}
