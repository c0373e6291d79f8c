//! NVRAM store and variable structures: NVAR, VSS/VSS2, FTW, FDC, Fsys,
//! EVSA, FlashMap, CMDB and SLIC records.

#![allow(dead_code)]

use scroll::Pread;
use uuid::{uuid, Uuid};

use crate::basetypes::Guid;

//
// NVAR
//

// CEF5B9A3-476D-497F-9FDC-E98143E0422C
pub const NVRAM_NVAR_STORE_FILE_GUID: Uuid = uuid!("CEF5B9A3-476D-497F-9FDC-E98143E0422C");
// 9221315B-30BB-46B5-813E-1B1BF4712BD3
pub const NVRAM_NVAR_EXTERNAL_DEFAULTS_FILE_GUID: Uuid =
    uuid!("9221315B-30BB-46B5-813E-1B1BF4712BD3");
pub const NVRAM_NVAR_PEI_EXTERNAL_DEFAULTS_FILE_GUID: Uuid =
    uuid!("77D3DC50-D42B-4916-AC80-8F469035D150");
pub const NVRAM_NVAR_BB_DEFAULTS_FILE_GUID: Uuid = uuid!("AF516361-B4C5-436E-A7E3-A149A31B1461");

pub const NVRAM_NVAR_ENTRY_SIGNATURE: u32 = 0x5241_564E; // NVAR

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct NvarEntryHeader {
    pub signature: u32,
    pub size: u16,               // entry size, header included
    pub next_and_attributes: u32, // next:24, attributes:8
}

pub const NVAR_ENTRY_HEADER_SIZE: usize = 10;

impl NvarEntryHeader {
    pub fn next(&self) -> u32 {
        self.next_and_attributes & 0x00FF_FFFF
    }

    pub fn attributes(&self) -> u8 {
        (self.next_and_attributes >> 24) as u8
    }
}

// NVAR attributes
pub const NVRAM_NVAR_ENTRY_RUNTIME: u8 = 0x01;
pub const NVRAM_NVAR_ENTRY_ASCII_NAME: u8 = 0x02;
pub const NVRAM_NVAR_ENTRY_GUID: u8 = 0x04;
pub const NVRAM_NVAR_ENTRY_DATA_ONLY: u8 = 0x08;
pub const NVRAM_NVAR_ENTRY_EXT_HEADER: u8 = 0x10;
pub const NVRAM_NVAR_ENTRY_HW_ERROR_RECORD: u8 = 0x20;
pub const NVRAM_NVAR_ENTRY_AUTH_WRITE: u8 = 0x40;
pub const NVRAM_NVAR_ENTRY_VALID: u8 = 0x80;

// NVAR extended attributes
pub const NVRAM_NVAR_ENTRY_EXT_CHECKSUM: u8 = 0x01;
pub const NVRAM_NVAR_ENTRY_EXT_AUTH_WRITE: u8 = 0x10;
pub const NVRAM_NVAR_ENTRY_EXT_TIME_BASED: u8 = 0x20;
pub const NVRAM_NVAR_ENTRY_EXT_UNKNOWN_MASK: u8 = 0xCE;

pub fn nvar_attributes_to_string(attributes: u8) -> String {
    let mut parts = Vec::new();
    if attributes & NVRAM_NVAR_ENTRY_RUNTIME != 0 {
        parts.push("Runtime");
    }
    if attributes & NVRAM_NVAR_ENTRY_ASCII_NAME != 0 {
        parts.push("AsciiName");
    }
    if attributes & NVRAM_NVAR_ENTRY_GUID != 0 {
        parts.push("Guid");
    }
    if attributes & NVRAM_NVAR_ENTRY_DATA_ONLY != 0 {
        parts.push("DataOnly");
    }
    if attributes & NVRAM_NVAR_ENTRY_EXT_HEADER != 0 {
        parts.push("ExtHeader");
    }
    if attributes & NVRAM_NVAR_ENTRY_HW_ERROR_RECORD != 0 {
        parts.push("HwErrorRecord");
    }
    if attributes & NVRAM_NVAR_ENTRY_AUTH_WRITE != 0 {
        parts.push("AuthWrite");
    }
    if attributes & NVRAM_NVAR_ENTRY_VALID != 0 {
        parts.push("Valid");
    }
    parts.join(", ")
}

//
// VSS
//

pub const NVRAM_VSS_STORE_SIGNATURE: u32 = 0x5353_5624; // $VSS
pub const NVRAM_APPLE_SVS_STORE_SIGNATURE: u32 = 0x5356_5324; // $SVS
pub const NVRAM_APPLE_NSS_STORE_SIGNATURE: u32 = 0x5353_4E24; // $NSS

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct VssVariableStoreHeader {
    pub signature: u32,
    pub size: u32,
    pub format: u8,
    pub state: u8,
    pub unknown: u16,
    pub reserved: u32,
}

pub const VSS_VARIABLE_STORE_HEADER_SIZE: usize = 16;

pub const NVRAM_VSS_VARIABLE_STORE_FORMATTED: u8 = 0x5A;
pub const NVRAM_VSS_VARIABLE_STORE_HEALTHY: u8 = 0xFE;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct VssVariableHeader {
    pub start_id: u16,
    pub state: u8,
    pub reserved: u8,
    pub attributes: u32,
    pub name_size: u32,
    pub data_size: u32,
    pub vendor_guid: Guid,
}

pub const VSS_VARIABLE_HEADER_SIZE: usize = 32;

// Apple variant appends a CRC32 of the variable data
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct VssAppleVariableHeader {
    pub start_id: u16,
    pub state: u8,
    pub reserved: u8,
    pub attributes: u32,
    pub name_size: u32,
    pub data_size: u32,
    pub vendor_guid: Guid,
    pub data_crc32: u32,
}

pub const VSS_APPLE_VARIABLE_HEADER_SIZE: usize = 36;

// Authenticated variant
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct VssAuthVariableHeader {
    pub start_id: u16,
    pub state: u8,
    pub reserved: u8,
    pub attributes: u32,
    pub monotonic_counter: u64,
    pub timestamp: [u8; 16],
    pub pubkey_index: u32,
    pub name_size: u32,
    pub data_size: u32,
    pub vendor_guid: Guid,
}

pub const VSS_AUTH_VARIABLE_HEADER_SIZE: usize = 60;

// Intel legacy variant stores one total size instead of name/data sizes
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct VssIntelVariableHeader {
    pub start_id: u16,
    pub state: u8,
    pub reserved: u8,
    pub attributes: u32,
    pub total_size: u32,
}

pub const VSS_INTEL_VARIABLE_HEADER_SIZE: usize = 12;

pub const NVRAM_VSS_VARIABLE_START_ID: u16 = 0x55AA;

// Variable states
pub const NVRAM_VSS_VARIABLE_IN_DELETED_TRANSITION: u8 = 0xFE;
pub const NVRAM_VSS_VARIABLE_DELETED: u8 = 0xFD;
pub const NVRAM_VSS_VARIABLE_HEADER_VALID: u8 = 0x7F;
pub const NVRAM_VSS_VARIABLE_ADDED: u8 = 0x3F;

// Variable attributes
pub const NVRAM_VSS_VARIABLE_NON_VOLATILE: u32 = 0x0000_0001;
pub const NVRAM_VSS_VARIABLE_BOOTSERVICE_ACCESS: u32 = 0x0000_0002;
pub const NVRAM_VSS_VARIABLE_RUNTIME_ACCESS: u32 = 0x0000_0004;
pub const NVRAM_VSS_VARIABLE_HARDWARE_ERROR_RECORD: u32 = 0x0000_0008;
pub const NVRAM_VSS_VARIABLE_AUTHENTICATED_WRITE_ACCESS: u32 = 0x0000_0010;
pub const NVRAM_VSS_VARIABLE_TIME_BASED_AUTHENTICATED_WRITE_ACCESS: u32 = 0x0000_0020;
pub const NVRAM_VSS_VARIABLE_APPEND_WRITE: u32 = 0x0000_0040;
pub const NVRAM_VSS_VARIABLE_APPLE_DATA_CHECKSUM: u32 = 0x8000_0000;

pub fn vss_attributes_to_string(attributes: u32) -> String {
    let mut parts = Vec::new();
    if attributes & NVRAM_VSS_VARIABLE_NON_VOLATILE != 0 {
        parts.push("NV");
    }
    if attributes & NVRAM_VSS_VARIABLE_BOOTSERVICE_ACCESS != 0 {
        parts.push("BS");
    }
    if attributes & NVRAM_VSS_VARIABLE_RUNTIME_ACCESS != 0 {
        parts.push("RT");
    }
    if attributes & NVRAM_VSS_VARIABLE_HARDWARE_ERROR_RECORD != 0 {
        parts.push("HER");
    }
    if attributes & NVRAM_VSS_VARIABLE_AUTHENTICATED_WRITE_ACCESS != 0 {
        parts.push("AW");
    }
    if attributes & NVRAM_VSS_VARIABLE_TIME_BASED_AUTHENTICATED_WRITE_ACCESS != 0 {
        parts.push("TBAW");
    }
    if attributes & NVRAM_VSS_VARIABLE_APPEND_WRITE != 0 {
        parts.push("AppendW");
    }
    if attributes & NVRAM_VSS_VARIABLE_APPLE_DATA_CHECKSUM != 0 {
        parts.push("AppleChecksum");
    }
    parts.join(", ")
}

//
// VSS2
//

pub const NVRAM_VSS2_AUTH_VAR_KEY_DATABASE_GUID: Uuid =
    uuid!("AAF32C78-947B-439A-A180-2E144EC37792");
pub const NVRAM_VSS2_STORE_GUID: Uuid = uuid!("DDCF3616-3275-4164-98B6-FE85707FFE7D");

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct Vss2VariableStoreHeader {
    pub signature: Guid,
    pub size: u32,
    pub format: u8,
    pub state: u8,
    pub unknown: u16,
    pub reserved: u32,
}

pub const VSS2_VARIABLE_STORE_HEADER_SIZE: usize = 28;

//
// FTW
//

pub const NVRAM_FTW_BLOCK_SIGNATURE_GUID_EDKII: Uuid =
    uuid!("9E58292B-7C68-497D-A0CE-6500FD9F1B95");
pub const NVRAM_FTW_BLOCK_SIGNATURE_GUID_VSS2: Uuid =
    uuid!("FD3F690E-B4B0-4D68-89DB-19A1A3318F90");

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct FtwBlockHeader32 {
    pub signature: Guid,
    pub crc: u32,
    pub state: u8,
    pub reserved: [u8; 3],
    pub write_queue_size: u32,
}

pub const FTW_BLOCK_HEADER32_SIZE: usize = 28;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct FtwBlockHeader64 {
    pub signature: Guid,
    pub crc: u32,
    pub state: u8,
    pub reserved: [u8; 3],
    pub write_queue_size: u64,
}

pub const FTW_BLOCK_HEADER64_SIZE: usize = 32;

//
// FDC
//

pub const NVRAM_FDC_STORE_SIGNATURE: u32 = 0x4344_465F; // _FDC

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct FdcStoreHeader {
    pub signature: u32,
    pub size: u32,
}

pub const FDC_STORE_HEADER_SIZE: usize = 8;

//
// Apple Fsys / Gaid
//

pub const NVRAM_APPLE_FSYS_STORE_SIGNATURE: u32 = 0x7379_7346; // Fsys
pub const NVRAM_APPLE_GAID_STORE_SIGNATURE: u32 = 0x6469_6147; // Gaid

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct FsysStoreHeader {
    pub signature: u32,
    pub unknown0: u8,
    pub unknown1: u32,
    pub size: u16,
}

pub const FSYS_STORE_HEADER_SIZE: usize = 11;

//
// EVSA
//

pub const NVRAM_EVSA_STORE_SIGNATURE: u32 = 0x4153_5645; // EVSA

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct EvsaEntryHeader {
    pub entry_type: u8,
    pub checksum: u8, // checksum8 over the entry starting at the size field
    pub size: u16,
}

pub const EVSA_ENTRY_HEADER_SIZE: usize = 4;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct EvsaStoreEntry {
    pub header: EvsaEntryHeader,
    pub signature: u32,
    pub attributes: u32,
    pub store_size: u32,
    pub reserved: u32,
}

pub const EVSA_STORE_ENTRY_SIZE: usize = 20;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct EvsaGuidEntry {
    pub header: EvsaEntryHeader,
    pub guid_id: u16,
    // GUID follows
}

pub const EVSA_GUID_ENTRY_SIZE: usize = 6;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct EvsaNameEntry {
    pub header: EvsaEntryHeader,
    pub var_id: u16,
    // UCS-2 name follows
}

pub const EVSA_NAME_ENTRY_SIZE: usize = 6;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct EvsaDataEntry {
    pub header: EvsaEntryHeader,
    pub guid_id: u16,
    pub var_id: u16,
    pub attributes: u32,
    // data follows; extended entries store a u32 data size first
}

pub const EVSA_DATA_ENTRY_SIZE: usize = 12;

pub const NVRAM_EVSA_ENTRY_TYPE_STORE: u8 = 0xEC;
pub const NVRAM_EVSA_ENTRY_TYPE_GUID1: u8 = 0xED;
pub const NVRAM_EVSA_ENTRY_TYPE_GUID2: u8 = 0xE1;
pub const NVRAM_EVSA_ENTRY_TYPE_NAME1: u8 = 0xEE;
pub const NVRAM_EVSA_ENTRY_TYPE_NAME2: u8 = 0xE2;
pub const NVRAM_EVSA_ENTRY_TYPE_DATA1: u8 = 0xEF;
pub const NVRAM_EVSA_ENTRY_TYPE_DATA2: u8 = 0xE3;
pub const NVRAM_EVSA_ENTRY_TYPE_DATA_INVALID: u8 = 0x83;

pub const NVRAM_EVSA_DATA_EXTENDED_ATTRIBUTE: u32 = 0x1000_0000;

//
// Phoenix FlashMap
//

pub const NVRAM_PHOENIX_FLASH_MAP_SIGNATURE: &[u8; 10] = b"_FLASH_MAP";

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct PhoenixFlashMapHeader {
    pub signature: [u8; 10],
    pub num_entries: u16,
    pub reserved: u32,
}

pub const PHOENIX_FLASH_MAP_HEADER_SIZE: usize = 16;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct PhoenixFlashMapEntry {
    pub guid: Guid,
    pub data_type: u16,
    pub entry_type: u16,
    pub physical_address: u64,
    pub size: u32,
    pub offset: u32,
}

pub const PHOENIX_FLASH_MAP_ENTRY_SIZE: usize = 36;

pub const NVRAM_PHOENIX_FLASH_MAP_ENTRY_DATA_TYPE_VOLUME: u16 = 0x0000;
pub const NVRAM_PHOENIX_FLASH_MAP_ENTRY_DATA_TYPE_DATA: u16 = 0x0001;

//
// Phoenix CMDB
//

pub const NVRAM_PHOENIX_CMDB_HEADER_SIGNATURE: u32 = 0x4244_4D43; // CMDB
pub const NVRAM_PHOENIX_CMDB_SIZE: usize = 0x100;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct PhoenixCmdbHeader {
    pub signature: u32,
    pub header_size: u32,
    pub total_size: u32,
}

pub const PHOENIX_CMDB_HEADER_SIZE: usize = 12;

//
// SLIC pubkey and marker
//

pub const OEM_ACTIVATION_PUBKEY_MAGIC: u32 = 0x3141_5352; // RSA1
/// Offset of the RSA1 magic within the pubkey structure.
pub const OEM_ACTIVATION_PUBKEY_MAGIC_OFFSET: usize = 16;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct OemActivationPubkey {
    pub record_type: u32,
    pub size: u32,
    pub key_type: u8,
    pub version: u8,
    pub reserved: u16,
    pub algorithm: u32,
    pub magic: u32, // RSA1
    pub bit_length: u32,
    pub exponent: u32,
    pub modulus: [u8; 128],
}

pub const OEM_ACTIVATION_PUBKEY_SIZE: usize = 0x9C;

pub const OEM_ACTIVATION_MARKER_WINDOWS_FLAG: u64 = 0x2020_534F_444E_4957; // 'WINDOWS '
/// Offset of the Windows flag within the marker structure.
pub const OEM_ACTIVATION_MARKER_WINDOWS_FLAG_OFFSET: usize = 26;
pub const OEM_ACTIVATION_MARKER_RESERVED_BYTE: u8 = 0x00;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct OemActivationMarker {
    pub record_type: u32,
    pub size: u32,
    pub version: u32,
    pub oem_id: [u8; 6],
    pub oem_table_id: [u8; 8],
    pub windows_flag: u64,
    pub slic_version: u32,
    pub reserved: [u8; 16],
    pub signature: [u8; 128],
}

pub const OEM_ACTIVATION_MARKER_SIZE: usize = 0xB6;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basetypes::read_le;

    #[test]
    fn nvar_header_bitfields() {
        let mut bytes = vec![0u8; NVAR_ENTRY_HEADER_SIZE];
        bytes[..4].copy_from_slice(&NVRAM_NVAR_ENTRY_SIGNATURE.to_le_bytes());
        bytes[4..6].copy_from_slice(&0x30u16.to_le_bytes());
        let next_and_attributes: u32 =
            0x00FF_FFFF | ((NVRAM_NVAR_ENTRY_VALID as u32 | NVRAM_NVAR_ENTRY_GUID as u32) << 24);
        bytes[6..10].copy_from_slice(&next_and_attributes.to_le_bytes());
        let header: NvarEntryHeader = read_le(&bytes).unwrap();
        assert_eq!(header.size, 0x30);
        assert_eq!(header.next(), 0x00FF_FFFF);
        assert_eq!(header.attributes() & NVRAM_NVAR_ENTRY_VALID, NVRAM_NVAR_ENTRY_VALID);
    }

    #[test]
    fn signatures_spell_out() {
        assert_eq!(&NVRAM_VSS_STORE_SIGNATURE.to_le_bytes(), b"$VSS");
        assert_eq!(&NVRAM_APPLE_SVS_STORE_SIGNATURE.to_le_bytes(), b"$SVS");
        assert_eq!(&NVRAM_FDC_STORE_SIGNATURE.to_le_bytes(), b"_FDC");
        assert_eq!(&NVRAM_APPLE_FSYS_STORE_SIGNATURE.to_le_bytes(), b"Fsys");
        assert_eq!(&NVRAM_APPLE_GAID_STORE_SIGNATURE.to_le_bytes(), b"Gaid");
        assert_eq!(&NVRAM_EVSA_STORE_SIGNATURE.to_le_bytes(), b"EVSA");
        assert_eq!(&NVRAM_PHOENIX_CMDB_HEADER_SIGNATURE.to_le_bytes(), b"CMDB");
        assert_eq!(&NVRAM_NVAR_ENTRY_SIGNATURE.to_le_bytes(), b"NVAR");
        assert_eq!(&OEM_ACTIVATION_MARKER_WINDOWS_FLAG.to_le_bytes(), b"WINDOWS ");
    }
}
