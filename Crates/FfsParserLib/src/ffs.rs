//! On-disk structures and well-known GUIDs for UEFI capsules, firmware
//! volumes, FFS files and sections.
//!
//! Layouts follow the definitions in
//! <https://github.com/tianocore/edk2/blob/master/MdePkg/Include/Pi/PiFirmwareVolume.h>
//! and PiFirmwareFile.h, plus the vendor-specific additions observed in real
//! images. All fields are little-endian; structures are read with `scroll`
//! and unaligned loads.

#![allow(dead_code)] // allow constants that only some images exercise

use lazy_static::lazy_static;
use scroll::Pread;
use std::collections::HashMap;
use uuid::{uuid, Uuid};

use crate::basetypes::{uuid_to_string, Guid, Uint24};

//
// Capsules
//

pub const EFI_CAPSULE_GUID: Uuid = uuid!("3B6686BD-0D76-4030-B70E-B5519E2FC5A0");
pub const EFI_FMP_CAPSULE_GUID: Uuid = uuid!("6DCBD5ED-E82D-4C44-BDA1-7194199AD92A");
pub const INTEL_CAPSULE_GUID: Uuid = uuid!("539182B9-ABB5-4391-B69A-E3A943F72FCC");
pub const LENOVO_CAPSULE_GUID: Uuid = uuid!("E20BAFD3-9914-4F4F-9537-3129E090EB3C");
pub const LENOVO2_CAPSULE_GUID: Uuid = uuid!("25B5FE76-8243-4A1C-A9BD-7EE3246198B5");
pub const TOSHIBA_CAPSULE_GUID: Uuid = uuid!("3BE07062-1D51-45D2-832B-F093257ED461");
pub const APTIO_SIGNED_CAPSULE_GUID: Uuid = uuid!("4A3CA68B-7723-48FB-803D-578CC1FEC44D");
pub const APTIO_UNSIGNED_CAPSULE_GUID: Uuid = uuid!("14EEBB90-890A-43DB-AED1-5D3C4588A418");

// EFI_CAPSULE_HEADER
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CapsuleHeader {
    pub capsule_guid: Guid,
    pub header_size: u32,
    pub flags: u32,
    pub capsule_image_size: u32,
}

pub const CAPSULE_HEADER_SIZE: usize = 28;

// TOSHIBA_CAPSULE_HEADER
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct ToshibaCapsuleHeader {
    pub capsule_guid: Guid,
    pub header_size: u32,
    pub full_size: u32,
    pub flags: u32,
}

// APTIO_CAPSULE_HEADER
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct AptioCapsuleHeader {
    pub capsule_header: CapsuleHeader,
    pub rom_image_offset: u16,
    pub rom_layout_offset: u16,
}

pub const APTIO_CAPSULE_HEADER_SIZE: usize = CAPSULE_HEADER_SIZE + 4;

//
// Firmware volume
//

pub const EFI_FV_SIGNATURE: u32 = 0x4856465F; // _FVH
pub const EFI_FV_SIGNATURE_OFFSET: usize = 40;

// EFI_FIRMWARE_VOLUME_HEADER without the trailing block map
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct VolumeHeader {
    pub zero_vector: [u8; 16],
    pub file_system_guid: Guid,
    pub fv_length: u64,
    pub signature: u32,
    pub attributes: u32,
    pub header_length: u16,
    pub checksum: u16,
    pub ext_header_offset: u16,
    pub reserved: u8,
    pub revision: u8,
}

/// Fixed part of the volume header, block map excluded.
pub const VOLUME_HEADER_SIZE: usize = 0x38;
/// Smallest well-formed header: fixed part plus the block map terminator.
pub const VOLUME_HEADER_MIN_SIZE: usize = 0x40;

// EFI_FV_BLOCK_MAP_ENTRY
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BlockMapEntry {
    pub num_blocks: u32,
    pub length: u32,
}

pub const BLOCK_MAP_ENTRY_SIZE: usize = 8;

// EFI_FIRMWARE_VOLUME_EXT_HEADER
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct VolumeExtHeader {
    pub fv_name: Guid,
    pub ext_header_size: u32,
}

pub const VOLUME_EXT_HEADER_SIZE: usize = 20;

// Volume attributes
pub const EFI_FVB_ERASE_POLARITY: u32 = 0x0000_0800;
pub const EFI_FVB_ALIGNMENT_CAP: u32 = 0x0000_8000; // Revision 1 only
pub const EFI_FVB2_ALIGNMENT: u32 = 0x001F_0000;
pub const EFI_FVB2_WEAK_ALIGNMENT: u32 = 0x8000_0000;

// File system GUIDs
pub const EFI_FIRMWARE_FILE_SYSTEM_GUID: Uuid = uuid!("7A9354D9-0468-444A-81CE-0BF617D890DF");
pub const EFI_FIRMWARE_FILE_SYSTEM2_GUID: Uuid = uuid!("8C8CE578-8A3D-4F1C-9935-896185C32DD3");
pub const EFI_FIRMWARE_FILE_SYSTEM3_GUID: Uuid = uuid!("5473C07A-3DCB-4DCA-BD6F-1E9689E7349A");
pub const EFI_APPLE_IMMUTABLE_FV_GUID: Uuid = uuid!("04ADEEAD-61FF-4D31-B6BA-64F8BF901F5A");
pub const EFI_APPLE_AUTHENTICATION_FV_GUID: Uuid = uuid!("BD001B8C-6A71-487B-A14F-0C2A2DCF7A5D");
pub const EFI_APPLE_MICROCODE_VOLUME_GUID: Uuid = uuid!("153D2197-29BD-44DC-AC59-887F70E41A6B");
pub const EFI_INTEL_FILE_SYSTEM_GUID: Uuid = uuid!("AD3FFFFF-D28B-44C4-9F13-9EA98A97F9F0");
pub const EFI_INTEL_FILE_SYSTEM2_GUID: Uuid = uuid!("D6A1CD70-4B33-4994-A6EA-375F2CCC5437");
pub const EFI_SONY_FILE_SYSTEM_GUID: Uuid = uuid!("4F494156-AED6-4D64-A537-B8A5557BCEEC");

pub const EFI_APPLE_MICROCODE_VOLUME_HEADER_SIZE: usize = 0x100;

/// File systems parsed as FFSv2.
pub const FFS_V2_VOLUMES: [Uuid; 6] = [
    EFI_FIRMWARE_FILE_SYSTEM_GUID,
    EFI_FIRMWARE_FILE_SYSTEM2_GUID,
    EFI_APPLE_IMMUTABLE_FV_GUID,
    EFI_APPLE_AUTHENTICATION_FV_GUID,
    EFI_INTEL_FILE_SYSTEM_GUID,
    EFI_INTEL_FILE_SYSTEM2_GUID,
];

/// File systems parsed as FFSv3.
pub const FFS_V3_VOLUMES: [Uuid; 2] = [EFI_FIRMWARE_FILE_SYSTEM3_GUID, EFI_SONY_FILE_SYSTEM_GUID];

// NVRAM volumes
pub const NVRAM_MAIN_STORE_VOLUME_GUID: Uuid = uuid!("FFF12B8D-7696-4C8B-A985-2747075B4F50");
pub const NVRAM_ADDITIONAL_STORE_VOLUME_GUID: Uuid =
    uuid!("00504624-8A59-4EEB-BD0F-6B36E96128E0");

//
// FFS files
//

// EFI_FFS_FILE_HEADER
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct FfsFileHeader {
    pub name: Guid,
    pub integrity_check_header: u8,
    pub integrity_check_file: u8,
    pub file_type: u8,
    pub attributes: u8,
    pub size: Uint24,
    pub state: u8,
}

pub const FFS_FILE_HEADER_SIZE: usize = 24;

// EFI_FFS_FILE_HEADER2, used by FFSv3 files with FFS_ATTRIB_LARGE_FILE
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct FfsFileHeader2 {
    pub name: Guid,
    pub integrity_check_header: u8,
    pub integrity_check_file: u8,
    pub file_type: u8,
    pub attributes: u8,
    pub size: Uint24,
    pub state: u8,
    pub extended_size: u64,
}

pub const FFS_FILE_HEADER2_SIZE: usize = 32;

// File types
pub const EFI_FV_FILETYPE_ALL: u8 = 0x00;
pub const EFI_FV_FILETYPE_RAW: u8 = 0x01;
pub const EFI_FV_FILETYPE_FREEFORM: u8 = 0x02;
pub const EFI_FV_FILETYPE_SECURITY_CORE: u8 = 0x03;
pub const EFI_FV_FILETYPE_PEI_CORE: u8 = 0x04;
pub const EFI_FV_FILETYPE_DXE_CORE: u8 = 0x05;
pub const EFI_FV_FILETYPE_PEIM: u8 = 0x06;
pub const EFI_FV_FILETYPE_DRIVER: u8 = 0x07;
pub const EFI_FV_FILETYPE_COMBINED_PEIM_DRIVER: u8 = 0x08;
pub const EFI_FV_FILETYPE_APPLICATION: u8 = 0x09;
pub const EFI_FV_FILETYPE_MM: u8 = 0x0A;
pub const EFI_FV_FILETYPE_FIRMWARE_VOLUME_IMAGE: u8 = 0x0B;
pub const EFI_FV_FILETYPE_COMBINED_MM_DXE: u8 = 0x0C;
pub const EFI_FV_FILETYPE_MM_CORE: u8 = 0x0D;
pub const EFI_FV_FILETYPE_MM_STANDALONE: u8 = 0x0E;
pub const EFI_FV_FILETYPE_MM_CORE_STANDALONE: u8 = 0x0F;
pub const EFI_FV_FILETYPE_PAD: u8 = 0xF0;

// File attributes
pub const FFS_ATTRIB_LARGE_FILE: u8 = 0x01;
pub const FFS_ATTRIB_DATA_ALIGNMENT2: u8 = 0x02;
pub const FFS_ATTRIB_FIXED: u8 = 0x04;
pub const FFS_ATTRIB_DATA_ALIGNMENT: u8 = 0x38;
pub const FFS_ATTRIB_CHECKSUM: u8 = 0x40;
pub const FFS_ATTRIB_TAIL_PRESENT: u8 = 0x80; // Revision 1 only

// File state bits
pub const EFI_FILE_HEADER_CONSTRUCTION: u8 = 0x01;
pub const EFI_FILE_HEADER_VALID: u8 = 0x02;
pub const EFI_FILE_DATA_VALID: u8 = 0x04;
pub const EFI_FILE_MARKED_FOR_UPDATE: u8 = 0x08;
pub const EFI_FILE_DELETED: u8 = 0x10;
pub const EFI_FILE_HEADER_INVALID: u8 = 0x20;
pub const EFI_FILE_ERASE_POLARITY: u8 = 0x80;

// Data checksum sentinels used when FFS_ATTRIB_CHECKSUM is clear
pub const FFS_FIXED_CHECKSUM: u8 = 0x5A;
pub const FFS_FIXED_CHECKSUM2: u8 = 0xAA;

/// Alignment power per (Attributes & FFS_ATTRIB_DATA_ALIGNMENT) >> 3.
pub const FFS_ALIGNMENT_TABLE: [u8; 8] = [0, 4, 7, 9, 10, 12, 15, 16];
/// The same index space with FFS_ATTRIB_DATA_ALIGNMENT2 set (revision 2+).
pub const FFS_ALIGNMENT2_TABLE: [u8; 8] = [17, 18, 19, 20, 21, 22, 23, 24];

// Special files
pub const EFI_FFS_VOLUME_TOP_FILE_GUID: Uuid = uuid!("1BA0062E-C779-4582-8566-336AE8F78F09");
pub const EFI_DXE_CORE_GUID: Uuid = uuid!("D6A2CB7F-02E3-4002-9E3E-6CD007E69DCB");
pub const AMI_CORE_DXE_GUID: Uuid = uuid!("5AE3F37E-4EAE-41AE-8240-35465B5E81EB");
pub const EFI_PEI_APRIORI_FILE_GUID: Uuid = uuid!("1B45CC0A-156A-428A-AF62-49864DA0E6E6");
pub const EFI_DXE_APRIORI_FILE_GUID: Uuid = uuid!("FC510EE7-FFDC-11D4-BD41-0080C73C8881");

pub const AMI_ROM_HOLE_FILE_GUIDS: [Uuid; 16] = [
    uuid!("05CA01FC-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA01FD-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA01FE-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA01FF-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA0200-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA0201-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA0202-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA0203-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA0204-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA0205-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA0206-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA0207-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA0208-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA0209-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA020A-0FC1-11DC-9011-00173153EBA8"),
    uuid!("05CA020B-0FC1-11DC-9011-00173153EBA8"),
];

// Vendor hash files
pub const PROTECTED_RANGE_VENDOR_HASH_FILE_GUID_PHOENIX: Uuid =
    uuid!("389CC6F2-1EA8-467B-AB8A-78E769AE2A15");
pub const PROTECTED_RANGE_VENDOR_HASH_FILE_GUID_AMI: Uuid =
    uuid!("CBC91F44-A4BC-4A5B-8696-703451D0B053");
pub const BG_VENDOR_HASH_FILE_SIGNATURE_PHOENIX: u64 = 0x4C42_5448_5341_4824; // $HASHTBL

// Startup AP data that may live inside padding files
// https://github.com/tianocore/edk2/blob/stable/202011/BaseTools/Source/C/GenFv/GenFvInternalLib.c#L106
pub const RECOVERY_STARTUP_AP_DATA_X86_SIZE: usize = 16;
pub const RECOVERY_STARTUP_AP_DATA_X86_128K: [u8; RECOVERY_STARTUP_AP_DATA_X86_SIZE] = [
    0xEA, 0xD0, 0xFF, 0x00, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x90,
    0x90,
];

//
// Sections
//

// EFI_COMMON_SECTION_HEADER
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CommonSectionHeader {
    pub size: Uint24,
    pub section_type: u8,
}

pub const COMMON_SECTION_HEADER_SIZE: usize = 4;

// EFI_COMMON_SECTION_HEADER2; Size == 0xFFFFFF marks its use
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CommonSectionHeader2 {
    pub size: Uint24,
    pub section_type: u8,
    pub extended_size: u32,
}

pub const COMMON_SECTION_HEADER2_SIZE: usize = 8;
pub const EFI_SECTION2_IS_USED: u32 = 0xFFFFFF;

// Section types
pub const EFI_SECTION_COMPRESSION: u8 = 0x01;
pub const EFI_SECTION_GUID_DEFINED: u8 = 0x02;
pub const EFI_SECTION_DISPOSABLE: u8 = 0x03;
pub const EFI_SECTION_PE32: u8 = 0x10;
pub const EFI_SECTION_PIC: u8 = 0x11;
pub const EFI_SECTION_TE: u8 = 0x12;
pub const EFI_SECTION_DXE_DEPEX: u8 = 0x13;
pub const EFI_SECTION_VERSION: u8 = 0x14;
pub const EFI_SECTION_USER_INTERFACE: u8 = 0x15;
pub const EFI_SECTION_COMPATIBILITY16: u8 = 0x16;
pub const EFI_SECTION_FIRMWARE_VOLUME_IMAGE: u8 = 0x17;
pub const EFI_SECTION_FREEFORM_SUBTYPE_GUID: u8 = 0x18;
pub const EFI_SECTION_RAW: u8 = 0x19;
pub const EFI_SECTION_PEI_DEPEX: u8 = 0x1B;
pub const EFI_SECTION_MM_DEPEX: u8 = 0x1C;
pub const INSYDE_SECTION_POSTCODE: u8 = 0x20;
pub const PHOENIX_SECTION_POSTCODE: u8 = 0xF0;

// EFI_COMPRESSION_SECTION extra header
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CompressionSectionExtra {
    pub uncompressed_length: u32,
    pub compression_type: u8,
}

pub const COMPRESSION_SECTION_EXTRA_SIZE: usize = 5;

// EFI_GUID_DEFINED_SECTION extra header
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct GuidDefinedSectionExtra {
    pub section_definition_guid: Guid,
    pub data_offset: u16,
    pub attributes: u16,
}

pub const GUID_DEFINED_SECTION_EXTRA_SIZE: usize = 20;

// EFI_FREEFORM_SUBTYPE_GUID_SECTION extra header
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct FreeformSubtypeGuidSectionExtra {
    pub sub_type_guid: Guid,
}

pub const FREEFORM_SECTION_EXTRA_SIZE: usize = 16;

// EFI_VERSION_SECTION extra header
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct VersionSectionExtra {
    pub build_number: u16,
}

pub const VERSION_SECTION_EXTRA_SIZE: usize = 2;

// POSTCODE_SECTION extra header
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct PostcodeSectionExtra {
    pub postcode: u32,
}

pub const POSTCODE_SECTION_EXTRA_SIZE: usize = 4;

// Compression types stored in compression sections
pub const EFI_NOT_COMPRESSED: u8 = 0x00;
pub const EFI_STANDARD_COMPRESSION: u8 = 0x01;
pub const EFI_CUSTOMIZED_COMPRESSION: u8 = 0x02;
pub const EFI_CUSTOMIZED_COMPRESSION_LZMAF86: u8 = 0x86;

// Decompression outcome, stored in parsing data
pub const COMPRESSION_ALGORITHM_UNKNOWN: u8 = 0;
pub const COMPRESSION_ALGORITHM_NONE: u8 = 1;
pub const COMPRESSION_ALGORITHM_EFI11: u8 = 2;
pub const COMPRESSION_ALGORITHM_TIANO: u8 = 3;
pub const COMPRESSION_ALGORITHM_UNDECIDED: u8 = 4;
pub const COMPRESSION_ALGORITHM_LZMA: u8 = 5;
pub const COMPRESSION_ALGORITHM_LZMAF86: u8 = 6;
pub const COMPRESSION_ALGORITHM_LZMA_INTEL_LEGACY: u8 = 7;
pub const COMPRESSION_ALGORITHM_GZIP: u8 = 8;

pub fn compression_algorithm_name(algorithm: u8) -> String {
    match algorithm {
        COMPRESSION_ALGORITHM_NONE => "None".to_string(),
        COMPRESSION_ALGORITHM_EFI11 => "EFI 1.1".to_string(),
        COMPRESSION_ALGORITHM_TIANO => "Tiano".to_string(),
        COMPRESSION_ALGORITHM_UNDECIDED => "Undecided Tiano/EFI 1.1".to_string(),
        COMPRESSION_ALGORITHM_LZMA => "LZMA".to_string(),
        COMPRESSION_ALGORITHM_LZMAF86 => "LZMAF86".to_string(),
        COMPRESSION_ALGORITHM_LZMA_INTEL_LEGACY => "Intel legacy LZMA".to_string(),
        COMPRESSION_ALGORITHM_GZIP => "GZip".to_string(),
        _ => format!("Unknown {:02X}h", algorithm),
    }
}

// GUIDed section attributes
pub const EFI_GUIDED_SECTION_PROCESSING_REQUIRED: u16 = 0x01;
pub const EFI_GUIDED_SECTION_AUTH_STATUS_VALID: u16 = 0x02;

// GUIDed section handlers
pub const EFI_GUIDED_SECTION_CRC32: Uuid = uuid!("FC1BCDB0-7D31-49AA-936A-A4600D9DD083");
pub const EFI_GUIDED_SECTION_TIANO: Uuid = uuid!("A31280AD-481E-41B6-95E8-127F4C984779");
pub const EFI_GUIDED_SECTION_LZMA: Uuid = uuid!("EE4E5898-3914-4259-9D6E-DC7BD79403CF");
pub const EFI_GUIDED_SECTION_LZMA_HP: Uuid = uuid!("0ED85E23-F253-413F-A03C-901987B04397");
pub const EFI_GUIDED_SECTION_LZMAF86: Uuid = uuid!("D42AE6BD-1352-4BFB-909A-CA72A6EAE889");
pub const EFI_GUIDED_SECTION_GZIP: Uuid = uuid!("1D301FE9-BE79-4353-91C2-D23BC959AE0C");
pub const EFI_FIRMWARE_CONTENTS_SIGNED_GUID: Uuid = uuid!("0F9D89E8-9259-4F76-A5AF-0C89E34023DF");
pub const EFI_CERT_TYPE_RSA2048_SHA256_GUID: Uuid = uuid!("A7717414-C616-4977-9420-844712A735BF");

// WIN_CERTIFICATE
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct WinCertificate {
    pub length: u32,
    pub revision: u16,
    pub certificate_type: u16,
}

pub const WIN_CERTIFICATE_SIZE: usize = 8;
pub const WIN_CERT_TYPE_EFI_GUID: u16 = 0x0EF1;

// WIN_CERTIFICATE_UEFI_GUID
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct WinCertificateUefiGuid {
    pub certificate: WinCertificate,
    pub cert_type: Guid,
}

// EFI_CERT_BLOCK_RSA2048_SHA256: HashType GUID + 256-byte key + 256-byte signature
pub const CERT_BLOCK_RSA2048_SHA256_SIZE: usize = 16 + 256 + 256;

//
// DEPEX opcodes
//

pub const EFI_DEP_BEFORE: u8 = 0x00;
pub const EFI_DEP_AFTER: u8 = 0x01;
pub const EFI_DEP_PUSH: u8 = 0x02;
pub const EFI_DEP_AND: u8 = 0x03;
pub const EFI_DEP_OR: u8 = 0x04;
pub const EFI_DEP_NOT: u8 = 0x05;
pub const EFI_DEP_TRUE: u8 = 0x06;
pub const EFI_DEP_FALSE: u8 = 0x07;
pub const EFI_DEP_END: u8 = 0x08;
pub const EFI_DEP_SOR: u8 = 0x09;
pub const EFI_DEP_OPCODE_SIZE: usize = 1;

//
// Display names
//

pub fn file_type_name(file_type: u8) -> String {
    match file_type {
        EFI_FV_FILETYPE_ALL => "All".to_string(),
        EFI_FV_FILETYPE_RAW => "Raw".to_string(),
        EFI_FV_FILETYPE_FREEFORM => "Freeform".to_string(),
        EFI_FV_FILETYPE_SECURITY_CORE => "SEC core".to_string(),
        EFI_FV_FILETYPE_PEI_CORE => "PEI core".to_string(),
        EFI_FV_FILETYPE_DXE_CORE => "DXE core".to_string(),
        EFI_FV_FILETYPE_PEIM => "PEI module".to_string(),
        EFI_FV_FILETYPE_DRIVER => "DXE driver".to_string(),
        EFI_FV_FILETYPE_COMBINED_PEIM_DRIVER => "Combined PEI/DXE".to_string(),
        EFI_FV_FILETYPE_APPLICATION => "Application".to_string(),
        EFI_FV_FILETYPE_MM => "SMM module".to_string(),
        EFI_FV_FILETYPE_FIRMWARE_VOLUME_IMAGE => "Volume image".to_string(),
        EFI_FV_FILETYPE_COMBINED_MM_DXE => "Combined SMM/DXE".to_string(),
        EFI_FV_FILETYPE_MM_CORE => "SMM core".to_string(),
        EFI_FV_FILETYPE_MM_STANDALONE => "MM standalone".to_string(),
        EFI_FV_FILETYPE_MM_CORE_STANDALONE => "MM core standalone".to_string(),
        EFI_FV_FILETYPE_PAD => "Pad".to_string(),
        _ => format!("Unknown {:02X}h", file_type),
    }
}

pub fn section_type_name(section_type: u8) -> String {
    match section_type {
        EFI_SECTION_COMPRESSION => "Compressed".to_string(),
        EFI_SECTION_GUID_DEFINED => "GUID defined".to_string(),
        EFI_SECTION_DISPOSABLE => "Disposable".to_string(),
        EFI_SECTION_PE32 => "PE32 image".to_string(),
        EFI_SECTION_PIC => "PIC image".to_string(),
        EFI_SECTION_TE => "TE image".to_string(),
        EFI_SECTION_DXE_DEPEX => "DXE dependency".to_string(),
        EFI_SECTION_VERSION => "Version".to_string(),
        EFI_SECTION_USER_INTERFACE => "UI".to_string(),
        EFI_SECTION_COMPATIBILITY16 => "Compatibility16".to_string(),
        EFI_SECTION_FIRMWARE_VOLUME_IMAGE => "Volume image".to_string(),
        EFI_SECTION_FREEFORM_SUBTYPE_GUID => "Freeform subtype GUID".to_string(),
        EFI_SECTION_RAW => "Raw".to_string(),
        EFI_SECTION_PEI_DEPEX => "PEI dependency".to_string(),
        EFI_SECTION_MM_DEPEX => "MM dependency".to_string(),
        INSYDE_SECTION_POSTCODE => "Insyde postcode".to_string(),
        PHOENIX_SECTION_POSTCODE => "Phoenix postcode".to_string(),
        _ => format!("Unknown {:02X}h", section_type),
    }
}

lazy_static! {
    static ref KNOWN_GUID_NAMES: HashMap<Uuid, &'static str> = {
        let mut map = HashMap::new();
        map.insert(EFI_FIRMWARE_FILE_SYSTEM_GUID, "EfiFirmwareFileSystemGuid");
        map.insert(EFI_FIRMWARE_FILE_SYSTEM2_GUID, "EfiFirmwareFileSystem2Guid");
        map.insert(EFI_FIRMWARE_FILE_SYSTEM3_GUID, "EfiFirmwareFileSystem3Guid");
        map.insert(EFI_APPLE_IMMUTABLE_FV_GUID, "AppleImmutableFvGuid");
        map.insert(EFI_APPLE_AUTHENTICATION_FV_GUID, "AppleAuthFvGuid");
        map.insert(EFI_APPLE_MICROCODE_VOLUME_GUID, "AppleMicrocodeVolumeGuid");
        map.insert(EFI_INTEL_FILE_SYSTEM_GUID, "IntelFileSystemGuid");
        map.insert(EFI_INTEL_FILE_SYSTEM2_GUID, "IntelFileSystem2Guid");
        map.insert(EFI_SONY_FILE_SYSTEM_GUID, "SonyFileSystemGuid");
        map.insert(NVRAM_MAIN_STORE_VOLUME_GUID, "EfiSystemNvDataFvGuid");
        map.insert(NVRAM_ADDITIONAL_STORE_VOLUME_GUID, "NvramAdditionalStoreVolumeGuid");
        map.insert(EFI_FFS_VOLUME_TOP_FILE_GUID, "VolumeTopFileGuid");
        map.insert(EFI_DXE_CORE_GUID, "DxeCore");
        map.insert(AMI_CORE_DXE_GUID, "CORE_DXE");
        map.insert(EFI_PEI_APRIORI_FILE_GUID, "PeiAprioriFileNameGuid");
        map.insert(EFI_DXE_APRIORI_FILE_GUID, "AprioriGuid");
        map.insert(EFI_GUIDED_SECTION_CRC32, "EfiCrc32GuidedSectionExtractionGuid");
        map.insert(EFI_GUIDED_SECTION_TIANO, "TianoCustomDecompressGuid");
        map.insert(EFI_GUIDED_SECTION_LZMA, "LzmaCustomDecompressGuid");
        map.insert(EFI_GUIDED_SECTION_LZMA_HP, "LzmaCustomDecompressGuid (HP)");
        map.insert(EFI_GUIDED_SECTION_LZMAF86, "LzmaF86CustomDecompressGuid");
        map.insert(EFI_GUIDED_SECTION_GZIP, "GzipDecompressGuid");
        map.insert(EFI_FIRMWARE_CONTENTS_SIGNED_GUID, "EfiFirmwareContentsSignedGuid");
        map.insert(EFI_CERT_TYPE_RSA2048_SHA256_GUID, "EfiCertTypeRsa2048Sha256Guid");
        map
    };
}

/// Friendly name for well-known GUIDs, GUID string otherwise.
pub fn guid_friendly_name(uuid: Uuid) -> String {
    match KNOWN_GUID_NAMES.get(&uuid) {
        Some(name) => (*name).to_string(),
        None => uuid_to_string(uuid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basetypes::read_le;

    #[test]
    fn header_sizes_match_on_disk_layout() {
        let bytes = [0u8; 0x40];
        let header: VolumeHeader = read_le(&bytes).unwrap();
        assert_eq!(header.revision, 0);

        // Field offsets: signature at 40, header length at 48.
        let mut volume = vec![0u8; 0x40];
        volume[40..44].copy_from_slice(&EFI_FV_SIGNATURE.to_le_bytes());
        volume[48..50].copy_from_slice(&0x48u16.to_le_bytes());
        let header: VolumeHeader = read_le(&volume).unwrap();
        assert_eq!(header.signature, EFI_FV_SIGNATURE);
        assert_eq!(header.header_length, 0x48);
    }

    #[test]
    fn ffs_file_header_layout() {
        let mut bytes = vec![0u8; FFS_FILE_HEADER_SIZE];
        bytes[18] = EFI_FV_FILETYPE_DRIVER; // Type
        bytes[20..23].copy_from_slice(&[0x80, 0x00, 0x00]); // Size
        bytes[23] = 0xF8; // State
        let header: FfsFileHeader = read_le(&bytes).unwrap();
        assert_eq!(header.file_type, EFI_FV_FILETYPE_DRIVER);
        assert_eq!(header.size.value(), 0x80);
        assert_eq!(header.state, 0xF8);
    }

    #[test]
    fn known_guid_names() {
        assert_eq!(
            guid_friendly_name(EFI_GUIDED_SECTION_LZMA),
            "LzmaCustomDecompressGuid"
        );
        assert_eq!(
            guid_friendly_name(uuid!("DEADBEEF-0000-0000-0000-000000000000")),
            "DEADBEEF-0000-0000-0000-000000000000"
        );
    }
}
