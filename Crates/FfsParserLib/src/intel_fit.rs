//! Firmware Interface Table structures and the Boot Guard manifests reached
//! through FIT entries.
//!
//! Entry semantics follow the FIT BIOS specification
//! <https://www.intel.com/content/dam/develop/external/us/en/documents/firmware-interface-table-bios-specification-r1p2p1.pdf>.

#![allow(dead_code)]

use scroll::Pread;

// Memory address of the FIT pointer, 40h back from the end of flash
pub const INTEL_FIT_POINTER_OFFSET: usize = 0x40;

pub const INTEL_FIT_SIGNATURE: u64 = 0x2020_205F_5449_465F; // '_FIT_   '
pub const INTEL_FIT_HEADER_VERSION: u16 = 0x0100;
pub const INTEL_FIT_MICROCODE_EMPTY_SLOT: u32 = 0xFFFF_FFFF;

// Entry types
pub const INTEL_FIT_TYPE_HEADER: u8 = 0x00;
pub const INTEL_FIT_TYPE_MICROCODE: u8 = 0x01;
pub const INTEL_FIT_TYPE_STARTUP_AC_MODULE: u8 = 0x02;
pub const INTEL_FIT_TYPE_DIAG_AC_MODULE: u8 = 0x03;
pub const INTEL_FIT_TYPE_BIOS_STARTUP_MODULE: u8 = 0x07;
pub const INTEL_FIT_TYPE_TPM_POLICY: u8 = 0x08;
pub const INTEL_FIT_TYPE_BIOS_POLICY: u8 = 0x09;
pub const INTEL_FIT_TYPE_TXT_POLICY: u8 = 0x0A;
pub const INTEL_FIT_TYPE_BOOT_GUARD_KEY_MANIFEST: u8 = 0x0B;
pub const INTEL_FIT_TYPE_BOOT_GUARD_BOOT_POLICY: u8 = 0x0C;
pub const INTEL_FIT_TYPE_CSE_SECURE_BOOT: u8 = 0x10;
pub const INTEL_FIT_TYPE_ACM_FEATURE_POLICY: u8 = 0x2D;
pub const INTEL_FIT_TYPE_JMP_DEBUG_POLICY: u8 = 0x2F;
pub const INTEL_FIT_TYPE_EMPTY: u8 = 0x7F;

// INTEL_FIT_ENTRY
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct IntelFitEntry {
    pub address: u64,           // base address of the component, 16-byte aligned
    pub size_and_reserved: u32, // size:24 in 16-byte units, reserved:8
    pub version: u16,           // BCD
    pub type_and_checksum_valid: u8, // type:7, checksum_valid:1
    pub checksum: u8,
}

pub const INTEL_FIT_ENTRY_SIZE: usize = 16;

impl IntelFitEntry {
    pub fn size(&self) -> u32 {
        self.size_and_reserved & 0x00FF_FFFF
    }

    pub fn entry_type(&self) -> u8 {
        self.type_and_checksum_valid & 0x7F
    }

    pub fn checksum_valid(&self) -> bool {
        self.type_and_checksum_valid & 0x80 != 0
    }
}

pub fn fit_entry_type_name(entry_type: u8) -> String {
    match entry_type & 0x7F {
        INTEL_FIT_TYPE_HEADER => "FIT Header".to_string(),
        INTEL_FIT_TYPE_MICROCODE => "Microcode".to_string(),
        INTEL_FIT_TYPE_STARTUP_AC_MODULE => "Startup ACM".to_string(),
        INTEL_FIT_TYPE_DIAG_AC_MODULE => "Diagnostic ACM".to_string(),
        INTEL_FIT_TYPE_BIOS_STARTUP_MODULE => "BIOS Startup Module".to_string(),
        INTEL_FIT_TYPE_TPM_POLICY => "TPM Policy".to_string(),
        INTEL_FIT_TYPE_BIOS_POLICY => "BIOS Policy".to_string(),
        INTEL_FIT_TYPE_TXT_POLICY => "TXT Policy".to_string(),
        INTEL_FIT_TYPE_BOOT_GUARD_KEY_MANIFEST => "BootGuard Key Manifest".to_string(),
        INTEL_FIT_TYPE_BOOT_GUARD_BOOT_POLICY => "BootGuard Boot Policy".to_string(),
        INTEL_FIT_TYPE_CSE_SECURE_BOOT => "CSE SecureBoot Settings".to_string(),
        INTEL_FIT_TYPE_ACM_FEATURE_POLICY => "ACM Feature Policy".to_string(),
        INTEL_FIT_TYPE_JMP_DEBUG_POLICY => "JMP Debug Policy".to_string(),
        INTEL_FIT_TYPE_EMPTY => "Empty".to_string(),
        other => format!("Unknown {:02X}h", other),
    }
}

//
// TCG hash algorithm ids
//

pub const TCG_HASH_ALGORITHM_ID_SHA1: u16 = 0x0004;
pub const TCG_HASH_ALGORITHM_ID_SHA256: u16 = 0x000B;
pub const TCG_HASH_ALGORITHM_ID_SHA384: u16 = 0x000C;
pub const TCG_HASH_ALGORITHM_ID_SHA512: u16 = 0x000D;
pub const TCG_HASH_ALGORITHM_ID_NULL: u16 = 0x0010;
pub const TCG_HASH_ALGORITHM_ID_SM3: u16 = 0x0012;

pub fn hash_type_name(algorithm_id: u16) -> String {
    match algorithm_id {
        TCG_HASH_ALGORITHM_ID_SHA1 => "SHA1".to_string(),
        TCG_HASH_ALGORITHM_ID_SHA256 => "SHA256".to_string(),
        TCG_HASH_ALGORITHM_ID_SHA384 => "SHA384".to_string(),
        TCG_HASH_ALGORITHM_ID_SHA512 => "SHA512".to_string(),
        TCG_HASH_ALGORITHM_ID_NULL => "NULL".to_string(),
        TCG_HASH_ALGORITHM_ID_SM3 => "SM3".to_string(),
        other => format!("Unknown {:04X}h", other),
    }
}

//
// Startup ACM
//

pub const INTEL_ACM_MODULE_TYPE: u16 = 0x0002;
pub const INTEL_ACM_MODULE_SUBTYPE_TXT_ACM: u16 = 0x0000;
pub const INTEL_ACM_MODULE_SUBTYPE_S_ACM: u16 = 0x0001;
pub const INTEL_ACM_MODULE_VENDOR: u32 = 0x8086;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct IntelAcmHeader {
    pub module_type: u16,
    pub module_sub_type: u16,
    pub header_length: u32, // in dwords
    pub header_version: u32,
    pub chipset_id: u16,
    pub flags: u16,
    pub module_vendor: u32,
    pub date: u32, // BCD yyyymmdd
    pub module_size: u32, // in dwords
    pub acm_svn: u16,
    pub se_svn: u16,
    pub code_control_flags: u32,
    pub error_entry_point: u32,
    pub gdt_max: u32,
    pub gdt_base: u32,
    pub seg_sel: u32,
    pub entry_point: u32,
    pub reserved: [u8; 64],
    pub key_size: u32, // in dwords
    pub scratch_space_size: u32,
    // RSA public key, exponent and signature follow
}

pub const INTEL_ACM_HEADER_SIZE: usize = 128;

//
// Boot Guard manifests
//

pub const BG_KEY_MANIFEST_TAG: u64 = 0x5F5F_4D59_454B_5F5F; // __KEYM__
pub const BG_BOOT_POLICY_TAG: u64 = 0x5F5F_5042_4341_5F5F; // __ACBP__
pub const BG_IBB_ELEMENT_TAG: u64 = 0x5F5F_5342_4249_5F5F; // __IBBS__
pub const BG_PMDA_ELEMENT_TAG: u64 = 0x5F5F_4144_4D50_5F5F; // __PMDA__
pub const BG_PMSG_ELEMENT_TAG: u64 = 0x5F5F_4753_4D50_5F5F; // __PMSG__

/// Boot Guard 1.x manifests; hashes are fixed SHA256.
pub const BOOT_GUARD_VERSION_1: u8 = 0x10;
/// Boot Guard 2.x manifests; hashes carry a TCG algorithm id.
pub const BOOT_GUARD_VERSION_2: u8 = 0x21;

/// Flexible hash header: algorithm id and byte count, hash bytes follow.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BgHashHeader {
    pub hash_algorithm_id: u16,
    pub size: u16,
}

pub const BG_HASH_HEADER_SIZE: usize = 4;
pub const SHA256_HASH_SIZE: usize = 32;

// Key manifest prelude, common to both versions
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BgKeyManifestHeader {
    pub tag: u64,
    pub version: u8,
    pub km_version: u8,
    pub km_svn: u8,
    pub km_id: u8,
    // v1: BG_HASH_SHA256 follows directly
    // v2: 4 reserved bytes, then a flexible hash
}

pub const BG_KEY_MANIFEST_HEADER_SIZE: usize = 12;

// Boot policy manifest header
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BgBootPolicyHeader {
    pub tag: u64,
    pub version: u8,
    pub header_version: u8,
    pub pmbpm_version: u8,
    pub bp_svn: u8,
    pub acm_svn: u8,
    pub reserved: u8,
    pub nem_data_stack: u16,
}

pub const BG_BOOT_POLICY_HEADER_SIZE: usize = 16;

// IBB element prelude; post-IBB hash, entry point, digest and the segment
// list follow it with layouts that depend on the manifest version
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BgIbbElementPrelude {
    pub tag: u64,
    pub version: u8,
    pub reserved: u8,
    pub element_size: u16,
    pub flags: u32,
    pub ibb_mch_bar: u64,
    pub vtd_bar: u64,
    pub dma_protection_base0: u32,
    pub dma_protection_limit0: u32,
    pub dma_protection_base1: u64,
    pub dma_protection_limit1: u64,
}

pub const BG_IBB_ELEMENT_PRELUDE_SIZE: usize = 56;

// One IBB segment
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BgIbbSegment {
    pub reserved: u16,
    pub flags: u16, // bit 0 set marks a non-IBB segment
    pub base: u32,
    pub size: u32,
}

pub const BG_IBB_SEGMENT_SIZE: usize = 12;
pub const BG_IBB_SEGMENT_FLAG_NON_IBB: u16 = 0x0001;

// Platform manufacturer data element
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BgPmdaElementHeader {
    pub tag: u64,
    pub version: u8,
    pub reserved: u8,
    pub data_size: u16,
}

pub const BG_PMDA_ELEMENT_HEADER_SIZE: usize = 12;

// Microsoft PMDA data block carried inside a PMDA element
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BgMicrosoftPmdaHeader {
    pub version: u32,
    pub num_entries: u32,
}

pub const BG_MICROSOFT_PMDA_HEADER_SIZE: usize = 8;
pub const BG_MICROSOFT_PMDA_VERSION_1: u32 = 1;
pub const BG_MICROSOFT_PMDA_VERSION_2: u32 = 2;

// PMDA v1 entry: address, size, SHA256
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BgMicrosoftPmdaEntryV1 {
    pub address: u32,
    pub size: u32,
    pub hash: [u8; 32],
}

pub const BG_MICROSOFT_PMDA_ENTRY_V1_SIZE: usize = 40;

// PMDA v2 entry prelude: address, size, then a flexible hash
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BgMicrosoftPmdaEntryV2Prelude {
    pub address: u32,
    pub size: u32,
}

pub const BG_MICROSOFT_PMDA_ENTRY_V2_PRELUDE_SIZE: usize = 8;

//
// X86 reset vector data, the last 64 bytes of the volume top file
//

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct X86ResetVectorData {
    pub ap_entry_vector: [u8; 8], // located at 0xFFFFFFC0
    pub reserved0: [u8; 8],
    pub pei_core_entry_point: u32, // located at 0xFFFFFFD0
    pub reserved1: [u8; 28],
    pub reset_vector: [u8; 8], // located at 0xFFFFFFF0
    pub ap_startup_segment: u32, // located at 0xFFFFFFF8
    pub boot_fv_base_address: u32, // located at 0xFFFFFFFC
}

pub const X86_RESET_VECTOR_DATA_SIZE: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basetypes::read_le;

    #[test]
    fn signatures_spell_out() {
        assert_eq!(&INTEL_FIT_SIGNATURE.to_le_bytes(), b"_FIT_   ");
        assert_eq!(&BG_KEY_MANIFEST_TAG.to_le_bytes(), b"__KEYM__");
        assert_eq!(&BG_BOOT_POLICY_TAG.to_le_bytes(), b"__ACBP__");
        assert_eq!(&BG_IBB_ELEMENT_TAG.to_le_bytes(), b"__IBBS__");
        assert_eq!(&BG_PMDA_ELEMENT_TAG.to_le_bytes(), b"__PMDA__");
        assert_eq!(&BG_PMSG_ELEMENT_TAG.to_le_bytes(), b"__PMSG__");
    }

    #[test]
    fn fit_entry_bitfields() {
        let mut bytes = vec![0u8; INTEL_FIT_ENTRY_SIZE];
        bytes[..8].copy_from_slice(&0xFFFF_FFF0u64.to_le_bytes());
        bytes[8..12].copy_from_slice(&0x0000_0123u32.to_le_bytes());
        bytes[12..14].copy_from_slice(&0x0100u16.to_le_bytes());
        bytes[14] = 0x81; // Microcode with valid checksum bit
        let entry: IntelFitEntry = read_le(&bytes).unwrap();
        assert_eq!(entry.address, 0xFFFF_FFF0);
        assert_eq!(entry.size(), 0x123);
        assert_eq!(entry.entry_type(), INTEL_FIT_TYPE_MICROCODE);
        assert!(entry.checksum_valid());
    }

    #[test]
    fn reset_vector_layout_is_64_bytes() {
        let mut bytes = vec![0u8; X86_RESET_VECTOR_DATA_SIZE];
        bytes[16..20].copy_from_slice(&0xFFE0_0000u32.to_le_bytes()); // PEI core EP
        bytes[56..60].copy_from_slice(&0x0003_F000u32.to_le_bytes()); // AP segment
        bytes[60..64].copy_from_slice(&0xFFF8_0000u32.to_le_bytes()); // BootFV
        let data: X86ResetVectorData = read_le(&bytes).unwrap();
        assert_eq!(data.pei_core_entry_point, 0xFFE0_0000);
        assert_eq!(data.ap_startup_segment, 0x0003_F000);
        assert_eq!(data.boot_fv_base_address, 0xFFF8_0000);
    }
}
