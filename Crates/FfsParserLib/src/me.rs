//! Intel ME / CSE region structures: FPT partition tables, IFWI layouts,
//! BPDT stores and CPD directories with their extension records.

#![allow(dead_code)]

use scroll::Pread;

//
// ME version
//

pub const ME_VERSION_SIGNATURE_MAN: u32 = 0x4E41_4D24; // $MAN
pub const ME_VERSION_SIGNATURE_MN2: u32 = 0x324E_4D24; // $MN2

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct MeVersion {
    pub signature: u32,
    pub reserved: u32,
    pub major: u16,
    pub minor: u16,
    pub bugfix: u16,
    pub build: u16,
}

pub const ME_VERSION_SIZE: usize = 16;

//
// FPT
//

pub const ME_ROM_BYPASS_VECTOR_SIZE: usize = 0x10;
pub const ME_FPT_HEADER_SIGNATURE: u32 = 0x5450_4624; // $FPT

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct FptHeader {
    pub signature: u32,
    pub num_entries: u32,
    pub header_version: u8,
    pub entry_version: u8,
    pub header_length: u8,
    pub checksum: u8, // sum8 of HeaderLength bytes must be zero
    pub ticks_to_add: u16,
    pub tokens_to_add: u16,
    pub uma_size: u32,     // Flags in SPS firmware
    pub flash_layout: u32, // Crc32 before IFWI
    pub fitc_major: u16,
    pub fitc_minor: u16,
    pub fitc_hotfix: u16,
    pub fitc_build: u16,
}

pub const FPT_HEADER_SIZE: usize = 32;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct FptEntry {
    pub name: [u8; 4],
    pub owner: [u8; 4],
    pub offset: u32,
    pub size: u32,
    pub reserved: [u8; 12],
    pub flags: u32,
}

pub const FPT_ENTRY_SIZE: usize = 32;

impl FptEntry {
    pub fn partition_type(&self) -> u8 {
        (self.flags & 0x7F) as u8
    }

    pub fn entry_valid(&self) -> u8 {
        (self.flags >> 24) as u8
    }
}

// FPT partition types
pub const FPT_PARTITION_TYPE_CODE: u8 = 0;
pub const FPT_PARTITION_TYPE_DATA: u8 = 1;
pub const FPT_PARTITION_TYPE_GLUT: u8 = 2;

pub const FPT_ENTRY_VALID_EMPTY: u8 = 0xFF;

/// Four-character partition name, trailing NULs stripped.
pub fn partition_name(name: &[u8]) -> String {
    let printable: Vec<u8> = name.iter().copied().take_while(|&b| b != 0).collect();
    match core::str::from_utf8(&printable) {
        Ok(s) if !s.is_empty() => s.to_string(),
        _ => format!("{:02X?}", name),
    }
}

//
// IFWI layouts
//

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct IfwiHeaderEntry {
    pub offset: u32,
    pub size: u32,
}

// IFWI 1.6 (ME), 2.0 (BIOS)
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct Ifwi16LayoutHeader {
    pub rom_bypass_vector: [u8; 16],
    pub data_partition: IfwiHeaderEntry,
    pub boot_partition1: IfwiHeaderEntry,
    pub boot_partition2: IfwiHeaderEntry,
    pub boot_partition3: IfwiHeaderEntry,
    pub boot_partition4: IfwiHeaderEntry,
    pub boot_partition5: IfwiHeaderEntry,
    pub checksum: u64,
}

pub const IFWI_16_LAYOUT_HEADER_SIZE: usize = 72;

// IFWI 1.7 (ME)
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct Ifwi17LayoutHeader {
    pub rom_bypass_vector: [u8; 16],
    pub header_size: u16,
    pub flags: u8,
    pub reserved: u8,
    pub checksum: u32,
    pub data_partition: IfwiHeaderEntry,
    pub boot_partition1: IfwiHeaderEntry,
    pub boot_partition2: IfwiHeaderEntry,
    pub boot_partition3: IfwiHeaderEntry,
    pub boot_partition4: IfwiHeaderEntry,
    pub boot_partition5: IfwiHeaderEntry,
    pub temp_page: IfwiHeaderEntry,
}

pub const IFWI_17_LAYOUT_HEADER_SIZE: usize = 80;

//
// BPDT
//

pub const BPDT_GREEN_SIGNATURE: u32 = 0x0000_55AA;
pub const BPDT_YELLOW_SIGNATURE: u32 = 0x00AA_55AA;
pub const BPDT_HEADER_VERSION_1: u16 = 1;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BpdtHeader {
    pub signature: u32,
    pub num_entries: u16,
    pub header_version: u16,
    pub checksum: u32,
    pub ifwi_version: u32,
    pub fitc_major: u16,
    pub fitc_minor: u16,
    pub fitc_hotfix: u16,
    pub fitc_build: u16,
}

pub const BPDT_HEADER_SIZE: usize = 24;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct BpdtEntry {
    pub type_and_flags: u32,
    pub offset: u32,
    pub size: u32,
}

pub const BPDT_ENTRY_SIZE: usize = 12;

impl BpdtEntry {
    pub fn entry_type(&self) -> u16 {
        self.type_and_flags as u16
    }

    pub fn split_sub_partition_first_part(&self) -> bool {
        self.type_and_flags & (1 << 16) != 0
    }

    pub fn split_sub_partition_second_part(&self) -> bool {
        self.type_and_flags & (1 << 17) != 0
    }

    pub fn code_sub_partition(&self) -> bool {
        self.type_and_flags & (1 << 18) != 0
    }

    pub fn uma_cachable(&self) -> bool {
        self.type_and_flags & (1 << 19) != 0
    }
}

// BPDT entry types
pub const BPDT_ENTRY_TYPE_SMIP: u16 = 0;
pub const BPDT_ENTRY_TYPE_RBEP: u16 = 1;
pub const BPDT_ENTRY_TYPE_FTPR: u16 = 2;
pub const BPDT_ENTRY_TYPE_UCOD: u16 = 3;
pub const BPDT_ENTRY_TYPE_IBBP: u16 = 4;
pub const BPDT_ENTRY_TYPE_SBPDT: u16 = 5;
pub const BPDT_ENTRY_TYPE_OBBP: u16 = 6;
pub const BPDT_ENTRY_TYPE_NFTP: u16 = 7;
pub const BPDT_ENTRY_TYPE_ISHC: u16 = 8;
pub const BPDT_ENTRY_TYPE_DLMP: u16 = 9;
pub const BPDT_ENTRY_TYPE_UEPB: u16 = 10;
pub const BPDT_ENTRY_TYPE_UTOK: u16 = 11;
pub const BPDT_ENTRY_TYPE_UFS_PHY: u16 = 12;
pub const BPDT_ENTRY_TYPE_UFS_GPP_LUN: u16 = 13;
pub const BPDT_ENTRY_TYPE_PMCP: u16 = 14;
pub const BPDT_ENTRY_TYPE_IUNP: u16 = 15;
pub const BPDT_ENTRY_TYPE_NVM_CONFIG: u16 = 16;
pub const BPDT_ENTRY_TYPE_UEP: u16 = 17;
pub const BPDT_ENTRY_TYPE_WLAN_UCODE: u16 = 18;
pub const BPDT_ENTRY_TYPE_LOCL_SPRITES: u16 = 19;
pub const BPDT_ENTRY_TYPE_OEM_KEY_MANIFEST: u16 = 20;
pub const BPDT_ENTRY_TYPE_DEFAULTS: u16 = 21;
pub const BPDT_ENTRY_TYPE_PAVP: u16 = 22;
pub const BPDT_ENTRY_TYPE_TCSS_FW_IOM: u16 = 23;
pub const BPDT_ENTRY_TYPE_TCSS_FW_PHY: u16 = 24;
pub const BPDT_ENTRY_TYPE_TBT: u16 = 25;
pub const BPDT_ENTRY_TYPE_USB_PHY: u16 = 31;
pub const BPDT_ENTRY_TYPE_PCHC: u16 = 32;
pub const BPDT_ENTRY_TYPE_SAMF: u16 = 41;
pub const BPDT_ENTRY_TYPE_PPHY: u16 = 45;

pub fn bpdt_entry_type_name(entry_type: u16) -> String {
    match entry_type {
        BPDT_ENTRY_TYPE_SMIP => "SMIP".to_string(),
        BPDT_ENTRY_TYPE_RBEP => "RBEP".to_string(),
        BPDT_ENTRY_TYPE_FTPR => "FTPR".to_string(),
        BPDT_ENTRY_TYPE_UCOD => "UCOD".to_string(),
        BPDT_ENTRY_TYPE_IBBP => "IBBP".to_string(),
        BPDT_ENTRY_TYPE_SBPDT => "S-BPDT".to_string(),
        BPDT_ENTRY_TYPE_OBBP => "OBBP".to_string(),
        BPDT_ENTRY_TYPE_NFTP => "NFTP".to_string(),
        BPDT_ENTRY_TYPE_ISHC => "ISHC".to_string(),
        BPDT_ENTRY_TYPE_DLMP => "DLMP".to_string(),
        BPDT_ENTRY_TYPE_UEPB => "UEPB".to_string(),
        BPDT_ENTRY_TYPE_UTOK => "UTOK".to_string(),
        BPDT_ENTRY_TYPE_UFS_PHY => "UFS PHY".to_string(),
        BPDT_ENTRY_TYPE_UFS_GPP_LUN => "UFS GPP LUN".to_string(),
        BPDT_ENTRY_TYPE_PMCP => "PMCP".to_string(),
        BPDT_ENTRY_TYPE_IUNP => "IUNP".to_string(),
        BPDT_ENTRY_TYPE_NVM_CONFIG => "NVM config".to_string(),
        BPDT_ENTRY_TYPE_UEP => "UEP".to_string(),
        BPDT_ENTRY_TYPE_WLAN_UCODE => "WLAN uCode".to_string(),
        BPDT_ENTRY_TYPE_LOCL_SPRITES => "LOCL sprites".to_string(),
        BPDT_ENTRY_TYPE_OEM_KEY_MANIFEST => "OEM key manifest".to_string(),
        BPDT_ENTRY_TYPE_DEFAULTS => "Defaults".to_string(),
        BPDT_ENTRY_TYPE_PAVP => "PAVP".to_string(),
        BPDT_ENTRY_TYPE_TCSS_FW_IOM => "TCSS FW IOM".to_string(),
        BPDT_ENTRY_TYPE_TCSS_FW_PHY => "TCSS FW PHY".to_string(),
        BPDT_ENTRY_TYPE_TBT => "TCSS TBT".to_string(),
        BPDT_ENTRY_TYPE_USB_PHY => "USB PHY".to_string(),
        BPDT_ENTRY_TYPE_PCHC => "PCHC".to_string(),
        BPDT_ENTRY_TYPE_SAMF => "SAMF".to_string(),
        BPDT_ENTRY_TYPE_PPHY => "PPHY".to_string(),
        _ => format!("Unknown {:04X}h", entry_type),
    }
}

//
// CPD
//

pub const CPD_SIGNATURE: u32 = 0x4450_4324; // $CPD

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CpdRev1Header {
    pub signature: u32,
    pub num_entries: u32,
    pub header_version: u8, // 1
    pub entry_version: u8,
    pub header_length: u8,
    pub checksum: u8,
    pub short_name: [u8; 4],
}

pub const CPD_REV1_HEADER_SIZE: usize = 16;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CpdRev2Header {
    pub signature: u32,
    pub num_entries: u32,
    pub header_version: u8, // 2
    pub entry_version: u8,
    pub header_length: u8,
    pub reserved: u8,
    pub short_name: [u8; 4],
    pub checksum: u32, // CRC32 over header and entries with this field zeroed
}

pub const CPD_REV2_HEADER_SIZE: usize = 20;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CpdEntry {
    pub entry_name: [u8; 12],
    pub offset_and_flags: u32, // offset:25, huffman_compressed:1, reserved:6
    pub length: u32,
    pub reserved: u32,
}

pub const CPD_ENTRY_SIZE: usize = 24;

impl CpdEntry {
    pub fn offset(&self) -> u32 {
        self.offset_and_flags & 0x01FF_FFFF
    }

    pub fn huffman_compressed(&self) -> bool {
        self.offset_and_flags & (1 << 25) != 0
    }

    pub fn name(&self) -> String {
        partition_name(&self.entry_name)
    }
}

pub const CPD_MANIFEST_HEADER_ID: u32 = 0x324E_4D24; // $MN2

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CpdManifestHeader {
    pub header_type: u32,
    pub header_length: u32, // in dwords
    pub header_version: u32,
    pub flags: u32,
    pub vendor: u32,
    pub date: u32,
    pub size: u32, // in dwords
    pub header_id: u32,
    pub reserved1: u32,
    pub version_major: u16,
    pub version_minor: u16,
    pub version_bugfix: u16,
    pub version_build: u16,
    pub security_version: u32,
    pub reserved2: [u8; 8],
    pub reserved3: [u8; 64],
    pub modulus_size: u32,  // in dwords
    pub exponent_size: u32, // in dwords
}

pub const CPD_MANIFEST_HEADER_SIZE: usize = 128;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CpdExtensionHeader {
    pub ext_type: u32,
    pub length: u32,
}

pub const CPD_EXTENSION_HEADER_SIZE: usize = 8;

// CPD extension types
pub const CPD_EXT_TYPE_SYSTEM_INFO: u32 = 0;
pub const CPD_EXT_TYPE_INIT_SCRIPT: u32 = 1;
pub const CPD_EXT_TYPE_FEATURE_PERMISSIONS: u32 = 2;
pub const CPD_EXT_TYPE_PARTITION_INFO: u32 = 3;
pub const CPD_EXT_TYPE_SHARED_LIB_ATTRIBUTES: u32 = 4;
pub const CPD_EXT_TYPE_PROCESS_ATTRIBUTES: u32 = 5;
pub const CPD_EXT_TYPE_THREAD_ATTRIBUTES: u32 = 6;
pub const CPD_EXT_TYPE_DEVICE_TYPE: u32 = 7;
pub const CPD_EXT_TYPE_MMIO_RANGE: u32 = 8;
pub const CPD_EXT_TYPE_SPEC_FILE_PRODUCER: u32 = 9;
pub const CPD_EXT_TYPE_MODULE_ATTRIBUTES: u32 = 10;
pub const CPD_EXT_TYPE_LOCKED_RANGES: u32 = 11;
pub const CPD_EXT_TYPE_CLIENT_SYSTEM_INFO: u32 = 12;
pub const CPD_EXT_TYPE_USER_INFO: u32 = 13;
pub const CPD_EXT_TYPE_KEY_MANIFEST: u32 = 14;
pub const CPD_EXT_TYPE_SIGNED_PACKAGE_INFO: u32 = 15;
pub const CPD_EXT_TYPE_ANTI_CLONING_SKU: u32 = 16;
pub const CPD_EXT_TYPE_IMR_INFO: u32 = 17;
pub const CPD_EXT_TYPE_RCIP_INFO: u32 = 18;
pub const CPD_EXT_TYPE_BOOT_POLICY: u32 = 19;
pub const CPD_EXT_TYPE_SECURE_TOKEN: u32 = 20;
pub const CPD_EXT_TYPE_IFWI_PARTITION_MANIFEST: u32 = 22;
pub const CPD_EXT_TYPE_FD_HASH: u32 = 23;
pub const CPD_EXT_TYPE_IOM_METADATA: u32 = 24;
pub const CPD_EXT_TYPE_MGP_METADATA: u32 = 25;
pub const CPD_EXT_TYPE_TBT_METADATA: u32 = 26;
pub const CPD_EXT_TYPE_GMF_CERTIFICATE: u32 = 30;
pub const CPD_EXT_TYPE_GMF_BODY: u32 = 31;
pub const CPD_EXT_TYPE_KEY_MANIFEST_EXT: u32 = 34;
pub const CPD_EXT_TYPE_SIGNED_PACKAGE_INFO_EXT: u32 = 35;
pub const CPD_EXT_TYPE_SPS_PLATFORM_ID: u32 = 50;

pub fn cpd_extension_type_name(ext_type: u32) -> String {
    match ext_type {
        CPD_EXT_TYPE_SYSTEM_INFO => "System info".to_string(),
        CPD_EXT_TYPE_INIT_SCRIPT => "Init script".to_string(),
        CPD_EXT_TYPE_FEATURE_PERMISSIONS => "Feature permissions".to_string(),
        CPD_EXT_TYPE_PARTITION_INFO => "Partition info".to_string(),
        CPD_EXT_TYPE_SHARED_LIB_ATTRIBUTES => "Shared lib attributes".to_string(),
        CPD_EXT_TYPE_PROCESS_ATTRIBUTES => "Process attributes".to_string(),
        CPD_EXT_TYPE_THREAD_ATTRIBUTES => "Thread attributes".to_string(),
        CPD_EXT_TYPE_DEVICE_TYPE => "Device type".to_string(),
        CPD_EXT_TYPE_MMIO_RANGE => "MMIO range".to_string(),
        CPD_EXT_TYPE_SPEC_FILE_PRODUCER => "Spec file producer".to_string(),
        CPD_EXT_TYPE_MODULE_ATTRIBUTES => "Module attributes".to_string(),
        CPD_EXT_TYPE_LOCKED_RANGES => "Locked ranges".to_string(),
        CPD_EXT_TYPE_CLIENT_SYSTEM_INFO => "Client system info".to_string(),
        CPD_EXT_TYPE_USER_INFO => "User info".to_string(),
        CPD_EXT_TYPE_KEY_MANIFEST => "Key manifest".to_string(),
        CPD_EXT_TYPE_SIGNED_PACKAGE_INFO => "Signed package info".to_string(),
        CPD_EXT_TYPE_ANTI_CLONING_SKU => "Anti-cloning SKU".to_string(),
        CPD_EXT_TYPE_IMR_INFO => "IMR info".to_string(),
        CPD_EXT_TYPE_RCIP_INFO => "RCIP info".to_string(),
        CPD_EXT_TYPE_BOOT_POLICY => "Boot policy".to_string(),
        CPD_EXT_TYPE_SECURE_TOKEN => "Secure token".to_string(),
        CPD_EXT_TYPE_IFWI_PARTITION_MANIFEST => "IFWI partition manifest".to_string(),
        CPD_EXT_TYPE_FD_HASH => "FD hash".to_string(),
        CPD_EXT_TYPE_IOM_METADATA => "IOM metadata".to_string(),
        CPD_EXT_TYPE_MGP_METADATA => "MGP metadata".to_string(),
        CPD_EXT_TYPE_TBT_METADATA => "TBT metadata".to_string(),
        CPD_EXT_TYPE_GMF_CERTIFICATE => "GMF certificate".to_string(),
        CPD_EXT_TYPE_GMF_BODY => "GMF body".to_string(),
        CPD_EXT_TYPE_KEY_MANIFEST_EXT => "Key manifest extension".to_string(),
        CPD_EXT_TYPE_SIGNED_PACKAGE_INFO_EXT => "Signed package info extension".to_string(),
        CPD_EXT_TYPE_SPS_PLATFORM_ID => "SPS platform ID".to_string(),
        _ => format!("Unknown {:X}h", ext_type),
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CpdExtSignedPackageInfo {
    pub ext_type: u32,
    pub length: u32,
    pub package_name: [u8; 4],
    pub vcn: u32,
    pub usage_bitmap: [u8; 16],
    pub svn: u32,
    pub reserved: [u8; 16],
    // CpdExtSignedPackageInfoModule entries follow
}

pub const CPD_EXT_SIGNED_PACKAGE_INFO_SIZE: usize = 52;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CpdExtSignedPackageInfoModule {
    pub name: [u8; 12],
    pub module_type: u8,
    pub hash_algorithm: u8,
    pub hash_size: u16,
    pub metadata_size: u32,
    // metadata hash of hash_size bytes follows, stored reversed
}

/// Offset of the metadata hash within a signed package info module.
pub const CPD_EXT_SIGNED_PACKAGE_INFO_MODULE_HASH_OFFSET: usize = 20;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CpdExtModuleAttributes {
    pub ext_type: u32,
    pub length: u32,
    pub compression_type: u8,
    pub reserved: [u8; 3],
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub global_module_id: u32,
    // image hash fills the rest of the record, stored reversed
}

/// Offset of the image hash within a module attributes extension.
pub const CPD_EXT_MODULE_ATTRIBUTES_HASH_OFFSET: usize = 24;

pub const ME_MODULE_COMPRESSION_TYPE_UNCOMPRESSED: u8 = 0;
pub const ME_MODULE_COMPRESSION_TYPE_HUFFMAN: u8 = 1;
pub const ME_MODULE_COMPRESSION_TYPE_LZMA: u8 = 2;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct CpdExtIfwiPartitionManifest {
    pub ext_type: u32,
    pub length: u32,
    pub partition_name: [u8; 4],
    pub complete_partition_length: u32,
    pub partition_version_minor: u16,
    pub partition_version_major: u16,
    pub data_format_version: u32,
    pub instance_id: u32,
    pub flags: u32,
    pub hash_algorithm_and_size: u32, // algorithm:8, size:24
    pub complete_partition_hash: [u8; 32], // stored reversed
    pub reserved: [u8; 20],
}

pub const CPD_EXT_IFWI_PARTITION_MANIFEST_SIZE: usize = 88;

impl CpdExtIfwiPartitionManifest {
    pub fn support_multiple_instances(&self) -> bool {
        self.flags & (1 << 0) != 0
    }

    pub fn support_api_version_based_update(&self) -> bool {
        self.flags & (1 << 1) != 0
    }

    pub fn action_on_update(&self) -> u8 {
        ((self.flags >> 2) & 0x03) as u8
    }

    pub fn obey_full_update_rules(&self) -> bool {
        self.flags & (1 << 4) != 0
    }

    pub fn ifr_enable_only(&self) -> bool {
        self.flags & (1 << 5) != 0
    }

    pub fn allow_cross_point_update(&self) -> bool {
        self.flags & (1 << 6) != 0
    }

    pub fn allow_cross_hotfix_update(&self) -> bool {
        self.flags & (1 << 7) != 0
    }

    pub fn partial_update_only(&self) -> bool {
        self.flags & (1 << 8) != 0
    }

    pub fn hash_algorithm(&self) -> u8 {
        self.hash_algorithm_and_size as u8
    }

    pub fn hash_size(&self) -> u32 {
        self.hash_algorithm_and_size >> 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basetypes::read_le;

    #[test]
    fn cpd_entry_bitfields() {
        let mut bytes = vec![0u8; CPD_ENTRY_SIZE];
        bytes[..4].copy_from_slice(b"FTPR");
        let offset_and_flags: u32 = 0x0123_4567 & 0x01FF_FFFF | (1 << 25);
        bytes[12..16].copy_from_slice(&offset_and_flags.to_le_bytes());
        bytes[16..20].copy_from_slice(&0x8000u32.to_le_bytes());
        let entry: CpdEntry = read_le(&bytes).unwrap();
        assert_eq!(entry.offset(), 0x0123_4567 & 0x01FF_FFFF);
        assert!(entry.huffman_compressed());
        assert_eq!(entry.name(), "FTPR");
        assert_eq!(entry.length, 0x8000);
    }

    #[test]
    fn bpdt_entry_flags() {
        let mut bytes = vec![0u8; BPDT_ENTRY_SIZE];
        let type_and_flags: u32 = BPDT_ENTRY_TYPE_SBPDT as u32 | (1 << 18);
        bytes[..4].copy_from_slice(&type_and_flags.to_le_bytes());
        bytes[4..8].copy_from_slice(&0x1000u32.to_le_bytes());
        bytes[8..12].copy_from_slice(&0x2000u32.to_le_bytes());
        let entry: BpdtEntry = read_le(&bytes).unwrap();
        assert_eq!(entry.entry_type(), BPDT_ENTRY_TYPE_SBPDT);
        assert!(entry.code_sub_partition());
        assert!(!entry.uma_cachable());
    }

    #[test]
    fn fpt_entry_layout() {
        let mut bytes = vec![0u8; FPT_ENTRY_SIZE];
        bytes[..4].copy_from_slice(b"MFS\0");
        bytes[8..12].copy_from_slice(&0x1000u32.to_le_bytes());
        bytes[12..16].copy_from_slice(&0x2000u32.to_le_bytes());
        bytes[28..32].copy_from_slice(&0x01000001u32.to_le_bytes());
        let entry: FptEntry = read_le(&bytes).unwrap();
        assert_eq!(partition_name(&entry.name), "MFS");
        assert_eq!(entry.partition_type(), FPT_PARTITION_TYPE_DATA);
        assert_eq!(entry.entry_valid(), 0x01);
    }
}
