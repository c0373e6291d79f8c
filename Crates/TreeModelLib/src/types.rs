use uuid::Uuid;

/// Coarse kind of a tree item.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ItemType {
    Root,
    Image,
    Capsule,
    Region,
    Padding,
    Volume,
    File,
    Section,
    FreeSpace,
    VssStore,
    Vss2Store,
    FtwStore,
    FdcStore,
    FsysStore,
    EvsaStore,
    CmdbStore,
    FlashMapStore,
    NvarEntry,
    VssEntry,
    FsysEntry,
    EvsaEntry,
    FlashMapEntry,
    Microcode,
    SlicData,
    FptStore,
    FptEntry,
    IfwiHeader,
    IfwiPartition,
    FptPartition,
    BpdtStore,
    BpdtEntry,
    BpdtPartition,
    CpdStore,
    CpdEntry,
    CpdPartition,
    CpdExtension,
    CpdSpiEntry,
    StartupApDataEntry,
}

impl ItemType {
    pub fn display_name(&self) -> &'static str {
        match self {
            ItemType::Root => "Root",
            ItemType::Image => "Image",
            ItemType::Capsule => "Capsule",
            ItemType::Region => "Region",
            ItemType::Padding => "Padding",
            ItemType::Volume => "Volume",
            ItemType::File => "File",
            ItemType::Section => "Section",
            ItemType::FreeSpace => "Free space",
            ItemType::VssStore => "VSS store",
            ItemType::Vss2Store => "VSS2 store",
            ItemType::FtwStore => "FTW store",
            ItemType::FdcStore => "FDC store",
            ItemType::FsysStore => "Fsys store",
            ItemType::EvsaStore => "EVSA store",
            ItemType::CmdbStore => "CMDB store",
            ItemType::FlashMapStore => "FlashMap store",
            ItemType::NvarEntry => "NVAR entry",
            ItemType::VssEntry => "VSS entry",
            ItemType::FsysEntry => "Fsys entry",
            ItemType::EvsaEntry => "EVSA entry",
            ItemType::FlashMapEntry => "FlashMap entry",
            ItemType::Microcode => "Microcode",
            ItemType::SlicData => "SLIC data",
            ItemType::FptStore => "FPT store",
            ItemType::FptEntry => "FPT entry",
            ItemType::IfwiHeader => "IFWI header",
            ItemType::IfwiPartition => "IFWI partition",
            ItemType::FptPartition => "FPT partition",
            ItemType::BpdtStore => "BPDT store",
            ItemType::BpdtEntry => "BPDT entry",
            ItemType::BpdtPartition => "BPDT partition",
            ItemType::CpdStore => "CPD store",
            ItemType::CpdEntry => "CPD entry",
            ItemType::CpdPartition => "CPD partition",
            ItemType::CpdExtension => "CPD extension",
            ItemType::CpdSpiEntry => "CPD SPI entry",
            ItemType::StartupApDataEntry => "Startup AP data",
        }
    }
}

// Subtype tags. File and Section items reuse the raw on-disk type byte as
// their subtype, so those have no namespace here. Numeric values of the rest
// are arbitrary but must stay distinct within one item type.

pub mod image_subtype {
    pub const INTEL: u8 = 70;
    pub const UEFI: u8 = 71;
}

pub mod capsule_subtype {
    pub const APTIO_SIGNED: u8 = 80;
    pub const APTIO_UNSIGNED: u8 = 81;
    pub const UEFI20: u8 = 82;
    pub const TOSHIBA: u8 = 83;
}

pub mod volume_subtype {
    pub const UNKNOWN: u8 = 90;
    pub const FFS2: u8 = 91;
    pub const FFS3: u8 = 92;
    pub const NVRAM: u8 = 93;
    pub const MICROCODE: u8 = 94;
}

/// Region subtypes. The values double as the region index inside the flash
/// descriptor region section, so the order is load-bearing.
pub mod region_subtype {
    pub const DESCRIPTOR: u8 = 0;
    pub const BIOS: u8 = 1;
    pub const ME: u8 = 2;
    pub const GBE: u8 = 3;
    pub const PDR: u8 = 4;
    pub const DEV_EXP1: u8 = 5;
    pub const BIOS2: u8 = 6;
    pub const MICROCODE: u8 = 7;
    pub const EC: u8 = 8;
    pub const DEV_EXP2: u8 = 9;
    pub const IE: u8 = 10;
    pub const TGBE1: u8 = 11;
    pub const TGBE2: u8 = 12;
    pub const RESERVED1: u8 = 13;
    pub const RESERVED2: u8 = 14;
    pub const PTT: u8 = 15;

    pub fn display_name(subtype: u8) -> String {
        match subtype {
            DESCRIPTOR => "Descriptor".to_string(),
            BIOS => "BIOS".to_string(),
            ME => "ME".to_string(),
            GBE => "GbE".to_string(),
            PDR => "PDR".to_string(),
            DEV_EXP1 => "DevExp1".to_string(),
            BIOS2 => "BIOS2".to_string(),
            MICROCODE => "Microcode".to_string(),
            EC => "EC".to_string(),
            DEV_EXP2 => "DevExp2".to_string(),
            IE => "IE".to_string(),
            TGBE1 => "10GbE1".to_string(),
            TGBE2 => "10GbE2".to_string(),
            RESERVED1 => "Reserved1".to_string(),
            RESERVED2 => "Reserved2".to_string(),
            PTT => "PTT".to_string(),
            _ => format!("Unknown {:02X}h", subtype),
        }
    }
}

pub mod padding_subtype {
    pub const ZERO: u8 = 110;
    pub const ONE: u8 = 111;
    pub const DATA: u8 = 112;
}

pub mod nvar_entry_subtype {
    pub const INVALID: u8 = 120;
    pub const INVALID_LINK: u8 = 121;
    pub const LINK: u8 = 122;
    pub const DATA: u8 = 123;
    pub const FULL: u8 = 124;
}

pub mod vss_entry_subtype {
    pub const INVALID: u8 = 130;
    pub const STANDARD: u8 = 131;
    pub const APPLE: u8 = 132;
    pub const AUTH: u8 = 133;
    pub const INTEL: u8 = 134;
}

pub mod fsys_entry_subtype {
    pub const INVALID: u8 = 140;
    pub const NORMAL: u8 = 141;
}

pub mod evsa_entry_subtype {
    pub const INVALID: u8 = 150;
    pub const UNKNOWN: u8 = 151;
    pub const GUID: u8 = 152;
    pub const NAME: u8 = 153;
    pub const DATA: u8 = 154;
}

pub mod flash_map_entry_subtype {
    pub const VOLUME: u8 = 160;
    pub const DATA: u8 = 161;
}

pub mod microcode_subtype {
    pub const INTEL: u8 = 170;
    pub const AMD: u8 = 171;
}

pub mod fpt_entry_subtype {
    pub const VALID: u8 = 180;
    pub const INVALID: u8 = 181;
}

pub mod fpt_partition_subtype {
    pub const CODE: u8 = 190;
    pub const DATA: u8 = 191;
    pub const GLUT: u8 = 192;
}

pub mod ifwi_partition_subtype {
    pub const BOOT: u8 = 200;
    pub const DATA: u8 = 201;
}

pub mod cpd_partition_subtype {
    pub const MANIFEST: u8 = 210;
    pub const METADATA: u8 = 211;
    pub const KEY: u8 = 212;
    pub const CODE: u8 = 213;
}

pub mod startup_ap_data_subtype {
    pub const X86_128K: u8 = 220;
}

/// Pending modification, set by downstream tooling only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Action {
    #[default]
    None,
    Erase,
    Create,
    Insert,
    Replace,
    Remove,
    Rebuild,
    Rebase,
}

/// Protected-range marking applied during the second pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Marking {
    #[default]
    None,
    /// Fully inside an IBB range.
    Red,
    /// Fully inside a non-IBB protected range.
    Cyan,
    /// Partially covered by a protected range.
    Yellow,
}

// TE image base classification, stored in TeSectionParsingData.
pub const TE_BASE_OTHER: u8 = 0;
pub const TE_BASE_ORIGINAL: u8 = 1;
pub const TE_BASE_ADJUSTED: u8 = 2;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VolumeParsingData {
    pub empty_byte: u8,
    pub ffs_version: u8,
    pub has_extended_header: bool,
    pub extended_header_guid: Uuid,
    pub alignment: u32,
    pub revision: u8,
    pub has_apple_crc32: bool,
    pub has_valid_used_space: bool,
    pub used_space: u32,
    pub is_weak_aligned: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileParsingData {
    pub empty_byte: u8,
    pub guid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompressedSectionParsingData {
    pub compression_type: u8,
    pub uncompressed_size: u32,
    pub algorithm: u8,
    pub dictionary_size: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GuidedSectionParsingData {
    pub guid: Uuid,
    pub dictionary_size: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FreeformSectionParsingData {
    pub guid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TeSectionParsingData {
    pub image_base_type: u8,
    pub original_image_base: u32,
    pub adjusted_image_base: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NvarEntryParsingData {
    pub empty_byte: u8,
    pub is_valid: bool,
    pub extended_header_size: u32,
    pub next: u32,
}

/// Per-type metadata attached to an item by the parser.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParsingData {
    #[default]
    None,
    Volume(VolumeParsingData),
    File(FileParsingData),
    CompressedSection(CompressedSectionParsingData),
    GuidedSection(GuidedSectionParsingData),
    FreeformSection(FreeformSectionParsingData),
    TeSection(TeSectionParsingData),
    NvarEntry(NvarEntryParsingData),
}

impl ParsingData {
    pub fn is_none(&self) -> bool {
        matches!(self, ParsingData::None)
    }
}
