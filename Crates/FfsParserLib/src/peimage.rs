//! Executable image headers found in PE32/PIC and TE sections.
//!
//! Full PE headers go through `goblin`; the TE header is a fixed 40-byte
//! structure with stripped data directories, read directly.

#![allow(dead_code)]

use scroll::Pread;

pub const EFI_IMAGE_DOS_SIGNATURE: u16 = 0x5A4D; // MZ
pub const EFI_IMAGE_PE_SIGNATURE: u32 = 0x0000_4550; // PE\0\0
pub const EFI_IMAGE_PE_OPTIONAL_HDR32_MAGIC: u16 = 0x010B;
pub const EFI_IMAGE_PE_OPTIONAL_HDR64_MAGIC: u16 = 0x020B;

pub const EFI_IMAGE_TE_SIGNATURE: u16 = 0x5A56; // VZ

// EFI_IMAGE_TE_HEADER
#[repr(C)]
#[derive(Debug, Copy, Clone, Pread)]
pub struct TeHeader {
    pub signature: u16,
    pub machine: u16,
    pub number_of_sections: u8,
    pub subsystem: u8,
    pub stripped_size: u16,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub image_base: u64,
    pub data_directory_reloc_rva: u32,
    pub data_directory_reloc_size: u32,
    pub data_directory_debug_rva: u32,
    pub data_directory_debug_size: u32,
}

pub const TE_HEADER_SIZE: usize = 40;

impl TeHeader {
    /// Base the image would load at with the stripped headers accounted for.
    pub fn adjusted_image_base(&self) -> u64 {
        self.image_base
            .wrapping_add(self.stripped_size as u64)
            .wrapping_sub(TE_HEADER_SIZE as u64)
    }
}

/// COFF machine type rendering shared by PE and TE headers.
pub fn machine_type_name(machine: u16) -> String {
    match machine {
        0x014C => "x86".to_string(),
        0x0200 => "IA64".to_string(),
        0x0EBC => "EBC".to_string(),
        0x1C0 => "ARM".to_string(),
        0x1C2 => "Thumb".to_string(),
        0x1C4 => "ARMNT".to_string(),
        0x8664 => "X64".to_string(),
        0xAA64 => "AARCH64".to_string(),
        0x5032 => "RISC-V 32".to_string(),
        0x5064 => "RISC-V 64".to_string(),
        0x5128 => "RISC-V 128".to_string(),
        0x6232 => "LoongArch32".to_string(),
        0x6264 => "LoongArch64".to_string(),
        other => format!("Unknown {:04X}h", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basetypes::read_le;

    #[test]
    fn te_header_layout() {
        let mut bytes = vec![0u8; TE_HEADER_SIZE];
        bytes[..2].copy_from_slice(&EFI_IMAGE_TE_SIGNATURE.to_le_bytes());
        bytes[2..4].copy_from_slice(&0x8664u16.to_le_bytes());
        bytes[4] = 2; // sections
        bytes[6..8].copy_from_slice(&0x0038u16.to_le_bytes()); // stripped size
        bytes[16..24].copy_from_slice(&0x1000u64.to_le_bytes()); // image base
        let header: TeHeader = read_le(&bytes).unwrap();
        assert_eq!(header.signature, EFI_IMAGE_TE_SIGNATURE);
        assert_eq!(header.machine, 0x8664);
        assert_eq!(header.stripped_size, 0x38);
        assert_eq!(header.adjusted_image_base(), 0x1000 + 0x38 - TE_HEADER_SIZE as u64);
    }
}
