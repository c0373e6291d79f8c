//! Section parsing: headers, encapsulation (compressed and GUID-defined)
//! sections with decompression, and the leaf section bodies.

use tree_model_lib::{
    ByteSpan, CompressedSectionParsingData, FreeformSectionParsingData, GuidedSectionParsingData,
    ItemId, ItemType, ParsingData, TeSectionParsingData, TE_BASE_OTHER,
};
use uuid::Uuid;

use crate::basetypes::{align4, read_le, read_le_at, uuid_to_string};
use crate::compression;
use crate::error::ParseError;
use crate::ffs::*;
use crate::peimage;
use crate::utility::ucs2_string;

use super::{size_string, FfsParser};

impl FfsParser {
    pub(crate) fn parse_sections(
        &mut self,
        sections: &ByteSpan,
        index: ItemId,
        insert_into_tree: bool,
    ) -> Result<(), ParseError> {
        let body_size = sections.len() as u32;
        let header_size = self.model.header(index).len() as u32;

        // Obtain the FFS version from the parent volume
        let ffs_version = self.parent_volume_ffs_version(index);

        // Iterate over sections
        let mut section_offset = 0u32;
        while section_offset < body_size {
            let section_size = self.get_section_size(sections, section_offset, ffs_version);

            // Check the section size to be sane
            if section_size < COMMON_SECTION_HEADER_SIZE as u32
                || section_size > body_size - section_offset
            {
                // Final parsing
                if insert_into_tree {
                    // Add padding to fill the rest of the sections area
                    let padding = sections.slice_from(section_offset as usize);
                    let info = format!("Full size: {}", size_string(padding.len()));
                    let data_index = self.add_item(
                        header_size + section_offset,
                        ItemType::Padding,
                        tree_model_lib::padding_subtype::DATA,
                        "Non-UEFI data",
                        "",
                        info,
                        ByteSpan::empty(),
                        padding,
                        ByteSpan::empty(),
                        true,
                        index,
                    );
                    self.msg(
                        "parse_sections: non-UEFI data found in sections area",
                        Some(data_index),
                    );
                    break;
                }
                // Preliminary parsing of a decompression candidate
                return Err(ParseError::InvalidSection);
            }

            // Parse the section header
            let section = sections
                .slice(section_offset as usize, (section_offset + section_size) as usize);
            let result = self.parse_section_header(
                &section,
                header_size + section_offset,
                index,
                insert_into_tree,
            );
            if let Err(error) = result {
                if insert_into_tree {
                    self.msg(
                        format!(
                            "parse_sections: section header parsing failed with error \"{}\"",
                            error
                        ),
                        Some(index),
                    );
                } else {
                    return Err(ParseError::InvalidSection);
                }
            }

            // Move to the next section
            section_offset += section_size;
            section_offset = align4(section_offset as usize) as u32;
        }

        // Parse bodies; skipped for preliminary parsing, which adds no items
        if insert_into_tree {
            for current in self.model.children(index).to_vec() {
                match self.model.item_type(current) {
                    ItemType::Section => {
                        let _ = self.parse_section_body(current);
                    }
                    ItemType::Padding => {
                        // No parsing required
                    }
                    _ => return Err(ParseError::UnknownItemType),
                }
            }
        }

        Ok(())
    }

    fn parent_volume_ffs_version(&self, index: ItemId) -> u8 {
        let volume = if self.model.item_type(index) == ItemType::Volume {
            Some(index)
        } else {
            self.model.find_parent_of_type(index, ItemType::Volume)
        };
        match volume.map(|v| self.model.parsing_data(v)) {
            Some(ParsingData::Volume(pdata)) => pdata.ffs_version,
            _ => 2,
        }
    }

    pub(crate) fn get_section_size(
        &self,
        data: &ByteSpan,
        section_offset: u32,
        ffs_version: u8,
    ) -> u32 {
        let Some(header) = read_le_at::<CommonSectionHeader>(data, section_offset as usize)
        else {
            return 0;
        };
        if ffs_version == 2 {
            header.size.value()
        } else if ffs_version == 3 {
            let size = header.size.value();
            if size == EFI_SECTION2_IS_USED {
                let Some(header2) =
                    read_le_at::<CommonSectionHeader2>(data, section_offset as usize)
                else {
                    return 0;
                };
                header2.extended_size
            } else {
                size
            }
        } else {
            0
        }
    }

    /// Common header size for this section, accounting for the FFSv3
    /// extended size escape. `None` when the section is too small.
    fn common_header_size(&self, section: &ByteSpan, ffs_version: u8) -> Option<usize> {
        let header: CommonSectionHeader = read_le(section)?;
        if ffs_version == 3 && header.size.value() == EFI_SECTION2_IS_USED {
            if section.len() < COMMON_SECTION_HEADER2_SIZE {
                return None;
            }
            Some(COMMON_SECTION_HEADER2_SIZE)
        } else {
            Some(COMMON_SECTION_HEADER_SIZE)
        }
    }

    fn parse_section_header(
        &mut self,
        section: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
        insert_into_tree: bool,
    ) -> Result<(), ParseError> {
        if section.len() < COMMON_SECTION_HEADER_SIZE {
            return Err(ParseError::InvalidSection);
        }

        let header: CommonSectionHeader = read_le(section).ok_or(ParseError::InvalidSection)?;
        match header.section_type {
            // Special
            EFI_SECTION_COMPRESSION => {
                self.parse_compressed_section_header(section, local_offset, parent, insert_into_tree)
            }
            EFI_SECTION_GUID_DEFINED => {
                self.parse_guided_section_header(section, local_offset, parent, insert_into_tree)
            }
            EFI_SECTION_FREEFORM_SUBTYPE_GUID => self.parse_freeform_guided_section_header(
                section,
                local_offset,
                parent,
                insert_into_tree,
            ),
            EFI_SECTION_VERSION => {
                self.parse_version_section_header(section, local_offset, parent, insert_into_tree)
            }
            PHOENIX_SECTION_POSTCODE | INSYDE_SECTION_POSTCODE => {
                self.parse_postcode_section_header(section, local_offset, parent, insert_into_tree)
            }
            // Common
            EFI_SECTION_DISPOSABLE
            | EFI_SECTION_DXE_DEPEX
            | EFI_SECTION_PEI_DEPEX
            | EFI_SECTION_MM_DEPEX
            | EFI_SECTION_PE32
            | EFI_SECTION_PIC
            | EFI_SECTION_TE
            | EFI_SECTION_COMPATIBILITY16
            | EFI_SECTION_USER_INTERFACE
            | EFI_SECTION_FIRMWARE_VOLUME_IMAGE
            | EFI_SECTION_RAW => {
                self.parse_common_section_header(section, local_offset, parent, insert_into_tree)
            }
            // Unknown
            unknown_type => {
                let result = self.parse_common_section_header(
                    section,
                    local_offset,
                    parent,
                    insert_into_tree,
                );
                if insert_into_tree {
                    self.msg(
                        format!(
                            "parse_section_header: section with unknown type {:02X}h",
                            unknown_type
                        ),
                        None,
                    );
                }
                result
            }
        }
    }

    fn parse_common_section_header(
        &mut self,
        section: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
        insert_into_tree: bool,
    ) -> Result<(), ParseError> {
        let ffs_version = self.parent_volume_ffs_version(parent);
        let header_size =
            self.common_header_size(section, ffs_version).ok_or(ParseError::InvalidSection)?;
        if section.len() < header_size {
            return Err(ParseError::InvalidSection);
        }

        let header: CommonSectionHeader = read_le(section).ok_or(ParseError::InvalidSection)?;
        let section_type = header.section_type;

        let header_span = section.slice(0, header_size);
        let body = section.slice_from(header_size);

        if insert_into_tree {
            let name = format!("{} section", section_type_name(section_type));
            let info = format!(
                "Type: {:02X}h\nFull size: {}\nHeader size: {}\nBody size: {}",
                section_type,
                size_string(section.len()),
                size_string(header_size),
                size_string(body.len())
            );
            self.add_item(
                local_offset,
                ItemType::Section,
                section_type,
                name,
                "",
                info,
                header_span,
                body,
                ByteSpan::empty(),
                false,
                parent,
            );
        }
        Ok(())
    }

    fn parse_compressed_section_header(
        &mut self,
        section: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
        insert_into_tree: bool,
    ) -> Result<(), ParseError> {
        let ffs_version = self.parent_volume_ffs_version(parent);
        let common_size =
            self.common_header_size(section, ffs_version).ok_or(ParseError::InvalidSection)?;
        let header_size = common_size + COMPRESSION_SECTION_EXTRA_SIZE;
        if section.len() < header_size {
            return Err(ParseError::InvalidSection);
        }

        let header: CommonSectionHeader = read_le(section).ok_or(ParseError::InvalidSection)?;
        let extra: CompressionSectionExtra =
            read_le_at(section, common_size).ok_or(ParseError::InvalidSection)?;

        let header_span = section.slice(0, header_size);
        let body = section.slice_from(header_size);

        if insert_into_tree {
            let name = format!("{} section", section_type_name(header.section_type));
            let info = format!(
                "Type: {:02X}h\nFull size: {}\nHeader size: {}\nBody size: {}\nCompression type: {:02X}h\nDecompressed size: {}",
                header.section_type,
                size_string(section.len()),
                size_string(header_size),
                size_string(body.len()),
                extra.compression_type,
                size_string(extra.uncompressed_length as usize)
            );
            let index = self.add_item(
                local_offset,
                ItemType::Section,
                header.section_type,
                name,
                "",
                info,
                header_span,
                body,
                ByteSpan::empty(),
                false,
                parent,
            );
            self.model.set_parsing_data(
                index,
                ParsingData::CompressedSection(CompressedSectionParsingData {
                    compression_type: extra.compression_type,
                    uncompressed_size: extra.uncompressed_length,
                    algorithm: COMPRESSION_ALGORITHM_UNKNOWN,
                    dictionary_size: 0,
                }),
            );
        }
        Ok(())
    }

    fn parse_guided_section_header(
        &mut self,
        section: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
        insert_into_tree: bool,
    ) -> Result<(), ParseError> {
        let ffs_version = self.parent_volume_ffs_version(parent);
        let common_size =
            self.common_header_size(section, ffs_version).ok_or(ParseError::InvalidSection)?;
        let header_size = common_size + GUID_DEFINED_SECTION_EXTRA_SIZE;
        if section.len() < header_size {
            return Err(ParseError::InvalidSection);
        }

        let header: CommonSectionHeader = read_le(section).ok_or(ParseError::InvalidSection)?;
        let extra: GuidDefinedSectionExtra =
            read_le_at(section, common_size).ok_or(ParseError::InvalidSection)?;
        let guid = extra.section_definition_guid.to_uuid();
        let mut data_offset = extra.data_offset as usize;
        let attributes = extra.attributes;

        // Check for special GUIDed sections
        let mut additional_info = String::new();
        let mut msg_signed_section_found = false;
        let mut msg_no_auth_status_attribute = false;
        let mut msg_no_processing_required_attribute_compressed = false;
        let mut msg_no_processing_required_attribute_signed = false;
        let mut msg_invalid_crc = false;
        let mut msg_unknown_cert_type = false;
        let mut msg_unknown_cert_subtype = false;
        let mut msg_processing_required_on_unknown_guid = false;

        if guid == EFI_GUIDED_SECTION_CRC32 {
            // AuthStatusValid attribute must be set on checksummed sections
            if attributes & EFI_GUIDED_SECTION_AUTH_STATUS_VALID == 0 {
                msg_no_auth_status_attribute = true;
            }

            if section.len() < header_size + 4 {
                return Err(ParseError::InvalidSection);
            }
            if data_offset > section.len() {
                return Err(ParseError::InvalidSection);
            }

            let crc = u32::from_le_bytes(
                section[header_size..header_size + 4].try_into().unwrap(),
            );
            additional_info += "\nChecksum type: CRC32";
            let calculated = crc32fast::hash(&section[data_offset..]);
            if crc == calculated {
                additional_info += &format!("\nChecksum: {:08X}h, valid", crc);
            } else {
                additional_info +=
                    &format!("\nChecksum: {:08X}h, invalid, should be {:08X}h", crc, calculated);
                msg_invalid_crc = true;
            }
            // No need to change data_offset here
        } else if guid == EFI_GUIDED_SECTION_LZMA
            || guid == EFI_GUIDED_SECTION_LZMA_HP
            || guid == EFI_GUIDED_SECTION_LZMAF86
            || guid == EFI_GUIDED_SECTION_TIANO
            || guid == EFI_GUIDED_SECTION_GZIP
        {
            // ProcessingRequired attribute must be set on compressed sections
            if attributes & EFI_GUIDED_SECTION_PROCESSING_REQUIRED == 0 {
                msg_no_processing_required_attribute_compressed = true;
            }
            // No need to change data_offset here
        } else if guid == EFI_CERT_TYPE_RSA2048_SHA256_GUID {
            if attributes & EFI_GUIDED_SECTION_PROCESSING_REQUIRED == 0 {
                msg_no_processing_required_attribute_signed = true;
            }

            if section.len() < header_size + CERT_BLOCK_RSA2048_SHA256_SIZE {
                return Err(ParseError::InvalidSection);
            }

            // Adjust the data offset past the certificate block
            data_offset += CERT_BLOCK_RSA2048_SHA256_SIZE;
            additional_info += "\nCertificate type: RSA2048/SHA256";
            msg_signed_section_found = true;
        } else if guid == EFI_FIRMWARE_CONTENTS_SIGNED_GUID {
            if attributes & EFI_GUIDED_SECTION_PROCESSING_REQUIRED == 0 {
                msg_no_processing_required_attribute_signed = true;
            }

            if section.len() < header_size + WIN_CERTIFICATE_SIZE {
                return Err(ParseError::InvalidSection);
            }
            let certificate: WinCertificate =
                read_le_at(section, header_size).ok_or(ParseError::InvalidSection)?;

            // Adjust the data offset past the whole certificate
            data_offset += certificate.length as usize;
            if section.len() < data_offset {
                return Err(ParseError::InvalidSection);
            }

            if certificate.certificate_type == WIN_CERT_TYPE_EFI_GUID {
                additional_info += "\nCertificate type: UEFI";

                let cert_with_guid: WinCertificateUefiGuid =
                    read_le_at(section, header_size).ok_or(ParseError::InvalidSection)?;
                let cert_type_guid = cert_with_guid.cert_type.to_uuid();
                if cert_type_guid == EFI_CERT_TYPE_RSA2048_SHA256_GUID {
                    additional_info += "\nCertificate subtype: RSA2048/SHA256";
                } else {
                    additional_info += &format!(
                        "\nCertificate subtype: unknown, GUID {}",
                        uuid_to_string(cert_type_guid)
                    );
                    msg_unknown_cert_subtype = true;
                }
            } else {
                additional_info += &format!(
                    "\nCertificate type: unknown ({:04X}h)",
                    certificate.certificate_type
                );
                msg_unknown_cert_type = true;
            }
            msg_signed_section_found = true;
        } else if attributes & EFI_GUIDED_SECTION_PROCESSING_REQUIRED != 0 {
            // Processing required for an unknown GUID can not be honored
            msg_processing_required_on_unknown_guid = true;
        }

        if data_offset > section.len() {
            return Err(ParseError::InvalidSection);
        }
        let header_span = section.slice(0, data_offset);
        let body = section.slice_from(data_offset);

        if insert_into_tree {
            let name = guid_friendly_name(guid);
            let info = format!(
                "Section GUID: {}\nType: {:02X}h\nFull size: {}\nHeader size: {}\nBody size: {}\nData offset: {:X}h\nAttributes: {:04X}h{}",
                uuid_to_string(guid),
                header.section_type,
                size_string(section.len()),
                size_string(header_span.len()),
                size_string(body.len()),
                data_offset,
                attributes,
                additional_info
            );
            let index = self.add_item(
                local_offset,
                ItemType::Section,
                header.section_type,
                name,
                "",
                info,
                header_span,
                body,
                ByteSpan::empty(),
                false,
                parent,
            );
            self.model.set_parsing_data(
                index,
                ParsingData::GuidedSection(GuidedSectionParsingData {
                    guid,
                    dictionary_size: 0,
                }),
            );

            if msg_signed_section_found {
                self.msg(
                    "parse_guided_section_header: section signature may become invalid after any modification",
                    Some(index),
                );
            }
            if msg_no_auth_status_attribute {
                self.msg(
                    "parse_guided_section_header: CRC32 GUIDed section without AuthStatusValid attribute",
                    Some(index),
                );
            }
            if msg_no_processing_required_attribute_compressed {
                self.msg(
                    "parse_guided_section_header: compressed GUIDed section without ProcessingRequired attribute",
                    Some(index),
                );
            }
            if msg_no_processing_required_attribute_signed {
                self.msg(
                    "parse_guided_section_header: signed GUIDed section without ProcessingRequired attribute",
                    Some(index),
                );
            }
            if msg_invalid_crc {
                self.msg(
                    "parse_guided_section_header: GUID defined section with invalid CRC32",
                    Some(index),
                );
            }
            if msg_unknown_cert_type {
                self.msg(
                    "parse_guided_section_header: signed GUIDed section with unknown type",
                    Some(index),
                );
            }
            if msg_unknown_cert_subtype {
                self.msg(
                    "parse_guided_section_header: signed GUIDed section with unknown subtype",
                    Some(index),
                );
            }
            if msg_processing_required_on_unknown_guid {
                self.msg(
                    "parse_guided_section_header: processing required bit set for GUIDed section with unknown GUID",
                    Some(index),
                );
            }
        }
        Ok(())
    }

    fn parse_freeform_guided_section_header(
        &mut self,
        section: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
        insert_into_tree: bool,
    ) -> Result<(), ParseError> {
        let ffs_version = self.parent_volume_ffs_version(parent);
        let common_size =
            self.common_header_size(section, ffs_version).ok_or(ParseError::InvalidSection)?;
        let header_size = common_size + FREEFORM_SECTION_EXTRA_SIZE;
        if section.len() < header_size {
            return Err(ParseError::InvalidSection);
        }

        let header: CommonSectionHeader = read_le(section).ok_or(ParseError::InvalidSection)?;
        let extra: FreeformSubtypeGuidSectionExtra =
            read_le_at(section, common_size).ok_or(ParseError::InvalidSection)?;
        let guid = extra.sub_type_guid.to_uuid();

        let header_span = section.slice(0, header_size);
        let body = section.slice_from(header_size);

        if insert_into_tree {
            let info = format!(
                "Type: {:02X}h\nFull size: {}\nHeader size: {}\nBody size: {}\nSubtype GUID: {}",
                header.section_type,
                size_string(section.len()),
                size_string(header_size),
                size_string(body.len()),
                uuid_to_string(guid)
            );
            // The section is named by its subtype GUID
            let index = self.add_item(
                local_offset,
                ItemType::Section,
                header.section_type,
                guid_friendly_name(guid),
                "",
                info,
                header_span,
                body,
                ByteSpan::empty(),
                false,
                parent,
            );
            self.model.set_parsing_data(
                index,
                ParsingData::FreeformSection(FreeformSectionParsingData { guid }),
            );
        }
        Ok(())
    }

    fn parse_version_section_header(
        &mut self,
        section: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
        insert_into_tree: bool,
    ) -> Result<(), ParseError> {
        let ffs_version = self.parent_volume_ffs_version(parent);
        let common_size =
            self.common_header_size(section, ffs_version).ok_or(ParseError::InvalidSection)?;
        let header_size = common_size + VERSION_SECTION_EXTRA_SIZE;
        if section.len() < header_size {
            return Err(ParseError::InvalidSection);
        }

        let header: CommonSectionHeader = read_le(section).ok_or(ParseError::InvalidSection)?;
        let extra: VersionSectionExtra =
            read_le_at(section, common_size).ok_or(ParseError::InvalidSection)?;

        if insert_into_tree {
            let name = format!("{} section", section_type_name(header.section_type));
            let info = format!(
                "Type: {:02X}h\nFull size: {}\nHeader size: {}\nBody size: {}\nBuild number: {}",
                header.section_type,
                size_string(section.len()),
                size_string(header_size),
                size_string(section.len() - header_size),
                extra.build_number
            );
            self.add_item(
                local_offset,
                ItemType::Section,
                header.section_type,
                name,
                "",
                info,
                section.slice(0, header_size),
                section.slice_from(header_size),
                ByteSpan::empty(),
                false,
                parent,
            );
        }
        Ok(())
    }

    fn parse_postcode_section_header(
        &mut self,
        section: &ByteSpan,
        local_offset: u32,
        parent: ItemId,
        insert_into_tree: bool,
    ) -> Result<(), ParseError> {
        let ffs_version = self.parent_volume_ffs_version(parent);
        let common_size =
            self.common_header_size(section, ffs_version).ok_or(ParseError::InvalidSection)?;
        let header_size = common_size + POSTCODE_SECTION_EXTRA_SIZE;
        if section.len() < header_size {
            return Err(ParseError::InvalidSection);
        }

        let header: CommonSectionHeader = read_le(section).ok_or(ParseError::InvalidSection)?;
        let extra: PostcodeSectionExtra =
            read_le_at(section, common_size).ok_or(ParseError::InvalidSection)?;

        if insert_into_tree {
            let name = format!("{} section", section_type_name(header.section_type));
            let info = format!(
                "Type: {:02X}h\nFull size: {}\nHeader size: {}\nBody size: {}\nPostcode: {:X}h",
                header.section_type,
                size_string(section.len()),
                size_string(header_size),
                size_string(section.len() - header_size),
                extra.postcode
            );
            self.add_item(
                local_offset,
                ItemType::Section,
                header.section_type,
                name,
                "",
                info,
                section.slice(0, header_size),
                section.slice_from(header_size),
                ByteSpan::empty(),
                false,
                parent,
            );
        }
        Ok(())
    }

    fn parse_section_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        if self.model.header(index).len() < COMMON_SECTION_HEADER_SIZE {
            return Err(ParseError::InvalidSection);
        }
        let section_type = self.model.subtype(index);
        let body = self.model.body(index).clone();

        match section_type {
            // Encapsulation
            EFI_SECTION_COMPRESSION => self.parse_compressed_section_body(index),
            EFI_SECTION_GUID_DEFINED => self.parse_guided_section_body(index),
            EFI_SECTION_DISPOSABLE => self.parse_sections(&body, index, true),
            // Leaf
            EFI_SECTION_FREEFORM_SUBTYPE_GUID => self.parse_raw_area(index),
            EFI_SECTION_VERSION => {
                self.parse_version_section_body(index);
                Ok(())
            }
            EFI_SECTION_DXE_DEPEX | EFI_SECTION_PEI_DEPEX | EFI_SECTION_MM_DEPEX => {
                self.parse_depex_section_body(index)
            }
            EFI_SECTION_TE => {
                self.parse_te_image_section_body(index);
                Ok(())
            }
            EFI_SECTION_PE32 | EFI_SECTION_PIC => {
                self.parse_pe_image_section_body(index);
                Ok(())
            }
            EFI_SECTION_USER_INTERFACE => {
                self.parse_ui_section_body(index);
                Ok(())
            }
            EFI_SECTION_FIRMWARE_VOLUME_IMAGE => self.parse_raw_area(index),
            EFI_SECTION_RAW => self.parse_raw_section_body(index),
            // No parsing needed
            _ => Ok(()),
        }
    }

    fn parse_compressed_section_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        let (compression_type, uncompressed_size) = match self.model.parsing_data(index) {
            ParsingData::CompressedSection(pdata) => {
                (pdata.compression_type, pdata.uncompressed_size)
            }
            _ => (EFI_NOT_COMPRESSED, self.model.body(index).len() as u32),
        };

        // Decompress the section
        let body = self.model.body(index).clone();
        let decompressed = match compression::decompress(&body, compression_type) {
            Ok(decompressed) => decompressed,
            Err(error) => {
                self.msg(
                    format!(
                        "parse_compressed_section_body: decompression failed with error \"{}\"",
                        error
                    ),
                    Some(index),
                );
                return Ok(());
            }
        };
        let mut algorithm = decompressed.algorithm;
        let dictionary_size = decompressed.dictionary_size;
        let mut data = ByteSpan::from(decompressed.data);

        // Check the reported uncompressed size
        if uncompressed_size as usize != data.len() {
            self.msg(
                format!(
                    "parse_compressed_section_body: decompressed size stored in header {} differs from actual {}",
                    size_string(uncompressed_size as usize),
                    size_string(data.len())
                ),
                Some(index),
            );
            self.model.add_info(
                index,
                &format!("\nActual decompressed size: {}", size_string(data.len())),
                true,
            );
        }

        // The undecided case needs test-parsing of both candidate outputs
        let mut parse_current_section = true;
        if algorithm == COMPRESSION_ALGORITHM_UNDECIDED {
            let efi_data = decompressed.efi_data.map(ByteSpan::from);
            // Try preparse of sections decompressed with the Tiano algorithm
            if self.parse_sections(&data, index, false).is_ok() {
                algorithm = COMPRESSION_ALGORITHM_TIANO;
            }
            // Try preparse of sections decompressed with the EFI 1.1 algorithm
            else if let Some(efi_data) = efi_data
                .filter(|candidate| self.parse_sections(candidate, index, false).is_ok())
            {
                algorithm = COMPRESSION_ALGORITHM_EFI11;
                data = efi_data;
            } else {
                self.msg(
                    "parse_compressed_section_body: can't guess the correct decompression algorithm, both preparse steps are failed",
                    Some(index),
                );
                parse_current_section = false;
            }
        }

        self.model.add_info(
            index,
            &format!("\nCompression algorithm: {}", compression_algorithm_name(algorithm)),
            true,
        );
        if algorithm == COMPRESSION_ALGORITHM_LZMA
            || algorithm == COMPRESSION_ALGORITHM_LZMA_INTEL_LEGACY
        {
            self.model.add_info(
                index,
                &format!("\nLZMA dictionary size: {:X}h", dictionary_size),
                true,
            );
        }

        // Set compression data
        if algorithm != COMPRESSION_ALGORITHM_NONE {
            self.model.set_uncompressed_data(index, data.clone());
            self.model.set_compressed(index, true);
        }

        self.model.set_parsing_data(
            index,
            ParsingData::CompressedSection(CompressedSectionParsingData {
                compression_type,
                uncompressed_size,
                algorithm,
                dictionary_size,
            }),
        );

        if !parse_current_section {
            return Ok(());
        }

        // Parse the decompressed data
        self.parse_sections(&data, index, true)
    }

    fn parse_guided_section_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        let guid = match self.model.parsing_data(index) {
            ParsingData::GuidedSection(pdata) => pdata.guid,
            _ => Uuid::nil(),
        };

        let body = self.model.body(index).clone();
        let mut processed = body.clone();
        let mut info = String::new();
        let mut parse_current_section = true;
        let mut algorithm = COMPRESSION_ALGORITHM_NONE;
        let mut dictionary_size = 0u32;

        // Tiano compressed section
        if guid == EFI_GUIDED_SECTION_TIANO {
            let decompressed = match compression::decompress(&body, EFI_STANDARD_COMPRESSION) {
                Ok(decompressed) => decompressed,
                Err(error) => {
                    self.msg(
                        format!(
                            "parse_guided_section_body: decompression failed with error \"{}\"",
                            error
                        ),
                        Some(index),
                    );
                    return Ok(());
                }
            };
            algorithm = decompressed.algorithm;
            processed = ByteSpan::from(decompressed.data);

            if algorithm == COMPRESSION_ALGORITHM_UNDECIDED {
                let efi_data = decompressed.efi_data.map(ByteSpan::from);
                if self.parse_sections(&processed, index, false).is_ok() {
                    algorithm = COMPRESSION_ALGORITHM_TIANO;
                } else if let Some(efi_data) = efi_data
                    .filter(|candidate| self.parse_sections(candidate, index, false).is_ok())
                {
                    algorithm = COMPRESSION_ALGORITHM_EFI11;
                    processed = efi_data;
                } else {
                    self.msg(
                        "parse_guided_section_body: can't guess the correct decompression algorithm, both preparse steps are failed",
                        Some(index),
                    );
                    parse_current_section = false;
                }
            }

            info += &format!(
                "\nCompression algorithm: {}",
                compression_algorithm_name(algorithm)
            );
            info += &format!("\nDecompressed size: {}", size_string(processed.len()));
        }
        // LZMA compressed section
        else if guid == EFI_GUIDED_SECTION_LZMA || guid == EFI_GUIDED_SECTION_LZMA_HP {
            let decompressed = match compression::decompress(&body, EFI_CUSTOMIZED_COMPRESSION) {
                Ok(decompressed) => decompressed,
                Err(error) => {
                    self.msg(
                        format!(
                            "parse_guided_section_body: decompression failed with error \"{}\"",
                            error
                        ),
                        Some(index),
                    );
                    return Ok(());
                }
            };
            algorithm = decompressed.algorithm;
            dictionary_size = decompressed.dictionary_size;
            processed = ByteSpan::from(decompressed.data);

            if algorithm == COMPRESSION_ALGORITHM_LZMA
                || algorithm == COMPRESSION_ALGORITHM_LZMA_INTEL_LEGACY
            {
                info += &format!(
                    "\nCompression algorithm: {}",
                    compression_algorithm_name(algorithm)
                );
                info += &format!("\nDecompressed size: {}", size_string(processed.len()));
                info += &format!("\nLZMA dictionary size: {:X}h", dictionary_size);
            } else {
                info += "\nCompression algorithm: unknown";
                parse_current_section = false;
            }
        }
        // LZMAF86 compressed section
        else if guid == EFI_GUIDED_SECTION_LZMAF86 {
            let decompressed =
                match compression::decompress(&body, EFI_CUSTOMIZED_COMPRESSION_LZMAF86) {
                    Ok(decompressed) => decompressed,
                    Err(error) => {
                        self.msg(
                            format!(
                                "parse_guided_section_body: decompression failed with error \"{}\"",
                                error
                            ),
                            Some(index),
                        );
                        return Ok(());
                    }
                };
            algorithm = decompressed.algorithm;
            dictionary_size = decompressed.dictionary_size;
            processed = ByteSpan::from(decompressed.data);

            if algorithm == COMPRESSION_ALGORITHM_LZMAF86 {
                info += "\nCompression algorithm: LZMAF86";
                info += &format!("\nDecompressed size: {}", size_string(processed.len()));
                info += &format!("\nLZMA dictionary size: {:X}h", dictionary_size);
            } else {
                info += "\nCompression algorithm: unknown";
                parse_current_section = false;
            }
        }
        // GZip compressed section
        else if guid == EFI_GUIDED_SECTION_GZIP {
            match compression::gzip_decompress(&body) {
                Some(data) => {
                    algorithm = COMPRESSION_ALGORITHM_GZIP;
                    processed = ByteSpan::from(data);
                    info += "\nCompression algorithm: GZip";
                    info += &format!("\nDecompressed size: {}", size_string(processed.len()));
                }
                None => {
                    self.msg(
                        "parse_guided_section_body: GZip decompression failed",
                        Some(index),
                    );
                    return Ok(());
                }
            }
        }

        self.model.add_info(index, &info, true);
        self.model.set_parsing_data(
            index,
            ParsingData::GuidedSection(GuidedSectionParsingData { guid, dictionary_size }),
        );

        // Set compression data
        if algorithm != COMPRESSION_ALGORITHM_NONE {
            self.model.set_uncompressed_data(index, processed.clone());
            self.model.set_compressed(index, true);
        }

        if !parse_current_section {
            self.msg(
                "parse_guided_section_body: GUID defined section can not be processed",
                Some(index),
            );
            return Ok(());
        }

        self.parse_sections(&processed, index, true)
    }

    fn parse_version_section_body(&mut self, index: ItemId) {
        let version = ucs2_string(self.model.body(index));
        self.model.add_info(index, &format!("\nVersion string: {}", version), true);
    }

    fn parse_depex_section_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        let body = self.model.body(index).clone();
        let mut parsed = String::new();

        // 2 is the minimal sane size, i.e. TRUE + END
        if body.len() < 2 {
            self.msg("parse_depex_section_body: DEPEX section too short", Some(index));
            return Err(ParseError::DepexParseFailed);
        }

        let guid_at = |offset: usize| -> Uuid {
            Uuid::from_bytes_le(body[offset..offset + 16].try_into().unwrap())
        };

        let mut current = 0usize;

        // Special cases of the first opcode
        match body[0] {
            EFI_DEP_BEFORE => {
                if body.len() != 2 * EFI_DEP_OPCODE_SIZE + 16 {
                    self.msg(
                        "parse_depex_section_body: DEPEX section too long for a section starting with BEFORE opcode",
                        Some(index),
                    );
                    return Ok(());
                }
                parsed += &format!("\nBEFORE {}", guid_friendly_name(guid_at(1)));
                if body[EFI_DEP_OPCODE_SIZE + 16] != EFI_DEP_END {
                    self.msg(
                        "parse_depex_section_body: DEPEX section ends with non-END opcode",
                        Some(index),
                    );
                    return Ok(());
                }
                self.model.add_info(index, &format!("\nParsed expression:{}", parsed), true);
                return Ok(());
            }
            EFI_DEP_AFTER => {
                if body.len() != 2 * EFI_DEP_OPCODE_SIZE + 16 {
                    self.msg(
                        "parse_depex_section_body: DEPEX section too long for a section starting with AFTER opcode",
                        Some(index),
                    );
                    return Ok(());
                }
                parsed += &format!("\nAFTER {}", guid_friendly_name(guid_at(1)));
                if body[EFI_DEP_OPCODE_SIZE + 16] != EFI_DEP_END {
                    self.msg(
                        "parse_depex_section_body: DEPEX section ends with non-END opcode",
                        Some(index),
                    );
                    return Ok(());
                }
                self.model.add_info(index, &format!("\nParsed expression:{}", parsed), true);
                return Ok(());
            }
            EFI_DEP_SOR => {
                if body.len() <= 2 * EFI_DEP_OPCODE_SIZE {
                    self.msg(
                        "parse_depex_section_body: DEPEX section too short for a section starting with SOR opcode",
                        Some(index),
                    );
                    return Ok(());
                }
                parsed += "\nSOR";
                current += EFI_DEP_OPCODE_SIZE;
            }
            _ => {}
        }

        // Parse the rest of the expression
        while current < body.len() {
            match body[current] {
                EFI_DEP_BEFORE => {
                    self.msg("parse_depex_section_body: misplaced BEFORE opcode", Some(index));
                    return Ok(());
                }
                EFI_DEP_AFTER => {
                    self.msg("parse_depex_section_body: misplaced AFTER opcode", Some(index));
                    return Ok(());
                }
                EFI_DEP_SOR => {
                    self.msg("parse_depex_section_body: misplaced SOR opcode", Some(index));
                    return Ok(());
                }
                EFI_DEP_PUSH => {
                    // Check that the rest of the expression can hold the GUID
                    if body.len() - current <= EFI_DEP_OPCODE_SIZE + 16 {
                        self.msg(
                            "parse_depex_section_body: remains of DEPEX section too short for PUSH opcode",
                            Some(index),
                        );
                        return Ok(());
                    }
                    parsed += &format!("\nPUSH {}", guid_friendly_name(guid_at(current + 1)));
                    current += EFI_DEP_OPCODE_SIZE + 16;
                }
                EFI_DEP_AND => {
                    parsed += "\nAND";
                    current += EFI_DEP_OPCODE_SIZE;
                }
                EFI_DEP_OR => {
                    parsed += "\nOR";
                    current += EFI_DEP_OPCODE_SIZE;
                }
                EFI_DEP_NOT => {
                    parsed += "\nNOT";
                    current += EFI_DEP_OPCODE_SIZE;
                }
                EFI_DEP_TRUE => {
                    parsed += "\nTRUE";
                    current += EFI_DEP_OPCODE_SIZE;
                }
                EFI_DEP_FALSE => {
                    parsed += "\nFALSE";
                    current += EFI_DEP_OPCODE_SIZE;
                }
                EFI_DEP_END => {
                    parsed += "\nEND";
                    current += EFI_DEP_OPCODE_SIZE;
                    // Check that END is the last opcode
                    if current < body.len() {
                        self.msg(
                            "parse_depex_section_body: DEPEX section ends with non-END opcode",
                            Some(index),
                        );
                        return Ok(());
                    }
                }
                unknown => {
                    self.msg(
                        format!("parse_depex_section_body: unknown opcode {:02X}h", unknown),
                        Some(index),
                    );
                    return Ok(());
                }
            }
        }

        self.model.add_info(index, &format!("\nParsed expression:{}", parsed), true);
        Ok(())
    }

    fn parse_ui_section_body(&mut self, index: ItemId) {
        let text = ucs2_string(self.model.body(index));
        self.model.add_info(index, &format!("\nText: {}", text), true);

        // Rename the parent file
        if let Some(parent_file) = self.model.find_parent_of_type(index, ItemType::File) {
            self.model.set_text(parent_file, text);
        }
    }

    fn parse_apriori_raw_section(&mut self, body: &ByteSpan) -> String {
        if body.len() % 16 != 0 {
            self.msg(
                "parse_apriori_raw_section: apriori file has size that is not a multiple of 16",
                None,
            );
        }
        let mut parsed = String::new();
        for guid_bytes in body.as_bytes().chunks_exact(16) {
            let guid = Uuid::from_bytes_le(guid_bytes.try_into().unwrap());
            parsed += &format!("\n{}", guid_friendly_name(guid));
        }
        parsed
    }

    fn parse_raw_section_body(&mut self, index: ItemId) -> Result<(), ParseError> {
        // The handling is selected by the parent file's GUID
        let Some(parent_file) = self.model.find_parent_of_type(index, ItemType::File) else {
            return Err(ParseError::InvalidRawArea);
        };
        let parent_file_guid = match self.model.parsing_data(parent_file) {
            ParsingData::File(pdata) => pdata.guid,
            _ => Uuid::nil(),
        };

        if parent_file_guid == EFI_PEI_APRIORI_FILE_GUID {
            self.model.set_text(parent_file, "PEI apriori file");
            let body = self.model.body(index).clone();
            let parsed = self.parse_apriori_raw_section(&body);
            if !parsed.is_empty() {
                self.model.add_info(index, &format!("\nFile list:{}", parsed), true);
            }
            Ok(())
        } else if parent_file_guid == EFI_DXE_APRIORI_FILE_GUID {
            self.model.set_text(parent_file, "DXE apriori file");
            let body = self.model.body(index).clone();
            let parsed = self.parse_apriori_raw_section(&body);
            if !parsed.is_empty() {
                self.model.add_info(index, &format!("\nFile list:{}", parsed), true);
            }
            Ok(())
        } else if parent_file_guid == crate::nvram::NVRAM_NVAR_EXTERNAL_DEFAULTS_FILE_GUID {
            self.model.set_text(parent_file, "NVRAM external defaults");
            self.parse_nvar_store(index)
        } else if parent_file_guid == PROTECTED_RANGE_VENDOR_HASH_FILE_GUID_AMI {
            self.parse_vendor_hash_file(parent_file_guid, index)
        } else {
            self.parse_raw_area(index)
        }
    }

    fn parse_pe_image_section_body(&mut self, index: ItemId) {
        let body = self.model.body(index).clone();
        if body.len() < 64 {
            self.msg(
                "parse_pe_image_section_body: section body size is smaller than DOS header size",
                Some(index),
            );
            return;
        }

        let mut info = String::new();
        match goblin::pe::header::Header::parse(&body) {
            Err(_) => {
                let dos_magic = u16::from_le_bytes([body[0], body[1]]);
                if dos_magic != peimage::EFI_IMAGE_DOS_SIGNATURE {
                    info += &format!("\nDOS signature: {:04X}h, invalid", dos_magic);
                    self.msg(
                        "parse_pe_image_section_body: PE32 image with invalid DOS signature",
                        Some(index),
                    );
                } else {
                    info += "\nPE header: invalid";
                    self.msg(
                        "parse_pe_image_section_body: PE32 image with invalid PE header",
                        Some(index),
                    );
                }
            }
            Ok(header) => {
                info += &format!(
                    "\nDOS signature: {:04X}h\nPE signature: {:08X}h\nMachine type: {}\nNumber of sections: {}\nCharacteristics: {:04X}h",
                    header.dos_header.signature,
                    header.signature,
                    peimage::machine_type_name(header.coff_header.machine),
                    header.coff_header.number_of_sections,
                    header.coff_header.characteristics
                );

                match header.optional_header {
                    None => {
                        info += "\nPE optional header: invalid";
                        self.msg(
                            "parse_pe_image_section_body: PE32 image with invalid PE optional header",
                            Some(index),
                        );
                    }
                    Some(optional) => {
                        let magic = optional.standard_fields.magic;
                        if magic == peimage::EFI_IMAGE_PE_OPTIONAL_HDR32_MAGIC
                            || magic == peimage::EFI_IMAGE_PE_OPTIONAL_HDR64_MAGIC
                        {
                            info += &format!(
                                "\nOptional header signature: {:04X}h\nSubsystem: {:04X}h\nAddress of entry point: {:X}h\nBase of code: {:X}h\nImage base: {:X}h",
                                magic,
                                optional.windows_fields.subsystem,
                                optional.standard_fields.address_of_entry_point,
                                optional.standard_fields.base_of_code,
                                optional.windows_fields.image_base
                            );
                        } else {
                            info += &format!(
                                "\nOptional header signature: {:04X}h, unknown",
                                magic
                            );
                            self.msg(
                                "parse_pe_image_section_body: PE32 image with invalid optional PE header signature",
                                Some(index),
                            );
                        }
                    }
                }
            }
        }

        self.model.add_info(index, &info, true);
    }

    fn parse_te_image_section_body(&mut self, index: ItemId) {
        let body = self.model.body(index).clone();
        if body.len() < peimage::TE_HEADER_SIZE {
            self.msg(
                "parse_te_image_section_body: section body size is smaller than TE header size",
                Some(index),
            );
            return;
        }

        let Some(header) = read_le::<peimage::TeHeader>(&body) else {
            return;
        };

        let mut info = String::new();
        if header.signature != peimage::EFI_IMAGE_TE_SIGNATURE {
            info += &format!("\nSignature: {:04X}h, invalid", header.signature);
            self.msg(
                "parse_te_image_section_body: TE image with invalid TE signature",
                Some(index),
            );
        } else {
            info += &format!(
                "\nSignature: {:04X}h\nMachine type: {}\nNumber of sections: {}\nSubsystem: {:02X}h\nStripped size: {}\n\
                 Base of code: {:X}h\nAddress of entry point: {:X}h\nImage base: {:X}h\nAdjusted image base: {:X}h",
                header.signature,
                peimage::machine_type_name(header.machine),
                header.number_of_sections,
                header.subsystem,
                size_string(header.stripped_size as usize),
                header.base_of_code,
                header.address_of_entry_point,
                header.image_base,
                header.adjusted_image_base()
            );
        }

        // Base type is determined during the second pass
        self.model.set_parsing_data(
            index,
            ParsingData::TeSection(TeSectionParsingData {
                image_base_type: TE_BASE_OTHER,
                original_image_base: header.image_base as u32,
                adjusted_image_base: header.adjusted_image_base() as u32,
            }),
        );

        self.model.add_info(index, &info, true);
    }
}
