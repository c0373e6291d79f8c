//! Recursive descent parser for UEFI firmware images.
//!
//! `FfsParser::parse` consumes one image buffer and produces a tree of typed
//! items plus an ordered diagnostics list. A first pass discovers structure;
//! once a Volume Top File is known, a second pass computes physical
//! addresses, decodes the Firmware Interface Table and verifies
//! integrity-protected ranges.

mod image;
mod section;
mod security;
mod volume;

use tree_model_lib::{ByteSpan, InsertMode, ItemId, ItemType, TreeModel};

use crate::error::ParseError;

/// One diagnostic, bound to the item it concerns when one exists.
pub type Message = (String, Option<ItemId>);

/// Kinds of integrity-protected ranges gathered during parsing.
pub const PROTECTED_RANGE_INTEL_BOOT_GUARD_IBB: u8 = 0x01;
pub const PROTECTED_RANGE_INTEL_BOOT_GUARD_POST_IBB: u8 = 0x02;
pub const PROTECTED_RANGE_INTEL_BOOT_GUARD_OBB: u8 = 0x03;
pub const PROTECTED_RANGE_VENDOR_HASH_PHOENIX: u8 = 0x04;
pub const PROTECTED_RANGE_VENDOR_HASH_AMI_V1: u8 = 0x05;
pub const PROTECTED_RANGE_VENDOR_HASH_AMI_V2: u8 = 0x06;
pub const PROTECTED_RANGE_VENDOR_HASH_AMI_V3: u8 = 0x07;
pub const PROTECTED_RANGE_VENDOR_HASH_MICROSOFT_PMDA: u8 = 0x08;

/// A range of the image covered by a stored hash.
#[derive(Debug, Clone)]
pub struct ProtectedRange {
    pub offset: u32,
    pub size: u32,
    pub algorithm_id: u16,
    pub range_type: u8,
    pub hash: Vec<u8>,
}

/// One decoded FIT entry, rendered as the six display columns plus the item
/// the entry points at.
#[derive(Debug, Clone)]
pub struct FitTableRow {
    pub address: String,
    pub size: String,
    pub version: String,
    pub checksum: String,
    pub type_name: String,
    pub info: String,
    pub item: Option<ItemId>,
}

pub struct FfsParser {
    pub(crate) model: TreeModel,
    pub(crate) messages: Vec<Message>,

    pub(crate) opened_image: ByteSpan,
    pub(crate) image_base: u32,
    pub(crate) address_diff: u64,
    pub(crate) last_vtf: Option<ItemId>,
    pub(crate) dxe_core: Option<ItemId>,

    pub(crate) protected_ranges: Vec<ProtectedRange>,
    pub(crate) protected_regions_base: u64,
    pub(crate) security_info: String,

    pub(crate) fit_table: Vec<FitTableRow>,
    pub(crate) bg_acm_found: bool,
    pub(crate) bg_key_manifest_found: bool,
    pub(crate) bg_boot_policy_found: bool,
}

impl Default for FfsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FfsParser {
    pub fn new() -> Self {
        FfsParser {
            model: TreeModel::new(),
            messages: Vec::new(),
            opened_image: ByteSpan::empty(),
            image_base: 0,
            address_diff: 0x1_0000_0000,
            last_vtf: None,
            dxe_core: None,
            protected_ranges: Vec::new(),
            protected_regions_base: 0,
            security_info: String::new(),
            fit_table: Vec::new(),
            bg_acm_found: false,
            bg_key_manifest_found: false,
            bg_boot_policy_found: false,
        }
    }

    /// Parse a firmware image. Returns `Ok` for every recoverable outcome;
    /// completeness is judged from the tree and the messages list.
    pub fn parse(&mut self, buffer: &[u8]) -> Result<(), ParseError> {
        // Reset parser state
        self.model = TreeModel::new();
        self.messages.clear();
        self.opened_image = ByteSpan::from(buffer);
        self.image_base = 0;
        self.address_diff = 0x1_0000_0000;
        self.last_vtf = None;
        self.dxe_core = None;
        self.protected_ranges.clear();
        self.protected_regions_base = 0;
        self.security_info.clear();
        self.fit_table.clear();
        self.bg_acm_found = false;
        self.bg_key_manifest_found = false;
        self.bg_boot_policy_found = false;

        log::debug!("parsing image of {:X}h bytes", buffer.len());

        let image = self.opened_image.clone();
        let result = self.perform_first_pass(&image);
        let root = match result {
            Ok(root) => {
                if self.last_vtf.is_some() {
                    self.perform_second_pass(root);
                } else {
                    self.msg(
                        "parse: not a single Volume Top File is found, the image may be corrupted",
                        None,
                    );
                }
                Some(root)
            }
            Err(_) => None,
        };

        if let Some(root) = root {
            self.add_info_recursive(root);
        }
        result.map(|_| ())
    }

    pub fn model(&self) -> &TreeModel {
        &self.model
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn fit_table(&self) -> &[FitTableRow] {
        &self.fit_table
    }

    pub fn security_info(&self) -> &str {
        &self.security_info
    }

    pub fn address_diff(&self) -> u64 {
        self.address_diff
    }

    pub(crate) fn msg(&mut self, message: impl Into<String>, item: Option<ItemId>) {
        self.messages.push((message.into(), item));
    }

    fn perform_first_pass(&mut self, buffer: &ByteSpan) -> Result<ItemId, ParseError> {
        if buffer.is_empty() {
            return Err(ParseError::InvalidParameter);
        }

        let root = self.model.root();

        // Try parsing as UEFI capsule
        match self.parse_capsule(buffer, 0, root) {
            Err(ParseError::ItemNotFound) => {}
            other => return other,
        }

        // Try parsing as Intel image
        match self.parse_intel_image(buffer, 0, root) {
            Err(ParseError::ItemNotFound) => {}
            other => return other,
        }

        // Parse as generic image
        self.parse_generic_image(buffer, 0, root)
    }

    pub(crate) fn add_item(
        &mut self,
        offset: u32,
        item_type: ItemType,
        subtype: u8,
        name: impl Into<String>,
        text: impl Into<String>,
        info: impl Into<String>,
        header: ByteSpan,
        body: ByteSpan,
        tail: ByteSpan,
        fixed: bool,
        parent: ItemId,
    ) -> ItemId {
        self.model
            .add_item(
                offset,
                item_type,
                subtype,
                name,
                text,
                info,
                header,
                body,
                tail,
                fixed,
                parent,
                InsertMode::Append,
            )
            .expect("append never fails")
    }

    /// Item's original span: header, body and tail concatenated.
    pub(crate) fn item_bytes(&self, item: ItemId) -> Vec<u8> {
        let mut out = self.model.header(item).to_vec();
        out.extend_from_slice(self.model.body(item));
        out.extend_from_slice(self.model.tail(item));
        out
    }
}

/// The "N_hex (N_dec)" rendering used by nearly every info line.
pub(crate) fn size_string(value: usize) -> String {
    format!("{:X}h ({})", value, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_is_invalid_parameter() {
        let mut parser = FfsParser::new();
        assert_eq!(parser.parse(&[]), Err(ParseError::InvalidParameter));
    }

    #[test]
    fn short_garbage_parses_as_generic_image() {
        // Shorter than a capsule header: must route through generic image
        // without panicking.
        let mut parser = FfsParser::new();
        let buffer = [0xA5u8; 16];
        assert!(parser.parse(&buffer).is_ok());
        let model = parser.model();
        let top = model.children(model.root())[0];
        assert_eq!(model.item_type(top), ItemType::Image);
        assert_eq!(model.subtype(top), tree_model_lib::image_subtype::UEFI);
        // No VTF, so the corresponding message must be present
        assert!(parser
            .messages()
            .iter()
            .any(|(m, _)| m.contains("not a single Volume Top File")));
    }
}
