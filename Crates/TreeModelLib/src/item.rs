use crate::span::ByteSpan;
use crate::types::{Action, ItemType, Marking, ParsingData};
use crate::ItemId;

/// One node of the image tree. Owned by the model's arena; refer to it with
/// an [`ItemId`].
#[derive(Debug, Clone)]
pub struct TreeItem {
    pub(crate) parent: Option<ItemId>,
    pub(crate) children: Vec<ItemId>,

    pub(crate) offset: u32,
    pub(crate) item_type: ItemType,
    pub(crate) subtype: u8,
    pub(crate) name: String,
    pub(crate) text: String,
    pub(crate) info: String,
    pub(crate) header: ByteSpan,
    pub(crate) body: ByteSpan,
    pub(crate) tail: ByteSpan,
    pub(crate) parsing_data: ParsingData,
    pub(crate) uncompressed_data: Option<ByteSpan>,
    pub(crate) fixed: bool,
    pub(crate) compressed: bool,
    pub(crate) marking: Marking,
    pub(crate) action: Action,
}

impl TreeItem {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        offset: u32,
        item_type: ItemType,
        subtype: u8,
        name: String,
        text: String,
        info: String,
        header: ByteSpan,
        body: ByteSpan,
        tail: ByteSpan,
        fixed: bool,
        parent: Option<ItemId>,
    ) -> Self {
        TreeItem {
            parent,
            children: Vec::new(),
            offset,
            item_type,
            subtype,
            name,
            text,
            info,
            header,
            body,
            tail,
            parsing_data: ParsingData::None,
            uncompressed_data: None,
            fixed,
            compressed: false,
            marking: Marking::None,
            action: Action::None,
        }
    }

    /// Size of the item's original span, header through tail.
    pub fn full_size(&self) -> usize {
        self.header.len() + self.body.len() + self.tail.len()
    }
}
