use crate::item::TreeItem;
use crate::span::ByteSpan;
use crate::types::{Action, ItemType, Marking, ParsingData};

/// Stable handle to an item in a [`TreeModel`] arena. Valid for the lifetime
/// of the model; items are never removed or reordered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u32);

impl ItemId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InsertMode {
    Append,
    Prepend,
    Before,
    After,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ModelError {
    InvalidParameter,
}

/// Arena-backed ordered tree of image items.
///
/// The root item is created with the model and carries no bytes of its own.
/// All structural mutation happens through [`TreeModel::add_item`]; existing
/// items only ever gain information (info text, parsing data, markings).
pub struct TreeModel {
    items: Vec<TreeItem>,
    marking_enabled: bool,
}

impl Default for TreeModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeModel {
    pub fn new() -> Self {
        let root = TreeItem::new(
            0,
            ItemType::Root,
            0,
            String::new(),
            String::new(),
            String::new(),
            ByteSpan::empty(),
            ByteSpan::empty(),
            ByteSpan::empty(),
            true,
            None,
        );
        TreeModel { items: vec![root], marking_enabled: true }
    }

    pub fn root(&self) -> ItemId {
        ItemId(0)
    }

    pub fn marking_enabled(&self) -> bool {
        self.marking_enabled
    }

    pub fn set_marking_enabled(&mut self, enabled: bool) {
        self.marking_enabled = enabled;
    }

    fn item(&self, id: ItemId) -> &TreeItem {
        &self.items[id.index()]
    }

    fn item_mut(&mut self, id: ItemId) -> &mut TreeItem {
        &mut self.items[id.index()]
    }

    /// Create an item and link it into the tree.
    ///
    /// For `Append`/`Prepend` the new item becomes the last/first child of
    /// `parent`. For `Before`/`After`, `parent` names the sibling to insert
    /// around; it must itself have a parent or the call fails with
    /// [`ModelError::InvalidParameter`].
    #[allow(clippy::too_many_arguments)]
    pub fn add_item(
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
        mode: InsertMode,
    ) -> Result<ItemId, ModelError> {
        let (real_parent, position) = match mode {
            InsertMode::Append => (parent, self.item(parent).children.len()),
            InsertMode::Prepend => (parent, 0),
            InsertMode::Before | InsertMode::After => {
                let grandparent = self.item(parent).parent.ok_or(ModelError::InvalidParameter)?;
                let sibling_pos = self.items[grandparent.index()]
                    .children
                    .iter()
                    .position(|&c| c == parent)
                    .ok_or(ModelError::InvalidParameter)?;
                let pos = if mode == InsertMode::Before { sibling_pos } else { sibling_pos + 1 };
                (grandparent, pos)
            }
        };

        let id = ItemId(self.items.len() as u32);
        let mut item = TreeItem::new(
            offset,
            item_type,
            subtype,
            name.into(),
            text.into(),
            info.into(),
            header,
            body,
            tail,
            fixed,
            Some(real_parent),
        );
        // Items created under a compressed ancestor are compressed themselves.
        item.compressed = self.item(real_parent).compressed;
        self.items.push(item);
        self.items[real_parent.index()].children.insert(position, id);

        // Non-trivial propagation logic requires the additional call.
        self.set_fixed(id, fixed);
        Ok(id)
    }

    // Accessors

    pub fn item_type(&self, id: ItemId) -> ItemType {
        self.item(id).item_type
    }

    pub fn subtype(&self, id: ItemId) -> u8 {
        self.item(id).subtype
    }

    pub fn offset(&self, id: ItemId) -> u32 {
        self.item(id).offset
    }

    /// Absolute position of the item within the image, computed by summing
    /// offsets up to the root. Beneath a compressed ancestor the value is an
    /// offset in decompressed space instead.
    pub fn base(&self, id: ItemId) -> u32 {
        let mut base = 0u32;
        let mut current = Some(id);
        while let Some(c) = current {
            let item = self.item(c);
            base = base.wrapping_add(item.offset);
            current = item.parent;
        }
        base
    }

    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.item(id).parent
    }

    pub fn children(&self, id: ItemId) -> &[ItemId] {
        &self.item(id).children
    }

    pub fn name(&self, id: ItemId) -> &str {
        &self.item(id).name
    }

    pub fn text(&self, id: ItemId) -> &str {
        &self.item(id).text
    }

    pub fn info(&self, id: ItemId) -> &str {
        &self.item(id).info
    }

    pub fn header(&self, id: ItemId) -> &ByteSpan {
        &self.item(id).header
    }

    pub fn body(&self, id: ItemId) -> &ByteSpan {
        &self.item(id).body
    }

    pub fn tail(&self, id: ItemId) -> &ByteSpan {
        &self.item(id).tail
    }

    /// Size of the item's original span, header through tail.
    pub fn full_size(&self, id: ItemId) -> usize {
        self.item(id).full_size()
    }

    pub fn parsing_data(&self, id: ItemId) -> &ParsingData {
        &self.item(id).parsing_data
    }

    pub fn uncompressed_data(&self, id: ItemId) -> Option<&ByteSpan> {
        self.item(id).uncompressed_data.as_ref()
    }

    pub fn fixed(&self, id: ItemId) -> bool {
        self.item(id).fixed
    }

    pub fn compressed(&self, id: ItemId) -> bool {
        self.item(id).compressed
    }

    pub fn marking(&self, id: ItemId) -> Marking {
        self.item(id).marking
    }

    pub fn action(&self, id: ItemId) -> Action {
        self.item(id).action
    }

    // Mutators

    pub fn set_name(&mut self, id: ItemId, name: impl Into<String>) {
        self.item_mut(id).name = name.into();
    }

    pub fn set_text(&mut self, id: ItemId, text: impl Into<String>) {
        self.item_mut(id).text = text.into();
    }

    pub fn set_info(&mut self, id: ItemId, info: impl Into<String>) {
        self.item_mut(id).info = info.into();
    }

    /// Append (or prepend, with `append == false`) to the item's info text.
    pub fn add_info(&mut self, id: ItemId, info: &str, append: bool) {
        let item = self.item_mut(id);
        if append {
            item.info.push_str(info);
        } else {
            item.info.insert_str(0, info);
        }
    }

    pub fn set_parsing_data(&mut self, id: ItemId, data: ParsingData) {
        self.item_mut(id).parsing_data = data;
    }

    pub fn set_uncompressed_data(&mut self, id: ItemId, data: ByteSpan) {
        self.item_mut(id).uncompressed_data = Some(data);
    }

    /// Set the non-relocatable flag. Setting it propagates to ancestors,
    /// except that an item just inside a compression boundary takes its
    /// parent's flag instead: compressed content moves with its container.
    pub fn set_fixed(&mut self, id: ItemId, fixed: bool) {
        self.item_mut(id).fixed = fixed;
        if !fixed {
            return;
        }
        let mut current = id;
        while let Some(parent) = self.item(current).parent {
            if self.item(current).compressed && !self.item(parent).compressed {
                let inherited = self.item(parent).fixed;
                self.item_mut(current).fixed = inherited;
                return;
            }
            self.item_mut(parent).fixed = true;
            current = parent;
        }
    }

    pub fn set_compressed(&mut self, id: ItemId, compressed: bool) {
        self.item_mut(id).compressed = compressed;
        if compressed {
            for child in self.item(id).children.clone() {
                self.set_compressed(child, true);
            }
        }
    }

    pub fn set_marking(&mut self, id: ItemId, marking: Marking) {
        if self.marking_enabled {
            self.item_mut(id).marking = marking;
        }
    }

    pub fn set_action(&mut self, id: ItemId, action: Action) {
        self.item_mut(id).action = action;
    }

    pub fn set_subtype(&mut self, id: ItemId, subtype: u8) {
        self.item_mut(id).subtype = subtype;
    }

    // Search

    /// Nearest ancestor of the given type, the item itself excluded.
    pub fn find_parent_of_type(&self, id: ItemId, item_type: ItemType) -> Option<ItemId> {
        let mut current = self.item(id).parent;
        while let Some(c) = current {
            if self.item(c).item_type == item_type {
                return Some(c);
            }
            current = self.item(c).parent;
        }
        None
    }

    /// Outermost ancestor of the given type, the item itself excluded.
    pub fn find_last_parent_of_type(&self, id: ItemId, item_type: ItemType) -> Option<ItemId> {
        let mut found = None;
        let mut current = self.item(id).parent;
        while let Some(c) = current {
            if self.item(c).item_type == item_type {
                found = Some(c);
            }
            current = self.item(c).parent;
        }
        found
    }

    /// Deepest item whose `[base, base + full_size)` span contains the given
    /// absolute base. Descends from the first top-level item; compressed
    /// content is skipped because base is only meaningful for items that
    /// occupy physical flash, with the compression container itself still
    /// eligible. Returns `None` when the base lands in no item at all.
    pub fn find_by_base(&self, base: u32) -> Option<ItemId> {
        let top = *self.item(self.root()).children.first()?;
        let mut current = top;
        loop {
            let mut descended = false;
            for &child in self.item(current).children.iter() {
                let child_compressed = self.item(child).compressed;
                let parent_compressed =
                    self.item(child).parent.map(|p| self.item(p).compressed).unwrap_or(false);
                if child_compressed && parent_compressed {
                    continue;
                }
                let child_base = self.base(child);
                let child_size = self.item(child).full_size() as u64;
                if (child_base as u64) <= (base as u64)
                    && (base as u64) < child_base as u64 + child_size
                {
                    current = child;
                    descended = true;
                    break;
                }
            }
            if !descended {
                return if current == top { None } else { Some(current) };
            }
        }
    }

    /// Depth-first pre-order walk over the whole tree.
    pub fn descendants(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            for &child in self.item(current).children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(len: usize, value: u8) -> ByteSpan {
        ByteSpan::from(vec![value; len])
    }

    fn add(
        model: &mut TreeModel,
        offset: u32,
        item_type: ItemType,
        parent: ItemId,
        header: usize,
        body: usize,
    ) -> ItemId {
        model
            .add_item(
                offset,
                item_type,
                0,
                "item",
                "",
                "",
                span(header, 0xAA),
                span(body, 0xBB),
                ByteSpan::empty(),
                false,
                parent,
                InsertMode::Append,
            )
            .unwrap()
    }

    #[test]
    fn base_is_sum_of_offsets() {
        let mut model = TreeModel::new();
        let root = model.root();
        let image = add(&mut model, 0, ItemType::Image, root, 0, 0x1000);
        let volume = add(&mut model, 0x100, ItemType::Volume, image, 0x48, 0x200);
        let file = add(&mut model, 0x48, ItemType::File, volume, 0x18, 0x40);
        assert_eq!(model.base(image), 0);
        assert_eq!(model.base(volume), 0x100);
        assert_eq!(model.base(file), 0x148);
    }

    #[test]
    fn insert_modes() {
        let mut model = TreeModel::new();
        let root = model.root();
        let image = add(&mut model, 0, ItemType::Image, root, 0, 0);
        let a = add(&mut model, 0, ItemType::Volume, image, 0, 0);
        let b = add(&mut model, 0x10, ItemType::Volume, image, 0, 0);
        let before = model
            .add_item(
                8,
                ItemType::Padding,
                0,
                "p",
                "",
                "",
                ByteSpan::empty(),
                span(8, 0xFF),
                ByteSpan::empty(),
                false,
                b,
                InsertMode::Before,
            )
            .unwrap();
        assert_eq!(model.children(image), &[a, before, b]);

        // Before/After need the reference item to have a parent.
        let err = model.add_item(
            0,
            ItemType::Padding,
            0,
            "p",
            "",
            "",
            ByteSpan::empty(),
            ByteSpan::empty(),
            ByteSpan::empty(),
            false,
            model.root(),
            InsertMode::After,
        );
        assert_eq!(err, Err(ModelError::InvalidParameter));
    }

    #[test]
    fn fixed_propagates_until_compression_boundary() {
        let mut model = TreeModel::new();
        let root = model.root();
        let image = add(&mut model, 0, ItemType::Image, root, 0, 0);
        let volume = add(&mut model, 0, ItemType::Volume, image, 0, 0);
        let section = add(&mut model, 0, ItemType::Section, volume, 0, 0);
        model.set_compressed(section, true);
        let inner = add(&mut model, 0, ItemType::File, section, 0, 0);
        assert!(model.compressed(inner));

        // Fixed content inside a compressed span moves with its container,
        // so the boundary item takes the container's flag instead.
        model.set_fixed(inner, true);
        assert!(model.fixed(inner));
        assert!(!model.fixed(section));
        assert!(!model.fixed(volume));

        model.set_fixed(volume, true);
        assert!(model.fixed(image));
    }

    #[test]
    fn find_by_base_returns_deepest_uncompressed() {
        let mut model = TreeModel::new();
        let root = model.root();
        let image = add(&mut model, 0, ItemType::Image, root, 0, 0x1000);
        let volume = add(&mut model, 0x100, ItemType::Volume, image, 0x48, 0xb8);
        let file = add(&mut model, 0x48, ItemType::File, volume, 0x18, 0x20);
        assert_eq!(model.find_by_base(0x150), Some(file));
        assert_eq!(model.find_by_base(0x100), Some(volume));
        // Nothing below the top-level item covers offset zero.
        assert_eq!(model.find_by_base(0x0), None);

        // A compressed item inside a compressed parent has no physical base.
        model.set_compressed(volume, true);
        assert!(model.compressed(file));
        assert_eq!(model.find_by_base(0x150), Some(volume));
    }

    #[test]
    fn find_parents() {
        let mut model = TreeModel::new();
        let root = model.root();
        let image = add(&mut model, 0, ItemType::Image, root, 0, 0);
        let outer = add(&mut model, 0, ItemType::Volume, image, 0, 0);
        let file = add(&mut model, 0, ItemType::File, outer, 0, 0);
        let section = add(&mut model, 0, ItemType::Section, file, 0, 0);
        let inner = add(&mut model, 0, ItemType::Volume, section, 0, 0);
        let inner_file = add(&mut model, 0, ItemType::File, inner, 0, 0);

        assert_eq!(model.find_parent_of_type(inner_file, ItemType::Volume), Some(inner));
        assert_eq!(model.find_last_parent_of_type(inner_file, ItemType::Volume), Some(outer));
        assert_eq!(model.find_parent_of_type(image, ItemType::Volume), None);
    }
}
