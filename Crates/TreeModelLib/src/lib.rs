//! In-memory model of a parsed firmware image.
//!
//! The parser produces an ordered tree of items, each one covering a span of
//! the original image bytes (or of a decompressed payload). This crate holds
//! the tree itself and the supporting value types; it knows nothing about any
//! particular on-disk format.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

mod item;
mod model;
mod span;
mod types;

pub use item::TreeItem;
pub use model::{InsertMode, ItemId, ModelError, TreeModel};
pub use span::ByteSpan;
pub use types::{
    capsule_subtype, image_subtype, padding_subtype, region_subtype, volume_subtype,
    evsa_entry_subtype, flash_map_entry_subtype, fsys_entry_subtype, nvar_entry_subtype,
    vss_entry_subtype, fpt_entry_subtype, fpt_partition_subtype, ifwi_partition_subtype,
    cpd_partition_subtype, microcode_subtype, startup_ap_data_subtype,
    Action, CompressedSectionParsingData, FileParsingData, FreeformSectionParsingData,
    GuidedSectionParsingData, ItemType, Marking, NvarEntryParsingData, ParsingData,
    TeSectionParsingData, VolumeParsingData, TE_BASE_ADJUSTED, TE_BASE_ORIGINAL, TE_BASE_OTHER,
};
