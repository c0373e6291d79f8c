//! Parser for UEFI firmware images.
//!
//! Feeding [`FfsParser::parse`] a raw SPI image (or capsule) produces a
//! typed tree of its capsules, Intel flash regions, firmware volumes, FFS
//! files and sections, NVRAM stores and ME partitions, together with an
//! ordered list of diagnostics. A second pass anchored at the Volume Top
//! File computes physical addresses, decodes the Firmware Interface Table
//! and verifies Boot Guard and vendor protected ranges.
//!
//! The parser only reads: it never modifies, rebuilds or re-signs an image,
//! and it performs hash comparisons only, no signature verification.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

pub mod basetypes;
pub mod compression;
pub mod descriptor;
pub mod error;
pub mod ffs;
pub mod gbe;
pub mod intel_fit;
pub mod intel_microcode;
pub mod me;
pub mod nvram;
pub mod peimage;
pub mod utility;

mod ffsparser;
mod fitparser;
mod meparser;
mod nvramparser;

pub use error::ParseError;
pub use ffsparser::{
    FfsParser, FitTableRow, Message, ProtectedRange, PROTECTED_RANGE_INTEL_BOOT_GUARD_IBB,
    PROTECTED_RANGE_INTEL_BOOT_GUARD_OBB, PROTECTED_RANGE_INTEL_BOOT_GUARD_POST_IBB,
    PROTECTED_RANGE_VENDOR_HASH_AMI_V1, PROTECTED_RANGE_VENDOR_HASH_AMI_V2,
    PROTECTED_RANGE_VENDOR_HASH_AMI_V3, PROTECTED_RANGE_VENDOR_HASH_MICROSOFT_PMDA,
    PROTECTED_RANGE_VENDOR_HASH_PHOENIX,
};
