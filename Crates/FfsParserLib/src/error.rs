use thiserror::Error;

/// Flat error taxonomy shared by every parser operation.
///
/// Only structural failures at the very top of the image (capsule or
/// descriptor headers that cannot be trusted at all) reach the caller of
/// `parse()`; everything below that level is reported through the message
/// list and parsing continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("invalid capsule")]
    InvalidCapsule,
    #[error("invalid flash descriptor")]
    InvalidFlashDescriptor,
    #[error("invalid region")]
    InvalidRegion,
    #[error("empty region")]
    EmptyRegion,
    #[error("invalid volume")]
    InvalidVolume,
    #[error("invalid file")]
    InvalidFile,
    #[error("invalid section")]
    InvalidSection,
    #[error("invalid ME partition table")]
    InvalidMePartitionTable,
    #[error("invalid microcode")]
    InvalidMicrocode,
    #[error("truncated image")]
    TruncatedImage,
    #[error("item not found")]
    ItemNotFound,
    #[error("volumes not found")]
    VolumesNotFound,
    #[error("stores not found")]
    StoresNotFound,
    #[error("unknown item type")]
    UnknownItemType,
    #[error("DEPEX parsing failed")]
    DepexParseFailed,
    #[error("invalid raw area")]
    InvalidRawArea,
    #[error("decompression failed")]
    DecompressionFailed,
    #[error("invalid store")]
    InvalidStore,
}
