//! Small building blocks shared by every on-disk structure: the mixed-endian
//! GUID wrapper, 24-bit sizes, and the additive checksums used throughout
//! UEFI structures.

use core::fmt;
use scroll::ctx::TryFromCtx;
use scroll::{Endian, Pread};
use uuid::Uuid;

/// On-disk GUID: first three fields little-endian, rest big-endian.
/// Scroll-readable so it can sit inside `#[derive(Pread)]` headers.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pread)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    pub const ZERO: Guid = Guid([0u8; 16]);

    pub fn to_uuid(self) -> Uuid {
        Uuid::from_bytes_le(self.0)
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Guid(uuid.to_bytes_le())
    }

    pub fn is_zero(self) -> bool {
        self.0 == [0u8; 16]
    }
}

impl PartialEq<Uuid> for Guid {
    fn eq(&self, other: &Uuid) -> bool {
        self.to_uuid() == *other
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buffer = Uuid::encode_buffer();
        write!(f, "{}", self.to_uuid().hyphenated().encode_upper(&mut buffer))
    }
}

/// Uppercase hyphenated rendering used in every info line.
pub fn uuid_to_string(uuid: Uuid) -> String {
    let mut buffer = Uuid::encode_buffer();
    uuid.hyphenated().encode_upper(&mut buffer).to_string()
}

/// 24-bit little-endian size field.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pread)]
pub struct Uint24(pub [u8; 3]);

impl Uint24 {
    pub fn value(self) -> u32 {
        self.0[0] as u32 | (self.0[1] as u32) << 8 | (self.0[2] as u32) << 16
    }
}

/// Read a `Pread` structure from the start of `data`, little-endian.
pub fn read_le<'a, T>(data: &'a [u8]) -> Option<T>
where
    T: TryFromCtx<'a, Endian, Error = scroll::Error>,
{
    data.pread_with::<T>(0, scroll::LE).ok()
}

/// Read a `Pread` structure at `offset`, little-endian.
pub fn read_le_at<'a, T>(data: &'a [u8], offset: usize) -> Option<T>
where
    T: TryFromCtx<'a, Endian, Error = scroll::Error>,
{
    data.pread_with::<T>(offset, scroll::LE).ok()
}

/// Additive 8-bit checksum: value that makes the byte sum come out to zero.
pub fn calculate_checksum8(data: &[u8]) -> u8 {
    0u8.wrapping_sub(data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)))
}

/// Plain 8-bit byte sum.
pub fn calculate_sum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Additive 16-bit checksum over little-endian words: value that makes the
/// word sum come out to zero. Trailing odd byte, if any, is ignored.
pub fn calculate_checksum16(data: &[u8]) -> u16 {
    let sum = data
        .chunks_exact(2)
        .fold(0u16, |sum, w| sum.wrapping_add(u16::from_le_bytes([w[0], w[1]])));
    0u16.wrapping_sub(sum)
}

/// Additive 32-bit checksum over little-endian dwords: value that makes the
/// dword sum come out to zero. Trailing bytes are ignored.
pub fn calculate_checksum32(data: &[u8]) -> u32 {
    let sum = data
        .chunks_exact(4)
        .fold(0u32, |sum, w| sum.wrapping_add(u32::from_le_bytes([w[0], w[1], w[2], w[3]])));
    0u32.wrapping_sub(sum)
}

pub const fn align8(value: usize) -> usize {
    (value + 7) & !7
}

pub const fn align4(value: usize) -> usize {
    (value + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::uuid;

    #[test]
    fn guid_round_trips_mixed_endianness() {
        // 8C8CE578-8A3D-4F1C-9935-896185C32DD3 on disk, LE first three fields
        let on_disk: [u8; 16] = [
            0x78, 0xE5, 0x8C, 0x8C, 0x3D, 0x8A, 0x1C, 0x4F, 0x99, 0x35, 0x89, 0x61, 0x85, 0xC3,
            0x2D, 0xD3,
        ];
        let guid = Guid(on_disk);
        assert_eq!(guid.to_uuid(), uuid!("8c8ce578-8a3d-4f1c-9935-896185c32dd3"));
        assert_eq!(guid.to_string(), "8C8CE578-8A3D-4F1C-9935-896185C32DD3");
        assert_eq!(Guid::from_uuid(guid.to_uuid()), guid);
    }

    #[test]
    fn checksums() {
        assert_eq!(calculate_checksum8(&[1, 2, 3]), 0u8.wrapping_sub(6));
        let data = [0x34u8, 0x12, 0x78, 0x56];
        let checksum = calculate_checksum16(&data);
        let total = 0x1234u16.wrapping_add(0x5678).wrapping_add(checksum);
        assert_eq!(total, 0);
        let checksum32 = calculate_checksum32(&data);
        assert_eq!(0x5678_1234u32.wrapping_add(checksum32), 0);
    }

    #[test]
    fn uint24() {
        assert_eq!(Uint24([0x56, 0x34, 0x12]).value(), 0x123456);
    }
}
