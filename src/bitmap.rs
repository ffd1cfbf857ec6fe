//! ISO 8583 presence bitmap.
//!
//! Bit position `p` (0-based) is bit `7 - p % 8` of byte `p / 8` (most significant bit
//! first) and stands for field id `p + 1`. Field 1 marks the secondary bitmap; this crate
//! always works with the full 128-bit (16-byte) window.

/// Size of the primary + secondary bitmap in bytes.
pub const BITMAP_BYTES: usize = 16;
/// Size of the bitmap when written as ASCII hex.
pub const HEX_BITMAP_BYTES: usize = BITMAP_BYTES * 2;

const BITS: usize = BITMAP_BYTES * 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bitmap {
    bits: u128,
}

impl Bitmap {
    pub fn new() -> Self {
        Bitmap::default()
    }

    /// Decode a bitmap from network-order bytes. Bytes past the 16th are ignored and a
    /// shorter input leaves the remaining positions clear.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut window = [0u8; BITMAP_BYTES];
        let n = bytes.len().min(BITMAP_BYTES);
        window[..n].copy_from_slice(&bytes[..n]);
        Bitmap { bits: u128::from_be_bytes(window) }
    }

    /// Encode as `length_bytes` bytes, zero-padded past the 16-byte window.
    pub fn to_bytes(&self, length_bytes: usize) -> Vec<u8> {
        let window = self.bits.to_be_bytes();
        let mut out = vec![0u8; length_bytes];
        let n = length_bytes.min(BITMAP_BYTES);
        out[..n].copy_from_slice(&window[..n]);
        out
    }

    /// Whether field `id` (1..=128) is present. Ids outside the window are never set.
    pub fn is_set(&self, id: usize) -> bool {
        match Self::mask(id) {
            Some(m) => self.bits & m != 0,
            None => false,
        }
    }

    pub fn set(&mut self, id: usize) {
        if let Some(m) = Self::mask(id) {
            self.bits |= m;
        }
    }

    pub fn clear(&mut self, id: usize) {
        if let Some(m) = Self::mask(id) {
            self.bits &= !m;
        }
    }

    /// Present field ids, ascending.
    pub fn fields(&self) -> impl Iterator<Item = usize> + '_ {
        (1..=BITS).filter(move |&id| self.is_set(id))
    }

    fn mask(id: usize) -> Option<u128> {
        if (1..=BITS).contains(&id) {
            Some(1u128 << (BITS - id))
        } else {
            None
        }
    }
}

pub fn bytes_to_bitmap(bytes: &[u8]) -> Bitmap {
    Bitmap::from_bytes(bytes)
}

pub fn bitmap_to_bytes(bitmap: &Bitmap, length_bytes: usize) -> Vec<u8> {
    bitmap.to_bytes(length_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msb_first_bit_order() {
        let mut b = Bitmap::new();
        b.set(1);
        b.set(2);
        b.set(128);
        let bytes = b.to_bytes(BITMAP_BYTES);
        assert_eq!(bytes[0], 0b1100_0000);
        assert_eq!(bytes[15], 0b0000_0001);
        assert_eq!(bytes_to_bitmap(&bytes), b);
        assert_eq!(b.fields().collect::<Vec<_>>(), vec![1, 2, 128]);
    }

    #[test]
    fn field_nine_is_first_bit_of_second_byte() {
        let b = bytes_to_bitmap(&[0x00, 0x80]);
        assert!(b.is_set(9));
        assert!(!b.is_set(8));
        assert!(!b.is_set(0));
        assert!(!b.is_set(129));
    }

    #[test]
    fn to_bytes_pads_and_truncates() {
        let mut b = Bitmap::new();
        b.set(1);
        assert_eq!(bitmap_to_bytes(&b, 8), vec![0x80, 0, 0, 0, 0, 0, 0, 0]);
        let long = bitmap_to_bytes(&b, 20);
        assert_eq!(long.len(), 20);
        assert!(long[16..].iter().all(|&x| x == 0));
    }

    #[test]
    fn clear_removes_field() {
        let mut b = bytes_to_bitmap(&[0xFF; 16]);
        b.clear(64);
        assert!(!b.is_set(64));
        assert_eq!(b.fields().count(), 127);
    }
}
