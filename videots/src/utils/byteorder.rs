//! Big-endian serialisation helpers for building disc image fixtures.

use crate::utils::sector::SECTOR_SIZE;

pub trait WriteBytesBe {
    fn write_be(&self, dst: &mut Vec<u8>);
}

macro_rules! impl_num_be {
    ($($t:ty),+) => { $(
        impl WriteBytesBe for $t { #[inline] fn write_be(&self, dst: &mut Vec<u8>) { dst.extend_from_slice(&self.to_be_bytes()); }}
    )+ }
}

impl_num_be!(u8, u16, u32, u64);

impl<T: WriteBytesBe> WriteBytesBe for Vec<T> {
    #[inline]
    fn write_be(&self, dst: &mut Vec<u8>) {
        self.iter().for_each(|item| item.write_be(dst));
    }
}

impl<T: WriteBytesBe, const N: usize> WriteBytesBe for [T; N] {
    #[inline]
    fn write_be(&self, dst: &mut Vec<u8>) {
        self.iter().for_each(|item| item.write_be(dst));
    }
}

impl WriteBytesBe for &[u8] {
    #[inline]
    fn write_be(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(self);
    }
}

macro_rules! join_bytes_be {
    ( $($value:expr),+ $(,)? ) => {{
        #[allow(unused_imports)]
        use $crate::utils::byteorder::WriteBytesBe;
        let mut vec = Vec::<u8>::new();
        $( $value.write_be(&mut vec); )+
        vec
    }};
}

pub(crate) use join_bytes_be;

/// Growable disc image with absolute-offset patching.
#[derive(Debug, Default)]
pub struct ImageBuilder {
    data: Vec<u8>,
}

impl ImageBuilder {
    pub fn new(sectors: usize) -> Self {
        Self {
            data: vec![0; sectors * SECTOR_SIZE],
        }
    }

    /// Copies `bytes` to absolute byte offset `pos`, growing the image by
    /// whole sectors when needed.
    pub fn put(&mut self, pos: usize, bytes: &[u8]) -> &mut Self {
        let end = pos + bytes.len();
        if end > self.data.len() {
            let sectors = end.div_ceil(SECTOR_SIZE);
            self.data.resize(sectors * SECTOR_SIZE, 0);
        }
        self.data[pos..end].copy_from_slice(bytes);
        self
    }

    pub fn put_sector(&mut self, sector: usize, offset: usize, bytes: &[u8]) -> &mut Self {
        self.put(sector * SECTOR_SIZE + offset, bytes)
    }

    pub fn build(&self) -> Vec<u8> {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_mixed_widths() {
        let bytes = join_bytes_be!(0x12u8, 0x3456u16, 0x789A_BCDEu32, [0u8; 2], b"ID".as_slice());
        assert_eq!(
            bytes,
            [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0, 0, b'I', b'D']
        );
    }

    #[test]
    fn builder_grows_by_sectors() {
        let mut image = ImageBuilder::new(1);
        image.put_sector(2, 4, &[1, 2]);
        let data = image.build();
        assert_eq!(data.len(), 3 * SECTOR_SIZE);
        assert_eq!(&data[2 * SECTOR_SIZE + 4..][..2], &[1, 2]);
    }
}
