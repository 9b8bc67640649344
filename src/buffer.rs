//! Bounds-checked reads of fixed-size fields from a borrowed byte buffer.
//!
//! [`ByteView`] is an immutable window over bytes owned by the caller (a
//! file or network buffer) together with the byte order used for
//! multi-byte fields. It never copies the underlying data.

use crate::types::ByteOrder;
use crate::{MseedError, Result};

/// An immutable `(offset, length)` window over borrowed bytes.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> ByteView<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self { data, order }
    }

    /// A view of `len` bytes starting at `offset`, with the same byte order.
    pub fn window(&self, offset: usize, len: usize) -> Result<ByteView<'a>> {
        Ok(ByteView {
            data: self.bytes(offset, len)?,
            order: self.order,
        })
    }

    /// The same bytes read with another byte order.
    pub fn with_order(&self, order: ByteOrder) -> ByteView<'a> {
        ByteView {
            data: self.data,
            order,
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Borrow `len` bytes at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(MseedError::RecordTooShort {
                expected: offset.saturating_add(len),
                actual: self.data.len(),
            })?;
        Ok(&self.data[offset..end])
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(offset, N)?);
        Ok(out)
    }

    pub fn u8(&self, offset: usize) -> Result<u8> {
        Ok(self.array::<1>(offset)?[0])
    }

    pub fn u16(&self, offset: usize) -> Result<u16> {
        let b = self.array(offset)?;
        Ok(match self.order {
            ByteOrder::Big => u16::from_be_bytes(b),
            ByteOrder::Little => u16::from_le_bytes(b),
        })
    }

    pub fn i16(&self, offset: usize) -> Result<i16> {
        Ok(self.u16(offset)? as i16)
    }

    pub fn u32(&self, offset: usize) -> Result<u32> {
        let b = self.array(offset)?;
        Ok(match self.order {
            ByteOrder::Big => u32::from_be_bytes(b),
            ByteOrder::Little => u32::from_le_bytes(b),
        })
    }

    pub fn i32(&self, offset: usize) -> Result<i32> {
        Ok(self.u32(offset)? as i32)
    }

    pub fn f32(&self, offset: usize) -> Result<f32> {
        Ok(f32::from_bits(self.u32(offset)?))
    }

    pub fn f64(&self, offset: usize) -> Result<f64> {
        let b = self.array(offset)?;
        Ok(match self.order {
            ByteOrder::Big => f64::from_be_bytes(b),
            ByteOrder::Little => f64::from_le_bytes(b),
        })
    }

    /// Read a fixed-width ASCII field, trimming space and NUL padding.
    pub fn padded_str(&self, offset: usize, len: usize) -> Result<String> {
        let raw = self.bytes(offset, len)?;
        let text = std::str::from_utf8(raw).map_err(|_| {
            MseedError::InvalidHeader(format!("non-ASCII text at offset {offset}"))
        })?;
        Ok(text.trim_matches(|c| c == ' ' || c == '\0').to_string())
    }

    /// Read a UTF-8 string of exactly `len` bytes.
    pub fn utf8(&self, offset: usize, len: usize) -> Result<&'a str> {
        std::str::from_utf8(self.bytes(offset, len)?)
            .map_err(|_| MseedError::InvalidHeader(format!("invalid UTF-8 at offset {offset}")))
    }
}

/// Write `src` into `dest`, right-padding with spaces.
pub(crate) fn write_padded(dest: &mut [u8], src: &str) {
    let bytes = src.as_bytes();
    for (i, slot) in dest.iter_mut().enumerate() {
        *slot = bytes.get(i).copied().unwrap_or(b' ');
    }
}
