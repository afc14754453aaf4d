//! Fixed-width primitive encoders and decoders.
//!
//! Integers are big-endian so encoded keys sort in field order. Strings are
//! a `u32` byte length followed by UTF-8 bytes. Node ids are their raw
//! 16 bytes.

use canopy_types::NodeId;

use crate::error::{CodecError, CodecResult};

/// Storage format version written in front of every persisted value.
pub const FORMAT_VERSION: u8 = 1;

/// Append-only byte buffer with typed writers.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// A writer whose first byte is the storage format version tag.
    pub fn versioned() -> Self {
        let mut w = Self::new();
        w.put_u8(FORMAT_VERSION);
        w
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_bits().to_be_bytes());
    }

    pub fn put_node_id(&mut self, id: &NodeId) {
        self.buf.extend_from_slice(id.as_bytes());
    }

    /// Write a length or element count as a `u32`.
    pub fn put_len(&mut self, len: usize) -> CodecResult<()> {
        let len = u32::try_from(len).map_err(|_| CodecError::LengthOverflow { len })?;
        self.put_u32(len);
        Ok(())
    }

    pub fn put_str(&mut self, value: &str) -> CodecResult<()> {
        self.put_len(value.len())?;
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    pub fn put_bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over encoded bytes with bounds-checked typed readers.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Start reading a persisted value: checks and consumes the format tag.
    pub fn versioned(data: &'a [u8]) -> CodecResult<Self> {
        let mut r = Self::new(data);
        let found = r.get_u8()?;
        if found != FORMAT_VERSION {
            return Err(CodecError::UnsupportedFormatVersion {
                found,
                supported: FORMAT_VERSION,
            });
        }
        Ok(r)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, needed: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < needed {
            return Err(CodecError::UnexpectedEof {
                position: self.pos,
                needed,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N)?);
        Ok(arr)
    }

    pub fn get_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u32(&mut self) -> CodecResult<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn get_i64(&mut self) -> CodecResult<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn get_f64(&mut self) -> CodecResult<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(self.take_array()?)))
    }

    pub fn get_node_id(&mut self) -> CodecResult<NodeId> {
        Ok(NodeId::from_bytes(self.take_array()?))
    }

    pub fn get_string(&mut self) -> CodecResult<String> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::InvalidUtf8(e.to_string()))
    }

    /// All bytes not yet consumed.
    pub fn get_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// Read a declared element count and check that the input can hold that
    /// many elements of at least `min_element_size` bytes, so corrupted
    /// counts never trigger huge allocations.
    pub fn get_count(&mut self, min_element_size: usize) -> CodecResult<usize> {
        let count = self.get_u32()? as usize;
        let needed = count.saturating_mul(min_element_size);
        if needed > self.remaining() {
            return Err(CodecError::UnexpectedEof {
                position: self.pos,
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(count)
    }

    /// Fail if any bytes remain.
    pub fn finish(self) -> CodecResult<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_roundtrip() {
        let id = NodeId::generate();
        let mut w = ByteWriter::new();
        w.put_u8(7);
        w.put_u32(0xdead_beef);
        w.put_i64(-42);
        w.put_f64(1.25);
        w.put_node_id(&id);
        w.put_str("héllo").unwrap();
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.get_u8().unwrap(), 7);
        assert_eq!(r.get_u32().unwrap(), 0xdead_beef);
        assert_eq!(r.get_i64().unwrap(), -42);
        assert_eq!(r.get_f64().unwrap(), 1.25);
        assert_eq!(r.get_node_id().unwrap(), id);
        assert_eq!(r.get_string().unwrap(), "héllo");
        r.finish().unwrap();
    }

    #[test]
    fn integers_are_big_endian() {
        let mut w = ByteWriter::new();
        w.put_u32(1);
        assert_eq!(w.into_bytes(), vec![0, 0, 0, 1]);
    }

    #[test]
    fn lengths_must_fit_u32() {
        let mut w = ByteWriter::new();
        w.put_len(u32::MAX as usize).unwrap();
        assert_eq!(w.len(), 4);

        #[cfg(target_pointer_width = "64")]
        {
            let err = w.put_len(u32::MAX as usize + 1).unwrap_err();
            assert!(matches!(err, CodecError::LengthOverflow { len } if len == 1 << 32));
            assert_eq!(w.len(), 4);
        }
    }

    #[test]
    fn read_past_end_fails() {
        let mut r = ByteReader::new(&[0, 0]);
        let err = r.get_u32().unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnexpectedEof { position: 0, needed: 4, remaining: 2 }
        ));
    }

    #[test]
    fn string_length_past_end_fails() {
        let mut w = ByteWriter::new();
        w.put_u32(100);
        w.put_bytes(b"short");
        let bytes = w.into_bytes();
        assert!(ByteReader::new(&bytes).get_string().is_err());
    }

    #[test]
    fn invalid_utf8_fails() {
        let mut w = ByteWriter::new();
        w.put_u32(2);
        w.put_bytes(&[0xff, 0xfe]);
        let bytes = w.into_bytes();
        let err = ByteReader::new(&bytes).get_string().unwrap_err();
        assert!(matches!(err, CodecError::InvalidUtf8(_)));
    }

    #[test]
    fn count_guard_rejects_oversized_counts() {
        let mut w = ByteWriter::new();
        w.put_u32(u32::MAX);
        let bytes = w.into_bytes();
        assert!(ByteReader::new(&bytes).get_count(8).is_err());
    }

    #[test]
    fn version_tag_checked() {
        let w = ByteWriter::versioned();
        let bytes = w.into_bytes();
        assert_eq!(bytes, vec![FORMAT_VERSION]);
        ByteReader::versioned(&bytes).unwrap().finish().unwrap();

        let err = ByteReader::versioned(&[9]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnsupportedFormatVersion { found: 9, supported: FORMAT_VERSION }
        ));
    }

    #[test]
    fn trailing_bytes_detected() {
        let r = ByteReader::new(&[1, 2, 3]);
        assert!(matches!(r.finish(), Err(CodecError::TrailingBytes(3))));
    }
}
