use alloy_primitives::{Address, B256};

use super::DecodeError;

/// Big-endian cursor over an input buffer. Every read either consumes the
/// exact field width or fails without panicking.
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len()
    }

    fn take(&mut self, needed: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        if needed > self.data.len() {
            return Err(DecodeError::Truncated {
                field,
                needed,
                remaining: self.data.len(),
            });
        }

        let (head, tail) = self.data.split_at(needed);
        self.data = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(1, field)?[0])
    }

    pub(crate) fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        self.array(field).map(u32::from_be_bytes)
    }

    pub(crate) fn u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        self.array(field).map(u64::from_be_bytes)
    }

    pub(crate) fn bool(&mut self, field: &'static str) -> Result<bool, DecodeError> {
        Ok(self.u8(field)? != 0)
    }

    pub(crate) fn b256(&mut self, field: &'static str) -> Result<B256, DecodeError> {
        self.array::<32>(field).map(B256::from)
    }

    pub(crate) fn address(&mut self, field: &'static str) -> Result<Address, DecodeError> {
        self.array::<20>(field).map(Address::from)
    }

    pub(crate) fn selector(&mut self, field: &'static str) -> Result<[u8; 4], DecodeError> {
        self.array(field)
    }

    /// Reads a u32 element count and checks that `count * min_size` bytes
    /// can still follow.
    pub(crate) fn count(
        &mut self,
        field: &'static str,
        min_size: usize,
    ) -> Result<usize, DecodeError> {
        let count = self.u32(field)? as usize;
        let declared = count as u64 * min_size as u64;

        if declared > self.data.len() as u64 {
            return Err(DecodeError::InvalidLength {
                field,
                declared,
                remaining: self.data.len(),
            });
        }

        Ok(count)
    }

    /// Reads a u32 byte length followed by that many bytes
    pub(crate) fn length_prefixed(&mut self, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let len = self.u32(field)? as usize;

        if len > self.data.len() {
            return Err(DecodeError::InvalidLength {
                field,
                declared: len as u64,
                remaining: self.data.len(),
            });
        }

        self.take(len, field)
    }

    /// Fails if any input is left over
    pub(crate) fn finish(self, record: &'static str) -> Result<(), DecodeError> {
        match self.data.len() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n, record)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Reader;
    use crate::codec::DecodeError;

    #[test]
    fn test_reads_big_endian() {
        let data = [0, 0, 1, 2, 0, 0, 0, 0, 0, 0, 0, 9, 7];
        let mut reader = Reader::new(&data);

        assert_eq!(reader.u32("a").unwrap(), 258);
        assert_eq!(reader.u64("b").unwrap(), 9);
        assert_eq!(reader.u8("c").unwrap(), 7);
        reader.finish("test").unwrap();
    }

    #[test]
    fn test_truncated_field() {
        let mut reader = Reader::new(&[1, 2, 3]);
        assert_eq!(
            reader.u64("height"),
            Err(DecodeError::Truncated {
                field: "height",
                needed: 8,
                remaining: 3
            })
        );
    }

    #[test]
    fn test_length_prefix_exceeds_buffer() {
        let mut reader = Reader::new(&[0, 0, 0, 5, 1, 2]);
        assert_eq!(
            reader.length_prefixed("chunk"),
            Err(DecodeError::InvalidLength {
                field: "chunk",
                declared: 5,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_count_bounded_by_element_size() {
        let mut data = vec![0, 0, 0, 2];
        data.extend_from_slice(&[0; 40]);

        let mut reader = Reader::new(&data);
        assert!(matches!(
            reader.count("nullifiers", 32),
            Err(DecodeError::InvalidLength { declared: 64, .. })
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let reader = Reader::new(&[0, 1]);
        assert_eq!(reader.finish("block"), Err(DecodeError::TrailingBytes(2, "block")));
    }
}
