use alloy_primitives::{Address, B256};

/// Big-endian output buffer mirroring [Reader](super::reader::Reader)
#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub(crate) fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(value as u8)
    }

    pub(crate) fn b256(&mut self, value: &B256) -> &mut Self {
        self.buf.extend_from_slice(value.as_slice());
        self
    }

    pub(crate) fn address(&mut self, value: &Address) -> &mut Self {
        self.buf.extend_from_slice(value.as_slice());
        self
    }

    pub(crate) fn raw(&mut self, value: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(value);
        self
    }

    /// Writes a collection length as the u32 prefix used on the wire.
    ///
    /// ## Panics
    ///
    /// Panics if `len` does not fit in a u32. No record can declare more than
    /// u32::MAX elements, so this is a caller bug.
    pub(crate) fn count(&mut self, len: usize) -> &mut Self {
        let len = u32::try_from(len).expect("collection longer than u32::MAX");
        self.u32(len)
    }

    pub(crate) fn length_prefixed(&mut self, value: &[u8]) -> &mut Self {
        self.count(value.len()).raw(value)
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
