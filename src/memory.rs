use crate::{
    constants::{MEMORY_EXPANSION_QUOTIENT, WORD_SIZE_IN_BYTES_USIZE},
    errors::{ExceptionalHalt, InternalError, VMError},
};
use bytes::Bytes;
use ethereum_types::U256;
use ExceptionalHalt::{MemoryOffsetOverflow, OutOfGas};

/// Byte-addressed, word-aligned scratchpad owned by a single call frame.
///
/// Every access with a non-zero size first expands the buffer to a multiple
/// of 32 bytes covering the access, zero-filling the new range. The length
/// never shrinks while the frame is alive.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    buffer: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Current size in bytes. Always a multiple of 32.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Expands the buffer so it covers `new_memory_size` bytes, rounded up to
    /// the next word boundary. Shrinking is never performed.
    #[inline]
    pub fn resize(&mut self, new_memory_size: usize) -> Result<(), VMError> {
        if new_memory_size == 0 || new_memory_size <= self.buffer.len() {
            return Ok(());
        }

        let new_size = new_memory_size
            .checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(MemoryOffsetOverflow)?;
        self.buffer.resize(new_size, 0);

        Ok(())
    }

    /// Reads `size` bytes starting at `offset`, expanding the buffer first.
    pub fn load_range(&mut self, offset: usize, size: usize) -> Result<Bytes, VMError> {
        if size == 0 {
            return Ok(Bytes::new());
        }

        let end = offset.checked_add(size).ok_or(MemoryOffsetOverflow)?;
        self.resize(end)?;

        Ok(Bytes::copy_from_slice(
            self.buffer
                .get(offset..end)
                .ok_or(ExceptionalHalt::OutOfBounds)?,
        ))
    }

    /// Reads a 32-byte big-endian word at `offset`.
    pub fn load_word(&mut self, offset: usize) -> Result<U256, VMError> {
        let end = offset
            .checked_add(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(MemoryOffsetOverflow)?;
        self.resize(end)?;

        Ok(U256::from_big_endian(
            self.buffer
                .get(offset..end)
                .ok_or(ExceptionalHalt::OutOfBounds)?,
        ))
    }

    /// Writes `data` at `offset`, expanding the buffer first.
    pub fn store_data(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset
            .checked_add(data.len())
            .ok_or(MemoryOffsetOverflow)?;
        self.resize(end)?;

        self.buffer
            .get_mut(offset..end)
            .ok_or(ExceptionalHalt::OutOfBounds)?
            .copy_from_slice(data);

        Ok(())
    }

    /// Writes a word as 32 big-endian bytes at `offset`.
    pub fn store_word(&mut self, offset: usize, word: U256) -> Result<(), VMError> {
        self.store_data(offset, &word.to_big_endian())
    }

    /// Zero-fills `size` bytes starting at `offset`.
    pub fn store_zeros(&mut self, offset: usize, size: usize) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }

        let end = offset.checked_add(size).ok_or(MemoryOffsetOverflow)?;
        self.resize(end)?;

        self.buffer
            .get_mut(offset..end)
            .ok_or(ExceptionalHalt::OutOfBounds)?
            .fill(0);

        Ok(())
    }

    /// Copies `size` bytes from `from_offset` to `to_offset` within the same
    /// buffer, with overlapping ranges allowed.
    pub fn copy_within(
        &mut self,
        from_offset: usize,
        to_offset: usize,
        size: usize,
    ) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }

        let end = from_offset
            .max(to_offset)
            .checked_add(size)
            .ok_or(MemoryOffsetOverflow)?;
        self.resize(end)?;

        let from_end = from_offset
            .checked_add(size)
            .ok_or(InternalError::Overflow)?;
        if from_end > self.buffer.len() {
            return Err(ExceptionalHalt::OutOfBounds.into());
        }
        self.buffer.copy_within(from_offset..from_end, to_offset);

        Ok(())
    }
}

/// When a memory expansion is triggered, only the additional bytes of memory
/// must be paid for.
pub fn expansion_cost(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    let cost = if new_memory_size <= current_memory_size {
        0
    } else {
        cost(new_memory_size)?
            .checked_sub(cost(current_memory_size)?)
            .ok_or(InternalError::Underflow)?
    };
    Ok(cost)
}

/// The total cost for a given memory size: `3·w + w²/512` for `w` words.
fn cost(memory_size: usize) -> Result<u64, VMError> {
    let memory_size_word = memory_size
        .checked_add(WORD_SIZE_IN_BYTES_USIZE - 1)
        .ok_or(OutOfGas)?
        / WORD_SIZE_IN_BYTES_USIZE;

    let gas_cost = (memory_size_word.checked_pow(2).ok_or(OutOfGas)? / MEMORY_EXPANSION_QUOTIENT)
        .checked_add(3usize.checked_mul(memory_size_word).ok_or(OutOfGas)?)
        .ok_or(OutOfGas)?;

    gas_cost.try_into().map_err(|_| MemoryOffsetOverflow.into())
}

/// The word-aligned size memory must reach to cover `(offset, size)`.
/// Zero-sized accesses never expand, whatever the offset.
pub fn calculate_memory_size(offset: usize, size: usize) -> Result<usize, VMError> {
    if size == 0 {
        return Ok(0);
    }

    offset
        .checked_add(size)
        .and_then(|sum| sum.checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE))
        .ok_or(MemoryOffsetOverflow.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_after_write_round_trip() {
        let mut memory = Memory::new();
        memory.store_data(5, b"hello").unwrap();
        assert_eq!(&memory.load_range(5, 5).unwrap()[..], b"hello");
    }

    #[test]
    fn expansion_is_word_aligned_and_zero_filled() {
        let mut memory = Memory::new();
        memory.store_data(0, &[0xff]).unwrap();
        assert_eq!(memory.len(), 32);
        assert_eq!(&memory.load_range(1, 31).unwrap()[..], &[0u8; 31][..]);
    }

    #[test]
    fn zero_sized_access_never_expands() {
        let mut memory = Memory::new();
        memory.load_range(usize::MAX, 0).unwrap();
        memory.store_data(usize::MAX, &[]).unwrap();
        assert_eq!(memory.len(), 0);
    }

    #[test]
    fn memory_length_never_decreases() {
        let mut memory = Memory::new();
        memory.store_word(64, U256::from(1)).unwrap();
        assert_eq!(memory.len(), 96);
        memory.load_word(0).unwrap();
        assert_eq!(memory.len(), 96);
    }

    #[test]
    fn word_round_trip_is_big_endian() {
        let mut memory = Memory::new();
        memory.store_word(0, U256::from(0xff)).unwrap();
        assert_eq!(memory.load_word(0).unwrap(), U256::from(0xff));
        assert_eq!(memory.load_range(31, 1).unwrap()[0], 0xff);
        assert_eq!(memory.load_range(0, 1).unwrap()[0], 0x00);
    }

    #[test]
    fn expansion_cost_charges_the_difference() {
        // One word costs 3, two words cost 6 (quadratic term still zero).
        assert_eq!(expansion_cost(32, 0).unwrap(), 3);
        assert_eq!(expansion_cost(64, 32).unwrap(), 3);
        assert_eq!(expansion_cost(32, 32).unwrap(), 0);
    }

    #[test]
    fn copy_within_handles_overlap() {
        let mut memory = Memory::new();
        memory.store_data(0, &[1, 2, 3, 4]).unwrap();
        memory.copy_within(0, 2, 4).unwrap();
        assert_eq!(&memory.load_range(0, 6).unwrap()[..], &[1, 2, 1, 2, 3, 4]);
    }
}
