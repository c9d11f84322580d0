//! Bounds-checked guest linear memory helpers.
//!
//! Pointers and lengths arrive as the widened `i64` locals an extension sees.
//! Negative values and ranges past the end of memory return `BadPointer`.

use crate::error::HostError;

fn checked_range(mem_len: usize, ptr: i64, len: i64) -> Result<std::ops::Range<usize>, HostError> {
    let start = usize::try_from(ptr).map_err(|_| HostError::BadPointer)?;
    let len = usize::try_from(len).map_err(|_| HostError::BadPointer)?;
    let end = start.checked_add(len).ok_or(HostError::BadPointer)?;
    if end > mem_len {
        return Err(HostError::BadPointer);
    }
    Ok(start..end)
}

/// Read `len` bytes from guest memory at `ptr`.
pub fn read_bytes(mem: &[u8], ptr: i64, len: i64) -> Result<Vec<u8>, HostError> {
    let range = checked_range(mem.len(), ptr, len)?;
    Ok(mem[range].to_vec())
}

/// Write `data` to guest memory at `ptr`.
pub fn write_bytes(mem: &mut [u8], ptr: i64, data: &[u8]) -> Result<(), HostError> {
    let len = i64::try_from(data.len()).map_err(|_| HostError::BadPointer)?;
    let range = checked_range(mem.len(), ptr, len)?;
    mem[range].copy_from_slice(data);
    Ok(())
}

/// Read a little-endian i32 from guest memory at `ptr`.
pub fn read_i32(mem: &[u8], ptr: i64) -> Result<i32, HostError> {
    let range = checked_range(mem.len(), ptr, 4)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&mem[range]);
    Ok(i32::from_le_bytes(buf))
}

/// Read a little-endian i64 from guest memory at `ptr`.
pub fn read_i64(mem: &[u8], ptr: i64) -> Result<i64, HostError> {
    let range = checked_range(mem.len(), ptr, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&mem[range]);
    Ok(i64::from_le_bytes(buf))
}

/// Write a little-endian i32 to guest memory at `ptr`.
pub fn write_i32(mem: &mut [u8], ptr: i64, value: i32) -> Result<(), HostError> {
    write_bytes(mem, ptr, &value.to_le_bytes())
}

/// Write a little-endian i64 to guest memory at `ptr`.
pub fn write_i64(mem: &mut [u8], ptr: i64, value: i64) -> Result<(), HostError> {
    write_bytes(mem, ptr, &value.to_le_bytes())
}
