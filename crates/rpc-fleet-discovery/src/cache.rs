//! The on-disk partition cache (§6 external interface, bit-exact):
//!
//! ```text
//! u32  numTables
//! repeat numTables times:
//!     byte[32] tableAddress
//!     u32      serializedLength
//!     byte[serializedLength] tableData
//! ```
//!
//! little-endian throughout. The writer uses CREATE | WRITE | TRUNCATE_EXISTING
//! semantics; the reader tolerates a missing file by returning `Ok(None)`.

use crate::error::DiscoveryError;
use rpc_fleet_core::PublicKey;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

pub(crate) fn partition_file_path(directory: &Path, partition: u32) -> std::path::PathBuf {
    directory.join(format!("{partition}.dat"))
}

/// Writes `tables` (address, serialized bytes) to `path`, overwriting any
/// existing file in place.
pub(crate) fn write_partition_cache(
    path: &Path,
    tables: &[(PublicKey, Vec<u8>)],
) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    file.write_all(&(tables.len() as u32).to_le_bytes())?;
    for (address, data) in tables {
        file.write_all(&address.0)?;
        file.write_all(&(data.len() as u32).to_le_bytes())?;
        file.write_all(data)?;
    }
    Ok(())
}

/// Reads the cache file for `partition`, or `Ok(None)` if it does not exist.
///
/// A size mismatch between the recorded `serializedLength`s and the actual
/// file size is reported as [`DiscoveryError::Corruption`]; the caller
/// treats the partition as absent and refetches it.
pub(crate) fn read_partition_cache(
    path: &Path,
    partition: u32,
) -> Result<Option<Vec<(PublicKey, Vec<u8>)>>, DiscoveryError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let file_size = file.metadata()?.len();

    let mut num_tables_buf = [0u8; 4];
    file.read_exact(&mut num_tables_buf)
        .map_err(|_| DiscoveryError::Corruption { partition })?;
    let num_tables = u32::from_le_bytes(num_tables_buf);

    let mut tables = Vec::with_capacity(num_tables as usize);
    let mut total_serialized: u64 = 0;

    for _ in 0..num_tables {
        let mut address_buf = [0u8; 32];
        file.read_exact(&mut address_buf)
            .map_err(|_| DiscoveryError::Corruption { partition })?;

        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)
            .map_err(|_| DiscoveryError::Corruption { partition })?;
        let len = u32::from_le_bytes(len_buf);

        let mut data = vec![0u8; len as usize];
        file.read_exact(&mut data)
            .map_err(|_| DiscoveryError::Corruption { partition })?;

        total_serialized += len as u64;
        tables.push((PublicKey(address_buf), data));
    }

    let expected_size = 4 + 36 * num_tables as u64 + total_serialized;
    if expected_size != file_size {
        return Err(DiscoveryError::Corruption { partition });
    }

    Ok(Some(tables))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_partition() {
        let dir = tempfile::tempdir().unwrap();
        let path = partition_file_path(dir.path(), 3);
        let tables = vec![
            (PublicKey([1u8; 32]), vec![1, 2, 3]),
            (PublicKey([2u8; 32]), vec![]),
        ];

        write_partition_cache(&path, &tables).unwrap();
        let loaded = read_partition_cache(&path, 3).unwrap().unwrap();
        assert_eq!(loaded, tables);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = partition_file_path(dir.path(), 9);
        assert!(read_partition_cache(&path, 9).unwrap().is_none());
    }

    #[test]
    fn truncated_file_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = partition_file_path(dir.path(), 1);
        let tables = vec![(PublicKey([1u8; 32]), vec![1, 2, 3, 4, 5])];
        write_partition_cache(&path, &tables).unwrap();

        // Truncate the file so its recorded lengths no longer match its size.
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(10).unwrap();

        let err = read_partition_cache(&path, 1).unwrap_err();
        assert!(matches!(err, DiscoveryError::Corruption { partition: 1 }));
    }
}
