//! CRC-32C (Castagnoli) for miniSEED v3 record integrity.
//!
//! Reflected table-driven CRC over the polynomial `0x1EDC6F41`
//! (`0x82F63B78` reflected), initial value and final XOR `0xFFFFFFFF`.
//! The CRC field of a v3 record is treated as zero during computation.

/// Offset of the CRC field in a v3 fixed header.
pub const V3_CRC_OFFSET: usize = 28;

const CRC32C_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0x82F6_3B78;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
};

fn update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32C_TABLE[index];
    }
    crc
}

/// Compute CRC-32C (Castagnoli) over the given data.
pub fn crc32c(data: &[u8]) -> u32 {
    update(0xFFFF_FFFF, data) ^ 0xFFFF_FFFF
}

/// Compute the CRC of a v3 record as if its CRC field were zero.
///
/// The record is not modified; the four CRC bytes are substituted on the fly.
pub fn v3_record_crc(record: &[u8]) -> u32 {
    if record.len() < V3_CRC_OFFSET + 4 {
        return crc32c(record);
    }
    let crc = update(0xFFFF_FFFF, &record[..V3_CRC_OFFSET]);
    let crc = update(crc, &[0; 4]);
    update(crc, &record[V3_CRC_OFFSET + 4..]) ^ 0xFFFF_FFFF
}

/// Compute the CRC of a v3 record and write it into the CRC field.
pub fn compute_v3_crc(record: &mut [u8]) -> u32 {
    let crc = v3_record_crc(record);
    if record.len() >= V3_CRC_OFFSET + 4 {
        record[V3_CRC_OFFSET..V3_CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
    }
    crc
}

/// Outcome of checking the stored CRC of a v3 record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcStatus {
    /// Stored and computed values agree.
    Valid(u32),
    /// Stored value differs from the computed one.
    Mismatch { stored: u32, computed: u32 },
    /// The record carries no CRC (v2), or verification was disabled.
    NotChecked,
}

impl CrcStatus {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}

/// Verify the stored CRC-32C of a complete v3 record.
pub fn verify_v3_crc(record: &[u8]) -> CrcStatus {
    if record.len() < V3_CRC_OFFSET + 4 {
        return CrcStatus::NotChecked;
    }
    let mut field = [0u8; 4];
    field.copy_from_slice(&record[V3_CRC_OFFSET..V3_CRC_OFFSET + 4]);
    let stored = u32::from_le_bytes(field);
    let computed = v3_record_crc(record);
    if stored == computed {
        CrcStatus::Valid(stored)
    } else {
        CrcStatus::Mismatch { stored, computed }
    }
}
