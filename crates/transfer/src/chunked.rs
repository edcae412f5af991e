use std::ops::Range;

use sha2::{Digest, Sha256};

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Splits `total_bytes` into part byte ranges.
///
/// Part `n` (1-based) covers `[(n-1)*part_size, min(n*part_size, total_bytes))`.
/// When the backend announced a part count it must agree with the size;
/// `Err` carries a human-readable reason otherwise.
pub fn plan_parts(
    total_bytes: u64,
    part_size: u64,
    announced_parts: Option<u32>,
) -> Result<Vec<Range<u64>>, String> {
    if part_size == 0 {
        return Err("part size is zero".into());
    }

    let count = total_bytes.div_ceil(part_size);
    if let Some(announced) = announced_parts
        && u64::from(announced) != count
    {
        return Err(format!(
            "backend announced {announced} parts, {total_bytes} bytes at {part_size} per part needs {count}"
        ));
    }

    Ok((1..=count)
        .map(|n| (n - 1) * part_size..(n * part_size).min(total_bytes))
        .collect())
}
