/// Route code allocation: `AP` + 3-digit zero-padded number, partitioned by
/// the national/international flag. Domestic routes draw from 1-499,
/// international from 500-999. Codes are never reclaimed; the allocator is
/// monotonic within its partition.

pub const DOMESTIC_START: u32 = 1;
pub const DOMESTIC_END: u32 = 499;
pub const INTERNATIONAL_START: u32 = 500;
pub const INTERNATIONAL_END: u32 = 999;

#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    #[error("Route code partition exhausted ({0}-{1})")]
    RangeExhausted(u32, u32),
}

pub fn format_route_code(number: u32) -> String {
    format!("AP{:03}", number)
}

/// Parse `AP\d{3}`; anything else is ignored by the scan.
fn parse_route_code(code: &str) -> Option<u32> {
    let digits = code.strip_prefix("AP")?;
    if digits.len() != 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Next code in the partition: max of the existing in-range codes plus one,
/// or the range start if the partition is empty. Two allocators racing on
/// the same scan produce the same candidate; the unique constraint on the
/// code column rejects the loser, whose caller rescans and retries.
pub fn next_route_code(existing: &[String], domestic: bool) -> Result<String, CodeError> {
    let (start, end) = if domestic {
        (DOMESTIC_START, DOMESTIC_END)
    } else {
        (INTERNATIONAL_START, INTERNATIONAL_END)
    };

    let candidate = existing
        .iter()
        .filter_map(|c| parse_route_code(c))
        .filter(|n| (start..=end).contains(n))
        .max()
        .map(|m| m + 1)
        .unwrap_or(start);

    if candidate > end {
        return Err(CodeError::RangeExhausted(start, end));
    }
    Ok(format_route_code(candidate))
}
