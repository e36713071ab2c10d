use chrono::NaiveDate;

/// Reservation code allocation: `RES-YYYYMMDD-NNNNN`, with the sequence
/// scoped to the calendar day. Same scan-max-plus-one contract as route
/// codes; numbering restarts at 1 each day.

#[derive(Debug, thiserror::Error)]
pub enum ReservationCodeError {
    #[error("Reservation code sequence exhausted for {0}")]
    SequenceExhausted(NaiveDate),
}

pub fn day_prefix(date: NaiveDate) -> String {
    format!("RES-{}-", date.format("%Y%m%d"))
}

pub fn next_reservation_code(
    existing: &[String],
    date: NaiveDate,
) -> Result<String, ReservationCodeError> {
    let prefix = day_prefix(date);

    let in_day: Vec<u32> = existing
        .iter()
        .filter_map(|code| code.strip_prefix(&prefix))
        .filter(|suffix| suffix.len() == 5 && suffix.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|suffix| suffix.parse().ok())
        .collect();

    let mut candidate = in_day.iter().max().map(|m| m + 1).unwrap_or(1);

    loop {
        if candidate > 99_999 {
            return Err(ReservationCodeError::SequenceExhausted(date));
        }
        let code = format!("{}{:05}", prefix, candidate);
        if !existing.contains(&code) {
            return Ok(code);
        }
        candidate += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_code_of_the_day() {
        let code = next_reservation_code(&[], day(2026, 3, 14)).unwrap();
        assert_eq!(code, "RES-20260314-00001");
    }

    #[test]
    fn test_sequential_within_a_day() {
        let mut existing = Vec::new();
        for expected in ["RES-20260314-00001", "RES-20260314-00002"] {
            let code = next_reservation_code(&existing, day(2026, 3, 14)).unwrap();
            assert_eq!(code, expected);
            existing.push(code);
        }
    }

    #[test]
    fn test_numbering_restarts_next_day() {
        let existing = vec!["RES-20260314-00007".to_string()];
        let code = next_reservation_code(&existing, day(2026, 3, 15)).unwrap();
        assert_eq!(code, "RES-20260315-00001");
    }

    #[test]
    fn test_collision_steps_forward() {
        let existing = vec![
            "RES-20260314-00003".to_string(),
            "RES-20260314-00004".to_string(),
        ];
        let code = next_reservation_code(&existing, day(2026, 3, 14)).unwrap();
        assert_eq!(code, "RES-20260314-00005");
    }
}
