//! Resolution of the remaining-seconds checkpoints at which a bell rings.

/// Checkpoints for the protected windows of a speech.
///
/// `duration - protected_seconds` marks the end of the opening window and
/// `protected_seconds` the start of the closing one. When the protected
/// window swallows the whole speech nothing is produced. Duplicates are kept;
/// the timer engine dedups by checkpoint.
pub fn compute_protected_alarms(
    duration: u32,
    protected_seconds: u32,
    skip_start: bool,
) -> Vec<u32> {
    let mut alarms = Vec::with_capacity(2);
    if duration <= protected_seconds {
        return alarms;
    }
    if !skip_start {
        alarms.push(duration - protected_seconds);
    }
    alarms.push(protected_seconds);
    alarms
}

/// Parses a comma separated list of whole minutes into seconds.
///
/// Tokens that do not start with an integer, and values below one minute,
/// are dropped. Output keeps input order.
pub fn parse_prep_alarms(input: &str) -> Vec<u32> {
    input
        .split(',')
        .filter_map(|token| parse_leading_int(token.trim()))
        .filter(|minutes| *minutes > 0)
        .filter_map(|minutes| u32::try_from(minutes).ok())
        .map(|minutes| minutes.saturating_mul(60))
        .collect()
}

// Accepts an optional sign followed by digits and ignores any trailing text,
// so "3min" reads as 3 and "1.5" as 1.
fn parse_leading_int(token: &str) -> Option<i64> {
    let (negative, digits) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value = digits[..end].parse::<i64>().ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut values: Vec<u32>) -> Vec<u32> {
        values.sort_unstable();
        values
    }

    #[test]
    fn standard_speech_gets_both_checkpoints() {
        let alarms = compute_protected_alarms(480, 60, false);
        assert_eq!(sorted(alarms), vec![60, 420]);
    }

    #[test]
    fn protected_window_covering_speech_yields_nothing() {
        assert!(compute_protected_alarms(50, 60, false).is_empty());
        assert!(compute_protected_alarms(60, 60, false).is_empty());
        assert!(compute_protected_alarms(0, 0, false).is_empty());
    }

    #[test]
    fn skip_start_keeps_only_closing_checkpoint() {
        assert_eq!(compute_protected_alarms(480, 60, true), vec![60]);
    }

    #[test]
    fn midpoint_protection_produces_duplicate_checkpoint() {
        assert_eq!(compute_protected_alarms(120, 60, false), vec![60, 60]);
    }

    #[test]
    fn zero_protection_rings_at_start_and_end() {
        assert_eq!(compute_protected_alarms(300, 0, false), vec![300, 0]);
    }

    #[test]
    fn prep_alarms_convert_minutes_in_input_order() {
        assert_eq!(parse_prep_alarms("8, 5, 1"), vec![480, 300, 60]);
        assert_eq!(parse_prep_alarms("1,10,5"), vec![60, 600, 300]);
    }

    #[test]
    fn prep_alarms_drop_invalid_tokens() {
        assert_eq!(parse_prep_alarms("abc, -1, 0, 3"), vec![180]);
        assert_eq!(parse_prep_alarms(" , ,"), Vec::<u32>::new());
        assert!(parse_prep_alarms("").is_empty());
    }

    #[test]
    fn prep_alarms_read_leading_integer() {
        assert_eq!(parse_prep_alarms("3min, 1.5, +2"), vec![180, 60, 120]);
        assert!(parse_prep_alarms("-, +, min3").is_empty());
    }
}
