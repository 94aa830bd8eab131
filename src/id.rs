// id.rs

use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Millisecond creation timestamp as a string, bumped past any id already taken.
///
/// Once a numeric id sits at `i64::MAX` there is nothing left to bump to, so
/// the timestamp gets a `-n` suffix that no existing id uses.
pub fn next_id<'a, I>(now: DateTime<Utc>, taken: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: HashSet<&str> = taken.into_iter().collect();
    let ms = now.timestamp_millis();
    let floor = match taken.iter().filter_map(|id| id.parse::<i64>().ok()).max() {
        None => Some(ms),
        Some(max) => max.checked_add(1),
    };
    if let Some(floor) = floor {
        return ms.max(floor).to_string();
    }
    let base = ms.to_string();
    (1u64..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).single().expect("valid now")
    }

    #[test]
    fn uses_timestamp_when_free() {
        let now = now();
        assert_eq!(next_id(now, ["12", "abc"]), now.timestamp_millis().to_string());
    }

    #[test]
    fn bumps_past_collisions() {
        let now = now();
        let ms = now.timestamp_millis();
        let taken = [ms.to_string(), (ms + 1).to_string()];
        assert_eq!(
            next_id(now, taken.iter().map(String::as_str)),
            (ms + 2).to_string()
        );
    }

    #[test]
    fn largest_numeric_id_gets_a_suffix_instead_of_wrapping() {
        let now = now();
        let ms = now.timestamp_millis();
        let max = i64::MAX.to_string();
        let first = format!("{}-1", ms);

        assert_eq!(next_id(now, [max.as_str()]), first);
        assert_eq!(
            next_id(now, [max.as_str(), first.as_str()]),
            format!("{}-2", ms)
        );
    }
}
