//! Date parsing for receipts.

use chrono::NaiveDate;

use super::patterns::{DATE_DAY_MONTH_NAME, DATE_DMY, DATE_YMD};
use super::{ExtractionMatch, FieldExtractor};

/// Date field extractor.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();

        // YYYY-MM-DD first: the format the model is asked for
        for caps in DATE_YMD.captures_iter(text) {
            let year: i32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let day: u32 = caps[3].parse().unwrap_or(0);

            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                let Some(full_match) = caps.get(0) else { continue };
                results.push(
                    ExtractionMatch::new(date)
                        .with_position(full_match.start(), full_match.end()),
                );
            }
        }

        // DD/MM/YYYY, DD-MM-YYYY, DD.MM.YYYY (Indian receipts are day-first)
        for caps in DATE_DMY.captures_iter(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let year: i32 = parse_year(&caps[3]);

            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                if results.iter().any(|r| r.value == date) {
                    continue;
                }
                let Some(full_match) = caps.get(0) else { continue };
                results.push(
                    ExtractionMatch::new(date)
                        .with_position(full_match.start(), full_match.end()),
                );
            }
        }

        // "02 Mar 2024", "2-March-2024"
        for caps in DATE_DAY_MONTH_NAME.captures_iter(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month = month_abbrev_to_number(&caps[2]);
            let year: i32 = caps[3].parse().unwrap_or(0);

            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                if results.iter().any(|r| r.value == date) {
                    continue;
                }
                let Some(full_match) = caps.get(0) else { continue };
                results.push(
                    ExtractionMatch::new(date)
                        .with_position(full_match.start(), full_match.end()),
                );
            }
        }

        results
    }
}

/// Parse a single date value.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") {
        return None;
    }
    DateExtractor::new().extract(s).map(|m| m.value)
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if year < 100 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 {
            2000 + year
        } else {
            1900 + year
        }
    } else {
        year
    }
}

fn month_abbrev_to_number(month: &str) -> u32 {
    match month.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_iso() {
        assert_eq!(parse_date("2024-03-02"), NaiveDate::from_ymd_opt(2024, 3, 2));
    }

    #[test]
    fn test_parse_date_day_first() {
        assert_eq!(parse_date("02/03/2024"), NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(parse_date("02-03-2024"), NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(parse_date("02.03.24"), NaiveDate::from_ymd_opt(2024, 3, 2));
    }

    #[test]
    fn test_parse_date_month_name() {
        assert_eq!(parse_date("2 Mar 2024"), NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(parse_date("15-January-2024"), NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn test_parse_date_rejects() {
        assert_eq!(parse_date("null"), None);
        assert_eq!(parse_date("YYYY-MM-DD"), None);
        assert_eq!(parse_date("31/02/2024"), None);
    }

    #[test]
    fn test_extract_all_dedupes() {
        let dates = DateExtractor::new().extract_all("Date: 2024-03-02 (02/03/2024)");
        assert_eq!(dates.len(), 1);
    }
}
