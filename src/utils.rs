use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

const MONTH_NAMES: [[&str; 2]; 12] = [
    ["janeiro", "january"],
    ["fevereiro", "february"],
    ["marco", "march"],
    ["abril", "april"],
    ["maio", "may"],
    ["junho", "june"],
    ["julho", "july"],
    ["agosto", "august"],
    ["setembro", "september"],
    ["outubro", "october"],
    ["novembro", "november"],
    ["dezembro", "december"],
];

/// Chronological position of a ledger period label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub year: Option<i32>,
    pub month: u32,
}

/// Coerces spreadsheet text into a finite number.
///
/// Accepts plain decimals, exponents and a decimal comma when the text has no
/// dot (`"0,005"`). Returns `None` for blanks and anything non-numeric,
/// including `NaN` and infinities.
pub fn coerce_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };

    candidate.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Presentation rounding. Never feed the result back into a computation.
pub fn format_decimal(value: f64, places: u32) -> String {
    let formatted = format!("{:.*}", places as usize, value);
    if formatted.starts_with('-') && formatted[1..].chars().all(|c| c == '0' || c == '.') {
        formatted[1..].to_string()
    } else {
        formatted
    }
}

pub fn month_from_name(name: &str) -> Option<u32> {
    let key = fold_accents(&name.trim().to_lowercase());
    if key.len() < 3 {
        return None;
    }

    MONTH_NAMES.iter().enumerate().find_map(|(idx, names)| {
        let matches = names
            .iter()
            .any(|full| *full == key || (key.len() <= 4 && full.starts_with(key.as_str())));
        matches.then_some(idx as u32 + 1)
    })
}

/// Parses period labels such as `"Janeiro/2024"`, `"jan-24"`, `"March 2023"`,
/// `"03/2024"`, `"2024-03"` or `"2024-03-31"`.
pub fn parse_period_label(label: &str) -> Option<PeriodKey> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(PeriodKey {
            year: Some(date.year()),
            month: date.month(),
        });
    }

    let tokens: Vec<&str> = trimmed
        .split(|c: char| c == '/' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    match tokens.as_slice() {
        [single] => month_from_name(single).map(|month| PeriodKey { year: None, month }),
        [first, second] => {
            if let Some(month) = month_from_name(first) {
                let year = parse_year(second)?;
                return Some(PeriodKey {
                    year: Some(year),
                    month,
                });
            }

            let first_num = first.parse::<u32>().ok()?;
            let second_num = second.parse::<u32>().ok()?;
            // YYYY-MM or MM/YYYY
            let (year, month) = if first.len() == 4 {
                (first_num as i32, second_num)
            } else if second.len() == 4 {
                (second_num as i32, first_num)
            } else {
                return None;
            };

            (1..=12).contains(&month).then_some(PeriodKey {
                year: Some(year),
                month,
            })
        }
        _ => None,
    }
}

fn parse_year(token: &str) -> Option<i32> {
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match token.len() {
        2 => token.parse::<i32>().ok().map(|y| 2000 + y),
        4 => token.parse::<i32>().ok(),
        _ => None,
    }
}

fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}
