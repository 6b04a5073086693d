//! Order rules: line validation, restaurant sizing and human-friendly order codes.

use rand::Rng;

use crate::domain::entities::OrderLine;
use crate::domain::error::DomainError;

pub const MAX_LINE_QUANTITY: i32 = 100;
pub const MIN_TABLES: i32 = 1;
pub const MAX_TABLES: i32 = 100;
pub const DEFAULT_TABLES: i32 = 10;

const CODE_LETTERS: &[char] = &[
    'А', 'Б', 'В', 'Г', 'Д', 'Е', 'Ж', 'З', 'И', 'Й', 'К', 'Л', 'М', 'Н', 'О', 'П', 'Р', 'С',
    'Т', 'У', 'Ф', 'Х', 'Ц', 'Ч', 'Ш', 'Щ', 'Э', 'Ю', 'Я',
];

pub fn validate_lines(lines: &[OrderLine]) -> Result<(), DomainError> {
    for line in lines {
        if line.quantity <= 0 {
            return Err(DomainError::validation("quantity must be greater than 0"));
        }
        if line.quantity > MAX_LINE_QUANTITY {
            return Err(DomainError::validation(format!(
                "quantity cannot exceed {MAX_LINE_QUANTITY}"
            )));
        }
    }
    Ok(())
}

pub fn validate_table_count(total: i32) -> Result<(), DomainError> {
    if !(MIN_TABLES..=MAX_TABLES).contains(&total) {
        return Err(DomainError::validation(format!(
            "total tables must be between {MIN_TABLES} and {MAX_TABLES}"
        )));
    }
    Ok(())
}

/// Generates a candidate order code: one Cyrillic capital letter and three digits.
///
/// Uniqueness is checked by the caller against storage.
pub fn generate_order_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let letter = CODE_LETTERS[rng.gen_range(0..CODE_LETTERS.len())];
    let digits: u16 = rng.gen_range(0..1000);
    format!("{letter}{digits:03}")
}

pub fn is_order_code(code: &str) -> bool {
    let mut chars = code.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let rest: Vec<char> = chars.collect();
    CODE_LETTERS.contains(&first) && rest.len() == 3 && rest.iter().all(char::is_ascii_digit)
}
