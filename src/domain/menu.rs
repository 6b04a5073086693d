//! Menu rules: what a dish submission must look like before it reaches storage.

use serde::Deserialize;

use crate::domain::error::DomainError;

pub const MAX_DISH_NAME_CHARS: usize = 100;
pub const MAX_DISH_PRICE: f64 = 1_000_000.0;

/// Dish fields accepted on create and full update.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DishDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl DishDraft {
    /// Trims the name and rounds the price to cents.
    pub fn normalize(self) -> Result<Self, DomainError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("dish name cannot be empty"));
        }
        if name.chars().count() > MAX_DISH_NAME_CHARS {
            return Err(DomainError::validation(format!(
                "dish name cannot exceed {MAX_DISH_NAME_CHARS} characters"
            )));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(DomainError::validation("price must be greater than 0"));
        }
        if self.price > MAX_DISH_PRICE {
            return Err(DomainError::validation("price is too high"));
        }

        Ok(Self {
            name,
            description: self.description,
            price: (self.price * 100.0).round() / 100.0,
            available: self.available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, price: f64) -> DishDraft {
        DishDraft {
            name: name.to_string(),
            description: String::new(),
            price,
            available: true,
        }
    }

    #[test]
    fn normalize_trims_and_rounds() {
        let dish = draft("  Solyanka ", 7.456).normalize().unwrap();
        assert_eq!(dish.name, "Solyanka");
        assert_eq!(dish.price, 7.46);
    }

    #[test]
    fn normalize_rejects_blank_names_and_bad_prices() {
        assert!(draft("   ", 1.0).normalize().is_err());
        assert!(draft(&"x".repeat(101), 1.0).normalize().is_err());
        assert!(draft("Tea", 0.0).normalize().is_err());
        assert!(draft("Tea", f64::NAN).normalize().is_err());
        assert!(draft("Caviar", 2_000_000.0).normalize().is_err());
    }
}
