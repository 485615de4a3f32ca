//! Checkout field formatting, validation and order totals.
//!
//! Payment is simulated: nothing here talks to a gateway. The validators
//! only decide whether a submitted form is well formed.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Email;

/// Length of an accepted card number, in digits.
pub const CARD_DIGITS: usize = 16;

/// Carts above this total ship for free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::ONE_HUNDRED;

/// Flat shipping fee below the free shipping threshold.
pub const FLAT_SHIPPING: Decimal = Decimal::TEN;

/// A checkout form field that failed validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },
}

impl CheckoutError {
    const fn invalid(field: &'static str, message: &'static str) -> Self {
        Self::Validation { field, message }
    }

    /// Name of the offending form field.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Validation { field, .. } => *field,
        }
    }
}

// =============================================================================
// Validators
// =============================================================================

/// 16 digits (whitespace ignored) passing the Luhn checksum.
#[must_use]
pub fn validate_card_number(input: &str) -> bool {
    let digits: Vec<u32> = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_digit(10))
        .collect::<Option<_>>()
        .unwrap_or_default();

    digits.len() == CARD_DIGITS && luhn_checksum(&digits) % 10 == 0
}

/// Mod-10 sum, doubling every second digit from the right.
fn luhn_checksum(digits: &[u32]) -> u32 {
    digits
        .iter()
        .rev()
        .enumerate()
        .map(|(position, &digit)| {
            if position % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum()
}

/// `MM/YY` expiry that is not before the current month.
#[must_use]
pub fn validate_expiry(input: &str) -> bool {
    validate_expiry_at(input, Utc::now().date_naive())
}

/// [`validate_expiry`] against an explicit date.
///
/// A card expiring this month is still accepted.
#[must_use]
pub fn validate_expiry_at(input: &str, today: NaiveDate) -> bool {
    let Some((month, year)) = input.split_once('/') else {
        return false;
    };
    let two_digits = |s: &str| s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(month) || !two_digits(year) {
        return false;
    }
    let (Ok(month), Ok(year)) = (month.parse::<u32>(), year.parse::<i32>()) else {
        return false;
    };
    if !(1..=12).contains(&month) {
        return false;
    }

    (2000 + year, month) >= (today.year(), today.month())
}

/// Three or four digits.
#[must_use]
pub fn validate_cvv(input: &str) -> bool {
    (3..=4).contains(&input.len()) && input.bytes().all(|b| b.is_ascii_digit())
}

/// 3 to 10 letters, digits, spaces or dashes (surrounding whitespace ignored).
#[must_use]
pub fn validate_postal_code(input: &str) -> bool {
    let code = input.trim();
    (3..=10).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
}

// =============================================================================
// Input masks
// =============================================================================

/// Keep up to 16 digits, grouped by four: `4532 0151 1283 0366`.
#[must_use]
pub fn format_card_number_input(input: &str) -> String {
    let digits: Vec<char> = input
        .chars()
        .filter(char::is_ascii_digit)
        .take(CARD_DIGITS)
        .collect();
    digits
        .chunks(4)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keep up to four digits and insert `/` after the month: `0428` → `04/28`.
#[must_use]
pub fn format_expiry_input(input: &str) -> String {
    let digits: String = input.chars().filter(char::is_ascii_digit).take(4).collect();
    if digits.len() < 2 {
        return digits;
    }
    let (month, year) = digits.split_at(2);
    format!("{month}/{year}")
}

/// Keep up to four digits.
#[must_use]
pub fn format_cvv_input(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).take(4).collect()
}

// =============================================================================
// Form
// =============================================================================

/// Submitted checkout form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
}

impl CheckoutForm {
    /// Check every field, reporting the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] naming the field at fault.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        self.validate_at(Utc::now().date_naive())
    }

    /// [`Self::validate`] with an explicit date for the expiry check.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] naming the field at fault.
    pub fn validate_at(&self, today: NaiveDate) -> Result<(), CheckoutError> {
        let required = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("postalCode", &self.postal_code),
            ("cardNumber", &self.card_number),
            ("expiryDate", &self.expiry_date),
            ("cvv", &self.cvv),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(CheckoutError::invalid(*field, "Please fill in all fields"));
        }

        if Email::parse(&self.email).is_err() {
            return Err(CheckoutError::invalid(
                "email",
                "Please enter a valid email address",
            ));
        }
        if !validate_card_number(&self.card_number) {
            return Err(CheckoutError::invalid(
                "cardNumber",
                "Please enter a valid 16-digit card number",
            ));
        }
        if !validate_expiry_at(&self.expiry_date, today) {
            return Err(CheckoutError::invalid(
                "expiryDate",
                "Please enter a valid expiry date (MM/YY) in the future",
            ));
        }
        if !validate_cvv(&self.cvv) {
            return Err(CheckoutError::invalid(
                "cvv",
                "Please enter a valid 3 or 4 digit CVV",
            ));
        }
        if !validate_postal_code(&self.postal_code) {
            return Err(CheckoutError::invalid(
                "postalCode",
                "Please enter a valid postal code",
            ));
        }
        Ok(())
    }
}

/// Order amounts shown on the checkout summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub item_count: u32,
}

impl OrderTotals {
    /// Shipping is free above [`FREE_SHIPPING_THRESHOLD`]; tax is 10%.
    #[must_use]
    pub fn new(subtotal: Decimal, item_count: u32) -> Self {
        let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
            Decimal::ZERO
        } else {
            FLAT_SHIPPING
        };
        let tax = (subtotal * Decimal::new(1, 1)).round_dp(2);
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
            item_count,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn valid_form() -> CheckoutForm {
        CheckoutForm {
            first_name: "Ada".to_owned(),
            last_name: "Runner".to_owned(),
            email: "ada@example.com".to_owned(),
            address: "1 Track Lane".to_owned(),
            city: "Eugene".to_owned(),
            state: "OR".to_owned(),
            postal_code: "97401".to_owned(),
            card_number: "4532 0151 1283 0366".to_owned(),
            expiry_date: "12/99".to_owned(),
            cvv: "123".to_owned(),
        }
    }

    #[test]
    fn test_card_number_luhn() {
        assert!(validate_card_number("4532 0151 1283 0366"));
        assert!(validate_card_number("4532015112830366"));
        assert!(!validate_card_number("4532015112830367"));
        assert!(!validate_card_number("123"));
        assert!(!validate_card_number("4532-0151-1283-0366"));
        assert!(!validate_card_number(""));
    }

    #[test]
    fn test_expiry() {
        let today = date(2026, 10, 19);
        assert!(!validate_expiry_at("01/20", today));
        assert!(validate_expiry_at("12/99", today));
        assert!(!validate_expiry_at("13/30", today));
        assert!(!validate_expiry_at("00/30", today));
        assert!(validate_expiry_at("10/26", today));
        assert!(!validate_expiry_at("09/26", today));
        assert!(!validate_expiry_at("1/30", today));
        assert!(!validate_expiry_at("12-30", today));
        assert!(!validate_expiry_at("+1/30", today));
    }

    #[test]
    fn test_expiry_against_clock() {
        assert!(!validate_expiry("01/20"));
        assert!(validate_expiry("12/99"));
        assert!(!validate_expiry("13/30"));
    }

    #[test]
    fn test_cvv_and_postal_code() {
        assert!(validate_cvv("123"));
        assert!(validate_cvv("1234"));
        assert!(!validate_cvv("12"));
        assert!(!validate_cvv("12a"));
        assert!(validate_postal_code(" SW1A 1AA "));
        assert!(validate_postal_code("97401-1234"));
        assert!(!validate_postal_code("12"));
        assert!(!validate_postal_code("97401_1234"));
    }

    #[test]
    fn test_input_masks() {
        assert_eq!(format_card_number_input("4532015112830366"), "4532 0151 1283 0366");
        assert_eq!(format_card_number_input("4532 01"), "4532 01");
        assert_eq!(format_card_number_input("45320151128303669999"), "4532 0151 1283 0366");
        assert_eq!(format_expiry_input("0"), "0");
        assert_eq!(format_expiry_input("04"), "04/");
        assert_eq!(format_expiry_input("04/2"), "04/2");
        assert_eq!(format_expiry_input("042899"), "04/28");
        assert_eq!(format_cvv_input("12a345"), "1234");
    }

    #[test]
    fn test_form_validation_reports_field() {
        let today = date(2026, 10, 19);
        assert_eq!(valid_form().validate_at(today), Ok(()));

        let mut form = valid_form();
        form.city = "  ".to_owned();
        assert_eq!(form.validate_at(today).unwrap_err().field(), "city");

        let mut form = valid_form();
        form.email = "ada@example".to_owned();
        assert_eq!(form.validate_at(today).unwrap_err().field(), "email");

        let mut form = valid_form();
        form.card_number = "4532015112830367".to_owned();
        assert_eq!(form.validate_at(today).unwrap_err().field(), "cardNumber");

        let mut form = valid_form();
        form.expiry_date = "01/20".to_owned();
        assert_eq!(form.validate_at(today).unwrap_err().field(), "expiryDate");

        let mut form = valid_form();
        form.postal_code = "!!".to_owned();
        assert_eq!(form.validate_at(today).unwrap_err().field(), "postalCode");
    }

    #[test]
    fn test_order_totals() {
        let small = OrderTotals::new(Decimal::new(5_000, 2), 1);
        assert_eq!(small.shipping, Decimal::TEN);
        assert_eq!(small.tax, Decimal::new(500, 2));
        assert_eq!(small.total, Decimal::new(6_500, 2));

        let at_threshold = OrderTotals::new(Decimal::ONE_HUNDRED, 2);
        assert_eq!(at_threshold.shipping, Decimal::TEN);

        let large = OrderTotals::new(Decimal::new(12_000, 2), 2);
        assert_eq!(large.shipping, Decimal::ZERO);
        assert_eq!(large.total, Decimal::new(13_200, 2));
    }
}
