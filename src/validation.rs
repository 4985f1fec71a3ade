//! Input validation for data crossing trust boundaries.
//!
//! Centralized validators for amounts, percentages, and payout-method
//! fields. All validators are pure and return `LedgerError::Validation`.

use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};
use crate::model::{BankAccount, PayoutMethod};

/// Length limits for validated fields.
pub mod limits {
    /// IFSC codes are exactly 11 characters: 4 letters, '0', 6 alphanumerics.
    pub const IFSC_LENGTH: usize = 11;
    /// Account numbers are 9 to 18 digits.
    pub const MIN_ACCOUNT_DIGITS: usize = 9;
    pub const MAX_ACCOUNT_DIGITS: usize = 18;
    /// Minimum length of the provider half of a UPI id ("name@provider").
    pub const MIN_UPI_PROVIDER_LENGTH: usize = 3;
}

/// Error constants for validation failures.
pub mod errmsg {
    pub const AMOUNT_NOT_POSITIVE: &str = "amount must be greater than zero";
    pub const PERCENTAGE_OUT_OF_RANGE: &str = "percentage must be between 0 and 100";

    pub const UPI_ID_EMPTY: &str = "UPI id is required for UPI payouts";
    pub const UPI_ID_INVALID: &str = "invalid UPI id format (expected name@provider)";

    pub const ACCOUNT_NUMBER_INVALID: &str = "account number must be 9-18 digits";
    pub const IFSC_INVALID: &str = "invalid IFSC code format";
    pub const ACCOUNT_HOLDER_EMPTY: &str = "account holder name is required";
    pub const BANK_NAME_EMPTY: &str = "bank name is required";
}

/// Validate that an amount is strictly positive.
pub fn validate_amount_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(errmsg::AMOUNT_NOT_POSITIVE.into()));
    }
    Ok(())
}

/// Validate a commission percentage (0-100 inclusive).
pub fn validate_percentage(percentage: Decimal) -> Result<()> {
    if percentage < Decimal::ZERO || percentage > Decimal::from(100) {
        return Err(LedgerError::Validation(
            errmsg::PERCENTAGE_OUT_OF_RANGE.into(),
        ));
    }
    Ok(())
}

/// Validate a payout method's fields.
pub fn validate_payout_method(method: &PayoutMethod) -> Result<()> {
    match method {
        PayoutMethod::Upi { upi_id } => validate_upi_id(upi_id),
        PayoutMethod::Bank(account) => validate_bank_account(account),
    }
}

/// UPI id: `name@provider`, name of `[a-zA-Z0-9._-]+`, provider at least
/// three letters.
pub fn validate_upi_id(upi_id: &str) -> Result<()> {
    if upi_id.trim().is_empty() {
        return Err(LedgerError::Validation(errmsg::UPI_ID_EMPTY.into()));
    }
    let Some((name, provider)) = upi_id.split_once('@') else {
        return Err(LedgerError::Validation(errmsg::UPI_ID_INVALID.into()));
    };
    let name_ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    let provider_ok = provider.len() >= limits::MIN_UPI_PROVIDER_LENGTH
        && provider.chars().all(|c| c.is_ascii_alphabetic());
    if !name_ok || !provider_ok {
        return Err(LedgerError::Validation(errmsg::UPI_ID_INVALID.into()));
    }
    Ok(())
}

/// Bank account: 9-18 digit account number, IFSC `AAAA0XXXXXX`, non-empty
/// holder and bank names.
pub fn validate_bank_account(account: &BankAccount) -> Result<()> {
    let digits = account.account_number.len();
    if digits < limits::MIN_ACCOUNT_DIGITS
        || digits > limits::MAX_ACCOUNT_DIGITS
        || !account.account_number.chars().all(|c| c.is_ascii_digit())
    {
        return Err(LedgerError::Validation(
            errmsg::ACCOUNT_NUMBER_INVALID.into(),
        ));
    }
    if !is_valid_ifsc(&account.ifsc_code) {
        return Err(LedgerError::Validation(errmsg::IFSC_INVALID.into()));
    }
    if account.account_holder_name.trim().is_empty() {
        return Err(LedgerError::Validation(errmsg::ACCOUNT_HOLDER_EMPTY.into()));
    }
    if account.bank_name.trim().is_empty() {
        return Err(LedgerError::Validation(errmsg::BANK_NAME_EMPTY.into()));
    }
    Ok(())
}

fn is_valid_ifsc(code: &str) -> bool {
    let code = code.to_ascii_uppercase();
    let bytes = code.as_bytes();
    bytes.len() == limits::IFSC_LENGTH
        && bytes[..4].iter().all(|b| b.is_ascii_uppercase())
        && bytes[4] == b'0'
        && bytes[5..].iter().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_positive() {
        assert!(validate_amount_positive(dec!(0.01)).is_ok());
        assert!(validate_amount_positive(Decimal::ZERO).is_err());
        assert!(validate_amount_positive(dec!(-5)).is_err());
    }

    #[test]
    fn test_percentage_range() {
        assert!(validate_percentage(dec!(0)).is_ok());
        assert!(validate_percentage(dec!(100)).is_ok());
        assert!(validate_percentage(dec!(100.1)).is_err());
        assert!(validate_percentage(dec!(-1)).is_err());
    }

    #[test]
    fn test_upi_id() {
        assert!(validate_upi_id("vendor@okicici").is_ok());
        assert!(validate_upi_id("shop.name-1@ybl").is_ok());
        assert!(validate_upi_id("").is_err());
        assert!(validate_upi_id("no-at-sign").is_err());
        assert!(validate_upi_id("vendor@ab").is_err());
        assert!(validate_upi_id("vendor@123").is_err());
        assert!(validate_upi_id("@okicici").is_err());
    }

    #[test]
    fn test_bank_account() {
        let good = BankAccount {
            account_number: "123456789012".into(),
            ifsc_code: "HDFC0001234".into(),
            account_holder_name: "A Vendor".into(),
            bank_name: "HDFC Bank".into(),
        };
        assert!(validate_bank_account(&good).is_ok());

        let short_account = BankAccount {
            account_number: "12345".into(),
            ..good.clone()
        };
        assert!(validate_bank_account(&short_account).is_err());

        let bad_ifsc = BankAccount {
            ifsc_code: "HD0001234".into(),
            ..good.clone()
        };
        assert!(validate_bank_account(&bad_ifsc).is_err());

        let no_holder = BankAccount {
            account_holder_name: "  ".into(),
            ..good
        };
        assert!(validate_bank_account(&no_holder).is_err());
    }

    #[test]
    fn test_ifsc_case_insensitive() {
        assert!(is_valid_ifsc("hdfc0001234"));
        assert!(is_valid_ifsc("SBIN0ABC123"));
        assert!(!is_valid_ifsc("SBIN1ABC123"));
    }
}
