use validator::Validate;

use crate::errors::{FieldError, ServiceError};

/// Validate any input that implements the Validate trait, flattening field
/// errors into the wire-level `param` convention (dotted paths).
pub fn validate_input<T: Validate>(input: &T, param_prefix: &str) -> Result<(), ServiceError> {
    input.validate().map_err(|errors| {
        let mut fields = Vec::new();
        for (field, field_errors) in errors.field_errors() {
            let param = if param_prefix.is_empty() {
                field.to_string()
            } else {
                format!("{}.{}", param_prefix, field)
            };
            let message = field_errors
                .first()
                .and_then(|e| e.message.as_ref())
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid value for {}", field));
            fields.push(FieldError { param, message });
        }
        ServiceError::Validation(fields)
    })
}

/// Validate ISO 4217 currency code (uppercase, e.g. "USD")
pub fn validate_currency(currency: &str) -> Result<(), ServiceError> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ServiceError::validation(
            "currency",
            "Currency must be 3 uppercase letters (ISO 4217)",
        ));
    }
    Ok(())
}

/// Validate ISO 3166-1 alpha-2 country code
pub fn validate_country_code(code: &str) -> Result<(), ServiceError> {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ServiceError::validation(
            "shipping_address.country",
            "Country code must be 2 uppercase letters (ISO 3166-1)",
        ));
    }
    Ok(())
}

/// Validate quantity is positive
pub fn validate_quantity(quantity: i64, param: &str) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::validation(
            param,
            "Quantity must be greater than 0",
        ));
    }
    Ok(())
}

/// Validate email format
pub fn validate_email(email: &str) -> Result<(), ServiceError> {
    if !email.contains('@') || email.len() < 3 || email.len() > 256 {
        return Err(ServiceError::validation(
            "shipping_address.email",
            "Invalid email format",
        ));
    }
    Ok(())
}

/// Validate phone number (E.164 format)
pub fn validate_phone(phone: &str) -> Result<(), ServiceError> {
    if !phone.starts_with('+') {
        return Err(ServiceError::validation(
            "shipping_address.phone",
            "Phone must start with +",
        ));
    }

    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(10..=15).contains(&digits) {
        return Err(ServiceError::validation(
            "shipping_address.phone",
            "Invalid phone number length",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("USD").is_ok());
        assert!(validate_currency("EUR").is_ok());
        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("DOLLAR").is_err());
    }

    #[test]
    fn test_validate_country_code() {
        assert!(validate_country_code("US").is_ok());
        assert!(validate_country_code("GB").is_ok());
        assert!(validate_country_code("USA").is_err());
        assert!(validate_country_code("us").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1, "line_items.0.quantity").is_ok());
        let err = validate_quantity(0, "line_items.0.quantity").unwrap_err();
        match err {
            ServiceError::Validation(fields) => {
                assert_eq!(fields[0].param, "line_items.0.quantity");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+14155551234").is_ok());
        assert!(validate_phone("4155551234").is_err());
        assert!(validate_phone("+1").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("agent@example.com").is_ok());
        assert!(validate_email("invalid").is_err());
    }
}
