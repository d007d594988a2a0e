//! Small validation helpers shared by the record crates.

use crate::{Cents, DomainError, DomainResult};

pub fn require_non_empty(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Like [`require_non_empty`] but only when the field is present (patches).
pub fn non_empty_if_present(field: &str, value: Option<&str>) -> DomainResult<()> {
    match value {
        Some(v) => require_non_empty(field, v),
        None => Ok(()),
    }
}

/// Quantities and rates: finite and `>= 0`.
pub fn non_negative(field: &str, value: Option<f64>) -> DomainResult<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(DomainError::validation(format!(
            "{field} must be a non-negative number"
        ))),
        _ => Ok(()),
    }
}

pub fn non_negative_amount(field: &str, value: Option<Cents>) -> DomainResult<()> {
    match value {
        Some(v) if v.is_negative() => Err(DomainError::validation(format!(
            "{field} must be a non-negative amount"
        ))),
        _ => Ok(()),
    }
}

/// Loose email shape check: one `@` with something on both sides and a dot in the domain.
pub fn email(field: &str, value: Option<&str>) -> DomainResult<()> {
    let Some(v) = value else { return Ok(()) };
    let v = v.trim();
    if v.is_empty() {
        return Ok(());
    }
    let valid = match v.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.contains('@') && domain.contains('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DomainError::validation(format!("{field} is not a valid email address")))
    }
}

/// Exactly `len` ASCII digits (spaces are ignored), e.g. SIREN (9) / SIRET (14).
pub fn digits(field: &str, value: Option<&str>, len: usize) -> DomainResult<()> {
    let Some(v) = value else { return Ok(()) };
    let compact: String = v.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Ok(());
    }
    if compact.len() == len && compact.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(DomainError::validation(format!("{field} must contain exactly {len} digits")))
    }
}

pub fn ordered<T: PartialOrd>(start_field: &str, start: Option<&T>, end_field: &str, end: Option<&T>) -> DomainResult<()> {
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            return Err(DomainError::validation(format!(
                "{end_field} must not be before {start_field}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn blank_is_rejected() {
        assert!(require_non_empty("nom", "   ").is_err());
        assert!(require_non_empty("nom", "Dupont").is_ok());
    }

    #[test]
    fn email_shapes() {
        assert!(email("email", Some("jean@exemple.fr")).is_ok());
        assert!(email("email", Some("")).is_ok());
        assert!(email("email", None).is_ok());
        assert!(email("email", Some("jean.exemple.fr")).is_err());
        assert!(email("email", Some("@exemple.fr")).is_err());
        assert!(email("email", Some("jean@exemple")).is_err());
    }

    #[test]
    fn siren_and_siret_lengths() {
        assert!(digits("siren", Some("552 100 554"), 9).is_ok());
        assert!(digits("siren", Some("55210055"), 9).is_err());
        assert!(digits("siret", Some("55210055400013"), 14).is_ok());
        assert!(digits("siret", Some("5521005540001X"), 14).is_err());
    }

    #[test]
    fn end_before_start_is_rejected() {
        assert!(ordered("date_debut", Some(&2), "date_fin", Some(&1)).is_err());
        assert!(ordered("date_debut", Some(&1), "date_fin", Some(&1)).is_ok());
        assert!(ordered::<i32>("date_debut", None, "date_fin", Some(&1)).is_ok());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(non_negative_amount("montant", Some(Cents::new(-1))).is_err());
        assert!(non_negative_amount("montant", Some(Cents::ZERO)).is_ok());
        assert!(non_negative_amount("montant", None).is_ok());
    }

    proptest! {
        #[test]
        fn non_negative_accepts_exactly_finite_non_negative(v in proptest::num::f64::ANY) {
            let ok = non_negative("montant", Some(v)).is_ok();
            prop_assert_eq!(ok, v.is_finite() && v >= 0.0);
        }
    }
}
