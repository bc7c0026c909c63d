use serde::{Deserialize, Serialize};

use crate::limits::MAX_CLIENT_INPUT_LEN;

/// How a client is identified on a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientId {
    /// National insurance number, 11 digits.
    Snils(String),
    /// Phone number, digits only.
    Phone(String),
}

impl ClientId {
    pub fn digits(&self) -> &str {
        match self {
            ClientId::Snils(d) | ClientId::Phone(d) => d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIdError {
    Empty,
    NoDigits,
    TooLong(usize),
}

impl std::fmt::Display for ClientIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientIdError::Empty => write!(f, "client identifier is empty"),
            ClientIdError::NoDigits => write!(f, "client identifier contains no digits"),
            ClientIdError::TooLong(len) => {
                write!(f, "client identifier too long: {len} chars (max {MAX_CLIENT_INPUT_LEN})")
            }
        }
    }
}

impl std::error::Error for ClientIdError {}

/// SNILS group widths when written as `XXX-XXX-XXX YY`.
const SNILS_GROUPS: [usize; 4] = [3, 3, 3, 2];

/// Classify free-form input as SNILS or phone.
///
/// SNILS: no leading `+`, and either 11 contiguous digits or 3-3-3-2 digit groups
/// separated by `-` or spaces. Everything else is a phone number reduced to its digits.
/// An 11-digit domestic phone typed without `+` is therefore read as SNILS.
pub fn classify(input: &str) -> Result<ClientId, ClientIdError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ClientIdError::Empty);
    }
    if trimmed.chars().count() > MAX_CLIENT_INPUT_LEN {
        return Err(ClientIdError::TooLong(trimmed.chars().count()));
    }

    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(ClientIdError::NoDigits);
    }

    if !trimmed.starts_with('+') && looks_like_snils(trimmed) {
        Ok(ClientId::Snils(digits))
    } else {
        Ok(ClientId::Phone(digits))
    }
}

fn looks_like_snils(s: &str) -> bool {
    let groups: Vec<&str> = s.split(['-', ' ']).filter(|g| !g.is_empty()).collect();
    if !groups.iter().all(|g| g.chars().all(|c| c.is_ascii_digit())) {
        return false;
    }
    match groups.as_slice() {
        [single] => single.len() == 11,
        _ => groups.iter().map(|g| g.len()).eq(SNILS_GROUPS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_snils() {
        assert_eq!(
            classify("123-456-789 01").unwrap(),
            ClientId::Snils("12345678901".into())
        );
        assert_eq!(
            classify("123-456-789-01").unwrap(),
            ClientId::Snils("12345678901".into())
        );
    }

    #[test]
    fn plus_prefix_is_phone() {
        assert_eq!(
            classify("+79991234567").unwrap(),
            ClientId::Phone("79991234567".into())
        );
    }

    #[test]
    fn bare_eleven_digits_is_snils() {
        // Ambiguous: could be a domestic phone, but the heuristic says SNILS.
        assert_eq!(
            classify("89991234567").unwrap(),
            ClientId::Snils("89991234567".into())
        );
    }

    #[test]
    fn formatted_phone_extracts_digits() {
        assert_eq!(
            classify("+7 (999) 123-45-67").unwrap(),
            ClientId::Phone("79991234567".into())
        );
        assert_eq!(
            classify("8 999 123 45 67").unwrap(),
            ClientId::Phone("89991234567".into())
        );
    }

    #[test]
    fn wrong_grouping_is_phone() {
        assert_eq!(
            classify("1234-567-89-01").unwrap(),
            ClientId::Phone("12345678901".into())
        );
        assert_eq!(
            classify("1234567890").unwrap(),
            ClientId::Phone("1234567890".into())
        );
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(
            classify("  123-456-789 01 ").unwrap().digits(),
            "12345678901"
        );
    }

    #[test]
    fn rejects_empty_and_digitless() {
        assert_eq!(classify("   "), Err(ClientIdError::Empty));
        assert_eq!(classify("ivan"), Err(ClientIdError::NoDigits));
    }

    #[test]
    fn rejects_oversized_input() {
        let long = "1".repeat(MAX_CLIENT_INPUT_LEN + 1);
        assert!(matches!(classify(&long), Err(ClientIdError::TooLong(_))));
    }
}
