//! Contact lines of a credential
//!
//! Extracts the name, organization, phone and email a credential carries so
//! they can be matched against a people directory. Property parameters
//! (`TEL;TYPE=CELL:`) are ignored and names compare case-insensitively.

/// Contact fields read from a credential
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactCard {
    /// `FN`
    pub name: Option<String>,
    /// `ORG`
    pub organization: Option<String>,
    /// `TEL`
    pub phone: Option<String>,
    /// `EMAIL`
    pub email: Option<String>,
}

impl ContactCard {
    /// Extract the contact fields from credential text
    ///
    /// Accepts LF or CRLF lines. A repeated property keeps its last value and
    /// blank values are treated as absent.
    pub fn parse(text: &str) -> Self {
        let mut card = Self::default();
        for line in text.lines().map(str::trim) {
            let Some((property, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let name = property.split(';').next().unwrap_or_default();
            let slot = if name.eq_ignore_ascii_case("FN") {
                &mut card.name
            } else if name.eq_ignore_ascii_case("ORG") {
                &mut card.organization
            } else if name.eq_ignore_ascii_case("TEL") {
                &mut card.phone
            } else if name.eq_ignore_ascii_case("EMAIL") {
                &mut card.email
            } else {
                continue;
            };
            *slot = Some(value.to_string());
        }
        card
    }

    /// Whether no contact field was found
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.organization.is_none()
            && self.phone.is_none()
            && self.email.is_none()
    }

    /// Phone number reduced to its digits
    pub fn normalized_phone(&self) -> Option<String> {
        self.phone
            .as_deref()
            .map(normalize_phone)
            .filter(|digits| !digits.is_empty())
    }

    /// Whether this card refers to the given person
    ///
    /// Any one of email (case-insensitive), phone (digits only) or name
    /// (case-insensitive) matching is enough.
    pub fn matches(&self, name: &str, phone: &str, email: &str) -> bool {
        let email_matches = self
            .email
            .as_deref()
            .is_some_and(|own| own.to_lowercase() == email.trim().to_lowercase());
        let phone_matches = self
            .normalized_phone()
            .is_some_and(|own| own == normalize_phone(phone));
        let name_matches = self
            .name
            .as_deref()
            .is_some_and(|own| own.to_lowercase() == name.trim().to_lowercase());

        email_matches || phone_matches || name_matches
    }
}

/// Keep only the digits of a phone number
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = "BEGIN:VCARD\r\nVERSION:3.0\r\nFN:张三\r\nORG:COMCORN\r\n\
                        EMAIL:John@comcorn.cn\r\nTEL;TYPE=CELL:138-0000-0000\r\n\
                        NOTE:UID=04;SIG=AA==\r\nEND:VCARD\r\n";

    #[test]
    fn test_parse_contact_lines() {
        let card = ContactCard::parse(CARD);
        assert_eq!(card.name.as_deref(), Some("张三"));
        assert_eq!(card.organization.as_deref(), Some("COMCORN"));
        assert_eq!(card.email.as_deref(), Some("John@comcorn.cn"));
        assert_eq!(card.phone.as_deref(), Some("138-0000-0000"));
        assert_eq!(card.normalized_phone().as_deref(), Some("13800000000"));
        assert!(!card.is_empty());
    }

    #[test]
    fn test_parse_plain_text() {
        let card = ContactCard::parse("hello world\nFN:\n");
        assert!(card.is_empty());
        assert_eq!(card.normalized_phone(), None);
    }

    #[test]
    fn test_matches() {
        let card = ContactCard::parse(CARD);
        assert!(card.matches("", "", "john@COMCORN.cn"));
        assert!(card.matches("", "+138 0000 0000", ""));
        assert!(card.matches("张三", "", ""));
        assert!(!card.matches("李四", "139", "jane@comcorn.cn"));
        assert!(!ContactCard::default().matches("", "", ""));
    }
}
