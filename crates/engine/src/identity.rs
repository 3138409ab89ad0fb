//! Registration form and phone composition.

use std::fmt;

use api_types::{customer::CustomerUpsert, play::PlayRequest};
use thiserror::Error;

/// E.164 allows at most 15 digits, country code included.
const MAX_E164_DIGITS: usize = 15;
const MIN_E164_DIGITS: usize = 8;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("first name is required")]
    MissingFirstName,
    #[error("last name is required")]
    MissingLastName,
    #[error("invalid country code: {0}")]
    InvalidCountryCode(String),
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),
    #[error("invalid email: {0}")]
    InvalidEmail(String),
}

/// Phone in E.164 form, `+` followed by digits only.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Phone(String);

impl Phone {
    /// Concatenate a country code (with or without `+`) and a national number.
    ///
    /// Spaces, dashes, dots and parentheses in the national number are
    /// ignored.
    pub fn compose(country_code: &str, national: &str) -> Result<Self, FormError> {
        let code = country_code.trim().trim_start_matches('+');
        if code.is_empty() || code.len() > 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FormError::InvalidCountryCode(country_code.to_string()));
        }

        let mut digits = String::with_capacity(MAX_E164_DIGITS);
        for c in national.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => return Err(FormError::InvalidPhone(national.to_string())),
            }
        }
        if digits.is_empty() {
            return Err(FormError::InvalidPhone(national.to_string()));
        }

        let total = code.len() + digits.len();
        if !(MIN_E164_DIGITS..=MAX_E164_DIGITS).contains(&total) {
            return Err(FormError::InvalidPhone(national.to_string()));
        }

        Ok(Self(format!("+{code}{digits}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the customer types in the registration step.
#[derive(Clone, Debug, Default)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub country_code: String,
    pub phone: String,
    pub email: Option<String>,
}

/// Validated registration, kept by the session for the play payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub phone: Phone,
    pub email: Option<String>,
}

impl TryFrom<RegistrationForm> for Registration {
    type Error = FormError;

    fn try_from(form: RegistrationForm) -> Result<Self, Self::Error> {
        let first_name = form.first_name.trim().to_string();
        if first_name.is_empty() {
            return Err(FormError::MissingFirstName);
        }
        let last_name = form.last_name.trim().to_string();
        if last_name.is_empty() {
            return Err(FormError::MissingLastName);
        }
        let phone = Phone::compose(&form.country_code, &form.phone)?;

        let email = match form.email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(email) => {
                let valid = email
                    .split_once('@')
                    .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
                if !valid || email.contains(char::is_whitespace) {
                    return Err(FormError::InvalidEmail(email.to_string()));
                }
                Some(email.to_string())
            }
        };

        Ok(Self {
            first_name,
            last_name,
            phone,
            email,
        })
    }
}

impl Registration {
    pub fn upsert_request(&self) -> CustomerUpsert {
        CustomerUpsert {
            phone: self.phone.to_string(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }

    pub fn play_request(&self, token: &str, network_address: Option<&str>) -> PlayRequest {
        PlayRequest {
            token: token.to_string(),
            phone: self.phone.to_string(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            network_address: network_address.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RegistrationForm {
        RegistrationForm {
            first_name: " Jane ".to_string(),
            last_name: "Doe".to_string(),
            country_code: "+973".to_string(),
            phone: "1234 5678".to_string(),
            email: Some(String::new()),
        }
    }

    #[test]
    fn compose_concatenates_code_and_number() {
        assert_eq!(
            Phone::compose("+973", "1234 5678").unwrap().as_str(),
            "+97312345678"
        );
        assert_eq!(
            Phone::compose("39", "(333) 123-4567").unwrap().as_str(),
            "+393331234567"
        );
    }

    #[test]
    fn compose_rejects_garbage() {
        assert!(matches!(
            Phone::compose("+abc", "12345678"),
            Err(FormError::InvalidCountryCode(_))
        ));
        assert!(matches!(
            Phone::compose("+973", "12x45678"),
            Err(FormError::InvalidPhone(_))
        ));
        assert!(matches!(
            Phone::compose("+973", "123"),
            Err(FormError::InvalidPhone(_))
        ));
        assert!(matches!(
            Phone::compose("+973", "1234567890123456"),
            Err(FormError::InvalidPhone(_))
        ));
    }

    #[test]
    fn form_trims_names_and_drops_blank_email() {
        let registration = Registration::try_from(form()).unwrap();
        assert_eq!(registration.first_name, "Jane");
        assert_eq!(registration.email, None);
        assert_eq!(registration.upsert_request().phone, "+97312345678");
    }

    #[test]
    fn form_requires_names() {
        let mut missing = form();
        missing.last_name = "  ".to_string();
        assert_eq!(
            Registration::try_from(missing).unwrap_err(),
            FormError::MissingLastName
        );
    }

    #[test]
    fn form_rejects_bad_email() {
        let mut bad = form();
        bad.email = Some("jane.doe".to_string());
        assert!(matches!(
            Registration::try_from(bad),
            Err(FormError::InvalidEmail(_))
        ));
    }
}
