//! Contact enquiry validation and normalization.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[\d\s\-()]+$").expect("valid phone pattern"));

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 100;
const MESSAGE_MIN: usize = 10;
const MESSAGE_MAX: usize = 1000;
const COMPANY_MAX: usize = 200;

/// Field name to the messages explaining why it was rejected.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interest {
    Demo,
    Pricing,
    #[default]
    Contact,
    Other,
}

impl Interest {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Pricing => "pricing",
            Self::Contact => "contact",
            Self::Other => "other",
        }
    }
}

impl FromStr for Interest {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "demo" => Ok(Self::Demo),
            "pricing" => Ok(Self::Pricing),
            "contact" => Ok(Self::Contact),
            "other" => Ok(Self::Other),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnquiryStatus {
    New,
    Contacted,
    Converted,
    Closed,
}

/// Raw form input, as submitted.
#[derive(Debug, Clone, Default)]
pub struct EnquiryForm {
    pub name: String,
    pub email: String,
    pub message: String,
    pub interest: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
}

/// A validated enquiry ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enquiry {
    pub name: String,
    pub email: String,
    pub message: String,
    pub interest: Interest,
    pub company: Option<String>,
    /// Digits only; separators and the leading `+` are dropped.
    pub phone: Option<u64>,
    pub status: EnquiryStatus,
}

impl Enquiry {
    pub fn validate(form: &EnquiryForm) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = form.name.trim();
        let name_len = name.chars().count();
        if name_len < NAME_MIN {
            push(&mut errors, "name", "Name must be at least 2 characters");
        } else if name_len > NAME_MAX {
            push(&mut errors, "name", "Name must not exceed 100 characters");
        }

        let email = form.email.trim().to_lowercase();
        if !EMAIL_PATTERN.is_match(&email) {
            push(&mut errors, "email", "Please enter a valid email address");
        }

        let message = form.message.trim();
        let message_len = message.chars().count();
        if message_len < MESSAGE_MIN {
            push(&mut errors, "message", "Message must be at least 10 characters");
        } else if message_len > MESSAGE_MAX {
            push(
                &mut errors,
                "message",
                "Message must not exceed 1000 characters",
            );
        }

        let interest = match form.interest.as_deref().map(str::trim) {
            None | Some("") => Interest::default(),
            Some(value) => value.parse().unwrap_or_else(|_| {
                push(
                    &mut errors,
                    "interest",
                    "Please select a valid interest option",
                );
                Interest::default()
            }),
        };

        let company = form
            .company
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if company.is_some_and(|value| value.chars().count() > COMPANY_MAX) {
            push(
                &mut errors,
                "company",
                "Company name must not exceed 200 characters",
            );
        }

        let phone = match form.phone.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => match parse_phone(value) {
                Some(number) => Some(number),
                None => {
                    push(&mut errors, "phone", "Please enter a valid phone number");
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            name: name.to_string(),
            email,
            message: message.to_string(),
            interest,
            company: company.map(str::to_string),
            phone,
            status: EnquiryStatus::New,
        })
    }

    /// Body for the `enquiries` collection.
    pub fn to_record_body(&self) -> Value {
        let mut body = json!({
            "name": self.name,
            "email": self.email,
            "message": self.message,
            "interest": self.interest,
            "status": self.status,
        });
        if let Some(company) = &self.company {
            body["company"] = json!(company);
        }
        if let Some(phone) = self.phone {
            body["phone"] = json!(phone);
        }
        body
    }
}

fn push(errors: &mut FieldErrors, field: &'static str, message: &str) {
    errors.entry(field).or_default().push(message.to_string());
}

fn parse_phone(value: &str) -> Option<u64> {
    if !PHONE_PATTERN.is_match(value) {
        return None;
    }
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
