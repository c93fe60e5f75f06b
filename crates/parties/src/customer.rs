use chrono::{DateTime, Utc};

use crm_core::{CustomerId, DomainError, DomainResult, Entity};

/// Entity: Customer.
///
/// Email uniqueness is a store-level constraint; this type only guarantees the
/// email is normalized (trimmed, lower-cased) and well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    id: CustomerId,
    name: String,
    email: String,
    phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl Customer {
    /// Register a new customer with a freshly assigned id.
    pub fn register(
        name: impl Into<String>,
        email: &str,
        phone: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Self::restore(CustomerId::new(), name, email, phone, created_at)
    }

    /// Rebuild a customer from stored fields, re-validating them.
    pub fn restore(
        id: CustomerId,
        name: impl Into<String>,
        email: &str,
        phone: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let email = normalize_email(email)?;

        let phone = match phone.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) if is_valid_phone(p) => Some(p.to_string()),
            Some(p) => return Err(DomainError::validation(format!("invalid phone format: {p}"))),
            None => None,
        };

        Ok(Self {
            id,
            name,
            email,
            phone,
            created_at,
        })
    }

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Customer {
    const KIND: &'static str = "customer";

    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Trim + lower-case, and require a non-empty local part and domain.
pub fn normalize_email(email: &str) -> DomainResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(email)
        }
        _ => Err(DomainError::validation(format!("invalid email: {email}"))),
    }
}

/// Accepts `+` followed by 10–15 digits, or `ddd-ddd-dddd`.
pub fn is_valid_phone(phone: &str) -> bool {
    if let Some(digits) = phone.strip_prefix('+') {
        return (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
    }

    let groups: Vec<&str> = phone.split('-').collect();
    matches!(groups.as_slice(), [a, b, c]
        if a.len() == 3 && b.len() == 3 && c.len() == 4
            && groups.iter().all(|g| g.chars().all(|ch| ch.is_ascii_digit())))
}
