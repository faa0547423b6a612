//! Customer model - external identities that visit customer-facing boards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// External ("customer") identity, distinct from the internal product-team user.
///
/// The credential hash is not part of this type; it lives in
/// `customer_credentials` and is only touched by the credential store.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Customer {
    pub customer_id: Uuid,
    /// Normalised (trimmed, lower-cased) email.
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Customer {
    pub fn new(email: &str, profile: CustomerProfile) -> Self {
        let now = Utc::now();
        Self {
            customer_id: Uuid::new_v4(),
            email: normalize_email(email),
            first_name: profile.first_name,
            last_name: profile.last_name,
            company: profile.company,
            job_title: profile.job_title,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Apply a partial profile update; empty strings clear a field.
    pub fn apply_profile_update(&mut self, update: &ProfileUpdate) {
        fn merge(field: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                let trimmed = v.trim();
                *field = if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                };
            }
        }

        merge(&mut self.first_name, &update.first_name);
        merge(&mut self.last_name, &update.last_name);
        merge(&mut self.company, &update.company);
        merge(&mut self.job_title, &update.job_title);
        self.updated_utc = Utc::now();
    }
}

/// Optional profile fields supplied at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema)]
pub struct CustomerProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
}

impl CustomerProfile {
    /// Drop blank values so storage only ever sees `None` or real text.
    pub fn normalized(self) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            first_name: clean(self.first_name),
            last_name: clean(self.last_name),
            company: clean(self.company),
            job_title: clean(self.job_title),
        }
    }
}

/// Partial profile update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
}

/// Outward representation of a customer.
///
/// Absent profile fields render as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CustomerView {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub job_title: String,
}

impl From<&Customer> for CustomerView {
    fn from(c: &Customer) -> Self {
        Self {
            id: c.customer_id,
            email: c.email.clone(),
            first_name: c.first_name.clone().unwrap_or_default(),
            last_name: c.last_name.clone().unwrap_or_default(),
            company: c.company.clone().unwrap_or_default(),
            job_title: c.job_title.clone().unwrap_or_default(),
        }
    }
}

impl From<Customer> for CustomerView {
    fn from(c: Customer) -> Self {
        CustomerView::from(&c)
    }
}

/// Canonical email form used for storage and comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_customer_normalizes_email() {
        let customer = Customer::new("  Alice@Example.COM ", CustomerProfile::default());
        assert_eq!(customer.email, "alice@example.com");
    }

    #[test]
    fn test_view_defaults_missing_fields_to_empty() {
        let customer = Customer::new(
            "a@x.com",
            CustomerProfile {
                company: Some("Acme".to_string()),
                ..Default::default()
            },
        );
        let view = CustomerView::from(&customer);
        assert_eq!(view.company, "Acme");
        assert_eq!(view.first_name, "");
        assert_eq!(view.job_title, "");
    }

    #[test]
    fn test_profile_update_merges_and_clears() {
        let mut customer = Customer::new(
            "a@x.com",
            CustomerProfile {
                first_name: Some("Ada".to_string()),
                company: Some("Acme".to_string()),
                ..Default::default()
            },
        );
        customer.apply_profile_update(&ProfileUpdate {
            last_name: Some(" Lovelace ".to_string()),
            company: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(customer.first_name.as_deref(), Some("Ada"));
        assert_eq!(customer.last_name.as_deref(), Some("Lovelace"));
        assert_eq!(customer.company, None);
    }

    #[test]
    fn test_profile_normalized_drops_blanks() {
        let profile = CustomerProfile {
            first_name: Some("   ".to_string()),
            job_title: Some(" PM ".to_string()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(profile.first_name, None);
        assert_eq!(profile.job_title.as_deref(), Some("PM"));
    }
}
