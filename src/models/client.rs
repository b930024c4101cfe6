//! Client relationship records

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ClientStatus {
    Active,
    Deactivated,
    Blacklisted,
}

impl ClientStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Deactivated => "Deactivated",
            Self::Blacklisted => "Blacklisted",
        }
    }
}

/// Client record
#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: Option<String>,
    pub notes: Option<String>,
    pub joined_date: Option<NaiveDate>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub tax_id: Option<String>,
    pub default_currency: Option<String>,
    pub default_tax_rate: Option<f64>,
    pub payment_terms: Option<String>,
    pub discount_rate: Option<f64>,
    pub status: ClientStatus,
    pub created_by: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

/// One page of the client listing
#[derive(Debug, Clone, Deserialize)]
pub struct ClientList {
    pub data: Vec<Client>,
    pub meta: PageMeta,
}

/// Optional client fields shared by create and update; unset fields are
/// left out of the payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// ISO 3166 alpha-2
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    /// ISO 4217, e.g. USD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_currency: Option<String>,
    /// Percent, 0 to 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_tax_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_terms: Option<String>,
    /// Percent, 0 to 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<f64>,
}

impl ClientDetails {
    pub fn is_empty(&self) -> bool {
        self.company.is_none()
            && self.notes.is_none()
            && self.joined_date.is_none()
            && self.address_line1.is_none()
            && self.address_line2.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.postal_code.is_none()
            && self.country.is_none()
            && self.tax_id.is_none()
            && self.default_currency.is_none()
            && self.default_tax_rate.is_none()
            && self.payment_terms.is_none()
            && self.discount_rate.is_none()
    }

    /// Check the bounds the server enforces, so bad input fails before a
    /// request is made.
    pub fn validate(&self) -> Result<(), String> {
        for (name, rate) in [
            ("default_tax_rate", self.default_tax_rate),
            ("discount_rate", self.discount_rate),
        ] {
            if let Some(rate) = rate {
                if !(0.0..=100.0).contains(&rate) {
                    return Err(format!("{} must be between 0 and 100", name));
                }
            }
        }
        if let Some(country) = &self.country {
            if country.chars().count() != 2 {
                return Err("country must be a two-letter code".to_string());
            }
        }
        if let Some(currency) = &self.default_currency {
            if currency.chars().count() != 3 {
                return Err("default_currency must be a three-letter code".to_string());
            }
        }
        Ok(())
    }
}

/// Payload for creating a client. Name, email and phone are required.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientCreate {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(flatten)]
    pub details: ClientDetails,
}

/// Partial update; only set fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClientStatus>,
    #[serde(flatten)]
    pub details: ClientDetails,
}

impl ClientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.status.is_none()
            && self.details.is_empty()
    }
}
