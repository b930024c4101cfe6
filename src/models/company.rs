//! Company profile (tenant onboarding)

use serde::Deserialize;

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyProfile {
    pub company_name: String,
    pub company_email: String,
    pub company_mobile: String,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub tax_rate: Option<f64>,
    pub logo_url: Option<String>,
    pub status: Option<String>,
    pub db_name: Option<String>,
    pub updated_at: Option<String>,
}
