//! Company profile (/api/company-profile)
//!
//! The server takes multipart forms here, including for partial updates.

use anyhow::{bail, Context, Result};
use reqwest::Method;
use std::path::{Path, PathBuf};

use super::client::{ApiClient, ApiRequest, FormField};
use crate::models::CompanyProfile;

const COMPANY_PATH: &str = "/api/company-profile";

/// Editable profile fields; unset fields are left out of the form.
#[derive(Debug, Clone, Default)]
pub struct CompanyFields {
    pub company_name: Option<String>,
    pub company_email: Option<String>,
    pub company_mobile: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub tax_rate: Option<f64>,
    pub status: Option<String>,
}

impl CompanyFields {
    fn form_fields(&self) -> Vec<FormField> {
        let tax_rate = self.tax_rate.map(|r| r.to_string());
        [
            ("company_name", self.company_name.as_ref()),
            ("company_email", self.company_email.as_ref()),
            ("company_mobile", self.company_mobile.as_ref()),
            ("address1", self.address1.as_ref()),
            ("address2", self.address2.as_ref()),
            ("city", self.city.as_ref()),
            ("state", self.state.as_ref()),
            ("zip_code", self.zip_code.as_ref()),
            ("tax_rate", tax_rate.as_ref()),
            ("status", self.status.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value.map(|v| FormField::Text {
                name: name.to_string(),
                value: v.clone(),
            })
        })
        .collect()
    }
}

/// Onboarding form for a new tenant. Every profile field except `status`
/// is required by the server.
#[derive(Debug, Clone)]
pub struct CompanyRegistration {
    pub profile: CompanyFields,
    pub logo: PathBuf,
    pub admin_username: String,
    pub admin_email: String,
    pub admin_password: String,
}

impl CompanyRegistration {
    fn missing_fields(&self) -> Vec<&'static str> {
        let p = &self.profile;
        [
            ("company_name", p.company_name.is_none()),
            ("company_email", p.company_email.is_none()),
            ("company_mobile", p.company_mobile.is_none()),
            ("address1", p.address1.is_none()),
            ("address2", p.address2.is_none()),
            ("city", p.city.is_none()),
            ("state", p.state.is_none()),
            ("zip_code", p.zip_code.is_none()),
            ("tax_rate", p.tax_rate.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }
}

fn print_profile(p: &CompanyProfile) {
    println!();
    println!("Company: {}", p.company_name);
    println!("Email:   {}", p.company_email);
    println!("Mobile:  {}", p.company_mobile);
    let address: Vec<&str> = [
        p.address1.as_deref(),
        p.address2.as_deref(),
        p.city.as_deref(),
        p.state.as_deref(),
        p.zip_code.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|s| !s.is_empty())
    .collect();
    println!("Address: {}", address.join(", "));
    if let Some(rate) = p.tax_rate {
        println!("Tax:     {}%", rate);
    }
    println!("Status:  {}", p.status.as_deref().unwrap_or("(unknown)"));
    if let Some(db) = &p.db_name {
        println!("Tenant:  {}", db);
    }
    if let Some(logo) = &p.logo_url {
        println!("Logo:    {}", logo);
    }
}

/// Load a logo image as the `logoFile` form part.
async fn read_logo(path: &Path) -> Result<FormField> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read logo {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "logo".to_string());
    Ok(FormField::File {
        name: "logoFile".to_string(),
        file_name,
        bytes,
    })
}

pub async fn show_company() -> Result<()> {
    let client = super::connect()?;
    let result = client
        .get_json::<CompanyProfile>(COMPANY_PATH)
        .await
        .context("Failed to load company profile");
    let profile = super::hint_login(&client, result)?;
    print_profile(&profile);
    Ok(())
}

pub async fn update_company_data(
    client: &ApiClient,
    fields: &CompanyFields,
    logo: Option<FormField>,
) -> Result<CompanyProfile> {
    let mut form = fields.form_fields();
    form.extend(logo);
    if form.is_empty() {
        bail!("Nothing to update. Pass at least one field or --logo.");
    }
    let request = ApiRequest::new(Method::PUT, COMPANY_PATH).multipart(form);
    client
        .send_json(request)
        .await
        .context("Failed to update company profile")
}

pub async fn update_company(fields: CompanyFields, logo: Option<PathBuf>) -> Result<()> {
    let logo = match logo {
        Some(path) => Some(read_logo(&path).await?),
        None => None,
    };
    let client = super::connect()?;
    let result = update_company_data(&client, &fields, logo).await;
    let profile = super::hint_login(&client, result)?;
    println!("Company profile updated.");
    print_profile(&profile);
    Ok(())
}

/// Register a new company and its admin user.
pub async fn register_company(registration: CompanyRegistration) -> Result<()> {
    let missing = registration.missing_fields();
    if !missing.is_empty() {
        bail!("Missing required fields: {}", missing.join(", "));
    }

    let logo = read_logo(&registration.logo).await?;

    let mut form = registration.profile.form_fields();
    form.extend([
        FormField::Text {
            name: "admin_username".to_string(),
            value: registration.admin_username.clone(),
        },
        FormField::Text {
            name: "admin_email".to_string(),
            value: registration.admin_email.clone(),
        },
        FormField::Text {
            name: "admin_password".to_string(),
            value: registration.admin_password.clone(),
        },
        logo,
    ]);

    let client = super::connect()?;
    let request = ApiRequest::new(Method::POST, COMPANY_PATH).multipart(form);
    let profile: CompanyProfile = client
        .send_json(request)
        .await
        .context("Failed to register company")?;

    println!("Company registered. Log in as '{}'.", registration.admin_username);
    print_profile(&profile);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_names(fields: &[FormField]) -> Vec<&str> {
        fields
            .iter()
            .filter_map(|f| match f {
                FormField::Text { name, .. } => Some(name.as_str()),
                FormField::File { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_form_contains_only_set_fields() {
        let fields = CompanyFields {
            city: Some("Lagos".to_string()),
            tax_rate: Some(7.5),
            ..Default::default()
        };
        let form = fields.form_fields();
        assert_eq!(text_names(&form), vec!["city", "tax_rate"]);
        match &form[1] {
            FormField::Text { value, .. } => assert_eq!(value, "7.5"),
            FormField::File { .. } => panic!("expected text field"),
        }
    }

    #[test]
    fn test_registration_reports_missing_fields() {
        let registration = CompanyRegistration {
            profile: CompanyFields {
                company_name: Some("Acme".to_string()),
                ..Default::default()
            },
            logo: PathBuf::from("logo.png"),
            admin_username: "ada".to_string(),
            admin_email: "ada@example.com".to_string(),
            admin_password: "s3cret".to_string(),
        };
        let missing = registration.missing_fields();
        assert!(!missing.contains(&"company_name"));
        assert!(missing.contains(&"tax_rate"));
        assert_eq!(missing.len(), 8);
    }

    #[tokio::test]
    async fn test_empty_update_is_rejected_locally() {
        let client = ApiClient::new(
            "http://127.0.0.1:9",
            &crate::config::Config::default(),
            crate::auth::MemoryTokenStore::new(),
        )
        .unwrap();
        let err = update_company_data(&client, &CompanyFields::default(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Nothing to update"));
    }

    #[tokio::test]
    async fn test_update_uploads_logo() {
        use wiremock::matchers::{body_string_contains, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let dir = tempfile::tempdir().unwrap();
        let logo_path = dir.path().join("acme.png");
        std::fs::write(&logo_path, b"PNGDATA").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(COMPANY_PATH))
            .and(body_string_contains("name=\"logoFile\"; filename=\"acme.png\""))
            .and(body_string_contains("PNGDATA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "company_name": "Acme",
                "company_email": "hq@acme.test",
                "company_mobile": "+234 800 000 0000"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(
            &server.uri(),
            &crate::config::Config::default(),
            crate::auth::MemoryTokenStore::with_tokens(Some("T1"), None),
        )
        .unwrap();
        let logo = read_logo(&logo_path).await.unwrap();

        let profile = update_company_data(&client, &CompanyFields::default(), Some(logo))
            .await
            .unwrap();
        assert_eq!(profile.company_name, "Acme");
    }
}
