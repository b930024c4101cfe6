//! Client relationship records (/api/clients)

use anyhow::{bail, Context, Result};
use reqwest::Method;
use uuid::Uuid;

use super::client::{ApiClient, ApiRequest};
use crate::models::{Client, ClientCreate, ClientList, ClientStatus, ClientUpdate};

const CLIENTS_PATH: &str = "/api/clients";

/// Server-side bound on page_size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filters and paging for the client listing
#[derive(Debug, Clone)]
pub struct ListParams {
    /// Matches name, email or company
    pub q: Option<String>,
    pub status: Option<ClientStatus>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            q: None,
            status: None,
            page: 1,
            page_size: 10,
        }
    }
}

fn client_path(id: Uuid) -> String {
    format!("{}/{}", CLIENTS_PATH, id)
}

fn list_request(params: &ListParams) -> Result<ApiRequest> {
    if params.page < 1 {
        bail!("Page numbers start at 1.");
    }
    if !(1..=MAX_PAGE_SIZE).contains(&params.page_size) {
        bail!("Page size must be between 1 and {}.", MAX_PAGE_SIZE);
    }

    let mut request = ApiRequest::new(Method::GET, CLIENTS_PATH)
        .query("page", params.page)
        .query("page_size", params.page_size);
    if let Some(q) = params.q.as_deref().filter(|q| !q.trim().is_empty()) {
        request = request.query("q", q.trim());
    }
    if let Some(status) = params.status {
        request = request.query("status", status.as_str());
    }
    Ok(request)
}

pub async fn list_clients_data(client: &ApiClient, params: &ListParams) -> Result<ClientList> {
    let request = list_request(params)?;
    client
        .send_json(request)
        .await
        .context("Failed to list clients")
}

fn print_client_line(c: &Client) {
    let company = c.company.as_deref().unwrap_or("-");
    println!("{}  [{}]", c.name, c.status.as_str());
    println!("  ID: {}", c.id);
    println!("  {} | {} | {}", c.email, c.phone, company);
}

fn print_client_detail(c: &Client) {
    print_client_line(c);
    let address: Vec<&str> = [
        c.address_line1.as_deref(),
        c.address_line2.as_deref(),
        c.city.as_deref(),
        c.state.as_deref(),
        c.postal_code.as_deref(),
        c.country.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|s| !s.is_empty())
    .collect();
    if !address.is_empty() {
        println!("  Address: {}", address.join(", "));
    }
    if let Some(date) = c.joined_date {
        println!("  Joined:  {}", date);
    }
    if let Some(terms) = &c.payment_terms {
        println!("  Terms:   {}", terms);
    }
    if let Some(notes) = c.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        println!("  Notes:   {}", notes.trim());
    }
    if let Some(by) = &c.created_by {
        println!("  Created by {} at {}", by, c.created_at.as_deref().unwrap_or("?"));
    }
}

/// List clients (prints to stdout).
pub async fn list_clients(params: ListParams) -> Result<()> {
    let client = super::connect()?;
    let list = super::hint_login(&client, list_clients_data(&client, &params).await)?;

    println!("\nClients:");
    println!("{:-<60}", "");

    if list.data.is_empty() {
        println!("  (no clients found)");
        return Ok(());
    }

    for c in &list.data {
        print_client_line(c);
        println!();
    }

    let pages = list.meta.total.div_ceil(u64::from(list.meta.page_size.max(1)));
    println!(
        "Page {} of {} ({} total)",
        list.meta.page,
        pages.max(1),
        list.meta.total
    );
    Ok(())
}

pub async fn show_client(id: Uuid) -> Result<()> {
    let client = super::connect()?;
    let result = client
        .get_json::<Client>(&client_path(id))
        .await
        .with_context(|| format!("Failed to load client {}", id));
    let record = super::hint_login(&client, result)?;
    print_client_detail(&record);
    Ok(())
}

pub async fn add_client_data(client: &ApiClient, payload: &ClientCreate) -> Result<Client> {
    if let Err(reason) = payload.details.validate() {
        bail!("Invalid client: {}.", reason);
    }
    client
        .post_json(CLIENTS_PATH, payload)
        .await
        .context("Failed to create client")
}

pub async fn add_client(payload: ClientCreate) -> Result<()> {
    let client = super::connect()?;
    let created = super::hint_login(&client, add_client_data(&client, &payload).await)?;
    println!("Client created.");
    print_client_detail(&created);
    Ok(())
}

pub async fn edit_client_data(
    client: &ApiClient,
    id: Uuid,
    update: &ClientUpdate,
) -> Result<Client> {
    if update.is_empty() {
        bail!("Nothing to update. Pass at least one field.");
    }
    if let Err(reason) = update.details.validate() {
        bail!("Invalid client: {}.", reason);
    }
    client
        .put_json(&client_path(id), update)
        .await
        .with_context(|| format!("Failed to update client {}", id))
}

pub async fn edit_client(id: Uuid, update: ClientUpdate) -> Result<()> {
    let client = super::connect()?;
    let updated = super::hint_login(&client, edit_client_data(&client, id, &update).await)?;
    println!("Client updated.");
    print_client_detail(&updated);
    Ok(())
}

pub async fn delete_client(id: Uuid) -> Result<()> {
    let client = super::connect()?;
    let result = client
        .delete(&client_path(id))
        .await
        .with_context(|| format!("Failed to delete client {}", id));
    super::hint_login(&client, result)?;
    println!("Client {} deleted.", id);
    Ok(())
}
