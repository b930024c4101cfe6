//! Identity endpoint (/api/auth/me)

use anyhow::{bail, Result};

use crate::auth::login::{bootstrap, print_identity};

/// Fetch and display the signed-in user and tenant.
pub async fn whoami() -> Result<()> {
    let client = super::connect()?;
    if client.session().token().is_none() {
        bail!("Not logged in. Run 'joslasync login'.");
    }

    match bootstrap(&client).await? {
        Some(me) => {
            print_identity(&me);
            Ok(())
        }
        None => bail!("Session is no longer valid. Run 'joslasync login'."),
    }
}
