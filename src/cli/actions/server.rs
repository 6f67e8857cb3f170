use crate::api;
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            secret,
            token_ttl,
        } => {
            let mut globals = GlobalArgs::new(secret);
            globals.set_token_ttl(token_ttl);

            api::new(port, dsn, &globals).await?;
        }
    }

    Ok(())
}
