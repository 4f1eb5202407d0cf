use crate::api;
use crate::api::handlers::auth::AuthConfig;
use crate::cli::actions::Action;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            frontend_url,
            token_max_age,
            password_min_length,
        } => {
            let mut auth_config = AuthConfig::new(frontend_url)
                .with_password_min_length(password_min_length);

            if let Some(seconds) = token_max_age {
                auth_config = auth_config.with_token_max_age_seconds(seconds);
            }

            api::new(port, dsn, auth_config).await?;
        }
    }

    Ok(())
}
