//! Database connection utilities.

use switchy_database::Database;
use switchy_database_connection::Credentials;

use crate::DbError;

/// Connects to the `PostgreSQL` database at `url`.
///
/// Configures a 120-second `statement_timeout` so a stalled visit query
/// fails with an error instead of hanging the run.
///
/// # Errors
///
/// Returns [`DbError`] if the URL cannot be parsed or the connection fails.
pub async fn connect(url: &str) -> Result<Box<dyn Database>, DbError> {
    // Credentials::from_url doesn't understand query parameters such as
    // ?sslmode=require. TLS is negotiated by the native-tls connector.
    let url_base = url.split('?').next().unwrap_or(url);

    let creds = Credentials::from_url(url_base).map_err(|e| DbError::Connection {
        message: format!("invalid database URL: {e}"),
    })?;

    let db = switchy_database_connection::init_postgres_raw_native_tls(creds)
        .await
        .map_err(|e| DbError::Connection {
            message: e.to_string(),
        })?;

    db.exec_raw("SET statement_timeout = '120s'").await?;

    Ok(db)
}

/// Strips the password from a database URL for logging.
#[must_use]
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    let user = userinfo.split(':').next().unwrap_or(userinfo);
    format!("{scheme}://{user}:***@{host}")
}
