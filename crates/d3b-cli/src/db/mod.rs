//! Loading files into Postgres and the admin statements that prepare a
//! database for them
mod admin;
mod save;
pub(crate) use self::admin::*;
pub(crate) use self::save::*;
use anyhow::Context;
use postgres::{Client, NoTls};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything needed to open a connection to a Postgres database
#[derive(Clone, Eq, PartialEq)]
pub(crate) struct DbConnectionParams {
    username: String,
    password: String,
    hostname: String,
    port: String,
    db_name: String,
}

impl DbConnectionParams {
    /// Bundle the connection parameters, failing if any of them is empty
    pub(crate) fn new(
        username: Option<String>,
        password: Option<String>,
        hostname: Option<String>,
        port: Option<String>,
        db_name: Option<String>,
    ) -> Result<DbConnectionParams, DbParamsError> {
        let params = DbConnectionParams {
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
            hostname: hostname.unwrap_or_default(),
            port: port.unwrap_or_default(),
            db_name: db_name.unwrap_or_default(),
        };
        if params.fields().iter().any(|(_, v)| v.trim().is_empty()) {
            Err(DbParamsError(params.masked()))
        } else {
            Ok(params)
        }
    }

    fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("hostname", self.hostname.as_str()),
            ("port", self.port.as_str()),
            ("db_name", self.db_name.as_str()),
        ]
    }

    /// Render the parameters with every character of the password replaced
    /// by `*`
    fn masked(&self) -> String {
        let fields = self.fields().map(|(name, value)| {
            let shown = if name == "password" {
                "*".repeat(value.chars().count())
            } else {
                value.to_owned()
            };
            format!("{name}: {shown:?}")
        });
        format!("{{{}}}", fields.join(", "))
    }

    pub(crate) fn connect(&self) -> anyhow::Result<Client> {
        let port = self
            .port
            .parse::<u16>()
            .with_context(|| format!("invalid database port {:?}", self.port))?;
        tracing::info!(
            host = %self.hostname,
            port,
            db = %self.db_name,
            user = %self.username,
            "Connecting to Postgres"
        );
        postgres::Config::new()
            .host(&self.hostname)
            .port(port)
            .dbname(&self.db_name)
            .user(&self.username)
            .password(&self.password)
            .connect_timeout(CONNECT_TIMEOUT)
            .connect(NoTls)
            .with_context(|| {
                format!(
                    "failed to connect to database {} on {}:{port}",
                    self.db_name, self.hostname
                )
            })
    }
}

impl fmt::Debug for DbConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DbConnectionParams {}", self.masked())
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("not enough inputs to connect to database: {0}")]
pub(crate) struct DbParamsError(String);

/// Quote an SQL identifier, doubling any embedded double quotes
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote an SQL string literal, doubling any embedded single quotes
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `"schema"."table"`
pub(crate) fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn params(password: &str, port: &str) -> Result<DbConnectionParams, DbParamsError> {
        DbConnectionParams::new(
            Some("loader".into()),
            Some(password.into()),
            Some("localhost".into()),
            Some(port.into()),
            Some("warehouse".into()),
        )
    }

    #[test]
    fn missing_param_is_error_with_masked_password() {
        let e = params("hunter2", "").unwrap_err();
        assert_eq!(
            e.to_string(),
            r#"not enough inputs to connect to database: {username: "loader", password: "*******", hostname: "localhost", port: "", db_name: "warehouse"}"#
        );
    }

    #[test]
    fn missing_everything() {
        assert_matches!(
            DbConnectionParams::new(None, None, None, None, None),
            Err(DbParamsError(_))
        );
    }

    #[test]
    fn debug_masks_password() {
        let p = params("s3cret", "5432").unwrap();
        let s = format!("{p:?}");
        assert!(s.contains(r#"password: "******""#), "{s}");
        assert!(!s.contains("s3cret"), "{s}");
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_ident("table"), "\"table\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(qualified_table("public", "Study"), "\"public\".\"Study\"");
    }
}
