use super::{quote_ident, quote_literal};
use anyhow::Context;
use postgres::Client;

/// Dollar-quote tag wrapping the anonymous block in [`upsert_user_sql`]
const BLOCK_TAG: &str = "$d3b$";

pub(crate) fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA {}", quote_ident(schema))
}

/// An anonymous block that creates the login role `user` with `password`,
/// or resets the password if the role already exists
pub(crate) fn upsert_user_sql(user: &str, password: &str) -> anyhow::Result<String> {
    if user.contains(BLOCK_TAG) || password.contains(BLOCK_TAG) {
        anyhow::bail!("user name and password may not contain {BLOCK_TAG:?}");
    }
    let ident = quote_ident(user);
    let literal = quote_literal(user);
    let password = quote_literal(password);
    Ok(format!(
        "DO {BLOCK_TAG}
BEGIN
  IF NOT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = {literal}) THEN
    CREATE USER {ident} WITH CONNECTION LIMIT 1000 LOGIN ENCRYPTED PASSWORD {password};
  ELSE
    ALTER USER {ident} WITH ENCRYPTED PASSWORD {password};
  END IF;
END
{BLOCK_TAG}"
    ))
}

pub(crate) fn create_schema(client: &mut Client, schema: &str) -> anyhow::Result<()> {
    tracing::info!("Creating new schema {schema} in database");
    client
        .batch_execute(&create_schema_sql(schema))
        .with_context(|| format!("failed to create schema {schema}"))
}

pub(crate) fn upsert_user(client: &mut Client, user: &str, password: &str) -> anyhow::Result<()> {
    tracing::info!("Upserting user {user} in database");
    client
        .batch_execute(&upsert_user_sql(user, password)?)
        .with_context(|| format!("failed to create or alter user {user}"))
}
