use super::{qualified_table, quote_ident};
use anyhow::Context;
use csv::StringRecord;
use postgres::Client;
use postgres::types::ToSql;
use std::fs::File;
use std::io::Read;
use std::num::NonZeroUsize;
use std::path::Path;

pub(crate) const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(n) => n,
    None => panic!("batch size must be nonzero"),
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct SaveOptions {
    /// Number of rows read from the file and inserted per transaction
    pub(crate) batch_size: NonZeroUsize,
    /// Columns making up the table's primary key
    pub(crate) primary_key: Vec<String>,
    /// Overwrite rows whose primary key is already present
    pub(crate) upsert_rows: bool,
}

impl Default for SaveOptions {
    fn default() -> SaveOptions {
        SaveOptions {
            batch_size: DEFAULT_BATCH_SIZE,
            primary_key: Vec::new(),
            upsert_rows: false,
        }
    }
}

/// The SQL statements for loading one CSV layout into one table
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct TableLoad {
    table: String,
    columns: Vec<String>,
    primary_key: Vec<String>,
    upsert_rows: bool,
}

impl TableLoad {
    pub(crate) fn new(
        schema: &str,
        table: &str,
        header: &StringRecord,
        options: &SaveOptions,
    ) -> anyhow::Result<TableLoad> {
        let columns = header.iter().map(ToOwned::to_owned).collect::<Vec<_>>();
        if columns.is_empty() {
            anyhow::bail!("CSV file has no columns");
        }
        for pk in &options.primary_key {
            if !columns.contains(pk) {
                anyhow::bail!("primary key column {pk:?} is not in the CSV header");
            }
        }
        if options.upsert_rows && options.primary_key.is_empty() {
            anyhow::bail!("upserting rows requires at least one primary key column");
        }
        Ok(TableLoad {
            table: qualified_table(schema, table),
            columns,
            primary_key: options.primary_key.clone(),
            upsert_rows: options.upsert_rows,
        })
    }

    /// `CREATE TABLE IF NOT EXISTS` with every column typed as text
    pub(crate) fn create_table_sql(&self) -> String {
        let mut defs = self
            .columns
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect::<Vec<_>>();
        if !self.primary_key.is_empty() {
            defs.push(format!("PRIMARY KEY ({})", ident_list(&self.primary_key)));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            defs.join(", ")
        )
    }

    /// Single-row `INSERT` with one bound parameter per column
    pub(crate) fn insert_sql(&self) -> String {
        let placeholders = (1..=self.columns.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            self.table,
            ident_list(&self.columns)
        );
        if self.upsert_rows {
            let updates = self
                .columns
                .iter()
                .map(|c| {
                    let c = quote_ident(c);
                    format!("{c} = EXCLUDED.{c}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ON CONFLICT (");
            sql.push_str(&ident_list(&self.primary_key));
            sql.push_str(") DO UPDATE SET ");
            sql.push_str(&updates);
        }
        sql
    }

    /// Insert `rows` in a single transaction and return how many were
    /// written
    pub(crate) fn insert_batch(
        &self,
        client: &mut Client,
        rows: &[StringRecord],
    ) -> anyhow::Result<u64> {
        let mut tx = client.transaction().context("failed to start transaction")?;
        let stmt = tx
            .prepare(&self.insert_sql())
            .with_context(|| format!("failed to prepare insert into {}", self.table))?;
        let mut written = 0;
        for record in rows {
            let values = row_values(record);
            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(values.len());
            for v in &values {
                params.push(v);
            }
            written += tx
                .execute(&stmt, &params)
                .with_context(|| format!("failed to insert row into {}", self.table))?;
        }
        tx.commit()
            .with_context(|| format!("failed to commit batch to {}", self.table))?;
        Ok(written)
    }
}

fn ident_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bind values for a CSV record; empty fields become NULL
fn row_values(record: &StringRecord) -> Vec<Option<&str>> {
    record
        .iter()
        .map(|v| (!v.is_empty()).then_some(v))
        .collect()
}

/// Read up to `size` records; an empty batch means the input is exhausted
pub(crate) fn read_batch<R: Read>(
    reader: &mut csv::Reader<R>,
    size: NonZeroUsize,
) -> csv::Result<Vec<StringRecord>> {
    let mut batch = Vec::new();
    for record in reader.records() {
        batch.push(record?);
        if batch.len() >= size.get() {
            break;
        }
    }
    Ok(batch)
}

/// Stream the CSV at `path` into `schema.table` in batches, creating the
/// table first if it does not exist.  Returns the number of rows loaded.
pub(crate) fn save_file_to_db(
    client: &mut Client,
    path: &Path,
    schema: &str,
    table: &str,
    options: &SaveOptions,
) -> anyhow::Result<u64> {
    tracing::info!(
        "Starting to load {} into {schema}.{table}",
        path.display()
    );
    let fp = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(fp);
    let header = reader
        .headers()
        .with_context(|| format!("failed to read CSV header from {}", path.display()))?
        .clone();
    let load = TableLoad::new(schema, table, &header, options)?;
    let mut created = false;
    let mut count = 0;
    loop {
        let batch = read_batch(&mut reader, options.batch_size)
            .with_context(|| format!("failed to read CSV rows from {}", path.display()))?;
        if batch.is_empty() {
            break;
        }
        if !created {
            client
                .batch_execute(&load.create_table_sql())
                .with_context(|| format!("failed to create table {schema}.{table}"))?;
            created = true;
        }
        count += load.insert_batch(client, &batch)?;
        tracing::info!("-- Loaded {count} total rows");
    }
    if count == 0 {
        tracing::warn!("{} has no rows; nothing to load", path.display());
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header() -> StringRecord {
        StringRecord::from(vec!["id", "name", "note"])
    }

    #[test]
    fn create_table_without_primary_key() {
        let load = TableLoad::new("public", "people", &header(), &SaveOptions::default()).unwrap();
        assert_eq!(
            load.create_table_sql(),
            r#"CREATE TABLE IF NOT EXISTS "public"."people" ("id" TEXT, "name" TEXT, "note" TEXT)"#
        );
        assert_eq!(
            load.insert_sql(),
            r#"INSERT INTO "public"."people" ("id", "name", "note") VALUES ($1, $2, $3)"#
        );
    }

    #[test]
    fn upsert_on_primary_key() {
        let options = SaveOptions {
            primary_key: vec!["id".into()],
            upsert_rows: true,
            ..SaveOptions::default()
        };
        let load = TableLoad::new("s", "t", &header(), &options).unwrap();
        assert_eq!(
            load.create_table_sql(),
            r#"CREATE TABLE IF NOT EXISTS "s"."t" ("id" TEXT, "name" TEXT, "note" TEXT, PRIMARY KEY ("id"))"#
        );
        assert_eq!(
            load.insert_sql(),
            concat!(
                r#"INSERT INTO "s"."t" ("id", "name", "note") VALUES ($1, $2, $3)"#,
                r#" ON CONFLICT ("id") DO UPDATE SET "id" = EXCLUDED."id", "name" = EXCLUDED."name", "note" = EXCLUDED."note""#,
            )
        );
    }

    #[test]
    fn upsert_requires_primary_key() {
        let options = SaveOptions {
            upsert_rows: true,
            ..SaveOptions::default()
        };
        assert!(TableLoad::new("s", "t", &header(), &options).is_err());
    }

    #[test]
    fn primary_key_must_be_a_column() {
        let options = SaveOptions {
            primary_key: vec!["missing".into()],
            ..SaveOptions::default()
        };
        assert!(TableLoad::new("s", "t", &header(), &options).is_err());
    }

    #[test]
    fn batches_split_records() {
        let data = "a,b\n1,2\n3,4\n5,6\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let size = NonZeroUsize::new(2).unwrap();
        let first = read_batch(&mut reader, size).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(&first[1], &StringRecord::from(vec!["3", "4"]));
        let second = read_batch(&mut reader, size).unwrap();
        assert_eq!(second, vec![StringRecord::from(vec!["5", "6"])]);
        assert!(read_batch(&mut reader, size).unwrap().is_empty());
    }

    #[test]
    fn empty_fields_are_null() {
        let record = StringRecord::from(vec!["x", "", "y"]);
        assert_eq!(row_values(&record), vec![Some("x"), None, Some("y")]);
    }
}
