// davbackup/src/backup/db_dump.rs
use chrono::Local;
use futures::TryStreamExt;
use sqlx::mysql::MySqlRow;
use sqlx::{Connection, Executor, MySqlConnection, PgConnection, Row};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use url::Url;

use crate::errors::{BackupError, BackupResult};

/// Declared column types whose values are written without quotes.
const NUMERIC_TYPES: &[&str] = &[
    "tinyint",
    "smallint",
    "mediumint",
    "int",
    "bigint",
    "float",
    "double",
    "decimal",
    "real",
];

/// MySQL column types read as raw bytes.
const BINARY_TYPES: &[&str] = &["binary", "varbinary", "tinyblob", "blob", "mediumblob", "longblob"];

const TABLE_SEPARATOR: &str = "\n\n-- --------------------------------------------------------\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Type as declared in the schema, e.g. `decimal(10,2)`.
    pub declared_type: String,
}

/// A single value read from a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Text(String),
    Binary(Vec<u8>),
}

/// SQL flavour a dump is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Postgres,
}

impl Dialect {
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    pub fn quote_literal(self, value: &str) -> String {
        match self {
            Dialect::MySql => quote_mysql_literal(value),
            Dialect::Postgres => quote_postgres_literal(value),
        }
    }

    /// Hex literal for raw bytes.
    pub fn binary_literal(self, bytes: &[u8]) -> String {
        match self {
            Dialect::MySql => format!("X'{}'", hex::encode(bytes)),
            Dialect::Postgres => format!("'\\x{}'::bytea", hex::encode(bytes)),
        }
    }

    /// Session settings written before the first table.
    fn preamble(self) -> &'static [&'static str] {
        match self {
            Dialect::MySql => &["SET NAMES utf8mb4", "SET FOREIGN_KEY_CHECKS=0"],
            Dialect::Postgres => &["SET client_encoding = 'UTF8'", "SET standard_conforming_strings = on"],
        }
    }

    fn postamble(self) -> &'static [&'static str] {
        match self {
            Dialect::MySql => &["SET FOREIGN_KEY_CHECKS=1"],
            Dialect::Postgres => &[],
        }
    }
}

/// Query interface the dump generator reads a database through.
#[allow(async_fn_in_trait)]
pub trait DumpSource {
    /// Short description for logs and the dump header.
    fn describe(&self) -> String;

    fn dialect(&self) -> Dialect;

    /// Opens a read-only snapshot so all tables are read at one point in time.
    async fn begin_snapshot(&mut self) -> BackupResult<()> {
        Ok(())
    }

    async fn end_snapshot(&mut self) -> BackupResult<()> {
        Ok(())
    }

    async fn table_names(&mut self) -> BackupResult<Vec<String>>;

    /// `CREATE TABLE` statement for `table`, without trailing semicolon.
    async fn create_statement(&mut self, table: &str) -> BackupResult<String>;

    /// Statements the table definition depends on, e.g. sequences.
    async fn before_create(&mut self, _table: &str) -> BackupResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Statements replayed after the table's rows.
    async fn after_data(&mut self, _table: &str) -> BackupResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Insertable columns in table order.
    async fn columns(&mut self, table: &str) -> BackupResult<Vec<Column>>;

    /// Streams every row of `table` into `on_row` from a single query.
    async fn for_each_row<F>(&mut self, table: &str, columns: &[Column], on_row: F) -> BackupResult<()>
    where
        F: FnMut(Vec<SqlValue>) -> BackupResult<()>;
}

/// Writes a schema + data script for every table of `source` to `dump_path`.
///
/// The file is opened in append mode and rows are written as they arrive,
/// so a table never sits in memory. All tables are read inside one
/// snapshot.
///
/// # Returns
/// Number of tables dumped.
pub async fn dump_database<S: DumpSource>(source: &mut S, dump_path: &Path) -> BackupResult<usize> {
    let write_err = |e: std::io::Error| {
        BackupError::database(format!("failed to write dump file {}", dump_path.display()), e)
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dump_path)
        .map_err(write_err)?;
    let mut out = BufWriter::new(file);
    let dialect = source.dialect();

    writeln!(out, "-- Dump of {}", source.describe()).map_err(write_err)?;
    writeln!(out, "-- Generated: {}\n", Local::now().to_rfc2822()).map_err(write_err)?;
    for setting in dialect.preamble() {
        writeln!(out, "{};", setting).map_err(write_err)?;
    }
    writeln!(out).map_err(write_err)?;

    source.begin_snapshot().await?;
    let dumped = dump_tables(source, &mut out).await;
    let closed = source.end_snapshot().await;
    let tables = dumped?;
    closed?;

    for setting in dialect.postamble() {
        writeln!(out, "{};", setting).map_err(write_err)?;
    }
    out.flush().map_err(write_err)?;
    Ok(tables)
}

async fn dump_tables<S: DumpSource, W: Write>(source: &mut S, out: &mut W) -> BackupResult<usize> {
    let tables = source.table_names().await?;
    log::info!("Dumping {} tables from {}", tables.len(), source.describe());

    for table in &tables {
        let rows = dump_table(source, table, out).await?;
        log::debug!("Dumped table {} ({} rows)", table, rows);
    }
    Ok(tables.len())
}

async fn dump_table<S: DumpSource, W: Write>(source: &mut S, table: &str, out: &mut W) -> BackupResult<u64> {
    let write_err = |e: std::io::Error| BackupError::database(format!("failed to write dump of table {}", table), e);
    let dialect = source.dialect();
    let ident = dialect.quote_identifier(table);

    write!(out, "DROP TABLE IF EXISTS {};\n\n", ident).map_err(write_err)?;
    for statement in source.before_create(table).await? {
        write!(out, "{};\n\n", statement).map_err(write_err)?;
    }
    let create = source.create_statement(table).await?;
    let create = create.replacen("CREATE TABLE", "CREATE TABLE IF NOT EXISTS", 1);
    write!(out, "{};\n\n", create).map_err(write_err)?;

    let columns = source.columns(table).await?;
    let numeric: Vec<bool> = columns.iter().map(|c| is_numeric_type(&c.declared_type)).collect();
    let names: Vec<String> = columns.iter().map(|c| dialect.quote_identifier(&c.name)).collect();
    let insert = format!("INSERT INTO {} ({}) VALUES", ident, names.join(", "));

    // A tuple is only written once the next one is seen, so the last can end the statement.
    let mut pending: Option<String> = None;
    let mut written = 0u64;
    source
        .for_each_row(table, &columns, |row| {
            let previous = match pending.take() {
                Some(tuple) => write!(out, "\n\t({}),", tuple),
                None => out.write_all(insert.as_bytes()),
            };
            previous.map_err(write_err)?;
            let values: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, value)| format_value(numeric.get(i).copied().unwrap_or(false), value, dialect))
                .collect();
            pending = Some(values.join(","));
            written += 1;
            Ok(())
        })
        .await?;

    if let Some(tuple) = pending {
        write!(out, "\n\t({});", tuple).map_err(write_err)?;
    }
    for statement in source.after_data(table).await? {
        write!(out, "\n\n{};", statement).map_err(write_err)?;
    }
    out.write_all(TABLE_SEPARATOR.as_bytes()).map_err(write_err)?;
    Ok(written)
}

/// Reduces a declared type to its base name: `decimal(10,2)` → `decimal`,
/// `int unsigned` → `int`, `double precision` → `double`.
pub fn base_type(declared: &str) -> String {
    let lowered = declared.trim().to_ascii_lowercase();
    let head = lowered.split('(').next().unwrap_or_default().trim();
    match head {
        "integer" => "int".to_string(),
        "numeric" => "decimal".to_string(),
        "double precision" => "double".to_string(),
        other => other.split_whitespace().next().unwrap_or_default().to_string(),
    }
}

pub fn is_numeric_type(declared: &str) -> bool {
    NUMERIC_TYPES.contains(&base_type(declared).as_str())
}

pub fn is_binary_type(declared: &str) -> bool {
    BINARY_TYPES.contains(&base_type(declared).as_str())
}

/// Renders one value: numeric columns with a non-empty value stay bare,
/// missing values become `NULL`, bytes become hex literals, everything
/// else is quoted.
pub fn format_value(numeric: bool, value: &SqlValue, dialect: Dialect) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Text(v) if numeric && !v.is_empty() => v.clone(),
        SqlValue::Text(v) => dialect.quote_literal(v),
        SqlValue::Binary(bytes) => dialect.binary_literal(bytes),
    }
}

/// MySQL string literal with the escapes `mysql_real_escape_string` applies.
pub fn quote_mysql_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\0' => quoted.push_str("\\0"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '"' => quoted.push_str("\\\""),
            '\x1a' => quoted.push_str("\\Z"),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}

pub fn quote_postgres_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Reads a metadata column as text. MySQL reports some metadata as binary
/// strings, so those are accepted too.
fn text_at(row: &MySqlRow, index: usize) -> BackupResult<Option<String>> {
    match row.try_get::<Option<String>, _>(index) {
        Ok(value) => Ok(value),
        Err(_) => Ok(row
            .try_get::<Option<Vec<u8>>, _>(index)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())),
    }
}

fn required_text(row: &MySqlRow, index: usize, what: &str) -> BackupResult<String> {
    text_at(row, index)?.ok_or_else(|| BackupError::database(format!("missing {}", what), "NULL value"))
}

/// Reads a data column. Text that does not decode as UTF-8 is kept as bytes.
fn mysql_value(row: &MySqlRow, index: usize, binary: bool) -> BackupResult<SqlValue> {
    if !binary {
        if let Ok(text) = row.try_get::<Option<String>, _>(index) {
            return Ok(text.map_or(SqlValue::Null, SqlValue::Text));
        }
    }
    let bytes = row.try_get::<Option<Vec<u8>>, _>(index)?;
    Ok(bytes.map_or(SqlValue::Null, SqlValue::Binary))
}

pub struct MySqlSource {
    conn: MySqlConnection,
    database: String,
}

impl DumpSource for MySqlSource {
    fn describe(&self) -> String {
        format!("MySQL database '{}'", self.database)
    }

    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn begin_snapshot(&mut self) -> BackupResult<()> {
        let snapshot_err = |e: sqlx::Error| BackupError::database("failed to start snapshot", e);
        self.conn
            .execute("SET SESSION TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .await
            .map_err(snapshot_err)?;
        self.conn
            .execute("START TRANSACTION WITH CONSISTENT SNAPSHOT, READ ONLY")
            .await
            .map_err(snapshot_err)?;
        Ok(())
    }

    async fn end_snapshot(&mut self) -> BackupResult<()> {
        self.conn
            .execute("COMMIT")
            .await
            .map_err(|e| BackupError::database("failed to close snapshot", e))?;
        Ok(())
    }

    async fn table_names(&mut self) -> BackupResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT CAST(table_name AS CHAR) FROM information_schema.tables
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'
             ORDER BY table_name",
        )
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| BackupError::database("failed to list tables", e))?;

        rows.iter().map(|row| required_text(row, 0, "table name")).collect()
    }

    async fn create_statement(&mut self, table: &str) -> BackupResult<String> {
        let row = sqlx::query(&format!("SHOW CREATE TABLE {}", Dialect::MySql.quote_identifier(table)))
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| BackupError::database(format!("failed to read structure of {}", table), e))?;
        required_text(&row, 1, "create statement")
    }

    async fn columns(&mut self, table: &str) -> BackupResult<Vec<Column>> {
        // generated columns are recomputed on insert
        let rows = sqlx::query(
            "SELECT CAST(column_name AS CHAR), CAST(column_type AS CHAR)
             FROM information_schema.columns
             WHERE table_schema = DATABASE() AND table_name = ?
               AND COALESCE(generation_expression, '') = ''
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| BackupError::database(format!("failed to read columns of {}", table), e))?;

        rows.iter()
            .map(|row| {
                Ok(Column {
                    name: required_text(row, 0, "column name")?,
                    declared_type: required_text(row, 1, "column type")?,
                })
            })
            .collect()
    }

    async fn for_each_row<F>(&mut self, table: &str, columns: &[Column], mut on_row: F) -> BackupResult<()>
    where
        F: FnMut(Vec<SqlValue>) -> BackupResult<()>,
    {
        if columns.is_empty() {
            return Ok(());
        }
        let binary: Vec<bool> = columns.iter().map(|c| is_binary_type(&c.declared_type)).collect();
        let select: Vec<String> = columns
            .iter()
            .zip(&binary)
            .map(|(c, &raw)| {
                let ident = Dialect::MySql.quote_identifier(&c.name);
                if raw { ident } else { format!("CAST({} AS CHAR)", ident) }
            })
            .collect();
        let query = format!("SELECT {} FROM {}", select.join(", "), Dialect::MySql.quote_identifier(table));
        let fetch_err = |e: sqlx::Error| BackupError::database(format!("failed to fetch rows from {}", table), e);

        let mut rows = sqlx::query(&query).fetch(&mut self.conn);
        while let Some(row) = rows.try_next().await.map_err(fetch_err)? {
            let values = binary
                .iter()
                .enumerate()
                .map(|(i, &raw)| mysql_value(&row, i, raw))
                .collect::<BackupResult<Vec<_>>>()?;
            on_row(values)?;
        }
        Ok(())
    }
}

pub struct PgSource {
    conn: PgConnection,
    database: String,
}

/// A sequence feeding one column of a table.
struct OwnedSequence {
    /// Schema-qualified, already quoted where needed.
    name: String,
    column: String,
    identity: bool,
}

impl PgSource {
    async fn sequences(&mut self, table: &str) -> BackupResult<Vec<OwnedSequence>> {
        let rows = sqlx::query(
            "SELECT pg_get_serial_sequence($1::text, a.attname)::text, a.attname::text,
                    a.attidentity IN ('a', 'd')
             FROM pg_attribute a
             WHERE a.attrelid = $1::text::regclass AND a.attnum > 0 AND NOT a.attisdropped
               AND pg_get_serial_sequence($1::text, a.attname) IS NOT NULL
             ORDER BY a.attnum",
        )
        .bind(Dialect::Postgres.quote_identifier(table))
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| BackupError::database(format!("failed to read sequences of {}", table), e))?;

        rows.iter()
            .map(|row| {
                Ok(OwnedSequence {
                    name: row.try_get(0)?,
                    column: row.try_get(1)?,
                    identity: row.try_get(2)?,
                })
            })
            .collect()
    }
}

impl DumpSource for PgSource {
    fn describe(&self) -> String {
        format!("PostgreSQL database '{}'", self.database)
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn begin_snapshot(&mut self) -> BackupResult<()> {
        self.conn
            .execute("BEGIN ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .await
            .map_err(|e| BackupError::database("failed to start snapshot", e))?;
        Ok(())
    }

    async fn end_snapshot(&mut self) -> BackupResult<()> {
        self.conn
            .execute("COMMIT")
            .await
            .map_err(|e| BackupError::database("failed to close snapshot", e))?;
        Ok(())
    }

    async fn table_names(&mut self) -> BackupResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT table_name::text FROM information_schema.tables
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
             ORDER BY table_name",
        )
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| BackupError::database("failed to list tables", e))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(BackupError::from))
            .collect()
    }

    async fn create_statement(&mut self, table: &str) -> BackupResult<String> {
        let ident = Dialect::Postgres.quote_identifier(table);
        let structure_err = |e: sqlx::Error| BackupError::database(format!("failed to read structure of {}", table), e);

        let rows = sqlx::query(
            "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod), a.attnotnull,
                    pg_get_expr(d.adbin, d.adrelid), a.attidentity IN ('a', 'd'), a.attgenerated = 's'
             FROM pg_attribute a
             LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
             WHERE a.attrelid = $1::regclass AND a.attnum > 0 AND NOT a.attisdropped
             ORDER BY a.attnum",
        )
        .bind(&ident)
        .fetch_all(&mut self.conn)
        .await
        .map_err(structure_err)?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get(0)?;
            let data_type: String = row.try_get(1)?;
            let not_null: bool = row.try_get(2)?;
            let default: Option<String> = row.try_get(3)?;
            let identity: bool = row.try_get(4)?;
            let generated: bool = row.try_get(5)?;

            let mut line = format!("  {} {}", Dialect::Postgres.quote_identifier(&name), data_type);
            match default {
                Some(expr) if generated => line.push_str(&format!(" GENERATED ALWAYS AS ({}) STORED", expr)),
                Some(expr) => line.push_str(&format!(" DEFAULT {}", expr)),
                None => {}
            }
            if identity {
                line.push_str(" GENERATED BY DEFAULT AS IDENTITY");
            }
            if not_null {
                line.push_str(" NOT NULL");
            }
            lines.push(line);
        }

        let constraints = sqlx::query(
            "SELECT conname::text, pg_get_constraintdef(oid)
             FROM pg_constraint
             WHERE conrelid = $1::regclass AND contype IN ('p', 'u', 'c')
             ORDER BY CASE contype WHEN 'p' THEN 0 WHEN 'u' THEN 1 ELSE 2 END, conname",
        )
        .bind(&ident)
        .fetch_all(&mut self.conn)
        .await
        .map_err(structure_err)?;

        for row in &constraints {
            let name: String = row.try_get(0)?;
            let definition: String = row.try_get(1)?;
            lines.push(format!("  CONSTRAINT {} {}", Dialect::Postgres.quote_identifier(&name), definition));
        }

        Ok(format!("CREATE TABLE {} (\n{}\n)", ident, lines.join(",\n")))
    }

    async fn before_create(&mut self, table: &str) -> BackupResult<Vec<String>> {
        Ok(self
            .sequences(table)
            .await?
            .into_iter()
            .filter(|s| !s.identity)
            .map(|s| format!("CREATE SEQUENCE IF NOT EXISTS {}", s.name))
            .collect())
    }

    async fn after_data(&mut self, table: &str) -> BackupResult<Vec<String>> {
        let mut statements = Vec::new();
        for sequence in self.sequences(table).await? {
            if !sequence.identity {
                statements.push(format!(
                    "ALTER SEQUENCE {} OWNED BY {}.{}",
                    sequence.name,
                    Dialect::Postgres.quote_identifier(table),
                    Dialect::Postgres.quote_identifier(&sequence.column)
                ));
            }
            let row = sqlx::query(&format!("SELECT last_value::text, is_called FROM {}", sequence.name))
                .fetch_one(&mut self.conn)
                .await
                .map_err(|e| BackupError::database(format!("failed to read sequence {}", sequence.name), e))?;
            let last_value: String = row.try_get(0)?;
            let is_called: bool = row.try_get(1)?;
            statements.push(format!(
                "SELECT setval({}, {}, {})",
                quote_postgres_literal(&sequence.name),
                last_value,
                is_called
            ));
        }
        Ok(statements)
    }

    async fn columns(&mut self, table: &str) -> BackupResult<Vec<Column>> {
        let rows = sqlx::query(
            "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod)
             FROM pg_attribute a
             WHERE a.attrelid = $1::regclass AND a.attnum > 0 AND NOT a.attisdropped
               AND a.attgenerated <> 's'
             ORDER BY a.attnum",
        )
        .bind(Dialect::Postgres.quote_identifier(table))
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| BackupError::database(format!("failed to read columns of {}", table), e))?;

        rows.iter()
            .map(|row| {
                Ok(Column {
                    name: row.try_get(0)?,
                    declared_type: row.try_get(1)?,
                })
            })
            .collect()
    }

    async fn for_each_row<F>(&mut self, table: &str, columns: &[Column], mut on_row: F) -> BackupResult<()>
    where
        F: FnMut(Vec<SqlValue>) -> BackupResult<()>,
    {
        if columns.is_empty() {
            return Ok(());
        }
        // bytea renders as `\x…` text, which is valid bytea input
        let select: Vec<String> = columns
            .iter()
            .map(|c| format!("{}::text", Dialect::Postgres.quote_identifier(&c.name)))
            .collect();
        let query = format!("SELECT {} FROM {}", select.join(", "), Dialect::Postgres.quote_identifier(table));
        let fetch_err = |e: sqlx::Error| BackupError::database(format!("failed to fetch rows from {}", table), e);

        let mut rows = sqlx::query(&query).fetch(&mut self.conn);
        while let Some(row) = rows.try_next().await.map_err(fetch_err)? {
            let values = (0..columns.len())
                .map(|i| {
                    let value: Option<String> = row.try_get(i)?;
                    Ok(value.map_or(SqlValue::Null, SqlValue::Text))
                })
                .collect::<BackupResult<Vec<_>>>()?;
            on_row(values)?;
        }
        Ok(())
    }
}

/// An open database connection, chosen by the URL scheme.
pub enum DatabaseConnection {
    MySql(MySqlSource),
    Postgres(PgSource),
}

impl DatabaseConnection {
    /// Connects to `mysql://…` or `postgres://…`.
    pub async fn connect(database_url: &str) -> BackupResult<Self> {
        let parsed = Url::parse(database_url)
            .map_err(|e| BackupError::config(format!("invalid database URL: {}", e)))?;
        let database = parsed.path().trim_start_matches('/').to_string();
        if database.is_empty() {
            return Err(BackupError::config("database URL must name a database"));
        }
        log::info!("Connecting to {} database '{}' on {}", parsed.scheme(), database, parsed.host_str().unwrap_or("localhost"));

        match parsed.scheme() {
            "mysql" | "mariadb" => {
                let conn = MySqlConnection::connect(database_url)
                    .await
                    .map_err(|e| BackupError::database(format!("failed to connect to {}", database), e))?;
                Ok(DatabaseConnection::MySql(MySqlSource { conn, database }))
            }
            "postgres" | "postgresql" => {
                let conn = PgConnection::connect(database_url)
                    .await
                    .map_err(|e| BackupError::database(format!("failed to connect to {}", database), e))?;
                Ok(DatabaseConnection::Postgres(PgSource { conn, database }))
            }
            other => Err(BackupError::config(format!("unsupported database driver '{}'", other))),
        }
    }
}

impl DumpSource for DatabaseConnection {
    fn describe(&self) -> String {
        match self {
            DatabaseConnection::MySql(s) => s.describe(),
            DatabaseConnection::Postgres(s) => s.describe(),
        }
    }

    fn dialect(&self) -> Dialect {
        match self {
            DatabaseConnection::MySql(s) => s.dialect(),
            DatabaseConnection::Postgres(s) => s.dialect(),
        }
    }

    async fn begin_snapshot(&mut self) -> BackupResult<()> {
        match self {
            DatabaseConnection::MySql(s) => s.begin_snapshot().await,
            DatabaseConnection::Postgres(s) => s.begin_snapshot().await,
        }
    }

    async fn end_snapshot(&mut self) -> BackupResult<()> {
        match self {
            DatabaseConnection::MySql(s) => s.end_snapshot().await,
            DatabaseConnection::Postgres(s) => s.end_snapshot().await,
        }
    }

    async fn table_names(&mut self) -> BackupResult<Vec<String>> {
        match self {
            DatabaseConnection::MySql(s) => s.table_names().await,
            DatabaseConnection::Postgres(s) => s.table_names().await,
        }
    }

    async fn create_statement(&mut self, table: &str) -> BackupResult<String> {
        match self {
            DatabaseConnection::MySql(s) => s.create_statement(table).await,
            DatabaseConnection::Postgres(s) => s.create_statement(table).await,
        }
    }

    async fn before_create(&mut self, table: &str) -> BackupResult<Vec<String>> {
        match self {
            DatabaseConnection::MySql(s) => s.before_create(table).await,
            DatabaseConnection::Postgres(s) => s.before_create(table).await,
        }
    }

    async fn after_data(&mut self, table: &str) -> BackupResult<Vec<String>> {
        match self {
            DatabaseConnection::MySql(s) => s.after_data(table).await,
            DatabaseConnection::Postgres(s) => s.after_data(table).await,
        }
    }

    async fn columns(&mut self, table: &str) -> BackupResult<Vec<Column>> {
        match self {
            DatabaseConnection::MySql(s) => s.columns(table).await,
            DatabaseConnection::Postgres(s) => s.columns(table).await,
        }
    }

    async fn for_each_row<F>(&mut self, table: &str, columns: &[Column], on_row: F) -> BackupResult<()>
    where
        F: FnMut(Vec<SqlValue>) -> BackupResult<()>,
    {
        match self {
            DatabaseConnection::MySql(s) => s.for_each_row(table, columns, on_row).await,
            DatabaseConnection::Postgres(s) => s.for_each_row(table, columns, on_row).await,
        }
    }
}
