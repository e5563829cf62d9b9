//! The direct key-value command console.
//!
//! Grounded on `mermoldy-mysqlite`'s `console.rs`/`repl.rs` for the
//! banner/prompt/dispatch shape and `repl/history.rs` for a persisted
//! history file under the home directory; dropping the teacher's raw-mode
//! `crossterm` line editor (cursor-key history navigation, redraw-on-
//! keystroke) since this console has no SQL multi-line statements to
//! continue across — one line is one command. `crossterm` is kept for
//! colored prompt/error output.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::{execute, ExecutableCommand};

use leafdb::errors::{Error, Result};
use leafdb::storage::{ColumnSchema, ColumnType, ColumnValue, ReadCriteria, Record, TableOptions, TableSchema};

use crate::session::Session;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const BANNER: &str = r#"Type "help" for a list of commands, "quit" to exit.
"#;

const HELP: &str = r#"commands:
  create <table> <field:type,...>           create a table file
  open <table> <field:type,...>             open an existing table file
  insert <table> <field=value,...>          create a record
  get <table> <pk>                          point read
  range <table> <gte> <lte> [limit] [off]   range scan
  scan <table> [limit] [offset]             full scan
  update <table> <pk> <field=value,...>     merge fields onto a record
  delete <table> <pk>                       delete a record
  count <table>                             count records
  close <table>                             close a table's handle
  drop <table>                              close and delete a table file
  tables                                    list table files
  help                                      show this text
  quit                                      exit
types: i32, u32, i64, f32, f64, bool, varchar(N), binary(N), json(N)
"#;

pub fn run(data_dir: PathBuf) -> Result<()> {
    let mut session = Session::open(&data_dir)?;
    let history_path = history_file();
    let mut history = load_history(&history_path);

    echo(format!("leafdb {} — data dir: {}\n", VERSION, data_dir.display()));
    print(BANNER);

    let stdin = io::stdin();
    loop {
        prompt()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            print("\n");
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        append_history(&history_path, line);
        history.push(line.to_string());

        if matches!(line, "quit" | "exit") {
            break;
        }

        match dispatch(&mut session, line) {
            Ok(response) => print(&response),
            Err(e) => error(format!("error: {}\n", e)),
        }
    }

    session.close()
}

/// Runs one command line against `session` and returns its response text
/// (newline-terminated). Shared by the console loop and the socket server
/// so both speak the exact same command surface.
pub fn dispatch(session: &mut Session, line: &str) -> Result<String> {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match cmd {
        "create" => cmd_create(session, rest),
        "open" => cmd_open(session, rest),
        "insert" => cmd_insert(session, rest),
        "get" => cmd_get(session, rest),
        "range" => cmd_range(session, rest),
        "scan" => cmd_scan(session, rest),
        "update" => cmd_update(session, rest),
        "delete" => cmd_delete(session, rest),
        "count" => cmd_count(session, rest),
        "close" => cmd_close(session, rest),
        "drop" => cmd_drop(session, rest),
        "tables" => cmd_tables(session),
        "help" | "?" => Ok(HELP.to_string()),
        other => Err(Error::InvalidRecord(format!("unrecognized command '{}'", other))),
    }
}

fn split_table_and_rest(args: &str) -> Result<(&str, &str)> {
    let mut it = args.splitn(2, ' ');
    let name = it.next().unwrap_or("");
    if name.is_empty() {
        return Err(Error::InvalidRecord("expected a table name".into()));
    }
    Ok((name, it.next().unwrap_or("").trim()))
}

fn cmd_create(session: &mut Session, args: &str) -> Result<String> {
    let (name, spec) = split_table_and_rest(args)?;
    let schema = parse_schema_spec(spec)?;
    session.database.create_table(name, schema.clone(), TableOptions::default())?;
    session.remember_schema(name, schema);
    Ok(format!("created table '{}'\n", name))
}

fn cmd_open(session: &mut Session, args: &str) -> Result<String> {
    let (name, spec) = split_table_and_rest(args)?;
    let schema = parse_schema_spec(spec)?;
    session.database.open_table(name, schema.clone(), TableOptions::default())?;
    session.remember_schema(name, schema);
    Ok(format!("opened table '{}'\n", name))
}

fn cmd_insert(session: &mut Session, args: &str) -> Result<String> {
    let (name, spec) = split_table_and_rest(args)?;
    let schema = session
        .schema(name)
        .ok_or_else(|| Error::NotFound(format!("no known schema for table '{}'", name)))?
        .clone();
    let record = parse_record(&schema, spec)?;
    session.database.table(name)?.create(&record)?;
    Ok("ok\n".to_string())
}

fn cmd_get(session: &mut Session, args: &str) -> Result<String> {
    let (name, pk_str) = split_table_and_rest(args)?;
    let pk = parse_u32(pk_str)?;
    let rows = session.database.table(name)?.read(ReadCriteria::Point(pk))?;
    Ok(format!("{}\n", display_record(&rows[0])))
}

fn cmd_range(session: &mut Session, args: &str) -> Result<String> {
    let (name, rest) = split_table_and_rest(args)?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(Error::InvalidRecord("usage: range <table> <gte> <lte> [limit] [offset]".into()));
    }
    let gte = parse_u32(fields[0])?;
    let lte = parse_u32(fields[1])?;
    let limit = fields.get(2).map(|s| s.parse().unwrap_or(100)).unwrap_or(100);
    let offset = fields.get(3).map(|s| s.parse().unwrap_or(0)).unwrap_or(0);
    let rows = session.database.table(name)?.read(ReadCriteria::Range {
        gte,
        lte,
        limit,
        offset,
        filter: vec![],
    })?;
    Ok(render_rows(&rows))
}

fn cmd_scan(session: &mut Session, args: &str) -> Result<String> {
    let (name, rest) = split_table_and_rest(args)?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let limit = fields.first().map(|s| s.parse().unwrap_or(100)).unwrap_or(100);
    let offset = fields.get(1).map(|s| s.parse().unwrap_or(0)).unwrap_or(0);
    let rows = session.database.table(name)?.read(ReadCriteria::Scan {
        limit,
        offset,
        filter: vec![],
    })?;
    Ok(render_rows(&rows))
}

fn cmd_update(session: &mut Session, args: &str) -> Result<String> {
    let (name, rest) = split_table_and_rest(args)?;
    let (pk_str, spec) = split_table_and_rest(rest)?;
    let pk = parse_u32(pk_str)?;
    let schema = session
        .schema(name)
        .ok_or_else(|| Error::NotFound(format!("no known schema for table '{}'", name)))?
        .clone();
    let delta = parse_record(&schema, spec)?;
    let (old, new) = session.database.table(name)?.update(pk, &delta)?;
    Ok(format!("old: {}\nnew: {}\n", display_record(&old), display_record(&new)))
}

fn cmd_delete(session: &mut Session, args: &str) -> Result<String> {
    let (name, pk_str) = split_table_and_rest(args)?;
    let pk = parse_u32(pk_str)?;
    let deleted = session.database.table(name)?.delete(pk)?;
    Ok(format!("deleted: {}\n", display_record(&deleted)))
}

fn cmd_count(session: &mut Session, name: &str) -> Result<String> {
    let n = session.database.table(name)?.count()?;
    Ok(format!("{}\n", n))
}

fn cmd_close(session: &mut Session, name: &str) -> Result<String> {
    session.database.close_table(name)?;
    session.forget_schema(name);
    Ok(format!("closed table '{}'\n", name))
}

fn cmd_drop(session: &mut Session, name: &str) -> Result<String> {
    session.database.drop_table(name)?;
    session.forget_schema(name);
    Ok(format!("dropped table '{}'\n", name))
}

fn cmd_tables(session: &mut Session) -> Result<String> {
    let mut out = String::new();
    for name in session.database.list_tables()? {
        out.push_str(&name);
        out.push('\n');
    }
    Ok(out)
}

fn render_rows(rows: &[Record]) -> String {
    if rows.is_empty() {
        return "(no rows)\n".to_string();
    }
    let mut out = String::new();
    for row in rows {
        out.push_str(&display_record(row));
        out.push('\n');
    }
    out
}

fn display_record(record: &Record) -> String {
    let mut fields: Vec<String> = record.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    fields.sort();
    fields.join(", ")
}

fn parse_u32(s: &str) -> Result<u32> {
    s.parse().map_err(|_| Error::InvalidRecord(format!("expected an integer, got '{}'", s)))
}

fn parse_schema_spec(spec: &str) -> Result<TableSchema> {
    let mut columns = Vec::new();
    for field in spec.split(',') {
        let field = field.trim();
        let (name, type_str) = field
            .split_once(':')
            .ok_or_else(|| Error::InvalidSchema(format!("expected name:type in '{}'", field)))?;
        columns.push(ColumnSchema {
            name: name.to_string(),
            type_: parse_column_type(type_str)?,
        });
    }
    TableSchema::new(columns)
}

fn parse_column_type(s: &str) -> Result<ColumnType> {
    let s = s.trim();
    if let Some(len) = unwrap_sized(s, "varchar") {
        return Ok(ColumnType::Varchar(len?));
    }
    if let Some(len) = unwrap_sized(s, "binary") {
        return Ok(ColumnType::Binary(len?));
    }
    if let Some(len) = unwrap_sized(s, "json") {
        return Ok(ColumnType::Json(len?));
    }
    match s {
        "i32" => Ok(ColumnType::I32),
        "u32" => Ok(ColumnType::U32),
        "i64" => Ok(ColumnType::I64),
        "f32" => Ok(ColumnType::F32),
        "f64" => Ok(ColumnType::F64),
        "bool" => Ok(ColumnType::Bool),
        other => Err(Error::InvalidSchema(format!("unknown type '{}'", other))),
    }
}

fn unwrap_sized(s: &str, prefix: &str) -> Option<Result<u16>> {
    let inner = s.strip_prefix(prefix)?.strip_prefix('(')?.strip_suffix(')')?;
    Some(
        inner
            .parse()
            .map_err(|_| Error::InvalidSchema(format!("bad length '{}' in {}(...)", inner, prefix))),
    )
}

fn parse_value(type_: ColumnType, raw: &str) -> Result<ColumnValue> {
    fn bad<E>(raw: &str, type_: ColumnType) -> impl Fn(E) -> Error + '_ {
        move |_| Error::InvalidRecord(format!("'{}' does not parse as {}", raw, type_))
    }
    Ok(match type_ {
        ColumnType::I32 => ColumnValue::I32(raw.parse().map_err(bad(raw, type_))?),
        ColumnType::U32 => ColumnValue::U32(raw.parse().map_err(bad(raw, type_))?),
        ColumnType::I64 => ColumnValue::I64(raw.parse().map_err(bad(raw, type_))?),
        ColumnType::F32 => ColumnValue::F32(raw.parse().map_err(bad(raw, type_))?),
        ColumnType::F64 => ColumnValue::F64(raw.parse().map_err(bad(raw, type_))?),
        ColumnType::Bool => ColumnValue::Bool(raw.parse().map_err(bad(raw, type_))?),
        ColumnType::Varchar(_) => ColumnValue::Varchar(raw.to_string()),
        ColumnType::Binary(_) => ColumnValue::Binary(raw.as_bytes().to_vec()),
        ColumnType::Json(_) => ColumnValue::Json(serde_json::from_str(raw).map_err(|e| Error::InvalidRecord(e.to_string()))?),
    })
}

fn parse_record(schema: &TableSchema, spec: &str) -> Result<Record> {
    let mut record = Record::new();
    for pair in spec.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| Error::InvalidRecord(format!("expected name=value in '{}'", pair)))?;
        let (_, type_) = schema
            .field(name)
            .ok_or_else(|| Error::InvalidRecord(format!("unknown field '{}'", name)))?;
        record.fields.insert(name.to_string(), parse_value(type_, raw)?);
    }
    Ok(record)
}

fn prompt() -> io::Result<()> {
    execute!(io::stdout(), SetForegroundColor(Color::Cyan), Print("leafdb> "), ResetColor)?;
    io::stdout().flush()
}

fn print(s: &str) {
    let _ = io::stdout().execute(Print(s));
    let _ = io::stdout().flush();
}

fn echo(s: String) {
    print(&s);
}

fn error(s: String) {
    let _ = io::stdout().execute(SetForegroundColor(Color::Red));
    print(&s);
    let _ = io::stdout().execute(ResetColor);
}

fn history_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".leafdb_history")
}

fn load_history(path: &PathBuf) -> Vec<String> {
    let Ok(file) = std::fs::File::open(path) else {
        return Vec::new();
    };
    io::BufReader::new(file).lines().map_while(std::result::Result::ok).collect()
}

fn append_history(path: &PathBuf, line: &str) {
    use std::fs::OpenOptions;
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schema_spec() {
        let schema = parse_schema_spec("id:u32,name:varchar(16),tags:json(32)").unwrap();
        assert_eq!(schema.row_size(), 4 + 16 + 32);
    }

    #[test]
    fn parses_record_spec() {
        let schema = parse_schema_spec("id:u32,name:varchar(16)").unwrap();
        let record = parse_record(&schema, "id=1,name=alice").unwrap();
        assert_eq!(record.get("id"), Some(&ColumnValue::U32(1)));
        assert_eq!(record.get("name"), Some(&ColumnValue::Varchar("alice".into())));
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(parse_column_type("decimal").is_err());
    }
}
