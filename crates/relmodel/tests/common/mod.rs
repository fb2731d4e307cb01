//! Shared test fixtures: an in-memory adapter understanding the crate's
//! canonical SQL shapes, a scripted translation service, and the
//! Bar/Foo/FooI18n model family.
#![allow(dead_code)]

use relmodel::{
    DatabaseAdapter, Entity, ModelBase, ModelHooks, Result, Row, SchemaInfo, Session,
    TranslationService, Value, create_table_sql,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

// ============================================================================
// Mock adapter
// ============================================================================

type StoredRow = BTreeMap<String, Value>;

#[derive(Default, Clone)]
struct StoredTable {
    rows: Vec<StoredRow>,
    next_id: i64,
}

#[derive(Default)]
struct MockState {
    tables: HashMap<String, StoredTable>,
    tx_snapshot: Option<HashMap<String, StoredTable>>,
    scripted: VecDeque<Vec<Row>>,
    log: Vec<(String, Vec<Value>)>,
    last_insert_first_id: i64,
    force_affected: Option<u64>,
    schema_updates: Vec<String>,
    begins: usize,
    commits: usize,
    rollbacks: usize,
}

/// In-memory adapter. Clones share state, so tests keep a handle for
/// inspection after moving one copy into the session.
#[derive(Clone)]
pub struct MockAdapter {
    prefix: String,
    state: Arc<Mutex<MockState>>,
}

impl MockAdapter {
    pub fn new(prefix: &str) -> Self {
        MockAdapter {
            prefix: prefix.to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    /// Every executed or fetched statement, in order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().log.iter().map(|(sql, _)| sql.clone()).collect()
    }

    /// Bound values of the statement at `index`.
    pub fn bound_values(&self, index: usize) -> Vec<Value> {
        self.lock().log[index].1.clone()
    }

    /// Queue rows to return from the next fetch, bypassing evaluation.
    pub fn script_rows(&self, rows: Vec<Row>) {
        self.lock().scripted.push_back(rows);
    }

    /// Force the next execute() to report this affected-row count.
    pub fn force_affected(&self, affected: u64) {
        self.lock().force_affected = Some(affected);
    }

    /// Stored rows of a table.
    pub fn rows_of(&self, table: &str) -> Vec<StoredRow> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// (begins, commits, rollbacks)
    pub fn tx_counts(&self) -> (usize, usize, usize) {
        let state = self.lock();
        (state.begins, state.commits, state.rollbacks)
    }

    /// CREATE TABLE statements received through update_schema.
    pub fn schema_updates(&self) -> Vec<String> {
        self.lock().schema_updates.clone()
    }
}

/// Substring between the first '(' and the matching ')'.
fn first_paren_group(text: &str) -> &str {
    let start = text.find('(').map_or(0, |i| i + 1);
    let end = text[start..].find(')').map_or(text.len(), |i| start + i);
    &text[start..end]
}

fn parse_columns(text: &str) -> Vec<String> {
    first_paren_group(text)
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

impl DatabaseAdapter for MockAdapter {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, query: &str, values: &[Value]) -> Result<u64> {
        let mut state = self.lock();
        state.log.push((query.to_string(), values.to_vec()));
        let forced = state.force_affected.take();

        if let Some(rest) = query.strip_prefix("INSERT INTO ") {
            let table_name = rest.split_whitespace().next().unwrap_or("").to_string();
            let columns = parse_columns(rest);
            let upsert = query.contains(" ON DUPLICATE KEY UPDATE ");
            let mut affected = 0_u64;
            let mut first_id = None;

            let table = state.tables.entry(table_name).or_default();
            for chunk in values.chunks(columns.len().max(1)) {
                if upsert {
                    let id = chunk.first().and_then(Value::as_i64).unwrap_or(0);
                    let position = table
                        .rows
                        .iter()
                        .position(|r| r.get("ID").and_then(Value::as_i64) == Some(id));
                    let position = match position {
                        Some(position) => position,
                        None => {
                            table.rows.push(StoredRow::new());
                            if id > table.next_id {
                                table.next_id = id;
                            }
                            table.rows.len() - 1
                        }
                    };
                    for (column, value) in columns.iter().zip(chunk) {
                        table.rows[position].insert(column.clone(), value.clone());
                    }
                } else {
                    table.next_id += 1;
                    let id = table.next_id;
                    first_id.get_or_insert(id);
                    let mut row = StoredRow::new();
                    row.insert("ID".to_string(), Value::Int(id));
                    for (column, value) in columns.iter().zip(chunk) {
                        row.insert(column.clone(), value.clone());
                    }
                    table.rows.push(row);
                }
                affected += 1;
            }

            if let Some(first) = first_id {
                state.last_insert_first_id = first;
            }
            return Ok(forced.unwrap_or(affected));
        }

        if let Some(rest) = query.strip_prefix("DELETE FROM ") {
            let table_name = rest.split_whitespace().next().unwrap_or("").to_string();
            let ids: Vec<i64> = values.iter().filter_map(Value::as_i64).collect();
            let mut affected = 0_u64;
            if let Some(table) = state.tables.get_mut(&table_name) {
                let before = table.rows.len();
                table
                    .rows
                    .retain(|r| match r.get("ID").and_then(Value::as_i64) {
                        Some(id) => !ids.contains(&id),
                        None => true,
                    });
                affected = (before - table.rows.len()) as u64;
            }
            return Ok(forced.unwrap_or(affected));
        }

        if let Some(rest) = query.strip_prefix("DROP TABLE IF EXISTS ") {
            let table_name = rest.split_whitespace().next().unwrap_or("").to_string();
            state.tables.remove(&table_name);
            return Ok(0);
        }

        Ok(forced.unwrap_or(0))
    }

    fn fetch(&mut self, query: &str, values: &[Value]) -> Result<Vec<Row>> {
        let mut state = self.lock();
        state.log.push((query.to_string(), values.to_vec()));

        if let Some(rows) = state.scripted.pop_front() {
            return Ok(rows);
        }

        if query == "SELECT LAST_INSERT_ID()" {
            let id = state.last_insert_first_id;
            return Ok(vec![Row::new(
                vec!["LAST_INSERT_ID()".to_string()],
                vec![Value::Int(id)],
            )]);
        }

        if let Some(rest) = query.strip_prefix("SELECT COUNT(*) FROM ") {
            let matched = evaluate_select(&state, rest, values);
            return Ok(vec![Row::new(
                vec!["COUNT(*)".to_string()],
                vec![Value::Int(matched.len() as i64)],
            )]);
        }

        if let Some(rest) = query.strip_prefix("SELECT * FROM ") {
            let matched = evaluate_select(&state, rest, values);
            return Ok(matched
                .into_iter()
                .map(|row| {
                    let (names, row_values): (Vec<String>, Vec<Value>) =
                        row.into_iter().unzip();
                    Row::new(names, row_values)
                })
                .collect());
        }

        // Aliased join queries are driven by scripted rows.
        Ok(vec![])
    }

    fn escape(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn charset_collate(&self) -> String {
        "DEFAULT CHARSET utf8mb4".to_string()
    }

    fn update_schema(&mut self, schema: &SchemaInfo) -> Result<()> {
        let sql = create_table_sql(schema, &self.prefix, &self.charset_collate());
        self.lock().schema_updates.push(sql);
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.log.push(("BEGIN".to_string(), vec![]));
        state.begins += 1;
        let snapshot = state.tables.clone();
        state.tx_snapshot = Some(snapshot);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.log.push(("COMMIT".to_string(), vec![]));
        state.commits += 1;
        state.tx_snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.log.push(("ROLLBACK".to_string(), vec![]));
        state.rollbacks += 1;
        if let Some(snapshot) = state.tx_snapshot.take() {
            state.tables = snapshot;
        }
        Ok(())
    }
}

// ============================================================================
// Naive single-table SELECT evaluation
// ============================================================================

enum CondOp {
    Compare(String),
    InList { negate: bool },
    NullTest { negate: bool },
    /// Cross-table condition the naive store cannot evaluate.
    AlwaysTrue,
}

struct ParsedCond {
    column: String,
    op: CondOp,
    args: Vec<Value>,
}

fn evaluate_select(state: &MockState, rest: &str, values: &[Value]) -> Vec<StoredRow> {
    let table_name = rest.split_whitespace().next().unwrap_or("");
    let tail = &rest[table_name.len()..];

    let where_pos = tail.find(" WHERE ");
    let order_pos = tail.find(" ORDER BY ");
    let limit_pos = tail.find(" LIMIT ");

    let where_end = order_pos.or(limit_pos).unwrap_or(tail.len());
    let order_end = limit_pos.unwrap_or(tail.len());

    let mut params: VecDeque<Value> = values.iter().cloned().collect();
    let conditions = where_pos.map(|pos| {
        parse_where(&tail[pos + " WHERE ".len()..where_end], &mut params)
    });

    let mut rows: Vec<StoredRow> = state
        .tables
        .get(table_name)
        .map(|t| t.rows.clone())
        .unwrap_or_default();

    if let Some((connectives, conds)) = &conditions {
        rows.retain(|row| evaluate_conditions(row, connectives, conds));
    }

    if let Some(pos) = order_pos {
        let order = &tail[pos + " ORDER BY ".len()..order_end];
        apply_order(&mut rows, order);
    }

    if let Some(pos) = limit_pos {
        let spec = &tail[pos + " LIMIT ".len()..];
        let mut parts = spec.split(" OFFSET ");
        let count: usize = parts.next().and_then(|c| c.trim().parse().ok()).unwrap_or(0);
        let offset: usize = parts.next().and_then(|o| o.trim().parse().ok()).unwrap_or(0);
        rows = rows.into_iter().skip(offset).take(count).collect();
    }

    rows
}

/// Split a rendered WHERE clause into (connectives, conditions), binding
/// placeholder values as they appear. Supports the flat shapes the
/// repository finders emit; anything it cannot read evaluates true.
fn parse_where(clause: &str, params: &mut VecDeque<Value>) -> (Vec<String>, Vec<ParsedCond>) {
    let clause = clause
        .trim()
        .strip_prefix('(')
        .and_then(|c| c.strip_suffix(')'))
        .unwrap_or(clause.trim());

    let mut segments: Vec<(String, String)> = Vec::new();
    let mut depth = 0_i32;
    let mut current = String::new();
    let mut connective = String::new();
    let bytes = clause.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if depth == 0 && clause[i..].starts_with(" AND ") {
            segments.push((connective.clone(), current.clone()));
            connective = "AND".to_string();
            current.clear();
            i += " AND ".len();
            continue;
        }
        if depth == 0 && clause[i..].starts_with(" OR ") {
            segments.push((connective.clone(), current.clone()));
            connective = "OR".to_string();
            current.clear();
            i += " OR ".len();
            continue;
        }
        let ch = bytes[i] as char;
        if ch == '(' {
            depth += 1;
        } else if ch == ')' {
            depth -= 1;
        }
        current.push(ch);
        i += 1;
    }
    segments.push((connective, current));

    let mut connectives = Vec::new();
    let mut conds = Vec::new();
    for (conn, segment) in segments {
        connectives.push(conn);
        conds.push(parse_condition(segment.trim(), params));
    }
    (connectives, conds)
}

fn bare_column(qualified: &str) -> String {
    qualified
        .rsplit('.')
        .next()
        .unwrap_or(qualified)
        .trim()
        .to_string()
}

fn parse_condition(segment: &str, params: &mut VecDeque<Value>) -> ParsedCond {
    if let Some(column) = segment.strip_suffix(" IS NOT NULL") {
        return ParsedCond {
            column: bare_column(column),
            op: CondOp::NullTest { negate: true },
            args: vec![],
        };
    }
    if let Some(column) = segment.strip_suffix(" IS NULL") {
        return ParsedCond {
            column: bare_column(column),
            op: CondOp::NullTest { negate: false },
            args: vec![],
        };
    }

    for (token, negate) in [(" NOT IN (", true), (" IN (", false)] {
        if let Some(pos) = segment.find(token) {
            let column = bare_column(&segment[..pos]);
            let list = first_paren_group(&segment[pos..]);
            let count = list.matches('%').count();
            let args = (0..count).filter_map(|_| params.pop_front()).collect();
            return ParsedCond {
                column,
                op: CondOp::InList { negate },
                args,
            };
        }
    }

    for op in [" <= ", " >= ", " != ", " NOT LIKE ", " LIKE ", " = ", " < ", " > "] {
        if let Some(pos) = segment.find(op) {
            let column = bare_column(&segment[..pos]);
            let rhs = segment[pos + op.len()..].trim();
            if rhs.starts_with('%') && rhs.len() == 2 {
                let value = params.pop_front().unwrap_or(Value::Null);
                return ParsedCond {
                    column,
                    op: CondOp::Compare(op.trim().to_string()),
                    args: vec![value],
                };
            }
            // Right side is another column (a join condition): the naive
            // single-table store cannot evaluate it.
            return ParsedCond {
                column,
                op: CondOp::AlwaysTrue,
                args: vec![],
            };
        }
    }

    ParsedCond {
        column: String::new(),
        op: CondOp::AlwaysTrue,
        args: vec![],
    }
}

fn evaluate_conditions(row: &StoredRow, connectives: &[String], conds: &[ParsedCond]) -> bool {
    let mut result = true;
    for (index, cond) in conds.iter().enumerate() {
        let outcome = evaluate_condition(row, cond);
        if index == 0 {
            result = outcome;
        } else if connectives[index] == "OR" {
            result = result || outcome;
        } else {
            result = result && outcome;
        }
    }
    result
}

fn evaluate_condition(row: &StoredRow, cond: &ParsedCond) -> bool {
    let cell = row.get(&cond.column).cloned().unwrap_or(Value::Null);
    match &cond.op {
        CondOp::AlwaysTrue => true,
        CondOp::NullTest { negate } => cell.is_null() != *negate,
        CondOp::InList { negate } => cond.args.contains(&cell) != *negate,
        CondOp::Compare(op) => compare_values(op, &cell, &cond.args[0]),
    }
}

fn compare_values(op: &str, left: &Value, right: &Value) -> bool {
    match op {
        "=" => loosely_equal(left, right),
        "!=" => !loosely_equal(left, right),
        "LIKE" => match (left.as_str(), right.as_str()) {
            (Some(l), Some(r)) => l.contains(r.trim_matches('%')),
            _ => false,
        },
        "NOT LIKE" => !compare_values("LIKE", left, right),
        _ => {
            let ordering = match (left.as_f64(), right.as_f64()) {
                (Some(l), Some(r)) => l.partial_cmp(&r),
                _ => match (left.as_str(), right.as_str()) {
                    (Some(l), Some(r)) => Some(l.cmp(r)),
                    _ => None,
                },
            };
            match ordering {
                Some(ordering) => match op {
                    "<" => ordering.is_lt(),
                    "<=" => ordering.is_le(),
                    ">" => ordering.is_gt(),
                    ">=" => ordering.is_ge(),
                    _ => false,
                },
                None => false,
            }
        }
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => (l - r).abs() < f64::EPSILON,
        _ => false,
    }
}

fn apply_order(rows: &mut [StoredRow], order: &str) {
    let keys: Vec<(&str, bool)> = order
        .split(", ")
        .map(|part| {
            let mut words = part.trim().split(' ');
            let column = words.next().unwrap_or("");
            let descending = words.next() == Some("DESC");
            (column, descending)
        })
        .collect();

    for (column, descending) in keys.iter().rev() {
        rows.sort_by(|a, b| {
            let left = a.get(*column).cloned().unwrap_or(Value::Null);
            let right = b.get(*column).cloned().unwrap_or(Value::Null);
            let ordering = match (left.as_f64(), right.as_f64()) {
                (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(std::cmp::Ordering::Equal),
                _ => format!("{:?}", left).cmp(&format!("{:?}", right)),
            };
            if *descending { ordering.reverse() } else { ordering }
        });
    }
}

// ============================================================================
// Translation service fixture
// ============================================================================

pub struct TestTranslations {
    pub need: bool,
    pub lang: String,
}

impl TranslationService for TestTranslations {
    fn need_translation(&self) -> bool {
        self.need
    }

    fn language(&self) -> String {
        self.lang.clone()
    }

    fn translate_default_to_current(&self, text: &str) -> String {
        format!("{}:{}", self.lang, text)
    }

    fn translate_current_to_default(&self, text: &str) -> String {
        text.to_string()
    }
}

// ============================================================================
// Model fixtures
// ============================================================================

#[derive(Clone, Entity)]
#[orm(table(
    kind = "Entity",
    name = "bar",
    allow_schema_update = true,
    repository = "BarRepository",
    inherits = "relmodel::MODEL_BASE_TABLE",
))]
pub struct Bar {
    pub base: ModelBase,
    #[orm(column(kind = "varchar", length = 100))]
    pub name: String,
}

#[derive(Clone, Entity)]
#[orm(custom_hooks)]
#[orm(table(
    kind = "Entity",
    name = "foo",
    prefix = "prefix",
    allow_schema_update = true,
    allow_drop = true,
    repository = "FooRepository",
    inherits = "relmodel::MODEL_BASE_TABLE",
    column_order("ID", "date_add", "date_update"),
    index(name = "name_index", columns("name")),
    translations,
))]
#[allow(non_snake_case)]
pub struct Foo {
    pub base: ModelBase,
    #[orm(column(kind = "datetime", null = "NULL"))]
    pub date_add: Option<String>,
    #[orm(column(kind = "timestamp", null = "NULL", default = "CURRENT_TIMESTAMP"))]
    pub date_update: Option<String>,
    #[orm(column(
        kind = "int",
        length = 10,
        null = "NOT NULL",
        many_to_one(model = "Bar", property = "ID", on_delete = "CASCADE")
    ))]
    pub bar_ID: i64,
    #[orm(column(kind = "varchar", length = 25))]
    pub name: String,
    #[orm(column(kind = "varchar", length = 50, i18n))]
    pub description: String,
}

impl ModelHooks for Foo {
    fn before_save(&mut self) {
        // First insert stamps the creation time.
        if !self.base.has_id() && self.date_add.is_none() {
            self.date_add = Some("2024-05-01 10:00:00".to_string());
        }
    }
}

#[derive(Clone, Entity)]
#[orm(table(
    kind = "Entity",
    name = "foo_i18n",
    prefix = "prefix",
    allow_schema_update = true,
    allow_drop = true,
    repository = "FooI18nRepository",
    index(name = "language_index", columns("language")),
))]
pub struct FooI18n {
    pub base: ModelBase,
    #[orm(column(
        kind = "int",
        length = 10,
        null = "NOT NULL",
        many_to_one(model = "Foo", property = "ID", on_delete = "CASCADE")
    ))]
    pub object_id: i64,
    #[orm(column(kind = "varchar", length = 25))]
    pub language: String,
    #[orm(column(kind = "varchar", length = 25))]
    pub name: String,
    #[orm(column(kind = "varchar", length = 50))]
    pub description: String,
}

/// Declares no `allow_schema_update`: resolution must fail.
#[derive(Clone, Entity)]
#[orm(table(kind = "Entity", name = "baz"))]
pub struct Baz {
    pub base: ModelBase,
    #[orm(column(kind = "varchar", length = 25))]
    pub name: String,
}

/// Declares a column type outside the whitelist: resolution must fail.
#[derive(Clone, Entity)]
#[orm(table(kind = "Entity", name = "bad_column", allow_schema_update = true))]
pub struct BadColumn {
    pub base: ModelBase,
    #[orm(column(kind = "uuid"))]
    pub payload: String,
}

/// Schema updates pinned off.
#[derive(Clone, Entity)]
#[orm(table(kind = "Entity", name = "pinned", allow_schema_update = false))]
pub struct Pinned {
    pub base: ModelBase,
    #[orm(column(kind = "varchar", length = 25))]
    pub name: String,
}

/// A session over the mock adapter with the fixture family registered.
pub fn session(adapter: &MockAdapter) -> Session {
    let mut session = Session::new(Box::new(adapter.clone()));
    session.register::<Bar>();
    session.register::<Foo>();
    session.register::<FooI18n>();
    session.register::<Baz>();
    session.register::<BadColumn>();
    session.register::<Pinned>();
    session.register_repository("BarRepository");
    session.register_repository("FooRepository");
    session.register_repository("FooI18nRepository");
    session
}
