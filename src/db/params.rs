//! Parameter resolution and binding.
//!
//! Every backend ends up binding values positionally. Named parameters are
//! resolved here: each `@name`, `:name` or `$name` occurrence that matches one
//! of the supplied parameters is rewritten to `?` and its value is pushed once
//! per occurrence. Plain `?` placeholders take the unnamed parameters in order.
//!
//! Placeholders inside string literals, quoted identifiers and comments are left
//! alone, as are MySQL user and system variables (`@rownum`, `@@version`) that
//! do not name a supplied parameter. Backslash escapes inside literals only
//! exist in MySQL.
//!
//! Every supplied parameter must be consumed and every placeholder must get a
//! value; otherwise the driver would silently bind NULL.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Param, Value};
use sqlx::mysql::MySqlArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, Sqlite};
use std::borrow::Cow;

/// SQL ready for positional binding.
#[derive(Debug)]
pub struct BoundSql<'a> {
    pub sql: Cow<'a, str>,
    pub values: Vec<&'a Value>,
}

/// Resolve named parameters into positional ones.
///
/// When nothing needs rewriting the SQL is borrowed untouched.
///
/// # Errors
///
/// `InvalidInput` when a named parameter matches no placeholder, when the
/// `?` placeholders and the unnamed parameters differ in number, or (SQLite)
/// when a named placeholder has no supplied value.
pub fn resolve<'a>(
    sql: &'a str,
    params: &'a [Param],
    db_type: DatabaseType,
) -> DbResult<BoundSql<'a>> {
    let backslash_escapes = db_type == DatabaseType::MySQL;
    let positional: Vec<&Param> = params.iter().filter(|p| p.name.is_none()).collect();
    let mut next_positional = 0;
    let mut used = vec![false; params.len()];
    let mut rewritten = false;

    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::with_capacity(params.len());
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let end = skip_quoted(&chars, i, c, backslash_escapes);
                out.extend(&chars[i..end]);
                i = end;
            }
            '[' => {
                let end = skip_quoted(&chars, i, ']', false);
                out.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = find_block_comment_end(&chars, i + 2);
                out.extend(&chars[i..end]);
                i = end;
            }
            '?' => {
                let param = positional.get(next_positional).copied().ok_or_else(|| {
                    DbError::invalid_input(format!(
                        "Statement has more '?' placeholders than the {} positional parameter(s) supplied",
                        positional.len()
                    ))
                })?;
                next_positional += 1;
                values.push(&param.value);
                out.push('?');
                i += 1;
            }
            '@' if chars.get(i + 1) == Some(&'@') => {
                // System variable, copy through with its name
                let end = ident_end(&chars, i + 2);
                out.extend(&chars[i..end]);
                i = end;
            }
            '@' | ':' | '$' if chars.get(i + 1).is_some_and(|&ch| is_ident_start(ch)) => {
                let end = ident_end(&chars, i + 1);
                let name: String = chars[i + 1..end].iter().collect();
                match find_named(params, &name) {
                    Some(idx) => {
                        used[idx] = true;
                        rewritten = true;
                        values.push(&params[idx].value);
                        out.push('?');
                    }
                    // Outside literals these are always parameters in SQLite
                    None if db_type == DatabaseType::SQLite => {
                        return Err(DbError::invalid_input(format!(
                            "No value supplied for parameter {}{}",
                            c, name
                        )));
                    }
                    None => out.extend(&chars[i..end]),
                }
                i = end;
            }
            c if c.is_alphanumeric() || c == '_' => {
                // Whole word, so `a$b` or `t1:x` never look like placeholders
                let end = word_end(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    if let Some(param) = params
        .iter()
        .zip(&used)
        .find_map(|(p, &used)| p.name.as_deref().filter(|_| !used))
    {
        return Err(DbError::invalid_input(format!(
            "Parameter {} does not match any placeholder in the statement",
            param
        )));
    }
    if next_positional < positional.len() {
        return Err(DbError::invalid_input(format!(
            "{} positional parameter(s) supplied but the statement has {} '?' placeholder(s)",
            positional.len(),
            next_positional
        )));
    }

    let sql = if rewritten {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(sql)
    };
    Ok(BoundSql { sql, values })
}

fn find_named(params: &[Param], name: &str) -> Option<usize> {
    params
        .iter()
        .position(|p| p.bare_name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn ident_end(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .position(|&c| !(c.is_alphanumeric() || c == '_'))
        .map_or(chars.len(), |p| start + p)
}

fn word_end(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .position(|&c| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .map_or(chars.len(), |p| start + p)
}

/// Index just past the closing quote. Doubled quotes are escapes.
fn skip_quoted(chars: &[char], start: usize, close: char, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == close {
            if chars.get(i + 1) == Some(&close) && close != ']' {
                i += 2;
                continue;
            }
            return i + 1;
        }
        if backslash_escapes && chars[i] == '\\' && close != '`' {
            i += 2;
            continue;
        }
        i += 1;
    }
    chars.len()
}

fn find_block_comment_end(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

/// Bind a value to a SQLite query.
pub(crate) fn bind_sqlite_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Bind a value to a MySQL query.
pub(crate) fn bind_mysql_value<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
    }
}
