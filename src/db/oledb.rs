//! MS Access and other OleDb sources through ODBC.
//!
//! `odbc-api` is a blocking driver; its calls run inline on the calling task.
//! The ODBC environment is process-wide and created once, which lets each
//! connection borrow it for `'static`.

use crate::db::connection::connection_suggestion;
use crate::error::{DbError, DbResult};
use crate::models::{Column, DatabaseType, Row, Table, Value};
use odbc_api::buffers::{BufferDesc, ColumnarAnyBuffer};
use odbc_api::parameter::{InputParameter, VarBinaryBox, VarCharBox};
use odbc_api::{
    Bit, ConnectionOptions, Cursor, DataType, Environment, IntoParameter, Nullability,
    ResultSetMetadata,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

/// Upper bound for text and binary cells fetched from ODBC, in bytes.
const MAX_CELL_BYTES: usize = 16 * 1024 * 1024;

/// Rows fetched per round trip.
const BATCH_SIZE: usize = 256;

/// Cells wider than this are fetched one row at a time.
const WIDE_CELL_BYTES: usize = 64 * 1024;

fn environment() -> DbResult<&'static Environment> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new()?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

pub struct OdbcConnection {
    inner: odbc_api::Connection<'static>,
}

impl std::fmt::Debug for OdbcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdbcConnection").finish_non_exhaustive()
    }
}

impl OdbcConnection {
    pub fn connect(connection_string: &str) -> DbResult<Self> {
        let inner = environment()?
            .connect_with_connection_string(connection_string, ConnectionOptions::default())
            .map_err(|e| {
                let message = e.to_string();
                DbError::connection(
                    format!("Failed to connect: {}", message),
                    connection_suggestion(DatabaseType::OleDb, &message),
                )
            })?;
        Ok(Self { inner })
    }

    pub fn ping(&self) -> DbResult<()> {
        if self.inner.is_dead()? {
            return Err(DbError::connection(
                "ODBC connection is no longer alive",
                "Reopen the connection",
            ));
        }
        Ok(())
    }

    pub fn begin(&self) -> DbResult<()> {
        self.inner.set_autocommit(false)?;
        Ok(())
    }

    pub fn commit(&self) -> DbResult<()> {
        let result = self.inner.commit();
        self.inner.set_autocommit(true)?;
        result.map_err(DbError::from)
    }

    pub fn rollback(&self) -> DbResult<()> {
        let result = self.inner.rollback();
        self.inner.set_autocommit(true)?;
        result.map_err(DbError::from)
    }

    /// Run a statement and materialize its result set, if any.
    pub fn fetch_table(&self, sql: &str, values: &[&Value], limit: Duration) -> DbResult<Table> {
        let params = to_parameters(values);
        let timeout_sec = Some(limit.as_secs().max(1) as usize);

        let Some(mut cursor) = self.inner.execute(sql, params.as_slice(), timeout_sec)? else {
            debug!("Statement produced no result set");
            return Ok(Table::default());
        };

        let count = cursor.num_result_cols()?.max(0) as u16;
        let mut columns = Vec::with_capacity(count as usize);
        let mut descs = Vec::with_capacity(count as usize);
        for i in 1..=count {
            let name = cursor.col_name(i)?;
            let data_type = cursor.col_data_type(i)?;
            let nullable = !matches!(cursor.col_nullability(i)?, Nullability::NoNulls);
            columns.push(Column::new(name, type_name(data_type)));
            descs.push(buffer_desc(data_type, nullable));
        }

        let wide = descs.iter().any(|desc| match desc {
            BufferDesc::Binary { length } => *length > WIDE_CELL_BYTES,
            BufferDesc::Text { max_str_len } => *max_str_len > WIDE_CELL_BYTES,
            _ => false,
        });
        let batch_size = if wide { 1 } else { BATCH_SIZE };
        let buffer = ColumnarAnyBuffer::try_from_descs(batch_size, descs.iter().copied())
            .map_err(DbError::from)?;
        let mut block = cursor.bind_buffer(buffer)?;
        let mut rows = Vec::new();

        while let Some(batch) = block.fetch()? {
            for row_index in 0..batch.num_rows() {
                let row = (0..descs.len())
                    .map(|col| read_cell(batch.column(col), row_index))
                    .collect();
                rows.push(Row(row));
            }
        }

        Ok(Table::new(columns, rows))
    }

    /// Run a statement and return the number of affected rows.
    pub fn execute(&self, sql: &str, values: &[&Value], limit: Duration) -> DbResult<u64> {
        let params = to_parameters(values);
        let mut statement = self.inner.preallocate()?;
        statement.set_query_timeout_sec(limit.as_secs().max(1) as usize)?;
        statement.execute(sql, params.as_slice())?;
        let affected = statement.row_count()?.unwrap_or(0);
        Ok(affected as u64)
    }
}

fn to_parameters(values: &[&Value]) -> Vec<Box<dyn InputParameter>> {
    values
        .iter()
        .map(|value| -> Box<dyn InputParameter> {
            match value {
                Value::Null => Box::new(VarCharBox::null()),
                Value::Bool(v) => Box::new(Bit::from_bool(*v)),
                Value::Int(v) => Box::new(*v),
                Value::Float(v) => Box::new(*v),
                Value::Text(v) => Box::new(v.clone().into_parameter()),
                Value::Bytes(v) => Box::new(VarBinaryBox::from_vec(v.clone())),
            }
        })
        .collect()
}

fn type_name(data_type: DataType) -> String {
    match data_type {
        DataType::Integer => "INTEGER".to_string(),
        DataType::SmallInt => "SMALLINT".to_string(),
        DataType::TinyInt => "TINYINT".to_string(),
        DataType::BigInt => "BIGINT".to_string(),
        DataType::Real => "REAL".to_string(),
        DataType::Float { .. } => "FLOAT".to_string(),
        DataType::Double => "DOUBLE".to_string(),
        DataType::Decimal { .. } => "DECIMAL".to_string(),
        DataType::Numeric { .. } => "NUMERIC".to_string(),
        DataType::Bit => "BIT".to_string(),
        DataType::Date => "DATE".to_string(),
        DataType::Time { .. } => "TIME".to_string(),
        DataType::Timestamp { .. } => "DATETIME".to_string(),
        DataType::Binary { .. } => "BINARY".to_string(),
        DataType::Varbinary { .. } => "VARBINARY".to_string(),
        DataType::LongVarbinary { .. } => "LONGBINARY".to_string(),
        DataType::Char { .. } | DataType::WChar { .. } => "CHAR".to_string(),
        DataType::Varchar { .. } | DataType::WVarchar { .. } => "VARCHAR".to_string(),
        DataType::LongVarchar { .. } | DataType::WLongVarchar { .. } => "LONGTEXT".to_string(),
        other => format!("{:?}", other),
    }
}

fn buffer_desc(data_type: DataType, nullable: bool) -> BufferDesc {
    match data_type {
        DataType::Integer | DataType::SmallInt | DataType::TinyInt | DataType::BigInt => {
            BufferDesc::I64 { nullable }
        }
        DataType::Real | DataType::Float { .. } | DataType::Double => BufferDesc::F64 { nullable },
        DataType::Bit => BufferDesc::Bit { nullable },
        DataType::Binary { .. } | DataType::Varbinary { .. } | DataType::LongVarbinary { .. } => {
            BufferDesc::Binary {
                length: bounded_length(data_type),
            }
        }
        // Decimals, dates and everything else come back as text
        _ => BufferDesc::Text {
            max_str_len: bounded_length(data_type),
        },
    }
}

fn bounded_length(data_type: DataType) -> usize {
    data_type
        .display_size()
        .map(|n| n.get())
        .unwrap_or(MAX_CELL_BYTES)
        .clamp(1, MAX_CELL_BYTES)
}

fn read_cell(column: odbc_api::buffers::AnySlice<'_>, row: usize) -> Value {
    use odbc_api::buffers::AnySlice;

    match column {
        AnySlice::I64(values) => Value::Int(values[row]),
        AnySlice::NullableI64(mut values) => {
            values.nth(row).flatten().copied().map_or(Value::Null, Value::Int)
        }
        AnySlice::F64(values) => Value::Float(values[row]),
        AnySlice::NullableF64(mut values) => {
            values.nth(row).flatten().copied().map_or(Value::Null, Value::Float)
        }
        AnySlice::Bit(values) => Value::Bool(values[row].as_bool()),
        AnySlice::NullableBit(mut values) => values
            .nth(row)
            .flatten()
            .map_or(Value::Null, |b| Value::Bool(b.as_bool())),
        AnySlice::Binary(view) => view
            .get(row)
            .map_or(Value::Null, |bytes| Value::Bytes(bytes.to_vec())),
        AnySlice::Text(view) => view.get(row).map_or(Value::Null, |bytes| {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }),
        _ => Value::Null,
    }
}
