//! Statement builders for INSERT, upsert, batch insert and UPDATE.
//!
//! Column lists come from the model descriptor: ignored fields and
//! association fields never appear, and an auto-increment primary key is left
//! to the backend on insert. Every bound value goes through
//! [`Value::for_binding`], so zero timestamps reach the backend as the
//! sentinel instead of the epoch.

use crate::rewrite::LIST_TOKEN;
use relmap_core::{Error, FieldMapping, Model, ModelDescriptor, Result, Value};

fn bound_value<M: Model>(record: &M, field: &FieldMapping) -> Result<Value> {
    record
        .field_value(field.field_name)
        .map(Value::for_binding)
        .ok_or_else(|| Error::MissingField(field.field_name.to_string()))
}

fn column_list<'f>(fields: impl IntoIterator<Item = &'f FieldMapping>) -> String {
    fields
        .into_iter()
        .map(|f| f.column_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn value_group(n: usize) -> String {
    let mut s = String::with_capacity(n * 3 + 2);
    s.push('(');
    for i in 0..n {
        if i > 0 {
            s.push_str(", ");
        }
        s.push('?');
    }
    s.push(')');
    s
}

/// Resolve field or column names to persisted mappings.
fn resolve_fields<'d>(
    descriptor: &'d ModelDescriptor,
    names: &[&str],
) -> Result<Vec<&'d FieldMapping>> {
    let mut resolved: Vec<&FieldMapping> = Vec::with_capacity(names.len());
    for name in names {
        let field = descriptor
            .resolve_field(name)
            .ok_or_else(|| Error::MissingField((*name).to_string()))?;
        if !resolved.iter().any(|f| f.field_name == field.field_name) {
            resolved.push(field);
        }
    }
    Ok(resolved)
}

/// INSERT for one record.
#[derive(Debug)]
pub struct InsertBuilder<'a, M: Model> {
    descriptor: &'a ModelDescriptor,
    record: &'a M,
    table: Option<&'a str>,
}

impl<'a, M: Model> InsertBuilder<'a, M> {
    pub fn new(descriptor: &'a ModelDescriptor, record: &'a M) -> Self {
        Self {
            descriptor,
            record,
            table: None,
        }
    }

    /// Insert into `table` instead of the model's own table.
    pub fn into_table(mut self, table: &'a str) -> Self {
        self.table = Some(table);
        self
    }

    /// Build the INSERT SQL and parameters.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let fields: Vec<&FieldMapping> = self.descriptor.insert_fields().collect();
        let params = fields
            .iter()
            .map(|f| bound_value(self.record, f))
            .collect::<Result<Vec<_>>>()?;
        let table = self.table.unwrap_or(self.descriptor.table_name());

        let sql = format!(
            "INSERT INTO {table} ({}) VALUES {}",
            column_list(fields.iter().copied()),
            value_group(fields.len())
        );
        Ok((sql, params))
    }
}

/// `INSERT ... ON DUPLICATE KEY UPDATE` for one record.
#[derive(Debug)]
pub struct UpsertBuilder<'a, M: Model> {
    descriptor: &'a ModelDescriptor,
    record: &'a M,
    update: Vec<&'a str>,
}

impl<'a, M: Model> UpsertBuilder<'a, M> {
    pub fn new(descriptor: &'a ModelDescriptor, record: &'a M) -> Self {
        Self {
            descriptor,
            record,
            update: Vec::new(),
        }
    }

    /// Columns to overwrite when the key already exists. Field or column
    /// names; empty means every persisted non-key column.
    pub fn update_fields(mut self, names: &[&'a str]) -> Self {
        self.update = names.to_vec();
        self
    }

    /// Build the upsert SQL and parameters.
    ///
    /// The primary key is always part of the column list, so an
    /// auto-increment key already holding a value upserts that row.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let pk = self.descriptor.require_primary_key()?;

        let mut fields: Vec<&FieldMapping> = self.descriptor.insert_fields().collect();
        if pk.is_generated_key() {
            fields.push(pk);
        }
        let params = fields
            .iter()
            .map(|f| bound_value(self.record, f))
            .collect::<Result<Vec<_>>>()?;

        let update: Vec<&FieldMapping> = if self.update.is_empty() {
            self.descriptor
                .persisted_fields()
                .filter(|f| !f.primary_key)
                .collect()
        } else {
            resolve_fields(self.descriptor, &self.update)?
        };
        if update.is_empty() {
            return Err(Error::Custom(format!(
                "upsert on {} has no columns to update",
                self.descriptor.table_name()
            )));
        }
        let assignments = update
            .iter()
            .map(|f| format!("{0}=VALUES({0})", f.column_name))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {} ON DUPLICATE KEY UPDATE {assignments}",
            self.descriptor.table_name(),
            column_list(fields.iter().copied()),
            value_group(fields.len())
        );
        Ok((sql, params))
    }
}

/// One multi-row INSERT for a batch of records of the same type.
#[derive(Debug)]
pub struct InsertManyBuilder<'a, M: Model> {
    descriptor: &'a ModelDescriptor,
    records: &'a [M],
}

impl<'a, M: Model> InsertManyBuilder<'a, M> {
    pub fn new(descriptor: &'a ModelDescriptor, records: &'a [M]) -> Self {
        Self {
            descriptor,
            records,
        }
    }

    /// Build the batch SQL and parameters; `None` for an empty batch.
    pub fn build(&self) -> Result<Option<(String, Vec<Value>)>> {
        if self.records.is_empty() {
            return Ok(None);
        }
        let fields: Vec<&FieldMapping> = self.descriptor.insert_fields().collect();
        let mut params = Vec::with_capacity(fields.len() * self.records.len());
        for record in self.records {
            for field in &fields {
                params.push(bound_value(record, field)?);
            }
        }

        let group = value_group(fields.len());
        let groups = vec![group.as_str(); self.records.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {groups}",
            self.descriptor.table_name(),
            column_list(fields.iter().copied())
        );
        Ok(Some((sql, params)))
    }
}

/// UPDATE of one record by its primary key.
#[derive(Debug)]
pub struct UpdateBuilder<'a, M: Model> {
    descriptor: &'a ModelDescriptor,
    record: &'a M,
    only: Option<Vec<&'a str>>,
}

impl<'a, M: Model> UpdateBuilder<'a, M> {
    pub fn new(descriptor: &'a ModelDescriptor, record: &'a M) -> Self {
        Self {
            descriptor,
            record,
            only: None,
        }
    }

    /// Restrict the SET list to these field or column names.
    pub fn fields(mut self, names: &[&'a str]) -> Self {
        self.only = Some(names.to_vec());
        self
    }

    /// Build the UPDATE SQL and parameters. The key is never part of the
    /// SET list; it is bound last for the WHERE clause.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let pk = self.descriptor.require_primary_key()?;

        let fields: Vec<&FieldMapping> = match &self.only {
            Some(names) => resolve_fields(self.descriptor, names)?
                .into_iter()
                .filter(|f| !f.primary_key)
                .collect(),
            None => self
                .descriptor
                .persisted_fields()
                .filter(|f| !f.primary_key)
                .collect(),
        };
        if fields.is_empty() {
            return Err(Error::Custom(format!(
                "update on {} has no columns to set",
                self.descriptor.table_name()
            )));
        }

        let mut params = fields
            .iter()
            .map(|f| bound_value(self.record, f))
            .collect::<Result<Vec<_>>>()?;
        params.push(bound_value(self.record, pk)?);

        let assignments = fields
            .iter()
            .map(|f| format!("{} = ?", f.column_name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE {} = ?",
            self.descriptor.table_name(),
            pk.column_name
        );
        Ok((sql, params))
    }
}

/// `SELECT * FROM <table> WHERE <pk> = ?`.
pub fn select_by_pk_sql(descriptor: &ModelDescriptor) -> Result<String> {
    let pk = descriptor.require_primary_key()?;
    Ok(format!(
        "SELECT * FROM {} WHERE {} = ?",
        descriptor.table_name(),
        pk.column_name
    ))
}

/// Batched lookup of `table` rows whose `column` is in a `??` list.
pub fn select_in_sql(table: &str, column: &str) -> String {
    format!("SELECT * FROM {table} WHERE {column} IN ({LIST_TOKEN})")
}

/// `TRUNCATE TABLE <table>`.
pub fn truncate_sql(table: &str) -> String {
    format!("TRUNCATE TABLE {table}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmap_core::{FieldDef, FromValue, Timestamp};

    #[derive(Debug, Default, Clone)]
    struct Account {
        id: i64,
        email: String,
        created: Timestamp,
    }

    impl Model for Account {
        const TABLE_NAME: &'static str = "accounts";

        fn describe() -> Result<ModelDescriptor> {
            ModelDescriptor::builder("Account")
                .table(Self::TABLE_NAME)
                .field(FieldDef::new("id").primary_key().auto_increment())
                .field(FieldDef::new("email").column("email_address"))
                .field(FieldDef::new("created").column("created_at"))
                .field(FieldDef::new("cache").ignore())
                .build()
        }

        fn field_value(&self, field: &str) -> Option<Value> {
            match field {
                "id" => Some(Value::BigInt(self.id)),
                "email" => Some(Value::Text(self.email.clone())),
                "created" => Some(Value::Timestamp(self.created)),
                _ => None,
            }
        }

        fn set_field_value(&mut self, field: &str, value: &Value) -> Result<()> {
            match field {
                "id" => self.id = FromValue::from_value(value)?,
                "email" => self.email = FromValue::from_value(value)?,
                "created" => self.created = FromValue::from_value(value)?,
                other => return Err(Error::MissingField(other.to_string())),
            }
            Ok(())
        }
    }

    fn account(id: i64, email: &str) -> Account {
        Account {
            id,
            email: email.to_string(),
            created: Timestamp::from_unix_seconds(100),
        }
    }

    #[test]
    fn test_insert_skips_generated_key_and_ignored() {
        let desc = Account::describe().unwrap();
        let record = account(0, "a@x");
        let (sql, params) = InsertBuilder::new(&desc, &record).build().unwrap();
        assert_eq!(
            sql,
            "INSERT INTO accounts (email_address, created_at) VALUES (?, ?)"
        );
        assert_eq!(params.len(), 2);

        let (sql, _) = InsertBuilder::new(&desc, &record)
            .into_table("accounts_archive")
            .build()
            .unwrap();
        assert!(sql.starts_with("INSERT INTO accounts_archive "));
    }

    #[test]
    fn test_zero_timestamp_binds_sentinel() {
        let desc = Account::describe().unwrap();
        let record = Account::default();
        let (_, params) = InsertBuilder::new(&desc, &record).build().unwrap();
        assert_eq!(params[1], Value::Timestamp(Timestamp::ZERO_SENTINEL));
    }

    #[test]
    fn test_upsert_includes_key_once() {
        let desc = Account::describe().unwrap();
        let record = account(7, "a@x");
        let (sql, params) = UpsertBuilder::new(&desc, &record).build().unwrap();
        assert_eq!(
            sql,
            "INSERT INTO accounts (email_address, created_at, id) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE email_address=VALUES(email_address), \
             created_at=VALUES(created_at)"
        );
        assert_eq!(params[2], Value::BigInt(7));

        let (sql, _) = UpsertBuilder::new(&desc, &record)
            .update_fields(&["email"])
            .build()
            .unwrap();
        assert!(sql.ends_with("ON DUPLICATE KEY UPDATE email_address=VALUES(email_address)"));

        let err = UpsertBuilder::new(&desc, &record)
            .update_fields(&["nope"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingField(_)));
    }

    #[test]
    fn test_batch_insert_repeats_groups() {
        let desc = Account::describe().unwrap();
        let records = vec![account(0, "a"), account(0, "b"), account(0, "c")];
        let (sql, params) = InsertManyBuilder::new(&desc, &records)
            .build()
            .unwrap()
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO accounts (email_address, created_at) VALUES (?, ?), (?, ?), (?, ?)"
        );
        assert_eq!(params.len(), 6);
        assert_eq!(params[2], Value::Text("b".into()));

        let empty: Vec<Account> = Vec::new();
        assert!(InsertManyBuilder::new(&desc, &empty).build().unwrap().is_none());
    }

    #[test]
    fn test_update_excludes_key_from_set() {
        let desc = Account::describe().unwrap();
        let record = account(3, "new@x");
        let (sql, params) = UpdateBuilder::new(&desc, &record).build().unwrap();
        assert_eq!(
            sql,
            "UPDATE accounts SET email_address = ?, created_at = ? WHERE id = ?"
        );
        assert_eq!(params.last(), Some(&Value::BigInt(3)));

        let (sql, params) = UpdateBuilder::new(&desc, &record)
            .fields(&["email_address", "id"])
            .build()
            .unwrap();
        assert_eq!(sql, "UPDATE accounts SET email_address = ? WHERE id = ?");
        assert_eq!(params, vec![Value::Text("new@x".into()), Value::BigInt(3)]);
    }

    #[test]
    fn test_key_required_for_update() {
        let desc = ModelDescriptor::builder("Account")
            .field(FieldDef::new("email"))
            .build()
            .unwrap();
        let record = account(1, "x");
        let err = UpdateBuilder::new(&desc, &record).build().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(select_by_pk_sql(&desc).is_err());
    }

    #[test]
    fn test_select_in_uses_list_token() {
        assert_eq!(
            select_in_sql("heroes", "team_id"),
            "SELECT * FROM heroes WHERE team_id IN (??)"
        );
    }
}
