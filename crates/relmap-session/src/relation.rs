//! Batched association loading.
//!
//! After the roots of a select are materialized, every declared association
//! is resolved with exactly one `IN` query against its target table, however
//! many roots there are. Rows are matched back to roots through the typed
//! field values on both sides, so an `INT` foreign key finds a `BIGINT`
//! primary key and a driver reporting keys as text still matches.
//!
//! Only the roots' own associations are loaded; targets are materialized
//! flat.

use crate::executor;
use crate::orm::EngineState;
use asupersync::{Cx, Outcome};
use relmap_core::{
    AssociationDescriptor, AssociationKind, ColumnPlan, Error, Executor, Model, ModelDescriptor,
    Result, Row, RowKey, Value,
};
use relmap_query::select_in_sql;
use std::collections::HashMap;

/// Root indices grouped by join key, with the distinct key values in first
/// seen order.
struct KeyGroups {
    groups: HashMap<RowKey, Vec<usize>>,
    values: Vec<Value>,
}

impl KeyGroups {
    fn collect<M: Model>(roots: &[M], field_name: &str) -> Self {
        let mut groups: HashMap<RowKey, Vec<usize>> = HashMap::new();
        let mut values = Vec::new();
        for (idx, root) in roots.iter().enumerate() {
            let Some(value) = root.field_value(field_name) else {
                continue;
            };
            let Some(key) = value.as_key() else {
                continue;
            };
            let entry = groups.entry(key).or_default();
            if entry.is_empty() {
                values.push(value);
            }
            entry.push(idx);
        }
        Self { groups, values }
    }
}

/// How an association's rows line up with its roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JoinKeys {
    /// Column carried by both tables.
    pub(crate) column: String,
    /// Root field holding the key.
    pub(crate) owner_field: &'static str,
    /// Target field holding the key.
    pub(crate) target_field: &'static str,
}

/// Work out the join for `assoc`.
///
/// HasOne and HasMany join on the owner's primary key column, which the
/// target must map. BelongsTo joins on the target's primary key column,
/// which the owner must map.
pub(crate) fn join_keys(
    owner: &ModelDescriptor,
    assoc: &AssociationDescriptor,
    target: &ModelDescriptor,
) -> Result<JoinKeys> {
    let (holder, key) = match assoc.kind {
        AssociationKind::HasOne | AssociationKind::HasMany => {
            (target, owner.require_primary_key()?)
        }
        AssociationKind::BelongsTo => (owner, target.require_primary_key()?),
    };
    let Some(foreign) = holder.field_for_column(&key.column_name) else {
        return Err(Error::configuration(
            owner.type_name(),
            format!(
                "{} field '{}' needs {} to map column '{}'",
                assoc.kind.as_str(),
                assoc.field_name,
                holder.type_name(),
                key.column_name
            ),
        ));
    };
    let (owner_field, target_field) = match assoc.kind {
        AssociationKind::HasOne | AssociationKind::HasMany => (key.field_name, foreign.field_name),
        AssociationKind::BelongsTo => (foreign.field_name, key.field_name),
    };
    Ok(JoinKeys {
        column: key.column_name.clone(),
        owner_field,
        target_field,
    })
}

/// Check that every association of `descriptor` can be joined.
///
/// Targets are described directly rather than through the cache, so two
/// models pointing at each other do not recurse.
pub(crate) fn check_associations(descriptor: &ModelDescriptor) -> Result<()> {
    for assoc in descriptor.associations() {
        let target = assoc.target.describe()?;
        join_keys(descriptor, assoc, &target)?;
    }
    Ok(())
}

/// Resolve every association declared on `M` for `roots`.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(model = descriptor.type_name(), roots = roots.len())
)]
pub(crate) async fn resolve<E: Executor, M: Model>(
    executor: &E,
    state: &EngineState,
    cx: &Cx,
    descriptor: &ModelDescriptor,
    roots: &mut [M],
) -> Outcome<(), Error> {
    if roots.is_empty() {
        return Outcome::Ok(());
    }
    for assoc in descriptor.associations() {
        try_outcome!(resolve_one(executor, state, cx, descriptor, assoc, roots).await);
    }
    Outcome::Ok(())
}

async fn resolve_one<E: Executor, M: Model>(
    executor: &E,
    state: &EngineState,
    cx: &Cx,
    descriptor: &ModelDescriptor,
    assoc: &AssociationDescriptor,
    roots: &mut [M],
) -> Outcome<(), Error> {
    let target = try_result!(state.descriptors.target(&assoc.target));
    let join = try_result!(join_keys(descriptor, assoc, &target));

    let keys = KeyGroups::collect(roots, join.owner_field);
    if keys.values.is_empty() {
        return Outcome::Ok(());
    }

    tracing::debug!(
        association = assoc.field_name,
        kind = assoc.kind.as_str(),
        target = %assoc.target_table,
        keys = keys.values.len(),
        "Loading association batch"
    );

    let sql = select_in_sql(&assoc.target_table, &join.column);
    let rows = try_outcome!(
        executor::query(executor, state, cx, &sql, vec![Value::Array(keys.values)]).await
    );
    let Some(plan) = ColumnPlan::for_rows(&target, &rows) else {
        return Outcome::Ok(());
    };

    try_result!(stitch(assoc, &plan, &rows, &join, &keys.groups, roots));
    Outcome::Ok(())
}

fn stitch<M: Model>(
    assoc: &AssociationDescriptor,
    plan: &ColumnPlan,
    rows: &[Row],
    join: &JoinKeys,
    groups: &HashMap<RowKey, Vec<usize>>,
    roots: &mut [M],
) -> Result<()> {
    for row in rows {
        if row.column_index(&join.column).is_none() {
            return Err(Error::configuration(
                assoc.target.type_name(),
                format!(
                    "{} rows have no column '{}' to join on",
                    assoc.target_table, join.column
                ),
            ));
        }
        let (key, related) = assoc.target.materialize(plan, row, join.target_field)?;
        let Some(indices) = key
            .as_ref()
            .and_then(Value::as_key)
            .and_then(|key| groups.get(&key))
        else {
            continue;
        };

        // Each root sharing the key gets its own copy of the record.
        let mut related = Some(related);
        for &idx in indices {
            let record = match related.take() {
                Some(record) => record,
                None => assoc.target.materialize(plan, row, join.target_field)?.1,
            };
            roots[idx].attach_related(assoc.field_name, record)?;
        }
    }
    Ok(())
}
