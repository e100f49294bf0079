//! Aggregate executor implementation.
//!
//! Computes one aggregate over one column, optionally grouped by another
//! column. All input is consumed on the first call to `next()`.

use crate::access::schema::{ColumnInfo, Schema};
use crate::access::tuple::Tuple;
use crate::access::value::{DataType, Value};
use crate::executor::Executor;
use crate::storage::StorageError;
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::fmt;

/// Aggregate functions supported by the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    /// Integer average, truncated toward zero.
    Avg,
    Count,
}

impl AggregateOp {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Count => "COUNT",
        }
    }

    /// Only COUNT works on non-integer columns.
    pub fn supports(&self, data_type: DataType) -> bool {
        data_type == DataType::Int32 || *self == AggregateOp::Count
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running state of one group
#[derive(Debug, Clone, Default)]
struct AggregateState {
    count: i64,
    sum: i64,
    min: Option<i32>,
    max: Option<i32>,
}

impl AggregateState {
    fn update(&mut self, value: &Value) {
        self.count += 1;
        if let Value::Int32(v) = value {
            self.sum += i64::from(*v);
            self.min = Some(self.min.map_or(*v, |m| m.min(*v)));
            self.max = Some(self.max.map_or(*v, |m| m.max(*v)));
        }
    }

    fn finalize(&self, op: AggregateOp) -> Result<Value> {
        let result = match op {
            AggregateOp::Count => self.count,
            AggregateOp::Sum => self.sum,
            AggregateOp::Avg => self.sum / self.count.max(1),
            AggregateOp::Min => self.min.map(i64::from).unwrap_or_default(),
            AggregateOp::Max => self.max.map(i64::from).unwrap_or_default(),
        };
        let result = i32::try_from(result).map_err(|_| {
            StorageError::Unsupported(format!("{} result {} overflows INT", op, result))
        })?;
        Ok(Value::Int32(result))
    }
}

pub struct AggregateExecutor {
    child: Box<dyn Executor>,
    column: usize,
    group_by: Option<usize>,
    op: AggregateOp,
    output_schema: Schema,
    results: Vec<Tuple>,
    cursor: usize,
    computed: bool,
    initialized: bool,
}

impl AggregateExecutor {
    /// `op(column)` over the child's tuples, one output row per distinct
    /// value of `group_by` in the order groups are first seen.
    pub fn new(
        child: Box<dyn Executor>,
        column: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> Self {
        Self {
            child,
            column,
            group_by,
            op,
            output_schema: Schema::new(Vec::new()),
            results: Vec::new(),
            cursor: 0,
            computed: false,
            initialized: false,
        }
    }

    fn build_output_schema(&self) -> Result<Schema> {
        let child_schema = self.child.output_schema();
        let Some(agg_column) = child_schema.column(self.column) else {
            bail!("Aggregate column index {} is out of bounds", self.column);
        };
        if !self.op.supports(agg_column.data_type) {
            return Err(StorageError::Unsupported(format!(
                "{} over {} column {}",
                self.op, agg_column.data_type, agg_column.name
            ))
            .into());
        }

        let mut columns = Vec::with_capacity(2);
        if let Some(idx) = self.group_by {
            let Some(group_column) = child_schema.column(idx) else {
                bail!("GROUP BY column index {} is out of bounds", idx);
            };
            columns.push(group_column.clone());
        }
        columns.push(ColumnInfo::new(
            format!("{}({})", self.op, agg_column.name),
            DataType::Int32,
        ));
        Ok(Schema::new(columns))
    }

    fn consume_input(&mut self) -> Result<()> {
        let mut index: HashMap<Option<Value>, usize> = HashMap::new();
        let mut groups: Vec<(Option<Value>, AggregateState)> = Vec::new();

        while let Some(tuple) = self.child.next()? {
            let key = match self.group_by {
                Some(idx) => Some(tuple.values[idx].clone()),
                None => None,
            };
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                groups.push((key, AggregateState::default()));
                groups.len() - 1
            });
            groups[slot].1.update(&tuple.values[self.column]);
        }

        self.results = groups
            .into_iter()
            .map(|(key, state)| {
                let mut values: Vec<Value> = key.into_iter().collect();
                values.push(state.finalize(self.op)?);
                Ok(Tuple::new(values))
            })
            .collect::<Result<_>>()?;
        self.cursor = 0;
        self.computed = true;
        Ok(())
    }
}

impl Executor for AggregateExecutor {
    fn init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.child.init()?;
        self.output_schema = self.build_output_schema()?;
        self.initialized = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>> {
        if !self.initialized {
            bail!("Executor not initialized. Call init() first.");
        }
        if !self.computed {
            self.consume_input()?;
        }

        let row = self.results.get(self.cursor).cloned();
        if row.is_some() {
            self.cursor += 1;
        }
        Ok(row)
    }

    /// Recomputes from a rewound child on the next call to `next()`.
    fn rewind(&mut self) -> Result<()> {
        self.child.rewind()?;
        self.results.clear();
        self.cursor = 0;
        self.computed = false;
        Ok(())
    }

    fn output_schema(&self) -> &Schema {
        &self.output_schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::people;
    use crate::executor::{collect_all, ExecutionContext, SeqScanExecutor};

    const ROWS: &[(i32, &str, i32)] = &[
        (1, "ann", 30),
        (2, "bob", 20),
        (3, "ann", 10),
        (4, "cy", 25),
        (5, "bob", 21),
    ];

    fn aggregate(
        rows: &[(i32, &str, i32)],
        column: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> Result<Vec<Vec<Value>>> {
        let t = people(rows)?;
        let txn = t.db.begin();
        let scan = SeqScanExecutor::new(t.table, ExecutionContext::for_database(&t.db, txn.id()));
        let mut agg = AggregateExecutor::new(Box::new(scan), column, group_by, op);
        Ok(collect_all(&mut agg)?
            .into_iter()
            .map(|t| t.values)
            .collect())
    }

    fn single(op: AggregateOp) -> Result<i32> {
        let rows = aggregate(ROWS, 2, None, op)?;
        assert_eq!(rows.len(), 1);
        Ok(rows[0][0].as_i32().unwrap_or(i32::MIN))
    }

    #[test]
    fn test_ungrouped_int_aggregates() -> Result<()> {
        assert_eq!(single(AggregateOp::Min)?, 10);
        assert_eq!(single(AggregateOp::Max)?, 30);
        assert_eq!(single(AggregateOp::Sum)?, 106);
        assert_eq!(single(AggregateOp::Avg)?, 21);
        assert_eq!(single(AggregateOp::Count)?, 5);
        Ok(())
    }

    #[test]
    fn test_grouped_in_first_seen_order() -> Result<()> {
        let rows = aggregate(ROWS, 2, Some(1), AggregateOp::Sum)?;
        assert_eq!(
            rows,
            vec![
                vec![Value::String("ann".into()), Value::Int32(40)],
                vec![Value::String("bob".into()), Value::Int32(41)],
                vec![Value::String("cy".into()), Value::Int32(25)],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_count_over_strings() -> Result<()> {
        let rows = aggregate(ROWS, 1, None, AggregateOp::Count)?;
        assert_eq!(rows, vec![vec![Value::Int32(5)]]);
        Ok(())
    }

    #[test]
    fn test_non_count_over_strings_is_unsupported() -> Result<()> {
        let err = aggregate(ROWS, 1, None, AggregateOp::Max).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::Unsupported(_))
        ));
        Ok(())
    }

    #[test]
    fn test_empty_input_yields_nothing() -> Result<()> {
        assert!(aggregate(&[], 2, None, AggregateOp::Count)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_output_schema_and_rewind() -> Result<()> {
        let t = people(ROWS)?;
        let txn = t.db.begin();
        let scan = SeqScanExecutor::new(t.table, ExecutionContext::for_database(&t.db, txn.id()));
        let mut agg = AggregateExecutor::new(Box::new(scan), 0, Some(1), AggregateOp::Count);
        agg.init()?;

        let names: Vec<_> = agg
            .output_schema()
            .columns()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["name", "COUNT(id)"]);

        let first = collect_all(&mut agg)?;
        agg.rewind()?;
        let second = collect_all(&mut agg)?;
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        Ok(())
    }

    #[test]
    fn test_avg_truncates() {
        let mut state = AggregateState::default();
        for v in [1, 2, 2] {
            state.update(&Value::Int32(v));
        }
        assert_eq!(state.finalize(AggregateOp::Avg).ok(), Some(Value::Int32(1)));

        let mut negative = AggregateState::default();
        for v in [-1, -2] {
            negative.update(&Value::Int32(v));
        }
        assert_eq!(negative.finalize(AggregateOp::Avg).ok(), Some(Value::Int32(-1)));
    }
}
