//! Materializing combinators: group-by and sort.
//!
//! Both buffer every row that reaches their step and only emit once the
//! upstream pipeline has completed, so memory grows with the input.

use crate::error::{EtlError, Result};
use crate::pipeline::Pipeline;
use crate::row::Row;
use crate::source::{ChainedSource, Feed, Source};
use crate::step::{Flow, render_name};
use crate::value::Value;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

/// Nested index built by `group_by`: one level per column keyed by the
/// column's string form, with lists of rows at the leaves.
#[derive(Debug, Default)]
struct GroupIndex {
    columns: Vec<String>,
    root: Row,
}

impl GroupIndex {
    fn insert(&mut self, row: &Row) -> Result<()> {
        let keys = self
            .columns
            .iter()
            .map(|c| {
                row.get(c)
                    .map(ToString::to_string)
                    .ok_or_else(|| EtlError::missing_column(c, "groupBy"))
            })
            .collect::<Result<Vec<_>>>()?;
        let Some((leaf, parents)) = keys.split_last() else {
            return Ok(());
        };

        let mut level = &mut self.root;
        for key in parents {
            if !matches!(level.get(key), Some(Value::Row(_))) {
                level.insert(key.as_str(), Value::Row(Row::new()));
            }
            let Some(Value::Row(next)) = level.get_mut(key) else {
                return Err(EtlError::missing_column(key, "groupBy level"));
            };
            level = next;
        }
        if !matches!(level.get(leaf), Some(Value::List(_))) {
            level.insert(leaf.as_str(), Value::List(Vec::new()));
        }
        if let Some(Value::List(rows)) = level.get_mut(leaf) {
            rows.push(Value::Row(row.clone()));
        }
        Ok(())
    }
}

/// Drives the grouped pipeline: completes the upstream, then pushes the
/// whole index as a single row on line 1.
struct GroupedSource {
    name: String,
    upstream: ChainedSource,
    index: Rc<RefCell<GroupIndex>>,
}

impl Source for GroupedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, pipeline: &Pipeline) -> Result<Flow> {
        self.upstream.start(pipeline)?;
        let tree = std::mem::take(&mut self.index.borrow_mut().root);
        pipeline.process(tree, 1)
    }
}

/// Rows buffered by `sort`, ordered on demand.
#[derive(Debug, Default)]
struct SortBuffer {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl SortBuffer {
    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        self.columns
            .iter()
            .map(|c| {
                let left = a.get(c).unwrap_or(&Value::Null);
                let right = b.get(c).unwrap_or(&Value::Null);
                left.cmp(right)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Drain the buffer in stable sorted order.
    fn take_sorted(&mut self) -> Vec<Row> {
        let mut rows = std::mem::take(&mut self.rows);
        rows.sort_by(|a, b| self.compare(a, b));
        rows
    }
}

impl Pipeline {
    /// Group every row by the string form of `columns`, outermost first.
    ///
    /// The returned pipeline receives exactly one row once this pipeline has
    /// completed: the nested index. A row missing a grouping column fails
    /// the run.
    ///
    /// ```
    /// use rowflow::*;
    ///
    /// # fn main() -> rowflow::Result<()> {
    /// from_rows(vec![
    ///     row! { "gender" => "m", "id" => 1 },
    ///     row! { "gender" => "f", "id" => 2 },
    ///     row! { "gender" => "m", "id" => 3 },
    /// ])
    /// .group_by(["gender"])
    /// .start_with(|tree: Row| {
    ///     assert_eq!(tree.get("m").and_then(Value::as_list).map(<[_]>::len), Some(2));
    ///     Ok(tree)
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn group_by<S: Into<String>>(self, columns: impl IntoIterator<Item = S>) -> Pipeline {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let name = render_name("groupBy", &columns);
        let index = Rc::new(RefCell::new(GroupIndex {
            columns,
            root: Row::new(),
        }));
        let state = Rc::clone(&index);
        let this = self.add_step(name, move |row: Row| {
            state.borrow_mut().insert(&row)?;
            Ok(row)
        });

        let next = Pipeline::with_source(
            this.name(),
            GroupedSource {
                name: this.name(),
                upstream: ChainedSource::new(this.clone()),
                index,
            },
        );
        next.copy_statistics_from(&this);
        next
    }

    /// Buffer every row, then replay them sorted by `columns` into the
    /// returned pipeline once this one completes.
    ///
    /// The sort is stable and compares values by their natural order, with
    /// later columns breaking ties. A missing column sorts as null, first.
    pub fn sort<S: Into<String>>(self, columns: impl IntoIterator<Item = S>) -> Pipeline {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let name = render_name("sort", &columns);
        let buffer = Rc::new(RefCell::new(SortBuffer {
            columns,
            rows: Vec::new(),
        }));
        let state = Rc::clone(&buffer);
        let this = self.add_step(name, move |row: Row| {
            state.borrow_mut().rows.push(row.clone());
            Ok(row)
        });

        let next = Pipeline::with_source(this.name(), ChainedSource::new(this.clone()));
        let feed = Feed::new(this.name(), &next);
        let downstream = next.downgrade();
        let upstream = this.downgrade();
        this.on_complete(Box::new(move || {
            let snapshot = upstream.upgrade()?.statistic();
            downstream.upgrade()?.stat_mut().copy(&snapshot);
            let rows = buffer.borrow_mut().take_sorted();
            feed.push_all(rows)
        }));
        next
    }
}
