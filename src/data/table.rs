// Table abstraction
// An ordered, ID-indexed list of typed rows. Positions are transient; IDs are
// durable. The ID index is rebuilt on every mutation that shifts positions.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::data::row::DataRowBackedObject;

#[derive(Debug, Clone)]
pub struct DataTableBackedList<T: DataRowBackedObject> {
    rows: Vec<T>,
    positions: HashMap<i64, usize>,
    generation: u64,
}

impl<T: DataRowBackedObject> Default for DataTableBackedList<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: DataRowBackedObject> DataTableBackedList<T> {
    pub fn new(rows: Vec<T>) -> Self {
        let mut list = DataTableBackedList { rows, positions: HashMap::new(), generation: 0 };
        list.reindex_from(0);
        list
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Incremented on every structural mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Positional access, valid for `0..len()`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.rows.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.rows.get_mut(index)
    }

    /// Lookup by durable ID. Absence is an expected outcome after reselection.
    pub fn find(&self, id: i64) -> Option<&T> {
        self.positions.get(&id).map(|&i| &self.rows[i])
    }

    pub fn find_mut(&mut self, id: i64) -> Option<&mut T> {
        match self.positions.get(&id) {
            Some(&i) => self.rows.get_mut(i),
            None => None,
        }
    }

    pub fn index_of_id(&self, id: i64) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Append a row. A row whose ID is already present replaces the old one in place.
    pub fn push(&mut self, row: T) {
        let id = row.id();
        match self.positions.get(&id) {
            Some(&i) => {
                log::warn!("row {} already present at position {}; replacing", id, i);
                self.rows[i] = row;
            }
            None => {
                self.positions.insert(id, self.rows.len());
                self.rows.push(row);
            }
        }
        self.generation += 1;
    }

    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        if index >= self.rows.len() {
            return None;
        }
        let removed = self.rows.remove(index);
        self.positions.remove(&removed.id());
        self.reindex_from(index);
        self.generation += 1;
        Some(removed)
    }

    pub fn remove_id(&mut self, id: i64) -> Option<T> {
        let index = self.index_of_id(id)?;
        self.remove_at(index)
    }

    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.rows.sort_by(compare);
        self.reindex_from(0);
        self.generation += 1;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    /// Snapshot of the current IDs in position order.
    pub fn ids(&self) -> Vec<i64> {
        self.rows.iter().map(|r| r.id()).collect()
    }

    /// Start an index-driven walk that tolerates mutation between steps.
    pub fn cursor(&self) -> ListCursor {
        ListCursor { next_index: 0, last_id: None, generation: self.generation }
    }

    fn reindex_from(&mut self, start: usize) {
        for (i, row) in self.rows.iter().enumerate().skip(start) {
            self.positions.insert(row.id(), i);
        }
    }
}

impl<'a, T: DataRowBackedObject> IntoIterator for &'a DataTableBackedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Index-driven iteration that does not hold a borrow between steps, so the
/// list may be mutated while a walk is in progress.
///
/// Weak guarantee: after a mutation the cursor resumes just past the last row
/// it yielded, located by ID. If that row was itself removed the cursor
/// resumes at the slot it occupied. Single insertions and removals neither
/// skip nor repeat rows. A re-sort can move unvisited rows behind the cursor
/// and visited ones ahead of it, so after one a row may be yielded twice or
/// missed.
#[derive(Debug, Clone)]
pub struct ListCursor {
    next_index: usize,
    last_id: Option<i64>,
    generation: u64,
}

impl ListCursor {
    pub fn next<'a, T: DataRowBackedObject>(&mut self, list: &'a DataTableBackedList<T>) -> Option<&'a T> {
        if self.generation != list.generation() {
            if let Some(last_id) = self.last_id {
                self.next_index = match list.index_of_id(last_id) {
                    Some(i) => i + 1,
                    None => self.next_index.saturating_sub(1),
                };
            }
            self.generation = list.generation();
        }
        let row = list.get(self.next_index)?;
        self.last_id = Some(row.id());
        self.next_index += 1;
        Some(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::column_tuple::{ColumnTuple, ColumnTuplesWithWhere};
    use crate::data::row::DataRow;

    #[derive(Debug, Clone)]
    struct Plain(DataRow);

    impl DataRowBackedObject for Plain {
        fn data_row(&self) -> &DataRow {
            &self.0
        }

        fn data_row_mut(&mut self) -> &mut DataRow {
            &mut self.0
        }

        fn create_column_tuples_with_where_by_id(&self) -> crate::error::Result<ColumnTuplesWithWhere> {
            ColumnTuplesWithWhere::by_id(vec![ColumnTuple::from_string("Note", "")], self.id())
        }
    }

    fn list(ids: &[i64]) -> DataTableBackedList<Plain> {
        DataTableBackedList::new(ids.iter().map(|&id| Plain(DataRow::new(id))).collect())
    }

    #[test]
    fn test_find_by_id() {
        let table = list(&[10, 20, 30]);
        for id in [10, 20, 30] {
            assert_eq!(table.find(id).map(|r| r.id()), Some(id));
        }
        assert!(table.find(40).is_none());
    }

    #[test]
    fn test_index_stays_consistent_after_remove_and_sort() {
        let mut table = list(&[10, 20, 30, 40]);
        table.remove_at(1);
        assert_eq!(table.index_of_id(30), Some(1));
        assert!(table.find(20).is_none());
        table.sort_by(|a, b| b.id().cmp(&a.id()));
        assert_eq!(table.ids(), vec![40, 30, 10]);
        assert_eq!(table.index_of_id(10), Some(2));
        let row = table.find(30).unwrap().clone();
        assert_eq!(row.index_in(&table), Some(1));
    }

    #[test]
    fn test_push_replaces_duplicate_id() {
        let mut table = list(&[1, 2]);
        table.push(Plain(DataRow::new(2)));
        assert_eq!(table.len(), 2);
        table.push(Plain(DataRow::new(3)));
        assert_eq!(table.index_of_id(3), Some(2));
    }

    #[test]
    fn test_cursor_survives_removal_behind_it() {
        let mut table = list(&[1, 2, 3, 4, 5]);
        let mut cursor = table.cursor();
        let mut seen = Vec::new();
        seen.push(cursor.next(&table).unwrap().id());
        seen.push(cursor.next(&table).unwrap().id());
        table.remove_id(1);
        while let Some(row) = cursor.next(&table) {
            seen.push(row.id());
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_cursor_resumes_when_current_row_removed() {
        let mut table = list(&[1, 2, 3, 4]);
        let mut cursor = table.cursor();
        cursor.next(&table);
        cursor.next(&table);
        // The row just yielded disappears
        table.remove_id(2);
        let mut rest = Vec::new();
        while let Some(row) = cursor.next(&table) {
            rest.push(row.id());
        }
        assert_eq!(rest, vec![3, 4]);
    }

    #[test]
    fn test_cursor_follows_last_row_after_resort() {
        let mut table = list(&[1, 2, 3]);
        let mut cursor = table.cursor();
        cursor.next(&table);
        table.sort_by(|a, b| b.id().cmp(&a.id()));
        let mut rest = Vec::new();
        while let Some(row) = cursor.next(&table) {
            rest.push(row.id());
        }
        // Row 1 moved to the end, so nothing follows it
        assert!(rest.is_empty());
    }
}
