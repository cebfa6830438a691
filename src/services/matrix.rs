use std::collections::{BTreeMap, HashMap};

use crate::models::{ItemId, RatingRecord, UserId};

use super::{RecommendError, RecommendResult};

/// One observed cell of a row or column: (position in the other axis, rating)
pub type Cell = (usize, f64);

/// User × item rating table restricted to popular items
///
/// Storage is sparse in both directions: each user row and each item column holds only the
/// cells that were rated, ordered by position. An absent cell is a missing rating, never zero.
/// Rows and columns are ordered by ascending identifier, so two builds over the same records
/// produce the same layout.
#[derive(Debug, Clone)]
pub struct RatingMatrix {
    users: Vec<UserId>,
    items: Vec<ItemId>,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
    rows: Vec<Vec<Cell>>,
    columns: Vec<Vec<Cell>>,
}

impl RatingMatrix {
    /// Builds the matrix, keeping only items rated more than `popularity_floor` times
    ///
    /// Several records for the same (user, item) collapse to their mean.
    pub fn build(records: &[RatingRecord], popularity_floor: usize) -> RecommendResult<Self> {
        let mut counts: HashMap<ItemId, usize> = HashMap::new();
        for record in records {
            *counts.entry(record.item_id).or_default() += 1;
        }

        let mut items: Vec<ItemId> = counts
            .into_iter()
            .filter(|(_, count)| *count > popularity_floor)
            .map(|(item, _)| item)
            .collect();

        if items.is_empty() {
            return Err(RecommendError::EmptyMatrix {
                floor: popularity_floor,
            });
        }
        items.sort_unstable();
        let item_index: HashMap<ItemId, usize> =
            items.iter().enumerate().map(|(i, item)| (*item, i)).collect();

        // (user, column) -> (sum, n)
        let mut cells: BTreeMap<(UserId, usize), (f64, u32)> = BTreeMap::new();
        for record in records {
            if let Some(&col) = item_index.get(&record.item_id) {
                let cell = cells.entry((record.user_id, col)).or_insert((0.0, 0));
                cell.0 += record.rating;
                cell.1 += 1;
            }
        }

        let mut users: Vec<UserId> = Vec::new();
        let mut rows: Vec<Vec<Cell>> = Vec::new();
        let mut columns: Vec<Vec<Cell>> = vec![Vec::new(); items.len()];

        // BTreeMap iteration is ordered by (user, column), so rows fill in order
        for ((user, col), (sum, n)) in cells {
            if users.last() != Some(&user) {
                users.push(user);
                rows.push(Vec::new());
            }
            let row = users.len() - 1;
            let rating = sum / f64::from(n);
            rows[row].push((col, rating));
            columns[col].push((row, rating));
        }

        let user_index = users.iter().enumerate().map(|(i, user)| (*user, i)).collect();

        tracing::debug!(
            users = users.len(),
            items = items.len(),
            popularity_floor,
            "Rating matrix built"
        );

        Ok(Self {
            users,
            items,
            user_index,
            item_index,
            rows,
            columns,
        })
    }

    /// Users in row order
    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    /// Items in column order
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of non-missing cells
    pub fn rating_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn user_position(&self, user: UserId) -> Option<usize> {
        self.user_index.get(&user).copied()
    }

    pub fn item_position(&self, item: ItemId) -> Option<usize> {
        self.item_index.get(&item).copied()
    }

    pub fn contains_user(&self, user: UserId) -> bool {
        self.user_index.contains_key(&user)
    }

    pub fn contains_item(&self, item: ItemId) -> bool {
        self.item_index.contains_key(&item)
    }

    /// Rated cells of a user, as (column, rating)
    pub fn row(&self, user: UserId) -> Option<&[Cell]> {
        self.user_position(user).map(|row| self.rows[row].as_slice())
    }

    /// Rated cells of an item, as (row, rating)
    pub fn column(&self, item: ItemId) -> Option<&[Cell]> {
        self.item_position(item).map(|col| self.columns[col].as_slice())
    }

    pub(crate) fn row_at(&self, row: usize) -> &[Cell] {
        &self.rows[row]
    }

    pub(crate) fn column_at(&self, col: usize) -> &[Cell] {
        &self.columns[col]
    }

    /// The rating `user` gave `item`, or `None` when the cell is missing
    pub fn get(&self, user: UserId, item: ItemId) -> Option<f64> {
        let row = self.row(user)?;
        let col = self.item_position(item)?;
        row.binary_search_by_key(&col, |(c, _)| *c)
            .ok()
            .map(|i| row[i].1)
    }
}
