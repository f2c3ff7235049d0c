use std::ops::Bound;

use tracing::{debug, warn};

use crate::config::SortableConfig;
use crate::error::{Error, Result};
use crate::ids::{Position, RecordId, Value};
use crate::scope::{validate_identifier, Aggregate, Direction, PositionRange, Scope};
use crate::traits::{Entry, NewRecord, OrderStore, Record};

/// Which reaction a removal triggers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeleteKind {
    /// A live record left the scope: close the gap, then renumber.
    Full,
    /// An already-trashed record was purged: renumber only.
    RenumberOnly,
}

/// Keeps the order column of every scope a contiguous run starting at `start_order`.
///
/// Every operation takes the scope explicitly. Multi-write operations are not atomic on their
/// own; wrap them in [`OrderMaintainer::atomically`] when the store supports transactions.
pub struct OrderMaintainer<S: OrderStore> {
    store: S,
    config: SortableConfig,
}

impl<S: OrderStore> OrderMaintainer<S> {
    /// Fails with `InvalidInput` when the store writes a different order column than `config` names.
    pub fn new(store: S, config: SortableConfig) -> Result<Self> {
        if let Some(column) = store.order_column() {
            if column != config.order_column_name {
                return Err(Error::InvalidInput(format!(
                    "store orders by `{column}` but config names `{}`",
                    config.order_column_name
                )));
            }
        }
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &SortableConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Scope members sorted by position.
    pub fn ordered(&self, scope: &Scope, direction: Direction) -> Result<Vec<Entry>> {
        self.store.fetch_ordered(scope, &PositionRange::all(), direction)
    }

    /// Largest position in scope, `0` when empty.
    pub fn highest(&self, scope: &Scope) -> Result<Position> {
        Ok(self.store.aggregate(scope, Aggregate::Max)?.unwrap_or(0))
    }

    /// Smallest position in scope, `0` when empty.
    pub fn lowest(&self, scope: &Scope) -> Result<Position> {
        Ok(self.store.aggregate(scope, Aggregate::Min)?.unwrap_or(0))
    }

    /// Position a record appended to `scope` would get.
    pub fn next_position(&self, scope: &Scope) -> Result<Position> {
        Ok(match self.store.aggregate(scope, Aggregate::Max)? {
            Some(max) => max + 1,
            None => self.config.start_order,
        })
    }

    pub fn assign_highest_position<R: Record>(
        &mut self,
        record: &mut R,
        scope: &Scope,
    ) -> Result<()> {
        let position = self.next_position(scope)?;
        debug!(key = %record.key(), position, "assigning highest position");
        record.set_position(position);
        self.save(&*record)
    }

    fn save<R: Record>(&mut self, record: &R) -> Result<()> {
        self.store.update_position(record.key(), record.position())
    }

    /// Rewrite positions from an explicit key sequence, one update per key.
    ///
    /// Trashed rows are updated too. Keys outside the sequence keep their old positions.
    pub fn set_new_order<K>(
        &mut self,
        scope: &Scope,
        keys: &[K],
        start_order: Position,
        key_column: Option<&str>,
    ) -> Result<()>
    where
        K: Clone + Into<Value>,
    {
        let column = match key_column {
            Some(column) => validate_identifier(column)?.to_string(),
            None => self.store.key_column().to_string(),
        };
        let scope = scope.clone().with_trashed();
        debug!(count = keys.len(), start_order, column = %column, "setting new order");
        for (position, key) in (start_order..).zip(keys) {
            let key: Value = key.clone().into();
            self.store.update_position_where(&scope, &column, &key, position)?;
        }
        Ok(())
    }

    pub fn set_new_order_by_custom_column<K>(
        &mut self,
        scope: &Scope,
        key_column: &str,
        keys: &[K],
        start_order: Position,
    ) -> Result<()>
    where
        K: Clone + Into<Value>,
    {
        self.set_new_order(scope, keys, start_order, Some(key_column))
    }

    /// Swap with the nearest record ranked before this one. Returns `false` when already first.
    pub fn move_up<R: Record>(&mut self, record: &mut R, scope: &Scope) -> Result<bool> {
        let neighbour = self.store.fetch_first(
            scope,
            &PositionRange::below(record.position()),
            Direction::Desc,
        )?;
        match neighbour {
            Some(mut other) => {
                self.swap_positions(record, &mut other)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Swap with the nearest record ranked after this one. Returns `false` when already last.
    pub fn move_down<R: Record>(&mut self, record: &mut R, scope: &Scope) -> Result<bool> {
        let neighbour = self.store.fetch_first(
            scope,
            &PositionRange::above(record.position()),
            Direction::Asc,
        )?;
        match neighbour {
            Some(mut other) => {
                self.swap_positions(record, &mut other)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// `b` is saved first with `a`'s position, then `a` with `b`'s old one.
    pub fn swap_positions<A: Record, B: Record>(&mut self, a: &mut A, b: &mut B) -> Result<()> {
        let old_b = b.position();
        debug!(a = %a.key(), b = %b.key(), "swapping positions");
        b.set_position(a.position());
        self.save(&*b)?;
        a.set_position(old_b);
        self.save(&*a)
    }

    pub fn move_to_end<R: Record>(&mut self, record: &mut R, scope: &Scope) -> Result<bool> {
        let max = self.highest(scope)?;
        let old = record.position();
        if old == max {
            return Ok(false);
        }
        debug!(key = %record.key(), from = old, to = max, "moving to end");
        record.set_position(max);
        self.save(&*record)?;
        self.store.shift(
            scope,
            &PositionRange::above(old).excluding(record.key()),
            -1,
        )?;
        Ok(true)
    }

    /// Takes the first record's position and pushes every other record in scope up by one.
    pub fn move_to_start<R: Record>(&mut self, record: &mut R, scope: &Scope) -> Result<bool> {
        let Some(first) = self
            .store
            .fetch_first(scope, &PositionRange::all(), Direction::Asc)?
        else {
            return Ok(false);
        };
        if first.key == record.key() {
            return Ok(false);
        }
        debug!(
            key = %record.key(),
            from = record.position(),
            to = first.position,
            "moving to start"
        );
        record.set_position(first.position);
        self.save(&*record)?;
        self.store.shift(
            scope,
            &PositionRange::all().excluding(record.key()),
            1,
        )?;
        Ok(true)
    }

    /// Place `record` immediately before `target`.
    ///
    /// `target` is not refreshed; re-read it if its position is needed afterwards.
    pub fn move_before<R: Record, T: Record>(
        &mut self,
        record: &mut R,
        target: &T,
        scope: &Scope,
    ) -> Result<bool> {
        let current = record.position();
        let target_pos = target.position();
        if target_pos == current {
            return Ok(false);
        }
        let new_pos = if target_pos < current {
            self.store.shift(
                scope,
                &PositionRange::new(Bound::Included(target_pos), Bound::Excluded(current)),
                1,
            )?;
            target_pos
        } else {
            self.store.shift(
                scope,
                &PositionRange::new(Bound::Excluded(current), Bound::Excluded(target_pos)),
                -1,
            )?;
            target_pos - 1
        };
        debug!(
            key = %record.key(),
            target = %target.key(),
            from = current,
            to = new_pos,
            "moving before"
        );
        record.set_position(new_pos);
        self.save(&*record)?;
        Ok(true)
    }

    /// Place `record` immediately after `target`.
    ///
    /// `target` is not refreshed; re-read it if its position is needed afterwards.
    pub fn move_after<R: Record, T: Record>(
        &mut self,
        record: &mut R,
        target: &T,
        scope: &Scope,
    ) -> Result<bool> {
        let current = record.position();
        let target_pos = target.position();
        if target_pos == current {
            return Ok(false);
        }
        let new_pos = if target_pos > current {
            self.store.shift(
                scope,
                &PositionRange::new(Bound::Excluded(current), Bound::Included(target_pos)),
                -1,
            )?;
            target_pos
        } else {
            self.store.shift(
                scope,
                &PositionRange::new(Bound::Excluded(target_pos), Bound::Excluded(current)),
                1,
            )?;
            target_pos + 1
        };
        debug!(
            key = %record.key(),
            target = %target.key(),
            from = current,
            to = new_pos,
            "moving after"
        );
        record.set_position(new_pos);
        self.save(&*record)?;
        Ok(true)
    }

    /// Move to an absolute position inside `[lowest, highest]` of the scope.
    ///
    /// Asking for the current position performs no reads and no writes. Any other target outside
    /// the scope's range returns [`Error::InvalidInput`] and leaves the store untouched.
    pub fn move_to_position<R: Record>(
        &mut self,
        record: &mut R,
        position: Position,
        scope: &Scope,
    ) -> Result<bool> {
        let current = record.position();
        if position == current {
            return Ok(false);
        }
        let (lowest, highest) = (self.lowest(scope)?, self.highest(scope)?);
        if position < lowest || position > highest {
            return Err(Error::InvalidInput(format!(
                "position {position} outside of scope range [{lowest}, {highest}]"
            )));
        }
        if position < current {
            self.store.shift(
                scope,
                &PositionRange::new(Bound::Included(position), Bound::Excluded(current)),
                1,
            )?;
        } else {
            self.store.shift(
                scope,
                &PositionRange::new(Bound::Excluded(current), Bound::Included(position)),
                -1,
            )?;
        }
        debug!(key = %record.key(), from = current, to = position, "moving to position");
        record.set_position(position);
        self.save(&*record)?;
        Ok(true)
    }

    pub fn is_first<R: Record>(&self, record: &R, scope: &Scope) -> Result<bool> {
        Ok(record.position() == self.lowest(scope)?)
    }

    pub fn is_last<R: Record>(&self, record: &R, scope: &Scope) -> Result<bool> {
        Ok(record.position() == self.highest(scope)?)
    }

    /// Close the gap a removed record left behind.
    pub fn decrement_after_delete<R: Record>(&mut self, record: &R, scope: &Scope) -> Result<()> {
        self.store
            .shift(scope, &PositionRange::above(record.position()), -1)?;
        Ok(())
    }

    /// Renumber every other scope member from `start_order` in current order.
    pub fn reorder_remaining<R: Record>(&mut self, record: &R, scope: &Scope) -> Result<()> {
        let remaining = self.store.fetch_ordered(
            scope,
            &PositionRange::all().excluding(record.key()),
            Direction::Asc,
        )?;
        for (position, entry) in (self.config.start_order..).zip(remaining) {
            if entry.position != position {
                self.store.update_position(entry.key, position)?;
            }
        }
        Ok(())
    }

    /// Reaction to a record leaving the store.
    pub fn on_delete<R: Record>(
        &mut self,
        record: &R,
        scope: &Scope,
        kind: DeleteKind,
    ) -> Result<()> {
        debug!(
            key = %record.key(),
            position = record.position(),
            ?kind,
            "renumbering after delete"
        );
        if kind == DeleteKind::Full {
            self.decrement_after_delete(record, scope)?;
        }
        self.reorder_remaining(record, scope)
    }

    /// Creation hook: append the record to its scope if creation-time sorting is enabled.
    ///
    /// The row is not written; the caller inserts it afterwards.
    pub fn on_create<R: Record>(&self, record: &mut R, scope: &Scope) -> Result<bool> {
        if !self.config.sort_when_creating {
            return Ok(false);
        }
        record.set_position(self.next_position(scope)?);
        Ok(true)
    }

    /// Run the creation hook, then insert.
    pub fn create(&mut self, mut record: NewRecord, scope: &Scope) -> Result<Entry> {
        self.on_create(&mut record, scope)?;
        self.store.insert(&record)?;
        debug!(key = %record.key, position = record.position, "created record");
        Ok(record.entry())
    }

    /// Delete a live record (soft when the store supports it), then close the gap.
    pub fn delete(&mut self, key: RecordId, scope: &Scope) -> Result<()> {
        let entry = self.store.find(key)?.ok_or(Error::NotFound(key))?;
        if entry.trashed {
            return Ok(());
        }
        if self.store.supports_soft_delete() {
            self.store.soft_delete(key)?;
        } else {
            self.store.force_delete(key)?;
        }
        self.on_delete(&entry, scope, DeleteKind::Full)
    }

    /// Remove a record for good. Purging an already-trashed record only renumbers.
    pub fn force_delete(&mut self, key: RecordId, scope: &Scope) -> Result<()> {
        let entry = self.store.find(key)?.ok_or(Error::NotFound(key))?;
        self.store.force_delete(key)?;
        let kind = if entry.trashed {
            DeleteKind::RenumberOnly
        } else {
            DeleteKind::Full
        };
        self.on_delete(&entry, scope, kind)
    }

    /// Run `f` inside a store transaction, rolling back when it fails.
    pub fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.store.begin()?;
        match f(self) {
            Ok(value) => {
                self.store.commit()?;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "rolling back ordering transaction");
                if let Err(rollback) = self.store.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Check that positions in scope run gap-free from `start_order`. Intended for tests and debugging.
    pub fn validate(&self, scope: &Scope) -> Result<()> {
        let entries = self.ordered(scope, Direction::Asc)?;
        for (expected, entry) in (self.config.start_order..).zip(&entries) {
            if entry.position != expected {
                return Err(Error::InconsistentState(format!(
                    "record {} has position {}, expected {}",
                    entry.key, entry.position, expected
                )));
            }
        }
        Ok(())
    }
}
