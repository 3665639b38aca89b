//! Relational assembly: collects the rows of one view and wires child rows
//! into parent holders.
//!
//! Every collector indexes its rows by the columns its relations join on. A
//! child collector keeps a weak reference to its parent's sealed index for
//! that relation and records `(parent, child)` position pairs, either as rows
//! arrive (read-matched) or in one pass after the read (read-all). The parent
//! then merges the finished child in relation order.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use crate::cache::CachedRow;
use crate::codec::CodecContext;
use crate::config::Cardinality;
use crate::connector::RowSink;
use crate::error::CollectorError;
use crate::value::{Key, Record, Value};
use crate::view::View;

/// Positions of every row carrying a given key.
pub type KeyIndex = HashMap<Key, Vec<usize>>;

struct Row {
    record: Record,
    unmapped: HashMap<String, Value>,
}

struct ParentLink {
    /// Child-side join column.
    column: String,
    index: Weak<KeyIndex>,
}

pub struct Collector {
    view: Arc<View>,
    dest: Option<Vec<Record>>,
    unmapped: Vec<HashMap<String, Value>>,
    row: Option<Row>,
    scratch: Value,
    building: HashMap<String, KeyIndex>,
    sealed: HashMap<String, Arc<KeyIndex>>,
    parent: Option<ParentLink>,
    /// Matched `(parent position, own position)` pairs, in own row order.
    matches: Vec<(usize, usize)>,
}

impl Collector {
    pub fn new(view: Arc<View>) -> Self {
        let building = view
            .key_columns()
            .into_iter()
            .map(|c| (c.to_string(), KeyIndex::new()))
            .collect();
        Collector {
            view,
            dest: Some(Vec::new()),
            unmapped: Vec::new(),
            row: None,
            scratch: Value::Null,
            building,
            sealed: HashMap::new(),
            parent: None,
            matches: Vec::new(),
        }
    }

    pub fn view(&self) -> &Arc<View> {
        &self.view
    }

    pub fn len(&self) -> usize {
        self.dest.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> &[Record] {
        self.dest.as_deref().unwrap_or_default()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.dest.unwrap_or_default()
    }

    /// Links this collector to `parent`'s sealed index on `relation`, so rows
    /// are matched as they arrive.
    pub fn attach(&mut self, parent: &Collector, relation: usize) -> Result<(), CollectorError> {
        let rel = parent
            .view
            .relations
            .get(relation)
            .ok_or(CollectorError::NilDestination)?;
        let index = parent.sealed.get(&rel.column).ok_or(CollectorError::NilDestination)?;
        self.parent = Some(ParentLink {
            column: rel.of_column.clone(),
            index: Arc::downgrade(index),
        });
        Ok(())
    }

    /// Freezes the key indexes; children can only attach after this.
    pub fn seal(&mut self) {
        for (column, index) in self.building.drain() {
            self.sealed.insert(column, Arc::new(index));
        }
    }

    /// Distinct non-null values of `column`, in order of first appearance.
    pub fn keys(&self, column: &str) -> Vec<Key> {
        let mut seen = HashSet::new();
        (0..self.len())
            .filter_map(|pos| self.key_at(pos, column))
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    /// Matches every collected row against `parent`'s index on `relation`.
    /// Used after a read-all child finished independently of its parent.
    pub fn match_parent(&mut self, parent: &Collector, relation: usize) -> Result<(), CollectorError> {
        let rel = parent
            .view
            .relations
            .get(relation)
            .ok_or(CollectorError::NilDestination)?;
        let index = parent.sealed.get(&rel.column).ok_or(CollectorError::NilDestination)?;
        self.matches.clear();
        for pos in 0..self.len() {
            if let Some(parents) = self.key_at(pos, &rel.of_column).and_then(|k| index.get(&k)) {
                self.matches.extend(parents.iter().map(|p| (*p, pos)));
            }
        }
        Ok(())
    }

    /// Moves matched child rows into the holder of `relation`. One holders
    /// keep the last match; Many holders append in child row order.
    pub fn merge(&mut self, relation: usize, child: Collector) -> Result<(), CollectorError> {
        let rel = self
            .view
            .relations
            .get(relation)
            .ok_or(CollectorError::NilDestination)?;
        let holder = rel.holder_index();
        let cardinality = rel.cardinality;
        let dest = self.dest.as_mut().ok_or(CollectorError::NilDestination)?;
        let matches = child.matches;
        let records = child.dest.ok_or(CollectorError::NilDestination)?;
        for (parent, pos) in matches {
            let (Some(target), Some(record)) = (dest.get_mut(parent), records.get(pos)) else {
                continue;
            };
            let Some(slot) = target.slot_at(holder) else {
                continue;
            };
            match cardinality {
                Cardinality::One => *slot = Value::Record(record.clone()),
                Cardinality::Many => match slot {
                    Value::List(list) => list.push(record.clone()),
                    other => *other = Value::List(vec![record.clone()]),
                },
            }
        }
        Ok(())
    }

    /// Appends an already-built record, e.g. a prefetched one.
    pub fn push_record(&mut self, record: Record) -> Result<(), CollectorError> {
        self.append(record, HashMap::new())
    }

    pub fn push_cached(&mut self, row: CachedRow) -> Result<(), CollectorError> {
        self.append(row.record, row.unmapped)
    }

    /// Rows collected from position `start` on, in cacheable form.
    pub fn rows_from(&self, start: usize) -> Vec<CachedRow> {
        self.records()
            .iter()
            .zip(&self.unmapped)
            .skip(start)
            .map(|(record, unmapped)| CachedRow {
                record: record.clone(),
                unmapped: unmapped.clone(),
            })
            .collect()
    }

    fn key_at(&self, pos: usize, column: &str) -> Option<Key> {
        let record = self.dest.as_ref()?.get(pos)?;
        let value = record
            .column(column)
            .or_else(|| self.unmapped.get(pos).and_then(|u| lookup(u, column)))?;
        Key::from_value(value)
    }

    fn append(&mut self, record: Record, unmapped: HashMap<String, Value>) -> Result<(), CollectorError> {
        let dest = self.dest.as_mut().ok_or(CollectorError::NilDestination)?;
        let pos = dest.len();
        dest.push(record);
        self.unmapped.push(unmapped);

        let columns: Vec<String> = self.building.keys().cloned().collect();
        for column in columns {
            if let Some(key) = self.key_at(pos, &column) {
                if let Some(index) = self.building.get_mut(&column) {
                    index.entry(key).or_default().push(pos);
                }
            }
        }
        if let Some(link) = &self.parent {
            let index = link.index.upgrade().ok_or(CollectorError::NilDestination)?;
            if let Some(parents) = self.key_at(pos, &link.column).and_then(|k| index.get(&k)) {
                self.matches.extend(parents.iter().map(|p| (*p, pos)));
            }
        }
        Ok(())
    }

    fn decode(&self, row: &mut Row) -> Result<(), CollectorError> {
        for column in self.view.columns.iter() {
            let Some(codec) = &column.codec else {
                continue;
            };
            let slot = match row.record.column_slot(&column.name) {
                Some(slot) => slot,
                None => match row.unmapped.get_mut(&column.name) {
                    Some(slot) => slot,
                    None => continue,
                },
            };
            let ctx = CodecContext {
                view: &self.view.name,
                name: &column.name,
            };
            *slot = codec.decode(&ctx, slot).map_err(|e| CollectorError::Decode {
                column: column.name.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

fn lookup<'a>(values: &'a HashMap<String, Value>, column: &str) -> Option<&'a Value> {
    values.get(column).or_else(|| {
        values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(column))
            .map(|(_, v)| v)
    })
}

impl RowSink for Collector {
    fn new_item(&mut self) -> Result<(), CollectorError> {
        if self.dest.is_none() {
            return Err(CollectorError::NilDestination);
        }
        self.row = Some(Row {
            record: self.view.schema.new_record(),
            unmapped: HashMap::new(),
        });
        Ok(())
    }

    fn slot(&mut self, column: &str) -> &mut Value {
        let Some(row) = self.row.as_mut() else {
            self.scratch = Value::Null;
            return &mut self.scratch;
        };
        match row.record.record_type().index_of_column(column) {
            Some(index) => match row.record.slot_at(index) {
                Some(slot) => slot,
                None => &mut self.scratch,
            },
            None => row.unmapped.entry(column.to_string()).or_default(),
        }
    }

    fn item_done(&mut self) -> Result<(), CollectorError> {
        let Some(mut row) = self.row.take() else {
            return Ok(());
        };
        self.decode(&mut row)?;
        self.append(row.record, row.unmapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchStrategy;
    use crate::connector::memory;
    use crate::view::Resource;

    fn fill(collector: &mut Collector, rows: &[&[(&str, Value)]]) {
        for row in rows {
            collector.new_item().unwrap();
            for (column, value) in row.iter() {
                *collector.slot(column) = value.clone();
            }
            collector.item_done().unwrap();
        }
    }

    async fn orders() -> Arc<View> {
        let (env, _) = memory::shop_environment();
        let resource = Resource::init(&memory::shop_config(MatchStrategy::ReadMatched), &env)
            .await
            .unwrap();
        resource.view("orders").unwrap().clone()
    }

    fn order_rows(collector: &mut Collector) {
        fill(
            collector,
            &[
                &[("id", Value::Int(1)), ("user_id", Value::Int(7)), ("status", "OPEN".into())],
                &[("id", Value::Int(2)), ("user_id", Value::Int(7)), ("status", "CLOSED".into())],
            ],
        );
        collector.seal();
    }

    #[tokio::test]
    async fn matches_rows_as_they_arrive() {
        let view = orders().await;
        let mut parent = Collector::new(view.clone());
        order_rows(&mut parent);
        assert_eq!(parent.keys("user_id"), vec![Key::Int(7)]);
        assert_eq!(parent.keys("id"), vec![Key::Int(1), Key::Int(2)]);

        let mut items = Collector::new(view.relations[0].view.clone());
        items.attach(&parent, 0).unwrap();
        fill(
            &mut items,
            &[
                &[("id", Value::Int(10)), ("order_id", Value::Int(1)), ("sku", "A".into())],
                &[("id", Value::Int(11)), ("order_id", Value::Int(1)), ("sku", "B".into())],
                &[("id", Value::Int(13)), ("order_id", Value::Int(99)), ("sku", "Z".into())],
            ],
        );
        parent.merge(0, items).unwrap();

        let records = parent.into_records();
        let skus: Vec<&Value> = records[0]
            .get("Items")
            .and_then(Value::as_list)
            .unwrap()
            .iter()
            .filter_map(|r| r.get("Sku"))
            .collect();
        assert_eq!(skus, vec![&Value::from("A"), &Value::from("B")]);
        assert_eq!(records[1].get("Items"), Some(&Value::List(Vec::new())));
    }

    #[tokio::test]
    async fn one_relation_keeps_last_match() {
        let view = orders().await;
        let mut parent = Collector::new(view.clone());
        order_rows(&mut parent);

        let mut users = Collector::new(view.relations[1].view.clone());
        fill(
            &mut users,
            &[
                &[("id", Value::Int(7)), ("name", "first".into())],
                &[("id", Value::Int(7)), ("name", "ann".into())],
            ],
        );
        users.seal();
        users.match_parent(&parent, 1).unwrap();
        parent.merge(1, users).unwrap();

        for record in parent.records() {
            let user = record.get("User").and_then(Value::as_record).unwrap();
            assert_eq!(user.get("Name"), Some(&Value::from("ann")));
        }
    }

    #[tokio::test]
    async fn dropped_parent_index_is_nil_destination() {
        let view = orders().await;
        let mut parent = Collector::new(view.clone());
        order_rows(&mut parent);
        let mut items = Collector::new(view.relations[0].view.clone());
        items.attach(&parent, 0).unwrap();
        drop(parent);
        items.new_item().unwrap();
        *items.slot("order_id") = Value::Int(1);
        assert_eq!(items.item_done(), Err(CollectorError::NilDestination));
    }

    #[tokio::test]
    async fn rows_round_trip_through_cache_form() {
        let view = orders().await;
        let mut parent = Collector::new(view.clone());
        order_rows(&mut parent);
        let rows = parent.rows_from(1);
        assert_eq!(rows.len(), 1);
        // user_id is hidden by the One relation and kept aside
        assert_eq!(rows[0].unmapped.get("user_id"), Some(&Value::Int(7)));

        let mut replay = Collector::new(view);
        for row in rows {
            replay.push_cached(row).unwrap();
        }
        replay.seal();
        assert_eq!(replay.keys("user_id"), vec![Key::Int(7)]);
    }
}
