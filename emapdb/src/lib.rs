//! An equality-saturating database for synthesized gate-level netlists.
//!
//! The store keeps multi-bit signals (wire vectors) content-addressed
//! through a rolling hash, joins them through cell-typed relations,
//! and supports a congruence-closing [`rebuild`](NetlistDB::rebuild)
//! loop plus an ematch/apply [rewrite framework](rewrites) on top.
//! It is populated from a synthesized JSON module through
//! [`build_from_module`](NetlistDB::build_from_module).

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection};

mod error;
pub use error::{Error, Result};

pub mod rolling_hash;

mod disjoint_set;
pub use disjoint_set::DisjointSetUnion;

mod builder;
mod rebuild;
pub mod rewrites;

/// A scalar net.
///
/// The store injects wires into an integer space (ground 0, supply 1,
/// don't-care -1, allocated nets from a monotone counter). The raw
/// encoding stays inside this crate; external code only sees `Wire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wire {
    Ground,
    Supply,
    DontCare,
    Net(i64),
}

impl Wire {
    #[inline]
    pub(crate) fn encode(self) -> i64 {
        match self {
            Wire::Ground => 0,
            Wire::Supply => 1,
            Wire::DontCare => -1,
            Wire::Net(n) => n,
        }
    }

    #[inline]
    pub(crate) fn decode(raw: i64) -> Wire {
        match raw {
            0 => Wire::Ground,
            1 => Wire::Supply,
            -1 => Wire::DontCare,
            n => Wire::Net(n),
        }
    }
}

/// The netlist storage.
///
/// Owns the backing relational database, the global clock wire and the
/// wire id counter. External code reads through the query methods and
/// writes only through the documented operations (the builder, the
/// rebuild loop and the rewrite appliers).
pub struct NetlistDB {
    conn: Connection,
    /// The single global clock wire, once the builder discovers it.
    clk: Option<i64>,
    /// Last allocated (or observed) wire id.
    cnt: i64,
}

impl NetlistDB {
    /// Open a store.
    ///
    /// `db_file` is either `":memory:"` or a filesystem path. The
    /// relational schema is executed from `schema_file`.
    pub fn new(schema_file: impl AsRef<Path>, db_file: &str) -> Result<NetlistDB> {
        let conn = match db_file {
            ":memory:" => Connection::open_in_memory()?,
            path => Connection::open(path)?,
        };
        let schema = std::fs::read_to_string(schema_file)?;
        conn.execute_batch(&schema)?;
        Ok(NetlistDB { conn, clk: None, cnt: 0 })
    }

    /// The global clock wire discovered during build, if any.
    pub fn clock(&self) -> Option<Wire> {
        self.clk.map(Wire::decode)
    }

    /// Mint a fresh wire id, strictly greater than every id stored.
    #[inline]
    pub(crate) fn auto_id(&mut self) -> i64 {
        self.cnt += 1;
        self.cnt
    }

    /// Members of a wire vector in index order, raw encoding.
    pub(crate) fn get_wirevec(&self, id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT wire FROM wirevec_members WHERE wirevec = ?1 ORDER BY idx")?;
        let wires = stmt.query_map([id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(wires)
    }

    /// Members of a wire vector, ordered by index (LSB first).
    pub fn wirevec_members(&self, id: i64) -> Result<Vec<Wire>> {
        Ok(self.get_wirevec(id)?.into_iter().map(Wire::decode).collect())
    }

    /// Width of a wire vector.
    pub fn wirevec_width(&self, id: i64) -> Result<usize> {
        let width: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM wirevec_members WHERE wirevec = ?1",
            [id], |row| row.get(0))?;
        Ok(width as usize)
    }

    /// Unconditional insert of a wire vector row, raw encoding.
    /// The caller has made sure no equal sequence is live.
    pub(crate) fn add_wirevec_raw(&mut self, wv: &[i64]) -> Result<i64> {
        let h = rolling_hash::hash(wv.iter().copied());
        let id: i64 = self.conn.query_row(
            "INSERT INTO wirevecs (hash) VALUES (?1) RETURNING id",
            [h], |row| row.get(0))?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO wirevec_members (wirevec, idx, wire) VALUES (?1, ?2, ?3)")?;
        for (i, w) in wv.iter().enumerate() {
            stmt.execute(params![id, i as i64, w])?;
        }
        Ok(id)
    }

    /// Return the id of the vector with exactly these members,
    /// inserting a fresh row if none exists, raw encoding.
    ///
    /// A hash match alone is never trusted: every candidate is
    /// compared element-wise before its id is returned.
    pub(crate) fn create_or_lookup_wirevec_raw(&mut self, wv: &[i64]) -> Result<i64> {
        let h = rolling_hash::hash(wv.iter().copied());
        let candidates = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT id FROM wirevecs WHERE hash = ?1")?;
            let rows = stmt.query_map([h], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            rows
        };
        for id in candidates {
            if self.get_wirevec(id)? == wv {
                return Ok(id);
            }
        }
        self.add_wirevec_raw(wv)
    }

    /// Insert a wire vector unconditionally and return its fresh id.
    pub fn add_wirevec(&mut self, wv: &[Wire]) -> Result<i64> {
        let raw: Vec<i64> = wv.iter().map(|w| w.encode()).collect();
        self.add_wirevec_raw(&raw)
    }

    /// Return the id of the vector with exactly these members,
    /// creating it if absent. Equal sequences always map to one id.
    pub fn create_or_lookup_wirevec(&mut self, wv: &[Wire]) -> Result<i64> {
        let raw: Vec<i64> = wv.iter().map(|w| w.encode()).collect();
        self.create_or_lookup_wirevec_raw(&raw)
    }

    /// Outputs recorded for the binary-cell congruence key
    /// `(type, a, b)`. More than one entry means the next rebuild will
    /// union them.
    pub fn aby_outputs(&self, ty: &str, a: i64, b: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT y FROM aby_cells WHERE type = ?1 AND a = ?2 AND b = ?3 ORDER BY y")?;
        let ys = stmt.query_map(params![ty, a, b], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ys)
    }

    /// Next-state vectors recorded for a flip-flop input vector.
    pub fn dff_outputs(&self, d: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT q FROM dffs WHERE d = ?1 ORDER BY q")?;
        let qs = stmt.query_map([d], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(qs)
    }

    /// Number of rows in a relation.
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        Ok(self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?)
    }

    /// Dump every relation as `{relation: [{column: value}]}`, suitable
    /// for round-tripping into JSON for inspection.
    pub fn dump_tables(&self) -> Result<serde_json::Value> {
        use rusqlite::types::ValueRef;
        use serde_json::{Map, Value};

        let tables = {
            let mut stmt = self.conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")?;
            let tables = stmt.query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            tables
        };

        let mut dump = Map::new();
        for table in tables {
            let mut stmt = self.conn.prepare(&format!("SELECT * FROM {}", table))?;
            let columns: Vec<String> =
                stmt.column_names().iter().map(|c| c.to_string()).collect();
            let mut out = Vec::new();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let mut obj = Map::new();
                for (i, column) in columns.iter().enumerate() {
                    let value = match row.get_ref(i)? {
                        ValueRef::Null => Value::Null,
                        ValueRef::Integer(v) => Value::from(v),
                        ValueRef::Real(v) => Value::from(v),
                        ValueRef::Text(t) => {
                            Value::from(String::from_utf8_lossy(t).into_owned())
                        }
                        ValueRef::Blob(_) => Value::Null,
                    };
                    obj.insert(column.clone(), value);
                }
                out.push(Value::Object(obj));
            }
            dump.insert(table, Value::Array(out));
        }
        Ok(Value::Object(dump))
    }

    /// Check the store-wide invariants, quantified over all live
    /// entities. Intended after a completed rebuild; transient states
    /// between rebuild phases may legitimately fail the uniqueness
    /// checks.
    pub fn validate(&self) -> Result<()> {
        // every stored hash matches its members, member indices are
        // contiguous from 0, and no two live sequences are equal
        let ids = {
            let mut stmt = self.conn.prepare("SELECT id, hash FROM wirevecs")?;
            let ids = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<(i64, i64)>>>()?;
            ids
        };
        let mut seen: HashMap<Vec<i64>, i64> = HashMap::new();
        for (id, h) in ids {
            let members = {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT idx, wire FROM wirevec_members \
                     WHERE wirevec = ?1 ORDER BY idx")?;
                let members = stmt.query_map([id], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<Vec<(i64, i64)>>>()?;
                members
            };
            for (expected, (idx, _)) in members.iter().enumerate() {
                if *idx != expected as i64 {
                    return Err(Error::Invariant(format!(
                        "wirevec {} has a non-contiguous member index {}", id, idx)));
                }
            }
            let wires: Vec<i64> = members.into_iter().map(|(_, w)| w).collect();
            if rolling_hash::hash(wires.iter().copied()) != h {
                return Err(Error::Invariant(format!(
                    "wirevec {} hash does not match its members", id)));
            }
            if let Some(other) = seen.insert(wires, id) {
                return Err(Error::Invariant(format!(
                    "wirevecs {} and {} have equal member sequences", other, id)));
            }
        }

        // congruence keys are unique
        for (table, key) in [
            ("ay_cells", "type, a"),
            ("aby_cells", "type, a, b"),
            ("absy_cells", "type, a, b, s"),
            ("dffs", "d"),
        ] {
            let dups: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM \
                          (SELECT 1 FROM {} GROUP BY {} HAVING COUNT(*) > 1)",
                         table, key),
                [], |row| row.get(0))?;
            if dups > 0 {
                return Err(Error::Invariant(format!(
                    "{} has {} duplicated congruence keys ({})", table, dups, key)));
            }
        }

        // no cell column references a freed wire vector
        for (table, column) in rebuild::WIREVEC_COLUMNS {
            let dangling: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {t} \
                          WHERE {c} NOT IN (SELECT id FROM wirevecs)",
                         t = table, c = column),
                [], |row| row.get(0))?;
            if dangling > 0 {
                return Err(Error::Invariant(format!(
                    "{}.{} has {} dangling wirevec references", table, column, dangling)));
            }
        }

        // the counter stays ahead of every stored wire id
        let max_wire: Option<i64> = self.conn.query_row(
            "SELECT MAX(wire) FROM wirevec_members", [], |row| row.get(0))?;
        if let Some(max_wire) = max_wire {
            if self.cnt < max_wire {
                return Err(Error::Invariant(format!(
                    "wire counter {} is behind stored wire {}", self.cnt, max_wire)));
            }
        }
        Ok(())
    }
}
