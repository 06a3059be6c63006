//! Congruence closure over the store: the rebuild loop.
//!
//! A round runs four phases in order. `merge_cells` discovers
//! wire-level equivalences from duplicated congruence keys;
//! `merge_wires` rewrites members to canonical wires and repairs
//! hashes incrementally; `merge_wirevecs` collapses vectors that ended
//! up with identical member sequences; `update_cells` re-points cell
//! rows at the surviving vector ids. Equal vectors may transiently
//! coexist between the middle phases, but hashes always match members.

use itertools::Itertools;
use rusqlite::params;

use crate::disjoint_set::DisjointSetUnion;
use crate::{rolling_hash, NetlistDB, Result};

/// Every cell column holding a wire-vector reference.
pub(crate) const WIREVEC_COLUMNS: &[(&str, &str)] = &[
    ("ay_cells", "a"), ("ay_cells", "y"),
    ("aby_cells", "a"), ("aby_cells", "b"), ("aby_cells", "y"),
    ("absy_cells", "a"), ("absy_cells", "b"),
    ("absy_cells", "s"), ("absy_cells", "y"),
    ("dffs", "d"), ("dffs", "q"),
    ("from_inputs", "source"),
    ("as_outputs", "sink"),
    ("instance_ports", "signal"),
];

impl NetlistDB {
    /// Union the output vectors of rows sharing a congruence key,
    /// bit by bit. `sql` selects `(key, y)` pairs; returns the number
    /// of wire pairs actually merged.
    fn congruent_outputs(
        &self, sql: &str, dsu: &mut DisjointSetUnion
    ) -> Result<usize> {
        let rows = {
            let mut stmt = self.conn.prepare(sql)?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?.collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        let mut merged = 0;
        for (key, ys) in rows.into_iter().into_group_map() {
            if ys.len() < 2 {
                continue;
            }
            let wv0 = self.get_wirevec(ys[0])?;
            for &y in &ys[1..] {
                let wv = self.get_wirevec(y)?;
                assert_eq!(
                    wv0.len(), wv.len(),
                    "congruent cells under key {} have outputs of different widths",
                    key);
                for (&w0, &w) in wv0.iter().zip(wv.iter()) {
                    merged += dsu.union(w0, w) as usize;
                }
            }
        }
        Ok(merged)
    }

    /// Phase 1: collect wire-level equivalences implied by duplicated
    /// congruence keys, over every relation whose key determines its
    /// outputs.
    fn merge_cells(&self) -> Result<(DisjointSetUnion, usize)> {
        let mut dsu = DisjointSetUnion::new();
        let mut merged = 0;
        merged += self.congruent_outputs(
            "SELECT type || ':' || a, y FROM ay_cells", &mut dsu)?;
        merged += self.congruent_outputs(
            "SELECT type || ':' || a || ':' || b, y FROM aby_cells", &mut dsu)?;
        merged += self.congruent_outputs(
            "SELECT type || ':' || a || ':' || b || ':' || s, y FROM absy_cells",
            &mut dsu)?;
        merged += self.congruent_outputs(
            "SELECT 'dff:' || d, q FROM dffs", &mut dsu)?;
        Ok((dsu, merged))
    }

    /// Phase 2: point every member row at its wire root and repair the
    /// owning vector's hash in O(1).
    fn merge_wires(&mut self, wires: &mut DisjointSetUnion) -> Result<()> {
        let items: Vec<i64> = wires.items().collect();
        for w in items {
            let root = wires.find(w);
            if root == w {
                continue;
            }
            let rows = {
                let mut stmt = self.conn.prepare_cached(
                    "SELECT wirevec, idx FROM wirevec_members WHERE wire = ?1")?;
                let rows = stmt.query_map([w], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
                })?.collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };
            for (wv, idx) in rows {
                let old_h: i64 = self.conn.query_row(
                    "SELECT hash FROM wirevecs WHERE id = ?1", [wv],
                    |row| row.get(0))?;
                self.conn.execute(
                    "UPDATE wirevec_members SET wire = ?1 \
                     WHERE wirevec = ?2 AND idx = ?3",
                    params![root, wv, idx])?;
                self.conn.execute(
                    "UPDATE wirevecs SET hash = ?1 WHERE id = ?2",
                    params![rolling_hash::update(old_h, idx as usize, w, root), wv])?;
            }
        }
        Ok(())
    }

    /// Phase 3: collapse vectors with identical member sequences. The
    /// non-root rows (and their members) are freed; the returned set
    /// maps freed ids to survivors.
    fn merge_wirevecs(&mut self) -> Result<(DisjointSetUnion, usize)> {
        let mut dsu = DisjointSetUnion::new();
        let mut merged = 0;
        let rows = {
            let mut stmt = self.conn.prepare("SELECT id, hash FROM wirevecs")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(1)?, row.get::<_, i64>(0)?))
            })?.collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        for (_h, ids) in rows.into_iter().into_group_map() {
            if ids.len() < 2 {
                continue;
            }
            // the hash is only a lead; group by the actual members
            let mut groups = ids.into_iter()
                .map(|id| Ok((self.get_wirevec(id)?, id)))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .into_group_map();
            for (_, group) in groups.drain() {
                for &id in &group[1..] {
                    merged += dsu.union(group[0], id) as usize;
                }
            }
        }
        let items: Vec<i64> = dsu.items().collect();
        for id in items {
            if dsu.find(id) != id {
                self.conn.execute(
                    "DELETE FROM wirevec_members WHERE wirevec = ?1", [id])?;
                self.conn.execute(
                    "DELETE FROM wirevecs WHERE id = ?1", [id])?;
            }
        }
        Ok((dsu, merged))
    }

    /// Phase 4: rewrite every cell column referencing a freed vector
    /// id to the canonical one. A rewrite colliding with an existing
    /// row collapses into it.
    fn update_cells(&mut self, wirevecs: &mut DisjointSetUnion) -> Result<()> {
        let items: Vec<i64> = wirevecs.items().collect();
        for wv in items {
            let root = wirevecs.find(wv);
            if root == wv {
                continue;
            }
            for &(table, column) in WIREVEC_COLUMNS {
                self.conn.execute(
                    &format!("UPDATE OR IGNORE {t} SET {c} = ?1 WHERE {c} = ?2",
                             t = table, c = column),
                    params![root, wv])?;
                // leftovers collided with an existing row: duplicates
                self.conn.execute(
                    &format!("DELETE FROM {t} WHERE {c} = ?1",
                             t = table, c = column),
                    [wv])?;
            }
        }
        Ok(())
    }

    /// One full round of congruence closure. Returns whether any wire
    /// or wire-vector pair was merged.
    pub fn rebuild_once(&mut self) -> Result<bool> {
        let (mut wires, wire_merges) = self.merge_cells()?;
        self.merge_wires(&mut wires)?;
        let (mut wirevecs, wirevec_merges) = self.merge_wirevecs()?;
        self.update_cells(&mut wirevecs)?;
        Ok(wire_merges > 0 || wirevec_merges > 0)
    }

    /// Congruence-close to a fixed point. Each round strictly reduces
    /// the number of distinct wires, vectors or cell rows, so this
    /// terminates. Returns the number of rounds that changed anything.
    pub fn rebuild(&mut self) -> Result<usize> {
        let time_rebuild = clilog::stimer!("rebuild");
        let mut rounds = 0;
        while self.rebuild_once()? {
            rounds += 1;
        }
        clilog::finish!(time_rebuild);
        clilog::debug!(EM_REBUILD, "rebuild converged after {} changing rounds",
                       rounds);
        Ok(rounds)
    }
}
