//! Commutativity and associativity over binary cells.

use compact_str::CompactString;
use rusqlite::{params, params_from_iter};

use crate::{NetlistDB, Result};
use super::{find_or_mint_aby, placeholders, MatchRow, Rewrite};

/// Commutativity: `(type, a, b, y)` gains a `(type, b, a, y)` twin.
/// No new nodes, only redundant rows the next rebuild collapses.
pub fn comm() -> Rewrite {
    Rewrite {
        name: "comm",
        post_rebuild: false,
        batched: true,
        ematch: ematch_comm,
        apply: apply_comm,
    }
}

fn ematch_comm(db: &NetlistDB, target_types: &[&str]) -> Result<Vec<MatchRow>> {
    let sql = format!(
        "SELECT type, a, b, y FROM aby_cells WHERE type IN ({})",
        placeholders(target_types.len()));
    let mut stmt = db.conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(target_types.iter()), |row| {
        Ok(MatchRow {
            ty: CompactString::from(row.get::<_, String>(0)?),
            ids: vec![row.get(1)?, row.get(2)?, row.get(3)?],
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn apply_comm(db: &mut NetlistDB, matches: &[MatchRow]) -> Result<usize> {
    let mut stmt = db.conn.prepare_cached(
        "INSERT OR IGNORE INTO aby_cells (type, a, b, y) VALUES (?1, ?2, ?3, ?4)")?;
    let mut applied = 0;
    for m in matches {
        let &[a, b, y] = &m.ids[..] else {
            unreachable!("comm match has arity 3")
        };
        applied += stmt.execute(params![m.ty.as_str(), b, a, y])?;
    }
    Ok(applied)
}

/// Associate to the right: `(a op b) op c = y` gains
/// `a op (b op c) = y`, with the inner `b op c` pinned to the width
/// of `y`.
pub fn assoc_to_right() -> Rewrite {
    Rewrite {
        name: "assoc_to_right",
        post_rebuild: true,
        batched: false,
        ematch: ematch_assoc_to_right,
        apply: apply_assoc_to_right,
    }
}

fn ematch_assoc_to_right(db: &NetlistDB, target_types: &[&str]) -> Result<Vec<MatchRow>> {
    // cell1 computes a op b, cell2 consumes it on the left:
    // (a op b) op c = y
    let sql = format!(
        "SELECT cell1.type, cell1.a, cell1.b, cell2.b, cell2.y \
         FROM aby_cells AS cell1 JOIN aby_cells AS cell2 ON cell1.y = cell2.a \
         WHERE cell1.type = cell2.type AND cell1.type IN ({})",
        placeholders(target_types.len()));
    let mut stmt = db.conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(target_types.iter()), |row| {
        Ok(MatchRow {
            ty: CompactString::from(row.get::<_, String>(0)?),
            ids: vec![row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?],
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn apply_assoc_to_right(db: &mut NetlistDB, matches: &[MatchRow]) -> Result<usize> {
    let mut applied = 0;
    for m in matches {
        let &[a, b, c, y] = &m.ids[..] else {
            unreachable!("assoc match has arity 4")
        };
        let width = db.wirevec_width(y)?;
        let y_bc = find_or_mint_aby(db, m.ty.as_str(), b, c, width)?;
        applied += db.conn.execute(
            "INSERT OR IGNORE INTO aby_cells (type, a, b, y) VALUES (?1, ?2, ?3, ?4)",
            params![m.ty.as_str(), a, y_bc, y])?;
    }
    Ok(applied)
}

/// Associate to the left: `a op (b op c) = y` gains
/// `(a op b) op c = y`, with the inner `a op b` pinned to the width
/// of `y`.
pub fn assoc_to_left() -> Rewrite {
    Rewrite {
        name: "assoc_to_left",
        post_rebuild: true,
        batched: false,
        ematch: ematch_assoc_to_left,
        apply: apply_assoc_to_left,
    }
}

fn ematch_assoc_to_left(db: &NetlistDB, target_types: &[&str]) -> Result<Vec<MatchRow>> {
    // cell1 computes b op c, cell2 consumes it on the right:
    // a op (b op c) = y
    let sql = format!(
        "SELECT cell2.type, cell2.a, cell1.a, cell1.b, cell2.y \
         FROM aby_cells AS cell1 JOIN aby_cells AS cell2 ON cell1.y = cell2.b \
         WHERE cell1.type = cell2.type AND cell1.type IN ({})",
        placeholders(target_types.len()));
    let mut stmt = db.conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(target_types.iter()), |row| {
        Ok(MatchRow {
            ty: CompactString::from(row.get::<_, String>(0)?),
            ids: vec![row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?],
        })
    })?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn apply_assoc_to_left(db: &mut NetlistDB, matches: &[MatchRow]) -> Result<usize> {
    let mut applied = 0;
    for m in matches {
        let &[a, b, c, y] = &m.ids[..] else {
            unreachable!("assoc match has arity 4")
        };
        let width = db.wirevec_width(y)?;
        let y_ab = find_or_mint_aby(db, m.ty.as_str(), a, b, width)?;
        applied += db.conn.execute(
            "INSERT OR IGNORE INTO aby_cells (type, a, b, y) VALUES (?1, ?2, ?3, ?4)",
            params![m.ty.as_str(), y_ab, c, y])?;
    }
    Ok(applied)
}
