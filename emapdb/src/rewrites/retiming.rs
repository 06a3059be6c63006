//! Retiming: moving flip-flops across combinational cells.

use compact_str::CompactString;
use rusqlite::{params, params_from_iter};

use crate::{NetlistDB, Result};
use super::{find_or_mint_aby, placeholders, MatchRow, Rewrite};

/// Forward two flip-flops through the binary cell they feed:
/// `cell(type, dff(d1), dff(d2)) = y` gains
/// `cell(type, d1, d2) = pre; dff(pre) = y`.
///
/// Valid under the single positive-edge clock assumption: registering
/// the operands and registering the result delay the value by the same
/// cycle.
pub fn dff_forward_aby() -> Rewrite {
    Rewrite {
        name: "dff_forward_aby",
        post_rebuild: true,
        batched: false,
        ematch: ematch_dff_forward_aby,
        apply: apply_dff_forward_aby,
    }
}

fn ematch_dff_forward_aby(db: &NetlistDB, target_types: &[&str]) -> Result<Vec<MatchRow>> {
    let sql = format!(
        "SELECT cell.type, dff1.d, dff2.d, cell.y \
         FROM dffs AS dff1 JOIN dffs AS dff2 JOIN aby_cells AS cell \
         ON dff1.q = cell.a AND dff2.q = cell.b \
         WHERE cell.type IN ({})",
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

fn apply_dff_forward_aby(db: &mut NetlistDB, matches: &[MatchRow]) -> Result<usize> {
    let mut applied = 0;
    for m in matches {
        let &[d1, d2, y] = &m.ids[..] else {
            unreachable!("dff forward match has arity 3")
        };
        let width = db.wirevec_width(y)?;
        let pre = find_or_mint_aby(db, m.ty.as_str(), d1, d2, width)?;
        applied += db.conn.execute(
            "INSERT OR IGNORE INTO dffs (d, q) VALUES (?1, ?2)",
            params![pre, y])?;
    }
    Ok(applied)
}
