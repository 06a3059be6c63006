//! The ematch/apply rewrite framework and the built-in rules.
//!
//! A rewrite rule pairs a pure `ematch` query with an `apply` action,
//! plus static scheduling tags. Appliers never delete rows: they only
//! insert rewritten rows (duplicates collapse under the relation's
//! UNIQUE constraint) and mint fresh wires for outputs the rewrite
//! introduces. Redundant rows are collapsed by the next rebuild.

use compact_str::CompactString;
use rusqlite::OptionalExtension;

use crate::{NetlistDB, Result};

mod basic;
mod retiming;

pub use basic::{assoc_to_left, assoc_to_right, comm};
pub use retiming::dff_forward_aby;

/// One match of a rule's left-hand pattern: the cell type tag plus the
/// wire-vector ids bound by the pattern. The arity of `ids` is
/// rule-specific; matches are plain data, stable against later store
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRow {
    pub ty: CompactString,
    pub ids: Vec<i64>,
}

/// A rewrite rule: an `ematch` query, an `apply` action and its
/// scheduling tags.
#[derive(Clone, Copy)]
pub struct Rewrite {
    pub name: &'static str,
    /// Whether the driver should rebuild after this rule fired.
    pub post_rebuild: bool,
    /// Whether `apply` consumes all matches at once rather than one
    /// at a time.
    pub batched: bool,
    /// Pure query for the left-hand pattern, restricted to the given
    /// cell type tags.
    pub ematch: fn(&NetlistDB, &[&str]) -> Result<Vec<MatchRow>>,
    /// Insert the right-hand rows; returns how many were new.
    pub apply: fn(&mut NetlistDB, &[MatchRow]) -> Result<usize>,
}

/// All built-in rules.
pub fn basic_rules() -> Vec<Rewrite> {
    vec![comm(), assoc_to_right(), assoc_to_left(), dff_forward_aby()]
}

/// `?1, ?2, ...` placeholder list for an `IN` clause.
fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

/// Look up a `(type, a, b)` cell whose output has exactly `width`
/// bits; mint one from fresh wires if there is none. Returns the
/// output vector id.
///
/// The width pin is load-bearing: reusing (or minting) an inner cell
/// of a different width would implicitly extend or truncate the value
/// the rewrite routes through it.
fn find_or_mint_aby(
    db: &mut NetlistDB, ty: &str, a: i64, b: i64, width: usize
) -> Result<i64> {
    let found: Option<i64> = db.conn.query_row(
        "SELECT y FROM aby_cells WHERE type = ?1 AND a = ?2 AND b = ?3 \
         AND (SELECT MAX(idx) + 1 FROM wirevec_members WHERE wirevec = y) = ?4 \
         LIMIT 1",
        rusqlite::params![ty, a, b, width as i64],
        |row| row.get(0)).optional()?;
    if let Some(y) = found {
        return Ok(y);
    }
    let fresh: Vec<i64> = (0..width).map(|_| db.auto_id()).collect();
    let y = db.add_wirevec_raw(&fresh)?;
    db.conn.execute(
        "INSERT INTO aby_cells (type, a, b, y) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![ty, a, b, y])?;
    Ok(y)
}

/// Driver loop: alternate full ematch/apply passes with rebuilds until
/// a pass applies nothing, or the optional round budget runs out.
/// Returns the total number of applied rewrites.
///
/// Matches are materialized for every rule before the first apply of
/// the pass, so appliers always see a stable snapshot.
pub fn saturate(
    db: &mut NetlistDB, rules: &[Rewrite], target_types: &[&str],
    max_rounds: Option<usize>
) -> Result<usize> {
    let mut total = 0;
    let mut rounds = 0;
    loop {
        if let Some(budget) = max_rounds {
            if rounds >= budget {
                clilog::warn!(EM_RW_BUDGET,
                              "stopping saturation after {} rounds", rounds);
                break;
            }
        }
        rounds += 1;

        let mut all_matches = Vec::with_capacity(rules.len());
        for rule in rules {
            all_matches.push((rule.ematch)(db, target_types)?);
        }
        let mut applied = 0;
        let mut want_rebuild = false;
        for (rule, matches) in rules.iter().zip(&all_matches) {
            let n = (rule.apply)(db, matches)?;
            clilog::debug!(EM_RW, "rule {} applied {} rewrites on {} matches",
                           rule.name, n, matches.len());
            if n > 0 && rule.post_rebuild {
                want_rebuild = true;
            }
            applied += n;
        }
        if want_rebuild {
            db.rebuild()?;
        }
        if applied == 0 {
            break;
        }
        total += applied;
    }
    Ok(total)
}
