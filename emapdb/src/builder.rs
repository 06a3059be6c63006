//! Populating the store from a synthesized JSON module.

use std::collections::BTreeMap;
use std::path::Path;

use compact_str::CompactString;
use rusqlite::params;
use yosysjson::{Bit, Cell, Module, Param, PortDirection};

use crate::{Error, NetlistDB, Result, Wire};

/// Binary cells whose type tag grows an `s`/`u` signedness suffix.
static SUFFIXED_ABY: &[&str] =
    &["$and", "$or", "$xor", "$add", "$sub", "$mul", "$mod"];
/// Binary cells stored without a signedness suffix.
static PLAIN_ABY: &[&str] =
    &["$eq", "$ge", "$le", "$gt", "$lt", "$logic_and", "$logic_or"];
/// Unary cells.
static AY: &[&str] = &["$not", "$logic_not"];

fn bit_to_wire(bit: &Bit) -> Result<Wire> {
    match bit {
        Bit::Id(n) => Ok(Wire::Net(*n)),
        Bit::Literal(s) => match s.as_str() {
            "0" => Ok(Wire::Ground),
            "1" => Ok(Wire::Supply),
            "x" => Ok(Wire::DontCare),
            other => Err(Error::Unsupported(
                format!("bit literal {:?}", other))),
        },
    }
}

fn bits_to_raw(bits: &[Bit]) -> Result<Vec<i64>> {
    bits.iter().map(|b| Ok(bit_to_wire(b)?.encode())).collect()
}

/// A cell connection as raw wires. Missing ports are build errors.
fn conn_bits(name: &CompactString, cell: &Cell, port: &str) -> Result<Vec<i64>> {
    let bits = cell.connections.get(port).ok_or_else(|| Error::Unsupported(
        format!("cell {} has no connection on port {}", name, port)))?;
    bits_to_raw(bits)
}

/// A cell parameter normalized to an integer. Missing or unparsable
/// parameters are build errors.
fn param_int(name: &CompactString, cell: &Cell, param: &str) -> Result<i64> {
    cell.param_int(param).ok_or_else(|| Error::Unsupported(
        format!("cell {} has no integer parameter {}", name, param)))
}

impl NetlistDB {
    fn add_input(&mut self, name: &str, source: &[i64]) -> Result<()> {
        let wv = self.create_or_lookup_wirevec_raw(source)?;
        self.conn.execute(
            "INSERT INTO from_inputs (source, name) VALUES (?1, ?2)",
            params![wv, name])?;
        Ok(())
    }

    fn add_output(&mut self, name: &str, sink: &[i64]) -> Result<()> {
        let wv = self.create_or_lookup_wirevec_raw(sink)?;
        self.conn.execute(
            "INSERT INTO as_outputs (sink, name) VALUES (?1, ?2)",
            params![wv, name])?;
        Ok(())
    }

    fn add_dff(&mut self, d: &[i64], q: &[i64]) -> Result<()> {
        let wvd = self.create_or_lookup_wirevec_raw(d)?;
        let wvq = self.create_or_lookup_wirevec_raw(q)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO dffs (d, q) VALUES (?1, ?2)",
            params![wvd, wvq])?;
        Ok(())
    }

    fn add_ay_cell(&mut self, ty: &str, a: &[i64], y: &[i64]) -> Result<()> {
        let wva = self.create_or_lookup_wirevec_raw(a)?;
        let wvy = self.create_or_lookup_wirevec_raw(y)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO ay_cells (type, a, y) VALUES (?1, ?2, ?3)",
            params![ty, wva, wvy])?;
        Ok(())
    }

    fn add_aby_cell(&mut self, ty: &str, a: &[i64], b: &[i64], y: &[i64]) -> Result<()> {
        let wva = self.create_or_lookup_wirevec_raw(a)?;
        let wvb = self.create_or_lookup_wirevec_raw(b)?;
        let wvy = self.create_or_lookup_wirevec_raw(y)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO aby_cells (type, a, b, y) VALUES (?1, ?2, ?3, ?4)",
            params![ty, wva, wvb, wvy])?;
        Ok(())
    }

    fn add_absy_cell(
        &mut self, ty: &str, a: &[i64], b: &[i64], s: &[i64], y: &[i64]
    ) -> Result<()> {
        let wva = self.create_or_lookup_wirevec_raw(a)?;
        let wvb = self.create_or_lookup_wirevec_raw(b)?;
        let wvs = self.create_or_lookup_wirevec_raw(s)?;
        let wvy = self.create_or_lookup_wirevec_raw(y)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO absy_cells (type, a, b, s, y) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![ty, wva, wvb, wvs, wvy])?;
        Ok(())
    }

    fn add_blackbox_cell(&mut self, name: &CompactString, cell: &Cell) -> Result<()> {
        // parameter map serialized in key order, so identical cells
        // dump identically
        let sorted: BTreeMap<&str, &Param> = cell.parameters.iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        self.conn.execute(
            "INSERT INTO instances (name, module, params) VALUES (?1, ?2, ?3)",
            params![name.as_str(), cell.ty.as_str(), serde_json::to_string(&sorted)?])?;
        for (port, bits) in cell.connections_sorted() {
            let signal = self.create_or_lookup_wirevec_raw(&bits_to_raw(bits)?)?;
            self.conn.execute(
                "INSERT INTO instance_ports (instance, port, signal) \
                 VALUES (?1, ?2, ?3)",
                params![name.as_str(), port.as_str(), signal])?;
        }
        Ok(())
    }

    fn build_cell(&mut self, name: &CompactString, cell: &Cell) -> Result<()> {
        let ty = cell.ty.as_str();
        if SUFFIXED_ABY.contains(&ty) {
            let signed = param_int(name, cell, "A_SIGNED")? != 0
                && param_int(name, cell, "B_SIGNED")? != 0;
            let mut ty = CompactString::from(ty);
            ty.push(if signed { 's' } else { 'u' });
            let a = conn_bits(name, cell, "A")?;
            let b = conn_bits(name, cell, "B")?;
            let y = conn_bits(name, cell, "Y")?;
            self.add_aby_cell(&ty, &a, &b, &y)
        }
        else if ty == "$dff" {
            if param_int(name, cell, "CLK_POLARITY")? == 0 {
                return Err(Error::Unsupported(format!(
                    "$dff {} with negative clock polarity", name)));
            }
            let clk = conn_bits(name, cell, "CLK")?;
            match self.clk {
                None => return Err(Error::Unsupported(format!(
                    "$dff {} but the global clock is not defined", name))),
                Some(c) if clk.len() != 1 || clk[0] != c => {
                    return Err(Error::Unsupported(format!(
                        "clock {:?} of $dff {} does not match the global clock {}",
                        clk, name, c)));
                }
                Some(_) => {}
            }
            let d = conn_bits(name, cell, "D")?;
            let q = conn_bits(name, cell, "Q")?;
            if d.len() != q.len() {
                return Err(Error::Unsupported(format!(
                    "$dff {} with D width {} but Q width {}",
                    name, d.len(), q.len())));
            }
            self.add_dff(&d, &q)
        }
        else if ty == "$mux" {
            let a = conn_bits(name, cell, "A")?;
            let b = conn_bits(name, cell, "B")?;
            let s = conn_bits(name, cell, "S")?;
            let y = conn_bits(name, cell, "Y")?;
            if s.len() != 1 || a.len() != y.len() || b.len() != y.len() {
                return Err(Error::Unsupported(format!(
                    "$mux {} with ill-formed widths A={} B={} S={} Y={}",
                    name, a.len(), b.len(), s.len(), y.len())));
            }
            self.add_absy_cell("$mux", &a, &b, &s, &y)
        }
        else if AY.contains(&ty) {
            let a = conn_bits(name, cell, "A")?;
            let y = conn_bits(name, cell, "Y")?;
            self.add_ay_cell(ty, &a, &y)
        }
        else if PLAIN_ABY.contains(&ty) {
            let a = conn_bits(name, cell, "A")?;
            let b = conn_bits(name, cell, "B")?;
            let y = conn_bits(name, cell, "Y")?;
            self.add_aby_cell(ty, &a, &b, &y)
        }
        else if cell.attr_int("module_not_derived").unwrap_or(0) != 0 {
            self.add_blackbox_cell(name, cell)
        }
        else {
            Err(Error::Unsupported(format!("cell type {} ({})", ty, name)))
        }
    }

    /// Populate the store from a synthesized module.
    ///
    /// `clk` names the input port carrying the single global
    /// positive-edge clock; it must be one bit wide if present.
    /// Ports and cells are visited in name order so that repeated
    /// builds of the same module assign the same ids.
    pub fn build_from_module(&mut self, module: &Module, clk: &str) -> Result<()> {
        let time_build = clilog::stimer!("build_from_module");

        for (name, port) in module.ports_sorted() {
            let bits = bits_to_raw(&port.bits)?;
            match port.direction {
                PortDirection::Input => {
                    if name.as_str() == clk {
                        if bits.len() != 1 {
                            return Err(Error::Unsupported(format!(
                                "clock port {} must have exactly one bit", name)));
                        }
                        self.clk = Some(bits[0]);
                    }
                    self.add_input(name, &bits)?;
                }
                PortDirection::Output => self.add_output(name, &bits)?,
                PortDirection::Inout => {
                    return Err(Error::Unsupported(format!(
                        "port direction inout ({})", name)));
                }
            }
        }

        clilog::info!(EM_BUILD, "building {} cells", module.cells.len());
        for (name, cell) in module.cells_sorted() {
            self.build_cell(name, cell)?;
        }

        // the counter resumes above every wire observed in the module
        let max_wire: Option<i64> = self.conn.query_row(
            "SELECT MAX(wire) FROM wirevec_members", [], |row| row.get(0))?;
        self.cnt = max_wire.unwrap_or(1).max(1);

        clilog::finish!(time_build);
        Ok(())
    }

    /// Convenient shortcut: parse a netlist file, resolve the module
    /// and build from it. The parameters are similar to
    /// [`build_from_module`](NetlistDB::build_from_module); `top`
    /// optionally names the module to load.
    pub fn build_from_json_file(
        &mut self, path: impl AsRef<Path>, top: Option<&str>, clk: &str
    ) -> Result<()> {
        let netlist = yosysjson::Netlist::parse_file(path)?;
        let module = netlist.find_module(top)?;
        self.build_from_module(module, clk)
    }
}
