//! Data model for synthesized JSON netlists, as emitted by the
//! synthesis front-end's `write_json` command.
//!
//! This crate is pure syntax: it knows the shape of the file (modules,
//! ports, cells, bit and parameter scalars) but assigns no meaning to
//! cell types or wire ids. Consumers decide which constructs they
//! support.

use std::collections::HashMap;
use std::path::Path;

use compact_str::CompactString;
use serde::Deserialize;

/// Error raised while loading a netlist file or resolving the module
/// to work on.
#[derive(Debug, thiserror::Error)]
pub enum NetlistJsonError {
    #[error("cannot read netlist file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed netlist json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("module {0} not found in the netlist")]
    ModuleNotFound(String),
    #[error("cannot determine the module to load: the netlist has {0} \
             modules, please explicitly specify one")]
    CannotResolveModule(usize),
}

/// A whole netlist file. Top-level keys other than `modules`
/// (`creator`, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Netlist {
    #[serde(default)]
    pub modules: HashMap<CompactString, Module>,
}

impl Netlist {
    /// Parse a netlist from JSON source text.
    pub fn parse_str(source: &str) -> Result<Netlist, NetlistJsonError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Parse a netlist from a JSON file.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Netlist, NetlistJsonError> {
        let source = std::fs::read_to_string(path)?;
        Netlist::parse_str(&source)
    }

    /// Resolve the module to work on.
    ///
    /// If `name` is given it must exist. Otherwise the netlist must
    /// contain exactly one module, which is then picked.
    pub fn find_module(&self, name: Option<&str>) -> Result<&Module, NetlistJsonError> {
        match name {
            Some(name) => self.modules.get(name).ok_or_else(
                || NetlistJsonError::ModuleNotFound(name.to_string())),
            None => {
                if self.modules.len() == 1 {
                    let (name, module) = self.modules.iter().next().unwrap();
                    clilog::info!(YJ_SOLEMOD, "loading the only module {}", name);
                    Ok(module)
                }
                else {
                    Err(NetlistJsonError::CannotResolveModule(self.modules.len()))
                }
            }
        }
    }
}

/// One module: its I/O ports and instantiated cells.
#[derive(Debug, Clone, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub ports: HashMap<CompactString, Port>,
    #[serde(default)]
    pub cells: HashMap<CompactString, Cell>,
}

impl Module {
    /// Ports in name order. JSON maps carry no order, and consumers
    /// want reproducible iteration.
    pub fn ports_sorted(&self) -> Vec<(&CompactString, &Port)> {
        let mut ports: Vec<_> = self.ports.iter().collect();
        ports.sort_unstable_by_key(|(name, _)| *name);
        ports
    }

    /// Cells in name order.
    pub fn cells_sorted(&self) -> Vec<(&CompactString, &Cell)> {
        let mut cells: Vec<_> = self.cells.iter().collect();
        cells.sort_unstable_by_key(|(name, _)| *name);
        cells
    }
}

/// Direction of a module port.
///
/// `inout` appears in the wild, so it is recognized here; consumers
/// that cannot express it reject it during their build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
    Inout,
}

/// A module port: direction plus one bit entry per wire, index 0 being
/// the least-significant bit.
#[derive(Debug, Clone, Deserialize)]
pub struct Port {
    pub direction: PortDirection,
    pub bits: Vec<Bit>,
}

/// One bit of a port or cell connection: either a wire id, or one of
/// the literal strings `"0"`, `"1"`, `"x"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Bit {
    Id(i64),
    Literal(CompactString),
}

/// A cell parameter or attribute value: a decimal integer, or a string
/// of binary digits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum Param {
    Int(i64),
    Bits(CompactString),
}

impl Param {
    /// Normalize to an integer: binary strings are parsed base-2.
    /// `None` if the string form contains non-binary digits
    /// (`x`/`z` bits cannot be represented as an integer).
    pub fn to_int(&self) -> Option<i64> {
        match self {
            Param::Int(v) => Some(*v),
            Param::Bits(s) => i64::from_str_radix(s.as_str(), 2).ok(),
        }
    }
}

/// One instantiated cell.
#[derive(Debug, Clone, Deserialize)]
pub struct Cell {
    #[serde(rename = "type")]
    pub ty: CompactString,
    #[serde(default)]
    pub parameters: HashMap<CompactString, Param>,
    #[serde(default)]
    pub attributes: HashMap<CompactString, Param>,
    #[serde(default)]
    pub connections: HashMap<CompactString, Vec<Bit>>,
}

impl Cell {
    /// A parameter normalized to an integer, if present and parsable.
    pub fn param_int(&self, name: &str) -> Option<i64> {
        self.parameters.get(name).and_then(Param::to_int)
    }

    /// An attribute normalized to an integer, if present and parsable.
    pub fn attr_int(&self, name: &str) -> Option<i64> {
        self.attributes.get(name).and_then(Param::to_int)
    }

    /// Connections in port-name order.
    pub fn connections_sorted(&self) -> Vec<(&CompactString, &Vec<Bit>)> {
        let mut conns: Vec<_> = self.connections.iter().collect();
        conns.sort_unstable_by_key(|(port, _)| *port);
        conns
    }
}
