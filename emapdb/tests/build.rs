use emapdb::{Error, NetlistDB, Wire};
use serde_json::json;
use yosysjson::Module;

fn open_db() -> NetlistDB {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(clilog::init_stderr_color_debug);
    NetlistDB::new(
        concat!(env!("CARGO_MANIFEST_DIR"), "/schema.sql"), ":memory:"
    ).unwrap()
}

fn module(v: serde_json::Value) -> Module {
    serde_json::from_value(v).unwrap()
}

fn single_adder() -> Module {
    module(json!({
        "ports": {
            "a": { "direction": "input", "bits": [2, 3] },
            "b": { "direction": "input", "bits": [4, 5] },
            "y": { "direction": "output", "bits": [6, 7] }
        },
        "cells": {
            "add0": {
                "type": "$add",
                "parameters": { "A_SIGNED": 0, "B_SIGNED": 0 },
                "attributes": {},
                "connections": { "A": [2, 3], "B": [4, 5], "Y": [6, 7] }
            }
        }
    }))
}

#[test]
fn empty_module() {
    let mut db = open_db();
    let m = module(json!({
        "ports": { "clk": { "direction": "input", "bits": [2] } },
        "cells": {}
    }));
    db.build_from_module(&m, "clk").unwrap();

    assert_eq!(db.clock(), Some(Wire::Net(2)));
    let wv_clk = db.create_or_lookup_wirevec(&[Wire::Net(2)]).unwrap();
    let dump = db.dump_tables().unwrap();
    assert_eq!(dump["from_inputs"],
               json!([{ "source": wv_clk, "name": "clk" }]));
    for table in ["ay_cells", "aby_cells", "absy_cells", "dffs",
                  "instances", "as_outputs"] {
        assert_eq!(db.count_rows(table).unwrap(), 0, "{} not empty", table);
    }
    db.validate().unwrap();
}

#[test]
fn single_adder_build() {
    let mut db = open_db();
    db.build_from_module(&single_adder(), "clk").unwrap();

    let wa = db.create_or_lookup_wirevec(&[Wire::Net(2), Wire::Net(3)]).unwrap();
    let wb = db.create_or_lookup_wirevec(&[Wire::Net(4), Wire::Net(5)]).unwrap();
    let wy = db.create_or_lookup_wirevec(&[Wire::Net(6), Wire::Net(7)]).unwrap();

    assert_eq!(db.count_rows("aby_cells").unwrap(), 1);
    // the unsigned add gains its "u" suffix
    assert_eq!(db.aby_outputs("$addu", wa, wb).unwrap(), vec![wy]);
    assert_eq!(db.wirevec_members(wy).unwrap(),
               vec![Wire::Net(6), Wire::Net(7)]);
    db.validate().unwrap();
}

#[test]
fn constant_bits_in_ports() {
    let mut db = open_db();
    let m = module(json!({
        "ports": {
            "y": { "direction": "output", "bits": [4, "0", "1", "x"] }
        },
        "cells": {}
    }));
    db.build_from_module(&m, "clk").unwrap();
    let wv = db.create_or_lookup_wirevec(
        &[Wire::Net(4), Wire::Ground, Wire::Supply, Wire::DontCare]).unwrap();
    assert_eq!(db.wirevec_members(wv).unwrap(),
               vec![Wire::Net(4), Wire::Ground, Wire::Supply, Wire::DontCare]);
    db.validate().unwrap();
}

#[test]
fn dump_reload_identical() {
    let mut db1 = open_db();
    db1.build_from_module(&single_adder(), "clk").unwrap();
    let mut db2 = open_db();
    db2.build_from_module(&single_adder(), "clk").unwrap();
    assert_eq!(db1.dump_tables().unwrap(), db2.dump_tables().unwrap());
}

#[test]
fn rebuild_is_idempotent() {
    let mut db = open_db();
    // two adders over the same inputs force a congruence merge
    let m = module(json!({
        "ports": {
            "a":  { "direction": "input", "bits": [2, 3] },
            "b":  { "direction": "input", "bits": [4, 5] },
            "y":  { "direction": "output", "bits": [6, 7] },
            "y2": { "direction": "output", "bits": [8, 9] }
        },
        "cells": {
            "add0": {
                "type": "$add",
                "parameters": { "A_SIGNED": 0, "B_SIGNED": 0 },
                "attributes": {},
                "connections": { "A": [2, 3], "B": [4, 5], "Y": [6, 7] }
            },
            "add1": {
                "type": "$add",
                "parameters": { "A_SIGNED": 0, "B_SIGNED": 0 },
                "attributes": {},
                "connections": { "A": [2, 3], "B": [4, 5], "Y": [8, 9] }
            }
        }
    }));
    db.build_from_module(&m, "clk").unwrap();

    assert!(db.rebuild().unwrap() > 0);
    db.validate().unwrap();
    let dump = db.dump_tables().unwrap();
    // a second rebuild changes nothing
    assert_eq!(db.rebuild().unwrap(), 0);
    assert_eq!(db.dump_tables().unwrap(), dump);
    // both outputs observe the canonical result vector
    assert_eq!(db.count_rows("aby_cells").unwrap(), 1);
    let wy = db.create_or_lookup_wirevec(&[Wire::Net(6), Wire::Net(7)]).unwrap();
    let sinks: Vec<i64> = dump["as_outputs"].as_array().unwrap().iter()
        .map(|row| row["sink"].as_i64().unwrap())
        .collect();
    assert_eq!(sinks, vec![wy, wy]);
}

#[test]
fn unary_congruence() {
    let mut db = open_db();
    let m = module(json!({
        "ports": {
            "a":  { "direction": "input", "bits": [2] },
            "y":  { "direction": "output", "bits": [3] },
            "y2": { "direction": "output", "bits": [4] }
        },
        "cells": {
            "not0": { "type": "$not", "parameters": {}, "attributes": {},
                      "connections": { "A": [2], "Y": [3] } },
            "not1": { "type": "$not", "parameters": {}, "attributes": {},
                      "connections": { "A": [2], "Y": [4] } }
        }
    }));
    db.build_from_module(&m, "clk").unwrap();

    assert_eq!(db.count_rows("ay_cells").unwrap(), 2);
    assert!(db.rebuild().unwrap() > 0);
    // (type, a) is a congruence key for unary cells too
    assert_eq!(db.count_rows("ay_cells").unwrap(), 1);
    db.validate().unwrap();
}

#[test]
fn aliased_wirevec_collapses() {
    let mut db = open_db();
    db.build_from_module(&single_adder(), "clk").unwrap();
    let wa = db.create_or_lookup_wirevec(&[Wire::Net(2), Wire::Net(3)]).unwrap();

    // a raw insert bypasses the lookup and duplicates the sequence
    let dup = db.add_wirevec(&[Wire::Net(2), Wire::Net(3)]).unwrap();
    assert_ne!(dup, wa);

    db.rebuild().unwrap();
    // the smaller id survives, the duplicate is freed
    assert_eq!(db.wirevec_members(dup).unwrap(), vec![]);
    assert_eq!(db.create_or_lookup_wirevec(
        &[Wire::Net(2), Wire::Net(3)]).unwrap(), wa);
    db.validate().unwrap();
}

#[test]
fn blackbox_cell() {
    let mut db = open_db();
    let m = module(json!({
        "ports": {
            "clk": { "direction": "input", "bits": [2] }
        },
        "cells": {
            "ram0": {
                "type": "spram",
                "parameters": { "WIDTH": 8, "DEPTH": "0100" },
                "attributes": { "module_not_derived": 1 },
                "connections": { "CLK": [2], "DATA": [3, 4] }
            }
        }
    }));
    db.build_from_module(&m, "clk").unwrap();

    let dump = db.dump_tables().unwrap();
    assert_eq!(dump["instances"], json!([{
        "name": "ram0", "module": "spram",
        "params": "{\"DEPTH\":\"0100\",\"WIDTH\":8}"
    }]));
    assert_eq!(db.count_rows("instance_ports").unwrap(), 2);
    db.validate().unwrap();
}

#[test]
fn unsupported_constructs_are_rejected() {
    let reject = |cells: serde_json::Value| {
        let mut db = open_db();
        let m = module(json!({
            "ports": { "clk": { "direction": "input", "bits": [2] } },
            "cells": cells
        }));
        let err = db.build_from_module(&m, "clk").unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)), "got {:?}", err);
    };

    // unknown cell type, not flagged as a blackbox
    reject(json!({
        "weird0": { "type": "$weird", "parameters": {}, "attributes": {},
                    "connections": {} }
    }));
    // negative clock polarity
    reject(json!({
        "dff0": { "type": "$dff",
                  "parameters": { "CLK_POLARITY": 0 },
                  "attributes": {},
                  "connections": { "D": [3], "CLK": [2], "Q": [4] } }
    }));
    // dff clocked by something else than the global clock
    reject(json!({
        "dff0": { "type": "$dff",
                  "parameters": { "CLK_POLARITY": 1 },
                  "attributes": {},
                  "connections": { "D": [3], "CLK": [5], "Q": [4] } }
    }));
    // ill-formed mux widths
    reject(json!({
        "mux0": { "type": "$mux", "parameters": {}, "attributes": {},
                  "connections": { "A": [3, 4], "B": [5, 6],
                                   "S": [7, 8], "Y": [9, 10] } }
    }));

    // multi-bit clock port
    let mut db = open_db();
    let m = module(json!({
        "ports": { "clk": { "direction": "input", "bits": [2, 3] } },
        "cells": {}
    }));
    assert!(matches!(db.build_from_module(&m, "clk"),
                     Err(Error::Unsupported(_))));

    // inout port
    let mut db = open_db();
    let m = module(json!({
        "ports": { "pad": { "direction": "inout", "bits": [2] } },
        "cells": {}
    }));
    assert!(matches!(db.build_from_module(&m, "clk"),
                     Err(Error::Unsupported(_))));
}

#[test]
fn dff_without_clock_is_rejected() {
    let mut db = open_db();
    let m = module(json!({
        "ports": {},
        "cells": {
            "dff0": { "type": "$dff",
                      "parameters": { "CLK_POLARITY": 1 },
                      "attributes": {},
                      "connections": { "D": [3], "CLK": [2], "Q": [4] } }
        }
    }));
    assert!(matches!(db.build_from_module(&m, "clk"),
                     Err(Error::Unsupported(_))));
}
