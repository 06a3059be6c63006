use emapdb::{rewrites, NetlistDB};
use std::env;

/// Cell types the arithmetic rules commute and associate over.
const TARGET_TYPES: &[&str] = &[
    "$addu", "$adds", "$mulu", "$muls",
    "$andu", "$ands", "$oru", "$ors", "$xoru", "$xors",
];

fn main() {
    clilog::init_stderr_color_debug();
    let args: Vec<String> = env::args().collect();
    assert!(args.len() == 3 || args.len() == 4,
            "Usage: {} <schema.sql> <netlist.json> [<module>]", args[0]);

    let mut db = NetlistDB::new(&args[1], ":memory:")
        .expect("Error opening the store");
    db.build_from_json_file(&args[2], args.get(3).map(|x| x.as_ref()), "clk")
        .expect("Error building the netlist store");
    db.rebuild().expect("Error rebuilding after load");

    let applied = rewrites::saturate(
        &mut db, &rewrites::basic_rules(), TARGET_TYPES, Some(32)
    ).expect("Error saturating");

    println!("applied {} rewrites in total", applied);
    for table in ["wirevecs", "ay_cells", "aby_cells", "absy_cells",
                  "dffs", "from_inputs", "as_outputs", "instances"] {
        println!("{:16} {:8} rows", table, db.count_rows(table).unwrap());
    }
    println!("{}", serde_json::to_string_pretty(
        &db.dump_tables().expect("Error dumping tables")).unwrap());
}
