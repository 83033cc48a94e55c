use colored::*;
use terraprep_manifest::infer;

/// Print the inferred type and JSON rendering of each value.
pub fn handle_infer(values: &[String]) {
    for raw in values {
        println!("{}", describe(raw));
    }
}

fn describe(raw: &str) -> String {
    let value = infer(raw);
    format!(
        "{}\t{}\t{}",
        raw,
        value.type_name().cyan(),
        value.to_json()
    )
}
