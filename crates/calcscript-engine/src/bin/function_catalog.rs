use calcscript_engine::stdlib::StdLibrary;
use serde::Serialize;

#[derive(Serialize)]
struct FunctionCatalog {
    functions: Vec<FunctionCatalogEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionCatalogEntry {
    path: String,
    min_args: usize,
    max_args: usize,
}

fn main() {
    // `functions()` is already sorted by path and free of duplicates.
    let functions = StdLibrary::shared()
        .functions()
        .iter()
        .map(|spec| FunctionCatalogEntry {
            path: format!("std.{}", spec.path),
            min_args: spec.min_args,
            max_args: spec.max_args,
        })
        .collect();

    let catalog = FunctionCatalog { functions };
    let json = serde_json::to_string_pretty(&catalog).expect("serialize function catalog");
    println!("{json}");
}
