//! pricing-engine CLI
//!
//! Resolve costs, quote prices and propagate cost edits from the command
//! line, against a JSON catalog snapshot.
//!
//! # Usage
//!
//! ```bash
//! # Resolve a product's reference-currency cost
//! pricing-engine cost --catalog catalog.json --product PAINT
//!
//! # Quote a price for a client
//! pricing-engine price --catalog catalog.json --product PAINT --quantity 5 --client ACME
//!
//! # Change a base cost and see what it ripples into
//! pricing-engine propagate --catalog catalog.json --product RESIN --cost 2.40
//!
//! # Generate a random catalog for testing
//! pricing-engine generate --raw 20 --layers 3 --per-layer 10
//! ```

use pricing_engine::catalog::snapshot::LoadedCatalog;
use pricing_engine::core::client::ClientId;
use pricing_engine::core::product::{CalculationType, ProductId};
use pricing_engine::graph::ingredient_graph::IngredientGraph;
use pricing_engine::graph::propagation::CostPropagator;
use pricing_engine::pricing::calculator::{PriceCalculator, PriceRequest};
use pricing_engine::pricing::tier_matrix::TierMatrix;
use pricing_engine::simulation::catalog_generator::{generate_random_catalog, CatalogConfig};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"pricing-engine: cost propagation and tiered sale pricing

USAGE:
    pricing-engine <COMMAND> [OPTIONS]

COMMANDS:
    cost        Resolve the reference-currency cost of a product
    price       Quote a unit and total price
    propagate   Preview a base cost change and its cascade (file is not modified)
    cycles      Report ingredient cycles in a catalog
    matrix      Look up a coefficient in a tier matrix file
    generate    Generate a random layered catalog (for testing)
    help        Show this message

OPTIONS (cost, price, propagate, cycles):
    --catalog <FILE>    Path to JSON catalog snapshot
    --product <ID>      Product id
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (price):
    --quantity <Q>      Quantity to price (required, > 0)
    --client <ID>       Apply this client's override, if any
    --freeze            Price every unit at the single-unit price

OPTIONS (propagate):
    --cost <X>          New base cost

OPTIONS (matrix):
    --file <CSV>        Matrix file
    --type <T>          Calculation type label
    --reference <R>     Reference value
    --quantity <Q>      Quantity

OPTIONS (generate):
    --raw <N>           Number of raw materials (default: 20)
    --layers <N>        Number of formula layers (default: 3)
    --per-layer <N>     Formula products per layer (default: 10)
    --output <FILE>     Write to file instead of stdout

EXAMPLES:
    pricing-engine cost --catalog catalog.json --product PAINT
    pricing-engine price --catalog catalog.json --product PAINT --quantity 0.5
    pricing-engine price --catalog catalog.json --product PAINT --quantity 7 --client ACME --format json
    pricing-engine propagate --catalog catalog.json --product RESIN --cost 2.40
    pricing-engine matrix --file liquid.csv --type LIQUID --reference 40 --quantity 12
    pricing-engine generate --raw 50 --layers 4 --per-layer 25 --output big.json"#
    );
}

/// Parsed `--flag value` pairs and bare `--switch`es.
#[derive(Default)]
struct Options {
    catalog: Option<String>,
    product: Option<String>,
    format: Option<String>,
    quantity: Option<String>,
    client: Option<String>,
    cost: Option<String>,
    file: Option<String>,
    calculation_type: Option<String>,
    reference: Option<String>,
    raw: Option<String>,
    layers: Option<String>,
    per_layer: Option<String>,
    output: Option<String>,
    freeze: bool,
}

fn parse_options(args: &[String]) -> Options {
    let mut options = Options::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        if flag == "--freeze" {
            options.freeze = true;
            i += 1;
            continue;
        }
        let slot = match flag {
            "--catalog" => &mut options.catalog,
            "--product" => &mut options.product,
            "--format" => &mut options.format,
            "--quantity" => &mut options.quantity,
            "--client" => &mut options.client,
            "--cost" => &mut options.cost,
            "--file" => &mut options.file,
            "--type" => &mut options.calculation_type,
            "--reference" => &mut options.reference,
            "--raw" => &mut options.raw,
            "--layers" => &mut options.layers,
            "--per-layer" => &mut options.per_layer,
            "--output" => &mut options.output,
            _ => {
                eprintln!("Unknown option: {}", flag);
                process::exit(1);
            }
        };
        i += 1;
        *slot = Some(args.get(i).cloned().unwrap_or_else(|| {
            eprintln!("{} requires a value", flag);
            process::exit(1);
        }));
        i += 1;
    }
    options
}

fn required(value: Option<String>, flag: &str) -> String {
    value.unwrap_or_else(|| {
        eprintln!("Error: {} is required", flag);
        process::exit(1);
    })
}

fn decimal(value: &str, flag: &str) -> Decimal {
    value.replace(',', ".").parse().unwrap_or_else(|e| {
        eprintln!("Invalid {} '{}': {}", flag, value, e);
        process::exit(1);
    })
}

fn count(value: Option<String>, flag: &str, default: usize) -> usize {
    match value {
        Some(v) => v.parse().unwrap_or_else(|_| {
            eprintln!("{} requires a number", flag);
            process::exit(1);
        }),
        None => default,
    }
}

fn is_json(options: &Options) -> bool {
    options.format.as_deref() == Some("json")
}

fn load_catalog(path: &str) -> LoadedCatalog {
    LoadedCatalog::load(path).unwrap_or_else(|e| {
        eprintln!("Error loading catalog '{}': {}", path, e);
        process::exit(1);
    })
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

#[derive(Serialize)]
struct CostOutput {
    product_id: String,
    reference_cost: String,
}

fn cmd_cost(args: &[String]) {
    let options = parse_options(args);
    let loaded = load_catalog(&required(options.catalog.clone(), "--catalog"));
    let product_id = ProductId::new(required(options.product.clone(), "--product"));

    let calculator = PriceCalculator::new(loaded.context());
    match calculator.resolve_cost(&product_id) {
        Ok(cost) if is_json(&options) => print_json(&CostOutput {
            product_id: product_id.to_string(),
            reference_cost: cost.to_string(),
        }),
        Ok(cost) => println!("{}: {}", product_id, cost),
        Err(e) if is_json(&options) => {
            print_json(&e.report());
            process::exit(2);
        }
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            process::exit(2);
        }
    }
}

fn cmd_price(args: &[String]) {
    let options = parse_options(args);
    let loaded = load_catalog(&required(options.catalog.clone(), "--catalog"));
    let product_id = required(options.product.clone(), "--product");
    let quantity = decimal(&required(options.quantity.clone(), "--quantity"), "--quantity");

    let mut request = PriceRequest::new(product_id, quantity);
    if let Some(client) = options.client.as_deref() {
        request = request.for_client(ClientId::new(client));
    }
    if options.freeze {
        request = request.freeze_unit_price();
    }

    let calculator = PriceCalculator::new(loaded.context());
    match calculator.calculate_price(&request) {
        Ok(quote) if is_json(&options) => print_json(&quote),
        Ok(quote) => println!("{}", quote),
        Err(e) if is_json(&options) => {
            print_json(&e.report());
            process::exit(2);
        }
        Err(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            process::exit(2);
        }
    }
}

fn cmd_propagate(args: &[String]) {
    let options = parse_options(args);
    let mut loaded = load_catalog(&required(options.catalog.clone(), "--catalog"));
    let product_id = ProductId::new(required(options.product.clone(), "--product"));
    let cost = decimal(&required(options.cost.clone(), "--cost"), "--cost");

    let report = CostPropagator::update_base_cost(&mut loaded.catalog, &product_id, cost)
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        });

    if is_json(&options) {
        print_json(&report);
    } else {
        println!("{}", report);
    }
}

#[derive(Serialize)]
struct CycleOutput {
    products: Vec<String>,
}

fn cmd_cycles(args: &[String]) {
    let options = parse_options(args);
    let loaded = load_catalog(&required(options.catalog.clone(), "--catalog"));
    let cycles = IngredientGraph::from_catalog(&loaded.catalog).cycles();

    if is_json(&options) {
        let output: Vec<CycleOutput> = cycles
            .iter()
            .map(|group| CycleOutput {
                products: group.iter().map(|id| id.to_string()).collect(),
            })
            .collect();
        print_json(&output);
    } else if cycles.is_empty() {
        println!("No cycles detected.");
    } else {
        for (i, group) in cycles.iter().enumerate() {
            let ids: Vec<&str> = group.iter().map(|id| id.as_str()).collect();
            println!("  Cycle {}: {}", i, ids.join(", "));
        }
        println!("\nTotal cycles: {}", cycles.len());
    }
}

fn cmd_matrix(args: &[String]) {
    let options = parse_options(args);
    let path = required(options.file.clone(), "--file");
    let calculation_type = CalculationType::new(required(options.calculation_type.clone(), "--type"));
    let reference = decimal(&required(options.reference.clone(), "--reference"), "--reference");
    let quantity = decimal(&required(options.quantity.clone(), "--quantity"), "--quantity");

    let content = fs::read_to_string(&path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    });
    let matrix = TierMatrix::parse(calculation_type, &content).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    match matrix.lookup(reference, quantity) {
        Some(hit) => {
            println!("Coefficient:     {}", hit.coefficient);
            println!("Reference tier:  {}", hit.reference_tier_used);
            println!("Quantity tier:   {}", hit.quantity_tier_used);
        }
        None => {
            println!(
                "No coefficient at reference {} / quantity {} (blank cell)",
                reference, quantity
            );
            process::exit(2);
        }
    }
}

fn cmd_generate(args: &[String]) {
    let options = parse_options(args);
    let defaults = CatalogConfig::default();
    let config = CatalogConfig {
        raw_materials: count(options.raw.clone(), "--raw", defaults.raw_materials),
        formula_layers: count(options.layers.clone(), "--layers", defaults.formula_layers),
        products_per_layer: count(
            options.per_layer.clone(),
            "--per-layer",
            defaults.products_per_layer,
        ),
        ..defaults
    };

    let snapshot = generate_random_catalog(&config);
    let json = snapshot.to_json().unwrap_or_else(|e| {
        eprintln!("Error serializing catalog: {}", e);
        process::exit(1);
    });

    if let Some(path) = options.output {
        fs::write(&path, &json).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} products ({} formulas) → {}",
            snapshot.products.len(),
            snapshot.formulas.len(),
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "cost" => cmd_cost(rest),
        "price" => cmd_price(rest),
        "propagate" => cmd_propagate(rest),
        "cycles" => cmd_cycles(rest),
        "matrix" => cmd_matrix(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
