use std::env;
use std::process;

use chrono::Utc;
use serde::Serialize;

use analyst_core::ContextRegistry;
use analyst_engine::checks::CheckRegistry;
use analyst_engine::engine::{AnalyticsEngine, CheckFailure};
use analyst_engine::source::{CsvSource, DataSource};

// ---------------------------------------------------------------------------
// JSON output contract
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AnalysisJson<'a> {
    generated_at: String,
    business: &'a str,
    industry: &'a str,
    insight_count: usize,
    insights: &'a [analyst_core::Insight],
    warnings: &'a [CheckFailure],
}

fn print_usage() {
    eprintln!("Usage: analyst <inventory.csv> [--sales <sales.csv>] [--industry <name>] [--business <name>] [--json]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --sales     Separate sales CSV (legacy two-file mode)");
    eprintln!("  --industry  Business context to analyze under (default: retail)");
    eprintln!("  --business  Business name shown in the report");
    eprintln!("  --json      Output as JSON instead of a formatted report");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  analyst fixtures/shop_inventory.csv");
    eprintln!("  analyst fixtures/shop_inventory.csv --business \"Corner Shop\" --json");
    eprintln!("  analyst fixtures/inventory.csv --sales fixtures/sales.csv");
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let csv_path = &args[1];

    // Parse optional flags
    let mut sales_path: Option<String> = None;
    let mut industry = "retail".to_string();
    let mut business_name = "Business".to_string();
    let mut json_output = false;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--sales" => {
                if i + 1 < args.len() {
                    sales_path = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("Error: --sales requires a file path");
                    process::exit(1);
                }
            }
            "--industry" => {
                if i + 1 < args.len() {
                    industry = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: --industry requires a name");
                    process::exit(1);
                }
            }
            "--business" => {
                if i + 1 < args.len() {
                    business_name = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: --business requires a name");
                    process::exit(1);
                }
            }
            "--json" => {
                json_output = true;
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                process::exit(1);
            }
        }
    }

    // Build the context for the requested industry
    let contexts = ContextRegistry::with_defaults();
    let context = match contexts.create(&industry) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let engine = AnalyticsEngine::new(context, CheckRegistry::with_defaults());

    let inventory_source = CsvSource::new(csv_path);
    let sales_source = sales_path.map(CsvSource::new);

    let run = match engine.analyze_source(
        &inventory_source,
        sales_source.as_ref().map(|s| s as &dyn DataSource),
    ) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if json_output {
        let output = AnalysisJson {
            generated_at: Utc::now().to_rfc3339(),
            business: &business_name,
            industry: &industry,
            insight_count: run.insights.len(),
            insights: &run.insights,
            warnings: &run.diagnostics,
        };
        match serde_json::to_string_pretty(&output) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => {
                eprintln!("Error: failed to serialize output: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("{}", engine.generate_report(&run.insights, &business_name));
        for failure in &run.diagnostics {
            eprintln!("Warning: check '{}' failed: {}", failure.check, failure.reason);
        }
    }
}
