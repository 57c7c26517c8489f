use clap::Parser;
use isa_bench::core::benchmark::{BenchConfig, Benchmarker, BENCHMARKED_FEATURES};
use isa_bench::core::hardware::{identify, probe};
use isa_bench::core::report::Report;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Write a JSON report of detected extensions", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "cpu_report.json")]
    output: PathBuf,

    /// Also run the benchmarks and include their timings
    #[arg(short, long)]
    bench: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
    let args = Args::parse();

    let caps = probe()?;
    let identity = identify().ok();
    println!("Detected {} extensions", caps.supported().count());

    let mut report = Report::new(identity, caps);

    if args.bench {
        let bench = Benchmarker::new(BenchConfig::default());
        for feature in BENCHMARKED_FEATURES {
            for m in bench.compare(feature, &report.capabilities)? {
                println!("{}", m);
                report.push(m);
            }
        }
        report.config = Some(bench.config().clone());
    }

    report.write_json(&args.output)?;
    println!("Exported report to {:?}", args.output);
    Ok(())
}
