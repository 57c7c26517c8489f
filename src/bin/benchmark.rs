use clap::Parser;
use isa_bench::core::benchmark::{
    BenchConfig, Benchmarker, DEFAULT_FEATURES, MEASUREMENT_ITERATIONS, TIME_SCALE,
};
use isa_bench::core::features::Feature;
use isa_bench::core::hardware::probe;
use isa_bench::core::operands::{InputSource, DEFAULT_RANDOM_LENGTH};
use isa_bench::core::runtime::RuntimeConfig;
use std::io::Write;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Time hardware vs. emulated bit counting",
    long_about = None
)]
struct Args {
    /// Features to benchmark (ABM, POPCNT); ABM when omitted
    #[arg(short, long, value_delimiter = ',')]
    features: Vec<Feature>,

    #[arg(short = 'n', long, default_value_t = MEASUREMENT_ITERATIONS)]
    iterations: u32,

    /// Divisor applied to the summed elapsed time
    #[arg(short, long, default_value_t = TIME_SCALE)]
    scale: f64,

    /// Draw random alphanumeric operands every iteration
    #[arg(short, long)]
    random: bool,

    /// Radix for converting operand strings (default 10 fixed, 36 random)
    #[arg(long)]
    radix: Option<u32>,

    #[arg(short, long, default_value_t = DEFAULT_RANDOM_LENGTH)]
    length: usize,

    #[arg(long)]
    seed: Option<u64>,

    /// Pin the benchmark thread to this core index
    #[arg(short, long)]
    pin_core: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
    let args = Args::parse();

    let caps = probe()?;

    if let Some(core) = args.pin_core {
        RuntimeConfig::pin_thread(core);
    }

    let mut config = BenchConfig {
        iterations: args.iterations,
        scale: args.scale,
        ..BenchConfig::default()
    };
    if args.random {
        config.source = InputSource::random(args.length, args.radix.unwrap_or(36), args.seed);
    } else if let Some(radix) = args.radix {
        if let InputSource::Fixed { radix: r, .. } = &mut config.source {
            *r = radix;
        }
    }

    let features = if args.features.is_empty() {
        DEFAULT_FEATURES.to_vec()
    } else {
        args.features
    };

    let bench = Benchmarker::new(config);
    let mut stdout = std::io::stdout().lock();

    for feature in features {
        for m in bench.compare(feature, &caps)? {
            write!(stdout, "{} \r\n", m)?;
        }
    }
    stdout.flush()?;

    Ok(())
}
