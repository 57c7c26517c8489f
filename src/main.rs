use clap::Parser;
use isa_bench::core::features::LISTED_FEATURES;
use isa_bench::core::hardware::{identify, probe};

const BANNER: &str = "This program prints a list of some supported instructions of your cpu";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "List instruction-set extensions supported by this CPU",
    long_about = None
)]
struct Args {
    /// List every detected extension instead of the short list
    #[arg(short, long)]
    all: bool,

    /// Also print the vendor and brand strings
    #[arg(short, long)]
    identity: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
    let args = Args::parse();

    println!("{}", BANNER);

    if args.identity {
        let id = identify()?;
        println!("Vendor: {}", id.vendor);
        if let Some(brand) = id.brand {
            println!("Brand: {}", brand);
        }
    }

    let caps = probe()?;
    if args.all {
        for feature in caps.supported() {
            println!("{}", feature);
        }
    } else {
        for feature in LISTED_FEATURES.iter().filter(|&&f| caps.has(f)) {
            println!("{}", feature);
        }
    }

    Ok(())
}
