use anyhow::Context;
use clap::Parser;
use omni_fetch::BenchConfig;
use omni_fetch::PrefetchMode;
use omni_fetch::SumMode;
use omni_fetch::Workload;
use omni_fetch::bench::DEFAULT_CAPACITY;
use omni_fetch::bench::DEFAULT_SEED;
use tracing_subscriber::EnvFilter;

/// Times batched lookups against a fixed-capacity chained hash table.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Look up roughly one generated key in SELECTIVITY.
    selectivity: u32,

    /// Number of lookups issued before their values are summed.
    buffer_size: usize,

    /// Keys to generate, and root slots in the table.
    #[arg(short = 'c', long = "capacity", default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Generator seed.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// How the final, partial batch is summed.
    #[arg(long, value_enum, default_value_t = SumMode::Compat)]
    mode: SumMode,

    /// How each batch's lookups are issued.
    #[arg(long, value_enum, default_value_t = PrefetchMode::Simulated)]
    prefetch: PrefetchMode,

    /// Reject a zero selectivity, buffer size or capacity instead of running.
    #[arg(long)]
    strict: bool,

    /// Print the report as strict JSON.
    #[arg(long)]
    json: bool,

    /// Print chain statistics to stderr (requires the `stats` feature).
    #[arg(long)]
    stats: bool,
}

impl Args {
    fn config(&self) -> BenchConfig {
        BenchConfig {
            capacity: self.capacity,
            seed: self.seed,
            selectivity: self.selectivity,
            buffer_size: self.buffer_size,
            mode: self.mode,
            prefetch: self.prefetch,
        }
    }
}

#[cfg(feature = "stats")]
fn print_stats(workload: &Workload) {
    let stats = workload.map().debug_stats();
    tracing::info!(
        longest_chain = stats.longest_chain,
        overflow = stats.overflow_entries,
        "chain statistics"
    );
    workload.map().print_chain_histogram();
    stats.print();
}

#[cfg(not(feature = "stats"))]
fn print_stats(_workload: &Workload) {
    tracing::warn!("--stats requires building with the `stats` feature");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = args.config();

    if args.strict {
        config
            .validate()
            .context("invalid benchmark configuration")?;
    }

    let workload = Workload::populate(&config);
    if args.stats {
        print_stats(&workload);
    }

    let report = workload.measure(&config);
    if args.json {
        println!("{}", report.to_json().context("rendering report")?);
    } else {
        print!("{report}");
    }

    Ok(())
}
