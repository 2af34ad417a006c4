//! cutsig command-line entry point.
//!
//! Usage: cutsig -g sizes.txt -o signal.bedgraph [OPTIONS] <INPUTS>...

use std::path::PathBuf;
use std::process;
use std::thread;

use clap::{ArgAction, Parser};
use log::error;

use cutsig::config::{Config, ExtendMode, FilterOptions, ShiftProfile};
use cutsig::pipeline;

#[derive(Parser)]
#[command(name = "cutsig")]
#[command(version)]
#[command(about = "Generate cut-site signal tracks from sequencing alignments", long_about = None)]
struct Cli {
    /// Alignment table input file(s): chrom<TAB>start<TAB>end<TAB>flag<TAB>mapq<TAB>tlen
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Chromosome size table: chrom<TAB>length
    #[arg(short = 'g', long)]
    genome: PathBuf,

    /// Output track path (used as a prefix in strand-split mode)
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Fixed extension width in bases downstream of each cut site
    #[arg(long, default_value_t = 200, conflicts_with = "fragment")]
    extsize: u64,

    /// Use mate-pair fragment extents instead of a fixed extension width
    #[arg(long)]
    fragment: bool,

    /// Strand-symmetric cut-site shift (negated on the minus strand)
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    shift: i64,

    /// Extra shift applied to plus-strand cut sites only
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    shift_plus: i64,

    /// Extra shift applied to minus-strand cut sites only
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    shift_minus: i64,

    /// Write separate plus/minus strand tracks
    #[arg(long, conflicts_with = "fragment")]
    strand_split: bool,

    /// Keep only reads with all of these flag bits set
    #[arg(long)]
    required_flag: Option<u16>,

    /// Drop reads with any of these flag bits set
    #[arg(long)]
    excluded_flag: Option<u16>,

    /// Minimum mapping quality
    #[arg(short = 'q', long)]
    min_quality: Option<u8>,

    /// Minimum absolute fragment (template) length
    #[arg(long)]
    min_fragment: Option<u64>,

    /// Maximum absolute fragment (template) length
    #[arg(long)]
    max_fragment: Option<u64>,

    /// Number of worker threads [default: available cores]
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Zoom levels requested in the track header
    #[arg(long, default_value_t = 0)]
    max_zoom: u32,

    /// Scale factor applied to interval values
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Silence all log output
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn to_config(&self) -> Config {
        Config {
            extend: if self.fragment {
                ExtendMode::Fragment
            } else {
                ExtendMode::Fixed(self.extsize)
            },
            shifts: ShiftProfile {
                shift: self.shift,
                plus: self.shift_plus,
                minus: self.shift_minus,
            },
            strand_split: self.strand_split,
            filter: FilterOptions {
                required_flag: self.required_flag,
                excluded_flag: self.excluded_flag,
                min_quality: self.min_quality,
                min_fragment: self.min_fragment,
                max_fragment: self.max_fragment,
            },
            pool_size: self.threads.unwrap_or_else(|| {
                thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
            }),
            max_zoom: self.max_zoom,
            scale: self.scale,
            output: self.output.clone(),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    stderrlog::new()
        .quiet(cli.quiet)
        .verbosity(cli.verbose as usize + 1)
        .init()
        .expect("logger init");

    let cfg = cli.to_config();
    match pipeline::run(&cfg, &cli.genome, &cli.inputs) {
        Ok(summary) => {
            if !cli.quiet {
                eprintln!(
                    "cutsig: {} chromosome(s) -> {}",
                    summary.chromosomes,
                    summary
                        .outputs
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
