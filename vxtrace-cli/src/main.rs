// CLI application
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use vxtrace_cli::commands::{
    dump_payload, inspect_trace, prepare_replay, print_inspect, print_statistics, run_demo, verify_trace,
};
use vxtrace_core::replay::ElementType;
use vxtrace_core::trace::PREFIX_ENV;

#[derive(Parser)]
#[command(name = "vxtrace")]
#[command(about = "Inspect, verify and replay API traces")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Print statistics of a capture
    Inspect {
        /// Path prefix of the capture files
        #[arg(short, long, env = PREFIX_ENV, default_value = "")]
        prefix: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that a call log is well formed and its loads fit the payload store
    Verify {
        /// Path prefix of the capture files
        #[arg(short, long, env = PREFIX_ENV, default_value = "")]
        prefix: String,
    },
    /// Print a typed slice of the payload store
    Dump {
        /// Path prefix of the capture files
        #[arg(short, long, env = PREFIX_ENV, default_value = "")]
        prefix: String,

        /// Byte offset
        #[arg(long)]
        offset: u64,

        /// Number of elements
        #[arg(long)]
        count: usize,

        /// Element type (`u32`, `float`, `int32_t`, ...)
        #[arg(long, default_value = "u8")]
        dtype: ElementType,

        /// Read the replay copy instead of the capture
        #[arg(long)]
        replay: bool,
    },
    /// Write the replay program and payload copy
    PrepareReplay {
        /// Path prefix of the capture files
        #[arg(short, long, env = PREFIX_ENV, default_value = "")]
        prefix: String,
    },
    /// Trace a small example graph
    Demo {
        /// Path prefix of the capture files
        #[arg(short, long, env = PREFIX_ENV, default_value = "")]
        prefix: String,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { prefix, json } => {
            let report = inspect_trace(&prefix)?;
            print_inspect(&report, json)?;
        }
        Commands::Verify { prefix } => {
            let pb = create_progress_bar("Verifying call log...");
            let report = verify_trace(&prefix)?;
            if !report.is_ok() {
                pb.abandon_with_message("Verification failed");
                anyhow::bail!("{} errors in call log", report.errors().count());
            }
            pb.finish_with_message("Verification complete");
        }
        Commands::Dump {
            prefix,
            offset,
            count,
            dtype,
            replay,
        } => {
            let values = dump_payload(&prefix, offset, count, dtype, replay)?;
            println!("[{}]", values.to_strings().join(", "));
        }
        Commands::PrepareReplay { prefix } => {
            let pb = create_progress_bar("Preparing replay...");
            let (program, payload) = prepare_replay(&prefix)?;
            pb.finish_with_message("Replay prepared");
            println!("Replay program: {}", program.display());
            println!("Replay payload: {}", payload.display());
        }
        Commands::Demo { prefix } => {
            let pb = create_progress_bar("Tracing demo graph...");
            let stats = run_demo(&prefix)?;
            pb.finish_with_message("Demo traced");
            print_statistics(&stats)?;
        }
    }

    Ok(())
}

fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb
}
