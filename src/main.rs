use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};

use rivet::{NullSink, RunState, StderrSink};

/// Rivet is a teaching emulator for a 32-bit RISC-V subset: assemble a
/// source file and step it against an observable machine state.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.s` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a file, run it to completion, and print the final state
    Run {
        /// Assembly source to run
        name: PathBuf,
        /// Stop after this many steps even without a halt
        #[arg(long, default_value_t = 1_000_000)]
        max_steps: usize,
        /// Discard diagnostics instead of printing them to stderr
        #[arg(long)]
        quiet: bool,
    },
    /// Assemble a file without running it
    Check {
        /// Assembly source to check
        name: PathBuf,
    },
    /// Assemble and run a file, printing only the state dump
    Dump {
        /// Assembly source to run
        name: PathBuf,
        #[arg(long, default_value_t = 1_000_000)]
        max_steps: usize,
    },
}

fn read_source(name: &PathBuf) -> Result<String> {
    fs::read_to_string(name).into_diagnostic()
}

fn machine(quiet: bool) -> RunState {
    if quiet {
        RunState::with_sink(Box::new(NullSink))
    } else {
        RunState::with_sink(Box::new(StderrSink))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let command = match (args.command, args.path) {
        (Some(command), _) => command,
        (None, Some(path)) => Command::Run {
            name: path,
            max_steps: 1_000_000,
            quiet: false,
        },
        (None, None) => {
            println!("~ rivet v{VERSION} ~");
            println!("{SHORT_INFO}");
            return Ok(());
        }
    };

    match command {
        Command::Run {
            name,
            max_steps,
            quiet,
        } => {
            let contents = read_source(&name)?;
            println!(
                "{:>12} target {}",
                "Assembling".green().bold(),
                name.display()
            );
            let mut state = machine(quiet);
            state.load_program(&contents);

            println!("{:>12} program", "Stepping".green().bold());
            let steps = state.run(max_steps);
            if steps == max_steps {
                println!(
                    "{:>12} after {} steps without a halt",
                    "Stopped".yellow().bold(),
                    steps
                );
            } else {
                println!("{:>12} in {} steps", "Halted".green().bold(), steps);
            }
            print!("{}", state.dump_state());
            Ok(())
        }
        Command::Check { name } => {
            let contents = read_source(&name)?;
            println!(
                "{:>12} target {}",
                "Checking".green().bold(),
                name.display()
            );
            let mut state = machine(false);
            state.load_program(&contents);
            println!(
                "{:>12} {} instructions, {} labels",
                "Loaded".green().bold(),
                state.program_len(),
                state.label_count()
            );
            Ok(())
        }
        Command::Dump { name, max_steps } => {
            let contents = read_source(&name)?;
            let mut state = machine(true);
            state.load_program(&contents);
            state.run(max_steps);
            print!("{}", state.dump_state());
            Ok(())
        }
    }
}

const SHORT_INFO: &str = r"
Welcome to rivet, a small stepping emulator for a 32-bit RISC-V subset,
built for poking at register and memory state while learning assembly.
Please use `-h` or `--help` for usage instructions.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
