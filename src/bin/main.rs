//! Code executor CLI

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use code_executor::{
    classify, screen, utils, Capability, ExecutionOutcome, ExecutionRequest, Executor,
    ExecutorConfig, ResourceBudget,
};

#[derive(Parser)]
#[command(name = "code-executor")]
#[command(about = "Sandboxed execution of generated Python snippets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a code file inside the sandbox ("-" reads stdin)
    Run {
        /// Code file, or - for stdin
        file: PathBuf,

        /// Wall-clock limit in seconds
        #[arg(short, long, default_value_t = 5)]
        timeout: u64,

        /// Memory limit (e.g., 128M, 1G)
        #[arg(short, long, default_value = "128M")]
        memory: String,

        /// Output limit in bytes
        #[arg(short = 'o', long, default_value_t = 65536)]
        max_output: u64,

        /// Grant network access to the executed code
        #[arg(long)]
        network: bool,

        /// Scratch root directory
        #[arg(long)]
        scratch_root: Option<PathBuf>,

        /// Interpreter binary
        #[arg(long)]
        interpreter: Option<PathBuf>,
    },

    /// Run the static safety screen without executing
    Screen {
        /// Code file, or - for stdin
        file: PathBuf,

        /// Screen as if network access were granted
        #[arg(long)]
        network: bool,
    },

    /// Report whether a query needs precise computation
    Detect { query: String },

    /// Check host requirements
    Check,
}

fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            timeout,
            memory,
            max_output,
            network,
            scratch_root,
            interpreter,
        } => {
            match run_code(
                &file,
                timeout,
                &memory,
                max_output,
                network,
                scratch_root,
                interpreter,
            ) {
                Ok(code) => std::process::exit(code),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Screen { file, network } => match read_code(&file) {
            Ok(code) => match screen::check(&code, network) {
                Ok(()) => println!("ok"),
                Err(reason) => {
                    println!("rejected: {}", reason);
                    std::process::exit(2);
                }
            },
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Detect { query } => {
            if classify::needs_computation(&query) {
                println!("computation");
            } else {
                println!("retrieval");
            }
        }
        Commands::Check => check_requirements(),
    }
}

fn read_code(file: &PathBuf) -> Result<String, Box<dyn std::error::Error>> {
    if file.as_os_str() == "-" {
        let mut code = String::new();
        std::io::stdin().read_to_string(&mut code)?;
        Ok(code)
    } else {
        Ok(std::fs::read_to_string(file)?)
    }
}

#[allow(clippy::too_many_arguments)]
fn run_code(
    file: &PathBuf,
    timeout: u64,
    memory: &str,
    max_output: u64,
    network: bool,
    scratch_root: Option<PathBuf>,
    interpreter: Option<PathBuf>,
) -> Result<i32, Box<dyn std::error::Error>> {
    let code = read_code(file)?;

    let mut config = ExecutorConfig::from_env();
    if let Some(root) = scratch_root {
        config.scratch_root = root;
    }
    if let Some(bin) = interpreter {
        config.interpreter = bin;
    }

    let budget = ResourceBudget::new(
        Duration::from_secs(timeout),
        utils::parse_memory_size(memory)?,
        max_output,
    );

    let mut request = ExecutionRequest::new(code, budget);
    if network {
        request = request.with_capability(Capability::Network);
    }

    let executor = Executor::new(config)?;
    let outcome = executor.execute(&request)?;

    Ok(report(outcome))
}

fn report(outcome: ExecutionOutcome) -> i32 {
    match outcome {
        ExecutionOutcome::Success {
            stdout,
            return_value,
        } => {
            print!("{}", stdout);
            if let Some(value) = return_value {
                println!("return value: {}", value);
            }
            0
        }
        ExecutionOutcome::Timeout => {
            eprintln!("timeout: wall-clock budget exceeded");
            1
        }
        ExecutionOutcome::MemoryExceeded => {
            eprintln!("memory exceeded: memory budget exceeded");
            1
        }
        ExecutionOutcome::RuntimeError {
            message,
            stacktrace,
        } => {
            eprintln!("runtime error: {}", message);
            eprint!("{}", stacktrace);
            1
        }
        ExecutionOutcome::OutputTruncated { partial } => {
            print!("{}", partial);
            eprintln!("... (output truncated)");
            1
        }
        ExecutionOutcome::Rejected { reason } => {
            eprintln!("rejected: {}", reason);
            2
        }
        ExecutionOutcome::Cancelled => {
            eprintln!("cancelled");
            1
        }
    }
}

fn check_requirements() {
    let config = ExecutorConfig::from_env();

    println!("[*] Checking executor requirements...");
    println!();

    let interpreter_ok = std::process::Command::new(&config.interpreter)
        .arg("--version")
        .output()
        .is_ok();
    if interpreter_ok {
        println!("[✓] Interpreter found: {}", config.interpreter.display());
    } else {
        println!(
            "[✗] Interpreter NOT found: {}",
            config.interpreter.display()
        );
    }

    if utils::is_root() {
        println!("[✓] Running as root (namespace isolation enabled)");
    } else {
        println!("[!] NOT running as root (seccomp + rlimits only)");
    }

    if code_executor::isolation::network_deny_filter().is_some() {
        println!("[✓] Seccomp network filter available");
    } else {
        println!("[✗] Seccomp network filter NOT available on this architecture");
    }

    println!("    scratch root: {}", config.scratch_root.display());
    println!("    max sessions: {}", config.max_sessions);
}
