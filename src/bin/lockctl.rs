use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use operator_manager::coordination::{FileStore, LockKey};

#[derive(Parser)]
#[command(name = "operator-lockctl")]
#[command(about = "Inspect the operator-manager leadership lock", long_about = None)]
struct Cli {
    /// Lock directory shared by the replicas
    #[arg(short = 'd', long, default_value = "/var/run/operator-manager/locks")]
    lock_dir: PathBuf,

    #[arg(short, long, default_value = "default")]
    namespace: String,

    #[arg(short = 'l', long, default_value = "operator-manager-lock")]
    name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full lock record as JSON
    Show,
    /// Print the current holder, if any
    Holder,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let store = FileStore::open(&cli.lock_dir)?;
    let key = LockKey::new(cli.namespace.clone(), cli.name.clone());

    let Some(record) = store.read(&key)? else {
        eprintln!("No lock record for {}", key);
        return Ok(ExitCode::from(2));
    };

    match cli.command {
        Commands::Show => {
            let doc = serde_json::json!({
                "key": key.to_string(),
                "version": record.version.0,
                "record": record.value,
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Commands::Holder => {
            if record.value.is_held() {
                println!("{}", record.value.holder_identity);
            } else {
                println!("<none>");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
