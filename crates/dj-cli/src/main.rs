mod cli;
mod driver;
mod error;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    if let Err(e) = driver::run(&cli) {
        if !matches!(e, error::CliError::Compile(_)) {
            eprintln!("error: {e}");
        }
        std::process::exit(-1);
    }
}
