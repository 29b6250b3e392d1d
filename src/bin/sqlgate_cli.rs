use std::{error::Error, io};

use clap::Parser;
use sqlgate::{
    Command,
    cli::{CliError, HELP, render},
    config::{DEFAULT_HOST, DEFAULT_PORT},
    prompt,
    protocol::SqlClient,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server address, e.g. 127.0.0.1:7778
    address: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let address = cli
        .address
        .unwrap_or_else(|| format!("{DEFAULT_HOST}:{DEFAULT_PORT}"));
    let mut client = SqlClient::connect(address.as_str())?;
    println!("connected to {address}; .help for usage");

    let stdin = io::stdin();
    let stdout = io::stdout();

    loop {
        let cmd = match prompt(stdin.lock(), stdout.lock()) {
            Ok(Some(c)) => c,
            Ok(None) => break,
            Err(CliError::Io(e)) => return Err(e.into()),
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match cmd {
            Command::Exit => break,
            Command::Help => println!("{HELP}"),
            Command::Statement(s) if s.is_empty() => {}
            Command::Statement(s) => match client.send(&s) {
                Ok(resp) => println!("{}", render(&resp)),
                Err(e) => {
                    eprintln!("connection error: {e}");
                    break;
                }
            },
        }
    }

    Ok(())
}
