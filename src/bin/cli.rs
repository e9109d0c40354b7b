//! GateKV CLI Client
//!
//! One-shot command-line interface: authenticate, run one command, exit.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gatekv::network::Client;
use gatekv::Result;

/// GateKV CLI
#[derive(Parser, Debug)]
#[command(name = "gatekv-cli")]
#[command(about = "CLI for the GateKV key-value server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    server: String,

    /// Username
    #[arg(short, long)]
    user: String,

    /// Password
    #[arg(short, long)]
    password: String,

    /// Create the account instead of logging in
    #[arg(long)]
    register: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Get several keys
    Mget {
        /// The keys to get
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Set several pairs, given as key=value
    Mput {
        /// Pairs in key=value form
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Wait until COND_KEY holds COND_VALUE, then get KEY
    GetWhen {
        key: String,
        cond_key: String,
        cond_value: String,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut client = Client::connect(&args.server)?;

    let reply = if args.register {
        client.register(&args.user, &args.password)?
    } else {
        client.login(&args.user, &args.password)?
    };
    reply.into_result()?;

    match args.command {
        Commands::Get { key } => print_value(&key, client.get(&key)?),
        Commands::Put { key, value } => println!("{}", client.put(&key, value.as_bytes())?),
        Commands::Mget { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            match client.multi_get(&keys)? {
                Some(pairs) => {
                    for (key, value) in pairs {
                        println!("{} = {}", key, String::from_utf8_lossy(&value));
                    }
                }
                None => println!("(no data)"),
            }
        }
        Commands::Mput { pairs } => {
            let mut parsed = Vec::with_capacity(pairs.len());
            for pair in pairs {
                match pair.split_once('=') {
                    Some((key, value)) => parsed.push((key.to_string(), value.as_bytes().to_vec())),
                    None => {
                        return Err(gatekv::GateError::Config(format!(
                            "expected key=value, got {:?}",
                            pair
                        )))
                    }
                }
            }
            println!("{}", client.multi_put(parsed)?);
        }
        Commands::GetWhen { key, cond_key, cond_value } => {
            let value = client.get_when(&key, &cond_key, cond_value.as_bytes())?;
            print_value(&key, value);
        }
    }

    client.exit()
}

fn print_value(key: &str, value: Option<Vec<u8>>) {
    match value {
        Some(value) => println!("{} = {}", key, String::from_utf8_lossy(&value)),
        None => println!("{}: (not found)", key),
    }
}
