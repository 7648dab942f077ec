use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use env_logger::{Builder, Target};
use log::LevelFilter;
use sealvote::{Config, RestClient};
use std::fmt::Display;

mod command_election;
mod command_keygen;
mod command_login;
mod command_open;
mod command_receipt;
mod command_vote;

use command_election::command_election;
use command_keygen::command_keygen;
use command_login::command_login;
use command_open::command_open;
use command_receipt::command_receipt;
use command_vote::command_vote;

#[tokio::main]
async fn main() {
    let election_id = || {
        Arg::new("ELECTION-ID")
            .index(1)
            .required(true)
            .value_parser(value_parser!(u64))
            .help("Election id")
    };

    let matches = Command::new("sealvote")
        .version(clap::crate_version!())
        .about("Casts and inspects votes on a sealvote election server")
        .subcommand_required(true)
        .arg(
            Arg::new("uri")
                .long("uri")
                .global(true)
                .help("Server API uri - can also be set with SEALVOTE_URI"),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .global(true)
                .help("Access token - can also be set with SEALVOTE_TOKEN"),
        )
        .arg(
            Arg::new("v")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            Command::new("keygen")
                .about("Generate an RSA-PEM authority keypair")
                .arg(
                    Arg::new("secret")
                        .long("secret")
                        .help("Write the secret key here instead of stdout"),
                )
                .arg(
                    Arg::new("public")
                        .long("public")
                        .help("Write the public key here instead of stdout"),
                )
                .arg(
                    Arg::new("keysize")
                        .long("keysize")
                        .default_value("2048")
                        .value_parser(value_parser!(usize))
                        .help("RSA modulus size in bits"),
                ),
        )
        .subcommand(
            Command::new("login")
                .about("Log in and print an access token")
                .arg(Arg::new("USERNAME").index(1).required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("Password, read from stdin when not given"),
                ),
        )
        .subcommand(
            Command::new("election")
                .about("Show an election, its candidates and your voting status")
                .arg(election_id()),
        )
        .subcommand(
            Command::new("vote")
                .about("Cast a vote")
                .arg(election_id())
                .arg(
                    Arg::new("candidate")
                        .long("candidate")
                        .value_parser(value_parser!(u64))
                        .help("Candidate id, chosen interactively when not given"),
                )
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Do not ask for confirmation"),
                ),
        )
        .subcommand(
            Command::new("open")
                .about("Decrypt a sealed message with an authority secret key")
                .arg(
                    Arg::new("secret")
                        .long("secret")
                        .required(true)
                        .help("Authority secret key, OpenPGP armored or RSA PEM"),
                )
                .arg(
                    Arg::new("INPUT")
                        .index(1)
                        .required(true)
                        .help("File holding the sealed message"),
                )
                .arg(
                    Arg::new("kind")
                        .long("as")
                        .value_parser(["identity", "ballot"])
                        .default_value("ballot")
                        .help("Which message the input holds"),
                ),
        )
        .subcommand(
            Command::new("receipt")
                .about("Check a vote receipt code")
                .arg(Arg::new("CODE").index(1).required(true)),
        )
        .get_matches();

    init_logging(matches.get_count("v"));

    let mut config = Config::from_env();
    if let Some(uri) = matches.get_one::<String>("uri") {
        config.uri = uri.trim_end_matches('/').to_owned();
    }
    if let Some(token) = matches.get_one::<String>("token") {
        config.token = Some(token.clone());
    }
    log::info!("URI: {}", config.uri);

    // Subcommands
    match matches.subcommand() {
        Some(("keygen", matches)) => command_keygen(matches),
        Some(("open", matches)) => command_open(matches),
        Some((name, matches)) => {
            let client = RestClient::new(&config).unwrap_or_else(|e| exit_with(name, e));
            run_remote(name, matches, client).await;
        }
        None => exit_with("help", "a subcommand is required"),
    }
}

async fn run_remote(name: &str, matches: &ArgMatches, client: RestClient) {
    match name {
        "login" => command_login(matches, client).await,
        "election" => command_election(matches, &client).await,
        "vote" => command_vote(matches, &client).await,
        "receipt" => command_receipt(matches, &client).await,
        _ => exit_with(name, "unknown command"),
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = Builder::new();
    builder.filter_level(level);
    builder.parse_default_env();
    builder.target(Target::Stderr);
    builder.init();
}

/// Expand `~` and environment variables in a user supplied path
pub fn expand(path: &str) -> String {
    shellexpand::full(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_owned())
}

/// Report an error the way every subcommand does, and exit
pub fn exit_with(command: &str, e: impl Display) -> ! {
    eprintln!("sealvote {}: {}", command, e);
    std::process::exit(1);
}
