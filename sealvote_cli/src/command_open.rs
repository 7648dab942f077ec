use super::{exit_with, expand};
use sealvote::{open_ballot, open_identity, AuthorityKey};
use std::fs::read_to_string;

pub fn command_open(matches: &clap::ArgMatches) {
    // Unwraps are OK, all these args are required or defaulted
    let secret_location = expand(matches.get_one::<String>("secret").unwrap());
    let input = expand(matches.get_one::<String>("INPUT").unwrap());
    let kind = matches.get_one::<String>("kind").unwrap();

    let armored = read_to_string(&secret_location).unwrap_or_else(|e| {
        exit_with("open", format!("unable to read {}: {}", secret_location, e))
    });
    let key = AuthorityKey::from_armored(&armored).unwrap_or_else(|e| exit_with("open", e));

    let sealed = read_to_string(&input)
        .unwrap_or_else(|e| exit_with("open", format!("unable to read {}: {}", input, e)));

    let json = match kind.as_str() {
        "identity" => open_identity(&key, &sealed).map(|m| serde_json::to_string_pretty(&m)),
        _ => open_ballot(&key, &sealed).map(|m| serde_json::to_string_pretty(&m)),
    };

    match json {
        Ok(Ok(json)) => println!("{}", json),
        Ok(Err(e)) => exit_with("open", e),
        Err(e) => exit_with("open", e),
    }
}
