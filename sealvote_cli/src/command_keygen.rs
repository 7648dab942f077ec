use super::{exit_with, expand};
use sealvote::{AuthorityKeypair, DEFAULT_KEY_BITS};

pub fn command_keygen(matches: &clap::ArgMatches) {
    // Unwrap is OK, keysize has a default
    let keysize = *matches.get_one::<usize>("keysize").unwrap();
    if keysize < DEFAULT_KEY_BITS {
        eprintln!("sealvote: WARNING: Using insecure keysize {}", keysize)
    }

    let keypair = AuthorityKeypair::generate(keysize).unwrap_or_else(|e| exit_with("keygen", e));
    let secret = keypair.secret_pem().unwrap_or_else(|e| exit_with("keygen", e));
    let public = keypair.public_pem().unwrap_or_else(|e| exit_with("keygen", e));

    match matches.get_one::<String>("secret") {
        Some(path) => write_key(&expand(path), &secret),
        None => print!("{}", secret),
    }
    match matches.get_one::<String>("public") {
        Some(path) => write_key(&expand(path), &public),
        None => print!("{}", public),
    }
}

fn write_key(path: &str, pem: &str) {
    if let Err(e) = std::fs::write(path, pem) {
        exit_with("keygen", format!("unable to write {}: {}", path, e));
    }
    log::info!("wrote {}", path);
}
