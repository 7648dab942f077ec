use super::exit_with;
use sealvote::RestClient;
use std::io::{stdin, stdout, Write};

pub async fn command_login(matches: &clap::ArgMatches, mut client: RestClient) {
    // Unwrap is OK, USERNAME is required
    let username = matches.get_one::<String>("USERNAME").unwrap();

    let password = match matches.get_one::<String>("password") {
        Some(password) => password.clone(),
        None => {
            print!("Password: ");
            let _ = stdout().flush();
            let mut line = String::new();
            if let Err(e) = stdin().read_line(&mut line) {
                exit_with("login", e);
            }
            line.trim_end_matches(&['\r', '\n'][..]).to_owned()
        }
    };

    let login = client
        .login(username, &password)
        .await
        .unwrap_or_else(|e| exit_with("login", e));

    eprintln!("Logged in as {}", login.user.display_name());
    println!("export SEALVOTE_TOKEN={}", login.token);
}
