use super::exit_with;
use sealvote::{ElectionService, RestClient};

pub async fn command_receipt(matches: &clap::ArgMatches, client: &RestClient) {
    // Unwrap is OK, CODE is required
    let code = matches.get_one::<String>("CODE").unwrap();

    let check = client
        .verify_receipt(code.trim())
        .await
        .unwrap_or_else(|e| exit_with("receipt", e));

    if !check.valid {
        exit_with(
            "receipt",
            check.message.as_deref().unwrap_or("receipt not found"),
        );
    }

    println!("receipt is valid");
    if let Some(election) = &check.election {
        println!("election: {}", election);
    }
    if let Some(submitted_at) = &check.submitted_at {
        println!("submitted: {}", submitted_at.to_rfc3339());
    }
    if let Some(status) = &check.status {
        println!("status: {}", status);
    }
}
