use super::exit_with;
use sealvote::{ElectionService, RestClient};

pub async fn command_election(matches: &clap::ArgMatches, client: &RestClient) {
    // Unwrap is OK, ELECTION-ID is required
    let election_id = *matches.get_one::<u64>("ELECTION-ID").unwrap();

    let election = client
        .election(election_id)
        .await
        .unwrap_or_else(|e| exit_with("election", e));

    println!("{} (#{})", election.title, election.id);
    if !election.description.is_empty() {
        println!("{}", election.description);
    }
    println!("status: {:?}", election.status);

    match client.voter_status(election_id).await {
        Ok(status) if !status.is_assigned => println!("you are not assigned to this election"),
        Ok(status) if status.has_voted => println!("you have voted"),
        Ok(_) => println!("you have not voted yet"),
        Err(e) => log::warn!("unable to fetch voting status: {}", e),
    }

    let candidates = client
        .candidates(election_id)
        .await
        .unwrap_or_else(|e| exit_with("election", e));

    println!();
    if candidates.is_empty() {
        println!("no candidates");
    }
    for candidate in candidates {
        match &candidate.party {
            Some(party) => println!("  [{}] {} ({})", candidate.id, candidate.name, party),
            None => println!("  [{}] {}", candidate.id, candidate.name),
        }
    }
}
