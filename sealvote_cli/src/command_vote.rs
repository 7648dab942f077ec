use super::exit_with;
use sealvote::{CandidateId, RestClient, VoteFlow, VoterSession};
use std::io::{stdin, stdout, Write};

pub async fn command_vote(matches: &clap::ArgMatches, client: &RestClient) {
    // Unwrap is OK, ELECTION-ID is required
    let election_id = *matches.get_one::<u64>("ELECTION-ID").unwrap();
    let yes = matches.get_flag("yes");
    let mut preset = matches.get_one::<u64>("candidate").copied();

    let session = VoterSession::current(client)
        .await
        .unwrap_or_else(|e| exit_with("vote", e));
    let flow = VoteFlow::open(client, session, election_id)
        .await
        .unwrap_or_else(|e| exit_with("vote", e));

    if flow.candidates().is_empty() {
        exit_with("vote", "this election has no candidates");
    }
    println!("{}", flow.election().title);

    loop {
        let candidate_id = match preset.take() {
            Some(id) => {
                flow.select(id).unwrap_or_else(|e| exit_with("vote", e));
                id
            }
            None => prompt_candidate(&flow),
        };

        let state = flow.proceed().unwrap_or_else(|e| exit_with("vote", e));
        let name = state
            .candidate()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| candidate_id.to_string());

        println!();
        println!("You are about to vote for {}.", name);
        println!("Your vote is final and cannot be changed once submitted.");
        if yes || ask("Submit this vote? [y/N] ") {
            break;
        }
        flow.cancel().unwrap_or_else(|e| exit_with("vote", e));
    }

    match flow.confirm().await {
        Ok(receipt) => {
            if !receipt.message.is_empty() {
                println!("{}", receipt.message);
            }
            println!("receipt: {}", receipt.receipt_code);
        }
        Err(e) => exit_with("vote", e),
    }
}

fn prompt_candidate(flow: &VoteFlow<'_, RestClient>) -> CandidateId {
    let selected = flow.state().candidate().map(|c| c.id);

    loop {
        println!();
        for candidate in flow.candidates() {
            let marker = if Some(candidate.id) == selected { "*" } else { " " };
            match &candidate.party {
                Some(party) => println!(" {}[{}] {} ({})", marker, candidate.id, candidate.name, party),
                None => println!(" {}[{}] {}", marker, candidate.id, candidate.name),
            }
        }

        let line = read_line("Candidate id: ");
        let line = line.trim();
        if line.is_empty() {
            match selected {
                Some(id) => return id,
                None => exit_with("vote", "no candidate selected"),
            }
        }

        let id = match line.parse::<CandidateId>() {
            Ok(id) => id,
            Err(_) => {
                eprintln!("{} is not a candidate id", line);
                continue;
            }
        };
        match flow.select(id) {
            Ok(_) => return id,
            Err(e) => eprintln!("{}", e),
        }
    }
}

fn ask(question: &str) -> bool {
    let answer = read_line(question);
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = stdout().flush();

    let mut line = String::new();
    match stdin().read_line(&mut line) {
        Ok(0) => exit_with("vote", "aborted"),
        Ok(_) => line,
        Err(e) => exit_with("vote", e),
    }
}
