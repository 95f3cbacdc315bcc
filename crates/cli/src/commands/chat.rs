//! `schoolpilot chat`: interactive or single-message chat mode.

use schoolpilot_agent::Advisor;
use schoolpilot_core::session::SessionId;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    super::require_api_key(&config)?;

    let provider = schoolpilot_providers::provider_from_config(&config)?;
    let advisor = Advisor::from_config(&config, provider)?;
    let session_id = session.map_or_else(SessionId::new, |s| SessionId::from(&s));

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let response = advisor.respond(&session_id, &msg).await;
        eprint!("\r              \r");
        println!("{}", response?);
        return Ok(());
    }

    println!();
    println!("  SchoolPilot: interactive mode");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Session:   {session_id}");
    println!();
    println!("  Type your question and press Enter.");
    println!("  '/reset' starts over, 'exit' or Ctrl+C quits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "exit" | "quit" => break,
            "/reset" => {
                advisor.reset(&session_id).await;
                println!("  [history cleared]");
                println!();
                continue;
            }
            _ => {}
        }

        match advisor.respond(&session_id, input).await {
            Ok(response) => {
                println!("Assistant: {response}");
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
