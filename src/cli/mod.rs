pub mod commands;

use std::io::{self, Write};
use std::sync::Arc;

use uuid::Uuid;

use crate::agent::{TurnError, TurnOrchestrator, TurnRequest};
use crate::cli::commands::{Commands, SessionAction};
use crate::config::AppConfig;
use crate::db::{get_connection, service::DbService, ContentKind, MessageRole};

pub async fn run_cli(command: Commands, config_path: String) {
    let config = AppConfig::load(&config_path).expect("Failed to load config");

    match command {
        Commands::Serve => {
            panic!("Serve command should be intercepted by main.rs to boot actix-web");
        }
        Commands::Session { action } => {
            let pool = get_connection(&config.database).expect("DB error");
            let conn = pool.lock().unwrap();

            match action {
                SessionAction::Create { name } => {
                    match DbService::insert_session(&conn, Uuid::new_v4(), &name, None) {
                        Ok(session) => println!("Created Session: {} ({})", session.name, session.id),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                SessionAction::List => {
                    match DbService::list_sessions(&conn, 50, 0) {
                        Ok(sessions) => {
                            if sessions.is_empty() {
                                println!("No sessions found.");
                            } else {
                                println!("{:<38} | {:<20} | {}", "ID", "Created At", "Name");
                                println!("{:-<38}-+-{:-<20}-+-{:-<20}", "", "", "");
                                for s in sessions {
                                    println!("{:<38} | {:<20} | {}", s.id.to_string(), s.created_at, s.name);
                                }
                            }
                        }
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                SessionAction::Delete { id } => {
                    match DbService::delete_session(&conn, id) {
                        Ok(_) => println!("Deleted session {}", id),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                SessionAction::Export { id, path } => {
                    let session = match DbService::get_session(&conn, id) {
                        Ok(Some(s)) => s,
                        _ => { eprintln!("Session {} not found.", id); return; }
                    };
                    let messages = DbService::get_messages(&conn, id, config.chat.export_limit, 0)
                        .unwrap_or_default();

                    let export_path = path.unwrap_or_else(|| format!("session_{}.txt", id));
                    let mut file = std::fs::File::create(&export_path).expect("Failed to create file");

                    writeln!(file, "Session: {}", session.name).unwrap();
                    writeln!(file, "ID: {}", session.id).unwrap();
                    writeln!(file, "Created At: {}", session.created_at).unwrap();
                    writeln!(file, "---").unwrap();

                    for m in messages {
                        writeln!(file, "[{}] ({}): {}", m.role.as_str().to_uppercase(), m.kind, m.content).unwrap();
                        writeln!(file, "---").unwrap();
                    }

                    println!("Session exported successfully to: {}", export_path);
                }
            }
        }
        Commands::Chat { session, platform, tone, kind } => {
            run_repl(session, platform, tone, kind, config).await;
        }
    }
}

fn parse_kind(value: &str) -> ContentKind {
    match value {
        "text" => ContentKind::Text,
        "image" => ContentKind::Image,
        "video" => ContentKind::Video,
        _ => ContentKind::None,
    }
}

async fn run_repl(session: Option<Uuid>, platform: String, tone: String, kind: String, config: AppConfig) {
    let pool = get_connection(&config.database).expect("DB Error");
    let orchestrator = Arc::new(
        TurnOrchestrator::from_config(&config, pool).expect("Failed to init LLM provider from config"),
    );

    let session_id = session.unwrap_or_else(Uuid::new_v4);
    let content_kind = parse_kind(&kind);

    println!("--- Postsmith Content Chat ---");
    println!("Session: {}", session_id);
    println!("Platform: {} | Tone: {} | Kind: {}", platform, tone, content_kind);
    println!("Type /exit to quit.");
    println!("------------------------------");

    let mut last_seen_id: i64 = 0;

    loop {
        print!("\nUser> ");
        io::stdout().flush().unwrap();

        let mut input = String::new();
        io::stdin().read_line(&mut input).unwrap();
        let text = input.trim();

        if text.is_empty() { continue; }
        if text == "/exit" || text == "/quit" { break; }

        let request = TurnRequest {
            session_id,
            prompt: text.to_string(),
            platform: platform.clone(),
            content_kind,
            tone: tone.clone(),
            user_id: None,
        };

        match orchestrator.process_turn(request).await {
            Ok(view) => {
                let cutoff = last_seen_id;
                for message in view.messages.iter().filter(|m| m.id > cutoff) {
                    last_seen_id = message.id;
                    if message.role == MessageRole::Assistant {
                        println!("Postsmith [{}]> {}", message.kind, message.content);
                    }
                }
            }
            Err(TurnError::ContentUnavailable) => {
                println!("Postsmith> No usable content was produced, try a clearer prompt.");
            }
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}
