use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use writeup_chat::cli::{image_mime, Args};
use writeup_chat::store::image_data_url;
use writeup_chat::{ChatError, ChatSession, PlaceholderKind, SessionState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut session = ChatSession::new(&args.endpoint);
    session.composer.set_text(&args.message);
    session.composer.set_cursor(session.composer.text().len());

    for path in &args.code_files {
        let snippet = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read code file {}: {}", path.display(), e))?;
        session.composer.attach(PlaceholderKind::Code, snippet);
    }
    for path in &args.image_files {
        let bytes = std::fs::read(path)
            .map_err(|e| format!("cannot read image file {}: {}", path.display(), e))?;
        session
            .composer
            .attach(PlaceholderKind::Img, image_data_url(image_mime(path), &bytes));
    }

    if args.previews {
        for preview in session.composer.previews() {
            let summary: String = preview.content.chars().take(60).collect();
            println!(
                "{} {} {}",
                preview.token.bright_yellow(),
                format!("({})", preview.kind).bright_blue(),
                summary
            );
        }
    }

    println!("{} {}", "you:".bright_green().bold(), session.composer.text());
    println!("{}", "bot:".bright_cyan().bold());

    match session.send().await {
        Ok(()) => {}
        Err(ChatError::EmptyMessage) => {
            eprintln!("{}", "Please enter a message.".bright_red());
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    }
    println!();

    // Failures are already rendered into the transcript; reflect them in the
    // exit code for scripting.
    if session.state() == SessionState::Failed {
        std::process::exit(1);
    }
    Ok(())
}
