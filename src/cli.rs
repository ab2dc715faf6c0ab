use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "writeup-chat")]
#[command(version = "0.3.0")]
#[command(about = "Terminal client for a write-up chat service with inline image/code placeholders")]
pub struct Args {
    /// Message text; one placeholder token is appended per attachment
    pub message: String,

    /// URL of the generate endpoint
    #[arg(long, default_value = "http://localhost:3131/generate")]
    pub endpoint: String,

    /// Attach a code snippet read from a file (inserts a [[codeN]] token)
    #[arg(long = "code", value_name = "FILE")]
    pub code_files: Vec<PathBuf>,

    /// Attach an image read from a file (inserts an [[imgN]] token)
    #[arg(long = "image", value_name = "FILE")]
    pub image_files: Vec<PathBuf>,

    /// Print the placeholder previews before sending
    #[arg(long, short)]
    pub previews: bool,
}

/// Guess the data-URL mime type from a file extension. Unknown extensions
/// fall back to a generic binary type; the server never inspects it.
pub fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}
