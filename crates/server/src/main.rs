//! The main function for the Shelfmate server

#[allow(clippy::print_stderr, reason = "No other tracing loaded at this point")]
fn main() {
    match dotenvy::dotenv() {
        Ok(_) => shelfmate_server::run(),
        Err(err) if err.not_found() => shelfmate_server::run(),
        Err(err) => eprintln!("Failed to load environment variables! Error: {err}"),
    }
}
