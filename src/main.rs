#[tokio::main]
async fn main() -> std::process::ExitCode {
    match neoclaw::cli::run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("neoclaw: {:#}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
