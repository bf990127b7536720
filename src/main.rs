use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match boxlens::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
