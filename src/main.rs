// src/main.rs

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = shrun::cli::parse();
    if let Err(err) = shrun::logging::init_logging(args.log_level) {
        eprintln!("unable to initialise logging: {}", err);
    }

    match shrun::run(args).await {
        Ok(code) => ExitCode::from(code.clamp(0, u8::MAX as i32) as u8),
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::from(1)
        }
    }
}
