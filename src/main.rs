// src/main.rs

use devpipe::errors::DevpipeError;
use devpipe::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("devpipe error: {err:?}");
        std::process::exit(2);
    }

    if let Err(err) = run(args).await {
        eprintln!("devpipe error: {err}");
        if let DevpipeError::Other(inner) = &err {
            for cause in inner.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
        }
        std::process::exit(err.exit_code());
    }
}
