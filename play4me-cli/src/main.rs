mod cli;

fn main() {
    // Must run before any other thread exists.
    let utc_offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("Unable to start runtime: {error}");
            std::process::exit(1);
        }
    };

    if let Err(error) = runtime.block_on(cli::run(utc_offset)) {
        cli::error_exit(error);
    }
}
