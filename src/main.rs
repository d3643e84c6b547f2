use docker_tag_pinner::cli::{Args, Runner};
use docker_tag_pinner::logging::{Logger, init_tracing};
use std::process;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();
    init_tracing(args.verbose);

    let logger = Logger::new(args.verbose);
    let runner = match Runner::new(args) {
        Ok(runner) => runner,
        Err(e) => {
            logger.error(&e.to_string());
            process::exit(1);
        }
    };

    if let Err(e) = runner.run().await {
        logger.error(&e.to_string());
        process::exit(1);
    }
}
