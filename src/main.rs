use log::{error, info};

#[rocket::main]
async fn main() {
    // Set up logging.
    if let Err(err) = log4rs::init_file("log4rs.yaml", Default::default()) {
        eprintln!("Failed to initialise logging: {err}");
        std::process::exit(1);
    }
    info!("Initialised logging");

    // Launch server. The scheduler starts at liftoff and stops on shutdown.
    info!("Configuring server...");
    if let Err(err) = ballotbox_backend::build().launch().await {
        error!("{err}");
        error!("Critical failure, shutting down");
        std::process::exit(1)
    }
}
