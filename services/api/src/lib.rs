mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use ubs_scheduling::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
