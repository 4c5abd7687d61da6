use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	jobradar_worker::run(jobradar_worker::Args::parse()).await
}
