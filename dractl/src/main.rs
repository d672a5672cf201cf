use clap::Parser;
use dractl::commands::Cli;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    dractl::init_tracing("info");

    // Ensure rustls uses the aws-lc-rs provider explicitly so the kube
    // client never races a missing default provider.
    if let Err(e) = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    ) {
        tracing::debug!(
            ?e,
            "CryptoProvider already installed or incompatible; proceeding"
        );
    }

    let cli = Cli::parse();
    dractl::commands::run(cli).await
}
