use envconfig::Envconfig;
use kube::Client;
use oprc_scc::{config::SccConfig, init_tracing, runtime};
use tracing::info;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    if let Err(e) = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    ) {
        tracing::debug!(
            ?e,
            "CryptoProvider already installed or incompatible; proceeding"
        );
    }

    let cfg = SccConfig::init_from_env()?;
    info!(
        config = %cfg.config_document(),
        claim = %cfg.cluster_claim_name,
        "Starting SCC values controller"
    );

    let client = Client::try_default().await?;
    runtime::run_all(client, cfg).await
}
