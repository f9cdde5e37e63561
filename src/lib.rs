pub mod client;
pub mod config;

use std::sync::Arc;

use self::{client::Client, config::Config};

/// In order to let the integration tests drive the peer through the
/// rtpchat crate, startup lives here rather than in the main function.
pub async fn startup(config: Arc<Config>) -> anyhow::Result<()> {
    let client = Client::new(config.channel.bind, config.channel.peer).await?;

    log::info!(
        "messaging channel ready: role={}, bind={}, peer={}",
        config.channel.role,
        config.channel.bind,
        config.channel.peer,
    );

    log::info!("local ssrc: 0x{:X}", client.ssrc());

    client.run().await
}
