use anyhow::Result;
use std::sync::Arc;

use edutrack_live::api::HttpBackend;
use edutrack_live::engine::DashboardSession;
use edutrack_live::feed::transport::WsConnector;
use edutrack_live::state::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let backend = Arc::new(HttpBackend::new(&cfg)?);
    let session = DashboardSession::start(&cfg, backend, Arc::new(WsConnector))?;

    let rendered = session.render_until(tokio::signal::ctrl_c()).await;
    session.stop().await;
    rendered.map(|_| ())
}
