use std::sync::Arc;

use tracing::{error, info};
use web_unblocker::logging::init_logging;
use web_unblocker::middleware::MiddlewareRegistry;
use web_unblocker::router::{Fallthrough, Unblocker};
use web_unblocker::server::{self, LandingPage, ServerListener};
use web_unblocker::settings::Settings;

#[tokio::main]
async fn main() {
    let settings = match Settings::load().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("설정 로드 실패: {}", e);
            std::process::exit(1);
        }
    };

    let _guard = init_logging(&settings.logging);

    if let Err(e) = run(settings).await {
        error!(error = %e, "서버 실행 실패");
        std::process::exit(1);
    }
}

async fn run(settings: Settings) -> server::Result<()> {
    let config = settings
        .unblocker
        .into_config()
        .expand(&MiddlewareRegistry::standard())?;

    info!(
        prefix = %config.prefix(),
        request = ?config.request_pipeline().names(),
        response = ?config.response_pipeline().names(),
        "프록시 설정 완료"
    );

    let landing: Arc<dyn Fallthrough> = Arc::new(LandingPage::new(config.prefix()));
    let unblocker = Arc::new(Unblocker::with_default_transport(config));

    let listener = ServerListener::bind(&settings.server).await?;
    listener.run(unblocker, landing).await
}
