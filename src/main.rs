use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracking_crawler::{
    batch::SearchBatch,
    captcha::AntiCaptchaSolver,
    config::Config,
    identity::IdentityManager,
    item::ResultStatus,
    portal::PortalFlow,
    request::SearchType,
    saver::FileSaver,
    session::Session,
    sink::JsonLinesSink,
    transport::HttpTransport,
};

/// Track a batch of MBL or booking numbers and print one JSON result per line.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON config file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma separated task ids, one per search number.
    #[arg(long)]
    task_ids: String,

    #[arg(long, conflicts_with = "booking_nos", required_unless_present = "booking_nos")]
    mbl_nos: Option<String>,

    #[arg(long)]
    booking_nos: Option<String>,

    /// Save every fetched page under this directory.
    #[arg(long)]
    save: Option<PathBuf>,
}

impl Args {
    fn search(&self) -> (SearchType, &str) {
        match (&self.mbl_nos, &self.booking_nos) {
            (Some(nos), _) => (SearchType::Mbl, nos),
            (None, Some(nos)) => (SearchType::Booking, nos),
            (None, None) => (SearchType::Mbl, ""),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "debug,html5ever=error,selectors=error,hyper=warn,reqwest=info".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if args.save.is_some() {
        config.save_dir = args.save.clone();
    }

    let (search_type, search_nos) = args.search();
    let batch = SearchBatch::from_lists(search_type, &args.task_ids, search_nos)?;
    let first_search_no = batch
        .current()
        .map(|t| t.search_no.clone())
        .unwrap_or_default();

    let identities = IdentityManager::from_config(config.proxy.as_ref(), config.proxy_policy);
    let transport = HttpTransport::new(config.user_agent.clone())?;
    let solver = Arc::new(AntiCaptchaSolver::new(config.captcha.clone()));
    let flow = PortalFlow::new(&config.portal, solver, config.session.max_captcha_retry);

    let mut session = Session::new(flow, transport, identities, batch, config.session.clone())
        .with_sink(JsonLinesSink::new(std::io::stdout()));
    if let Some(root) = &config.save_dir {
        let saver = FileSaver::new(root, "portal", &first_search_no);
        info!("Saving pages to {}", saver.dir().display());
        session = session.with_saver(saver);
    }

    let results = session.run().await;
    let failed = results
        .iter()
        .filter(|r| r.status != ResultStatus::Data)
        .count();
    info!("Done: {} tasks, {} without data", results.len(), failed);

    Ok(())
}
