mod auth;
mod authz;
mod config;
mod context;
mod db;
mod handlers;
mod policy;
mod recycle;
mod request;
mod response;
mod restful;
mod routes;

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use config::ServerConfig;
use log::{error, info};
use portal_misc::config::ConfigArgs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Portal backend server")]
struct ServerArgs {
    /// Print server configuration data (JSON) and exit.
    #[arg(long)]
    pub print_config: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

async fn run(args: ServerArgs) -> Result<()> {
    let (cfg, _): (ServerConfig, _) = args.config.load("server")?;

    if args.print_config {
        let json = serde_json::to_string_pretty(&cfg).context("encode config json")?;
        println!("{json}");
        return Ok(());
    }

    cfg.logs.init("server")?;

    let ctx = cfg.build_ctx()?;

    let restful_server = cfg.build_restful_server(ctx.clone())?;

    tokio::spawn(async move {
        recycle::start_recycle(ctx).await;
    });

    restful_server.run().await.context("run restful server")?;

    info!("Server exited by user");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = ServerArgs::parse();
    match run(args).await {
        Ok(()) => {}
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}
