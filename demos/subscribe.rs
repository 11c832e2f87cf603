use std::net::IpAddr;
use std::time::Duration;

use clap::Parser;

use gpsd_session::{
    client::{Session, SessionConfig, WatchOptions},
    protocol::v3::{Report, ReportClass},
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    addr: IpAddr,
    #[arg(short, long, default_value = "2947")]
    port: u16,
    /// Seconds to wait before dialing again after losing gpsd
    #[arg(short, long, default_value = "1")]
    reconnect: u64,
    /// Also ask gpsd for PPS reports
    #[arg(long)]
    pps: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gpsd_session=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = SessionConfig {
        reconnect_delay: Duration::from_secs(args.reconnect),
        watch: WatchOptions::json().pps(args.pps),
        ..SessionConfig::with_address(format!("{}:{}", args.addr, args.port))
    };

    let mut session = Session::connect_with(config).await?;
    println!("GPSD Version: {}", session.version_sync().await?);

    session.subscribe(ReportClass::Tpv, |report| {
        if let Report::Tpv(tpv) = report {
            if let (Some(lat), Some(lon)) = (tpv.lat, tpv.lon) {
                println!("Current position: lat {lat:6.3}, lon {lon:6.3}");
            }
        }
    });
    session.subscribe(ReportClass::Sky, |report| {
        if let Report::Sky(sky) = report {
            let used = sky.satellites.iter().filter(|sat| sat.used).count();
            println!(
                "Satellites in view: {}, used: {used}",
                sky.satellites.len()
            );
        }
    });
    if args.pps {
        session.subscribe(ReportClass::Pps, |report| {
            if let Report::Pps(pps) = report {
                println!("PPS: {pps:?}");
            }
        });
    }
    session.subscribe_all(|report| {
        tracing::trace!(class = %report.class(), "report delivered");
    });

    let handle = session.start();
    tokio::signal::ctrl_c().await?;

    let metrics = handle.metrics();
    handle.close().await?;
    println!(
        "Read {} records, delivered {} reports, reconnected {} times",
        metrics.lines_read, metrics.reports_delivered, metrics.reconnects
    );
    Ok(())
}
