use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shift_appointments::config::Settings;
use shift_appointments::directory::StaffDirectory;
use shift_appointments::display::{print_roster, write_roster_to_file};
use shift_appointments::schedule::SchedulingService;
use shift_appointments::store::csv_file::load_appointments;
use shift_appointments::web::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shift_appointments=info,actix_web=info")),
        )
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "web" {
        let port = match args.get(2) {
            Some(p) => p.parse::<u16>().with_context(|| format!("invalid port {p:?}"))?,
            None => settings.port,
        };
        let store = settings.open_store().context("failed to open appointment store")?;
        let state = AppState {
            service: SchedulingService::new(Arc::new(store)),
            directory: StaffDirectory::with_default_staff(),
        };

        info!(
            port,
            store = ?settings.store,
            "access the API at http://localhost:{}/api/schedules",
            port
        );
        web::start_server(port, state).await?;
        return Ok(());
    }

    if args.len() > 1 && args[1] != "roster" {
        anyhow::bail!("usage: shift-appointments [web [port] | roster [csv-path] [out-file]]");
    }

    // Roster mode: print every stored shift grouped by day
    let csv_path = args
        .get(2)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| settings.schedules_csv.clone());

    info!(path = %csv_path.display(), "loading appointments");
    let mut appointments: Vec<_> = load_appointments(&csv_path)
        .with_context(|| format!("failed to load {}", csv_path.display()))?
        .into_values()
        .collect();
    appointments.sort_by(|a, b| (a.date, &a.id).cmp(&(b.date, &b.id)));

    let directory = StaffDirectory::with_default_staff();
    let resolver = settings.resolver();
    print_roster(&appointments, &directory, &resolver);
    if let Some(out_path) = args.get(3) {
        write_roster_to_file(out_path, &appointments, &directory, &resolver)
            .with_context(|| format!("failed to write {out_path}"))?;
        println!("Roster saved to {}", out_path);
    }

    Ok(())
}
