use std::io::{self, Write};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::{self, Credentials};
use crate::cli::{Config, Mode, Output};
use crate::export::export_json;
use crate::fetch::{fetch, oldest_first};
use crate::filter::{build_highlight, QueryFilter};
use crate::log::LogStore;
use crate::rest::{self, RestStore};
use crate::stats;
use crate::tail;
use crate::ui::{self, Palette};

/// Application runtime: authenticates, then runs the selected mode.
pub async fn run(config: Config) -> Result<()> {
    let password = match &config.password {
        Some(p) => p.expose().to_string(),
        None => ui::prompt_password("Password: ")?,
    };
    let credentials = Credentials {
        email: config.email.clone(),
        password,
    };

    let client = rest::http_client(rest::REQUEST_TIMEOUT).context("failed to build HTTP client")?;

    eprint!("🔐 Authenticating...");
    let session = match auth::authenticate(&client, &config.endpoint, &credentials).await {
        Ok(session) => {
            eprintln!(" ✅\n");
            session
        }
        Err(e) => {
            eprintln!(" ❌");
            return Err(e).context("authentication failed");
        }
    };

    let store = RestStore::new(client, config.endpoint.clone(), &session)?;
    let palette = Palette::detect(config.no_color);

    match config.mode {
        Mode::Stats => run_stats(&store, &config, palette).await,
        Mode::Tail => run_tail(&store, &config, palette).await,
        Mode::Fetch => run_fetch(&store, &config, palette).await,
    }
}

/// Start of a window reaching `hours` back from `now`.
fn window_start(now: DateTime<Utc>, hours: u32) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(Duration::hours(i64::from(hours)))
        .ok_or_else(|| anyhow!("a window of {hours} hours reaches before the earliest representable time"))
}

fn query_filter(config: &Config) -> Result<QueryFilter> {
    let f = &config.filters;
    let since = window_start(Utc::now(), f.hours)?;
    Ok(QueryFilter {
        level: f.level,
        module: f.module.clone(),
        user: f.user.clone(),
        search: f.search.clone(),
        ..QueryFilter::since(since, f.limit)
    })
}

async fn run_fetch<S: LogStore>(store: &S, config: &Config, palette: Palette) -> Result<()> {
    let filter = query_filter(config)?;

    eprint!("📥 Fetching logs...");
    // A failed fetch is reported and treated as an empty result.
    let records = match fetch(store, &filter).await {
        Ok(records) => {
            eprintln!(" ✅ ({} logs)\n", records.len());
            records
        }
        Err(e) => {
            eprintln!(" ❌\n❌ Failed to fetch logs: {e}");
            Vec::new()
        }
    };

    let mut out = io::stdout().lock();
    match &config.output {
        Output::Export(path) => {
            let count = export_json(&records, path)?;
            eprintln!("✅ Exported {count} logs to {}", path.display());
        }
        Output::Json => {
            serde_json::to_writer_pretty(&mut out, &records)?;
            writeln!(out)?;
        }
        Output::Plain => {
            let re = build_highlight(filter.search.as_deref())?;
            ui::write_snapshot(
                &mut out,
                &oldest_first(records),
                config.filters.hours,
                palette,
                re.as_ref(),
            )?;
        }
    }
    Ok(())
}

async fn run_tail<S: LogStore>(store: &S, config: &Config, palette: Palette) -> Result<()> {
    let filter = query_filter(config)?;
    let re = build_highlight(filter.search.as_deref())?;
    let json = config.output == Output::Json;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
        }
        on_interrupt.cancel();
    });

    eprintln!("📡 Following logs (Ctrl+C to stop)...\n");
    let mut out = io::stdout();
    let mut write_failed = None;
    tail::follow(store, &filter, &config.tail, Utc::now(), &cancel, |record| {
        let line = if json {
            serde_json::to_string(record).map_err(io::Error::from)
        } else {
            Ok(ui::format_record(record, palette, re.as_ref()))
        };
        if let Err(e) = emit_line(&mut out, line) {
            // stdout is gone (e.g. closed pipe); nothing more to show.
            if write_failed.is_none() {
                write_failed = Some(e);
            }
            cancel.cancel();
        }
    })
    .await;

    if let Some(e) = write_failed {
        return Err(e).context("failed to write to stdout");
    }
    eprintln!("\n👋 Stopped tailing logs");
    Ok(())
}

fn emit_line<W: Write>(out: &mut W, line: io::Result<String>) -> io::Result<()> {
    writeln!(out, "{}", line?)?;
    out.flush()
}

async fn run_stats<S: LogStore>(store: &S, config: &Config, palette: Palette) -> Result<()> {
    let hours = config.filters.hours;
    let since = window_start(Utc::now(), hours)?;
    let summary = stats::collect(store, since, hours).await;

    let mut out = io::stdout().lock();
    if config.output == Output::Json {
        serde_json::to_writer_pretty(&mut out, &summary)?;
        writeln!(out)?;
    } else {
        ui::write_stats(&mut out, &summary, palette)?;
    }
    Ok(())
}
