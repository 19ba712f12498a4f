//! Terminal rendering: record lines, the snapshot listing, the stats table and
//! the password prompt.

use std::io::{self, BufRead, Write};

use anyhow::bail;
use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::{Color, Stylize};
use crossterm::terminal;
use crossterm::tty::IsTty;
use regex::Regex;

use crate::log::{Level, LogRecord};
use crate::stats::StatsSummary;

const RULE_WIDE: usize = 80;
const RULE_STATS: usize = 60;
const BAR_WIDTH: usize = 30;

/// Colour choices, decided once at startup and passed to every renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub enabled: bool,
}

impl Palette {
    pub const PLAIN: Palette = Palette { enabled: false };

    /// Colour unless disabled by flag or `NO_COLOR`, or stdout is not a terminal.
    pub fn detect(no_color: bool) -> Self {
        if no_color || std::env::var_os("NO_COLOR").is_some() {
            return Self::PLAIN;
        }
        Self { enabled: io::stdout().is_tty() }
    }

    fn level_color(level: Level) -> Color {
        match level {
            Level::Debug => Color::DarkGrey,
            Level::Info => Color::Cyan,
            Level::Warn => Color::Yellow,
            Level::Error => Color::Red,
            Level::Fatal => Color::Magenta,
        }
    }

    fn level(&self, level: Level, text: &str) -> String {
        if self.enabled {
            text.with(Self::level_color(level)).to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.enabled { text.dim().to_string() } else { text.to_string() }
    }

    fn bold(&self, text: &str) -> String {
        if self.enabled { text.bold().to_string() } else { text.to_string() }
    }

    fn matched(&self, text: &str) -> String {
        if self.enabled {
            text.yellow().bold().to_string()
        } else {
            text.to_string()
        }
    }
}

/// Truncate to `width` characters, then pad to `width`.
fn column(text: &str, width: usize) -> String {
    let cut: String = text.chars().take(width).collect();
    format!("{cut:<width$}")
}

fn user_label(user: Option<&str>) -> &str {
    user.and_then(|u| u.split('@').next())
        .filter(|u| !u.is_empty())
        .unwrap_or("unknown")
}

fn highlight(text: &str, re: Option<&Regex>, palette: Palette) -> String {
    let Some(re) = re else {
        return text.to_string();
    };
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in re.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        out.push_str(&palette.matched(m.as_str()));
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// `LEVEL [YYYY-MM-DD HH:MM:SS] [module    ] [user    ] message`
pub fn format_record(record: &LogRecord, palette: Palette, re: Option<&Regex>) -> String {
    let ts = record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
    let level = format!("{:<5}", record.level.label());
    let module = record.module.as_deref().filter(|m| !m.is_empty()).unwrap_or("system");

    format!(
        "{} {} [{}] [{}] {}",
        palette.level(record.level, &level),
        palette.dim(&format!("[{ts}]")),
        column(module, 10),
        column(user_label(record.user.as_deref()), 8),
        highlight(&record.message, re, palette),
    )
}

/// Snapshot listing, `records` already in display order.
pub fn write_snapshot<W: Write>(
    out: &mut W,
    records: &[LogRecord],
    hours: u32,
    palette: Palette,
    re: Option<&Regex>,
) -> io::Result<()> {
    if records.is_empty() {
        return writeln!(out, "No logs found matching your criteria");
    }
    writeln!(out, "{}", "=".repeat(RULE_WIDE))?;
    for record in records {
        writeln!(out, "{}", format_record(record, palette, re))?;
    }
    writeln!(out, "{}", "=".repeat(RULE_WIDE))?;
    writeln!(out)?;
    writeln!(out, "Displayed {} logs from the last {hours} hours", records.len())
}

fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn write_stats<W: Write>(out: &mut W, stats: &StatsSummary, palette: Palette) -> io::Result<()> {
    let rule = "=".repeat(RULE_STATS);
    writeln!(out)?;
    writeln!(out, "{rule}")?;
    writeln!(out, "{}", palette.bold("📊 Log Statistics"))?;
    writeln!(out, "{rule}")?;
    writeln!(out, "Time Range:          Last {} hours", stats.hours)?;
    writeln!(out, "Total Logs:          {}", thousands(stats.total))?;
    writeln!(
        out,
        "Unique Users:        {}{}",
        stats.unique_users,
        if stats.unique_users_capped { "+ (sampled)" } else { "" }
    )?;
    writeln!(out, "Error Rate:          {:.1}%", stats.error_rate)?;
    writeln!(out, "Unresolved Crashes:  {}", stats.unresolved_crashes)?;
    writeln!(out)?;
    writeln!(out, "Log Levels:")?;

    let max = stats.level_counts.values().copied().max().unwrap_or(0);
    for (level, count) in &stats.level_counts {
        let width = if max > 0 {
            (*count as f64 / max as f64 * BAR_WIDTH as f64) as usize
        } else {
            0
        };
        writeln!(
            out,
            "  {}: {} {}",
            palette.level(*level, &format!("{:<5}", level.as_str())),
            "█".repeat(width),
            thousands(*count)
        )?;
    }

    if !stats.unavailable.is_empty() {
        writeln!(out)?;
        writeln!(out, "Unavailable:         {}", stats.unavailable.join(", "))?;
    }
    writeln!(out, "{rule}")?;
    writeln!(out)
}

/// Read a secret without echo. Falls back to a plain line when stdin is piped.
pub fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    let mut err = io::stderr();
    write!(err, "{prompt}")?;
    err.flush()?;

    if !io::stdin().is_tty() {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    terminal::enable_raw_mode()?;
    let secret = read_secret();
    terminal::disable_raw_mode()?;
    writeln!(err)?;
    secret
}

fn read_secret() -> anyhow::Result<String> {
    let mut secret = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(secret),
            KeyCode::Backspace => {
                secret.pop();
            }
            KeyCode::Esc => bail!("password entry cancelled"),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                bail!("password entry cancelled")
            }
            KeyCode::Char(c) => secret.push(c),
            _ => {}
        }
    }
}
