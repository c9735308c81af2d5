use super::Context;
use anyhow::Result;
use polyview_core::session::{NoUrlSource, Repair, SessionMode, SessionStore};
use polyview_core::store::{KeyValueStore, keys};
use std::fmt::Write as _;
use tracing::info;

pub fn list(ctx: &Context, json: bool) -> Result<()> {
    let store = ctx.open_store()?;
    if json {
        let raw = store.get(keys::SESSIONS).unwrap_or_else(|| "[]".to_string());
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            Err(_) => println!("{raw}"),
        }
        return Ok(());
    }
    let (sessions, report) = ctx.load_sessions(store);
    if !report.is_clean() {
        println!(
            "(stored state needs {} repair(s); run `polyview sessions repair`)",
            report.repairs.len()
        );
    }
    print!("{}", format_sessions(&sessions));
    Ok(())
}

pub fn repair(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let (mut sessions, report) = ctx.load_sessions(store);
    if report.is_clean() {
        println!("Nothing to repair");
        return Ok(());
    }
    for repair in &report.repairs {
        println!("- {}", describe_repair(repair));
    }
    sessions.save(&NoUrlSource)?;
    info!(repairs = report.repairs.len(), "Repaired session state written");
    println!("Repaired state written");
    Ok(())
}

pub fn trim_history(ctx: &Context, keep: Option<usize>) -> Result<()> {
    let floor = keep.unwrap_or(ctx.config.retention_floor);
    let store = ctx.open_store()?;
    let before = store.usage();
    let (mut sessions, _) = ctx.load_sessions(store.clone());
    let trimmed = sessions.trim_histories(floor);
    sessions.save(&NoUrlSource)?;
    println!(
        "Trimmed {trimmed} histories to {floor} entries ({before} -> {} bytes)",
        store.usage()
    );
    Ok(())
}

/// One line per session; the current one is marked with `*`.
pub fn format_sessions(sessions: &SessionStore) -> String {
    let current = sessions.current_session_id();
    let mut out = String::new();
    for session in sessions.sessions() {
        let marker = if Some(&session.id) == current { '*' } else { ' ' };
        let mode = match session.mode {
            SessionMode::Unset => "unset",
            SessionMode::Interactive => "interactive",
            SessionMode::DirectCall => "direct-call",
        };
        let services: Vec<&str> = session
            .selected_services
            .iter()
            .map(|s| s.as_str())
            .collect();
        let _ = writeln!(
            out,
            "{marker} #{:<3} {:<24} {:<12} [{}] messages={} id={}",
            session.session_number,
            session.display_name(),
            mode,
            services.join(", "),
            session.history_len(),
            session.id
        );
    }
    out
}

fn describe_repair(repair: &Repair) -> String {
    match repair {
        Repair::DiscardedUnreadableSessions => "discarded unreadable session list".to_string(),
        Repair::SynthesizedDefaultSession { id } => format!("created default session {id}"),
        Repair::AssignedSessionNumber { id, number } => {
            format!("assigned session number {number} to {id}")
        }
        Repair::ResetCurrentSession { from, to } => format!(
            "current session {} -> {to}",
            from.as_deref().unwrap_or("(none)")
        ),
        Repair::ResetSessionCounter { value } => format!("session counter reset to {value}"),
    }
}
