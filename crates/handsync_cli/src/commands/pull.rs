//! Pull command implementation.

use super::Connection;
use handsync_engine::PullReport;
use handsync_protocol::ItemKind;

/// Runs the pull command.
pub fn run(
    connection: &Connection,
    kind: ItemKind,
    mark_done: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = connection.start(kind)?;
    let report = session.pull_changes()?;
    if mark_done {
        session.mark_done()?;
    }
    session.terminate()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text_output(&report),
    }

    Ok(())
}

fn print_text_output(report: &PullReport) {
    println!(
        "{} ({} sync)",
        report.kind,
        if report.slow_sync { "slow" } else { "fast" }
    );
    println!(
        "  New: {}  Modified: {}  Deleted: {}",
        report.ids.new.ids.len(),
        report.ids.modified.ids.len(),
        report.deleted().len()
    );

    for item in &report.items {
        let id = item
            .sync_id()
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        println!("  [{id:>8}] {}", item.title().unwrap_or("(untitled)"));
    }
    for id in report.deleted() {
        println!("  [{id:>8}] deleted");
    }
}
