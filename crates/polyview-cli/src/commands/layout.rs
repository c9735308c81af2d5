use super::Context;
use anyhow::Result;
use polyview_core::layout::{LayoutRecord, LayoutRecords, Topology};
use polyview_core::preferences::Preferences;
use std::fmt::Write as _;

pub fn show(ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let active = Preferences::new(store.clone()).layout_mode();
    let records = LayoutRecords::new(store);
    println!("active topology: {active}");
    print!("{}", format_records(&records));
    Ok(())
}

pub fn reset(ctx: &Context, topology: Topology) -> Result<()> {
    let store = ctx.open_store()?;
    LayoutRecords::new(store).clear(topology);
    println!("Cleared {topology} layout record");
    Ok(())
}

pub fn format_records(records: &LayoutRecords) -> String {
    let mut out = String::new();
    for topology in Topology::ALL {
        let _ = match records.load(topology) {
            None => writeln!(out, "{topology}: (equal distribution)"),
            Some(LayoutRecord::Linear(weights)) => {
                let parts: Vec<String> = weights
                    .iter()
                    .map(|(service, weight)| format!("{service}={weight:.3}"))
                    .collect();
                writeln!(out, "{topology}: {}", parts.join(" "))
            }
            Some(LayoutRecord::Grid(sizes)) => writeln!(
                out,
                "{topology}: columns={:?} rows={:?}",
                sizes.column_sizes, sizes.row_sizes
            ),
        };
    }
    out
}
