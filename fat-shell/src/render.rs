//! 给人看的文本输出

use std::io::{self, Write};

use tinyfat::{BlockRecord, BlockState, CheckReport};
use vfs::{DirEntry, DirEntryType, Stat};

pub fn listing(out: &mut impl Write, path: &str, entries: &[DirEntry]) -> io::Result<()> {
    writeln!(out, "{path}:")?;
    for entry in entries {
        let kind = match entry.ty {
            DirEntryType::Regular => "file",
            DirEntryType::Directory => "dir",
        };
        writeln!(out, "{}\t{kind}\t{} bytes", entry.name, entry.size)?;
    }
    Ok(())
}

pub fn stat(out: &mut impl Write, path: &str, stat: &Stat) -> io::Result<()> {
    let blocks = format!("{} block(s) of {} bytes", stat.blocks, stat.block_size);
    if stat.is_dir() {
        writeln!(out, "{path}: directory, {blocks}")
    } else {
        writeln!(
            out,
            "{path}: file, {} of {} bytes used, {blocks}",
            stat.size,
            stat.allocated()
        )
    }
}

/// FAT转储，每块一行
pub fn allocation(out: &mut impl Write, records: &[BlockRecord]) -> io::Result<()> {
    writeln!(out, "=== File Allocation Table ===")?;
    for record in records {
        let id = record.id;
        let owner = record
            .owner
            .as_deref()
            .map(|owner| format!(" ({owner})"))
            .unwrap_or_default();

        match record.state {
            BlockState::Reserved => writeln!(out, "block {id}: reserved for FAT [0x7ffe]")?,
            BlockState::Root => writeln!(out, "block {id}: root directory [0x7fff]")?,
            BlockState::Free => writeln!(out, "block {id}: free [0x0000]")?,
            BlockState::Terminal => writeln!(out, "block {id}: end of chain{owner} [0x7fff]")?,
            BlockState::Next(next) => writeln!(
                out,
                "block {id}: allocated{owner}, next block {next} [{:#06x}]",
                next.raw()
            )?,
            BlockState::Unknown(raw) => writeln!(out, "block {id}: unknown state [{raw:#06x}]")?,
        }
    }
    Ok(())
}

pub fn check_report(out: &mut impl Write, report: &CheckReport) -> io::Result<()> {
    if report.is_clean() {
        return writeln!(out, "no faults found");
    }

    for (id, fault) in &report.blocks {
        writeln!(out, "block {id}: {fault:?}")?;
    }
    writeln!(out, "{} fault(s): {:?}", report.blocks.len(), report.faults)
}
