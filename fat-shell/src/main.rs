mod block_file;
mod cli;
mod render;
mod shell;

use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use tinyfat::{FatFileSystem, Geometry};
use typed_bytesize::ByteSizeIec;

pub use self::{
    block_file::BlockFile,
    cli::{Cli, Command},
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let geometry = Geometry::new(cli.block_size, cli.blocks)?;
    let mut fs = open(&cli.image, geometry, cli.command == Command::Init)?;

    let mut out = io::stdout().lock();
    match cli.command {
        Command::Shell => shell::run(&mut fs, io::stdin().lock(), &mut out)?,
        // 打开镜像时已经格式化过了
        Command::Init => writeln!(out, "filesystem initialized")?,
        command => execute(&mut fs, command, &mut out)?,
    }

    Ok(())
}

/// 打开镜像；镜像不存在或要求格式化时新建一个。
fn open(image: &Path, geometry: Geometry, format: bool) -> Result<FatFileSystem, Box<dyn Error>> {
    let len = geometry.image_bytes() as u64;

    if format || !image.exists() {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(image)?;
        fd.set_len(len)?;
        log::info!("formatting {image:?}, {}", ByteSizeIec(len));

        let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));
        return Ok(FatFileSystem::format(block_dev, geometry)?);
    }

    let fd = OpenOptions::new().read(true).write(true).open(image)?;
    let actual = fd.metadata()?.len();
    if actual != len {
        return Err(format!(
            "{image:?} holds {} but the geometry needs {}",
            ByteSizeIec(actual),
            ByteSizeIec(len)
        )
        .into());
    }

    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));
    Ok(FatFileSystem::load(block_dev, geometry)?)
}

/// 执行一条命令，结果写到`out`。
pub(crate) fn execute(
    fs: &mut FatFileSystem,
    command: Command,
    out: &mut impl Write,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Init => {
            fs.init()?;
            writeln!(out, "filesystem initialized")?;
        }
        Command::Load => {
            fs.reload()?;
            writeln!(out, "filesystem loaded, {} free block(s)", fs.fat().free_count())?;
        }
        Command::Ls { path } => {
            let entries = fs.list_directory(&path)?;
            render::listing(out, &path, &entries)?;
        }
        Command::Mkdir { path } => {
            fs.mkdir(&path)?;
            writeln!(out, "created directory {path:?}")?;
        }
        Command::Create { path } => {
            fs.create(&path)?;
            writeln!(out, "created file {path:?}")?;
        }
        Command::Unlink { path, recursive } => {
            if recursive {
                fs.remove_all(&path)?;
            } else {
                fs.unlink(&path)?;
            }
            writeln!(out, "removed {path:?}")?;
        }
        Command::Write { data, rep, path } => {
            fs.overwrite(&path, data.as_bytes(), rep)?;
            writeln!(out, "wrote {path:?}")?;
        }
        Command::Append { data, rep, path } => {
            fs.append(&path, data.as_bytes(), rep)?;
            writeln!(out, "appended to {path:?}")?;
        }
        Command::Read { path } => {
            out.write_all(&fs.read(&path)?)?;
            writeln!(out)?;
        }
        Command::Stat { path } => {
            let stat = fs.stat(&path)?;
            render::stat(out, &path, &stat)?;
        }
        Command::Export { file } => {
            let records = fs.dump_allocation()?;
            let mut writer = BufWriter::new(File::create(&file)?);
            render::allocation(&mut writer, &records)?;
            writer.flush()?;
            writeln!(out, "allocation table exported to {file:?}")?;
        }
        Command::Check => {
            let report = fs.check()?;
            render::check_report(out, &report)?;
            if !report.is_clean() {
                return Err(format!("{} fault(s) found", report.blocks.len()).into());
            }
        }
        Command::Info => {
            let geometry = fs.geometry();
            let free = fs.fat().free_count();
            writeln!(
                out,
                "block size: {}\nblocks: {} ({} FAT, 1 root, {} data)\nfree: {} block(s), {}",
                ByteSizeIec(geometry.block_size() as u64),
                geometry.blocks(),
                geometry.fat_blocks(),
                geometry.blocks() - geometry.first_data(),
                free,
                ByteSizeIec((free * geometry.block_size()) as u64),
            )?;
        }
        Command::Shell => return Err("nested shell".into()),
    }

    Ok(())
}
