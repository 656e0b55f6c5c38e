//! fsprobe: drive corefs against a real system/save directory pair
//!
//! ```text
//! fsprobe --system ./system --save ./saves --vfs-version 3 scan
//! fsprobe --system ./system cat tos.img > /tmp/tos.img
//! fsprobe --save ./saves put slot0.sav ./state.bin
//! ```

mod logger;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use corefs::{CoreFs, CoreFsConfig, LocalHost};

#[derive(Parser)]
#[command(name = "fsprobe", version, about = "Inspect a system/save directory through corefs")]
struct Args {
    /// System directory (boot firmware and extensions)
    #[arg(long)]
    system: Option<PathBuf>,

    /// Save directory
    #[arg(long)]
    save: Option<PathBuf>,

    /// Offer the bundled file-services interface at this version
    #[arg(long)]
    vfs_version: Option<u32>,

    /// Never negotiate the file-services interface
    #[arg(long)]
    native_only: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the asset catalog found under the system directory
    Scan,
    /// Copy a system file (or save file with --save-area) to stdout
    Cat {
        name: String,
        #[arg(long)]
        save_area: bool,
    },
    /// Store a local file in the save directory
    Put { name: String, from: PathBuf },
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// Show metadata for a path
    Stat { path: String },
}

fn session(args: &Args) -> CoreFs {
    let mut host = LocalHost::new();
    if let Some(dir) = &args.system {
        host = host.with_system_dir(dir.to_string_lossy());
    }
    if let Some(dir) = &args.save {
        host = host.with_save_dir(dir.to_string_lossy());
    }
    if let Some(version) = args.vfs_version {
        host = host.with_vfs(version);
    }

    let mut config = CoreFsConfig::default();
    if args.native_only {
        config = config.native_only();
    }

    let mut cfs = CoreFs::new(Box::new(host), config);
    cfs.set_environment();
    cfs
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_logger(logger::level_for(args.verbose));

    let mut cfs = session(&args);
    println!("# backend: {} ({:?})", cfs.backend_kind(), cfs.capability());

    match &args.command {
        Command::Scan => {
            let catalog = cfs.catalog();
            println!("system: {}", cfs.roots().system());
            for entry in catalog.files() {
                println!("file  {}", entry.label);
            }
            for entry in catalog.dirs() {
                println!("dir   {}", entry.label);
            }
            println!("{} files, {} directories", catalog.file_count(), catalog.dir_count());
        }
        Command::Cat { name, save_area } => {
            let read = if *save_area {
                cfs.read_save_file(name)
            } else {
                cfs.read_system_file(name)
            };
            let data = read.with_context(|| format!("reading {}", name))?;
            std::io::stdout().lock().write_all(&data)?;
        }
        Command::Put { name, from } => {
            if args.save.is_none() {
                bail!("put needs --save");
            }
            let data = std::fs::read(from).with_context(|| format!("reading {:?}", from))?;
            cfs.write_save_file(name, &data)
                .with_context(|| format!("writing save file {}", name))?;
            println!("wrote {} bytes to {}{}", data.len(), cfs.ensure_save_root(), name);
        }
        Command::Ls { path } => {
            let mut dir = cfs
                .opendir(path)
                .with_context(|| format!("cannot open directory '{}'", path))?;
            while let Some(entry) = cfs.readdir(&mut dir) {
                let kind = match entry.is_dir() {
                    Some(true) => 'd',
                    Some(false) => '-',
                    None => '?',
                };
                println!("{} {}", kind, entry.name());
            }
            cfs.closedir(dir)?;
        }
        Command::Stat { path } => {
            let meta = cfs.stat(path).with_context(|| format!("stat {}", path))?;
            let features = cfs.features();
            println!("size:     {}", meta.size);
            println!("mode:     {:o}", meta.mode.bits());
            println!("dir:      {}", meta.is_dir());
            if features.timestamps {
                println!("modified: {}", meta.modified);
                println!("accessed: {}", meta.accessed);
            } else {
                println!("modified: (not reported by {})", cfs.backend_kind());
            }
            if !features.permissions {
                println!("note:     permission bits assumed");
            }
        }
    }
    Ok(())
}
