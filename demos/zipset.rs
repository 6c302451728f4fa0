use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::*;
use log::*;
use memmap2::Mmap;
use structopt::*;

use zipset::*;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "zipset",
    about = "Patches a .zip file (or makes a new one) in a single pass",
    after_help = "Entry names reach into nested archives with !, e.g. lib/app.jar!META-INF/MANIFEST.MF"
)]
struct Opt {
    /// Pass multiple times for additional verbosity (info, debug, trace)
    #[structopt(short, long, parse(from_occurrences))]
    verbosity: usize,

    /// The archive to start from. Without one, the output has only what's added.
    #[structopt(short, long)]
    base: Option<PathBuf>,

    /// Adds a file or directory from disk, as NAME=PATH
    #[structopt(short, long, number_of_values = 1, parse(try_from_str = parse_addition))]
    add: Vec<(String, PathBuf)>,

    /// Adds an empty directory entry
    #[structopt(short, long = "mkdir", number_of_values = 1)]
    directory: Vec<String>,

    /// Leaves an entry out
    #[structopt(short, long, number_of_values = 1)]
    remove: Vec<String>,

    /// Stores new entries without compressing them.
    #[structopt(long)]
    store: bool,

    /// Prints the entries of the finished archive.
    #[structopt(short, long)]
    list: bool,

    #[structopt(name("output ZIP file"))]
    output: PathBuf,
}

fn parse_addition(arg: &str) -> Result<(String, PathBuf)> {
    let (name, path) = arg
        .split_once('=')
        .with_context(|| format!("Expected NAME=PATH, got {arg}"))?;
    Ok((name.to_owned(), PathBuf::from(path)))
}

fn main() -> Result<()> {
    let args = Opt::from_args();

    let mut errlog = stderrlog::new();
    errlog.verbosity(args.verbosity + 1);
    errlog.init()?;

    let mut zip = match &args.base {
        Some(base) => ZipSet::with_base(base),
        None => ZipSet::new(),
    };
    for (name, path) in &args.add {
        zip.add_path(name, path)
            .with_context(|| format!("Couldn't add {}", path.display()))?;
    }
    for name in &args.directory {
        zip.add_directory(name)
            .with_context(|| format!("Couldn't add directory {name}"))?;
    }
    for name in &args.remove {
        zip.remove(name)
            .with_context(|| format!("Couldn't remove {name}"))?;
    }

    let mut options = WriteOptions::default();
    if args.store {
        options.compression = CompressionMethod::None;
    }
    let out = File::create(&args.output)
        .with_context(|| format!("Couldn't create {}", args.output.display()))?;
    zip.build_with(std::io::BufWriter::new(out), &options)
        .context("Couldn't build archive")?
        .into_inner()
        .context("Couldn't flush archive")?;

    if args.list {
        list(&args.output)?;
    }
    Ok(())
}

fn list(zip_path: &Path) -> Result<()> {
    info!("Memory mapping {:#?}", zip_path);
    let zip_file = File::open(zip_path).context("Couldn't open zip file")?;
    let mapping = unsafe { Mmap::map(&zip_file).context("Couldn't mmap zip file")? };
    let archive = ZipArchive::new(&mapping).context("Couldn't load archive")?;
    for entry in archive.entries() {
        println!("{:>10}  {}", entry.size, entry.path);
    }
    Ok(())
}
