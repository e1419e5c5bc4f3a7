//! MAGES. CLI - Command-line tool for MAGES. engine archive extraction and repacking.
//!
//! This is the main entry point for the `mages` command-line application.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use mages::compress::Compression;
use mages::prelude::*;

/// MAGES. - archive extraction and repacking tool
#[derive(Parser)]
#[command(name = "mages")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the extraction commands.
#[derive(Args)]
struct ExtractArgs {
    /// Output directory
    #[arg(short, long, env = "MAGES_OUTPUT")]
    output: PathBuf,

    /// Decode MZX/NXX payloads before writing
    #[arg(short, long)]
    decode: bool,

    /// MZX literals are stored without 0xFF inversion
    #[arg(long)]
    no_invert: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every entry of an HFA archive
    HfaExtract {
        /// Path to the HFA file
        input: PathBuf,

        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// List the descriptors of an MRG archive
    MrgInfo {
        /// Archive path; `.hed` and `.mrg` are derived from it
        archive: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Extract every entry of an MRG archive
    MrgExtract {
        /// Archive path; `.hed`, `.mrg` and `.nam` are derived from it
        archive: PathBuf,

        /// Name table to use instead of the archive's `.nam`
        #[arg(long)]
        names: Option<PathBuf>,

        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// Pack files into a new `.hed`/`.mrg` pair
    MrgPack {
        /// Output path; `.hed`, `.mrg` and `.nam` are derived from it
        #[arg(short, long)]
        output: PathBuf,

        /// Text file with one entry name per line; writes a `.nam`
        #[arg(long)]
        names: Option<PathBuf>,

        /// Files to pack, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Rebuild an MRG archive with some entries replaced
    MrgReplace {
        /// Source archive path; `.hed` and `.mrg` are derived from it
        archive: PathBuf,

        /// Output path; `.hed` and `.mrg` are derived from it
        #[arg(short, long)]
        output: PathBuf,

        /// Replacement as INDEX=FILE (repeatable)
        #[arg(short = 'i', long = "index", value_parser = parse_replacement, required = true)]
        replacements: Vec<(usize, PathBuf)>,
    },

    /// List the descriptors of an MZP archive
    MzpInfo {
        /// Path to the MZP file
        input: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Extract every entry of an MZP archive
    MzpExtract {
        /// Path to the MZP file
        input: PathBuf,

        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// Pack files into a new MZP archive
    MzpPack {
        /// Output MZP file
        #[arg(short, long)]
        output: PathBuf,

        /// Files to pack, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Print the names in a NAM file
    NamRead {
        /// Path to the NAM file
        input: PathBuf,

        /// Print JSON instead of one name per line
        #[arg(long)]
        json: bool,
    },

    /// Compress a file into an MZX stream
    MzxCompress {
        input: PathBuf,
        output: PathBuf,

        /// Store literals without 0xFF inversion
        #[arg(long)]
        no_invert: bool,

        /// Emit literal runs only
        #[arg(long)]
        literal_only: bool,
    },

    /// Decompress an MZX stream
    MzxDecompress {
        input: PathBuf,
        output: PathBuf,

        /// Literals are stored without 0xFF inversion
        #[arg(long)]
        no_invert: bool,
    },

    /// Compress a file into an NXGX block
    NxgxCompress {
        input: PathBuf,
        output: PathBuf,

        /// Deflate level
        #[arg(short, long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,
    },

    /// Decompress an NXGX or NXCX block
    NxxDecompress { input: PathBuf, output: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::HfaExtract { input, extract } => {
            cmd_hfa_extract(&input, &extract)?;
        }
        Commands::MrgInfo { archive, json } => {
            cmd_mrg_info(&archive, json)?;
        }
        Commands::MrgExtract {
            archive,
            names,
            extract,
        } => {
            cmd_mrg_extract(&archive, names.as_deref(), &extract)?;
        }
        Commands::MrgPack {
            output,
            names,
            inputs,
        } => {
            cmd_mrg_pack(&output, names.as_deref(), &inputs)?;
        }
        Commands::MrgReplace {
            archive,
            output,
            replacements,
        } => {
            cmd_mrg_replace(&archive, &output, replacements)?;
        }
        Commands::MzpInfo { input, json } => {
            cmd_mzp_info(&input, json)?;
        }
        Commands::MzpExtract { input, extract } => {
            cmd_mzp_extract(&input, &extract)?;
        }
        Commands::MzpPack { output, inputs } => {
            cmd_mzp_pack(&output, &inputs)?;
        }
        Commands::NamRead { input, json } => {
            cmd_nam_read(&input, json)?;
        }
        Commands::MzxCompress {
            input,
            output,
            no_invert,
            literal_only,
        } => {
            let options = MzxOptions {
                invert: !no_invert,
                strategy: if literal_only {
                    MzxStrategy::LiteralOnly
                } else {
                    MzxStrategy::Greedy
                },
            };
            transform(&input, &output, |data| Ok(mzx::compress(data, &options)?))?;
        }
        Commands::MzxDecompress {
            input,
            output,
            no_invert,
        } => {
            let options = MzxOptions::with_invert(!no_invert);
            transform(&input, &output, |data| Ok(mzx::decompress(data, &options)?))?;
        }
        Commands::NxgxCompress {
            input,
            output,
            level,
        } => {
            transform(&input, &output, |data| {
                Ok(nxx::compress_nxgx(data, Compression::new(level))?)
            })?;
        }
        Commands::NxxDecompress { input, output } => {
            transform(&input, &output, |data| Ok(nxx::decompress(data)?))?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_replacement(value: &str) -> std::result::Result<(usize, PathBuf), String> {
    let (index, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected INDEX=FILE, got '{value}'"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|e| format!("invalid index '{index}': {e}"))?;
    Ok((index, PathBuf::from(path)))
}

/// Path with its extension replaced, e.g. `script` -> `script.hed`.
fn sibling(base: &Path, extension: &str) -> PathBuf {
    base.with_extension(extension)
}

/// Make a stored entry name safe to use as a single path component.
fn file_stem(name: &str) -> String {
    name.replace(&['/', '\\'][..], "_")
}

/// Output file stem for an HFA entry.
///
/// The index keeps empty and duplicate names apart; the stored extension
/// stays visible.
fn hfa_output_name(index: usize, name: &str) -> String {
    format!("{index:05}_{}", file_stem(name).replace('.', "_"))
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Read a file, apply a codec, write the result.
fn transform<F>(input: &Path, output: &Path, codec: F) -> Result<()>
where
    F: FnOnce(&[u8]) -> Result<Vec<u8>>,
{
    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let start = Instant::now();
    let result = codec(&data).with_context(|| format!("Failed to process {}", input.display()))?;
    fs::write(output, &result).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} ({} bytes) -> {} ({} bytes) in {:?}",
        input.display(),
        data.len(),
        output.display(),
        result.len(),
        start.elapsed()
    );
    Ok(())
}

/// Write entries to `args.output` in parallel, optionally decoding them.
///
/// Entries that fail to decode are written as stored and reported.
fn extract_entries(entries: Vec<(String, ByteView)>, args: &ExtractArgs) -> Result<()> {
    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    println!("Extracting {} entries to {}...", entries.len(), args.output.display());

    let options = MzxOptions::with_invert(!args.no_invert);
    let pb = progress_bar(entries.len())?;
    let start = Instant::now();

    let failures: usize = entries
        .par_iter()
        .map(|(name, stored)| -> Result<usize> {
            let kind = PayloadKind::detect(stored);
            let (data, extension, failed) = if args.decode && kind.is_compressed() {
                match decode(stored, &options) {
                    Ok(data) => (data, "bin", 0),
                    Err(e) => {
                        warn!(entry = %name, error = %e, "failed to decode, writing stored bytes");
                        (Cow::Borrowed(stored.as_bytes()), kind.as_str(), 1)
                    }
                }
            } else {
                let extension = if kind.is_compressed() { kind.as_str() } else { "bin" };
                (Cow::Borrowed(stored.as_bytes()), extension, 0)
            };

            let path = args.output.join(name).with_extension(extension);
            fs::write(&path, &data).with_context(|| format!("Failed to write {}", path.display()))?;
            pb.inc(1);
            Ok(failed)
        })
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .sum();

    pb.finish_with_message("Done");
    println!("Extraction completed in {:?} ({} decode errors)", start.elapsed(), failures);
    Ok(())
}

fn cmd_hfa_extract(input: &Path, args: &ExtractArgs) -> Result<()> {
    let archive = HfaArchive::open(input).context("Failed to open HFA archive")?;

    let entries = archive
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            Ok((hfa_output_name(index, &entry.name), archive.entry_data(index)?))
        })
        .collect::<Result<Vec<_>>>()?;

    extract_entries(entries, args)
}

fn open_mrg(base: &Path) -> Result<MrgArchive> {
    let hed = sibling(base, "hed");
    let mrg = sibling(base, "mrg");
    MrgArchive::open(&hed, &mrg)
        .with_context(|| format!("Failed to open {} / {}", hed.display(), mrg.display()))
}

fn cmd_mrg_info(base: &Path, json: bool) -> Result<()> {
    let archive = open_mrg(base)?;

    if json {
        println!("{}", serde_json::to_string_pretty(archive.descriptors())?);
        return Ok(());
    }

    println!("{:>6} {:>10} {:>10} {:>12} {}", "index", "offset", "size", "uncompressed", "payload");
    for (index, desc) in archive.descriptors().iter().enumerate() {
        let kind = PayloadKind::detect(&archive.entry_data(index)?);
        println!(
            "{:>6} {:>#10x} {:>10} {:>12} {}{}",
            index,
            desc.offset(),
            desc.size(),
            desc.uncompressed_size(),
            kind,
            if desc.is_compressed() { " (compressed)" } else { "" }
        );
    }
    println!("\nTotal: {} entries", archive.len());
    Ok(())
}

fn cmd_mrg_extract(base: &Path, names: Option<&Path>, args: &ExtractArgs) -> Result<()> {
    let archive = open_mrg(base)?;

    let names_path = names.map(Path::to_path_buf).unwrap_or_else(|| sibling(base, "nam"));
    let names = if names_path.exists() {
        let data = fs::read(&names_path)
            .with_context(|| format!("Failed to read {}", names_path.display()))?;
        let table = NameTable::parse(&data).context("Failed to parse name table")?;
        if !table.matches(archive.len()) {
            warn!(
                names = table.len(),
                entries = archive.len(),
                "name table does not match the archive, using indices"
            );
            None
        } else {
            Some(table)
        }
    } else {
        None
    };

    let entries = (0..archive.len())
        .map(|index| {
            let name = match names.as_ref().and_then(|n| n.get(index)) {
                Some(name) => format!("{index:05}_{}", file_stem(name)),
                None => format!("{index:05}"),
            };
            Ok((name, archive.entry_data(index)?))
        })
        .collect::<Result<Vec<_>>>()?;

    extract_entries(entries, args)
}

fn read_inputs(inputs: &[PathBuf]) -> Result<Vec<Vec<u8>>> {
    inputs
        .iter()
        .map(|path| fs::read(path).with_context(|| format!("Failed to read {}", path.display())))
        .collect()
}

/// Parse a one-name-per-line list for a `.nam` file.
///
/// Empty records are dropped when a NAM is read back, so a blank line would
/// shift every following name onto the wrong entry.
fn name_list(text: &str) -> Result<NameTable> {
    if let Some(line) = text.lines().position(|name| name.trim().is_empty()) {
        bail!("Name list line {} is blank", line + 1);
    }
    Ok(text.lines().collect())
}

fn cmd_mrg_pack(base: &Path, names: Option<&Path>, inputs: &[PathBuf]) -> Result<()> {
    let entries: Vec<Entry> = read_inputs(inputs)?.into_iter().map(Entry::sniff).collect();
    let output = MrgArchive::build(&entries).context("Failed to pack MRG")?;

    fs::write(sibling(base, "hed"), &output.hed)?;
    fs::write(sibling(base, "mrg"), &output.mrg)?;

    if let Some(names) = names {
        let text = fs::read_to_string(names)
            .with_context(|| format!("Failed to read {}", names.display()))?;
        let table = name_list(&text)?;
        if !table.matches(entries.len()) {
            warn!(names = table.len(), entries = entries.len(), "name count differs from entry count");
        }
        fs::write(sibling(base, "nam"), table.to_bytes())?;
    }

    println!("Packed {} entries into {}", entries.len(), sibling(base, "mrg").display());
    Ok(())
}

fn cmd_mrg_replace(base: &Path, output: &Path, replacements: Vec<(usize, PathBuf)>) -> Result<()> {
    if sibling(output, "mrg") == sibling(base, "mrg") {
        bail!("Output would overwrite the source archive");
    }
    let archive = open_mrg(base)?;

    let replacements = replacements
        .into_iter()
        .map(|(index, path)| {
            let data =
                fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            Ok((index, Entry::sniff(data)))
        })
        .collect::<Result<Vec<_>>>()?;
    let count = replacements.len();

    let rebuilt = archive
        .rebuild_with(replacements)
        .context("Failed to rebuild MRG")?;
    fs::write(sibling(output, "hed"), &rebuilt.hed)?;
    fs::write(sibling(output, "mrg"), &rebuilt.mrg)?;

    println!("Replaced {} of {} entries", count, archive.len());
    Ok(())
}

fn cmd_mzp_info(input: &Path, json: bool) -> Result<()> {
    let archive = MzpArchive::open(input).context("Failed to open MZP archive")?;

    if json {
        println!("{}", serde_json::to_string_pretty(archive.descriptors())?);
        return Ok(());
    }

    println!("Data region starts at {:#x}", archive.data_start());
    println!("{:>6} {:>10} {:>10} {}", "index", "offset", "size", "payload");
    for (index, desc) in archive.descriptors().iter().enumerate() {
        let kind = PayloadKind::detect(&archive.entry_data(index)?);
        println!(
            "{:>6} {:>#10x} {:>10} {}",
            index,
            desc.data_offset_relative(),
            desc.entry_data_size(),
            kind
        );
    }
    for (a, b) in archive.overlaps() {
        println!("Entry {b} overlaps entry {a}");
    }
    println!("\nTotal: {} entries", archive.len());
    Ok(())
}

fn cmd_mzp_extract(input: &Path, args: &ExtractArgs) -> Result<()> {
    let archive = MzpArchive::open(input).context("Failed to open MZP archive")?;

    let entries = (0..archive.len())
        .map(|index| Ok((format!("{index:05}"), archive.entry_data(index)?)))
        .collect::<Result<Vec<_>>>()?;

    extract_entries(entries, args)
}

fn cmd_mzp_pack(output: &Path, inputs: &[PathBuf]) -> Result<()> {
    let entries = read_inputs(inputs)?;
    let bytes = MzpArchive::build(&entries).context("Failed to pack MZP")?;
    fs::write(output, bytes).with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Packed {} entries into {}", entries.len(), output.display());
    Ok(())
}

fn cmd_nam_read(input: &Path, json: bool) -> Result<()> {
    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let table = NameTable::parse(&data).context("Failed to parse name table")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        for name in table.iter() {
            println!("{name}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_replacement() {
        assert_eq!(
            parse_replacement("12=out/file.bin").unwrap(),
            (12, PathBuf::from("out/file.bin"))
        );
        assert!(parse_replacement("file.bin").is_err());
        assert!(parse_replacement("x=file.bin").is_err());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("bg/BG01.png"), "bg_BG01.png");
        assert_eq!(file_stem("a\\b"), "a_b");
    }

    #[test]
    fn test_hfa_output_names_stay_in_directory() {
        let out = Path::new("out");
        let names = ["", "", "dir/a.txt", "a.txt"];
        let paths: Vec<PathBuf> = names
            .iter()
            .enumerate()
            .map(|(i, name)| out.join(hfa_output_name(i, name)).with_extension("bin"))
            .collect();

        assert_eq!(paths[0], Path::new("out/00000_.bin"));
        assert_eq!(paths[2], Path::new("out/00002_dir_a_txt.bin"));
        for (i, path) in paths.iter().enumerate() {
            assert_eq!(path.parent(), Some(out));
            assert!(!paths[i + 1..].contains(path));
        }
    }

    #[test]
    fn test_name_list_rejects_blank_lines() {
        let table = name_list("BG01\nBG02\r\nBG03").unwrap();
        assert_eq!(table.names(), &["BG01", "BG02", "BG03"]);

        let err = name_list("BG01\n\nBG03").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(name_list("BG01\n   \n").is_err());
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["mages", "mrg-replace", "script", "-o", "new", "-i", "3=a.bin"])
            .unwrap();
        assert!(matches!(cli.command, Commands::MrgReplace { ref replacements, .. } if replacements.len() == 1));
    }
}
