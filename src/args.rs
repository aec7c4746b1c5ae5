use clap::Parser;
use std::path::PathBuf;

/// Fetch one file over HTTP as parallel byte ranges.
///
/// The server is probed first to find how many concurrent connections it
/// accepts; the file is then split into that many segments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The URL of the file to download.
    #[arg(short, long)]
    pub url: String,

    /// Where to write the file.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Upper bound on concurrent connections (1-32). Defaults to the config value, then 4.
    #[arg(short = 't', long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub threads: Option<u8>,

    /// An optional SHA-256 hash to verify file integrity after download.
    #[arg(long)]
    pub verify_sha256: Option<String>,

    /// Extra TOML config file, layered over `segfetch.toml`.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_flags() {
        let args = Args::try_parse_from(["segfetch", "-u", "http://x/a", "-o", "a.bin"]).unwrap();
        assert_eq!(args.url, "http://x/a");
        assert_eq!(args.output, PathBuf::from("a.bin"));
        assert_eq!(args.threads, None);
    }

    #[test]
    fn missing_output_is_rejected() {
        assert!(Args::try_parse_from(["segfetch", "-u", "http://x/a"]).is_err());
    }

    #[test]
    fn thread_range_is_enforced() {
        let ok = Args::try_parse_from(["segfetch", "-u", "u", "-o", "o", "-t", "32"]).unwrap();
        assert_eq!(ok.threads, Some(32));
        assert!(Args::try_parse_from(["segfetch", "-u", "u", "-o", "o", "-t", "0"]).is_err());
        assert!(Args::try_parse_from(["segfetch", "-u", "u", "-o", "o", "-t", "33"]).is_err());
    }
}
