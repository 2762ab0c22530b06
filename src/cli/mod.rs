use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "gemini-relay")]
#[command(author, version, about = "Streams Gemini chat replies over HTTP", long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,

    /// Answer with a local scripted provider instead of calling Gemini
    #[arg(long)]
    pub mock_provider: bool,

    /// Bind host, overriding HOST
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port, overriding PORT
    #[arg(short, long)]
    pub port: Option<u16>,
}
