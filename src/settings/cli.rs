use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "tokengate", about = "Token issuance, refresh and revocation service")]
pub struct Cli {
    /// Settings file; defaults to settings/dev.toml (debug) or settings/release.toml.
    #[arg(long)]
    pub settings: Option<String>,

    /// Listen address, overriding `http.address`.
    #[arg(long)]
    pub address: Option<String>,
}
