use clap::Parser;

#[derive(Parser)]
#[command(name = "novagate")]
pub(crate) struct Cli {
    #[arg(long, default_value = "")]
    pub(crate) dsn: String,
    #[arg(long, default_value = "")]
    pub(crate) data_dir: String,
    #[arg(long, default_value = "")]
    pub(crate) host: String,
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Path to the provider/alias/client-key config file.
    #[arg(long, default_value = "novagate.json")]
    pub(crate) config: String,
    #[arg(long)]
    pub(crate) proxy: Option<String>,
}
