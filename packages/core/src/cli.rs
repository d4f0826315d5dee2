use clap::Parser;

/// Toolroom custody tracker CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "toolroom-custody",
    version,
    about = "Custody, overdue and calibration tracking for toolroom assets"
)]
pub struct Cli {
    /// SQLite database URL (e.g. sqlite://toolroom.db?mode=rwc)
    #[arg(long)]
    pub database_url: Option<String>,

    /// HTTP API port
    #[arg(long)]
    pub port: Option<u16>,

    /// Overdue check interval in seconds
    #[arg(long)]
    pub overdue_interval: Option<u64>,

    /// Calibration check interval in seconds
    #[arg(long)]
    pub calibration_interval: Option<u64>,
}
