use clap::Parser;

use crate::utils::version;

/// Scripted catalog walkthrough driving the navigation core end to end
#[derive(Parser, Debug)]
#[command(author, version = version(), about)]
pub struct Cli {
    /// Lower bound the filter screen hands back
    #[arg(long, value_name = "PRICE", default_value_t = 10)]
    pub min_price: u32,

    /// Upper bound the filter screen hands back
    #[arg(long, value_name = "PRICE", default_value_t = 50)]
    pub max_price: u32,

    /// How long intents stay queued before the surface attaches
    #[arg(long, value_name = "MILLIS", default_value_t = 100)]
    pub attach_delay_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["navigator"]);
        assert_eq!((cli.min_price, cli.max_price, cli.attach_delay_ms), (10, 50, 100));
    }

    #[test]
    fn test_price_flags() {
        let cli = Cli::parse_from(["navigator", "--min-price", "5", "--max-price", "500"]);
        assert_eq!((cli.min_price, cli.max_price), (5, 500));
    }
}
