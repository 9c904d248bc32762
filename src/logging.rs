use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "info";

/// Builds the level filter from a `RUST_LOG` style directive.
/// Falls back to `info` when the directive is missing or does not parse.
pub fn parse_filter(directive: Option<&str>) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Installs the process wide diagnostics sink: `tracing` events go to stderr so the
/// report files only ever contain report lines. Call once, before the pipeline runs.
pub fn setup_logging() -> anyhow::Result<()> {
    let directive = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = parse_filter(directive.as_deref());

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_defaults_to_info() {
        assert_eq!(parse_filter(None).to_string(), "info");
    }

    #[test]
    fn test_parse_filter_uses_directive() {
        assert_eq!(parse_filter(Some("debug")).to_string(), "debug");
    }
}
