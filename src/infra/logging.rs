use tracing_subscriber::{EnvFilter, fmt};

/// Install the stderr subscriber; `RUST_LOG` wins at default verbosity
///
/// Safe to call more than once (later calls are no-ops).
pub fn init(
    verbose: u8,
    quiet: bool,
)
{
    let filter = if quiet
    {
        EnvFilter::new("error")
    }
    else
    {
        match verbose
        {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
