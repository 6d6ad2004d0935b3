//! Info command - show tile set metadata.

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the info command.
pub struct InfoArgs {
    pub source: String,
    pub debug: bool,
}

/// Run the info command.
pub fn run(args: InfoArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("info");

    let mut source = runner.open_source(&args.source, None)?;

    let show = |value: Option<String>| value.unwrap_or_else(|| "(not set)".to_string());

    println!("Source:     {}", source.source());
    println!("Name:       {}", source.name());
    println!("Scheme:     {}", source.scheme());
    println!("Min zoom:   {}", show(source.min_zoom().map(|z| z.to_string())));
    println!("Max zoom:   {}", show(source.max_zoom().map(|z| z.to_string())));
    println!("Mask level: {}", show(source.mask_level()));

    source.close();
    Ok(())
}
