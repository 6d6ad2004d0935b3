//! Argument parsing and progress display shared by commands.

use indicatif::{ProgressBar, ProgressStyle};
use vtreader::coord::TileRange;
use vtreader::source::{ProgressCallback, ProgressEvent};

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

fn parse_list<T: std::str::FromStr>(value: &str, what: &str) -> Result<[T; 4], String> {
    let parts: Vec<T> = value
        .split(',')
        .map(|p| p.trim().parse::<T>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("expected four comma-separated {}, got '{}'", what, value))?;

    <[T; 4]>::try_from(parts)
        .map_err(|_| format!("expected four comma-separated {}, got '{}'", what, value))
}

/// Parses `W,S,E,N` in degrees.
pub fn parse_bbox(value: &str) -> Result<BBox, String> {
    let [west, south, east, north] = parse_list::<f64>(value, "numbers (W,S,E,N)")?;
    if south > north {
        return Err(format!("south ({}) is above north ({})", south, north));
    }
    Ok(BBox {
        west,
        south,
        east,
        north,
    })
}

/// Parses `C0,R0,C1,R1` tile corners.
pub fn parse_tile_range(value: &str) -> Result<TileRange, String> {
    let [c0, r0, c1, r1] = parse_list::<u32>(value, "tile numbers (C0,R0,C1,R1)")?;
    Ok(TileRange::from_corners((c0, r0), (c1, r1)))
}

/// Creates a progress bar and the source callback that drives it.
pub fn progress_bar() -> (ProgressBar, ProgressCallback) {
    let bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("##-"));
    }

    let handle = bar.clone();
    let callback: ProgressCallback = Box::new(move |event| match event {
        ProgressEvent::Started {
            message,
            max_progress,
        } => {
            handle.set_length(max_progress as u64);
            handle.set_position(0);
            handle.set_message(message);
        }
        ProgressEvent::Advanced { progress } => handle.set_position(progress as u64),
    });

    (bar, callback)
}
