//! Geometry command stream decoding.
//!
//! A feature's geometry is a sequence of command integers, each followed by
//! zig-zag encoded parameter pairs relative to a cursor that starts at the
//! tile origin and persists across commands.

use super::types::{GeomType, Geometry, Ring};

const CMD_MOVE_TO: u32 = 1;
const CMD_LINE_TO: u32 = 2;
const CMD_CLOSE_PATH: u32 = 7;

/// Orientation of the local y axis in decoded coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YAxis {
    /// y grows northward: the wire value is replaced by `extent - y`.
    #[default]
    Up,
    /// y grows southward, exactly as encoded on the wire.
    Down,
}

impl std::str::FromStr for YAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(YAxis::Up),
            "down" => Ok(YAxis::Down),
            other => Err(format!("unknown y axis orientation '{}'", other)),
        }
    }
}

#[inline]
fn zigzag(value: u32) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// A path segment as read from the command stream.
struct Part {
    coords: Ring<i64>,
    closed: bool,
}

fn read_parts(commands: &[u32]) -> Result<Vec<Part>, String> {
    let mut parts: Vec<Part> = Vec::new();
    let (mut x, mut y) = (0i64, 0i64);
    let mut i = 0;

    while i < commands.len() {
        let command = commands[i];
        let id = command & 0x7;
        let count = (command >> 3) as usize;
        i += 1;

        match id {
            CMD_MOVE_TO | CMD_LINE_TO => {
                let needed = count * 2;
                if commands.len() - i < needed {
                    return Err(format!(
                        "command {} at offset {} needs {} parameters, {} left",
                        id,
                        i - 1,
                        needed,
                        commands.len() - i
                    ));
                }

                for pair in commands[i..i + needed].chunks_exact(2) {
                    x += zigzag(pair[0]);
                    y += zigzag(pair[1]);
                    if !in_range(x) || !in_range(y) {
                        return Err(format!(
                            "coordinate ({}, {}) out of range at offset {}",
                            x, y, i
                        ));
                    }

                    if id == CMD_MOVE_TO {
                        parts.push(Part {
                            coords: vec![[x, y]],
                            closed: false,
                        });
                    } else {
                        match parts.last_mut() {
                            Some(part) => part.coords.push([x, y]),
                            None => return Err("LineTo before any MoveTo".to_string()),
                        }
                    }
                }
                i += needed;
            }
            CMD_CLOSE_PATH => {
                let part = parts
                    .last_mut()
                    .ok_or_else(|| "ClosePath before any MoveTo".to_string())?;
                if let Some(first) = part.coords.first().copied() {
                    part.coords.push(first);
                }
                part.closed = true;
            }
            other => return Err(format!("unknown command id {} at offset {}", other, i - 1)),
        }
    }

    Ok(parts)
}

/// Cursor positions must stay within 32-bit tile coordinates.
#[inline]
fn in_range(value: i64) -> bool {
    (i64::from(i32::MIN)..=i64::from(i32::MAX)).contains(&value)
}

/// Twice the signed area of a ring, in wire orientation (y down).
///
/// Exterior rings are positive, holes negative.
fn signed_area(ring: &[[i64; 2]]) -> i128 {
    ring.windows(2)
        .map(|w| {
            i128::from(w[0][0]) * i128::from(w[1][1]) - i128::from(w[1][0]) * i128::from(w[0][1])
        })
        .sum()
}

fn group_polygons(parts: Vec<Part>) -> Vec<Vec<Ring<i64>>> {
    let mut polygons: Vec<Vec<Ring<i64>>> = Vec::new();

    for part in parts {
        let area = signed_area(&part.coords);
        if area == 0 {
            continue;
        }
        match polygons.last_mut() {
            Some(rings) if area < 0 => rings.push(part.coords),
            // A hole with nothing to attach to is promoted to an exterior
            _ => polygons.push(vec![part.coords]),
        }
    }

    polygons
}

/// Decodes a feature's command stream into a coordinate tree.
///
/// Polygon rings are closed and grouped by winding order; local y is flipped
/// when `y_axis` is [`YAxis::Up`].
pub fn decode_geometry(
    geom_type: GeomType,
    commands: &[u32],
    extent: u32,
    y_axis: YAxis,
) -> Result<Geometry<i64>, String> {
    let parts = read_parts(commands)?;

    let geometry = match geom_type {
        GeomType::Point => Geometry::Point(parts.into_iter().flat_map(|p| p.coords).collect()),
        GeomType::LineString => Geometry::LineString(
            parts
                .into_iter()
                .filter(|p| p.coords.len() >= 2)
                .map(|p| p.coords)
                .collect(),
        ),
        GeomType::Polygon => {
            if let Some(open) = parts.iter().position(|p| !p.closed) {
                return Err(format!("polygon ring {} is not closed", open));
            }
            Geometry::Polygon(group_polygons(parts))
        }
    };

    Ok(match y_axis {
        YAxis::Down => geometry,
        YAxis::Up => {
            let extent = extent as i64;
            geometry.map_coords(|[x, y]| [x, extent - y])
        }
    })
}
