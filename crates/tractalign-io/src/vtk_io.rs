//! Legacy VTK polydata reader and writer for fiber geometry.
//!
//! Fibers are stored as `LINES` cells over a shared `POINTS` array. The
//! reader accepts ASCII and big-endian BINARY files, the classic
//! `LINES n size` cell layout and the `OFFSETS`/`CONNECTIVITY` layout of
//! VTK 5. Vertex, polygon and strip cells are skipped, and parsing stops at
//! the first attribute section (`POINT_DATA`, `CELL_DATA`, `FIELD`).

use anyhow::{anyhow, bail, ensure, Context, Result};
use std::fmt::Write as _;
use std::path::Path;
use tractalign_core::{Fiber, FiberSet};

/// Payload encoding of a legacy VTK file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VtkEncoding {
    #[default]
    Ascii,
    Binary,
}

/// Read fibers from a legacy VTK polydata file.
pub fn read_fiber_geometry<P: AsRef<Path>>(path: P) -> Result<FiberSet> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read fiber file {}", path.display()))?;
    let fibers = parse_polydata(&bytes).with_context(|| format!("Invalid VTK polydata in {}", path.display()))?;
    tracing::debug!("Read {} fibers ({} points) from {}", fibers.len(), fibers.num_points(), path.display());
    Ok(fibers)
}

/// Write fibers as a legacy VTK polydata file.
pub fn write_fiber_geometry<P: AsRef<Path>>(fibers: &FiberSet, path: P, encoding: VtkEncoding) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, encode_polydata(fibers, encoding))
        .with_context(|| format!("Failed to write fiber file {}", path.display()))?;
    tracing::debug!("Wrote {} fibers to {}", fibers.len(), path.display());
    Ok(())
}

/// Parse an in-memory legacy VTK polydata file.
pub fn parse_polydata(bytes: &[u8]) -> Result<FiberSet> {
    let mut cursor = Cursor::new(bytes);

    let version = cursor.read_line().ok_or_else(|| anyhow!("Empty file"))?;
    ensure!(version.starts_with("# vtk DataFile"), "Missing VTK header line");
    cursor.read_line().ok_or_else(|| anyhow!("Missing title line"))?;
    let encoding = match cursor.next_token() {
        Some(t) if t.eq_ignore_ascii_case("ascii") => VtkEncoding::Ascii,
        Some(t) if t.eq_ignore_ascii_case("binary") => VtkEncoding::Binary,
        other => bail!("Expected ASCII or BINARY, found {:?}", other),
    };
    ensure!(cursor.next_token() == Some("DATASET"), "Missing DATASET keyword");
    match cursor.next_token() {
        Some(t) if t.eq_ignore_ascii_case("polydata") => {}
        other => bail!("Unsupported dataset type {:?}", other),
    }

    let mut points: Option<Vec<f32>> = None;
    let mut lines: Vec<Vec<usize>> = Vec::new();

    while let Some(keyword) = cursor.next_token() {
        match keyword.to_ascii_uppercase().as_str() {
            "POINTS" => {
                let n = cursor.parse_token::<usize>("point count")?;
                let dtype = cursor.next_token().ok_or_else(|| anyhow!("Missing POINTS data type"))?;
                cursor.finish_line();
                let len = n.checked_mul(3).ok_or_else(|| anyhow!("Point count {} too large", n))?;
                points = Some(read_reals(&mut cursor, encoding, len, dtype)?);
            }
            "LINES" => lines = read_cells(&mut cursor, encoding)?,
            "VERTICES" | "POLYGONS" | "TRIANGLE_STRIPS" => {
                read_cells(&mut cursor, encoding)?;
            }
            "METADATA" => cursor.skip_block(),
            "POINT_DATA" | "CELL_DATA" | "FIELD" => break,
            other => bail!("Unexpected keyword '{}'", other),
        }
    }

    let points = points.unwrap_or_default();
    let num_points = points.len() / 3;
    lines
        .iter()
        .map(|cell| {
            let coords = cell
                .iter()
                .map(|&id| {
                    ensure!(id < num_points, "Point index {} out of range ({} points)", id, num_points);
                    Ok([points[3 * id], points[3 * id + 1], points[3 * id + 2]])
                })
                .collect::<Result<Vec<[f32; 3]>>>()?;
            Ok(Fiber::from_coords(&coords))
        })
        .collect::<Result<Vec<Fiber>>>()
        .map(FiberSet::new)
}

/// Encode fibers as a classic-layout legacy VTK file.
pub fn encode_polydata(fibers: &FiberSet, encoding: VtkEncoding) -> Vec<u8> {
    let num_points = fibers.num_points();
    let cell_size = fibers.len() + num_points;
    let mut header = String::new();
    header.push_str("# vtk DataFile Version 3.0\n");
    header.push_str("tractalign fibers\n");
    header.push_str(match encoding {
        VtkEncoding::Ascii => "ASCII\n",
        VtkEncoding::Binary => "BINARY\n",
    });
    header.push_str("DATASET POLYDATA\n");
    let _ = writeln!(header, "POINTS {} float", num_points);

    let mut out = header.into_bytes();
    match encoding {
        VtkEncoding::Ascii => {
            let mut text = String::new();
            for p in fibers.iter().flat_map(|f| f.points()) {
                let _ = writeln!(text, "{} {} {}", p.x, p.y, p.z);
            }
            let _ = writeln!(text, "LINES {} {}", fibers.len(), cell_size);
            let mut next = 0usize;
            for fiber in fibers {
                let ids: Vec<String> = (next..next + fiber.num_points()).map(|i| i.to_string()).collect();
                let _ = writeln!(text, "{} {}", fiber.num_points(), ids.join(" "));
                next += fiber.num_points();
            }
            out.extend_from_slice(text.as_bytes());
        }
        VtkEncoding::Binary => {
            for p in fibers.iter().flat_map(|f| f.points()) {
                for c in [p.x, p.y, p.z] {
                    out.extend_from_slice(&c.to_be_bytes());
                }
            }
            out.extend_from_slice(format!("\nLINES {} {}\n", fibers.len(), cell_size).as_bytes());
            let mut next = 0i32;
            for fiber in fibers {
                out.extend_from_slice(&(fiber.num_points() as i32).to_be_bytes());
                for _ in 0..fiber.num_points() {
                    out.extend_from_slice(&next.to_be_bytes());
                    next += 1;
                }
            }
            out.push(b'\n');
        }
    }
    out
}

/// Read one cell section; the keyword has already been consumed.
fn read_cells(cursor: &mut Cursor<'_>, encoding: VtkEncoding) -> Result<Vec<Vec<usize>>> {
    let count = cursor.parse_token::<usize>("cell count")?;
    let size = cursor.parse_token::<usize>("cell list size")?;
    cursor.finish_line();

    let modern = match encoding {
        VtkEncoding::Ascii => cursor.peek_token() == Some("OFFSETS"),
        VtkEncoding::Binary => cursor.starts_with(b"OFFSETS"),
    };

    if modern {
        // `count` offsets (cells + 1) and `size` connectivity entries
        cursor.next_token();
        let dtype = cursor.next_token().ok_or_else(|| anyhow!("Missing OFFSETS data type"))?;
        cursor.finish_line();
        let offsets = read_integers(cursor, encoding, count, dtype)?;
        ensure!(cursor.next_token() == Some("CONNECTIVITY"), "Missing CONNECTIVITY after OFFSETS");
        let dtype = cursor.next_token().ok_or_else(|| anyhow!("Missing CONNECTIVITY data type"))?;
        cursor.finish_line();
        let connectivity = read_integers(cursor, encoding, size, dtype)?;

        offsets
            .windows(2)
            .map(|w| {
                ensure!(w[0] <= w[1] && w[1] <= connectivity.len(), "Invalid cell offsets {}..{}", w[0], w[1]);
                Ok(connectivity[w[0]..w[1]].to_vec())
            })
            .collect()
    } else {
        let flat = read_integers(cursor, encoding, size, "int")?;
        let mut cells = Vec::new();
        let mut pos = 0;
        for _ in 0..count {
            let n = *flat.get(pos).ok_or_else(|| anyhow!("Cell list ends early"))?;
            let end = n.checked_add(pos + 1).filter(|&end| end <= flat.len());
            let end = end.ok_or_else(|| anyhow!("Cell with {} points overruns the cell list", n))?;
            cells.push(flat[pos + 1..end].to_vec());
            pos = end;
        }
        Ok(cells)
    }
}

fn read_reals(cursor: &mut Cursor<'_>, encoding: VtkEncoding, count: usize, dtype: &str) -> Result<Vec<f32>> {
    match encoding {
        VtkEncoding::Ascii => (0..count).map(|_| cursor.parse_token::<f32>("coordinate")).collect(),
        VtkEncoding::Binary => match dtype {
            "float" => Ok(cursor
                .take_elements(count, 4)?
                .chunks_exact(4)
                .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                .collect()),
            "double" => Ok(cursor
                .take_elements(count, 8)?
                .chunks_exact(8)
                .map(|c| f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32)
                .collect()),
            other => bail!("Unsupported POINTS data type '{}'", other),
        },
    }
}

fn read_integers(cursor: &mut Cursor<'_>, encoding: VtkEncoding, count: usize, dtype: &str) -> Result<Vec<usize>> {
    let values: Vec<i64> = match encoding {
        VtkEncoding::Ascii => (0..count)
            .map(|_| cursor.parse_token::<i64>("index"))
            .collect::<Result<_>>()?,
        VtkEncoding::Binary => match dtype {
            "int" | "vtktypeint32" => cursor
                .take_elements(count, 4)?
                .chunks_exact(4)
                .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as i64)
                .collect(),
            "vtktypeint64" => cursor
                .take_elements(count, 8)?
                .chunks_exact(8)
                .map(|c| i64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
            other => bail!("Unsupported index data type '{}'", other),
        },
    };
    values
        .into_iter()
        .map(|v| usize::try_from(v).map_err(|_| anyhow!("Negative index {}", v)))
        .collect()
}

/// Byte cursor over a mixed text/binary file.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_line(&mut self) -> Option<&'a str> {
        if self.pos >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        self.pos += (end + 1).min(rest.len());
        std::str::from_utf8(&rest[..end]).ok().map(|s| s.trim_end_matches('\r'))
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn token_end(&self, start: usize) -> usize {
        self.data[start..]
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .map_or(self.data.len(), |n| start + n)
    }

    fn peek_token(&self) -> Option<&'a str> {
        let mut start = self.pos;
        while start < self.data.len() && self.data[start].is_ascii_whitespace() {
            start += 1;
        }
        if start >= self.data.len() {
            return None;
        }
        std::str::from_utf8(&self.data[start..self.token_end(start)]).ok()
    }

    fn next_token(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        self.pos = self.token_end(start);
        std::str::from_utf8(&self.data[start..self.pos]).ok()
    }

    fn parse_token<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.next_token().ok_or_else(|| anyhow!("Unexpected end of file reading {}", what))?;
        token.parse().map_err(|_| anyhow!("Invalid {} '{}'", what, token))
    }

    /// Move past the end of the current line, where binary payloads start.
    fn finish_line(&mut self) {
        while self.pos < self.data.len() {
            let b = self.data[self.pos];
            self.pos += 1;
            if b == b'\n' {
                break;
            }
        }
    }

    /// Skip lines up to and including the next blank line.
    fn skip_block(&mut self) {
        self.finish_line();
        while let Some(line) = self.read_line() {
            if line.trim().is_empty() {
                break;
            }
        }
    }

    fn starts_with(&self, prefix: &[u8]) -> bool {
        self.data[self.pos..].starts_with(prefix)
    }

    fn take_elements(&mut self, count: usize, width: usize) -> Result<&'a [u8]> {
        let n = count
            .checked_mul(width)
            .ok_or_else(|| anyhow!("Binary payload of {} values too large", count))?;
        self.take(n)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len());
        let end = end.ok_or_else(|| anyhow!("Binary payload truncated: need {} bytes at offset {}", n, self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}
