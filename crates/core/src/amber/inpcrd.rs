//! AMBER inpcrd/rst7 coordinate file parser.
//!
//! Coordinates are converted from Angstrom to nm.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{TrajError, TrajResult};
use crate::trajectory::dcd::ANGSTROM_TO_NM;

/// Parsed AMBER coordinate data.
#[derive(Debug, Clone, PartialEq)]
pub struct AmberCoordinates {
    /// Atomic coordinates in nm
    pub positions: Vec<[f64; 3]>,
    /// Box as `[a, b, c, alpha, beta, gamma]` (nm, degrees)
    pub periodic_box: Option<[f64; 6]>,
}

fn parse_value(text: &str) -> TrajResult<f64> {
    text.parse()
        .map_err(|e| TrajError::Parse(format!("bad coordinate '{}': {}", text, e)))
}

/// Parse inpcrd/rst7 text.
///
/// Line 1 is a title, line 2 starts with the atom count, then come
/// coordinates in 12.7f fields, six per line. Restart files may follow with
/// velocities; a trailing line of three or six numbers is the box.
pub fn parse_inpcrd<R: BufRead>(reader: R) -> TrajResult<AmberCoordinates> {
    let mut lines = reader.lines();
    let _title = lines
        .next()
        .ok_or_else(|| TrajError::Parse("empty inpcrd file".into()))??;
    let header = lines
        .next()
        .ok_or_else(|| TrajError::Parse("inpcrd is missing the atom count line".into()))??;
    let mut header_fields = header.split_whitespace();
    let count_text = header_fields
        .next()
        .ok_or_else(|| TrajError::Parse("no atom count found".into()))?;
    // Restart files carry the simulation time after the atom count.
    let is_restart = header_fields.next().is_some();
    let n_atoms: usize = count_text
        .parse()
        .map_err(|e| TrajError::Parse(format!("bad atom count '{}': {}", count_text, e)))?;

    let mut values: Vec<f64> = Vec::with_capacity(n_atoms * 3);
    for line in lines {
        let line = line?;
        let mut pos = 0;
        while pos + 12 <= line.len() {
            let field = line[pos..pos + 12].trim();
            if !field.is_empty() {
                values.push(parse_value(field)?);
            }
            pos += 12;
        }
        for word in line[pos..].split_whitespace() {
            values.push(parse_value(word)?);
        }
    }

    let n_coord_values = n_atoms * 3;
    if values.len() < n_coord_values {
        return Err(TrajError::Parse(format!(
            "expected {} coordinate values, found {}",
            n_coord_values,
            values.len()
        )));
    }
    let positions = values[..n_coord_values]
        .chunks_exact(3)
        .map(|c| [c[0] * ANGSTROM_TO_NM, c[1] * ANGSTROM_TO_NM, c[2] * ANGSTROM_TO_NM])
        .collect();

    let extra = values.len() - n_coord_values;
    let tail = &values[n_coord_values..];
    let box_values = match extra {
        0 => None,
        e if e == n_coord_values && is_restart => None,
        3 | 6 => Some(tail),
        e if e == n_coord_values + 3 || e == n_coord_values + 6 => Some(&tail[n_coord_values..]),
        e if e == n_coord_values => None,
        _ => {
            return Err(TrajError::Parse(format!(
                "{} values after the coordinates of {} atoms",
                extra, n_atoms
            )))
        }
    };
    let periodic_box = box_values.map(|b| {
        let angles = if b.len() == 6 {
            [b[3], b[4], b[5]]
        } else {
            [90.0; 3]
        };
        [
            b[0] * ANGSTROM_TO_NM,
            b[1] * ANGSTROM_TO_NM,
            b[2] * ANGSTROM_TO_NM,
            angles[0],
            angles[1],
            angles[2],
        ]
    });

    Ok(AmberCoordinates {
        positions,
        periodic_box,
    })
}

/// Read an AMBER inpcrd/rst7 coordinate file.
pub fn read_inpcrd<P: AsRef<Path>>(path: P) -> TrajResult<AmberCoordinates> {
    let file = File::open(path.as_ref())?;
    parse_inpcrd(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_and_box() {
        let text = "\
title
     2
   1.0000000   2.0000000   3.0000000  10.0000000  20.0000000  30.0000000
  40.0000000  40.0000000  40.0000000  90.0000000  90.0000000  90.0000000
";
        let crd = parse_inpcrd(text.as_bytes()).unwrap();
        assert_eq!(crd.positions.len(), 2);
        assert!((crd.positions[1][2] - 3.0).abs() < 1e-12);
        let b = crd.periodic_box.unwrap();
        assert!((b[0] - 4.0).abs() < 1e-12);
        assert_eq!(b[5], 90.0);
    }

    #[test]
    fn restart_with_velocities() {
        let text = "\
title
     1  0.1000000E+01
   1.0000000   1.0000000   1.0000000
   0.5000000   0.5000000   0.5000000
";
        let crd = parse_inpcrd(text.as_bytes()).unwrap();
        assert!(crd.periodic_box.is_none());
        assert!((crd.positions[0][0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn too_few_values() {
        let text = "title\n     2\n   1.0000000   2.0000000\n";
        assert!(matches!(
            parse_inpcrd(text.as_bytes()),
            Err(TrajError::Parse(_))
        ));
    }
}
