//! PDB coordinate file reader.
//!
//! Reads ATOM/HETATM records of the first model using the fixed column
//! layout, plus the CRYST1 box. Coordinates are converted from Angstrom to nm.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::atoms::{Atom, AtomicGroup};
use crate::error::{TrajError, TrajResult};
use crate::trajectory::dcd::ANGSTROM_TO_NM;

/// Standard atomic masses (amu) of the elements common in biomolecular systems.
const ELEMENT_MASSES: &[(&str, f64)] = &[
    ("H", 1.008),
    ("C", 12.011),
    ("N", 14.007),
    ("O", 15.999),
    ("F", 18.998),
    ("NA", 22.990),
    ("MG", 24.305),
    ("P", 30.974),
    ("S", 32.06),
    ("CL", 35.45),
    ("K", 39.098),
    ("CA", 40.078),
    ("MN", 54.938),
    ("FE", 55.845),
    ("CU", 63.546),
    ("ZN", 65.38),
    ("BR", 79.904),
    ("I", 126.904),
];

fn element_mass(element: &str) -> Option<f64> {
    ELEMENT_MASSES
        .iter()
        .find(|(sym, _)| sym.eq_ignore_ascii_case(element))
        .map(|&(_, m)| m)
}

/// Element from columns 77-78, or the first letter of the atom name.
fn guess_mass(element_field: Option<&str>, name: &str) -> f64 {
    if let Some(mass) = element_field.map(str::trim).filter(|e| !e.is_empty()).and_then(element_mass) {
        return mass;
    }
    name.chars()
        .find(|c| c.is_ascii_alphabetic())
        .and_then(|c| element_mass(&c.to_string()))
        .unwrap_or(0.0)
}

fn field<'a>(line: &'a str, range: std::ops::Range<usize>) -> &'a str {
    let end = range.end.min(line.len());
    line.get(range.start.min(end)..end).unwrap_or("").trim()
}

fn number<T: std::str::FromStr>(line: &str, range: std::ops::Range<usize>, what: &str, lineno: usize) -> TrajResult<T> {
    let text = field(line, range);
    text.parse().map_err(|_| {
        TrajError::Parse(format!("line {}: bad {} '{}'", lineno, what, text))
    })
}

/// Parse PDB text.
pub fn parse_pdb<R: BufRead>(reader: R) -> TrajResult<AtomicGroup> {
    let mut atoms = Vec::new();
    let mut coords = Vec::new();
    let mut periodic_box = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = i + 1;
        if line.starts_with("ENDMDL") {
            break;
        }
        if line.starts_with("CRYST1") {
            let a: f64 = number(&line, 6..15, "box length", lineno)?;
            let b: f64 = number(&line, 15..24, "box length", lineno)?;
            let c: f64 = number(&line, 24..33, "box length", lineno)?;
            let alpha: f64 = number(&line, 33..40, "box angle", lineno)?;
            let beta: f64 = number(&line, 40..47, "box angle", lineno)?;
            let gamma: f64 = number(&line, 47..54, "box angle", lineno)?;
            periodic_box = Some([
                a * ANGSTROM_TO_NM,
                b * ANGSTROM_TO_NM,
                c * ANGSTROM_TO_NM,
                alpha,
                beta,
                gamma,
            ]);
            continue;
        }
        let record = field(&line, 0..6);
        if record != "ATOM" && record != "HETATM" {
            continue;
        }

        // Serial numbers overflow five columns in large systems; count instead.
        let id = field(&line, 6..11)
            .parse()
            .unwrap_or(atoms.len() as i64 + 1);
        let name = field(&line, 12..16).to_string();
        let resname = field(&line, 17..21).to_string();
        let resid: i64 = number(&line, 22..26, "residue number", lineno)?;
        let x: f64 = number(&line, 30..38, "x coordinate", lineno)?;
        let y: f64 = number(&line, 38..46, "y coordinate", lineno)?;
        let z: f64 = number(&line, 46..54, "z coordinate", lineno)?;
        let segid = field(&line, 72..76);
        let segid = if segid.is_empty() {
            field(&line, 21..22)
        } else {
            segid
        };
        let element = line.get(76..78);

        let mass = guess_mass(element, &name);
        atoms.push(
            Atom::new(id, name, resname, resid)
                .with_segid(segid)
                .with_mass(mass),
        );
        coords.push([x * ANGSTROM_TO_NM, y * ANGSTROM_TO_NM, z * ANGSTROM_TO_NM]);
    }

    let mut group = AtomicGroup::new(atoms, coords)?;
    group.set_periodic_box(periodic_box);
    Ok(group)
}

/// Read a PDB file.
pub fn read_pdb<P: AsRef<Path>>(path: P) -> TrajResult<AtomicGroup> {
    let file = File::open(path.as_ref())?;
    parse_pdb(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const TWO_RESIDUES: &str = "\
CRYST1   50.000   60.000   70.000  90.00  90.00 120.00 P 1           1
ATOM      1  N   ALA A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      11.639   6.071  -5.147  1.00  0.00           C
ATOM      3  C   ALA A   1      13.149   5.904  -5.156  1.00  0.00           C
ATOM      4  CA  GLY A   2      14.000   7.000  -4.000  1.00  0.00           C
HETATM    5 CA    CA A   3      20.000  20.000  20.000  1.00  0.00          CA
ENDMDL
ATOM      6  N   ALA A   1      99.000  99.000  99.000  1.00  0.00           N
";

    #[test]
    fn reads_first_model() {
        let group = parse_pdb(TWO_RESIDUES.as_bytes()).unwrap();
        assert_eq!(group.len(), 5);
        let atoms = group.atoms();
        assert_eq!(atoms[1].name, "CA");
        assert_eq!(atoms[3].resname, "GLY");
        assert_eq!(atoms[3].resid, 2);
        assert_eq!(atoms[0].segid, "A");
        assert!((atoms[0].mass - 14.007).abs() < 1e-9);
        // Calcium ion, not an alpha carbon.
        assert!((atoms[4].mass - 40.078).abs() < 1e-9);
        assert!((group.coords()[0][0] - 1.1104).abs() < 1e-9);
    }

    #[test]
    fn reads_box() {
        let group = parse_pdb(TWO_RESIDUES.as_bytes()).unwrap();
        let b = group.periodic_box().unwrap();
        assert!((b[0] - 5.0).abs() < 1e-9);
        assert!((b[2] - 7.0).abs() < 1e-9);
        assert_eq!(b[5], 120.0);
    }

    #[test]
    fn bad_coordinate_reports_line() {
        let text = "ATOM      1  N   ALA A   1      xx.xxx   6.134  -6.504\n";
        let err = parse_pdb(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
