//! AMBER prmtop (topology) file parser.
//!
//! Only the identity records are read: atom names, residues, masses and
//! charges (converted to elementary charge units). A prmtop holds no
//! coordinates, so the resulting group sits at the origin until a frame is
//! read into it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::atoms::{Atom, AtomicGroup};
use crate::error::{TrajError, TrajResult};

/// AMBER charge to elementary charge: q_e = q_amber / 18.2223
pub const AMBER_CHARGE_FACTOR: f64 = 18.2223;

/// FLAG name to the raw data lines that follow it.
struct PrmtopParser {
    sections: HashMap<String, Vec<String>>,
}

impl PrmtopParser {
    fn parse<R: BufRead>(reader: R) -> TrajResult<Self> {
        let mut sections = HashMap::new();
        let mut current_flag: Option<String> = None;
        let mut current_data: Vec<String> = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if let Some(flag_content) = line.strip_prefix("%FLAG") {
                if let Some(flag) = current_flag.take() {
                    sections.insert(flag, std::mem::take(&mut current_data));
                }
                current_flag = Some(flag_content.trim().to_string());
            } else if line.starts_with('%') {
                // %VERSION, %FORMAT, %COMMENT
                continue;
            } else if current_flag.is_some() {
                current_data.push(line);
            }
        }
        if let Some(flag) = current_flag {
            sections.insert(flag, current_data);
        }
        Ok(Self { sections })
    }

    fn section(&self, flag: &str) -> TrajResult<&[String]> {
        self.sections
            .get(flag)
            .map(Vec::as_slice)
            .ok_or_else(|| TrajError::Parse(format!("prmtop is missing the {} section", flag)))
    }

    fn parse_integers(&self, flag: &str) -> TrajResult<Vec<i64>> {
        let mut values = Vec::new();
        for word in self.section(flag)?.iter().flat_map(|l| l.split_whitespace()) {
            values.push(word.parse().map_err(|e| {
                TrajError::Parse(format!("bad integer '{}' in {}: {}", word, flag, e))
            })?);
        }
        Ok(values)
    }

    fn parse_floats(&self, flag: &str) -> TrajResult<Vec<f64>> {
        let mut values = Vec::new();
        for word in self.section(flag)?.iter().flat_map(|l| l.split_whitespace()) {
            values.push(word.parse().map_err(|e| {
                TrajError::Parse(format!("bad number '{}' in {}: {}", word, flag, e))
            })?);
        }
        Ok(values)
    }

    /// Fixed-width string fields (atom names, residue labels).
    fn parse_strings(&self, flag: &str, width: usize) -> TrajResult<Vec<String>> {
        let mut values = Vec::new();
        for line in self.section(flag)? {
            let mut pos = 0;
            while pos + width <= line.len() {
                values.push(line[pos..pos + width].trim().to_string());
                pos += width;
            }
            if pos < line.len() {
                let s = line[pos..].trim();
                if !s.is_empty() {
                    values.push(s.to_string());
                }
            }
        }
        Ok(values)
    }
}

fn require_len<T>(values: &[T], n: usize, flag: &str) -> TrajResult<()> {
    if values.len() < n {
        return Err(TrajError::Parse(format!(
            "{} has {} entries, expected {}",
            flag,
            values.len(),
            n
        )));
    }
    Ok(())
}

/// Parse prmtop text into a group of atoms.
pub fn parse_prmtop<R: BufRead>(reader: R) -> TrajResult<AtomicGroup> {
    let parser = PrmtopParser::parse(reader)?;

    let pointers = parser.parse_integers("POINTERS")?;
    require_len(&pointers, 12, "POINTERS")?;
    if pointers[0] < 0 || pointers[11] < 0 {
        return Err(TrajError::Parse(format!(
            "POINTERS contains negative counts: n_atoms={}, n_residues={}",
            pointers[0], pointers[11]
        )));
    }
    let n_atoms = pointers[0] as usize;
    let n_residues = pointers[11] as usize;

    let names = parser.parse_strings("ATOM_NAME", 4)?;
    require_len(&names, n_atoms, "ATOM_NAME")?;
    let charges = parser.parse_floats("CHARGE")?;
    require_len(&charges, n_atoms, "CHARGE")?;
    let masses = parser.parse_floats("MASS")?;
    require_len(&masses, n_atoms, "MASS")?;
    let labels = parser.parse_strings("RESIDUE_LABEL", 4)?;
    require_len(&labels, n_residues, "RESIDUE_LABEL")?;
    let res_ptr = parser.parse_integers("RESIDUE_POINTER")?;
    require_len(&res_ptr, n_residues, "RESIDUE_POINTER")?;

    // Residue pointers are 1-based first-atom indices.
    let mut starts = Vec::with_capacity(n_residues);
    for (i, &x) in res_ptr.iter().take(n_residues).enumerate() {
        if x < 1 || x as usize > n_atoms.max(1) {
            return Err(TrajError::Parse(format!(
                "Invalid RESIDUE_POINTER at position {}: {}",
                i, x
            )));
        }
        starts.push((x - 1) as usize);
    }

    let mut atoms = Vec::with_capacity(n_atoms);
    let mut residue = 0;
    for i in 0..n_atoms {
        while residue + 1 < n_residues && starts[residue + 1] <= i {
            residue += 1;
        }
        let resname = labels.get(residue).cloned().unwrap_or_default();
        atoms.push(
            Atom::new(i as i64 + 1, names[i].clone(), resname, residue as i64 + 1)
                .with_mass(masses[i])
                .with_charge(charges[i] / AMBER_CHARGE_FACTOR),
        );
    }
    Ok(AtomicGroup::from_atoms(atoms))
}

/// Read an AMBER prmtop file.
pub fn read_prmtop<P: AsRef<Path>>(path: P) -> TrajResult<AtomicGroup> {
    let file = File::open(path.as_ref())?;
    parse_prmtop(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIPEPTIDE: &str = "\
%VERSION  VERSION_STAMP = V0001.000
%FLAG TITLE
%FORMAT(20a4)
test
%FLAG POINTERS
%FORMAT(10I8)
       5       2       3       0       0       0       0       0       0       0
       0       2       0       0       0       0       0       0       0       0
%FLAG ATOM_NAME
%FORMAT(20a4)
N   CA  C   CA  HA
%FLAG CHARGE
%FORMAT(5E16.8)
  1.82223000E+01 -1.82223000E+01  0.00000000E+00  3.64446000E+00  0.00000000E+00
%FLAG MASS
%FORMAT(5E16.8)
  1.40100000E+01  1.20100000E+01  1.20100000E+01  1.20100000E+01  1.00800000E+00
%FLAG RESIDUE_LABEL
%FORMAT(20a4)
ALA GLY
%FLAG RESIDUE_POINTER
%FORMAT(10I8)
       1       4
";

    #[test]
    fn parses_identity_records() {
        let group = parse_prmtop(DIPEPTIDE.as_bytes()).unwrap();
        assert_eq!(group.len(), 5);
        let atoms = group.atoms();
        assert_eq!(atoms[1].name, "CA");
        assert_eq!(atoms[2].resname, "ALA");
        assert_eq!(atoms[3].resname, "GLY");
        assert_eq!(atoms[3].resid, 2);
        assert_eq!(atoms[4].id, 5);
        assert!((atoms[0].charge - 1.0).abs() < 1e-9);
        assert!((atoms[3].charge - 0.2).abs() < 1e-9);
        assert!((atoms[4].mass - 1.008).abs() < 1e-9);
        assert_eq!(group.select_positions("resname GLY").unwrap(), vec![3, 4]);
    }

    #[test]
    fn missing_section_is_a_parse_error() {
        let text = DIPEPTIDE.replace("%FLAG MASS", "%FLAG MASSES");
        assert!(matches!(
            parse_prmtop(text.as_bytes()),
            Err(TrajError::Parse(_))
        ));
    }
}
