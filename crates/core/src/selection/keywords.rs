//! Convenience keyword data tables for protein, water, backbone, etc.

/// Standard amino acid residue names, including common protonation variants.
pub const PROTEIN_RESIDUES: &[&str] = &[
    "ALA", "ARG", "ASN", "ASP", "ASH", "CYS", "CYX", "CYM", "GLN", "GLU", "GLH", "GLY", "HIS",
    "HID", "HIE", "HIP", "HSD", "HSE", "HSP", "ILE", "LEU", "LYS", "LYN", "MET", "PHE", "PRO",
    "SER", "THR", "TRP", "TYR", "VAL",
    // caps
    "ACE", "NME", "NHE",
];

/// Water residue names.
pub const WATER_RESIDUES: &[&str] = &[
    "WAT", "HOH", "SOL", "TIP3", "TIP3P", "T3P", "SPC", "SPCE", "TIP4", "TIP4P", "TP4", "TIP5",
    "T5P",
];

/// Backbone atom names.
pub const BACKBONE_ATOMS: &[&str] = &["N", "CA", "C", "O", "H", "HA", "HN", "OXT", "OT1", "OT2"];

/// Amber-style N-/C-terminal residues carry a one-letter prefix (`NALA`, `CGLY`).
fn strip_terminal_prefix(name: &str) -> &str {
    if name.len() == 4 && (name.starts_with('N') || name.starts_with('C')) {
        &name[1..]
    } else {
        name
    }
}

/// Check if a residue name is a protein residue.
pub fn is_protein_residue(name: &str) -> bool {
    let trimmed = name.trim();
    let core = strip_terminal_prefix(trimmed);
    PROTEIN_RESIDUES
        .iter()
        .any(|&r| r.eq_ignore_ascii_case(trimmed) || r.eq_ignore_ascii_case(core))
}

/// Check if a residue name is a water residue.
pub fn is_water_residue(name: &str) -> bool {
    let trimmed = name.trim();
    WATER_RESIDUES
        .iter()
        .any(|&r| r.eq_ignore_ascii_case(trimmed))
}

/// Check if an atom name is a backbone atom.
pub fn is_backbone_atom(name: &str) -> bool {
    let trimmed = name.trim();
    BACKBONE_ATOMS
        .iter()
        .any(|&a| a.eq_ignore_ascii_case(trimmed))
}

/// Hydrogen by mass, falling back to the name when no mass is known.
pub fn is_hydrogen(name: &str, mass: f64) -> bool {
    if mass > 0.0 {
        mass < 1.1
    } else {
        name.trim_start_matches(|c: char| c.is_ascii_digit())
            .starts_with(['H', 'h'])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_variants() {
        assert!(is_protein_residue("NALA"));
        assert!(is_protein_residue("CGLY"));
        assert!(is_protein_residue("HSD"));
        assert!(!is_protein_residue("NA"));
        assert!(!is_protein_residue("CLA"));
    }

    #[test]
    fn test_hydrogen_fallback() {
        assert!(is_hydrogen("CA", 1.008));
        assert!(!is_hydrogen("HG", 200.59));
        assert!(is_hydrogen("1HB", 0.0));
        assert!(!is_hydrogen("CB", 0.0));
    }
}
