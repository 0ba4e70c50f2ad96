//! Evaluator for selection expressions against an [`AtomicGroup`].

use crate::atoms::AtomicGroup;
use crate::selection::ast::*;
use crate::selection::error::SelectionError;
use crate::selection::keywords;

/// Context for evaluating selection expressions.
pub struct SelectionContext<'a> {
    pub group: &'a AtomicGroup,
}

impl<'a> SelectionContext<'a> {
    pub fn new(group: &'a AtomicGroup) -> Self {
        Self { group }
    }

    /// Parse and evaluate a selection expression string, returning sorted positions.
    pub fn eval_str(&self, expr: &str) -> Result<Vec<usize>, SelectionError> {
        let ast = crate::selection::parser::parse_selection(expr)?;
        self.eval(&ast)
    }

    /// Evaluate an AST expression, returning sorted positions.
    pub fn eval(&self, expr: &Expr) -> Result<Vec<usize>, SelectionError> {
        let mask = self.eval_mask(expr)?;
        Ok(mask_to_indices(&mask))
    }

    fn mask_by(&self, pred: impl Fn(usize) -> bool) -> Vec<bool> {
        (0..self.group.len()).map(pred).collect()
    }

    fn eval_mask(&self, expr: &Expr) -> Result<Vec<bool>, SelectionError> {
        let atoms = self.group.atoms();
        match expr {
            Expr::And(lhs, rhs) => {
                let a = self.eval_mask(lhs)?;
                let b = self.eval_mask(rhs)?;
                Ok(a.iter().zip(b.iter()).map(|(&x, &y)| x && y).collect())
            }
            Expr::Or(lhs, rhs) => {
                let a = self.eval_mask(lhs)?;
                let b = self.eval_mask(rhs)?;
                Ok(a.iter().zip(b.iter()).map(|(&x, &y)| x || y).collect())
            }
            Expr::Not(inner) => {
                let a = self.eval_mask(inner)?;
                Ok(a.iter().map(|&x| !x).collect())
            }
            Expr::StringMatch { field, pattern } => Ok(self.mask_by(|i| {
                let atom = &atoms[i];
                let value = match field {
                    StringField::Name => atom.name.trim(),
                    StringField::Resname => atom.resname.trim(),
                    StringField::Segid => atom.segid.trim(),
                };
                pattern.matches(value)
            })),
            Expr::NumericCmp { field, op, value } => Ok(self.mask_by(|i| {
                let lhs = match field {
                    NumericField::Mass => atoms[i].mass,
                    NumericField::Charge => atoms[i].charge,
                };
                op.compare(lhs, *value)
            })),
            Expr::RangeSelect { field, ranges } => Ok(self.mask_by(|i| {
                let val = match field {
                    RangeField::Resid => atoms[i].resid,
                    RangeField::Index => i as i64,
                    RangeField::Id => atoms[i].id,
                };
                ranges.iter().any(|r| r.contains(val))
            })),
            Expr::Within { distance, inner } => {
                let inner_mask = self.eval_mask(inner)?;
                let inner_indices = mask_to_indices(&inner_mask);
                Ok(within_cell_list(
                    self.group.coords(),
                    &inner_indices,
                    distance * distance,
                ))
            }
            Expr::Keyword(kw) => Ok(self.eval_keyword(*kw)),
        }
    }

    fn eval_keyword(&self, kw: Keyword) -> Vec<bool> {
        let atoms = self.group.atoms();
        match kw {
            Keyword::All => vec![true; atoms.len()],
            Keyword::None => vec![false; atoms.len()],
            Keyword::Protein => self.mask_by(|i| keywords::is_protein_residue(&atoms[i].resname)),
            Keyword::Water => self.mask_by(|i| keywords::is_water_residue(&atoms[i].resname)),
            Keyword::Backbone => self.mask_by(|i| {
                keywords::is_protein_residue(&atoms[i].resname)
                    && keywords::is_backbone_atom(&atoms[i].name)
            }),
            Keyword::Sidechain => self.mask_by(|i| {
                keywords::is_protein_residue(&atoms[i].resname)
                    && !keywords::is_backbone_atom(&atoms[i].name)
            }),
            Keyword::Hydrogen => {
                self.mask_by(|i| keywords::is_hydrogen(&atoms[i].name, atoms[i].mass))
            }
        }
    }
}

fn mask_to_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &b)| if b { Some(i) } else { None })
        .collect()
}

/// Cells of at least `cutoff` (and 0.01 nm) per side, widened until the grid
/// holds no more than eight cells per atom.
fn grid_shape(min: [f64; 3], max: [f64; 3], cutoff: f64, n_atoms: usize) -> (f64, [usize; 3]) {
    let max_cells = (8 * n_atoms.max(1)) as f64;
    let mut cell_size = cutoff.max(0.01);
    let cells_along = |d: usize, size: f64| ((max[d] - min[d]) / size).ceil() + 1.0;
    while cells_along(0, cell_size) * cells_along(1, cell_size) * cells_along(2, cell_size)
        > max_cells
    {
        cell_size *= 2.0;
    }
    let dims = [0, 1, 2].map(|d| cells_along(d, cell_size) as usize);
    (cell_size, dims)
}

/// Cell-list based spatial query for "within" selections.
/// Returns a bitmask of atoms within `cutoff_sq` distance of any atom in `source_indices`.
fn within_cell_list(coords: &[[f64; 3]], source_indices: &[usize], cutoff_sq: f64) -> Vec<bool> {
    let n_atoms = coords.len();
    if source_indices.is_empty() || n_atoms == 0 {
        return vec![false; n_atoms];
    }
    let cutoff = cutoff_sq.sqrt();

    let mut min = [f64::MAX; 3];
    let mut max = [f64::MIN; 3];
    for coord in coords {
        for d in 0..3 {
            min[d] = min[d].min(coord[d]);
            max[d] = max[d].max(coord[d]);
        }
    }

    let (cell_size, dims) = grid_shape(min, max, cutoff, n_atoms);
    let cell_of = |p: &[f64; 3]| -> [usize; 3] {
        [
            ((p[0] - min[0]) / cell_size) as usize,
            ((p[1] - min[1]) / cell_size) as usize,
            ((p[2] - min[2]) / cell_size) as usize,
        ]
    };
    let flat = |c: [usize; 3]| c[0] * dims[1] * dims[2] + c[1] * dims[2] + c[2];

    let mut cells: Vec<Vec<usize>> = vec![Vec::new(); dims[0] * dims[1] * dims[2]];
    for (i, p) in coords.iter().enumerate() {
        cells[flat(cell_of(p))].push(i);
    }

    let mut mask = vec![false; n_atoms];
    for &si in source_indices {
        let [cx, cy, cz] = cell_of(&coords[si]);
        for ix in cx.saturating_sub(1)..=(cx + 1).min(dims[0] - 1) {
            for iy in cy.saturating_sub(1)..=(cy + 1).min(dims[1] - 1) {
                for iz in cz.saturating_sub(1)..=(cz + 1).min(dims[2] - 1) {
                    for &j in &cells[flat([ix, iy, iz])] {
                        if !mask[j]
                            && crate::util::distance_squared(&coords[si], &coords[j]) <= cutoff_sq
                        {
                            mask[j] = true;
                        }
                    }
                }
            }
        }
    }

    mask
}
