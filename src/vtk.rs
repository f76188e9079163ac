//! The out-of-core VTK legacy unstructured-grid writer of §6: consumes only
//! the local-tree iteration interface (`Forest::trees`, each leaf's `(x, y,
//! level)`), never the full global mesh at once.
//!
//! Grounded on the teacher's commented-out `export_to_vtk` in
//! `src/octree.rs` (`vtkio::model::{Vtk, UnstructuredGridPiece, Cells,
//! Attribute, DataArrayBase}`, one inline-duplicated point block per cell
//! rather than a deduplicated point table), generalized from the teacher's
//! 8-point `Voxel` cells to 4-point `Pixel` cells for a 2D leaf.

use std::path::Path;

use vtkio::model::{
    Attribute, Attributes, ByteOrder, Cells, CellType, DataArrayBase, DataSet, ElementType,
    UnstructuredGridPiece, Version, Vtk, VertexNumbers,
};
use vtkio::IOBuffer;

use crate::constants::{h, MAXLEVEL};
use crate::error::ForestError;
use crate::forest::Forest;

const POINTS_PER_CELL: usize = 4;

/// Writes every local leaf of `forest` as an axis-aligned `Pixel` cell
/// scaled into `[0, domain_size]`, with `tree` and `level` as per-cell
/// scalar attributes (enough to recolor by tree or refinement depth in
/// ParaView). One point block per cell, matching the teacher's
/// non-deduplicated layout.
pub fn write_legacy_unstructured_grid(
    forest: &Forest,
    path: impl AsRef<Path>,
    domain_size: f64,
) -> Result<(), ForestError> {
    let root_side = (1i64 << MAXLEVEL) as f64;
    let scale = domain_size / root_side;

    let mut points = Vec::new();
    let mut vertices = Vec::new();
    let mut tree_ids = Vec::new();
    let mut levels = Vec::new();
    let mut num_cells = 0u32;

    if forest.has_local_trees() {
        for t in forest.first_local_tree..=forest.last_local_tree {
            for q in &forest.trees[t as usize].quadrants {
                let side = h(q.level) as f64 * scale;
                let x0 = q.x as f64 * scale;
                let y0 = q.y as f64 * scale;
                let base = (points.len() / 3) as u32;
                for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
                    points.push(x0 + dx * side);
                    points.push(y0 + dy * side);
                    points.push(0.0);
                }
                vertices.push(POINTS_PER_CELL as u32);
                vertices.extend([base, base + 1, base + 2, base + 3]);
                num_cells += 1;
                tree_ids.push(t);
                levels.push(q.level as i32);
            }
        }
    }
    let model = Vtk {
        version: Version { major: 3, minor: 0 },
        title: String::from("qforest"),
        byte_order: ByteOrder::BigEndian,
        file_path: Some(path.as_ref().to_path_buf()),
        data: DataSet::inline(UnstructuredGridPiece {
            points: IOBuffer::F64(points),
            cells: Cells {
                cell_verts: VertexNumbers::Legacy {
                    num_cells,
                    vertices,
                },
                types: vec![CellType::Pixel; num_cells as usize],
            },
            data: Attributes {
                point: vec![],
                cell: vec![
                    Attribute::DataArray(DataArrayBase {
                        name: String::from("tree"),
                        elem: ElementType::Scalars {
                            num_comp: 1,
                            lookup_table: None,
                        },
                        data: IOBuffer::I32(tree_ids),
                    }),
                    Attribute::DataArray(DataArrayBase {
                        name: String::from("level"),
                        elem: ElementType::Scalars {
                            num_comp: 1,
                            lookup_table: None,
                        },
                        data: IOBuffer::I32(levels),
                    }),
                ],
            },
        }),
    };

    log::debug!("writing {num_cells} leaves to {}", path.as_ref().display());
    model
        .export(path)
        .map_err(|e| ForestError::Corrupt(format!("vtk export failed: {e}")))
}
