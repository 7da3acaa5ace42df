// hands finished blocks over for saving
// and writes them out as an obj file

use bevy::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::error::{SimError, SimResult};
use crate::systems::grid::RegionId;
use crate::systems::mesh::block::FinishedBlock;

// export event
#[derive(Event)]
pub struct ExportEvent {
    pub filename: String,
}

/// One structural block as handed to persistence: placement, colour and raw geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRecord {
    pub region: RegionId,
    pub position: Vec3,
    pub rotation: Quat,
    /// linear rgba, rounded to 0.001
    pub color: [f32; 4],
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<u32>,
}

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

impl BlockRecord {
    pub fn new(block: &FinishedBlock, color: Color) -> Self {
        let linear = color.to_linear();
        Self {
            region: block.region,
            position: block.offset,
            rotation: Quat::IDENTITY,
            color: [linear.red, linear.green, linear.blue, linear.alpha].map(round3),
            vertices: block.mesh.positions.clone(),
            triangles: block.mesh.indices.clone(),
        }
    }
}

/// Every block cast so far, in the order they finished.
#[derive(Resource, Default, Debug)]
pub struct FinishedBlocks {
    pub records: Vec<BlockRecord>,
}

/// Writes the records as obj groups with vertices placed in world space.
pub fn write_obj<W: Write>(records: &[BlockRecord], writer: &mut W) -> std::io::Result<()> {
    // OBJ header
    writeln!(writer, "# Exported from block caster")?;
    writeln!(writer, "# {} blocks", records.len())?;

    // OBJ format indices start at 1
    let mut vertex_offset = 1;

    for record in records {
        writeln!(writer, "o Block_{}", record.region.code())?;
        let [r, g, b, _] = record.color;
        writeln!(writer, "# color {} {} {}", r, g, b)?;

        for vertex in &record.vertices {
            let world = record.position + record.rotation * *vertex;
            writeln!(writer, "v {} {} {}", world.x, world.y, world.z)?;
        }

        for chunk in record.triangles.chunks_exact(3) {
            writeln!(
                writer,
                "f {} {} {}",
                vertex_offset + chunk[0],
                vertex_offset + chunk[1],
                vertex_offset + chunk[2]
            )?;
        }

        vertex_offset += record.vertices.len() as u32;
        writeln!(writer)?;
    }

    writer.flush()
}

/// Writes `records` to `filename`.
/// # Returns the number of blocks written
pub fn export_obj(records: &[BlockRecord], filename: &str) -> SimResult<usize> {
    let io_error = |source| SimError::Io { path: filename.to_string(), source };
    let file = File::create(filename).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    write_obj(records, &mut writer).map_err(io_error)?;
    Ok(records.len())
}

pub fn handle_export(
    mut events: EventReader<ExportEvent>,
    blocks: Res<FinishedBlocks>,
) {
    for event in events.read() {
        match export_obj(&blocks.records, &event.filename) {
            Ok(count) => info!("Exported {} blocks to {}", count, event.filename),
            Err(err) => warn!("Export failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: i16, position: Vec3) -> BlockRecord {
        BlockRecord {
            region: RegionId::new(code).unwrap(),
            position,
            rotation: Quat::IDENTITY,
            color: [0.5, 0.25, 0.125, 1.0],
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Z],
            triangles: vec![0, 2, 1],
        }
    }

    #[test]
    fn obj_indices_continue_across_blocks() {
        let records = [record(2, Vec3::ZERO), record(3, Vec3::new(10.0, 0.0, 0.0))];
        let mut out = Vec::new();
        write_obj(&records, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("o Block_2"));
        assert!(text.contains("f 1 3 2"));
        assert!(text.contains("f 4 6 5"));
        assert!(text.contains("v 11 0 0"));
    }

    #[test]
    fn colours_are_rounded() {
        assert_eq!(round3(0.123456), 0.123);
        assert_eq!(round3(0.9996), 1.0);
    }

    #[test]
    fn export_reports_bad_paths() {
        let err = export_obj(&[], "/nonexistent-dir/blocks.obj").unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
    }
}
