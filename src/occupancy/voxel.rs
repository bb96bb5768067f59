// src/occupancy/voxel.rs
// Reference encoder: bins obstacle points into the voxel grid of a roadmap volume.

use log::debug;
use nalgebra::{Point3, Vector3};

use super::{OccupancyData, OccupancyEncoder, Voxel};
use crate::roadmap::OccupancyVolume;

/// Voxel-grid encoder with optional obstacle inflation
#[derive(Debug, Clone, Copy, Default)]
pub struct VoxelGridEncoder {
    /// Extra voxels marked around every occupied voxel on each axis
    pub inflation: u16,
}

impl VoxelGridEncoder {
    /// Encoder without inflation
    pub fn new() -> Self {
        VoxelGridEncoder { inflation: 0 }
    }

    /// Encoder that grows every obstacle by `inflation` voxels
    pub fn with_inflation(inflation: u16) -> Self {
        VoxelGridEncoder { inflation }
    }

    /// Voxel containing `point`, if it lies inside the volume
    pub fn voxel_of(volume: &OccupancyVolume, point: &Point3<f64>) -> Option<Voxel> {
        let counts = volume.voxel_counts();
        let min = Point3::from(volume.min_corner());
        let offset: Vector3<f64> = (point - min) / volume.voxel_size;

        let mut index = [0u16; 3];
        for axis in 0..3 {
            let cell = offset[axis].floor();
            if !cell.is_finite() || cell < 0.0 || cell >= counts[axis] as f64 {
                return None;
            }
            index[axis] = cell as u16;
        }
        Some(Voxel::new(index[0], index[1], index[2]))
    }

    fn inflate(&self, voxel: Voxel, counts: [u16; 3], out: &mut Vec<Voxel>) {
        let r = self.inflation;
        let range = |c: u16, n: u16| c.saturating_sub(r)..=c.saturating_add(r).min(n.saturating_sub(1));
        for x in range(voxel.x, counts[0]) {
            for y in range(voxel.y, counts[1]) {
                for z in range(voxel.z, counts[2]) {
                    out.push(Voxel::new(x, y, z));
                }
            }
        }
    }
}

impl OccupancyEncoder for VoxelGridEncoder {
    fn encode(&self, volume: &OccupancyVolume, points: &[Point3<f64>]) -> OccupancyData {
        let counts = volume.voxel_counts();
        let mut voxels = Vec::with_capacity(points.len());
        let mut outside = 0usize;

        for point in points {
            match Self::voxel_of(volume, point) {
                Some(voxel) if self.inflation == 0 => voxels.push(voxel),
                Some(voxel) => self.inflate(voxel, counts, &mut voxels),
                None => outside += 1,
            }
        }

        let data = OccupancyData::from_voxels(voxels);
        debug!(
            "Encoded {} points into {} voxels ({} outside volume)",
            points.len(),
            data.len(),
            outside
        );
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn unit_volume() -> OccupancyVolume {
        OccupancyVolume {
            center: [0.5, 0.5, 0.5],
            dimensions: [1.0, 1.0, 1.0],
            voxel_size: 0.1,
        }
    }

    #[rstest]
    #[case(Point3::new(0.05, 0.05, 0.05), Some(Voxel::new(0, 0, 0)))]
    #[case(Point3::new(0.95, 0.15, 0.55), Some(Voxel::new(9, 1, 5)))]
    #[case(Point3::new(-0.01, 0.5, 0.5), None)]
    #[case(Point3::new(0.5, 1.01, 0.5), None)]
    #[case(Point3::new(f64::NAN, 0.5, 0.5), None)]
    fn voxel_lookup(#[case] point: Point3<f64>, #[case] expected: Option<Voxel>) {
        assert_eq!(VoxelGridEncoder::voxel_of(&unit_volume(), &point), expected);
    }

    #[test]
    fn points_in_same_voxel_collapse() {
        let points = vec![
            Point3::new(0.51, 0.51, 0.51),
            Point3::new(0.55, 0.52, 0.58),
            Point3::new(2.0, 2.0, 2.0),
        ];
        let data = VoxelGridEncoder::new().encode(&unit_volume(), &points);
        assert_eq!(data.voxels(), &[Voxel::new(5, 5, 5)]);
    }

    #[test]
    fn inflation_is_clipped_at_volume_edges() {
        let points = vec![Point3::new(0.05, 0.05, 0.05)];
        let data = VoxelGridEncoder::with_inflation(1).encode(&unit_volume(), &points);
        // 2 x 2 x 2 block at the corner
        assert_eq!(data.len(), 8);
        assert!(data.contains(&Voxel::new(1, 1, 1)));
    }

    #[test]
    fn inflation_marks_full_neighbourhood() {
        let points = vec![Point3::new(0.55, 0.55, 0.55)];
        let data = VoxelGridEncoder::with_inflation(1).encode(&unit_volume(), &points);
        assert_eq!(data.len(), 27);
    }
}
