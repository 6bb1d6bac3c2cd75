//! Regular raster over the project area, sampled at metric coordinates.

use glam::Vec2;

/// A row-major grid of values covering the area at a fixed resolution
/// (meters per cell). Sampling is nearest-cell and clamps at the borders,
/// so every metric coordinate yields a value.
pub struct Raster {
    width: usize,
    height: usize,
    resolution: f32,
    data: Vec<f32>,
}

impl Raster {
    pub fn new(width: usize, height: usize, resolution: f32) -> Self {
        Self {
            width,
            height,
            resolution,
            data: vec![0.0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Value of the cell containing the metric point `p`.
    pub fn sample(&self, p: Vec2) -> f32 {
        let x = ((p.x / self.resolution) as isize).clamp(0, self.width as isize - 1);
        let y = ((p.y / self.resolution) as isize).clamp(0, self.height as isize - 1);
        self.get(x as usize, y as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_reads_cell_under_point() {
        let mut raster = Raster::new(4, 3, 10.0);
        raster.set(2, 1, 0.7);
        assert_eq!(raster.sample(Vec2::new(25.0, 15.0)), 0.7);
        assert_eq!(raster.sample(Vec2::new(25.0, 25.0)), 0.0);
    }

    #[test]
    fn sample_clamps_outside_area() {
        let mut raster = Raster::new(2, 2, 5.0);
        raster.set(0, 0, 1.0);
        raster.set(1, 1, 2.0);
        assert_eq!(raster.sample(Vec2::new(-100.0, -100.0)), 1.0);
        assert_eq!(raster.sample(Vec2::new(100.0, 100.0)), 2.0);
    }
}
