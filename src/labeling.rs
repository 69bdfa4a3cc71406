//! Connected-component labeling of marker pixels.
//!
//! A [`Mask`] records which pixels a [`Classifier`] marks. [`Labeling`] then
//! partitions the marked pixels into regions with a breadth-first flood fill
//! seeded in raster order, so region ids follow discovery order and every
//! pixel is queued at most once.

use crate::color::Classifier;
use image::RgbaImage;
use rayon::{iter::ParallelIterator, slice::ParallelSlice};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub type RegionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Up, down, left and right.
    #[default]
    Four,
    /// The four edge neighbours plus the diagonals.
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(i64, i64)] {
        const FOUR: [(i64, i64); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
        const EIGHT: [(i64, i64); 8] = [
            (0, 1),
            (0, -1),
            (1, 0),
            (-1, 0),
            (1, 1),
            (1, -1),
            (-1, 1),
            (-1, -1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// Row-major boolean mask over an image grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    pub fn from_image(image: &RgbaImage, classifier: &Classifier) -> Mask {
        let bits = image
            .as_raw()
            .par_chunks_exact(4)
            .map(|px| classifier.is_marked_px(px))
            .collect();
        Mask {
            width: image.width(),
            height: image.height(),
            bits,
        }
    }

    /// Builds a mask straight from row-major bits.
    ///
    /// # Panics
    /// When `bits.len()` is not `width * height`.
    pub fn from_bits(width: u32, height: u32, bits: Vec<bool>) -> Mask {
        assert_eq!(
            bits.len(),
            width as usize * height as usize,
            "mask size does not match {width}x{height}"
        );
        Mask {
            width,
            height,
            bits,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Inclusive pixel bounds of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Bounds {
    fn at(x: u32, y: u32) -> Bounds {
        Bounds {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: RegionId,
    /// Pixel count.
    pub size: u64,
    /// First pixel of the region in raster order.
    pub seed: (u32, u32),
    pub bounds: Bounds,
}

/// Partition of a mask's marked pixels into connected regions.
#[derive(Debug, Clone)]
pub struct Labeling {
    width: u32,
    height: u32,
    labels: Vec<Option<RegionId>>,
    regions: Vec<Region>,
}

impl Labeling {
    pub fn new(mask: &Mask, connectivity: Connectivity) -> Labeling {
        let (width, height) = (mask.width, mask.height);
        let mut labels: Vec<Option<RegionId>> = vec![None; mask.bits.len()];
        let mut regions: Vec<Region> = Vec::new();
        let mut queue: VecDeque<(u32, u32)> = VecDeque::new();

        for y in 0..height {
            for x in 0..width {
                let start = mask.index(x, y);
                if !mask.bits[start] || labels[start].is_some() {
                    continue;
                }

                let id = regions.len() as RegionId;
                let mut region = Region {
                    id,
                    size: 0,
                    seed: (x, y),
                    bounds: Bounds::at(x, y),
                };

                // Pixels are labeled when queued, not when popped, so none is queued twice.
                labels[start] = Some(id);
                queue.push_back((x, y));
                while let Some((cx, cy)) = queue.pop_front() {
                    region.size += 1;
                    region.bounds.include(cx, cy);

                    for &(dx, dy) in connectivity.offsets() {
                        let nx = cx as i64 + dx;
                        let ny = cy as i64 + dy;
                        if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                            continue;
                        }
                        let (nx, ny) = (nx as u32, ny as u32);
                        let neighbour = mask.index(nx, ny);
                        if mask.bits[neighbour] && labels[neighbour].is_none() {
                            labels[neighbour] = Some(id);
                            queue.push_back((nx, ny));
                        }
                    }
                }
                regions.push(region);
            }
        }

        Labeling {
            width,
            height,
            labels,
            regions,
        }
    }

    pub fn from_image(
        image: &RgbaImage,
        classifier: &Classifier,
        connectivity: Connectivity,
    ) -> Labeling {
        Labeling::new(&Mask::from_image(image, classifier), connectivity)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Regions in discovery order; `regions()[id]` has that id.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id as usize)
    }

    pub fn region_at(&self, x: u32, y: u32) -> Option<RegionId> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.labels[y as usize * self.width as usize + x as usize]
    }

    /// Row-major label map.
    pub fn labels(&self) -> &[Option<RegionId>] {
        &self.labels
    }

    pub fn marked_pixels(&self) -> u64 {
        self.regions.iter().map(|region| region.size).sum()
    }

    /// Member coordinates of one region, in raster order.
    pub fn pixels(&self, id: RegionId) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width as usize;
        let rows = match self.region(id) {
            Some(region) => region.bounds.min_y as usize..region.bounds.max_y as usize + 1,
            None => 0..0,
        };
        rows.flat_map(move |y| (0..width).map(move |x| (x, y)))
            .filter(move |&(x, y)| self.labels[y * width + x] == Some(id))
            .map(|(x, y)| (x as u32, y as u32))
    }

    /// The region with the most pixels. Ties go to the region discovered
    /// first in raster order, i.e. the one whose seed is closest to the
    /// top-left corner.
    pub fn largest(&self) -> Option<&Region> {
        self.regions.iter().fold(None, |best: Option<&Region>, region| match best {
            Some(best) if best.size >= region.size => Some(best),
            _ => Some(region),
        })
    }

    pub fn at_least(&self, min_pixels: u64) -> impl Iterator<Item = &Region> + '_ {
        self.regions
            .iter()
            .filter(move |region| region.size >= min_pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `#` is marked, anything else is not.
    fn mask(rows: &[&str]) -> Mask {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |row| row.len()) as u32;
        let bits = rows
            .iter()
            .flat_map(|row| row.chars().map(|c| c == '#'))
            .collect();
        Mask::from_bits(width, height, bits)
    }

    #[test]
    fn empty_mask_has_no_regions() {
        let labeling = Labeling::new(&mask(&["...", "..."]), Connectivity::Four);
        assert!(labeling.regions().is_empty());
        assert!(labeling.largest().is_none());
        assert_eq!(labeling.marked_pixels(), 0);
    }

    #[test]
    fn diagonal_pixels_split_under_four_connectivity() {
        let rows = ["#..", ".#.", "..#"];
        let four = Labeling::new(&mask(&rows), Connectivity::Four);
        let eight = Labeling::new(&mask(&rows), Connectivity::Eight);
        assert_eq!(four.regions().len(), 3);
        assert_eq!(eight.regions().len(), 1);
        assert_eq!(eight.regions()[0].size, 3);
    }

    #[test]
    fn regions_follow_raster_discovery_order() {
        let labeling = Labeling::new(
            &mask(&["..##", "#...", "#..#"]),
            Connectivity::Four,
        );
        let seeds: Vec<_> = labeling.regions().iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![(2, 0), (0, 1), (3, 2)]);
        let sizes: Vec<_> = labeling.regions().iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn largest_tie_goes_to_first_discovered() {
        let labeling = Labeling::new(&mask(&["##.##", ".....", "##..."]), Connectivity::Four);
        let largest = labeling.largest().unwrap();
        assert_eq!(largest.id, 0);
        assert_eq!(largest.seed, (0, 0));
    }

    #[test]
    fn u_shape_is_one_region_with_bounds() {
        let labeling = Labeling::new(
            &mask(&["#...#", "#...#", "#####"]),
            Connectivity::Four,
        );
        assert_eq!(labeling.regions().len(), 1);
        let region = &labeling.regions()[0];
        assert_eq!(region.size, 9);
        assert_eq!(
            region.bounds,
            Bounds {
                min_x: 0,
                min_y: 0,
                max_x: 4,
                max_y: 2
            }
        );
        assert_eq!(labeling.pixels(0).count(), 9);
        assert_eq!(labeling.region_at(2, 1), None);
        assert_eq!(labeling.region_at(4, 0), Some(0));
        assert_eq!(labeling.region_at(9, 9), None);
    }

    #[test]
    fn at_least_filters_by_size() {
        let labeling = Labeling::new(
            &mask(&["###.#", "###..", "###.."]),
            Connectivity::Four,
        );
        let kept: Vec<_> = labeling.at_least(5).map(|r| r.size).collect();
        assert_eq!(kept, vec![9]);
        assert_eq!(labeling.at_least(0).count(), 2);
        assert_eq!(labeling.at_least(100).count(), 0);
    }
}
