use crate::error::ProcessError;
use crate::event::Point;
use serde::Deserialize;
use std::collections::BTreeSet;

/// How the box edges are chosen from the distinct face coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxSelection {
    /// Smallest and largest coordinate on each axis
    #[default]
    Span,
    /// Two smallest distinct coordinates on each axis. Only matches the span
    /// for clean rectangles; kept for parity with older deployments.
    FirstPair,
}

/// Axis-aligned face box, right and bottom exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

/// Crop region within the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Derive the box from the face outline.
    ///
    /// Coordinates are truncated toward zero and deduplicated per axis. Each
    /// axis needs at least two distinct values.
    pub fn from_points(points: &[Point], selection: BoxSelection) -> Result<Self, ProcessError> {
        let mut xs = BTreeSet::new();
        let mut ys = BTreeSet::new();

        for point in points {
            if !point.x.is_finite() || !point.y.is_finite() {
                return Err(ProcessError::Geometry(format!(
                    "non-finite face coordinate ({}, {})",
                    point.x, point.y
                )));
            }
            xs.insert(point.x.trunc() as i64);
            ys.insert(point.y.trunc() as i64);
        }

        let (left, right) = edges(&xs, selection).ok_or_else(|| {
            ProcessError::Geometry(format!(
                "need at least 2 distinct x coordinates, got {}",
                xs.len()
            ))
        })?;
        let (top, bottom) = edges(&ys, selection).ok_or_else(|| {
            ProcessError::Geometry(format!(
                "need at least 2 distinct y coordinates, got {}",
                ys.len()
            ))
        })?;

        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    /// Intersect with an image of the given size. `None` when nothing of the
    /// box is left inside the image.
    pub fn clip(&self, image_width: u32, image_height: u32) -> Option<CropRegion> {
        let left = self.left.clamp(0, image_width as i64);
        let right = self.right.clamp(0, image_width as i64);
        let top = self.top.clamp(0, image_height as i64);
        let bottom = self.bottom.clamp(0, image_height as i64);

        if right <= left || bottom <= top {
            return None;
        }

        Some(CropRegion {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

fn edges(values: &BTreeSet<i64>, selection: BoxSelection) -> Option<(i64, i64)> {
    if values.len() < 2 {
        return None;
    }
    let mut sorted = values.iter().copied();
    let low = sorted.next()?;
    let high = match selection {
        BoxSelection::Span => values.iter().next_back().copied()?,
        BoxSelection::FirstPair => sorted.next()?,
    };
    Some((low, high))
}
